// vigia-api: Async Rust client for the operational public-safety feed

pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use client::FeedClient;
pub use error::Error;
pub use models::{
    Alert, AlertSeverity, Camera, DatasetSummary, GeoPoint, HealthUnit, OperationalDataset, Siren,
    SirenStatus, SupportPoint, WeatherStation,
};
pub use transport::{TlsMode, TransportConfig};
