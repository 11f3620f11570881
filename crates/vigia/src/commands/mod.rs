//! Subcommand handlers.

pub mod cache;
pub mod config_cmd;
pub mod sync;
pub mod watch;
