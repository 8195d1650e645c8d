//! E-waste tracker daemon library
//!
//! Serves the item registry, pickup ledger and status history over REST:
//! - configuration loading
//! - credential resolution into principals
//! - photo cleanup on item deletion
//! - server lifecycle

pub mod api;
pub mod config;
pub mod error;
pub mod media;
pub mod server;

pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError};
pub use media::LocalMediaStore;
pub use server::Server;
