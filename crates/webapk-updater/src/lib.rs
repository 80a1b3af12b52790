//! Drives WebAPK update checks: fetches live manifests, applies the update
//! policy, persists the outcome, and sends update requests to the update
//! server.
//!
//! The pieces are generic over the collaborator traits in
//! [`webapk_core::collab`]; this crate also provides the HTTP and channel
//! implementations used by the `webapk-updater` binary.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod fetch;
pub mod manager;
pub mod scheduler;

pub use config::UpdaterConfig;
pub use dispatch::HttpUpdateDispatcher;
pub use error::{Error, Result};
pub use fetch::HttpManifestFetcher;
pub use manager::{CheckReport, UpdateManager};
pub use scheduler::{ChannelScheduler, ScheduledUpdate};
