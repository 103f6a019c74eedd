//! Miniflux to local store synchronization.
//!
//! [`SyncService`] drives a single pass against any [`LocalStore`]. Passes
//! are idempotent: repeating one never duplicates feeds or articles.

mod error;
mod service;
mod store;

pub use error::SyncError;
pub use service::{
    SyncOptions, SyncReport, SyncService, DEFAULT_ENTRY_LIMIT, SYNCED_FEED_TITLE, SYNCED_FEED_URL,
};
pub use store::LocalStore;
