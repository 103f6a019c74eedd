//! Synchronizes a Miniflux account into a local SQLite feed store.
//!
//! [`miniflux::Client`] speaks the Miniflux v1 API, [`storage::Database`]
//! holds feeds and articles, and [`sync::SyncService`] merges the former into
//! the latter without duplicating anything across repeated passes.

pub mod config;
pub mod miniflux;
pub mod storage;
pub mod sync;
pub mod util;
