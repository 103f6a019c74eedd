//! Typed client for the Miniflux v1 REST API.
//!
//! Covers the four calls the sync engine needs: a connectivity check, the
//! feed listing, a bounded entry listing and the bulk status update.

mod client;
mod error;
mod types;

pub use client::{build_http_client, normalize_base_url, Client, DEFAULT_REQUEST_TIMEOUT};
pub use error::MinifluxError;
pub use types::{Category, EntriesPage, Entry, EntryStatus, Feed};
