use thiserror::Error;

use crate::miniflux::MinifluxError;
use crate::storage::DatabaseError;

/// Why a sync pass stopped. The first failure aborts the pass and is
/// returned unchanged inside the matching variant.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A Miniflux call failed
    #[error("Remote sync failed: {0}")]
    Remote(#[from] MinifluxError),

    /// Reading from or writing to the local store failed
    #[error("Local store failed during sync: {0}")]
    LocalStore(#[from] DatabaseError),

    /// Cancellation was observed between steps, before the local batch write
    #[error("Sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// True for cancellation seen either between steps or inside a remote call.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            SyncError::Cancelled | SyncError::Remote(MinifluxError::Cancelled)
        )
    }
}
