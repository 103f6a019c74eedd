use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Remote Records
// ============================================================================

/// Category a remote feed is filed under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub title: String,
}

/// A feed subscription on the Miniflux server.
///
/// Read-only mirror: this crate never creates or edits remote feeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    pub feed_url: String,
    #[serde(default)]
    pub site_url: String,
    #[serde(default)]
    pub category: Category,
}

/// Read state of a remote entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Unread,
    Read,
    Removed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Unread => "unread",
            EntryStatus::Read => "read",
            EntryStatus::Removed => "removed",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of syndicated content held by the Miniflux server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    #[serde(default)]
    pub feed_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author: String,
    pub published_at: DateTime<Utc>,
    pub status: EntryStatus,
    #[serde(default)]
    pub starred: bool,
}

/// One bounded page of the `/entries` listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntriesPage {
    /// Number of entries matching the filter on the server, which can exceed
    /// `entries.len()` when the limit truncates the listing.
    pub total: i64,
    #[serde(default)]
    pub entries: Vec<Entry>,
}

/// Body of the bulk status mutation (`PUT /entries`).
#[derive(Debug, Clone, Serialize)]
pub(crate) struct UpdateEntriesRequest<'a> {
    pub entry_ids: &'a [i64],
    pub status: EntryStatus,
}
