use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the database lock
    #[error("The database is locked by another fluxsync process. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Map a sqlx error, recognising lock contention
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY, SQLITE_LOCKED and SQLITE_CANTOPEN all surface through the message.
pub(crate) fn is_lock_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("database is locked")
        || lower.contains("database table is locked")
        || lower.contains("sqlite_busy")
        || lower.contains("sqlite_locked")
        || lower.contains("unable to open database file")
}

// ============================================================================
// Stored Records
// ============================================================================

/// Feed row. Either a mirror of a remote subscription or the synthetic
/// aggregation feed that holds synced articles.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Feed {
    pub id: i64,
    pub title: String,
    /// Natural key, unique across the table
    pub url: String,
    pub site_url: Option<String>,
    /// Category label copied from the remote feed
    pub category: Option<String>,
}

/// Article row.
///
/// `published` and `fetched_at` are unix timestamps in seconds.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Article {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    /// Natural key, unique across the table
    pub url: String,
    pub content: String,
    pub published: i64,
    pub read: bool,
    pub starred: bool,
    pub hidden: bool,
    pub fetched_at: i64,
}

// ============================================================================
// Insert Shapes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFeed {
    pub title: String,
    pub url: String,
    pub site_url: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArticle {
    pub feed_id: i64,
    pub title: String,
    pub url: String,
    pub content: String,
    pub published: i64,
    pub read: bool,
    pub starred: bool,
}

// ============================================================================
// Queries
// ============================================================================

/// Read-state filter for article listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArticleFilter {
    #[default]
    All,
    Unread,
    Read,
    Starred,
}

/// Parameters for [`Database::get_articles`](super::Database::get_articles).
///
/// `limit` is capped by the store; results are ordered newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleQuery {
    pub filter: ArticleFilter,
    pub feed_id: Option<i64>,
    /// Matches the owning feed's category label
    pub category: Option<String>,
    pub show_hidden: bool,
    pub limit: i64,
    pub offset: i64,
}

impl Default for ArticleQuery {
    fn default() -> Self {
        Self {
            filter: ArticleFilter::All,
            feed_id: None,
            category: None,
            show_hidden: false,
            limit: 500,
            offset: 0,
        }
    }
}
