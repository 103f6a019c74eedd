use super::schema::Database;
use super::types::{DatabaseError, Feed, NewFeed};

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// All feeds in insertion order.
    pub async fn get_feeds(&self) -> Result<Vec<Feed>, DatabaseError> {
        let feeds = sqlx::query_as::<_, Feed>(
            "SELECT id, title, url, site_url, category FROM feeds ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    /// Look up a feed by its URL (the natural key).
    pub async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>, DatabaseError> {
        let feed = sqlx::query_as::<_, Feed>(
            "SELECT id, title, url, site_url, category FROM feeds WHERE url = ?",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    /// Insert a feed and return its new ID.
    ///
    /// Fails with a constraint error if the URL already exists. Callers either
    /// look the URL up with [`get_feed_by_url`](Self::get_feed_by_url) or, like
    /// the sync pass, compare against a [`get_feeds`](Self::get_feeds) snapshot.
    pub async fn add_feed(&self, feed: &NewFeed) -> Result<i64, DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO feeds (title, url, site_url, category, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
        "#,
        )
        .bind(&feed.title)
        .bind(&feed.url)
        .bind(&feed.site_url)
        .bind(&feed.category)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tracing::debug!(feed_id = id, url = %feed.url, "Feed added");
        Ok(id)
    }

    /// Number of unread, non-hidden articles per feed, keyed by feed ID.
    pub async fn unread_counts(&self) -> Result<Vec<(i64, i64)>, DatabaseError> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT f.id, COUNT(CASE WHEN a.read = 0 AND a.hidden = 0 THEN 1 END)
            FROM feeds f
            LEFT JOIN articles a ON f.id = a.feed_id
            GROUP BY f.id
            ORDER BY f.id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
