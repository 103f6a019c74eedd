use async_trait::async_trait;

use crate::storage::{Article, ArticleQuery, Database, DatabaseError, Feed, NewArticle, NewFeed};

/// What the sync pass needs from local persistence.
///
/// Implemented by [`Database`]; tests substitute an in-memory fake. Callers
/// must not run two passes against the same store at once.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get_feeds(&self) -> Result<Vec<Feed>, DatabaseError>;

    /// Insert a feed, returning its newly assigned ID.
    async fn add_feed(&self, feed: &NewFeed) -> Result<i64, DatabaseError>;

    /// Insert a batch atomically, returning how many rows were new.
    async fn save_articles(&self, articles: &[NewArticle]) -> Result<usize, DatabaseError>;

    async fn get_articles(&self, query: &ArticleQuery) -> Result<Vec<Article>, DatabaseError>;
}

#[async_trait]
impl LocalStore for Database {
    async fn get_feeds(&self) -> Result<Vec<Feed>, DatabaseError> {
        Database::get_feeds(self).await
    }

    async fn add_feed(&self, feed: &NewFeed) -> Result<i64, DatabaseError> {
        Database::add_feed(self, feed).await
    }

    async fn save_articles(&self, articles: &[NewArticle]) -> Result<usize, DatabaseError> {
        Database::save_articles(self, articles).await
    }

    async fn get_articles(&self, query: &ArticleQuery) -> Result<Vec<Article>, DatabaseError> {
        Database::get_articles(self, query).await
    }
}
