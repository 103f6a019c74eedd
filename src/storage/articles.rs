use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{Article, ArticleFilter, ArticleQuery, DatabaseError, NewArticle};

/// Maximum number of articles returned by a single query (OOM protection)
const MAX_ARTICLES_PER_QUERY: i64 = 2000;

/// 8 bound columns per row keeps each chunk under SQLite's parameter limit.
const INSERT_BATCH_SIZE: usize = 100;

impl Database {
    // ========================================================================
    // Article Mutations
    // ========================================================================

    /// Insert articles in one transaction, returning how many rows were new.
    ///
    /// Uses `INSERT OR IGNORE`, so a URL that already exists (or repeats
    /// within `articles`) is skipped instead of duplicated. Any failure rolls
    /// back the whole batch.
    pub async fn save_articles(&self, articles: &[NewArticle]) -> Result<usize, DatabaseError> {
        if articles.is_empty() {
            return Ok(0);
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;
        let mut inserted: u64 = 0;

        for chunk in articles.chunks(INSERT_BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
                "INSERT OR IGNORE INTO articles (feed_id, title, url, content, published, read, starred, fetched_at) ",
            );

            builder.push_values(chunk, |mut b, article| {
                b.push_bind(article.feed_id)
                    .push_bind(&article.title)
                    .push_bind(&article.url)
                    .push_bind(&article.content)
                    .push_bind(article.published)
                    .push_bind(article.read)
                    .push_bind(article.starred)
                    .push_bind(now);
            });

            let result = builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(DatabaseError::from_sqlx)?;
            inserted += result.rows_affected();
        }

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;

        let inserted = inserted as usize;
        if inserted < articles.len() {
            tracing::debug!(
                submitted = articles.len(),
                inserted = inserted,
                "Ignored articles with existing URLs"
            );
        }
        Ok(inserted)
    }

    /// Hide or unhide an article. Hidden articles are excluded from listings
    /// unless `show_hidden` is set.
    pub async fn set_article_hidden(&self, article_id: i64, hidden: bool) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE articles SET hidden = ? WHERE id = ?")
            .bind(hidden)
            .bind(article_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Article Queries
    // ========================================================================

    /// List articles newest first, filtered per `query`.
    ///
    /// `limit` is clamped to `0..=MAX_ARTICLES_PER_QUERY`; a negative offset
    /// is treated as zero.
    pub async fn get_articles(&self, query: &ArticleQuery) -> Result<Vec<Article>, DatabaseError> {
        let limit = query.limit.clamp(0, MAX_ARTICLES_PER_QUERY);
        let offset = query.offset.max(0);

        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
            r#"
            SELECT a.id, a.feed_id, a.title, a.url, a.content, a.published,
                   a.read, a.starred, a.hidden, a.fetched_at
            FROM articles a
            JOIN feeds f ON f.id = a.feed_id
            WHERE 1 = 1"#,
        );

        match query.filter {
            ArticleFilter::All => {}
            ArticleFilter::Unread => {
                builder.push(" AND a.read = 0");
            }
            ArticleFilter::Read => {
                builder.push(" AND a.read = 1");
            }
            ArticleFilter::Starred => {
                builder.push(" AND a.starred = 1");
            }
        }
        if !query.show_hidden {
            builder.push(" AND a.hidden = 0");
        }
        if let Some(feed_id) = query.feed_id {
            builder.push(" AND a.feed_id = ").push_bind(feed_id);
        }
        if let Some(category) = &query.category {
            builder.push(" AND f.category = ").push_bind(category);
        }

        // id breaks ties so offset paging is stable
        builder
            .push(" ORDER BY a.published DESC, a.id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let articles = builder
            .build_query_as::<Article>()
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(
            filter = ?query.filter,
            limit = limit,
            offset = offset,
            returned = articles.len(),
            "get_articles"
        );
        Ok(articles)
    }

    /// Total number of stored articles, hidden included.
    pub async fn count_articles(&self) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
