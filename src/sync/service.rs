use std::collections::HashSet;

use tokio_util::sync::CancellationToken;

use super::error::SyncError;
use super::store::LocalStore;
use crate::miniflux::{self, Client, Entry, EntryStatus};
use crate::storage::{ArticleFilter, ArticleQuery, Feed, NewArticle, NewFeed};
use crate::util::canonical_url;

/// URL of the local feed that owns every synced article.
pub const SYNCED_FEED_URL: &str = "miniflux://synced";

/// Title given to the synthetic feed when it is created.
pub const SYNCED_FEED_TITLE: &str = "Miniflux Synced Articles";

/// Default page size for the unread entry listing.
pub const DEFAULT_ENTRY_LIMIT: u32 = 100;

const EXISTING_URL_PAGE_SIZE: i64 = 1000;

/// Policy knobs for a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Maximum number of unread entries requested per pass
    pub entry_limit: u32,
    /// After a successful local write, mark every fetched entry that is now
    /// stored locally as read on the server
    pub mark_remote_read: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            entry_limit: DEFAULT_ENTRY_LIMIT,
            mark_remote_read: false,
        }
    }
}

/// Counters describing what one pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Local feeds created to mirror remote subscriptions
    pub feeds_mirrored: usize,
    /// Whether this pass created the synthetic feed
    pub synced_feed_created: bool,
    /// Entries received in the unread listing
    pub entries_fetched: usize,
    /// Unread entries on the server, possibly more than were fetched
    pub remote_total: i64,
    /// Articles the store reported as newly inserted
    pub articles_added: usize,
    /// Entries whose URL was already stored or appeared earlier in the listing
    pub duplicates_skipped: usize,
    /// Entries without a usable URL
    pub invalid_skipped: usize,
    /// Entries marked read on the server
    pub entries_marked_read: usize,
}

/// One-directional sync from a Miniflux account into a [`LocalStore`].
///
/// Each call to [`sync`](Self::sync) is a single pass:
///
/// 1. fetch remote feeds
/// 2. mirror feeds whose URL is not yet stored (additive only)
/// 3. find or create the synthetic feed at [`SYNCED_FEED_URL`]
/// 4. fetch unread entries up to `entry_limit`
/// 5. skip entries whose canonical URL is already stored or already staged
/// 6. save the staged articles in one batch
/// 7. optionally mark the represented entries read remotely
///
/// The first failure aborts the pass. Steps 2 and 6 commit independently, so
/// a pass that fails after step 2 leaves mirrored feeds behind; the next pass
/// picks up from there without duplicating anything.
pub struct SyncService<S> {
    client: Client,
    store: S,
    options: SyncOptions,
}

impl<S: LocalStore> SyncService<S> {
    pub fn new(client: Client, store: S, options: SyncOptions) -> Self {
        Self {
            client,
            store,
            options,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> SyncOptions {
        self.options
    }

    /// Run one sync pass.
    ///
    /// Passes must not overlap on the same store.
    pub async fn sync(&self, cancel: &CancellationToken) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();

        let remote_feeds = self.client.get_feeds(cancel).await?;
        ensure_active(cancel)?;

        let local_feeds = self.store.get_feeds().await?;
        report.feeds_mirrored = self.mirror_feeds(&remote_feeds, &local_feeds).await?;

        let (synced_feed_id, created) = self.ensure_synced_feed(&local_feeds).await?;
        report.synced_feed_created = created;

        let page = self
            .client
            .get_entries(EntryStatus::Unread, self.options.entry_limit, cancel)
            .await?;
        report.entries_fetched = page.entries.len();
        report.remote_total = page.total;
        if page.total > page.entries.len() as i64 {
            tracing::debug!(
                total = page.total,
                fetched = page.entries.len(),
                "More unread entries remain on the server"
            );
        }

        let mut known_urls = self.existing_article_urls().await?;
        let mut staged = Vec::new();
        let mut represented_ids = Vec::new();

        for entry in &page.entries {
            let Some(url) = canonical_url(&entry.url) else {
                tracing::warn!(entry_id = entry.id, "Skipping entry without a URL");
                report.invalid_skipped += 1;
                continue;
            };

            represented_ids.push(entry.id);
            if known_urls.contains(&url) {
                report.duplicates_skipped += 1;
                continue;
            }

            staged.push(article_from_entry(entry, url.clone(), synced_feed_id));
            known_urls.insert(url);
        }

        ensure_active(cancel)?;
        if !staged.is_empty() {
            report.articles_added = self.store.save_articles(&staged).await?;
        }

        if self.options.mark_remote_read && !represented_ids.is_empty() {
            self.client
                .update_entries(&represented_ids, EntryStatus::Read, cancel)
                .await?;
            report.entries_marked_read = represented_ids.len();
        }

        tracing::info!(
            feeds_mirrored = report.feeds_mirrored,
            entries_fetched = report.entries_fetched,
            articles_added = report.articles_added,
            duplicates_skipped = report.duplicates_skipped,
            invalid_skipped = report.invalid_skipped,
            entries_marked_read = report.entries_marked_read,
            "Miniflux sync complete"
        );
        Ok(report)
    }

    // ========================================================================
    // Steps
    // ========================================================================

    /// Create a local feed for every remote feed URL not already stored.
    ///
    /// URLs are compared in canonical form against the `local_feeds`
    /// snapshot, which stands in for a per-feed `get_feed_by_url` lookup.
    async fn mirror_feeds(
        &self,
        remote_feeds: &[miniflux::Feed],
        local_feeds: &[Feed],
    ) -> Result<usize, SyncError> {
        let mut known: HashSet<String> = local_feeds
            .iter()
            .map(|f| canonical_url(&f.url).unwrap_or_else(|| f.url.clone()))
            .collect();
        let mut mirrored = 0;

        for remote in remote_feeds {
            let Some(key) = canonical_url(&remote.feed_url) else {
                tracing::warn!(feed_id = remote.id, "Skipping remote feed without a URL");
                continue;
            };
            if key == SYNCED_FEED_URL {
                tracing::warn!(feed_id = remote.id, "Remote feed uses the reserved synced URL, skipping");
                continue;
            }
            if !known.insert(key) {
                continue;
            }

            // Stored as the server lists it; the canonical form is only the dedup key
            let url = remote.feed_url.trim().to_string();
            let title = if remote.title.trim().is_empty() {
                url.clone()
            } else {
                remote.title.clone()
            };
            let id = self
                .store
                .add_feed(&NewFeed {
                    title,
                    url,
                    site_url: non_empty(&remote.site_url),
                    category: non_empty(&remote.category.title),
                })
                .await?;
            tracing::debug!(local_id = id, remote_id = remote.id, "Mirrored remote feed");
            mirrored += 1;
        }

        Ok(mirrored)
    }

    /// Return the synthetic feed's ID, creating it if absent.
    async fn ensure_synced_feed(&self, local_feeds: &[Feed]) -> Result<(i64, bool), SyncError> {
        if let Some(feed) = local_feeds.iter().find(|f| f.url == SYNCED_FEED_URL) {
            return Ok((feed.id, false));
        }

        let id = self
            .store
            .add_feed(&NewFeed {
                title: SYNCED_FEED_TITLE.to_string(),
                url: SYNCED_FEED_URL.to_string(),
                site_url: None,
                category: None,
            })
            .await?;
        tracing::info!(feed_id = id, "Created synced articles feed");
        Ok((id, true))
    }

    /// Canonical URLs of every stored article, across all feeds and including
    /// hidden ones.
    async fn existing_article_urls(&self) -> Result<HashSet<String>, SyncError> {
        let mut urls = HashSet::new();
        let mut offset = 0;

        loop {
            let page = self
                .store
                .get_articles(&ArticleQuery {
                    filter: ArticleFilter::All,
                    feed_id: None,
                    category: None,
                    show_hidden: true,
                    limit: EXISTING_URL_PAGE_SIZE,
                    offset,
                })
                .await?;
            let received = page.len() as i64;

            urls.extend(
                page.into_iter()
                    .map(|a| canonical_url(&a.url).unwrap_or(a.url)),
            );

            if received < EXISTING_URL_PAGE_SIZE {
                break;
            }
            offset += received;
        }

        Ok(urls)
    }
}

fn ensure_active(cancel: &CancellationToken) -> Result<(), SyncError> {
    if cancel.is_cancelled() {
        tracing::info!("Sync cancelled before writing");
        return Err(SyncError::Cancelled);
    }
    Ok(())
}

fn article_from_entry(entry: &Entry, url: String, feed_id: i64) -> NewArticle {
    NewArticle {
        feed_id,
        title: entry.title.clone(),
        url,
        content: entry.content.clone(),
        published: entry.published_at.timestamp(),
        read: entry.status == EntryStatus::Read,
        starred: entry.starred,
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Article, DatabaseError};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // ========================================================================
    // In-memory store
    // ========================================================================

    #[derive(Default)]
    struct StoreState {
        feeds: Vec<Feed>,
        articles: Vec<Article>,
        fail_get_feeds: bool,
        fail_add_feed: bool,
        fail_save: bool,
        save_calls: usize,
    }

    #[derive(Clone, Default)]
    struct MemoryStore {
        state: Arc<Mutex<StoreState>>,
    }

    impl MemoryStore {
        fn with_feeds(urls: &[&str]) -> Self {
            let store = Self::default();
            {
                let mut state = store.state.lock().unwrap();
                for url in urls {
                    let id = state.feeds.len() as i64 + 1;
                    state.feeds.push(Feed {
                        id,
                        title: url.to_string(),
                        url: url.to_string(),
                        site_url: None,
                        category: None,
                    });
                }
            }
            store
        }

        fn feeds(&self) -> Vec<Feed> {
            self.state.lock().unwrap().feeds.clone()
        }

        fn articles(&self) -> Vec<Article> {
            self.state.lock().unwrap().articles.clone()
        }

        fn set(&self, f: impl FnOnce(&mut StoreState)) {
            f(&mut self.state.lock().unwrap());
        }
    }

    fn injected() -> DatabaseError {
        DatabaseError::Other(sqlx::Error::PoolTimedOut)
    }

    #[async_trait]
    impl LocalStore for MemoryStore {
        async fn get_feeds(&self) -> Result<Vec<Feed>, DatabaseError> {
            let state = self.state.lock().unwrap();
            if state.fail_get_feeds {
                return Err(injected());
            }
            Ok(state.feeds.clone())
        }

        async fn add_feed(&self, feed: &NewFeed) -> Result<i64, DatabaseError> {
            let mut state = self.state.lock().unwrap();
            if state.fail_add_feed {
                return Err(injected());
            }
            let id = state.feeds.len() as i64 + 1;
            state.feeds.push(Feed {
                id,
                title: feed.title.clone(),
                url: feed.url.clone(),
                site_url: feed.site_url.clone(),
                category: feed.category.clone(),
            });
            Ok(id)
        }

        async fn save_articles(&self, articles: &[NewArticle]) -> Result<usize, DatabaseError> {
            let mut state = self.state.lock().unwrap();
            state.save_calls += 1;
            if state.fail_save {
                return Err(injected());
            }
            let mut inserted = 0;
            for article in articles {
                if state.articles.iter().any(|a| a.url == article.url) {
                    continue;
                }
                let id = state.articles.len() as i64 + 1;
                state.articles.push(Article {
                    id,
                    feed_id: article.feed_id,
                    title: article.title.clone(),
                    url: article.url.clone(),
                    content: article.content.clone(),
                    published: article.published,
                    read: article.read,
                    starred: article.starred,
                    hidden: false,
                    fetched_at: 0,
                });
                inserted += 1;
            }
            Ok(inserted)
        }

        async fn get_articles(&self, query: &ArticleQuery) -> Result<Vec<Article>, DatabaseError> {
            let state = self.state.lock().unwrap();
            Ok(state
                .articles
                .iter()
                .filter(|a| query.show_hidden || !a.hidden)
                .filter(|a| query.feed_id.map_or(true, |id| a.feed_id == id))
                .skip(query.offset as usize)
                .take(query.limit as usize)
                .cloned()
                .collect())
        }
    }

    // ========================================================================
    // Fixtures
    // ========================================================================

    fn remote_feeds() -> serde_json::Value {
        json!([
            {"id": 1, "title": "Test Feed 1", "feed_url": "https://example.com/feed1.xml",
             "site_url": "https://example.com", "category": {"id": 1, "title": "Tech"}},
            {"id": 2, "title": "Test Feed 2", "feed_url": "https://example.com/feed2.xml",
             "site_url": "https://example.com", "category": {"id": 2, "title": "News"}}
        ])
    }

    fn entry(id: i64, url: &str) -> serde_json::Value {
        json!({
            "id": id,
            "feed_id": 1,
            "title": format!("Entry {}", id),
            "url": url,
            "content": "<p>content</p>",
            "published_at": "2024-01-01T00:00:00Z",
            "status": "unread",
            "starred": false
        })
    }

    fn entries(list: Vec<serde_json::Value>) -> serde_json::Value {
        json!({"total": list.len(), "entries": list})
    }

    async fn mock_remote(server: &MockServer, feeds: serde_json::Value, entries: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/v1/feeds"))
            .respond_with(ResponseTemplate::new(200).set_body_json(feeds))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/entries"))
            .and(query_param("status", "unread"))
            .respond_with(ResponseTemplate::new(200).set_body_json(entries))
            .mount(server)
            .await;
    }

    fn service(server: &MockServer, store: MemoryStore, options: SyncOptions) -> SyncService<MemoryStore> {
        let client = Client::new(reqwest::Client::new(), &server.uri(), "test-key");
        SyncService::new(client, store, options)
    }

    fn synced_feeds(store: &MemoryStore) -> Vec<Feed> {
        store
            .feeds()
            .into_iter()
            .filter(|f| f.url == SYNCED_FEED_URL)
            .collect()
    }

    // ========================================================================
    // Happy path
    // ========================================================================

    #[tokio::test]
    async fn test_first_sync_mirrors_feeds_and_saves_articles() {
        let server = MockServer::start().await;
        mock_remote(
            &server,
            remote_feeds(),
            entries(vec![entry(1, "https://example.com/entry1")]),
        )
        .await;

        let store = MemoryStore::default();
        let svc = service(&server, store.clone(), SyncOptions::default());
        let report = svc.sync(&CancellationToken::new()).await.unwrap();

        assert_eq!(
            report,
            SyncReport {
                feeds_mirrored: 2,
                synced_feed_created: true,
                entries_fetched: 1,
                remote_total: 1,
                articles_added: 1,
                duplicates_skipped: 0,
                invalid_skipped: 0,
                entries_marked_read: 0,
            }
        );

        let feeds = store.feeds();
        assert_eq!(feeds.len(), 3);
        assert_eq!(feeds[0].category.as_deref(), Some("Tech"));
        assert_eq!(feeds[2].title, SYNCED_FEED_TITLE);

        let articles = store.articles();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].feed_id, feeds[2].id);
        assert_eq!(articles[0].title, "Entry 1");
        assert!(!articles[0].read);
    }

    #[tokio::test]
    async fn test_second_sync_is_idempotent() {
        let server = MockServer::start().await;
        mock_remote(
            &server,
            remote_feeds(),
            entries(vec![entry(1, "https://example.com/entry1")]),
        )
        .await;

        let store = MemoryStore::default();
        let svc = service(&server, store.clone(), SyncOptions::default());
        svc.sync(&CancellationToken::new()).await.unwrap();
        let second = svc.sync(&CancellationToken::new()).await.unwrap();

        assert_eq!(second.feeds_mirrored, 0);
        assert!(!second.synced_feed_created);
        assert_eq!(second.articles_added, 0);
        assert_eq!(second.duplicates_skipped, 1);
        assert_eq!(store.feeds().len(), 3);
        assert_eq!(store.articles().len(), 1);
        // Nothing staged, so no write
        assert_eq!(store.state.lock().unwrap().save_calls, 1);
    }

    #[tokio::test]
    async fn test_synced_feed_stays_unique_across_passes() {
        let server = MockServer::start().await;
        mock_remote(&server, json!([]), entries(vec![])).await;

        let store = MemoryStore::default();
        let svc = service(&server, store.clone(), SyncOptions::default());
        for _ in 0..4 {
            svc.sync(&CancellationToken::new()).await.unwrap();
        }
        assert_eq!(synced_feeds(&store).len(), 1);
    }

    #[tokio::test]
    async fn test_existing_synced_feed_is_reused() {
        let server = MockServer::start().await;
        mock_remote(
            &server,
            json!([]),
            entries(vec![entry(1, "https://example.com/entry1")]),
        )
        .await;

        let store = MemoryStore::with_feeds(&[SYNCED_FEED_URL]);
        let svc = service(&server, store.clone(), SyncOptions::default());
        let report = svc.sync(&CancellationToken::new()).await.unwrap();

        assert!(!report.synced_feed_created);
        assert_eq!(store.articles()[0].feed_id, 1);
    }

    // ========================================================================
    // Feed mirroring
    // ========================================================================

    #[tokio::test]
    async fn test_existing_feeds_are_not_duplicated() {
        let server = MockServer::start().await;
        mock_remote(&server, remote_feeds(), entries(vec![])).await;

        let store = MemoryStore::with_feeds(&["https://example.com/feed1.xml"]);
        let svc = service(&server, store.clone(), SyncOptions::default());
        let report = svc.sync(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.feeds_mirrored, 1);
        let urls: Vec<String> = store.feeds().into_iter().map(|f| f.url).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/feed1.xml",
                "https://example.com/feed2.xml",
                SYNCED_FEED_URL,
            ]
        );
    }

    #[tokio::test]
    async fn test_duplicate_and_reserved_remote_feeds_skipped() {
        let server = MockServer::start().await;
        let feeds = json!([
            {"id": 1, "title": "A", "feed_url": "https://example.com/a.xml"},
            {"id": 2, "title": "A again", "feed_url": "https://EXAMPLE.com/a.xml#frag"},
            {"id": 3, "title": "Sneaky", "feed_url": "miniflux://synced"},
            {"id": 4, "title": "No URL", "feed_url": "   "}
        ]);
        mock_remote(&server, feeds, entries(vec![])).await;

        let store = MemoryStore::default();
        let svc = service(&server, store.clone(), SyncOptions::default());
        let report = svc.sync(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.feeds_mirrored, 1);
        assert_eq!(synced_feeds(&store).len(), 1);
        assert_eq!(synced_feeds(&store)[0].title, SYNCED_FEED_TITLE);
        assert_eq!(store.feeds().len(), 2);
    }

    #[tokio::test]
    async fn test_mirrored_feed_keeps_remote_url() {
        let server = MockServer::start().await;
        let feeds = json!([
            {"id": 1, "title": "Mixed case", "feed_url": "  https://Example.com/Feed.xml  "}
        ]);
        mock_remote(&server, feeds, entries(vec![])).await;

        let store = MemoryStore::default();
        let svc = service(&server, store.clone(), SyncOptions::default());
        svc.sync(&CancellationToken::new()).await.unwrap();
        let second = svc.sync(&CancellationToken::new()).await.unwrap();

        assert_eq!(store.feeds()[0].url, "https://Example.com/Feed.xml");
        assert_eq!(second.feeds_mirrored, 0);
        assert_eq!(store.feeds().len(), 2);
    }

    // ========================================================================
    // Entry deduplication
    // ========================================================================

    #[tokio::test]
    async fn test_duplicate_urls_within_listing_stored_once() {
        let server = MockServer::start().await;
        mock_remote(
            &server,
            json!([]),
            entries(vec![
                entry(1, "https://example.com/same"),
                entry(2, "https://example.com/same#comments"),
                entry(3, "https://example.com/other"),
            ]),
        )
        .await;

        let store = MemoryStore::default();
        let svc = service(&server, store.clone(), SyncOptions::default());
        let report = svc.sync(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.articles_added, 2);
        assert_eq!(report.duplicates_skipped, 1);
        let articles = store.articles();
        assert_eq!(articles.len(), 2);
        // First occurrence wins
        assert_eq!(articles[0].title, "Entry 1");
    }

    #[tokio::test]
    async fn test_url_stored_under_other_feed_is_skipped() {
        let server = MockServer::start().await;
        mock_remote(
            &server,
            json!([]),
            entries(vec![entry(1, "https://example.com/already")]),
        )
        .await;

        let store = MemoryStore::with_feeds(&["https://example.com/feed.xml"]);
        store.set(|s| {
            s.articles.push(Article {
                id: 1,
                feed_id: 1,
                title: "Already here".to_string(),
                url: "https://example.com/already".to_string(),
                content: String::new(),
                published: 0,
                read: true,
                starred: false,
                hidden: true,
                fetched_at: 0,
            })
        });

        let svc = service(&server, store.clone(), SyncOptions::default());
        let report = svc.sync(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.duplicates_skipped, 1);
        assert_eq!(report.articles_added, 0);
        assert_eq!(store.articles().len(), 1);
    }

    #[tokio::test]
    async fn test_entries_without_url_are_skipped() {
        let server = MockServer::start().await;
        mock_remote(
            &server,
            json!([]),
            entries(vec![entry(1, ""), entry(2, "https://example.com/ok")]),
        )
        .await;

        let store = MemoryStore::default();
        let svc = service(&server, store.clone(), SyncOptions::default());
        let report = svc.sync(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.invalid_skipped, 1);
        assert_eq!(report.articles_added, 1);
    }

    #[tokio::test]
    async fn test_read_and_starred_flags_carried() {
        let server = MockServer::start().await;
        let mut read_entry = entry(1, "https://example.com/read");
        read_entry["status"] = json!("read");
        let mut starred_entry = entry(2, "https://example.com/starred");
        starred_entry["starred"] = json!(true);
        mock_remote(&server, json!([]), entries(vec![read_entry, starred_entry])).await;

        let store = MemoryStore::default();
        let svc = service(&server, store.clone(), SyncOptions::default());
        svc.sync(&CancellationToken::new()).await.unwrap();

        let articles = store.articles();
        assert!(articles[0].read);
        assert!(!articles[0].starred);
        assert!(!articles[1].read);
        assert!(articles[1].starred);
    }

    #[tokio::test]
    async fn test_existing_urls_paged_across_store() {
        let server = MockServer::start().await;
        let target = format!("https://example.com/article/{}", EXISTING_URL_PAGE_SIZE + 5);
        mock_remote(&server, json!([]), entries(vec![entry(1, &target)])).await;

        let store = MemoryStore::with_feeds(&["https://example.com/feed.xml"]);
        let seeded: Vec<NewArticle> = (0..EXISTING_URL_PAGE_SIZE + 10)
            .map(|n| NewArticle {
                feed_id: 1,
                title: String::new(),
                url: format!("https://example.com/article/{}", n),
                content: String::new(),
                published: n,
                read: false,
                starred: false,
            })
            .collect();
        store.save_articles(&seeded).await.unwrap();

        let svc = service(&server, store.clone(), SyncOptions::default());
        let report = svc.sync(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.duplicates_skipped, 1);
        assert_eq!(report.articles_added, 0);
    }

    #[tokio::test]
    async fn test_entry_limit_sent_to_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/feeds"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/entries"))
            .and(query_param("limit", "25"))
            .respond_with(ResponseTemplate::new(200).set_body_json(entries(vec![])))
            .expect(1)
            .mount(&server)
            .await;

        let options = SyncOptions {
            entry_limit: 25,
            ..SyncOptions::default()
        };
        let svc = service(&server, MemoryStore::default(), options);
        svc.sync(&CancellationToken::new()).await.unwrap();
    }

    // ========================================================================
    // Failures
    // ========================================================================

    #[tokio::test]
    async fn test_remote_feed_failure_leaves_store_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/feeds"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let store = MemoryStore::default();
        let svc = service(&server, store.clone(), SyncOptions::default());
        let result = svc.sync(&CancellationToken::new()).await;

        assert!(matches!(
            result,
            Err(SyncError::Remote(miniflux::MinifluxError::RequestFailed { status: 500 }))
        ));
        assert!(store.feeds().is_empty());
        assert!(store.articles().is_empty());
    }

    #[tokio::test]
    async fn test_entries_failure_keeps_mirrored_feeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/feeds"))
            .respond_with(ResponseTemplate::new(200).set_body_json(remote_feeds()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/entries"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let store = MemoryStore::default();
        let svc = service(&server, store.clone(), SyncOptions::default());
        let result = svc.sync(&CancellationToken::new()).await;

        assert!(matches!(result, Err(SyncError::Remote(_))));
        assert_eq!(store.feeds().len(), 3);
        assert!(store.articles().is_empty());
    }

    #[tokio::test]
    async fn test_store_failures_abort_pass() {
        let server = MockServer::start().await;
        mock_remote(&server, remote_feeds(), entries(vec![])).await;

        let store = MemoryStore::default();
        store.set(|s| s.fail_get_feeds = true);
        let svc = service(&server, store.clone(), SyncOptions::default());
        assert!(matches!(
            svc.sync(&CancellationToken::new()).await,
            Err(SyncError::LocalStore(_))
        ));

        store.set(|s| {
            s.fail_get_feeds = false;
            s.fail_add_feed = true;
        });
        assert!(matches!(
            svc.sync(&CancellationToken::new()).await,
            Err(SyncError::LocalStore(_))
        ));
        assert!(store.feeds().is_empty());
    }

    #[tokio::test]
    async fn test_save_failure_then_retry_succeeds() {
        let server = MockServer::start().await;
        mock_remote(
            &server,
            json!([]),
            entries(vec![entry(1, "https://example.com/entry1")]),
        )
        .await;

        let store = MemoryStore::default();
        store.set(|s| s.fail_save = true);
        let svc = service(&server, store.clone(), SyncOptions::default());

        let result = svc.sync(&CancellationToken::new()).await;
        assert!(matches!(result, Err(SyncError::LocalStore(_))));
        assert!(store.articles().is_empty());

        store.set(|s| s.fail_save = false);
        let report = svc.sync(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.articles_added, 1);
        assert_eq!(synced_feeds(&store).len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_pass_writes_nothing() {
        let server = MockServer::start().await;
        mock_remote(
            &server,
            remote_feeds(),
            entries(vec![entry(1, "https://example.com/entry1")]),
        )
        .await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        let store = MemoryStore::default();
        let svc = service(&server, store.clone(), SyncOptions::default());
        let result = svc.sync(&cancel).await;

        assert!(result.unwrap_err().is_cancelled());
        assert!(store.feeds().is_empty());
        assert_eq!(store.state.lock().unwrap().save_calls, 0);
    }

    /// Cancels the token from inside the stored-URL lookup, after every
    /// remote read of the pass has completed.
    struct CancellingStore {
        inner: MemoryStore,
        cancel: CancellationToken,
    }

    #[async_trait]
    impl LocalStore for CancellingStore {
        async fn get_feeds(&self) -> Result<Vec<Feed>, DatabaseError> {
            self.inner.get_feeds().await
        }

        async fn add_feed(&self, feed: &NewFeed) -> Result<i64, DatabaseError> {
            self.inner.add_feed(feed).await
        }

        async fn save_articles(&self, articles: &[NewArticle]) -> Result<usize, DatabaseError> {
            self.inner.save_articles(articles).await
        }

        async fn get_articles(&self, query: &ArticleQuery) -> Result<Vec<Article>, DatabaseError> {
            self.cancel.cancel();
            self.inner.get_articles(query).await
        }
    }

    #[tokio::test]
    async fn test_cancellation_before_write_saves_nothing() {
        let server = MockServer::start().await;
        mock_remote(
            &server,
            remote_feeds(),
            entries(vec![entry(1, "https://example.com/entry1")]),
        )
        .await;

        let cancel = CancellationToken::new();
        let inner = MemoryStore::default();
        let store = CancellingStore {
            inner: inner.clone(),
            cancel: cancel.clone(),
        };
        let client = Client::new(reqwest::Client::new(), &server.uri(), "test-key");
        let svc = SyncService::new(client, store, SyncOptions::default());

        let result = svc.sync(&cancel).await;

        assert!(matches!(result, Err(SyncError::Cancelled)));
        assert!(inner.articles().is_empty());
        assert_eq!(inner.state.lock().unwrap().save_calls, 0);
        // Feed mirroring committed before the token fired
        assert_eq!(inner.feeds().len(), 3);
    }

    // ========================================================================
    // Remote mark-read policy
    // ========================================================================

    #[tokio::test]
    async fn test_mark_remote_read_sends_represented_ids() {
        let server = MockServer::start().await;
        mock_remote(
            &server,
            json!([]),
            entries(vec![
                entry(10, "https://example.com/a"),
                entry(11, ""),
                entry(12, "https://example.com/a"),
                entry(13, "https://example.com/b"),
            ]),
        )
        .await;
        Mock::given(method("PUT"))
            .and(path("/v1/entries"))
            .and(body_json(json!({"entry_ids": [10, 12, 13], "status": "read"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let options = SyncOptions {
            mark_remote_read: true,
            ..SyncOptions::default()
        };
        let svc = service(&server, MemoryStore::default(), options);
        let report = svc.sync(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.entries_marked_read, 3);
        assert_eq!(report.invalid_skipped, 1);
    }

    #[tokio::test]
    async fn test_mark_remote_read_disabled_by_default() {
        let server = MockServer::start().await;
        mock_remote(
            &server,
            json!([]),
            entries(vec![entry(1, "https://example.com/a")]),
        )
        .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let svc = service(&server, MemoryStore::default(), SyncOptions::default());
        let report = svc.sync(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.entries_marked_read, 0);
    }

    #[tokio::test]
    async fn test_mark_remote_read_skipped_when_nothing_fetched() {
        let server = MockServer::start().await;
        mock_remote(&server, json!([]), entries(vec![])).await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let options = SyncOptions {
            mark_remote_read: true,
            ..SyncOptions::default()
        };
        let svc = service(&server, MemoryStore::default(), options);
        svc.sync(&CancellationToken::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_mark_remote_read_failure_keeps_local_writes() {
        let server = MockServer::start().await;
        mock_remote(
            &server,
            json!([]),
            entries(vec![entry(1, "https://example.com/a")]),
        )
        .await;
        Mock::given(method("PUT"))
            .and(path("/v1/entries"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let options = SyncOptions {
            mark_remote_read: true,
            ..SyncOptions::default()
        };
        let store = MemoryStore::default();
        let svc = service(&server, store.clone(), options);
        let result = svc.sync(&CancellationToken::new()).await;

        assert!(matches!(
            result,
            Err(SyncError::Remote(miniflux::MinifluxError::RequestFailed { status: 500 }))
        ));
        assert_eq!(store.articles().len(), 1);
    }
}
