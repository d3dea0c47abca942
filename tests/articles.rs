//! Query functions driven over the in-process row store.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ditorja::backend::MemoryBackend;
use ditorja::services::{HomeFeed, ManualClock};
use ditorja::{Article, ArticleService, ArticleStatus, CategoryCache, Config, QueryOutcome};
use serde_json::json;

const TABLE: &str = "ditorja_frontend";

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/articles.json")
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.cache.retry_delay_ms = 0;
    config
}

struct Harness {
    backend: Arc<MemoryBackend>,
    clock: Arc<ManualClock>,
    service: ArticleService,
}

impl Harness {
    async fn from_fixture() -> Self {
        let backend = MemoryBackend::from_json_file(TABLE, fixture_path())
            .await
            .unwrap();
        Self::new(backend)
    }

    fn with_rows(rows: Vec<serde_json::Value>) -> Self {
        Self::new(MemoryBackend::with_rows(TABLE, rows))
    }

    fn new(backend: MemoryBackend) -> Self {
        let config = test_config();
        let backend = Arc::new(backend);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = Arc::new(CategoryCache::with_clock(
            backend.clone(),
            TABLE,
            config.cache.clone(),
            clock.clone(),
        ));
        let service = ArticleService::new(backend.clone(), cache, &config);
        Self {
            backend,
            clock,
            service,
        }
    }

    fn queries(&self) -> usize {
        self.backend.query_count()
    }
}

fn ids(articles: &[Article]) -> Vec<&str> {
    articles.iter().map(|a| a.id.as_str()).collect()
}

#[tokio::test]
async fn test_feed_is_newest_first_and_normalized() {
    let h = Harness::from_fixture().await;

    let feed = h.service.list_all().await.into_vec();
    assert_eq!(ids(&feed), vec!["5", "3", "2", "1", "4"]);

    let legacy = &feed[4];
    assert_eq!(legacy.status, ArticleStatus::Normal);
    assert_eq!(legacy.title_slug, "lajm-i-vjeter-pa-etiketa");
    assert_eq!(legacy.category_slug, "sport");
    assert!(legacy.hashtags.is_empty());
    assert!(legacy.created_at.is_some());

    let unmapped = &feed[0];
    assert_eq!(unmapped.category_slug, "bote-shqiptare");
    assert_eq!(unmapped.title_slug, "zgjedhjet-ne-evrope");
    assert_eq!(unmapped.status, ArticleStatus::Normal);
}

#[tokio::test]
async fn test_get_by_slug_miss_issues_one_query() {
    let h = Harness::from_fixture().await;

    let outcome = h.service.get_by_slug("non-existent-slug").await;
    assert_eq!(outcome, QueryOutcome::Empty);
    assert_eq!(outcome.into_option(), None);
    assert_eq!(h.queries(), 1);
}

#[tokio::test]
async fn test_get_by_id_splits_hashtag_text() {
    let h = Harness::from_fixture().await;

    let article = h.service.get_by_id("2").await.into_option().unwrap();
    assert_eq!(article.title, "Kuvendi miraton buxhetin");
    assert_eq!(article.hashtags, vec!["kuvendi", "buxheti"]);
    assert_eq!(article.status, ArticleStatus::Editors);
    // stored category slug present, so the mapping cache is never consulted
    assert_eq!(h.queries(), 1);
    assert!(h.service.cache().snapshot().is_none());
}

#[tokio::test]
async fn test_get_by_slug_keeps_optional_fields() {
    let h = Harness::from_fixture().await;

    let article = h
        .service
        .get_by_slug("femijet-ne-shkolle")
        .await
        .into_option()
        .unwrap();
    assert_eq!(article.author.as_deref(), Some("Redaksia"));
    assert!(article.large.is_some());
    assert_eq!(
        article.image.as_deref(),
        Some("https://cdn.ditorja.al/img/shkolla.jpg")
    );
}

#[tokio::test]
async fn test_search_matches_diacritics() {
    let h = Harness::from_fixture().await;

    let results = h.service.search("fëmijë").await.into_vec();
    assert_eq!(ids(&results), vec!["1"]);

    let results = h.service.search("  KUVENDI ").await.into_vec();
    assert_eq!(ids(&results), vec!["2"]);
}

#[tokio::test]
async fn test_blank_search_issues_no_query() {
    let h = Harness::from_fixture().await;

    assert!(h.service.search("   ").await.is_empty());
    assert_eq!(h.queries(), 0);
}

#[tokio::test]
async fn test_related_shares_a_hashtag_and_excludes_source() {
    let h = Harness::from_fixture().await;
    let source = h.service.get_by_id("1").await.into_option().unwrap();

    let related = h.service.related(&source, None).await.into_vec();
    assert_eq!(ids(&related), vec!["3"]);

    let source = h.service.get_by_id("5").await.into_option().unwrap();
    let related = h.service.related(&source, Some(1)).await.into_vec();
    assert_eq!(ids(&related), vec!["2"]);
}

#[tokio::test]
async fn test_related_without_hashtags_short_circuits() {
    let h = Harness::from_fixture().await;
    let source = h.service.get_by_id("4").await.into_option().unwrap();
    assert!(source.hashtags.is_empty());
    let before = h.queries();

    assert!(h.service.related(&source, None).await.is_empty());
    assert_eq!(h.queries(), before);
}

#[tokio::test]
async fn test_list_by_category_uses_slug() {
    let h = Harness::from_fixture().await;

    let sport = h.service.list_by_category("SPORT").await.into_vec();
    assert_eq!(ids(&sport), vec!["3"]);

    let politics = h.service.list_by_category("politike").await.into_vec();
    assert_eq!(ids(&politics), vec!["2"]);

    let before = h.queries();
    assert!(h.service.list_by_category(" ").await.is_empty());
    assert_eq!(h.queries(), before);
}

#[tokio::test]
async fn test_categories_are_deduplicated() {
    let h = Harness::with_rows(vec![
        json!({ "id": 1, "article_category": "Sport", "category_slug": "sport" }),
        json!({ "id": 2, "article_category": "Sport", "category_slug": "sport" }),
        json!({ "id": 3, "article_category": "Politikë", "category_slug": "politike" }),
    ]);

    let categories = h.service.list_categories().await.into_vec();
    assert_eq!(categories.len(), 2);
    assert_eq!(categories[0].display_name, "Politikë");
    assert_eq!(categories[1].display_name, "Sport");
    assert_eq!(categories[1].slug, "sport");
    assert_eq!(h.queries(), 1);
}

#[tokio::test]
async fn test_categories_fill_missing_slugs() {
    let h = Harness::from_fixture().await;

    let categories = h.service.list_categories().await.into_vec();
    let pairs: Vec<_> = categories
        .iter()
        .map(|c| (c.display_name.as_str(), c.slug.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("Arsim", "arsim"),
            ("Botë Shqiptare", "bote-shqiptare"),
            ("Politikë", "politike"),
            ("Sport", "sport"),
        ]
    );
}

#[tokio::test]
async fn test_mapping_cache_refreshes_after_ttl() {
    let h = Harness::from_fixture().await;

    // feed contains rows without a stored slug: select + mapping load
    h.service.list_all().await;
    assert_eq!(h.queries(), 2);

    h.clock.advance(Duration::from_secs(299));
    h.service.list_all().await;
    assert_eq!(h.queries(), 3);

    h.clock.advance(Duration::from_secs(1));
    h.service.list_all().await;
    assert_eq!(h.queries(), 5);
    assert_eq!(h.service.cache().refresh_cycles(), 2);
}

#[tokio::test]
async fn test_backend_failure_is_reported() {
    let h = Harness::from_fixture().await;
    h.backend.set_failure(Some("connection reset"));

    let feed = h.service.list_all().await;
    assert!(feed.is_failed());
    assert!(feed.into_vec().is_empty());

    let single = h.service.get_by_slug("femijet-ne-shkolle").await;
    assert!(single.is_failed());
    assert_eq!(single.into_option(), None);

    assert!(h.service.list_categories().await.is_failed());
    assert!(h.service.count_all().await.is_failed());
    assert!(matches!(
        h.service.search("sport").await,
        QueryOutcome::Failed(reason) if reason.contains("connection reset")
    ));
}

#[tokio::test]
async fn test_counts() {
    let h = Harness::from_fixture().await;

    assert_eq!(h.service.count_all().await, QueryOutcome::Found(5));
    assert_eq!(h.service.count_by_category("sport").await, QueryOutcome::Found(1));
    assert_eq!(h.service.count_by_category("kultura").await, QueryOutcome::Found(0));
}

#[tokio::test]
async fn test_home_feed_and_status_buckets() {
    let h = Harness::from_fixture().await;

    let HomeFeed {
        featured,
        editors_picks,
        latest,
    } = h.service.home_feed().await.into_option().unwrap();
    assert_eq!(featured.map(|a| a.id), Some("1".to_string()));
    assert_eq!(ids(&editors_picks), vec!["2"]);
    assert_eq!(ids(&latest), vec!["5", "3", "4"]);

    let featured = h
        .service
        .list_by_status(ArticleStatus::Featured, 10)
        .await
        .into_vec();
    assert_eq!(ids(&featured), vec!["1"]);
}

#[tokio::test]
async fn test_category_display_name() {
    let h = Harness::from_fixture().await;

    assert_eq!(
        h.service.category_display_name("bote-shqiptare").await,
        "Botë Shqiptare"
    );
    assert_eq!(
        h.service.category_display_name("kultura-pop").await,
        "Kultura Pop"
    );
}

#[tokio::test]
async fn test_empty_store_yields_empty_outcomes() {
    let h = Harness::with_rows(Vec::new());

    assert!(h.service.list_all().await.is_empty());
    assert!(h.service.list_categories().await.is_empty());
    assert!(h.service.get_by_id("1").await.is_empty());
    assert_eq!(h.service.count_all().await, QueryOutcome::Found(0));
}
