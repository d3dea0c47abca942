// src/services/articles.rs

//! Article query service.
//!
//! The public retrieval API. Each function issues its backend query, runs
//! the returned rows through the normalizer and reports the result as a
//! [`QueryOutcome`]. Backend failures are logged and never propagated.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::backend::{ArticleBackend, Direction, PostgrestBackend, Query, contains_pattern};
use crate::error::Result;
use crate::models::{Article, ArticleStatus, Category, Config, QueryConfig};
use crate::services::category_cache::{CategoryCache, Snapshot};
use crate::services::normalizer::{normalize_value, resolve_category_slug};
use crate::utils::slug::normalize_search_text;

/// Columns matched by free-text search.
const SEARCH_COLUMNS: [&str; 3] = ["article_title", "article_short", "article_medium"];

/// Result of a query function.
///
/// Distinguishes "nothing matched" from "the backend failed"; use
/// [`QueryOutcome::into_vec`] or [`QueryOutcome::into_option`] where that
/// distinction does not matter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome<T> {
    /// The query succeeded with data
    Found(T),
    /// The query succeeded with no matching rows
    Empty,
    /// The backend failed; the reason is also logged
    Failed(String),
}

impl<T> QueryOutcome<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, QueryOutcome::Found(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, QueryOutcome::Empty)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, QueryOutcome::Failed(_))
    }

    /// The data, with `Empty` and `Failed` both collapsed to `None`.
    pub fn into_option(self) -> Option<T> {
        match self {
            QueryOutcome::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryOutcome<U> {
        match self {
            QueryOutcome::Found(value) => QueryOutcome::Found(f(value)),
            QueryOutcome::Empty => QueryOutcome::Empty,
            QueryOutcome::Failed(reason) => QueryOutcome::Failed(reason),
        }
    }
}

impl<T> QueryOutcome<Vec<T>> {
    /// `Found` for a non-empty list, `Empty` otherwise.
    pub fn from_items(items: Vec<T>) -> Self {
        if items.is_empty() {
            QueryOutcome::Empty
        } else {
            QueryOutcome::Found(items)
        }
    }

    /// The items, with `Empty` and `Failed` both collapsed to `[]`.
    pub fn into_vec(self) -> Vec<T> {
        self.into_option().unwrap_or_default()
    }
}

/// Homepage feed split into placement buckets.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct HomeFeed {
    pub featured: Option<Article>,
    pub editors_picks: Vec<Article>,
    pub latest: Vec<Article>,
}

impl HomeFeed {
    /// Partition a newest-first feed.
    ///
    /// The first `featured` article leads, or the newest article when none
    /// is marked. Remaining `editors` articles become picks and the rest
    /// stay in the latest list, order preserved.
    pub fn partition(mut articles: Vec<Article>) -> Self {
        let lead = articles
            .iter()
            .position(|a| a.status == ArticleStatus::Featured)
            .or(if articles.is_empty() { None } else { Some(0) });
        let featured = lead.map(|index| articles.remove(index));

        let (editors_picks, latest) = articles
            .into_iter()
            .partition(|a| a.status == ArticleStatus::Editors);

        Self {
            featured,
            editors_picks,
            latest,
        }
    }
}

/// Retrieval API over the article table.
pub struct ArticleService {
    backend: Arc<dyn ArticleBackend>,
    cache: Arc<CategoryCache>,
    table: String,
    limits: QueryConfig,
}

impl ArticleService {
    /// Create a service over an existing backend and cache.
    pub fn new(
        backend: Arc<dyn ArticleBackend>,
        cache: Arc<CategoryCache>,
        config: &Config,
    ) -> Self {
        Self {
            backend,
            cache,
            table: config.backend.table.clone(),
            limits: config.queries.clone(),
        }
    }

    /// Create a service talking to the hosted store described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let backend: Arc<dyn ArticleBackend> = Arc::new(PostgrestBackend::new(&config.backend)?);
        Ok(Self::with_backend(backend, config))
    }

    /// Create a service and its category cache over `backend`.
    pub fn with_backend(backend: Arc<dyn ArticleBackend>, config: &Config) -> Self {
        let cache = Arc::new(CategoryCache::new(
            Arc::clone(&backend),
            config.backend.table.clone(),
            config.cache.clone(),
        ));
        Self::new(backend, cache, config)
    }

    pub fn cache(&self) -> &Arc<CategoryCache> {
        &self.cache
    }

    fn query(&self) -> Query {
        Query::table(&self.table)
    }

    /// Newest articles for the homepage feed.
    pub async fn list_all(&self) -> QueryOutcome<Vec<Article>> {
        let query = self
            .query()
            .order("created_at", Direction::Descending)
            .limit(self.limits.feed_limit);
        self.fetch_many("articles", &query).await
    }

    /// Article with the given id.
    pub async fn get_by_id(&self, id: &str) -> QueryOutcome<Article> {
        let query = self.query().eq("id", id.trim()).limit(1);
        self.fetch_one(&format!("article with id '{id}'"), &query).await
    }

    /// Article with the given title slug.
    pub async fn get_by_slug(&self, slug: &str) -> QueryOutcome<Article> {
        let query = self.query().eq("title_slug", slug.trim()).limit(1);
        self.fetch_one(&format!("article with slug '{slug}'"), &query)
            .await
    }

    /// Articles whose category slug contains `category_slug`, newest first.
    pub async fn list_by_category(&self, category_slug: &str) -> QueryOutcome<Vec<Article>> {
        let slug = category_slug.trim().to_lowercase();
        if slug.is_empty() {
            return QueryOutcome::Empty;
        }
        log::info!("Searching for articles with category: {}", slug);

        let query = self
            .query()
            .ilike("category_slug", contains_pattern(&slug))
            .order("created_at", Direction::Descending);
        let outcome = self
            .fetch_many(&format!("articles for category '{slug}'"), &query)
            .await;
        if let QueryOutcome::Found(articles) = &outcome {
            log::info!("Found {} articles for category: {}", articles.len(), slug);
        }
        outcome
    }

    /// Articles whose title, teaser or summary contains the query, newest
    /// first.
    ///
    /// The query is matched both as typed and folded (lowercase, no
    /// diacritics), so "fëmijë" finds "Fëmijët" as well as text stored
    /// without diacritics.
    pub async fn search(&self, text: &str) -> QueryOutcome<Vec<Article>> {
        let terms = search_terms(text);
        if terms.is_empty() {
            return QueryOutcome::Empty;
        }

        let alternatives = terms
            .iter()
            .flat_map(|term| {
                SEARCH_COLUMNS
                    .iter()
                    .map(move |column| (column.to_string(), contains_pattern(term)))
            })
            .collect();
        let query = self
            .query()
            .any_ilike(alternatives)
            .order("created_at", Direction::Descending);
        self.fetch_many(&format!("search results for '{}'", text.trim()), &query)
            .await
    }

    /// Other articles sharing at least one hashtag with `article`.
    ///
    /// Returns `Empty` without querying when the article has no hashtags.
    pub async fn related(&self, article: &Article, limit: Option<usize>) -> QueryOutcome<Vec<Article>> {
        let tags = article.match_tags();
        if tags.is_empty() {
            return QueryOutcome::Empty;
        }

        let alternatives = tags
            .iter()
            .map(|tag| ("article_hashtag".to_string(), contains_pattern(tag)))
            .collect();
        let query = self
            .query()
            .neq("id", &article.id)
            .any_ilike(alternatives)
            .order("created_at", Direction::Descending)
            .limit(limit.unwrap_or(self.limits.related_limit));
        self.fetch_many(&format!("related articles for '{}'", article.id), &query)
            .await
    }

    /// Distinct categories ordered by display name.
    pub async fn list_categories(&self) -> QueryOutcome<Vec<Category>> {
        let query = self
            .query()
            .select(&["article_category", "category_slug"])
            .not_null("article_category")
            .order("article_category", Direction::Ascending)
            .limit(self.limits.categories_limit);

        let rows = match self.backend.select(&query).await {
            Ok(rows) => rows,
            Err(e) => {
                log::error!("Error fetching categories: {}", e);
                return QueryOutcome::Failed(e.to_string());
            }
        };

        let mut seen = HashSet::new();
        let unique: Vec<(&str, Option<&str>)> = rows
            .iter()
            .filter_map(|row| {
                let name = row.get("article_category")?.as_str()?.trim();
                let slug = row.get("category_slug").and_then(Value::as_str);
                (!name.is_empty() && seen.insert(name)).then_some((name, slug))
            })
            .collect();

        let mappings = if unique.iter().any(|(_, slug)| slug.is_none_or(|s| s.trim().is_empty())) {
            self.cache.ensure_fresh().await
        } else {
            None
        };

        QueryOutcome::from_items(
            unique
                .into_iter()
                .map(|(name, slug)| {
                    Category::new(resolve_category_slug(slug, name, mappings.as_deref()), name)
                })
                .collect(),
        )
    }

    /// Newest articles stored with the given status.
    ///
    /// Rows without a status are not returned even for `normal`; use
    /// [`ArticleService::home_feed`] for a bucket view that includes them.
    pub async fn list_by_status(&self, status: ArticleStatus, limit: usize) -> QueryOutcome<Vec<Article>> {
        let query = self
            .query()
            .eq("status", status.as_str())
            .order("created_at", Direction::Descending)
            .limit(limit);
        self.fetch_many(&format!("{status} articles"), &query).await
    }

    /// The homepage feed partitioned into placement buckets.
    pub async fn home_feed(&self) -> QueryOutcome<HomeFeed> {
        match self.list_all().await {
            QueryOutcome::Found(articles) => QueryOutcome::Found(HomeFeed::partition(articles)),
            QueryOutcome::Empty => QueryOutcome::Empty,
            QueryOutcome::Failed(reason) => QueryOutcome::Failed(reason),
        }
    }

    /// Total number of articles.
    pub async fn count_all(&self) -> QueryOutcome<u64> {
        self.count("articles", &self.query()).await
    }

    /// Number of articles whose category slug contains `category_slug`.
    pub async fn count_by_category(&self, category_slug: &str) -> QueryOutcome<u64> {
        let slug = category_slug.trim().to_lowercase();
        let query = self
            .query()
            .ilike("category_slug", contains_pattern(&slug));
        self.count(&format!("articles for category '{slug}'"), &query)
            .await
    }

    /// Display name for a category slug (cached, else humanized).
    pub async fn category_display_name(&self, slug: &str) -> String {
        self.cache.category_display_name(slug).await
    }

    async fn count(&self, what: &str, query: &Query) -> QueryOutcome<u64> {
        match self.backend.count(query).await {
            Ok(total) => QueryOutcome::Found(total),
            Err(e) => {
                log::error!("Error counting {}: {}", what, e);
                QueryOutcome::Failed(e.to_string())
            }
        }
    }

    async fn fetch_many(&self, what: &str, query: &Query) -> QueryOutcome<Vec<Article>> {
        match self.backend.select(query).await {
            Ok(rows) => QueryOutcome::from_items(self.normalize_rows(&rows).await),
            Err(e) => {
                log::error!("Error fetching {}: {}", what, e);
                QueryOutcome::Failed(e.to_string())
            }
        }
    }

    async fn fetch_one(&self, what: &str, query: &Query) -> QueryOutcome<Article> {
        match self.backend.select(query).await {
            Ok(rows) if rows.is_empty() => {
                log::error!("Error fetching {}: no matching row", what);
                QueryOutcome::Empty
            }
            Ok(rows) => {
                let mut articles = self.normalize_rows(&rows[..1]).await;
                articles.pop().map_or(QueryOutcome::Empty, QueryOutcome::Found)
            }
            Err(e) => {
                log::error!("Error fetching {}: {}", what, e);
                QueryOutcome::Failed(e.to_string())
            }
        }
    }

    /// Normalize a batch against one mapping snapshot. The cache is only
    /// consulted when some row lacks a stored category slug.
    async fn normalize_rows(&self, rows: &[Value]) -> Vec<Article> {
        let mappings = if rows.iter().any(needs_category_lookup) {
            self.cache.ensure_fresh().await
        } else {
            None
        };
        let snapshot: Option<&Snapshot> = mappings.as_deref();
        rows.iter().map(|row| normalize_value(row, snapshot)).collect()
    }
}

fn needs_category_lookup(row: &Value) -> bool {
    let has_category = row
        .get("article_category")
        .and_then(Value::as_str)
        .is_some_and(|c| !c.trim().is_empty());
    let has_slug = row
        .get("category_slug")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty());
    has_category && !has_slug
}

/// Distinct search terms: the query as typed (lowercased) and folded.
fn search_terms(text: &str) -> Vec<String> {
    let typed = text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    let folded = normalize_search_text(text);

    let mut terms = Vec::new();
    for term in [folded, typed] {
        if !term.is_empty() && !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(id: &str, status: ArticleStatus) -> Article {
        Article {
            id: id.to_string(),
            title: format!("Article {id}"),
            short: String::new(),
            medium: String::new(),
            large: None,
            image: None,
            category: "Sport".to_string(),
            category_slug: "sport".to_string(),
            hashtags: Vec::new(),
            title_slug: format!("article-{id}"),
            created_at: None,
            status,
            author: None,
        }
    }

    #[test]
    fn test_outcome_collapses() {
        let found: QueryOutcome<Vec<u8>> = QueryOutcome::from_items(vec![1]);
        assert!(found.is_found());
        assert_eq!(found.into_vec(), vec![1]);

        let empty: QueryOutcome<Vec<u8>> = QueryOutcome::from_items(Vec::new());
        assert!(empty.is_empty());

        let failed: QueryOutcome<Vec<u8>> = QueryOutcome::Failed("boom".into());
        assert!(failed.is_failed());
        assert!(failed.into_vec().is_empty());

        let single: QueryOutcome<u8> = QueryOutcome::Empty;
        assert_eq!(single.into_option(), None);
    }

    #[test]
    fn test_search_terms_dedupe() {
        assert_eq!(search_terms("  Fëmijë "), vec!["femije", "fëmijë"]);
        assert_eq!(search_terms("sport"), vec!["sport"]);
        assert!(search_terms("   ").is_empty());
    }

    #[test]
    fn test_needs_category_lookup() {
        use serde_json::json;
        assert!(needs_category_lookup(&json!({ "article_category": "Sport" })));
        assert!(needs_category_lookup(&json!({ "article_category": "Sport", "category_slug": "" })));
        assert!(!needs_category_lookup(&json!({ "article_category": "Sport", "category_slug": "sport" })));
        assert!(!needs_category_lookup(&json!({ "id": 1 })));
    }

    #[test]
    fn test_home_feed_prefers_featured() {
        let feed = HomeFeed::partition(vec![
            article("1", ArticleStatus::Normal),
            article("2", ArticleStatus::Editors),
            article("3", ArticleStatus::Featured),
            article("4", ArticleStatus::Normal),
        ]);
        assert_eq!(feed.featured.map(|a| a.id), Some("3".to_string()));
        assert_eq!(
            feed.editors_picks.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(),
            vec!["2"]
        );
        assert_eq!(
            feed.latest.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(),
            vec!["1", "4"]
        );
    }

    #[test]
    fn test_home_feed_falls_back_to_newest() {
        let feed = HomeFeed::partition(vec![
            article("1", ArticleStatus::Normal),
            article("2", ArticleStatus::Normal),
        ]);
        assert_eq!(feed.featured.map(|a| a.id), Some("1".to_string()));
        assert_eq!(feed.latest.len(), 1);

        assert_eq!(HomeFeed::partition(Vec::new()), HomeFeed::default());
    }
}
