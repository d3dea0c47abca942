// src/services/category_cache.rs

//! Category mapping cache.
//!
//! Translates between category display names and slugs using a snapshot
//! loaded from the article table. The snapshot is replaced wholesale on
//! every successful refresh, so readers never see a partially built list.
//!
//! ## States
//!
//! ```text
//! Empty ──refresh──▶ Populating ──ok──▶ Fresh ──ttl──▶ Stale ──refresh──▶ Populating
//!                        │                                                   │
//!                        └──────── all retries failed: keep old snapshot ◀───┘
//! ```
//!
//! A lookup on an `Empty` or `Stale` cache runs one refresh cycle before
//! answering unless another refresh is already in flight, in which case
//! it answers from the current snapshot (or not at all). After a failed
//! cycle the next synchronous attempt waits a full TTL; the background
//! task keeps ticking independently.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::backend::{ArticleBackend, Direction, Query};
use crate::error::{AppError, Result};
use crate::models::{CacheConfig, Category};
use crate::utils::slug::{humanize_slug, slugify};

/// Rows fetched per request when loading a snapshot. Matches the hosted
/// store's default response cap.
const SNAPSHOT_PAGE_SIZE: usize = 1000;

/// Shortest period of the background refresh task.
const MIN_REFRESH_PERIOD: Duration = Duration::from_secs(1);

/// Source of the current time, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Observable cache state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Empty,
    Populating,
    Fresh,
    Stale,
}

/// An immutable, point-in-time set of category mappings.
#[derive(Debug, Clone)]
pub struct Snapshot {
    categories: Vec<Category>,
    loaded_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(categories: Vec<Category>, loaded_at: DateTime<Utc>) -> Self {
        Self {
            categories,
            loaded_at,
        }
    }

    /// Build a snapshot from `(article_category, category_slug)` rows.
    ///
    /// Stored slugs are assigned first, so a name gets its stored slug
    /// whenever any row carries one. Names never stored with a slug get a
    /// derived one. A display name or slug already taken is skipped so
    /// both stay unique. Entries keep the order in which their names first
    /// appear.
    pub fn from_rows(rows: &[Value], loaded_at: DateTime<Utc>) -> Self {
        let pairs: Vec<(usize, &str, Option<&str>)> = rows
            .iter()
            .enumerate()
            .filter_map(|(index, row)| {
                let name = row
                    .get("article_category")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|n| !n.is_empty())?;
                let slug = row
                    .get("category_slug")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty());
                Some((index, name, slug))
            })
            .collect();

        let mut first_seen = HashMap::new();
        for (index, name, _) in &pairs {
            first_seen.entry(*name).or_insert(*index);
        }

        let mut names = HashSet::new();
        let mut slugs = HashSet::new();
        let mut entries = Vec::new();

        let stored = pairs
            .iter()
            .filter_map(|(_, name, slug)| slug.map(|s| (*name, s.to_string())));
        let derived = pairs
            .iter()
            .filter(|(_, _, slug)| slug.is_none())
            .map(|(_, name, _)| (*name, slugify(name)));

        for (name, slug) in stored.chain(derived) {
            if slug.is_empty() || names.contains(name) || slugs.contains(&slug) {
                continue;
            }
            names.insert(name);
            slugs.insert(slug.clone());
            entries.push((first_seen[name], Category::new(slug, name)));
        }

        entries.sort_by_key(|(index, _)| *index);
        Self::new(entries.into_iter().map(|(_, c)| c).collect(), loaded_at)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Slug for a display name, exact match first, then case-insensitive.
    pub fn slug_for(&self, display_name: &str) -> Option<&str> {
        let name = display_name.trim();
        self.categories
            .iter()
            .find(|c| c.display_name == name)
            .or_else(|| {
                let lower = name.to_lowercase();
                self.categories
                    .iter()
                    .find(|c| c.display_name.to_lowercase() == lower)
            })
            .map(|c| c.slug.as_str())
    }

    /// Display name for a slug.
    pub fn display_name_for(&self, slug: &str) -> Option<&str> {
        let slug = slug.trim().to_lowercase();
        self.categories
            .iter()
            .find(|c| c.slug.to_lowercase() == slug)
            .map(|c| c.display_name.as_str())
    }
}

/// Clears the in-flight flag when a refresh ends, however it ends.
struct RefreshGuard<'a>(&'a AtomicBool);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Process-wide, time-bounded category mapping cache.
pub struct CategoryCache {
    backend: Arc<dyn ArticleBackend>,
    table: String,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    snapshot: ArcSwapOption<Snapshot>,
    refreshing: AtomicBool,
    last_attempt: Mutex<Option<DateTime<Utc>>>,
    refresh_cycles: AtomicU64,
}

impl CategoryCache {
    /// Create an empty cache reading from `table`, on the wall clock.
    pub fn new(backend: Arc<dyn ArticleBackend>, table: impl Into<String>, config: CacheConfig) -> Self {
        Self::with_clock(backend, table, config, Arc::new(SystemClock))
    }

    /// Create an empty cache with an explicit clock.
    pub fn with_clock(
        backend: Arc<dyn ArticleBackend>,
        table: impl Into<String>,
        config: CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            table: table.into(),
            clock,
            config,
            snapshot: ArcSwapOption::empty(),
            refreshing: AtomicBool::new(false),
            last_attempt: Mutex::new(None),
            refresh_cycles: AtomicU64::new(0),
        }
    }

    /// Current state of the cache.
    pub fn state(&self) -> CacheState {
        if self.refreshing.load(Ordering::Acquire) {
            return CacheState::Populating;
        }
        match self.snapshot.load_full() {
            None => CacheState::Empty,
            Some(snapshot) if self.is_expired(snapshot.loaded_at) => CacheState::Stale,
            Some(_) => CacheState::Fresh,
        }
    }

    /// The snapshot currently served, without triggering a refresh.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.load_full()
    }

    /// Number of refresh cycles started so far.
    pub fn refresh_cycles(&self) -> u64 {
        self.refresh_cycles.load(Ordering::Relaxed)
    }

    fn is_expired(&self, since: DateTime<Utc>) -> bool {
        let ttl = chrono::Duration::from_std(self.config.ttl()).unwrap_or(chrono::Duration::MAX);
        self.clock.now() - since >= ttl
    }

    /// Whether a lookup should run a refresh cycle before answering.
    fn needs_refresh(&self) -> bool {
        let outdated = match self.snapshot.load_full() {
            None => true,
            Some(snapshot) => self.is_expired(snapshot.loaded_at),
        };
        if !outdated {
            return false;
        }
        let last_attempt = *self.last_attempt.lock().unwrap_or_else(|e| e.into_inner());
        last_attempt.is_none_or(|at| self.is_expired(at))
    }

    /// Refresh if the snapshot is missing or stale. Failures are logged and
    /// the previous snapshot keeps being served.
    pub async fn ensure_fresh(&self) -> Option<Arc<Snapshot>> {
        if self.needs_refresh() {
            if let Err(e) = self.refresh().await {
                log::warn!("Category cache refresh failed, serving previous snapshot: {}", e);
            }
        }
        self.snapshot()
    }

    /// Run one refresh cycle: up to `max_retries` attempts with a fixed
    /// delay between them.
    ///
    /// Returns `Ok(false)` without touching the backend if another refresh
    /// is already in flight.
    pub async fn refresh(&self) -> Result<bool> {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("Category cache refresh already in flight");
            return Ok(false);
        }
        let _guard = RefreshGuard(&self.refreshing);

        self.refresh_cycles.fetch_add(1, Ordering::Relaxed);
        *self.last_attempt.lock().unwrap_or_else(|e| e.into_inner()) = Some(self.clock.now());

        let attempts = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.fetch_snapshot().await {
                Ok(snapshot) => {
                    log::info!(
                        "Category cache refreshed with {} categories",
                        snapshot.categories.len()
                    );
                    self.snapshot.store(Some(Arc::new(snapshot)));
                    return Ok(true);
                }
                Err(e) => {
                    log::warn!(
                        "Category cache refresh attempt {}/{} failed: {}",
                        attempt,
                        attempts,
                        e
                    );
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_delay()).await;
                    }
                }
            }
        }

        log::error!(
            "Category cache refresh abandoned after {} attempts; keeping previous snapshot",
            attempts
        );
        Err(last_error.unwrap_or_else(|| AppError::query("category refresh made no attempts")))
    }

    /// Load every `(article_category, category_slug)` pair, page by page.
    ///
    /// Pages are ordered by id so they stay disjoint while paging.
    async fn fetch_snapshot(&self) -> Result<Snapshot> {
        let mut rows = Vec::new();
        loop {
            let query = Query::table(&self.table)
                .select(&["article_category", "category_slug"])
                .not_null("article_category")
                .order("id", Direction::Ascending)
                .limit(SNAPSHOT_PAGE_SIZE)
                .offset(rows.len());
            let page = self.backend.select(&query).await?;
            let last = page.len() < SNAPSHOT_PAGE_SIZE;
            rows.extend(page);
            if last {
                break;
            }
        }
        log::debug!("Loaded {} category rows", rows.len());
        Ok(Snapshot::from_rows(&rows, self.clock.now()))
    }

    /// Cached slug for a display name, refreshing first if stale.
    pub async fn slug_for(&self, display_name: &str) -> Option<String> {
        self.ensure_fresh()
            .await
            .and_then(|snapshot| snapshot.slug_for(display_name).map(str::to_string))
    }

    /// Slug for a display name: cached mapping, else derived.
    pub async fn resolve_slug(&self, display_name: &str) -> String {
        match self.slug_for(display_name).await {
            Some(slug) => slug,
            None => slugify(display_name),
        }
    }

    /// Display name for a slug: cached mapping, else the humanized slug.
    pub async fn category_display_name(&self, slug: &str) -> String {
        let cached = self
            .ensure_fresh()
            .await
            .and_then(|snapshot| snapshot.display_name_for(slug).map(str::to_string));
        cached.unwrap_or_else(|| humanize_slug(slug))
    }

    /// Spawn the recurring refresh task.
    ///
    /// The first tick fires immediately, so the cache starts populating as
    /// soon as the runtime schedules the task. The task ends once the cache
    /// is dropped.
    pub fn spawn_refresh_task(self: &Arc<Self>) -> JoinHandle<()> {
        let cache = Arc::downgrade(self);
        let period = self.config.ttl().max(MIN_REFRESH_PERIOD);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(cache) = cache.upgrade() else {
                    log::debug!("Category cache dropped, stopping refresh task");
                    break;
                };
                if let Err(e) = cache.refresh().await {
                    log::warn!("Scheduled category refresh failed: {}", e);
                }
            }
        })
    }
}
