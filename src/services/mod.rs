// src/services/mod.rs

pub mod articles;
pub mod category_cache;
pub mod normalizer;

pub use articles::{ArticleService, HomeFeed, QueryOutcome};
pub use category_cache::{CacheState, CategoryCache, Clock, ManualClock, Snapshot, SystemClock};
