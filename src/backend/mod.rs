//! Row store abstractions.
//!
//! The hosted store is reached through [`PostgrestBackend`]. [`MemoryBackend`]
//! evaluates the same [`Query`] values over in-process rows and backs the
//! CLI fixture mode and the test suite.

pub mod memory;
pub mod postgrest;
pub mod query;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

// Re-export for convenience
pub use memory::MemoryBackend;
pub use postgrest::PostgrestBackend;
pub use query::{Direction, Filter, Query, contains_pattern};

/// Trait for queryable row stores.
#[async_trait]
pub trait ArticleBackend: Send + Sync {
    /// Run a filtered, ordered, limited select and return the raw rows.
    async fn select(&self, query: &Query) -> Result<Vec<Value>>;

    /// Count the rows matching the query's filters exactly.
    ///
    /// Ordering and limit are ignored.
    async fn count(&self, query: &Query) -> Result<u64>;
}
