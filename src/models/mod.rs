// src/models/mod.rs

//! Domain models for the retrieval layer.
//!
//! Raw backend rows, the canonical article record produced from them and
//! the configuration structures that drive the services.

mod article;
mod category;
mod config;

// Re-export all public types
pub use article::{Article, ArticleStatus, Hashtags, RawArticleRow};
pub(crate) use article::parse_timestamp;
pub use category::Category;
pub use config::{BackendConfig, CacheConfig, Config, QueryConfig};
