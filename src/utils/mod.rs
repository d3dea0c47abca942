//! Utility functions and helpers.

pub mod http;
pub mod slug;

pub use slug::{humanize_slug, normalize_search_text, slugify};
