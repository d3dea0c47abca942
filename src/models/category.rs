//! Category mapping entry.

use serde::{Deserialize, Serialize};

/// A category as shown in navigation, paired with its URL slug.
///
/// The same shape is used for the entries held by the category mapping
/// cache, where both fields are unique within a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    /// URL path segment (e.g., "bote-shqiptare")
    pub slug: String,

    /// Human-readable name (e.g., "Botë Shqiptare")
    pub display_name: String,
}

impl Category {
    pub fn new(slug: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            display_name: display_name.into(),
        }
    }
}
