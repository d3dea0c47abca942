//! Article data structures.
//!
//! [`RawArticleRow`] mirrors a row of the `ditorja_frontend` table as it has
//! looked across schema revisions. [`Article`] is the canonical record the
//! normalizer produces from it.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Homepage placement bucket of an article.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    Featured,
    #[default]
    Normal,
    Editors,
}

impl ArticleStatus {
    pub const ALL: [ArticleStatus; 3] = [Self::Featured, Self::Normal, Self::Editors];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Featured => "featured",
            ArticleStatus::Normal => "normal",
            ArticleStatus::Editors => "editors",
        }
    }

    /// Parse a stored status tag. Unknown tags yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "featured" => Some(ArticleStatus::Featured),
            "normal" => Some(ArticleStatus::Normal),
            "editors" => Some(ArticleStatus::Editors),
            _ => None,
        }
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hashtags as stored upstream: a real array or a newline-joined string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hashtags {
    List(Vec<String>),
    Text(String),
}

/// A backend row before normalization.
///
/// Every field is optional; rows written before a column existed simply
/// lack it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawArticleRow {
    pub id: Option<String>,
    pub article_title: Option<String>,
    pub article_short: Option<String>,
    pub article_medium: Option<String>,
    pub article_large: Option<String>,
    pub article_image: Option<String>,
    pub article_category: Option<String>,
    pub category_slug: Option<String>,
    pub article_hashtag: Option<Hashtags>,
    pub created_at: Option<String>,
    pub status: Option<String>,
    pub title_slug: Option<String>,
    pub author: Option<String>,
}

impl RawArticleRow {
    /// Read a row out of a JSON object without ever failing.
    ///
    /// Scalars of the wrong type are stringified, objects and arrays in
    /// text columns are dropped.
    pub fn from_value(value: &Value) -> Self {
        let text = |key: &str| value.get(key).and_then(scalar_text);

        let article_hashtag = value
            .get("article_hashtag")
            .or_else(|| value.get("article_hashtags"))
            .and_then(|v| match v {
                Value::Array(items) => Some(Hashtags::List(
                    items.iter().filter_map(scalar_text).collect(),
                )),
                Value::String(s) => Some(Hashtags::Text(s.clone())),
                _ => None,
            });

        Self {
            id: text("id"),
            article_title: text("article_title"),
            article_short: text("article_short"),
            article_medium: text("article_medium"),
            article_large: text("article_large"),
            article_image: text("article_image"),
            article_category: text("article_category"),
            category_slug: text("category_slug"),
            article_hashtag,
            created_at: text("created_at"),
            status: text("status"),
            title_slug: text("title_slug"),
            author: text("author"),
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A canonical, read-only article record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Article {
    /// Backend-assigned identifier
    pub id: String,

    /// Headline
    pub title: String,

    /// Teaser text
    pub short: String,

    /// Expanded summary
    pub medium: String,

    /// Full body, absent in preview-only rows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large: Option<String>,

    /// Image URL; the renderer substitutes a placeholder when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Category display name
    pub category: String,

    /// URL-safe category identifier
    pub category_slug: String,

    /// Tags in source order
    pub hashtags: Vec<String>,

    /// URL-safe title identifier
    pub title_slug: String,

    /// Creation timestamp, the ordering key of every listing
    pub created_at: Option<DateTime<Utc>>,

    /// Homepage placement bucket
    pub status: ArticleStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl Article {
    /// Hashtags trimmed and stripped of empty entries, as used for matching.
    pub fn match_tags(&self) -> Vec<&str> {
        self.hashtags
            .iter()
            .map(|tag| tag.trim())
            .filter(|tag| !tag.is_empty())
            .collect()
    }
}

/// Parse a backend timestamp.
///
/// Accepts RFC 3339 (`timestamptz`) and zone-less (`timestamp`) forms, the
/// latter read as UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // Postgres renders timestamptz with a short "+00" offset
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%#z") {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
