// src/services/normalizer.rs

//! Article normalizer.
//!
//! Maps raw backend rows onto [`Article`]. Each field falls back to a
//! default on its own, so a partial or malformed row still produces a fully
//! populated record.

use serde_json::Value;

use crate::models::{Article, ArticleStatus, Hashtags, RawArticleRow, parse_timestamp};
use crate::services::category_cache::Snapshot;
use crate::utils::slug::slugify;

/// Normalize a JSON row.
pub fn normalize_value(value: &Value, mappings: Option<&Snapshot>) -> Article {
    normalize(&RawArticleRow::from_value(value), mappings)
}

/// Normalize a raw row, consulting the category mapping snapshot if given.
pub fn normalize(row: &RawArticleRow, mappings: Option<&Snapshot>) -> Article {
    let title = row.article_title.clone().unwrap_or_default();
    let category = row.article_category.clone().unwrap_or_default();

    Article {
        id: row.id.clone().unwrap_or_default(),
        short: row.article_short.clone().unwrap_or_default(),
        medium: row.article_medium.clone().unwrap_or_default(),
        large: non_empty(row.article_large.as_deref()),
        image: non_empty(row.article_image.as_deref()),
        hashtags: normalize_hashtags(row.article_hashtag.as_ref()),
        status: normalize_status(row.status.as_deref()),
        title_slug: resolve_title_slug(row.title_slug.as_deref(), &title),
        category_slug: resolve_category_slug(row.category_slug.as_deref(), &category, mappings),
        created_at: row.created_at.as_deref().and_then(parse_timestamp),
        author: non_empty(row.author.as_deref()),
        title,
        category,
    }
}

/// Hashtags in list form. A stored list is kept as is; a stored string is
/// split on newlines with blank lines dropped.
pub fn normalize_hashtags(raw: Option<&Hashtags>) -> Vec<String> {
    match raw {
        Some(Hashtags::List(tags)) => tags.clone(),
        Some(Hashtags::Text(text)) => text
            .lines()
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    }
}

/// Stored status if it is a known tag, otherwise `normal`.
pub fn normalize_status(raw: Option<&str>) -> ArticleStatus {
    match raw {
        Some(tag) => ArticleStatus::parse(tag).unwrap_or_else(|| {
            log::debug!("Unknown article status '{}', using normal", tag);
            ArticleStatus::Normal
        }),
        None => ArticleStatus::Normal,
    }
}

/// Stored title slug if non-empty, otherwise derived from the title.
pub fn resolve_title_slug(stored: Option<&str>, title: &str) -> String {
    match stored.map(str::trim) {
        Some(slug) if !slug.is_empty() => slug.to_string(),
        _ => slugify(title),
    }
}

/// Category slug precedence: stored value, cached mapping, derived slug.
pub fn resolve_category_slug(
    stored: Option<&str>,
    category: &str,
    mappings: Option<&Snapshot>,
) -> String {
    if let Some(slug) = stored.map(str::trim).filter(|s| !s.is_empty()) {
        return slug.to_string();
    }
    mappings
        .and_then(|snapshot| snapshot.slug_for(category))
        .map(str::to_string)
        .unwrap_or_else(|| slugify(category))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use chrono::Utc;
    use serde_json::json;

    fn snapshot() -> Snapshot {
        Snapshot::new(
            vec![Category::new("bota", "Botë"), Category::new("sport-1", "Sport")],
            Utc::now(),
        )
    }

    #[test]
    fn test_hashtag_string_is_split() {
        let article = normalize_value(&json!({ "article_hashtag": "a\nb\nc" }), None);
        assert_eq!(article.hashtags, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_hashtag_list_is_unchanged() {
        let article = normalize_value(&json!({ "article_hashtag": ["a", "b"] }), None);
        assert_eq!(article.hashtags, vec!["a", "b"]);
    }

    #[test]
    fn test_hashtag_string_with_crlf_and_blanks() {
        let tags = normalize_hashtags(Some(&Hashtags::Text("a\r\n\n b \n".into())));
        assert_eq!(tags, vec!["a", "b"]);
        assert!(normalize_hashtags(None).is_empty());
    }

    #[test]
    fn test_empty_row_gets_defaults() {
        let article = normalize_value(&json!({}), None);
        assert_eq!(article.id, "");
        assert_eq!(article.status, ArticleStatus::Normal);
        assert_eq!(article.title_slug, "");
        assert_eq!(article.category_slug, "");
        assert!(article.hashtags.is_empty());
        assert!(article.created_at.is_none());
        assert!(article.image.is_none());
    }

    #[test]
    fn test_legacy_row_derives_missing_fields() {
        let article = normalize_value(
            &json!({
                "id": "abc",
                "article_title": "Fëmijët në shkollë",
                "article_category": "Arsim",
                "status": "archived",
                "title_slug": "",
                "article_image": ""
            }),
            None,
        );
        assert_eq!(article.title_slug, "femijet-ne-shkolle");
        assert_eq!(article.category_slug, "arsim");
        assert_eq!(article.status, ArticleStatus::Normal);
        assert!(article.image.is_none());
    }

    #[test]
    fn test_stored_values_win() {
        let article = normalize_value(
            &json!({
                "article_title": "Titulli",
                "title_slug": "custom-slug",
                "article_category": "Botë",
                "category_slug": "world",
                "status": "editors"
            }),
            Some(&snapshot()),
        );
        assert_eq!(article.title_slug, "custom-slug");
        assert_eq!(article.category_slug, "world");
        assert_eq!(article.status, ArticleStatus::Editors);
    }

    #[test]
    fn test_category_slug_prefers_mapping_over_derivation() {
        let snap = snapshot();
        assert_eq!(resolve_category_slug(None, "Sport", Some(&snap)), "sport-1");
        assert_eq!(resolve_category_slug(Some(" "), "Botë", Some(&snap)), "bota");
        assert_eq!(resolve_category_slug(None, "Kulturë", Some(&snap)), "kulture");
        assert_eq!(resolve_category_slug(None, "Sport", None), "sport");
    }

    #[test]
    fn test_created_at_is_parsed() {
        let article = normalize_value(&json!({ "created_at": "2024-03-01T12:00:00+00:00" }), None);
        assert!(article.created_at.is_some());
    }
}
