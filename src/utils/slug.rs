//! Slug generation and search text normalization.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;
use unicode_segmentation::UnicodeSegmentation;

static NON_SLUG_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("static slug pattern"));

/// Lowercase, decompose and drop combining marks.
fn fold(input: &str) -> String {
    input
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Convert arbitrary display text into a URL path segment.
///
/// Diacritics are stripped, the result is lowercase ASCII and every run of
/// characters outside `[a-z0-9]` becomes a single hyphen. Leading and
/// trailing hyphens are removed, so empty or punctuation-only input yields
/// an empty string.
///
/// ```
/// use ditorja::slugify;
///
/// assert_eq!(slugify("Fëmijët në shkollë"), "femijet-ne-shkolle");
/// assert_eq!(slugify("  Botë / Sport!  "), "bote-sport");
/// ```
pub fn slugify(input: &str) -> String {
    let folded = fold(input);
    NON_SLUG_RUN
        .replace_all(&folded, "-")
        .trim_matches('-')
        .to_string()
}

/// Normalize a free-text search query for matching.
///
/// Same folding as [`slugify`] without hyphenation: lowercase, diacritics
/// removed, whitespace collapsed.
pub fn normalize_search_text(input: &str) -> String {
    fold(input).split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Best-effort display name for a slug with no known mapping.
///
/// `"bote-shqiptare"` becomes `"Bote Shqiptare"`. Diacritics lost by
/// slugification cannot be restored.
pub fn humanize_slug(slug: &str) -> String {
    slug.split(|c: char| c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut graphemes = word.graphemes(true);
    match graphemes.next() {
        Some(first) => first.to_uppercase() + graphemes.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_slug_shaped(s: &str) -> bool {
        s.is_empty()
            || (!s.starts_with('-')
                && !s.ends_with('-')
                && !s.contains("--")
                && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'))
    }

    #[test]
    fn test_slugify_albanian_text() {
        assert_eq!(slugify("Politikë"), "politike");
        assert_eq!(slugify("Çështje Sociale"), "ceshtje-sociale");
        assert_eq!(slugify("Botë Shqiptare"), "bote-shqiptare");
    }

    #[test]
    fn test_slugify_collapses_and_trims() {
        assert_eq!(slugify("--Hello,   World!!--"), "hello-world");
        assert_eq!(slugify("COVID-19: 2024"), "covid-19-2024");
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!! ???"), "");
    }

    #[test]
    fn test_slugify_is_idempotent_and_well_formed() {
        let samples = [
            "Fëmijët në shkollë",
            "  Ekonomi & Financë ",
            "Sport",
            "",
            "—",
            "Rruga e Kombit (A1)",
            "ÜBER straße",
            "日本語 text",
            "a--b__c",
        ];
        for sample in samples {
            let once = slugify(sample);
            assert_eq!(slugify(&once), once, "not idempotent for {sample:?}");
            assert!(is_slug_shaped(&once), "bad slug {once:?} for {sample:?}");
        }
    }

    #[test]
    fn test_normalize_search_text() {
        assert_eq!(normalize_search_text("fëmijë"), "femije");
        assert_eq!(normalize_search_text("  Shkollë   e  Mesme "), "shkolle e mesme");
        assert_eq!(normalize_search_text(""), "");
    }

    #[test]
    fn test_humanize_slug() {
        assert_eq!(humanize_slug("bote-shqiptare"), "Bote Shqiptare");
        assert_eq!(humanize_slug("sport"), "Sport");
        assert_eq!(humanize_slug("--a--b-"), "A B");
        assert_eq!(humanize_slug(""), "");
    }
}
