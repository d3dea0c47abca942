//! Backend-neutral query description.

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// A single row predicate. Filters on one query are AND-combined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Column equals value
    Eq { column: String, value: String },
    /// Column differs from value (NULL never matches)
    Neq { column: String, value: String },
    /// Case-insensitive LIKE with `%`/`_` wildcards and `\` escapes
    ILike { column: String, pattern: String },
    /// Column is present and not NULL
    NotNull { column: String },
    /// OR of case-insensitive LIKEs, as `(column, pattern)` pairs
    AnyILike(Vec<(String, String)>),
}

/// A select against one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub table: String,
    /// Projected columns; empty selects every column
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
    pub order: Option<(String, Direction)>,
    pub limit: Option<usize>,
    /// Rows skipped before the limit applies
    pub offset: Option<usize>,
}

impl Query {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            filters: Vec::new(),
            order: None,
            limit: None,
            offset: None,
        }
    }

    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: &str, value: impl Into<String>) -> Self {
        self.filter(Filter::Eq {
            column: column.to_string(),
            value: value.into(),
        })
    }

    pub fn neq(self, column: &str, value: impl Into<String>) -> Self {
        self.filter(Filter::Neq {
            column: column.to_string(),
            value: value.into(),
        })
    }

    pub fn ilike(self, column: &str, pattern: impl Into<String>) -> Self {
        self.filter(Filter::ILike {
            column: column.to_string(),
            pattern: pattern.into(),
        })
    }

    pub fn not_null(self, column: &str) -> Self {
        self.filter(Filter::NotNull {
            column: column.to_string(),
        })
    }

    pub fn any_ilike(self, alternatives: Vec<(String, String)>) -> Self {
        self.filter(Filter::AnyILike(alternatives))
    }

    pub fn order(mut self, column: &str, direction: Direction) -> Self {
        self.order = Some((column.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset).filter(|&n| n > 0);
        self
    }
}

/// Build a LIKE pattern matching `term` anywhere in a value.
///
/// LIKE metacharacters inside the term are escaped. PostgREST reads every
/// `*` as a wildcard, so a `*` in the term becomes `_` and matches exactly
/// one character on every backend.
pub fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        match c {
            '%' | '_' | '\\' => {
                pattern.push('\\');
                pattern.push(c);
            }
            '*' => pattern.push('_'),
            _ => pattern.push(c),
        }
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_accumulates_filters() {
        let query = Query::table("articles")
            .select(&["id", "title"])
            .eq("id", "7")
            .not_null("title")
            .order("created_at", Direction::Descending)
            .limit(5);

        assert_eq!(query.columns, vec!["id", "title"]);
        assert_eq!(query.filters.len(), 2);
        assert_eq!(
            query.order,
            Some(("created_at".to_string(), Direction::Descending))
        );
        assert_eq!(query.limit, Some(5));
    }

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("sport"), "%sport%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(contains_pattern("a*b"), "%a_b%");
    }
}
