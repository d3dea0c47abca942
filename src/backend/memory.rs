//! In-process row store.
//!
//! Holds JSON rows per table and evaluates [`Query`] values against them
//! with the same semantics the hosted store applies. Every issued query is
//! recorded, and the store can be switched into a failing mode to exercise
//! error paths.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

use crate::backend::{ArticleBackend, Direction, Filter, Query};
use crate::error::{AppError, Result};

/// Memory-backed row store.
#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, Vec<Value>>>,
    issued: Mutex<Vec<Query>>,
    failing: RwLock<Option<String>>,
}

impl MemoryBackend {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `rows` in `table`.
    pub fn with_rows(table: &str, rows: Vec<Value>) -> Self {
        let backend = Self::new();
        backend.insert_rows(table, rows);
        backend
    }

    /// Load a JSON array of rows from a file into `table`.
    pub async fn from_json_file(table: &str, path: impl AsRef<Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        let rows: Vec<Value> = serde_json::from_slice(&bytes)?;
        log::info!(
            "Loaded {} fixture rows from {}",
            rows.len(),
            path.as_ref().display()
        );
        Ok(Self::with_rows(table, rows))
    }

    /// Append rows to a table.
    pub fn insert_rows(&self, table: &str, rows: Vec<Value>) {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        tables.entry(table.to_string()).or_default().extend(rows);
    }

    /// Make every subsequent call fail with `message`, or recover with `None`.
    pub fn set_failure(&self, message: Option<&str>) {
        let mut failing = self.failing.write().unwrap_or_else(|e| e.into_inner());
        *failing = message.map(str::to_string);
    }

    /// Number of select and count calls received so far.
    pub fn query_count(&self) -> usize {
        self.issued.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Every query received so far, in order.
    pub fn issued_queries(&self) -> Vec<Query> {
        self.issued
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn record(&self, query: &Query) -> Result<()> {
        self.issued
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(query.clone());

        let failing = self.failing.read().unwrap_or_else(|e| e.into_inner());
        match failing.as_ref() {
            Some(message) => Err(AppError::backend(503, message)),
            None => Ok(()),
        }
    }

    fn matching_rows(&self, query: &Query) -> Result<Vec<Value>> {
        let predicates = query
            .filters
            .iter()
            .map(Predicate::compile)
            .collect::<Result<Vec<_>>>()?;

        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        let rows = tables
            .get(&query.table)
            .ok_or_else(|| AppError::backend(404, format!("relation \"{}\" does not exist", query.table)))?;

        Ok(rows
            .iter()
            .filter(|row| predicates.iter().all(|p| p.matches(row)))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ArticleBackend for MemoryBackend {
    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        self.record(query)?;
        let mut rows = self.matching_rows(query)?;

        if let Some((column, direction)) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(column), b.get(column), *direction);
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        if let Some(offset) = query.offset {
            rows.drain(..offset.min(rows.len()));
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        if !query.columns.is_empty() {
            rows = rows
                .into_iter()
                .map(|row| project(&row, &query.columns))
                .collect();
        }
        Ok(rows)
    }

    async fn count(&self, query: &Query) -> Result<u64> {
        self.record(query)?;
        Ok(self.matching_rows(query)?.len() as u64)
    }
}

/// A filter prepared for repeated evaluation.
enum Predicate<'q> {
    Eq(&'q str, &'q str),
    Neq(&'q str, &'q str),
    ILike(&'q str, Regex),
    NotNull(&'q str),
    Any(Vec<(&'q str, Regex)>),
}

impl<'q> Predicate<'q> {
    fn compile(filter: &'q Filter) -> Result<Self> {
        Ok(match filter {
            Filter::Eq { column, value } => Predicate::Eq(column, value),
            Filter::Neq { column, value } => Predicate::Neq(column, value),
            Filter::ILike { column, pattern } => Predicate::ILike(column, like_regex(pattern)?),
            Filter::NotNull { column } => Predicate::NotNull(column),
            Filter::AnyILike(alternatives) => {
                if alternatives.is_empty() {
                    return Err(AppError::query("empty OR group"));
                }
                Predicate::Any(
                    alternatives
                        .iter()
                        .map(|(column, pattern)| Ok((column.as_str(), like_regex(pattern)?)))
                        .collect::<Result<Vec<_>>>()?,
                )
            }
        })
    }

    fn matches(&self, row: &Value) -> bool {
        match self {
            Predicate::Eq(column, value) => cell_text(row, column).is_some_and(|v| v == *value),
            Predicate::Neq(column, value) => cell_text(row, column).is_some_and(|v| v != *value),
            Predicate::ILike(column, re) => cell_text(row, column).is_some_and(|v| re.is_match(&v)),
            Predicate::NotNull(column) => row.get(*column).is_some_and(|v| !v.is_null()),
            Predicate::Any(alternatives) => alternatives
                .iter()
                .any(|(column, re)| cell_text(row, column).is_some_and(|v| re.is_match(&v))),
        }
    }
}

/// Text form of a cell. Arrays are newline-joined so pattern filters see
/// every element; NULL and missing cells have no text.
fn cell_text(row: &Value, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        other => Some(other.to_string()),
    }
}

/// Translate a LIKE pattern into an anchored, case-insensitive regex.
fn like_regex(pattern: &str) -> Result<Regex> {
    let mut source = String::from("^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => source.push_str(".*"),
            '_' => source.push('.'),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    source.push_str(&regex::escape(&escaped.to_string()));
                }
            }
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');

    RegexBuilder::new(&source)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| AppError::query(format!("bad pattern '{pattern}': {e}")))
}

/// Order cells the way the store does: NULLs sort after every value in
/// either direction.
fn compare_values(a: Option<&Value>, b: Option<&Value>, direction: Direction) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    let nulls_last = match direction {
        Direction::Ascending => Ordering::Greater,
        Direction::Descending => Ordering::Less,
    };
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => nulls_last,
        (Some(_), None) => nulls_last.reverse(),
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

fn project(row: &Value, columns: &[String]) -> Value {
    let mut out = Map::new();
    for column in columns {
        out.insert(column.clone(), row.get(column).cloned().unwrap_or(Value::Null));
    }
    Value::Object(out)
}
