//! PostgREST row store implementation.
//!
//! Talks to the hosted project's REST endpoint (`{url}/rest/v1/{table}`)
//! with the anonymous key. Filters are rendered in PostgREST's query-string
//! grammar; LIKE wildcards `%` become `*` on the wire.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_RANGE, HeaderMap};
use serde_json::Value;
use url::Url;

use crate::backend::{ArticleBackend, Direction, Filter, Query};
use crate::error::{AppError, Result};
use crate::models::BackendConfig;
use crate::utils::http::create_async_client;

/// HTTP backend for the hosted row store.
#[derive(Clone)]
pub struct PostgrestBackend {
    client: Client,
    rest_url: Url,
    anon_key: String,
}

impl PostgrestBackend {
    /// Create a backend from connection settings.
    ///
    /// Missing endpoint or key is a configuration error; callers treat it
    /// as fatal at startup.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(AppError::config("backend endpoint URL is not set"));
        }
        if config.anon_key.trim().is_empty() {
            return Err(AppError::config("backend access key is not set"));
        }

        let client = create_async_client(config)?;
        Ok(Self {
            client,
            rest_url: rest_url(&config.url)?,
            anon_key: config.anon_key.trim().to_string(),
        })
    }

    fn table_url(&self, table: &str) -> Result<Url> {
        Ok(self.rest_url.join(table)?)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .header(ACCEPT, "application/json")
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AppError::backend(status.as_u16(), body))
    }
}

#[async_trait]
impl ArticleBackend for PostgrestBackend {
    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        let url = self.table_url(&query.table)?;
        let params = query_params(query)?;
        log::debug!("GET {} {:?}", url, params);

        let response = self
            .request(reqwest::Method::GET, url)
            .query(&params)
            .send()
            .await?;
        let rows = Self::check(response).await?.json::<Vec<Value>>().await?;
        Ok(rows)
    }

    async fn count(&self, query: &Query) -> Result<u64> {
        let url = self.table_url(&query.table)?;
        let params = filter_params(&query.filters)?;
        log::debug!("HEAD {} {:?}", url, params);

        let response = self
            .request(reqwest::Method::HEAD, url)
            .query(&params)
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let response = Self::check(response).await?;
        parse_content_range(response.headers())
    }
}

/// Derive the REST root (`.../rest/v1/`) from the project endpoint.
fn rest_url(endpoint: &str) -> Result<Url> {
    let mut base = endpoint.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    Ok(Url::parse(&base)?.join("rest/v1/")?)
}

/// Render a query as PostgREST query-string pairs.
pub fn query_params(query: &Query) -> Result<Vec<(String, String)>> {
    let select = if query.columns.is_empty() {
        "*".to_string()
    } else {
        query.columns.join(",")
    };

    let mut params = vec![("select".to_string(), select)];
    params.extend(filter_params(&query.filters)?);

    if let Some((column, direction)) = &query.order {
        let dir = match direction {
            Direction::Ascending => "asc",
            Direction::Descending => "desc",
        };
        params.push(("order".to_string(), format!("{column}.{dir}")));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    if let Some(offset) = query.offset {
        params.push(("offset".to_string(), offset.to_string()));
    }
    Ok(params)
}

fn filter_params(filters: &[Filter]) -> Result<Vec<(String, String)>> {
    filters
        .iter()
        .map(|filter| match filter {
            Filter::Eq { column, value } => Ok((column.clone(), format!("eq.{value}"))),
            Filter::Neq { column, value } => Ok((column.clone(), format!("neq.{value}"))),
            Filter::ILike { column, pattern } => {
                Ok((column.clone(), format!("ilike.{}", wire_pattern(pattern))))
            }
            Filter::NotNull { column } => Ok((column.clone(), "not.is.null".to_string())),
            Filter::AnyILike(alternatives) => {
                if alternatives.is_empty() {
                    return Err(AppError::query("empty OR group"));
                }
                let parts = alternatives
                    .iter()
                    .map(|(column, pattern)| {
                        format!("{column}.ilike.{}", quote(&wire_pattern(pattern)))
                    })
                    .collect::<Vec<_>>();
                Ok(("or".to_string(), format!("({})", parts.join(","))))
            }
        })
        .collect()
}

/// Unescaped `%` wildcards become `*`; escaped ones stay literal.
fn wire_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => out.push('*'),
            '\\' => {
                out.push('\\');
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Double-quote a value inside a logical group so reserved characters
/// (`,` `.` `:` `(` `)`) stay literal.
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Read the total from a `Content-Range: 0-9/42` (or `*/42`) header.
fn parse_content_range(headers: &HeaderMap) -> Result<u64> {
    let raw = headers
        .get(CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::backend(200, "count response without Content-Range"))?;

    raw.rsplit('/')
        .next()
        .and_then(|total| total.trim().parse::<u64>().ok())
        .ok_or_else(|| AppError::backend(200, format!("unexpected Content-Range '{raw}'")))
}
