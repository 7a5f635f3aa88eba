//! Page Routing
//!
//! Matches a GET path against registered patterns. Patterns are made of
//! `/`-separated segments:
//!
//! - a literal segment matches itself
//! - `:name` matches any single segment and captures it as `name`
//! - `*` matches the rest of the path, including nothing
//!
//! Patterns are tried in registration order and the first match wins.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Number, Value};

/// A matched page route, stored in the request context.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub path_params: BTreeMap<String, String>,
    /// Query parameters with `true`/`false` and numbers inferred
    pub query_params: Map<String, Value>,
    pub raw_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Rest,
}

#[derive(Debug, Clone)]
struct Pattern {
    source: String,
    segments: Vec<Segment>,
}

impl Pattern {
    fn parse(source: &str) -> Self {
        let segments = split(source)
            .map(|segment| match segment {
                "*" => Segment::Rest,
                s if s.starts_with(':') && s.len() > 1 => Segment::Param(s[1..].to_string()),
                s => Segment::Literal(s.to_string()),
            })
            .collect();

        Self {
            source: source.to_string(),
            segments,
        }
    }

    fn matches(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let parts: Vec<&str> = split(path).collect();
        let mut params = BTreeMap::new();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Rest => return Some(params),
                Segment::Literal(literal) => {
                    if parts.get(i) != Some(&literal.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let part = parts.get(i)?;
                    params.insert(name.clone(), (*part).to_string());
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(params)
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// Ordered set of page patterns, each bound to a handler.
#[derive(Debug, Clone)]
pub struct PageRouter<H> {
    routes: Vec<(Pattern, H)>,
}

impl<H> Default for PageRouter<H> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<H: Clone> PageRouter<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, pattern: &str, handler: H) -> Self {
        self.routes.push((Pattern::parse(pattern), handler));
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|(pattern, _)| pattern.source.as_str())
    }

    /// Finds the first pattern matching `path`; `query` is the raw query
    /// string without the leading `?`.
    pub fn match_url(&self, path: &str, query: Option<&str>) -> Option<(H, Route)> {
        self.routes.iter().find_map(|(pattern, handler)| {
            pattern.matches(path).map(|path_params| {
                let route = Route {
                    path_params,
                    query_params: parse_query(query.unwrap_or_default()),
                    raw_path: path.to_string(),
                };
                (handler.clone(), route)
            })
        })
    }
}

/// Decodes a query string, inferring booleans and numbers. A repeated key
/// keeps its last value.
pub fn parse_query(query: &str) -> Map<String, Value> {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| (key.into_owned(), infer(&value)))
        .collect()
}

fn infer(value: &str) -> Value {
    match value {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = value.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Some(n) = value.parse::<f64>().ok().and_then(Number::from_f64) {
        if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')) {
            return Value::Number(n);
        }
    }
    Value::String(value.to_string())
}
