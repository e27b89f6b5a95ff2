//! Query string construction
//!
//! Arguments map a key to either a single string or a list of strings. A list
//! repeats the key once per element, which is how the API receives array
//! parameters such as `filter[]=name==web&filter[]=state==operational`.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use url::form_urlencoded::byte_serialize;

use crate::error::{ConfigError, Result};

/// `key=value` as typed on the command line
static ARGUMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-zA-Z0-9_\[\]]+)=(.*)$").expect("argument regex"));

/// Value side of a query argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Single(String),
    List(Vec<String>),
}

/// Ordered mapping from argument key to value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryArgs {
    entries: Vec<(String, QueryValue)>,
}

impl QueryArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a value under `key`; a repeated key turns the entry into a list
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => match existing {
                QueryValue::List(values) => values.push(value),
                QueryValue::Single(first) => {
                    let first = std::mem::take(first);
                    *existing = QueryValue::List(vec![first, value]);
                }
            },
            None => self.entries.push((key, QueryValue::Single(value))),
        }
    }

    /// Set `key` to an explicit value, replacing any previous one
    pub fn insert(&mut self, key: impl Into<String>, value: QueryValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder-style `push`
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// Parse raw `key=value` command line arguments
    pub fn from_cli_args<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let mut query = Self::new();
        for arg in args {
            let arg = arg.as_ref();
            let caps = ARGUMENT_RE
                .captures(arg)
                .ok_or_else(|| ConfigError::InvalidArgument(arg.to_string()))?;
            query.push(&caps[1], &caps[2]);
        }
        Ok(query)
    }

    /// Build from a JSON object whose values are strings or arrays of strings.
    ///
    /// Any other shape is rejected instead of being stringified.
    #[allow(dead_code)]
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| ConfigError::InvalidQueryValue(value.to_string()))?;

        let mut query = Self::new();
        for (key, v) in object {
            let v = match v {
                Value::String(s) => QueryValue::Single(s.clone()),
                Value::Array(items) => QueryValue::List(
                    items
                        .iter()
                        .map(|item| {
                            item.as_str()
                                .map(str::to_string)
                                .ok_or_else(|| ConfigError::InvalidQueryValue(v.to_string()))
                        })
                        .collect::<std::result::Result<_, _>>()?,
                ),
                other => return Err(ConfigError::InvalidQueryValue(other.to_string()).into()),
            };
            query.insert(key.clone(), v);
        }
        Ok(query)
    }

    /// Encode as `k=v&k=v`, escaping keys and values independently
    pub fn encode(&self) -> String {
        let mut pairs = Vec::new();
        for (key, value) in &self.entries {
            let key = escape(key);
            match value {
                QueryValue::Single(v) => pairs.push(format!("{}={}", key, escape(v))),
                QueryValue::List(values) => {
                    for v in values {
                        pairs.push(format!("{}={}", key, escape(v)));
                    }
                }
            }
        }
        pairs.join("&")
    }
}

fn escape(s: &str) -> String {
    byte_serialize(s.as_bytes()).collect()
}
