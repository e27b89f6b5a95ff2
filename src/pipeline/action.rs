//! Mapping of CLI actions and resource hrefs onto HTTP requests

use std::sync::LazyLock;

use regex::Regex;
use reqwest::Method;

use crate::error::ConfigError;

static RESOURCE_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:([a-z0-9_]+)|(/(?:api|rll)(?:/[A-Za-z0-9_]+)+))$").expect("href regex")
});

/// Actions that map onto a fixed path suffix and method instead of `POST <href>/<action>`
const SUFFIXED_ACTIONS: &[(&str, &str, Method)] = &[
    ("accounts", "/accounts", Method::GET),
    ("current_instances", "/current_instances", Method::GET),
    ("data", "/data", Method::GET),
    ("detail", "/detail", Method::GET),
    ("multi_update", "/multi_update", Method::PUT),
    ("servers", "/servers", Method::GET),
    ("show_source", "/source", Method::GET),
    ("update_source", "/source", Method::PUT),
];

/// A validated resource href
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceHref {
    /// `self`: the instance the command runs on
    SelfHref,
    Path(String),
}

impl ResourceHref {
    /// Accepts `self`, a bare collection name (`clouds` → `/api/clouds`) or a
    /// full `/api/...` or `/rll/...` path.
    pub fn parse(href: &str) -> Result<Self, ConfigError> {
        if href == "self" {
            return Ok(ResourceHref::SelfHref);
        }
        let caps = RESOURCE_HREF_RE
            .captures(href)
            .ok_or_else(|| ConfigError::InvalidResourceHref(href.to_string()))?;
        match caps.get(1) {
            Some(word) => Ok(ResourceHref::Path(format!("/api/{}", word.as_str()))),
            None => Ok(ResourceHref::Path(href.to_string())),
        }
    }
}

/// Method and path an action resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub method: Method,
    pub path: String,
}

impl Route {
    pub fn resolve(action: &str, href: &str) -> Self {
        let method = match action {
            "index" | "show" | "list" => Some(Method::GET),
            "update" | "create" => Some(Method::POST),
            "destroy" => Some(Method::DELETE),
            _ => None,
        };
        if let Some(method) = method {
            return Route {
                method,
                path: href.to_string(),
            };
        }

        match SUFFIXED_ACTIONS.iter().find(|(name, _, _)| *name == action) {
            Some((_, suffix, method)) => Route {
                method: method.clone(),
                path: format!("{}{}", href, suffix),
            },
            None => Route {
                method: Method::POST,
                path: format!("{}/{}", href, action),
            },
        }
    }
}
