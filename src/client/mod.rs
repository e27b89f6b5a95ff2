//! RightScale API client

use async_trait::async_trait;
use reqwest::Method;

use crate::error::Result;

pub mod auth;
#[cfg(test)]
pub mod mock;
pub mod query;
pub mod response;
pub mod retry;
pub mod rightscale;

pub use auth::{Credential, ProxyEndpoint};
pub use query::{QueryArgs, QueryValue};
pub use response::Response;
pub use retry::RetryPolicy;
pub use rightscale::{ClientOptions, RightScaleClient};

/// Something that can carry an API request to the server.
///
/// Implementations attach credentials and standard headers, retry according
/// to their policy, and classify the result. An error-status response comes
/// back as an error that still carries the `Response`.
#[async_trait]
pub trait RightScaleApi: Send + Sync {
    async fn execute(&self, request: &ApiRequest) -> Result<Response>;

    /// Whether requests go through the RightLink10 proxy
    fn uses_proxy(&self) -> bool;
}

/// One API call: method, path relative to the server, query and optional body
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: QueryArgs,
    pub content_type: Option<String>,
    pub body: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: QueryArgs::new(),
            content_type: None,
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, query: QueryArgs) -> Self {
        self.query = query;
        self
    }

    pub fn body(mut self, content_type: impl Into<String>, body: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self.body = Some(body.into());
        self
    }

    /// Path with a leading slash
    pub fn normalized_path(&self) -> String {
        if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        }
    }
}
