//! Mock RightScale API client for testing
//!
//! Canned responses are matched on method and path. Every request is
//! captured so tests can assert on what would have gone over the wire.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::response::classify;
use super::{ApiRequest, Response, RightScaleApi};
use crate::error::{ApiError, Result};

/// A canned response for one method and path
#[derive(Debug, Clone)]
struct Route {
    method: Method,
    path: String,
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

/// Mock API client for testing.
///
/// Responses registered for the same method and path are served in order;
/// the last one keeps answering once the others are used up. Unmatched
/// requests get a 404.
///
/// # Example
/// ```ignore
/// let mock = MockRightScaleClient::new()
///     .respond(Method::GET, "/api/clouds", 200, r#"[{"name":"EC2"}]"#);
///
/// let response = mock.execute(&ApiRequest::get("/api/clouds")).await?;
/// assert_eq!(mock.requests().len(), 1);
/// ```
#[derive(Default)]
pub struct MockRightScaleClient {
    routes: Arc<Mutex<Vec<VecDeque<Route>>>>,
    /// Error to return (if any) - consumed on first use
    error: Arc<Mutex<Option<ApiError>>>,
    captured_requests: Arc<Mutex<Vec<ApiRequest>>>,
    proxy: bool,
}

impl MockRightScaleClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method path` with `status` and `body`
    pub fn respond(self, method: Method, path: &str, status: u16, body: &str) -> Self {
        self.respond_with_headers(method, path, status, &[], body)
    }

    /// Like `respond`, with extra response headers
    pub fn respond_with_headers(
        self,
        method: Method,
        path: &str,
        status: u16,
        headers: &[(&str, &str)],
        body: &str,
    ) -> Self {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            header_map.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        let route = Route {
            method,
            path: path.to_string(),
            status: StatusCode::from_u16(status).unwrap(),
            headers: header_map,
            body: body.to_string(),
        };

        {
            let mut routes = self.routes.lock().unwrap();
            match routes
                .iter_mut()
                .find(|queue| queue[0].method == route.method && queue[0].path == route.path)
            {
                Some(queue) => queue.push_back(route),
                None => routes.push(VecDeque::from([route])),
            }
        }
        self
    }

    /// Fail the next call with `error`. The error is consumed after one use.
    pub fn fail_with(self, error: ApiError) -> Self {
        *self.error.lock().unwrap() = Some(error);
        self
    }

    /// Pretend requests go through the RightLink10 proxy
    pub fn proxy(mut self, proxy: bool) -> Self {
        self.proxy = proxy;
        self
    }

    /// All requests seen so far, in order
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.captured_requests.lock().unwrap().clone()
    }

    fn next_route(&self, method: &Method, path: &str) -> Option<Route> {
        let mut routes = self.routes.lock().unwrap();
        let queue = routes
            .iter_mut()
            .find(|queue| queue[0].method == *method && queue[0].path == path)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl RightScaleApi for MockRightScaleClient {
    async fn execute(&self, request: &ApiRequest) -> Result<Response> {
        self.captured_requests.lock().unwrap().push(request.clone());

        if let Some(error) = self.error.lock().unwrap().take() {
            return Err(error.into());
        }

        let path = request.normalized_path();
        match self.next_route(&request.method, &path) {
            Some(route) => classify(
                &request.method,
                &path,
                route.status,
                route.headers,
                route.body.into_bytes(),
            ),
            None => classify(
                &request.method,
                &path,
                StatusCode::NOT_FOUND,
                HeaderMap::new(),
                format!("No mock response for {} {}", request.method, path).into_bytes(),
            ),
        }
    }

    fn uses_proxy(&self) -> bool {
        self.proxy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_serves_registered_route() {
        let mock = MockRightScaleClient::new().respond(Method::GET, "/api/clouds", 200, r#"[1]"#);

        let response = mock.execute(&ApiRequest::get("api/clouds")).await.unwrap();
        assert_eq!(response.data, Some(json!([1])));
        assert_eq!(mock.requests().len(), 1);
        assert!(!mock.uses_proxy());
    }

    #[tokio::test]
    async fn test_mock_queue_then_sticky_last() {
        let mock = MockRightScaleClient::new()
            .respond(Method::GET, "/a", 200, "1")
            .respond(Method::GET, "/a", 200, "2");

        for expected in [1, 2, 2] {
            let response = mock.execute(&ApiRequest::get("/a")).await.unwrap();
            assert_eq!(response.data, Some(json!(expected)));
        }
    }

    #[tokio::test]
    async fn test_mock_unmatched_is_not_found() {
        let mock = MockRightScaleClient::new().respond(Method::GET, "/a", 200, "1");
        let err = mock.execute(&ApiRequest::post("/a")).await.unwrap_err();
        assert!(matches!(err, Error::Api(ApiError::Client { .. })));
    }

    #[tokio::test]
    async fn test_mock_error_consumed_once() {
        let mock = MockRightScaleClient::new()
            .respond(Method::GET, "/a", 204, "")
            .fail_with(ApiError::InvalidResponse("broken".to_string()));

        assert!(mock.execute(&ApiRequest::get("/a")).await.is_err());
        assert!(mock.execute(&ApiRequest::get("/a")).await.is_ok());
        assert_eq!(mock.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_response_headers() {
        let mock = MockRightScaleClient::new().proxy(true).respond_with_headers(
            Method::POST,
            "/api/deployments",
            201,
            &[("Location", "/api/deployments/5")],
            "",
        );
        let response = mock.execute(&ApiRequest::post("/api/deployments")).await.unwrap();
        assert_eq!(response.location(), Some("/api/deployments/5"));
        assert!(mock.uses_proxy());
    }
}
