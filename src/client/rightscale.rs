//! RightScale API client implementation

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, LOCATION, USER_AGENT};
use reqwest::{Client as HttpClient, Method, StatusCode};

use super::auth::{self, Credential, ProxyEndpoint, SECRET_HEADER};
use super::response::classify;
use super::{ApiRequest, Response, RetryPolicy, RightScaleApi};
use crate::error::{ApiError, Result};
use crate::recording::{Exchange, ExchangeSink};

/// API version sent with every request unless overridden
pub const DEFAULT_API_VERSION: &str = "1.5";

/// Client identifier sent as the user agent
pub const CLIENT_NAME: &str = "rs-api";

/// Upper bound on a single attempt
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Tunables shared by both connection modes
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub api_version: String,
    pub account: Option<String>,
    /// Dump full requests and responses when a call fails
    pub debug: bool,
    pub retry: RetryPolicy,
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            account: None,
            debug: false,
            retry: RetryPolicy::default(),
            timeout: REQUEST_TIMEOUT,
        }
    }
}

/// RightScale API client, either through the RightLink10 proxy or direct
pub struct RightScaleClient {
    http: HttpClient,
    server: String,
    credential: Option<Credential>,
    options: ClientOptions,
    recorder: Option<Arc<dyn ExchangeSink>>,
}

impl RightScaleClient {
    /// Create a client for `server` ("http[s]://host[:port]")
    pub fn new(
        server: impl Into<String>,
        credential: Option<Credential>,
        options: ClientOptions,
    ) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        let server = server.into().trim_end_matches('/').to_string();

        Ok(Self {
            http,
            server,
            credential,
            options,
            recorder: None,
        })
    }

    /// Client talking to the local RightLink10 proxy. No network round trip.
    pub fn proxy(endpoint: &ProxyEndpoint, options: ClientOptions) -> Result<Self> {
        debug!("Using RightLink10 proxy at {}", endpoint.base_url());
        Self::new(endpoint.base_url(), Some(endpoint.credential()), options)
    }

    /// Client talking straight to the platform; performs the token exchange now.
    pub async fn direct(host: &str, api_key: &str, options: ClientOptions) -> Result<Self> {
        let server = if host.starts_with("https:") || host.starts_with("http:") {
            host.to_string()
        } else {
            format!("https://{}", host)
        };
        debug!("Going direct to {}", server);

        let mut client = Self::new(server, None, options)?;
        let credential = auth::authenticate(&client, api_key).await?;
        client.credential = Some(credential);
        Ok(client)
    }

    /// Mirror every completed exchange into `sink`
    pub fn with_recorder(mut self, sink: Arc<dyn ExchangeSink>) -> Self {
        self.recorder = Some(sink);
        self
    }

    #[allow(dead_code)]
    pub fn server(&self) -> &str {
        &self.server
    }

    fn make_url(&self, request: &ApiRequest) -> String {
        let mut url = format!("{}{}", self.server, request.normalized_path());
        if !request.query.is_empty() {
            url.push('?');
            url.push_str(&request.query.encode());
        }
        url
    }

    fn build_request(&self, request: &ApiRequest, url: &str) -> Result<reqwest::Request> {
        let mut builder = self.http.request(request.method.clone(), url);

        if let Some(credential) = &self.credential {
            builder = credential.apply(builder);
        }
        if let Some(account) = &self.options.account {
            builder = builder.header("X-Account", account);
        }
        builder = builder
            .header("X-API-Version", &self.options.api_version)
            .header(USER_AGENT, CLIENT_NAME);

        if let Some(content_type) = &request.content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        builder
            .build()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()).into())
    }

    /// Send one attempt and read the whole body
    async fn send(
        &self,
        request: reqwest::Request,
    ) -> reqwest::Result<(StatusCode, HeaderMap, Vec<u8>)> {
        let response = self.http.execute(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok((status, headers, body.to_vec()))
    }

    fn log_response(
        &self,
        method: &Method,
        path: &str,
        status: StatusCode,
        headers: &HeaderMap,
        raw: &[u8],
        request_dump: Option<&str>,
    ) {
        if status == StatusCode::MOVED_PERMANENTLY || status == StatusCode::FOUND {
            let target = headers
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("<none>");
            debug!("HTTP {} redirect to {}", method, target);
        } else if status.is_client_error() || status.is_server_error() {
            match request_dump {
                Some(dump) => {
                    debug!("HTTP {} {} returned {}", method, path, status);
                    debug!("===== REQUEST =====\n{}", dump);
                    debug!(
                        "===== RESPONSE =====\n{}",
                        dump_response(status, headers, raw)
                    );
                }
                None => info!(
                    "HTTP {} {} returned {}: {}",
                    method,
                    path,
                    status,
                    String::from_utf8_lossy(raw)
                ),
            }
        } else {
            debug!("HTTP {} {} -> {}", method, path, status);
        }
    }

    fn record(&self, exchange: Exchange) {
        if let Some(sink) = &self.recorder {
            if let Err(err) = sink.record(exchange) {
                warn!("Failed to record HTTP exchange: {}", err);
            }
        }
    }
}

#[async_trait]
impl RightScaleApi for RightScaleClient {
    async fn execute(&self, request: &ApiRequest) -> Result<Response> {
        let method = &request.method;
        let path = request.normalized_path();
        let url = self.make_url(request);
        let max_attempts = self.options.retry.max_attempts();

        let mut attempt = 1;
        loop {
            let http_request = self.build_request(request, &url)?;
            let request_headers = http_request.headers().clone();
            let dump = self.options.debug.then(|| dump_request(&http_request));

            let (status, headers, raw) = match self.send(http_request).await {
                Ok(parts) => parts,
                Err(err) => {
                    debug!("HTTP {} '{}' error: {}", method, path, err);
                    if self.options.retry.should_retry_transport(attempt) {
                        attempt += 1;
                        debug!("Retrying {} {} (attempt {}/{})", method, path, attempt, max_attempts);
                        continue;
                    }
                    return Err(ApiError::transport(method, &path, &err).into());
                }
            };

            self.log_response(method, &path, status, &headers, &raw, dump.as_deref());

            if self.options.retry.should_retry_status(status, attempt) {
                attempt += 1;
                debug!("Retrying {} {} (attempt {}/{})", method, path, attempt, max_attempts);
                continue;
            }

            self.record(Exchange::new(
                method,
                &url,
                &request_headers,
                request.body.as_deref(),
                status,
                &headers,
                &raw,
            ));

            return classify(method, &path, status, headers, raw);
        }
    }

    fn uses_proxy(&self) -> bool {
        self.credential.as_ref().is_some_and(Credential::is_proxy)
    }
}

/// Render a request roughly as it goes on the wire, credentials hidden
fn dump_request(request: &reqwest::Request) -> String {
    let url = request.url();
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }

    let mut out = format!("{} {} HTTP/1.1\r\n", request.method(), target);
    if let Some(host) = url.host_str() {
        match url.port() {
            Some(port) => out.push_str(&format!("Host: {}:{}\r\n", host, port)),
            None => out.push_str(&format!("Host: {}\r\n", host)),
        }
    }
    for (name, value) in request.headers() {
        let value = if *name == AUTHORIZATION {
            "Bearer <hidden>".to_string()
        } else if name.as_str().eq_ignore_ascii_case(SECRET_HEADER) {
            "<hidden>".to_string()
        } else {
            String::from_utf8_lossy(value.as_bytes()).into_owned()
        };
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    out.push_str("\r\n");
    if let Some(body) = request.body().and_then(|b| b.as_bytes()) {
        out.push_str(&String::from_utf8_lossy(body));
    }
    out
}

fn dump_response(status: StatusCode, headers: &HeaderMap, raw: &[u8]) -> String {
    let mut out = format!("HTTP/1.1 {}\r\n", status);
    for (name, value) in headers {
        out.push_str(&format!(
            "{}: {}\r\n",
            name,
            String::from_utf8_lossy(value.as_bytes())
        ));
    }
    out.push_str("\r\n");
    out.push_str(&String::from_utf8_lossy(raw));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::QueryArgs;
    use crate::error::Error;
    use crate::recording::Recorder;
    use mockito::Matcher;
    use serde_json::json;

    fn proxy_client(server: &mockito::ServerGuard) -> RightScaleClient {
        RightScaleClient::new(
            server.url(),
            Some(Credential::Proxy {
                secret: "s3cret".to_string(),
            }),
            ClientOptions::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_sends_standard_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/things")
            .match_query(Matcher::Missing)
            .match_header("x-rll-secret", "s3cret")
            .match_header("x-api-version", "1.6")
            .match_header("x-account", "71")
            .match_header("user-agent", "rs-api")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"x":1}"#)
            .create_async()
            .await;

        let options = ClientOptions {
            api_version: "1.6".to_string(),
            account: Some("71".to_string()),
            ..ClientOptions::default()
        };
        let client = RightScaleClient::new(
            server.url(),
            Some(Credential::Proxy {
                secret: "s3cret".to_string(),
            }),
            options,
        )
        .unwrap();

        let response = client.execute(&ApiRequest::get("/things")).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.data, Some(json!({"x": 1})));
        assert!(client.uses_proxy());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_path_without_slash_and_query_args() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/servers")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("filter[]".into(), "name==web".into()),
                Matcher::UrlEncoded("view".into(), "expanded".into()),
            ]))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = proxy_client(&server);
        let query = QueryArgs::new()
            .with("filter[]", "name==web")
            .with("view", "expanded");
        let response = client
            .execute(&ApiRequest::get("api/servers").query(query))
            .await
            .unwrap();
        assert_eq!(response.data, Some(json!([])));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_retried_three_times() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/clouds")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .expect(3)
            .create_async()
            .await;

        let client = proxy_client(&server);
        let err = client
            .execute(&ApiRequest::get("/api/clouds"))
            .await
            .unwrap_err();

        match &err {
            Error::Api(api @ ApiError::Server { .. }) => {
                assert_eq!(api.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
                assert_eq!(api.response().unwrap().error_message.as_deref(), Some("boom"));
            }
            other => panic!("Expected server error, got {:?}", other),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/api/servers/9")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body("Resource not found")
            .expect(1)
            .create_async()
            .await;

        let client = proxy_client(&server);
        let err = client
            .execute(&ApiRequest::delete("/api/servers/9"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Api(ApiError::Client { .. })));
        assert_eq!(err.details(), Some("Resource not found"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_custom_retry_ceiling() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/clouds")
            .match_query(Matcher::Any)
            .with_status(503)
            .expect(1)
            .create_async()
            .await;

        let options = ClientOptions {
            retry: RetryPolicy::never(),
            ..ClientOptions::default()
        };
        let client = RightScaleClient::new(server.url(), None, options).unwrap();
        assert!(client.execute(&ApiRequest::get("/api/clouds")).await.is_err());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces_after_retries() {
        // Nothing listens on port 1
        let client = RightScaleClient::new("http://127.0.0.1:1", None, ClientOptions::default())
            .unwrap();
        let err = client
            .execute(&ApiRequest::get("/api/clouds"))
            .await
            .unwrap_err();
        match err {
            Error::Api(ApiError::Transport { method, path, .. }) => {
                assert_eq!(method, Method::GET);
                assert_eq!(path, "/api/clouds");
            }
            other => panic!("Expected transport error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transport_failures_use_every_attempt() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        // Accepts and immediately hangs up
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let seen = connections.clone();
        let acceptor = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                seen.fetch_add(1, Ordering::SeqCst);
                drop(stream);
            }
        });

        let client = RightScaleClient::new(format!("http://{}", addr), None, ClientOptions::default())
            .unwrap();
        let err = client
            .execute(&ApiRequest::get("/api/clouds"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Api(ApiError::Transport { .. })), "{:?}", err);
        assert_eq!(connections.load(Ordering::SeqCst), 3);

        let options = ClientOptions {
            retry: RetryPolicy::never(),
            ..ClientOptions::default()
        };
        let client = RightScaleClient::new(format!("http://{}", addr), None, options).unwrap();
        assert!(client.execute(&ApiRequest::get("/api/clouds")).await.is_err());
        assert_eq!(connections.load(Ordering::SeqCst), 4);

        acceptor.abort();
    }

    #[tokio::test]
    async fn test_put_with_body_and_content_type() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/rll/env/RS_SELF_HREF")
            .match_query(Matcher::Any)
            .match_header("content-type", "text/plain")
            .match_body(Matcher::Exact("/api/clouds/1/instances/ABC".to_string()))
            .with_status(204)
            .create_async()
            .await;

        let client = proxy_client(&server);
        let response = client
            .execute(
                &ApiRequest::put("/rll/env/RS_SELF_HREF")
                    .body("text/plain", "/api/clouds/1/instances/ABC"),
            )
            .await
            .unwrap();
        assert!(response.data.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_direct_client_exchanges_token_then_sends_bearer() {
        let mut server = mockito::Server::new_async().await;
        let oauth = server
            .mock("POST", "/api/oauth2")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "my-api-key".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"tok-abc","expires_in":7200}"#)
            .expect(1)
            .create_async()
            .await;
        let clouds = server
            .mock("GET", "/api/clouds")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer tok-abc")
            .match_header("x-rll-secret", Matcher::Missing)
            .with_status(200)
            .with_body(r#"[{"name":"EC2"}]"#)
            .create_async()
            .await;

        let client = RightScaleClient::direct(&server.url(), "my-api-key", ClientOptions::default())
            .await
            .unwrap();
        assert!(!client.uses_proxy());

        let response = client.execute(&ApiRequest::get("/api/clouds")).await.unwrap();
        assert_eq!(response.data, Some(json!([{"name": "EC2"}])));
        oauth.assert_async().await;
        clouds.assert_async().await;
    }

    #[tokio::test]
    async fn test_direct_client_fails_when_exchange_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _oauth = server
            .mock("POST", "/api/oauth2")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"error_description":"expired"}"#)
            .create_async()
            .await;

        let err = RightScaleClient::direct(&server.url(), "old-key", ClientOptions::default())
            .await
            .err()
            .expect("authentication should fail");
        assert!(matches!(err, Error::Auth(_)));
        assert!(err.to_string().contains("expired"));
    }

    #[tokio::test]
    async fn test_recorder_sees_final_exchange_without_secrets() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/deployments")
            .match_query(Matcher::Any)
            .with_status(201)
            .with_header("location", "/api/deployments/77")
            .with_header("set-cookie", "session=1")
            .create_async()
            .await;

        let recorder = Arc::new(Recorder::new());
        let client = proxy_client(&server).with_recorder(recorder.clone());
        let query = QueryArgs::new().with("deployment[name]", "web");
        let response = client
            .execute(&ApiRequest::post("/api/deployments").query(query))
            .await
            .unwrap();
        assert_eq!(response.location(), Some("/api/deployments/77"));

        let exchanges = recorder.exchanges();
        assert_eq!(exchanges.len(), 1);
        let exchange = &exchanges[0];
        assert_eq!(exchange.verb, "POST");
        assert!(exchange.uri.ends_with("/api/deployments?deployment%5Bname%5D=web"));
        assert_eq!(exchange.status, 201);
        assert!(!exchange.req_header.contains_key("x-rll-secret"));
        assert!(!exchange.req_header.contains_key("user-agent"));
        assert_eq!(exchange.req_header["x-api-version"], vec!["1.5".to_string()]);
        assert_eq!(
            exchange.resp_header["location"],
            vec!["/api/deployments/77".to_string()]
        );
        assert!(!exchange.resp_header.contains_key("set-cookie"));
    }

    #[test]
    fn test_dump_request_hides_credentials() {
        let client = RightScaleClient::new(
            "http://localhost:8080",
            Some(Credential::Direct {
                access_token: "very-secret".to_string(),
            }),
            ClientOptions::default(),
        )
        .unwrap();
        let request = ApiRequest::get("/api/clouds").query(QueryArgs::new().with("view", "default"));
        let http_request = client
            .build_request(&request, &client.make_url(&request))
            .unwrap();

        let dump = dump_request(&http_request);
        assert!(dump.starts_with("GET /api/clouds?view=default HTTP/1.1\r\n"));
        assert!(dump.contains("Host: localhost:8080"));
        assert!(dump.contains("authorization: Bearer <hidden>"));
        assert!(!dump.contains("very-secret"));
    }

    #[test]
    fn test_server_trailing_slash_trimmed() {
        let client =
            RightScaleClient::new("https://us-3.rightscale.com/", None, ClientOptions::default())
                .unwrap();
        assert_eq!(client.server(), "https://us-3.rightscale.com");
        assert_eq!(
            client.make_url(&ApiRequest::get("api/clouds")),
            "https://us-3.rightscale.com/api/clouds"
        );
    }
}
