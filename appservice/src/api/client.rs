use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::auth::Credential;
use super::common::ArmErrorResponse;
use super::error::ApiError;
use super::pool::{ConnectionPoolConfig, ConnectionPoolManager};

const AZURE_ASYNC_OPERATION: &str = "azure-asyncoperation";

/// Azure Resource Manager client
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    credential: Credential,
    retry_config: RetryConfig,
    poller_config: PollerConfig,
    pool_manager: ConnectionPoolManager,
}

#[derive(Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            timeout_seconds: 30,
        }
    }
}

/// Long-running operation polling
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Used when the service sends no `Retry-After`
    pub default_interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            default_interval: Duration::from_secs(10),
        }
    }
}

/// A successful ARM response with the headers long-running operations use
#[derive(Debug, Clone)]
pub struct ArmResponse {
    pub status: u16,
    pub async_operation: Option<String>,
    pub location: Option<String>,
    pub retry_after: Option<Duration>,
    pub body: String,
}

impl ArmResponse {
    fn from_parts(status: u16, headers: &HeaderMap, body: String) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        Self {
            status,
            async_operation: header(AZURE_ASYNC_OPERATION),
            location: header(LOCATION.as_str()),
            retry_after: header(RETRY_AFTER.as_str())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs),
            body,
        }
    }

    /// Decode the body. An empty body decodes as JSON `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let text = if self.body.trim().is_empty() {
            "null"
        } else {
            self.body.as_str()
        };

        serde_json::from_str::<T>(text).map_err(|e| {
            tracing::error!("Failed to deserialize response: {}, body: {}", e, self.body);
            ApiError::ParseError(format!("Failed to parse response: {}", e))
        })
    }
}

impl Client {
    /// Create a new API client with default configuration
    pub fn new(endpoint: &str, credential: Credential) -> Result<Self, ApiError> {
        Self::with_config(
            endpoint,
            credential,
            RetryConfig::default(),
            PollerConfig::default(),
        )
    }

    /// Create a new API client with custom retry and polling configuration
    pub fn with_config(
        endpoint: &str,
        credential: Credential,
        retry_config: RetryConfig,
        poller_config: PollerConfig,
    ) -> Result<Self, ApiError> {
        url::Url::parse(endpoint)
            .map_err(|e| ApiError::ParseError(format!("invalid endpoint {:?}: {}", endpoint, e)))?;

        let pool_config = ConnectionPoolConfig {
            request_timeout: Duration::from_secs(retry_config.timeout_seconds),
            ..Default::default()
        };

        let pool_manager = ConnectionPoolManager::new(pool_config);
        let http_client = pool_manager.build_client()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url: endpoint.trim_end_matches('/').to_string(),
                credential,
                retry_config,
                poller_config,
                pool_manager,
            }),
        })
    }

    pub fn poller_config(&self) -> &PollerConfig {
        &self.inner.poller_config
    }

    /// Execute a GET request with retry logic
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(Method::GET, path, None::<&()>).await?.json()
    }

    /// Execute a POST request with retry logic
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(Method::POST, path, Some(body)).await?.json()
    }

    /// Execute a PUT request with retry logic
    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(Method::PUT, path, Some(body)).await?.json()
    }

    /// Execute a PATCH request with retry logic
    pub async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(Method::PATCH, path, Some(body)).await?.json()
    }

    /// Execute a DELETE request with retry logic
    pub async fn delete(&self, path: &str) -> Result<ArmResponse, ApiError> {
        self.send(Method::DELETE, path, None::<&()>).await
    }

    /// Execute a request and keep the raw response, for callers that need
    /// the long-running operation headers. `path` may also be an absolute
    /// URL as returned in `Azure-AsyncOperation` or `Location`.
    pub async fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<ArmResponse, ApiError> {
        let url = self.url(path);
        tracing::debug!("{} request to: {}", method, url);

        self.execute_with_retry(
            || {
                let builder = self.inner.http_client.request(method.clone(), &url);
                match body {
                    Some(b) => builder.json(b),
                    None => builder,
                }
            },
            path,
        )
        .await
    }

    /// Get connection pool statistics
    pub async fn get_connection_stats(&self) -> super::pool::ConnectionStats {
        self.inner.pool_manager.get_stats().await
    }

    /// `Microsoft.Web/sites` and slots
    pub fn sites(&self) -> super::sites::SitesApi<'_> {
        super::sites::SitesApi::new(self)
    }

    /// `Microsoft.Web/serverfarms`
    pub fn service_plans(&self) -> super::service_plans::ServicePlansApi<'_> {
        super::service_plans::ServicePlansApi::new(self)
    }

    /// `Microsoft.Web/staticSites`
    pub fn static_sites(&self) -> super::static_sites::StaticSitesApi<'_> {
        super::static_sites::StaticSitesApi::new(self)
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("https://") || path.starts_with("http://") {
            path.to_string()
        } else {
            format!("{}{}", self.inner.base_url, path)
        }
    }

    /// Execute request with retry logic
    async fn execute_with_retry<F>(&self, build: F, path: &str) -> Result<ArmResponse, ApiError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= self.inner.retry_config.max_retries {
            if attempt > 0 {
                let backoff = std::cmp::min(
                    self.inner.retry_config.initial_backoff_ms * (2_u64.pow(attempt - 1)),
                    self.inner.retry_config.max_backoff_ms,
                );
                tracing::debug!(
                    "Retrying request to {} after {}ms (attempt {})",
                    path,
                    backoff,
                    attempt
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            let token = self
                .inner
                .credential
                .bearer_token(&self.inner.http_client)
                .await?;

            match build().bearer_auth(token).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        self.inner.pool_manager.record_request(true).await;
                        let headers = response.headers().clone();
                        let text = response.text().await?;
                        tracing::debug!("API response body: {}", text);
                        return Ok(ArmResponse::from_parts(status.as_u16(), &headers, text));
                    }

                    self.inner.pool_manager.record_request(false).await;

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(ApiError::RateLimited);
                    } else if status.is_server_error() {
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return Err(self.handle_error_response(response, path).await);
                    }
                }
                Err(e) => {
                    self.inner.pool_manager.record_request(false).await;

                    if e.is_timeout() {
                        last_error =
                            Some(ApiError::Timeout(self.inner.retry_config.timeout_seconds));
                    } else if e.is_connect() || e.is_request() {
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return Err(ApiError::RequestError(e));
                    }
                }
            }

            attempt += 1;
        }

        Err(last_error.unwrap_or(ApiError::ServiceUnavailable))
    }

    /// Handle error response
    async fn handle_error_response(&self, response: reqwest::Response, path: &str) -> ApiError {
        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let (code, message) = match serde_json::from_str::<ArmErrorResponse>(&text) {
            Ok(err) => (err.error.code, err.error.message),
            Err(_) => (String::new(), text),
        };

        match status {
            reqwest::StatusCode::NOT_FOUND => ApiError::NotFound(path.to_string()),
            reqwest::StatusCode::UNAUTHORIZED => ApiError::AuthError(message),
            _ => ApiError::Api {
                status: status.as_u16(),
                code,
                message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::Server;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Thing {
        name: String,
    }

    #[tokio::test]
    async fn get_sends_bearer_token_and_parses_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/things/a")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_body(r#"{"name":"a"}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let thing: Thing = client.get("/things/a").await.unwrap();
        assert_eq!(thing.name, "a");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn not_found_is_distinguished() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/things/missing")
            .with_status(404)
            .with_body(r#"{"error":{"code":"ResourceNotFound","message":"gone"}}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let err = client.get::<Thing>("/things/missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn arm_error_body_is_surfaced() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("PUT", "/things/a")
            .with_status(409)
            .with_body(r#"{"error":{"code":"Conflict","message":"operation in progress"}}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let err = client
            .put::<(), _>("/things/a", &serde_json::json!({}))
            .await
            .unwrap_err();
        match err {
            ApiError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 409);
                assert_eq!(code, "Conflict");
                assert_eq!(message, "operation in progress");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/things/flaky")
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let err = client.get::<Thing>("/things/flaky").await.unwrap_err();
        assert!(matches!(err, ApiError::ServiceUnavailable));
        mock.assert_async().await;

        let stats = client.get_connection_stats().await;
        assert_eq!(stats.failed_requests, 2);
    }

    #[tokio::test]
    async fn empty_body_decodes_as_unit() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("DELETE", "/things/a")
            .with_status(204)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let response = client.delete("/things/a").await.unwrap();
        assert_eq!(response.status, 204);
        response.json::<()>().unwrap();
    }

    #[tokio::test]
    async fn long_running_headers_are_captured() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/things/a/swap")
            .with_status(202)
            .with_header("Azure-AsyncOperation", "https://example.test/ops/1")
            .with_header("Location", "https://example.test/results/1")
            .with_header("Retry-After", "7")
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let response = client
            .send(Method::POST, "/things/a/swap", Some(&serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status, 202);
        assert_eq!(
            response.async_operation.as_deref(),
            Some("https://example.test/ops/1")
        );
        assert_eq!(
            response.location.as_deref(),
            Some("https://example.test/results/1")
        );
        assert_eq!(response.retry_after, Some(Duration::from_secs(7)));
    }

    #[test]
    fn rejects_invalid_endpoint() {
        let result = Client::new("not a url", Credential::AccessToken("t".into()));
        assert!(matches!(result, Err(ApiError::ParseError(_))));
    }
}
