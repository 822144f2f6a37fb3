use super::auth::Credential;
use super::client::{Client, PollerConfig, RetryConfig};
use std::time::Duration;

/// Client with a static token, one retry and a fast poll interval
pub fn create_test_client(url: &str) -> Client {
    Client::with_config(
        url,
        Credential::AccessToken("test-token".to_string()),
        RetryConfig {
            max_retries: 1,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            timeout_seconds: 5,
        },
        PollerConfig {
            default_interval: Duration::from_millis(10),
        },
    )
    .unwrap()
}
