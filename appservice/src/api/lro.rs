//! Long-running operation polling
//!
//! ARM answers slow mutations with `201`/`202` and either an
//! `Azure-AsyncOperation` status URL or a `Location` URL. The poller follows
//! whichever was returned until the operation reaches a terminal state or the
//! caller's [`Context`] is cancelled.

use super::client::{ArmResponse, Client};
use super::common::ArmErrorBody;
use super::error::ApiError;
use reqwest::Method;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tfplug::Context;

#[derive(Debug, Clone, PartialEq)]
enum PollState {
    Done,
    AsyncOperation(String),
    Location(String),
}

#[derive(Debug, Deserialize)]
struct OperationStatus {
    #[serde(default)]
    status: String,
    #[serde(default)]
    error: Option<ArmErrorBody>,
}

pub struct Poller<'a> {
    client: &'a Client,
    state: PollState,
    retry_after: Option<Duration>,
}

impl<'a> Poller<'a> {
    pub fn new(client: &'a Client, response: &ArmResponse) -> Self {
        let state = match (&response.async_operation, &response.location) {
            (Some(url), _) if response.status == 201 || response.status == 202 => {
                PollState::AsyncOperation(url.clone())
            }
            (None, Some(url)) if response.status == 202 => PollState::Location(url.clone()),
            _ => PollState::Done,
        };

        Self {
            client,
            state,
            retry_after: response.retry_after,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == PollState::Done
    }

    /// Block until the operation completes, fails or `ctx` is done
    pub async fn poll_until_done(mut self, ctx: &Context) -> Result<(), ApiError> {
        loop {
            if self.is_done() {
                return Ok(());
            }

            let wait = self
                .retry_after
                .unwrap_or(self.client.poller_config().default_interval);
            race(ctx, tokio::time::sleep(wait)).await?;

            self.state = match self.state.clone() {
                PollState::Done => PollState::Done,
                PollState::AsyncOperation(url) => {
                    let response = race(ctx, self.client.send(Method::GET, &url, None::<&()>))
                        .await??;
                    self.retry_after = response.retry_after;
                    let operation: OperationStatus = response.json()?;
                    tracing::debug!("Operation {} status: {}", url, operation.status);

                    match operation.status.to_ascii_lowercase().as_str() {
                        "succeeded" => PollState::Done,
                        "failed" | "canceled" | "cancelled" => {
                            let message = operation.error.map(|e| e.message).unwrap_or_default();
                            return Err(ApiError::OperationFailed {
                                status: operation.status,
                                message,
                            });
                        }
                        _ => PollState::AsyncOperation(url),
                    }
                }
                PollState::Location(url) => {
                    let response = race(ctx, self.client.send(Method::GET, &url, None::<&()>))
                        .await??;
                    self.retry_after = response.retry_after;
                    if response.status == 202 {
                        PollState::Location(url)
                    } else {
                        PollState::Done
                    }
                }
            };
        }
    }
}

/// Run `fut` unless `ctx` is cancelled first
pub(crate) async fn race<F: Future>(ctx: &Context, fut: F) -> Result<F::Output, ApiError> {
    tokio::select! {
        output = fut => Ok(output),
        reason = ctx.cancelled() => Err(ApiError::Cancelled(reason.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::Server;

    fn accepted(async_operation: Option<String>, location: Option<String>) -> ArmResponse {
        ArmResponse {
            status: 202,
            async_operation,
            location,
            retry_after: None,
            body: String::new(),
        }
    }

    #[tokio::test]
    async fn completed_response_needs_no_polling() {
        let client = create_test_client("http://127.0.0.1:1");
        let response = ArmResponse {
            status: 200,
            async_operation: None,
            location: None,
            retry_after: None,
            body: "{}".to_string(),
        };
        let poller = Poller::new(&client, &response);
        assert!(poller.is_done());
        poller.poll_until_done(&Context::new()).await.unwrap();
    }

    #[tokio::test]
    async fn async_operation_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/operations/1")
            .with_status(200)
            .with_body(r#"{"status":"Succeeded"}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let response = accepted(Some(format!("{}/operations/1", server.url())), None);
        Poller::new(&client, &response)
            .poll_until_done(&Context::new())
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn async_operation_failure_carries_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/operations/2")
            .with_status(200)
            .with_body(r#"{"status":"Failed","error":{"code":"SwapFailed","message":"slot is busy"}}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let response = accepted(Some(format!("{}/operations/2", server.url())), None);
        let err = Poller::new(&client, &response)
            .poll_until_done(&Context::new())
            .await
            .unwrap_err();
        match err {
            ApiError::OperationFailed { status, message } => {
                assert_eq!(status, "Failed");
                assert_eq!(message, "slot is busy");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn location_polling_finishes_on_ok() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/results/1")
            .with_status(200)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let response = accepted(None, Some(format!("{}/results/1", server.url())));
        Poller::new(&client, &response)
            .poll_until_done(&Context::new())
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn deadline_stops_polling() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/operations/slow")
            .with_status(200)
            .with_body(r#"{"status":"InProgress"}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let response = accepted(Some(format!("{}/operations/slow", server.url())), None);
        let ctx = Context::new().with_timeout(Duration::from_millis(100));

        let err = Poller::new(&client, &response)
            .poll_until_done(&ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Cancelled(_)));
        assert!(err.to_string().starts_with("waiting for completion"));
    }
}
