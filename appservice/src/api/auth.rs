//! Azure AD credentials for ARM requests
//!
//! Either a pre-acquired bearer token, or a service principal using the
//! client-credentials grant against the Microsoft Identity Platform v2.0
//! token endpoint. Tokens from the grant are cached until shortly before
//! they expire.

use super::error::ApiError;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

/// Tokens are refreshed this long before their reported expiry
const EXPIRY_MARGIN_SECS: i64 = 300;

pub enum Credential {
    AccessToken(String),
    ClientSecret(ClientSecretCredential),
}

impl Credential {
    pub async fn bearer_token(&self, http: &reqwest::Client) -> Result<String, ApiError> {
        match self {
            Credential::AccessToken(token) => Ok(token.clone()),
            Credential::ClientSecret(credential) => credential.token(http).await,
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::AccessToken(_) => f.write_str("AccessToken(..)"),
            Credential::ClientSecret(c) => write!(f, "ClientSecret({})", c.client_id),
        }
    }
}

pub struct ClientSecretCredential {
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS) < expires_at,
            None => true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
}

impl ClientSecretCredential {
    /// `authority_host` is e.g. `https://login.microsoftonline.com`, and
    /// `resource` the Resource Manager endpoint the token is scoped to.
    pub fn new(
        authority_host: &str,
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
        resource: &str,
    ) -> Self {
        Self {
            token_url: token_url(authority_host, tenant_id),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            scope: format!("{}/.default", resource.trim_end_matches('/')),
            cached: Mutex::new(None),
        }
    }

    async fn token(&self, http: &reqwest::Client) -> Result<String, ApiError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        tracing::debug!("Requesting Azure AD token from {}", self.token_url);

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];
        let response = http.post(&self.token_url).form(&form).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!("Token request failed with HTTP {}: {}", status, text);
            return Err(ApiError::AuthError(format!(
                "token request for client {} returned HTTP {}",
                self.client_id,
                status.as_u16()
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&text)
            .map_err(|e| ApiError::ParseError(format!("Failed to parse token response: {}", e)))?;
        let token = token_from_response(parsed);
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }
}

fn token_url(authority_host: &str, tenant_id: &str) -> String {
    format!(
        "{}/{}/oauth2/v2.0/token",
        authority_host.trim_end_matches('/'),
        tenant_id
    )
}

fn token_from_response(response: TokenResponse) -> CachedToken {
    // Some endpoints report expires_in as a string
    let seconds = match response.expires_in {
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.parse::<i64>().ok(),
        _ => None,
    };

    CachedToken {
        access_token: response.access_token,
        expires_at: seconds.map(|s| Utc::now() + Duration::seconds(s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[test]
    fn token_url_construction() {
        assert_eq!(
            token_url("https://login.microsoftonline.com/", "tenant-1"),
            "https://login.microsoftonline.com/tenant-1/oauth2/v2.0/token"
        );
    }

    #[test]
    fn expiry_accepts_string_seconds() {
        let token = token_from_response(TokenResponse {
            access_token: "abc".to_string(),
            expires_in: Some(serde_json::json!("3599")),
        });
        assert!(token.is_fresh());

        let stale = token_from_response(TokenResponse {
            access_token: "abc".to_string(),
            expires_in: Some(serde_json::json!(60)),
        });
        assert!(!stale.is_fresh());
    }

    #[tokio::test]
    async fn client_secret_token_is_cached() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/tenant-1/oauth2/v2.0/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
                Matcher::UrlEncoded("client_id".into(), "app".into()),
                Matcher::UrlEncoded(
                    "scope".into(),
                    "https://management.azure.com/.default".into(),
                ),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"token-1","expires_in":3599}"#)
            .expect(1)
            .create_async()
            .await;

        let credential = Credential::ClientSecret(ClientSecretCredential::new(
            &server.url(),
            "tenant-1",
            "app",
            "secret",
            "https://management.azure.com/",
        ));
        let http = reqwest::Client::new();

        assert_eq!(credential.bearer_token(&http).await.unwrap(), "token-1");
        assert_eq!(credential.bearer_token(&http).await.unwrap(), "token-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_credentials_are_auth_errors() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/tenant-1/oauth2/v2.0/token")
            .with_status(401)
            .with_body(r#"{"error":"invalid_client"}"#)
            .create_async()
            .await;

        let credential = ClientSecretCredential::new(
            &server.url(),
            "tenant-1",
            "app",
            "wrong",
            "https://management.azure.com",
        );
        let err = credential.token(&reqwest::Client::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::AuthError(_)));
    }
}
