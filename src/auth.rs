//! Azure AD session management
//!
//! Client-credential token acquisition against the v2.0 token endpoint. A
//! session is bound to a (tenant, subscription) pair; asking for a different
//! pair, or reusing a session close to expiry, triggers re-authentication.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::Config;
use crate::error::{Error, Result};

/// Default Azure AD authority
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// OAuth scope for the Azure Resource Manager API
pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// Sessions within this window of expiry are treated as stale
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Service principal credentials
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    /// Resolve credentials from the environment, falling back to the profile
    /// config. Env wins, matching the CLI/env/config precedence elsewhere.
    pub fn resolve(config: &Config) -> Result<Self> {
        let client_id = std::env::var("AZURE_CLIENT_ID")
            .ok()
            .or_else(|| config.client_id.clone())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                Error::Auth("missing client id (AZURE_CLIENT_ID or config client_id)".into())
            })?;
        let client_secret = std::env::var("AZURE_CLIENT_SECRET")
            .ok()
            .or_else(|| config.client_secret.clone())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                Error::Auth("missing client secret (AZURE_CLIENT_SECRET or config client_secret)".into())
            })?;
        Ok(Self {
            client_id,
            client_secret,
        })
    }
}

/// An authenticated management session
#[derive(Debug, Clone)]
pub struct AadSession {
    tenant_id: String,
    subscription_id: String,
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl AadSession {
    pub fn token(&self) -> &str {
        &self.access_token
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    fn is_valid_for(&self, tenant_id: &str, subscription_id: &str) -> bool {
        self.tenant_id == tenant_id
            && self.subscription_id == subscription_id
            && Utc::now() + chrono::Duration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: String,
}

pub struct SessionManager {
    authority: String,
    credentials: Credentials,
    http: reqwest::Client,
    session: Option<AadSession>,
}

impl SessionManager {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            authority: DEFAULT_AUTHORITY.to_string(),
            credentials,
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            session: None,
        }
    }

    /// Override the Azure AD authority URL
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }

    /// Return a session scoped to (tenant, subscription), authenticating if
    /// there is no cached session for that pair or the token is about to
    /// expire.
    pub async fn ensure(&mut self, tenant_id: &str, subscription_id: &str) -> Result<&AadSession> {
        let cached = matches!(&self.session, Some(s) if s.is_valid_for(tenant_id, subscription_id));
        if cached {
            tracing::debug!(tenant = %tenant_id, "reusing cached session");
        } else {
            tracing::info!(tenant = %tenant_id, subscription = %subscription_id, "acquiring management token");
            let session = self.authenticate(tenant_id, subscription_id).await?;
            self.session = Some(session);
        }
        match &self.session {
            Some(session) => Ok(session),
            None => Err(Error::Auth("no session established".into())),
        }
    }

    async fn authenticate(&self, tenant_id: &str, subscription_id: &str) -> Result<AadSession> {
        let url = format!("{}/{}/oauth2/v2.0/token", self.authority, tenant_id);
        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("scope", MANAGEMENT_SCOPE),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.bytes().await?;
            let message = match serde_json::from_slice::<TokenErrorResponse>(&body) {
                Ok(e) if !e.error_description.is_empty() => {
                    format!("{}: {}", e.error, e.error_description)
                }
                Ok(e) => e.error,
                Err(_) => format!("token endpoint returned {}", status),
            };
            return Err(Error::Auth(message));
        }

        let token: TokenResponse = response.json().await?;
        Ok(AadSession {
            tenant_id: tenant_id.to_string(),
            subscription_id: subscription_id.to_string(),
            access_token: token.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(token.expires_in as i64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> Credentials {
        Credentials {
            client_id: "app-id".into(),
            client_secret: "app-secret".into(),
        }
    }

    fn token_body(token: &str) -> serde_json::Value {
        json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": token,
        })
    }

    #[tokio::test]
    async fn acquires_token_with_client_credentials_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=app-id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok-1")))
            .expect(1)
            .mount(&server)
            .await;

        let mut sessions = SessionManager::new(credentials()).with_authority(server.uri());
        let session = sessions.ensure("tenant-1", "sub-1").await.unwrap();
        assert_eq!(session.token(), "tok-1");
        assert_eq!(session.subscription_id(), "sub-1");
    }

    #[tokio::test]
    async fn reuses_session_for_same_scope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok-1")))
            .expect(1)
            .mount(&server)
            .await;

        let mut sessions = SessionManager::new(credentials()).with_authority(server.uri());
        sessions.ensure("tenant-1", "sub-1").await.unwrap();
        sessions.ensure("tenant-1", "sub-1").await.unwrap();
    }

    #[tokio::test]
    async fn reauthenticates_when_subscription_changes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok-1")))
            .expect(2)
            .mount(&server)
            .await;

        let mut sessions = SessionManager::new(credentials()).with_authority(server.uri());
        sessions.ensure("tenant-1", "sub-1").await.unwrap();
        let session = sessions.ensure("tenant-1", "sub-2").await.unwrap();
        assert_eq!(session.subscription_id(), "sub-2");
    }

    #[tokio::test]
    async fn surfaces_aad_error_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": "invalid_client",
                "error_description": "AADSTS7000215: Invalid client secret provided.",
            })))
            .mount(&server)
            .await;

        let mut sessions = SessionManager::new(credentials()).with_authority(server.uri());
        let err = sessions.ensure("tenant-1", "sub-1").await.unwrap_err();
        match err {
            Error::Auth(message) => assert!(message.contains("AADSTS7000215")),
            other => panic!("expected auth error, got {other:?}"),
        }
    }
}
