//! Bearer tokens for the management API.
//!
//! A token is either supplied as-is or obtained from Azure AD through the
//! OAuth2 client-credentials grant and cached until shortly before expiry.

use super::error::{AzureError, AzureResult};
use crate::config::AzureConfig;
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Refresh tokens this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// Fallback lifetime when the token response carries none.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// How requests are authenticated.
#[derive(Clone)]
pub enum AzureCredential {
    /// A pre-acquired bearer token.
    AccessToken(String),
    /// A service principal secret.
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
}

impl fmt::Debug for AzureCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AzureCredential::AccessToken(_) => f.write_str("AccessToken(<redacted>)"),
            AzureCredential::ClientSecret {
                tenant_id,
                client_id,
                ..
            } => f
                .debug_struct("ClientSecret")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .finish_non_exhaustive(),
        }
    }
}

impl AzureCredential {
    /// Pick a credential from configuration. A static token wins over a
    /// service principal.
    pub fn from_config(config: &AzureConfig) -> AzureResult<Self> {
        if let Some(token) = &config.access_token {
            return Ok(AzureCredential::AccessToken(token.clone()));
        }

        match (&config.tenant_id, &config.client_id, &config.client_secret) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => {
                Ok(AzureCredential::ClientSecret {
                    tenant_id: tenant_id.clone(),
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                })
            }
            _ => Err(AzureError::Authentication(
                "no credentials configured; set AZURE_ACCESS_TOKEN or \
                 AZURE_TENANT_ID, AZURE_CLIENT_ID and AZURE_CLIENT_SECRET"
                    .to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Hands out bearer tokens, refreshing them as needed.
pub struct TokenProvider {
    credential: AzureCredential,
    authority_host: String,
    scope: String,
    http: Client,
    cache: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(
        credential: AzureCredential,
        authority_host: impl Into<String>,
        resource_manager_endpoint: &str,
        http: Client,
    ) -> Self {
        Self {
            credential,
            authority_host: authority_host.into(),
            scope: format!("{}/.default", resource_manager_endpoint.trim_end_matches('/')),
            http,
            cache: Mutex::new(None),
        }
    }

    /// Return a valid bearer token.
    pub async fn token(&self) -> AzureResult<String> {
        let (tenant_id, client_id, client_secret) = match &self.credential {
            AzureCredential::AccessToken(token) => return Ok(token.clone()),
            AzureCredential::ClientSecret {
                tenant_id,
                client_id,
                client_secret,
            } => (tenant_id, client_id, client_secret),
        };

        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.expires_at > Instant::now() + EXPIRY_MARGIN {
                return Ok(cached.value.clone());
            }
        }

        let token_url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            tenant_id
        );
        debug!(tenant_id = %tenant_id, client_id = %client_id, "Requesting Azure AD token");

        let response = self
            .http
            .post(&token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AzureError::Authentication(format!(
                "token request failed ({}): {}",
                status, body
            )));
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = token
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME);

        *cache = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_token_wins() {
        let config = AzureConfig {
            access_token: Some("tok".into()),
            tenant_id: Some("t".into()),
            client_id: Some("c".into()),
            client_secret: Some("s".into()),
            ..AzureConfig::default()
        };
        assert!(matches!(
            AzureCredential::from_config(&config).unwrap(),
            AzureCredential::AccessToken(ref t) if t == "tok"
        ));
    }

    #[test]
    fn test_incomplete_service_principal() {
        let config = AzureConfig {
            tenant_id: Some("t".into()),
            client_id: Some("c".into()),
            ..AzureConfig::default()
        };
        let err = AzureCredential::from_config(&config).unwrap_err();
        assert!(matches!(err, AzureError::Authentication(_)));
    }

    #[test]
    fn test_debug_hides_secret() {
        let cred = AzureCredential::ClientSecret {
            tenant_id: "t".into(),
            client_id: "c".into(),
            client_secret: "hunter2".into(),
        };
        assert!(!format!("{:?}", cred).contains("hunter2"));
        assert!(!format!("{:?}", AzureCredential::AccessToken("abc".into())).contains("abc"));
    }

    #[tokio::test]
    async fn test_static_token_needs_no_request() {
        let provider = TokenProvider::new(
            AzureCredential::AccessToken("tok".into()),
            "http://127.0.0.1:1",
            "https://management.azure.com/",
            Client::new(),
        );
        assert_eq!(provider.token().await.unwrap(), "tok");
        assert_eq!(provider.scope, "https://management.azure.com/.default");
    }
}
