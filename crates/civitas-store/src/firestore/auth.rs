//! OAuth access tokens for Google APIs.
//!
//! Implements the JWT bearer grant with a service-account key. Tokens are
//! cached and refreshed shortly before they expire.

use crate::credentials::ServiceAccountKey;
use async_trait::async_trait;
use civitas_core::{Error, Result};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Default Google OAuth token endpoint
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
/// Scope granting Firestore access
const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
/// Refresh this many seconds before expiry
const EXPIRY_SAFETY_WINDOW: i64 = 300;

/// Source of bearer tokens for outbound requests
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Fixed token, for emulators and tests
pub struct StaticToken(pub String);

#[async_trait]
impl AccessTokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    exp_unix: i64,
}

/// Service account token provider with in-memory caching
pub struct ServiceAccountTokenProvider {
    key: ServiceAccountKey,
    http: reqwest::Client,
    // Held across refresh so concurrent callers wait for one fetch
    cache: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenProvider {
    pub fn new(key: ServiceAccountKey, http: reqwest::Client) -> Self {
        Self {
            key,
            http,
            cache: Mutex::new(None),
        }
    }

    fn token_uri(&self) -> &str {
        self.key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }

    fn sign_assertion(&self, now: i64) -> Result<String> {
        let claims = Claims {
            iss: &self.key.client_email,
            scope: DATASTORE_SCOPE,
            aud: self.token_uri(),
            iat: now,
            exp: now + 3600,
        };

        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| Error::config(format!("Invalid RSA private key (PEM): {}", e)))?;
        encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| Error::config(format!("Failed to sign JWT: {}", e)))
    }

    async fn fetch_new_token(&self) -> Result<CachedToken> {
        let now = chrono::Utc::now().timestamp();
        let assertion = self.sign_assertion(now)?;

        let form = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion.as_str()),
        ];

        let response = self
            .http
            .post(self.token_uri())
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::upstream(format!("Token endpoint request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| Error::upstream(format!("Token endpoint returned error: {}", e)))?;

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::upstream(format!("Failed to parse token response: {}", e)))?;

        tracing::debug!("Obtained access token valid for {}s", token.expires_in);

        Ok(CachedToken {
            token: token.access_token,
            exp_unix: now + token.expires_in,
        })
    }
}

#[async_trait]
impl AccessTokenProvider for ServiceAccountTokenProvider {
    async fn access_token(&self) -> Result<String> {
        let mut cache = self.cache.lock().await;
        let now = chrono::Utc::now().timestamp();

        if let Some(cached) = cache.as_ref() {
            if cached.exp_unix - EXPIRY_SAFETY_WINDOW > now {
                return Ok(cached.token.clone());
            }
        }

        let fresh = self.fetch_new_token().await?;
        let token = fresh.token.clone();
        *cache = Some(fresh);
        Ok(token)
    }
}
