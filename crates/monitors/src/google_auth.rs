//! Google service-account access tokens.
//!
//! Implements the OAuth 2.0 JWT bearer grant: an RS256-signed assertion
//! built from the service-account key is exchanged at the key's
//! `token_uri` for a short-lived access token, which is cached until
//! shortly before it expires.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::ProbeError;

/// Read-only scope for the Sheets API.
pub const SHEETS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Assertion lifetime in seconds (the maximum Google accepts).
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Tokens are refreshed this long before their reported expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// The fields of a service-account JSON key that the grant needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: String,
}

impl ServiceAccountKey {
    pub async fn from_file(path: &Path) -> Result<Self, ProbeError> {
        let raw = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

/// JWT claims of the bearer assertion.
#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl AssertionClaims {
    pub fn new(key: &ServiceAccountKey, scope: &str, now: i64) -> Self {
        Self {
            iss: key.client_email.clone(),
            scope: scope.to_string(),
            aud: key.token_uri.clone(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: i64,
}

struct CachedToken {
    value: String,
    expires_at: i64,
}

/// Fetches and caches access tokens for one service account and scope.
pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
    scope: String,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenSource {
    pub fn new(
        key: ServiceAccountKey,
        scope: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            key,
            scope: scope.into(),
            client,
            cached: Mutex::new(None),
        })
    }

    /// A valid access token, reusing the cached one when possible.
    pub async fn access_token(&self) -> Result<String, ProbeError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now().timestamp();

        if let Some(token) = cached.as_ref().filter(|t| t.expires_at > now) {
            return Ok(token.value.clone());
        }

        let assertion = sign_assertion(&self.key, &self.scope, now)?;
        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProbeError::Auth(format!(
                "token endpoint returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = if token.expires_in > 0 {
            token.expires_in
        } else {
            ASSERTION_LIFETIME_SECS
        };
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: now + lifetime - EXPIRY_MARGIN_SECS,
        });

        tracing::debug!(client_email = %self.key.client_email, "Obtained Google access token");
        Ok(token.access_token)
    }
}

/// Build and sign the RS256 bearer assertion.
pub fn sign_assertion(key: &ServiceAccountKey, scope: &str, now: i64) -> Result<String, ProbeError> {
    let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| ProbeError::Auth(format!("invalid service-account private key: {e}")))?;
    let claims = AssertionClaims::new(key, scope, now);

    encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
        .map_err(|e| ProbeError::Auth(format!("could not sign assertion: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
