//! Google service-account sign-in. A JWT signed with the account's key is traded for an access
//! token at the account's `token_uri`, and the token is reused until shortly before it expires.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::utils;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Cached tokens this close to expiring are replaced.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// The fields of a service-account key file that signing in needs.
#[derive(Debug, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: SecretString,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidKey(e.to_string()))
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: SecretString,
    expires_in: i64,
}

struct CachedToken {
    token: SecretString,
    expires_at: DateTime<Utc>,
}

pub struct ServiceAccountAuth {
    http_client: Client,
    client_email: String,
    token_url: Url,
    scope: String,
    encoding_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for ServiceAccountAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountAuth")
            .field("client_email", &self.client_email)
            .field("token_url", &self.token_url.as_str())
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountAuth {
    pub fn new(
        key: ServiceAccountKey,
        scope: &str,
        timeout: Option<std::time::Duration>,
    ) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.expose_secret().as_bytes())
            .map_err(|e| Error::InvalidKey(e.to_string()))?;
        let token_url =
            Url::parse(&key.token_uri).map_err(|e| Error::InvalidKey(format!("token_uri: {e}")))?;

        Ok(ServiceAccountAuth {
            http_client: utils::http_client(timeout)?,
            client_email: key.client_email,
            token_url,
            scope: scope.to_string(),
            encoding_key,
            cached: Mutex::new(None),
        })
    }

    /// A valid access token, minted only when the cached one is missing or about to expire.
    pub async fn access_token(&self) -> Result<SecretString> {
        let mut cached = self.cached.lock().await;
        let margin = Duration::seconds(EXPIRY_MARGIN_SECS);
        if let Some(current) = cached
            .as_ref()
            .filter(|current| current.expires_at - margin > Utc::now())
        {
            return Ok(current.token.clone());
        }

        let fresh = self.mint().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn mint(&self) -> Result<CachedToken> {
        let now = Utc::now();
        let claims = Claims {
            iss: &self.client_email,
            scope: &self.scope,
            aud: self.token_url.as_str(),
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| Error::Signing(e.to_string()))?;

        let resp: TokenResponse = self
            .http_client
            .post(self.token_url.clone())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(expires_in = resp.expires_in, "minted a service account access token");

        Ok(CachedToken {
            token: resp.access_token,
            expires_at: now + Duration::seconds(resp.expires_in),
        })
    }
}

// ###################################
// ->   ERROR & RESULT
// ###################################
pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid service account key: {0}")]
    InvalidKey(String),
    #[error("failed to sign the token assertion: {0}")]
    Signing(String),
    #[error("reqwest error: {0}")]
    Reqwest(reqwest::Error),
}

impl From<reqwest::Error> for Error {
    fn from(er: reqwest::Error) -> Self {
        Error::Reqwest(er.without_url())
    }
}
