use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    category::Category,
    config::{VerifierApi, VerifierConfig},
    utils,
    web::types::ValidEmail,
};

/// Outcome of a single verification call.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub category: Category,
    /// The vendor's response body, `Value::Null` when there was none to read.
    pub raw: Value,
}

impl VerificationResult {
    /// Reads the category from `result`, falling back to `status`.
    pub fn from_payload(raw: Value) -> Self {
        let category = ["result", "status"]
            .iter()
            .find_map(|key| raw.get(key).and_then(Value::as_str))
            .map(Category::from_vendor)
            .unwrap_or(Category::Unknown);

        VerificationResult { category, raw }
    }

    fn unknown() -> Self {
        VerificationResult {
            category: Category::Unknown,
            raw: Value::Null,
        }
    }
}

impl VerifierApi {
    fn path(self) -> &'static str {
        match self {
            VerifierApi::V1_1 => "email/verify",
            VerifierApi::V2 => "email",
        }
    }
}

#[derive(Debug)]
pub struct VerifierClient {
    pub http_client: Client,
    pub url: reqwest::Url,
    api: VerifierApi,
    api_key: SecretString,
}

impl VerifierClient {
    pub fn new<S: AsRef<str>>(
        url: S,
        api: VerifierApi,
        api_key: SecretString,
        timeout: Option<std::time::Duration>,
    ) -> Result<Self> {
        let url =
            utils::base_url(url.as_ref()).map_err(|e| Error::UrlParsing(e.to_string()))?;
        let http_client = utils::http_client(timeout)?;

        Ok(VerifierClient {
            http_client,
            url,
            api,
            api_key,
        })
    }

    pub fn from_config(config: &VerifierConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            config.api_version,
            config.api_key.clone(),
            config.timeout(),
        )
    }

    /// Calls the vendor exactly once.
    ///
    /// Only rejected credentials and rate limiting are errors. Everything else that goes wrong
    /// (transport failure, unexpected status, unreadable body) yields `Category::Unknown`.
    #[tracing::instrument(name = "Verifying email", skip(self, email))]
    pub async fn verify(&self, email: &ValidEmail) -> Result<VerificationResult> {
        let url = self
            .url
            .join(self.api.path())
            .map_err(|e| Error::UrlParsing(e.to_string()))?;

        let request = self
            .http_client
            .get(url)
            .query(&[("email", email.as_ref())]);
        let request = match self.api {
            VerifierApi::V1_1 => request.header("x-api-key", self.api_key.expose_secret()),
            VerifierApi::V2 => request.bearer_auth(self.api_key.expose_secret()),
        };

        let resp = match request.send().await {
            Ok(resp) => resp,
            Err(er) => {
                warn!(error = %er.without_url(), "verification request failed, treating as unknown");
                return Ok(VerificationResult::unknown());
            }
        };

        match resp.status() {
            status @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                return Err(Error::VendorUnauthorized(status.as_u16()))
            }
            StatusCode::TOO_MANY_REQUESTS => return Err(Error::RateLimited),
            status if !status.is_success() => {
                warn!(%status, "verification vendor returned an error, treating as unknown");
                return Ok(VerificationResult::unknown());
            }
            _ => {}
        }

        let result = match resp.json::<Value>().await {
            Ok(raw) => VerificationResult::from_payload(raw),
            Err(er) => {
                warn!(error = %er.without_url(), "malformed verification payload, treating as unknown");
                VerificationResult::unknown()
            }
        };
        debug!(category = %result.category, "verification finished");

        Ok(result)
    }
}

// ###################################
// ->   ERROR & RESULT
// ###################################
pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("verification vendor rejected the credentials with status {0}")]
    VendorUnauthorized(u16),
    #[error("verification vendor is rate limiting requests")]
    RateLimited,

    #[error("url parsing error: {0}")]
    UrlParsing(String),
    #[error("reqwest error: {0}")]
    Reqwest(reqwest::Error),
}

// Request urls can carry the email in their query, keep them out of error messages.
impl From<reqwest::Error> for Error {
    fn from(er: reqwest::Error) -> Self {
        Error::Reqwest(er.without_url())
    }
}
