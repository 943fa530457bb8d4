//! Marketing platform adapter.
//!
//! `MarketingPlatform` is the seam: `IterableClient` talks HTTP, tests plug in a recording fake.
//! `upsert_subscriber` is the single "ensure the subscriber exists" capability built on top of it.

use std::future::Future;

use chrono::Utc;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::{
    config::MarketingConfig,
    utils,
    web::types::{CampaignSource, ValidEmail},
};

// ###################################
// ->   STRUCTS
// ###################################
/// Metadata attached to the subscriber and to the tracking event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataFields {
    pub source: String,
    /// RFC 3339, UTC
    pub timestamp: String,
}

impl DataFields {
    pub fn now(source: &CampaignSource) -> Self {
        DataFields {
            source: source.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Updated,
    Subscribed,
}

/// What `onboard` managed to do. Purely informational, failures are already logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnboardReport {
    pub upsert: Option<UpsertOutcome>,
    pub event_tracked: bool,
}

// ###################################
// ->   TRAIT
// ###################################
pub trait MarketingPlatform {
    /// Updates an existing subscriber, reporting `NotFound` when there is none.
    fn update_user(
        &self,
        email: &ValidEmail,
        fields: &DataFields,
    ) -> impl Future<Output = Result<UpdateOutcome>> + Send;

    /// Adds the subscriber to the configured list.
    fn subscribe(
        &self,
        email: &ValidEmail,
        fields: &DataFields,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Emits the custom event that (re)triggers the welcome workflow.
    fn track_event(
        &self,
        email: &ValidEmail,
        fields: &DataFields,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Ensures the subscriber exists: update first, subscribe only when the update reports not-found.
pub async fn upsert_subscriber<P: MarketingPlatform>(
    platform: &P,
    email: &ValidEmail,
    fields: &DataFields,
) -> Result<UpsertOutcome> {
    match platform.update_user(email, fields).await? {
        UpdateOutcome::Updated => Ok(UpsertOutcome::Updated),
        UpdateOutcome::NotFound => {
            platform.subscribe(email, fields).await?;
            Ok(UpsertOutcome::Subscribed)
        }
    }
}

/// Upserts the subscriber, then emits the tracking event regardless of the upsert's result.
/// Never fails, errors are logged.
#[tracing::instrument(name = "Onboarding subscriber", skip_all, fields(source = %source))]
pub async fn onboard<P: MarketingPlatform>(
    platform: &P,
    email: &ValidEmail,
    source: &CampaignSource,
) -> OnboardReport {
    let fields = DataFields::now(source);

    let upsert = match upsert_subscriber(platform, email, &fields).await {
        Ok(outcome) => {
            info!(?outcome, "subscriber upserted");
            Some(outcome)
        }
        Err(er) => {
            error!(error = %er, "failed to upsert subscriber");
            None
        }
    };

    let event_tracked = match platform.track_event(email, &fields).await {
        Ok(()) => true,
        Err(er) => {
            error!(error = %er, "failed to track event");
            false
        }
    };

    OnboardReport {
        upsert,
        event_tracked,
    }
}

// ###################################
// ->   ITERABLE
// ###################################
#[derive(Debug)]
pub struct IterableClient {
    pub http_client: Client,
    pub url: reqwest::Url,
    api_key: SecretString,
    list_id: String,
    event_name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserBody<'a> {
    email: &'a str,
    data_fields: &'a DataFields,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscribeBody<'a> {
    list_id: Value,
    subscribers: [UpdateUserBody<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TrackEventBody<'a> {
    email: &'a str,
    event_name: &'a str,
    created_at: i64,
    data_fields: &'a DataFields,
}

impl IterableClient {
    pub fn new<S: AsRef<str>>(
        url: S,
        api_key: SecretString,
        list_id: String,
        event_name: String,
        timeout: Option<std::time::Duration>,
    ) -> Result<Self> {
        let url =
            utils::base_url(url.as_ref()).map_err(|e| Error::UrlParsing(e.to_string()))?;
        let http_client = utils::http_client(timeout)?;

        Ok(IterableClient {
            http_client,
            url,
            api_key,
            list_id,
            event_name,
        })
    }

    pub fn from_config(config: &MarketingConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            config.api_key.clone(),
            config.list_id.clone(),
            config.event_name.clone(),
            config.timeout(),
        )
    }

    fn endpoint(&self, path: &str) -> Result<reqwest::Url> {
        self.url
            .join(path)
            .map_err(|e| Error::UrlParsing(e.to_string()))
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<reqwest::Response> {
        let resp = self
            .http_client
            .post(self.endpoint(path)?)
            .header("Api-Key", self.api_key.expose_secret())
            .json(body)
            .send()
            .await?;
        Ok(resp)
    }

    /// Iterable list ids are numeric, anything else is sent as-is.
    fn list_id(&self) -> Value {
        self.list_id
            .parse::<u64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(self.list_id.clone()))
    }
}

/// Iterable answers a missing user with a 404 or with an error `code` in an otherwise ordinary body.
fn is_not_found(code: Option<&str>) -> bool {
    code.map(|code| {
        let code = code.to_ascii_lowercase();
        code.contains("notfound") || code.contains("nouser")
    })
    .unwrap_or(false)
}

impl MarketingPlatform for IterableClient {
    async fn update_user(&self, email: &ValidEmail, fields: &DataFields) -> Result<UpdateOutcome> {
        let body = UpdateUserBody {
            email: email.as_ref(),
            data_fields: fields,
        };
        let resp = self.post("users/update", &body).await?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(UpdateOutcome::NotFound);
        }
        // Rejections come as 4xx with the reason in the body's `code`.
        if status.is_client_error() {
            let body: Value = resp.json().await.unwrap_or(Value::Null);
            let code = body.get("code").and_then(Value::as_str);
            if is_not_found(code) {
                return Ok(UpdateOutcome::NotFound);
            }
            return Err(Error::Rejected {
                status: status.as_u16(),
                code: code.map(str::to_string),
            });
        }
        let resp = resp.error_for_status()?;

        // An empty or non-json success body still counts as an update.
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        if is_not_found(body.get("code").and_then(Value::as_str)) {
            Ok(UpdateOutcome::NotFound)
        } else {
            Ok(UpdateOutcome::Updated)
        }
    }

    async fn subscribe(&self, email: &ValidEmail, fields: &DataFields) -> Result<()> {
        let body = SubscribeBody {
            list_id: self.list_id(),
            subscribers: [UpdateUserBody {
                email: email.as_ref(),
                data_fields: fields,
            }],
        };
        self.post("lists/subscribe", &body)
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn track_event(&self, email: &ValidEmail, fields: &DataFields) -> Result<()> {
        let body = TrackEventBody {
            email: email.as_ref(),
            event_name: &self.event_name,
            created_at: Utc::now().timestamp(),
            data_fields: fields,
        };
        self.post("events/track", &body)
            .await?
            .error_for_status()?;
        Ok(())
    }
}

// ###################################
// ->   ERROR & RESULT
// ###################################
pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("marketing platform rejected the request with status {status}, code: {code:?}")]
    Rejected { status: u16, code: Option<String> },

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
