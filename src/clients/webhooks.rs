use futures::future::join_all;
use reqwest::Client;
use tracing::{info, warn};

use crate::{
    config::WebhookConfig,
    utils,
    web::types::{CampaignSource, ValidEmail},
};

/// How many pings of a fan-out went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FanOutReport {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub struct WebhookClient {
    pub http_client: Client,
    endpoints: Vec<String>,
}

impl WebhookClient {
    pub fn new(endpoints: Vec<String>, timeout: Option<std::time::Duration>) -> Result<Self> {
        let http_client = utils::http_client(timeout)?;
        Ok(WebhookClient {
            http_client,
            endpoints,
        })
    }

    pub fn from_config(config: &WebhookConfig) -> Result<Self> {
        Self::new(config.endpoints.clone(), config.timeout())
    }

    /// Pings every configured endpoint concurrently. Each failure is logged on its own and
    /// never fails the fan-out.
    #[tracing::instrument(name = "Webhook fan-out", skip_all, fields(endpoints = self.endpoints.len()))]
    pub async fn fan_out(&self, email: &ValidEmail, source: &CampaignSource) -> FanOutReport {
        let pings = self
            .endpoints
            .iter()
            .map(|template| self.ping(template, email, source));
        let results = join_all(pings).await;

        let mut report = FanOutReport::default();
        for (template, result) in self.endpoints.iter().zip(results) {
            match result {
                Ok(()) => report.delivered += 1,
                Err(er) => {
                    report.failed += 1;
                    warn!(endpoint = %template, error = %er, "webhook ping failed");
                }
            }
        }
        info!(delivered = report.delivered, failed = report.failed, "webhook fan-out finished");

        report
    }

    async fn ping(&self, template: &str, email: &ValidEmail, source: &CampaignSource) -> Result<()> {
        let url = render(template, email, source)?;
        self.http_client
            .get(url)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Fills `{email}` and `{source}` with url-encoded values.
pub fn render(template: &str, email: &ValidEmail, source: &CampaignSource) -> Result<reqwest::Url> {
    render_raw(template, email.as_ref(), source.as_ref())
}

/// `render` over plain strings, also used to check templates at startup.
pub fn render_raw(template: &str, email: &str, source: &str) -> Result<reqwest::Url> {
    let url = template
        .replace("{email}", &utils::url_encode(email))
        .replace("{source}", &utils::url_encode(source));
    reqwest::Url::parse(&url).map_err(|e| Error::UrlParsing(e.to_string()))
}

// ###################################
// ->   ERROR & RESULT
// ###################################
pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
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
