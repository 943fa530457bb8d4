use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{error, info, warn};

use super::google_auth::{self, ServiceAccountAuth, ServiceAccountKey, SHEETS_SCOPE};
use crate::{
    category::Category,
    config::{AuditLayout, SheetsConfig},
    utils,
    web::types::{CampaignSource, ValidEmail},
};

/// One append-only audit entry.
#[derive(Debug, Clone, Copy)]
pub struct AuditRow<'a> {
    pub email: &'a ValidEmail,
    pub category: Category,
    pub source: &'a CampaignSource,
}

impl<'a> AuditRow<'a> {
    pub fn new(email: &'a ValidEmail, category: Category, source: &'a CampaignSource) -> Self {
        AuditRow {
            email,
            category,
            source,
        }
    }
}

/// The A1 range and cell values an `AuditRow` is appended as.
#[derive(Debug, PartialEq, Eq)]
pub struct AppendTarget {
    pub range: String,
    pub values: Vec<String>,
}

impl AuditLayout {
    /// Resolves the destination of a row. A category without a configured sheet is
    /// `Error::UnknownCategory`.
    pub fn target(&self, row: &AuditRow) -> Result<AppendTarget> {
        match self {
            AuditLayout::SheetPerCategory { sheets } => {
                let sheet = sheets
                    .get(&row.category)
                    .filter(|sheet| !sheet.trim().is_empty())
                    .ok_or(Error::UnknownCategory(row.category))?;
                Ok(AppendTarget {
                    range: a1_range(sheet, "A:C"),
                    values: vec![
                        row.email.to_string(),
                        row.category.to_string(),
                        row.source.to_string(),
                    ],
                })
            }
            AuditLayout::ColumnPerCategory { sheet } => {
                let mut values = vec![String::new(); 5];
                values[row.category.column_index()] = row.email.to_string();
                values[4] = row.source.to_string();
                Ok(AppendTarget {
                    range: a1_range(sheet, "A:E"),
                    values,
                })
            }
        }
    }
}

/// Sheet names with anything but letters, digits and underscores have to be quoted in A1 notation.
fn a1_range(sheet: &str, columns: &str) -> String {
    if sheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        format!("{sheet}!{columns}")
    } else {
        format!("'{}'!{columns}", sheet.replace('\'', "''"))
    }
}

#[derive(Serialize)]
struct AppendBody<'a> {
    values: [&'a [String]; 1],
}

/// How audit writes authenticate against the Sheets API.
#[derive(Debug)]
pub enum SheetsAuth {
    /// Tokens minted from the service-account key and refreshed before they expire.
    ServiceAccount(ServiceAccountAuth),
    /// A pre-issued token, sent as is.
    AccessToken(SecretString),
}

impl SheetsAuth {
    /// Prefers the service account when both credentials are configured.
    pub fn from_config(config: &SheetsConfig) -> Result<Self> {
        let present = |secret: &Option<SecretString>| {
            secret
                .as_ref()
                .filter(|s| !s.expose_secret().trim().is_empty())
                .cloned()
        };

        if let Some(credentials) = present(&config.service_account_credentials) {
            let key = ServiceAccountKey::from_json(credentials.expose_secret())?;
            return Ok(SheetsAuth::ServiceAccount(ServiceAccountAuth::new(
                key,
                SHEETS_SCOPE,
                config.timeout(),
            )?));
        }
        present(&config.access_token)
            .map(SheetsAuth::AccessToken)
            .ok_or(Error::MissingCredentials)
    }

    async fn bearer(&self) -> Result<SecretString> {
        match self {
            SheetsAuth::ServiceAccount(auth) => Ok(auth.access_token().await?),
            SheetsAuth::AccessToken(token) => Ok(token.clone()),
        }
    }
}

#[derive(Debug)]
pub struct SheetsClient {
    pub http_client: Client,
    pub url: reqwest::Url,
    spreadsheet_id: String,
    auth: SheetsAuth,
    layout: AuditLayout,
}

impl SheetsClient {
    pub fn new<S: AsRef<str>>(
        url: S,
        spreadsheet_id: String,
        auth: SheetsAuth,
        layout: AuditLayout,
        timeout: Option<std::time::Duration>,
    ) -> Result<Self> {
        let url =
            utils::base_url(url.as_ref()).map_err(|e| Error::UrlParsing(e.to_string()))?;
        let http_client = utils::http_client(timeout)?;

        Ok(SheetsClient {
            http_client,
            url,
            spreadsheet_id,
            auth,
            layout,
        })
    }

    pub fn from_config(config: &SheetsConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            config.spreadsheet_id.clone(),
            SheetsAuth::from_config(config)?,
            config.layout.clone(),
            config.timeout(),
        )
    }

    /// Appends the row through `spreadsheets.values.append`.
    pub async fn append(&self, row: &AuditRow<'_>) -> Result<()> {
        let target = self.layout.target(row)?;

        let append_segment = format!("{}:append", target.range);

        let mut url = self.url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::UrlParsing(format!("cannot be a base: {}", self.url)))?
            .pop_if_empty()
            .extend([
                "spreadsheets",
                self.spreadsheet_id.as_str(),
                "values",
                append_segment.as_str(),
            ]);
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let token = self.auth.bearer().await?;
        self.http_client
            .post(url)
            .bearer_auth(token.expose_secret())
            .json(&AppendBody {
                values: [&target.values],
            })
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    /// Records the row, never failing: every problem is logged and swallowed.
    #[tracing::instrument(
        name = "Recording audit row",
        skip(self, row),
        fields(category = %row.category, source = %row.source)
    )]
    pub async fn record(&self, row: &AuditRow<'_>) {
        match self.append(row).await {
            Ok(()) => info!("audit row recorded"),
            Err(Error::UnknownCategory(category)) => {
                warn!(%category, "no audit destination for category, skipping write")
            }
            Err(er) => error!(error = %er, "failed to record audit row"),
        }
    }
}

// ###################################
// ->   ERROR & RESULT
// ###################################
pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no audit destination configured for category: {0}")]
    UnknownCategory(Category),

    #[error("no sheets credentials configured")]
    MissingCredentials,
    #[error("sheets auth error: {0}")]
    Auth(#[from] google_auth::Error),

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
