//! The configuration structs used to build the AppConfig, and their impls.
use std::{collections::HashMap, time::Duration};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use strum_macros::AsRefStr;

use crate::category::Category;
use crate::clients::webhooks;
use crate::config::{ConfigError, ConfigResult};

// ###################################
// ->   STRUCTS
// ###################################
#[derive(AsRefStr, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Production,
}

#[derive(Deserialize, Clone, Debug)]
pub struct AppConfig {
    pub net_config: NetConfig,
    pub intake_config: IntakeConfig,
    pub verifier_config: VerifierConfig,
    pub sheets_config: SheetsConfig,
    pub marketing_config: MarketingConfig,
    pub webhook_config: WebhookConfig,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NetConfig {
    pub host: [u8; 4],
    pub app_port: u16,
}

/// Inbound request handling: which query parameters carry the campaign source
/// and which sources are accepted.
#[derive(Deserialize, Clone, Debug)]
pub struct IntakeConfig {
    /// Accepted names of the campaign-source parameter, first present one wins.
    pub source_params: Vec<String>,
    pub site_param: String,
    pub allowed_sources: Vec<String>,
    #[serde(default)]
    pub source_prefixes: Vec<String>,
    pub response: ResponseMode,
}

/// How a successful capture is answered.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ResponseMode {
    Json,
    Redirect { landing_url: String },
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerifierApi {
    /// `GET email/verify`, key sent in the `x-api-key` header.
    #[serde(rename = "v1.1")]
    V1_1,
    /// `GET email`, key sent as a bearer token.
    #[serde(rename = "v2")]
    V2,
}

#[derive(Deserialize, Clone, Debug)]
pub struct VerifierConfig {
    pub base_url: String,
    pub api_version: VerifierApi,
    #[serde(deserialize_with = "secret_string_or_number")]
    pub api_key: SecretString,
    pub timeout_millis: Option<u64>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct SheetsConfig {
    pub base_url: String,
    #[serde(deserialize_with = "string_or_number")]
    pub spreadsheet_id: String,
    /// Service-account key JSON. Access tokens are minted from it and refreshed before expiry.
    #[serde(default, deserialize_with = "optional_secret_json")]
    pub service_account_credentials: Option<SecretString>,
    /// A pre-issued access token, used as is when no service account is configured.
    #[serde(default, deserialize_with = "optional_secret_string_or_number")]
    pub access_token: Option<SecretString>,
    pub layout: AuditLayout,
    pub timeout_millis: Option<u64>,
}

/// Where an audit row lands for a given category.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditLayout {
    /// One sheet per category, rows are `[email, category, source]`.
    SheetPerCategory { sheets: HashMap<Category, String> },
    /// A single sheet with one column per category and the source in column E.
    ColumnPerCategory { sheet: String },
}

#[derive(Deserialize, Clone, Debug)]
pub struct MarketingConfig {
    pub base_url: String,
    #[serde(deserialize_with = "secret_string_or_number")]
    pub api_key: SecretString,
    #[serde(deserialize_with = "string_or_number")]
    pub list_id: String,
    pub event_name: String,
    pub timeout_millis: Option<u64>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct WebhookConfig {
    /// URL templates; `{email}` and `{source}` are replaced with url-encoded values.
    #[serde(default)]
    pub endpoints: Vec<String>,
    pub timeout_millis: Option<u64>,
}

// ###################################
// ->   IMPLs
// ###################################
impl AppConfig {
    /// Checks what deserialization alone can't: required secrets and identifiers
    /// must be non-empty and every base url must parse.
    pub fn validate(&self) -> ConfigResult<()> {
        let required = [
            (
                "verifier_config.api_key",
                self.verifier_config.api_key.expose_secret(),
            ),
            (
                "sheets_config.spreadsheet_id",
                self.sheets_config.spreadsheet_id.as_str(),
            ),
            (
                "marketing_config.api_key",
                self.marketing_config.api_key.expose_secret(),
            ),
            (
                "marketing_config.list_id",
                self.marketing_config.list_id.as_str(),
            ),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::ConfigurationMissing(key.to_string()));
            }
        }

        if !self.sheets_config.has_credentials() {
            return Err(ConfigError::ConfigurationMissing(
                "sheets_config.service_account_credentials".to_string(),
            ));
        }

        if self.intake_config.source_params.is_empty() {
            return Err(ConfigError::ConfigurationMissing(
                "intake_config.source_params".to_string(),
            ));
        }

        let mut urls = vec![
            ("verifier_config.base_url", self.verifier_config.base_url.as_str()),
            ("sheets_config.base_url", self.sheets_config.base_url.as_str()),
            ("marketing_config.base_url", self.marketing_config.base_url.as_str()),
        ];
        if let ResponseMode::Redirect { landing_url } = &self.intake_config.response {
            urls.push(("intake_config.response.landing_url", landing_url.as_str()));
        }
        for (key, value) in urls {
            parse_url(key, value)?;
        }

        for template in &self.webhook_config.endpoints {
            webhooks::render_raw(template, "user@example.com", "source").map_err(|er| {
                ConfigError::InvalidUrl {
                    key: "webhook_config.endpoints".to_string(),
                    reason: er.to_string(),
                }
            })?;
        }

        Ok(())
    }
}

/// Parses a url, naming the config key on failure.
pub fn parse_url(key: &str, value: &str) -> ConfigResult<reqwest::Url> {
    reqwest::Url::parse(value).map_err(|er| ConfigError::InvalidUrl {
        key: key.to_string(),
        reason: er.to_string(),
    })
}

/// Environment values that look like numbers are parsed as numbers by `figment`,
/// identifiers still have to end up as strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        Uint(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Uint(n) => n.to_string(),
    })
}

fn secret_string_or_number<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    string_or_number(deserializer).map(SecretString::from)
}

fn optional_secret_string_or_number<'de, D>(
    deserializer: D,
) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    secret_string_or_number(deserializer).map(Some)
}

/// Key files arrive either as a JSON string or, when an env value happens to parse as a
/// figment dict, as a map. Both end up as the JSON text.
fn optional_secret_json<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Some(SecretString::from(
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        },
    )))
}

fn timeout(millis: Option<u64>) -> Option<Duration> {
    millis.map(Duration::from_millis)
}

impl VerifierConfig {
    pub fn timeout(&self) -> Option<Duration> {
        timeout(self.timeout_millis)
    }
}

impl SheetsConfig {
    /// Either credential counts when it is present and not blank.
    pub fn has_credentials(&self) -> bool {
        [&self.service_account_credentials, &self.access_token]
            .into_iter()
            .flatten()
            .any(|secret| !secret.expose_secret().trim().is_empty())
    }

    pub fn timeout(&self) -> Option<Duration> {
        timeout(self.timeout_millis)
    }
}

impl MarketingConfig {
    pub fn timeout(&self) -> Option<Duration> {
        timeout(self.timeout_millis)
    }
}

impl WebhookConfig {
    pub fn timeout(&self) -> Option<Duration> {
        timeout(self.timeout_millis)
    }
}

// ###################################
// ->   TRY FROMs
// ###################################

impl TryFrom<String> for Environment {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            _ => Err(Self::Error::StringToEnvironmentFail),
        }
    }
}

// ###################################
// ->   TESTS
// ###################################
