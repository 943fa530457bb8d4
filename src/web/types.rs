//! The inbound request types of the `web` module, their parsing implementations and tests for those.
//! Parsing has no side effects: a request either becomes an `IntakeRequest` or a `DataParsingError`.

use std::collections::HashMap;

use lazy_regex::regex_is_match;
use unicode_segmentation::UnicodeSegmentation;
use validator::ValidateEmail;

use crate::config::IntakeConfig;

// ###################################
// ->   STRUCTS
// ###################################
/// A validated capture request.
#[derive(Debug, Clone)]
pub struct IntakeRequest {
    pub email: ValidEmail,
    pub source: CampaignSource,
}

/// Validated Email in the `local@domain.tld` shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidEmail(String);

/// Effective campaign source: the source tag with the optional site identifier appended.
/// Always non-empty and accepted by the allow-list or a recognized prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignSource(String);

// ###################################
// ->   IMPLS
// ###################################
impl IntakeRequest {
    /// Validates the raw query parameters.
    ///
    /// Missing parameters are reported before malformed ones, so a request without a source
    /// is a `MissingParameter` even when its email is also invalid.
    pub fn parse(
        params: &HashMap<String, String>,
        config: &IntakeConfig,
    ) -> Result<Self, DataParsingError> {
        let email = non_empty(params, "email")
            .ok_or_else(|| DataParsingError::MissingParameter("email".to_string()))?;

        let source = config
            .source_params
            .iter()
            .find_map(|name| non_empty(params, name))
            .ok_or_else(|| {
                let name = config
                    .source_params
                    .first()
                    .map(String::as_str)
                    .unwrap_or("source");
                DataParsingError::MissingParameter(name.to_string())
            })?;
        let site = non_empty(params, &config.site_param);

        let email = ValidEmail::parse(email)?;
        let source = CampaignSource::parse(source, site, config)?;

        Ok(IntakeRequest { email, source })
    }
}

fn non_empty<'a>(params: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

impl AsRef<str> for ValidEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ValidEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl ValidEmail {
    pub fn parse<S>(value: S) -> Result<Self, DataParsingError>
    where
        S: AsRef<str>,
    {
        let value = value.as_ref();

        if value.graphemes(true).count() > 256 {
            return Err(DataParsingError::EmailTooLong);
        }

        // `validate_email` accepts dotless domains, the domain also needs a tld.
        if value.validate_email() && regex_is_match!(r"^[^\s@]+@[^\s@]+\.[^\s@]+$", value) {
            Ok(ValidEmail(value.to_owned()))
        } else {
            Err(DataParsingError::EmailInvalid)
        }
    }
}

impl AsRef<str> for CampaignSource {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CampaignSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl CampaignSource {
    pub fn parse(
        source: &str,
        site: Option<&str>,
        config: &IntakeConfig,
    ) -> Result<Self, DataParsingError> {
        let effective = match site {
            Some(site) => format!("{source}{site}"),
            None => source.to_string(),
        };

        let allowed = config.allowed_sources.iter().any(|s| *s == effective)
            || config
                .source_prefixes
                .iter()
                .any(|prefix| !prefix.is_empty() && effective.starts_with(prefix.as_str()));

        if allowed {
            Ok(CampaignSource(effective))
        } else {
            Err(DataParsingError::SourceInvalid(effective))
        }
    }
}

// ###################################
// ->   ERROR
// ###################################
#[derive(Debug, thiserror::Error)]
pub enum DataParsingError {
    #[error("missing query parameter: {0}")]
    MissingParameter(String),

    #[error("email invalid")]
    EmailInvalid,
    #[error("email too long")]
    EmailTooLong,

    #[error("campaign source not recognized: {0}")]
    SourceInvalid(String),
}
