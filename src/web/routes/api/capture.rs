use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::info;

use crate::{
    category::{Category, GateDecision},
    clients::{marketing, verifier, AuditRow},
    config::ResponseMode,
    web::{
        types::{CampaignSource, DataParsingError, IntakeRequest, ValidEmail},
        ClientError, WebResult,
    },
    AppState,
};

// ###################################
// ->   ERROR
// ###################################
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("data parsing error: {0}")]
    DataParsing(#[from] DataParsingError),

    #[error("verifier error: {0}")]
    Verifier(#[from] verifier::Error),

    #[error("email rejected by the gate as: {0}")]
    GateRejected(Category),

    #[error("landing url could not be built: {0}")]
    LandingUrl(String),
}

impl CaptureError {
    pub fn status_code_and_client_error(&self) -> (StatusCode, ClientError) {
        match self {
            CaptureError::DataParsing(data_er) => match data_er {
                DataParsingError::MissingParameter(name) => (
                    StatusCode::BAD_REQUEST,
                    ClientError::MissingParameter(name.clone()),
                ),
                DataParsingError::EmailInvalid | DataParsingError::EmailTooLong => {
                    (StatusCode::BAD_REQUEST, ClientError::InvalidFormat)
                }
                DataParsingError::SourceInvalid(_) => {
                    (StatusCode::BAD_REQUEST, ClientError::InvalidSource)
                }
            },
            CaptureError::Verifier(verifier::Error::VendorUnauthorized(_)) => {
                (StatusCode::UNAUTHORIZED, ClientError::VendorAuth)
            }
            CaptureError::Verifier(verifier::Error::RateLimited) => {
                (StatusCode::TOO_MANY_REQUESTS, ClientError::RateLimited)
            }
            CaptureError::GateRejected(category) => (
                StatusCode::BAD_REQUEST,
                ClientError::GateRejected(*category),
            ),
            CaptureError::Verifier(_) | CaptureError::LandingUrl(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ClientError::ServiceError)
            }
        }
    }
}

// ###################################
// ->   API
// ###################################
/// `GET /api/capture?email=..&utm_source=..[&site=..]`
///
/// Verification gates everything downstream. Once the category is known the audit row is written
/// whatever the outcome, and accepted emails are also onboarded on the marketing platform and
/// fanned out to the webhooks. Downstream failures are logged and never change the response.
#[tracing::instrument(name = "Capturing an email", skip_all)]
pub async fn capture(
    State(app_state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> WebResult<Response> {
    let IntakeRequest { email, source } = IntakeRequest::parse(&params, &app_state.intake_config)
        .map_err(CaptureError::DataParsing)?;
    info!(%source, "intake request accepted");

    let verification = app_state
        .verifier
        .verify(&email)
        .await
        .map_err(CaptureError::Verifier)?;
    let category = verification.category;
    info!(%category, "email verified");

    let row = AuditRow::new(&email, category, &source);

    if category.gate() == GateDecision::Reject {
        app_state.sheets.record(&row).await;
        return Err(CaptureError::GateRejected(category).into());
    }

    let (_, onboarded, fanned_out) = tokio::join!(
        app_state.sheets.record(&row),
        marketing::onboard(&app_state.marketing, &email, &source),
        app_state.webhooks.fan_out(&email, &source),
    );
    info!(?onboarded, ?fanned_out, "downstream calls finished");

    success_response(&app_state.intake_config.response, category, &email, &source)
}

fn success_response(
    mode: &ResponseMode,
    category: Category,
    email: &ValidEmail,
    source: &CampaignSource,
) -> WebResult<Response> {
    match mode {
        ResponseMode::Json => {
            Ok(Json(json!({ "success": true, "action": category })).into_response())
        }
        ResponseMode::Redirect { landing_url } => {
            let mut location = reqwest::Url::parse(landing_url)
                .map_err(|e| CaptureError::LandingUrl(e.to_string()))?;
            location
                .query_pairs_mut()
                .append_pair("email", email.as_ref())
                .append_pair("source", source.as_ref());

            Ok((StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response())
        }
    }
}
