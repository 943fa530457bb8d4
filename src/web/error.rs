use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use strum_macros::AsRefStr;

use crate::category::Category;

use super::routes::CaptureError;

pub type WebResult<T> = core::result::Result<T, Error>;

#[derive(Debug, AsRefStr, thiserror::Error)]
pub enum Error {
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
}

impl Error {
    pub fn status_code_and_client_error(&self) -> (StatusCode, ClientError) {
        match self {
            Error::Capture(capture_er) => capture_er.status_code_and_client_error(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        tracing::debug!("{:<12} - into_response(Error: {self:?})", "INTO_RESP");

        // Construct a response
        let mut res = StatusCode::INTERNAL_SERVER_ERROR.into_response();

        // Insert the Error into response so that it can be retrieved later.
        res.extensions_mut().insert(Arc::new(self));

        res
    }
}

/// The error a caller gets to see. `Display` is the `error` field of the JSON body.
#[derive(Debug, Clone, PartialEq, Eq, AsRefStr, derive_more::Display)]
pub enum ClientError {
    #[display("Missing {_0} parameter")]
    MissingParameter(String),
    #[display("Invalid email format")]
    InvalidFormat,
    #[display("Invalid source")]
    InvalidSource,
    #[display("Email verification service rejected our credentials")]
    VendorAuth,
    #[display("Too many requests, try again later")]
    RateLimited,
    #[display("Email address rejected: {_0}")]
    GateRejected(Category),
    #[display("Service Error!")]
    ServiceError,
}
