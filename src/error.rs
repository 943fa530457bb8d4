use crate::{clients, config, utils};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("verifier client error: {0}")]
    Verifier(#[from] clients::verifier::Error),
    #[error("sheets client error: {0}")]
    Sheets(#[from] clients::sheets::Error),
    #[error("marketing client error: {0}")]
    Marketing(#[from] clients::marketing::Error),
    #[error("webhook client error: {0}")]
    Webhook(#[from] clients::webhooks::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        utils::error_chain_fmt(self, f)
    }
}
