use std::{net::SocketAddr, sync::Arc};

use derive_more::Deref;
use tokio::net::TcpListener;
use tracing::info;

use crate::{
    clients::{IterableClient, SheetsClient, VerifierClient, WebhookClient},
    config::{AppConfig, IntakeConfig},
    Result,
};

// ###################################
// ->  Structs
// ###################################
pub struct App {
    pub app_state: AppState,
    pub listener: TcpListener,
}
impl App {
    pub fn new(app_state: AppState, listener: TcpListener) -> Self {
        App {
            app_state,
            listener,
        }
    }

    /// Builds every outbound client from the config and binds the listener.
    /// Binding port `0` lets the OS pick a free port, see `App::local_addr`.
    pub async fn build_from_config(config: &AppConfig) -> Result<Self> {
        let app_state = AppState::new(
            config.intake_config.clone(),
            VerifierClient::from_config(&config.verifier_config)?,
            SheetsClient::from_config(&config.sheets_config)?,
            IterableClient::from_config(&config.marketing_config)?,
            WebhookClient::from_config(&config.webhook_config)?,
        );

        let addr = SocketAddr::from((config.net_config.host, config.net_config.app_port));
        let listener = TcpListener::bind(addr).await?;
        info!("{:<20} - {}", "Listening on:", listener.local_addr()?);

        Ok(App::new(app_state, listener))
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

pub struct InternalState {
    pub intake_config: IntakeConfig,
    pub verifier: VerifierClient,
    pub sheets: SheetsClient,
    pub marketing: IterableClient,
    pub webhooks: WebhookClient,
}

/// Application state containing all global data.
/// It implements `Deref` to easily access the fields on `InternalState`
/// Uses an `Arc` so it can be cloned around.
#[derive(Clone, Deref)]
pub struct AppState(Arc<InternalState>);

impl AppState {
    pub fn new(
        intake_config: IntakeConfig,
        verifier: VerifierClient,
        sheets: SheetsClient,
        marketing: IterableClient,
        webhooks: WebhookClient,
    ) -> Self {
        AppState(Arc::new(InternalState {
            intake_config,
            verifier,
            sheets,
            marketing,
            webhooks,
        }))
    }
}
