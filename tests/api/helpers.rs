//! Spawns the app on a random port with every outbound service replaced by a `MockServer`.
use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::OnceLock,
};

use anyhow::Result;
use mailgate::{
    category::Category,
    config::{
        AppConfig, AuditLayout, IntakeConfig, MarketingConfig, NetConfig, ResponseMode,
        SheetsConfig, VerifierApi, VerifierConfig, WebhookConfig,
    },
    init_dbg_tracing, App,
};
use secrecy::SecretString;
use serde_json::json;
use wiremock::{
    matchers::{header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

pub const VERIFIER_KEY: &str = "verifier-key";
pub const SHEETS_TOKEN: &str = "sheets-token";
pub const SPREADSHEET_ID: &str = "spreadsheet-id";
pub const MARKETING_KEY: &str = "marketing-key";
pub const LIST_ID: &str = "4242";

/// Trying to bind port 0 will trigger an OS scan for an available port
/// which will then be bound to the application.
const TEST_HOST: [u8; 4] = [127, 0, 0, 1];

fn _init_test_subscriber() {
    static SUBSCRIBER: OnceLock<()> = OnceLock::new();
    SUBSCRIBER.get_or_init(|| {
        init_dbg_tracing();
    });
}

pub struct TestApp {
    pub addr: SocketAddr,
    pub http_client: reqwest::Client,
    pub verifier: MockServer,
    pub sheets: MockServer,
    pub marketing: MockServer,
    pub webhooks: MockServer,
}

impl TestApp {
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(ResponseMode::Json).await
    }

    /// Spawns the app answering successful captures with the given mode.
    pub async fn spawn_with(response: ResponseMode) -> Result<Self> {
        // _init_test_subscriber();

        let verifier = MockServer::start().await;
        let sheets = MockServer::start().await;
        let marketing = MockServer::start().await;
        let webhooks = MockServer::start().await;

        let config = test_config(response, &verifier, &sheets, &marketing, &webhooks);
        let app = App::build_from_config(&config).await?;
        let port = app.local_addr()?.port();

        tokio::spawn(mailgate::serve(app));

        // Redirects are asserted on, never followed.
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(TestApp {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::from(TEST_HOST)), port),
            http_client,
            verifier,
            sheets,
            marketing,
            webhooks,
        })
    }

    /// `GET /api/capture` with the given query pairs.
    pub async fn capture(&self, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        let res = self
            .http_client
            .get(format!("http://{}/api/capture", self.addr))
            .query(query)
            .send()
            .await?;
        Ok(res)
    }

    /// The vendor answers every verification with the given status.
    pub async fn mock_verifier_result(&self, result: &str) {
        Mock::given(method("GET"))
            .and(path("/email/verify"))
            .and(header("x-api-key", VERIFIER_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": result,
                "reason": "accepted_email",
            })))
            .mount(&self.verifier)
            .await;
    }

    pub async fn mock_verifier_status(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path("/email/verify"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.verifier)
            .await;
    }

    /// Expects `n` appends to the sheet of `category`.
    pub async fn expect_audit_rows(&self, category: Category, n: u64) {
        Mock::given(method("POST"))
            .and(path(format!(
                "/spreadsheets/{SPREADSHEET_ID}/values/{}!A:C:append",
                sheet_name(category)
            )))
            .and(query_param("valueInputOption", "USER_ENTERED"))
            .and(header("authorization", format!("Bearer {SHEETS_TOKEN}").as_str()))
            .respond_with(ResponseTemplate::new(200))
            .expect(n)
            .mount(&self.sheets)
            .await;
    }

    /// Expects `n` updates answered with `status`.
    pub async fn expect_user_updates(&self, status: u16, n: u64) {
        Mock::given(method("POST"))
            .and(path("/users/update"))
            .and(header("Api-Key", MARKETING_KEY))
            .respond_with(ResponseTemplate::new(status))
            .expect(n)
            .mount(&self.marketing)
            .await;
    }

    pub async fn expect_subscribes(&self, n: u64) {
        Mock::given(method("POST"))
            .and(path("/lists/subscribe"))
            .and(header("Api-Key", MARKETING_KEY))
            .respond_with(ResponseTemplate::new(200))
            .expect(n)
            .mount(&self.marketing)
            .await;
    }

    pub async fn expect_events(&self, n: u64) {
        Mock::given(method("POST"))
            .and(path("/events/track"))
            .and(header("Api-Key", MARKETING_KEY))
            .respond_with(ResponseTemplate::new(200))
            .expect(n)
            .mount(&self.marketing)
            .await;
    }

    /// Expects `n` pings on each of the two webhook endpoints.
    pub async fn expect_webhook_pings(&self, n: u64) {
        for endpoint in ["/first", "/second"] {
            Mock::given(method("GET"))
                .and(path(endpoint))
                .respond_with(ResponseTemplate::new(200))
                .expect(n)
                .mount(&self.webhooks)
                .await;
        }
    }

    /// Expects no downstream traffic at all: audit, marketing, webhooks.
    pub async fn expect_no_downstream_calls(&self) {
        for server in [&self.sheets, &self.marketing, &self.webhooks] {
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(200))
                .expect(0)
                .mount(server)
                .await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(200))
                .expect(0)
                .mount(server)
                .await;
        }
    }
}

pub fn sheet_name(category: Category) -> String {
    let name = category.to_string();
    let mut chars = name.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}

fn test_config(
    response: ResponseMode,
    verifier: &MockServer,
    sheets: &MockServer,
    marketing: &MockServer,
    webhooks: &MockServer,
) -> AppConfig {
    let sheet_names: HashMap<Category, String> = Category::ALL
        .into_iter()
        .map(|category| (category, sheet_name(category)))
        .collect();

    AppConfig {
        net_config: NetConfig {
            host: TEST_HOST,
            app_port: 0,
        },
        intake_config: IntakeConfig {
            source_params: vec!["utm_source".to_string(), "leadsource".to_string()],
            site_param: "site".to_string(),
            allowed_sources: vec!["META".to_string(), "GOOGLE".to_string(), "TP".to_string()],
            source_prefixes: vec!["aff_".to_string()],
            response,
        },
        verifier_config: VerifierConfig {
            base_url: verifier.uri(),
            api_version: VerifierApi::V1_1,
            api_key: SecretString::from(VERIFIER_KEY.to_string()),
            timeout_millis: Some(2000),
        },
        sheets_config: SheetsConfig {
            base_url: sheets.uri(),
            spreadsheet_id: SPREADSHEET_ID.to_string(),
            service_account_credentials: None,
            access_token: Some(SecretString::from(SHEETS_TOKEN.to_string())),
            layout: AuditLayout::SheetPerCategory {
                sheets: sheet_names,
            },
            timeout_millis: Some(2000),
        },
        marketing_config: MarketingConfig {
            base_url: marketing.uri(),
            api_key: SecretString::from(MARKETING_KEY.to_string()),
            list_id: LIST_ID.to_string(),
            event_name: "emailCaptured".to_string(),
            timeout_millis: Some(2000),
        },
        webhook_config: WebhookConfig {
            endpoints: vec![
                format!("{}/first?email={{email}}", webhooks.uri()),
                format!("{}/second?email={{email}}&src={{source}}", webhooks.uri()),
            ],
            timeout_millis: Some(2000),
        },
    }
}
