//! HTTP adapters for the external services a capture talks to.

pub mod google_auth;
pub mod marketing;
pub mod sheets;
pub mod verifier;
pub mod webhooks;

pub use marketing::{IterableClient, MarketingPlatform};
pub use sheets::{AuditRow, SheetsAuth, SheetsClient};
pub use verifier::{VerificationResult, VerifierClient};
pub use webhooks::WebhookClient;
