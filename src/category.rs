//! Deliverability categories reported by the verification vendor and the gate policy built on them.

use serde::{Deserialize, Serialize};
use strum_macros::AsRefStr;

/// The deliverability classification of an email address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Category {
    Deliverable,
    Risky,
    Undeliverable,
    Unknown,
}

/// What happens to a request after verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Continue,
    Reject,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Deliverable,
        Category::Risky,
        Category::Undeliverable,
        Category::Unknown,
    ];

    /// Maps a vendor status string to a category. Anything unrecognized is `Unknown`.
    pub fn from_vendor<S: AsRef<str>>(value: S) -> Self {
        match value.as_ref().trim().to_ascii_lowercase().as_str() {
            "deliverable" => Category::Deliverable,
            "risky" => Category::Risky,
            "undeliverable" => Category::Undeliverable,
            _ => Category::Unknown,
        }
    }

    /// Uncertain addresses are still onboarded, confirmed-bad ones are not.
    pub fn gate(self) -> GateDecision {
        match self {
            Category::Deliverable | Category::Unknown => GateDecision::Continue,
            Category::Risky | Category::Undeliverable => GateDecision::Reject,
        }
    }

    /// Position of this category's column in the column-per-category audit layout.
    pub fn column_index(self) -> usize {
        match self {
            Category::Deliverable => 0,
            Category::Risky => 1,
            Category::Undeliverable => 2,
            Category::Unknown => 3,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}
