use chrono::{DateTime, Local};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::availability::{AvailabilityStatus, DeliveryCode, StatusKind};

pub const PRODUCT_NAME_FALLBACK: &str = "Product name not found";
pub const PRICE_FALLBACK: &str = "Price not found";

/// Ordered delivery code -> status mapping. Iteration order is configuration order.
pub type PerCodeStatus = IndexMap<DeliveryCode, AvailabilityStatus>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductIdentity {
    pub name: String,
    pub price: String,
}

impl ProductIdentity {
    pub fn new(name: impl Into<String>, price: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            price: price.into(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(PRODUCT_NAME_FALLBACK, PRICE_FALLBACK)
    }
}

/// Outcome of a best-effort text read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextRead {
    Found(String),
    Fallback { value: String, cause: String },
}

impl TextRead {
    pub fn fallback(value: impl Into<String>, cause: impl Into<String>) -> Self {
        TextRead::Fallback {
            value: value.into(),
            cause: cause.into(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, TextRead::Fallback { .. })
    }

    pub fn into_value(self) -> String {
        match self {
            TextRead::Found(value) => value,
            TextRead::Fallback { value, .. } => value,
        }
    }
}

/// Where a single delivery code check currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckPhase {
    Idle,
    Submitted,
    AwaitingIndicator,
    Resolved,
}

impl fmt::Display for CheckPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckPhase::Idle => "idle",
            CheckPhase::Submitted => "submitted",
            CheckPhase::AwaitingIndicator => "awaiting_indicator",
            CheckPhase::Resolved => "resolved",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleResult {
    pub url: String,
    pub product: ProductIdentity,
    pub per_code: PerCodeStatus,
    pub timestamp: DateTime<Local>,
}

impl CycleResult {
    pub fn new(url: impl Into<String>, product: ProductIdentity, per_code: PerCodeStatus) -> Self {
        Self {
            url: url.into(),
            product,
            per_code,
            timestamp: Local::now(),
        }
    }

    /// Same status for every configured code.
    pub fn uniform(
        url: impl Into<String>,
        product: ProductIdentity,
        codes: &[DeliveryCode],
        status: AvailabilityStatus,
    ) -> Self {
        let per_code = codes
            .iter()
            .map(|code| (code.clone(), status.clone()))
            .collect();
        Self::new(url, product, per_code)
    }

    pub fn available_codes(&self) -> Vec<&DeliveryCode> {
        self.per_code
            .iter()
            .filter(|(_, status)| status.is_available())
            .map(|(code, _)| code)
            .collect()
    }

    pub fn is_all(&self, kind: StatusKind) -> bool {
        self.per_code.values().all(|status| status.kind() == kind)
    }

    pub fn covers_exactly(&self, codes: &[DeliveryCode]) -> bool {
        self.per_code.len() == codes.len() && self.per_code.keys().zip(codes).all(|(a, b)| a == b)
    }

    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}
