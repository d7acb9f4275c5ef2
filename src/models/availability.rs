use serde::{Deserialize, Serialize};
use std::fmt;

/// Geographic identifier submitted to a listing page (postal code, pincode...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryCode(String);

impl DeliveryCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeliveryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeliveryCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<String> for DeliveryCode {
    fn from(code: String) -> Self {
        Self(code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AvailabilityStatus {
    Available,
    OutOfStock,
    SoldOut,
    CheckFailed { cause: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    Available,
    OutOfStock,
    SoldOut,
    CheckFailed,
}

impl AvailabilityStatus {
    pub fn check_failed(cause: impl Into<String>) -> Self {
        AvailabilityStatus::CheckFailed {
            cause: Some(cause.into()),
        }
    }

    pub fn kind(&self) -> StatusKind {
        match self {
            AvailabilityStatus::Available => StatusKind::Available,
            AvailabilityStatus::OutOfStock => StatusKind::OutOfStock,
            AvailabilityStatus::SoldOut => StatusKind::SoldOut,
            AvailabilityStatus::CheckFailed { .. } => StatusKind::CheckFailed,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, AvailabilityStatus::Available)
    }

    /// Rendering used by the console table and the record log. Only an
    /// orderable product reads as `Available`; every other kind collapses.
    pub fn label(&self) -> &'static str {
        if self.is_available() {
            "Available"
        } else {
            "Out of stock"
        }
    }
}

impl StatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Available => "available",
            StatusKind::OutOfStock => "out_of_stock",
            StatusKind::SoldOut => "sold_out",
            StatusKind::CheckFailed => "check_failed",
        }
    }
}

impl fmt::Display for AvailabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AvailabilityStatus::CheckFailed { cause: Some(cause) } => {
                write!(f, "check_failed ({})", cause)
            }
            other => f.write_str(other.kind().as_str()),
        }
    }
}
