pub mod chrome;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use crate::models::DeliveryCode;
use crate::utils::error::Result;

pub use chrome::{ChromeSession, ChromeSessionFactory};

/// Named elements the monitor interacts with on a listing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKey {
    ProductName,
    Price,
    SoldOut,
    CodeInput,
    CheckButton,
    OutOfStock,
}

impl ElementKey {
    pub const ALL: [ElementKey; 6] = [
        ElementKey::ProductName,
        ElementKey::Price,
        ElementKey::SoldOut,
        ElementKey::CodeInput,
        ElementKey::CheckButton,
        ElementKey::OutOfStock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKey::ProductName => "product_name",
            ElementKey::Price => "price",
            ElementKey::SoldOut => "sold_out",
            ElementKey::CodeInput => "code_input",
            ElementKey::CheckButton => "check_button",
            ElementKey::OutOfStock => "out_of_stock",
        }
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single product-scoped handle into a rendered page.
///
/// Implementations are not assumed reentrant: callers drive one operation at
/// a time. Dropping a session must release it even if `close` was never
/// awaited.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageSession: Send + Sync {
    fn url(&self) -> &str;

    /// Text content of the element, or an error when it is missing.
    async fn read_text(&self, key: ElementKey) -> Result<String>;

    async fn exists(&self, key: ElementKey) -> Result<bool>;

    /// Replaces the content of the code input with `code`.
    async fn submit_code(&self, code: &DeliveryCode) -> Result<()>;

    async fn click(&self, key: ElementKey) -> Result<()>;

    /// Polls until the element is present and interactive. `Ok(false)` on timeout.
    async fn wait_until_ready(&self, key: ElementKey, timeout: Duration) -> Result<bool>;

    /// Lets the page finish rendering after an interaction.
    async fn settle(&self, delay: Duration) -> Result<()> {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn close(&self) -> Result<()>;
}

/// Opens sessions navigated to a product URL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, url: &str) -> Result<Box<dyn PageSession>>;
}
