use std::sync::Arc;
use std::time::Duration;

use crate::config::MonitorConfig;
use crate::models::{
    AvailabilityStatus, CheckPhase, CycleResult, DeliveryCode, PerCodeStatus, ProductIdentity, TextRead,
    PRICE_FALLBACK, PRODUCT_NAME_FALLBACK,
};
use crate::notifiers::{AvailabilityEvent, Notifier};
use crate::session::{ElementKey, PageSession};
use crate::utils::error::AppError;

/// Fixed bounds for every interaction with a page.
#[derive(Debug, Clone, Copy)]
pub struct ResolverTimings {
    pub ready_timeout: Duration,
    pub settle_delay: Duration,
}

impl ResolverTimings {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            ready_timeout: config.ready_timeout(),
            settle_delay: config.settle_delay(),
        }
    }
}

#[derive(Debug)]
struct CodeCheckFailure {
    phase: CheckPhase,
    error: AppError,
}

impl CodeCheckFailure {
    fn at(phase: CheckPhase) -> impl FnOnce(AppError) -> Self {
        move |error| Self { phase, error }
    }
}

/// Resolves identity and per-code availability of one product.
pub struct AvailabilityResolver {
    timings: ResolverTimings,
    notifier: Arc<dyn Notifier>,
}

impl AvailabilityResolver {
    pub fn new(timings: ResolverTimings, notifier: Arc<dyn Notifier>) -> Self {
        Self { timings, notifier }
    }

    /// Never fails: the returned result always carries every code in `codes`,
    /// in order.
    pub async fn resolve(&self, session: &dyn PageSession, codes: &[DeliveryCode]) -> CycleResult {
        let url = session.url().to_string();

        let name = read_text_or(session, ElementKey::ProductName, PRODUCT_NAME_FALLBACK).await;
        let price = read_text_or(session, ElementKey::Price, PRICE_FALLBACK).await;
        let product = ProductIdentity::new(name.into_value(), price.into_value());

        if self.is_sold_out(session).await {
            tracing::info!(url = %url, product = %product.name, "Product sold out, skipping code checks");
            for _ in codes {
                record_check(&AvailabilityStatus::SoldOut);
            }
            return CycleResult::uniform(url, product, codes, AvailabilityStatus::SoldOut);
        }

        let mut per_code = PerCodeStatus::with_capacity(codes.len());
        for code in codes {
            let status = match self.check_code(session, code).await {
                Ok(status) => status,
                Err(failure) => {
                    tracing::warn!(
                        url = %url,
                        code = %code,
                        phase = %failure.phase,
                        error = %failure.error,
                        "Error checking delivery code"
                    );
                    AvailabilityStatus::check_failed(failure.error.to_string())
                }
            };

            record_check(&status);
            tracing::debug!(code = %code, status = %status, "Delivery code resolved");

            if status.is_available() {
                self.fire_notification(&url, &product, code).await;
            }
            per_code.insert(code.clone(), status);
        }

        CycleResult::new(url, product, per_code)
    }

    async fn is_sold_out(&self, session: &dyn PageSession) -> bool {
        match session.exists(ElementKey::SoldOut).await {
            Ok(sold_out) => sold_out,
            Err(e) => {
                tracing::warn!(url = session.url(), error = %e, "Sold-out indicator unreadable, checking codes");
                false
            }
        }
    }

    // Idle -> Submitted -> AwaitingIndicator -> Resolved
    async fn check_code(
        &self,
        session: &dyn PageSession,
        code: &DeliveryCode,
    ) -> std::result::Result<AvailabilityStatus, CodeCheckFailure> {
        let timeout = self.timings.ready_timeout;

        self.wait_ready(session, ElementKey::CodeInput, timeout)
            .await
            .map_err(CodeCheckFailure::at(CheckPhase::Idle))?;
        session
            .submit_code(code)
            .await
            .map_err(CodeCheckFailure::at(CheckPhase::Idle))?;

        self.wait_ready(session, ElementKey::CheckButton, timeout)
            .await
            .map_err(CodeCheckFailure::at(CheckPhase::Submitted))?;
        session
            .click(ElementKey::CheckButton)
            .await
            .map_err(CodeCheckFailure::at(CheckPhase::Submitted))?;

        session
            .settle(self.timings.settle_delay)
            .await
            .map_err(CodeCheckFailure::at(CheckPhase::AwaitingIndicator))?;
        let out_of_stock = session
            .exists(ElementKey::OutOfStock)
            .await
            .map_err(CodeCheckFailure::at(CheckPhase::AwaitingIndicator))?;

        Ok(if out_of_stock {
            AvailabilityStatus::OutOfStock
        } else {
            AvailabilityStatus::Available
        })
    }

    async fn wait_ready(
        &self,
        session: &dyn PageSession,
        key: ElementKey,
        timeout: Duration,
    ) -> crate::Result<()> {
        if session.wait_until_ready(key, timeout).await? {
            Ok(())
        } else {
            Err(AppError::Timeout {
                selector: key.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }

    async fn fire_notification(&self, url: &str, product: &ProductIdentity, code: &DeliveryCode) {
        let event = AvailabilityEvent::new(url, product.clone(), code.clone());
        if let Err(e) = self.notifier.notify(&event).await {
            tracing::warn!(code = %code, error = %e, "Availability notification failed");
        }
    }
}

async fn read_text_or(session: &dyn PageSession, key: ElementKey, fallback: &str) -> TextRead {
    let read = match session.read_text(key).await {
        Ok(text) if !text.trim().is_empty() => TextRead::Found(text),
        Ok(_) => TextRead::fallback(fallback, format!("{} is empty", key)),
        Err(e) => TextRead::fallback(fallback, e.to_string()),
    };
    if let TextRead::Fallback { cause, .. } = &read {
        tracing::warn!(url = session.url(), element = %key, cause = %cause, "Using fallback text");
    }
    read
}

fn record_check(status: &AvailabilityStatus) {
    metrics::counter!("stock_watcher_code_checks_total", "status" => status.kind().as_str()).increment(1);
}
