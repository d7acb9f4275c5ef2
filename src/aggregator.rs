use futures::stream::{self, Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::Retry;
use tokio_retry::strategy::FixedInterval;

use crate::models::{AvailabilityStatus, CycleResult, DeliveryCode, ProductIdentity};
use crate::resolver::AvailabilityResolver;
use crate::session::{PageSession, SessionFactory};

/// How sessions are opened for each product.
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    /// Extra attempts after the first failed open.
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    /// Products resolved concurrently, each on its own session.
    pub max_concurrent_products: usize,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            retry_attempts: 0,
            retry_delay: Duration::ZERO,
            max_concurrent_products: 1,
        }
    }
}

/// Runs the resolver over every product of one cycle.
pub struct CycleAggregator {
    factory: Arc<dyn SessionFactory>,
    resolver: Arc<AvailabilityResolver>,
    policy: SessionPolicy,
}

impl CycleAggregator {
    pub fn new(factory: Arc<dyn SessionFactory>, resolver: Arc<AvailabilityResolver>, policy: SessionPolicy) -> Self {
        Self {
            factory,
            resolver,
            policy,
        }
    }

    /// Results in product order, each yielded as soon as it and every
    /// earlier product are resolved.
    pub fn results<'a>(
        &'a self,
        products: &'a [String],
        codes: &'a [DeliveryCode],
    ) -> impl Stream<Item = CycleResult> + Send + 'a {
        stream::iter(products)
            .map(move |url| self.resolve_product(url, codes))
            .buffered(self.policy.max_concurrent_products.max(1))
    }

    pub async fn run_cycle(&self, products: &[String], codes: &[DeliveryCode]) -> Vec<CycleResult> {
        self.results(products, codes).collect().await
    }

    async fn resolve_product(&self, url: &str, codes: &[DeliveryCode]) -> CycleResult {
        let session = match self.open_session(url).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(url, error = %e, "Could not open session, reporting every code as failed");
                metrics::counter!("stock_watcher_session_failures_total").increment(1);
                return CycleResult::uniform(
                    url,
                    ProductIdentity::unknown(),
                    codes,
                    AvailabilityStatus::check_failed(format!("session unavailable: {}", e)),
                );
            }
        };

        let result = self.resolver.resolve(session.as_ref(), codes).await;

        // Dropping the session releases it on every other path.
        if let Err(e) = session.close().await {
            tracing::warn!(url, error = %e, "Failed to close session");
        }
        result
    }

    async fn open_session(&self, url: &str) -> crate::Result<Box<dyn PageSession>> {
        let strategy = FixedInterval::new(self.policy.retry_delay).take(self.policy.retry_attempts as usize);
        let factory = Arc::clone(&self.factory);

        Retry::spawn(strategy, || {
            let factory = Arc::clone(&factory);
            async move {
                factory.open(url).await.map_err(|e| {
                    tracing::warn!(url, error = %e, "Session open attempt failed");
                    e
                })
            }
        })
        .await
    }
}
