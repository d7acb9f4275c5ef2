use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use uuid::Uuid;

use crate::aggregator::CycleAggregator;
use crate::config::AppConfig;
use crate::models::{CycleResult, DeliveryCode};
use crate::sinks::ResultSink;
use crate::utils::error::AppError;

/// What the scheduler needs to know about a run.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub products: Vec<String>,
    pub codes: Vec<DeliveryCode>,
    /// `None` runs until shutdown.
    pub max_cycles: Option<u32>,
    pub inter_cycle_delay: Duration,
}

impl ScheduleConfig {
    pub fn from_app_config(config: &AppConfig, products: Vec<String>) -> Self {
        Self {
            products,
            codes: config.delivery_codes(),
            max_cycles: config.monitor.max_cycles,
            inter_cycle_delay: config.monitor.inter_cycle_delay(),
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.products.is_empty() {
            return Err(AppError::Validation("No products to monitor".into()));
        }
        if self.codes.is_empty() {
            return Err(AppError::Validation("No delivery codes to check".into()));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = self.codes.iter().find(|code| !seen.insert(*code)) {
            return Err(AppError::Validation(format!("Duplicate delivery code: {}", duplicate)));
        }
        if self.max_cycles == Some(0) {
            return Err(AppError::Validation("max_cycles must be greater than 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub cycles_completed: u32,
    pub sleeps: u32,
    pub results_dispatched: u64,
    pub persistence_failures: u64,
    pub interrupted: bool,
}

enum CycleOutcome {
    Completed,
    Interrupted,
}

/// Drives monitoring cycles and streams their results to the sinks.
pub struct CycleScheduler {
    config: ScheduleConfig,
    aggregator: CycleAggregator,
    sinks: Vec<Arc<dyn ResultSink>>,
}

impl CycleScheduler {
    pub fn new(config: ScheduleConfig, aggregator: CycleAggregator) -> Self {
        Self {
            config,
            aggregator,
            sinks: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// Runs until `max_cycles` cycles completed or `shutdown` flips to `true`.
    ///
    /// Shutdown aborts the in-flight cycle, dropping its open sessions, and
    /// skips any pending inter-cycle sleep.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> crate::Result<RunSummary> {
        self.config.validate()?;

        let mut summary = RunSummary {
            run_id: Uuid::new_v4(),
            ..RunSummary::default()
        };
        let mut cycle: u32 = 0;

        tracing::info!(
            run_id = %summary.run_id,
            products = self.config.products.len(),
            codes = self.config.codes.len(),
            max_cycles = ?self.config.max_cycles,
            "Starting availability monitor"
        );

        loop {
            if *shutdown.borrow() {
                summary.interrupted = true;
                break;
            }

            cycle += 1;
            let started = Instant::now();

            match self.run_cycle(cycle, &mut shutdown, &mut summary).await {
                CycleOutcome::Completed => {}
                CycleOutcome::Interrupted => {
                    tracing::info!(cycle, "Cycle interrupted by shutdown");
                    summary.interrupted = true;
                    break;
                }
            }

            let elapsed = started.elapsed();
            summary.cycles_completed += 1;
            tracing::info!(cycle, "Fetch time: {:.2} seconds", elapsed.as_secs_f64());
            for sink in &self.sinks {
                if let Err(e) = sink.cycle_finished(cycle, elapsed).await {
                    tracing::warn!(sink = sink.name(), error = %e, "Sink failed to finish cycle");
                }
            }

            if self.is_last_cycle(cycle) {
                break;
            }

            let delay = self.config.inter_cycle_delay;
            tracing::info!(delay_secs = delay.as_secs(), "Waiting before the next cycle");
            tokio::select! {
                _ = tokio::time::sleep(delay) => summary.sleeps += 1,
                _ = wait_for_shutdown(&mut shutdown) => {
                    tracing::info!("Shutdown requested during wait");
                    summary.interrupted = true;
                    break;
                }
            }
        }

        tracing::info!(
            run_id = %summary.run_id,
            cycles = summary.cycles_completed,
            results = summary.results_dispatched,
            persistence_failures = summary.persistence_failures,
            "Monitor finished"
        );
        Ok(summary)
    }

    fn is_last_cycle(&self, cycle: u32) -> bool {
        self.config.max_cycles.is_some_and(|max| cycle >= max)
    }

    async fn run_cycle(
        &self,
        cycle: u32,
        shutdown: &mut watch::Receiver<bool>,
        summary: &mut RunSummary,
    ) -> CycleOutcome {
        for sink in &self.sinks {
            if let Err(e) = sink.cycle_started(cycle, &self.config.codes).await {
                tracing::warn!(sink = sink.name(), error = %e, "Sink failed to start cycle");
            }
        }

        let results = self.aggregator.results(&self.config.products, &self.config.codes);
        futures::pin_mut!(results);

        loop {
            tokio::select! {
                next = results.next() => match next {
                    Some(result) => self.dispatch(&result, summary).await,
                    None => return CycleOutcome::Completed,
                },
                _ = wait_for_shutdown(shutdown) => return CycleOutcome::Interrupted,
            }
        }
    }

    async fn dispatch(&self, result: &CycleResult, summary: &mut RunSummary) {
        debug_assert!(result.covers_exactly(&self.config.codes));
        summary.results_dispatched += 1;

        for sink in &self.sinks {
            if let Err(e) = sink.record(result).await {
                if sink.is_persistent() {
                    summary.persistence_failures += 1;
                    tracing::error!(sink = sink.name(), product = %result.product.name, error = %e, "Failed to persist result");
                } else {
                    tracing::warn!(sink = sink.name(), error = %e, "Sink failed to record result");
                }
            }
        }
    }
}

/// Resolves once the flag is `true`; pends forever if the sender is gone.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
