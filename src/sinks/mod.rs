pub mod console;
pub mod csv_log;

use async_trait::async_trait;
use std::time::Duration;

use crate::models::{CycleResult, DeliveryCode};
use crate::utils::error::Result;

pub use console::ConsoleTable;
pub use csv_log::CsvLog;

/// Downstream consumer of cycle results. The scheduler calls every sink in
/// registration order; a failing sink never stops the others.
#[async_trait]
pub trait ResultSink: Send + Sync {
    fn name(&self) -> &str;

    /// Failures of a persistent sink count against the run's exit status.
    fn is_persistent(&self) -> bool {
        false
    }

    async fn cycle_started(&self, _cycle: u32, _codes: &[DeliveryCode]) -> Result<()> {
        Ok(())
    }

    async fn record(&self, result: &CycleResult) -> Result<()>;

    async fn cycle_finished(&self, _cycle: u32, _elapsed: Duration) -> Result<()> {
        Ok(())
    }
}
