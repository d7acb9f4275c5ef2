pub mod aggregator;
pub mod config;
pub mod models;
pub mod notifiers;
pub mod resolver;
pub mod scheduler;
pub mod session;
pub mod sinks;
pub mod utils;

// Re-export commonly used types
pub use aggregator::{CycleAggregator, SessionPolicy};
pub use config::{AppConfig, ConfigOverrides};
pub use models::{AvailabilityStatus, CycleResult, DeliveryCode, ProductIdentity};
pub use resolver::{AvailabilityResolver, ResolverTimings};
pub use scheduler::{CycleScheduler, RunSummary, ScheduleConfig};
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
