pub mod availability;
pub mod cycle_result;

// Re-exports for convenience
pub use availability::*;
pub use cycle_result::*;
