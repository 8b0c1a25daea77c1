//! kestrel-core - Shared value types for the Kestrel optimization stack
//!
//! Everything that crosses a crate boundary lives here:
//! - [`Genome`]: the immutable, content-addressed unit of optimization
//! - [`PromptSpec`]: one task to execute or evaluate
//! - [`ExecutionMetrics`]: the structured result of one executor run
//! - [`GoldenExample`]: one curated evaluation record
//! - [`KestrelError`]: the service-wide error kinds with retriability

pub mod error;
pub mod genome;
pub mod golden;
pub mod metrics;
pub mod spec;

pub use error::{KestrelError, Result};
pub use genome::{Genome, GenomeId};
pub use golden::GoldenExample;
pub use metrics::ExecutionMetrics;
pub use spec::{Intent, PromptSpec};
