//! kestrel-llm - Generator integration layer for the Kestrel stack.
//!
//! The generator is an opaque text-completion backend behind the
//! [`Generator`] trait; the [`Executor`] turns a `(PromptSpec, Genome)` pair
//! into [`kestrel_core::ExecutionMetrics`] by calling it, optionally pulling
//! retrieval context first, then validating, comparing and safety-checking
//! the output through plug-ins.

pub mod clients;
pub mod compare;
pub mod executor;
pub mod meta;
pub mod models;
pub mod output;
pub mod safety;
pub mod validation;

pub use clients::{HttpGenerator, MockGenerator};
pub use compare::{Comparator, IntentComparator};
pub use executor::{ExecutionOutcome, Executor};
pub use meta::RubricRewriter;
pub use models::{GenerationOutput, GenerationRequest, Generator, LlmError};
pub use safety::{RegexSafetyFilter, SafetyFilter};
pub use validation::{ConstValidator, HeuristicValidator, Validator};
