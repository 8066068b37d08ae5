//! Meta crate that re-exports the Formualizer building blocks — the shared
//! value/error/token types, the formula parser, and the stack-machine
//! evaluator — behind feature flags, so downstream users pull in only the
//! layers they need while keeping access to the underlying crates for
//! deeper integration.

#[cfg(feature = "common")]
pub use formualizer_common as common;

#[cfg(feature = "parse")]
pub use formualizer_parse as parse;

#[cfg(feature = "eval")]
pub use formualizer_eval as eval;

#[cfg(feature = "common")]
pub use formualizer_common::{ExcelError, ExcelErrorKind, LiteralValue};

#[cfg(feature = "eval")]
pub use formualizer_eval::{EngineFault, EvaluationCache, WorkbookEvaluator, WorkbookHost};

#[cfg(feature = "eval")]
pub mod doc_examples;
