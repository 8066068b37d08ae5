//! The callable contract every built-in and UDF implements.
//!
//! Unlike a tree-walking evaluator, the stack VM has already reduced each
//! argument to a `LiteralValue` (possibly an undereferenced
//! `SingleRef`/`Area`/`RefList`) by the time a function token runs, so
//! `Function::eval` takes a plain slice rather than lazy AST handles.
//! Functions that want a range instead of a scalar (`SUM`, `CHOOSE`'s
//! fallback path) inspect the reference variants themselves; functions
//! that want a scalar call `crate::operand::dereference`.

use std::sync::Arc;

use formualizer_common::{ExcelError, LiteralValue};

use crate::context::EvalContext;

/// Excel-style callable. Object-safe so the registry can store
/// `Arc<dyn Function>` regardless of how many concrete function types
/// exist.
pub trait Function: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// True for functions whose result depends on more than their
    /// arguments (`RAND`, `NOW`, `TODAY`) — the evaluation cache marks
    /// their host cell `input_sensitive`.
    fn volatile(&self) -> bool {
        false
    }

    fn min_args(&self) -> usize {
        0
    }

    fn variadic(&self) -> bool {
        false
    }

    fn eval(&self, args: &[LiteralValue], ctx: &dyn EvalContext) -> Result<LiteralValue, ExcelError>;
}

/// Small helper so built-ins can register themselves with
/// `crate::function_registry::register` without repeating `Arc::new`.
pub fn arc<F: Function>(f: F) -> Arc<dyn Function> {
    Arc::new(f)
}
