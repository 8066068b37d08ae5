//! Engine faults: the second of two error channels. Distinct from
//! `ExcelError` (the first channel, in-band data propagated as
//! `LiteralValue::Error`), a fault
//! means the inputs or the implementation are broken, not that a user
//! formula produced an error value. A fault aborts the current top-level
//! `evaluate` call; it never reaches a cell's cached result.
//!
//! `EngineFault::InBand` is the one exception, and it is purely a plumbing
//! convenience: it lets helper functions that sit between the interpreter
//! and `EvalContext` use `?` through a single `Result` type when crossing a
//! workbook boundary (`resolve_ref3d`/`resolve_area3d`) might fail either
//! way. The interpreter converts it straight back to
//! `Ok(LiteralValue::Error(..))` the moment it is produced — it is never
//! allowed to propagate past the token that triggered it.

use formualizer_common::{CellId, ExcelError, ExcelErrorKind, LiteralValue};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineFault {
    /// Bad token-size arithmetic, an empty/over-filled stack at the end of
    /// a run, or an `Unknown` token.
    #[error("malformed formula: {0}")]
    MalformedFormula(String),

    /// A `Ref3D`/`Area3D` token names a sheet that does not belong to the
    /// workbook it resolves against.
    #[error("reference to a sheet from a different workbook")]
    ForeignSheet,

    /// Region-relative reference adjustment shifted a reference past the
    /// spreadsheet format's row/column ceiling.
    #[error("shifted reference exceeds spreadsheet limits")]
    OutOfBounds,

    /// An `Exp` token (shared-formula host reference) was reached.
    #[error("unsupported token reached")]
    Unsupported,

    /// A function index/name has no registered implementation.
    #[error("function not implemented at {cell}")]
    NotImplemented { cell: CellId },

    /// A cross-workbook reference's target workbook is not loaded, and
    /// `EngineConfig::ignore_missing_workbooks` is `false`.
    #[error("external workbook is not loaded")]
    MissingExternalWorkbook,

    /// Plumbing-only: an in-band data error produced while crossing a
    /// workbook boundary. See module docs — never escapes the interpreter.
    #[error(transparent)]
    InBand(#[from] ExcelError),
}

impl EngineFault {
    /// Collapse an in-band fault back to data; panics on a genuine fault,
    /// since those must abort rather than be absorbed. Used at the one
    /// seam (`resolve_ref3d`/`resolve_area3d` callers) that can legally
    /// receive `InBand`.
    pub fn into_value_or_abort(self) -> Result<LiteralValue, EngineFault> {
        match self {
            EngineFault::InBand(e) => Ok(LiteralValue::Error(e)),
            other => Err(other),
        }
    }
}

impl From<EngineFault> for ExcelError {
    /// Fallback mapping used only where a caller's signature can't
    /// distinguish the two channels (e.g. `EvalContext::resolve_name`'s
    /// existing `Result<_, ExcelError>` surface). Maps every genuine fault
    /// to `#VALUE!` rather than losing it silently.
    fn from(fault: EngineFault) -> Self {
        match fault {
            EngineFault::InBand(e) => e,
            EngineFault::NotImplemented { .. } => ExcelError::new(ExcelErrorKind::Name),
            _ => ExcelError::new(ExcelErrorKind::Value).with_message(fault.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_band_collapses_to_value_others_abort() {
        let e = EngineFault::InBand(ExcelError::new(ExcelErrorKind::Div));
        assert_eq!(
            e.into_value_or_abort().unwrap(),
            LiteralValue::Error(ExcelError::new(ExcelErrorKind::Div))
        );
        assert!(EngineFault::ForeignSheet.into_value_or_abort().is_err());
    }
}
