//! Host-facing traits: what a collaborating workbook must supply for the
//! evaluator to resolve references, names, and functions.
//!
//! This mirrors the shape of a tree-walking evaluator's resolver traits,
//! but the surface is narrower: the stack VM never needs lazy argument
//! handles over an AST, because every operand has already been pushed as
//! a value (or an undereferenced reference) by the time a function token
//! runs.

use std::sync::Arc;

use formualizer_common::{ExcelError, LiteralValue, Token};

use crate::function::Function;

/// Per-format capacity limits, used by region-relative reference
/// adjustment to reject out-of-bounds shifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpreadsheetVersion {
    pub max_rows: u32,
    pub max_cols: u32,
}

impl SpreadsheetVersion {
    pub const EXCEL_2007: Self = Self {
        max_rows: 1_048_576,
        max_cols: 16_384,
    };
}

impl Default for SpreadsheetVersion {
    fn default() -> Self {
        Self::EXCEL_2007
    }
}

/// What a defined name (`Name`/`NameX` token) stands for, .8:
/// either a bare function name handed to another function as a callback, or
/// a formula to recursively evaluate.
#[derive(Debug, Clone)]
pub enum NameBinding {
    /// The name is itself a function name (pushed as `FunctionName`, never
    /// evaluated further).
    Function(String),
    /// The name has a formula; the interpreter evaluates its tokens and
    /// pushes the result.
    Formula(Arc<[Token]>),
}

/// Everything the evaluator needs from the workbook it is evaluating
/// against. A `TestWorkbook` implements this directly for unit tests; a
/// real host adapts its own document model.
pub trait WorkbookHost: Send + Sync {
    /// Raw content of a single cell, *not* dereferenced (blanks stay
    /// `Empty`, never coerced to zero).
    fn cell_value(&self, sheet: u32, row: u32, col: u32) -> Result<LiteralValue, ExcelError>;

    /// Postfix tokens for a formula cell, or `None` if the cell holds a
    /// plain value (not a formula).
    fn formula_tokens(&self, sheet: u32, row: u32, col: u32) -> Option<Arc<[Token]>>;

    /// Resolve a sheet name to its stable index, if that sheet exists in
    /// this workbook.
    fn sheet_index(&self, name: &str) -> Option<u32>;

    /// Resolve a sheet index back to its display name.
    fn sheet_name(&self, sheet: u32) -> Option<String>;

    /// Number of sheets, used to validate a sheet index belongs to this
    /// workbook.
    fn sheet_count(&self) -> u32;

    /// Resolve a defined name (by the index a `Name`/`NameX` token
    /// carries) to what it stands for.
    fn resolve_name(&self, index: u32) -> Result<NameBinding, ExcelError>;

    fn spreadsheet_version(&self) -> SpreadsheetVersion {
        SpreadsheetVersion::default()
    }

    /// Whether recalculation should treat this cell's value as fixed and
    /// skip dependency bookkeeping for it. Default: nothing is stable.
    fn is_cell_final(&self, _sheet: u32, _row: u32, _col: u32) -> bool {
        false
    }

    /// Last-known literal for a cell whose owning workbook is not loaded,
    /// used to recover from `MissingExternalWorkbook` when
    /// `EngineConfig::ignore_missing_workbooks` is set.
    fn cached_external_literal(&self, _sheet: u32, _row: u32, _col: u32) -> LiteralValue {
        LiteralValue::Empty
    }
}

/// Looks up a function by name or numeric index. The aggregating finder
/// (see `crate::function_registry::AggregatingFinder`) implements this by
/// trying a chain of child providers, first hit wins — the hook UDFs and
/// add-ins attach through.
pub trait FunctionProvider: Send + Sync {
    fn get_function_by_name(&self, name: &str) -> Option<Arc<dyn Function>>;
    fn get_function_by_index(&self, index: u32) -> Option<Arc<dyn Function>>;
}
