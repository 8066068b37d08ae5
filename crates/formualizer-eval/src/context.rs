//! The evaluation context threaded through the interpreter: resolution of
//! cells/areas/names plus function lookup. A `WorkbookHost` supplies raw
//! data; `EvalContext` is the narrower surface the interpreter and
//! built-ins actually call through, letting a workbook evaluator layer in
//! caching/tracking without the built-ins knowing about either.

use formualizer_common::{CellId, ExcelError, LiteralValue};

use crate::fault::EngineFault;
use crate::function::Function;
use crate::traits::{FunctionProvider, NameBinding, SpreadsheetVersion, WorkbookHost};
use std::sync::Arc;

pub trait EvalContext {
    /// Resolve a single cell to its raw (non-dereferenced) value. `sheet`
    /// is `None` for a same-sheet reference; the context fills in the
    /// formula's home sheet.
    fn resolve_cell(&self, sheet: Option<u32>, row: u32, col: u32)
        -> Result<LiteralValue, ExcelError>;

    /// Resolve a rectangular area to its raw values, row-major.
    fn resolve_area(
        &self,
        sheet: Option<u32>,
        first_row: u32,
        first_col: u32,
        last_row: u32,
        last_col: u32,
    ) -> Result<Vec<Vec<LiteralValue>>, ExcelError>;

    /// Resolve a `Ref3D`: `workbook = None` or `Some(self.workbook_ix())`
    /// means same-workbook, anything else crosses into a collaborating
    /// workbook. `HostContext` has no peers, so any
    /// foreign workbook index is a `ForeignSheet` fault; a tracking
    /// context backed by a `CollaboratingWorkbooksEnvironment` resolves
    /// through the peer.
    fn resolve_ref3d(
        &self,
        workbook: Option<u32>,
        sheet: u32,
        row: u32,
        col: u32,
    ) -> Result<LiteralValue, EngineFault> {
        if workbook.is_some_and(|w| w != self.workbook_ix()) {
            return Err(EngineFault::ForeignSheet);
        }
        self.resolve_cell(Some(sheet), row, col)
            .map_err(EngineFault::InBand)
    }

    /// `Area3D` counterpart of `resolve_ref3d`.
    fn resolve_area3d(
        &self,
        workbook: Option<u32>,
        sheet: u32,
        first_row: u32,
        first_col: u32,
        last_row: u32,
        last_col: u32,
    ) -> Result<Vec<Vec<LiteralValue>>, EngineFault> {
        if workbook.is_some_and(|w| w != self.workbook_ix()) {
            return Err(EngineFault::ForeignSheet);
        }
        self.resolve_area(Some(sheet), first_row, first_col, last_row, last_col)
            .map_err(EngineFault::InBand)
    }

    /// Evaluate a defined name, returning the scalar or reference it
    /// stands for.
    fn resolve_name(&self, index: u32) -> Result<LiteralValue, ExcelError>;

    fn get_function_by_name(&self, name: &str) -> Option<Arc<dyn Function>>;
    fn get_function_by_index(&self, index: u32) -> Option<Arc<dyn Function>>;

    fn workbook_ix(&self) -> u32 {
        0
    }
    fn home_sheet(&self) -> u32;
    fn home_row(&self) -> u32 {
        0
    }
    fn home_col(&self) -> u32 {
        0
    }
    fn spreadsheet_version(&self) -> SpreadsheetVersion;

    /// Whether an area result should be returned as-is (multi-value) or
    /// dereferenced to a scalar at the evaluation boundary. Defaults to single-value; `evaluate_list` is the one caller
    /// that sets this false.
    fn single_value(&self) -> bool {
        true
    }

    fn current_cell(&self) -> CellId {
        CellId::new(self.workbook_ix(), self.home_sheet(), self.home_row(), self.home_col())
    }

    /// Called once per call to a `Function` whose `volatile()` returns
    /// true. A tracking context uses this to mark the formula entry it is
    /// currently committing `input_sensitive`; a bare
    /// `HostContext` has no entry to mark, so the default is a no-op.
    fn note_volatile(&self) {}
}

/// A minimal `EvalContext` over a single `WorkbookHost` with no caching
/// or dependency tracking — used for standalone `evaluate()` calls and as
/// the base the workbook evaluator façade builds on.
pub struct HostContext<'a> {
    host: &'a dyn WorkbookHost,
    functions: &'a dyn FunctionProvider,
    home_sheet: u32,
    home_row: u32,
    home_col: u32,
    single_value: bool,
}

impl<'a> HostContext<'a> {
    pub fn new(host: &'a dyn WorkbookHost, functions: &'a dyn FunctionProvider, home_sheet: u32) -> Self {
        Self {
            host,
            functions,
            home_sheet,
            home_row: 0,
            home_col: 0,
            single_value: true,
        }
    }

    pub fn at(mut self, row: u32, col: u32) -> Self {
        self.home_row = row;
        self.home_col = col;
        self
    }

    pub fn with_single_value(mut self, single_value: bool) -> Self {
        self.single_value = single_value;
        self
    }
}

impl<'a> EvalContext for HostContext<'a> {
    fn resolve_cell(&self, sheet: Option<u32>, row: u32, col: u32) -> Result<LiteralValue, ExcelError> {
        self.host.cell_value(sheet.unwrap_or(self.home_sheet), row, col)
    }

    fn resolve_area(
        &self,
        sheet: Option<u32>,
        first_row: u32,
        first_col: u32,
        last_row: u32,
        last_col: u32,
    ) -> Result<Vec<Vec<LiteralValue>>, ExcelError> {
        let sheet = sheet.unwrap_or(self.home_sheet);
        let mut rows = Vec::with_capacity((last_row - first_row + 1) as usize);
        for r in first_row..=last_row {
            let mut row = Vec::with_capacity((last_col - first_col + 1) as usize);
            for c in first_col..=last_col {
                row.push(self.host.cell_value(sheet, r, c)?);
            }
            rows.push(row);
        }
        Ok(rows)
    }

    fn resolve_name(&self, index: u32) -> Result<LiteralValue, ExcelError> {
        match self.host.resolve_name(index)? {
            NameBinding::Function(name) => Ok(LiteralValue::FunctionName(name)),
            NameBinding::Formula(tokens) => {
                let mut interp = crate::interpreter::Interpreter::new(self);
                interp.run(&tokens).map_err(ExcelError::from)
            }
        }
    }

    fn get_function_by_name(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.functions.get_function_by_name(name)
    }

    fn get_function_by_index(&self, index: u32) -> Option<Arc<dyn Function>> {
        self.functions.get_function_by_index(index)
    }

    fn home_sheet(&self) -> u32 {
        self.home_sheet
    }

    fn home_row(&self) -> u32 {
        self.home_row
    }

    fn home_col(&self) -> u32 {
        self.home_col
    }

    fn single_value(&self) -> bool {
        self.single_value
    }

    fn spreadsheet_version(&self) -> SpreadsheetVersion {
        self.host.spreadsheet_version()
    }
}
