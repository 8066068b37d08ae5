//! An in-memory `WorkbookHost` used by this crate's own tests and the
//! `tests/` integration suite, adapted to the narrower `WorkbookHost`
//! surface this engine needs rather than a full document model.
//!
//! Every field lives behind a `Mutex` rather than a plain `RefCell`: a
//! `WorkbookEvaluator` holds its host behind an `Arc<dyn WorkbookHost>` so
//! it can be shared into a `CollaboratingWorkbooksEnvironment`, and
//! `WorkbookHost` is `Send + Sync`, so the setters below stay usable after
//! the workbook has been handed to an evaluator.

use std::sync::{Arc, Mutex};

use formualizer_common::{ExcelError, ExcelErrorKind, LiteralValue, Token};
use formualizer_parse::compile::{compile, SheetResolver};
use formualizer_parse::parser::parse;
use rustc_hash::FxHashMap;

use crate::traits::{NameBinding, SpreadsheetVersion, WorkbookHost};

#[derive(Default)]
pub struct TestWorkbook {
    sheets: Mutex<Vec<String>>,
    values: Mutex<FxHashMap<(u32, u32, u32), LiteralValue>>,
    formulas: Mutex<FxHashMap<(u32, u32, u32), Arc<[Token]>>>,
    names: Mutex<FxHashMap<u32, NameBinding>>,
    finals: Mutex<std::collections::HashSet<(u32, u32, u32)>>,
    external_literals: Mutex<FxHashMap<(u32, u32, u32), LiteralValue>>,
}

impl TestWorkbook {
    pub fn new() -> Self {
        let wb = Self::default();
        wb.sheets.lock().unwrap().push("Sheet1".to_string());
        wb
    }

    pub fn add_sheet(&self, name: &str) -> u32 {
        let mut sheets = self.sheets.lock().unwrap();
        sheets.push(name.to_string());
        (sheets.len() - 1) as u32
    }

    pub fn set_value(&self, sheet: u32, row: u32, col: u32, value: LiteralValue) {
        self.values.lock().unwrap().insert((sheet, row, col), value);
        self.formulas.lock().unwrap().remove(&(sheet, row, col));
    }

    /// Compile `formula` (e.g. `"=A1+A2"`) against this workbook's sheets
    /// and install it as a formula cell.
    pub fn set_formula(&self, sheet: u32, row: u32, col: u32, formula: &str) {
        let home = self.sheets.lock().unwrap().get(sheet as usize).cloned();
        let ast = parse(formula).expect("test formula parses");
        let tokens = compile(&ast, home.as_deref(), self).expect("test formula compiles");
        self.formulas
            .lock()
            .unwrap()
            .insert((sheet, row, col), Arc::from(tokens));
        self.values.lock().unwrap().remove(&(sheet, row, col));
    }

    pub fn set_name(&self, index: u32, binding: NameBinding) {
        self.names.lock().unwrap().insert(index, binding);
    }

    pub fn set_name_formula(&self, index: u32, formula: &str) {
        let ast = parse(formula).expect("test name formula parses");
        let tokens = compile(&ast, None, self).expect("test name formula compiles");
        self.names
            .lock()
            .unwrap()
            .insert(index, NameBinding::Formula(Arc::from(tokens)));
    }

    pub fn mark_final(&self, sheet: u32, row: u32, col: u32) {
        self.finals.lock().unwrap().insert((sheet, row, col));
    }

    pub fn set_external_literal(&self, sheet: u32, row: u32, col: u32, value: LiteralValue) {
        self.external_literals
            .lock()
            .unwrap()
            .insert((sheet, row, col), value);
    }
}

impl SheetResolver for TestWorkbook {
    fn sheet_index(&self, name: &str) -> Option<u32> {
        self.sheets
            .lock()
            .unwrap()
            .iter()
            .position(|s| s.eq_ignore_ascii_case(name))
            .map(|i| i as u32)
    }
}

impl WorkbookHost for TestWorkbook {
    fn cell_value(&self, sheet: u32, row: u32, col: u32) -> Result<LiteralValue, ExcelError> {
        Ok(self
            .values
            .lock()
            .unwrap()
            .get(&(sheet, row, col))
            .cloned()
            .unwrap_or(LiteralValue::Empty))
    }

    fn formula_tokens(&self, sheet: u32, row: u32, col: u32) -> Option<Arc<[Token]>> {
        self.formulas.lock().unwrap().get(&(sheet, row, col)).cloned()
    }

    fn sheet_index(&self, name: &str) -> Option<u32> {
        SheetResolver::sheet_index(self, name)
    }

    fn sheet_name(&self, sheet: u32) -> Option<String> {
        self.sheets.lock().unwrap().get(sheet as usize).cloned()
    }

    fn sheet_count(&self) -> u32 {
        self.sheets.lock().unwrap().len() as u32
    }

    fn resolve_name(&self, index: u32) -> Result<NameBinding, ExcelError> {
        self.names
            .lock()
            .unwrap()
            .get(&index)
            .cloned()
            .ok_or_else(|| ExcelError::new(ExcelErrorKind::Name))
    }

    fn spreadsheet_version(&self) -> SpreadsheetVersion {
        SpreadsheetVersion::default()
    }

    fn is_cell_final(&self, sheet: u32, row: u32, col: u32) -> bool {
        self.finals.lock().unwrap().contains(&(sheet, row, col))
    }

    fn cached_external_literal(&self, sheet: u32, row: u32, col: u32) -> LiteralValue {
        self.external_literals
            .lock()
            .unwrap()
            .get(&(sheet, row, col))
            .cloned()
            .unwrap_or(LiteralValue::Empty)
    }
}
