//! Minimal end-to-end examples used by this crate's own doc comments.

use formualizer_common::LiteralValue;
use formualizer_eval::test_utils::TestWorkbook;
use formualizer_eval::WorkbookEvaluator;

/// Evaluate a formula in a fresh single-sheet workbook and return the
/// resulting scalar value.
///
/// This helper is intended for documentation examples to avoid repetitive
/// setup.
///
/// # Example
///
/// ```rust
/// # use formualizer::doc_examples::eval_scalar;
/// let value = eval_scalar("=SUM(1,2,3)");
/// assert_eq!(value, formualizer::LiteralValue::Number(6.0));
/// ```
pub fn eval_scalar(formula: &str) -> LiteralValue {
    let wb = TestWorkbook::new();
    wb.set_formula(0, 0, 0, formula);
    let evaluator = WorkbookEvaluator::new(wb);
    evaluator.evaluate(0, 0, 0).unwrap_or_else(LiteralValue::Error)
}
