//! End-to-end scenarios driving a `WorkbookEvaluator` over a `TestWorkbook`
//! the same way a host application would: install formulas, evaluate,
//! mutate, and re-evaluate.

use formualizer_common::{ExcelError, ExcelErrorKind, LiteralValue};
use formualizer_eval::test_utils::TestWorkbook;
use formualizer_eval::WorkbookEvaluator;

fn evaluator(wb: TestWorkbook) -> WorkbookEvaluator<TestWorkbook> {
    WorkbookEvaluator::new(wb)
}

#[test]
fn simple_arithmetic_recomputes_after_an_input_changes() {
    let wb = TestWorkbook::new();
    wb.set_value(0, 0, 0, LiteralValue::Number(2.0));
    wb.set_value(0, 1, 0, LiteralValue::Number(3.0));
    wb.set_formula(0, 2, 0, "=A1+A2");
    let ev = evaluator(wb);

    assert_eq!(ev.evaluate(0, 2, 0).unwrap(), LiteralValue::Number(5.0));

    ev.host().set_value(0, 0, 0, LiteralValue::Number(10.0));
    ev.notify_update_cell(0, 0, 0);
    assert_eq!(ev.evaluate(0, 2, 0).unwrap(), LiteralValue::Number(13.0));
}

#[test]
fn if_short_circuits_its_untaken_branch() {
    let wb = TestWorkbook::new();
    wb.set_formula(0, 0, 0, "=IF(TRUE,1,1/0)");
    wb.set_formula(0, 1, 0, "=IF(FALSE,1/0,2)");
    let ev = evaluator(wb);

    assert_eq!(ev.evaluate(0, 0, 0).unwrap(), LiteralValue::Number(1.0));
    assert_eq!(ev.evaluate(0, 1, 0).unwrap(), LiteralValue::Number(2.0));
}

#[test]
fn choose_out_of_range_is_a_value_error() {
    let wb = TestWorkbook::new();
    wb.set_formula(0, 0, 0, "=CHOOSE(5,\"a\",\"b\")");
    let ev = evaluator(wb);

    assert_eq!(
        ev.evaluate(0, 0, 0).unwrap(),
        LiteralValue::Error(ExcelError::new(ExcelErrorKind::Value))
    );
}

#[test]
fn a_circular_pair_stays_circular_on_repeated_evaluation() {
    let wb = TestWorkbook::new();
    wb.set_formula(0, 0, 0, "=A2");
    wb.set_formula(0, 1, 0, "=A1");
    let ev = evaluator(wb);

    let circular = LiteralValue::Error(ExcelError::new(ExcelErrorKind::Circular));
    assert_eq!(ev.evaluate(0, 0, 0).unwrap(), circular);
    // Re-evaluating must not return a stale committed value from the
    // first, aborted attempt.
    assert_eq!(ev.evaluate(0, 0, 0).unwrap(), circular);
}

#[test]
fn a_blank_cell_dereferences_to_zero_but_is_still_isblank() {
    let wb = TestWorkbook::new();
    wb.set_formula(0, 1, 0, "=A1");
    wb.set_formula(0, 2, 0, "=ISBLANK(A1)");
    let ev = evaluator(wb);

    assert_eq!(ev.evaluate(0, 1, 0).unwrap(), LiteralValue::Number(0.0));
    assert_eq!(ev.evaluate(0, 2, 0).unwrap(), LiteralValue::Boolean(true));
}

#[test]
fn evaluate_list_shifts_relative_references_across_a_region() {
    let wb = TestWorkbook::new();
    for (row, value) in [(4, 10.0), (5, 20.0), (6, 30.0)] {
        wb.set_value(0, row, 0, LiteralValue::Number(value));
    }
    let ev = evaluator(wb);

    // Formula written against B5 (row 4), region B5:B7 (rows 4..=6),
    // instantiated at target B5 itself: delta is zero, so it reads A5:A7
    // unshifted.
    let value = ev
        .evaluate_list(0, 4, 1, 4, 1, "=A1:A3")
        .expect("list formula evaluates");
    match value {
        LiteralValue::Array(rows) => {
            let flat: Vec<f64> = rows
                .into_iter()
                .flatten()
                .map(|v| match v {
                    LiteralValue::Number(n) => n,
                    other => panic!("expected number, got {other:?}"),
                })
                .collect();
            assert_eq!(flat, vec![10.0, 20.0, 30.0]);
        }
        other => panic!("expected an array, got {other:?}"),
    }
}
