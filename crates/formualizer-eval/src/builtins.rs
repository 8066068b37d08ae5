//! A handful of built-in functions, registered under both name and the
//! numeric function id a compiled token stream may carry.
//!
//! This is deliberately not a full function library — just enough real,
//! registered functions (`SUM`, `IF`, `CHOOSE`, `ISBLANK`, `AND`, `OR`,
//! `NOT`) that the interpreter's function-call path, the optimized
//! `IF`/`CHOOSE` fallback paths, and the end-to-end scenarios exercise
//! genuine dispatch rather than stubs.
//! Numeric ids follow the classic BIFF/OOXML built-in function id table.

use std::sync::Once;

use formualizer_common::{ExcelError, ExcelErrorKind, LiteralValue};
use formualizer_macros::excel_fn;

use crate::context::EvalContext;
use crate::function_registry::register_with_index;
use crate::operand::dereference;

fn scalar(v: &LiteralValue, ctx: &dyn EvalContext) -> Result<LiteralValue, ExcelError> {
    dereference(v.clone(), ctx.home_row(), ctx.home_col(), ctx)
}

fn coerce_number(v: &LiteralValue) -> Result<f64, ExcelError> {
    match v {
        LiteralValue::Number(n) => Ok(*n),
        LiteralValue::Int(i) => Ok(*i as f64),
        LiteralValue::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        LiteralValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ExcelError::new(ExcelErrorKind::Value)),
        LiteralValue::Empty | LiteralValue::MissingArg => Ok(0.0),
        LiteralValue::Error(e) => Err(e.clone()),
        _ => Err(ExcelError::new(ExcelErrorKind::Value)),
    }
}

/// Range-context numeric contribution: text and booleans inside a range are
/// ignored rather than erroring, matching Excel's `SUM` over a range.
fn range_number(v: &LiteralValue) -> f64 {
    match v {
        LiteralValue::Number(n) => *n,
        LiteralValue::Int(i) => *i as f64,
        _ => 0.0,
    }
}

fn sum_operand(v: &LiteralValue, ctx: &dyn EvalContext) -> Result<f64, ExcelError> {
    match v {
        LiteralValue::SingleRef { sheet, row, col } => {
            let cell = ctx.resolve_cell(*sheet, *row, *col)?;
            Ok(range_number(&cell))
        }
        LiteralValue::Area {
            sheet,
            first_row,
            first_col,
            last_row,
            last_col,
        } => {
            let grid = ctx.resolve_area(*sheet, *first_row, *first_col, *last_row, *last_col)?;
            Ok(grid.iter().flatten().map(range_number).sum())
        }
        LiteralValue::Array(rows) => Ok(rows.iter().flatten().map(range_number).sum()),
        LiteralValue::RefList(items) => {
            let mut total = 0.0;
            for item in items {
                total += sum_operand(item, ctx)?;
            }
            Ok(total)
        }
        LiteralValue::Error(e) => Err(e.clone()),
        LiteralValue::Empty | LiteralValue::MissingArg => Ok(0.0),
        other => coerce_number(other),
    }
}

#[excel_fn(name = "SUM", min = 1, variadic)]
fn sum(args: &[LiteralValue], ctx: &dyn EvalContext) -> Result<LiteralValue, ExcelError> {
    let mut total = 0.0;
    for arg in args {
        total += sum_operand(arg, ctx)?;
    }
    Ok(LiteralValue::Number(total))
}

#[excel_fn(name = "IF", min = 2, variadic)]
fn if_fn(args: &[LiteralValue], ctx: &dyn EvalContext) -> Result<LiteralValue, ExcelError> {
    let cond = scalar(&args[0], ctx)?;
    if let LiteralValue::Error(e) = cond {
        return Err(e);
    }
    if cond.is_truthy() {
        Ok(args.get(1).cloned().unwrap_or(LiteralValue::Boolean(true)))
    } else {
        Ok(args.get(2).cloned().unwrap_or(LiteralValue::Boolean(false)))
    }
}

#[excel_fn(name = "CHOOSE", min = 2, variadic)]
fn choose(args: &[LiteralValue], ctx: &dyn EvalContext) -> Result<LiteralValue, ExcelError> {
    let selector = scalar(&args[0], ctx)?;
    if let LiteralValue::Error(e) = selector {
        return Err(e);
    }
    let n = coerce_number(&selector)? as i64;
    let branches = &args[1..];
    if n >= 1 && (n as usize) <= branches.len() {
        Ok(branches[(n - 1) as usize].clone())
    } else {
        Err(ExcelError::new(ExcelErrorKind::Value))
    }
}

#[excel_fn(name = "ISBLANK", min = 1)]
fn is_blank(args: &[LiteralValue], ctx: &dyn EvalContext) -> Result<LiteralValue, ExcelError> {
    let raw = match &args[0] {
        LiteralValue::SingleRef { sheet, row, col } => ctx.resolve_cell(*sheet, *row, *col)?,
        LiteralValue::Area {
            sheet,
            first_row,
            first_col,
            ..
        } => ctx.resolve_cell(*sheet, *first_row, *first_col)?,
        other => other.clone(),
    };
    Ok(LiteralValue::Boolean(raw.is_blank()))
}

#[excel_fn(name = "AND", min = 1, variadic)]
fn and_fn(args: &[LiteralValue], ctx: &dyn EvalContext) -> Result<LiteralValue, ExcelError> {
    let mut all_true = true;
    for arg in args {
        let v = scalar(arg, ctx)?;
        if let LiteralValue::Error(e) = v {
            return Err(e);
        }
        all_true &= v.is_truthy();
    }
    Ok(LiteralValue::Boolean(all_true))
}

#[excel_fn(name = "OR", min = 1, variadic)]
fn or_fn(args: &[LiteralValue], ctx: &dyn EvalContext) -> Result<LiteralValue, ExcelError> {
    let mut any_true = false;
    for arg in args {
        let v = scalar(arg, ctx)?;
        if let LiteralValue::Error(e) = v {
            return Err(e);
        }
        any_true |= v.is_truthy();
    }
    Ok(LiteralValue::Boolean(any_true))
}

#[excel_fn(name = "NOT", min = 1)]
fn not_fn(args: &[LiteralValue], ctx: &dyn EvalContext) -> Result<LiteralValue, ExcelError> {
    let v = scalar(&args[0], ctx)?;
    if let LiteralValue::Error(e) = v {
        return Err(e);
    }
    Ok(LiteralValue::Boolean(!v.is_truthy()))
}

static REGISTER_ONCE: Once = Once::new();

/// Seed the global registry with this crate's built-ins. Idempotent and
/// safe to call from any number of tests/threads; `function_registry`
/// calls this internally before every lookup so built-ins are always
/// available without the host needing to remember to call it.
pub fn load_builtins() {
    REGISTER_ONCE.call_once(|| {
        register_with_index(1, crate::function::arc(IfFn));
        register_with_index(4, crate::function::arc(SumFn));
        register_with_index(36, crate::function::arc(AndFn));
        register_with_index(37, crate::function::arc(OrFn));
        register_with_index(38, crate::function::arc(NotFn));
        register_with_index(100, crate::function::arc(ChooseFn));
        register_with_index(129, crate::function::arc(IsBlankFn));
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HostContext;
    use crate::function_registry::GlobalRegistry;
    use crate::test_utils::TestWorkbook;
    use formualizer_parse::compile::compile;
    use formualizer_parse::parser::parse;

    fn run(wb: &TestWorkbook, formula: &str) -> LiteralValue {
        let ast = parse(formula).unwrap();
        let tokens = compile(&ast, None, wb).unwrap();
        let ctx = HostContext::new(wb, &GlobalRegistry, 0);
        crate::interpreter::Interpreter::new(&ctx).run(&tokens).unwrap()
    }

    #[test]
    fn sum_ignores_text_in_ranges_but_not_as_direct_args() {
        let wb = TestWorkbook::new();
        wb.set_value(0, 0, 0, LiteralValue::Number(1.0));
        wb.set_value(0, 1, 0, LiteralValue::Text("skip me".into()));
        wb.set_value(0, 2, 0, LiteralValue::Number(3.0));
        assert_eq!(run(&wb, "=SUM(A1:A3)"), LiteralValue::Number(4.0));
        assert_eq!(run(&wb, "=SUM(1,2,3)"), LiteralValue::Number(6.0));
    }

    #[test]
    fn isblank_sees_the_pre_dereference_value() {
        let wb = TestWorkbook::new();
        assert_eq!(run(&wb, "=ISBLANK(A1)"), LiteralValue::Boolean(true));
        wb.set_value(0, 0, 0, LiteralValue::Number(0.0));
        assert_eq!(run(&wb, "=ISBLANK(A1)"), LiteralValue::Boolean(false));
    }

    #[test]
    fn and_or_not_short_circuit_on_error() {
        let wb = TestWorkbook::new();
        assert_eq!(run(&wb, "=AND(TRUE,TRUE)"), LiteralValue::Boolean(true));
        assert_eq!(run(&wb, "=OR(FALSE,TRUE)"), LiteralValue::Boolean(true));
        assert_eq!(run(&wb, "=NOT(FALSE)"), LiteralValue::Boolean(true));
        assert_eq!(
            run(&wb, "=AND(1/0,TRUE)"),
            LiteralValue::Error(ExcelError::new(ExcelErrorKind::Div))
        );
    }
}
