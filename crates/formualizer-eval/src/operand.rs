//! Operand resolution: coercion between scalar, reference and area values,
//! and "dereferencing" a reference/area down to a single scalar at a given
//! source position.

use formualizer_common::{ExcelError, ExcelErrorKind, LiteralValue};

use crate::context::EvalContext;

/// Reduce `value` to a scalar as seen from `(src_row, src_col)`.
///
/// - A scalar passes through unchanged.
/// - A single reference reads the cell it points at.
/// - An area projects onto the source row/column: a one-column area
///   yields its sole column regardless of `src_col`; a one-row area
///   yields its sole row regardless of `src_row`; otherwise the source
///   position must fall inside the area, else `#VALUE!`.
/// - `Blank`/`Empty` is re-typed to `Number(0)` at this boundary — formulas
///   never evaluate to blank (`ISBLANK` must inspect the value *before*
///   this call).
///
/// `dereference` is idempotent: `dereference(dereference(v, r, c), r, c) ==
/// dereference(v, r, c)` for every `v`, since the second call only ever
/// sees an already-scalar value (see the round-trip tests below).
pub fn dereference(
    value: LiteralValue,
    src_row: u32,
    src_col: u32,
    ctx: &dyn EvalContext,
) -> Result<LiteralValue, ExcelError> {
    let resolved = match value {
        LiteralValue::SingleRef { sheet, row, col } => ctx.resolve_cell(sheet, row, col)?,
        LiteralValue::Area {
            sheet,
            first_row,
            first_col,
            last_row,
            last_col,
        } => {
            let (row, col) = project_area(first_row, first_col, last_row, last_col, src_row, src_col)?;
            ctx.resolve_cell(sheet, row, col)?
        }
        LiteralValue::RefList(items) => {
            // A union dereferences through its first member; Excel applies
            // the same implicit-intersection rule recursively.
            let Some(first) = items.into_iter().next() else {
                return Ok(LiteralValue::Error(ExcelError::new(ExcelErrorKind::Value)));
            };
            return dereference(first, src_row, src_col, ctx);
        }
        other => other,
    };

    Ok(coerce_blank_to_zero(resolved))
}

/// Coordinate a source position projects onto within `area`, per the
/// one-row/one-column shortcut rules; `#VALUE!` if the position falls
/// outside a genuinely 2-D area.
fn project_area(
    first_row: u32,
    first_col: u32,
    last_row: u32,
    last_col: u32,
    src_row: u32,
    src_col: u32,
) -> Result<(u32, u32), ExcelError> {
    let one_col = first_col == last_col;
    let one_row = first_row == last_row;

    if one_col && !one_row {
        return Ok((src_row.clamp(first_row, last_row), first_col));
    }
    if one_row && !one_col {
        return Ok((first_row, src_col.clamp(first_col, last_col)));
    }
    if one_row && one_col {
        return Ok((first_row, first_col));
    }
    if (first_row..=last_row).contains(&src_row) && (first_col..=last_col).contains(&src_col) {
        return Ok((src_row, src_col));
    }
    Err(ExcelError::new(ExcelErrorKind::Value).with_message("position outside area"))
}

/// Resolve a reference/area down to concrete data without collapsing it to
/// a single scalar — the `!ctx.single_value()` counterpart of
/// [`dereference`], used at the formula boundary when the caller
/// (`evaluate_list`) wants the whole area rather than one cell's worth of
/// it. A `SingleRef` still reads through to its one cell; an `Area`
/// becomes a row-major `Array` of the cells it spans; a `RefList`
/// materializes each member in place. Scalars and already-materialized
/// values pass through unchanged. No blank-to-zero coercion is applied —
/// that rule belongs to scalar dereferencing only.
pub fn materialize(value: LiteralValue, ctx: &dyn EvalContext) -> Result<LiteralValue, ExcelError> {
    match value {
        LiteralValue::SingleRef { sheet, row, col } => ctx.resolve_cell(sheet, row, col),
        LiteralValue::Area {
            sheet,
            first_row,
            first_col,
            last_row,
            last_col,
        } => {
            let rows = ctx.resolve_area(sheet, first_row, first_col, last_row, last_col)?;
            Ok(LiteralValue::Array(rows))
        }
        LiteralValue::RefList(items) => {
            let materialized = items
                .into_iter()
                .map(|v| materialize(v, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(LiteralValue::RefList(materialized))
        }
        other => Ok(other),
    }
}

/// Dereference an array-formula result: take the element at `(group_row,
/// group_col)` within the array, the evaluating cell's position within its
/// array-formula group. No blank-to-zero coercion applies here — arrays are materialized data, not cell references.
pub fn dereference_array_element(
    rows: &[Vec<LiteralValue>],
    group_row: usize,
    group_col: usize,
) -> LiteralValue {
    rows.get(group_row)
        .and_then(|r| r.get(group_col))
        .cloned()
        .unwrap_or(LiteralValue::Error(ExcelError::new(ExcelErrorKind::Na)))
}

fn coerce_blank_to_zero(value: LiteralValue) -> LiteralValue {
    if value.is_blank() {
        LiteralValue::Number(0.0)
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestWorkbook;
    use crate::traits::WorkbookHost;

    fn ctx(wb: &TestWorkbook) -> crate::context::HostContext<'_> {
        crate::context::HostContext::new(wb, &crate::function_registry::GlobalRegistry, 0)
    }

    #[test]
    fn scalar_passes_through() {
        let wb = TestWorkbook::new();
        let c = ctx(&wb);
        assert_eq!(
            dereference(LiteralValue::Number(5.0), 0, 0, &c).unwrap(),
            LiteralValue::Number(5.0)
        );
    }

    #[test]
    fn blank_cell_dereferences_to_zero() {
        let mut wb = TestWorkbook::new();
        wb.set_value(0, 0, 0, LiteralValue::Empty);
        let c = ctx(&wb);
        let v = LiteralValue::SingleRef { sheet: None, row: 0, col: 0 };
        assert_eq!(dereference(v, 5, 5, &c).unwrap(), LiteralValue::Number(0.0));
        assert!(wb.cell_value(0, 0, 0).unwrap().is_blank());
    }

    #[test]
    fn one_column_area_projects_by_row() {
        let mut wb = TestWorkbook::new();
        wb.set_value(0, 0, 0, LiteralValue::Number(1.0));
        wb.set_value(0, 1, 0, LiteralValue::Number(2.0));
        wb.set_value(0, 2, 0, LiteralValue::Number(3.0));
        let c = ctx(&wb);
        let area = LiteralValue::Area {
            sheet: None,
            first_row: 0,
            first_col: 0,
            last_row: 2,
            last_col: 0,
        };
        assert_eq!(dereference(area, 1, 99, &c).unwrap(), LiteralValue::Number(2.0));
    }

    #[test]
    fn two_d_area_requires_position_inside_span() {
        let wb = TestWorkbook::new();
        let c = ctx(&wb);
        let area = LiteralValue::Area {
            sheet: None,
            first_row: 0,
            first_col: 0,
            last_row: 2,
            last_col: 2,
        };
        assert!(matches!(
            dereference(area, 10, 10, &c).unwrap(),
            LiteralValue::Error(_)
        ));
    }

    #[test]
    fn dereference_is_idempotent_on_scalars() {
        let wb = TestWorkbook::new();
        let c = ctx(&wb);
        let v = LiteralValue::Text("hi".into());
        let once = dereference(v.clone(), 0, 0, &c).unwrap();
        let twice = dereference(once.clone(), 0, 0, &c).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn materialize_turns_an_area_into_a_row_major_array() {
        let mut wb = TestWorkbook::new();
        wb.set_value(0, 0, 0, LiteralValue::Number(1.0));
        wb.set_value(0, 0, 1, LiteralValue::Number(2.0));
        wb.set_value(0, 1, 0, LiteralValue::Number(3.0));
        wb.set_value(0, 1, 1, LiteralValue::Number(4.0));
        let c = ctx(&wb);
        let area = LiteralValue::Area {
            sheet: None,
            first_row: 0,
            first_col: 0,
            last_row: 1,
            last_col: 1,
        };
        let materialized = materialize(area, &c).unwrap();
        assert_eq!(
            materialized,
            LiteralValue::Array(vec![
                vec![LiteralValue::Number(1.0), LiteralValue::Number(2.0)],
                vec![LiteralValue::Number(3.0), LiteralValue::Number(4.0)],
            ])
        );
    }

    #[test]
    fn materialize_does_not_coerce_blank_to_zero() {
        let mut wb = TestWorkbook::new();
        wb.set_value(0, 0, 0, LiteralValue::Empty);
        let c = ctx(&wb);
        let v = LiteralValue::SingleRef { sheet: None, row: 0, col: 0 };
        assert_eq!(materialize(v, &c).unwrap(), LiteralValue::Empty);
    }

    #[test]
    fn materialize_passes_scalars_through_unchanged() {
        let wb = TestWorkbook::new();
        let c = ctx(&wb);
        assert_eq!(
            materialize(LiteralValue::Number(5.0), &c).unwrap(),
            LiteralValue::Number(5.0)
        );
    }
}
