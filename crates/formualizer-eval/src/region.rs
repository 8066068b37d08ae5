//! Region-relative reference adjustment: the transform a
//! data-validation list (or any formula parked once and re-applied across a
//! block of cells) needs before it can run at a cell other than the one it
//! was written against.

use formualizer_common::{Token, TokenCategory};

use crate::fault::EngineFault;
use crate::traits::SpreadsheetVersion;

/// Shift every relative `Ref`/`Ref3D`/`Area`/`Area3D` token in `tokens` by
/// `(delta_row, delta_col)`. `Area`/`Area3D` carry no per-corner
/// absolute/relative flag in this token model, so an area is always treated
/// as fully relative. Negative deltas are rejected outright — a target cell
/// is never above or to the left of the region it belongs to. Returns the
/// shifted token stream and whether any token actually moved.
pub fn adjust_region_relative(
    tokens: &[Token],
    delta_row: i64,
    delta_col: i64,
    version: SpreadsheetVersion,
) -> Result<(Vec<Token>, bool), EngineFault> {
    if delta_row < 0 || delta_col < 0 {
        return Err(EngineFault::OutOfBounds);
    }
    if delta_row == 0 && delta_col == 0 {
        return Ok((tokens.to_vec(), false));
    }

    let mut shifted = false;
    let mut out = Vec::with_capacity(tokens.len());
    for tok in tokens {
        if tok.category() != TokenCategory::Reference {
            out.push(tok.clone());
            continue;
        }
        let (new_tok, moved) = shift_reference(tok, delta_row, delta_col, version)?;
        shifted |= moved;
        out.push(new_tok);
    }
    Ok((out, shifted))
}

fn shift_coord(value: u32, delta: i64, max: u32) -> Result<u32, EngineFault> {
    let shifted = value as i64 + delta;
    if shifted < 0 || shifted > max as i64 {
        return Err(EngineFault::OutOfBounds);
    }
    Ok(shifted as u32)
}

fn shift_reference(
    tok: &Token,
    delta_row: i64,
    delta_col: i64,
    version: SpreadsheetVersion,
) -> Result<(Token, bool), EngineFault> {
    match *tok {
        Token::Ref {
            sheet,
            row,
            col,
            row_abs,
            col_abs,
        } => {
            let new_row = if row_abs { row } else { shift_coord(row, delta_row, version.max_rows)? };
            let new_col = if col_abs { col } else { shift_coord(col, delta_col, version.max_cols)? };
            let moved = new_row != row || new_col != col;
            Ok((
                Token::Ref {
                    sheet,
                    row: new_row,
                    col: new_col,
                    row_abs,
                    col_abs,
                },
                moved,
            ))
        }
        Token::Ref3D {
            workbook,
            sheet,
            row,
            col,
            row_abs,
            col_abs,
        } => {
            let new_row = if row_abs { row } else { shift_coord(row, delta_row, version.max_rows)? };
            let new_col = if col_abs { col } else { shift_coord(col, delta_col, version.max_cols)? };
            let moved = new_row != row || new_col != col;
            Ok((
                Token::Ref3D {
                    workbook,
                    sheet,
                    row: new_row,
                    col: new_col,
                    row_abs,
                    col_abs,
                },
                moved,
            ))
        }
        Token::Area {
            sheet,
            first_row,
            first_col,
            last_row,
            last_col,
        } => {
            let new_first_row = shift_coord(first_row, delta_row, version.max_rows)?;
            let new_last_row = shift_coord(last_row, delta_row, version.max_rows)?;
            let new_first_col = shift_coord(first_col, delta_col, version.max_cols)?;
            let new_last_col = shift_coord(last_col, delta_col, version.max_cols)?;
            let moved = new_first_row != first_row || new_first_col != first_col;
            Ok((
                Token::Area {
                    sheet,
                    first_row: new_first_row,
                    first_col: new_first_col,
                    last_row: new_last_row,
                    last_col: new_last_col,
                },
                moved,
            ))
        }
        Token::Area3D {
            workbook,
            sheet,
            first_row,
            first_col,
            last_row,
            last_col,
        } => {
            let new_first_row = shift_coord(first_row, delta_row, version.max_rows)?;
            let new_last_row = shift_coord(last_row, delta_row, version.max_rows)?;
            let new_first_col = shift_coord(first_col, delta_col, version.max_cols)?;
            let new_last_col = shift_coord(last_col, delta_col, version.max_cols)?;
            let moved = new_first_row != first_row || new_first_col != first_col;
            Ok((
                Token::Area3D {
                    workbook,
                    sheet,
                    first_row: new_first_row,
                    first_col: new_first_col,
                    last_row: new_last_row,
                    last_col: new_last_col,
                },
                moved,
            ))
        }
        Token::DeletedRef => Ok((Token::DeletedRef, false)),
        ref other => Ok((other.clone(), false)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formualizer_parse::compile::compile;
    use formualizer_parse::parser::parse;

    fn tokens(formula: &str) -> Vec<Token> {
        use formualizer_parse::compile::SheetResolver;
        struct NoSheets;
        impl SheetResolver for NoSheets {
            fn sheet_index(&self, _name: &str) -> Option<u32> {
                None
            }
        }
        let ast = parse(formula).unwrap();
        compile(&ast, None, &NoSheets).unwrap()
    }

    #[test]
    fn relative_cell_ref_shifts_by_delta() {
        let toks = tokens("=A1");
        let (shifted, moved) = adjust_region_relative(&toks, 4, 1, SpreadsheetVersion::default()).unwrap();
        assert!(moved);
        assert!(matches!(shifted[0], Token::Ref { row: 4, col: 1, .. }));
    }

    #[test]
    fn absolute_cell_ref_is_unaffected() {
        let toks = tokens("=$A$1");
        let (shifted, moved) = adjust_region_relative(&toks, 4, 1, SpreadsheetVersion::default()).unwrap();
        assert!(!moved);
        assert!(matches!(shifted[0], Token::Ref { row: 0, col: 0, .. }));
    }

    #[test]
    fn zero_delta_is_identity_and_reports_no_shift() {
        let toks = tokens("=A1+B2");
        let (shifted, moved) = adjust_region_relative(&toks, 0, 0, SpreadsheetVersion::default()).unwrap();
        assert!(!moved);
        assert_eq!(shifted, toks);
    }

    #[test]
    fn negative_delta_is_rejected() {
        let toks = tokens("=A1");
        assert!(matches!(
            adjust_region_relative(&toks, -1, 0, SpreadsheetVersion::default()),
            Err(EngineFault::OutOfBounds)
        ));
    }

    #[test]
    fn shift_past_the_last_row_is_out_of_bounds() {
        let toks = tokens("=A1");
        let version = SpreadsheetVersion { max_rows: 5, max_cols: 5 };
        assert!(matches!(
            adjust_region_relative(&toks, 10, 0, version),
            Err(EngineFault::OutOfBounds)
        ));
    }

    #[test]
    fn area_shifts_both_corners() {
        let toks = tokens("=A1:B2");
        let (shifted, moved) = adjust_region_relative(&toks, 2, 2, SpreadsheetVersion::default()).unwrap();
        assert!(moved);
        assert!(matches!(
            shifted[0],
            Token::Area {
                first_row: 2,
                first_col: 2,
                last_row: 3,
                last_col: 3,
                ..
            }
        ));
    }
}
