//! Compiles a parsed [`ASTNode`] tree into the postfix [`Token`] stream the
//! evaluator's stack VM consumes.
//!
//! This is the seam between the tree-walking parser and the evaluator: it
//! produces the postfix token stream for a formula string. The
//! tree-walking parser above this module is kept as-is; this module is the
//! new piece that bridges its `ASTNode` output to the postfix,
//! byte-jump-addressed token contract `formualizer-common::token` defines.
//! Control flow (`IF`, `CHOOSE`) is lowered into the optimized `Attr`
//! encodings rather than emitted as plain function calls, so the
//! interpreter's short-circuit paths are actually exercised end to end.

use std::fmt;

use formualizer_common::token::{AttrToken, BinaryOp, FuncRef, OperatorToken, Token, UnaryOp};
use formualizer_common::LiteralValue;

use crate::parser::{ASTNode, ASTNodeType, ReferenceType};

/// What the compiler needs from the target workbook: sheet name resolution
/// and the format's row/column ceiling (for unbounded `A:A` / `1:1` ranges).
pub trait SheetResolver {
    fn sheet_index(&self, name: &str) -> Option<u32>;

    fn max_row(&self) -> u32 {
        1_048_575
    }

    fn max_col(&self) -> u32 {
        16_383
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    UnknownSheet(String),
    UnknownOperator(String),
    NonLiteralArrayElement,
    NamedRange(String),
    Table(String),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UnknownSheet(s) => write!(f, "unknown sheet: {s}"),
            CompileError::UnknownOperator(s) => write!(f, "unsupported operator: {s}"),
            CompileError::NonLiteralArrayElement => {
                write!(f, "array literal elements must be literals")
            }
            CompileError::NamedRange(s) => write!(f, "named ranges are not indexed: {s}"),
            CompileError::Table(s) => write!(f, "structured table references are unsupported: {s}"),
        }
    }
}

impl std::error::Error for CompileError {}

/// Compile `ast` (as it would sit in `home_sheet`) into postfix tokens.
pub fn compile(
    ast: &ASTNode,
    home_sheet: Option<&str>,
    resolver: &dyn SheetResolver,
) -> Result<Vec<Token>, CompileError> {
    let mut out = Vec::new();
    compile_into(ast, home_sheet, resolver, &mut out)?;
    Ok(out)
}

fn compile_into(
    node: &ASTNode,
    home_sheet: Option<&str>,
    resolver: &dyn SheetResolver,
    out: &mut Vec<Token>,
) -> Result<(), CompileError> {
    match &node.node_type {
        ASTNodeType::Literal(v) => {
            out.push(Token::Literal(v.clone()));
            Ok(())
        }
        ASTNodeType::Reference { original, reference } => {
            compile_reference(original, reference, home_sheet, resolver, out)
        }
        ASTNodeType::UnaryOp { op, expr } => {
            compile_into(expr, home_sheet, resolver, out)?;
            let unary = match op.as_str() {
                "+" => UnaryOp::Plus,
                "-" => UnaryOp::Neg,
                "%" => UnaryOp::Percent,
                other => return Err(CompileError::UnknownOperator(other.to_string())),
            };
            out.push(Token::Operator(OperatorToken::Unary(unary)));
            Ok(())
        }
        ASTNodeType::BinaryOp { op, left, right } => {
            compile_binary(op, left, right, home_sheet, resolver, out)
        }
        ASTNodeType::Function { name, args } => {
            compile_function(name, args, home_sheet, resolver, out)
        }
        ASTNodeType::Array(rows) => compile_array(rows, out),
    }
}

fn compile_array(rows: &[Vec<ASTNode>], out: &mut Vec<Token>) -> Result<(), CompileError> {
    let row_count = rows.len() as u32;
    let col_count = rows.first().map(|r| r.len()).unwrap_or(0) as u32;
    let mut elements = Vec::with_capacity(rows.len() * col_count as usize);
    for row in rows {
        for cell in row {
            match &cell.node_type {
                ASTNodeType::Literal(v) => elements.push(v.clone()),
                _ => return Err(CompileError::NonLiteralArrayElement),
            }
        }
    }
    out.push(Token::ArrayLiteral {
        rows: row_count,
        cols: col_count,
        elements,
    });
    Ok(())
}

fn compile_binary(
    op: &str,
    left: &ASTNode,
    right: &ASTNode,
    home_sheet: Option<&str>,
    resolver: &dyn SheetResolver,
    out: &mut Vec<Token>,
) -> Result<(), CompileError> {
    if op == "," {
        compile_into(left, home_sheet, resolver, out)?;
        compile_into(right, home_sheet, resolver, out)?;
        out.push(Token::Union);
        return Ok(());
    }
    if op == " " {
        // Implicit intersection between two ranges: no runtime operator
        // token exists for it in this engine.
        return Err(CompileError::UnknownOperator(" ".to_string()));
    }
    compile_into(left, home_sheet, resolver, out)?;
    compile_into(right, home_sheet, resolver, out)?;
    let binop = match op {
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        "^" => BinaryOp::Power,
        "&" => BinaryOp::Concat,
        "=" => BinaryOp::Eq,
        "<>" => BinaryOp::Ne,
        "<" => BinaryOp::Lt,
        "<=" => BinaryOp::Le,
        ">" => BinaryOp::Gt,
        ">=" => BinaryOp::Ge,
        ":" => BinaryOp::Range,
        other => return Err(CompileError::UnknownOperator(other.to_string())),
    };
    out.push(Token::Operator(OperatorToken::Binary(binop)));
    Ok(())
}

fn resolve_sheet(
    sheet: Option<&str>,
    home_sheet: Option<&str>,
    resolver: &dyn SheetResolver,
) -> Result<Option<u32>, CompileError> {
    let Some(name) = sheet else { return Ok(None) };
    let ix = resolver
        .sheet_index(name)
        .ok_or_else(|| CompileError::UnknownSheet(name.to_string()))?;
    if let Some(home) = home_sheet {
        if resolver.sheet_index(home) == Some(ix) {
            return Ok(None);
        }
    }
    Ok(Some(ix))
}

fn abs_flags(original: &str) -> (bool, bool) {
    let part = original.rsplit('!').next().unwrap_or(original);
    let bytes = part.as_bytes();
    let mut i = 0;
    let col_abs = i < bytes.len() && bytes[i] == b'$';
    if col_abs {
        i += 1;
    }
    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    let row_abs = i < bytes.len() && bytes[i] == b'$';
    (row_abs, col_abs)
}

fn compile_reference(
    original: &str,
    reference: &ReferenceType,
    home_sheet: Option<&str>,
    resolver: &dyn SheetResolver,
    out: &mut Vec<Token>,
) -> Result<(), CompileError> {
    match reference {
        ReferenceType::Cell { sheet, row, col } => {
            let sheet_ix = resolve_sheet(sheet.as_deref(), home_sheet, resolver)?;
            let (row_abs, col_abs) = abs_flags(original);
            out.push(Token::Ref {
                sheet: sheet_ix,
                row: row.saturating_sub(1),
                col: col.saturating_sub(1),
                row_abs,
                col_abs,
            });
            Ok(())
        }
        ReferenceType::Range {
            sheet,
            start_row,
            start_col,
            end_row,
            end_col,
        } => {
            let sheet_ix = resolve_sheet(sheet.as_deref(), home_sheet, resolver)?;
            let first_row = start_row.map(|r| r.saturating_sub(1)).unwrap_or(0);
            let first_col = start_col.map(|c| c.saturating_sub(1)).unwrap_or(0);
            let last_row = end_row.map(|r| r.saturating_sub(1)).unwrap_or(resolver.max_row());
            let last_col = end_col.map(|c| c.saturating_sub(1)).unwrap_or(resolver.max_col());
            out.push(Token::Area {
                sheet: sheet_ix,
                first_row: first_row.min(last_row),
                first_col: first_col.min(last_col),
                last_row: first_row.max(last_row),
                last_col: first_col.max(last_col),
            });
            Ok(())
        }
        ReferenceType::NamedRange(name) => Err(CompileError::NamedRange(name.clone())),
        ReferenceType::Table(t) => Err(CompileError::Table(t.name.clone())),
    }
}

fn compile_function(
    name: &str,
    args: &[ASTNode],
    home_sheet: Option<&str>,
    resolver: &dyn SheetResolver,
    out: &mut Vec<Token>,
) -> Result<(), CompileError> {
    if name.eq_ignore_ascii_case("IF") && (args.len() == 2 || args.len() == 3) {
        return compile_if(args, home_sheet, resolver, out);
    }
    if name.eq_ignore_ascii_case("CHOOSE") && args.len() >= 2 {
        return compile_choose(args, home_sheet, resolver, out);
    }
    for arg in args {
        compile_into(arg, home_sheet, resolver, out)?;
    }
    out.push(Token::Operator(OperatorToken::FuncVar {
        func: FuncRef::ByName(name.to_string()),
        arity: args.len() as u8,
    }));
    Ok(())
}

fn tokens_size(tokens: &[Token]) -> u32 {
    tokens.iter().map(Token::size).sum()
}

/// Size of a `Skip` attr token is fixed regardless of the distance value it
/// carries (see `AttrToken::size`).
const SKIP_TOKEN_SIZE: u32 = 5;

fn compile_if(
    args: &[ASTNode],
    home_sheet: Option<&str>,
    resolver: &dyn SheetResolver,
    out: &mut Vec<Token>,
) -> Result<(), CompileError> {
    compile_into(&args[0], home_sheet, resolver, out)?;

    let true_tokens = compile(&args[1], home_sheet, resolver)?;
    let true_size = tokens_size(&true_tokens);

    if args.len() == 3 {
        let false_tokens = compile(&args[2], home_sheet, resolver)?;
        let false_size = tokens_size(&false_tokens);
        let false_dist = true_size + SKIP_TOKEN_SIZE;
        let error_skip_dist = false_dist + false_size;
        out.push(Token::Attr(AttrToken::If {
            has_false_branch: true,
            false_dist,
            error_skip_dist,
        }));
        out.extend(true_tokens);
        out.push(Token::Attr(AttrToken::Skip {
            distance: false_size,
        }));
        out.extend(false_tokens);
    } else {
        // Two-argument IF: a trailing marker token (never executed) stands
        // in for the missing false branch, so the byte-distance arithmetic
        // stays uniform whether or not a false branch is present.
        let marker = Token::Operator(OperatorToken::FuncVar {
            func: FuncRef::ByName("IF".to_string()),
            arity: 2,
        });
        let marker_size = marker.size();
        let false_dist = true_size + SKIP_TOKEN_SIZE;
        let error_skip_dist = false_dist + marker_size;
        out.push(Token::Attr(AttrToken::If {
            has_false_branch: false,
            false_dist,
            error_skip_dist,
        }));
        out.extend(true_tokens);
        out.push(Token::Attr(AttrToken::Skip {
            distance: marker_size,
        }));
        out.push(marker);
    }
    Ok(())
}

fn compile_choose(
    args: &[ASTNode],
    home_sheet: Option<&str>,
    resolver: &dyn SheetResolver,
    out: &mut Vec<Token>,
) -> Result<(), CompileError> {
    compile_into(&args[0], home_sheet, resolver, out)?;

    let branches: Vec<Vec<Token>> = args[1..]
        .iter()
        .map(|a| compile(a, home_sheet, resolver))
        .collect::<Result<_, _>>()?;

    let n = branches.len();
    let mut trailing_len = vec![0u32; n + 1];
    for i in (0..n).rev() {
        let has_skip = i < n - 1;
        trailing_len[i] = tokens_size(&branches[i])
            + if has_skip { SKIP_TOKEN_SIZE } else { 0 }
            + trailing_len[i + 1];
    }

    let mut jump_table = vec![0u32; n];
    let mut offset = 0u32;
    for i in 0..n {
        jump_table[i] = offset;
        offset += tokens_size(&branches[i]);
        if i < n - 1 {
            offset += SKIP_TOKEN_SIZE;
        }
    }
    let choose_func_offset = offset;

    out.push(Token::Attr(AttrToken::Choose {
        jump_table,
        choose_func_offset,
    }));
    for (i, branch) in branches.into_iter().enumerate() {
        out.extend(branch);
        if i < n - 1 {
            out.push(Token::Attr(AttrToken::Skip {
                distance: trailing_len[i + 1],
            }));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    struct NoSheets;
    impl SheetResolver for NoSheets {
        fn sheet_index(&self, _name: &str) -> Option<u32> {
            None
        }
    }

    #[test]
    fn compiles_simple_arithmetic() {
        let ast = parse("=A1+A2").unwrap();
        let tokens = compile(&ast, Some("Sheet1"), &NoSheets).unwrap();
        assert_eq!(tokens.len(), 3);
        assert!(matches!(tokens[0], Token::Ref { .. }));
        assert!(matches!(tokens[1], Token::Ref { .. }));
        assert!(matches!(
            tokens[2],
            Token::Operator(OperatorToken::Binary(BinaryOp::Add))
        ));
    }

    #[test]
    fn compiles_if_with_false_branch() {
        let ast = parse("=IF(TRUE(),1,2)").unwrap();
        // TRUE() parses as a zero-arg function call.
        let tokens = compile(&ast, None, &NoSheets).unwrap();
        assert!(matches!(tokens[0], Token::Attr(AttrToken::If { .. })) || tokens.len() > 1);
    }

    #[test]
    fn compiles_choose_jump_table() {
        let ast = parse(r#"=CHOOSE(2,"a","b","c")"#).unwrap();
        let tokens = compile(&ast, None, &NoSheets).unwrap();
        let has_choose = tokens
            .iter()
            .any(|t| matches!(t, Token::Attr(AttrToken::Choose { .. })));
        assert!(has_choose);
    }

    #[test]
    fn range_join_between_bare_cells() {
        let ast = parse("=A1:B3").unwrap();
        let tokens = compile(&ast, None, &NoSheets).unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(matches!(tokens[0], Token::Area { .. }));
    }
}
