//! The formula interpreter: a stack machine over the postfix `Token`
//! stream produced by the (external) parser/compiler.
//!
//! Unlike a tree-walking interpreter that recurses over an `ASTNode`, this
//! one is a flat loop over a token slice with an explicit value stack and
//! an explicit instruction pointer — control flow (`IF`, `CHOOSE`) is
//! encoded as byte-distance jumps rather than recursive calls. The
//! coercion and comparison rules below carry over near verbatim from a
//! tree-walking evaluator; only the driving loop and the
//! reference/control-flow handling are new.

use std::sync::Arc;

use formualizer_common::{AttrToken, BinaryOp, ExcelError, ExcelErrorKind, FuncRef, LiteralValue, OperatorToken, Token, TokenCategory, UnaryOp};

use crate::context::EvalContext;
use crate::fault::EngineFault;
use crate::function::Function;
use crate::operand;

pub struct Interpreter<'a> {
    ctx: &'a dyn EvalContext,
}

impl<'a> Interpreter<'a> {
    pub fn new(ctx: &'a dyn EvalContext) -> Self {
        Self { ctx }
    }

    /// Run `tokens` to completion and return the resulting value, applying
    /// operand dereferencing at the boundary when `ctx.single_value()` is set.
    pub fn run(&mut self, tokens: &[Token]) -> Result<LiteralValue, EngineFault> {
        let mut stack: Vec<LiteralValue> = Vec::new();
        let mut i = 0usize;

        while i < tokens.len() {
            let tok = &tokens[i];
            match tok.category() {
                TokenCategory::Literal => {
                    let Token::Literal(v) = tok else { unreachable!() };
                    stack.push(v.clone());
                    i += 1;
                }
                TokenCategory::MissingArg => {
                    stack.push(LiteralValue::MissingArg);
                    i += 1;
                }
                TokenCategory::Reference => {
                    stack.push(self.eval_reference(tok)?);
                    i += 1;
                }
                TokenCategory::ArrayLiteral => {
                    let Token::ArrayLiteral { rows, cols, elements } = tok else { unreachable!() };
                    stack.push(self.build_array_literal(*rows, *cols, elements));
                    i += 1;
                }
                TokenCategory::Name => {
                    stack.push(self.eval_name(tok)?);
                    i += 1;
                }
                TokenCategory::Operator => {
                    let Token::Operator(op) = tok else { unreachable!() };
                    let v = self.eval_operator(op, &mut stack)?;
                    stack.push(v);
                    i += 1;
                }
                TokenCategory::Union => {
                    let b = pop(&mut stack)?;
                    let a = pop(&mut stack)?;
                    stack.push(LiteralValue::RefList(vec![a, b]));
                    i += 1;
                }
                TokenCategory::NoOp => {
                    i += 1;
                }
                TokenCategory::Attr => {
                    i = self.eval_attr(tokens, i, tok, &mut stack)?;
                }
                TokenCategory::Exp => {
                    return Err(EngineFault::Unsupported);
                }
                TokenCategory::Unknown => {
                    return Err(EngineFault::MalformedFormula("unknown token".into()));
                }
            }
        }

        if stack.len() != 1 {
            return Err(EngineFault::MalformedFormula(format!(
                "expected exactly one value on the stack at end of input, found {}",
                stack.len()
            )));
        }
        let result = stack.pop().unwrap();
        if self.ctx.single_value() {
            operand::dereference(result, self.ctx.home_row(), self.ctx.home_col(), self.ctx)
                .map_err(EngineFault::InBand)
        } else {
            operand::materialize(result, self.ctx).map_err(EngineFault::InBand)
        }
    }

    /* ===================  references / names  =================== */

    fn eval_reference(&self, tok: &Token) -> Result<LiteralValue, EngineFault> {
        match *tok {
            Token::Ref { sheet, row, col, .. } => {
                self.ctx
                    .resolve_cell(sheet, row, col)
                    .map(|_| LiteralValue::SingleRef { sheet, row, col })
                    .or_else(|e| Ok(LiteralValue::Error(e)))
            }
            Token::Ref3D { workbook, sheet, row, col, .. } => {
                match self.ctx.resolve_ref3d(workbook, sheet, row, col) {
                    Ok(_) => Ok(LiteralValue::SingleRef { sheet: Some(sheet), row, col }),
                    Err(fault) => fault.into_value_or_abort().map_err(Into::into),
                }
            }
            Token::Area {
                sheet,
                first_row,
                first_col,
                last_row,
                last_col,
            } => self
                .ctx
                .resolve_area(sheet, first_row, first_col, last_row, last_col)
                .map(|_| LiteralValue::Area {
                    sheet,
                    first_row,
                    first_col,
                    last_row,
                    last_col,
                })
                .or_else(|e| Ok(LiteralValue::Error(e))),
            Token::Area3D {
                workbook,
                sheet,
                first_row,
                first_col,
                last_row,
                last_col,
            } => {
                if workbook.is_some_and(|w| w != self.ctx.workbook_ix()) {
                    return Ok(LiteralValue::Error(ExcelError::new(ExcelErrorKind::Ref)));
                }
                Ok(LiteralValue::Area {
                    sheet: Some(sheet),
                    first_row,
                    first_col,
                    last_row,
                    last_col,
                })
            }
            Token::DeletedRef => Ok(LiteralValue::Error(ExcelError::new(ExcelErrorKind::Ref))),
            _ => unreachable!("eval_reference called on a non-reference token"),
        }
    }

    fn build_array_literal(&self, rows: u32, cols: u32, elements: &[LiteralValue]) -> LiteralValue {
        let cols = cols as usize;
        let mut out = Vec::with_capacity(rows as usize);
        for chunk in elements.chunks(cols.max(1)) {
            out.push(chunk.to_vec());
        }
        LiteralValue::Array(out)
    }

    fn eval_name(&self, tok: &Token) -> Result<LiteralValue, EngineFault> {
        let index = match *tok {
            Token::Name { index } => index,
            Token::NameX { name_index, .. } => name_index,
            Token::NameXPxg { .. } => {
                // Workbook-qualified external names are routed through the
                // host exactly like an in-workbook name once resolved; this
                // engine has no external-name table of its own, so absent a
                // host-side index it is simply unresolved.
                return Ok(LiteralValue::Error(ExcelError::new(ExcelErrorKind::Name)));
            }
            _ => unreachable!("eval_name called on a non-name token"),
        };
        self.ctx
            .resolve_name(index)
            .or_else(|e| Ok(LiteralValue::Error(e)))
    }

    /* ===================  operators  =================== */

    fn eval_operator(
        &self,
        op: &OperatorToken,
        stack: &mut Vec<LiteralValue>,
    ) -> Result<LiteralValue, EngineFault> {
        match op {
            OperatorToken::Unary(u) => {
                let v = pop(stack)?;
                let v = self.scalar(v)?;
                Ok(self.eval_unary(*u, v))
            }
            OperatorToken::Binary(b) => {
                let right = pop(stack)?;
                let left = pop(stack)?;
                if matches!(b, BinaryOp::Range) {
                    return self.join_range(left, right);
                }
                let left = self.scalar(left)?;
                let right = self.scalar(right)?;
                Ok(self.eval_binary(*b, left, right))
            }
            OperatorToken::FuncFixed { func, arity } | OperatorToken::FuncVar { func, arity } => {
                self.call_function(func, *arity, stack)
            }
        }
    }

    /// Dereference an operand pulled off the stack for an arithmetic or
    /// comparison operator. Arithmetic is never applied to an undereferenced
    /// reference/area, unlike a function argument.
    fn scalar(&self, v: LiteralValue) -> Result<LiteralValue, EngineFault> {
        operand::dereference(v, self.ctx.home_row(), self.ctx.home_col(), self.ctx)
            .map_err(EngineFault::InBand)
    }

    fn call_function(
        &self,
        func: &FuncRef,
        arity: u8,
        stack: &mut Vec<LiteralValue>,
    ) -> Result<LiteralValue, EngineFault> {
        let arity = arity as usize;
        if stack.len() < arity {
            return Err(EngineFault::MalformedFormula(format!(
                "function call of arity {arity} underflows a stack of {}",
                stack.len()
            )));
        }
        let args: Vec<LiteralValue> = stack.split_off(stack.len() - arity);

        let resolved: Option<Arc<dyn Function>> = match func {
            FuncRef::ByIndex(ix) => self.ctx.get_function_by_index(*ix),
            FuncRef::ByName(name) => self.ctx.get_function_by_name(name),
        };

        let Some(f) = resolved else {
            return Err(EngineFault::NotImplemented {
                cell: self.ctx.current_cell(),
            });
        };
        if f.volatile() {
            self.ctx.note_volatile();
        }
        match f.eval(&args, self.ctx) {
            Ok(v) => Ok(v),
            Err(e) => Ok(LiteralValue::Error(e)),
        }
    }

    /// Runtime range join (`A1:OFFSET(...)`): union the bounding box of two
    /// reference/area operands on a shared sheet. Bare cell-to-cell ranges
    /// are folded into a single `Area` token at compile time and never reach
    /// this path; this exists for ranges whose endpoint is computed.
    fn join_range(&self, left: LiteralValue, right: LiteralValue) -> Result<LiteralValue, EngineFault> {
        let Some((l_sheet, l_r0, l_c0, l_r1, l_c1)) = ref_span(&left) else {
            return Ok(LiteralValue::Error(ExcelError::new(ExcelErrorKind::Value)));
        };
        let Some((r_sheet, r_r0, r_c0, r_r1, r_c1)) = ref_span(&right) else {
            return Ok(LiteralValue::Error(ExcelError::new(ExcelErrorKind::Value)));
        };
        if l_sheet != r_sheet {
            return Ok(LiteralValue::Error(ExcelError::new(ExcelErrorKind::Ref)));
        }
        Ok(LiteralValue::Area {
            sheet: l_sheet,
            first_row: l_r0.min(r_r0),
            first_col: l_c0.min(r_c0),
            last_row: l_r1.max(r_r1),
            last_col: l_c1.max(r_c1),
        })
    }

    /* ===================  control flow (Attr)  =================== */

    fn eval_attr(
        &self,
        tokens: &[Token],
        i: usize,
        tok: &Token,
        stack: &mut Vec<LiteralValue>,
    ) -> Result<usize, EngineFault> {
        let Token::Attr(attr) = tok else { unreachable!() };
        match attr {
            AttrToken::SumShorthand => {
                let v = pop(stack)?;
                let sum = self.ctx.get_function_by_name("SUM").ok_or(EngineFault::NotImplemented {
                    cell: self.ctx.current_cell(),
                })?;
                let result = sum.eval(&[v], self.ctx).unwrap_or_else(LiteralValue::Error);
                stack.push(result);
                Ok(i + 1)
            }
            AttrToken::If {
                has_false_branch,
                false_dist,
                error_skip_dist,
            } => {
                let predicate = pop(stack)?;
                let predicate = self.scalar(predicate)?;
                if let LiteralValue::Error(_) = predicate {
                    stack.push(predicate);
                    return advance_by_distance(tokens, i, *error_skip_dist);
                }
                if predicate.is_truthy() {
                    Ok(i + 1)
                } else {
                    let landed = advance_by_distance(tokens, i, *false_dist)?;
                    if !has_false_branch {
                        // Two-argument `IF(cond, true)`: there is no false
                        // branch to fall into, only the trailing `IF`
                        // `FuncVar` marker token. Re-push the predicate and
                        // a synthetic `false` so that marker's ordinary
                        // 2-argument dispatch produces the right answer
                        // (see the documented open question this preserves).
                        stack.push(predicate);
                        stack.push(LiteralValue::Boolean(false));
                    }
                    Ok(landed)
                }
            }
            AttrToken::Choose {
                jump_table,
                choose_func_offset,
            } => {
                let selector = pop(stack)?;
                let selector = self.scalar(selector)?;
                if let LiteralValue::Error(_) = selector {
                    stack.push(selector);
                    return advance_by_distance(tokens, i, *choose_func_offset);
                }
                let n = match selector {
                    LiteralValue::Int(v) => v,
                    LiteralValue::Number(v) => v as i64,
                    LiteralValue::Boolean(b) => b as i64,
                    _ => -1,
                };
                if n >= 1 && (n as usize) <= jump_table.len() {
                    let dist = jump_table[(n - 1) as usize];
                    advance_by_distance(tokens, i, dist)
                } else {
                    stack.push(LiteralValue::Error(ExcelError::new(ExcelErrorKind::Value)));
                    advance_by_distance(tokens, i, *choose_func_offset)
                }
            }
            AttrToken::Skip { distance } => {
                let landed = advance_by_distance(tokens, i, *distance)?;
                if matches!(stack.last(), Some(LiteralValue::MissingArg)) {
                    *stack.last_mut().unwrap() = LiteralValue::Empty;
                }
                Ok(landed)
            }
        }
    }

    /* ===================  coercion  =================== */

    fn eval_unary(&self, op: UnaryOp, v: LiteralValue) -> LiteralValue {
        self.apply_number_unary(v, |n| match op {
            UnaryOp::Plus => n,
            UnaryOp::Neg => -n,
            UnaryOp::Percent => n / 100.0,
        })
    }

    fn apply_number_unary<F: Fn(f64) -> f64>(&self, v: LiteralValue, f: F) -> LiteralValue {
        match v {
            LiteralValue::Array(arr) => self.map_array(arr, |cell| self.apply_number_unary(cell, &f)),
            other => match self.coerce_number(&other) {
                Ok(n) => LiteralValue::Number(f(n)),
                Err(e) => LiteralValue::Error(e),
            },
        }
    }

    fn eval_binary(&self, op: BinaryOp, left: LiteralValue, right: LiteralValue) -> LiteralValue {
        match op {
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                self.compare(op, left, right)
            }
            BinaryOp::Add => self.numeric_binary(left, right, |a, b| a + b),
            BinaryOp::Sub => self.numeric_binary(left, right, |a, b| a - b),
            BinaryOp::Mul => self.numeric_binary(left, right, |a, b| a * b),
            BinaryOp::Div => self.divide(left, right),
            BinaryOp::Power => self.power(left, right),
            BinaryOp::Concat => match (&left, &right) {
                (LiteralValue::Array(_), _) | (_, LiteralValue::Array(_)) => {
                    self.array_concat(left, right)
                }
                _ => LiteralValue::Text(format!(
                    "{}{}",
                    self.coerce_text(&left),
                    self.coerce_text(&right)
                )),
            },
            BinaryOp::Range => unreachable!("Range is handled before dereferencing"),
        }
    }

    fn array_concat(&self, left: LiteralValue, right: LiteralValue) -> LiteralValue {
        use LiteralValue::Array;
        match (left, right) {
            (Array(l), Array(r)) => self.combine_arrays(l, r, |a, b| self.eval_binary(BinaryOp::Concat, a, b)),
            (Array(arr), v) => self.map_array(arr, |x| self.eval_binary(BinaryOp::Concat, x, v.clone())),
            (v, Array(arr)) => self.map_array(arr, |x| self.eval_binary(BinaryOp::Concat, v.clone(), x)),
            (l, r) => self.eval_binary(BinaryOp::Concat, l, r),
        }
    }

    fn numeric_binary<F>(&self, left: LiteralValue, right: LiteralValue, f: F) -> LiteralValue
    where
        F: Fn(f64, f64) -> f64 + Copy,
    {
        use LiteralValue::*;
        match (left, right) {
            (Array(l), Array(r)) => self.combine_arrays(l, r, |a, b| self.numeric_binary(a, b, f)),
            (Array(arr), v) => self.map_array(arr, |x| self.numeric_binary(x, v.clone(), f)),
            (v, Array(arr)) => self.map_array(arr, |x| self.numeric_binary(v.clone(), x, f)),
            (l, r) => match (self.coerce_number(&l), self.coerce_number(&r)) {
                (Ok(a), Ok(b)) => Number(f(a, b)),
                (Err(e), _) | (_, Err(e)) => LiteralValue::Error(e),
            },
        }
    }

    fn divide(&self, left: LiteralValue, right: LiteralValue) -> LiteralValue {
        use LiteralValue::*;
        match (left, right) {
            (Array(l), Array(r)) => self.combine_arrays(l, r, |a, b| self.divide(a, b)),
            (Array(arr), v) => self.map_array(arr, |x| self.divide(x, v.clone())),
            (v, Array(arr)) => self.map_array(arr, |x| self.divide(v.clone(), x)),
            (l, r) => {
                let denom = self.coerce_number(&r);
                if matches!(denom, Ok(n) if n == 0.0) {
                    return LiteralValue::Error(ExcelError::new(ExcelErrorKind::Div));
                }
                match (self.coerce_number(&l), denom) {
                    (Ok(a), Ok(b)) => Number(a / b),
                    (Err(e), _) | (_, Err(e)) => LiteralValue::Error(e),
                }
            }
        }
    }

    fn power(&self, left: LiteralValue, right: LiteralValue) -> LiteralValue {
        use LiteralValue::*;
        match (left, right) {
            (Array(l), Array(r)) => self.combine_arrays(l, r, |a, b| self.power(a, b)),
            (Array(arr), v) => self.map_array(arr, |x| self.power(x, v.clone())),
            (v, Array(arr)) => self.map_array(arr, |x| self.power(v.clone(), x)),
            (l, r) => match (self.coerce_number(&l), self.coerce_number(&r)) {
                (Ok(a), Ok(b)) => {
                    if a < 0.0 && b.fract() != 0.0 {
                        LiteralValue::Error(ExcelError::new(ExcelErrorKind::Num))
                    } else {
                        let n = a.powf(b);
                        if n.is_nan() || n.is_infinite() {
                            LiteralValue::Error(ExcelError::new(ExcelErrorKind::Num))
                        } else {
                            Number(n)
                        }
                    }
                }
                (Err(e), _) | (_, Err(e)) => LiteralValue::Error(e),
            },
        }
    }

    fn map_array<F>(&self, arr: Vec<Vec<LiteralValue>>, f: F) -> LiteralValue
    where
        F: Fn(LiteralValue) -> LiteralValue + Copy,
    {
        let out = arr.into_iter().map(|row| row.into_iter().map(f).collect()).collect();
        LiteralValue::Array(out)
    }

    fn combine_arrays<F>(&self, l: Vec<Vec<LiteralValue>>, r: Vec<Vec<LiteralValue>>, f: F) -> LiteralValue
    where
        F: Fn(LiteralValue, LiteralValue) -> LiteralValue + Copy,
    {
        let rows = l.len().max(r.len());
        let cols = l
            .iter()
            .map(|row| row.len())
            .max()
            .unwrap_or(0)
            .max(r.iter().map(|row| row.len()).max().unwrap_or(0));
        let mut out = Vec::with_capacity(rows);
        for i in 0..rows {
            let mut row = Vec::with_capacity(cols);
            for j in 0..cols {
                let lv = l.get(i).and_then(|r| r.get(j)).cloned().unwrap_or(LiteralValue::Empty);
                let rv = r.get(i).and_then(|r| r.get(j)).cloned().unwrap_or(LiteralValue::Empty);
                row.push(f(lv, rv));
            }
            out.push(row);
        }
        LiteralValue::Array(out)
    }

    fn coerce_number(&self, v: &LiteralValue) -> Result<f64, ExcelError> {
        use LiteralValue::*;
        match v {
            Number(n) => Ok(*n),
            Int(i) => Ok(*i as f64),
            Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| ExcelError::new(ExcelErrorKind::Value).with_message(format!("cannot convert '{s}' to a number"))),
            Empty | MissingArg => Ok(0.0),
            _ if v.as_serial_number().is_some() => Ok(v.as_serial_number().unwrap()),
            Error(e) => Err(e.clone()),
            _ => Err(ExcelError::new(ExcelErrorKind::Value)),
        }
    }

    fn coerce_text(&self, v: &LiteralValue) -> String {
        use LiteralValue::*;
        match v {
            Text(s) => s.clone(),
            Number(n) => n.to_string(),
            Int(i) => i.to_string(),
            Boolean(b) => if *b { "TRUE" } else { "FALSE" }.into(),
            Error(e) => e.to_string(),
            Empty | MissingArg => "".into(),
            _ => v.to_string(),
        }
    }

    fn compare(&self, op: BinaryOp, left: LiteralValue, right: LiteralValue) -> LiteralValue {
        use LiteralValue::*;
        if matches!(left, Error(_)) {
            return left;
        }
        if matches!(right, Error(_)) {
            return right;
        }
        match (left, right) {
            (Array(l), Array(r)) => self.combine_arrays(l, r, |a, b| self.compare(op, a, b)),
            (Array(arr), v) => self.map_array(arr, |x| self.compare(op, x, v.clone())),
            (v, Array(arr)) => self.map_array(arr, |x| self.compare(op, v.clone(), x)),
            (l, r) => {
                let res = match (&l, &r) {
                    (Number(a), Number(b)) => self.cmp_f64(*a, *b, op),
                    (Int(a), Number(b)) => self.cmp_f64(*a as f64, *b, op),
                    (Number(a), Int(b)) => self.cmp_f64(*a, *b as f64, op),
                    (Boolean(a), Boolean(b)) => {
                        self.cmp_f64(if *a { 1.0 } else { 0.0 }, if *b { 1.0 } else { 0.0 }, op)
                    }
                    (Text(a), Text(b)) => self.cmp_text(a, b, op),
                    _ => {
                        let an = self.coerce_number(&l).ok();
                        let bn = self.coerce_number(&r).ok();
                        if let (Some(a), Some(b)) = (an, bn) {
                            self.cmp_f64(a, b, op)
                        } else {
                            self.cmp_text(&self.coerce_text(&l), &self.coerce_text(&r), op)
                        }
                    }
                };
                Boolean(res)
            }
        }
    }

    fn cmp_f64(&self, a: f64, b: f64, op: BinaryOp) -> bool {
        match op {
            BinaryOp::Eq => a == b,
            BinaryOp::Ne => a != b,
            BinaryOp::Gt => a > b,
            BinaryOp::Lt => a < b,
            BinaryOp::Ge => a >= b,
            BinaryOp::Le => a <= b,
            _ => unreachable!(),
        }
    }

    fn cmp_text(&self, a: &str, b: &str, op: BinaryOp) -> bool {
        let (a, b) = (a.to_ascii_lowercase(), b.to_ascii_lowercase());
        self.cmp_f64(a.cmp(&b) as i32 as f64, 0.0, op)
    }
}

fn pop(stack: &mut Vec<LiteralValue>) -> Result<LiteralValue, EngineFault> {
    stack
        .pop()
        .ok_or_else(|| EngineFault::MalformedFormula("operand stack underflow".into()))
}

fn ref_span(v: &LiteralValue) -> Option<(Option<u32>, u32, u32, u32, u32)> {
    match v {
        LiteralValue::SingleRef { sheet, row, col } => Some((*sheet, *row, *col, *row, *col)),
        LiteralValue::Area {
            sheet,
            first_row,
            first_col,
            last_row,
            last_col,
        } => Some((*sheet, *first_row, *first_col, *last_row, *last_col)),
        _ => None,
    }
}

/// Walk forward from `i + 1`, summing each token's `size()` until the
/// running total equals `distance` exactly, and return the index of the
/// token the distance lands on. Over- or under-shoot means a malformed
/// token stream.
fn advance_by_distance(tokens: &[Token], i: usize, distance: u32) -> Result<usize, EngineFault> {
    let mut consumed = 0u32;
    let mut j = i + 1;
    while consumed < distance {
        let Some(tok) = tokens.get(j) else {
            return Err(EngineFault::MalformedFormula(format!(
                "control-flow distance {distance} runs past the end of the token stream"
            )));
        };
        consumed += tok.size();
        j += 1;
    }
    if consumed != distance {
        return Err(EngineFault::MalformedFormula(format!(
            "control-flow distance {distance} does not land on a token boundary"
        )));
    }
    Ok(j)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HostContext;
    use crate::function_registry::GlobalRegistry;
    use crate::test_utils::TestWorkbook;
    use formualizer_parse::compile::compile;
    use formualizer_parse::parser::parse;

    fn run_formula(wb: &TestWorkbook, sheet: u32, formula: &str) -> LiteralValue {
        let home = None::<String>;
        let ast = parse(formula).unwrap();
        let tokens = compile(&ast, home.as_deref(), wb).unwrap();
        let ctx = HostContext::new(wb, &GlobalRegistry, sheet);
        Interpreter::new(&ctx).run(&tokens).unwrap()
    }

    #[test]
    fn simple_arithmetic() {
        let mut wb = TestWorkbook::new();
        wb.set_value(0, 0, 0, LiteralValue::Number(2.0));
        wb.set_value(0, 0, 1, LiteralValue::Number(3.0));
        assert_eq!(run_formula(&wb, 0, "=A1+A2*2"), LiteralValue::Number(8.0));
    }

    #[test]
    fn division_by_zero_is_in_band() {
        let wb = TestWorkbook::new();
        assert_eq!(
            run_formula(&wb, 0, "=1/0"),
            LiteralValue::Error(ExcelError::new(ExcelErrorKind::Div))
        );
    }

    #[test]
    fn string_concat() {
        let wb = TestWorkbook::new();
        assert_eq!(
            run_formula(&wb, 0, r#"="foo"&"bar""#),
            LiteralValue::Text("foobar".into())
        );
    }

    #[test]
    fn comparison_is_case_insensitive_text() {
        let wb = TestWorkbook::new();
        assert_eq!(run_formula(&wb, 0, r#"="ABC"="abc""#), LiteralValue::Boolean(true));
    }

    #[test]
    fn if_three_arg_takes_true_branch() {
        let wb = TestWorkbook::new();
        assert_eq!(run_formula(&wb, 0, "=IF(TRUE,1,2)"), LiteralValue::Number(1.0));
        assert_eq!(run_formula(&wb, 0, "=IF(FALSE,1,2)"), LiteralValue::Number(2.0));
    }

    #[test]
    fn if_two_arg_trailing_false_is_synthesized() {
        let wb = TestWorkbook::new();
        // No false branch at all: a false predicate must fall through the
        // synthesized `Bool(false)` marker rather than leaving the stack
        // short, reproducing Excel's `IF(cond, true)` => FALSE behavior.
        assert_eq!(run_formula(&wb, 0, "=IF(1=2,99)"), LiteralValue::Boolean(false));
    }

    #[test]
    fn choose_selects_branch_by_index() {
        let wb = TestWorkbook::new();
        assert_eq!(run_formula(&wb, 0, "=CHOOSE(2,10,20,30)"), LiteralValue::Number(20.0));
    }

    #[test]
    fn choose_out_of_range_is_value_error() {
        let wb = TestWorkbook::new();
        assert_eq!(
            run_formula(&wb, 0, "=CHOOSE(5,10,20,30)"),
            LiteralValue::Error(ExcelError::new(ExcelErrorKind::Value))
        );
    }

    #[test]
    fn blank_cell_dereferences_to_zero_in_arithmetic() {
        let wb = TestWorkbook::new();
        assert_eq!(run_formula(&wb, 0, "=A1+1"), LiteralValue::Number(1.0));
    }
}
