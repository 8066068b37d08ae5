//! Cycle detection: an explicit in-progress stack rather
//! than relying on the Rust call stack, so a cycle spanning collaborating
//! workbooks is caught the same way as one confined to a single sheet.

use rustc_hash::FxHashSet;

use formualizer_common::CellId;

#[derive(Default)]
pub struct EvaluationTracker {
    stack: Vec<CellId>,
    in_progress: FxHashSet<CellId>,
}

impl EvaluationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt to push `cell` onto the in-progress stack. Returns `false`
    /// (and leaves the stack untouched) if `cell` is already being
    /// evaluated — the caller must surface this as `#CIRCULAR`.
    pub fn start_evaluate(&mut self, cell: CellId) -> bool {
        if !self.in_progress.insert(cell) {
            #[cfg(feature = "tracing")]
            tracing::debug!(%cell, depth = self.stack.len(), "circular reference detected");
            return false;
        }
        self.stack.push(cell);
        true
    }

    /// Pop `cell` off the stack once its evaluation has committed (or
    /// aborted with a non-cycle error). Must be called exactly once per
    /// successful `start_evaluate`, including on early-return error
    /// paths, or the tracker leaks a phantom in-progress cell.
    pub fn finish_evaluate(&mut self, cell: CellId) {
        if self.stack.last() == Some(&cell) {
            self.stack.pop();
        } else if let Some(pos) = self.stack.iter().rposition(|c| *c == cell) {
            // Non-LIFO completion can only happen if a prior frame
            // already unwound via a cycle abort; still remove the entry
            // so it doesn't falsely block a later, unrelated evaluation.
            self.stack.remove(pos);
        }
        self.in_progress.remove(&cell);
    }

    pub fn is_in_progress(&self, cell: CellId) -> bool {
        self.in_progress.contains(&cell)
    }

    /// The chain of cells currently being evaluated, outermost first.
    /// Used to report which cells participate in a detected cycle.
    pub fn current_chain(&self) -> &[CellId] {
        &self.stack
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(row: u32) -> CellId {
        CellId::new(0, 0, row, 0)
    }

    #[test]
    fn reentering_the_same_cell_is_rejected() {
        let mut t = EvaluationTracker::new();
        assert!(t.start_evaluate(cell(0)));
        assert!(t.start_evaluate(cell(1)));
        assert!(!t.start_evaluate(cell(0)));
        assert_eq!(t.current_chain(), &[cell(0), cell(1)]);
    }

    #[test]
    fn finishing_clears_in_progress_and_allows_reentry_later() {
        let mut t = EvaluationTracker::new();
        assert!(t.start_evaluate(cell(0)));
        t.finish_evaluate(cell(0));
        assert!(!t.is_in_progress(cell(0)));
        assert!(t.start_evaluate(cell(0)));
    }

    #[test]
    fn unrelated_evaluations_do_not_interfere() {
        let mut t = EvaluationTracker::new();
        assert!(t.start_evaluate(cell(0)));
        assert!(t.start_evaluate(cell(1)));
        t.finish_evaluate(cell(1));
        t.finish_evaluate(cell(0));
        assert_eq!(t.depth(), 0);
    }
}
