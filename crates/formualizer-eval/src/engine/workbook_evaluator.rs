//! The workbook evaluator façade: wires a `WorkbookHost`
//! together with an [`EvaluationCache`] and [`EvaluationTracker`] behind the
//! narrow `EvalContext` surface the interpreter already knows how to drive,
//! so formula cells get memoized and cyclic chains get turned into
//! `#CIRCULAR` instead of a stack overflow.
//!
//! `cache` and `tracker` live behind `Rc<RefCell<_>>`, not a lock: a
//! `TrackingContext` hands a clone of both down into every `child_for` it
//! spawns while resolving one formula, so the same cache is reachable from
//! several live contexts during one synchronous call tree. `Rc<RefCell<_>>`
//! gives that sharing without adding any blocking primitive — `Rc` isn't
//! `Send`/`Sync`, so the compiler refuses to let a `WorkbookEvaluator` cross
//! a thread boundary rather than silently letting two threads contend on a
//! `Mutex`. A host that genuinely needs multi-threaded access places its own
//! lock around a `WorkbookEvaluator`, same as it would around any other
//! `!Sync` value.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use formualizer_common::{CellId, ExcelError, ExcelErrorKind, LiteralValue};

use crate::context::EvalContext;
use crate::fault::EngineFault;
use crate::function::Function;
use crate::function_registry::AggregatingFinder;
use crate::traits::{FunctionProvider, NameBinding, SpreadsheetVersion, WorkbookHost};

use super::cache::EvaluationCache;
use super::environment::CollaboratingWorkbooksEnvironment;
use super::tracker::EvaluationTracker;
use super::vertex::EntryId;

/// Tunables that change how a workbook evaluator treats edge cases rather
/// than core semantics.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// When a `Ref3D`/`Area3D` names a workbook that isn't registered with
    /// the evaluator's environment, fall back to
    /// `WorkbookHost::cached_external_literal` instead of faulting with
    /// `MissingExternalWorkbook`.
    pub ignore_missing_workbooks: bool,
    /// Emit a `tracing::debug!` of the resolved value for the next
    /// formula evaluation the evaluator completes, then clear itself.
    /// Meant to be flipped on ad hoc from a debugger or host-side
    /// command, not left on permanently.
    pub debug_evaluation_output_for_next_eval: bool,
    /// Defensive backstop on recursion depth through `resolve_cell`,
    /// independent of cycle detection (which catches a cell revisiting
    /// itself, not a merely very deep acyclic chain). Not part of the
    /// pull-based evaluation model itself.
    pub max_iterations: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ignore_missing_workbooks: false,
            debug_evaluation_output_for_next_eval: false,
            max_iterations: 65_536,
        }
    }
}

/// Observes committed formula results as they're produced, e.g. to drive a
/// UI's "cell just changed" highlight. Side-channel only — never consulted
/// for correctness.
pub trait EvaluationListener: Send + Sync {
    fn on_value_changed(&self, cell: CellId, value: &LiteralValue);
}

/// An optional extra layer over `WorkbookHost::is_cell_final` for hosts
/// that want to decide finality from evaluator-level state (e.g. "this
/// sheet is a locked snapshot") rather than per-cell storage.
pub trait StabilityClassifier: Send + Sync {
    fn is_stable(&self, cell: CellId) -> bool;
}

/// Ties a host, the shared cache/tracker pair, and the function registry
/// together, and is itself what `EvalContext::resolve_cell` et al. are
/// implemented against while a formula is running.
pub struct WorkbookEvaluator<H: WorkbookHost + 'static> {
    host: Arc<H>,
    workbook_ix: u32,
    cache: Rc<RefCell<EvaluationCache>>,
    tracker: Rc<RefCell<EvaluationTracker>>,
    functions: Arc<dyn FunctionProvider>,
    environment: Option<Arc<CollaboratingWorkbooksEnvironment>>,
    config: EngineConfig,
    debug_next_eval: Arc<AtomicBool>,
    listeners: Vec<Arc<dyn EvaluationListener>>,
    stability: Option<Arc<dyn StabilityClassifier>>,
}

impl<H: WorkbookHost + 'static> WorkbookEvaluator<H> {
    pub fn new(host: H) -> Self {
        Self {
            host: Arc::new(host),
            workbook_ix: 0,
            cache: Rc::new(RefCell::new(EvaluationCache::new())),
            tracker: Rc::new(RefCell::new(EvaluationTracker::new())),
            functions: Arc::new(AggregatingFinder::default()),
            environment: None,
            config: EngineConfig::default(),
            debug_next_eval: Arc::new(AtomicBool::new(false)),
            listeners: Vec::new(),
            stability: None,
        }
    }

    pub fn with_workbook_ix(mut self, workbook_ix: u32) -> Self {
        self.workbook_ix = workbook_ix;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.debug_next_eval
            .store(config.debug_evaluation_output_for_next_eval, Ordering::Relaxed);
        self.config = config;
        self
    }

    /// Arm [`EngineConfig::debug_evaluation_output_for_next_eval`] without
    /// rebuilding the rest of the config, for flipping on from a running
    /// host (e.g. a debugger command) rather than only at construction.
    pub fn debug_next_evaluation(&self) {
        self.debug_next_eval.store(true, Ordering::Relaxed);
    }

    pub fn with_functions(mut self, functions: Arc<dyn FunctionProvider>) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_stability_classifier(mut self, classifier: Arc<dyn StabilityClassifier>) -> Self {
        self.stability = Some(classifier);
        self
    }

    pub fn add_listener(&mut self, listener: Arc<dyn EvaluationListener>) {
        self.listeners.push(listener);
    }

    pub fn host(&self) -> &H {
        self.host.as_ref()
    }

    /// Names of every function reachable through this evaluator's
    /// registry (built-ins plus whatever the host layered on top).
    pub fn supported_function_names(&self) -> Vec<String> {
        crate::function_registry::registered_names()
    }

    /// Names from the reference function catalog that have
    /// no registered implementation — the complement of
    /// `supported_function_names()`.
    pub fn not_supported_function_names(&self) -> Vec<String> {
        crate::function_registry::not_supported_names()
    }

    /// Join `self` onto a shared environment, so `Ref3D`/`Area3D` tokens
    /// naming a peer workbook can resolve and so the cache is shared
    /// across every registered peer.
    pub fn attach_to_environment(&mut self, env: Arc<CollaboratingWorkbooksEnvironment>, name: &str) {
        env.register_peer(self.workbook_ix, name, self.host.clone() as Arc<dyn WorkbookHost>);
        self.cache = env.shared_cache();
        self.environment = Some(env);
    }

    pub fn detach_from_environment(&mut self) {
        if let Some(env) = self.environment.take() {
            env.unregister_peer(self.workbook_ix);
        }
        self.cache = Rc::new(RefCell::new(EvaluationCache::new()));
    }

    fn root_context(&self, sheet: u32, row: u32, col: u32, single_value: bool) -> TrackingContext {
        TrackingContext {
            host: self.host.clone(),
            workbook_ix: self.workbook_ix,
            cache: self.cache.clone(),
            tracker: self.tracker.clone(),
            functions: self.functions.clone(),
            environment: self.environment.clone(),
            config: self.config,
            debug_next_eval: self.debug_next_eval.clone(),
            listeners: self.listeners.clone(),
            stability: self.stability.clone(),
            home_sheet: sheet,
            home_row: row,
            home_col: col,
            single_value,
            current_entry: None,
            volatile_seen: std::cell::Cell::new(false),
        }
    }

    /// Evaluate the formula at `(sheet, row, col)` to a single scalar,
    /// dereferencing any area/reference result .2. If the
    /// cell holds a plain value, returns that value unchanged (still
    /// routed through the cache so later edits invalidate anything that
    /// read it).
    pub fn evaluate(&self, sheet: u32, row: u32, col: u32) -> Result<LiteralValue, ExcelError> {
        let ctx = self.root_context(sheet, row, col, true);
        let value = ctx.resolve_cell(Some(sheet), row, col)?;
        crate::operand::dereference(value, row, col, &ctx)
    }

    /// Evaluate an ad hoc formula string as if it lived at `(sheet, row,
    /// col)`, without installing it on the host.
    pub fn evaluate_str(&self, sheet: u32, row: u32, col: u32, formula: &str) -> Result<LiteralValue, ExcelError>
    where
        H: formualizer_parse::compile::SheetResolver,
    {
        let home = self.host.sheet_name(sheet);
        let ast =
            formualizer_parse::parser::parse(formula).map_err(|e| ExcelError::new(ExcelErrorKind::Error).with_message(e.to_string()))?;
        let tokens = formualizer_parse::compile::compile(&ast, home.as_deref(), self.host.as_ref())
            .map_err(|e| ExcelError::new(ExcelErrorKind::Error).with_message(e.to_string()))?;
        let ctx = self.root_context(sheet, row, col, true);
        let mut interp = crate::interpreter::Interpreter::new(&ctx);
        let value = interp.run(&tokens).or_else(EngineFault::into_value_or_abort)?;
        Ok(value)
    }

    /// Evaluate `formula` as a data-validation list: parsed once against
    /// `region`'s first cell and re-applied at `(target_row, target_col)`
    /// by shifting its relative references by `(target_row -
    /// region_first_row, target_col - region_first_col)`,
    /// then run with the multi-value flag set so an area result is not
    /// collapsed to a scalar.
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate_list(
        &self,
        sheet: u32,
        target_row: u32,
        target_col: u32,
        region_first_row: u32,
        region_first_col: u32,
        formula: &str,
    ) -> Result<LiteralValue, ExcelError>
    where
        H: formualizer_parse::compile::SheetResolver,
    {
        let home = self.host.sheet_name(sheet);
        let ast =
            formualizer_parse::parser::parse(formula).map_err(|e| ExcelError::new(ExcelErrorKind::Error).with_message(e.to_string()))?;
        let base_tokens = formualizer_parse::compile::compile(&ast, home.as_deref(), self.host.as_ref())
            .map_err(|e| ExcelError::new(ExcelErrorKind::Error).with_message(e.to_string()))?;

        let delta_row = target_row as i64 - region_first_row as i64;
        let delta_col = target_col as i64 - region_first_col as i64;
        let (tokens, _shifted) =
            crate::region::adjust_region_relative(&base_tokens, delta_row, delta_col, self.host.spreadsheet_version())
                .map_err(ExcelError::from)?;

        let ctx = self.root_context(sheet, target_row, target_col, false);
        let mut interp = crate::interpreter::Interpreter::new(&ctx);
        interp.run(&tokens).or_else(EngineFault::into_value_or_abort)
    }

    pub fn notify_update_cell(&self, sheet: u32, row: u32, col: u32) {
        let cell = CellId::new(self.workbook_ix, sheet, row, col);
        self.cache.borrow_mut().notify_update_cell(cell);
    }

    pub fn notify_delete_cell(&self, sheet: u32, row: u32, col: u32) {
        let cell = CellId::new(self.workbook_ix, sheet, row, col);
        self.cache.borrow_mut().notify_delete_cell(cell);
    }

    pub fn clear_all_cached_results(&self) {
        self.cache.borrow_mut().clear_all_values();
    }
}

/// The `EvalContext` the façade actually runs formulas against: every
/// `resolve_*` call goes through the shared cache and tracker rather than
/// straight to the host, so a formula cell memoizes its result and a cycle
/// comes back as `#CIRCULAR` rather than blowing the stack.
struct TrackingContext {
    host: Arc<dyn WorkbookHost>,
    workbook_ix: u32,
    cache: Rc<RefCell<EvaluationCache>>,
    tracker: Rc<RefCell<EvaluationTracker>>,
    functions: Arc<dyn FunctionProvider>,
    environment: Option<Arc<CollaboratingWorkbooksEnvironment>>,
    config: EngineConfig,
    debug_next_eval: Arc<AtomicBool>,
    listeners: Vec<Arc<dyn EvaluationListener>>,
    stability: Option<Arc<dyn StabilityClassifier>>,
    home_sheet: u32,
    home_row: u32,
    home_col: u32,
    single_value: bool,
    /// The formula entry currently being evaluated, so a nested
    /// `resolve_cell` can record a dependency edge onto whatever it
    /// reads.
    current_entry: Option<EntryId>,
    /// Set once this context's own formula body calls a volatile
    /// function; read back by the caller that spawned this context as a
    /// child, to decide the `input_sensitive` flag it commits. Not inherited from the parent — each formula's
    /// volatility is judged by what it itself calls.
    volatile_seen: std::cell::Cell<bool>,
}

impl TrackingContext {
    fn is_final(&self, cell: CellId, sheet: u32, row: u32, col: u32) -> bool {
        if self.host.is_cell_final(sheet, row, col) {
            return true;
        }
        self.stability
            .as_ref()
            .is_some_and(|s| s.is_stable(cell))
    }

    fn child_for(&self, host: Arc<dyn WorkbookHost>, workbook_ix: u32, sheet: u32, row: u32, col: u32, current_entry: Option<EntryId>) -> Self {
        Self {
            host,
            workbook_ix,
            cache: self.cache.clone(),
            tracker: self.tracker.clone(),
            functions: self.functions.clone(),
            environment: self.environment.clone(),
            config: self.config,
            debug_next_eval: self.debug_next_eval.clone(),
            listeners: self.listeners.clone(),
            stability: self.stability.clone(),
            home_sheet: sheet,
            home_row: row,
            home_col: col,
            single_value: true,
            current_entry,
            volatile_seen: std::cell::Cell::new(false),
        }
    }

    fn missing_or_cached(&self, sheet: u32, row: u32, col: u32) -> Result<LiteralValue, EngineFault> {
        if self.config.ignore_missing_workbooks {
            Ok(self.host.cached_external_literal(sheet, row, col))
        } else {
            Err(EngineFault::MissingExternalWorkbook)
        }
    }

    fn notify_listeners(&self, cell: CellId, value: &LiteralValue) {
        for listener in &self.listeners {
            listener.on_value_changed(cell, value);
        }
    }
}

impl EvalContext for TrackingContext {
    fn resolve_cell(&self, sheet: Option<u32>, row: u32, col: u32) -> Result<LiteralValue, ExcelError> {
        let sheet = sheet.unwrap_or(self.home_sheet);
        let cell = CellId::new(self.workbook_ix, sheet, row, col);

        if self.is_final(cell, sheet, row, col) {
            return self.host.cell_value(sheet, row, col);
        }

        if let Some(tokens) = self.host.formula_tokens(sheet, row, col) {
            let entry_id = {
                let mut cache = self.cache.borrow_mut();
                let id = cache.ensure_formula(cell);
                if let Some(cur) = self.current_entry {
                    cache.add_dependency(cur, id);
                }
                id
            };

            let cached = {
                let cache = self.cache.borrow();
                match cache.get(entry_id) {
                    Some(super::vertex::CacheEntry::Formula(f)) if !f.input_sensitive => f.value.clone(),
                    _ => None,
                }
            };
            if let Some(value) = cached {
                return Ok(value);
            }

            let started = self.tracker.borrow_mut().start_evaluate(cell);
            if !started {
                return Ok(LiteralValue::Error(ExcelError::new(ExcelErrorKind::Circular)));
            }

            let depth = self.tracker.borrow().depth();
            if depth as u32 > self.config.max_iterations {
                self.tracker.borrow_mut().finish_evaluate(cell);
                return Ok(LiteralValue::Error(
                    ExcelError::new(ExcelErrorKind::Error).with_message("max_iterations exceeded"),
                ));
            }

            #[cfg(feature = "tracing")]
            tracing::debug!(%cell, depth, "starting formula evaluation");

            self.cache.borrow_mut().clear_inputs(entry_id);

            let child = self.child_for(self.host.clone(), self.workbook_ix, sheet, row, col, Some(entry_id));
            let result = {
                let mut interp = crate::interpreter::Interpreter::new(&child);
                interp.run(&tokens)
            };

            self.tracker.borrow_mut().finish_evaluate(cell);

            return match result {
                Ok(value) => {
                    let input_sensitive = child.volatile_seen.get();
                    self.cache
                        .borrow_mut()
                        .commit_formula(entry_id, value.clone(), input_sensitive);
                    self.notify_listeners(cell, &value);
                    if self.debug_next_eval.swap(false, Ordering::Relaxed) {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(%cell, ?value, "formula evaluation committed");
                    }
                    Ok(value)
                }
                Err(fault) => Ok(LiteralValue::Error(ExcelError::from(fault))),
            };
        }

        let value = self.host.cell_value(sheet, row, col)?;
        let mut cache = self.cache.borrow_mut();
        let id = cache.record_plain(cell, value.clone());
        if let Some(cur) = self.current_entry {
            cache.add_dependency(cur, id);
        }
        Ok(value)
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
                row.push(self.resolve_cell(Some(sheet), r, c)?);
            }
            rows.push(row);
        }
        Ok(rows)
    }

    fn resolve_ref3d(
        &self,
        workbook: Option<u32>,
        sheet: u32,
        row: u32,
        col: u32,
    ) -> Result<LiteralValue, EngineFault> {
        let target = workbook.unwrap_or(self.workbook_ix);
        if target == self.workbook_ix {
            return self.resolve_cell(Some(sheet), row, col).map_err(EngineFault::InBand);
        }
        let Some(env) = &self.environment else {
            return self.missing_or_cached(sheet, row, col);
        };
        let Some(peer_host) = env.peer_by_index(target) else {
            return self.missing_or_cached(sheet, row, col);
        };
        let peer = self.child_for(peer_host, target, sheet, row, col, self.current_entry);
        peer.resolve_cell(Some(sheet), row, col).map_err(EngineFault::InBand)
    }

    fn resolve_area3d(
        &self,
        workbook: Option<u32>,
        sheet: u32,
        first_row: u32,
        first_col: u32,
        last_row: u32,
        last_col: u32,
    ) -> Result<Vec<Vec<LiteralValue>>, EngineFault> {
        let target = workbook.unwrap_or(self.workbook_ix);
        if target == self.workbook_ix {
            return self
                .resolve_area(Some(sheet), first_row, first_col, last_row, last_col)
                .map_err(EngineFault::InBand);
        }
        let Some(env) = &self.environment else {
            return self
                .missing_or_cached(sheet, first_row, first_col)
                .map(|v| vec![vec![v]]);
        };
        let Some(peer_host) = env.peer_by_index(target) else {
            return self
                .missing_or_cached(sheet, first_row, first_col)
                .map(|v| vec![vec![v]]);
        };
        let peer = self.child_for(peer_host, target, sheet, first_row, first_col, self.current_entry);
        peer.resolve_area(Some(sheet), first_row, first_col, last_row, last_col)
            .map_err(EngineFault::InBand)
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

    fn workbook_ix(&self) -> u32 {
        self.workbook_ix
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

    fn spreadsheet_version(&self) -> SpreadsheetVersion {
        self.host.spreadsheet_version()
    }

    fn single_value(&self) -> bool {
        self.single_value
    }

    fn note_volatile(&self) {
        self.volatile_seen.set(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestWorkbook;
    use std::sync::atomic::AtomicU32;

    fn registry() -> Arc<dyn FunctionProvider> {
        crate::builtins::load_builtins();
        Arc::new(AggregatingFinder::default())
    }

    /// A volatile test-only function that returns a fresh value on every
    /// call, so a formula that calls it can prove whether the cache is
    /// honoring `input_sensitive` or wrongly serving a
    /// stale committed value.
    struct CallCounter(AtomicU32);
    impl Function for CallCounter {
        fn name(&self) -> &'static str {
            "TESTCOUNTER"
        }
        fn volatile(&self) -> bool {
            true
        }
        fn eval(&self, _args: &[LiteralValue], _ctx: &dyn EvalContext) -> Result<LiteralValue, ExcelError> {
            Ok(LiteralValue::Number(self.0.fetch_add(1, Ordering::SeqCst) as f64))
        }
    }

    struct SingleFunctionProvider(Arc<dyn Function>);
    impl FunctionProvider for SingleFunctionProvider {
        fn get_function_by_name(&self, name: &str) -> Option<Arc<dyn Function>> {
            (name.eq_ignore_ascii_case(self.0.name())).then(|| self.0.clone())
        }
        fn get_function_by_index(&self, _index: u32) -> Option<Arc<dyn Function>> {
            None
        }
    }

    fn registry_with_volatile_counter() -> Arc<dyn FunctionProvider> {
        crate::builtins::load_builtins();
        Arc::new(
            AggregatingFinder::default().with(Arc::new(SingleFunctionProvider(Arc::new(CallCounter(AtomicU32::new(0)))))),
        )
    }

    #[test]
    fn a_formula_calling_a_volatile_function_is_never_served_stale_from_cache() {
        let wb = TestWorkbook::new();
        wb.set_formula(0, 0, 0, "=TESTCOUNTER()");
        let ev = WorkbookEvaluator::new(wb).with_functions(registry_with_volatile_counter());

        let first = ev.evaluate(0, 0, 0).unwrap();
        let second = ev.evaluate(0, 0, 0).unwrap();
        assert_ne!(first, second, "volatile formula must re-evaluate, not reuse a cached value");
    }

    #[test]
    fn formula_result_is_cached_until_invalidated() {
        let mut wb = TestWorkbook::new();
        wb.set_value(0, 0, 0, LiteralValue::Number(2.0));
        wb.set_formula(0, 1, 0, "=A1*10");
        let ev = WorkbookEvaluator::new(wb).with_functions(registry());

        assert_eq!(ev.evaluate(0, 1, 0).unwrap(), LiteralValue::Number(20.0));
        assert_eq!(ev.evaluate(0, 1, 0).unwrap(), LiteralValue::Number(20.0));
    }

    #[test]
    fn updating_an_input_invalidates_the_dependent_formula() {
        let mut wb = TestWorkbook::new();
        wb.set_value(0, 0, 0, LiteralValue::Number(2.0));
        wb.set_formula(0, 1, 0, "=A1*10");
        let ev = WorkbookEvaluator::new(wb).with_functions(registry());

        assert_eq!(ev.evaluate(0, 1, 0).unwrap(), LiteralValue::Number(20.0));
        ev.host().set_value(0, 0, 0, LiteralValue::Number(3.0));
        ev.notify_update_cell(0, 0, 0);
        assert_eq!(ev.evaluate(0, 1, 0).unwrap(), LiteralValue::Number(30.0));
    }

    #[test]
    fn direct_self_reference_is_circular() {
        let mut wb = TestWorkbook::new();
        wb.set_formula(0, 0, 0, "=A1+1");
        let ev = WorkbookEvaluator::new(wb).with_functions(registry());
        assert_eq!(
            ev.evaluate(0, 0, 0).unwrap(),
            LiteralValue::Error(ExcelError::new(ExcelErrorKind::Circular))
        );
    }

    #[test]
    fn mutual_circular_reference_is_detected_both_ways() {
        let mut wb = TestWorkbook::new();
        wb.set_formula(0, 0, 0, "=A2");
        wb.set_formula(0, 1, 0, "=A1");
        let ev = WorkbookEvaluator::new(wb).with_functions(registry());
        assert_eq!(
            ev.evaluate(0, 0, 0).unwrap(),
            LiteralValue::Error(ExcelError::new(ExcelErrorKind::Circular))
        );
    }

    #[test]
    fn a_long_acyclic_chain_within_max_iterations_still_evaluates() {
        let wb = TestWorkbook::new();
        wb.set_value(0, 0, 0, LiteralValue::Number(1.0));
        for row in 1..50 {
            wb.set_formula(0, row, 0, &format!("=A{}+1", row));
        }
        let ev = WorkbookEvaluator::new(wb).with_functions(registry());
        assert_eq!(ev.evaluate(0, 49, 0).unwrap(), LiteralValue::Number(50.0));
    }

    #[test]
    fn an_empty_workbooks_supported_function_names_is_non_empty() {
        let wb = TestWorkbook::new();
        let ev = WorkbookEvaluator::new(wb).with_functions(registry());
        assert!(!ev.supported_function_names().is_empty());
    }

    #[test]
    fn supported_and_not_supported_names_are_disjoint() {
        let wb = TestWorkbook::new();
        let ev = WorkbookEvaluator::new(wb).with_functions(registry());
        let supported: std::collections::HashSet<_> = ev.supported_function_names().into_iter().collect();
        let not_supported = ev.not_supported_function_names();
        assert!(!not_supported.is_empty());
        assert!(not_supported.iter().all(|n| !supported.contains(n)));
    }

    #[test]
    fn a_chain_deeper_than_max_iterations_is_rejected() {
        let wb = TestWorkbook::new();
        wb.set_value(0, 0, 0, LiteralValue::Number(1.0));
        for row in 1..20 {
            wb.set_formula(0, row, 0, &format!("=A{}+1", row));
        }
        let ev = WorkbookEvaluator::new(wb)
            .with_functions(registry())
            .with_config(EngineConfig {
                max_iterations: 5,
                ..EngineConfig::default()
            });
        assert_eq!(
            ev.evaluate(0, 19, 0).unwrap(),
            LiteralValue::Error(ExcelError::new(ExcelErrorKind::Error).with_message("max_iterations exceeded"))
        );
    }
}
