//! A collaborating-workbook environment: a shared cache
//! sitting underneath any number of host workbooks, each reachable by a
//! stable numeric index and an optional display name, so a `Ref3D`/`Area3D`
//! token naming a workbook other than the one it was compiled against can
//! still resolve.
//!
//! Registering a peer only exposes its `WorkbookHost` surface, not a whole
//! `WorkbookEvaluator` — cross-workbook reads only ever need raw cell/
//! formula data, never the peer's own caching configuration.
//!
//! The shared `cache` is `Rc<RefCell<_>>` (no internal lock) for the same
//! reason `WorkbookEvaluator` uses it: every member evaluator borrows the
//! same cache synchronously during one evaluation call, never concurrently.
//! `hosts`/`ix_by_name` stay behind a plain `Mutex` since peer registration
//! is setup-time bookkeeping a host may legitimately do from whatever
//! thread loads it, separate from the per-cell evaluation hot path.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;

use crate::traits::WorkbookHost;

use super::cache::EvaluationCache;

pub struct CollaboratingWorkbooksEnvironment {
    cache: Rc<RefCell<EvaluationCache>>,
    hosts: Mutex<FxHashMap<u32, Arc<dyn WorkbookHost>>>,
    ix_by_name: Mutex<FxHashMap<String, u32>>,
}

impl CollaboratingWorkbooksEnvironment {
    pub fn new() -> Self {
        Self {
            cache: Rc::new(RefCell::new(EvaluationCache::new())),
            hosts: Mutex::new(FxHashMap::default()),
            ix_by_name: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn shared_cache(&self) -> Rc<RefCell<EvaluationCache>> {
        self.cache.clone()
    }

    /// Register (or replace) the host at `workbook_ix`, reachable later by
    /// its case-insensitive display `name`.
    pub fn register_peer(&self, workbook_ix: u32, name: &str, host: Arc<dyn WorkbookHost>) {
        self.hosts.lock().unwrap().insert(workbook_ix, host);
        self.ix_by_name
            .lock()
            .unwrap()
            .insert(name.to_ascii_lowercase(), workbook_ix);
    }

    pub fn unregister_peer(&self, workbook_ix: u32) {
        self.hosts.lock().unwrap().remove(&workbook_ix);
        self.ix_by_name
            .lock()
            .unwrap()
            .retain(|_, ix| *ix != workbook_ix);
    }

    pub fn peer_by_index(&self, workbook_ix: u32) -> Option<Arc<dyn WorkbookHost>> {
        self.hosts.lock().unwrap().get(&workbook_ix).cloned()
    }

    pub fn peer_index_by_name(&self, name: &str) -> Option<u32> {
        self.ix_by_name
            .lock()
            .unwrap()
            .get(&name.to_ascii_lowercase())
            .copied()
    }
}

impl Default for CollaboratingWorkbooksEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestWorkbook;

    #[test]
    fn peers_are_reachable_by_index_and_name() {
        let env = CollaboratingWorkbooksEnvironment::new();
        let wb: Arc<dyn WorkbookHost> = Arc::new(TestWorkbook::new());
        env.register_peer(1, "Budget", wb);

        assert!(env.peer_by_index(1).is_some());
        assert_eq!(env.peer_index_by_name("budget"), Some(1));
        assert!(env.peer_by_index(2).is_none());
    }

    #[test]
    fn unregistering_drops_both_indexes() {
        let env = CollaboratingWorkbooksEnvironment::new();
        let wb: Arc<dyn WorkbookHost> = Arc::new(TestWorkbook::new());
        env.register_peer(1, "Budget", wb);
        env.unregister_peer(1);
        assert!(env.peer_by_index(1).is_none());
        assert!(env.peer_index_by_name("budget").is_none());
    }
}
