//! The evaluation cache: a by-cell index over the
//! `engine::vertex` arena plus worklist-driven transitive invalidation.
//!
//! A single `EvaluationCache` can be shared (via `Rc<RefCell<_>>`, see
//! `engine::environment`) across every workbook host collaborating in one
//! evaluation session, since `CellId` already carries a `workbook` index.

use rustc_hash::{FxHashMap, FxHashSet};

use formualizer_common::{CellId, LiteralValue};

use super::vertex::{Arena, CacheEntry, EntryId, FormulaEntry, PlainEntry};

#[derive(Default)]
pub struct EvaluationCache {
    arena: Arena,
    by_cell: FxHashMap<CellId, EntryId>,
}

impl EvaluationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry_for(&self, cell: CellId) -> Option<EntryId> {
        self.by_cell.get(&cell).copied()
    }

    pub fn get(&self, id: EntryId) -> Option<&CacheEntry> {
        self.arena.get(id)
    }

    /// Look up a previously-committed plain (non-formula) value, if the
    /// cell has been read before and hasn't since been invalidated.
    pub fn get_plain(&self, cell: CellId) -> Option<&LiteralValue> {
        match self.by_cell.get(&cell).and_then(|id| self.arena.get(*id)) {
            Some(CacheEntry::Plain(p)) => Some(&p.value),
            _ => None,
        }
    }

    /// Look up a previously-committed formula value. `None` if the cell
    /// has no entry, or has an entry but no committed value yet (in
    /// progress, or some input hasn't committed).
    pub fn get_formula_value(&self, cell: CellId) -> Option<&LiteralValue> {
        match self.by_cell.get(&cell).and_then(|id| self.arena.get(*id)) {
            Some(CacheEntry::Formula(f)) => f.value.as_ref(),
            _ => None,
        }
    }

    /// Record a plain cell's value, creating its entry if this is the
    /// first time it's been read.
    pub fn record_plain(&mut self, cell: CellId, value: LiteralValue) -> EntryId {
        if let Some(&id) = self.by_cell.get(&cell) {
            if let Some(CacheEntry::Plain(p)) = self.arena.get_mut(id) {
                p.value = value;
                return id;
            }
        }
        let id = self.arena.insert(CacheEntry::Plain(PlainEntry {
            cell,
            value,
            consumers: FxHashSet::default(),
        }));
        self.by_cell.insert(cell, id);
        id
    }

    /// Ensure a formula entry exists for `cell`, returning its id without
    /// disturbing any already-committed value.
    pub fn ensure_formula(&mut self, cell: CellId) -> EntryId {
        if let Some(&id) = self.by_cell.get(&cell) {
            return id;
        }
        let id = self.arena.new_formula(cell);
        self.by_cell.insert(cell, id);
        id
    }

    /// Record that `consumer`'s evaluation read `input`'s current value,
    /// linking the edge both ways so invalidation and cycle-tracing can
    /// walk in either direction.
    pub fn add_dependency(&mut self, consumer: EntryId, input: EntryId) {
        if let Some(CacheEntry::Formula(f)) = self.arena.get_mut(consumer) {
            f.inputs.insert(input);
        }
        if let Some(e) = self.arena.get_mut(input) {
            e.consumers_mut().insert(consumer);
        }
    }

    /// Commit a formula's computed value and mark whether the formula
    /// itself is input-sensitive (volatile, or read from a now-stale
    /// snapshot) —  `input_sensitive` flag controls whether a
    /// future `notify_update_cell` on one of its *own* inputs should
    /// re-invalidate it even absent a direct dependency edge change.
    pub fn commit_formula(&mut self, id: EntryId, value: LiteralValue, input_sensitive: bool) {
        if let Some(CacheEntry::Formula(f)) = self.arena.get_mut(id) {
            f.value = Some(value);
            f.input_sensitive = input_sensitive;
        }
    }

    /// Drop a formula's inputs edges before re-evaluating it, so stale
    /// dependency edges from a previous formula body don't linger.
    pub fn clear_inputs(&mut self, id: EntryId) {
        let Some(CacheEntry::Formula(f)) = self.arena.get_mut(id) else {
            return;
        };
        let old_inputs: Vec<EntryId> = f.inputs.drain().collect();
        for input in old_inputs {
            if let Some(e) = self.arena.get_mut(input) {
                e.consumers_mut().remove(&id);
            }
        }
    }

    /// A host's cell value changed underneath the cache (edit, paste,
    /// external refresh). Invalidate that cell's own committed value and
    /// transitively invalidate every formula that (directly or
    /// transitively) consumed it, via a worklist BFS rather than
    /// recursion, so this doesn't blow the stack on deep dependency chains.
    pub fn notify_update_cell(&mut self, cell: CellId) {
        let Some(&id) = self.by_cell.get(&cell) else {
            return;
        };
        match self.arena.get_mut(id) {
            Some(CacheEntry::Plain(p)) => p.value = LiteralValue::Empty,
            Some(CacheEntry::Formula(f)) => f.value = None,
            None => {}
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(%cell, "invalidating consumers after cell update");
        self.invalidate_consumers_of(id);
    }

    /// A cell was deleted outright: drop its entry from the arena
    /// entirely (not just its value), after invalidating and detaching
    /// every consumer's edge to it.
    pub fn notify_delete_cell(&mut self, cell: CellId) {
        let Some(id) = self.by_cell.remove(&cell) else {
            return;
        };
        self.invalidate_consumers_of(id);
        self.detach_entry(id);
        self.arena.remove(id);
    }

    /// Drop every edge pointing at `id` (from its inputs' consumer sets
    /// and from its consumers' input sets), without touching `id` itself.
    /// Used when an entry is being removed from the arena.
    fn detach_entry(&mut self, id: EntryId) {
        let inputs: Vec<EntryId> = match self.arena.get(id) {
            Some(CacheEntry::Formula(f)) => f.inputs.iter().copied().collect(),
            _ => Vec::new(),
        };
        for input in inputs {
            if let Some(e) = self.arena.get_mut(input) {
                e.consumers_mut().remove(&id);
            }
        }
        let consumers: Vec<EntryId> = self
            .arena
            .get(id)
            .map(|e| e.consumers().iter().copied().collect())
            .unwrap_or_default();
        for consumer in consumers {
            if let Some(CacheEntry::Formula(f)) = self.arena.get_mut(consumer) {
                f.inputs.remove(&id);
            }
        }
    }

    /// Worklist BFS over the consumer graph, clearing each formula's
    /// committed value exactly once. Bounded by a visited set so a
    /// diamond-shaped dependency fan-in doesn't get walked more than
    /// once.
    fn invalidate_consumers_of(&mut self, start: EntryId) {
        let mut visited: FxHashSet<EntryId> = FxHashSet::default();
        let mut queue: Vec<EntryId> = self
            .arena
            .get(start)
            .map(|e| e.consumers().iter().copied().collect())
            .unwrap_or_default();

        while let Some(id) = queue.pop() {
            if !visited.insert(id) {
                continue;
            }
            let had_value = match self.arena.get_mut(id) {
                Some(CacheEntry::Formula(f)) if f.value.is_some() => {
                    f.value = None;
                    true
                }
                _ => false,
            };
            if had_value {
                if let Some(e) = self.arena.get(id) {
                    queue.extend(e.consumers().iter().copied());
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(count = visited.len(), "cache invalidation sweep complete");
    }

    /// Drop every committed value in the cache without touching the
    /// dependency graph — used when the host signals a full recalc.
    pub fn clear_all_values(&mut self) {
        for id in self.by_cell.values().copied().collect::<Vec<_>>() {
            match self.arena.get_mut(id) {
                Some(CacheEntry::Plain(p)) => p.value = LiteralValue::Empty,
                Some(CacheEntry::Formula(f)) => f.value = None,
                None => {}
            }
        }
    }

    /// Drop everything: arena, dependency edges, cell index.
    pub fn clear(&mut self) {
        self.arena.clear();
        self.by_cell.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(row: u32, col: u32) -> CellId {
        CellId::new(0, 0, row, col)
    }

    #[test]
    fn update_invalidates_direct_consumer() {
        let mut cache = EvaluationCache::new();
        let a1 = cache.record_plain(cell(0, 0), LiteralValue::Number(1.0));
        let b1 = cache.ensure_formula(cell(1, 0));
        cache.add_dependency(b1, a1);
        cache.commit_formula(b1, LiteralValue::Number(1.0), false);

        assert!(cache.get_formula_value(cell(1, 0)).is_some());
        cache.notify_update_cell(cell(0, 0));
        assert!(cache.get_formula_value(cell(1, 0)).is_none());
    }

    #[test]
    fn invalidation_is_transitive_across_a_chain() {
        let mut cache = EvaluationCache::new();
        let a1 = cache.record_plain(cell(0, 0), LiteralValue::Number(1.0));
        let b1 = cache.ensure_formula(cell(1, 0));
        cache.add_dependency(b1, a1);
        cache.commit_formula(b1, LiteralValue::Number(1.0), false);
        let c1 = cache.ensure_formula(cell(2, 0));
        cache.add_dependency(c1, b1);
        cache.commit_formula(c1, LiteralValue::Number(1.0), false);

        cache.notify_update_cell(cell(0, 0));
        assert!(cache.get_formula_value(cell(1, 0)).is_none());
        assert!(cache.get_formula_value(cell(2, 0)).is_none());
    }

    #[test]
    fn diamond_dependency_only_invalidates_once() {
        let mut cache = EvaluationCache::new();
        let a1 = cache.record_plain(cell(0, 0), LiteralValue::Number(1.0));
        let b1 = cache.ensure_formula(cell(1, 0));
        let b2 = cache.ensure_formula(cell(1, 1));
        cache.add_dependency(b1, a1);
        cache.add_dependency(b2, a1);
        cache.commit_formula(b1, LiteralValue::Number(1.0), false);
        cache.commit_formula(b2, LiteralValue::Number(1.0), false);
        let c1 = cache.ensure_formula(cell(2, 0));
        cache.add_dependency(c1, b1);
        cache.add_dependency(c1, b2);
        cache.commit_formula(c1, LiteralValue::Number(2.0), false);

        cache.notify_update_cell(cell(0, 0));
        assert!(cache.get_formula_value(cell(2, 0)).is_none());
    }

    #[test]
    fn delete_cell_detaches_edges_and_removes_entry() {
        let mut cache = EvaluationCache::new();
        let a1 = cache.record_plain(cell(0, 0), LiteralValue::Number(1.0));
        let b1 = cache.ensure_formula(cell(1, 0));
        cache.add_dependency(b1, a1);
        cache.commit_formula(b1, LiteralValue::Number(1.0), false);

        cache.notify_delete_cell(cell(0, 0));
        assert!(cache.entry_for(cell(0, 0)).is_none());
        assert!(cache.get_formula_value(cell(1, 0)).is_none());
    }

    #[test]
    fn update_on_a_formula_cell_clears_its_own_committed_value() {
        let mut cache = EvaluationCache::new();
        let a1 = cache.ensure_formula(cell(0, 0));
        cache.commit_formula(a1, LiteralValue::Number(1.0), false);
        assert!(cache.get_formula_value(cell(0, 0)).is_some());

        cache.notify_update_cell(cell(0, 0));
        assert!(cache.get_formula_value(cell(0, 0)).is_none());
    }

    #[test]
    fn clearing_inputs_detaches_stale_consumer_edges() {
        let mut cache = EvaluationCache::new();
        let a1 = cache.record_plain(cell(0, 0), LiteralValue::Number(1.0));
        let b1 = cache.ensure_formula(cell(1, 0));
        cache.add_dependency(b1, a1);
        cache.clear_inputs(b1);

        cache.notify_update_cell(cell(0, 0));
        // b1 no longer depends on a1, so re-committing b1 and re-updating
        // a1 must not reach it.
        cache.commit_formula(b1, LiteralValue::Number(9.0), false);
        cache.notify_update_cell(cell(0, 0));
        assert_eq!(
            cache.get_formula_value(cell(1, 0)),
            Some(&LiteralValue::Number(9.0))
        );
    }
}
