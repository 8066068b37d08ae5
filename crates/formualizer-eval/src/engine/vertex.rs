//! Arena-allocated cache entries, addressed by an opaque [`EntryId`] rather
//! than direct references: the `consumers` back-edges are a classic cyclic
//! structure, and storing them as raw pointers would make invalidation
//! unsafe under deletion. The id/slab shape follows the same vertex-arena
//! idiom used elsewhere in this codebase, narrowed to two entry shapes
//! (plain values and formulas) instead of column-oriented vertex kinds.

use rustc_hash::FxHashSet;

use formualizer_common::{CellId, LiteralValue};

/// Opaque handle into an [`EvaluationCache`](super::cache::EvaluationCache)'s
/// arena. Never constructed outside this module; stable for the lifetime of
/// the entry it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u32);

impl EntryId {
    pub(crate) fn from_index(ix: usize) -> Self {
        Self(ix as u32)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// `{ value, consumers }`. Created on first read of a
/// non-formula cell.
#[derive(Debug, Clone)]
pub struct PlainEntry {
    pub cell: CellId,
    pub value: LiteralValue,
    pub consumers: FxHashSet<EntryId>,
}

/// `{ cell_id, value, inputs, consumers, input_sensitive }`.
/// `value` is `None` exactly when some input hasn't committed yet, or when
/// evaluation is in progress / was aborted mid-flight.
#[derive(Debug, Clone)]
pub struct FormulaEntry {
    pub cell: CellId,
    pub value: Option<LiteralValue>,
    pub inputs: FxHashSet<EntryId>,
    pub consumers: FxHashSet<EntryId>,
    pub input_sensitive: bool,
}

impl FormulaEntry {
    fn new(cell: CellId) -> Self {
        Self {
            cell,
            value: None,
            inputs: FxHashSet::default(),
            consumers: FxHashSet::default(),
            input_sensitive: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CacheEntry {
    Plain(PlainEntry),
    Formula(FormulaEntry),
}

impl CacheEntry {
    pub fn cell(&self) -> CellId {
        match self {
            CacheEntry::Plain(p) => p.cell,
            CacheEntry::Formula(f) => f.cell,
        }
    }

    pub fn consumers(&self) -> &FxHashSet<EntryId> {
        match self {
            CacheEntry::Plain(p) => &p.consumers,
            CacheEntry::Formula(f) => &f.consumers,
        }
    }

    pub fn consumers_mut(&mut self) -> &mut FxHashSet<EntryId> {
        match self {
            CacheEntry::Plain(p) => &mut p.consumers,
            CacheEntry::Formula(f) => &mut f.consumers,
        }
    }
}

/// Vec-backed slab with a free list so deleted formula entries (cell
/// deletion, not mere invalidation) can have their slot reused rather than
/// leaking the arena forever across a long-lived cache.
#[derive(Default)]
pub struct Arena {
    slots: Vec<Option<CacheEntry>>,
    free: Vec<EntryId>,
}

impl Arena {
    pub fn insert(&mut self, entry: CacheEntry) -> EntryId {
        if let Some(id) = self.free.pop() {
            self.slots[id.index()] = Some(entry);
            id
        } else {
            let id = EntryId::from_index(self.slots.len());
            self.slots.push(Some(entry));
            id
        }
    }

    pub fn new_formula(&mut self, cell: CellId) -> EntryId {
        self.insert(CacheEntry::Formula(FormulaEntry::new(cell)))
    }

    pub fn get(&self, id: EntryId) -> Option<&CacheEntry> {
        self.slots.get(id.index()).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut CacheEntry> {
        self.slots.get_mut(id.index()).and_then(|s| s.as_mut())
    }

    pub fn remove(&mut self, id: EntryId) -> Option<CacheEntry> {
        let slot = self.slots.get_mut(id.index())?;
        let entry = slot.take();
        if entry.is_some() {
            self.free.push(id);
        }
        entry
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reused_slot_gets_a_fresh_entry() {
        let mut arena = Arena::default();
        let a = arena.new_formula(CellId::new(0, 0, 0, 0));
        arena.remove(a);
        let b = arena.new_formula(CellId::new(0, 0, 1, 1));
        assert_eq!(a, b);
        assert_eq!(arena.get(b).unwrap().cell(), CellId::new(0, 0, 1, 1));
    }
}
