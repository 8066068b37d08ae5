//! Stable-within-a-run hasher used for `ASTNode::fingerprint`. Not
//! cryptographic and not persisted across process runs — only used to
//! de-duplicate/compare parsed formulas in memory.

use std::hash::Hasher;

pub struct FormulaHasher(rustc_hash::FxHasher);

impl FormulaHasher {
    pub fn new() -> Self {
        Self(rustc_hash::FxHasher::default())
    }
}

impl Default for FormulaHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for FormulaHasher {
    fn finish(&self) -> u64 {
        self.0.finish()
    }

    fn write(&mut self, bytes: &[u8]) {
        self.0.write(bytes)
    }
}
