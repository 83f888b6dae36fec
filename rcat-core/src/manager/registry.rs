use crate::stand::{TreeBiomass, TreeRecord, TreeStatus};
use std::collections::HashMap;

/// Identifies the trees registered for a realization.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TreeKey {
    pub status: TreeStatus,
    /// Time index of the stand observation
    pub index: usize,
    pub sampling_unit_id: String,
    pub species_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredTree {
    pub record: TreeRecord,
    pub biomass: TreeBiomass,
}

/// Trees of a realization in a single flat lookup.
#[derive(Debug, Clone, Default)]
pub struct TreeRegistry {
    trees: HashMap<TreeKey, Vec<RegisteredTree>>,
}

impl TreeRegistry {
    pub fn register(&mut self, key: TreeKey, tree: RegisteredTree) {
        self.trees.entry(key).or_default().push(tree);
    }

    pub fn get(&self, key: &TreeKey) -> &[RegisteredTree] {
        self.trees.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Registered trees sorted by key
    pub fn sorted(&self) -> Vec<(&TreeKey, &[RegisteredTree])> {
        let mut entries: Vec<_> = self
            .trees
            .iter()
            .map(|(key, trees)| (key, trees.as_slice()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.trees.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn clear(&mut self) {
        self.trees.clear();
    }
}
