//! Disjoint-set forest keyed by arbitrary hashable nodes

use std::hash::Hash;

use rustc_hash::FxHashMap;

/// Union-find with path halving and union by size.
///
/// Nodes are numbered in insertion order; [`UnionFind::components`] lists
/// components by their earliest node so iteration is deterministic.
#[derive(Debug, Clone)]
pub struct UnionFind<K> {
    index: FxHashMap<K, usize>,
    keys: Vec<K>,
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl<K> Default for UnionFind<K> {
    fn default() -> Self {
        Self {
            index: FxHashMap::default(),
            keys: Vec::new(),
            parent: Vec::new(),
            size: Vec::new(),
        }
    }
}

impl<K: Hash + Eq + Clone> UnionFind<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node if missing and return its index
    pub fn insert(&mut self, key: K) -> usize {
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let idx = self.keys.len();
        self.index.insert(key.clone(), idx);
        self.keys.push(key);
        self.parent.push(idx);
        self.size.push(1);
        idx
    }

    #[must_use]
    pub fn index_of(&self, key: &K) -> Option<usize> {
        self.index.get(key).copied()
    }

    #[must_use]
    pub fn key(&self, idx: usize) -> &K {
        &self.keys[idx]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn find(&mut self, mut idx: usize) -> usize {
        while self.parent[idx] != idx {
            self.parent[idx] = self.parent[self.parent[idx]];
            idx = self.parent[idx];
        }
        idx
    }

    /// Merge the sets of `a` and `b`; returns the new root
    pub fn union(&mut self, a: usize, b: usize) -> usize {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return ra;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
        ra
    }

    /// Insert both keys and merge their sets
    pub fn union_keys(&mut self, a: K, b: K) -> usize {
        let ia = self.insert(a);
        let ib = self.insert(b);
        self.union(ia, ib)
    }

    /// All components, each a list of node indices in insertion order,
    /// ordered by their first node
    pub fn components(&mut self) -> Vec<Vec<usize>> {
        let mut slot_of_root: FxHashMap<usize, usize> = FxHashMap::default();
        let mut components: Vec<Vec<usize>> = Vec::new();
        for idx in 0..self.keys.len() {
            let root = self.find(idx);
            let slot = *slot_of_root.entry(root).or_insert_with(|| {
                components.push(Vec::new());
                components.len() - 1
            });
            components[slot].push(idx);
        }
        components
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_components_are_ordered() {
        let mut uf = UnionFind::new();
        uf.insert("a");
        uf.union_keys("b", "c");
        uf.union_keys("d", "a");
        uf.union_keys("c", "e");

        let components = uf.components();
        let as_keys: Vec<Vec<&str>> = components
            .iter()
            .map(|c| c.iter().map(|&i| *uf.key(i)).collect())
            .collect();
        assert_eq!(as_keys, vec![vec!["a", "d"], vec!["b", "c", "e"]]);
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut uf = UnionFind::new();
        let a = uf.insert(("x".to_string(), String::new()));
        let b = uf.insert(("x".to_string(), String::new()));
        assert_eq!(a, b);
        assert_eq!(uf.len(), 1);
    }

    #[test]
    fn test_transitive_union() {
        let mut uf = UnionFind::new();
        let a = uf.insert(1);
        let b = uf.insert(2);
        let c = uf.insert(3);
        uf.union(a, b);
        uf.union(b, c);
        assert_eq!(uf.find(a), uf.find(c));
    }
}
