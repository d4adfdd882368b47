//! core::graph
//!
//! Parent-pointer forest representation and operations.
//!
//! # Architecture
//!
//! Both the directory tree and the variation graph are forests where:
//! - Nodes are record ids
//! - Edges point from child to parent (stored as a parent pointer)
//! - A node without a parent is a root
//!
//! Records arrive as an unordered set with `parent_id` fields, so the graph
//! may be handed corrupt input. Every walk is bounded by the node count and
//! reports a cycle instead of looping.
//!
//! # Invariants
//!
//! - Graph must be acyclic
//! - Every parent pointer must name a registered node

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::Hash;

/// Why a walk toward the root failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainError<K> {
    /// The walk starting at this node revisits a node.
    Cycle(K),
    /// `node` points at `parent`, which is not registered.
    Dangling { node: K, parent: K },
}

/// A forest of ids linked by parent pointers.
#[derive(Debug, Clone)]
pub struct ParentGraph<K> {
    /// All registered nodes
    nodes: BTreeSet<K>,
    /// Parent pointer for each non-root node
    parents: HashMap<K, K>,
    /// Cached children sets (derived from parents)
    children: HashMap<K, BTreeSet<K>>,
}

impl<K> Default for ParentGraph<K> {
    fn default() -> Self {
        Self {
            nodes: BTreeSet::new(),
            parents: HashMap::new(),
            children: HashMap::new(),
        }
    }
}

impl<K: Copy + Eq + Hash + Ord> ParentGraph<K> {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node, with or without a parent.
    ///
    /// The parent does not need to be registered yet; dangling pointers are
    /// reported when walked.
    pub fn add_node(&mut self, node: K, parent: Option<K>) {
        self.nodes.insert(node);
        if let Some(parent) = parent {
            self.add_edge(node, parent);
        }
    }

    /// Add a parent relationship.
    ///
    /// This also updates the children cache.
    pub fn add_edge(&mut self, child: K, parent: K) {
        self.nodes.insert(child);
        self.children.entry(parent).or_default().insert(child);
        self.parents.insert(child, parent);
    }

    /// Whether a node is registered.
    pub fn contains(&self, node: &K) -> bool {
        self.nodes.contains(node)
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get the parent of a node.
    pub fn parent(&self, node: &K) -> Option<&K> {
        self.parents.get(node)
    }

    /// Get the children of a node, in ascending key order.
    pub fn children(&self, node: &K) -> impl Iterator<Item = &K> {
        self.children.get(node).into_iter().flatten()
    }

    /// Get all root nodes (nodes without a parent pointer).
    pub fn roots(&self) -> impl Iterator<Item = &K> {
        self.nodes.iter().filter(|n| !self.parents.contains_key(n))
    }

    /// Walk from `start` to its root.
    ///
    /// Returns `[start, parent(start), ..., root]`. The walk takes at most
    /// `len()` steps; exceeding that means the chain never terminates.
    ///
    /// # Errors
    ///
    /// - `ChainError::Dangling` if a parent pointer names an unregistered node
    /// - `ChainError::Cycle` if the walk does not reach a root
    ///
    /// # Example
    ///
    /// ```
    /// use calibdb::core::graph::ParentGraph;
    ///
    /// let mut graph = ParentGraph::new();
    /// graph.add_node(1u64, None);
    /// graph.add_node(2, Some(1));
    /// graph.add_node(3, Some(2));
    ///
    /// assert_eq!(graph.chain_to_root(3).unwrap(), vec![3, 2, 1]);
    /// ```
    pub fn chain_to_root(&self, start: K) -> Result<Vec<K>, ChainError<K>> {
        let mut chain = vec![start];
        let mut current = start;

        while let Some(&parent) = self.parents.get(&current) {
            if !self.nodes.contains(&parent) {
                return Err(ChainError::Dangling {
                    node: current,
                    parent,
                });
            }
            if chain.len() > self.nodes.len() {
                return Err(ChainError::Cycle(start));
            }
            chain.push(parent);
            current = parent;
        }

        Ok(chain)
    }

    /// Check if the graph contains cycles.
    ///
    /// Returns `Some(node)` if a cycle is reachable from that node. Nodes are
    /// visited in key order, so the result is deterministic.
    pub fn find_cycle(&self) -> Option<K> {
        let mut visited = HashSet::new();
        let mut path = HashSet::new();

        for node in &self.nodes {
            if self.has_cycle_from(*node, &mut visited, &mut path) {
                return Some(*node);
            }
        }
        None
    }

    fn has_cycle_from(&self, node: K, visited: &mut HashSet<K>, path: &mut HashSet<K>) -> bool {
        if path.contains(&node) {
            return true;
        }
        if visited.contains(&node) {
            return false;
        }

        visited.insert(node);
        path.insert(node);

        if let Some(parent) = self.parents.get(&node) {
            if self.has_cycle_from(*parent, visited, path) {
                return true;
            }
        }

        path.remove(&node);
        false
    }

    /// Get all dangling parent pointers as `(node, missing_parent)` pairs.
    pub fn dangling(&self) -> Vec<(K, K)> {
        let mut out: Vec<(K, K)> = self
            .parents
            .iter()
            .filter(|(_, parent)| !self.nodes.contains(parent))
            .map(|(node, parent)| (*node, *parent))
            .collect();
        out.sort();
        out
    }

    /// Get all descendants of a node (children, grandchildren, etc.).
    ///
    /// Uses breadth-first traversal over the children cache.
    pub fn descendants(&self, node: &K) -> BTreeSet<K> {
        let mut result = BTreeSet::new();
        let mut queue: VecDeque<K> = self.children(node).copied().collect();

        while let Some(current) = queue.pop_front() {
            if result.insert(current) {
                queue.extend(self.children(&current).copied());
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(ids: &[u64]) -> ParentGraph<u64> {
        let mut graph = ParentGraph::new();
        graph.add_node(ids[0], None);
        for pair in ids.windows(2) {
            graph.add_node(pair[1], Some(pair[0]));
        }
        graph
    }

    #[test]
    fn empty_graph_has_no_cycles() {
        let graph: ParentGraph<u64> = ParentGraph::new();
        assert!(graph.find_cycle().is_none());
        assert!(graph.is_empty());
    }

    #[test]
    fn linear_chain_has_no_cycles() {
        let graph = chain(&[1, 2, 3]);
        assert!(graph.find_cycle().is_none());
        assert_eq!(graph.parent(&3), Some(&2));
        assert_eq!(graph.roots().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn chain_to_root_of_root_is_itself() {
        let graph = chain(&[1, 2]);
        assert_eq!(graph.chain_to_root(1).unwrap(), vec![1]);
    }

    #[test]
    fn chain_to_root_detects_cycle() {
        let mut graph = ParentGraph::new();
        graph.add_node(1u64, Some(3));
        graph.add_node(2, Some(1));
        graph.add_node(3, Some(2));

        assert_eq!(graph.chain_to_root(2), Err(ChainError::Cycle(2)));
        assert!(graph.find_cycle().is_some());
    }

    #[test]
    fn chain_to_root_detects_self_loop() {
        let mut graph = ParentGraph::new();
        graph.add_node(5u64, Some(5));
        assert_eq!(graph.chain_to_root(5), Err(ChainError::Cycle(5)));
        assert_eq!(graph.find_cycle(), Some(5));
    }

    #[test]
    fn chain_to_root_detects_dangling() {
        let mut graph = ParentGraph::new();
        graph.add_node(1u64, None);
        graph.add_node(2, Some(9));

        assert_eq!(
            graph.chain_to_root(2),
            Err(ChainError::Dangling { node: 2, parent: 9 })
        );
        assert_eq!(graph.dangling(), vec![(2, 9)]);
    }

    #[test]
    fn tail_into_cycle_is_a_cycle() {
        // 4 -> 1 -> 2 -> 1
        let mut graph = ParentGraph::new();
        graph.add_node(1u64, Some(2));
        graph.add_node(2, Some(1));
        graph.add_node(4, Some(1));
        assert_eq!(graph.chain_to_root(4), Err(ChainError::Cycle(4)));
    }

    #[test]
    fn descendants_includes_all_children() {
        let graph = chain(&[1, 2, 3, 4]);
        let d = graph.descendants(&1);
        assert_eq!(d.into_iter().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert!(graph.descendants(&4).is_empty());
    }

    #[test]
    fn descendants_handles_wide_tree() {
        let mut graph = ParentGraph::new();
        graph.add_node(0u64, None);
        for i in 1..=5 {
            graph.add_node(i, Some(0));
        }
        assert_eq!(graph.descendants(&0).len(), 5);
        assert_eq!(graph.children(&0).count(), 5);
    }
}
