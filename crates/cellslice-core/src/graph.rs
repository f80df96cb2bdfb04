//! Directed graph with Kahn's-algorithm topological sort (spec.md S4.B).

use indexmap::{IndexMap, IndexSet};
use std::hash::Hash;

/// A directed graph over nodes of type `N`, keyed by a caller-supplied
/// identity function `id_fn: N -> K`. Nodes are added implicitly by
/// `add_edge`; `add_node` exists for isolated nodes with no edges yet.
pub struct Graph<N, K, F>
where
    K: Eq + Hash + Clone,
    F: Fn(&N) -> K,
{
    id_fn: F,
    nodes: IndexMap<K, N>,
    /// Adjacency as id -> set of successor ids.
    edges: IndexMap<K, IndexSet<K>>,
}

impl<N, K, F> Graph<N, K, F>
where
    N: Clone,
    K: Eq + Hash + Clone,
    F: Fn(&N) -> K,
{
    pub fn new(id_fn: F) -> Self {
        Self { id_fn, nodes: IndexMap::new(), edges: IndexMap::new() }
    }

    pub fn add_node(&mut self, node: N) -> K {
        let id = (self.id_fn)(&node);
        self.nodes.entry(id.clone()).or_insert(node);
        self.edges.entry(id.clone()).or_default();
        id
    }

    pub fn add_edge(&mut self, from: N, to: N) {
        let from_id = self.add_node(from);
        let to_id = self.add_node(to);
        self.edges.entry(from_id).or_default().insert(to_id);
    }

    pub fn nodes(&self) -> impl Iterator<Item = &N> {
        self.nodes.values()
    }

    pub fn successors(&self, id: &K) -> impl Iterator<Item = &N> {
        self.edges.get(id).into_iter().flat_map(move |s| s.iter().filter_map(|k| self.nodes.get(k)))
    }

    pub fn predecessors(&self, id: &K) -> Vec<&N> {
        self.edges
            .iter()
            .filter(|(_, succs)| succs.contains(id))
            .filter_map(|(from, _)| self.nodes.get(from))
            .collect()
    }

    /// A linear order consistent with edges when the graph is a DAG; an
    /// unspecified but total order over present nodes otherwise (spec.md
    /// S4.B). Implemented with Kahn's algorithm over a working copy of the
    /// adjacency, so cyclic leftovers are simply appended in discovery order.
    pub fn topo_sort(&self) -> Vec<N> {
        let mut in_degree: IndexMap<K, usize> = self.nodes.keys().map(|k| (k.clone(), 0)).collect();
        for succs in self.edges.values() {
            for to in succs {
                if let Some(d) = in_degree.get_mut(to) {
                    *d += 1;
                }
            }
        }

        let mut ready: Vec<K> = in_degree.iter().filter(|(_, d)| **d == 0).map(|(k, _)| k.clone()).collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut visited: IndexSet<K> = IndexSet::new();

        while let Some(id) = ready.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            if let Some(node) = self.nodes.get(&id) {
                order.push(node.clone());
            }
            if let Some(succs) = self.edges.get(&id) {
                for to in succs {
                    if let Some(d) = in_degree.get_mut(to) {
                        *d = d.saturating_sub(1);
                        if *d == 0 {
                            ready.push(to.clone());
                        }
                    }
                }
            }
        }

        // Cycle leftovers: nodes never reached zero in-degree. Append in
        // insertion order so the result is still total over all nodes.
        for (id, node) in &self.nodes {
            if !visited.contains(id) {
                order.push(node.clone());
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topo_sort_respects_edges() {
        let mut g: Graph<i32, i32, _> = Graph::new(|n| *n);
        g.add_edge(1, 2);
        g.add_edge(2, 3);
        g.add_node(4);
        let order = g.topo_sort();
        let pos = |n: i32| order.iter().position(|x| *x == n).unwrap();
        assert!(pos(1) < pos(2));
        assert!(pos(2) < pos(3));
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn topo_sort_handles_cycles_totally() {
        let mut g: Graph<i32, i32, _> = Graph::new(|n| *n);
        g.add_edge(1, 2);
        g.add_edge(2, 1);
        let order = g.topo_sort();
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn predecessors_and_successors() {
        let mut g: Graph<i32, i32, _> = Graph::new(|n| *n);
        g.add_edge(1, 2);
        g.add_edge(3, 2);
        let preds: Vec<i32> = g.predecessors(&2).into_iter().copied().collect();
        assert_eq!(preds.len(), 2);
        let succs: Vec<i32> = g.successors(&1).copied().collect();
        assert_eq!(succs, vec![2]);
    }
}
