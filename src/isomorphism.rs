//! Enumeration of attribute-preserving bond graph isomorphisms

use std::collections::VecDeque;
use itertools::Itertools;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;

use crate::permutation::Permutation;
use crate::strong::bijection::Bijection;
use crate::strong::Atom;
use crate::system::{AtomAttributes, BondGraph};

/// Product of combined isomorphism counts above which a pair sweep is considered expensive
pub const COMBINATORIAL_WARNING_THRESHOLD: usize = 4096;

/// Mapping of one system's atom indices onto another's
pub type IndexMapping = Bijection<Atom, Atom>;

/// Whether a graph compared against itself yields its automorphisms
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SelfComparison {
    /// Internal symmetries, including the identity
    Include,
    /// Deduplication of distinct molecules only, comparing a graph with itself yields nothing
    Exclude,
}

/// Dense adjacency lookup
struct Adjacency {
    n: usize,
    edges: Vec<bool>,
}

impl Adjacency {
    fn new(graph: &BondGraph) -> Adjacency {
        let n = graph.node_count();
        let mut edges = vec![false; n * n];
        for edge in graph.edge_references() {
            let (i, j) = (edge.source().index(), edge.target().index());
            edges[i * n + j] = true;
            edges[j * n + i] = true;
        }
        Adjacency {n, edges}
    }

    fn contains(&self, i: usize, j: usize) -> bool {
        self.edges[i * self.n + j]
    }
}

fn degree(graph: &BondGraph, i: usize) -> usize {
    graph.neighbors(NodeIndex::new(i)).count()
}

fn invariants(graph: &BondGraph) -> Vec<(AtomAttributes, usize)> {
    graph.node_indices()
        .map(|i| (graph[i], degree(graph, i.index())))
        .sorted()
        .collect()
}

/// Breadth-first vertex order, so that each vertex after a component's first has a mapped neighbour
fn connectivity_order(graph: &BondGraph) -> Vec<usize> {
    let n = graph.node_count();
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    for root in 0..n {
        if visited[root] {
            continue;
        }

        visited[root] = true;
        let mut queue = VecDeque::from([root]);
        while let Some(i) = queue.pop_front() {
            order.push(i);
            let neighbours = graph.neighbors(NodeIndex::new(i))
                .map(|v| v.index())
                .sorted();
            for j in neighbours {
                if !visited[j] {
                    visited[j] = true;
                    queue.push_back(j);
                }
            }
        }
    }
    order
}

struct Search<'a> {
    g1: &'a BondGraph,
    g2: &'a BondGraph,
    a1: Adjacency,
    a2: Adjacency,
    degrees1: Vec<usize>,
    degrees2: Vec<usize>,
    order: Vec<usize>,
    mapping: Vec<Option<usize>>,
    used: Vec<bool>,
    found: Vec<IndexMapping>,
}

impl<'a> Search<'a> {
    fn admissible(&self, depth: usize, candidate: usize) -> bool {
        let u = self.order[depth];
        if self.used[candidate]
            || self.g1[NodeIndex::new(u)] != self.g2[NodeIndex::new(candidate)]
            || self.degrees1[u] != self.degrees2[candidate]
        {
            return false;
        }

        self.order[..depth].iter().all(|&w| {
            self.mapping[w].map_or(false, |image| self.a1.contains(u, w) == self.a2.contains(candidate, image))
        })
    }

    fn extend(&mut self, depth: usize) {
        if depth == self.order.len() {
            let sigma: Vec<usize> = self.mapping.iter().flatten().copied().collect();
            if let Ok(p) = Permutation::try_from(sigma) {
                self.found.push(IndexMapping::new(p));
            }
            return;
        }

        let u = self.order[depth];
        for candidate in 0..self.g2.node_count() {
            if self.admissible(depth, candidate) {
                self.mapping[u] = Some(candidate);
                self.used[candidate] = true;
                self.extend(depth + 1);
                self.used[candidate] = false;
                self.mapping[u] = None;
            }
        }
    }
}

/// All mappings of `g1`'s vertices onto `g2`'s preserving attributes and bonds
///
/// Mappings are ordered lexicographically in search order. An empty result
/// means the graphs are not isomorphic (or `g1` and `g2` are the same graph
/// and `self_comparison` excludes that case).
pub fn isomorphisms(g1: &BondGraph, g2: &BondGraph, self_comparison: SelfComparison) -> Vec<IndexMapping> {
    if self_comparison == SelfComparison::Exclude && std::ptr::eq(g1, g2) {
        return Vec::new();
    }

    if g1.node_count() != g2.node_count()
        || g1.edge_count() != g2.edge_count()
        || invariants(g1) != invariants(g2)
    {
        return Vec::new();
    }

    let n = g1.node_count();
    let mut search = Search {
        g1,
        g2,
        a1: Adjacency::new(g1),
        a2: Adjacency::new(g2),
        degrees1: (0..n).map(|i| degree(g1, i)).collect(),
        degrees2: (0..n).map(|i| degree(g2, i)).collect(),
        order: connectivity_order(g1),
        mapping: vec![None; n],
        used: vec![false; n],
        found: Vec::new(),
    };
    search.extend(0);
    search.found
}

/// Automorphisms of a single graph, identity included
pub fn automorphisms(graph: &BondGraph) -> Vec<IndexMapping> {
    isomorphisms(graph, graph, SelfComparison::Include)
}

/// Number of candidate permutations arising from combining per-fragment isomorphism counts
pub fn combinatorial_load(counts: &[usize]) -> usize {
    counts.iter().fold(1usize, |acc, &c| acc.saturating_mul(c))
}

/// Warn about expensive combinations, returning the load
pub fn check_combinatorial_load(label: &str, counts: &[usize]) -> usize {
    let load = combinatorial_load(counts);
    if load > COMBINATORIAL_WARNING_THRESHOLD {
        log::warn!(
            "{}: {} combined isomorphisms ({}) exceed {}, comparisons may be slow",
            label,
            load,
            counts.iter().join(" x "),
            COMBINATORIAL_WARNING_THRESHOLD
        );
    }
    load
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::isomorphism::*;
    use crate::system::tests::element;

    fn attributes(symbol: &str, hydrogens: usize) -> AtomAttributes {
        AtomAttributes {element: element(symbol), hydrogens}
    }

    pub fn graph(nodes: &[(&str, usize)], edges: &[(usize, usize)]) -> BondGraph {
        let mut graph = BondGraph::default();
        for &(symbol, h) in nodes {
            graph.add_node(attributes(symbol, h));
        }
        for &(i, j) in edges {
            graph.add_edge(NodeIndex::new(i), NodeIndex::new(j), ());
        }
        graph
    }

    fn cyclopropane() -> BondGraph {
        graph(&[("C", 2), ("C", 2), ("C", 2)], &[(0, 1), (1, 2), (2, 0)])
    }

    fn is_valid(g1: &BondGraph, g2: &BondGraph, mapping: &IndexMapping) -> bool {
        let p = &mapping.permutation;
        let attributes_match = (0..g1.node_count())
            .all(|i| g1[NodeIndex::new(i)] == g2[NodeIndex::new(p[i])]);
        let edges_match = g1.edge_references().all(|e| {
            g2.find_edge(NodeIndex::new(p[e.source().index()]), NodeIndex::new(p[e.target().index()])).is_some()
        });
        attributes_match && edges_match
    }

    #[test]
    fn reflexivity() {
        let ring = cyclopropane();
        let symmetries = automorphisms(&ring);
        assert_eq!(symmetries.len(), 6);
        assert!(symmetries.iter().any(|m| m.is_identity()));
        assert!(symmetries.iter().all(|m| is_valid(&ring, &ring, m)));
        assert!(symmetries.iter().all_unique());

        assert!(isomorphisms(&ring, &ring, SelfComparison::Exclude).is_empty());
        let copy = ring.clone();
        assert_eq!(isomorphisms(&ring, &copy, SelfComparison::Exclude).len(), 6);
    }

    #[test]
    fn attributes_restrict_mappings() {
        // Ethanol heavy atoms: CH3-CH2-OH
        let ethanol = graph(&[("C", 3), ("C", 2), ("O", 1)], &[(0, 1), (1, 2)]);
        let reordered = graph(&[("O", 1), ("C", 3), ("C", 2)], &[(2, 0), (1, 2)]);
        let mappings = isomorphisms(&ethanol, &reordered, SelfComparison::Include);
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].permutation.sigma(), &[1, 2, 0]);

        let methyl_ether = graph(&[("C", 3), ("O", 0), ("C", 3)], &[(0, 1), (1, 2)]);
        assert!(isomorphisms(&ethanol, &methyl_ether, SelfComparison::Include).is_empty());
    }

    #[test]
    fn non_edges_are_respected() {
        // Same degree sequences, different connectivity
        let hexagon = graph(&[("C", 1); 6], &[(0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (5, 0)]);
        let triangles = graph(&[("C", 1); 6], &[(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3)]);
        assert!(isomorphisms(&hexagon, &triangles, SelfComparison::Include).is_empty());

        let symmetries = automorphisms(&hexagon);
        assert_eq!(symmetries.len(), 12);
        assert!(symmetries.iter().all(|m| is_valid(&hexagon, &hexagon, m)));
    }

    #[test]
    fn enumeration_order_is_fixed() {
        let ring = cyclopropane();
        let symmetries = automorphisms(&ring);
        assert!(symmetries[0].is_identity());
        assert!(symmetries.iter().tuple_windows().all(|(a, b)| a < b));
        assert_eq!(automorphisms(&ring.clone()), symmetries);
    }

    #[test]
    fn disconnected_and_empty() {
        let pair = graph(&[("O", 2), ("O", 2)], &[]);
        assert_eq!(automorphisms(&pair).len(), 2);
        assert_eq!(automorphisms(&BondGraph::default()).len(), 1);
    }

    #[test]
    fn load() {
        assert_eq!(combinatorial_load(&[]), 1);
        assert_eq!(combinatorial_load(&[6, 2]), 12);
        assert_eq!(check_combinatorial_load("test", &[128, 64]), 8192);
        assert_eq!(combinatorial_load(&[usize::MAX, 2]), usize::MAX);
    }
}
