use color_eyre::eyre::{eyre, Report, Result};
use itertools::Itertools;
use petgraph::graph::UnGraph;
use petgraph::unionfind::UnionFind;
use petgraph::visit::Dfs;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::ops::RangeInclusive;

// ----------------------------------------------------------------------------
// Edge
// ----------------------------------------------------------------------------

/// An undirected, weighted [`Edge`] between two node indices, where `source < target`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
    /// Support between the two nodes. The edge exists at every threshold `<= weight`.
    pub weight: u32,
}

// ----------------------------------------------------------------------------
// Sweep Point
// ----------------------------------------------------------------------------

/// Component counts of a [`ThresholdGraph`] at one threshold.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct SweepPoint {
    pub threshold: u32,
    /// Number of connected components over all nodes.
    pub components: usize,
    /// Number of connected components containing at least one marked node.
    pub marked_components: usize,
}

// ----------------------------------------------------------------------------
// Threshold Graph
// ----------------------------------------------------------------------------

/// A [`ThresholdGraph`] connects two nodes (`N`) when their edge weight is at least a threshold.
///
/// The edges are bucketed once, sorted by descending weight. Every threshold of a range can
/// then be evaluated in one sweep from the highest threshold to the lowest, where lowering the
/// threshold only ever adds edges.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ThresholdGraph<N> {
    /// Nodes, in their canonical order.
    pub nodes: Vec<N>,
    /// Edges with a positive weight, sorted by descending weight.
    edges: Vec<Edge>,
}

impl<N> Default for ThresholdGraph<N> {
    fn default() -> Self {
        ThresholdGraph { nodes: Vec::new(), edges: Vec::new() }
    }
}

impl<N> ThresholdGraph<N>
where
    N: Clone + Debug,
{
    /// Returns a [`ThresholdGraph`] with the weight of every unordered node pair taken from a function.
    ///
    /// ## Arguments
    ///
    /// - `nodes` - Nodes (`N`) in their canonical order.
    /// - `weight` - Weight between the nodes at indices `i` and `j`, called once per pair with `i < j`.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use cgcd_graph::ThresholdGraph;
    /// let weights = [[3, 3, 0], [3, 3, 1], [0, 1, 3]];
    /// let graph = ThresholdGraph::from_fn(vec!["A", "B", "C"], |i, j| weights[i][j]);
    /// assert_eq!(graph.node_count(), 3);
    /// assert_eq!(graph.edge_count(), 2);
    /// assert_eq!(graph.max_weight(), Some(3));
    /// ```
    pub fn from_fn<F>(nodes: Vec<N>, weight: F) -> Self
    where
        F: Fn(usize, usize) -> u32,
    {
        let mut edges = (0..nodes.len())
            .tuple_combinations()
            .filter_map(|(source, target)| {
                let weight = weight(source, target);
                (weight > 0).then_some(Edge { source, target, weight })
            })
            .collect_vec();

        // descending weight, ties kept in node order so the sweep is deterministic
        edges.sort_by(|a, b| {
            b.weight.cmp(&a.weight).then(a.source.cmp(&b.source)).then(a.target.cmp(&b.target))
        });

        ThresholdGraph { nodes, edges }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Returns the edges, sorted by descending weight.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Returns the largest edge weight, or [`None`] if there are no edges.
    pub fn max_weight(&self) -> Option<u32> {
        self.edges.first().map(|e| e.weight)
    }

    /// Returns the component counts at every threshold in a range, in ascending threshold order.
    ///
    /// Thresholds are visited from high to low. Edges are merged into a union-find as the
    /// threshold drops to their weight, so each edge is visited once for the whole range.
    ///
    /// ## Arguments
    ///
    /// - `thresholds` - Inclusive range of thresholds, the lowest must be at least 1.
    /// - `marked` - Node indices whose components are counted in [`SweepPoint::marked_components`].
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use cgcd_graph::ThresholdGraph;
    /// let weights = [[3, 3, 0], [3, 3, 1], [0, 1, 3]];
    /// let graph = ThresholdGraph::from_fn(vec!["A", "B", "C"], |i, j| weights[i][j]);
    ///
    /// let sweep = graph.sweep(1..=3, &[0, 1])?;
    /// let components: Vec<_> = sweep.iter().map(|p| p.components).collect();
    /// let marked: Vec<_> = sweep.iter().map(|p| p.marked_components).collect();
    /// assert_eq!(components, [1, 2, 2]);
    /// assert_eq!(marked, [1, 1, 1]);
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    ///
    /// A threshold of 0 would connect every node, and is rejected.
    ///
    /// ```rust
    /// # use cgcd_graph::ThresholdGraph;
    /// let graph = ThresholdGraph::from_fn(vec!["A", "B"], |_, _| 1);
    /// assert!(graph.sweep(0..=1, &[]).is_err());
    /// ```
    pub fn sweep(
        &self,
        thresholds: RangeInclusive<u32>,
        marked: &[usize],
    ) -> Result<Vec<SweepPoint>, Report> {
        let (min, max) = (*thresholds.start(), *thresholds.end());
        check_threshold(min)?;
        if min > max {
            return Err(eyre!("Threshold range {min}..={max} is empty."));
        }

        let n = self.nodes.len();
        let mut is_marked = vec![false; n];
        for i in marked {
            let flag = is_marked
                .get_mut(*i)
                .ok_or_else(|| eyre!("Marked node {i} is out of bounds for {n} nodes."))?;
            *flag = true;
        }

        let mut union_find: UnionFind<usize> = UnionFind::new(n);
        let mut components = n;
        let mut marked_components = is_marked.iter().filter(|m| **m).count();

        let mut edges = self.edges.iter().peekable();
        let mut points = Vec::with_capacity((max - min) as usize + 1);

        for threshold in (min..=max).rev() {
            // add every edge that becomes present at this threshold
            while let Some(edge) = edges.next_if(|e| e.weight >= threshold) {
                let a = union_find.find_mut(edge.source);
                let b = union_find.find_mut(edge.target);
                if a == b {
                    continue;
                }
                union_find.union(a, b);
                let root = union_find.find_mut(a);

                components -= 1;
                if is_marked[a] && is_marked[b] {
                    marked_components -= 1;
                }
                is_marked[root] = is_marked[a] || is_marked[b];
            }

            points.push(SweepPoint { threshold, components, marked_components });
        }

        points.reverse();
        Ok(points)
    }

    /// Returns an undirected [`petgraph`] graph, with an edge for every pair whose weight is at
    /// least the threshold.
    ///
    /// Node indices in the returned graph match the indices in [`ThresholdGraph::nodes`].
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use cgcd_graph::ThresholdGraph;
    /// let weights = [[3, 3, 0], [3, 3, 1], [0, 1, 3]];
    /// let graph = ThresholdGraph::from_fn(vec!["A", "B", "C"], |i, j| weights[i][j]);
    /// assert_eq!(graph.graph(1)?.edge_count(), 2);
    /// assert_eq!(graph.graph(2)?.edge_count(), 1);
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn graph(&self, threshold: u32) -> Result<UnGraph<N, u32>, Report> {
        check_threshold(threshold)?;

        let mut graph = UnGraph::with_capacity(self.nodes.len(), 0);
        let indices = self.nodes.iter().map(|node| graph.add_node(node.clone())).collect_vec();
        self.edges.iter().take_while(|e| e.weight >= threshold).for_each(|e| {
            graph.add_edge(indices[e.source], indices[e.target], e.weight);
        });

        Ok(graph)
    }

    /// Returns the full membership (node indices) of every connected component at a threshold.
    ///
    /// Components are enumerated in the order of their first node, and members within a component
    /// are in node order, so the enumeration is stable across runs.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use cgcd_graph::ThresholdGraph;
    /// let weights = [[3, 0, 2], [0, 3, 0], [2, 0, 3]];
    /// let graph = ThresholdGraph::from_fn(vec!["A", "B", "C"], |i, j| weights[i][j]);
    /// assert_eq!(graph.components(2)?, [vec![0, 2], vec![1]]);
    /// assert_eq!(graph.components(3)?, [vec![0], vec![1], vec![2]]);
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn components(&self, threshold: u32) -> Result<Vec<Vec<usize>>, Report> {
        let graph = self.graph(threshold)?;
        let mut seen = vec![false; graph.node_count()];
        let mut components = Vec::new();

        for start in graph.node_indices() {
            if seen[start.index()] {
                continue;
            }
            let mut members = Vec::new();
            let mut dfs = Dfs::new(&graph, start);
            while let Some(node_index) = dfs.next(&graph) {
                seen[node_index.index()] = true;
                members.push(node_index.index());
            }
            members.sort_unstable();
            components.push(members);
        }

        Ok(components)
    }
}

/// Thresholds must be at least 1, a threshold of 0 connects every pair.
fn check_threshold(threshold: u32) -> Result<(), Report> {
    match threshold {
        0 => Err(eyre!("Threshold 0 is invalid, thresholds must be at least 1.")),
        _ => Ok(()),
    }
}
