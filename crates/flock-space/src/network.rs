//! Graph-backed space: agents sit on nodes.

use std::collections::VecDeque;

use flock_core::{AgentId, ConfigError, NodeId, RandomSource};
use ordered_float::OrderedFloat;
use petgraph::algo::dijkstra;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::{Bfs, EdgeRef};

use crate::error::SpaceError;
use crate::occupancy::{Capacity, Occupancy};
use crate::space::{DiscreteSpace, Membership, Space};

/// Neighborhood query for [`Network`].
///
/// By default the radius counts hops (breadth-first closure). With
/// `weighted` set it is a threshold on the summed edge weights along a
/// shortest path (Dijkstra).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NetworkQuery {
    /// Hop count, or weight threshold when `weighted`.
    pub radius: f64,
    /// Interpret `radius` as a weighted distance.
    pub weighted: bool,
    /// Whether the start node is part of the result.
    pub include_center: bool,
}

impl NetworkQuery {
    /// Nodes within `hops` edges.
    pub fn hops(hops: u32) -> Self {
        Self {
            radius: hops as f64,
            weighted: false,
            include_center: false,
        }
    }

    /// Nodes within weighted distance `radius`.
    pub fn weighted(radius: f64) -> Self {
        Self {
            radius,
            weighted: true,
            include_center: false,
        }
    }

    /// Same query with the start node included.
    pub fn with_center(mut self) -> Self {
        self.include_center = true;
        self
    }
}

impl Default for NetworkQuery {
    fn default() -> Self {
        Self::hops(1)
    }
}

/// Edge storage. Undirected graphs list each incident edge once per node.
#[derive(Clone, Debug)]
enum Topology {
    Directed(DiGraph<(), f64>),
    Undirected(UnGraph<(), f64>),
}

macro_rules! on_graph {
    ($topology:expr, $g:ident => $body:expr) => {
        match $topology {
            Topology::Directed($g) => $body,
            Topology::Undirected($g) => $body,
        }
    };
}

impl Topology {
    fn with_capacity(directed: bool, nodes: u32) -> Self {
        if directed {
            Self::Directed(DiGraph::with_capacity(nodes as usize, 0))
        } else {
            Self::Undirected(UnGraph::with_capacity(nodes as usize, 0))
        }
    }
}

/// A directed or undirected graph whose nodes are cells.
///
/// Topology is frozen while a tick is in progress: adding nodes or
/// adding and removing edges between `begin_tick` and `end_tick` fails
/// with `MutationDuringTick`. Duplicate edges are ignored.
#[derive(Clone, Debug)]
pub struct Network {
    graph: Topology,
    allow_self_loops: bool,
    occupancy: Occupancy,
    frozen: bool,
}

/// Builder for [`Network`].
#[derive(Clone, Debug, Default)]
pub struct NetworkBuilder {
    nodes: u32,
    directed: bool,
    allow_self_loops: bool,
    capacity: Capacity,
}

impl NetworkBuilder {
    /// Number of initial nodes.
    pub fn nodes(mut self, n: u32) -> Self {
        self.nodes = n;
        self
    }

    /// Edges have a direction.
    pub fn directed(mut self, directed: bool) -> Self {
        self.directed = directed;
        self
    }

    /// Permit edges from a node to itself.
    pub fn allow_self_loops(mut self, allow: bool) -> Self {
        self.allow_self_loops = allow;
        self
    }

    /// Agents per node (default one).
    pub fn capacity(mut self, capacity: Capacity) -> Self {
        self.capacity = capacity;
        self
    }

    /// Build the network.
    ///
    /// # Errors
    ///
    /// `EmptySpace` for `Bounded(0)` capacity.
    pub fn build(self) -> Result<Network, SpaceError> {
        if self.capacity == Capacity::Bounded(0) {
            return Err(SpaceError::EmptySpace);
        }
        let mut net = Network {
            graph: Topology::with_capacity(self.directed, self.nodes),
            allow_self_loops: self.allow_self_loops,
            occupancy: Occupancy::new(0, self.capacity),
            frozen: false,
        };
        for _ in 0..self.nodes {
            net.push_node();
        }
        Ok(net)
    }
}

impl Network {
    /// Start configuring a network. Defaults: undirected, no self-loops,
    /// single occupancy, no nodes.
    pub fn builder() -> NetworkBuilder {
        NetworkBuilder::default()
    }

    /// Undirected single-occupancy network with `nodes` nodes and no edges.
    pub fn new(nodes: u32) -> Self {
        let mut net = Self {
            graph: Topology::with_capacity(false, nodes),
            allow_self_loops: false,
            occupancy: Occupancy::new(0, Capacity::Single),
            frozen: false,
        };
        for _ in 0..nodes {
            net.push_node();
        }
        net
    }

    /// Undirected G(n, p) random graph drawn from `rng`.
    ///
    /// Each of the `n(n-1)/2` node pairs is joined independently with
    /// probability `p`, visiting pairs in `(i, j)`, `i < j` order.
    pub fn erdos_renyi(n: u32, p: f64, rng: &mut RandomSource) -> Result<Self, SpaceError> {
        if !(0.0..=1.0).contains(&p) {
            return Err(ConfigError::invalid("p", format!("must be in [0, 1], got {p}")).into());
        }
        let mut net = Self::new(n);
        for i in 0..n {
            for j in (i + 1)..n {
                if rng.bernoulli(p) {
                    net.add_edge(NodeId(i), NodeId(j))?;
                }
            }
        }
        Ok(net)
    }

    fn push_node(&mut self) -> NodeId {
        let ix = on_graph!(&mut self.graph, g => g.add_node(()));
        self.occupancy.push_cell();
        NodeId(ix.index() as u32)
    }

    fn check_mutable(&self) -> Result<(), SpaceError> {
        if self.frozen {
            Err(SpaceError::MutationDuringTick {
                what: "network topology",
            })
        } else {
            Ok(())
        }
    }

    fn node_index(&self, node: NodeId) -> Result<NodeIndex, SpaceError> {
        if node.index() < self.node_count() {
            Ok(NodeIndex::new(node.index()))
        } else {
            Err(SpaceError::UnknownNode { node })
        }
    }

    /// Append a node.
    pub fn add_node(&mut self) -> Result<NodeId, SpaceError> {
        self.check_mutable()?;
        Ok(self.push_node())
    }

    /// Join two nodes with a unit-weight edge.
    pub fn add_edge(&mut self, a: NodeId, b: NodeId) -> Result<(), SpaceError> {
        self.add_weighted_edge(a, b, 1.0)
    }

    /// Join two nodes with a weighted edge. Re-adding an existing edge
    /// updates its weight.
    ///
    /// # Errors
    ///
    /// `MutationDuringTick`, `UnknownNode`, `SelfLoop` (unless allowed)
    /// or `InvalidWeight` for a negative or non-finite weight.
    pub fn add_weighted_edge(&mut self, a: NodeId, b: NodeId, weight: f64) -> Result<(), SpaceError> {
        self.check_mutable()?;
        let (ia, ib) = (self.node_index(a)?, self.node_index(b)?);
        if a == b && !self.allow_self_loops {
            return Err(SpaceError::SelfLoop { node: a });
        }
        if !weight.is_finite() || weight < 0.0 {
            return Err(SpaceError::InvalidWeight { weight });
        }
        match self.find_edge(ia, ib) {
            Some(e) => on_graph!(&mut self.graph, g => g[e] = weight),
            None => {
                on_graph!(&mut self.graph, g => g.add_edge(ia, ib, weight));
            }
        }
        Ok(())
    }

    /// Remove the edge between two nodes. Returns whether one existed.
    pub fn remove_edge(&mut self, a: NodeId, b: NodeId) -> Result<bool, SpaceError> {
        self.check_mutable()?;
        let (ia, ib) = (self.node_index(a)?, self.node_index(b)?);
        Ok(match self.find_edge(ia, ib) {
            Some(e) => on_graph!(&mut self.graph, g => g.remove_edge(e).is_some()),
            None => false,
        })
    }

    fn find_edge(&self, a: NodeIndex, b: NodeIndex) -> Option<EdgeIndex> {
        on_graph!(&self.graph, g => g.find_edge(a, b))
    }

    /// Weight of the edge between two nodes, if any.
    pub fn edge_weight(&self, a: NodeId, b: NodeId) -> Option<f64> {
        let (ia, ib) = (self.node_index(a).ok()?, self.node_index(b).ok()?);
        self.find_edge(ia, ib).map(|e| on_graph!(&self.graph, g => g[e]))
    }

    /// Whether edges have a direction.
    pub fn is_directed(&self) -> bool {
        matches!(self.graph, Topology::Directed(_))
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        on_graph!(&self.graph, g => g.node_count())
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        on_graph!(&self.graph, g => g.edge_count())
    }

    /// Every node id in allocation order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> {
        (0..self.node_count() as u32).map(NodeId)
    }

    /// Nodes one edge away (successors when directed), in edge order.
    pub fn adjacent(&self, node: NodeId) -> Result<Vec<NodeId>, SpaceError> {
        let ix = self.node_index(node)?;
        let mut out: Vec<NodeId> = Vec::new();
        for (n, _) in self.edges_from(ix) {
            let id = NodeId(n.index() as u32);
            if !out.contains(&id) {
                out.push(id);
            }
        }
        Ok(out)
    }

    /// Number of distinct adjacent nodes.
    pub fn degree(&self, node: NodeId) -> Result<usize, SpaceError> {
        Ok(self.adjacent(node)?.len())
    }

    /// Outgoing (or incident, when undirected) edges in petgraph's edge order.
    fn edges_from(&self, n: NodeIndex) -> Vec<(NodeIndex, f64)> {
        on_graph!(&self.graph, g => g.edges(n).map(|e| (e.target(), *e.weight())).collect())
    }

    /// Nodes within `hops` edges in breadth-first discovery order.
    fn bfs(&self, start: NodeIndex, hops: u32) -> Vec<NodeIndex> {
        if hops as usize >= self.node_count() {
            return self.reachable(start);
        }
        let mut seen = vec![false; self.node_count()];
        let mut order = vec![start];
        let mut queue = VecDeque::from([(start, 0u32)]);
        seen[start.index()] = true;
        while let Some((n, d)) = queue.pop_front() {
            if d >= hops {
                continue;
            }
            for (m, _) in self.edges_from(n) {
                if !seen[m.index()] {
                    seen[m.index()] = true;
                    order.push(m);
                    queue.push_back((m, d + 1));
                }
            }
        }
        order
    }

    /// Every node reachable from `start`, start first.
    fn reachable(&self, start: NodeIndex) -> Vec<NodeIndex> {
        on_graph!(&self.graph, g => {
            let mut bfs = Bfs::new(g, start);
            let mut order = Vec::new();
            while let Some(n) = bfs.next(g) {
                order.push(n);
            }
            order
        })
    }

    /// Nodes whose shortest weighted distance is at most `radius`,
    /// nearest first, ties by node index.
    fn within_distance(&self, start: NodeIndex, radius: f64) -> Vec<NodeIndex> {
        let dist = on_graph!(&self.graph, g => dijkstra(g, start, None, |e| *e.weight()));
        let mut reached: Vec<(OrderedFloat<f64>, NodeIndex)> = dist
            .into_iter()
            .filter(|&(_, d)| d <= radius)
            .map(|(n, d)| (OrderedFloat(d), n))
            .collect();
        reached.sort_unstable();
        reached.into_iter().map(|(_, n)| n).collect()
    }

    /// Shortest weighted distance between two nodes, or `None` when
    /// `to` is unreachable.
    pub fn distance(&self, from: NodeId, to: NodeId) -> Result<Option<f64>, SpaceError> {
        let (a, b) = (self.node_index(from)?, self.node_index(to)?);
        let dist = on_graph!(&self.graph, g => dijkstra(g, a, Some(b), |e| *e.weight()));
        Ok(dist.get(&b).copied())
    }
}

impl Membership for Network {
    fn remove(&mut self, agent: AgentId) -> bool {
        self.occupancy.remove(agent)
    }

    fn contains(&self, agent: AgentId) -> bool {
        self.occupancy.index_of(agent).is_some()
    }

    fn agent_count(&self) -> usize {
        self.occupancy.len()
    }

    fn begin_tick(&mut self) {
        self.frozen = true;
    }

    fn end_tick(&mut self) {
        self.frozen = false;
    }
}

impl Space for Network {
    type Pos = NodeId;
    type Query = NetworkQuery;

    fn place(&mut self, agent: AgentId, node: NodeId) -> Result<(), SpaceError> {
        self.node_index(node)?;
        self.occupancy.place(agent, node.index(), node)
    }

    fn move_agent(&mut self, agent: AgentId, node: NodeId) -> Result<(), SpaceError> {
        self.node_index(node)?;
        self.occupancy.relocate(agent, node.index(), node)
    }

    fn position(&self, agent: AgentId) -> Option<NodeId> {
        self.occupancy.index_of(agent).map(|i| NodeId(i as u32))
    }

    fn contents(&self, node: NodeId) -> Result<Vec<AgentId>, SpaceError> {
        self.node_index(node)?;
        Ok(self.occupancy.cell(node.index()).to_vec())
    }

    fn is_empty(&self, node: NodeId) -> Result<bool, SpaceError> {
        self.node_index(node)?;
        Ok(self.occupancy.is_empty_cell(node.index()))
    }

    fn neighborhood(&self, node: NodeId, query: &NetworkQuery) -> Result<Vec<NodeId>, SpaceError> {
        let start = self.node_index(node)?;
        if !(query.radius >= 0.0) {
            return Err(SpaceError::InvalidQuery {
                reason: format!("radius must be >= 0, got {}", query.radius),
            });
        }
        let reached = if query.weighted {
            self.within_distance(start, query.radius)
        } else {
            let hops = query.radius.min(u32::MAX as f64) as u32;
            self.bfs(start, hops)
        };
        Ok(reached
            .into_iter()
            .filter(|&n| n != start || query.include_center)
            .map(|n| NodeId(n.index() as u32))
            .collect())
    }

    fn neighbors(&self, node: NodeId, query: &NetworkQuery) -> Result<Vec<AgentId>, SpaceError> {
        Ok(self
            .neighborhood(node, query)?
            .into_iter()
            .flat_map(|n| self.occupancy.cell(n.index()).iter().copied())
            .collect())
    }
}

impl DiscreteSpace for Network {
    fn cell_count(&self) -> usize {
        self.node_count()
    }

    fn cells(&self) -> Vec<NodeId> {
        self.nodes().collect()
    }

    fn has_room(&self, node: NodeId) -> Result<bool, SpaceError> {
        self.node_index(node)?;
        Ok(self.occupancy.has_room(node.index()))
    }

    fn empty_cells(&self) -> Vec<NodeId> {
        let mut nodes: Vec<usize> = self.occupancy.empties().collect();
        nodes.sort_unstable();
        nodes.into_iter().map(|i| NodeId(i as u32)).collect()
    }

    fn random_empty_cell(&self, rng: &mut RandomSource) -> Option<NodeId> {
        self.occupancy.random_empty(rng).map(|i| NodeId(i as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance;

    fn n(i: u32) -> NodeId {
        NodeId(i)
    }

    /// 0 - 1 - 2 - 3, plus isolated 4.
    fn path() -> Network {
        let mut net = Network::new(5);
        for i in 0..3 {
            net.add_edge(n(i), n(i + 1)).unwrap();
        }
        net
    }

    #[test]
    fn compliance_random_graph() {
        compliance::run_full_compliance(
            || Network::erdos_renyi(12, 0.3, &mut RandomSource::new(4)).unwrap(),
            &NetworkQuery::hops(2),
        );
    }

    #[test]
    fn compliance_weighted() {
        compliance::run_full_compliance(
            || {
                let mut net = path();
                net.add_weighted_edge(n(0), n(3), 0.5).unwrap();
                net
            },
            &NetworkQuery::weighted(1.2),
        );
    }

    #[test]
    fn hop_closure() {
        let net = path();
        assert_eq!(net.neighborhood(n(0), &NetworkQuery::hops(1)).unwrap(), vec![n(1)]);
        assert_eq!(
            net.neighborhood(n(0), &NetworkQuery::hops(2)).unwrap(),
            vec![n(1), n(2)]
        );
        let mut around = net
            .neighborhood(n(1), &NetworkQuery::hops(1).with_center())
            .unwrap();
        assert_eq!(around[0], n(1));
        around.sort();
        assert_eq!(around, vec![n(0), n(1), n(2)]);
    }

    #[test]
    fn unbounded_hops_reach_the_component() {
        let net = path();
        assert_eq!(
            net.neighborhood(n(0), &NetworkQuery::hops(100)).unwrap(),
            vec![n(1), n(2), n(3)]
        );
        assert_eq!(net.distance(n(0), n(3)).unwrap(), Some(3.0));
        assert_eq!(net.distance(n(0), n(4)).unwrap(), None);
        assert!(net.distance(n(0), n(9)).is_err());
    }

    #[test]
    fn isolated_node_has_empty_neighborhood() {
        let net = path();
        for r in 1..4 {
            assert!(net.neighborhood(n(4), &NetworkQuery::hops(r)).unwrap().is_empty());
            assert!(net
                .neighborhood(n(4), &NetworkQuery::weighted(r as f64))
                .unwrap()
                .is_empty());
        }
    }

    #[test]
    fn weighted_radius_is_a_threshold() {
        let mut net = Network::new(3);
        net.add_weighted_edge(n(0), n(1), 2.0).unwrap();
        net.add_weighted_edge(n(1), n(2), 0.5).unwrap();
        net.add_weighted_edge(n(0), n(2), 3.0).unwrap();
        assert!(net.neighborhood(n(0), &NetworkQuery::weighted(1.9)).unwrap().is_empty());
        assert_eq!(
            net.neighborhood(n(0), &NetworkQuery::weighted(2.5)).unwrap(),
            vec![n(1), n(2)]
        );
        // One hop reaches both, whatever the weights.
        assert_eq!(net.neighborhood(n(0), &NetworkQuery::hops(1)).unwrap().len(), 2);
    }

    #[test]
    fn directed_edges_are_one_way() {
        let mut net = Network::builder().nodes(2).directed(true).build().unwrap();
        net.add_edge(n(0), n(1)).unwrap();
        assert_eq!(net.adjacent(n(0)).unwrap(), vec![n(1)]);
        assert!(net.adjacent(n(1)).unwrap().is_empty());
        assert_eq!(net.distance(n(0), n(1)).unwrap(), Some(1.0));
        assert_eq!(net.distance(n(1), n(0)).unwrap(), None);
    }

    #[test]
    fn self_loops_and_duplicates() {
        let mut net = Network::new(2);
        assert!(matches!(net.add_edge(n(0), n(0)), Err(SpaceError::SelfLoop { .. })));
        net.add_edge(n(0), n(1)).unwrap();
        net.add_weighted_edge(n(1), n(0), 4.0).unwrap();
        assert_eq!(net.edge_count(), 1);
        assert_eq!(net.edge_weight(n(0), n(1)), Some(4.0));

        let mut looped = Network::builder().nodes(1).allow_self_loops(true).build().unwrap();
        looped.add_edge(n(0), n(0)).unwrap();
        assert!(looped.neighborhood(n(0), &NetworkQuery::hops(1)).unwrap().is_empty());
    }

    #[test]
    fn topology_frozen_during_tick() {
        let mut net = path();
        net.begin_tick();
        assert!(matches!(
            net.add_edge(n(0), n(4)),
            Err(SpaceError::MutationDuringTick { .. })
        ));
        assert!(net.remove_edge(n(0), n(1)).is_err());
        assert!(net.add_node().is_err());
        net.end_tick();
        assert!(net.remove_edge(n(0), n(1)).unwrap());
        assert_eq!(net.add_node().unwrap(), n(5));
    }

    #[test]
    fn unknown_node_and_capacity() {
        let mut net = path();
        assert!(matches!(
            net.place(AgentId(1), n(9)),
            Err(SpaceError::UnknownNode { .. })
        ));
        net.place(AgentId(1), n(0)).unwrap();
        assert!(matches!(
            net.place(AgentId(2), n(0)),
            Err(SpaceError::CellOccupied { .. })
        ));
        net.place(AgentId(2), n(1)).unwrap();
        assert_eq!(net.neighbors(n(0), &NetworkQuery::hops(1)).unwrap(), vec![AgentId(2)]);
    }

    #[test]
    fn erdos_renyi_is_seeded() {
        let a = Network::erdos_renyi(30, 0.2, &mut RandomSource::new(9)).unwrap();
        let b = Network::erdos_renyi(30, 0.2, &mut RandomSource::new(9)).unwrap();
        assert_eq!(a.edge_count(), b.edge_count());
        for i in 0..30 {
            assert_eq!(a.adjacent(n(i)).unwrap(), b.adjacent(n(i)).unwrap());
        }
        assert!(Network::erdos_renyi(3, 1.5, &mut RandomSource::new(0)).is_err());
        assert_eq!(
            Network::erdos_renyi(5, 1.0, &mut RandomSource::new(0)).unwrap().edge_count(),
            10
        );
    }
}
