//! Relationship graph assembly.
//!
//! Nodes are keyed by STIX id. Every decoder contributes nodes and edges;
//! later decoders overwrite node data, edges only ever accumulate.

use crate::decoders::Decoder;
use crate::external_id::try_external_id;
use crate::filter::{any_string_matches_any_pattern, NamePattern};
use crate::types::{stix_type_from_id, Edge, EdgeData, Node, StixObject, Triple};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Edge weight: everything but the endpoints, which live in the graph.
#[derive(Debug, Clone, PartialEq)]
struct Link {
    predicate: String,
    data: EdgeData,
}

/// A directed multigraph of STIX entities.
#[derive(Debug, Clone, Default)]
pub struct StixGraph {
    graph: StableDiGraph<Node, Link>,
    index: FxHashMap<String, NodeIndex>,
}

impl StixGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, replacing the data of an existing node with the same id.
    pub fn add_node(&mut self, node: Node) -> NodeIndex {
        match self.index.get(&node.id) {
            Some(&idx) => {
                self.graph[idx] = node;
                idx
            }
            None => {
                let id = node.id.clone();
                let idx = self.graph.add_node(node);
                self.index.insert(id, idx);
                idx
            }
        }
    }

    /// Index of the node with this id, creating a placeholder when absent.
    fn ensure_node(&mut self, id: &str) -> NodeIndex {
        match self.index.get(id) {
            Some(&idx) => idx,
            None => self.add_node(Node::placeholder(id)),
        }
    }

    /// Append an edge. Endpoints that do not exist yet become placeholders.
    pub fn add_edge(&mut self, edge: Edge) -> EdgeIndex {
        let source = self.ensure_node(&edge.source);
        let object = self.ensure_node(&edge.object);
        self.graph.add_edge(
            source,
            object,
            Link { predicate: edge.predicate, data: edge.data },
        )
    }

    /// Remove a node together with all of its edges.
    pub fn remove_node(&mut self, id: &str) -> Option<Node> {
        let idx = self.index.remove(id)?;
        self.graph.remove_node(idx)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&idx| &self.graph[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.graph.node_weights()
    }

    /// Every edge, in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.graph
            .edge_indices()
            .filter_map(move |idx| self.edge(idx))
    }

    fn edge(&self, idx: EdgeIndex) -> Option<Edge> {
        let (source, object) = self.graph.edge_endpoints(idx)?;
        let link = self.graph.edge_weight(idx)?;
        Some(
            Edge::new(
                self.graph[source].id.as_str(),
                link.predicate.as_str(),
                self.graph[object].id.as_str(),
            )
            .with_data(link.data.clone()),
        )
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Ids named by at least one edge.
    pub fn endpoints(&self) -> FxHashSet<&str> {
        self.graph
            .edge_indices()
            .filter_map(|idx| self.graph.edge_endpoints(idx))
            .flat_map(|(s, o)| [self.graph[s].id.as_str(), self.graph[o].id.as_str()])
            .collect()
    }

    /// Remove every edge endpoint that is not in `present`, along with its
    /// edges. Returns the number of nodes removed.
    pub fn drop_dangling_references(&mut self, present: &FxHashSet<String>) -> usize {
        let dangling: Vec<String> = self
            .endpoints()
            .into_iter()
            .filter(|id| !present.contains(*id))
            .map(str::to_string)
            .collect();

        for id in &dangling {
            debug!("Dropping dangling reference {}", id);
            self.remove_node(id);
        }
        if !dangling.is_empty() {
            info!("Dropped {} dangling references", dangling.len());
        }
        dangling.len()
    }

    /// Edges within `radius` hops of the given ids, in either direction.
    ///
    /// With no ids every node is a starting point. When predicate patterns
    /// are given, only edges whose predicate matches one of them are
    /// followed.
    pub fn related_subgraph<S: AsRef<str>>(
        &self,
        ids: &[S],
        predicates: &[NamePattern],
        radius: usize,
    ) -> StixGraph {
        let mut frontier: Vec<NodeIndex> = if ids.is_empty() {
            self.graph.node_indices().collect()
        } else {
            ids.iter()
                .filter_map(|id| self.index.get(id.as_ref()).copied())
                .collect()
        };

        let mut visited: FxHashSet<NodeIndex> = frontier.iter().copied().collect();
        let mut taken: FxHashSet<EdgeIndex> = FxHashSet::default();

        for _ in 0..radius {
            let mut next = Vec::new();
            for &idx in &frontier {
                let incident = self
                    .graph
                    .edges_directed(idx, Direction::Outgoing)
                    .chain(self.graph.edges_directed(idx, Direction::Incoming));
                for edge in incident {
                    if !predicates.is_empty()
                        && !any_string_matches_any_pattern(&[edge.weight().predicate.as_str()], predicates)
                    {
                        continue;
                    }
                    taken.insert(edge.id());
                    for neighbour in [edge.source(), edge.target()] {
                        if visited.insert(neighbour) {
                            next.push(neighbour);
                        }
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        let mut taken: Vec<EdgeIndex> = taken.into_iter().collect();
        taken.sort();

        let mut subgraph = StixGraph::new();
        for idx in taken {
            if let Some((source, object)) = self.graph.edge_endpoints(idx) {
                subgraph.add_node(self.graph[source].clone());
                subgraph.add_node(self.graph[object].clone());
            }
            if let Some(edge) = self.edge(idx) {
                subgraph.add_edge(edge);
            }
        }
        subgraph
    }

    /// Keep only nodes with an external id, renamed to that id.
    ///
    /// Nodes sharing an external id are merged; edges touching a dropped
    /// node are dropped with it.
    pub fn relabel_by_external_id(&self) -> StixGraph {
        let renames: FxHashMap<&str, String> = self
            .nodes()
            .filter_map(|node| {
                try_external_id(&node.as_object()).map(|external| (node.id.as_str(), external))
            })
            .collect();

        let mut relabelled = StixGraph::new();
        for node in self.nodes() {
            if let Some(external) = renames.get(node.id.as_str()) {
                relabelled.add_node(Node::new(external.clone(), node.kind.clone(), node.data.clone()));
            }
        }
        for edge in self.edges() {
            if let (Some(source), Some(object)) =
                (renames.get(edge.source.as_str()), renames.get(edge.object.as_str()))
            {
                relabelled.add_edge(Edge::new(source.as_str(), edge.predicate, object.as_str()).with_data(edge.data));
            }
        }
        relabelled
    }

    /// Node and edge totals plus an edge tally by endpoint type.
    pub fn summary(&self) -> GraphSummary {
        GraphSummary {
            total_nodes: self.node_count(),
            total_edges: self.edge_count(),
            total_edges_by_type: self.tally_edges_by_type(),
        }
    }

    /// Edge counts keyed by `"<subject-type>,<predicate>,<object-type>"`.
    pub fn tally_edges_by_type(&self) -> BTreeMap<String, usize> {
        let mut tally = BTreeMap::new();
        for edge in self.edges() {
            let key = format!(
                "{},{},{}",
                stix_type_from_id(&edge.source),
                edge.predicate,
                stix_type_from_id(&edge.object)
            );
            *tally.entry(key).or_insert(0) += 1;
        }
        tally
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphSummary {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub total_edges_by_type: BTreeMap<String, usize>,
}

/// Assembly options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphOptions {
    pub drop_dangling_references: bool,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self { drop_dangling_references: true }
    }
}

/// Fold the output of every decoder over one batch into a single graph.
///
/// Dangling references are resolved once, after all decoders have run,
/// against the ids of the input batch. Synthesized nodes (external-reference
/// pseudo-nodes) are not input objects, so they only survive when removal
/// is switched off.
pub fn build_graph(objects: &[StixObject], decoders: &[Decoder], options: GraphOptions) -> StixGraph {
    let mut graph = StixGraph::new();
    let present: FxHashSet<String> = objects
        .iter()
        .map(|o| o.id().to_string())
        .filter(|id| !id.is_empty())
        .collect();

    for decoder in decoders {
        for node in decoder.iter_nodes(objects) {
            graph.add_node(node);
        }
        for edge in decoder.iter_edges(objects) {
            graph.add_edge(edge);
        }
    }

    if options.drop_dangling_references {
        graph.drop_dangling_references(&present);
    }

    debug!(
        "Built graph with {} nodes and {} edges from {} objects",
        graph.node_count(),
        graph.edge_count(),
        objects.len()
    );
    graph
}

/// Build a graph from bare triples; every endpoint becomes a placeholder node.
pub fn triples_to_graph<'a, I>(triples: I) -> StixGraph
where
    I: IntoIterator<Item = &'a Triple>,
{
    let mut graph = StixGraph::new();
    for t in triples {
        graph.add_edge(Edge::new(t.subject.as_str(), t.predicate.as_str(), t.object.as_str()));
    }
    graph
}
