//! Lateral movement property graph.
//!
//! Nodes are datum values deduplicated by kind; edges record how two
//! values relate (`is`, `has`) or that one accessed the other. Repeated
//! observations append evidence to the existing edge instead of
//! duplicating it. Serialization targets the viewer wire format with
//! top-level `nodes` and `links` arrays.

use std::collections::HashMap;

use serde::Serialize;

use crate::event_data::{Datum, DatumKind, Direction, EventData, EventId};

/// Relation carried by an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    Is,
    Has,
    Access,
}

/// One deduplicated datum value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: usize,
    #[serde(rename = "type")]
    pub kind: DatumKind,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<usize>,
}

/// Evidence tying an edge back to one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRef {
    pub id: Option<EventId>,
    pub timestamp: Option<i64>,
}

/// Directed relation between two nodes with accumulated evidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub events: Vec<EventRef>,
}

/// Datum pairs that become `is`/`has` edges, evaluated in this order
/// for every event.
const RULES: [((Direction, DatumKind), (Direction, DatumKind), EdgeType); 12] = [
    (
        (Direction::Source, DatumKind::Ip),
        (Direction::Source, DatumKind::MachineName),
        EdgeType::Is,
    ),
    (
        (Direction::Source, DatumKind::UserName),
        (Direction::Source, DatumKind::UserId),
        EdgeType::Is,
    ),
    (
        (Direction::Target, DatumKind::MachineName),
        (Direction::Target, DatumKind::Ip),
        EdgeType::Is,
    ),
    (
        (Direction::Target, DatumKind::UserName),
        (Direction::Target, DatumKind::UserId),
        EdgeType::Is,
    ),
    (
        (Direction::Source, DatumKind::Ip),
        (Direction::Source, DatumKind::UserName),
        EdgeType::Has,
    ),
    (
        (Direction::Source, DatumKind::Ip),
        (Direction::Source, DatumKind::UserId),
        EdgeType::Has,
    ),
    (
        (Direction::Source, DatumKind::MachineName),
        (Direction::Source, DatumKind::UserName),
        EdgeType::Has,
    ),
    (
        (Direction::Source, DatumKind::MachineName),
        (Direction::Source, DatumKind::UserId),
        EdgeType::Has,
    ),
    (
        (Direction::Target, DatumKind::Ip),
        (Direction::Target, DatumKind::UserName),
        EdgeType::Has,
    ),
    (
        (Direction::Target, DatumKind::Ip),
        (Direction::Target, DatumKind::UserId),
        EdgeType::Has,
    ),
    (
        (Direction::Target, DatumKind::MachineName),
        (Direction::Target, DatumKind::UserName),
        EdgeType::Has,
    ),
    (
        (Direction::Target, DatumKind::MachineName),
        (Direction::Target, DatumKind::UserId),
        EdgeType::Has,
    ),
];

/// Kinds eligible as access endpoints, most specific first.
const ACCESS_PRIORITY: [DatumKind; 5] = [
    DatumKind::UserName,
    DatumKind::UserId,
    DatumKind::MachineName,
    DatumKind::Ip,
    DatumKind::StorageOrigin,
];

/// Interval between progress reports while projecting events.
const PROGRESS_INTERVAL: usize = 1000;

/// The accumulated movement graph.
///
/// Node ids are dense and assigned in first-seen order, so they double
/// as indexes into the serialized `nodes` array.
#[derive(Debug, Default, Serialize)]
pub struct Graph {
    nodes: Vec<Node>,
    #[serde(rename = "links")]
    edges: Vec<Edge>,
    #[serde(skip)]
    node_ids: HashMap<(DatumKind, String), usize>,
    #[serde(skip)]
    edge_ids: HashMap<(usize, usize, EdgeType), usize>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Returns the id for a value, creating its node on first sight.
    pub fn get_or_add_node(&mut self, kind: DatumKind, value: &str) -> usize {
        if let Some(&id) = self.node_ids.get(&(kind, value.to_string())) {
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(Node {
            id,
            kind,
            value: value.to_string(),
            cluster: None,
        });
        self.node_ids.insert((kind, value.to_string()), id);
        id
    }

    /// Records one observation of a directed relation between two nodes.
    pub fn add_edge(
        &mut self,
        source: usize,
        target: usize,
        edge_type: EdgeType,
        timestamp: Option<i64>,
        event_id: Option<EventId>,
    ) {
        let event = EventRef {
            id: event_id,
            timestamp,
        };
        let key = (source, target, edge_type);
        if let Some(&index) = self.edge_ids.get(&key) {
            self.edges[index].events.push(event);
            return;
        }
        self.edge_ids.insert(key, self.edges.len());
        self.edges.push(Edge {
            source,
            target,
            edge_type,
            events: vec![event],
        });
    }

    /// Adds the nodes for two datums plus an edge between them. Only the
    /// datums' kind and value matter here; their direction does not.
    pub fn add_data(
        &mut self,
        source: &Datum,
        target: &Datum,
        edge_type: EdgeType,
        timestamp: Option<i64>,
        event_id: Option<EventId>,
    ) {
        let source_id = self.get_or_add_node(source.kind, &source.value);
        let target_id = self.get_or_add_node(target.kind, &target.value);
        self.add_edge(source_id, target_id, edge_type, timestamp, event_id);
    }

    /// Projects one normalized event onto the graph: every matching rule
    /// pair becomes an `is`/`has` edge, and the most specific datum of
    /// each side becomes an `access` edge.
    pub fn add_event_data(&mut self, data: &EventData) {
        for &(source_name, target_name, edge_type) in RULES.iter() {
            let source = data.get(source_name.0, source_name.1);
            let target = data.get(target_name.0, target_name.1);
            if let (Some(source), Some(target)) = (source, target) {
                self.add_data(source, target, edge_type, data.timestamp, data.event_id.clone());
            }
        }

        let source = access_endpoint(data, Direction::Source);
        let target = access_endpoint(data, Direction::Target);
        if let (Some(source), Some(target)) = (source, target) {
            self.add_data(
                source,
                target,
                EdgeType::Access,
                data.timestamp,
                data.event_id.clone(),
            );
        }
    }

    /// Assigns cluster labels by connectivity over `is` and `has` edges;
    /// `access` edges never join clusters. Seeds are taken machines
    /// first, then addresses, then users, so every cluster is labeled
    /// with the id of its most machine-like member. Labels are
    /// recomputed from scratch on every call.
    pub fn finalize(&mut self) {
        for node in &mut self.nodes {
            node.cluster = None;
        }

        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for (index, edge) in self.edges.iter().enumerate() {
            if edge.edge_type == EdgeType::Access {
                continue;
            }
            adjacency[edge.source].push(index);
            if edge.target != edge.source {
                adjacency[edge.target].push(index);
            }
        }

        let mut seeds: Vec<usize> = (0..self.nodes.len()).collect();
        seeds.sort_by_key(|&id| seed_priority(self.nodes[id].kind));

        let mut stack = Vec::new();
        for seed in seeds {
            if self.nodes[seed].cluster.is_some() {
                continue;
            }
            self.nodes[seed].cluster = Some(seed);
            stack.push(seed);
            while let Some(current) = stack.pop() {
                for &edge_index in &adjacency[current] {
                    let edge = &self.edges[edge_index];
                    let neighbor = if edge.source == current {
                        edge.target
                    } else {
                        edge.source
                    };
                    if self.nodes[neighbor].cluster.is_none() {
                        self.nodes[neighbor].cluster = Some(seed);
                        stack.push(neighbor);
                    }
                }
            }
        }
    }
}

fn access_endpoint(data: &EventData, direction: Direction) -> Option<&Datum> {
    ACCESS_PRIORITY
        .iter()
        .find_map(|&kind| data.get(direction, kind))
}

fn seed_priority(kind: DatumKind) -> usize {
    match kind {
        DatumKind::MachineName => 0,
        DatumKind::Ip => 1,
        DatumKind::UserName => 2,
        DatumKind::UserId => 3,
        DatumKind::StorageOrigin => usize::MAX,
    }
}

/// Builds a finalized graph from a stream of normalized events.
pub fn create_graph<I>(events: I) -> Graph
where
    I: IntoIterator<Item = EventData>,
{
    let mut graph = Graph::new();
    for (index, event) in events.into_iter().enumerate() {
        if index % PROGRESS_INTERVAL == 0 {
            log::debug!(
                "projected {} events, graph has {} nodes and {} edges",
                index,
                graph.node_count(),
                graph.edge_count()
            );
        }
        graph.add_event_data(&event);
    }
    graph.finalize();
    graph
}
