use std::collections::HashSet;

use crate::error::Error;

pub const YES_LABEL: &str = "yes";
pub const NO_LABEL: &str = "no";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Start,
    End,
    Task,
    Gateway,
    Join,
}

impl NodeKind {
    /// Prefix of the per-kind monotonically numbered node id.
    pub fn id_prefix(self) -> &'static str {
        match self {
            NodeKind::Start => "StartEvent",
            NodeKind::End => "EndEvent",
            NodeKind::Task => "Task",
            NodeKind::Gateway => "Gateway",
            NodeKind::Join => "Join",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bounds {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Bounds {
    pub fn center_x(&self) -> usize {
        self.x + self.width / 2
    }

    pub fn center_y(&self) -> usize {
        self.y + self.height / 2
    }

    pub fn right(&self) -> usize {
        self.x + self.width
    }

    pub fn bottom(&self) -> usize {
        self.y + self.height
    }

    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
    pub lane: Option<String>,
    pub bounds: Bounds,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lane {
    pub id: String,
    pub owner: String,
    pub bounds: Bounds,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// Empty unless owner lanes were requested.
    pub lanes: Vec<Lane>,
}

impl FlowGraph {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn count(&self, kind: NodeKind) -> usize {
        self.nodes.iter().filter(|n| n.kind == kind).count()
    }

    pub fn successors<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == id)
    }

    pub fn lane_nodes<'a>(&'a self, owner: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes
            .iter()
            .filter(move |n| n.lane.as_deref() == Some(owner))
    }

    /// Unique node ids and no edge pointing at an unknown node.
    pub fn check_integrity(&self) -> Result<(), Error> {
        let mut node_ids: HashSet<&str> = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !node_ids.insert(node.id.as_str()) {
                return Err(Error::Serialization(format!("duplicate node id `{}`", node.id)));
            }
        }
        let mut lane_ids: HashSet<&str> = HashSet::with_capacity(self.lanes.len());
        for lane in &self.lanes {
            if node_ids.contains(lane.id.as_str()) || !lane_ids.insert(lane.id.as_str()) {
                return Err(Error::Serialization(format!("duplicate lane id `{}`", lane.id)));
            }
        }
        for edge in &self.edges {
            for end in [&edge.source, &edge.target] {
                if !node_ids.contains(end.as_str()) {
                    return Err(Error::Serialization(format!(
                        "edge {} -> {} references unknown node `{end}`",
                        edge.source, edge.target
                    )));
                }
            }
        }
        Ok(())
    }
}
