use std::collections::HashMap;

use crate::error::Error;
use crate::flow_graph::*;
use crate::xml::XmlWriter;

pub const MODEL_NS: &str = "http://www.omg.org/spec/BPMN/20100524/MODEL";
pub const BPMNDI_NS: &str = "http://www.omg.org/spec/BPMN/20100524/DI";
pub const DC_NS: &str = "http://www.omg.org/spec/DD/20100524/DC";
pub const DI_NS: &str = "http://www.omg.org/spec/DD/20100524/DI";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const TARGET_NS: &str = "http://bpmn.io/schema/bpmn";

pub const PROCESS_ID: &str = "Process_1";

/// Renders the graph as a BPMN 2.0 process definition, optionally with the
/// diagram-interchange block restating every bound.
pub fn render(graph: &FlowGraph, diagram_interchange: bool) -> Result<String, Error> {
    let flow_ids: Vec<String> = (1..=graph.edges.len()).map(|i| format!("Flow_{i}")).collect();

    let mut w = XmlWriter::new()?;
    let mut root: Vec<(&str, &str)> = vec![("xmlns", MODEL_NS), ("xmlns:xsi", XSI_NS)];
    if diagram_interchange {
        root.extend([
            ("xmlns:bpmndi", BPMNDI_NS),
            ("xmlns:dc", DC_NS),
            ("xmlns:di", DI_NS),
        ]);
    }
    root.extend([("id", "Definitions_1"), ("targetNamespace", TARGET_NS)]);
    w.open("definitions", &root)?;

    w.open("process", &[("id", PROCESS_ID), ("isExecutable", "true")])?;
    write_lane_set(&mut w, graph)?;
    for node in &graph.nodes {
        write_node(&mut w, node)?;
    }
    for (edge, id) in graph.edges.iter().zip(&flow_ids) {
        write_flow(&mut w, edge, id)?;
    }
    w.close()?;

    if diagram_interchange {
        write_diagram(&mut w, graph, &flow_ids)?;
    }

    w.finish()
}

fn element_name(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Start => "startEvent",
        NodeKind::End => "endEvent",
        NodeKind::Task => "task",
        NodeKind::Gateway | NodeKind::Join => "exclusiveGateway",
    }
}

fn write_lane_set(w: &mut XmlWriter, graph: &FlowGraph) -> Result<(), Error> {
    if graph.lanes.is_empty() {
        return Ok(());
    }
    w.open("laneSet", &[("id", "LaneSet_1")])?;
    for lane in &graph.lanes {
        w.open("lane", &[("id", lane.id.as_str()), ("name", lane.owner.as_str())])?;
        for node in graph.lane_nodes(&lane.owner) {
            w.text("flowNodeRef", &[], &node.id)?;
        }
        w.close()?;
    }
    w.close()
}

fn write_node(w: &mut XmlWriter, node: &Node) -> Result<(), Error> {
    let mut attrs: Vec<(&str, &str)> = vec![("id", node.id.as_str())];
    if !node.label.is_empty() {
        attrs.push(("name", node.label.as_str()));
    }
    match node.kind {
        NodeKind::Gateway => attrs.push(("gatewayDirection", "Diverging")),
        NodeKind::Join => attrs.push(("gatewayDirection", "Converging")),
        _ => {}
    }
    w.empty(element_name(node.kind), &attrs)
}

fn write_flow(w: &mut XmlWriter, edge: &Edge, id: &str) -> Result<(), Error> {
    let mut attrs: Vec<(&str, &str)> = vec![
        ("id", id),
        ("sourceRef", edge.source.as_str()),
        ("targetRef", edge.target.as_str()),
    ];
    match &edge.label {
        Some(label) => {
            attrs.push(("name", label.as_str()));
            w.open("sequenceFlow", &attrs)?;
            w.text(
                "conditionExpression",
                &[("xsi:type", "tFormalExpression")],
                label,
            )?;
            w.close()
        }
        None => w.empty("sequenceFlow", &attrs),
    }
}

fn write_diagram(
    w: &mut XmlWriter,
    graph: &FlowGraph,
    flow_ids: &[String],
) -> Result<(), Error> {
    w.open("bpmndi:BPMNDiagram", &[("id", "BPMNDiagram_1")])?;
    w.open(
        "bpmndi:BPMNPlane",
        &[("id", "BPMNPlane_1"), ("bpmnElement", PROCESS_ID)],
    )?;

    for lane in &graph.lanes {
        write_shape(w, &lane.id, &lane.bounds, &[("isHorizontal", "true")])?;
    }
    for node in &graph.nodes {
        let extra: &[(&str, &str)] = match node.kind {
            NodeKind::Gateway | NodeKind::Join => &[("isMarkerVisible", "true")],
            _ => &[],
        };
        write_shape(w, &node.id, &node.bounds, extra)?;
    }

    let bounds: HashMap<&str, &Bounds> = graph
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), &n.bounds))
        .collect();
    for (edge, id) in graph.edges.iter().zip(flow_ids) {
        let di_id = format!("{id}_di");
        w.open("bpmndi:BPMNEdge", &[("id", di_id.as_str()), ("bpmnElement", id.as_str())])?;
        if let (Some(from), Some(to)) = (
            bounds.get(edge.source.as_str()),
            bounds.get(edge.target.as_str()),
        ) {
            for (x, y) in waypoints(from, to) {
                let (x, y) = (x.to_string(), y.to_string());
                w.empty("di:waypoint", &[("x", x.as_str()), ("y", y.as_str())])?;
            }
        }
        w.close()?;
    }

    w.close()?;
    w.close()
}

fn write_shape(
    w: &mut XmlWriter,
    id: &str,
    bounds: &Bounds,
    extra: &[(&str, &str)],
) -> Result<(), Error> {
    let di_id = format!("{id}_di");
    let mut attrs: Vec<(&str, &str)> = vec![("id", di_id.as_str()), ("bpmnElement", id)];
    attrs.extend_from_slice(extra);
    w.open("bpmndi:BPMNShape", &attrs)?;

    let x = bounds.x.to_string();
    let y = bounds.y.to_string();
    let width = bounds.width.to_string();
    let height = bounds.height.to_string();
    w.empty(
        "dc:Bounds",
        &[
            ("x", x.as_str()),
            ("y", y.as_str()),
            ("width", width.as_str()),
            ("height", height.as_str()),
        ],
    )?;
    w.close()
}

/// Right edge of `from` to left edge of `to`, with an orthogonal elbow when
/// the centre lines differ.
fn waypoints(from: &Bounds, to: &Bounds) -> Vec<(usize, usize)> {
    let start = (from.right(), from.center_y());
    let end = (to.x, to.center_y());
    if start.1 == end.1 {
        return vec![start, end];
    }
    let mid_x = start.0 + end.0.saturating_sub(start.0) / 2;
    vec![start, (mid_x, start.1), (mid_x, end.1), end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn straight_waypoints_on_shared_centre_line() {
        let a = Bounds { x: 0, y: 0, width: 10, height: 10 };
        let b = Bounds { x: 30, y: 0, width: 10, height: 10 };
        assert_eq!(waypoints(&a, &b), vec![(10, 5), (30, 5)]);
    }

    #[test]
    fn elbow_waypoints_between_rows() {
        let a = Bounds { x: 0, y: 0, width: 10, height: 10 };
        let b = Bounds { x: 30, y: 40, width: 10, height: 10 };
        assert_eq!(
            waypoints(&a, &b),
            vec![(10, 5), (20, 5), (20, 45), (30, 45)]
        );
    }

    #[test]
    fn gateway_and_join_share_element_name() {
        assert_eq!(element_name(NodeKind::Gateway), "exclusiveGateway");
        assert_eq!(element_name(NodeKind::Join), "exclusiveGateway");
    }
}
