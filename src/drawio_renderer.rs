use crate::error::Error;
use crate::flow_graph::*;
use crate::xml::XmlWriter;

const ROOT_CELL: &str = "0";
const LAYER_CELL: &str = "1";

const START_STYLE: &str = "ellipse;whiteSpace=wrap;fillColor=#d5e8d4;strokeColor=#82b366;";
const END_STYLE: &str = "ellipse;whiteSpace=wrap;fillColor=#f8cecc;strokeColor=#b85450;strokeWidth=2;";
const TASK_STYLE: &str = "rounded=1;whiteSpace=wrap;";
const GATEWAY_STYLE: &str = "rhombus;whiteSpace=wrap;";
const LANE_STYLE: &str = "swimlane;horizontal=0;startSize=30;";
const EDGE_STYLE: &str = "edgeStyle=orthogonalEdgeStyle;rounded=0;endArrow=block;";
const NO_EDGE_STYLE: &str = "edgeStyle=orthogonalEdgeStyle;rounded=0;endArrow=block;dashed=1;";

/// Renders the graph as a single `mxGraphModel` document.
///
/// Labels are emitted as plain text (no `html=1`) so user text can never be
/// interpreted as markup by the editor.
pub fn render(graph: &FlowGraph) -> Result<String, Error> {
    let mut w = XmlWriter::new()?;
    w.open(
        "mxGraphModel",
        &[
            ("grid", "1"),
            ("gridSize", "10"),
            ("guides", "1"),
            ("arrows", "1"),
            ("connect", "1"),
            ("page", "1"),
        ],
    )?;
    w.open("root", &[])?;
    w.empty("mxCell", &[("id", ROOT_CELL)])?;
    w.empty("mxCell", &[("id", LAYER_CELL), ("parent", ROOT_CELL)])?;

    for lane in &graph.lanes {
        write_vertex(&mut w, &lane.id, &lane.owner, LANE_STYLE, &lane.bounds)?;
    }
    for node in &graph.nodes {
        write_vertex(&mut w, &node.id, &node.label, style(node.kind), &node.bounds)?;
    }
    for (i, edge) in graph.edges.iter().enumerate() {
        write_edge(&mut w, &format!("Flow_{}", i + 1), edge)?;
    }

    w.finish()
}

fn style(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Start => START_STYLE,
        NodeKind::End => END_STYLE,
        NodeKind::Task => TASK_STYLE,
        NodeKind::Gateway | NodeKind::Join => GATEWAY_STYLE,
    }
}

fn write_vertex(
    w: &mut XmlWriter,
    id: &str,
    value: &str,
    style: &str,
    bounds: &Bounds,
) -> Result<(), Error> {
    w.open(
        "mxCell",
        &[
            ("id", id),
            ("value", value),
            ("style", style),
            ("vertex", "1"),
            ("parent", LAYER_CELL),
        ],
    )?;
    let x = bounds.x.to_string();
    let y = bounds.y.to_string();
    let width = bounds.width.to_string();
    let height = bounds.height.to_string();
    w.empty(
        "mxGeometry",
        &[
            ("x", x.as_str()),
            ("y", y.as_str()),
            ("width", width.as_str()),
            ("height", height.as_str()),
            ("as", "geometry"),
        ],
    )?;
    w.close()
}

fn write_edge(w: &mut XmlWriter, id: &str, edge: &Edge) -> Result<(), Error> {
    let style = if edge.label.as_deref() == Some(NO_LABEL) {
        NO_EDGE_STYLE
    } else {
        EDGE_STYLE
    };
    w.open(
        "mxCell",
        &[
            ("id", id),
            ("value", edge.label.as_deref().unwrap_or("")),
            ("style", style),
            ("edge", "1"),
            ("parent", LAYER_CELL),
            ("source", edge.source.as_str()),
            ("target", edge.target.as_str()),
        ],
    )?;
    w.empty("mxGeometry", &[("relative", "1"), ("as", "geometry")])?;
    w.close()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(label: Option<&str>) -> Edge {
        Edge {
            source: "A".to_string(),
            target: "B".to_string(),
            label: label.map(String::from),
        }
    }

    #[test]
    fn no_edge_is_dashed() {
        let mut w = XmlWriter::new().unwrap();
        write_edge(&mut w, "Flow_1", &edge(Some("no"))).unwrap();
        let doc = w.finish().unwrap();
        assert!(doc.contains("dashed=1"), "got: {doc}");
        assert!(doc.contains("value=\"no\""));
    }

    #[test]
    fn yes_and_plain_edges_are_solid() {
        for label in [Some("yes"), None] {
            let mut w = XmlWriter::new().unwrap();
            write_edge(&mut w, "Flow_1", &edge(label)).unwrap();
            let doc = w.finish().unwrap();
            assert!(!doc.contains("dashed"), "got: {doc}");
        }
    }

    #[test]
    fn shapes_follow_node_kind() {
        assert!(style(NodeKind::Gateway).starts_with("rhombus"));
        assert!(style(NodeKind::Join).starts_with("rhombus"));
        assert!(style(NodeKind::Start).starts_with("ellipse"));
        assert!(style(NodeKind::End).starts_with("ellipse"));
        assert!(style(NodeKind::Task).starts_with("rounded"));
    }
}
