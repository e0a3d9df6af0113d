use crate::display_width::label_width_px;
use crate::flow_graph::*;

/// Where a node sits within its column relative to the main line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Track {
    Main,
    Above,
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub column: usize,
    pub track: Track,
}

pub const ORIGIN_X: usize = 100;
pub const ORIGIN_Y: usize = 100;
pub const LANE_HEADER: usize = 30;
pub const LANE_HEIGHT: usize = 240;
pub const BRANCH_OFFSET: usize = 60;
pub const COLUMN_GAP: usize = 50;
pub const MIN_COLUMN_PITCH: usize = 150;

pub const EVENT_SIZE: usize = 36;
pub const GATEWAY_SIZE: usize = 50;
pub const TASK_HEIGHT: usize = 80;
pub const TASK_MIN_WIDTH: usize = 100;
pub const TASK_MAX_WIDTH: usize = 200;
const TASK_PADDING: usize = 20;

pub fn node_size(kind: NodeKind, label: &str) -> (usize, usize) {
    match kind {
        NodeKind::Start | NodeKind::End => (EVENT_SIZE, EVENT_SIZE),
        NodeKind::Gateway | NodeKind::Join => (GATEWAY_SIZE, GATEWAY_SIZE),
        NodeKind::Task => {
            let width = (label_width_px(label) + TASK_PADDING).clamp(TASK_MIN_WIDTH, TASK_MAX_WIDTH);
            (width, TASK_HEIGHT)
        }
    }
}

/// Assigns bounds to every node from its slot and returns the lane bands.
///
/// Columns advance along x at a pitch wide enough for the widest node. Each
/// lane owner gets a band of `LANE_HEIGHT`, ordered by first appearance;
/// without lanes every node shares one implicit band. Branch tracks sit
/// `BRANCH_OFFSET` above and below the band's centre line.
pub fn compute(nodes: &mut [Node], slots: &[Slot], lanes_enabled: bool) -> Vec<Lane> {
    let owners = lane_order(nodes, lanes_enabled);

    let widest = nodes
        .iter()
        .map(|n| node_size(n.kind, &n.label).0)
        .max()
        .unwrap_or(0);
    let pitch = MIN_COLUMN_PITCH.max(widest + COLUMN_GAP);
    let columns = slots.iter().map(|s| s.column + 1).max().unwrap_or(0);
    let left = if lanes_enabled {
        ORIGIN_X + LANE_HEADER
    } else {
        ORIGIN_X
    };

    for (node, slot) in nodes.iter_mut().zip(slots) {
        let band = node
            .lane
            .as_ref()
            .and_then(|owner| owners.iter().position(|o| o == owner))
            .unwrap_or(0);
        let center_x = left + slot.column * pitch + pitch / 2;
        let main_y = ORIGIN_Y + band * LANE_HEIGHT + LANE_HEIGHT / 2;
        let center_y = match slot.track {
            Track::Main => main_y,
            Track::Above => main_y - BRANCH_OFFSET,
            Track::Below => main_y + BRANCH_OFFSET,
        };

        let (width, height) = node_size(node.kind, &node.label);
        node.bounds = Bounds {
            x: center_x - width / 2,
            y: center_y - height / 2,
            width,
            height,
        };
    }

    owners
        .into_iter()
        .enumerate()
        .map(|(i, owner)| Lane {
            id: format!("Lane_{}", i + 1),
            owner,
            bounds: Bounds {
                x: ORIGIN_X,
                y: ORIGIN_Y + i * LANE_HEIGHT,
                width: LANE_HEADER + columns * pitch,
                height: LANE_HEIGHT,
            },
        })
        .collect()
}

fn lane_order(nodes: &[Node], lanes_enabled: bool) -> Vec<String> {
    let mut owners: Vec<String> = Vec::new();
    if !lanes_enabled {
        return owners;
    }
    for owner in nodes.iter().filter_map(|n| n.lane.as_ref()) {
        if !owners.contains(owner) {
            owners.push(owner.clone());
        }
    }
    owners
}
