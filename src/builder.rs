use std::collections::HashMap;

use tracing::debug;

use crate::ast::*;
use crate::error::Error;
use crate::flow_graph::*;
use crate::layout::{self, Slot, Track};

/// How the two branches of a decision terminate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BranchPolicy {
    /// Both branches merge into a join node and the main line continues.
    #[default]
    Reconverge,
    /// Each branch ends in its own end event; a following record opens a new start.
    Diverge,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub policy: BranchPolicy,
    pub lanes: bool,
}

/// The node(s) the next record attaches to.
#[derive(Debug, Clone, PartialEq)]
enum Tail {
    Single(String),
    Diverged(Vec<String>),
}

pub fn build(records: &[Record], options: &BuildOptions) -> Result<FlowGraph, Error> {
    check_fields(records)?;
    if options.lanes {
        check_owners(records)?;
    }

    let mut builder = Builder::new(*options);
    let start_lane = records.first().and_then(Record::owner);
    let start = builder.add(NodeKind::Start, "Start", start_lane, Track::Main);
    builder.column += 1;

    let tail = records
        .iter()
        .fold(Tail::Single(start), |tail, record| builder.record(tail, record));

    if let Tail::Single(last) = tail {
        let lane = builder.lane_of(&last);
        let end = builder.add(NodeKind::End, "End", lane.as_deref(), Track::Main);
        builder.connect(&last, &end, None);
    }

    let Builder {
        mut nodes,
        slots,
        edges,
        ..
    } = builder;
    let lanes = layout::compute(&mut nodes, &slots, options.lanes);
    debug!(
        nodes = nodes.len(),
        edges = edges.len(),
        lanes = lanes.len(),
        "flow graph built"
    );

    Ok(FlowGraph {
        nodes,
        edges,
        lanes,
    })
}

fn check_fields(records: &[Record]) -> Result<(), Error> {
    for (i, record) in records.iter().enumerate() {
        if let Some(field) = record.missing_field() {
            return Err(Error::MissingRequiredField {
                field,
                index: i + 1,
                label: record.label().to_string(),
            });
        }
    }
    Ok(())
}

fn check_owners(records: &[Record]) -> Result<(), Error> {
    let missing = records
        .iter()
        .position(|r| r.owner().is_none_or(|o| o.trim().is_empty()));
    match missing {
        Some(i) => Err(Error::MissingRequiredField {
            field: "owner",
            index: i + 1,
            label: records[i].label().to_string(),
        }),
        None => Ok(()),
    }
}

fn non_blank(owner: Option<&str>) -> Option<&str> {
    owner.map(str::trim).filter(|o| !o.is_empty())
}

struct Builder {
    options: BuildOptions,
    nodes: Vec<Node>,
    slots: Vec<Slot>,
    edges: Vec<Edge>,
    counters: HashMap<NodeKind, usize>,
    column: usize,
}

impl Builder {
    fn new(options: BuildOptions) -> Self {
        Self {
            options,
            nodes: Vec::new(),
            slots: Vec::new(),
            edges: Vec::new(),
            counters: HashMap::new(),
            column: 0,
        }
    }

    fn record(&mut self, tail: Tail, record: &Record) -> Tail {
        let from = match tail {
            Tail::Single(id) => id,
            Tail::Diverged(ends) => {
                debug!(?ends, "branches ended, opening a new start");
                let start = self.add(NodeKind::Start, "Start", record.owner(), Track::Main);
                self.column += 1;
                start
            }
        };

        match record {
            Record::Step(step) => {
                let task = self.add(NodeKind::Task, &step.name, step.owner.as_deref(), Track::Main);
                self.column += 1;
                self.connect(&from, &task, None);
                Tail::Single(task)
            }
            Record::Decision(decision) => self.decision(&from, decision),
        }
    }

    fn decision(&mut self, from: &str, decision: &Decision) -> Tail {
        let owner = decision.owner.as_deref();
        let gateway = self.add(NodeKind::Gateway, &decision.condition, owner, Track::Main);
        self.connect(from, &gateway, None);
        self.column += 1;

        let branches = [
            (&decision.on_true, YES_LABEL, Track::Above),
            (&decision.on_false, NO_LABEL, Track::Below),
        ];
        let mut tasks = Vec::with_capacity(2);
        for (branch, label, track) in branches {
            let lane = non_blank(branch.owner.as_deref()).or(owner);
            let task = self.add(NodeKind::Task, &branch.name, lane, track);
            self.connect(&gateway, &task, Some(label));
            tasks.push((task, lane.map(String::from), track));
        }
        self.column += 1;

        let tail = match self.options.policy {
            BranchPolicy::Reconverge => {
                let join = self.add(NodeKind::Join, "", owner, Track::Main);
                for (task, _, _) in &tasks {
                    self.connect(task, &join, None);
                }
                Tail::Single(join)
            }
            BranchPolicy::Diverge => {
                let ends = tasks
                    .iter()
                    .map(|(task, lane, track)| {
                        let end = self.add(NodeKind::End, "End", lane.as_deref(), *track);
                        self.connect(task, &end, None);
                        end
                    })
                    .collect();
                Tail::Diverged(ends)
            }
        };
        self.column += 1;
        tail
    }

    fn add(&mut self, kind: NodeKind, label: &str, owner: Option<&str>, track: Track) -> String {
        let n = self.counters.entry(kind).or_insert(0);
        *n += 1;
        let id = format!("{}_{}", kind.id_prefix(), n);

        let lane = if self.options.lanes {
            non_blank(owner).map(String::from)
        } else {
            None
        };
        self.nodes.push(Node {
            id: id.clone(),
            label: label.to_string(),
            kind,
            lane,
            bounds: Bounds::default(),
        });
        self.slots.push(Slot {
            column: self.column,
            track,
        });
        id
    }

    fn connect(&mut self, source: &str, target: &str, label: Option<&str>) {
        self.edges.push(Edge {
            source: source.to_string(),
            target: target.to_string(),
            label: label.map(String::from),
        });
    }

    fn lane_of(&self, id: &str) -> Option<String> {
        self.nodes
            .iter()
            .find(|n| n.id == id)
            .and_then(|n| n.lane.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn steps(names: &[&str]) -> Vec<Record> {
        names.iter().map(|n| Record::from(Step::new(*n))).collect()
    }

    fn ids(graph: &FlowGraph) -> Vec<&str> {
        graph.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    fn pairs(graph: &FlowGraph) -> Vec<(&str, &str)> {
        graph
            .edges
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str()))
            .collect()
    }

    #[test]
    fn empty_records_yield_start_to_end() {
        let graph = build(&[], &BuildOptions::default()).unwrap();
        assert_eq!(ids(&graph), vec!["StartEvent_1", "EndEvent_1"]);
        assert_eq!(pairs(&graph), vec![("StartEvent_1", "EndEvent_1")]);
    }

    #[test]
    fn steps_form_a_simple_path() {
        let graph = build(&steps(&["A", "B"]), &BuildOptions::default()).unwrap();
        assert_eq!(ids(&graph), vec!["StartEvent_1", "Task_1", "Task_2", "EndEvent_1"]);
        assert_eq!(
            pairs(&graph),
            vec![
                ("StartEvent_1", "Task_1"),
                ("Task_1", "Task_2"),
                ("Task_2", "EndEvent_1"),
            ]
        );
    }

    #[test]
    fn decision_reconverges_through_join() {
        let records = vec![
            Record::from(Decision::new("ok?", "Ship", "Cancel")),
            Record::from(Step::new("Archive")),
        ];
        let graph = build(&records, &BuildOptions::default()).unwrap();
        assert_eq!(
            ids(&graph),
            vec![
                "StartEvent_1",
                "Gateway_1",
                "Task_1",
                "Task_2",
                "Join_1",
                "Task_3",
                "EndEvent_1",
            ]
        );
        assert_eq!(
            pairs(&graph),
            vec![
                ("StartEvent_1", "Gateway_1"),
                ("Gateway_1", "Task_1"),
                ("Gateway_1", "Task_2"),
                ("Task_1", "Join_1"),
                ("Task_2", "Join_1"),
                ("Join_1", "Task_3"),
                ("Task_3", "EndEvent_1"),
            ]
        );
        let labels: Vec<Option<&str>> = graph.edges.iter().map(|e| e.label.as_deref()).collect();
        assert_eq!(labels[1], Some("yes"));
        assert_eq!(labels[2], Some("no"));
        assert_eq!(labels.iter().filter(|l| l.is_some()).count(), 2);
    }

    #[test]
    fn diverge_ends_each_branch() {
        let records = vec![Record::from(Decision::new("ok?", "Ship", "Cancel"))];
        let options = BuildOptions {
            policy: BranchPolicy::Diverge,
            lanes: false,
        };
        let graph = build(&records, &options).unwrap();
        assert_eq!(graph.count(NodeKind::End), 2);
        assert_eq!(graph.count(NodeKind::Join), 0);
        assert_eq!(
            pairs(&graph),
            vec![
                ("StartEvent_1", "Gateway_1"),
                ("Gateway_1", "Task_1"),
                ("Gateway_1", "Task_2"),
                ("Task_1", "EndEvent_1"),
                ("Task_2", "EndEvent_2"),
            ]
        );
    }

    #[test]
    fn diverge_then_step_opens_new_start() {
        let records = vec![
            Record::from(Decision::new("ok?", "Ship", "Cancel")),
            Record::from(Step::new("Audit")),
        ];
        let options = BuildOptions {
            policy: BranchPolicy::Diverge,
            lanes: false,
        };
        let graph = build(&records, &options).unwrap();
        assert_eq!(graph.count(NodeKind::Start), 2);
        assert_eq!(graph.count(NodeKind::End), 3);
        let tail: Vec<(&str, &str)> = pairs(&graph).into_iter().skip(5).collect();
        assert_eq!(
            tail,
            vec![("StartEvent_2", "Task_3"), ("Task_3", "EndEvent_3")]
        );
    }

    #[test]
    fn lanes_require_owner_on_every_record() {
        let records = vec![
            Record::from(Step::new("A").owned_by("Sales")),
            Record::from(Step::new("B")),
        ];
        let options = BuildOptions {
            lanes: true,
            ..BuildOptions::default()
        };
        let err = build(&records, &options).unwrap_err();
        assert_eq!(
            err,
            Error::MissingRequiredField {
                field: "owner",
                index: 2,
                label: "B".to_string(),
            }
        );
        assert!(err.to_string().contains("owner"));
    }

    #[test]
    fn blank_owner_counts_as_missing() {
        let records = vec![Record::from(Step::new("A").owned_by("  "))];
        let options = BuildOptions {
            lanes: true,
            ..BuildOptions::default()
        };
        assert!(matches!(
            build(&records, &options),
            Err(Error::MissingRequiredField { field: "owner", .. })
        ));
    }

    #[test]
    fn blank_branch_name_is_rejected() {
        let records = vec![
            Record::from(Step::new("A")),
            Record::from(Decision::new("ok?", "Ship", " ")),
        ];
        let err = build(&records, &BuildOptions::default()).unwrap_err();
        assert_eq!(
            err,
            Error::MissingRequiredField {
                field: "on_false",
                index: 2,
                label: "ok?".to_string(),
            }
        );
    }

    #[test]
    fn blank_step_name_is_rejected() {
        let records = vec![Record::from(Step::new(""))];
        assert!(matches!(
            build(&records, &BuildOptions::default()),
            Err(Error::MissingRequiredField { field: "name", index: 1, .. })
        ));
    }

    #[test]
    fn blank_branch_owner_falls_back_to_decision_lane() {
        let mut decision = Decision::new("ok?", "Ship", "Cancel").owned_by("Sales");
        decision.on_true.owner = Some("  ".to_string());
        decision.on_false.owner = Some(" Warehouse ".to_string());
        let options = BuildOptions {
            lanes: true,
            ..BuildOptions::default()
        };
        let graph = build(&[Record::from(decision)], &options).unwrap();
        let owners: Vec<&str> = graph.lanes.iter().map(|l| l.owner.as_str()).collect();
        assert_eq!(owners, vec!["Sales", "Warehouse"]);
        assert_eq!(graph.node("Task_1").unwrap().lane.as_deref(), Some("Sales"));
        assert_eq!(graph.node("Task_2").unwrap().lane.as_deref(), Some("Warehouse"));
    }

    #[test]
    fn lanes_assign_owner_to_every_node() {
        let records = vec![
            Record::from(Step::new("Receive").owned_by("Sales")),
            Record::from(Decision::new("stock?", "Pick", "Backorder").owned_by("Warehouse")),
        ];
        let options = BuildOptions {
            lanes: true,
            ..BuildOptions::default()
        };
        let graph = build(&records, &options).unwrap();
        let owners: Vec<&str> = graph.lanes.iter().map(|l| l.owner.as_str()).collect();
        assert_eq!(owners, vec!["Sales", "Warehouse"]);
        assert!(graph.nodes.iter().all(|n| n.lane.is_some()));
        assert_eq!(graph.node("StartEvent_1").unwrap().lane.as_deref(), Some("Sales"));
        assert_eq!(graph.node("EndEvent_1").unwrap().lane.as_deref(), Some("Warehouse"));
    }

    #[test]
    fn lanes_disabled_leaves_nodes_unassigned() {
        let records = vec![Record::from(Step::new("A").owned_by("Sales"))];
        let graph = build(&records, &BuildOptions::default()).unwrap();
        assert!(graph.lanes.is_empty());
        assert!(graph.nodes.iter().all(|n| n.lane.is_none()));
    }

    #[test]
    fn layout_never_overlaps() {
        let records = vec![
            Record::from(Step::new("A")),
            Record::from(Decision::new("c1", "B", "C")),
            Record::from(Decision::new("c2", "D", "E")),
            Record::from(Step::new("F")),
        ];
        let graph = build(&records, &BuildOptions::default()).unwrap();
        for (i, a) in graph.nodes.iter().enumerate() {
            for b in &graph.nodes[i + 1..] {
                assert!(!a.bounds.overlaps(&b.bounds), "{} overlaps {}", a.id, b.id);
            }
        }
    }
}
