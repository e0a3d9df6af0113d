use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};
use winnow::prelude::*;
use winnow::ascii::{Caseless, digit0, space0};
use winnow::combinator::{alt, delimited, not, opt, terminated};
use winnow::token::{one_of, rest, take_while};

use crate::ast::*;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExtractMode {
    /// Bracket-tag mode when any line carries a recognised `[TAG]`, prose otherwise.
    #[default]
    Auto,
    Prose,
    Tagged,
}

/// What a single trimmed input line means to the extractor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineTag<'s> {
    Step(&'s str),
    If(&'s str),
    Else,
    Text(&'s str),
    Open(&'s str),
    Owner(&'s str),
    Condition(&'s str),
    Yes(&'s str),
    No(&'s str),
}

impl<'s> LineTag<'s> {
    fn is_bracket_tag(&self) -> bool {
        matches!(
            self,
            LineTag::Open(_)
                | LineTag::Owner(_)
                | LineTag::Condition(_)
                | LineTag::Yes(_)
                | LineTag::No(_)
        )
    }

    /// Text carried by the line once its marker is stripped.
    fn payload(&self) -> &'s str {
        match *self {
            LineTag::Else => "",
            LineTag::Step(s)
            | LineTag::If(s)
            | LineTag::Text(s)
            | LineTag::Open(s)
            | LineTag::Owner(s)
            | LineTag::Condition(s)
            | LineTag::Yes(s)
            | LineTag::No(s) => s,
        }
    }
}

pub fn extract(input: &str) -> Vec<Record> {
    extract_with_mode(input, ExtractMode::Auto)
}

pub fn extract_with_mode(input: &str, mode: ExtractMode) -> Vec<Record> {
    let tags: Vec<LineTag<'_>> = lines(input).map(classify).collect();

    let mode = match mode {
        ExtractMode::Auto if tags.iter().any(LineTag::is_bracket_tag) => ExtractMode::Tagged,
        ExtractMode::Auto => ExtractMode::Prose,
        explicit => explicit,
    };
    debug!(lines = tags.len(), ?mode, "extracting records");

    let records = match mode {
        ExtractMode::Tagged => tags
            .into_iter()
            .fold(TaggedState::default(), TaggedState::feed)
            .finish(),
        _ => tags
            .into_iter()
            .fold(ProseState::default(), ProseState::feed)
            .finish(),
    };
    debug!(records = records.len(), "extraction finished");
    records
}

/// Non-empty trimmed lines, blank lines skipped.
pub fn lines(input: &str) -> impl Iterator<Item = &str> {
    input.lines().map(str::trim).filter(|l| !l.is_empty())
}

pub fn classify(line: &str) -> LineTag<'_> {
    let line = line.trim();
    let mut input = line;
    alt((bracket_tag, else_line, if_line, step_line))
        .parse_next(&mut input)
        .unwrap_or(LineTag::Text(line))
}

// --- prose mode ---

#[derive(Debug, Default)]
struct ProseState {
    records: Vec<Record>,
    pending: Option<PendingDecision>,
}

#[derive(Debug)]
struct PendingDecision {
    condition: String,
    on_true: Option<String>,
}

impl ProseState {
    fn feed(mut self, tag: LineTag<'_>) -> Self {
        match tag {
            LineTag::If(condition) => {
                let next = PendingDecision {
                    condition: condition.to_string(),
                    on_true: None,
                };
                if let Some(dropped) = self.pending.replace(next) {
                    warn!(condition = %dropped.condition, "dropping decision without both branches");
                }
            }
            LineTag::Else => {}
            other => {
                let text = other.payload();
                if text.is_empty() {
                    return self;
                }
                match self.pending.take() {
                    Some(PendingDecision {
                        condition,
                        on_true: None,
                    }) => {
                        self.pending = Some(PendingDecision {
                            condition,
                            on_true: Some(text.to_string()),
                        });
                    }
                    Some(PendingDecision {
                        condition,
                        on_true: Some(on_true),
                    }) if condition.is_empty() => {
                        warn!(%on_true, on_false = text, "dropping decision without a condition");
                    }
                    Some(PendingDecision {
                        condition,
                        on_true: Some(on_true),
                    }) => {
                        self.records
                            .push(Decision::new(condition, on_true, text).into());
                    }
                    None => {
                        if let LineTag::Step(name) = other {
                            self.records.push(Step::new(name).into());
                        }
                    }
                }
            }
        }
        self
    }

    fn finish(self) -> Vec<Record> {
        if let Some(dropped) = self.pending {
            warn!(condition = %dropped.condition, "dropping decision left open at end of input");
        }
        self.records
    }
}

// --- bracket-tag mode ---

#[derive(Debug, Default)]
struct TaggedState {
    records: Vec<Record>,
    open: Option<OpenRecord>,
}

#[derive(Debug, Default)]
struct OpenRecord {
    name: Option<String>,
    owner: Option<String>,
    condition: Option<String>,
    on_true: Option<String>,
    on_false: Option<String>,
}

impl OpenRecord {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.owner.is_none()
            && self.condition.is_none()
            && self.on_true.is_none()
            && self.on_false.is_none()
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

impl TaggedState {
    fn feed(mut self, tag: LineTag<'_>) -> Self {
        match tag {
            LineTag::Open(name) => {
                self.flush();
                self.open = Some(OpenRecord {
                    name: non_empty(name),
                    ..OpenRecord::default()
                });
            }
            LineTag::Owner(v) => self.current().owner = non_empty(v),
            LineTag::Condition(v) => self.current().condition = non_empty(v),
            LineTag::Yes(v) => self.current().on_true = non_empty(v),
            LineTag::No(v) => self.current().on_false = non_empty(v),
            _ => {}
        }
        self
    }

    fn current(&mut self) -> &mut OpenRecord {
        self.open.get_or_insert_with(OpenRecord::default)
    }

    fn flush(&mut self) {
        let Some(open) = self.open.take() else {
            return;
        };
        if open.is_empty() {
            return;
        }

        if let Some(name) = open.name {
            self.records.push(
                Step {
                    name,
                    owner: open.owner.clone(),
                }
                .into(),
            );
        }

        if let Some(condition) = open.condition {
            match (open.on_true, open.on_false) {
                (Some(on_true), Some(on_false)) => {
                    let mut decision = Decision::new(condition, on_true, on_false);
                    decision.owner = open.owner;
                    self.records.push(decision.into());
                }
                _ => warn!(%condition, "dropping decision without both branches"),
            }
        }
    }

    fn finish(mut self) -> Vec<Record> {
        self.flush();
        resolve_branches(self.records)
    }
}

/// Lends declared steps' owners to the decision branches naming them. A step
/// declared after the decision that names it is that branch's body and leaves
/// the main line; an earlier one has already run in sequence and stays.
fn resolve_branches(records: Vec<Record>) -> Vec<Record> {
    let mut referenced: HashSet<String> = HashSet::new();
    let mut owners: HashMap<String, Option<String>> = HashMap::new();
    let mut kept: Vec<Record> = Vec::with_capacity(records.len());
    for record in records {
        match record {
            Record::Step(step) if referenced.contains(&step.name) => {
                debug!(step = %step.name, "step absorbed into decision branch");
                owners.entry(step.name).or_insert(step.owner);
            }
            Record::Step(step) => {
                owners
                    .entry(step.name.clone())
                    .or_insert_with(|| step.owner.clone());
                kept.push(Record::Step(step));
            }
            Record::Decision(d) => {
                referenced.insert(d.on_true.name.clone());
                referenced.insert(d.on_false.name.clone());
                kept.push(Record::Decision(d));
            }
        }
    }

    for record in &mut kept {
        if let Record::Decision(d) = record {
            for branch in [&mut d.on_true, &mut d.on_false] {
                if branch.owner.is_none() {
                    branch.owner = owners.get(&branch.name).cloned().flatten();
                }
            }
        }
    }
    kept
}

// --- line parsers ---

fn word_end(input: &mut &str) -> winnow::Result<()> {
    not(one_of(|c: char| c.is_alphanumeric())).parse_next(input)
}

fn payload<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    rest.map(str::trim).parse_next(input)
}

fn step_line<'s>(input: &mut &'s str) -> winnow::Result<LineTag<'s>> {
    terminated(Caseless("step"), word_end).parse_next(input)?;
    space0.parse_next(input)?;
    digit0.parse_next(input)?;
    space0.parse_next(input)?;
    opt(one_of([':', '.', '-', ')'])).parse_next(input)?;
    let name = payload.parse_next(input)?;
    Ok(LineTag::Step(name))
}

fn if_line<'s>(input: &mut &'s str) -> winnow::Result<LineTag<'s>> {
    terminated(Caseless("if"), word_end).parse_next(input)?;
    let condition = payload.parse_next(input)?;
    Ok(LineTag::If(condition.trim_end_matches(':').trim_end()))
}

fn else_line<'s>(input: &mut &'s str) -> winnow::Result<LineTag<'s>> {
    terminated(alt((Caseless("otherwise"), Caseless("else"))), word_end).parse_next(input)?;
    rest.void().parse_next(input)?;
    Ok(LineTag::Else)
}

fn bracket_tag<'s>(input: &mut &'s str) -> winnow::Result<LineTag<'s>> {
    let name = delimited(
        '[',
        take_while(1.., |c: char| c.is_ascii_alphabetic() || c == '_'),
        ']',
    )
    .parse_next(input)?;
    space0.parse_next(input)?;
    opt(':').parse_next(input)?;
    let value = payload.parse_next(input)?;

    let tag = match name.to_ascii_lowercase().as_str() {
        "step" => LineTag::Open(value),
        "owner" => LineTag::Owner(value),
        "if" | "condition" => LineTag::Condition(value),
        "yes" | "true" => LineTag::Yes(value),
        "no" | "false" => LineTag::No(value),
        _ => return Err(winnow::error::ParserError::from_input(input)),
    };
    Ok(tag)
}
