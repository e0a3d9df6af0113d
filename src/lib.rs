pub mod ast;
pub mod bpmn_renderer;
pub mod builder;
pub mod display_width;
pub mod drawio_renderer;
pub mod error;
pub mod flow_graph;
pub mod layout;
pub mod parser;
pub mod xml;

use chrono::NaiveDateTime;
use tracing::{debug, warn};

pub use ast::{Branch, Decision, Record, Step};
pub use builder::{BranchPolicy, BuildOptions, build};
pub use error::Error;
pub use flow_graph::FlowGraph;
pub use parser::{ExtractMode, extract, extract_with_mode};

pub const DEFAULT_MAX_INPUT_BYTES: usize = 1024 * 1024;

/// Target document format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Schema {
    /// BPMN 2.0 process definition.
    #[default]
    Bpmn,
    /// draw.io / mxGraph diagram model.
    Drawio,
}

impl Schema {
    pub fn extension(self) -> &'static str {
        match self {
            Schema::Bpmn => "bpmn",
            Schema::Drawio => "xml",
        }
    }

    /// Media type hint for whoever downloads or displays the document.
    pub fn media_type(self) -> &'static str {
        "application/xml"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub mode: ExtractMode,
    pub policy: BranchPolicy,
    pub lanes: bool,
    pub schema: Schema,
    /// Include the BPMN diagram-interchange block. Ignored for draw.io.
    pub diagram_interchange: bool,
    pub max_input_bytes: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            mode: ExtractMode::Auto,
            policy: BranchPolicy::Reconverge,
            lanes: false,
            schema: Schema::Bpmn,
            diagram_interchange: true,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }
}

impl Options {
    fn build_options(&self) -> BuildOptions {
        BuildOptions {
            policy: self.policy,
            lanes: self.lanes,
        }
    }
}

pub fn generate(input: &str) -> Result<String, Error> {
    generate_with_options(input, &Options::default())
}

/// Extract, build and emit in one call.
pub fn generate_with_options(input: &str, options: &Options) -> Result<String, Error> {
    check_input_size(input, options.max_input_bytes)?;

    let records = extract_with_mode(input, options.mode);
    if records.is_empty() {
        warn!("no records recovered from input");
        return Err(Error::ExtractionEmpty);
    }
    generate_from_records(&records, options)
}

/// Build and emit from an already extracted (possibly hand-edited) record list.
pub fn generate_from_records(records: &[Record], options: &Options) -> Result<String, Error> {
    let graph = build(records, &options.build_options())?;
    graph.check_integrity()?;
    emit(&graph, options)
}

/// Rejects text (prose or a JSON record list) longer than `limit` bytes.
pub fn check_input_size(input: &str, limit: usize) -> Result<(), Error> {
    if input.len() > limit {
        return Err(Error::InputTooLarge {
            len: input.len(),
            limit,
        });
    }
    Ok(())
}

pub fn emit(graph: &FlowGraph, options: &Options) -> Result<String, Error> {
    debug!(schema = ?options.schema, "emitting document");
    match options.schema {
        Schema::Bpmn => bpmn_renderer::render(graph, options.diagram_interchange),
        Schema::Drawio => drawio_renderer::render(graph),
    }
}

/// `flowchart_<YYYYMMDDHHMMSS>.<ext>`
pub fn suggested_filename(schema: Schema, timestamp: NaiveDateTime) -> String {
    format!(
        "flowchart_{}.{}",
        timestamp.format("%Y%m%d%H%M%S"),
        schema.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    #[test]
    fn generate_rejects_input_without_records() {
        let err = generate("just some prose\nwith no markers\n").unwrap_err();
        assert_eq!(err, Error::ExtractionEmpty);
        assert!(err.is_warning());
    }

    #[test]
    fn generate_rejects_oversized_input() {
        let options = Options {
            max_input_bytes: 8,
            ..Options::default()
        };
        let err = generate_with_options("Step: far too long", &options).unwrap_err();
        assert_eq!(err, Error::InputTooLarge { len: 18, limit: 8 });
        assert!(!err.is_warning());
    }

    #[test]
    fn generate_bpmn_by_default() {
        let doc = generate("Step: A\n").unwrap();
        assert!(doc.starts_with("<?xml"));
        assert!(doc.contains("<definitions"));
        assert!(doc.contains("<task id=\"Task_1\" name=\"A\"/>"));
    }

    #[test]
    fn generate_drawio_when_selected() {
        let options = Options {
            schema: Schema::Drawio,
            ..Options::default()
        };
        let doc = generate_with_options("Step: A\n", &options).unwrap();
        assert!(doc.contains("<mxGraphModel"));
        assert!(!doc.contains("<definitions"));
    }

    #[test]
    fn lanes_without_owners_fail_before_emitting() {
        let options = Options {
            lanes: true,
            ..Options::default()
        };
        let err = generate_with_options("Step: A\n", &options).unwrap_err();
        assert!(matches!(err, Error::MissingRequiredField { field: "owner", .. }));
    }

    #[test]
    fn long_input_within_the_cap_generates_quickly() {
        let input = "Step: a\n".repeat(100_000);
        assert!(input.len() <= DEFAULT_MAX_INPUT_BYTES);
        let started = std::time::Instant::now();
        let doc = generate(&input).unwrap();
        assert!(doc.contains("<task id=\"Task_100000\" name=\"a\"/>"));
        assert!(started.elapsed().as_secs() < 30, "took {:?}", started.elapsed());
    }

    #[test]
    fn input_size_check_counts_bytes() {
        assert_eq!(check_input_size("abcd", 4), Ok(()));
        assert_eq!(
            check_input_size("ab\u{e9}", 3),
            Err(Error::InputTooLarge { len: 4, limit: 3 })
        );
    }

    #[test]
    fn records_with_blank_branch_are_rejected() {
        let records = vec![Record::from(Decision::new("c", "", ""))];
        let err = generate_from_records(&records, &Options::default()).unwrap_err();
        assert_eq!(
            err,
            Error::MissingRequiredField {
                field: "on_true",
                index: 1,
                label: "c".to_string(),
            }
        );
    }

    #[test]
    fn filename_carries_timestamp_and_extension() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 1)
            .unwrap();
        assert_eq!(suggested_filename(Schema::Bpmn, ts), "flowchart_20240309070501.bpmn");
        assert_eq!(suggested_filename(Schema::Drawio, ts), "flowchart_20240309070501.xml");
    }
}
