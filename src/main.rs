use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use procflow::{BranchPolicy, ExtractMode, Options, Record, Schema};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "procflow",
    about = "Convert a step/decision procedure into a BPMN or draw.io flowchart"
)]
struct Cli {
    /// Input text file (reads from stdin if not provided)
    file: Option<PathBuf>,

    /// Output document format
    #[arg(long, short = 's', value_enum, default_value_t = SchemaCli::Bpmn)]
    schema: SchemaCli,

    /// Line tagging convention of the input
    #[arg(long, value_enum, default_value_t = ModeCli::Auto)]
    mode: ModeCli,

    /// What happens after the two branches of a decision
    #[arg(long, value_enum, default_value_t = PolicyCli::Reconverge)]
    policy: PolicyCli,

    /// Group nodes into one lane per owner (every record needs an owner)
    #[arg(long)]
    lanes: bool,

    /// Omit the BPMN diagram-interchange block
    #[arg(long)]
    no_di: bool,

    /// Write the document to this file instead of stdout
    #[arg(long, short = 'o', conflicts_with = "output_dir")]
    output: Option<PathBuf>,

    /// Write the document into this directory as flowchart_<timestamp>.<ext>
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Print the extracted records as JSON and stop
    #[arg(long, conflicts_with = "records")]
    dump_records: bool,

    /// Build from a JSON record list (as printed by --dump-records) instead of text
    #[arg(long)]
    records: Option<PathBuf>,

    /// Reject inputs larger than this many bytes
    #[arg(long, default_value_t = procflow::DEFAULT_MAX_INPUT_BYTES)]
    max_input_bytes: usize,

    /// Log pipeline details to stderr
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SchemaCli {
    Bpmn,
    Drawio,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeCli {
    Auto,
    Prose,
    Tagged,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyCli {
    Reconverge,
    Diverge,
}

impl From<SchemaCli> for Schema {
    fn from(s: SchemaCli) -> Self {
        match s {
            SchemaCli::Bpmn => Schema::Bpmn,
            SchemaCli::Drawio => Schema::Drawio,
        }
    }
}

impl From<ModeCli> for ExtractMode {
    fn from(m: ModeCli) -> Self {
        match m {
            ModeCli::Auto => ExtractMode::Auto,
            ModeCli::Prose => ExtractMode::Prose,
            ModeCli::Tagged => ExtractMode::Tagged,
        }
    }
}

impl From<PolicyCli> for BranchPolicy {
    fn from(p: PolicyCli) -> Self {
        match p {
            PolicyCli::Reconverge => BranchPolicy::Reconverge,
            PolicyCli::Diverge => BranchPolicy::Diverge,
        }
    }
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Pipeline(#[from] procflow::Error),

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid record list: {0}")]
    Records(#[from] serde_json::Error),
}

impl CliError {
    fn is_warning(&self) -> bool {
        matches!(self, CliError::Pipeline(e) if e.is_warning())
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .without_time(),
        )
        .init();

    if let Err(e) = run(&cli) {
        if e.is_warning() {
            eprintln!("WARNING: {e}");
            std::process::exit(2);
        }
        eprintln!("ERROR: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let options = Options {
        mode: cli.mode.into(),
        policy: cli.policy.into(),
        lanes: cli.lanes,
        schema: cli.schema.into(),
        diagram_interchange: !cli.no_di,
        max_input_bytes: cli.max_input_bytes,
    };

    let document = match &cli.records {
        Some(path) => {
            let text = read_file(path)?;
            procflow::check_input_size(&text, options.max_input_bytes)?;
            let records: Vec<Record> = serde_json::from_str(&text)?;
            if records.is_empty() {
                return Err(procflow::Error::ExtractionEmpty.into());
            }
            procflow::generate_from_records(&records, &options)?
        }
        None => {
            let input = read_input(cli.file.as_deref())?;
            if cli.dump_records {
                procflow::check_input_size(&input, options.max_input_bytes)?;
                let records = procflow::extract_with_mode(&input, options.mode);
                println!("{}", serde_json::to_string_pretty(&records)?);
                return Ok(());
            }
            procflow::generate_with_options(&input, &options)?
        }
    };

    write_output(cli, &document, options.schema)
}

fn read_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.display().to_string(),
        source,
    })
}

fn read_input(file: Option<&Path>) -> Result<String, CliError> {
    match file {
        Some(path) => read_file(path),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|source| CliError::Read {
                    path: "stdin".to_string(),
                    source,
                })?;
            Ok(buf)
        }
    }
}

fn write_output(cli: &Cli, document: &str, schema: Schema) -> Result<(), CliError> {
    let path = match (&cli.output, &cli.output_dir) {
        (Some(path), _) => path.clone(),
        (None, Some(dir)) => {
            let now = chrono::Local::now().naive_local();
            dir.join(procflow::suggested_filename(schema, now))
        }
        (None, None) => {
            print!("{document}");
            return Ok(());
        }
    };

    std::fs::write(&path, document).map_err(|source| CliError::Write {
        path: path.display().to_string(),
        source,
    })?;
    info!(path = %path.display(), media_type = schema.media_type(), "flowchart written");
    eprintln!("wrote {}", path.display());
    Ok(())
}
