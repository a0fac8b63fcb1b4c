use crate::config::SpeculatorConfig;
use crate::logging::{init_logging, LogConfig};
use crate::spec::{MethodSet, Spec, SpecError, Telemetry};
use crate::validator::{print_issues, validate_document_with_separator};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Command-line interface for speculator
///
/// Learns Swagger 2.0 documents from captured traffic and inspects existing ones.
#[derive(Parser)]
#[command(name = "speculator")]
#[command(about = "Infer Swagger 2.0 specs from observed HTTP traffic", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Learn a spec from telemetry and print the generated document
    Learn {
        /// File with one telemetry JSON object per line
        #[arg(short, long)]
        telemetry: PathBuf,

        /// Host of the monitored service
        #[arg(long)]
        host: String,

        /// Port of the monitored service
        #[arg(long, default_value = "")]
        port: String,

        /// Reference spec (YAML or JSON) to compare learned paths against
        #[arg(long)]
        provided: Option<PathBuf>,

        /// Output encoding
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Write the document here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Resolve concrete paths to the templates of a spec
    Resolve {
        /// Path to the Swagger 2.0 document (YAML or JSON)
        #[arg(short, long)]
        spec: PathBuf,

        /// Concrete request paths, e.g. /pets/42
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Validate a Swagger 2.0 document
    Validate {
        /// Path to the Swagger 2.0 document (YAML or JSON)
        #[arg(short, long)]
        spec: PathBuf,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

/// Parse the process arguments, set up logging and execute the command
///
/// # Errors
///
/// Returns an error if logging cannot be initialized or the command fails.
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&LogConfig::from_env())?;
    run(cli)
}

/// Execute an already parsed command
///
/// # Errors
///
/// Returns an error if an input file cannot be read, a spec is invalid, or the generated
/// document cannot be written.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Learn {
            telemetry,
            host,
            port,
            provided,
            format,
            out,
        } => learn(
            &telemetry,
            host,
            port,
            provided.as_deref(),
            format,
            out.as_deref(),
        ),
        Commands::Resolve { spec, paths } => resolve(&spec, &paths),
        Commands::Validate { spec } => validate(&spec),
    }
}

fn load_provided(spec: &Spec, path: &Path) -> anyhow::Result<()> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    match spec.load_provided_spec(&raw) {
        Err(SpecError::SpecValidation(issues)) => {
            print_issues(&issues);
            bail!("{} is not a valid Swagger 2.0 document", path.display())
        }
        other => other.with_context(|| format!("failed to load {}", path.display())),
    }
}

fn learn(
    telemetry_path: &Path,
    host: String,
    port: String,
    provided: Option<&Path>,
    format: OutputFormat,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let spec = Spec::with_config(host, port, SpeculatorConfig::from_env());
    if let Some(provided) = provided {
        load_provided(&spec, provided)?;
    }

    let file = File::open(telemetry_path)
        .with_context(|| format!("failed to open {}", telemetry_path.display()))?;
    let mut learned = 0usize;
    let mut dropped = 0usize;
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", telemetry_path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let telemetry: Telemetry = match serde_json::from_str(&line) {
            Ok(telemetry) => telemetry,
            Err(e) => {
                warn!(line = index + 1, error = %e, "skipping unparsable telemetry");
                dropped += 1;
                continue;
            }
        };
        match spec.learn_telemetry(&telemetry) {
            Ok(()) => learned += 1,
            Err(e) => {
                warn!(line = index + 1, error = %e, "telemetry sample dropped");
                dropped += 1;
            }
        }
    }
    info!(learned, dropped, "telemetry processed");

    spec.approve_learning_spec();
    if spec.has_provided_spec() {
        report_unknown_paths(&spec)?;
    }

    let rendered = match format {
        OutputFormat::Json => spec.generate_document_json(),
        OutputFormat::Yaml => spec.generate_document_yaml().map(String::into_bytes),
    };
    let rendered = match rendered {
        Err(SpecError::SpecValidation(issues)) => {
            print_issues(&issues);
            bail!("generated document failed validation")
        }
        other => other?,
    };

    match out {
        Some(path) => fs::write(path, &rendered)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&rendered)?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

/// Log learned paths the provided spec does not describe
fn report_unknown_paths(spec: &Spec) -> anyhow::Result<()> {
    let learned = spec.learning_spec()?;
    let mut unknown = 0usize;
    for (path, item) in &learned.path_items {
        let described = spec
            .resolve_provided_path(path)
            .map(|(_, methods)| methods)
            .unwrap_or_default();
        let missing: MethodSet = item.methods().difference(&described).copied().collect();
        if !missing.is_empty() {
            unknown += 1;
            warn!(path = %path, methods = ?missing, "observed operations missing from provided spec");
        }
    }
    info!(unknown, total = learned.path_items.len(), "compared with provided spec");
    Ok(())
}

fn resolve(spec_path: &Path, paths: &[String]) -> anyhow::Result<()> {
    let spec = Spec::with_config("", "", SpeculatorConfig::from_env());
    load_provided(&spec, spec_path)?;

    let mut stdout = io::stdout().lock();
    for path in paths {
        match spec.resolve_provided_path(path) {
            Some((template, methods)) => {
                let methods: Vec<String> = methods.iter().map(ToString::to_string).collect();
                writeln!(stdout, "{path} -> {template} [{}]", methods.join(", "))?;
            }
            None => writeln!(stdout, "{path} -> <none>")?,
        }
    }
    Ok(())
}

fn validate(spec_path: &Path) -> anyhow::Result<()> {
    let raw = fs::read(spec_path).with_context(|| format!("failed to read {}", spec_path.display()))?;
    let document: Value = serde_yaml::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", spec_path.display()))?;
    let separator = SpeculatorConfig::from_env().path_separator;
    match validate_document_with_separator(&document, &separator) {
        Ok(()) => {
            println!("✅ {} is a valid Swagger 2.0 document", spec_path.display());
            Ok(())
        }
        Err(issues) => {
            print_issues(&issues);
            bail!("{} issue(s) found in {}", issues.len(), spec_path.display())
        }
    }
}
