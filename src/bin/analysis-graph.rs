//! analysis-graph CLI: build and inspect analysis graphs from files.
//!
//! Usage:
//!   analysis-graph build <file> [--reference path] [--config path]
//!   analysis-graph unique <vis-file> [--reference path] [--config path]
//!   analysis-graph types [--reference path]

use analysis_graph::config::read_document;
use analysis_graph::{
    AnalysisNode, AnalysisReference, AnalysisResult, AnalysisService, CamshaftReference,
    ServiceConfig, VisualizationDefinition,
};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, Level};

#[derive(Parser)]
#[command(
    name = "analysis-graph",
    version,
    about = "Build and inspect map analysis graphs"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build one definition, or an array of definitions, and print the graph
    Build {
        /// JSON or YAML file holding the definition(s)
        file: PathBuf,
        /// Analysis-type reference (defaults to the builtin camshaft types)
        #[arg(long)]
        reference: Option<PathBuf>,
        /// Service configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Load a visualization document and print its unique analysis nodes
    Unique {
        /// JSON or YAML visualization document
        file: PathBuf,
        /// Analysis-type reference (defaults to the builtin camshaft types)
        #[arg(long)]
        reference: Option<PathBuf>,
        /// Service configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List analysis types known to the reference
    Types {
        /// Analysis-type reference (defaults to the builtin camshaft types)
        #[arg(long)]
        reference: Option<PathBuf>,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn load_reference(path: Option<&Path>) -> AnalysisResult<CamshaftReference> {
    match path {
        Some(path) => CamshaftReference::load(path),
        None => Ok(CamshaftReference::builtin()),
    }
}

/// Explicit `--config`, else the default location if it exists, else defaults
fn load_config(path: Option<&Path>) -> AnalysisResult<ServiceConfig> {
    if let Some(path) = path {
        return ServiceConfig::load(path);
    }
    match ServiceConfig::default_path() {
        Some(default) if default.exists() => {
            debug!(path = %default.display(), "using default config");
            ServiceConfig::load(default)
        }
        _ => Ok(ServiceConfig::default()),
    }
}

fn open_service(reference: Option<&Path>, config: Option<&Path>) -> AnalysisResult<AnalysisService> {
    AnalysisService::builder()
        .reference(load_reference(reference)?)
        .config(load_config(config)?)
        .build()
}

fn print_node_table(nodes: &[Arc<AnalysisNode>]) {
    println!("{:<36}  {:<24}  {:<24}  {:<10}", "ID", "TYPE", "SOURCES", "STATE");
    println!("{}", "-".repeat(100));
    for node in nodes {
        let sources: Vec<String> = node
            .sources()
            .iter()
            .map(|(name, source)| format!("{}={}", name, source.id()))
            .collect();
        let state = if node.is_complete() {
            format!("{:?}", node.state()).to_lowercase()
        } else {
            "incomplete".to_string()
        };
        println!(
            "{:<36}  {:<24}  {:<24}  {:<10}",
            node.id(),
            node.analysis_type(),
            sources.join(","),
            state
        );
    }
}

fn cmd_build(file: &Path, reference: Option<&Path>, config: Option<&Path>) -> AnalysisResult<()> {
    let service = open_service(reference, config)?;
    let definitions = match read_document::<Value>(file)? {
        Value::Array(items) => items,
        single => vec![single],
    };

    for definition in &definitions {
        let root = service.create_analysis_from_value(definition)?;
        println!("{}", serde_json::to_string_pretty(root.as_ref())?);
        for name in root.dropped_params() {
            eprintln!("Warning: dropped param '{}' on {}", name, root);
        }
    }
    println!();
    print_node_table(&service.nodes().nodes());
    Ok(())
}

fn cmd_unique(file: &Path, reference: Option<&Path>, config: Option<&Path>) -> AnalysisResult<()> {
    let mut service = open_service(reference, config)?;
    let vis = VisualizationDefinition::load(file)?;
    service.load_visualization(&vis)?;

    let unique = service.unique_analysis_nodes();
    if unique.is_empty() {
        println!("No analysis nodes referenced.");
        return Ok(());
    }
    for node in &unique {
        println!("{}", node.id());
    }
    Ok(())
}

fn cmd_types(reference: Option<&Path>) -> AnalysisResult<()> {
    let reference = load_reference(reference)?;
    println!("{:<24}  {:<32}  {}", "TYPE", "SOURCES", "PARAMS");
    println!("{}", "-".repeat(90));
    for analysis_type in reference.analysis_types() {
        let sources = reference.source_names(&analysis_type).unwrap_or_default();
        let params = reference.param_names(&analysis_type).unwrap_or_default();
        println!(
            "{:<24}  {:<32}  {}",
            analysis_type,
            sources.join(","),
            params.join(",")
        );
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Build {
            file,
            reference,
            config,
        } => cmd_build(&file, reference.as_deref(), config.as_deref()),
        Commands::Unique {
            file,
            reference,
            config,
        } => cmd_unique(&file, reference.as_deref(), config.as_deref()),
        Commands::Types { reference } => cmd_types(reference.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
