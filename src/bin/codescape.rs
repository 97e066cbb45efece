//! codescape CLI
//!
//! Scans a project, loads region data and mapping files, applies the mappings
//! and prints what every region would be rendered as.
//!
//! Logging goes to stderr so stdout stays machine-readable.

// Exclude from coverage - CLI binary tested via integration tests
#![cfg_attr(tarpaulin, ignore)]

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use codescape::{
    ApplyReport, Assignment, CollectingSink, MappingEntry, Project, PropertyKey, PropertyType, SoftwareSystemConfig,
    StructureOptions,
};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Map code metrics of a software structure onto colors and sizes.
#[derive(Parser, Debug)]
#[command(name = "codescape")]
#[command(version = codescape::VERSION)]
#[command(about = "Map code metrics of a software structure onto colors and sizes")]
#[command(after_help = "EXAMPLES:
  # Scan a project and apply the mappings found in its data directory
  codescape ./my_project --data-dir ./my_project_data

  # Explicit region and mapping files, JSON output
  codescape ./my_project --regions regions_main.json --mappings mappings_main.json --format json

  # Normalise against one folder only
  codescape ./my_project --data-dir ./data --scope src/core

  # Show which properties were loaded
  codescape ./my_project --data-dir ./data --list-properties
")]
struct Cli {
    /// Project root (defaults to the root of --system-config)
    #[arg(value_name = "ROOT")]
    root: Option<PathBuf>,

    /// Software-system config (JSON)
    #[arg(long = "system-config", value_name = "FILE")]
    system_config: Option<PathBuf>,

    /// Directory holding regions_*.json, edges_*.json and mappings_*.json
    #[arg(long = "data-dir", value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Region data file (repeatable)
    #[arg(long = "regions", value_name = "FILE")]
    regions: Vec<PathBuf>,

    /// Mapping file (repeatable)
    #[arg(long = "mappings", value_name = "FILE")]
    mappings: Vec<PathBuf>,

    /// Apply scope as a root-relative path (default: whole project)
    #[arg(long = "scope", value_name = "REL_PATH")]
    scope: Option<String>,

    /// Maximum folder depth; 0 = unlimited
    #[arg(long = "max-depth", value_name = "N")]
    max_depth: Option<usize>,

    /// Ignore pattern, glob or re:<regex> (repeatable)
    #[arg(long = "ignore", value_name = "PATTERN")]
    ignore: Vec<String>,

    /// Extension stripped from file names (repeatable)
    #[arg(long = "strip-ext", value_name = "EXT")]
    strip_ext: Vec<String>,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "text")]
    format: FormatArg,

    /// Print the loaded property names and exit
    #[arg(long = "list-properties")]
    list_properties: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn structure_options(cli: &Cli, config: Option<&SoftwareSystemConfig>) -> StructureOptions {
    let mut options = config.map(SoftwareSystemConfig::to_options).unwrap_or_default();
    if let Some(depth) = cli.max_depth {
        options.max_depth = depth;
    }
    options.ignore_patterns.extend(cli.ignore.iter().cloned());
    options.extensions_to_strip.extend(cli.strip_ext.iter().cloned());
    // deterministic output
    options.sorted = true;
    options
}

/// Add default entries for loaded properties nobody mapped
fn add_default_entries(project: &mut Project) {
    let keys: Vec<PropertyKey> = [PropertyType::Nfp, PropertyType::Feature]
        .into_iter()
        .flat_map(|kind| {
            project
                .property_index()
                .names(kind)
                .map(move |name| PropertyKey::new(kind, name))
                .collect::<Vec<_>>()
        })
        .collect();

    for key in keys {
        if project.registry().get_key(&key).is_none() {
            let entry = MappingEntry::default_for(&key);
            info!(%key, method = %entry.method_name, "using default mapping");
            project.registry_mut().upsert(entry);
        }
    }
}

fn print_properties(project: &Project) {
    for kind in [PropertyType::Nfp, PropertyType::Feature] {
        for name in project.property_index().names(kind) {
            println!("{}:{}", kind, name);
        }
    }
}

fn print_text(project: &Project, report: &ApplyReport, assignments: &[Assignment]) {
    let tree = project.tree();
    println!("codescape {}", codescape::VERSION);
    println!(
        "Structure: {} files, {} folders, {} regions",
        tree.file_count(),
        tree.folder_count(),
        tree.region_count()
    );
    let stats = project.load_stats();
    if stats.regions_rejected + stats.regions_unresolved + stats.properties_dropped > 0 {
        println!(
            "Skipped on load: {} rejected, {} unresolved regions, {} dropped properties",
            stats.regions_rejected, stats.regions_unresolved, stats.properties_dropped
        );
    }

    println!();
    println!("Entries:");
    for entry in &report.entries {
        let range = entry
            .range
            .map(|r| format!(" range={}", r))
            .unwrap_or_default();
        println!(
            "  {:<24} {:<14} {:<15} applied={} negative={} missing_target={}{}",
            entry.key.to_string(),
            entry.method,
            entry.outcome.as_str(),
            entry.counts.applied,
            entry.counts.skipped_negative,
            entry.counts.skipped_missing_target,
            range
        );
        if let Some(message) = &entry.message {
            println!("      {}", message);
        }
    }

    let t = &report.totals;
    println!();
    println!(
        "Totals: applied={} no_data={} negative={} inactive={} missing_target={} unknown_method={} invalid_method={}",
        t.applied,
        t.skipped_no_data,
        t.skipped_negative,
        t.skipped_inactive,
        t.skipped_missing_target,
        t.unknown_method,
        t.invalid_method
    );

    if !assignments.is_empty() {
        println!();
        println!("Assignments:");
        for a in assignments {
            println!("  {:<24} {}", a.region_id, a.value);
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let system_config = cli
        .system_config
        .as_deref()
        .map(SoftwareSystemConfig::from_file)
        .transpose()
        .context("failed to load system config")?;

    let root = match (&cli.root, system_config.as_ref().and_then(SoftwareSystemConfig::root_dir)) {
        (Some(root), _) => root.clone(),
        (None, Some(root)) => root,
        (None, None) => bail!("no project root given (pass ROOT or --system-config with a path)"),
    };

    let options = structure_options(&cli, system_config.as_ref());
    let mut project = Project::open(&root, &options)
        .with_context(|| format!("failed to scan project root '{}'", root.display()))?;

    if let Some(dir) = &cli.data_dir {
        project
            .load_data_dir(dir)
            .with_context(|| format!("failed to load data directory '{}'", dir.display()))?;
    }
    project
        .load_region_files(cli.regions.as_slice())
        .context("failed to load region files")?;
    project
        .load_mapping_files(cli.mappings.as_slice())
        .context("failed to load mapping files")?;

    if cli.list_properties {
        print_properties(&project);
        return Ok(());
    }

    add_default_entries(&mut project);

    let scope = project
        .scope_node(cli.scope.as_deref().unwrap_or(""))
        .context("invalid --scope")?;
    let mut sink = CollectingSink::new();
    let report = project.apply(scope, &mut sink);

    match cli.format {
        FormatArg::Json => {
            let doc = json!({
                "report": report,
                "assignments": sink.assignments(),
            });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        FormatArg::Text => print_text(&project, &report, sink.assignments()),
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
