//! Command-line interface for the inspection pipeline.

use anyhow::{bail, Context};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::{loaders, Table, Workspace};
use crate::processors::{
    discover_sources, CategorySplitter, InjectError, InjectReport, Injector, MergeSummary,
    ReshapeEngine, TableMerger,
};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "inspection-pipeline")]
#[command(about = "Bench instrument dump to report workbook pipeline", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Base directory holding CSV, CSV_LOG, templates and EXCEL
    #[arg(long, env = "ONEDRIVE_GRAPH", global = true)]
    base_dir: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge channel dumps from the instrument media into one table per source
    Import {
        /// Source directories (defaults to the configured media locations)
        #[arg(short, long)]
        source: Vec<PathBuf>,
        /// Date used in the output name (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Reshape merged tables into one sorted row per sample
    Reshape {
        /// Single merged table (defaults to every table in the CSV directory)
        input: Option<PathBuf>,
    },

    /// Append reshaped rows to the matching report template
    Inject {
        /// Reshaped tables (defaults to every reshaped table in the pivot directory)
        files: Vec<PathBuf>,
    },

    /// Export one CSV per category from reshaped tables
    Split {
        /// Reshaped tables (defaults to every reshaped table in the pivot directory)
        files: Vec<PathBuf>,
        /// Output directory (defaults to the pivot directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Draw one PNG line chart per channel of a merged table
    Chart {
        /// Merged table
        input: PathBuf,
        /// Output directory (defaults to the charts directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Import, reshape and inject in one go
    Run {
        #[arg(short, long)]
        source: Vec<PathBuf>,
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Write the default configuration as YAML
    InitConfig {
        /// Destination file
        #[arg(default_value = "pipeline.yaml")]
        path: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            let head: String = value.chars().take(36).collect();
            format!("{}...", head)
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let config = match load_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    if let Commands::InitConfig { path } = &cli.command {
        if let Err(e) = cmd_init_config(path, &config) {
            error!("{:#}", e);
            std::process::exit(1);
        }
        return;
    }

    let base = cli
        .base_dir
        .clone()
        .unwrap_or_else(|| config.paths.base_dir.clone());
    let workspace = Workspace::new(base, &config.paths);
    info!("Base directory: {}", workspace.base.display());

    match cli.command {
        Commands::Import { source, date } => {
            ensure_workspace(&workspace);
            cmd_import(&config, &workspace, &source, date);
        }
        Commands::Reshape { input } => {
            ensure_workspace(&workspace);
            cmd_reshape(&config, &workspace, input);
        }
        Commands::Inject { files } => {
            ensure_workspace(&workspace);
            cmd_inject(&config, &workspace, files);
        }
        Commands::Split { files, output_dir } => {
            cmd_split(&config, &workspace, files, output_dir);
        }
        Commands::Chart { input, output_dir } => {
            cmd_chart(&workspace, &input, output_dir);
        }
        Commands::Run { source, date } => {
            ensure_workspace(&workspace);
            cmd_run(&config, &workspace, &source, date);
        }
        Commands::InitConfig { .. } => {}
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let config = PipelineConfig::from_yaml(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    info!("Loaded config from: {}", path.display());
    Ok(config)
}

fn ensure_workspace(workspace: &Workspace) {
    match workspace.ensure() {
        Ok(created) => {
            for dir in created {
                println!("Created directory: {}", dir.display());
            }
        }
        Err(e) => {
            error!("Failed to prepare directories under {}: {}", workspace.base.display(), e);
            std::process::exit(1);
        }
    }
}

fn source_dirs(config: &PipelineConfig, overrides: &[PathBuf]) -> Vec<PathBuf> {
    if overrides.is_empty() {
        discover_sources(&config.import.source_dirs)
    } else {
        discover_sources(overrides)
    }
}

fn merge_stage<F>(
    config: &PipelineConfig,
    workspace: &Workspace,
    sources: &[PathBuf],
    date: NaiveDate,
    guard: F,
) -> MergeSummary
where
    F: Fn(&Table) -> Result<(), String>,
{
    let merger = match TableMerger::new(config, workspace) {
        Ok(m) => m,
        Err(e) => {
            error!("Invalid import settings: {}", e);
            std::process::exit(1);
        }
    };

    let spinner = create_spinner("Merging channel files...");
    let summary = merger.merge_sources_with(sources, date, guard);
    spinner.finish_and_clear();
    summary
}

fn cmd_import(
    config: &PipelineConfig,
    workspace: &Workspace,
    overrides: &[PathBuf],
    date: Option<NaiveDate>,
) {
    let start = Instant::now();
    let date = date.unwrap_or_else(|| Local::now().date_naive());

    let sources = source_dirs(config, overrides);
    if sources.is_empty() {
        warn!("No instrument source directory is available");
    }
    for dir in &sources {
        println!("Source: {}", dir.display());
    }

    let summary = merge_stage(config, workspace, &sources, date, |_| Ok(()));
    let produced = summary.produced();
    let outputs: Vec<String> = produced.iter().map(|r| file_name(&r.output)).collect();
    let channels: usize = produced.iter().map(|r| r.channels.len()).sum();

    print_summary(
        "Import Complete",
        &[
            ("Sources scanned", sources.len().to_string()),
            ("Tables written", produced.len().to_string()),
            ("Channels merged", channels.to_string()),
            ("Outputs", outputs.join(", ")),
            ("Failures", summary.failures().len().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    if !summary.failures().is_empty() && !summary.any_produced() {
        std::process::exit(1);
    }
}

fn reshape_engine(config: &PipelineConfig) -> ReshapeEngine {
    match ReshapeEngine::new(&config.layout, &config.sort) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Invalid sort settings: {}", e);
            std::process::exit(1);
        }
    }
}

fn reshape_stage(engine: &ReshapeEngine, inputs: &[PathBuf], workspace: &Workspace) -> Vec<PathBuf> {
    let spinner = create_spinner("Reshaping merged tables...");
    let results = engine.reshape_files(inputs, &workspace.pivot);
    spinner.finish_and_clear();

    results
        .into_iter()
        .filter_map(|(_, result)| result.ok())
        .collect()
}

fn cmd_reshape(config: &PipelineConfig, workspace: &Workspace, input: Option<PathBuf>) {
    let start = Instant::now();
    let engine = reshape_engine(config);

    let inputs = match input {
        Some(path) => vec![path],
        None => match engine.input_files(&workspace.csv) {
            Ok(files) => files,
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        },
    };
    if inputs.is_empty() {
        warn!("No merged tables found in {}", workspace.csv.display());
    }

    let outputs = reshape_stage(&engine, &inputs, workspace);
    let names: Vec<String> = outputs.iter().map(|p| file_name(p)).collect();

    print_summary(
        "Reshape Complete",
        &[
            ("Input tables", inputs.len().to_string()),
            ("Reshaped", outputs.len().to_string()),
            ("Output directory", workspace.pivot.display().to_string()),
            ("Outputs", names.join(", ")),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    if outputs.is_empty() && !inputs.is_empty() {
        std::process::exit(1);
    }
}

fn reshaped_inputs(injector: &Injector, workspace: &Workspace, files: Vec<PathBuf>) -> Vec<PathBuf> {
    if !files.is_empty() {
        return files;
    }
    match injector.reshaped_files(&workspace.pivot) {
        Ok(files) => files,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn inject_stage(injector: &Injector, files: &[PathBuf]) -> InjectReport {
    let spinner = create_spinner("Writing report workbook...");
    let result = injector.inject_files(files);
    spinner.finish_and_clear();

    match result {
        Ok(report) => {
            if report.degraded {
                warn!("No row matched a category; the default template was used");
            }
            report
        }
        Err(InjectError::MissingTemplate(path)) => {
            error!("Template not found: {}", path.display());
            std::process::exit(1);
        }
        Err(e) => {
            error!("Injection failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_inject_summary(report: &InjectReport, inputs: usize, start: Instant) {
    print_summary(
        "Injection Complete",
        &[
            ("Input tables", inputs.to_string()),
            ("Template", file_name(&report.template)),
            ("Categories", report.categories_used.join(", ")),
            ("Rows written", report.rows_written.to_string()),
            ("Rows skipped", report.skipped.to_string()),
            ("Degraded", report.degraded.to_string()),
            ("Output", file_name(&report.output)),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_inject(config: &PipelineConfig, workspace: &Workspace, files: Vec<PathBuf>) {
    let start = Instant::now();
    let injector = Injector::new(config, workspace);

    let inputs = reshaped_inputs(&injector, workspace, files);
    if inputs.is_empty() {
        warn!("No reshaped tables found in {}", workspace.pivot.display());
        return;
    }

    let report = inject_stage(&injector, &inputs);
    print_inject_summary(&report, inputs.len(), start);
}

fn cmd_split(
    config: &PipelineConfig,
    workspace: &Workspace,
    files: Vec<PathBuf>,
    output_dir: Option<PathBuf>,
) {
    let start = Instant::now();
    let splitter = match CategorySplitter::new(config) {
        Ok(s) => s,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    let injector = Injector::new(config, workspace);
    let inputs = reshaped_inputs(&injector, workspace, files);
    let output_dir = output_dir.unwrap_or_else(|| workspace.pivot.clone());

    let mut written = Vec::new();
    let mut failures = 0;
    for input in &inputs {
        match splitter.split_file(input, &output_dir) {
            Ok(paths) => written.extend(paths),
            Err(e) => {
                error!("Split of {} failed: {}", input.display(), e);
                failures += 1;
            }
        }
    }

    let names: Vec<String> = written.iter().map(|p| file_name(p)).collect();
    print_summary(
        "Split Complete",
        &[
            ("Input tables", inputs.len().to_string()),
            ("Files written", written.len().to_string()),
            ("Outputs", names.join(", ")),
            ("Failures", failures.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_chart(workspace: &Workspace, input: &Path, output_dir: Option<PathBuf>) {
    use crate::visualization;

    let start = Instant::now();
    let output_dir = output_dir.unwrap_or_else(|| workspace.charts.clone());

    let spinner = create_spinner("Loading merged table...");
    let table = match loaders::load_table_csv(input) {
        Ok(t) => t,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Failed to load {}: {}", input.display(), e);
            std::process::exit(1);
        }
    };

    spinner.set_message("Rendering charts...");
    match visualization::plot_channels(&table, &output_dir) {
        Ok(results) => {
            spinner.finish_and_clear();
            let rendered = results.iter().filter(|(_, r)| r.is_ok()).count();
            for (channel, result) in &results {
                if let Err(e) = result {
                    warn!("No chart for {}: {}", channel, e);
                }
            }

            print_summary(
                "Charts Complete",
                &[
                    ("Input file", input.display().to_string()),
                    ("Channels", results.len().to_string()),
                    ("Charts written", rendered.to_string()),
                    ("Output directory", output_dir.display().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Chart rendering failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_run(
    config: &PipelineConfig,
    workspace: &Workspace,
    overrides: &[PathBuf],
    date: Option<NaiveDate>,
) {
    let start = Instant::now();
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    let engine = reshape_engine(config);
    let injector = Injector::new(config, workspace);

    // Sources are deleted by the merge, so the template their channels
    // resolve to must exist before anything is written
    let sources = source_dirs(config, overrides);
    let summary = merge_stage(config, workspace, &sources, date, |table| {
        let channels = table.header().iter().skip(1).map(|s| s.trim());
        injector
            .resolve_template(channels)
            .map(|_| ())
            .map_err(|e| e.to_string())
    });
    if !summary.any_produced() {
        warn!("Nothing was merged; stopping before reshape");
        print_summary(
            "Run Stopped",
            &[
                ("Sources scanned", sources.len().to_string()),
                ("Failures", summary.failures().len().to_string()),
                ("Duration", format!("{:.2?}", start.elapsed())),
            ],
        );
        if !summary.failures().is_empty() {
            std::process::exit(1);
        }
        return;
    }

    let merged: Vec<PathBuf> = summary.produced().iter().map(|r| r.output.clone()).collect();
    let reshaped = reshape_stage(&engine, &merged, workspace);
    if reshaped.is_empty() {
        error!("No merged table could be reshaped");
        std::process::exit(1);
    }

    let report = inject_stage(&injector, &reshaped);
    print_inject_summary(&report, reshaped.len(), start);
}

fn cmd_init_config(path: &Path, config: &PipelineConfig) -> anyhow::Result<()> {
    if path.exists() {
        bail!("refusing to overwrite {}", path.display());
    }
    config
        .to_yaml(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote configuration to {}", path.display());
    Ok(())
}
