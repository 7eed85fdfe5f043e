//! Weft CLI - inspect and compile flow definitions

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing::debug;
use walkdir::WalkDir;

use weft::error::{FixSuggestion, WeftError};
use weft::{Flow, FlowDefinition};

const FLOW_SUFFIX: &str = ".flow.yaml";

#[derive(Parser)]
#[command(name = "weft")]
#[command(about = "Weft - flow definition and scheduling core")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and compile a flow file, or every *.flow.yaml under a directory
    Validate {
        /// Path to a .flow.yaml file or a directory
        path: PathBuf,
    },

    /// Print the compiled execution order
    Order {
        /// Path to .flow.yaml file
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show the direct upstream and downstream tasks of one task
    Show {
        /// Path to .flow.yaml file
        file: PathBuf,

        /// Task name
        task: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Validate { path } => validate(&path),
        Commands::Order { file, format } => order(&file, format),
        Commands::Show { file, task } => show(&file, &task),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        if let Some(suggestion) = e
            .downcast_ref::<WeftError>()
            .and_then(|err| err.fix_suggestion())
        {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Parse and build a flow, leaving the error untouched so the CLI can
/// still find its fix suggestion
fn load(file: &Path) -> anyhow::Result<Flow> {
    debug!(file = %file.display(), "loading flow definition");
    let flow = FlowDefinition::from_path(file)?.build()?;
    Ok(flow)
}

fn validate(path: &Path) -> anyhow::Result<()> {
    let files = if path.is_dir() {
        let files = discover(path)?;
        if files.is_empty() {
            bail!("No *{} files found under {}", FLOW_SUFFIX, path.display());
        }
        files
    } else {
        vec![path.to_path_buf()]
    };

    for file in &files {
        let flow = load(file)?;
        flow.validate()?;
        println!(
            "{} Flow '{}' is valid ({} tasks, {} edges)",
            "✓".green(),
            flow.name(),
            flow.len(),
            flow.edge_count()
        );
    }

    if files.len() > 1 {
        println!("  Checked {} flow files", files.len());
    }
    Ok(())
}

fn discover(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        let is_flow = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(FLOW_SUFFIX));
        if entry.file_type().is_file() && is_flow {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn order(file: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let flow = load(file)?;
    let plan = flow.plan()?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&plan).context("Failed to serialize plan")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            println!(
                "{} Execution order for flow '{}':",
                "→".cyan(),
                plan.flow.cyan().bold()
            );
            for task in &plan.tasks {
                println!("  {}. {}", task.position + 1, task.name);
            }
        }
    }
    Ok(())
}

fn show(file: &Path, name: &str) -> anyhow::Result<()> {
    let flow = load(file)?;
    let task = flow.get_task(name)?;

    let upstream = flow.upstream_tasks(&task)?;
    let downstream = flow.downstream_tasks(&task)?;

    println!("Task: {} ({})", task.name().bold(), task.id());
    println!("  Flow: {}", flow.name());
    println!("  Upstream: {}", join_names(&upstream));
    println!("  Downstream: {}", join_names(&downstream));
    Ok(())
}

fn join_names(tasks: &[weft::Task]) -> String {
    if tasks.is_empty() {
        return "(none)".to_string();
    }
    tasks
        .iter()
        .map(|t| t.name())
        .collect::<Vec<_>>()
        .join(", ")
}
