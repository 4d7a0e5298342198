use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use runlens::io::{format_conflicts, format_correlation, format_diff, format_resolution, write_json};
use runlens::{
    apply_transitions, correlate, detect_conflicts, diff, load_snapshot, resolve_group,
    ConflictReport, CorrelationReport, CorrelatorConfig, DiffReport, DivergenceConfig,
    ResolutionStrategy, RunSnapshot,
};

#[derive(Parser)]
#[command(name = "runlens")]
#[command(author, version, about = "Analyze voice agent test runs", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Attribute tool calls to the assistant turns that made them
    Correlate {
        /// Run snapshot (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the machine-readable report (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Window tail after the final assistant turn, in milliseconds
        #[arg(long, default_value = "500")]
        grace_ms: u64,

        /// Set aside framework-internal observations
        #[arg(long)]
        exclude_internal: bool,
    },

    /// Compare the transcripts of two runs of the same test
    Diff {
        /// Baseline run snapshot (JSON)
        #[arg(long)]
        base: PathBuf,

        /// Run snapshot to compare against the baseline (JSON)
        #[arg(long)]
        compare: PathBuf,

        /// Word similarity below which turns count as modified
        #[arg(long, default_value = "0.8")]
        threshold: f64,

        /// Output file for the machine-readable report (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List pending fixes that compete for the same location
    Conflicts {
        /// Run snapshot (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the machine-readable report (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Settle one conflict group
    Resolve {
        /// Run snapshot (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Group key, `target_file::location`
        #[arg(long)]
        group: String,

        /// first, second, skip or merge
        #[arg(long)]
        strategy: ResolutionStrategy,

        /// Listing order of the group's fix IDs, used to break ties
        #[arg(long, value_delimiter = ',')]
        order: Vec<String>,

        /// Write the snapshot with updated fix statuses here (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Correlate {
            input,
            output,
            grace_ms,
            exclude_internal,
        } => {
            let config = CorrelatorConfig {
                grace_ms,
                exclude_internal,
                ..Default::default()
            };
            correlate_run(input, output, &config).await
        }
        Commands::Diff {
            base,
            compare,
            threshold,
            output,
        } => {
            let config = DivergenceConfig {
                similarity_threshold: threshold,
            };
            diff_runs(base, compare, output, &config).await
        }
        Commands::Conflicts { input, output } => list_conflicts(input, output).await,
        Commands::Resolve {
            input,
            group,
            strategy,
            order,
            output,
        } => resolve_conflict(input, group, strategy, order, output).await,
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

async fn load(path: &Path) -> Result<RunSnapshot> {
    info!("Loading run snapshot from {:?}", path);
    let snapshot = load_snapshot(path).await?;
    info!(
        "Loaded {}: {} turns, {} calls, {} fixes",
        snapshot.label(),
        snapshot.turns.len(),
        snapshot.calls.len(),
        snapshot.fixes.len()
    );
    Ok(snapshot)
}

async fn correlate_run(
    input: PathBuf,
    output: Option<PathBuf>,
    config: &CorrelatorConfig,
) -> Result<()> {
    let snapshot = load(&input).await?;
    let correlation = correlate(&snapshot.turns, &snapshot.calls, config);

    if !correlation.unassociated.is_empty() {
        warn!(
            "{} calls fall outside every assistant turn window",
            correlation.unassociated.len()
        );
    }

    print!("{}", format_correlation(&snapshot.turns, &correlation));

    if let Some(path) = output {
        let report = CorrelationReport::new(snapshot.run_id.clone(), &snapshot.turns, &correlation);
        write_json(&report, &path)?;
        info!("Report written to {:?}", path);
    }

    Ok(())
}

async fn diff_runs(
    base: PathBuf,
    compare: PathBuf,
    output: Option<PathBuf>,
    config: &DivergenceConfig,
) -> Result<()> {
    let base = load(&base).await?;
    let compare = load(&compare).await?;

    let entries = diff(&base.turns, &compare.turns, config);
    print!("{}", format_diff(&entries));

    if let Some(path) = output {
        write_json(&DiffReport::new(entries), &path)?;
        info!("Report written to {:?}", path);
    }

    Ok(())
}

async fn list_conflicts(input: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let snapshot = load(&input).await?;
    let conflicts = detect_conflicts(&snapshot.fixes);

    print!("{}", format_conflicts(conflicts.values()));

    if let Some(path) = output {
        write_json(&ConflictReport::new(conflicts.values()), &path)?;
        info!("Report written to {:?}", path);
    }

    Ok(())
}

async fn resolve_conflict(
    input: PathBuf,
    group: String,
    strategy: ResolutionStrategy,
    order: Vec<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut snapshot = load(&input).await?;

    let resolution = resolve_group(&snapshot.fixes, &group, strategy, &order)
        .with_context(|| format!("Failed to resolve group {}", group))?;
    print!("{}", format_resolution(&resolution));

    if let Some(path) = output {
        snapshot.fixes = apply_transitions(&snapshot.fixes, &resolution.transitions)
            .context("Failed to apply resolution")?;
        write_json(&snapshot, &path)?;
        info!("Updated snapshot written to {:?}", path);
    }

    Ok(())
}
