use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use doodates_ci::{AnalysisInput, IssueAction, WorkflowAnalyzer, WorkflowMonitor};
use doodates_config::load as load_config;
use doodates_runtime::telemetry;
use tracing::info;

#[derive(Parser)]
#[command(name = "doodates-ci")]
#[command(about = "GitHub Actions failure analysis and monitoring for DooDates")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify failure logs and write an analysis report
    Analyze(AnalyzeArgs),
    /// Check the last workflow runs, write reports and sync the tracking issue
    Monitor,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Local log file to analyze
    #[arg(long, conflicts_with = "latest")]
    log_file: Option<PathBuf>,
    /// Analyze the N most recent failed runs from GitHub
    #[arg(long, value_name = "N")]
    latest: Option<usize>,
    /// Report destination; defaults to the configured analysis path
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing().context("failed to initialise tracing")?;

    match cli.command {
        Commands::Analyze(args) => analyze(args).await,
        Commands::Monitor => monitor().await,
    }
}

async fn analyze(args: AnalyzeArgs) -> anyhow::Result<()> {
    let input = match (args.log_file, args.latest) {
        (Some(path), _) => AnalysisInput::LogFile(path),
        (None, Some(limit)) if limit > 0 => AnalysisInput::LatestFailures { limit },
        (None, Some(_)) => bail!("--latest must be at least 1"),
        (None, None) => AnalysisInput::LatestFailures { limit: 1 },
    };

    let config = load_config().context("failed to load configuration")?;
    let analyzer = WorkflowAnalyzer::from_config(&config)
        .await
        .context("failed to prepare analyzer")?;

    let report = analyzer
        .analyze(&input, Utc::now())
        .await
        .context("analysis failed")?;

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(&config.monitoring.analysis_path));
    analyzer
        .write_report(&report, &output)
        .await
        .context("failed to write analysis report")?;

    info!(
        analyses = report.analyses.len(),
        output = %output.display(),
        "analysis report written"
    );
    println!(
        "{} failure(s) analyzed, report written to {}",
        report.analyses.len(),
        output.display()
    );
    Ok(())
}

async fn monitor() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    let monitor = WorkflowMonitor::from_config(&config)
        .await
        .context("failed to prepare workflow monitor")?;

    let outcome = monitor.run(Utc::now()).await.context("monitoring failed")?;
    let snapshot = &outcome.snapshot;

    println!(
        "{} run(s), {} failed ({:.1}% success)",
        snapshot.total_runs, snapshot.failed_runs, snapshot.success_rate
    );
    println!("Report: {}", outcome.report_path.display());
    println!("Status: {}", outcome.status_path.display());
    match outcome.issue_action {
        IssueAction::Open => println!("Tracking issue opened"),
        IssueAction::Update(number) => println!("Tracking issue #{number} updated"),
        IssueAction::Close(number) => println!("Tracking issue #{number} closed"),
        IssueAction::Nothing => {}
    }
    Ok(())
}
