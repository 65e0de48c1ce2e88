use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use clap::{Parser, Subcommand};
use doodates_config::{load as load_config, AppConfig};
use doodates_gateway::{create_router, GatewayState};
use doodates_polls::{ExportFormat, PollStore};
use doodates_runtime::{telemetry, AppServices};
use tokio::net::TcpListener;
use tracing::info;

mod seed;

#[derive(Parser)]
#[command(name = "doodates")]
#[command(about = "DooDates backend (HTTP server by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Print every poll with its vote count
    DumpData,
    /// Remove all polls, votes and conversations
    ClearData,
    /// Seed the database with one poll of each type
    SeedData,
    /// Ask the AI a question about a poll
    Ask {
        /// Poll id or slug
        poll: String,
        question: String,
    },
    /// Generate automatic insights for a poll
    Insights {
        /// Poll id or slug
        poll: String,
    },
    /// Export form poll responses
    Export {
        /// Poll id or slug
        poll: String,
        /// csv, pdf, json or markdown
        #[arg(short, long, default_value = "csv")]
        format: String,
        /// Destination file; defaults to the export's own file name
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::DumpData => dump_data().await,
        Commands::ClearData => clear_data().await,
        Commands::SeedData => seed_data().await,
        Commands::Ask { poll, question } => ask(&poll, &question).await,
        Commands::Insights { poll } => insights(&poll).await,
        Commands::Export {
            poll,
            format,
            output,
        } => export(&poll, &format, output).await,
    }
}

async fn bootstrap() -> anyhow::Result<(AppConfig, AppServices)> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    let config = load_config().context("failed to load configuration")?;
    let services = AppServices::initialise(&config)
        .await
        .context("failed to initialise services")?;

    Ok((config, services))
}

async fn run_server() -> anyhow::Result<()> {
    let (config, services) = bootstrap().await?;

    info!("starting DooDates backend");

    let state = GatewayState::new(
        services.store.clone(),
        services.actions.clone(),
        services.settings.clone(),
        services.dashboard.clone(),
        services.analytics.clone(),
    );
    let app = create_router(state);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(doodates_runtime::shutdown_signal())
        .await
        .context("http server error")?;

    info!("backend shut down");
    Ok(())
}

async fn dump_data() -> anyhow::Result<()> {
    let (_, services) = bootstrap().await?;

    let polls = services
        .store
        .list_polls()
        .await
        .context("failed to fetch polls")?;

    println!("=== POLLS ===");
    if polls.is_empty() {
        println!("No polls found in database");
        return Ok(());
    }

    println!("Found {} polls:", polls.len());
    println!(
        "{:<26} {:<36} {:<13} {:<9} {:<6} {:<12} {:<25}",
        "ID", "Slug", "Type", "Status", "Votes", "Conversation", "Updated At"
    );
    println!("{}", "-".repeat(132));

    for poll in polls {
        let votes = services
            .store
            .count_votes(&poll.id)
            .await
            .with_context(|| format!("failed to count votes for {}", poll.id))?;

        println!(
            "{:<26} {:<36} {:<13} {:<9} {:<6} {:<12} {:<25}",
            poll.id,
            poll.slug,
            poll.poll_type(),
            poll.status,
            votes,
            if poll.conversation_id.is_some() { "yes" } else { "no" },
            poll.updated_at.to_rfc3339()
        );
    }

    Ok(())
}

async fn clear_data() -> anyhow::Result<()> {
    let (_, services) = bootstrap().await?;

    info!("clearing all data from database");

    let polls = services
        .store
        .list_polls()
        .await
        .context("failed to fetch polls")?
        .len();
    services
        .store
        .clear()
        .await
        .context("failed to clear database")?;

    println!("Database cleared: {polls} polls deleted with their votes and conversations");
    Ok(())
}

async fn seed_data() -> anyhow::Result<()> {
    let (_, services) = bootstrap().await?;

    info!("seeding database with sample polls");

    let summary = seed::seed(services.store.as_ref()).await?;

    println!("Database seeded with sample data:");
    println!("- {} polls created", summary.polls);
    println!("- {} votes created", summary.votes);
    println!("- {} conversations created", summary.conversations);
    println!("Run 'dump-data' to see the inserted data");

    Ok(())
}

async fn ask(poll: &str, question: &str) -> anyhow::Result<()> {
    let (_, services) = bootstrap().await?;

    let poll = services.store.require_poll(poll).await?;
    let response = services
        .analytics
        .query_poll(question, &poll.id)
        .await
        .with_context(|| format!("analytics query failed for '{}'", poll.title))?;

    println!("{}", response.answer);
    if !response.insights.is_empty() {
        println!();
        for insight in &response.insights {
            println!("- {insight}");
        }
    }
    Ok(())
}

async fn insights(poll: &str) -> anyhow::Result<()> {
    let (_, services) = bootstrap().await?;

    let poll = services.store.require_poll(poll).await?;
    let insights = services.analytics.generate_auto_insights(&poll.id).await;

    if insights.is_empty() {
        println!("No insights available for '{}'", poll.title);
    }
    for insight in insights {
        println!(
            "[{:?}] {} ({:.0}%)\n  {}",
            insight.insight_type,
            insight.title,
            insight.confidence * 100.0,
            insight.description
        );
    }
    Ok(())
}

async fn export(poll: &str, format: &str, output: Option<PathBuf>) -> anyhow::Result<()> {
    let format = ExportFormat::from_str(format)?;
    let (_, services) = bootstrap().await?;

    let poll = services.store.require_poll(poll).await?;
    let file = services.actions.export(&poll, format).await?;
    let path = output.unwrap_or_else(|| PathBuf::from(&file.file_name));

    tokio::fs::write(&path, &file.body)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!("Exported '{}' to {}", poll.title, path.display());
    Ok(())
}
