use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use doodates_config::AppConfig;
use doodates_polls::{DashboardQuery, DatePollContent, Poll, PollStore};
use doodates_runtime::AppServices;
use sqlx::Row;
use tempfile::TempDir;
use tokio::time::{sleep, timeout};

fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}", path.to_string_lossy())
}

fn build_config(database_url: String, max_connections: u32) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = database_url;
    config.database.max_connections = max_connections;
    config.gemini.api_key = None;
    config
}

async fn initialise(config: &AppConfig) -> Result<AppServices> {
    AppServices::initialise(config)
        .await
        .context("failed to initialise backend services")
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_runs_migrations_and_wires_services() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("runtime/init.db");
    let config = build_config(sqlite_url(&db_path), 4);

    let services = initialise(&config).await?;
    let table: String = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'polls'",
    )
    .fetch_one(&services.db_pool)
    .await?;
    assert_eq!("polls", table);

    let poll = Poll::new("Réunion de rentrée", DatePollContent::default().into());
    services.store.insert_poll(&poll).await?;

    let page = services.dashboard.list(&DashboardQuery::default()).await?;
    assert_eq!(page.total, 1);
    assert_eq!(
        services.actions.public_url(&poll),
        format!("{}/poll/{}", config.app.public_base_url, poll.slug)
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_without_gemini_key_disables_analytics() -> Result<()> {
    std::env::remove_var("GEMINI_API_KEY");
    std::env::remove_var("VITE_GEMINI_API_KEY");
    let config = build_config("sqlite::memory:".into(), 1);

    let services = initialise(&config).await?;
    assert!(!services.analytics.is_initialized());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn prepare_database_creates_sqlite_directory_if_missing() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_dir = temp_dir.path().join("nested");
    let db_path = db_dir.join("prepared.db");
    let config = build_config(sqlite_url(&db_path), 2);

    assert!(!db_dir.exists());

    let services = initialise(&config).await?;
    assert!(db_dir.exists(), "database directory should be created");
    assert!(db_path.exists(), "database file should be created");
    drop(services);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn prepare_database_enables_sqlite_foreign_keys() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("runtime/foreign_keys.db");
    let config = build_config(sqlite_url(&db_path), 2);

    let services = initialise(&config).await?;

    let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
        .fetch_one(&services.db_pool)
        .await?;
    assert_eq!(1, enabled, "foreign key enforcement must be enabled");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn prepare_database_applies_max_connections_setting() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("runtime/max_conn.db");
    let config = build_config(sqlite_url(&db_path), 3);

    let services = initialise(&config).await?;
    assert_eq!(3, services.db_pool.options().get_max_connections());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn memory_database_has_no_file() -> Result<()> {
    let config = build_config("sqlite::memory:".into(), 1);
    let services = initialise(&config).await?;

    let databases = sqlx::query("PRAGMA database_list")
        .fetch_all(&services.db_pool)
        .await?;
    let main_db = databases
        .into_iter()
        .find(|row| {
            row.try_get::<String, _>("name")
                .map(|name| name == "main")
                .unwrap_or(false)
        })
        .context("expected main in PRAGMA database_list")?;
    let file: String = main_db.try_get("file")?;
    assert!(file.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn non_sqlite_urls_fail_without_touching_disk() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let target_dir = temp_dir.path().join("should_not_exist");
    let malformed_url = format!("postgres://{}/ignored.db", target_dir.to_string_lossy());
    let config = build_config(malformed_url, 1);

    let error = match AppServices::initialise(&config).await {
        Ok(_) => panic!("expected sqlite connection to fail for non-sqlite URL"),
        Err(error) => error,
    };
    assert!(!target_dir.exists());
    assert!(format!("{error:#}").contains("failed to prepare database"));
    Ok(())
}

#[test]
fn telemetry_init_tracing_sets_global_subscriber() {
    doodates_runtime::telemetry::init_tracing().expect("first initialisation should succeed");

    let second = doodates_runtime::telemetry::init_tracing();
    assert!(
        second.is_err(),
        "initialising telemetry twice should fail with global subscriber already set"
    );
}

#[tokio::test(flavor = "multi_thread")]
#[cfg_attr(not(unix), ignore = "requires Unix signal handling")]
async fn shutdown_signal_completes_on_ctrl_c_notification() -> Result<()> {
    let shutdown_task = tokio::spawn(async { doodates_runtime::shutdown_signal().await });

    sleep(Duration::from_millis(50)).await;
    #[cfg(unix)]
    unsafe {
        libc::raise(libc::SIGINT);
    }

    timeout(Duration::from_secs(2), shutdown_task).await??;
    Ok(())
}
