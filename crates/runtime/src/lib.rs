use std::sync::Arc;

use anyhow::{Context, Result};
use doodates_analytics::PollAnalyticsService;
use doodates_config::AppConfig;
use doodates_database::initialize_database;
use doodates_polls::{DashboardService, PollActions, PollStore, SettingsService, SqlitePollStore};
use sqlx::SqlitePool;
use tracing::{info, warn};

pub mod telemetry {
    use anyhow::Result;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    /// Install the global subscriber. `RUST_LOG` overrides the `info` default.
    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_env_filter(env_filter)
            .with_target(false)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// Everything the gateway and the CLI need, built once per process.
#[derive(Clone)]
pub struct AppServices {
    pub db_pool: SqlitePool,
    pub store: Arc<dyn PollStore>,
    pub actions: PollActions,
    pub settings: SettingsService,
    pub dashboard: DashboardService,
    pub analytics: Arc<PollAnalyticsService>,
}

impl AppServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database)
            .await
            .context("failed to prepare database")?;
        let store: Arc<dyn PollStore> = Arc::new(SqlitePollStore::new(db_pool.clone()));

        let analytics = PollAnalyticsService::from_config(config, store.clone())
            .context("failed to build analytics service")?;
        if analytics.is_initialized() {
            info!(model = %config.gemini.model, "analytics ready");
        } else {
            warn!("no Gemini API key configured, analytics disabled");
        }

        Ok(Self::from_parts(
            db_pool,
            store,
            &config.app.public_base_url,
            analytics,
        ))
    }

    /// Wire services around an existing store.
    pub fn from_parts(
        db_pool: SqlitePool,
        store: Arc<dyn PollStore>,
        public_base_url: &str,
        analytics: PollAnalyticsService,
    ) -> Self {
        Self {
            db_pool,
            actions: PollActions::new(store.clone(), public_base_url),
            settings: SettingsService::new(store.clone()),
            dashboard: DashboardService::new(store.clone()),
            analytics: Arc::new(analytics),
            store,
        }
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
