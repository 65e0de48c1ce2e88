//! Shared application state for the gateway

use std::sync::Arc;

use doodates_analytics::PollAnalyticsService;
use doodates_polls::{DashboardService, PollActions, PollStore, SettingsService};

/// Services shared by every handler.
#[derive(Clone)]
pub struct GatewayState {
    pub store: Arc<dyn PollStore>,
    /// Template for per-request actions; handlers swap in the confirmer.
    pub actions: PollActions,
    pub settings: SettingsService,
    pub dashboard: DashboardService,
    pub analytics: Arc<PollAnalyticsService>,
}

impl GatewayState {
    pub fn new(
        store: Arc<dyn PollStore>,
        actions: PollActions,
        settings: SettingsService,
        dashboard: DashboardService,
        analytics: Arc<PollAnalyticsService>,
    ) -> Self {
        Self {
            store,
            actions,
            settings,
            dashboard,
            analytics,
        }
    }

    /// Build every service around one store.
    pub fn from_store(
        store: Arc<dyn PollStore>,
        public_base_url: &str,
        analytics: PollAnalyticsService,
    ) -> Self {
        Self::new(
            store.clone(),
            PollActions::new(store.clone(), public_base_url),
            SettingsService::new(store.clone()),
            DashboardService::new(store.clone()),
            Arc::new(analytics),
        )
    }
}
