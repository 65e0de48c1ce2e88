//! Poll services: actions, settings, dashboard, exports and results.

pub mod actions;
pub mod dashboard_service;
pub mod export_service;
pub mod results;
pub mod settings_service;

pub use actions::{
    ActionCallback, Clipboard, ConfirmationPrompt, Confirmer, MemoryClipboard, Notifier,
    PollActions, RecordingNotifier, StaticConfirmer, TracingNotifier,
};
pub use dashboard_service::DashboardService;
pub use export_service::{export_form_poll, has_exportable_data};
pub use results::{aggregate, largest_remainder_percentages, PollResults, ResultsSummary};
pub use settings_service::SettingsService;
