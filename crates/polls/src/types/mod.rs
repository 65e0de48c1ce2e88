//! Shared request, response and error types.

pub mod errors;
pub mod requests;
pub mod responses;

pub use errors::{PollError, PollResult};
pub use requests::{
    DashboardQuery, ExportFormat, UpdatePollSettingsRequest, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use responses::{
    ActionOutcome, BulkFailure, BulkOutcome, DeleteReport, ExportedFile, Page, PollSummary, Toast,
    ToastVariant,
};
