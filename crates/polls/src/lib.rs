//! # DooDates Polls Crate
//!
//! This crate provides the poll domain for DooDates: date polls, forms,
//! availability surveys and quizzes, together with their votes and the AI
//! conversations that produced them.
//!
//! ## Architecture
//!
//! - **Entities**: Domain models (Poll, Vote, Conversation, settings)
//! - **Repositories**: The `PollStore` trait with SQLite and in-memory backends
//! - **Services**: Poll actions, settings, dashboard, exports and results
//! - **Types**: Errors, requests and responses
//! - **Utils**: Validation, time-slot grids and slugs
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use doodates_polls::{PollActions, SqlitePollStore};
//!
//! let store = Arc::new(SqlitePollStore::new(pool));
//! let actions = PollActions::new(store, "https://doodates.app");
//! let copy = actions.duplicate(&poll).await?;
//! ```

pub mod entities;
pub mod repositories;
pub mod services;
pub mod types;
pub mod utils;

pub use entities::{
    AnswerValue, AvailabilityPollContent, AvailabilityPollSettings, CommonSettings, Conversation,
    ConversationMessage, DatePollContent, DatePollSettings, FormPollContent, FormPollSettings,
    FormQuestion, MessageRole, Poll, PollContent, PollSettings, PollStatus, PollType,
    Preference, ProposedSlot, QuestionKind, QuestionOption, QuizzPollContent, QuizzPollSettings,
    QuizzQuestion, ResultsVisibility, TimeSlot, TimeSlotMap, Vote, VotePayload,
};
pub use repositories::{MemoryPollStore, PollStore, SqlitePollStore};
pub use services::{
    ActionCallback, Clipboard, ConfirmationPrompt, Confirmer, DashboardService, MemoryClipboard,
    Notifier, PollActions, PollResults, RecordingNotifier, ResultsSummary, SettingsService,
    StaticConfirmer, TracingNotifier,
};
pub use types::{
    ActionOutcome, BulkFailure, BulkOutcome, DashboardQuery, DeleteReport, ExportFormat,
    ExportedFile, Page, PollError, PollResult, PollSummary, Toast, ToastVariant,
    UpdatePollSettingsRequest,
};
