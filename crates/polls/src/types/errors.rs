//! Error types for the poll domain.

use thiserror::Error;

use crate::entities::{PollStatus, PollType};

/// Result type alias for poll operations
pub type PollResult<T> = Result<T, PollError>;

#[derive(Debug, Error)]
pub enum PollError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Poll not found: {id}")]
    PollNotFound { id: String },

    #[error("Conversation not found: {id}")]
    ConversationNotFound { id: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: PollStatus, to: PollStatus },

    #[error("Action '{action}' is not available for {poll_type} polls")]
    UnsupportedAction { action: String, poll_type: PollType },

    #[error("Slug already in use: {slug}")]
    DuplicateSlug { slug: String },

    #[error("Poll {id} has no exportable data")]
    NothingToExport { id: String },

    #[error("Action '{action}' cancelled")]
    Cancelled { action: String },

    #[error("Clipboard error: {message}")]
    Clipboard { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PollError {
    pub fn poll_not_found(id: impl Into<String>) -> Self {
        Self::PollNotFound { id: id.into() }
    }

    pub fn conversation_not_found(id: impl Into<String>) -> Self {
        Self::ConversationNotFound { id: id.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn unsupported(action: impl Into<String>, poll_type: PollType) -> Self {
        Self::UnsupportedAction {
            action: action.into(),
            poll_type,
        }
    }

    pub fn duplicate_slug(slug: impl Into<String>) -> Self {
        Self::DuplicateSlug { slug: slug.into() }
    }

    pub fn cancelled(action: impl Into<String>) -> Self {
        Self::Cancelled {
            action: action.into(),
        }
    }

    pub fn clipboard(message: impl Into<String>) -> Self {
        Self::Clipboard {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PollNotFound { .. } | Self::ConversationNotFound { .. }
        )
    }
}

impl From<chrono::ParseError> for PollError {
    fn from(err: chrono::ParseError) -> Self {
        Self::Validation {
            message: format!("Date parsing error: {}", err),
        }
    }
}
