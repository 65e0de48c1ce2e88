//! Response types produced by the poll services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{Poll, PollStatus, PollType};

/// Dashboard row for a poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollSummary {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub poll_type: PollType,
    pub status: PollStatus,
    pub vote_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PollSummary {
    pub fn from_poll(poll: &Poll, vote_count: u64) -> Self {
        Self {
            id: poll.id.clone(),
            slug: poll.slug.clone(),
            title: poll.title.clone(),
            description: poll.description.clone(),
            poll_type: poll.poll_type(),
            status: poll.status,
            vote_count,
            created_at: poll.created_at,
            updated_at: poll.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkFailure {
    pub id: String,
    pub error: String,
}

/// Tally of a sequential bulk operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<BulkFailure>,
}

impl BulkOutcome {
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    pub fn record_failure(&mut self, id: impl Into<String>, error: impl ToString) {
        self.failed.push(BulkFailure {
            id: id.into(),
            error: error.to_string(),
        });
    }
}

/// What a cascade delete removed. Steps are not transactional, so a
/// conversation failure is reported next to an already-deleted poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteReport {
    pub poll_id: String,
    pub votes_deleted: u64,
    pub conversation_deleted: bool,
    pub conversation_error: Option<String>,
}

/// A rendered export ready to be downloaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedFile {
    pub file_name: String,
    pub content_type: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastVariant {
    Default,
    Destructive,
}

/// User-facing notification emitted after an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Toast {
    pub title: String,
    pub description: String,
    pub variant: ToastVariant,
}

impl Toast {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: ToastVariant::Default,
        }
    }

    pub fn destructive(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: ToastVariant::Destructive,
        }
    }
}

/// Result handed to the caller-supplied callback after a successful action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionOutcome {
    LinkCopied { url: String },
    Duplicated { poll: Poll },
    Archived { poll: Poll },
    Closed { poll: Poll },
    Anonymized { poll_id: String, votes: u64 },
    Deleted { report: DeleteReport },
    Exported { file: ExportedFile },
    BulkDeleted { outcome: BulkOutcome },
}
