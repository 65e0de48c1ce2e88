//! # DooDates CI Crate
//!
//! Maintenance tooling for the project's GitHub Actions pipeline.
//!
//! - **monitor**: inspects the last day of workflow runs, writes a Markdown
//!   report plus a JSON status file and keeps a tracking issue in sync
//! - **analyzer**: classifies failure logs with a priority-ordered rule
//!   engine and optionally asks a model for a predictive section
//!
//! GitHub API failures never abort a run: they are logged and treated as
//! empty data.

use thiserror::Error;

pub mod analyzer;
pub mod extractors;
pub mod github;
pub mod knowledge;
pub mod monitor;
pub mod predictor;
pub mod report;

pub use analyzer::{AnalysisInput, AnalysisReport, LogAnalysis, WorkflowAnalyzer};
pub use extractors::{ErrorExtractor, ErrorSource, ExtractedError};
pub use github::{GithubClient, Issue, IssueUpdate, Job, WorkflowRun};
pub use knowledge::{Category, Diagnosis, KnowledgeBase, Matcher, Priority, Rule};
pub use monitor::{decide_issue_action, IssueAction, MonitorOutcome, WorkflowMonitor};
pub use predictor::Predictor;
pub use report::{FailureRecord, HealthStatus, MonitorSnapshot, WorkflowStatus};

#[derive(Debug, Error)]
pub enum CiError {
    #[error("GitHub repository is not configured (expected owner/name)")]
    MissingRepository,
    #[error("GitHub token is required for {0}")]
    MissingToken(&'static str),
    #[error("GitHub request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("GitHub returned HTTP {status} for {path}")]
    Api { status: u16, path: String },
    #[error("invalid knowledge base: {0}")]
    Knowledge(String),
    #[error("invalid rule pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl CiError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn pattern(pattern: impl Into<String>, source: regex::Error) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            source,
        }
    }
}

pub type CiResult<T> = Result<T, CiError>;
