//! # DooDates Analytics Crate
//!
//! Natural-language questions and automatic insights over a poll's
//! results, backed by a generative model. Answers are cached per poll and
//! question for a few minutes.
//!
//! ## Architecture
//!
//! - **client**: the [`GenerativeModel`] seam and the Gemini REST client
//! - **cache**: bounded TTL cache with insertion-order eviction
//! - **context**: textual summary of aggregated results fed to the model
//! - **insights**: keyword insights and best-effort JSON insight parsing
//! - **service**: [`PollAnalyticsService`], the public entry point

use doodates_polls::PollError;
use thiserror::Error;

pub mod cache;
pub mod client;
pub mod context;
pub mod insights;
pub mod prompts;
pub mod service;

pub use cache::ResponseCache;
pub use client::{GeminiClient, GenerativeModel};
pub use context::build_results_context;
pub use insights::{AutoInsight, InsightParseError, InsightType};
pub use service::{AnalyticsResponse, PollAnalyticsService};

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("analytics service not initialized: no Gemini API key configured")]
    NotInitialized,
    #[error("question cannot be empty")]
    EmptyQuestion,
    #[error("poll not found: {0}")]
    PollNotFound(String),
    #[error("poll storage failed: {0}")]
    Storage(#[source] PollError),
    #[error("Gemini request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Gemini returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("invalid Gemini response: {0}")]
    InvalidResponse(String),
    #[error("invalid Gemini payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unusable insight output: {0}")]
    Insights(#[from] InsightParseError),
}

impl From<PollError> for AnalyticsError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::PollNotFound { id } => AnalyticsError::PollNotFound(id),
            other => AnalyticsError::Storage(other),
        }
    }
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
