use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::poll::{PollType, ProposedSlot};

/// A participant's response, owned by its poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub id: String,
    pub poll_id: String,
    pub voter_name: Option<String>,
    pub voter_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub payload: VotePayload,
}

impl Vote {
    pub fn new(poll_id: impl Into<String>, voter_name: Option<String>, payload: VotePayload) -> Self {
        Self {
            id: cuid2::cuid(),
            poll_id: poll_id.into(),
            voter_name,
            voter_email: None,
            created_at: Utc::now(),
            payload,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.voter_email = Some(email.into());
        self
    }
}

/// Replacement voter name used when a poll's votes are anonymized.
pub fn anonymized_name(position: usize) -> String {
    format!("Participant {}", position + 1)
}

/// Date-poll answer for a single date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preference {
    Yes,
    Maybe,
    No,
}

/// Answer to one form question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    Choice(String),
    Choices(Vec<String>),
    Text(String),
    Rating(u8),
    Nps(u8),
}

impl AnswerValue {
    /// Plain-text rendering used by exports.
    pub fn display(&self) -> String {
        match self {
            AnswerValue::Choice(choice) => choice.clone(),
            AnswerValue::Choices(choices) => choices.join("; "),
            AnswerValue::Text(text) => text.clone(),
            AnswerValue::Rating(value) | AnswerValue::Nps(value) => value.to_string(),
        }
    }
}

/// Vote content tagged like the poll it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VotePayload {
    Date {
        selections: BTreeMap<String, Preference>,
    },
    Form {
        answers: BTreeMap<String, AnswerValue>,
    },
    Availability {
        slots: Vec<ProposedSlot>,
    },
    Quizz {
        answers: BTreeMap<String, Vec<String>>,
    },
}

impl VotePayload {
    pub fn poll_type(&self) -> PollType {
        match self {
            VotePayload::Date { .. } => PollType::Date,
            VotePayload::Form { .. } => PollType::Form,
            VotePayload::Availability { .. } => PollType::Availability,
            VotePayload::Quizz { .. } => PollType::Quizz,
        }
    }
}
