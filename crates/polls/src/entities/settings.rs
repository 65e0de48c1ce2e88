use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::poll::PollType;

/// Who may see the aggregated results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultsVisibility {
    CreatorOnly,
    Voters,
    #[default]
    Public,
}

/// Settings shared by every poll type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommonSettings {
    #[serde(default)]
    pub results_visibility: ResultsVisibility,
    #[serde(default)]
    pub require_auth: bool,
    #[serde(default)]
    pub max_responses: Option<u32>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub send_email_copy: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatePollSettings {
    #[serde(flatten)]
    pub common: CommonSettings,
    #[serde(default = "default_true")]
    pub allow_maybe_votes: bool,
    #[serde(default)]
    pub allow_anonymous_votes: bool,
}

impl Default for DatePollSettings {
    fn default() -> Self {
        Self {
            common: CommonSettings::default(),
            allow_maybe_votes: true,
            allow_anonymous_votes: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FormPollSettings {
    #[serde(flatten)]
    pub common: CommonSettings,
    #[serde(default)]
    pub allow_edit_after_submit: bool,
    #[serde(default)]
    pub one_response_per_person: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityPollSettings {
    #[serde(flatten)]
    pub common: CommonSettings,
    #[serde(default = "AvailabilityPollSettings::default_granularity")]
    pub time_granularity_minutes: u32,
}

impl AvailabilityPollSettings {
    const fn default_granularity() -> u32 {
        30
    }
}

impl Default for AvailabilityPollSettings {
    fn default() -> Self {
        Self {
            common: CommonSettings::default(),
            time_granularity_minutes: Self::default_granularity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuizzPollSettings {
    #[serde(flatten)]
    pub common: CommonSettings,
    #[serde(default)]
    pub show_correct_answers: bool,
}

/// Settings keyed by poll type, as edited through the settings form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PollSettings {
    Date(DatePollSettings),
    Form(FormPollSettings),
    Availability(AvailabilityPollSettings),
    Quizz(QuizzPollSettings),
}

impl PollSettings {
    pub fn poll_type(&self) -> PollType {
        match self {
            PollSettings::Date(_) => PollType::Date,
            PollSettings::Form(_) => PollType::Form,
            PollSettings::Availability(_) => PollType::Availability,
            PollSettings::Quizz(_) => PollType::Quizz,
        }
    }

    pub fn common(&self) -> &CommonSettings {
        match self {
            PollSettings::Date(settings) => &settings.common,
            PollSettings::Form(settings) => &settings.common,
            PollSettings::Availability(settings) => &settings.common,
            PollSettings::Quizz(settings) => &settings.common,
        }
    }
}

fn default_true() -> bool {
    true
}
