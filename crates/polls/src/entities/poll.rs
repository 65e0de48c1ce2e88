use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::settings::{
    AvailabilityPollSettings, CommonSettings, DatePollSettings, FormPollSettings, PollSettings,
    QuizzPollSettings,
};
use crate::types::{PollError, PollResult};
use crate::utils::validation::MAX_TITLE_LENGTH;

pub const DUPLICATE_SUFFIX: &str = " (copie)";

/// A shareable poll: date poll, form, availability survey or quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    /// Internal identifier (cuid)
    pub id: String,
    /// Public lookup key, fixed at creation
    pub slug: String,
    pub status: PollStatus,
    pub title: String,
    pub description: Option<String>,
    /// Owner reference, absent for guest polls
    pub creator_id: Option<String>,
    /// Soft link to the AI conversation that produced the poll
    pub conversation_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Type-specific content; its variant is the poll type
    #[serde(flatten)]
    pub content: PollContent,
}

/// Closed set of poll kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollType {
    Date,
    Form,
    Availability,
    Quizz,
}

impl PollType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollType::Date => "date",
            PollType::Form => "form",
            PollType::Availability => "availability",
            PollType::Quizz => "quizz",
        }
    }
}

impl fmt::Display for PollType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PollType {
    type Err = PollError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "date" => Ok(PollType::Date),
            "form" => Ok(PollType::Form),
            "availability" => Ok(PollType::Availability),
            "quizz" | "quiz" => Ok(PollType::Quizz),
            other => Err(PollError::validation(format!("unknown poll type '{other}'"))),
        }
    }
}

/// Lifecycle state of a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollStatus {
    Active,
    Closed,
    Archived,
}

impl PollStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollStatus::Active => "active",
            PollStatus::Closed => "closed",
            PollStatus::Archived => "archived",
        }
    }

    /// Status only moves forward: active -> closed -> archived, or
    /// active -> archived directly.
    pub fn can_transition_to(&self, next: PollStatus) -> bool {
        matches!(
            (self, next),
            (PollStatus::Active, PollStatus::Closed)
                | (PollStatus::Active, PollStatus::Archived)
                | (PollStatus::Closed, PollStatus::Archived)
        )
    }
}

impl fmt::Display for PollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PollStatus {
    type Err = PollError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(PollStatus::Active),
            "closed" => Ok(PollStatus::Closed),
            "archived" => Ok(PollStatus::Archived),
            other => Err(PollError::validation(format!("unknown poll status '{other}'"))),
        }
    }
}

/// Poll content tagged by poll type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PollContent {
    Date(DatePollContent),
    Form(FormPollContent),
    Availability(AvailabilityPollContent),
    Quizz(QuizzPollContent),
}

impl PollContent {
    pub fn poll_type(&self) -> PollType {
        match self {
            PollContent::Date(_) => PollType::Date,
            PollContent::Form(_) => PollType::Form,
            PollContent::Availability(_) => PollType::Availability,
            PollContent::Quizz(_) => PollType::Quizz,
        }
    }

    pub fn settings(&self) -> PollSettings {
        match self {
            PollContent::Date(content) => PollSettings::Date(content.settings.clone()),
            PollContent::Form(content) => PollSettings::Form(content.settings.clone()),
            PollContent::Availability(content) => {
                PollSettings::Availability(content.settings.clone())
            }
            PollContent::Quizz(content) => PollSettings::Quizz(content.settings.clone()),
        }
    }

    pub fn common_settings(&self) -> &CommonSettings {
        match self {
            PollContent::Date(content) => &content.settings.common,
            PollContent::Form(content) => &content.settings.common,
            PollContent::Availability(content) => &content.settings.common,
            PollContent::Quizz(content) => &content.settings.common,
        }
    }

    /// Replace the settings, rejecting a variant keyed to another poll type.
    pub fn apply_settings(&mut self, settings: PollSettings) -> PollResult<()> {
        match (self, settings) {
            (PollContent::Date(content), PollSettings::Date(settings)) => {
                content.settings = settings
            }
            (PollContent::Form(content), PollSettings::Form(settings)) => {
                content.settings = settings
            }
            (PollContent::Availability(content), PollSettings::Availability(settings)) => {
                content.settings = settings
            }
            (PollContent::Quizz(content), PollSettings::Quizz(settings)) => {
                content.settings = settings
            }
            (content, settings) => {
                return Err(PollError::validation(format!(
                    "{} settings cannot be applied to a {} poll",
                    settings.poll_type(),
                    content.poll_type()
                )))
            }
        }
        Ok(())
    }
}

/// One cell of a time-of-day grid attached to a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub hour: u8,
    pub minute: u8,
    pub enabled: bool,
}

impl TimeSlot {
    pub fn minutes_of_day(&self) -> u32 {
        u32::from(self.hour) * 60 + u32::from(self.minute)
    }
}

/// Selected slots per `YYYY-MM-DD` date.
pub type TimeSlotMap = BTreeMap<String, Vec<TimeSlot>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatePollContent {
    #[serde(default)]
    pub dates: Vec<String>,
    #[serde(default)]
    pub time_slots: TimeSlotMap,
    #[serde(default)]
    pub settings: DatePollSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormPollContent {
    #[serde(default)]
    pub questions: Vec<FormQuestion>,
    #[serde(default)]
    pub settings: FormPollSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormQuestion {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub required: bool,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionKind {
    SingleChoice {
        options: Vec<QuestionOption>,
    },
    MultipleChoice {
        options: Vec<QuestionOption>,
        #[serde(default)]
        max_choices: Option<u32>,
    },
    Text {
        #[serde(default)]
        placeholder: Option<String>,
    },
    Rating {
        scale: u8,
    },
    Nps,
}

impl QuestionKind {
    pub fn options(&self) -> &[QuestionOption] {
        match self {
            QuestionKind::SingleChoice { options } | QuestionKind::MultipleChoice { options, .. } => {
                options
            }
            _ => &[],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QuestionKind::SingleChoice { .. } => "choix unique",
            QuestionKind::MultipleChoice { .. } => "choix multiple",
            QuestionKind::Text { .. } => "texte libre",
            QuestionKind::Rating { .. } => "note",
            QuestionKind::Nps => "NPS",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    pub label: String,
}

impl QuestionOption {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityPollContent {
    #[serde(default)]
    pub proposed_slots: Vec<ProposedSlot>,
    #[serde(default)]
    pub settings: AvailabilityPollSettings,
}

/// A proposed meeting window, `start`/`end` as `HH:MM`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProposedSlot {
    pub date: String,
    pub start: String,
    pub end: String,
}

impl ProposedSlot {
    pub fn label(&self) -> String {
        format!("{} {}-{}", self.date, self.start, self.end)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuizzPollContent {
    #[serde(default)]
    pub questions: Vec<QuizzQuestion>,
    #[serde(default)]
    pub settings: QuizzPollSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizzQuestion {
    pub id: String,
    pub title: String,
    pub options: Vec<QuestionOption>,
    pub correct_option_ids: Vec<String>,
    #[serde(default = "QuizzQuestion::default_points")]
    pub points: u32,
}

impl QuizzQuestion {
    const fn default_points() -> u32 {
        1
    }
}

impl Poll {
    /// Build a new active poll with a fresh id and a slug derived from the title.
    pub fn new(title: impl Into<String>, content: PollContent) -> Self {
        let title = title.into();
        let now = Utc::now();
        Self {
            id: cuid2::cuid(),
            slug: crate::utils::slug::generate_slug(&title),
            status: PollStatus::Active,
            title,
            description: None,
            creator_id: None,
            conversation_id: None,
            created_at: now,
            updated_at: now,
            content,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_creator(mut self, creator_id: impl Into<String>) -> Self {
        self.creator_id = Some(creator_id.into());
        self
    }

    pub fn poll_type(&self) -> PollType {
        self.content.poll_type()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Move to `next`, refusing backwards or same-state transitions.
    pub fn transition_to(&mut self, next: PollStatus) -> PollResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(PollError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    /// Deep copy with a new identity: fresh id and slug, title suffixed
    /// with ` (copie)`, active again, new timestamps and no conversation.
    pub fn duplicate(&self) -> Poll {
        let mut title: String = self.title.trim().to_string();
        let max_base = MAX_TITLE_LENGTH - DUPLICATE_SUFFIX.chars().count();
        if title.chars().count() > max_base {
            title = title.chars().take(max_base).collect();
        }
        title.push_str(DUPLICATE_SUFFIX);

        let now = Utc::now();
        Poll {
            id: cuid2::cuid(),
            slug: crate::utils::slug::generate_slug(&title),
            status: PollStatus::Active,
            title,
            description: self.description.clone(),
            creator_id: self.creator_id.clone(),
            conversation_id: None,
            created_at: now,
            updated_at: now,
            content: self.content.clone(),
        }
    }

    /// Whether the poll matches a case-insensitive search over title and description.
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&needle)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle))
    }

    pub fn validate(&self) -> PollResult<()> {
        if !crate::utils::validation::validate_poll_title(&self.title) {
            return Err(PollError::validation(
                "poll title must be between 1 and 255 characters",
            ));
        }
        if self.slug.trim().is_empty() {
            return Err(PollError::validation("poll slug cannot be empty"));
        }
        if let PollContent::Date(content) = &self.content {
            if let Some(bad) = content
                .dates
                .iter()
                .find(|date| !crate::utils::validation::is_valid_date(date))
            {
                return Err(PollError::validation(format!("invalid poll date '{bad}'")));
            }
        }
        if let PollContent::Availability(content) = &self.content {
            if let Some(bad) = content.proposed_slots.iter().find(|slot| {
                !crate::utils::validation::is_valid_date(&slot.date)
                    || !crate::utils::validation::validate_time_range(&slot.start, &slot.end)
            }) {
                return Err(PollError::validation(format!(
                    "invalid proposed slot '{}'",
                    bad.label()
                )));
            }
        }
        Ok(())
    }
}

impl From<DatePollContent> for PollContent {
    fn from(content: DatePollContent) -> Self {
        PollContent::Date(content)
    }
}

impl From<FormPollContent> for PollContent {
    fn from(content: FormPollContent) -> Self {
        PollContent::Form(content)
    }
}

impl From<AvailabilityPollContent> for PollContent {
    fn from(content: AvailabilityPollContent) -> Self {
        PollContent::Availability(content)
    }
}

impl From<QuizzPollContent> for PollContent {
    fn from(content: QuizzPollContent) -> Self {
        PollContent::Quizz(content)
    }
}
