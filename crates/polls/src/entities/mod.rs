//! Domain entities for polls, votes and AI conversations.

pub mod conversation;
pub mod poll;
pub mod settings;
pub mod vote;

pub use conversation::{Conversation, ConversationMessage, MessageRole};
pub use poll::{
    AvailabilityPollContent, DatePollContent, FormPollContent, FormQuestion, Poll, PollContent,
    PollStatus, PollType, ProposedSlot, QuestionKind, QuestionOption, QuizzPollContent,
    QuizzQuestion, TimeSlot, TimeSlotMap, DUPLICATE_SUFFIX,
};
pub use settings::{
    AvailabilityPollSettings, CommonSettings, DatePollSettings, FormPollSettings, PollSettings,
    QuizzPollSettings, ResultsVisibility,
};
pub use vote::{anonymized_name, AnswerValue, Preference, Vote, VotePayload};
