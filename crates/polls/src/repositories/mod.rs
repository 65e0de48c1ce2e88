//! Poll storage layer.
//!
//! [`PollStore`] is the seam every service talks to. [`SqlitePollStore`]
//! backs the server; [`MemoryPollStore`] serves tests and ephemeral runs.

use async_trait::async_trait;
use tracing::info;

use crate::entities::{Conversation, Poll, Vote};
use crate::types::{PollError, PollResult};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryPollStore;
pub use sqlite::SqlitePollStore;

#[async_trait]
pub trait PollStore: Send + Sync {
    /// Every poll, most recently updated first.
    async fn list_polls(&self) -> PollResult<Vec<Poll>>;

    /// Look a poll up by id first, then by slug.
    async fn find_poll(&self, slug_or_id: &str) -> PollResult<Option<Poll>>;

    /// Store a new poll. Fails with [`PollError::DuplicateSlug`] when the
    /// slug is taken.
    async fn insert_poll(&self, poll: &Poll) -> PollResult<()>;

    /// Persist changes to an existing poll. The stored slug is kept and a
    /// change of poll type is rejected.
    async fn save_poll(&self, poll: &Poll) -> PollResult<()>;

    async fn delete_poll(&self, id: &str) -> PollResult<bool>;

    async fn list_votes(&self, poll_id: &str) -> PollResult<Vec<Vote>>;

    async fn count_votes(&self, poll_id: &str) -> PollResult<u64>;

    async fn insert_vote(&self, vote: &Vote) -> PollResult<()>;

    async fn delete_votes_for_poll(&self, poll_id: &str) -> PollResult<u64>;

    /// Rename voters to `Participant N` in submission order and drop their
    /// emails. Returns the number of votes touched.
    async fn anonymize_votes_for_poll(&self, poll_id: &str) -> PollResult<u64>;

    async fn find_conversation(&self, id: &str) -> PollResult<Option<Conversation>>;

    async fn insert_conversation(&self, conversation: &Conversation) -> PollResult<()>;

    async fn delete_conversation(&self, id: &str) -> PollResult<bool>;

    /// Remove every poll, vote and conversation.
    async fn clear(&self) -> PollResult<()>;

    async fn require_poll(&self, slug_or_id: &str) -> PollResult<Poll> {
        self.find_poll(slug_or_id)
            .await?
            .ok_or_else(|| PollError::poll_not_found(slug_or_id))
    }

    /// Upsert many polls, one at a time.
    async fn save_polls(&self, polls: &[Poll]) -> PollResult<()> {
        for poll in polls {
            match self.find_poll(&poll.id).await? {
                Some(existing) if existing.id == poll.id => self.save_poll(poll).await?,
                _ => self.insert_poll(poll).await?,
            }
        }
        Ok(())
    }

    /// Store a deep copy of `poll` (see [`Poll::duplicate`]). Votes are
    /// not copied.
    async fn duplicate_poll(&self, poll: &Poll) -> PollResult<Poll> {
        let copy = poll.duplicate();
        self.insert_poll(&copy).await?;
        info!(
            source_id = %poll.id,
            poll_id = %copy.id,
            slug = %copy.slug,
            "duplicated poll"
        );
        Ok(copy)
    }
}
