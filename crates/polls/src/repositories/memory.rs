//! In-memory poll store used by tests and ephemeral runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::PollStore;
use crate::entities::{anonymized_name, Conversation, Poll, Vote};
use crate::types::{PollError, PollResult};

#[derive(Default)]
struct MemoryState {
    polls: HashMap<String, Poll>,
    votes: Vec<Vote>,
    conversations: HashMap<String, Conversation>,
}

/// Mirrors the SQLite store's rules: unique slugs, fixed slug and type,
/// votes removed together with their poll.
#[derive(Clone, Default)]
pub struct MemoryPollStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryPollStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PollStore for MemoryPollStore {
    async fn list_polls(&self) -> PollResult<Vec<Poll>> {
        let state = self.state.read().await;
        let mut polls: Vec<Poll> = state.polls.values().cloned().collect();
        polls.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(polls)
    }

    async fn find_poll(&self, slug_or_id: &str) -> PollResult<Option<Poll>> {
        let state = self.state.read().await;
        Ok(state
            .polls
            .get(slug_or_id)
            .or_else(|| state.polls.values().find(|p| p.slug == slug_or_id))
            .cloned())
    }

    async fn insert_poll(&self, poll: &Poll) -> PollResult<()> {
        let mut state = self.state.write().await;
        if state.polls.values().any(|p| p.slug == poll.slug) {
            return Err(PollError::duplicate_slug(&poll.slug));
        }
        if state.polls.contains_key(&poll.id) {
            return Err(PollError::validation(format!(
                "poll {} already exists",
                poll.id
            )));
        }
        state.polls.insert(poll.id.clone(), poll.clone());
        debug!(poll_id = %poll.id, slug = %poll.slug, "created poll in memory");
        Ok(())
    }

    async fn save_poll(&self, poll: &Poll) -> PollResult<()> {
        let mut state = self.state.write().await;
        let stored = state
            .polls
            .get_mut(&poll.id)
            .ok_or_else(|| PollError::poll_not_found(&poll.id))?;

        if stored.poll_type() != poll.poll_type() {
            return Err(PollError::validation(format!(
                "poll type cannot change from {} to {}",
                stored.poll_type(),
                poll.poll_type()
            )));
        }

        let slug = stored.slug.clone();
        let created_at = stored.created_at;
        *stored = poll.clone();
        stored.slug = slug;
        stored.created_at = created_at;
        Ok(())
    }

    async fn delete_poll(&self, id: &str) -> PollResult<bool> {
        let mut state = self.state.write().await;
        let deleted = state.polls.remove(id).is_some();
        if deleted {
            state.votes.retain(|v| v.poll_id != id);
        }
        Ok(deleted)
    }

    async fn list_votes(&self, poll_id: &str) -> PollResult<Vec<Vote>> {
        let state = self.state.read().await;
        let mut votes: Vec<Vote> = state
            .votes
            .iter()
            .filter(|v| v.poll_id == poll_id)
            .cloned()
            .collect();
        votes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(votes)
    }

    async fn count_votes(&self, poll_id: &str) -> PollResult<u64> {
        let state = self.state.read().await;
        Ok(state.votes.iter().filter(|v| v.poll_id == poll_id).count() as u64)
    }

    async fn insert_vote(&self, vote: &Vote) -> PollResult<()> {
        let mut state = self.state.write().await;
        if !state.polls.contains_key(&vote.poll_id) {
            return Err(PollError::poll_not_found(&vote.poll_id));
        }
        state.votes.push(vote.clone());
        Ok(())
    }

    async fn delete_votes_for_poll(&self, poll_id: &str) -> PollResult<u64> {
        let mut state = self.state.write().await;
        let before = state.votes.len();
        state.votes.retain(|v| v.poll_id != poll_id);
        Ok((before - state.votes.len()) as u64)
    }

    async fn anonymize_votes_for_poll(&self, poll_id: &str) -> PollResult<u64> {
        let mut state = self.state.write().await;
        let mut owned: Vec<&mut Vote> = state
            .votes
            .iter_mut()
            .filter(|v| v.poll_id == poll_id)
            .collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        for (position, vote) in owned.iter_mut().enumerate() {
            vote.voter_name = Some(anonymized_name(position));
            vote.voter_email = None;
        }
        Ok(owned.len() as u64)
    }

    async fn find_conversation(&self, id: &str) -> PollResult<Option<Conversation>> {
        let state = self.state.read().await;
        Ok(state.conversations.get(id).cloned())
    }

    async fn insert_conversation(&self, conversation: &Conversation) -> PollResult<()> {
        let mut state = self.state.write().await;
        state
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    async fn delete_conversation(&self, id: &str) -> PollResult<bool> {
        let mut state = self.state.write().await;
        Ok(state.conversations.remove(id).is_some())
    }

    async fn clear(&self) -> PollResult<()> {
        let mut state = self.state.write().await;
        *state = MemoryState::default();
        Ok(())
    }
}
