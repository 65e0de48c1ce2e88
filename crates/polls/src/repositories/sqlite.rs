//! SQLite-backed poll store.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use super::PollStore;
use crate::entities::{anonymized_name, Conversation, Poll, Vote};
use crate::types::{PollError, PollResult};

const POLL_COLUMNS: &str = "id, slug, poll_type, status, title, description, creator_id, \
                            conversation_id, content, created_at, updated_at";

#[derive(Clone)]
pub struct SqlitePollStore {
    pool: SqlitePool,
}

impl SqlitePollStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn poll_from_row(row: &SqliteRow) -> PollResult<Poll> {
    let status: String = row.try_get("status")?;
    let content: String = row.try_get("content")?;

    Ok(Poll {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        status: status.parse()?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        creator_id: row.try_get("creator_id")?,
        conversation_id: row.try_get("conversation_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        content: serde_json::from_str(&content)?,
    })
}

fn vote_from_row(row: &SqliteRow) -> PollResult<Vote> {
    let payload: String = row.try_get("payload")?;

    Ok(Vote {
        id: row.try_get("id")?,
        poll_id: row.try_get("poll_id")?,
        voter_name: row.try_get("voter_name")?,
        voter_email: row.try_get("voter_email")?,
        created_at: row.try_get("created_at")?,
        payload: serde_json::from_str(&payload)?,
    })
}

fn conversation_from_row(row: &SqliteRow) -> PollResult<Conversation> {
    let messages: String = row.try_get("messages")?;

    Ok(Conversation {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        messages: serde_json::from_str(&messages)?,
        poll_id: row.try_get("poll_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_insert_error(err: sqlx::Error, poll: &Poll) -> PollError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return if db.message().contains("slug") {
                PollError::duplicate_slug(&poll.slug)
            } else {
                PollError::validation(format!("poll {} already exists", poll.id))
            };
        }
    }
    PollError::Database(err)
}

fn map_vote_error(err: sqlx::Error, vote: &Vote) -> PollError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_foreign_key_violation() {
            return PollError::poll_not_found(&vote.poll_id);
        }
    }
    PollError::Database(err)
}

#[async_trait]
impl PollStore for SqlitePollStore {
    async fn list_polls(&self) -> PollResult<Vec<Poll>> {
        let rows = sqlx::query(&format!(
            "SELECT {POLL_COLUMNS} FROM polls ORDER BY updated_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(poll_from_row).collect()
    }

    async fn find_poll(&self, slug_or_id: &str) -> PollResult<Option<Poll>> {
        let row = sqlx::query(&format!(
            "SELECT {POLL_COLUMNS} FROM polls
             WHERE id = ? OR slug = ?
             ORDER BY CASE WHEN id = ? THEN 0 ELSE 1 END
             LIMIT 1"
        ))
        .bind(slug_or_id)
        .bind(slug_or_id)
        .bind(slug_or_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(poll_from_row).transpose()
    }

    async fn insert_poll(&self, poll: &Poll) -> PollResult<()> {
        let content = serde_json::to_string(&poll.content)?;

        sqlx::query(&format!(
            "INSERT INTO polls ({POLL_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&poll.id)
        .bind(&poll.slug)
        .bind(poll.poll_type().as_str())
        .bind(poll.status.as_str())
        .bind(&poll.title)
        .bind(&poll.description)
        .bind(&poll.creator_id)
        .bind(&poll.conversation_id)
        .bind(&content)
        .bind(poll.created_at)
        .bind(poll.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, poll))?;

        info!(
            poll_id = %poll.id,
            slug = %poll.slug,
            poll_type = %poll.poll_type(),
            "created poll"
        );
        Ok(())
    }

    async fn save_poll(&self, poll: &Poll) -> PollResult<()> {
        let content = serde_json::to_string(&poll.content)?;

        let result = sqlx::query(
            "UPDATE polls
             SET status = ?, title = ?, description = ?, creator_id = ?, conversation_id = ?,
                 content = ?, updated_at = ?
             WHERE id = ? AND poll_type = ?",
        )
        .bind(poll.status.as_str())
        .bind(&poll.title)
        .bind(&poll.description)
        .bind(&poll.creator_id)
        .bind(&poll.conversation_id)
        .bind(&content)
        .bind(poll.updated_at)
        .bind(&poll.id)
        .bind(poll.poll_type().as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let stored_type: Option<String> =
                sqlx::query_scalar("SELECT poll_type FROM polls WHERE id = ?")
                    .bind(&poll.id)
                    .fetch_optional(&self.pool)
                    .await?;

            return Err(match stored_type {
                Some(stored) => PollError::validation(format!(
                    "poll type cannot change from {stored} to {}",
                    poll.poll_type()
                )),
                None => PollError::poll_not_found(&poll.id),
            });
        }

        debug!(poll_id = %poll.id, status = %poll.status, "saved poll");
        Ok(())
    }

    async fn delete_poll(&self, id: &str) -> PollResult<bool> {
        let result = sqlx::query("DELETE FROM polls WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(poll_id = %id, "deleted poll");
        }
        Ok(deleted)
    }

    async fn list_votes(&self, poll_id: &str) -> PollResult<Vec<Vote>> {
        let rows = sqlx::query(
            "SELECT id, poll_id, voter_name, voter_email, payload, created_at
             FROM votes WHERE poll_id = ?
             ORDER BY created_at ASC, id ASC",
        )
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(vote_from_row).collect()
    }

    async fn count_votes(&self, poll_id: &str) -> PollResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM votes WHERE poll_id = ?")
            .bind(poll_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn insert_vote(&self, vote: &Vote) -> PollResult<()> {
        let payload = serde_json::to_string(&vote.payload)?;

        sqlx::query(
            "INSERT INTO votes (id, poll_id, voter_name, voter_email, payload, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&vote.id)
        .bind(&vote.poll_id)
        .bind(&vote.voter_name)
        .bind(&vote.voter_email)
        .bind(&payload)
        .bind(vote.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_vote_error(e, vote))?;

        debug!(poll_id = %vote.poll_id, vote_id = %vote.id, "recorded vote");
        Ok(())
    }

    async fn delete_votes_for_poll(&self, poll_id: &str) -> PollResult<u64> {
        let result = sqlx::query("DELETE FROM votes WHERE poll_id = ?")
            .bind(poll_id)
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected();
        info!(poll_id = %poll_id, removed, "deleted votes for poll");
        Ok(removed)
    }

    async fn anonymize_votes_for_poll(&self, poll_id: &str) -> PollResult<u64> {
        let mut tx = self.pool.begin().await?;

        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM votes WHERE poll_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(poll_id)
        .fetch_all(&mut *tx)
        .await?;

        for (position, id) in ids.iter().enumerate() {
            sqlx::query("UPDATE votes SET voter_name = ?, voter_email = NULL WHERE id = ?")
                .bind(anonymized_name(position))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        let touched = ids.len() as u64;
        info!(poll_id = %poll_id, votes = touched, "anonymized votes");
        Ok(touched)
    }

    async fn find_conversation(&self, id: &str) -> PollResult<Option<Conversation>> {
        let row = sqlx::query(
            "SELECT id, title, messages, poll_id, created_at, updated_at
             FROM conversations WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(conversation_from_row).transpose()
    }

    async fn insert_conversation(&self, conversation: &Conversation) -> PollResult<()> {
        let messages = serde_json::to_string(&conversation.messages)?;

        sqlx::query(
            "INSERT INTO conversations (id, title, messages, poll_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&conversation.id)
        .bind(&conversation.title)
        .bind(&messages)
        .bind(&conversation.poll_id)
        .bind(conversation.created_at)
        .bind(conversation.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(conversation_id = %conversation.id, "created conversation");
        Ok(())
    }

    async fn delete_conversation(&self, id: &str) -> PollResult<bool> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if !deleted {
            warn!(conversation_id = %id, "conversation to delete was not found");
        }
        Ok(deleted)
    }

    async fn clear(&self) -> PollResult<()> {
        let mut tx = self.pool.begin().await?;
        for table in ["votes", "polls", "conversations"] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        info!("cleared all poll data");
        Ok(())
    }
}
