//! Dashboard listing and bulk status changes.

use std::sync::Arc;

use tracing::{info, warn};

use crate::entities::{Poll, PollStatus};
use crate::repositories::PollStore;
use crate::types::{
    BulkOutcome, DashboardQuery, Page, PollError, PollResult, PollSummary, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};

/// Service for the poll dashboard
#[derive(Clone)]
pub struct DashboardService {
    store: Arc<dyn PollStore>,
}

impl DashboardService {
    pub fn new(store: Arc<dyn PollStore>) -> Self {
        Self { store }
    }

    /// Filtered, paginated summaries, most recently updated first
    pub async fn list(&self, query: &DashboardQuery) -> PollResult<Page<PollSummary>> {
        let (page, page_size) = paging(query)?;

        let mut polls: Vec<Poll> = self
            .store
            .list_polls()
            .await?
            .into_iter()
            .filter(|poll| matches_query(poll, query))
            .collect();
        polls.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let total = polls.len() as u64;
        let total_pages = total.div_ceil(u64::from(page_size)) as u32;
        let offset = (page as usize - 1) * page_size as usize;

        let mut items = Vec::new();
        for poll in polls.iter().skip(offset).take(page_size as usize) {
            let votes = self.store.count_votes(&poll.id).await?;
            items.push(PollSummary::from_poll(poll, votes));
        }

        Ok(Page {
            items,
            page,
            page_size,
            total,
            total_pages,
        })
    }

    /// Archive each poll in turn. Polls already archived count as failures.
    pub async fn bulk_archive(&self, ids: &[String]) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();

        for id in ids {
            match self.archive_one(id).await {
                Ok(poll) => outcome.succeeded.push(poll.id),
                Err(err) => {
                    warn!(poll_id = %id, error = %err, "bulk archive item failed");
                    outcome.record_failure(id.clone(), err);
                }
            }
        }

        info!(
            succeeded = outcome.success_count(),
            failed = outcome.failure_count(),
            "bulk archive finished"
        );
        outcome
    }

    async fn archive_one(&self, id: &str) -> PollResult<Poll> {
        let mut poll = self.store.require_poll(id).await?;
        poll.transition_to(PollStatus::Archived)?;
        self.store.save_poll(&poll).await?;
        Ok(poll)
    }
}

fn paging(query: &DashboardQuery) -> PollResult<(u32, u32)> {
    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE);

    if page == 0 {
        return Err(PollError::validation("page must be at least 1"));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(PollError::validation(format!(
            "page size must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    Ok((page, page_size))
}

fn matches_query(poll: &Poll, query: &DashboardQuery) -> bool {
    query.status.map_or(true, |status| poll.status == status)
        && query.poll_type.map_or(true, |kind| poll.poll_type() == kind)
        && query
            .search
            .as_deref()
            .map_or(true, |needle| poll.matches_search(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{DatePollContent, FormPollContent, PollType};
    use crate::repositories::MemoryPollStore;
    use chrono::Duration;

    async fn seeded() -> (Arc<MemoryPollStore>, Vec<Poll>) {
        let store = Arc::new(MemoryPollStore::new());
        let mut polls = Vec::new();
        for i in 0..15 {
            let mut poll = if i % 3 == 0 {
                Poll::new(format!("Formulaire {i}"), FormPollContent::default().into())
            } else {
                Poll::new(format!("Sortie {i}"), DatePollContent::default().into())
                    .with_description("Randonnée en montagne")
            };
            poll.updated_at -= Duration::minutes(i);
            store.insert_poll(&poll).await.unwrap();
            polls.push(poll);
        }
        (store, polls)
    }

    #[tokio::test]
    async fn test_default_page_and_order() {
        let (store, polls) = seeded().await;
        let page = DashboardService::new(store)
            .list(&DashboardQuery::default())
            .await
            .unwrap();

        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 12);
        assert_eq!(page.total, 15);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items.len(), 12);
        assert_eq!(page.items[0].id, polls[0].id);
        assert!(page
            .items
            .windows(2)
            .all(|w| w[0].updated_at >= w[1].updated_at));
    }

    #[tokio::test]
    async fn test_filters_combine() {
        let (store, _) = seeded().await;
        let service = DashboardService::new(store);

        let forms = service
            .list(&DashboardQuery {
                poll_type: Some(PollType::Form),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(forms.total, 5);

        let searched = service
            .list(&DashboardQuery {
                search: Some("RANDONNÉE".into()),
                page_size: Some(100),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(searched.total, 10);
        assert!(searched.items.iter().all(|p| p.poll_type == PollType::Date));
    }

    #[tokio::test]
    async fn test_invalid_paging_rejected() {
        let (store, _) = seeded().await;
        let service = DashboardService::new(store);
        for query in [
            DashboardQuery {
                page: Some(0),
                ..Default::default()
            },
            DashboardQuery {
                page_size: Some(101),
                ..Default::default()
            },
        ] {
            assert!(matches!(
                service.list(&query).await,
                Err(PollError::Validation { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_bulk_archive_tallies() {
        let (store, polls) = seeded().await;
        let service = DashboardService::new(store.clone());
        let ids = vec![polls[0].id.clone(), polls[0].id.clone(), "nope".into()];

        let outcome = service.bulk_archive(&ids).await;
        assert_eq!(outcome.success_count(), 1);
        assert_eq!(outcome.failure_count(), 2);

        let archived = service
            .list(&DashboardQuery {
                status: Some(PollStatus::Archived),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(archived.total, 1);
    }
}
