//! Settings service for editing a poll's title, description and settings.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::entities::{Poll, PollSettings};
use crate::repositories::PollStore;
use crate::types::{PollError, PollResult, UpdatePollSettingsRequest};
use crate::utils::validation::validate_poll_title;

/// Service backing the poll settings form
#[derive(Clone)]
pub struct SettingsService {
    store: Arc<dyn PollStore>,
}

impl SettingsService {
    pub fn new(store: Arc<dyn PollStore>) -> Self {
        Self { store }
    }

    /// Current settings of a poll
    pub async fn get_settings(&self, slug_or_id: &str) -> PollResult<PollSettings> {
        let poll = self.store.require_poll(slug_or_id).await?;
        Ok(poll.content.settings())
    }

    /// Apply the submitted edits and persist the poll
    pub async fn update_settings(
        &self,
        slug_or_id: &str,
        request: UpdatePollSettingsRequest,
    ) -> PollResult<Poll> {
        let mut poll = self.store.require_poll(slug_or_id).await?;
        apply_update(&mut poll, request, Utc::now())?;
        poll.touch();
        self.store.save_poll(&poll).await?;

        info!(poll_id = %poll.id, slug = %poll.slug, "updated poll settings");
        Ok(poll)
    }
}

/// Validate `request` against `poll` and apply it. Nothing is changed when
/// validation fails.
pub fn apply_update(
    poll: &mut Poll,
    request: UpdatePollSettingsRequest,
    now: DateTime<Utc>,
) -> PollResult<()> {
    let title = match request.title {
        Some(title) if !validate_poll_title(&title) => {
            return Err(PollError::validation(
                "poll title must be between 1 and 255 characters",
            ));
        }
        Some(title) => Some(title.trim().to_string()),
        None => None,
    };

    if let Some(settings) = &request.settings {
        validate_settings(poll, settings, now)?;
    }

    let mut content = poll.content.clone();
    if let Some(settings) = request.settings {
        content.apply_settings(settings)?;
    }

    poll.content = content;
    if let Some(title) = title {
        poll.title = title;
    }
    if let Some(description) = request.description {
        let description = description.trim();
        poll.description = (!description.is_empty()).then(|| description.to_string());
    }
    Ok(())
}

fn validate_settings(poll: &Poll, settings: &PollSettings, now: DateTime<Utc>) -> PollResult<()> {
    if settings.poll_type() != poll.poll_type() {
        return Err(PollError::validation(format!(
            "{} settings cannot be applied to a {} poll",
            settings.poll_type(),
            poll.poll_type()
        )));
    }

    let common = settings.common();
    if matches!(common.expires_at, Some(expires_at) if expires_at <= now) {
        return Err(PollError::validation("expiration date must be in the future"));
    }
    if common.max_responses == Some(0) {
        return Err(PollError::validation("max responses must be at least 1"));
    }
    if let PollSettings::Availability(availability) = settings {
        if availability.time_granularity_minutes == 0 {
            return Err(PollError::validation(
                "time granularity must be a positive number of minutes",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        DatePollContent, DatePollSettings, FormPollContent, FormPollSettings, ResultsVisibility,
    };
    use crate::repositories::MemoryPollStore;
    use chrono::Duration;

    fn date_poll() -> Poll {
        Poll::new("Dîner", DatePollContent::default().into()).with_description("Chez Marie")
    }

    #[test]
    fn test_title_trimmed_and_description_cleared() {
        let mut poll = date_poll();
        let request = UpdatePollSettingsRequest {
            title: Some("  Dîner de fin d'année  ".into()),
            description: Some("   ".into()),
            settings: None,
        };
        apply_update(&mut poll, request, Utc::now()).unwrap();
        assert_eq!(poll.title, "Dîner de fin d'année");
        assert_eq!(poll.description, None);
    }

    #[test]
    fn test_blank_title_rejected_without_changes() {
        let mut poll = date_poll();
        let request = UpdatePollSettingsRequest {
            title: Some("   ".into()),
            description: Some("Autre".into()),
            settings: None,
        };
        assert!(apply_update(&mut poll, request, Utc::now()).is_err());
        assert_eq!(poll.title, "Dîner");
        assert_eq!(poll.description.as_deref(), Some("Chez Marie"));
    }

    #[test]
    fn test_mismatched_settings_variant_rejected() {
        let mut poll = date_poll();
        let request = UpdatePollSettingsRequest {
            settings: Some(PollSettings::Form(FormPollSettings::default())),
            ..Default::default()
        };
        let err = apply_update(&mut poll, request, Utc::now()).unwrap_err();
        assert!(matches!(err, PollError::Validation { .. }));
    }

    #[test]
    fn test_past_expiry_rejected() {
        let now = Utc::now();
        let mut settings = DatePollSettings::default();
        settings.common.expires_at = Some(now - Duration::hours(1));
        let mut poll = date_poll();
        let request = UpdatePollSettingsRequest {
            settings: Some(PollSettings::Date(settings)),
            ..Default::default()
        };
        assert!(apply_update(&mut poll, request, now).is_err());
    }

    #[tokio::test]
    async fn test_update_settings_persists() {
        let store = Arc::new(MemoryPollStore::new());
        let poll = Poll::new("Questionnaire", FormPollContent::default().into());
        store.insert_poll(&poll).await.unwrap();
        let service = SettingsService::new(store.clone());

        let mut settings = FormPollSettings::default();
        settings.one_response_per_person = true;
        settings.common.results_visibility = ResultsVisibility::CreatorOnly;
        settings.common.max_responses = Some(40);

        let updated = service
            .update_settings(
                &poll.slug,
                UpdatePollSettingsRequest {
                    settings: Some(PollSettings::Form(settings.clone())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.updated_at >= poll.updated_at);

        assert_eq!(
            service.get_settings(&poll.id).await.unwrap(),
            PollSettings::Form(settings)
        );
    }
}
