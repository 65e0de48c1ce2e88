use std::sync::Arc;
use std::time::Duration;

use doodates_config::{AnalyticsConfig, AppConfig};
use doodates_polls::PollStore;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::ResponseCache;
use crate::client::{GeminiClient, GenerativeModel};
use crate::context::build_results_context;
use crate::insights::{extract_keyword_insights, parse_auto_insights, AutoInsight};
use crate::prompts::{auto_insights_prompt, query_prompt};
use crate::{AnalyticsError, AnalyticsResult};

/// Answer to a natural-language question about a poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsResponse {
    pub answer: String,
    pub insights: Vec<String>,
    pub confidence: f32,
    pub cached: bool,
}

pub struct PollAnalyticsService {
    model: Option<Arc<dyn GenerativeModel>>,
    store: Arc<dyn PollStore>,
    cache: Mutex<ResponseCache<AnalyticsResponse>>,
    confidence: f32,
}

impl PollAnalyticsService {
    /// Without a model every query fails with [`AnalyticsError::NotInitialized`].
    pub fn new(
        model: Option<Arc<dyn GenerativeModel>>,
        store: Arc<dyn PollStore>,
        config: &AnalyticsConfig,
    ) -> Self {
        Self {
            model,
            store,
            cache: Mutex::new(ResponseCache::new(
                Duration::from_secs(config.cache_ttl_seconds),
                config.cache_capacity,
            )),
            confidence: config.answer_confidence,
        }
    }

    /// Wire the Gemini client when an API key is available.
    pub fn from_config(config: &AppConfig, store: Arc<dyn PollStore>) -> AnalyticsResult<Self> {
        let model = GeminiClient::from_config(&config.gemini)?
            .map(|client| Arc::new(client) as Arc<dyn GenerativeModel>);
        if model.is_some() {
            info!(model = %config.gemini.model, "analytics service initialised");
        }
        Ok(Self::new(model, store, &config.analytics))
    }

    pub fn is_initialized(&self) -> bool {
        self.model.is_some()
    }

    fn model(&self) -> AnalyticsResult<&Arc<dyn GenerativeModel>> {
        self.model.as_ref().ok_or(AnalyticsError::NotInitialized)
    }

    async fn poll_context(&self, poll_id: &str) -> AnalyticsResult<String> {
        let poll = self
            .store
            .find_poll(poll_id)
            .await?
            .ok_or_else(|| AnalyticsError::PollNotFound(poll_id.to_string()))?;
        let votes = self.store.list_votes(&poll.id).await?;
        Ok(build_results_context(&poll, &votes))
    }

    /// Answer `question` about the poll, serving repeated questions from
    /// the cache until they expire.
    pub async fn query_poll(
        &self,
        question: &str,
        poll_id: &str,
    ) -> AnalyticsResult<AnalyticsResponse> {
        let normalised = question.trim().to_lowercase();
        if normalised.is_empty() {
            return Err(AnalyticsError::EmptyQuestion);
        }
        let model = self.model()?;
        let cache_key = format!("{poll_id}:{normalised}");

        if let Some(mut hit) = self.cache.lock().await.get(&cache_key) {
            debug!(poll_id = %poll_id, "analytics cache hit");
            hit.cached = true;
            return Ok(hit);
        }

        let context = self.poll_context(poll_id).await?;
        let answer = model
            .generate_content(&query_prompt(&context, question.trim()))
            .await
            .map_err(|err| {
                warn!(poll_id = %poll_id, error = %err, "analytics query failed");
                err
            })?;

        let response = AnalyticsResponse {
            insights: extract_keyword_insights(&answer),
            answer,
            confidence: self.confidence,
            cached: false,
        };
        self.cache.lock().await.insert(cache_key, response.clone());

        info!(
            poll_id = %poll_id,
            insights = response.insights.len(),
            "answered analytics query"
        );
        Ok(response)
    }

    /// Background insights for the poll. Never fails: any error is logged
    /// and yields an empty list.
    pub async fn generate_auto_insights(&self, poll_id: &str) -> Vec<AutoInsight> {
        match self.try_auto_insights(poll_id).await {
            Ok(insights) => {
                debug!(poll_id = %poll_id, count = insights.len(), "generated auto insights");
                insights
            }
            Err(err) => {
                warn!(poll_id = %poll_id, error = %err, "auto insights unavailable");
                Vec::new()
            }
        }
    }

    async fn try_auto_insights(&self, poll_id: &str) -> AnalyticsResult<Vec<AutoInsight>> {
        let model = self.model()?;
        let context = self.poll_context(poll_id).await?;
        let text = model
            .generate_content(&auto_insights_prompt(&context))
            .await?;
        Ok(parse_auto_insights(&text)?)
    }

    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
        debug!("analytics cache cleared");
    }

    pub async fn cache_len(&self) -> usize {
        self.cache.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockGenerativeModel;
    use crate::insights::InsightType;
    use doodates_polls::{DatePollContent, MemoryPollStore, Poll};

    async fn store_with_poll() -> (Arc<MemoryPollStore>, Poll) {
        let store = Arc::new(MemoryPollStore::new());
        let poll = Poll::new(
            "Sortie vélo",
            DatePollContent {
                dates: vec!["2025-05-01".into()],
                ..Default::default()
            }
            .into(),
        );
        store.insert_poll(&poll).await.unwrap();
        (store, poll)
    }

    fn service(model: MockGenerativeModel, store: Arc<MemoryPollStore>) -> PollAnalyticsService {
        PollAnalyticsService::new(Some(Arc::new(model)), store, &AnalyticsConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_until_ttl_expires() {
        let (store, poll) = store_with_poll().await;
        let mut model = MockGenerativeModel::new();
        model
            .expect_generate_content()
            .times(2)
            .returning(|_| Ok("La majorité vient le 1er mai. Rien d'autre.".to_string()));
        let service = service(model, store);

        let first = service.query_poll("Quel jour ?", &poll.id).await.unwrap();
        assert!(!first.cached);
        assert_eq!(first.insights, vec!["La majorité vient le 1er mai"]);
        assert!((first.confidence - 0.85).abs() < 1e-6);

        let second = service.query_poll("  QUEL jour ?  ", &poll.id).await.unwrap();
        assert!(second.cached);
        assert_eq!(second.answer, first.answer);

        tokio::time::advance(Duration::from_secs(301)).await;
        let third = service.query_poll("Quel jour ?", &poll.id).await.unwrap();
        assert!(!third.cached);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest_question() {
        let (store, poll) = store_with_poll().await;
        let mut model = MockGenerativeModel::new();
        model
            .expect_generate_content()
            .times(52)
            .returning(|_| Ok("Réponse".to_string()));
        let service = service(model, store);

        for i in 0..51 {
            service
                .query_poll(&format!("question {i}"), &poll.id)
                .await
                .unwrap();
        }
        assert_eq!(service.cache_len().await, 50);

        let evicted = service.query_poll("question 0", &poll.id).await.unwrap();
        assert!(!evicted.cached);
        let kept = service.query_poll("question 50", &poll.id).await.unwrap();
        assert!(kept.cached);
    }

    #[tokio::test]
    async fn test_query_errors_are_typed() {
        let (store, poll) = store_with_poll().await;

        let uninitialised =
            PollAnalyticsService::new(None, store.clone(), &AnalyticsConfig::default());
        assert!(matches!(
            uninitialised.query_poll("Qui ?", &poll.id).await,
            Err(AnalyticsError::NotInitialized)
        ));

        let mut model = MockGenerativeModel::new();
        model.expect_generate_content().times(1).returning(|_| {
            Err(AnalyticsError::Api {
                status: 500,
                body: "boom".into(),
            })
        });
        let service = service(model, store);
        assert!(matches!(
            service.query_poll("Qui ?", "inconnu").await,
            Err(AnalyticsError::PollNotFound(_))
        ));
        assert!(matches!(
            service.query_poll("Qui ?", &poll.id).await,
            Err(AnalyticsError::Api { status: 500, .. })
        ));
        assert!(matches!(
            service.query_poll("   ", &poll.id).await,
            Err(AnalyticsError::EmptyQuestion)
        ));
        assert_eq!(service.cache_len().await, 0);
    }

    #[tokio::test]
    async fn test_auto_insights_never_fail() {
        let (store, poll) = store_with_poll().await;

        let mut garbage = MockGenerativeModel::new();
        garbage
            .expect_generate_content()
            .returning(|_| Ok("Je ne peux pas répondre en JSON.".to_string()));
        assert!(service(garbage, store.clone())
            .generate_auto_insights(&poll.id)
            .await
            .is_empty());

        let mut failing = MockGenerativeModel::new();
        failing
            .expect_generate_content()
            .returning(|_| Err(AnalyticsError::InvalidResponse("empty".into())));
        assert!(service(failing, store.clone())
            .generate_auto_insights(&poll.id)
            .await
            .is_empty());

        let mut good = MockGenerativeModel::new();
        good.expect_generate_content().returning(|_| {
            Ok(r#"[{"type":"recommendation","title":"Relancer","description":"Peu de votes","confidence":70}]"#
                .to_string())
        });
        let insights = service(good, store).generate_auto_insights(&poll.id).await;
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].insight_type, InsightType::Recommendation);
    }
}
