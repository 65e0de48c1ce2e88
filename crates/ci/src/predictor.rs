//! Optional model-written "predictive" section of the analysis report.

use std::fmt::Write as _;
use std::sync::Arc;

use doodates_analytics::{GeminiClient, GenerativeModel};
use doodates_config::GeminiConfig;
use tracing::{info, warn};

use crate::analyzer::LogAnalysis;

const MAX_ERRORS_IN_PROMPT: usize = 5;

#[derive(Clone)]
pub struct Predictor {
    model: Arc<dyn GenerativeModel>,
}

impl Predictor {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }

    /// `None` when no Gemini key is configured or the client cannot be built.
    pub fn from_config(config: &GeminiConfig) -> Option<Self> {
        match GeminiClient::from_config(config) {
            Ok(Some(client)) => Some(Self::new(Arc::new(client))),
            Ok(None) => {
                info!("no Gemini key, predictive analysis disabled");
                None
            }
            Err(err) => {
                warn!(error = %err, "could not build Gemini client, predictive analysis disabled");
                None
            }
        }
    }

    pub fn prompt(analyses: &[LogAnalysis]) -> String {
        let mut prompt = String::from(
            "Tu es un expert CI/CD. À partir des échecs GitHub Actions ci-dessous, \
             identifie les risques de récidive, les causes racines probables et \
             propose des actions préventives concrètes. Réponds en Markdown, en français, \
             en moins de 300 mots.\n",
        );
        for (index, analysis) in analyses.iter().enumerate() {
            let _ = write!(
                prompt,
                "\nÉchec {} ({}) : catégorie {}, priorité {:?}",
                index + 1,
                analysis.source,
                analysis.diagnosis.category.as_str(),
                analysis.diagnosis.priority
            );
            for error in analysis.errors.iter().take(MAX_ERRORS_IN_PROMPT) {
                let _ = write!(prompt, "\n  - {}", error.message);
            }
        }
        prompt
    }

    /// Model answer, or `None` after logging when the call fails.
    pub async fn predict(&self, analyses: &[LogAnalysis]) -> Option<String> {
        if analyses.is_empty() {
            return None;
        }
        match self.model.generate_content(&Self::prompt(analyses)).await {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => {
                warn!("model returned an empty prediction");
                None
            }
            Err(err) => {
                warn!(error = %err, "predictive analysis failed");
                None
            }
        }
    }
}
