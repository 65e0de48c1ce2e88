//! Insight extraction from model output.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const INSIGHT_KEYWORDS: &[&str] = &["tendance", "majorité", "anomalie"];

/// Sentences of `answer` that mention a trend, a majority or an anomaly.
pub fn extract_keyword_insights(answer: &str) -> Vec<String> {
    answer
        .split(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
        .filter(|sentence| {
            let lower = sentence.to_lowercase();
            INSIGHT_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
        })
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightType {
    Trend,
    Anomaly,
    Insight,
    Recommendation,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoInsight {
    #[serde(rename = "type")]
    pub insight_type: InsightType,
    pub title: String,
    pub description: String,
    /// Normalised to 0.0–1.0
    pub confidence: f32,
}

#[derive(Debug, Error)]
pub enum InsightParseError {
    #[error("no JSON array found in model output")]
    NoJsonArray,
    #[error("malformed insight array: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct RawInsight {
    #[serde(rename = "type", default = "RawInsight::default_type")]
    insight_type: InsightType,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    confidence: f64,
}

impl RawInsight {
    const fn default_type() -> InsightType {
        InsightType::Insight
    }
}

/// Parse the span from the first `[` to the last `]` as insight objects.
pub fn parse_auto_insights(text: &str) -> Result<Vec<AutoInsight>, InsightParseError> {
    let start = text.find('[').ok_or(InsightParseError::NoJsonArray)?;
    let end = text.rfind(']').ok_or(InsightParseError::NoJsonArray)?;
    if end < start {
        return Err(InsightParseError::NoJsonArray);
    }

    let raw: Vec<RawInsight> = serde_json::from_str(&text[start..=end])?;
    Ok(raw
        .into_iter()
        .map(|insight| AutoInsight {
            insight_type: insight.insight_type,
            title: insight.title,
            description: insight.description,
            confidence: normalise_confidence(insight.confidence),
        })
        .collect())
}

/// The model reports a percentage; insights carry a 0 to 1 score.
fn normalise_confidence(value: f64) -> f32 {
    (value / 100.0).clamp(0.0, 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_sentences() {
        let answer = "La majorité préfère mardi. Rien à signaler ici! \
                      Une anomalie apparaît le vendredi\nLa Tendance est stable.";
        assert_eq!(
            extract_keyword_insights(answer),
            vec![
                "La majorité préfère mardi",
                "Une anomalie apparaît le vendredi",
                "La Tendance est stable",
            ]
        );
    }

    #[test]
    fn test_parse_embedded_array() {
        let text = "Voici l'analyse :\n```json\n[{\"type\":\"trend\",\"title\":\"Mardi\",\
                    \"description\":\"Mardi domine\",\"confidence\":85},\
                    {\"type\":\"surprise\",\"title\":\"Autre\",\"confidence\":0.4}]\n```";
        let insights = parse_auto_insights(text).unwrap();

        assert_eq!(insights.len(), 2);
        assert_eq!(insights[0].insight_type, InsightType::Trend);
        assert!((insights[0].confidence - 0.85).abs() < 1e-6);
        assert_eq!(insights[1].insight_type, InsightType::Other);
        assert!((insights[1].confidence - 0.004).abs() < 1e-6);
        assert_eq!(insights[1].description, "");
    }

    #[test]
    fn test_parse_failures_are_typed() {
        assert!(matches!(
            parse_auto_insights("pas de JSON ici"),
            Err(InsightParseError::NoJsonArray)
        ));
        assert!(matches!(
            parse_auto_insights("] puis ["),
            Err(InsightParseError::NoJsonArray)
        ));
        assert!(matches!(
            parse_auto_insights("[{\"title\": }]"),
            Err(InsightParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_confidence_clamped() {
        assert_eq!(normalise_confidence(150.0), 1.0);
        assert_eq!(normalise_confidence(-3.0), 0.0);
        assert_eq!(normalise_confidence(50.0), 0.5);
    }

    #[test]
    fn test_confidence_is_always_a_percentage() {
        assert!((normalise_confidence(1.0) - 0.01).abs() < 1e-6);
        assert!((normalise_confidence(0.5) - 0.005).abs() < 1e-6);
        assert_eq!(normalise_confidence(100.0), 1.0);
        assert_eq!(normalise_confidence(0.0), 0.0);
    }
}
