//! Failure log analysis with the knowledge base.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use doodates_config::AppConfig;
use serde::Serialize;
use tracing::{info, warn};

use crate::extractors::{ErrorExtractor, ExtractedError};
use crate::github::GithubClient;
use crate::knowledge::{Diagnosis, KnowledgeBase};
use crate::predictor::Predictor;
use crate::{CiError, CiResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisInput {
    LogFile(PathBuf),
    /// Failed jobs of the most recent failed runs.
    LatestFailures { limit: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct LogAnalysis {
    /// File path, or workflow and job name.
    pub source: String,
    pub url: Option<String>,
    pub errors: Vec<ExtractedError>,
    pub diagnosis: Diagnosis,
    /// Every matching rule, highest priority first.
    pub matches: Vec<Diagnosis>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub analyses: Vec<LogAnalysis>,
    pub prediction: Option<String>,
}

impl AnalysisReport {
    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Analyse des échecs de workflows\n");
        let _ = writeln!(
            out,
            "Généré le {}\n",
            self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        );

        if self.analyses.is_empty() {
            let _ = writeln!(out, "Aucun échec à analyser.");
        }

        for analysis in &self.analyses {
            let _ = writeln!(out, "## {}\n", analysis.source);
            if let Some(url) = &analysis.url {
                let _ = writeln!(out, "- Lien : {url}");
            }
            let _ = writeln!(
                out,
                "- Catégorie : {}",
                analysis.diagnosis.category.as_str()
            );
            let _ = writeln!(out, "- Priorité : {:?}", analysis.diagnosis.priority);
            if !analysis.diagnosis.matched {
                let _ = writeln!(out, "- Diagnostic : déduit par mots-clés");
            }
            let _ = writeln!(out, "- Solution : {}", analysis.diagnosis.solution);
            for other in analysis.matches.iter().skip(1) {
                let _ = writeln!(
                    out,
                    "- Autre piste ({}) : {}",
                    other.category.as_str(),
                    other.solution
                );
            }
            if !analysis.errors.is_empty() {
                let _ = writeln!(out, "\n```");
                for error in &analysis.errors {
                    let _ = writeln!(out, "{}", error.message);
                }
                let _ = writeln!(out, "```");
            }
            let _ = writeln!(out);
        }

        if let Some(prediction) = &self.prediction {
            let _ = writeln!(out, "## Analyse prédictive\n\n{prediction}");
        }
        out
    }
}

pub struct WorkflowAnalyzer {
    knowledge: KnowledgeBase,
    extractor: ErrorExtractor,
    github: Option<GithubClient>,
    predictor: Option<Predictor>,
}

impl WorkflowAnalyzer {
    pub fn new(knowledge: KnowledgeBase) -> CiResult<Self> {
        Ok(Self {
            knowledge,
            extractor: ErrorExtractor::new()?,
            github: None,
            predictor: None,
        })
    }

    pub fn with_github(mut self, github: GithubClient) -> Self {
        self.github = Some(github);
        self
    }

    pub fn with_predictor(mut self, predictor: Predictor) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub async fn from_config(config: &AppConfig) -> CiResult<Self> {
        let knowledge = KnowledgeBase::load_or_default(
            config.monitoring.knowledge_base_path.as_deref().map(Path::new),
        )
        .await?;
        let mut analyzer = Self::new(knowledge)?;

        match GithubClient::from_config(&config.github) {
            Ok(github) => analyzer = analyzer.with_github(github),
            Err(err) => warn!(error = %err, "GitHub access disabled"),
        }
        if let Some(predictor) = Predictor::from_config(&config.gemini) {
            analyzer = analyzer.with_predictor(predictor);
        }
        Ok(analyzer)
    }

    pub fn analyze_log(&self, source: impl Into<String>, url: Option<String>, log: &str) -> LogAnalysis {
        LogAnalysis {
            source: source.into(),
            url,
            errors: self.extractor.extract(log),
            diagnosis: self.knowledge.diagnose(log),
            matches: self.knowledge.matches(log),
        }
    }

    async fn latest_failures(&self, limit: usize) -> Vec<LogAnalysis> {
        let Some(github) = &self.github else {
            warn!("no GitHub repository configured, nothing to analyze");
            return Vec::new();
        };

        let runs = match github.list_failed_runs(limit).await {
            Ok(runs) => runs,
            Err(err) => {
                warn!(error = %err, "could not list failed runs");
                return Vec::new();
            }
        };

        let mut analyses = Vec::new();
        for run in &runs {
            let jobs = match github.list_jobs(run.id).await {
                Ok(jobs) => jobs,
                Err(err) => {
                    warn!(run_id = run.id, error = %err, "could not list jobs");
                    continue;
                }
            };
            for job in jobs.iter().filter(|job| job.is_failure()) {
                let log = match github.job_logs(job.id).await {
                    Ok(log) => log,
                    Err(err) => {
                        warn!(run_id = run.id, job_id = job.id, error = %err, "could not download job logs");
                        String::new()
                    }
                };
                let source = format!("{} #{} · {}", run.display_name(), run.run_number, job.name);
                let url = job.html_url.clone().or_else(|| Some(run.html_url.clone()));
                analyses.push(self.analyze_log(source, url, &log));
            }
        }
        analyses
    }

    pub async fn analyze(&self, input: &AnalysisInput, now: DateTime<Utc>) -> CiResult<AnalysisReport> {
        let analyses = match input {
            AnalysisInput::LogFile(path) => {
                let log = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| CiError::io(path.display().to_string(), e))?;
                vec![self.analyze_log(path.display().to_string(), None, &log)]
            }
            AnalysisInput::LatestFailures { limit } => self.latest_failures(*limit).await,
        };

        let prediction = match &self.predictor {
            Some(predictor) => predictor.predict(&analyses).await,
            None => None,
        };

        info!(
            analyses = analyses.len(),
            predicted = prediction.is_some(),
            "workflow analysis complete"
        );

        Ok(AnalysisReport {
            generated_at: now,
            analyses,
            prediction,
        })
    }

    pub async fn write_report(&self, report: &AnalysisReport, path: &Path) -> CiResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CiError::io(parent.display().to_string(), e))?;
        }
        tokio::fs::write(path, report.render_markdown())
            .await
            .map_err(|e| CiError::io(path.display().to_string(), e))
    }
}
