//! Monitoring snapshot and the files rendered from it.

use std::fmt::Write as _;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::extractors::ExtractedError;
use crate::github::WorkflowRun;
use crate::knowledge::Diagnosis;

/// One failed job of a failed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub run_id: u64,
    pub workflow: String,
    pub run_number: u64,
    pub branch: Option<String>,
    pub run_url: String,
    pub created_at: DateTime<Utc>,
    pub job: String,
    pub job_url: Option<String>,
    pub failed_steps: Vec<String>,
    pub errors: Vec<ExtractedError>,
    pub diagnosis: Diagnosis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub generated_at: DateTime<Utc>,
    pub lookback_hours: i64,
    pub total_runs: usize,
    pub failed_runs: usize,
    /// Percentage of runs that succeeded, 100 when nothing ran.
    pub success_rate: f64,
    pub failures: Vec<FailureRecord>,
}

impl MonitorSnapshot {
    pub fn new(
        generated_at: DateTime<Utc>,
        lookback_hours: i64,
        runs: &[WorkflowRun],
        failures: Vec<FailureRecord>,
    ) -> Self {
        let total_runs = runs.len();
        let failed_runs = runs.iter().filter(|run| run.is_failure()).count();
        let succeeded = runs.iter().filter(|run| run.is_success()).count();
        let success_rate = if total_runs == 0 {
            100.0
        } else {
            (succeeded as f64 * 1000.0 / total_runs as f64).round() / 10.0
        };

        Self {
            generated_at,
            lookback_hours,
            total_runs,
            failed_runs,
            success_rate,
            failures,
        }
    }

    pub fn window_start(&self) -> DateTime<Utc> {
        self.generated_at - Duration::hours(self.lookback_hours)
    }

    /// Distinct workflow names with at least one failure, in first-seen order.
    pub fn failed_workflows(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for failure in &self.failures {
            if !names.contains(&failure.workflow) {
                names.push(failure.workflow.clone());
            }
        }
        names
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Failing,
}

/// Machine-readable summary written next to the Markdown report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    pub last_check: DateTime<Utc>,
    pub status: HealthStatus,
    pub total_runs: usize,
    pub failed_runs: usize,
    pub success_rate: f64,
    pub failed_workflows: Vec<String>,
}

impl From<&MonitorSnapshot> for WorkflowStatus {
    fn from(snapshot: &MonitorSnapshot) -> Self {
        Self {
            last_check: snapshot.generated_at,
            status: if snapshot.failed_runs == 0 {
                HealthStatus::Healthy
            } else {
                HealthStatus::Failing
            },
            total_runs: snapshot.total_runs,
            failed_runs: snapshot.failed_runs,
            success_rate: snapshot.success_rate,
            failed_workflows: snapshot.failed_workflows(),
        }
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn render_failure_report(snapshot: &MonitorSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Rapport des échecs de workflows\n");
    let _ = writeln!(out, "- Généré le : {}", timestamp(snapshot.generated_at));
    let _ = writeln!(
        out,
        "- Période : {} → {} ({} h)",
        timestamp(snapshot.window_start()),
        timestamp(snapshot.generated_at),
        snapshot.lookback_hours
    );
    let _ = writeln!(out, "- Exécutions : {}", snapshot.total_runs);
    let _ = writeln!(out, "- Échecs : {}", snapshot.failed_runs);
    let _ = writeln!(out, "- Taux de succès : {:.1}%\n", snapshot.success_rate);

    if snapshot.failures.is_empty() {
        let _ = writeln!(out, "✅ Aucun échec sur la période.");
        return out;
    }

    let _ = writeln!(out, "## Détails\n");
    for failure in &snapshot.failures {
        let _ = writeln!(
            out,
            "### {} #{} · {}\n",
            failure.workflow, failure.run_number, failure.job
        );
        let _ = writeln!(out, "- Run : {}", failure.run_url);
        if let Some(url) = &failure.job_url {
            let _ = writeln!(out, "- Job : {url}");
        }
        if let Some(branch) = &failure.branch {
            let _ = writeln!(out, "- Branche : `{branch}`");
        }
        let _ = writeln!(out, "- Date : {}", timestamp(failure.created_at));
        if !failure.failed_steps.is_empty() {
            let _ = writeln!(out, "- Étapes en échec : {}", failure.failed_steps.join(", "));
        }
        let _ = writeln!(
            out,
            "- Catégorie : {} (priorité {:?})",
            failure.diagnosis.category.as_str(),
            failure.diagnosis.priority
        );
        let _ = writeln!(out, "- Solution suggérée : {}\n", failure.diagnosis.solution);

        if failure.errors.is_empty() {
            let _ = writeln!(out, "_Aucune erreur extraite des logs._\n");
            continue;
        }
        let _ = writeln!(out, "```");
        for error in &failure.errors {
            let location = match (&error.file, &error.test) {
                (Some(file), Some(test)) => format!("{file} › {test}: "),
                (Some(file), None) => format!("{file}: "),
                (None, Some(test)) => format!("{test}: "),
                (None, None) => String::new(),
            };
            let _ = writeln!(out, "{location}{}", error.message);
        }
        let _ = writeln!(out, "```\n");
    }
    out
}

/// Body of the tracking issue.
pub fn render_issue_body(snapshot: &MonitorSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} échec(s) de workflow sur les dernières {} h (taux de succès {:.1}%).\n",
        snapshot.failed_runs, snapshot.lookback_hours, snapshot.success_rate
    );
    for failure in &snapshot.failures {
        let _ = writeln!(
            out,
            "- [{} #{}]({}) · {} · {}",
            failure.workflow,
            failure.run_number,
            failure.run_url,
            failure.job,
            failure.diagnosis.category.as_str()
        );
    }
    let _ = writeln!(
        out,
        "\nDernière vérification : {}",
        timestamp(snapshot.generated_at)
    );
    out
}
