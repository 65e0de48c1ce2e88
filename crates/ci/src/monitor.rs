//! Daily workflow monitor.
//!
//! One sequential pass: fetch runs, inspect failed jobs, write the report
//! files, then reconcile the tracking issue. GitHub errors degrade to empty
//! data instead of aborting.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use doodates_config::{AppConfig, MonitoringConfig};
use tracing::{debug, info, warn};

use crate::extractors::ErrorExtractor;
use crate::github::{GithubClient, Issue, IssueUpdate, Job, WorkflowRun};
use crate::knowledge::KnowledgeBase;
use crate::report::{
    render_failure_report, render_issue_body, FailureRecord, MonitorSnapshot, WorkflowStatus,
};
use crate::{CiError, CiResult};

pub const ISSUE_TITLE: &str = "🚨 Échecs de workflows GitHub Actions";
const CLOSE_COMMENT: &str = "✅ Aucun échec sur la période surveillée, fermeture automatique.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueAction {
    Open,
    Update(u64),
    Close(u64),
    Nothing,
}

/// Opens or refreshes the issue at or above `threshold` failures, closes it below.
pub fn decide_issue_action(failed_runs: usize, threshold: usize, existing: Option<&Issue>) -> IssueAction {
    let open_issue = existing.filter(|issue| issue.is_open());
    let alerting = failed_runs > 0 && failed_runs >= threshold;

    match (alerting, open_issue) {
        (true, Some(issue)) => IssueAction::Update(issue.number),
        (true, None) => IssueAction::Open,
        (false, Some(issue)) => IssueAction::Close(issue.number),
        (false, None) => IssueAction::Nothing,
    }
}

#[derive(Debug, Clone)]
pub struct MonitorOutcome {
    pub snapshot: MonitorSnapshot,
    pub issue_action: IssueAction,
    pub report_path: PathBuf,
    pub status_path: PathBuf,
}

pub struct WorkflowMonitor {
    github: GithubClient,
    knowledge: KnowledgeBase,
    extractor: ErrorExtractor,
    config: MonitoringConfig,
}

impl WorkflowMonitor {
    pub fn new(
        github: GithubClient,
        knowledge: KnowledgeBase,
        config: MonitoringConfig,
    ) -> CiResult<Self> {
        Ok(Self {
            github,
            knowledge,
            extractor: ErrorExtractor::new()?,
            config,
        })
    }

    pub async fn from_config(config: &AppConfig) -> CiResult<Self> {
        let github = GithubClient::from_config(&config.github)?;
        let knowledge = KnowledgeBase::load_or_default(
            config.monitoring.knowledge_base_path.as_deref().map(Path::new),
        )
        .await?;
        Self::new(github, knowledge, config.monitoring.clone())
    }

    pub async fn collect(&self, now: DateTime<Utc>) -> MonitorSnapshot {
        let since = now - Duration::hours(self.config.lookback_hours);
        let runs = match self.github.list_workflow_runs(since).await {
            Ok(runs) => runs,
            Err(err) => {
                warn!(repository = self.github.repository(), error = %err, "could not list workflow runs");
                Vec::new()
            }
        };

        let mut failures = Vec::new();
        for run in runs
            .iter()
            .filter(|run| run.is_failure())
            .take(self.config.max_failed_runs_inspected)
        {
            failures.extend(self.inspect_run(run).await);
        }

        let snapshot = MonitorSnapshot::new(now, self.config.lookback_hours, &runs, failures);
        info!(
            total_runs = snapshot.total_runs,
            failed_runs = snapshot.failed_runs,
            success_rate = snapshot.success_rate,
            "collected workflow runs"
        );
        snapshot
    }

    async fn inspect_run(&self, run: &WorkflowRun) -> Vec<FailureRecord> {
        let jobs = match self.github.list_jobs(run.id).await {
            Ok(jobs) => jobs,
            Err(err) => {
                warn!(run_id = run.id, error = %err, "could not list jobs");
                Vec::new()
            }
        };

        let failed: Vec<&Job> = jobs.iter().filter(|job| job.is_failure()).collect();
        if failed.is_empty() {
            return vec![self.record(run, None, "")];
        }

        let mut records = Vec::with_capacity(failed.len());
        for job in failed {
            let log = match self.github.job_logs(job.id).await {
                Ok(log) => log,
                Err(err) => {
                    warn!(run_id = run.id, job_id = job.id, error = %err, "could not download job logs");
                    String::new()
                }
            };
            records.push(self.record(run, Some(job), &log));
        }
        records
    }

    fn record(&self, run: &WorkflowRun, job: Option<&Job>, log: &str) -> FailureRecord {
        let errors = self.extractor.extract(log);
        let diagnosis = self.knowledge.diagnose(log);
        debug!(
            run_id = run.id,
            errors = errors.len(),
            category = diagnosis.category.as_str(),
            "classified failure"
        );

        FailureRecord {
            run_id: run.id,
            workflow: run.display_name().to_string(),
            run_number: run.run_number,
            branch: run.head_branch.clone(),
            run_url: run.html_url.clone(),
            created_at: run.created_at,
            job: job.map(|j| j.name.clone()).unwrap_or_else(|| "inconnu".to_string()),
            job_url: job.and_then(|j| j.html_url.clone()),
            failed_steps: job
                .map(|j| j.failed_steps().into_iter().map(str::to_string).collect())
                .unwrap_or_default(),
            errors,
            diagnosis,
        }
    }

    pub async fn write_reports(&self, snapshot: &MonitorSnapshot) -> CiResult<(PathBuf, PathBuf)> {
        let report_path = PathBuf::from(&self.config.report_path);
        let status_path = PathBuf::from(&self.config.status_path);

        write_file(&report_path, &render_failure_report(snapshot)).await?;
        let status = serde_json::to_string_pretty(&WorkflowStatus::from(snapshot))?;
        write_file(&status_path, &status).await?;

        info!(report = %report_path.display(), status = %status_path.display(), "wrote monitoring files");
        Ok((report_path, status_path))
    }

    /// Reconciles the tracking issue. Failures are logged, never returned.
    pub async fn sync_issue(&self, snapshot: &MonitorSnapshot) -> IssueAction {
        let label = self.config.issue_label.as_str();
        let existing = match self.github.list_issues(label, "open").await {
            Ok(issues) => issues.into_iter().next(),
            Err(err) => {
                warn!(label, error = %err, "could not list tracking issues");
                None
            }
        };

        let action = decide_issue_action(
            snapshot.failed_runs,
            self.config.issue_threshold,
            existing.as_ref(),
        );

        let result = match action {
            IssueAction::Open => self
                .github
                .create_issue(ISSUE_TITLE, &render_issue_body(snapshot), &[label])
                .await
                .map(|issue| info!(issue = issue.number, "opened tracking issue")),
            IssueAction::Update(number) => {
                let update = IssueUpdate {
                    body: Some(render_issue_body(snapshot)),
                    ..Default::default()
                };
                self.github
                    .update_issue(number, &update)
                    .await
                    .map(|_| info!(issue = number, "updated tracking issue"))
            }
            IssueAction::Close(number) => self.close_issue(number).await,
            IssueAction::Nothing => Ok(()),
        };

        if let Err(err) = result {
            warn!(?action, error = %err, "could not sync tracking issue");
        }
        action
    }

    async fn close_issue(&self, number: u64) -> CiResult<()> {
        self.github.comment_issue(number, CLOSE_COMMENT).await?;
        let update = IssueUpdate {
            state: Some("closed".to_string()),
            ..Default::default()
        };
        self.github.update_issue(number, &update).await?;
        info!(issue = number, "closed tracking issue");
        Ok(())
    }

    pub async fn run(&self, now: DateTime<Utc>) -> CiResult<MonitorOutcome> {
        let snapshot = self.collect(now).await;
        let (report_path, status_path) = self.write_reports(&snapshot).await?;
        let issue_action = self.sync_issue(&snapshot).await;

        Ok(MonitorOutcome {
            snapshot,
            issue_action,
            report_path,
            status_path,
        })
    }
}

async fn write_file(path: &Path, contents: &str) -> CiResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CiError::io(parent.display().to_string(), e))?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| CiError::io(path.display().to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(number: u64, state: &str) -> Issue {
        Issue {
            number,
            title: ISSUE_TITLE.to_string(),
            body: None,
            state: state.to_string(),
            html_url: String::new(),
            labels: Vec::new(),
        }
    }

    #[test]
    fn test_issue_decisions() {
        let open = issue(12, "open");
        let closed = issue(9, "closed");

        assert_eq!(decide_issue_action(2, 1, None), IssueAction::Open);
        assert_eq!(decide_issue_action(2, 1, Some(&open)), IssueAction::Update(12));
        assert_eq!(decide_issue_action(0, 1, Some(&open)), IssueAction::Close(12));
        assert_eq!(decide_issue_action(0, 1, None), IssueAction::Nothing);
        assert_eq!(decide_issue_action(2, 1, Some(&closed)), IssueAction::Open);
    }

    #[test]
    fn test_below_threshold_closes() {
        let open = issue(3, "open");
        assert_eq!(decide_issue_action(2, 3, Some(&open)), IssueAction::Close(3));
        assert_eq!(decide_issue_action(3, 3, Some(&open)), IssueAction::Update(3));
        // a zero threshold still needs an actual failure
        assert_eq!(decide_issue_action(0, 0, None), IssueAction::Nothing);
    }
}
