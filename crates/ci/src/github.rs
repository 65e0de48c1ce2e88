//! Minimal GitHub REST client: workflow runs, jobs, logs and issues.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use doodates_config::GithubConfig;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{CiError, CiResult};

const USER_AGENT: &str = "doodates-ci";
const API_VERSION: &str = "2022-11-28";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub head_branch: Option<String>,
    #[serde(default)]
    pub head_sha: String,
    #[serde(default)]
    pub run_number: u64,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
}

impl WorkflowRun {
    pub fn is_failure(&self) -> bool {
        self.conclusion.as_deref() == Some("failure")
    }

    pub fn is_success(&self) -> bool {
        self.conclusion.as_deref() == Some("success")
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("workflow")
    }
}

#[derive(Debug, Deserialize)]
struct WorkflowRunsPage {
    #[serde(default)]
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStep {
    pub name: String,
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub conclusion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub steps: Vec<JobStep>,
}

impl Job {
    pub fn is_failure(&self) -> bool {
        self.conclusion.as_deref() == Some("failure")
    }

    /// Names of the steps that failed.
    pub fn failed_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|step| step.conclusion.as_deref() == Some("failure"))
            .map(|step| step.name.as_str())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct JobsPage {
    #[serde(default)]
    jobs: Vec<Job>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub labels: Vec<Label>,
}

impl Issue {
    pub fn is_open(&self) -> bool {
        self.state == "open"
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IssueUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GithubClient {
    http: Client,
    api_url: String,
    repository: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(
        api_url: impl Into<String>,
        repository: impl Into<String>,
        token: Option<String>,
        request_timeout: Duration,
    ) -> CiResult<Self> {
        let repository = repository.into();
        if repository.split('/').filter(|part| !part.is_empty()).count() != 2 {
            return Err(CiError::MissingRepository);
        }

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            repository,
            token,
        })
    }

    pub fn from_config(config: &GithubConfig) -> CiResult<Self> {
        let repository = config
            .resolved_repository()
            .ok_or(CiError::MissingRepository)?;
        let token = config.resolved_token();
        if token.is_none() {
            warn!("GITHUB_TOKEN not set, requests are unauthenticated");
        }

        Self::new(
            config.resolved_api_url(),
            repository,
            token,
            Duration::from_secs(config.request_timeout_seconds),
        )
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/repos/{}{}", self.api_url, self.repository, path);
        let request = self
            .http
            .request(method, url)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);

        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, path: &str, request: RequestBuilder) -> CiResult<T> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CiError::Api {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }
        Ok(response.json().await?)
    }

    fn require_token(&self, action: &'static str) -> CiResult<()> {
        if self.token.is_none() {
            return Err(CiError::MissingToken(action));
        }
        Ok(())
    }

    /// Runs created at or after `since`, newest first.
    pub async fn list_workflow_runs(&self, since: DateTime<Utc>) -> CiResult<Vec<WorkflowRun>> {
        let path = "/actions/runs";
        let created = format!(">={}", since.to_rfc3339_opts(SecondsFormat::Secs, true));
        let request = self
            .request(Method::GET, path)
            .query(&[("created", created.as_str()), ("per_page", "100")]);

        let page: WorkflowRunsPage = self.send(path, request).await?;
        debug!(runs = page.workflow_runs.len(), "fetched workflow runs");
        Ok(page.workflow_runs)
    }

    /// The most recent failed runs, newest first.
    pub async fn list_failed_runs(&self, limit: usize) -> CiResult<Vec<WorkflowRun>> {
        let path = "/actions/runs";
        let per_page = limit.clamp(1, 100).to_string();
        let request = self
            .request(Method::GET, path)
            .query(&[("status", "failure"), ("per_page", per_page.as_str())]);

        let page: WorkflowRunsPage = self.send(path, request).await?;
        Ok(page.workflow_runs.into_iter().take(limit).collect())
    }

    pub async fn list_jobs(&self, run_id: u64) -> CiResult<Vec<Job>> {
        let path = format!("/actions/runs/{run_id}/jobs");
        let request = self.request(Method::GET, &path);
        let page: JobsPage = self.send(&path, request).await?;
        Ok(page.jobs)
    }

    /// Plain-text log of a job. GitHub answers with a redirect to the log
    /// archive, which the client follows.
    pub async fn job_logs(&self, job_id: u64) -> CiResult<String> {
        let path = format!("/actions/jobs/{job_id}/logs");
        let response = self.request(Method::GET, &path).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CiError::Api {
                status: status.as_u16(),
                path,
            });
        }
        Ok(response.text().await?)
    }

    pub async fn list_issues(&self, label: &str, state: &str) -> CiResult<Vec<Issue>> {
        let path = "/issues";
        let request = self
            .request(Method::GET, path)
            .query(&[("labels", label), ("state", state), ("per_page", "100")]);
        self.send(path, request).await
    }

    pub async fn create_issue(&self, title: &str, body: &str, labels: &[&str]) -> CiResult<Issue> {
        self.require_token("creating issues")?;
        let path = "/issues";
        let request = self.request(Method::POST, path).json(&serde_json::json!({
            "title": title,
            "body": body,
            "labels": labels,
        }));
        self.send(path, request).await
    }

    pub async fn update_issue(&self, number: u64, update: &IssueUpdate) -> CiResult<Issue> {
        self.require_token("updating issues")?;
        let path = format!("/issues/{number}");
        let request = self.request(Method::PATCH, &path).json(update);
        self.send(&path, request).await
    }

    pub async fn comment_issue(&self, number: u64, body: &str) -> CiResult<()> {
        self.require_token("commenting on issues")?;
        let path = format!("/issues/{number}/comments");
        let request = self
            .request(Method::POST, &path)
            .json(&serde_json::json!({ "body": body }));
        let _: serde_json::Value = self.send(&path, request).await?;
        Ok(())
    }
}
