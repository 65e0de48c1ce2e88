use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "doodates.toml",
    "config/doodates.toml",
    "crates/config/doodates.toml",
    "../doodates.toml",
    "../config/doodates.toml",
];

/// Environment variables consulted for the Gemini key, in order.
pub const GEMINI_API_KEY_VARS: &[&str] = &["GEMINI_API_KEY", "VITE_GEMINI_API_KEY"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub app: PublicAppConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7070,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://doodates.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Public-facing settings used when building links shared with voters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicAppConfig {
    #[serde(default = "PublicAppConfig::default_public_base_url")]
    pub public_base_url: String,
}

impl PublicAppConfig {
    fn default_public_base_url() -> String {
        "https://doodates.app".to_string()
    }
}

impl Default for PublicAppConfig {
    fn default() -> Self {
        Self {
            public_base_url: Self::default_public_base_url(),
        }
    }
}

/// Configuration for the Gemini `generateContent` REST endpoint.
///
/// ```
/// use doodates_config::GeminiConfig;
///
/// let gemini = GeminiConfig::default();
/// assert_eq!(gemini.base_url, "https://generativelanguage.googleapis.com/v1beta");
/// assert_eq!(gemini.request_timeout_seconds, 30);
/// assert!(gemini.api_key.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "GeminiConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "GeminiConfig::default_model")]
    pub model: String,
    #[serde(default = "GeminiConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl GeminiConfig {
    fn default_base_url() -> String {
        "https://generativelanguage.googleapis.com/v1beta".to_string()
    }

    fn default_model() -> String {
        "gemini-2.0-flash".to_string()
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    /// The configured key, falling back to `GEMINI_API_KEY` then
    /// `VITE_GEMINI_API_KEY`. Blank values count as missing.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| first_env_value(GEMINI_API_KEY_VARS))
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: Self::default_base_url(),
            model: Self::default_model(),
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "AnalyticsConfig::default_cache_ttl")]
    pub cache_ttl_seconds: u64,
    #[serde(default = "AnalyticsConfig::default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "AnalyticsConfig::default_confidence")]
    pub answer_confidence: f32,
}

impl AnalyticsConfig {
    const fn default_cache_ttl() -> u64 {
        300
    }

    const fn default_cache_capacity() -> usize {
        50
    }

    const fn default_confidence() -> f32 {
        0.85
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: Self::default_cache_ttl(),
            cache_capacity: Self::default_cache_capacity(),
            answer_confidence: Self::default_confidence(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default = "GithubConfig::default_api_url")]
    pub api_url: String,
    #[serde(default = "GithubConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl GithubConfig {
    fn default_api_url() -> String {
        "https://api.github.com".to_string()
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    pub fn resolved_token(&self) -> Option<String> {
        self.token
            .clone()
            .filter(|token| !token.trim().is_empty())
            .or_else(|| first_env_value(&["GITHUB_TOKEN"]))
    }

    /// `owner/name`, from configuration or `GITHUB_REPOSITORY`.
    pub fn resolved_repository(&self) -> Option<String> {
        self.repository
            .clone()
            .filter(|repo| !repo.trim().is_empty())
            .or_else(|| first_env_value(&["GITHUB_REPOSITORY"]))
    }

    /// `GITHUB_API_URL` wins over the configured value so that the tools
    /// follow whatever GitHub Enterprise host the runner points at.
    pub fn resolved_api_url(&self) -> String {
        first_env_value(&["GITHUB_API_URL"]).unwrap_or_else(|| self.api_url.clone())
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: None,
            repository: None,
            api_url: Self::default_api_url(),
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "MonitoringConfig::default_report_path")]
    pub report_path: String,
    #[serde(default = "MonitoringConfig::default_status_path")]
    pub status_path: String,
    #[serde(default = "MonitoringConfig::default_analysis_path")]
    pub analysis_path: String,
    #[serde(default)]
    pub knowledge_base_path: Option<String>,
    #[serde(default = "MonitoringConfig::default_lookback_hours")]
    pub lookback_hours: i64,
    #[serde(default = "MonitoringConfig::default_issue_threshold")]
    pub issue_threshold: usize,
    #[serde(default = "MonitoringConfig::default_issue_label")]
    pub issue_label: String,
    #[serde(default = "MonitoringConfig::default_max_runs")]
    pub max_failed_runs_inspected: usize,
}

impl MonitoringConfig {
    fn default_report_path() -> String {
        "Docs/monitoring/workflow-failures-report.md".to_string()
    }

    fn default_status_path() -> String {
        "Docs/monitoring/workflow-status.json".to_string()
    }

    fn default_analysis_path() -> String {
        "Docs/monitoring/workflow-analysis.md".to_string()
    }

    const fn default_lookback_hours() -> i64 {
        24
    }

    const fn default_issue_threshold() -> usize {
        1
    }

    fn default_issue_label() -> String {
        "workflow-failure".to_string()
    }

    const fn default_max_runs() -> usize {
        10
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            report_path: Self::default_report_path(),
            status_path: Self::default_status_path(),
            analysis_path: Self::default_analysis_path(),
            knowledge_base_path: None,
            lookback_hours: Self::default_lookback_hours(),
            issue_threshold: Self::default_issue_threshold(),
            issue_label: Self::default_issue_label(),
            max_failed_runs_inspected: Self::default_max_runs(),
        }
    }
}

fn first_env_value(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use doodates_config::load;
///
/// std::env::remove_var("DOODATES_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("database.url", defaults.database.url.clone())?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )?
        .set_default("app.public_base_url", defaults.app.public_base_url.clone())?
        .set_default("gemini.base_url", defaults.gemini.base_url.clone())?
        .set_default("gemini.model", defaults.gemini.model.clone())?
        .set_default(
            "gemini.request_timeout_seconds",
            i64::try_from(defaults.gemini.request_timeout_seconds).unwrap_or(i64::MAX),
        )?
        .set_default(
            "analytics.cache_ttl_seconds",
            i64::try_from(defaults.analytics.cache_ttl_seconds).unwrap_or(i64::MAX),
        )?
        .set_default(
            "analytics.cache_capacity",
            i64::try_from(defaults.analytics.cache_capacity).unwrap_or(i64::MAX),
        )?
        .set_default(
            "analytics.answer_confidence",
            f64::from(defaults.analytics.answer_confidence),
        )?
        .set_default("github.api_url", defaults.github.api_url.clone())?
        .set_default("monitoring.report_path", defaults.monitoring.report_path.clone())?
        .set_default("monitoring.status_path", defaults.monitoring.status_path.clone())?
        .set_default("monitoring.lookback_hours", defaults.monitoring.lookback_hours)?;

    let environment_overrides = config::Environment::with_prefix("DOODATES").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("DOODATES_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via DOODATES_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if config.analytics.cache_capacity == 0 {
        config.analytics.cache_capacity = AnalyticsConfig::default_cache_capacity();
    }
    config.analytics.answer_confidence = config.analytics.answer_confidence.clamp(0.0, 1.0);

    debug!(
        http = ?config.http,
        database = %config.database.url,
        gemini_model = %config.gemini.model,
        "loaded doodates configuration"
    );
    Ok(config)
}
