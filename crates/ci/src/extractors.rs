//! Error extraction from GitHub Actions job logs.
//!
//! Tuned for Vitest and Playwright output, plus the generic `##[error]`
//! annotations and `npm ERR!` lines.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{CiError, CiResult};

/// Lines inspected after a failing test header when looking for its cause.
const DETAIL_LOOKAHEAD: usize = 12;
const MAX_ERRORS_PER_LOG: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSource {
    Vitest,
    Playwright,
    Actions,
    Npm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedError {
    pub source: ErrorSource,
    pub file: Option<String>,
    pub test: Option<String>,
    pub message: String,
}

pub struct ErrorExtractor {
    timestamp: Regex,
    vitest_fail: Regex,
    playwright_fail: Regex,
    error_detail: Regex,
    actions_error: Regex,
    npm_error: Regex,
}

impl ErrorExtractor {
    pub fn new() -> CiResult<Self> {
        let compile = |pattern: &str| Regex::new(pattern).map_err(|e| CiError::pattern(pattern, e));

        Ok(Self {
            timestamp: compile(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?Z ?")?,
            vitest_fail: compile(
                r"^\s*(?:FAIL|×|❯)\s+(\S+\.(?:test|spec)\.[cm]?[jt]sx?)(?:\s+>\s+(.+?))?\s*(?:\d+ms)?$",
            )?,
            playwright_fail: compile(
                r"^\s*\d+\)\s+\[([\w-]+)\]\s+›\s+(\S+?):\d+:\d+\s+›\s+(.+?)\s*─*$",
            )?,
            error_detail: compile(
                r"^\s*((?:AssertionError|TypeError|ReferenceError|TimeoutError|Error)\b:?.*|expect\(.+|Expected.+|Received.+)$",
            )?,
            actions_error: compile(r"##\[error\](.+)$")?,
            npm_error: compile(r"^npm ERR! (.+)$")?,
        })
    }

    fn strip_timestamp<'a>(&self, line: &'a str) -> &'a str {
        match self.timestamp.find(line) {
            Some(m) => &line[m.end()..],
            None => line,
        }
    }

    fn detail_after(&self, lines: &[&str], index: usize) -> Option<String> {
        lines
            .iter()
            .skip(index + 1)
            .take(DETAIL_LOOKAHEAD)
            .find_map(|line| self.error_detail.captures(line))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
    }

    /// Deduplicated errors in log order, capped per log.
    pub fn extract(&self, log: &str) -> Vec<ExtractedError> {
        let lines: Vec<&str> = log.lines().map(|line| self.strip_timestamp(line)).collect();
        let mut found: Vec<ExtractedError> = Vec::new();

        for (index, line) in lines.iter().enumerate() {
            let candidate = if let Some(caps) = self.vitest_fail.captures(line) {
                let file = caps.get(1).map(|m| m.as_str().to_string());
                let test = caps.get(2).map(|m| m.as_str().trim().to_string());
                let message = self
                    .detail_after(&lines, index)
                    .unwrap_or_else(|| "Test failed".to_string());
                Some(ExtractedError {
                    source: ErrorSource::Vitest,
                    file,
                    test,
                    message,
                })
            } else if let Some(caps) = self.playwright_fail.captures(line) {
                let browser = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                let title = caps.get(3).map(|m| m.as_str().trim()).unwrap_or_default();
                let message = self
                    .detail_after(&lines, index)
                    .unwrap_or_else(|| "Test failed".to_string());
                Some(ExtractedError {
                    source: ErrorSource::Playwright,
                    file: caps.get(2).map(|m| m.as_str().to_string()),
                    test: Some(format!("[{browser}] {title}")),
                    message,
                })
            } else if let Some(caps) = self.actions_error.captures(line) {
                caps.get(1).map(|m| ExtractedError {
                    source: ErrorSource::Actions,
                    file: None,
                    test: None,
                    message: m.as_str().trim().to_string(),
                })
            } else {
                self.npm_error.captures(line).and_then(|caps| caps.get(1)).map(|m| {
                    ExtractedError {
                        source: ErrorSource::Npm,
                        file: None,
                        test: None,
                        message: m.as_str().trim().to_string(),
                    }
                })
            };

            if let Some(error) = candidate {
                if !found.contains(&error) {
                    found.push(error);
                }
                if found.len() >= MAX_ERRORS_PER_LOG {
                    break;
                }
            }
        }

        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VITEST_LOG: &str = "\
2024-05-02T10:15:01.1234567Z  RUN  v1.6.0 /home/runner/work/app
2024-05-02T10:15:04.0000000Z  FAIL  src/lib/validation.test.ts > validateTimeRange > rejects wraparound
2024-05-02T10:15:04.0000000Z AssertionError: expected true to be false
2024-05-02T10:15:04.0000000Z  ❯ src/lib/validation.test.ts:42:18
2024-05-02T10:15:05.0000000Z  Test Files  1 failed | 12 passed (13)
2024-05-02T10:15:05.0000000Z ##[error]Process completed with exit code 1.";

    const PLAYWRIGHT_LOG: &str = "\
2024-05-02T11:00:00.0000000Z   1) [chromium] › tests/e2e/dashboard.spec.ts:18:7 › affiche les sondages ─────────
2024-05-02T11:00:00.0000000Z
2024-05-02T11:00:00.0000000Z     Error: Timed out 5000ms waiting for expect(locator).toBeVisible()
2024-05-02T11:00:01.0000000Z   1 failed";

    #[test]
    fn test_vitest_failure_with_assertion() {
        let extractor = ErrorExtractor::new().unwrap();
        let errors = extractor.extract(VITEST_LOG);

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].source, ErrorSource::Vitest);
        assert_eq!(errors[0].file.as_deref(), Some("src/lib/validation.test.ts"));
        assert_eq!(
            errors[0].test.as_deref(),
            Some("validateTimeRange > rejects wraparound")
        );
        assert_eq!(errors[0].message, "AssertionError: expected true to be false");
        assert_eq!(errors[1].source, ErrorSource::Actions);
        assert_eq!(errors[1].message, "Process completed with exit code 1.");
    }

    #[test]
    fn test_playwright_failure() {
        let extractor = ErrorExtractor::new().unwrap();
        let errors = extractor.extract(PLAYWRIGHT_LOG);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].source, ErrorSource::Playwright);
        assert_eq!(errors[0].file.as_deref(), Some("tests/e2e/dashboard.spec.ts"));
        assert_eq!(errors[0].test.as_deref(), Some("[chromium] affiche les sondages"));
        assert!(errors[0].message.starts_with("Error: Timed out 5000ms"));
    }

    #[test]
    fn test_npm_errors_deduplicated() {
        let extractor = ErrorExtractor::new().unwrap();
        let log = "npm ERR! code ERESOLVE\nnpm ERR! code ERESOLVE\nnpm ERR! ERESOLVE unable to resolve dependency tree";
        let errors = extractor.extract(log);

        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.source == ErrorSource::Npm));
        assert_eq!(errors[0].message, "code ERESOLVE");
    }

    #[test]
    fn test_clean_log_yields_nothing() {
        let extractor = ErrorExtractor::new().unwrap();
        assert!(extractor
            .extract("2024-05-02T10:00:00Z All tests passed\nDone in 3.2s")
            .is_empty());
    }
}
