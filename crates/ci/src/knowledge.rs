//! Failure classification rules.
//!
//! Rules are evaluated highest priority first; rules of equal priority
//! keep their declaration order. When none matches, a keyword guess
//! provides a category.

use std::collections::BTreeMap;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{CiError, CiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Dependencies,
    Test,
    E2e,
    Build,
    Lint,
    Network,
    Resources,
    Configuration,
    #[serde(other)]
    Unknown,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Dependencies => "dependencies",
            Category::Test => "test",
            Category::E2e => "e2e",
            Category::Build => "build",
            Category::Lint => "lint",
            Category::Network => "network",
            Category::Resources => "resources",
            Category::Configuration => "configuration",
            Category::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Matcher {
    /// Case-insensitive substring
    Substring(String),
    Regex(Regex),
}

impl Matcher {
    pub fn substring(needle: impl Into<String>) -> Self {
        Matcher::Substring(needle.into().to_lowercase())
    }

    pub fn regex(pattern: &str) -> CiResult<Self> {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map(Matcher::Regex)
            .map_err(|e| CiError::pattern(pattern, e))
    }

    /// `lowered` must be the lowercased form of `log`.
    fn is_match(&self, log: &str, lowered: &str) -> bool {
        match self {
            Matcher::Substring(needle) => lowered.contains(needle.as_str()),
            Matcher::Regex(regex) => regex.is_match(log),
        }
    }

    pub fn pattern(&self) -> &str {
        match self {
            Matcher::Substring(needle) => needle,
            Matcher::Regex(regex) => regex.as_str(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub matcher: Matcher,
    pub solution: String,
    pub priority: Priority,
    pub category: Category,
}

/// Outcome of classifying a log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub pattern: Option<String>,
    pub solution: String,
    pub priority: Priority,
    pub category: Category,
    /// False when the category comes from the keyword fallback
    pub matched: bool,
}

#[derive(Debug, Deserialize)]
struct RuleSpec {
    pattern: String,
    #[serde(default)]
    regex: bool,
    #[serde(flatten)]
    entry: RuleEntry,
}

#[derive(Debug, Deserialize)]
struct RuleEntry {
    solution: String,
    #[serde(default = "RuleEntry::default_priority")]
    priority: Priority,
    #[serde(default = "RuleEntry::default_category")]
    category: Category,
}

impl RuleEntry {
    const fn default_priority() -> Priority {
        Priority::Medium
    }

    const fn default_category() -> Category {
        Category::Unknown
    }
}

/// Either `{"rules": [...]}` or a `{pattern: {solution, priority, category}}` table.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KnowledgeFile {
    Rules { rules: Vec<RuleSpec> },
    Table(BTreeMap<String, RuleEntry>),
}

#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    rules: Vec<Rule>,
}

impl KnowledgeBase {
    pub fn new(mut rules: Vec<Rule>) -> Self {
        // stable sort keeps declaration order within a priority
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn from_json_str(json: &str) -> CiResult<Self> {
        let file: KnowledgeFile =
            serde_json::from_str(json).map_err(|e| CiError::Knowledge(e.to_string()))?;

        let specs: Vec<RuleSpec> = match file {
            KnowledgeFile::Rules { rules } => rules,
            KnowledgeFile::Table(table) => table
                .into_iter()
                .map(|(pattern, entry)| RuleSpec {
                    pattern,
                    regex: false,
                    entry,
                })
                .collect(),
        };

        let rules = specs
            .into_iter()
            .map(|spec| {
                let matcher = if spec.regex {
                    Matcher::regex(&spec.pattern)?
                } else {
                    Matcher::substring(spec.pattern)
                };
                Ok(Rule {
                    matcher,
                    solution: spec.entry.solution,
                    priority: spec.entry.priority,
                    category: spec.entry.category,
                })
            })
            .collect::<CiResult<Vec<_>>>()?;

        Ok(Self::new(rules))
    }

    pub async fn load(path: &Path) -> CiResult<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CiError::io(path.display().to_string(), e))?;
        let base = Self::from_json_str(&json)?;
        info!(path = %path.display(), rules = base.rules.len(), "loaded knowledge base");
        Ok(base)
    }

    /// Rules from `path` when it loads, the built-in defaults otherwise.
    pub async fn load_or_default(path: Option<&Path>) -> CiResult<Self> {
        if let Some(path) = path {
            match Self::load(path).await {
                Ok(base) => return Ok(base),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "using default knowledge base")
                }
            }
        }
        Self::defaults()
    }

    pub fn defaults() -> CiResult<Self> {
        let rule = |matcher: Matcher, solution: &str, priority, category| Rule {
            matcher,
            solution: solution.to_string(),
            priority,
            category,
        };

        Ok(Self::new(vec![
            rule(
                Matcher::substring("ERESOLVE"),
                "Conflit de dépendances npm : aligner les versions des paquets ou relancer `npm ci --legacy-peer-deps`.",
                Priority::High,
                Category::Dependencies,
            ),
            rule(
                Matcher::regex(r"cannot find module ['\x22]?[\w@./-]+")?,
                "Module introuvable : vérifier package.json et package-lock.json puis réinstaller avec `npm ci`.",
                Priority::High,
                Category::Dependencies,
            ),
            rule(
                Matcher::regex(r"javascript heap out of memory|exit code 137")?,
                "Mémoire insuffisante : augmenter NODE_OPTIONS=--max-old-space-size ou découper la suite de tests.",
                Priority::Critical,
                Category::Resources,
            ),
            rule(
                Matcher::regex(r"error TS\d{4}")?,
                "Erreur TypeScript : lancer `npm run type-check` en local et corriger les types signalés.",
                Priority::High,
                Category::Build,
            ),
            rule(
                Matcher::substring("Executable doesn't exist"),
                "Navigateurs Playwright absents : ajouter `npx playwright install --with-deps` avant les tests E2E.",
                Priority::High,
                Category::E2e,
            ),
            rule(
                Matcher::regex(r"timed? ?out \d+ ?ms|timeout of \d+ms exceeded|test timeout")?,
                "Timeout de test : vérifier les attentes asynchrones et augmenter le timeout si l'opération est légitimement lente.",
                Priority::Medium,
                Category::E2e,
            ),
            rule(
                Matcher::substring("AssertionError"),
                "Assertion en échec : reproduire le test en local avec `npm run test` et comparer valeur attendue et obtenue.",
                Priority::Medium,
                Category::Test,
            ),
            rule(
                Matcher::regex(r"\d+ problems? \(\d+ errors?")?,
                "Erreurs ESLint : lancer `npm run lint -- --fix` puis corriger les erreurs restantes.",
                Priority::Medium,
                Category::Lint,
            ),
            rule(
                Matcher::regex(r"ECONNREFUSED|ETIMEDOUT|ENOTFOUND|socket hang up")?,
                "Erreur réseau : service indisponible ou URL incorrecte, relancer le job et vérifier les variables d'environnement.",
                Priority::Medium,
                Category::Network,
            ),
            rule(
                Matcher::regex(r"secret|environment variable .* (?:is )?(?:missing|not set)")?,
                "Configuration manquante : vérifier les secrets et variables du dépôt dans les paramètres GitHub Actions.",
                Priority::Low,
                Category::Configuration,
            ),
        ]))
    }

    /// Every matching rule, highest priority first.
    pub fn matches(&self, log: &str) -> Vec<Diagnosis> {
        let lowered = log.to_lowercase();
        self.rules
            .iter()
            .filter(|rule| rule.matcher.is_match(log, &lowered))
            .map(|rule| Diagnosis {
                pattern: Some(rule.matcher.pattern().to_string()),
                solution: rule.solution.clone(),
                priority: rule.priority,
                category: rule.category,
                matched: true,
            })
            .collect()
    }

    /// Best matching rule, or the keyword fallback.
    pub fn diagnose(&self, log: &str) -> Diagnosis {
        match self.matches(log).into_iter().next() {
            Some(diagnosis) => diagnosis,
            None => {
                let diagnosis = fallback_diagnosis(log);
                debug!(category = diagnosis.category.as_str(), "no rule matched, using keyword guess");
                diagnosis
            }
        }
    }
}

/// Category guessed from keywords when no rule matches.
pub fn fallback_diagnosis(log: &str) -> Diagnosis {
    let lowered = log.to_lowercase();
    let (category, solution) = if ["npm", "dependenc", "package"]
        .iter()
        .any(|k| lowered.contains(k))
    {
        (
            Category::Dependencies,
            "Problème de dépendances probable : supprimer node_modules, réinstaller avec `npm ci` et vérifier package-lock.json.",
        )
    } else if ["test", "expect", "assert"].iter().any(|k| lowered.contains(k)) {
        (
            Category::Test,
            "Échec de tests probable : relancer la suite en local et examiner les tests modifiés récemment.",
        )
    } else if ["build", "compil", "tsc", "vite"].iter().any(|k| lowered.contains(k)) {
        (
            Category::Build,
            "Échec de build probable : lancer `npm run build` en local et corriger la première erreur affichée.",
        )
    } else {
        (
            Category::Unknown,
            "Cause inconnue : consulter les logs complets du job.",
        )
    };

    Diagnosis {
        pattern: None,
        solution: solution.to_string(),
        priority: Priority::Low,
        category,
        matched: false,
    }
}
