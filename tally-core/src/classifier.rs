//! Keyword category classifier.
//!
//! An ordered list of `(pattern, category)` rules is checked top to bottom
//! against the lower-cased description; the first pattern contained in the
//! description wins, otherwise the category is `UNKNOWN`. Rule content is
//! data (see `rules/default_rules.toml`); only the matching lives here.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::category::Category;

const BUILTIN_RULES: &str = include_str!("../rules/default_rules.toml");

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("reading rules file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing rules: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("rule #{index} has an empty pattern")]
    EmptyPattern { index: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub pattern: String,
    pub category: Category,
}

impl Rule {
    pub fn new(pattern: impl Into<String>, category: Category) -> Self {
        Self {
            pattern: pattern.into(),
            category,
        }
    }
}

/// An ordered rule list as written in a rules file (`[[rule]]` tables).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(rename = "rule", default)]
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn builtin() -> Result<Self, RulesError> {
        Self::from_toml_str(BUILTIN_RULES)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, RulesError> {
        let set: RuleSet = toml::from_str(s)?;
        if let Some(index) = set.rules.iter().position(|r| r.pattern.trim().is_empty()) {
            return Err(RulesError::EmptyPattern { index });
        }
        Ok(set)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RulesError> {
        let path = path.as_ref();
        let s = fs::read_to_string(path).map_err(|source| RulesError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&s)
    }
}

/// First-match classifier over a fixed [`RuleSet`].
#[derive(Debug, Clone)]
pub struct Classifier {
    // patterns are stored lower-cased
    rules: Vec<Rule>,
}

impl Classifier {
    pub fn new(set: RuleSet) -> Self {
        let rules = set
            .rules
            .into_iter()
            .map(|r| Rule::new(r.pattern.to_lowercase(), r.category))
            .collect();
        Self { rules }
    }

    pub fn builtin() -> Result<Self, RulesError> {
        Ok(Self::new(RuleSet::builtin()?))
    }

    pub fn classify(&self, description: &str) -> Category {
        let desc = description.to_lowercase();
        self.rules
            .iter()
            .find(|r| desc.contains(&r.pattern))
            .map(|r| r.category)
            .unwrap_or(Category::Unknown)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}
