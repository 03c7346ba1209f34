//! Dependency classification
//!
//! Decides whether an import request is satisfied by the external loader
//! instead of being bundled. Rules are normalized once, when the options are
//! validated, so classification itself cannot fail.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::naming::strip_loader_prefix;

/// How loader prefixes (`plugin!request`) interact with each kind of rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    /// Literal rules ignore the loader prefix, pattern rules see the raw request
    #[default]
    Legacy,
    /// Both kinds of rule see the request with its loader prefix removed
    Unified,
}

/// One normalized externalization rule
#[derive(Debug, Clone)]
pub enum ExternalizationRule {
    /// Exact request name, compared after removing any loader prefix
    Literal(String),
    /// Regular expression that must match the whole request
    ///
    /// Build it with [`ExternalizationRule::pattern`], which anchors the
    /// expression at both ends.
    Pattern(Regex),
}

impl ExternalizationRule {
    /// Compile a pattern rule that only matches when it spans the entire request
    ///
    /// `react` matches `react` but not `preact-compat` or `react-dom/server`;
    /// write `react.*` to take in a whole family of requests.
    pub fn pattern(source: &str) -> Result<Self, regex::Error> {
        // Compiling the bare source first rejects `a)|(b`, which would escape the group
        Regex::new(source)?;
        Regex::new(&format!("^(?:{source})$")).map(Self::Pattern)
    }

    fn matches(&self, request: &str, mode: MatchMode) -> bool {
        match self {
            Self::Literal(name) => strip_loader_prefix(request) == name,
            Self::Pattern(regex) => match mode {
                MatchMode::Legacy => regex.is_match(request),
                MatchMode::Unified => regex.is_match(strip_loader_prefix(request)),
            },
        }
    }

    /// Literal rules name a dependency up front; pattern rules only name the
    /// requests they happen to match
    pub fn literal_name(&self) -> Option<&str> {
        match self {
            Self::Literal(name) => Some(name),
            Self::Pattern(_) => None,
        }
    }
}

impl PartialEq for ExternalizationRule {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Literal(a), Self::Literal(b)) => a == b,
            (Self::Pattern(a), Self::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

/// The full rule set of one build
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    rules: Vec<ExternalizationRule>,
    mode: MatchMode,
}

impl Classifier {
    pub fn new(rules: Vec<ExternalizationRule>, mode: MatchMode) -> Self {
        Self { rules, mode }
    }

    pub fn rules(&self) -> &[ExternalizationRule] {
        &self.rules
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Check whether `request` must be satisfied by the external loader
    pub fn is_external(&self, request: &str) -> bool {
        classify(request, &self.rules, self.mode)
    }
}

/// Check whether any rule matches `request`
pub fn classify(request: &str, rules: &[ExternalizationRule], mode: MatchMode) -> bool {
    let matched = rules.iter().any(|rule| rule.matches(request, mode));
    log::trace!("Classified '{request}' as {}", if matched { "external" } else { "bundled" });
    matched
}
