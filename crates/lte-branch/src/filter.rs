//! Branch selection by identifier pattern

use crate::branch::BranchId;
use crate::error::BranchError;
use regex::Regex;

/// Include/exclude filter over branch identifiers
///
/// A branch is accepted when it matches *every* include pattern and *no*
/// exclude pattern. An empty filter accepts everything.
#[derive(Debug, Clone, Default)]
pub struct BranchFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl BranchFilter {
    /// Create filter that accepts everything
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require identifiers to match `pattern`
    ///
    /// # Errors
    /// `BranchError::InvalidPattern` if the regex does not compile
    pub fn include(mut self, pattern: &str) -> Result<Self, BranchError> {
        self.include.push(compile(pattern)?);
        Ok(self)
    }

    /// Reject identifiers matching `pattern`
    ///
    /// # Errors
    /// `BranchError::InvalidPattern` if the regex does not compile
    pub fn exclude(mut self, pattern: &str) -> Result<Self, BranchError> {
        self.exclude.push(compile(pattern)?);
        Ok(self)
    }

    /// Check one identifier
    #[must_use]
    pub fn accepts(&self, id: &BranchId) -> bool {
        let id = id.as_str();
        self.include.iter().all(|re| re.is_match(id)) && !self.exclude.iter().any(|re| re.is_match(id))
    }

    /// True if no patterns are configured
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

fn compile(pattern: &str) -> Result<Regex, BranchError> {
    Regex::new(pattern).map_err(|e| BranchError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}
