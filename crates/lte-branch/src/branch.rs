//! Branch identity and weight

use crate::error::BranchError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Opaque branch identifier
///
/// Usually the encoded choice at every logic-tree level
/// (e.g. `FM3_1_ZENGBB_Shaw09Mod_DsrTap`). The framework never interprets it
/// beyond equality, display and pattern filtering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(String);

impl BranchId {
    /// Create identifier
    ///
    /// # Errors
    /// `BranchError::EmptyId` if `id` is empty or whitespace
    pub fn new(id: impl AsRef<str>) -> Result<Self, BranchError> {
        let id = id.as_ref().trim();
        if id.is_empty() {
            return Err(BranchError::EmptyId);
        }
        Ok(Self(id.to_string()))
    }

    /// Identifier text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for BranchId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scenario identifier plus relative weight
///
/// Weights are relative: they need not sum to one. A weight of zero is legal
/// (the branch is evaluated but contributes nothing to weighted statistics).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBranch")]
pub struct WeightedBranch {
    id: BranchId,
    weight: f64,
}

impl WeightedBranch {
    /// Create weighted branch
    ///
    /// # Errors
    /// - `BranchError::EmptyId` for an empty identifier
    /// - `BranchError::InvalidWeight` for negative or non-finite weights
    pub fn new(id: impl AsRef<str>, weight: f64) -> Result<Self, BranchError> {
        let id = BranchId::new(id)?;
        Self::with_id(id, weight)
    }

    /// Create from an existing identifier
    ///
    /// # Errors
    /// `BranchError::InvalidWeight` for negative or non-finite weights
    pub fn with_id(id: BranchId, weight: f64) -> Result<Self, BranchError> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(BranchError::InvalidWeight {
                id: id.to_string(),
                weight,
            });
        }
        Ok(Self { id, weight })
    }

    /// Branch identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> &BranchId {
        &self.id
    }

    /// Relative weight (always finite and >= 0)
    #[inline]
    #[must_use]
    pub fn weight(&self) -> f64 {
        self.weight
    }
}

/// Unvalidated wire form, checked on deserialization
#[derive(Deserialize)]
struct RawBranch {
    id: String,
    weight: f64,
}

impl TryFrom<RawBranch> for WeightedBranch {
    type Error = BranchError;

    fn try_from(raw: RawBranch) -> Result<Self, Self::Error> {
        Self::new(raw.id, raw.weight)
    }
}

impl Display for WeightedBranch {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} (weight {})", self.id, self.weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_id() {
        assert_eq!(WeightedBranch::new("  ", 1.0), Err(BranchError::EmptyId));
    }

    #[test]
    fn rejects_bad_weights() {
        for weight in [-0.1, f64::NAN, f64::INFINITY] {
            let result = WeightedBranch::new("b", weight);
            assert!(matches!(result, Err(BranchError::InvalidWeight { .. })));
        }
    }

    #[test]
    fn zero_weight_is_allowed() {
        let branch = WeightedBranch::new("b", 0.0).unwrap();
        assert_eq!(branch.weight(), 0.0);
    }

    #[test]
    fn id_is_trimmed_and_displayed() {
        let branch = WeightedBranch::new(" FM3_1 ", 0.5).unwrap();
        assert_eq!(branch.id().as_str(), "FM3_1");
        assert_eq!(branch.to_string(), "FM3_1 (weight 0.5)");
    }

    #[test]
    fn serde_is_transparent_for_ids() {
        let branch = WeightedBranch::new("FM3_1", 0.5).unwrap();
        let json = serde_json::to_string(&branch).unwrap();
        assert_eq!(json, r#"{"id":"FM3_1","weight":0.5}"#);
    }

    #[test]
    fn deserialization_validates_weight() {
        let parsed: Result<WeightedBranch, _> =
            serde_json::from_str(r#"{"id":"FM3_1","weight":-2.0}"#);
        assert!(parsed.is_err());
    }
}
