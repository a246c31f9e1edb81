//! Decisions and responses.
//!
//! A [`Response`] is what the PDP hands back to the enforcement point: a
//! [`Decision`] plus the obligations attached to it. Every evaluation-time
//! problem is folded into [`Decision::Indeterminate`] with a reason; nothing
//! in the evaluation path returns a Rust error to the caller.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attributes::AttributeValue;
use crate::policy::Effect;

// ============================================================================
// Indeterminate
// ============================================================================

/// Which effect(s) a failed branch could have produced had it succeeded.
///
/// Combining algorithms use this to tell a deny-leaning failure from a
/// permit-leaning one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extent {
    Permit,
    Deny,
    PermitOrDeny,
}

impl Extent {
    /// The smallest extent covering both.
    pub fn union(self, other: Extent) -> Extent {
        if self == other {
            self
        } else {
            Extent::PermitOrDeny
        }
    }
}

impl From<Effect> for Extent {
    fn from(effect: Effect) -> Self {
        match effect {
            Effect::Permit => Extent::Permit,
            Effect::Deny => Extent::Deny,
        }
    }
}

/// Why a decision could not be made.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndeterminateReason {
    /// An evaluated expression referenced an attribute with no value.
    #[error("attribute '{attribute}' is missing")]
    MissingAttribute { attribute: String },

    /// The attribute resolver failed while looking up a value.
    #[error("resolving '{attribute}' failed: {message}")]
    ResolverFailure { attribute: String, message: String },

    /// Operands or resolved values had incompatible types.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// A non-empty bag was used where a boolean was required.
    #[error("non-empty bag used as a boolean: {0}")]
    BagTruthiness(String),

    /// Arithmetic overflow or division by zero.
    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    /// More than one child of an only-one-applicable set applied.
    #[error("more than one child of '{policy}' is applicable")]
    MultipleApplicable { policy: String },

    /// An obligation assignment could not be evaluated.
    #[error("obligation '{obligation}' could not be fulfilled: {cause}")]
    ObligationFailed {
        obligation: String,
        cause: Box<IndeterminateReason>,
    },
}

impl IndeterminateReason {
    /// Whether the failure stems from policy authoring rather than from
    /// request attributes.
    pub fn is_policy_ambiguity(&self) -> bool {
        matches!(self, IndeterminateReason::MultipleApplicable { .. })
    }
}

/// An indeterminate outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indeterminate {
    pub extent: Extent,
    pub reason: IndeterminateReason,
}

// ============================================================================
// Decision
// ============================================================================

/// The outcome of evaluating a request or a policy node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Permit,
    Deny,
    NotApplicable,
    Indeterminate(Indeterminate),
}

impl Decision {
    /// Builds an indeterminate decision.
    pub fn indeterminate(extent: Extent, reason: IndeterminateReason) -> Self {
        Decision::Indeterminate(Indeterminate { extent, reason })
    }

    /// The effect for `Permit` and `Deny`, otherwise `None`.
    pub fn effect(&self) -> Option<Effect> {
        match self {
            Decision::Permit => Some(Effect::Permit),
            Decision::Deny => Some(Effect::Deny),
            _ => None,
        }
    }

    pub fn is_permit(&self) -> bool {
        matches!(self, Decision::Permit)
    }

    pub fn is_deny(&self) -> bool {
        matches!(self, Decision::Deny)
    }

    pub fn is_not_applicable(&self) -> bool {
        matches!(self, Decision::NotApplicable)
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Decision::Indeterminate(_))
    }

    /// The indeterminate reason, if any.
    pub fn reason(&self) -> Option<&IndeterminateReason> {
        match self {
            Decision::Indeterminate(i) => Some(&i.reason),
            _ => None,
        }
    }
}

impl From<Effect> for Decision {
    fn from(effect: Effect) -> Self {
        match effect {
            Effect::Permit => Decision::Permit,
            Effect::Deny => Decision::Deny,
        }
    }
}

impl Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Permit => f.write_str("Permit"),
            Decision::Deny => f.write_str("Deny"),
            Decision::NotApplicable => f.write_str("NotApplicable"),
            Decision::Indeterminate(i) => write!(f, "Indeterminate{{{:?}}}: {}", i.extent, i.reason),
        }
    }
}

// ============================================================================
// Response
// ============================================================================

/// A name/value pair attached to a fulfilled obligation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub name: String,
    pub value: AttributeValue,
}

/// An obligation whose assignments have been evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfilledObligation {
    pub id: String,
    pub assignments: Vec<Assignment>,
}

impl FulfilledObligation {
    /// Looks up an assignment by name.
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.assignments
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }
}

/// The result of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub decision: Decision,
    pub obligations: Vec<FulfilledObligation>,
}

impl Response {
    pub fn new(decision: Decision, obligations: Vec<FulfilledObligation>) -> Self {
        Self {
            decision,
            obligations,
        }
    }

    /// A response carrying no obligations.
    pub fn bare(decision: Decision) -> Self {
        Self::new(decision, Vec::new())
    }

    /// Whether an obligation with this id is attached.
    pub fn has_obligation(&self, id: &str) -> bool {
        self.obligations.iter().any(|o| o.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_union() {
        assert_eq!(Extent::Permit.union(Extent::Permit), Extent::Permit);
        assert_eq!(Extent::Permit.union(Extent::Deny), Extent::PermitOrDeny);
        assert_eq!(Extent::Deny.union(Extent::PermitOrDeny), Extent::PermitOrDeny);
    }

    #[test]
    fn test_policy_ambiguity_is_distinguished() {
        let ambiguity = IndeterminateReason::MultipleApplicable {
            policy: "root".to_string(),
        };
        let missing = IndeterminateReason::MissingAttribute {
            attribute: "subject.role".to_string(),
        };
        assert!(ambiguity.is_policy_ambiguity());
        assert!(!missing.is_policy_ambiguity());
    }

    #[test]
    fn test_decision_display() {
        let d = Decision::indeterminate(
            Extent::Deny,
            IndeterminateReason::MissingAttribute {
                attribute: "resource.owner".to_string(),
            },
        );
        assert_eq!(
            d.to_string(),
            "Indeterminate{Deny}: attribute 'resource.owner' is missing"
        );
    }

    #[test]
    fn test_responses_compare_structurally() {
        assert_eq!(Response::bare(Decision::Deny), Response::new(Decision::Deny, vec![]));
        assert_ne!(Response::bare(Decision::Deny), Response::bare(Decision::Permit));
    }

    #[test]
    fn test_response_serialization_roundtrip() {
        let response = Response::new(
            Decision::Permit,
            vec![FulfilledObligation {
                id: "audit-log".to_string(),
                assignments: vec![Assignment {
                    name: "subject".to_string(),
                    value: AttributeValue::simple("maarten"),
                }],
            }],
        );
        let json = serde_json::to_string(&response).expect("serialize response");
        let back: Response = serde_json::from_str(&json).expect("deserialize response");
        assert_eq!(response, back);
    }
}
