//! Policy tree definitions.
//!
//! A policy tree is a strict tree of [`Rule`]s (leaves) and [`PolicySet`]s
//! (inner nodes). Each node may carry a target, a cheap applicability filter
//! checked before anything else. Rules add a condition and an effect; sets
//! add a combining algorithm and an ordered list of children they own.
//!
//! Trees are built once, validated by [`crate::validate`], and never mutated
//! while a [`crate::Pdp`] holds them.

use serde::{Deserialize, Serialize};

use crate::decision::Extent;
use crate::expression::Expression;

// ============================================================================
// Effect
// ============================================================================

/// The effect of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Permit,
    Deny,
}

impl Effect {
    /// The other effect.
    pub fn opposite(self) -> Effect {
        match self {
            Effect::Permit => Effect::Deny,
            Effect::Deny => Effect::Permit,
        }
    }
}

// ============================================================================
// Obligations
// ============================================================================

/// A named value computed when an obligation is fulfilled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeAssignment {
    pub name: String,
    pub value: Expression,
}

/// An instruction the enforcement point must carry out alongside a decision.
///
/// Only returned when the owning node contributed to the final decision and
/// `fulfill_on` equals that decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obligation {
    pub id: String,
    pub fulfill_on: Effect,
    #[serde(default)]
    pub assignments: Vec<AttributeAssignment>,
}

impl Obligation {
    /// Creates an obligation with no assignments.
    pub fn new(id: &str, fulfill_on: Effect) -> Self {
        Self {
            id: id.to_string(),
            fulfill_on,
            assignments: Vec::new(),
        }
    }

    /// Adds an assignment (builder pattern).
    pub fn with_assignment(mut self, name: &str, value: Expression) -> Self {
        self.assignments.push(AttributeAssignment {
            name: name.to_string(),
            value,
        });
        self
    }
}

// ============================================================================
// Rule
// ============================================================================

/// A leaf of the policy tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Identifier, unique among siblings. Used in logs and reasons.
    pub id: String,
    /// Applicability filter; `None` always applies.
    #[serde(default)]
    pub target: Option<Expression>,
    /// Full condition; `None` is trivially true.
    #[serde(default)]
    pub condition: Option<Expression>,
    pub effect: Effect,
    #[serde(default)]
    pub obligations: Vec<Obligation>,
}

impl Rule {
    /// Creates an unconditional rule.
    pub fn new(id: &str, effect: Effect) -> Self {
        Self {
            id: id.to_string(),
            target: None,
            condition: None,
            effect,
            obligations: Vec::new(),
        }
    }

    pub fn permit(id: &str) -> Self {
        Self::new(id, Effect::Permit)
    }

    pub fn deny(id: &str) -> Self {
        Self::new(id, Effect::Deny)
    }

    pub fn with_target(mut self, target: Expression) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_condition(mut self, condition: Expression) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Attaches an obligation fulfilled on this rule's effect.
    pub fn with_obligation(mut self, id: &str, assignments: Vec<AttributeAssignment>) -> Self {
        self.obligations.push(Obligation {
            id: id.to_string(),
            fulfill_on: self.effect,
            assignments,
        });
        self
    }
}

// ============================================================================
// Combining algorithms
// ============================================================================

/// How a [`PolicySet`] reduces the decisions of its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CombiningAlgorithm {
    /// Any Deny wins.
    DenyOverrides,
    /// Any Permit wins.
    PermitOverrides,
    /// The first applicable child decides.
    FirstApplicable,
    /// Exactly one child may apply; more is an error.
    OnlyOneApplicable,
    /// Permit if any child permits, otherwise Deny.
    DenyUnlessPermit,
    /// Deny if any child denies, otherwise Permit.
    PermitUnlessDeny,
}

impl CombiningAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            Self::DenyOverrides => "deny-overrides",
            Self::PermitOverrides => "permit-overrides",
            Self::FirstApplicable => "first-applicable",
            Self::OnlyOneApplicable => "only-one-applicable",
            Self::DenyUnlessPermit => "deny-unless-permit",
            Self::PermitUnlessDeny => "permit-unless-deny",
        }
    }
}

// ============================================================================
// PolicySet
// ============================================================================

/// An inner node of the policy tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySet {
    pub id: String,
    #[serde(default)]
    pub target: Option<Expression>,
    pub algorithm: CombiningAlgorithm,
    #[serde(default)]
    pub children: Vec<PolicyNode>,
    #[serde(default)]
    pub obligations: Vec<Obligation>,
}

impl PolicySet {
    pub fn new(id: &str, algorithm: CombiningAlgorithm) -> Self {
        Self {
            id: id.to_string(),
            target: None,
            algorithm,
            children: Vec::new(),
            obligations: Vec::new(),
        }
    }

    pub fn with_target(mut self, target: Expression) -> Self {
        self.target = Some(target);
        self
    }

    /// Appends a child; children are evaluated in insertion order.
    pub fn with_child(mut self, child: impl Into<PolicyNode>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_obligation(mut self, obligation: Obligation) -> Self {
        self.obligations.push(obligation);
        self
    }

    /// The effects this set can produce, or `None` if it can only ever be
    /// NotApplicable.
    ///
    /// Computed from structure alone; no attributes are consulted.
    pub fn possible_effects(&self) -> Option<Extent> {
        let children = self
            .children
            .iter()
            .filter_map(PolicyNode::possible_effects)
            .reduce(Extent::union);
        match self.algorithm {
            CombiningAlgorithm::DenyUnlessPermit => {
                Some(children.map_or(Extent::Deny, |e| e.union(Extent::Deny)))
            }
            CombiningAlgorithm::PermitUnlessDeny => {
                Some(children.map_or(Extent::Permit, |e| e.union(Extent::Permit)))
            }
            _ => children,
        }
    }
}

// ============================================================================
// PolicyNode
// ============================================================================

/// A node of the policy tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyNode {
    Rule(Rule),
    Set(PolicySet),
}

impl PolicyNode {
    pub fn id(&self) -> &str {
        match self {
            PolicyNode::Rule(rule) => &rule.id,
            PolicyNode::Set(set) => &set.id,
        }
    }

    pub fn target(&self) -> Option<&Expression> {
        match self {
            PolicyNode::Rule(rule) => rule.target.as_ref(),
            PolicyNode::Set(set) => set.target.as_ref(),
        }
    }

    /// The effects this subtree can produce.
    pub fn possible_effects(&self) -> Option<Extent> {
        match self {
            PolicyNode::Rule(rule) => Some(rule.effect.into()),
            PolicyNode::Set(set) => set.possible_effects(),
        }
    }

    /// Depth of the subtree; a lone rule has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            PolicyNode::Rule(_) => 1,
            PolicyNode::Set(set) => {
                1 + set
                    .children
                    .iter()
                    .map(PolicyNode::depth)
                    .max()
                    .unwrap_or(0)
            }
        }
    }

    /// Total number of nodes in the subtree.
    pub fn node_count(&self) -> usize {
        match self {
            PolicyNode::Rule(_) => 1,
            PolicyNode::Set(set) => 1 + set.children.iter().map(PolicyNode::node_count).sum::<usize>(),
        }
    }
}

impl From<Rule> for PolicyNode {
    fn from(rule: Rule) -> Self {
        PolicyNode::Rule(rule)
    }
}

impl From<PolicySet> for PolicyNode {
    fn from(set: PolicySet) -> Self {
        PolicyNode::Set(set)
    }
}

// ============================================================================
// Tests
// ============================================================================
