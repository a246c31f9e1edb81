//! Load-time policy validation.
//!
//! Everything that can be checked without a request is checked here, once,
//! before a [`crate::Pdp`] accepts a policy tree. Evaluation assumes a tree
//! that passed.

use std::collections::HashSet;

use thiserror::Error;

use crate::attributes::{AttributeCatalog, AttributeValue};
use crate::expression::{Expression, Function};
use crate::policy::{Obligation, PolicyNode};

/// A policy tree or catalog that cannot be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// An expression references an attribute the catalog does not declare.
    #[error("{node}: attribute '{attribute}' is not declared")]
    UndeclaredAttribute { node: String, attribute: String },

    /// An expression references a declared name with a different type or
    /// multiplicity.
    #[error("{node}: attribute '{attribute}' is declared as {declared} but referenced as {referenced}")]
    AttributeMismatch {
        node: String,
        attribute: String,
        declared: String,
        referenced: String,
    },

    /// A function call has the wrong number of arguments.
    #[error("{node}: {function} takes {expected} argument(s), found {found}")]
    Arity {
        node: String,
        function: String,
        expected: usize,
        found: usize,
    },

    /// `is_present` was given something other than an attribute reference.
    #[error("{node}: is_present expects an attribute reference")]
    IsPresentArgument { node: String },

    /// Two siblings share an id.
    #[error("{parent}: duplicate child id '{id}'")]
    DuplicateId { parent: String, id: String },

    /// A node or obligation has an empty id.
    #[error("{parent}: empty id")]
    EmptyId { parent: String },

    /// A rule carries an obligation for the opposite effect, which could
    /// never be fulfilled.
    #[error("{rule}: obligation '{obligation}' can never match the rule's effect")]
    ObligationEffect { rule: String, obligation: String },

    /// The tree is nested deeper than allowed.
    #[error("policy tree depth exceeds {max}")]
    TooDeep { max: usize },

    /// A literal bag mixes value types.
    #[error("{node}: literal bag mixes value types")]
    HeterogeneousBag { node: String },

    /// A catalog declares the same name twice with different shapes.
    #[error("attribute '{attribute}' already declared as {existing}, cannot redeclare as {requested}")]
    ConflictingDeclaration {
        attribute: String,
        existing: String,
        requested: String,
    },
}

/// Validates a policy tree against a catalog.
///
/// Returns the first problem found, walking the tree depth-first in child
/// order.
pub fn validate_policy(
    policy: &PolicyNode,
    catalog: &AttributeCatalog,
    max_depth: usize,
) -> Result<(), PolicyError> {
    let validator = Validator { catalog, max_depth };
    if policy.id().is_empty() {
        return Err(PolicyError::EmptyId {
            parent: "<root>".to_string(),
        });
    }
    validator.node(policy, policy.id(), 1)
}

struct Validator<'a> {
    catalog: &'a AttributeCatalog,
    max_depth: usize,
}

impl Validator<'_> {
    fn node(&self, node: &PolicyNode, path: &str, depth: usize) -> Result<(), PolicyError> {
        if depth > self.max_depth {
            return Err(PolicyError::TooDeep {
                max: self.max_depth,
            });
        }

        if let Some(target) = node.target() {
            self.expression(target, path)?;
        }

        match node {
            PolicyNode::Rule(rule) => {
                if let Some(condition) = &rule.condition {
                    self.expression(condition, path)?;
                }
                for obligation in &rule.obligations {
                    if obligation.fulfill_on != rule.effect {
                        return Err(PolicyError::ObligationEffect {
                            rule: path.to_string(),
                            obligation: obligation.id.clone(),
                        });
                    }
                }
                self.obligations(&rule.obligations, path)
            }
            PolicyNode::Set(set) => {
                self.obligations(&set.obligations, path)?;

                let mut seen = HashSet::new();
                for child in &set.children {
                    let id = child.id();
                    if id.is_empty() {
                        return Err(PolicyError::EmptyId {
                            parent: path.to_string(),
                        });
                    }
                    if !seen.insert(id) {
                        return Err(PolicyError::DuplicateId {
                            parent: path.to_string(),
                            id: id.to_string(),
                        });
                    }
                    self.node(child, &format!("{path}/{id}"), depth + 1)?;
                }
                Ok(())
            }
        }
    }

    fn obligations(&self, obligations: &[Obligation], path: &str) -> Result<(), PolicyError> {
        for obligation in obligations {
            if obligation.id.is_empty() {
                return Err(PolicyError::EmptyId {
                    parent: path.to_string(),
                });
            }
            let location = format!("{path}#{}", obligation.id);
            for assignment in &obligation.assignments {
                self.expression(&assignment.value, &location)?;
            }
        }
        Ok(())
    }

    fn expression(&self, expr: &Expression, path: &str) -> Result<(), PolicyError> {
        match expr {
            Expression::Literal(AttributeValue::Bag(bag)) if !bag.is_homogeneous() => {
                Err(PolicyError::HeterogeneousBag {
                    node: path.to_string(),
                })
            }
            Expression::Literal(_) => Ok(()),
            Expression::Attribute(id) => match self.catalog.get(id.category, &id.name) {
                None => Err(PolicyError::UndeclaredAttribute {
                    node: path.to_string(),
                    attribute: id.to_string(),
                }),
                Some(declared) if declared != id => Err(PolicyError::AttributeMismatch {
                    node: path.to_string(),
                    attribute: id.to_string(),
                    declared: format!("{:?} {}", declared.multiplicity, declared.value_type),
                    referenced: format!("{:?} {}", id.multiplicity, id.value_type),
                }),
                Some(_) => Ok(()),
            },
            Expression::Compare { left, right, .. } => {
                self.expression(left, path)?;
                self.expression(right, path)
            }
            Expression::And(operands) | Expression::Or(operands) => operands
                .iter()
                .try_for_each(|operand| self.expression(operand, path)),
            Expression::Not(operand) => self.expression(operand, path),
            Expression::Call { function, args } => {
                if args.len() != function.arity() {
                    return Err(PolicyError::Arity {
                        node: path.to_string(),
                        function: function.name().to_string(),
                        expected: function.arity(),
                        found: args.len(),
                    });
                }
                if *function == Function::IsPresent
                    && !matches!(args.as_slice(), [Expression::Attribute(_)])
                {
                    return Err(PolicyError::IsPresentArgument {
                        node: path.to_string(),
                    });
                }
                args.iter().try_for_each(|arg| self.expression(arg, path))
            }
        }
    }
}
