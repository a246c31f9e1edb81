//! Policy tree evaluation.
//!
//! Walks the tree top-down. Every node checks its target first; a false
//! target makes the node NotApplicable without touching anything below it.
//! Rules then evaluate their condition; sets hand a lazy iterator over their
//! children to the combining algorithm.

use tracing::debug;

use crate::combining::{Outcome, combine};
use crate::decision::Extent;
use crate::expression::EvaluationContext;
use crate::policy::{PolicyNode, PolicySet, Rule};

/// Evaluates a node and its subtree.
pub fn evaluate_node<'p>(node: &'p PolicyNode, ctx: &mut EvaluationContext<'_>) -> Outcome<'p> {
    ctx.record_node();
    let outcome = match node {
        PolicyNode::Rule(rule) => evaluate_rule(rule, ctx),
        PolicyNode::Set(set) => evaluate_set(set, ctx),
    };
    debug!(node = %node.id(), decision = %outcome.decision, "evaluated policy node");
    outcome
}

fn evaluate_rule<'p>(rule: &'p Rule, ctx: &mut EvaluationContext<'_>) -> Outcome<'p> {
    let extent = Extent::from(rule.effect);

    for expr in [&rule.target, &rule.condition].into_iter().flatten() {
        match expr.evaluate(ctx) {
            Ok(true) => {}
            Ok(false) => return Outcome::not_applicable(),
            Err(reason) => return Outcome::indeterminate(extent, reason),
        }
    }

    let obligations = rule
        .obligations
        .iter()
        .filter(|o| o.fulfill_on == rule.effect)
        .collect();
    Outcome::new(rule.effect.into(), obligations)
}

fn evaluate_set<'p>(set: &'p PolicySet, ctx: &mut EvaluationContext<'_>) -> Outcome<'p> {
    if let Some(target) = &set.target {
        match target.evaluate(ctx) {
            Ok(true) => {}
            Ok(false) => return Outcome::not_applicable(),
            Err(reason) => {
                // The set can only fail towards effects its subtree can produce.
                return match set.possible_effects() {
                    Some(extent) => Outcome::indeterminate(extent, reason),
                    None => Outcome::not_applicable(),
                };
            }
        }
    }

    let children = set.children.iter().map(|child| evaluate_node(child, ctx));
    let mut outcome = combine(set.algorithm, &set.id, children);

    if let Some(effect) = outcome.decision.effect() {
        outcome
            .obligations
            .extend(set.obligations.iter().filter(|o| o.fulfill_on == effect));
    }
    outcome
}

// ============================================================================
// Tests
// ============================================================================
