//! Combining algorithms.
//!
//! Each algorithm is a reduction over the outcomes of a set's children,
//! consumed lazily and in declaration order. Pulling an outcome from the
//! iterator is what evaluates the child, so an algorithm that returns early
//! leaves the remaining children unevaluated.
//!
//! Indeterminate outcomes carry an [`Extent`] so that a failure which could
//! only ever have produced the losing effect does not block the winning one.

use crate::decision::{Decision, Extent, IndeterminateReason};
use crate::policy::{CombiningAlgorithm, Effect, Obligation};

/// A decision together with the obligations that contributed to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<'p> {
    pub decision: Decision,
    pub obligations: Vec<&'p Obligation>,
}

impl<'p> Outcome<'p> {
    pub fn new(decision: Decision, obligations: Vec<&'p Obligation>) -> Self {
        Self {
            decision,
            obligations,
        }
    }

    pub fn not_applicable() -> Self {
        Self::new(Decision::NotApplicable, Vec::new())
    }

    pub fn indeterminate(extent: Extent, reason: IndeterminateReason) -> Self {
        Self::new(Decision::indeterminate(extent, reason), Vec::new())
    }
}

/// Combines child outcomes with `algorithm`.
///
/// `policy` is the id of the combining set, used in ambiguity reasons.
pub fn combine<'p>(
    algorithm: CombiningAlgorithm,
    policy: &str,
    children: impl Iterator<Item = Outcome<'p>>,
) -> Outcome<'p> {
    match algorithm {
        CombiningAlgorithm::DenyOverrides => overrides(Effect::Deny, children),
        CombiningAlgorithm::PermitOverrides => overrides(Effect::Permit, children),
        CombiningAlgorithm::FirstApplicable => first_applicable(children),
        CombiningAlgorithm::OnlyOneApplicable => only_one_applicable(policy, children),
        CombiningAlgorithm::DenyUnlessPermit => unless(Effect::Permit, children),
        CombiningAlgorithm::PermitUnlessDeny => unless(Effect::Deny, children),
    }
}

/// Deny-overrides (`winner = Deny`) and permit-overrides (`winner = Permit`).
///
/// The first `winner` decision ends evaluation. Otherwise, in order:
/// an indeterminate that could have been either effect, or one that could
/// have been `winner` next to a `loser` decision or loser-leaning failure,
/// yields Indeterminate{PermitOrDeny}; a winner-leaning failure alone yields
/// Indeterminate{winner}; any `loser` decision yields `loser`; a
/// loser-leaning failure yields Indeterminate{loser}; else NotApplicable.
fn overrides<'p>(winner: Effect, children: impl Iterator<Item = Outcome<'p>>) -> Outcome<'p> {
    let loser = winner.opposite();

    let mut saw_loser = false;
    let mut loser_obligations = Vec::new();
    let mut leaning_winner: Option<IndeterminateReason> = None;
    let mut leaning_loser: Option<IndeterminateReason> = None;
    let mut leaning_both: Option<IndeterminateReason> = None;

    for outcome in children {
        match outcome.decision {
            Decision::NotApplicable => {}
            Decision::Indeterminate(indeterminate) => {
                let slot = match indeterminate.extent {
                    Extent::PermitOrDeny => &mut leaning_both,
                    extent if extent == Extent::from(winner) => &mut leaning_winner,
                    _ => &mut leaning_loser,
                };
                if slot.is_none() {
                    *slot = Some(indeterminate.reason);
                }
            }
            decision if decision.effect() == Some(winner) => {
                return Outcome::new(decision, outcome.obligations);
            }
            _ => {
                saw_loser = true;
                loser_obligations.extend(outcome.obligations);
            }
        }
    }

    if let Some(reason) = leaning_both {
        return Outcome::indeterminate(Extent::PermitOrDeny, reason);
    }
    if let Some(reason) = leaning_winner {
        let extent = if saw_loser || leaning_loser.is_some() {
            Extent::PermitOrDeny
        } else {
            Extent::from(winner)
        };
        return Outcome::indeterminate(extent, reason);
    }
    if saw_loser {
        return Outcome::new(loser.into(), loser_obligations);
    }
    if let Some(reason) = leaning_loser {
        return Outcome::indeterminate(Extent::from(loser), reason);
    }
    Outcome::not_applicable()
}

/// Returns the first outcome that is not NotApplicable, unchanged.
fn first_applicable<'p>(mut children: impl Iterator<Item = Outcome<'p>>) -> Outcome<'p> {
    children
        .find(|outcome| !outcome.decision.is_not_applicable())
        .unwrap_or_else(Outcome::not_applicable)
}

/// Evaluates every child. Exactly one applicable child decides; more than
/// one is an authoring ambiguity.
fn only_one_applicable<'p>(
    policy: &str,
    children: impl Iterator<Item = Outcome<'p>>,
) -> Outcome<'p> {
    let mut first: Option<Outcome<'p>> = None;
    let mut extent: Option<Extent> = None;
    let mut count = 0usize;

    for outcome in children {
        let child_extent = match &outcome.decision {
            Decision::NotApplicable => continue,
            Decision::Permit => Extent::Permit,
            Decision::Deny => Extent::Deny,
            Decision::Indeterminate(indeterminate) => indeterminate.extent,
        };
        count += 1;
        extent = Some(extent.map_or(child_extent, |e| e.union(child_extent)));
        if first.is_none() {
            first = Some(outcome);
        }
    }

    match (first, extent) {
        (Some(outcome), _) if count == 1 => outcome,
        (Some(_), Some(extent)) => Outcome::indeterminate(
            extent,
            IndeterminateReason::MultipleApplicable {
                policy: policy.to_string(),
            },
        ),
        _ => Outcome::not_applicable(),
    }
}

/// Deny-unless-permit (`winner = Permit`) and permit-unless-deny
/// (`winner = Deny`). Never NotApplicable or Indeterminate.
fn unless<'p>(winner: Effect, children: impl Iterator<Item = Outcome<'p>>) -> Outcome<'p> {
    let mut loser_obligations = Vec::new();

    for outcome in children {
        match outcome.decision.effect() {
            Some(effect) if effect == winner => {
                return Outcome::new(winner.into(), outcome.obligations);
            }
            Some(_) => loser_obligations.extend(outcome.obligations),
            None => {}
        }
    }

    Outcome::new(winner.opposite().into(), loser_obligations)
}

// ============================================================================
// Tests
// ============================================================================
