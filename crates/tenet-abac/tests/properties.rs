//! Property tests over randomly shaped policy trees.
//!
//! Rules are built from three kinds of leaf expression: literal true,
//! literal false, and a reference to an attribute no request binds, which
//! evaluates to Indeterminate.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use proptest::prelude::*;
use tenet_abac::attributes::{AttributeCategory, AttributeType, Multiplicity};
use tenet_abac::decision::Extent;
use tenet_abac::expression::Expression;
use tenet_abac::policy::{PolicySet, Rule};
use tenet_abac::{
    AttributeCatalog, AttributeId, AttributeResolver, AttributeValue, CombiningAlgorithm,
    Decision, Effect, Pdp, PolicyNode, Request, ResolverError,
};

// ============================================================================
// Tree generation
// ============================================================================

fn flag() -> AttributeId {
    AttributeId::new(
        AttributeCategory::Subject,
        "flag",
        AttributeType::Boolean,
        Multiplicity::Single,
    )
}

#[derive(Debug, Clone, Copy)]
enum Leaf {
    True,
    False,
    Unknown,
}

impl Leaf {
    fn expression(self) -> Expression {
        match self {
            Leaf::True => Expression::literal(true),
            Leaf::False => Expression::literal(false),
            Leaf::Unknown => Expression::attribute(&flag()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RuleSpec {
    effect: Effect,
    target: Option<Leaf>,
    condition: Option<Leaf>,
}

impl RuleSpec {
    fn not_applicable(effect: Effect) -> Self {
        Self {
            effect,
            target: Some(Leaf::False),
            condition: Some(Leaf::Unknown),
        }
    }

    fn build(self, id: &str, flip: bool) -> Rule {
        let effect = if flip { self.effect.opposite() } else { self.effect };
        let mut rule = Rule::new(id, effect);
        if let Some(target) = self.target {
            rule = rule.with_target(target.expression());
        }
        if let Some(condition) = self.condition {
            rule = rule.with_condition(condition.expression());
        }
        rule
    }
}

fn leaf() -> impl Strategy<Value = Leaf> {
    prop_oneof![Just(Leaf::True), Just(Leaf::False), Just(Leaf::Unknown)]
}

fn effect() -> impl Strategy<Value = Effect> {
    prop_oneof![Just(Effect::Permit), Just(Effect::Deny)]
}

fn rule_spec() -> impl Strategy<Value = RuleSpec> {
    (effect(), proptest::option::of(leaf()), proptest::option::of(leaf())).prop_map(
        |(effect, target, condition)| RuleSpec {
            effect,
            target,
            condition,
        },
    )
}

fn algorithm() -> impl Strategy<Value = CombiningAlgorithm> {
    prop_oneof![
        Just(CombiningAlgorithm::DenyOverrides),
        Just(CombiningAlgorithm::PermitOverrides),
        Just(CombiningAlgorithm::FirstApplicable),
        Just(CombiningAlgorithm::OnlyOneApplicable),
        Just(CombiningAlgorithm::DenyUnlessPermit),
        Just(CombiningAlgorithm::PermitUnlessDeny),
    ]
}

/// Two-level tree: a root set over inner sets of rules.
#[derive(Debug, Clone)]
struct TreeSpec {
    algorithm: CombiningAlgorithm,
    sets: Vec<(CombiningAlgorithm, Vec<RuleSpec>)>,
}

fn tree_spec() -> impl Strategy<Value = TreeSpec> {
    (
        algorithm(),
        prop::collection::vec((algorithm(), prop::collection::vec(rule_spec(), 0..5)), 0..4),
    )
        .prop_map(|(algorithm, sets)| TreeSpec { algorithm, sets })
}

fn mirror(algorithm: CombiningAlgorithm) -> CombiningAlgorithm {
    match algorithm {
        CombiningAlgorithm::DenyOverrides => CombiningAlgorithm::PermitOverrides,
        CombiningAlgorithm::PermitOverrides => CombiningAlgorithm::DenyOverrides,
        CombiningAlgorithm::DenyUnlessPermit => CombiningAlgorithm::PermitUnlessDeny,
        CombiningAlgorithm::PermitUnlessDeny => CombiningAlgorithm::DenyUnlessPermit,
        other => other,
    }
}

fn flat_set(algorithm: CombiningAlgorithm, rules: &[RuleSpec], flip: bool) -> PolicySet {
    rules
        .iter()
        .enumerate()
        .fold(PolicySet::new("set", algorithm), |set, (i, spec)| {
            set.with_child(spec.build(&format!("rule-{i}"), flip))
        })
}

fn build_tree(spec: &TreeSpec, flip: bool) -> PolicyNode {
    let pick = |algorithm| if flip { mirror(algorithm) } else { algorithm };
    spec.sets
        .iter()
        .enumerate()
        .fold(PolicySet::new("root", pick(spec.algorithm)), |root, (i, (algorithm, rules))| {
            let mut inner = flat_set(pick(*algorithm), rules, flip);
            inner.id = format!("set-{i}");
            root.with_child(inner)
        })
        .into()
}

fn pdp(policy: impl Into<PolicyNode>) -> Pdp {
    let catalog = AttributeCatalog::from_declarations([flag()]).expect("catalog");
    Pdp::new(policy.into(), catalog)
        .expect("generated policy is valid")
        .without_audit()
}

fn request() -> Request {
    Request::new("subject", "action", "resource")
}

/// The decision with Indeterminate reasons erased.
fn shape(decision: &Decision) -> (u8, Option<Extent>) {
    match decision {
        Decision::Permit => (0, None),
        Decision::Deny => (1, None),
        Decision::NotApplicable => (2, None),
        Decision::Indeterminate(i) => (3, Some(i.extent)),
    }
}

fn dual_shape(decision: &Decision) -> (u8, Option<Extent>) {
    let swap = |extent| match extent {
        Extent::Permit => Extent::Deny,
        Extent::Deny => Extent::Permit,
        Extent::PermitOrDeny => Extent::PermitOrDeny,
    };
    match shape(decision) {
        (0, None) => (1, None),
        (1, None) => (0, None),
        (tag, extent) => (tag, extent.map(swap)),
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn evaluation_is_deterministic(spec in tree_spec()) {
        let pdp = pdp(build_tree(&spec, false));
        let request = request();

        let first = pdp.evaluate(&request);
        let second = pdp.evaluate(&request);

        prop_assert_eq!(first, second);
    }

    #[test]
    fn evaluation_never_mutates_the_tree(spec in tree_spec()) {
        let policy = build_tree(&spec, false);
        let pdp = pdp(policy.clone());

        let _ = pdp.evaluate(&request());

        prop_assert_eq!(pdp.policy(), &policy);
    }

    #[test]
    fn deny_overrides_ignores_child_order(rules in prop::collection::vec(rule_spec(), 0..6)) {
        let forward = pdp(flat_set(CombiningAlgorithm::DenyOverrides, &rules, false));
        let reversed: Vec<RuleSpec> = rules.iter().rev().copied().collect();
        let backward = pdp(flat_set(CombiningAlgorithm::DenyOverrides, &reversed, false));

        let a = forward.evaluate(&request()).decision;
        let b = backward.evaluate(&request()).decision;

        prop_assert_eq!(shape(&a), shape(&b));
    }

    #[test]
    fn deny_overrides_denies_when_any_rule_denies(rules in prop::collection::vec(rule_spec(), 1..6)) {
        let any_deny = rules
            .iter()
            .any(|spec| pdp(spec.build("r", false)).evaluate(&request()).decision == Decision::Deny);

        let decision = pdp(flat_set(CombiningAlgorithm::DenyOverrides, &rules, false))
            .evaluate(&request())
            .decision;

        if any_deny {
            prop_assert_eq!(decision, Decision::Deny);
        }
    }

    #[test]
    fn permit_overrides_is_dual_of_deny_overrides(spec in tree_spec()) {
        let original = pdp(build_tree(&spec, false)).evaluate(&request()).decision;
        let flipped = pdp(build_tree(&spec, true)).evaluate(&request()).decision;

        prop_assert_eq!(dual_shape(&original), shape(&flipped));
    }

    #[test]
    fn first_applicable_skips_inserted_not_applicable_children(
        rules in prop::collection::vec(rule_spec(), 0..5),
        inserts in prop::collection::vec((0usize..6, effect()), 0..4),
    ) {
        let mut padded = rules.clone();
        for (position, effect) in inserts {
            let at = position.min(padded.len());
            padded.insert(at, RuleSpec::not_applicable(effect));
        }

        let base = pdp(flat_set(CombiningAlgorithm::FirstApplicable, &rules, false));
        let with_na = pdp(flat_set(CombiningAlgorithm::FirstApplicable, &padded, false));

        prop_assert_eq!(base.evaluate(&request()), with_na.evaluate(&request()));
    }

    #[test]
    fn false_targets_never_reach_the_resolver(
        effects in prop::collection::vec(effect(), 1..6),
        algorithm in algorithm(),
    ) {
        let rules: Vec<RuleSpec> = effects.into_iter().map(RuleSpec::not_applicable).collect();
        let resolver = Arc::new(CountingResolver::default());
        let pdp = pdp(flat_set(algorithm, &rules, false)).with_resolver(resolver.clone());

        let (_, stats) = pdp.evaluate_with_stats(&request());

        prop_assert_eq!(stats.resolver_calls, 0);
        prop_assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn resolver_is_called_at_most_once_per_attribute(spec in tree_spec()) {
        let resolver = Arc::new(CountingResolver::default());
        let pdp = pdp(build_tree(&spec, false)).with_resolver(resolver.clone());

        let _ = pdp.evaluate(&request());

        prop_assert!(resolver.calls.load(Ordering::SeqCst) <= 1);
    }
}

#[derive(Debug, Default)]
struct CountingResolver {
    calls: AtomicUsize,
}

impl AttributeResolver for CountingResolver {
    fn resolve(
        &self,
        _attribute: &AttributeId,
        _request: &Request,
    ) -> Result<Option<AttributeValue>, ResolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }
}

#[test]
fn only_one_applicable_with_two_matches_is_a_policy_ambiguity() {
    let rules = [
        RuleSpec {
            effect: Effect::Permit,
            target: None,
            condition: None,
        },
        RuleSpec {
            effect: Effect::Deny,
            target: Some(Leaf::True),
            condition: None,
        },
    ];

    let decision = pdp(flat_set(CombiningAlgorithm::OnlyOneApplicable, &rules, false))
        .evaluate(&request())
        .decision;

    let reason = decision.reason().expect("indeterminate");
    assert!(reason.is_policy_ambiguity());
}
