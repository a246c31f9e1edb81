//! The policy decision point.
//!
//! A [`Pdp`] owns one validated policy tree and answers requests against it.
//! It holds no per-request state, so a single instance (or cheap clones of
//! it) can serve any number of threads at once. Each call builds its own
//! attribute cache and drops it on return.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::attributes::{AttributeCatalog, AttributeId, AttributeValue};
use crate::decision::{
    Assignment, Decision, Extent, FulfilledObligation, IndeterminateReason, Response,
};
use crate::evaluator::evaluate_node;
use crate::expression::EvaluationContext;
use crate::policy::{Obligation, PolicyNode};
use crate::request::Request;
use crate::resolver::{AttributeResolver, EmptyResolver, EvaluationStats};
use crate::validate::{PolicyError, validate_policy};

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdpOptions {
    /// Log every final decision at info/warn level.
    pub audit_decisions: bool,
    /// Deepest policy tree accepted at load time.
    pub max_depth: usize,
}

impl Default for PdpOptions {
    fn default() -> Self {
        Self {
            audit_decisions: true,
            max_depth: 64,
        }
    }
}

/// Policy decision point.
#[derive(Clone)]
pub struct Pdp {
    root: Arc<PolicyNode>,
    catalog: Arc<AttributeCatalog>,
    resolver: Arc<dyn AttributeResolver>,
    options: PdpOptions,
}

impl fmt::Debug for Pdp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pdp")
            .field("root", &self.root.id())
            .field("attributes", &self.catalog.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Pdp {
    /// Validates `policy` against `catalog` with default options.
    ///
    /// The resolver defaults to [`EmptyResolver`]: only request bindings are
    /// visible until [`Pdp::with_resolver`] is called.
    pub fn new(policy: PolicyNode, catalog: AttributeCatalog) -> Result<Self, PolicyError> {
        Self::with_options(policy, catalog, PdpOptions::default())
    }

    pub fn with_options(
        policy: PolicyNode,
        catalog: AttributeCatalog,
        options: PdpOptions,
    ) -> Result<Self, PolicyError> {
        validate_policy(&policy, &catalog, options.max_depth)?;
        debug!(
            root = %policy.id(),
            nodes = policy.node_count(),
            depth = policy.depth(),
            "policy loaded"
        );
        Ok(Self {
            root: Arc::new(policy),
            catalog: Arc::new(catalog),
            resolver: Arc::new(EmptyResolver),
            options,
        })
    }

    /// Replaces the attribute resolver (builder pattern).
    pub fn with_resolver(mut self, resolver: Arc<dyn AttributeResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Disables decision audit logging.
    pub fn without_audit(mut self) -> Self {
        self.options.audit_decisions = false;
        self
    }

    pub fn policy(&self) -> &PolicyNode {
        &self.root
    }

    pub fn catalog(&self) -> &AttributeCatalog {
        &self.catalog
    }

    pub fn options(&self) -> &PdpOptions {
        &self.options
    }

    /// Decides a request.
    ///
    /// Never fails: every evaluation problem is reported as
    /// [`Decision::Indeterminate`].
    pub fn evaluate(&self, request: &Request) -> Response {
        self.evaluate_with_stats(request).0
    }

    /// Decides a request and reports what the evaluation cost.
    pub fn evaluate_with_stats(&self, request: &Request) -> (Response, EvaluationStats) {
        let mut ctx = EvaluationContext::new(request, self.resolver.as_ref());
        let outcome = evaluate_node(&self.root, &mut ctx);

        let response = match outcome.decision.effect() {
            Some(effect) => fulfill(outcome.decision, effect.into(), &outcome.obligations, &mut ctx),
            None => Response::bare(outcome.decision),
        };

        let stats = ctx.stats();
        debug!(
            resolver_calls = stats.resolver_calls,
            cache_hits = stats.cache_hits,
            nodes_visited = stats.nodes_visited,
            "evaluation finished"
        );
        if self.options.audit_decisions {
            audit(request, &response);
        }
        (response, stats)
    }

    /// Builds a request from its primary identifiers and bindings, then
    /// decides it.
    pub fn decide(
        &self,
        subject: &str,
        action: &str,
        resource: &str,
        bindings: impl IntoIterator<Item = (AttributeId, AttributeValue)>,
    ) -> Response {
        let request = Request::new(subject, action, resource).with_all(bindings);
        self.evaluate(&request)
    }
}

/// Evaluates obligation assignments for a final Permit or Deny.
fn fulfill(
    decision: Decision,
    extent: Extent,
    obligations: &[&Obligation],
    ctx: &mut EvaluationContext<'_>,
) -> Response {
    let mut fulfilled = Vec::with_capacity(obligations.len());

    for obligation in obligations {
        let mut assignments = Vec::with_capacity(obligation.assignments.len());
        for assignment in &obligation.assignments {
            match assignment.value.evaluate_value(ctx) {
                Ok(value) => assignments.push(Assignment {
                    name: assignment.name.clone(),
                    value,
                }),
                Err(cause) => {
                    return Response::bare(Decision::indeterminate(
                        extent,
                        IndeterminateReason::ObligationFailed {
                            obligation: obligation.id.clone(),
                            cause: Box::new(cause),
                        },
                    ));
                }
            }
        }
        fulfilled.push(FulfilledObligation {
            id: obligation.id.clone(),
            assignments,
        });
    }

    Response::new(decision, fulfilled)
}

fn audit(request: &Request, response: &Response) {
    let subject = request.subject_id();
    let action = request.action_id();
    let resource = request.resource_id();

    match &response.decision {
        Decision::Permit => info!(
            subject = %subject,
            action = %action,
            resource = %resource,
            obligations = response.obligations.len(),
            "Access permitted"
        ),
        Decision::Deny => warn!(
            subject = %subject,
            action = %action,
            resource = %resource,
            obligations = response.obligations.len(),
            "Access denied"
        ),
        Decision::NotApplicable => info!(
            subject = %subject,
            action = %action,
            resource = %resource,
            "No applicable policy"
        ),
        Decision::Indeterminate(indeterminate) => warn!(
            subject = %subject,
            action = %action,
            resource = %resource,
            extent = ?indeterminate.extent,
            reason = %indeterminate.reason,
            "Access decision indeterminate"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{AttributeCategory, AttributeType, Multiplicity, Value};
    use crate::expression::Expression;
    use crate::policy::{CombiningAlgorithm, Effect, PolicySet, Rule};
    use crate::resolver::StaticResolver;

    fn department() -> AttributeId {
        AttributeId::new(
            AttributeCategory::Subject,
            "department",
            AttributeType::String,
            Multiplicity::Single,
        )
    }

    fn catalog() -> AttributeCatalog {
        AttributeCatalog::from_declarations([department()]).unwrap()
    }

    fn policy() -> PolicyNode {
        PolicySet::new("root", CombiningAlgorithm::DenyUnlessPermit)
            .with_child(
                Rule::permit("engineering")
                    .with_condition(Expression::equals(
                        Expression::attribute(&department()),
                        Expression::literal("engineering"),
                    ))
                    .with_obligation(
                        "audit-log",
                        vec![crate::policy::AttributeAssignment {
                            name: "subject".to_string(),
                            value: Expression::attribute(&AttributeId::subject_id()),
                        }],
                    ),
            )
            .into()
    }

    #[test]
    fn test_pdp_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Pdp>();
    }

    #[test]
    fn test_new_rejects_invalid_policy() {
        let err = Pdp::new(policy(), AttributeCatalog::new()).unwrap_err();
        assert!(matches!(err, PolicyError::UndeclaredAttribute { .. }));
    }

    #[test]
    fn test_obligations_are_fulfilled() {
        let pdp = Pdp::new(policy(), catalog()).unwrap().without_audit();
        let response = pdp.decide(
            "alice",
            "read",
            "doc1",
            [(department(), AttributeValue::simple("engineering"))],
        );
        assert_eq!(response.decision, Decision::Permit);
        assert_eq!(
            response.obligations[0].get("subject"),
            Some(&AttributeValue::simple("alice"))
        );
    }

    #[test]
    fn test_failed_obligation_makes_response_indeterminate() {
        let owner = AttributeId::new(
            AttributeCategory::Resource,
            "owner",
            AttributeType::String,
            Multiplicity::Single,
        );
        let catalog = AttributeCatalog::from_declarations([owner.clone()]).unwrap();
        let policy: PolicyNode = Rule::deny("block")
            .with_obligation(
                "notify",
                vec![crate::policy::AttributeAssignment {
                    name: "owner".to_string(),
                    value: Expression::attribute(&owner),
                }],
            )
            .into();
        let pdp = Pdp::new(policy, catalog).unwrap();

        let response = pdp.evaluate(&Request::new("s", "a", "r"));
        assert!(response.obligations.is_empty());
        match response.decision {
            Decision::Indeterminate(indeterminate) => {
                assert_eq!(indeterminate.extent, Extent::Deny);
                assert!(matches!(
                    indeterminate.reason,
                    IndeterminateReason::ObligationFailed { ref obligation, .. } if obligation == "notify"
                ));
            }
            other => panic!("expected indeterminate, got {other}"),
        }
    }

    #[test]
    fn test_resolver_supplies_unbound_attributes() {
        let resolver = StaticResolver::new().with(&department(), Value::from("engineering"));
        let pdp = Pdp::new(policy(), catalog())
            .unwrap()
            .with_resolver(Arc::new(resolver));

        let (response, stats) = pdp.evaluate_with_stats(&Request::new("bob", "read", "doc1"));
        assert_eq!(response.decision, Decision::Permit);
        assert_eq!(stats.resolver_calls, 1);
    }

    #[test]
    fn test_bindings_cannot_impersonate_subject() {
        let policy: PolicyNode = PolicySet::new("root", CombiningAlgorithm::DenyUnlessPermit)
            .with_child(Rule::permit("admin-only").with_condition(Expression::equals(
                Expression::attribute(&AttributeId::subject_id()),
                Expression::literal("admin"),
            )))
            .into();
        let pdp = Pdp::new(policy, AttributeCatalog::new()).unwrap().without_audit();

        let response = pdp.decide(
            "mallory",
            "read",
            "doc1",
            [(AttributeId::subject_id(), AttributeValue::simple("admin"))],
        );
        assert_eq!(response.decision, Decision::Deny);
        assert_eq!(
            pdp.evaluate(&Request::new("admin", "read", "doc1")).decision,
            Decision::Permit
        );
    }

    #[test]
    fn test_not_applicable_has_no_obligations() {
        let policy: PolicyNode = PolicySet::new("root", CombiningAlgorithm::FirstApplicable)
            .with_child(Rule::permit("never").with_target(Expression::literal(false)))
            .with_obligation(crate::policy::Obligation::new("log", Effect::Permit))
            .into();
        let pdp = Pdp::new(policy, AttributeCatalog::new()).unwrap();
        assert_eq!(
            pdp.evaluate(&Request::new("s", "a", "r")),
            Response::bare(Decision::NotApplicable)
        );
    }

    #[test]
    fn test_concurrent_evaluation() {
        let pdp = Pdp::new(policy(), catalog()).unwrap().without_audit();

        std::thread::scope(|scope| {
            for i in 0..4 {
                let pdp = &pdp;
                scope.spawn(move || {
                    let dept = if i % 2 == 0 { "engineering" } else { "sales" };
                    let response = pdp.decide(
                        "user",
                        "read",
                        "doc",
                        [(department(), AttributeValue::simple(dept))],
                    );
                    assert_eq!(response.decision.is_permit(), i % 2 == 0);
                });
            }
        });
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: PdpOptions = serde_json::from_str(r#"{"max_depth": 8}"#).unwrap();
        assert_eq!(options.max_depth, 8);
        assert!(options.audit_decisions);
    }
}
