#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tenet_abac::attributes::{AttributeCategory, AttributeType, Multiplicity};
use tenet_abac::expression::{CompareOp, Expression, Function};
use tenet_abac::policy::{AttributeAssignment, PolicySet, Rule};
use tenet_abac::{
    AttributeCatalog, AttributeId, AttributeValue, CombiningAlgorithm, IndeterminateReason, Pdp,
    PdpOptions, PolicyNode, Request, Response,
};

// ============================================================================
// Attributes
// ============================================================================

fn role() -> AttributeId {
    AttributeId::new(AttributeCategory::Subject, "role", AttributeType::String, Multiplicity::Bag)
}

fn level() -> AttributeId {
    AttributeId::new(AttributeCategory::Subject, "level", AttributeType::Integer, Multiplicity::Single)
}

fn score() -> AttributeId {
    AttributeId::new(AttributeCategory::Resource, "score", AttributeType::Double, Multiplicity::Single)
}

fn owner() -> AttributeId {
    AttributeId::new(AttributeCategory::Resource, "owner", AttributeType::String, Multiplicity::Single)
}

fn flag() -> AttributeId {
    AttributeId::new(AttributeCategory::Environment, "flag", AttributeType::Boolean, Multiplicity::Single)
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum FuzzAttribute {
    Role,
    Level,
    Score,
    Owner,
    Flag,
    SubjectId,
    ActionId,
}

impl FuzzAttribute {
    fn id(self) -> AttributeId {
        match self {
            Self::Role => role(),
            Self::Level => level(),
            Self::Score => score(),
            Self::Owner => owner(),
            Self::Flag => flag(),
            Self::SubjectId => AttributeId::subject_id(),
            Self::ActionId => AttributeId::action_id(),
        }
    }
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, Copy, Arbitrary)]
enum FuzzOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
}

impl From<FuzzOp> for CompareOp {
    fn from(op: FuzzOp) -> Self {
        match op {
            FuzzOp::Eq => CompareOp::Eq,
            FuzzOp::Ne => CompareOp::Ne,
            FuzzOp::Lt => CompareOp::Lt,
            FuzzOp::Le => CompareOp::Le,
            FuzzOp::Gt => CompareOp::Gt,
            FuzzOp::Ge => CompareOp::Ge,
            FuzzOp::In => CompareOp::In,
        }
    }
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum FuzzBinary {
    Add,
    Subtract,
    Multiply,
    Divide,
    StartsWith,
    EndsWith,
    Glob,
    Intersects,
}

impl From<FuzzBinary> for Function {
    fn from(f: FuzzBinary) -> Self {
        match f {
            FuzzBinary::Add => Function::Add,
            FuzzBinary::Subtract => Function::Subtract,
            FuzzBinary::Multiply => Function::Multiply,
            FuzzBinary::Divide => Function::Divide,
            FuzzBinary::StartsWith => Function::StartsWith,
            FuzzBinary::EndsWith => Function::EndsWith,
            FuzzBinary::Glob => Function::Glob,
            FuzzBinary::Intersects => Function::Intersects,
        }
    }
}

/// Fuzzer-friendly expression.
///
/// Every shape maps onto an expression that passes load-time validation;
/// type errors are left in so evaluation exercises Indeterminate paths.
#[derive(Debug, Clone, Arbitrary)]
enum FuzzExpr {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Bag(Vec<String>),
    Attribute(FuzzAttribute),
    Compare(FuzzOp, Box<FuzzExpr>, Box<FuzzExpr>),
    And(Vec<FuzzExpr>),
    Or(Vec<FuzzExpr>),
    Not(Box<FuzzExpr>),
    Binary(FuzzBinary, Box<FuzzExpr>, Box<FuzzExpr>),
    Size(Box<FuzzExpr>),
    IsPresent(FuzzAttribute),
}

impl FuzzExpr {
    /// **Depth limiting:** nesting is cut at depth 4 to keep the stack small.
    fn to_expression(&self, depth: u8) -> Expression {
        if depth > 4 {
            return Expression::literal(true);
        }
        let sub = |e: &FuzzExpr| e.to_expression(depth + 1);

        match self {
            Self::Bool(b) => Expression::literal(*b),
            Self::Int(i) => Expression::literal(*i),
            Self::Double(d) => Expression::literal(*d),
            Self::Str(s) => Expression::literal(s.as_str()),
            Self::Bag(values) => Expression::bag(values.iter().map(String::as_str)),
            Self::Attribute(a) => Expression::attribute(&a.id()),
            Self::Compare(op, l, r) => Expression::compare((*op).into(), sub(l), sub(r)),
            Self::And(operands) => Expression::and(operands.iter().take(4).map(sub)),
            Self::Or(operands) => Expression::or(operands.iter().take(4).map(sub)),
            Self::Not(e) => Expression::negate(sub(e)),
            Self::Binary(f, l, r) => Expression::call((*f).into(), [sub(l), sub(r)]),
            Self::Size(e) => Expression::call(Function::Size, [sub(e)]),
            Self::IsPresent(a) => {
                Expression::call(Function::IsPresent, [Expression::attribute(&a.id())])
            }
        }
    }
}

// ============================================================================
// Policy tree
// ============================================================================

#[derive(Debug, Clone, Copy, Arbitrary)]
enum FuzzAlgorithm {
    DenyOverrides,
    PermitOverrides,
    FirstApplicable,
    OnlyOneApplicable,
    DenyUnlessPermit,
    PermitUnlessDeny,
}

impl From<FuzzAlgorithm> for CombiningAlgorithm {
    fn from(a: FuzzAlgorithm) -> Self {
        match a {
            FuzzAlgorithm::DenyOverrides => CombiningAlgorithm::DenyOverrides,
            FuzzAlgorithm::PermitOverrides => CombiningAlgorithm::PermitOverrides,
            FuzzAlgorithm::FirstApplicable => CombiningAlgorithm::FirstApplicable,
            FuzzAlgorithm::OnlyOneApplicable => CombiningAlgorithm::OnlyOneApplicable,
            FuzzAlgorithm::DenyUnlessPermit => CombiningAlgorithm::DenyUnlessPermit,
            FuzzAlgorithm::PermitUnlessDeny => CombiningAlgorithm::PermitUnlessDeny,
        }
    }
}

#[derive(Debug, Clone, Arbitrary)]
enum FuzzNode {
    Rule {
        permit: bool,
        target: Option<FuzzExpr>,
        condition: Option<FuzzExpr>,
        obligation: Option<FuzzExpr>,
    },
    Set {
        algorithm: FuzzAlgorithm,
        target: Option<FuzzExpr>,
        children: Vec<FuzzNode>,
    },
}

impl FuzzNode {
    fn to_node(&self, id: String, depth: u8) -> PolicyNode {
        match self {
            Self::Rule {
                permit,
                target,
                condition,
                obligation,
            } => {
                let mut rule = if *permit { Rule::permit(&id) } else { Rule::deny(&id) };
                if let Some(t) = target {
                    rule = rule.with_target(t.to_expression(0));
                }
                if let Some(c) = condition {
                    rule = rule.with_condition(c.to_expression(0));
                }
                if let Some(o) = obligation {
                    rule = rule.with_obligation(
                        "log",
                        vec![AttributeAssignment {
                            name: "value".to_string(),
                            value: o.to_expression(0),
                        }],
                    );
                }
                rule.into()
            }
            Self::Set {
                algorithm,
                target,
                children,
            } => {
                let mut set = PolicySet::new(&id, (*algorithm).into());
                if let Some(t) = target {
                    set = set.with_target(t.to_expression(0));
                }
                if depth < 4 {
                    for (i, child) in children.iter().take(6).enumerate() {
                        set = set.with_child(child.to_node(format!("{id}.{i}"), depth + 1));
                    }
                }
                set.into()
            }
        }
    }
}

#[derive(Debug, Clone, Arbitrary)]
struct FuzzRequest {
    roles: Option<Vec<String>>,
    level: Option<i64>,
    score: Option<f64>,
    owner: Option<String>,
    flag: Option<bool>,
}

impl FuzzRequest {
    fn to_request(&self) -> Request {
        let mut request = Request::new("subject", "action", "resource");
        if let Some(values) = &self.roles {
            request = request.with(&role(), AttributeValue::bag(values.iter().map(String::as_str)));
        }
        if let Some(value) = self.level {
            request = request.with(&level(), AttributeValue::simple(value));
        }
        if let Some(value) = self.score {
            request = request.with(&score(), AttributeValue::simple(value));
        }
        if let Some(value) = &self.owner {
            request = request.with(&owner(), AttributeValue::simple(value.as_str()));
        }
        if let Some(value) = self.flag {
            request = request.with(&flag(), AttributeValue::simple(value));
        }
        request
    }
}

fuzz_target!(|input: (FuzzNode, FuzzRequest)| {
    let (fuzz_node, fuzz_request) = input;

    let catalog = match AttributeCatalog::from_declarations([role(), level(), score(), owner(), flag()]) {
        Ok(catalog) => catalog,
        Err(_) => return,
    };
    let policy = fuzz_node.to_node("root".to_string(), 0);
    let Ok(pdp) = Pdp::with_options(policy.clone(), catalog, PdpOptions::default()) else {
        return;
    };
    let pdp = pdp.without_audit();
    let request = fuzz_request.to_request();

    // Evaluate - should never panic
    let response = pdp.evaluate(&request);

    validate_pdp_invariants(&pdp, &policy, &request, &response);
});

/// Validates evaluator invariants.
///
/// **Invariants checked:**
/// 1. Evaluation is deterministic
/// 2. Evaluation leaves the policy tree unchanged
/// 3. Only Permit and Deny carry obligations
/// 4. A root using an unless algorithm always decides Permit or Deny
fn validate_pdp_invariants(
    pdp: &Pdp,
    policy: &PolicyNode,
    request: &Request,
    response: &Response,
) {
    assert_eq!(
        &pdp.evaluate(request),
        response,
        "Evaluation must be deterministic"
    );

    assert_eq!(pdp.policy(), policy, "Evaluation must not mutate the policy tree");

    if response.decision.effect().is_none() {
        assert!(
            response.obligations.is_empty(),
            "{} must not carry obligations",
            response.decision
        );
    }

    if let PolicyNode::Set(set) = policy {
        let total = matches!(
            set.algorithm,
            CombiningAlgorithm::DenyUnlessPermit | CombiningAlgorithm::PermitUnlessDeny
        );
        if total && set.target.is_none() {
            let obligation_failed = matches!(
                response.decision.reason(),
                Some(IndeterminateReason::ObligationFailed { .. })
            );
            assert!(
                response.decision.effect().is_some() || obligation_failed,
                "Unless algorithms must decide Permit or Deny, got {}",
                response.decision
            );
        }
    }
}
