//! Expression trees.
//!
//! Targets, conditions and obligation assignments are all [`Expression`]s.
//! Boolean evaluation is three-valued: an expression is true, false, or
//! indeterminate with a reason. `And` and `Or` follow Kleene logic and stop
//! at the first operand that settles the result, so attributes behind a
//! settled operand are never resolved.

use std::cmp::Ordering;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::attributes::{AttributeId, AttributeValue, Value};
use crate::decision::IndeterminateReason;
use crate::request::Request;
use crate::resolver::{AttributeCache, AttributeResolver, EvaluationStats};

/// Result of evaluating an expression.
pub type EvalResult<T> = Result<T, IndeterminateReason>;

// ============================================================================
// Operators and functions
// ============================================================================

/// Relational operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Scalar membership in a bag, or bag inclusion.
    In,
}

impl Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "in",
        };
        f.write_str(symbol)
    }
}

/// Built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Function {
    Add,
    Subtract,
    Multiply,
    Divide,
    StartsWith,
    EndsWith,
    /// `glob(value, pattern)` with `*` and `?` wildcards.
    Glob,
    /// Number of values in a bag.
    Size,
    /// Two bags share at least one value.
    Intersects,
    /// Whether an attribute has a value. Never indeterminate for a missing
    /// or unresolvable attribute.
    IsPresent,
}

impl Function {
    /// Number of arguments the function takes.
    pub fn arity(self) -> usize {
        match self {
            Self::Size | Self::IsPresent => 1,
            _ => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::Glob => "glob",
            Self::Size => "size",
            Self::Intersects => "intersects",
            Self::IsPresent => "is_present",
        }
    }
}

// ============================================================================
// Expression
// ============================================================================

/// A node of an expression tree.
///
/// Owned by the policy node that declares it and never mutated after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Literal(AttributeValue),
    Attribute(AttributeId),
    Compare {
        op: CompareOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    And(Vec<Expression>),
    Or(Vec<Expression>),
    Not(Box<Expression>),
    Call {
        function: Function,
        args: Vec<Expression>,
    },
}

impl Expression {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(AttributeValue::simple(value))
    }

    /// A literal unordered bag.
    pub fn bag<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Expression::Literal(AttributeValue::bag(values))
    }

    pub fn attribute(id: &AttributeId) -> Self {
        Expression::Attribute(id.clone())
    }

    pub fn compare(op: CompareOp, left: Expression, right: Expression) -> Self {
        Expression::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn equals(left: Expression, right: Expression) -> Self {
        Self::compare(CompareOp::Eq, left, right)
    }

    /// `needle in haystack`.
    pub fn is_in(needle: Expression, haystack: Expression) -> Self {
        Self::compare(CompareOp::In, needle, haystack)
    }

    pub fn and(operands: impl IntoIterator<Item = Expression>) -> Self {
        Expression::And(operands.into_iter().collect())
    }

    pub fn or(operands: impl IntoIterator<Item = Expression>) -> Self {
        Expression::Or(operands.into_iter().collect())
    }

    pub fn negate(operand: Expression) -> Self {
        Expression::Not(Box::new(operand))
    }

    pub fn call(function: Function, args: impl IntoIterator<Item = Expression>) -> Self {
        Expression::Call {
            function,
            args: args.into_iter().collect(),
        }
    }

    /// Every attribute referenced anywhere in the tree, in evaluation order.
    pub fn attributes(&self) -> Vec<&AttributeId> {
        let mut found = Vec::new();
        self.collect_attributes(&mut found);
        found
    }

    fn collect_attributes<'e>(&'e self, found: &mut Vec<&'e AttributeId>) {
        match self {
            Expression::Literal(_) => {}
            Expression::Attribute(id) => found.push(id),
            Expression::Compare { left, right, .. } => {
                left.collect_attributes(found);
                right.collect_attributes(found);
            }
            Expression::And(operands) | Expression::Or(operands) => {
                for operand in operands {
                    operand.collect_attributes(found);
                }
            }
            Expression::Not(operand) => operand.collect_attributes(found),
            Expression::Call { args, .. } => {
                for arg in args {
                    arg.collect_attributes(found);
                }
            }
        }
    }

    /// Evaluates the expression as a boolean.
    pub fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> EvalResult<bool> {
        match self {
            Expression::And(operands) => {
                let mut pending = None;
                for operand in operands {
                    match operand.evaluate(ctx) {
                        Ok(false) => return Ok(false),
                        Ok(true) => {}
                        Err(reason) => {
                            if pending.is_none() {
                                pending = Some(reason);
                            }
                        }
                    }
                }
                pending.map_or(Ok(true), Err)
            }
            Expression::Or(operands) => {
                let mut pending = None;
                for operand in operands {
                    match operand.evaluate(ctx) {
                        Ok(true) => return Ok(true),
                        Ok(false) => {}
                        Err(reason) => {
                            if pending.is_none() {
                                pending = Some(reason);
                            }
                        }
                    }
                }
                pending.map_or(Ok(false), Err)
            }
            Expression::Not(operand) => operand.evaluate(ctx).map(|b| !b),
            _ => truthiness(&self.evaluate_value(ctx)?),
        }
    }

    /// Evaluates the expression to a value.
    pub fn evaluate_value(&self, ctx: &mut EvaluationContext<'_>) -> EvalResult<AttributeValue> {
        match self {
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Attribute(id) => ctx.attribute(id),
            Expression::Compare { op, left, right } => {
                let left = left.evaluate_value(ctx)?;
                let right = right.evaluate_value(ctx)?;
                compare(*op, &left, &right).map(boolean)
            }
            Expression::And(_) | Expression::Or(_) | Expression::Not(_) => {
                self.evaluate(ctx).map(boolean)
            }
            Expression::Call { function, args } => call(*function, args, ctx),
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(value) => write!(f, "{value}"),
            Expression::Attribute(id) => write!(f, "{id}"),
            Expression::Compare { op, left, right } => write!(f, "{left} {op} {right}"),
            Expression::And(operands) => write_joined(f, operands, " and ", "true"),
            Expression::Or(operands) => write_joined(f, operands, " or ", "false"),
            Expression::Not(operand) => write!(f, "not ({operand})"),
            Expression::Call { function, args } => {
                write!(f, "{}(", function.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    operands: &[Expression],
    separator: &str,
    empty: &str,
) -> fmt::Result {
    if operands.is_empty() {
        return f.write_str(empty);
    }
    f.write_str("(")?;
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{operand}")?;
    }
    f.write_str(")")
}

// ============================================================================
// Evaluation context
// ============================================================================

/// Per-evaluation state: the request, the resolver and the attribute cache.
pub struct EvaluationContext<'a> {
    request: &'a Request,
    resolver: &'a dyn AttributeResolver,
    cache: AttributeCache,
}

impl<'a> EvaluationContext<'a> {
    /// Starts an evaluation with an empty cache.
    pub fn new(request: &'a Request, resolver: &'a dyn AttributeResolver) -> Self {
        Self {
            request,
            resolver,
            cache: AttributeCache::new(),
        }
    }

    pub fn request(&self) -> &'a Request {
        self.request
    }

    /// Looks up an attribute through the cache.
    pub fn attribute(&mut self, id: &AttributeId) -> EvalResult<AttributeValue> {
        self.cache.lookup(id, self.request, self.resolver)
    }

    pub fn stats(&self) -> EvaluationStats {
        self.cache.stats()
    }

    pub(crate) fn record_node(&mut self) {
        self.cache.record_node();
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn boolean(b: bool) -> AttributeValue {
    AttributeValue::Simple(Value::Boolean(b))
}

fn mismatch(message: String) -> IndeterminateReason {
    IndeterminateReason::TypeMismatch(message)
}

/// Coerces a value to a boolean.
///
/// Empty bags are false; non-empty bags have no truth value.
fn truthiness(value: &AttributeValue) -> EvalResult<bool> {
    match value {
        AttributeValue::Simple(Value::Boolean(b)) => Ok(*b),
        AttributeValue::Simple(other) => Err(mismatch(format!(
            "expected boolean, found {}",
            other.value_type()
        ))),
        AttributeValue::Bag(bag) if bag.is_empty() => Ok(false),
        AttributeValue::Bag(_) => Err(IndeterminateReason::BagTruthiness(value.describe())),
    }
}

fn compare(op: CompareOp, left: &AttributeValue, right: &AttributeValue) -> EvalResult<bool> {
    let holds: fn(Ordering) -> bool = match op {
        CompareOp::Eq => return equal(left, right),
        CompareOp::Ne => return equal(left, right).map(|eq| !eq),
        CompareOp::In => return contained(left, right),
        CompareOp::Lt => Ordering::is_lt,
        CompareOp::Le => Ordering::is_le,
        CompareOp::Gt => Ordering::is_gt,
        CompareOp::Ge => Ordering::is_ge,
    };
    let incomparable = || {
        mismatch(format!(
            "cannot order {} {op} {}",
            left.describe(),
            right.describe()
        ))
    };
    match (left, right) {
        (AttributeValue::Simple(a), AttributeValue::Simple(b)) => {
            a.compare(b).map(holds).ok_or_else(incomparable)
        }
        _ => Err(incomparable()),
    }
}

fn equal(left: &AttributeValue, right: &AttributeValue) -> EvalResult<bool> {
    match (left, right) {
        (AttributeValue::Simple(a), AttributeValue::Simple(b)) => {
            if a.value_type() != b.value_type() {
                return Err(mismatch(format!(
                    "cannot compare {} with {}",
                    a.value_type(),
                    b.value_type()
                )));
            }
            Ok(a == b)
        }
        (AttributeValue::Bag(a), AttributeValue::Bag(b)) => {
            if let (Some(x), Some(y)) = (a.element_type(), b.element_type()) {
                if x != y {
                    return Err(mismatch(format!("cannot compare bag of {x} with bag of {y}")));
                }
            }
            Ok(a == b)
        }
        _ => Err(mismatch(format!(
            "cannot compare {} with {}; use `in` for membership",
            left.describe(),
            right.describe()
        ))),
    }
}

fn contained(needle: &AttributeValue, haystack: &AttributeValue) -> EvalResult<bool> {
    let AttributeValue::Bag(bag) = haystack else {
        return Err(mismatch(format!(
            "`in` expects a bag on the right, found {}",
            haystack.describe()
        )));
    };
    match needle {
        AttributeValue::Simple(value) => {
            if let Some(ty) = bag.element_type() {
                if ty != value.value_type() {
                    return Err(mismatch(format!(
                        "cannot look for {} in bag of {ty}",
                        value.value_type()
                    )));
                }
            }
            Ok(bag.contains(value))
        }
        AttributeValue::Bag(sub) => {
            if let (Some(x), Some(y)) = (sub.element_type(), bag.element_type()) {
                if x != y {
                    return Err(mismatch(format!("cannot look for bag of {x} in bag of {y}")));
                }
            }
            Ok(sub.is_subset_of(bag))
        }
    }
}

fn call(
    function: Function,
    args: &[Expression],
    ctx: &mut EvaluationContext<'_>,
) -> EvalResult<AttributeValue> {
    if function == Function::IsPresent {
        return is_present(args, ctx).map(boolean);
    }

    let values = args
        .iter()
        .map(|arg| arg.evaluate_value(ctx))
        .collect::<EvalResult<Vec<_>>>()?;
    apply(function, &values)
}

fn is_present(args: &[Expression], ctx: &mut EvaluationContext<'_>) -> EvalResult<bool> {
    let [Expression::Attribute(id)] = args else {
        return Err(mismatch(
            "is_present expects a single attribute reference".to_string(),
        ));
    };
    match ctx.attribute(id) {
        Ok(_) => Ok(true),
        Err(
            IndeterminateReason::MissingAttribute { .. }
            | IndeterminateReason::ResolverFailure { .. },
        ) => Ok(false),
        Err(other) => Err(other),
    }
}

fn apply(function: Function, values: &[AttributeValue]) -> EvalResult<AttributeValue> {
    use AttributeValue::{Bag, Simple};

    match (function, values) {
        (Function::Add, [Simple(a), Simple(b)]) => {
            arithmetic(a, b, "+", i64::checked_add, |x, y| Some(x + y))
        }
        (Function::Subtract, [Simple(a), Simple(b)]) => {
            arithmetic(a, b, "-", i64::checked_sub, |x, y| Some(x - y))
        }
        (Function::Multiply, [Simple(a), Simple(b)]) => {
            arithmetic(a, b, "*", i64::checked_mul, |x, y| Some(x * y))
        }
        (Function::Divide, [Simple(a), Simple(b)]) => {
            arithmetic(a, b, "/", i64::checked_div, |x, y| (y != 0.0).then(|| x / y))
        }
        (Function::StartsWith, [Simple(Value::String(s)), Simple(Value::String(prefix))]) => {
            Ok(boolean(s.starts_with(prefix.as_str())))
        }
        (Function::EndsWith, [Simple(Value::String(s)), Simple(Value::String(suffix))]) => {
            Ok(boolean(s.ends_with(suffix.as_str())))
        }
        (Function::Glob, [Simple(Value::String(s)), Simple(Value::String(pattern))]) => {
            Ok(boolean(glob_matches(pattern, s)))
        }
        (Function::Size, [Bag(bag)]) => i64::try_from(bag.len())
            .map(|n| AttributeValue::Simple(Value::Integer(n)))
            .map_err(|_| IndeterminateReason::Arithmetic("bag size exceeds integer range".to_string())),
        (Function::Intersects, [Bag(a), Bag(b)]) => {
            if let (Some(x), Some(y)) = (a.element_type(), b.element_type()) {
                if x != y {
                    return Err(mismatch(format!("cannot intersect bag of {x} with bag of {y}")));
                }
            }
            Ok(boolean(a.intersects(b)))
        }
        _ => {
            let described: Vec<String> = values.iter().map(AttributeValue::describe).collect();
            Err(mismatch(format!(
                "{} cannot be applied to ({})",
                function.name(),
                described.join(", ")
            )))
        }
    }
}

fn arithmetic(
    a: &Value,
    b: &Value,
    symbol: &str,
    integer: fn(i64, i64) -> Option<i64>,
    double: fn(f64, f64) -> Option<f64>,
) -> EvalResult<AttributeValue> {
    let result = match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => integer(*x, *y).map(Value::Integer),
        (Value::Double(x), Value::Double(y)) => double(*x, *y)
            .filter(|r| r.is_finite())
            .map(Value::Double),
        _ => {
            return Err(mismatch(format!(
                "cannot compute {} {symbol} {}",
                a.value_type(),
                b.value_type()
            )));
        }
    };
    result.map(AttributeValue::Simple).ok_or_else(|| {
        IndeterminateReason::Arithmetic(format!("{a} {symbol} {b} overflows or divides by zero"))
    })
}

/// Glob matching with `*` (any run of characters) and `?` (one character).
///
/// Iterative with single-star backtracking; runs in O(pattern * value).
pub(crate) fn glob_matches(pattern: &str, value: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let value: Vec<char> = value.chars().collect();

    let (mut p, mut v) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while v < value.len() {
        match pattern.get(p).copied() {
            Some('*') => {
                star = Some((p, v));
                p += 1;
            }
            Some(c) if c == '?' || c == value[v] => {
                p += 1;
                v += 1;
            }
            _ => match star {
                Some((star_p, star_v)) => {
                    p = star_p + 1;
                    v = star_v + 1;
                    star = Some((star_p, star_v + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

// ============================================================================
// Tests
// ============================================================================
