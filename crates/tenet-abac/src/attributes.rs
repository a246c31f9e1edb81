//! Attribute model for ABAC evaluation.
//!
//! Attributes are identified by a category, a name, a declared value type and
//! a multiplicity. Values are either a single scalar or a bag of scalars.
//! Every identifier a policy references must be declared in an
//! [`AttributeCatalog`] before the policy is loaded.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validate::PolicyError;

// ============================================================================
// Identifiers
// ============================================================================

/// The four attribute categories of an access request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeCategory {
    /// The party requesting access.
    Subject,
    /// The object being accessed.
    Resource,
    /// The operation being performed.
    Action,
    /// Request context that belongs to none of the above.
    Environment,
}

impl Display for AttributeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Subject => "subject",
            Self::Resource => "resource",
            Self::Action => "action",
            Self::Environment => "environment",
        };
        f.write_str(name)
    }
}

/// The declared type of an attribute's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    Boolean,
    String,
    Integer,
    Double,
    DateTime,
}

impl Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Double => "double",
            Self::DateTime => "date-time",
        };
        f.write_str(name)
    }
}

/// Whether an attribute carries one value or a bag of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Multiplicity {
    Single,
    Bag,
}

/// A declared attribute.
///
/// Identifiers are defined at policy-authoring time and never change.
/// Two identifiers are equal only if category, name, type and multiplicity
/// all agree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeId {
    pub category: AttributeCategory,
    pub name: String,
    pub value_type: AttributeType,
    pub multiplicity: Multiplicity,
}

impl AttributeId {
    /// Creates an identifier.
    pub fn new(
        category: AttributeCategory,
        name: &str,
        value_type: AttributeType,
        multiplicity: Multiplicity,
    ) -> Self {
        Self {
            category,
            name: name.to_string(),
            value_type,
            multiplicity,
        }
    }

    /// The primary subject identifier (`subject.id`).
    pub fn subject_id() -> Self {
        Self::new(
            AttributeCategory::Subject,
            "id",
            AttributeType::String,
            Multiplicity::Single,
        )
    }

    /// The primary action identifier (`action.id`).
    pub fn action_id() -> Self {
        Self::new(
            AttributeCategory::Action,
            "id",
            AttributeType::String,
            Multiplicity::Single,
        )
    }

    /// The primary resource identifier (`resource.id`).
    pub fn resource_id() -> Self {
        Self::new(
            AttributeCategory::Resource,
            "id",
            AttributeType::String,
            Multiplicity::Single,
        )
    }

    /// The request timestamp (`environment.current_date_time`).
    pub fn current_date_time() -> Self {
        Self::new(
            AttributeCategory::Environment,
            "current_date_time",
            AttributeType::DateTime,
            Multiplicity::Single,
        )
    }

    /// The four identifiers every catalog declares implicitly.
    pub fn builtins() -> [Self; 4] {
        [
            Self::subject_id(),
            Self::action_id(),
            Self::resource_id(),
            Self::current_date_time(),
        ]
    }

    /// Whether this is one of the [`builtins`](Self::builtins), which only
    /// the request itself may bind.
    pub fn is_builtin(&self) -> bool {
        Self::builtins().iter().any(|builtin| builtin == self)
    }
}

impl Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.category, self.name)
    }
}

// ============================================================================
// Values
// ============================================================================

/// A single typed attribute value.
///
/// `Double` equality compares bit patterns after folding `-0.0` into `0.0`,
/// so `Value` can be `Eq` and `Hash`: the two zeros are equal and `NaN`
/// equals itself. Ordering uses IEEE total ordering on the same folded value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Boolean(bool),
    String(String),
    Integer(i64),
    Double(f64),
    DateTime(DateTime<Utc>),
}

impl Value {
    /// The type of this value.
    pub fn value_type(&self) -> AttributeType {
        match self {
            Value::Boolean(_) => AttributeType::Boolean,
            Value::String(_) => AttributeType::String,
            Value::Integer(_) => AttributeType::Integer,
            Value::Double(_) => AttributeType::Double,
            Value::DateTime(_) => AttributeType::DateTime,
        }
    }

    /// Returns the value as a string slice, if it is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Compares two values for ordering.
    ///
    /// Values of different types, and booleans, are incomparable and
    /// return `None`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Double(a), Value::Double(b)) => Some(fold_zero(*a).total_cmp(&fold_zero(*b))),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

fn fold_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => fold_zero(*a).to_bits() == fold_zero(*b).to_bits(),
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Boolean(v) => v.hash(state),
            Value::String(v) => v.hash(state),
            Value::Integer(v) => v.hash(state),
            Value::Double(v) => fold_zero(*v).to_bits().hash(state),
            Value::DateTime(v) => v.hash(state),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "\"{v}\""),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

/// A multi-valued attribute value.
///
/// Unordered bags compare as multisets; two ordered bags compare
/// element-by-element.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bag {
    values: Vec<Value>,
    #[serde(default)]
    ordered: bool,
}

impl Bag {
    /// Creates an unordered bag.
    pub fn new(values: impl IntoIterator<Item = Value>) -> Self {
        Self {
            values: values.into_iter().collect(),
            ordered: false,
        }
    }

    /// Creates an ordered bag.
    pub fn ordered(values: impl IntoIterator<Item = Value>) -> Self {
        Self {
            values: values.into_iter().collect(),
            ordered: true,
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.values.contains(value)
    }

    /// Every value of `self` also occurs in `other`.
    pub fn is_subset_of(&self, other: &Bag) -> bool {
        self.values.iter().all(|v| other.contains(v))
    }

    /// At least one value occurs in both bags.
    pub fn intersects(&self, other: &Bag) -> bool {
        self.values.iter().any(|v| other.contains(v))
    }

    /// The element type, or `None` for an empty bag.
    pub fn element_type(&self) -> Option<AttributeType> {
        self.values.first().map(Value::value_type)
    }

    /// All elements share one type.
    pub fn is_homogeneous(&self) -> bool {
        match self.element_type() {
            Some(ty) => self.values.iter().all(|v| v.value_type() == ty),
            None => true,
        }
    }

    fn occurrences(&self, value: &Value) -> usize {
        self.values.iter().filter(|v| *v == value).count()
    }
}

impl PartialEq for Bag {
    fn eq(&self, other: &Self) -> bool {
        if self.values.len() != other.values.len() {
            return false;
        }
        if self.ordered && other.ordered {
            return self.values == other.values;
        }
        self.values
            .iter()
            .all(|v| self.occurrences(v) == other.occurrences(v))
    }
}

impl Eq for Bag {}

/// The value bound to an attribute: a single scalar or a bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeValue {
    Simple(Value),
    Bag(Bag),
}

impl AttributeValue {
    /// Wraps a single value.
    pub fn simple(value: impl Into<Value>) -> Self {
        AttributeValue::Simple(value.into())
    }

    /// Builds an unordered bag.
    pub fn bag<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        AttributeValue::Bag(Bag::new(values.into_iter().map(Into::into)))
    }

    /// Checks type and multiplicity against a declaration.
    ///
    /// Empty bags conform to any bag-valued declaration.
    pub fn conforms_to(&self, attribute: &AttributeId) -> bool {
        match (self, attribute.multiplicity) {
            (AttributeValue::Simple(v), Multiplicity::Single) => {
                v.value_type() == attribute.value_type
            }
            (AttributeValue::Bag(bag), Multiplicity::Bag) => bag
                .values()
                .iter()
                .all(|v| v.value_type() == attribute.value_type),
            _ => false,
        }
    }

    /// Short description used in indeterminate reasons.
    pub fn describe(&self) -> String {
        match self {
            AttributeValue::Simple(v) => format!("{} {v}", v.value_type()),
            AttributeValue::Bag(bag) => match bag.element_type() {
                Some(ty) => format!("bag of {} {ty}", bag.len()),
                None => "empty bag".to_string(),
            },
        }
    }
}

impl Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Simple(v) => write!(f, "{v}"),
            AttributeValue::Bag(bag) => {
                f.write_str("[")?;
                for (i, v) in bag.values().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<Value> for AttributeValue {
    fn from(v: Value) -> Self {
        AttributeValue::Simple(v)
    }
}

impl From<Bag> for AttributeValue {
    fn from(v: Bag) -> Self {
        AttributeValue::Bag(v)
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// The set of attribute identifiers a policy may reference.
///
/// One typed map covers all four categories. The request's primary
/// identifiers and timestamp are always declared.
#[derive(Debug, Clone)]
pub struct AttributeCatalog {
    attributes: BTreeMap<(AttributeCategory, String), AttributeId>,
}

impl Default for AttributeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeCatalog {
    /// Creates a catalog holding only the built-in identifiers.
    pub fn new() -> Self {
        let attributes = AttributeId::builtins()
            .into_iter()
            .map(|id| ((id.category, id.name.clone()), id))
            .collect();
        Self { attributes }
    }

    /// Builds a catalog from a list of declarations.
    pub fn from_declarations(
        declarations: impl IntoIterator<Item = AttributeId>,
    ) -> Result<Self, PolicyError> {
        let mut catalog = Self::new();
        for id in declarations {
            catalog.insert(id)?;
        }
        Ok(catalog)
    }

    /// Declares an attribute and returns its identifier.
    ///
    /// Re-declaring an identical attribute is a no-op. Re-declaring a name
    /// with a different type or multiplicity is an error.
    pub fn declare(
        &mut self,
        category: AttributeCategory,
        name: &str,
        value_type: AttributeType,
        multiplicity: Multiplicity,
    ) -> Result<AttributeId, PolicyError> {
        let id = AttributeId::new(category, name, value_type, multiplicity);
        self.insert(id.clone())?;
        Ok(id)
    }

    /// Declares an already-built identifier.
    pub fn insert(&mut self, id: AttributeId) -> Result<(), PolicyError> {
        let key = (id.category, id.name.clone());
        match self.attributes.get(&key) {
            Some(existing) if *existing == id => Ok(()),
            Some(existing) => Err(PolicyError::ConflictingDeclaration {
                attribute: id.to_string(),
                existing: format!("{:?} {}", existing.multiplicity, existing.value_type),
                requested: format!("{:?} {}", id.multiplicity, id.value_type),
            }),
            None => {
                self.attributes.insert(key, id);
                Ok(())
            }
        }
    }

    /// Looks up a declaration by category and name.
    pub fn get(&self, category: AttributeCategory, name: &str) -> Option<&AttributeId> {
        self.attributes.get(&(category, name.to_string()))
    }

    /// Whether exactly this identifier is declared.
    pub fn contains(&self, id: &AttributeId) -> bool {
        self.get(id.category, &id.name) == Some(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeId> {
        self.attributes.values()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
