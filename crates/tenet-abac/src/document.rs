//! JSON policy and request documents.
//!
//! The engine has no required persistence format; these documents are the
//! format the `tenet` CLI reads and a convenient one for embedding
//! applications. A policy document carries its own attribute declarations,
//! and request attributes are typed by looking them up there.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attributes::{
    AttributeCatalog, AttributeCategory, AttributeId, AttributeType, AttributeValue, Bag,
    Multiplicity, Value,
};
use crate::pdp::{Pdp, PdpOptions};
use crate::policy::PolicyNode;
use crate::request::Request;
use crate::validate::PolicyError;

/// Errors raised while reading documents.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// A request names an attribute the policy document does not declare.
    #[error("unknown attribute '{category}.{name}'")]
    UnknownAttribute {
        category: AttributeCategory,
        name: String,
    },

    /// A request binds an identifier that comes from its own fields, such
    /// as `subject.id`.
    #[error("'{0}' is set by the request itself and cannot be bound")]
    ReservedAttribute(String),

    /// A request value does not fit the attribute's declaration.
    #[error("'{attribute}' expects {expected}, found {found}")]
    InvalidValue {
        attribute: String,
        expected: String,
        found: String,
    },
}

fn read(path: &Path) -> Result<String, DocumentError> {
    fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.display().to_string(),
        source,
    })
}

// ============================================================================
// Policy document
// ============================================================================

/// A policy tree with the attribute declarations it references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default)]
    pub attributes: Vec<AttributeId>,
    pub policy: PolicyNode,
}

impl PolicyDocument {
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        Self::from_json(&read(path)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Builds the catalog from the declarations.
    pub fn catalog(&self) -> Result<AttributeCatalog, PolicyError> {
        AttributeCatalog::from_declarations(self.attributes.iter().cloned())
    }

    /// Validates the document and builds a PDP from it.
    pub fn into_pdp(self, options: PdpOptions) -> Result<Pdp, PolicyError> {
        let catalog = self.catalog()?;
        Pdp::with_options(self.policy, catalog, options)
    }
}

// ============================================================================
// Request document
// ============================================================================

/// One attribute binding in a request document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestAttribute {
    pub category: AttributeCategory,
    pub name: String,
    pub value: serde_json::Value,
}

/// A request in JSON form.
///
/// Values are untyped JSON; [`RequestDocument::into_request`] types them
/// against a catalog. Bag-valued attributes take arrays; a lone scalar is
/// accepted as a bag of one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDocument {
    pub subject: String,
    pub action: String,
    pub resource: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attributes: Vec<RequestAttribute>,
}

impl RequestDocument {
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        Self::from_json(&read(path)?)
    }

    /// Resolves attribute names against `catalog` and builds the request.
    pub fn into_request(self, catalog: &AttributeCatalog) -> Result<Request, DocumentError> {
        let mut bindings = Vec::with_capacity(self.attributes.len());
        for attribute in &self.attributes {
            let id = catalog
                .get(attribute.category, &attribute.name)
                .ok_or_else(|| DocumentError::UnknownAttribute {
                    category: attribute.category,
                    name: attribute.name.clone(),
                })?;
            if id.is_builtin() {
                return Err(DocumentError::ReservedAttribute(id.to_string()));
            }
            bindings.push((id.clone(), typed_value(id, &attribute.value)?));
        }

        let mut request =
            Request::new(&self.subject, &self.action, &self.resource).with_all(bindings);
        if let Some(timestamp) = self.timestamp {
            request = request.at(timestamp);
        }
        Ok(request)
    }
}

fn typed_value(id: &AttributeId, json: &serde_json::Value) -> Result<AttributeValue, DocumentError> {
    match (id.multiplicity, json) {
        (Multiplicity::Bag, serde_json::Value::Array(items)) => {
            let values = items
                .iter()
                .map(|item| typed_scalar(id, item))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(AttributeValue::Bag(Bag::new(values)))
        }
        (Multiplicity::Bag, scalar) => Ok(AttributeValue::Bag(Bag::new([typed_scalar(id, scalar)?]))),
        (Multiplicity::Single, serde_json::Value::Array(_)) => Err(DocumentError::InvalidValue {
            attribute: id.to_string(),
            expected: format!("a single {}", id.value_type),
            found: "an array".to_string(),
        }),
        (Multiplicity::Single, scalar) => Ok(AttributeValue::Simple(typed_scalar(id, scalar)?)),
    }
}

fn typed_scalar(id: &AttributeId, json: &serde_json::Value) -> Result<Value, DocumentError> {
    use serde_json::Value as Json;

    let value = match (id.value_type, json) {
        (AttributeType::Boolean, Json::Bool(b)) => Some(Value::Boolean(*b)),
        (AttributeType::String, Json::String(s)) => Some(Value::String(s.clone())),
        (AttributeType::Integer, Json::Number(n)) => n.as_i64().map(Value::Integer),
        (AttributeType::Double, Json::Number(n)) => n.as_f64().map(Value::Double),
        (AttributeType::DateTime, Json::String(s)) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| Value::DateTime(dt.with_timezone(&Utc))),
        _ => None,
    };
    value.ok_or_else(|| DocumentError::InvalidValue {
        attribute: id.to_string(),
        expected: id.value_type.to_string(),
        found: json.to_string(),
    })
}
