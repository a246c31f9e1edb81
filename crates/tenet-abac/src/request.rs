//! Access requests.
//!
//! A request names the subject, action and resource being decided on and
//! carries the attribute values the caller already knows. It is immutable
//! once built; one request is evaluated per call.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::attributes::{AttributeId, AttributeValue, Value};

/// An access request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    subject_id: String,
    action_id: String,
    resource_id: String,
    timestamp: DateTime<Utc>,
    bindings: HashMap<AttributeId, AttributeValue>,
}

impl Request {
    /// Creates a request stamped with the current time.
    ///
    /// The primary identifiers are bound to `subject.id`, `action.id` and
    /// `resource.id`; the timestamp to `environment.current_date_time`.
    pub fn new(subject_id: &str, action_id: &str, resource_id: &str) -> Self {
        let mut request = Self {
            subject_id: subject_id.to_string(),
            action_id: action_id.to_string(),
            resource_id: resource_id.to_string(),
            timestamp: Utc::now(),
            bindings: HashMap::new(),
        };
        request.bind_builtins();
        request
    }

    /// Overrides the request timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self.bindings.insert(
            AttributeId::current_date_time(),
            AttributeValue::Simple(Value::DateTime(timestamp)),
        );
        self
    }

    /// Binds a value to an attribute, replacing any earlier binding.
    ///
    /// Built-in identifiers are fixed by [`Request::new`] and [`Request::at`];
    /// bindings for them are ignored.
    pub fn with(mut self, attribute: &AttributeId, value: impl Into<AttributeValue>) -> Self {
        self.bind(attribute.clone(), value.into());
        self
    }

    /// Binds many values at once, with the same rules as [`Request::with`].
    pub fn with_all(
        mut self,
        bindings: impl IntoIterator<Item = (AttributeId, AttributeValue)>,
    ) -> Self {
        for (attribute, value) in bindings {
            self.bind(attribute, value);
        }
        self
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn action_id(&self) -> &str {
        &self.action_id
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The value the caller bound to `attribute`, if any.
    pub fn get(&self, attribute: &AttributeId) -> Option<&AttributeValue> {
        self.bindings.get(attribute)
    }

    /// All bindings, including the built-in identifiers.
    pub fn bindings(&self) -> impl Iterator<Item = (&AttributeId, &AttributeValue)> {
        self.bindings.iter()
    }

    fn bind(&mut self, attribute: AttributeId, value: AttributeValue) {
        if attribute.is_builtin() {
            warn!(attribute = %attribute, "ignoring binding for built-in attribute");
            return;
        }
        self.bindings.insert(attribute, value);
    }

    fn bind_builtins(&mut self) {
        let builtins = [
            (AttributeId::subject_id(), Value::from(self.subject_id.as_str())),
            (AttributeId::action_id(), Value::from(self.action_id.as_str())),
            (AttributeId::resource_id(), Value::from(self.resource_id.as_str())),
            (AttributeId::current_date_time(), Value::DateTime(self.timestamp)),
        ];
        for (id, value) in builtins {
            self.bindings.insert(id, AttributeValue::Simple(value));
        }
    }
}
