//! Attribute resolution.
//!
//! Values the caller did not put in the request are fetched through an
//! [`AttributeResolver`]. The engine never calls the resolver twice for the
//! same attribute within one evaluation: every answer, including "missing"
//! and failures, is memoized in an [`AttributeCache`] that lives only as long
//! as that evaluation.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, trace};

use crate::attributes::{AttributeId, AttributeValue};
use crate::decision::IndeterminateReason;
use crate::request::Request;

/// Error reported by a resolver backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolverError {
    /// The backing store could not be reached.
    #[error("attribute source unavailable: {0}")]
    Unavailable(String),

    /// The backing store answered with something unusable.
    #[error("invalid attribute data: {0}")]
    InvalidData(String),
}

/// Supplies attribute values that are not bound in the request.
///
/// Implementations may be called concurrently by independent evaluations
/// and must be safe for shared use. Any caching across requests, retries or
/// timeouts are the implementation's own business.
pub trait AttributeResolver: Send + Sync {
    /// Returns the value of `attribute` for `request`, `Ok(None)` if it has
    /// none.
    fn resolve(
        &self,
        attribute: &AttributeId,
        request: &Request,
    ) -> Result<Option<AttributeValue>, ResolverError>;
}

/// A resolver that knows nothing; every lookup is missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyResolver;

impl AttributeResolver for EmptyResolver {
    fn resolve(
        &self,
        _attribute: &AttributeId,
        _request: &Request,
    ) -> Result<Option<AttributeValue>, ResolverError> {
        Ok(None)
    }
}

/// A resolver backed by a fixed map.
///
/// Useful for request-independent defaults such as environment settings.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    values: HashMap<AttributeId, AttributeValue>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value (builder pattern).
    pub fn with(mut self, attribute: &AttributeId, value: impl Into<AttributeValue>) -> Self {
        self.values.insert(attribute.clone(), value.into());
        self
    }
}

impl AttributeResolver for StaticResolver {
    fn resolve(
        &self,
        attribute: &AttributeId,
        _request: &Request,
    ) -> Result<Option<AttributeValue>, ResolverError> {
        Ok(self.values.get(attribute).cloned())
    }
}

// ============================================================================
// Per-evaluation cache
// ============================================================================

#[derive(Debug, Clone)]
enum Cached {
    Found(AttributeValue),
    Missing,
    Failed(String),
}

/// Counters collected during one evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationStats {
    /// Calls made to the resolver.
    pub resolver_calls: usize,
    /// Lookups answered from the cache.
    pub cache_hits: usize,
    /// Policy nodes whose evaluation was started.
    pub nodes_visited: usize,
}

/// Memoizes resolver answers for a single evaluation.
#[derive(Debug, Default)]
pub struct AttributeCache {
    entries: HashMap<AttributeId, Cached>,
    stats: EvaluationStats,
}

impl AttributeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up `attribute`: request bindings first, then the cache, then
    /// the resolver.
    ///
    /// The returned value is checked against the attribute's declared type
    /// and multiplicity.
    pub fn lookup(
        &mut self,
        attribute: &AttributeId,
        request: &Request,
        resolver: &dyn AttributeResolver,
    ) -> Result<AttributeValue, IndeterminateReason> {
        if let Some(value) = request.get(attribute) {
            return check_declared(attribute, value.clone());
        }

        if let Some(cached) = self.entries.get(attribute) {
            self.stats.cache_hits += 1;
            trace!(attribute = %attribute, "attribute cache hit");
            return Self::answer(attribute, cached.clone());
        }

        self.stats.resolver_calls += 1;
        let cached = match resolver.resolve(attribute, request) {
            Ok(Some(value)) => Cached::Found(value),
            Ok(None) => Cached::Missing,
            Err(e) => Cached::Failed(e.to_string()),
        };
        debug!(attribute = %attribute, outcome = ?cached, "resolved attribute");
        self.entries.insert(attribute.clone(), cached.clone());
        Self::answer(attribute, cached)
    }

    pub fn stats(&self) -> EvaluationStats {
        self.stats
    }

    pub(crate) fn record_node(&mut self) {
        self.stats.nodes_visited += 1;
    }

    fn answer(attribute: &AttributeId, cached: Cached) -> Result<AttributeValue, IndeterminateReason> {
        match cached {
            Cached::Found(value) => check_declared(attribute, value),
            Cached::Missing => Err(IndeterminateReason::MissingAttribute {
                attribute: attribute.to_string(),
            }),
            Cached::Failed(message) => Err(IndeterminateReason::ResolverFailure {
                attribute: attribute.to_string(),
                message,
            }),
        }
    }
}

fn check_declared(
    attribute: &AttributeId,
    value: AttributeValue,
) -> Result<AttributeValue, IndeterminateReason> {
    if value.conforms_to(attribute) {
        Ok(value)
    } else {
        Err(IndeterminateReason::TypeMismatch(format!(
            "'{attribute}' is declared {:?} {} but resolved to {}",
            attribute.multiplicity,
            attribute.value_type,
            value.describe()
        )))
    }
}
