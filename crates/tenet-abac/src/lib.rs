//! # tenet-abac: Attribute-Based Access Control decision point
//!
//! Decides access requests against a tree of attribute-based policies.
//! A request names a subject, an action and a resource and carries the
//! attribute values the caller knows; the engine fetches anything else
//! through an [`AttributeResolver`] and answers Permit, Deny, NotApplicable
//! or Indeterminate, with the obligations attached to that answer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Request                                     │
//! │  (subject / action / resource + bindings)    │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Pdp::evaluate                               │
//! │  ├─ Target: cheap applicability filter       │
//! │  ├─ Condition: Kleene three-valued logic     │
//! │  ├─ Combining algorithm per policy set       │
//! │  └─ AttributeCache ──► AttributeResolver     │
//! │       (at most one call per attribute)       │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Response                                    │
//! │  - Decision (Indeterminate carries a reason) │
//! │  - Fulfilled obligations                     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Combining Algorithms
//!
//! - **deny-overrides** / **permit-overrides**, with extended indeterminate
//!   extents
//! - **first-applicable**
//! - **only-one-applicable**
//! - **deny-unless-permit** / **permit-unless-deny**
//!
//! ## Examples
//!
//! ```
//! use tenet_abac::attributes::{AttributeCatalog, AttributeCategory, AttributeType, AttributeValue, Multiplicity};
//! use tenet_abac::expression::Expression;
//! use tenet_abac::policy::{CombiningAlgorithm, PolicySet, Rule};
//! use tenet_abac::{Decision, Pdp};
//!
//! let mut catalog = AttributeCatalog::new();
//! let role = catalog
//!     .declare(AttributeCategory::Subject, "role", AttributeType::String, Multiplicity::Bag)
//!     .unwrap();
//!
//! let policy = PolicySet::new("root", CombiningAlgorithm::DenyUnlessPermit).with_child(
//!     Rule::permit("admins")
//!         .with_condition(Expression::is_in(Expression::literal("admin"), Expression::attribute(&role))),
//! );
//!
//! let pdp = Pdp::new(policy.into(), catalog).unwrap();
//! let response = pdp.decide("alice", "read", "doc1", [(role, AttributeValue::bag(["admin"]))]);
//! assert_eq!(response.decision, Decision::Permit);
//! ```

pub mod attributes;
pub mod combining;
pub mod decision;
pub mod document;
pub mod evaluator;
pub mod expression;
pub mod pdp;
pub mod policy;
pub mod reference;
pub mod request;
pub mod resolver;
pub mod validate;

// Kani proofs for bounded model checking
#[cfg(any(test, kani))]
mod kani_proofs;

pub use attributes::{AttributeCatalog, AttributeId, AttributeValue, Value};
pub use decision::{Decision, Extent, IndeterminateReason, Response};
pub use document::{DocumentError, PolicyDocument, RequestDocument};
pub use pdp::{Pdp, PdpOptions};
pub use policy::{CombiningAlgorithm, Effect, PolicyNode};
pub use request::Request;
pub use resolver::{AttributeResolver, ResolverError};
pub use validate::PolicyError;
