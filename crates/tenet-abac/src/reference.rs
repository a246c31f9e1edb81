//! Reference policies.
//!
//! [`edocs`] is a document-management policy for a multi-tenant e-document
//! service: helpdesk staff of the provider tenant may view documents of the
//! tenants they are assigned to, unless the document is confidential. Every
//! other request is denied.

/// The e-document policy and its attributes.
pub mod edocs {
    use crate::attributes::{
        AttributeCatalog, AttributeCategory, AttributeId, AttributeType, AttributeValue,
        Multiplicity,
    };
    use crate::document::PolicyDocument;
    use crate::expression::Expression;
    use crate::pdp::{Pdp, PdpOptions};
    use crate::policy::{AttributeAssignment, CombiningAlgorithm, PolicyNode, PolicySet, Rule};
    use crate::request::Request;
    use crate::validate::PolicyError;

    fn subject_bag(name: &str) -> AttributeId {
        AttributeId::new(
            AttributeCategory::Subject,
            name,
            AttributeType::String,
            Multiplicity::Bag,
        )
    }

    fn resource(name: &str, value_type: AttributeType) -> AttributeId {
        AttributeId::new(
            AttributeCategory::Resource,
            name,
            value_type,
            Multiplicity::Single,
        )
    }

    pub fn role() -> AttributeId {
        subject_bag("role")
    }

    pub fn tenant_name() -> AttributeId {
        subject_bag("tenant_name")
    }

    pub fn tenant_type() -> AttributeId {
        subject_bag("tenant_type")
    }

    pub fn assigned_tenants() -> AttributeId {
        subject_bag("assigned_tenants")
    }

    pub fn resource_type() -> AttributeId {
        resource("type_", AttributeType::String)
    }

    pub fn owning_tenant() -> AttributeId {
        resource("owning_tenant", AttributeType::String)
    }

    pub fn confidential() -> AttributeId {
        resource("confidential", AttributeType::Boolean)
    }

    /// All attributes the policy declares.
    pub fn attributes() -> Vec<AttributeId> {
        vec![
            role(),
            tenant_name(),
            tenant_type(),
            assigned_tenants(),
            resource_type(),
            owning_tenant(),
            confidential(),
        ]
    }

    pub fn catalog() -> Result<AttributeCatalog, PolicyError> {
        AttributeCatalog::from_declarations(attributes())
    }

    /// The policy tree.
    pub fn policy() -> PolicyNode {
        let helpdesk = PolicySet::new("helpdesk", CombiningAlgorithm::DenyOverrides)
            .with_target(Expression::and([
                Expression::is_in(Expression::literal("helpdesk"), Expression::attribute(&role())),
                Expression::is_in(
                    Expression::literal("provider"),
                    Expression::attribute(&tenant_type()),
                ),
            ]))
            .with_child(Rule::deny("unassigned-tenant").with_condition(Expression::negate(
                Expression::is_in(
                    Expression::attribute(&owning_tenant()),
                    Expression::attribute(&assigned_tenants()),
                ),
            )))
            .with_child(
                Rule::deny("confidential").with_condition(Expression::attribute(&confidential())),
            )
            .with_child(
                Rule::permit("view-documents")
                    .with_target(Expression::equals(
                        Expression::attribute(&AttributeId::action_id()),
                        Expression::literal("view"),
                    ))
                    .with_condition(Expression::equals(
                        Expression::attribute(&resource_type()),
                        Expression::literal("document"),
                    ))
                    .with_obligation(
                        "audit-log",
                        vec![
                            AttributeAssignment {
                                name: "subject".to_string(),
                                value: Expression::attribute(&AttributeId::subject_id()),
                            },
                            AttributeAssignment {
                                name: "resource".to_string(),
                                value: Expression::attribute(&AttributeId::resource_id()),
                            },
                        ],
                    ),
            );

        PolicySet::new("edocs", CombiningAlgorithm::FirstApplicable)
            .with_child(helpdesk)
            .with_child(Rule::deny("default-deny"))
            .into()
    }

    pub fn document() -> PolicyDocument {
        PolicyDocument {
            attributes: attributes(),
            policy: policy(),
        }
    }

    pub fn pdp(options: PdpOptions) -> Result<Pdp, PolicyError> {
        Pdp::with_options(policy(), catalog()?, options)
    }

    /// A provider helpdesk member viewing a non-confidential document owned
    /// by `owner`.
    pub fn helpdesk_request(subject: &str, assigned: &[&str], owner: &str) -> Request {
        Request::new(subject, "view", "doc123")
            .with(&role(), AttributeValue::bag(["helpdesk"]))
            .with(&tenant_name(), AttributeValue::bag(["provider"]))
            .with(&tenant_type(), AttributeValue::bag(["provider"]))
            .with(&assigned_tenants(), AttributeValue::bag(assigned.iter().copied()))
            .with(&resource_type(), AttributeValue::simple("document"))
            .with(&owning_tenant(), AttributeValue::simple(owner))
            .with(&confidential(), AttributeValue::simple(false))
    }
}
