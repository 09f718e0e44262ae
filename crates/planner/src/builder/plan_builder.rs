use parser::types::{ExecutableDocument, OperationType};
use stitchgate_schema::ComposedSchema;
use tracing::instrument;
use value::{ConstValue, Name, Variables};

use super::{
    context::Context,
    partitioner::{collect_root_fields, partition},
    synthesizer::synthesize,
    utils::get_operation,
};
use crate::{
    plan::{ParallelNode, PlanNode, QueryNode, ResponseField, SequenceNode, SubscribeNode},
    PartitionPolicy,
    PlanError,
    RootNode,
};

/// Forwarding plan generator
pub struct PlanBuilder<'a> {
    schema: &'a ComposedSchema,
    document: ExecutableDocument,
    operation_name: Option<String>,
    variables: Variables,
    policy: PartitionPolicy,
}

impl<'a> PlanBuilder<'a> {
    /// Create a new plan builder
    pub fn new(schema: &'a ComposedSchema, document: ExecutableDocument) -> Self {
        Self {
            schema,
            document,
            operation_name: None,
            variables: Default::default(),
            policy: Default::default(),
        }
    }

    /// Set the operation name
    pub fn operation_name(mut self, operation: impl Into<String>) -> Self {
        self.operation_name = Some(operation.into());
        self
    }

    /// Set the variables
    pub fn variables(self, variables: Variables) -> Self {
        Self { variables, ..self }
    }

    /// Set how top-level fields are grouped into upstream requests
    pub fn policy(self, policy: PartitionPolicy) -> Self {
        Self { policy, ..self }
    }

    /// Generate a forwarding plan
    ///
    /// Structural errors are reported before any sub-request is synthesized, so a
    /// failed plan never causes a partial dispatch.
    #[instrument(err(Debug), skip(self), fields(policy = %self.policy), ret, level = "trace")]
    pub fn plan(&self) -> Result<RootNode, PlanError> {
        let (operation_name, operation) = get_operation(&self.document, self.operation_name.as_deref())?;
        let operation_name = operation_name.map(|name| name.as_str());
        let operation_type = operation.node.ty;

        let root_type = self
            .schema
            .root_type(operation_type)
            .ok_or(PlanError::MissingRootType(operation_type))?;

        let ctx = Context::new(
            self.schema,
            &self.document.fragments,
            &self.variables,
            &operation.node.variable_definitions,
        );
        let root_fields = collect_root_fields(&ctx, root_type, &operation.node.selection_set.node)?;

        let shape = root_fields
            .iter()
            .map(|root_field| ResponseField {
                key: Name::new(root_field.response_key),
                non_null: root_field.non_null,
                value: match root_field.service {
                    Some(_) => None,
                    None => Some(ConstValue::String(root_type.name.to_string())),
                },
            })
            .collect();

        let partitions = partition(self.policy, operation_type, &root_fields);
        let fetch_nodes = partitions
            .iter()
            .map(|partition| synthesize(&ctx, operation_name, &operation.node, partition))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            operation_type = %operation_type,
            fields = root_fields.len(),
            partitions = fetch_nodes.len(),
            "Forwarding plan created."
        );

        Ok(match operation_type {
            OperationType::Query => RootNode::Query(QueryNode {
                node: PlanNode::Parallel(ParallelNode {
                    nodes: fetch_nodes.into_iter().map(PlanNode::Fetch).collect(),
                })
                .flatten(),
                shape,
            }),
            OperationType::Mutation => RootNode::Query(QueryNode {
                node: PlanNode::Sequence(SequenceNode {
                    nodes: fetch_nodes.into_iter().map(PlanNode::Fetch).collect(),
                })
                .flatten(),
                shape,
            }),
            OperationType::Subscription => RootNode::Subscribe(SubscribeNode {
                subscribe_nodes: fetch_nodes,
                shape,
            }),
        })
    }
}
