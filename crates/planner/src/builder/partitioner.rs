use indexmap::IndexMap;
use parser::types::{Field, OperationType, Selection, SelectionSet};
use stitchgate_schema::{MetaType, TypeExt};
use tracing::instrument;

use super::context::Context;
use crate::{PartitionPolicy, PlanError};

/// A top-level field selection together with the selection that wraps it.
#[derive(Debug, Clone, Copy)]
pub struct FieldSelection<'a> {
    pub selection: &'a Selection,
    pub field: &'a Field,
}

/// Every top-level selection sharing one response key.
#[derive(Debug)]
pub struct RootField<'a> {
    pub response_key: &'a str,
    pub non_null: bool,
    /// `None` for fields the gateway resolves itself.
    pub service: Option<&'a str>,
    pub selections: Vec<FieldSelection<'a>>,
}

/// A group of top-level selections forwarded to one upstream in one request.
#[derive(Debug)]
pub struct Partition<'a> {
    pub service: &'a str,
    pub response_keys: Vec<&'a str>,
    pub selections: Vec<FieldSelection<'a>>,
}

impl<'a> Partition<'a> {
    fn new(service: &'a str) -> Self {
        Self {
            service,
            response_keys: Vec::new(),
            selections: Vec::new(),
        }
    }

    fn push(&mut self, root_field: &RootField<'a>) {
        self.response_keys.push(root_field.response_key);
        self.selections.extend(root_field.selections.iter().copied());
    }
}

/// Collect the top-level fields of an operation, grouped by response key in request order.
///
/// Fragment spreads and inline fragments on the root type are flattened into the
/// fields they contain. Selections excluded by `@skip` or `@include` are dropped
/// here, so they are neither forwarded nor part of the response. Every forwarded
/// field must be bound to an upstream.
#[instrument(err(Debug), skip(ctx, selection_set), level = "trace")]
pub fn collect_root_fields<'a>(
    ctx: &Context<'a>,
    root_type: &'a MetaType,
    selection_set: &'a SelectionSet,
) -> Result<Vec<RootField<'a>>, PlanError> {
    fn collect_rec<'a>(
        ctx: &Context<'a>,
        root_type: &'a MetaType,
        selection_set: &'a SelectionSet,
        root_fields: &mut IndexMap<&'a str, RootField<'a>>,
    ) -> Result<(), PlanError> {
        for selection in &selection_set.items {
            match &selection.node {
                Selection::Field(field) => {
                    if ctx.is_skipped(&field.node.directives) {
                        continue;
                    }
                    let field_name = field.node.name.node.as_str();
                    let response_key = field.node.response_key().node.as_str();

                    let (service, non_null) = if field_name == "__typename" {
                        (None, true)
                    } else {
                        let field_definition =
                            root_type
                                .field_by_name(field_name)
                                .ok_or_else(|| PlanError::UnresolvableField {
                                    type_name: root_type.name.to_string(),
                                    field_name: field_name.to_string(),
                                })?;
                        let service =
                            field_definition
                                .service
                                .as_deref()
                                .ok_or_else(|| PlanError::UnresolvableField {
                                    type_name: root_type.name.to_string(),
                                    field_name: field_name.to_string(),
                                })?;
                        (Some(service), field_definition.ty.is_non_null())
                    };

                    root_fields
                        .entry(response_key)
                        .or_insert_with(|| RootField {
                            response_key,
                            non_null,
                            service,
                            selections: Vec::new(),
                        })
                        .selections
                        .push(FieldSelection {
                            selection: &selection.node,
                            field: &field.node,
                        });
                },
                Selection::FragmentSpread(fragment_spread) => {
                    if ctx.is_skipped(&fragment_spread.node.directives) {
                        continue;
                    }
                    let fragment = ctx.fragment(fragment_spread.node.fragment_name.node.as_str())?;
                    collect_rec(ctx, root_type, &fragment.node.selection_set.node, root_fields)?;
                },
                Selection::InlineFragment(inline_fragment) => {
                    if ctx.is_skipped(&inline_fragment.node.directives) {
                        continue;
                    }
                    collect_rec(ctx, root_type, &inline_fragment.node.selection_set.node, root_fields)?;
                },
            }
        }
        Ok(())
    }

    let mut root_fields = IndexMap::new();
    collect_rec(ctx, root_type, selection_set, &mut root_fields)?;
    if root_fields.is_empty() {
        return Err(PlanError::EmptyOperation);
    }
    Ok(root_fields.into_values().collect())
}

/// Group root fields into partitions according to the policy.
///
/// Partitions are disjoint by response key. For mutations only adjacent fields
/// of the same upstream are coalesced, so the fields still run in document order.
pub fn partition<'a>(
    policy: PartitionPolicy,
    operation_type: OperationType,
    root_fields: &[RootField<'a>],
) -> Vec<Partition<'a>> {
    let forwarded = root_fields
        .iter()
        .filter_map(|root_field| root_field.service.map(|service| (service, root_field)));

    match (policy, operation_type) {
        (PartitionPolicy::Split, _) => forwarded
            .map(|(service, root_field)| {
                let mut partition = Partition::new(service);
                partition.push(root_field);
                partition
            })
            .collect(),
        (PartitionPolicy::Coalesce, OperationType::Mutation) => {
            let mut partitions: Vec<Partition<'a>> = Vec::new();
            for (service, root_field) in forwarded {
                match partitions.last_mut() {
                    Some(last) if last.service == service => last.push(root_field),
                    _ => {
                        let mut partition = Partition::new(service);
                        partition.push(root_field);
                        partitions.push(partition);
                    },
                }
            }
            partitions
        },
        (PartitionPolicy::Coalesce, _) => {
            let mut partitions: IndexMap<&'a str, Partition<'a>> = IndexMap::new();
            for (service, root_field) in forwarded {
                partitions
                    .entry(service)
                    .or_insert_with(|| Partition::new(service))
                    .push(root_field);
            }
            partitions.into_values().collect()
        },
    }
}
