use indexmap::IndexSet;
use parser::{
    types::{Directive, Field, OperationDefinition, Selection, SelectionSet},
    Positioned,
};
use stitchgate_schema::ValueExt;
use value::{Name, Value, Variables};

use super::{context::Context, partitioner::Partition};
use crate::{plan::FetchNode, printer::Printer, PlanError};

/// Variables and fragments referenced by a group of selections.
#[derive(Default)]
struct References<'a> {
    variables: IndexSet<&'a str>,
    fragments: IndexSet<&'a str>,
}

impl<'a> References<'a> {
    fn arguments(&mut self, arguments: &'a [(Positioned<Name>, Positioned<Value>)]) {
        for (_, value) in arguments {
            self.variables.extend(value.node.referenced_variables());
        }
    }

    fn directives(&mut self, directives: &'a [Positioned<Directive>]) {
        for directive in directives {
            self.arguments(&directive.node.arguments);
        }
    }

    fn field(&mut self, ctx: &Context<'a>, field: &'a Field) -> Result<(), PlanError> {
        self.arguments(&field.arguments);
        self.directives(&field.directives);
        self.selection_set(ctx, &field.selection_set.node)
    }

    fn selection_set(&mut self, ctx: &Context<'a>, selection_set: &'a SelectionSet) -> Result<(), PlanError> {
        for selection in &selection_set.items {
            match &selection.node {
                Selection::Field(field) => self.field(ctx, &field.node)?,
                Selection::FragmentSpread(fragment_spread) => {
                    self.directives(&fragment_spread.node.directives);
                    let name = fragment_spread.node.fragment_name.node.as_str();
                    if self.fragments.insert(name) {
                        let fragment = ctx.fragment(name)?;
                        self.directives(&fragment.node.directives);
                        self.selection_set(ctx, &fragment.node.selection_set.node)?;
                    }
                },
                Selection::InlineFragment(inline_fragment) => {
                    self.directives(&inline_fragment.node.directives);
                    self.selection_set(ctx, &inline_fragment.node.selection_set.node)?;
                },
            }
        }
        Ok(())
    }
}

/// Build the sub-request forwarded for one partition.
///
/// The partition's selections are copied verbatim. The sub-operation keeps the
/// operation type, name and directives of the original operation, declares only
/// the variables its selections use and carries the fragments they spread.
pub fn synthesize<'a>(
    ctx: &Context<'a>,
    operation_name: Option<&str>,
    operation: &'a OperationDefinition,
    partition: &Partition<'a>,
) -> Result<FetchNode, PlanError> {
    let mut references = References::default();
    references.directives(&operation.directives);
    for selection in &partition.selections {
        references.field(ctx, selection.field)?;
    }

    let variable_definitions: Vec<_> = operation
        .variable_definitions
        .iter()
        .map(|definition| &definition.node)
        .filter(|definition| references.variables.contains(definition.name.node.as_str()))
        .collect();

    let mut variables = Variables::default();
    for definition in &variable_definitions {
        if let Some(value) = ctx.variables.get(&definition.name.node) {
            variables.insert(definition.name.node.clone(), value.clone());
        }
    }

    let mut printer = Printer::default();
    printer.operation(
        operation.ty,
        operation_name,
        variable_definitions.iter().copied(),
        &operation.directives,
        partition.selections.iter().map(|selection| selection.selection),
    );
    for name in &references.fragments {
        printer.fragment(name, &ctx.fragment(name)?.node);
    }

    Ok(FetchNode {
        service: partition.service.to_string(),
        query: printer.finish(),
        operation_name: operation_name.map(ToString::to_string),
        variables,
        fields: partition.response_keys.iter().map(|key| Name::new(key)).collect(),
    })
}
