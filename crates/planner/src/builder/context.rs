use std::collections::HashMap;

use parser::{
    types::{Directive, FragmentDefinition, VariableDefinition},
    Positioned,
};
use stitchgate_schema::ComposedSchema;
use value::{ConstValue, Name, Value, Variables};

use crate::PlanError;

/// Context for building a forwarding plan
#[derive(Debug)]
pub struct Context<'a> {
    /// The stitched schema
    pub schema: &'a ComposedSchema,
    /// Fragment definitions from the query
    pub fragments: &'a HashMap<Name, Positioned<FragmentDefinition>>,
    /// Variables from the request
    pub variables: &'a Variables,
    /// Variable definitions of the selected operation
    pub variable_definitions: &'a [Positioned<VariableDefinition>],
}

impl<'a> Context<'a> {
    pub fn new(
        schema: &'a ComposedSchema,
        fragments: &'a HashMap<Name, Positioned<FragmentDefinition>>,
        variables: &'a Variables,
        variable_definitions: &'a [Positioned<VariableDefinition>],
    ) -> Self {
        Self {
            schema,
            fragments,
            variables,
            variable_definitions,
        }
    }

    pub fn fragment(&self, name: &str) -> Result<&'a Positioned<FragmentDefinition>, PlanError> {
        self.fragments
            .get(name)
            .ok_or_else(|| PlanError::UnknownFragment(name.to_string()))
    }

    /// Evaluate `@skip` and `@include` against the request variables.
    pub fn is_skipped(&self, directives: &[Positioned<Directive>]) -> bool {
        for directive in directives {
            let condition = directive
                .node
                .arguments
                .iter()
                .find(|(name, _)| name.node.as_str() == "if")
                .map(|(_, value)| self.resolve_bool(&value.node));

            match (directive.node.name.node.as_str(), condition) {
                ("skip", Some(true)) => return true,
                ("include", Some(false)) => return true,
                _ => {},
            }
        }
        false
    }

    /// The value of a variable, falling back to its default when the request omits it.
    fn variable(&self, name: &Name) -> Option<&ConstValue> {
        self.variables.get(name).or_else(|| {
            self.variable_definitions
                .iter()
                .find(|definition| definition.node.name.node == *name)
                .and_then(|definition| definition.node.default_value.as_ref())
                .map(|default_value| &default_value.node)
        })
    }

    fn resolve_bool(&self, value: &Value) -> bool {
        match value {
            Value::Boolean(value) => *value,
            Value::Variable(name) => matches!(self.variable(name), Some(ConstValue::Boolean(true))),
            _ => false,
        }
    }
}
