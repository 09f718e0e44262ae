//! Renders executable documents back to GraphQL text.
//!
//! The output follows the canonical GraphQL printing style: two-space
//! indentation, one selection per line, the `{ ... }` shorthand for anonymous
//! queries without variables or directives, and a trailing newline. Two
//! structurally equal operations therefore always print to the same text.

use parser::{
    types::{
        Directive,
        DocumentOperations,
        ExecutableDocument,
        Field,
        FragmentDefinition,
        OperationDefinition,
        OperationType,
        Selection,
        SelectionSet,
        VariableDefinition,
    },
    Positioned,
};
use value::{ConstValue, Name, Value};

/// Print every operation and fragment of a document, in source order.
pub fn print_document(document: &ExecutableDocument) -> String {
    let mut operations: Vec<(Option<&Name>, &Positioned<OperationDefinition>)> = match &document.operations {
        DocumentOperations::Single(operation) => vec![(None, operation)],
        DocumentOperations::Multiple(operations) => operations.iter().map(|(name, op)| (Some(name), op)).collect(),
    };
    operations.sort_by_key(|(_, operation)| (operation.pos.line, operation.pos.column));

    let mut fragments: Vec<(&Name, &Positioned<FragmentDefinition>)> = document.fragments.iter().collect();
    fragments.sort_by_key(|(_, fragment)| (fragment.pos.line, fragment.pos.column));

    let mut printer = Printer::default();
    for (name, operation) in operations {
        let operation = &operation.node;
        printer.operation(
            operation.ty,
            name.map(|name| name.as_str()),
            operation.variable_definitions.iter().map(|definition| &definition.node),
            &operation.directives,
            operation
                .selection_set
                .node
                .items
                .iter()
                .map(|selection| &selection.node),
        );
    }
    for (name, fragment) in fragments {
        printer.fragment(name, &fragment.node);
    }
    printer.finish()
}

#[derive(Default)]
pub(crate) struct Printer {
    output: String,
    indent: usize,
}

impl Printer {
    pub(crate) fn finish(self) -> String {
        self.output
    }

    fn begin_definition(&mut self) {
        if !self.output.is_empty() {
            self.output.push('\n');
        }
    }

    pub(crate) fn operation<'a>(
        &mut self,
        ty: OperationType,
        name: Option<&str>,
        variable_definitions: impl IntoIterator<Item = &'a VariableDefinition>,
        directives: &[Positioned<Directive>],
        selections: impl IntoIterator<Item = &'a Selection>,
    ) {
        self.begin_definition();

        let variable_definitions: Vec<&VariableDefinition> = variable_definitions.into_iter().collect();
        let shorthand =
            ty == OperationType::Query && name.is_none() && variable_definitions.is_empty() && directives.is_empty();

        if !shorthand {
            self.output.push_str(&ty.to_string());
            if let Some(name) = name {
                self.output.push(' ');
                self.output.push_str(name);
            }
            if !variable_definitions.is_empty() {
                if name.is_none() {
                    self.output.push(' ');
                }
                self.output.push('(');
                for (idx, definition) in variable_definitions.iter().enumerate() {
                    if idx > 0 {
                        self.output.push_str(", ");
                    }
                    self.variable_definition(definition);
                }
                self.output.push(')');
            }
            self.directives(directives);
            self.output.push(' ');
        }

        self.selections(selections);
        self.output.push('\n');
    }

    pub(crate) fn fragment(&mut self, name: &str, fragment: &FragmentDefinition) {
        self.begin_definition();
        self.output.push_str("fragment ");
        self.output.push_str(name);
        self.output.push_str(" on ");
        self.output.push_str(&fragment.type_condition.node.on.node);
        self.directives(&fragment.directives);
        self.output.push(' ');
        self.selection_set(&fragment.selection_set.node);
        self.output.push('\n');
    }

    fn variable_definition(&mut self, definition: &VariableDefinition) {
        self.output.push('$');
        self.output.push_str(&definition.name.node);
        self.output.push_str(": ");
        self.output.push_str(&definition.var_type.node.to_string());
        if let Some(default_value) = &definition.default_value {
            self.output.push_str(" = ");
            self.const_value(&default_value.node);
        }
    }

    fn selection_set(&mut self, selection_set: &SelectionSet) {
        self.selections(selection_set.items.iter().map(|selection| &selection.node));
    }

    fn selections<'a>(&mut self, selections: impl IntoIterator<Item = &'a Selection>) {
        self.output.push('{');
        self.indent += 1;
        for selection in selections {
            self.output.push('\n');
            self.write_indent();
            self.selection(selection);
        }
        self.indent -= 1;
        self.output.push('\n');
        self.write_indent();
        self.output.push('}');
    }

    fn selection(&mut self, selection: &Selection) {
        match selection {
            Selection::Field(field) => self.field(&field.node),
            Selection::FragmentSpread(fragment_spread) => {
                self.output.push_str("...");
                self.output.push_str(&fragment_spread.node.fragment_name.node);
                self.directives(&fragment_spread.node.directives);
            },
            Selection::InlineFragment(inline_fragment) => {
                self.output.push_str("...");
                if let Some(type_condition) = &inline_fragment.node.type_condition {
                    self.output.push_str(" on ");
                    self.output.push_str(&type_condition.node.on.node);
                }
                self.directives(&inline_fragment.node.directives);
                self.output.push(' ');
                self.selection_set(&inline_fragment.node.selection_set.node);
            },
        }
    }

    pub(crate) fn field(&mut self, field: &Field) {
        if let Some(alias) = &field.alias {
            self.output.push_str(&alias.node);
            self.output.push_str(": ");
        }
        self.output.push_str(&field.name.node);
        self.arguments(&field.arguments);
        self.directives(&field.directives);
        if !field.selection_set.node.items.is_empty() {
            self.output.push(' ');
            self.selection_set(&field.selection_set.node);
        }
    }

    fn arguments(&mut self, arguments: &[(Positioned<Name>, Positioned<Value>)]) {
        if arguments.is_empty() {
            return;
        }
        self.output.push('(');
        for (idx, (name, value)) in arguments.iter().enumerate() {
            if idx > 0 {
                self.output.push_str(", ");
            }
            self.output.push_str(&name.node);
            self.output.push_str(": ");
            self.value(&value.node);
        }
        self.output.push(')');
    }

    fn directives(&mut self, directives: &[Positioned<Directive>]) {
        for directive in directives {
            self.output.push_str(" @");
            self.output.push_str(&directive.node.name.node);
            self.arguments(&directive.node.arguments);
        }
    }

    fn value(&mut self, value: &Value) {
        match value {
            Value::Variable(name) => {
                self.output.push('$');
                self.output.push_str(name);
            },
            Value::Null => self.output.push_str("null"),
            Value::Number(number) => self.output.push_str(&number.to_string()),
            Value::String(s) => self.string(s),
            Value::Boolean(b) => self.output.push_str(if *b { "true" } else { "false" }),
            Value::Enum(name) => self.output.push_str(name),
            Value::List(values) => {
                self.output.push('[');
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        self.output.push_str(", ");
                    }
                    self.value(value);
                }
                self.output.push(']');
            },
            Value::Object(fields) => {
                self.output.push('{');
                for (idx, (name, value)) in fields.iter().enumerate() {
                    if idx > 0 {
                        self.output.push_str(", ");
                    }
                    self.output.push_str(name);
                    self.output.push_str(": ");
                    self.value(value);
                }
                self.output.push('}');
            },
            other => self.output.push_str(&other.to_string()),
        }
    }

    fn const_value(&mut self, value: &ConstValue) {
        self.value(&value.clone().into_value());
    }

    fn string(&mut self, s: &str) {
        self.output.push('"');
        for c in s.chars() {
            match c {
                '"' => self.output.push_str("\\\""),
                '\\' => self.output.push_str("\\\\"),
                '\n' => self.output.push_str("\\n"),
                '\r' => self.output.push_str("\\r"),
                '\t' => self.output.push_str("\\t"),
                '\u{8}' => self.output.push_str("\\b"),
                '\u{c}' => self.output.push_str("\\f"),
                c if (c as u32) < 0x20 => self.output.push_str(&format!("\\u{:04X}", c as u32)),
                c => self.output.push(c),
            }
        }
        self.output.push('"');
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.output.push_str("  ");
        }
    }
}
