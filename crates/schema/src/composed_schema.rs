use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use parser::types::{
    self,
    EnumType,
    InputObjectType,
    InterfaceType,
    ObjectType,
    OperationType,
    ServiceDocument,
    Type,
    TypeDefinition,
    TypeSystemDefinition,
    UnionType,
};
use tracing::instrument;
use value::{ConstValue, Name};

use crate::CombineError;

const QUERY: &str = "Query";
const MUTATION: &str = "Mutation";
const SUBSCRIPTION: &str = "Subscription";

#[derive(Debug, Eq, PartialEq)]
pub struct MetaField {
    pub name: Name,
    pub arguments: IndexMap<Name, MetaInputValue>,
    pub ty: Type,

    /// The upstream service that resolves this field.
    ///
    /// Only root fields of a stitched schema carry a binding, every nested
    /// field is resolved by whichever upstream owns the root field above it.
    pub service: Option<String>,
}

impl MetaField {
    fn is_compatible(&self, other: &MetaField) -> bool {
        self.ty == other.ty &&
            self.arguments.len() == other.arguments.len() &&
            self.arguments.iter().all(|(name, arg)| {
                other
                    .arguments
                    .get(name)
                    .map(|other_arg| other_arg.ty == arg.ty)
                    .unwrap_or(false)
            })
    }
}

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
}

impl From<&types::TypeKind> for TypeKind {
    fn from(kind: &types::TypeKind) -> Self {
        match kind {
            types::TypeKind::Scalar => TypeKind::Scalar,
            types::TypeKind::Object(_) => TypeKind::Object,
            types::TypeKind::Interface(_) => TypeKind::Interface,
            types::TypeKind::Union(_) => TypeKind::Union,
            types::TypeKind::Enum(_) => TypeKind::Enum,
            types::TypeKind::InputObject(_) => TypeKind::InputObject,
        }
    }
}

#[derive(Debug, Eq, PartialEq)]
pub struct MetaInputValue {
    pub name: Name,
    pub ty: Type,
    pub default_value: Option<ConstValue>,
}

/// The shape of a named type, as far as stitching needs to compare it.
#[derive(Debug, Eq, PartialEq)]
pub struct MetaType {
    pub name: Name,
    pub kind: TypeKind,
    /// The first service that defined this type.
    pub owner: Option<String>,

    pub implements: IndexSet<Name>,
    pub fields: IndexMap<Name, MetaField>,
    /// Members of a union.
    pub members: IndexSet<Name>,
    pub enum_values: IndexSet<Name>,
    pub input_fields: IndexMap<Name, MetaInputValue>,
}

impl MetaType {
    fn new(name: Name, kind: TypeKind) -> Self {
        Self {
            name,
            kind,
            owner: None,
            implements: Default::default(),
            fields: Default::default(),
            members: Default::default(),
            enum_values: Default::default(),
            input_fields: Default::default(),
        }
    }

    #[inline]
    pub fn field_by_name(&self, name: &str) -> Option<&MetaField> {
        self.fields.get(name)
    }

    /// Two definitions of a shared type are compatible when they expose the same shape.
    /// Descriptions and directives are allowed to differ, the first definition wins.
    pub fn is_compatible(&self, other: &MetaType) -> bool {
        if self.kind != other.kind {
            return false;
        }

        match self.kind {
            TypeKind::Scalar => true,
            TypeKind::Object | TypeKind::Interface => {
                self.implements == other.implements &&
                    self.fields.len() == other.fields.len() &&
                    self.fields.iter().all(|(name, field)| {
                        other
                            .fields
                            .get(name)
                            .map(|other_field| field.is_compatible(other_field))
                            .unwrap_or(false)
                    })
            },
            TypeKind::Union => self.members == other.members,
            TypeKind::Enum => self.enum_values == other.enum_values,
            TypeKind::InputObject => {
                self.input_fields.len() == other.input_fields.len() &&
                    self.input_fields.iter().all(|(name, field)| {
                        other
                            .input_fields
                            .get(name)
                            .map(|other_field| other_field.ty == field.ty)
                            .unwrap_or(false)
                    })
            },
        }
    }
}

/// A schema stitched together from the schemas of one or more upstream services.
///
/// The root fields carry the upstream binding table: `MetaField::service` names the
/// service that the gateway forwards the field to. The schema is immutable once
/// built and is shared between concurrent operations.
#[derive(Debug, Default)]
pub struct ComposedSchema {
    pub query_type: Option<Name>,
    pub mutation_type: Option<Name>,
    pub subscription_type: Option<Name>,
    pub types: IndexMap<Name, MetaType>,
}

impl ComposedSchema {
    /// Build a schema whose every root field is forwarded to a single upstream service.
    pub fn remote(service: impl Into<String>, document: ServiceDocument) -> Result<Self, CombineError> {
        Self::combine([(service.into(), document)])
    }

    /// Stitch the schemas of several upstream services together.
    ///
    /// Root fields are bound to the service that defines them and must be unique
    /// across services. Other types may be defined by several services as long as
    /// the definitions are compatible.
    #[instrument(err(Debug), skip(services), level = "trace")]
    pub fn combine(services: impl IntoIterator<Item = (String, ServiceDocument)>) -> Result<Self, CombineError> {
        let mut composed_schema = ComposedSchema::default();

        // Sort services by name so that the composed schema does not depend on the input order.
        let mut sorted_services: Vec<(String, ServiceDocument)> = services.into_iter().collect();
        sorted_services.sort_by(|(a, _), (b, _)| a.cmp(b));

        for (service, document) in sorted_services {
            let root_names = service_root_names(&document);
            let mut extensions = Vec::new();

            for definition in document.definitions {
                let type_definition = match definition {
                    TypeSystemDefinition::Type(type_definition) => type_definition.node,
                    TypeSystemDefinition::Schema(_) | TypeSystemDefinition::Directive(_) => continue,
                };

                if let Some(root_name) = root_names.get(type_definition.name.node.as_str()) {
                    merge_root_fields(&mut composed_schema, &service, root_name, type_definition)?;
                } else if type_definition.extend {
                    extensions.push(type_definition);
                } else {
                    let mut meta_type = convert_type_definition(type_definition);
                    meta_type.owner = Some(service.clone());
                    merge_type(&mut composed_schema, &service, meta_type)?;
                }
            }

            for type_definition in extensions {
                apply_type_extension(&mut composed_schema, &service, type_definition)?;
            }
        }

        for (root, name) in [
            (&mut composed_schema.query_type, QUERY),
            (&mut composed_schema.mutation_type, MUTATION),
            (&mut composed_schema.subscription_type, SUBSCRIPTION),
        ] {
            if composed_schema.types.contains_key(name) {
                *root = Some(Name::new(name));
            }
        }

        tracing::debug!(services = ?composed_schema.services(), "Schema stitched.");
        Ok(composed_schema)
    }

    #[inline]
    pub fn query_type(&self) -> &str {
        self.query_type.as_ref().map(|name| name.as_str()).unwrap_or(QUERY)
    }

    #[inline]
    pub fn mutation_type(&self) -> Option<&str> {
        self.mutation_type.as_ref().map(|name| name.as_str())
    }

    #[inline]
    pub fn subscription_type(&self) -> Option<&str> {
        self.subscription_type.as_ref().map(|name| name.as_str())
    }

    /// The root type an operation of the given type starts from.
    pub fn root_type(&self, operation_type: OperationType) -> Option<&MetaType> {
        let name = match operation_type {
            OperationType::Query => Some(self.query_type()),
            OperationType::Mutation => self.mutation_type(),
            OperationType::Subscription => self.subscription_type(),
        }?;
        self.types.get(name)
    }

    /// Look up the upstream bound to a field.
    pub fn upstream_of(&self, type_name: &str, field_name: &str) -> Option<&str> {
        self.types
            .get(type_name)
            .and_then(|ty| ty.fields.get(field_name))
            .and_then(|field| field.service.as_deref())
    }

    /// Every service referenced by the binding table, in root field order.
    pub fn services(&self) -> IndexSet<&str> {
        [self.query_type.as_ref(), self.mutation_type.as_ref(), self.subscription_type.as_ref()]
            .into_iter()
            .flatten()
            .filter_map(|name| self.types.get(name))
            .flat_map(|ty| ty.fields.values())
            .filter_map(|field| field.service.as_deref())
            .collect()
    }
}

/// Maps the root type names used by a service to the names used in the composed schema.
fn service_root_names(document: &ServiceDocument) -> HashMap<String, &'static str> {
    let mut root_names: HashMap<String, &'static str> = [QUERY, MUTATION, SUBSCRIPTION]
        .into_iter()
        .map(|name| (name.to_string(), name))
        .collect();

    for definition in &document.definitions {
        if let TypeSystemDefinition::Schema(schema) = definition {
            for (local_name, root_name) in [
                (&schema.node.query, QUERY),
                (&schema.node.mutation, MUTATION),
                (&schema.node.subscription, SUBSCRIPTION),
            ] {
                if let Some(local_name) = local_name {
                    root_names.retain(|_, name| *name != root_name);
                    root_names.insert(local_name.node.to_string(), root_name);
                }
            }
        }
    }

    root_names
}

fn merge_root_fields(
    composed_schema: &mut ComposedSchema,
    service: &str,
    root_name: &str,
    definition: TypeDefinition,
) -> Result<(), CombineError> {
    let fields = match definition.kind {
        types::TypeKind::Object(ObjectType { fields, .. }) => fields,
        kind => {
            return Err(CombineError::TypeKindConflicted {
                type_name: root_name.to_string(),
                kind1: format!("{:?}", TypeKind::Object),
                kind2: format!("{:?}", TypeKind::from(&kind)),
            });
        },
    };

    let root_type = composed_schema
        .types
        .entry(Name::new(root_name))
        .or_insert_with(|| MetaType::new(Name::new(root_name), TypeKind::Object));

    for field in fields {
        let mut field_definition = convert_field_definition(field.node);
        field_definition.service = Some(service.to_string());

        if let Some(existing) = root_type.fields.get(&field_definition.name) {
            return Err(CombineError::RootFieldConflicted {
                type_name: root_name.to_string(),
                field_name: field_definition.name.to_string(),
                service1: existing.service.clone().unwrap_or_default(),
                service2: service.to_string(),
            });
        }

        tracing::trace!(
            root = root_name,
            field = %field_definition.name,
            service = service,
            "Bind root field."
        );
        root_type.fields.insert(field_definition.name.clone(), field_definition);
    }

    Ok(())
}

fn merge_type(composed_schema: &mut ComposedSchema, service: &str, meta_type: MetaType) -> Result<(), CombineError> {
    match composed_schema.types.get(&meta_type.name) {
        Some(existing) if existing.kind != meta_type.kind => Err(CombineError::TypeKindConflicted {
            type_name: meta_type.name.to_string(),
            kind1: format!("{:?}", existing.kind),
            kind2: format!("{:?}", meta_type.kind),
        }),
        Some(existing) if !existing.is_compatible(&meta_type) => Err(CombineError::DefinitionConflicted {
            type_name: meta_type.name.to_string(),
            service1: existing.owner.clone().unwrap_or_default(),
            service2: service.to_string(),
        }),
        Some(_) => Ok(()),
        None => {
            composed_schema.types.insert(meta_type.name.clone(), meta_type);
            Ok(())
        },
    }
}

fn apply_type_extension(
    composed_schema: &mut ComposedSchema,
    service: &str,
    definition: TypeDefinition,
) -> Result<(), CombineError> {
    let extension = convert_type_definition(definition);
    let existing = composed_schema
        .types
        .get_mut(&extension.name)
        .ok_or_else(|| CombineError::ExtendedTypeMissing {
            type_name: extension.name.to_string(),
            service: service.to_string(),
        })?;

    if existing.kind != extension.kind {
        return Err(CombineError::TypeKindConflicted {
            type_name: extension.name.to_string(),
            kind1: format!("{:?}", existing.kind),
            kind2: format!("{:?}", extension.kind),
        });
    }

    existing.implements.extend(extension.implements);
    existing.fields.extend(extension.fields);
    existing.members.extend(extension.members);
    existing.enum_values.extend(extension.enum_values);
    existing.input_fields.extend(extension.input_fields);
    Ok(())
}

fn convert_type_definition(definition: TypeDefinition) -> MetaType {
    let mut meta_type = MetaType::new(definition.name.node, TypeKind::from(&definition.kind));

    match definition.kind {
        types::TypeKind::Scalar => {},
        types::TypeKind::Object(ObjectType { implements, fields }) |
        types::TypeKind::Interface(InterfaceType { implements, fields }) => {
            meta_type.implements = implements.into_iter().map(|name| name.node).collect();
            meta_type.fields = fields
                .into_iter()
                .map(|field| (field.node.name.node.clone(), convert_field_definition(field.node)))
                .collect();
        },
        types::TypeKind::Union(UnionType { members }) => {
            meta_type.members = members.into_iter().map(|name| name.node).collect();
        },
        types::TypeKind::Enum(EnumType { values }) => {
            meta_type.enum_values = values.into_iter().map(|value| value.node.value.node).collect();
        },
        types::TypeKind::InputObject(InputObjectType { fields }) => {
            meta_type.input_fields = fields
                .into_iter()
                .map(|field| (field.node.name.node.clone(), convert_input_value_definition(field.node)))
                .collect();
        },
    }

    meta_type
}

fn convert_field_definition(definition: types::FieldDefinition) -> MetaField {
    MetaField {
        name: definition.name.node,
        arguments: definition
            .arguments
            .into_iter()
            .map(|arg| (arg.node.name.node.clone(), convert_input_value_definition(arg.node)))
            .collect(),
        ty: definition.ty.node,
        service: None,
    }
}

fn convert_input_value_definition(arg: types::InputValueDefinition) -> MetaInputValue {
    MetaInputValue {
        name: arg.name.node,
        ty: arg.ty.node,
        default_value: arg.default_value.map(|default_value| default_value.node),
    }
}
