use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum CombineError {
    #[error("Root field '{type_name}.{field_name}' is defined by both service '{service1}' and service '{service2}'.")]
    RootFieldConflicted {
        type_name: String,
        field_name: String,
        service1: String,
        service2: String,
    },

    #[error("Type '{type_name}' has different kinds across services: '{kind1}' vs '{kind2}'.")]
    TypeKindConflicted {
        type_name: String,
        kind1: String,
        kind2: String,
    },

    #[error(
        "Type '{type_name}' has conflicting definitions in services '{service1}' and '{service2}'. Types shared by \
         several services must be defined identically."
    )]
    DefinitionConflicted {
        type_name: String,
        service1: String,
        service2: String,
    },

    #[error("Type '{type_name}' is extended in service '{service}' but never defined.")]
    ExtendedTypeMissing { type_name: String, service: String },
}
