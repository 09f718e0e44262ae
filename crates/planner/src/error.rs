use parser::types::OperationType;
use thiserror::Error;

use crate::{Response, ServerError};

/// Structural errors that stop an operation before anything is dispatched.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum PlanError {
    #[error("The operation has no top-level selections.")]
    EmptyOperation,

    #[error("Field '{type_name}.{field_name}' is not bound to any upstream service.")]
    UnresolvableField { type_name: String, field_name: String },

    #[error("Unknown operation named '{0}'.")]
    UnknownOperation(String),

    #[error("The document contains several operations, an operation name is required.")]
    OperationNameRequired,

    #[error("The document does not contain any operation.")]
    MissingOperation,

    #[error("Schema is not configured for {0} operations.")]
    MissingRootType(OperationType),

    #[error("Unknown fragment '{0}'.")]
    UnknownFragment(String),
}

impl From<PlanError> for ServerError {
    fn from(err: PlanError) -> Self {
        ServerError::new(err.to_string())
    }
}

impl From<PlanError> for Response {
    fn from(err: PlanError) -> Self {
        Response::from_errors(vec![err.into()])
    }
}
