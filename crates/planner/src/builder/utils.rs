use parser::{
    types::{DocumentOperations, ExecutableDocument, OperationDefinition},
    Positioned,
};
use tracing::instrument;
use value::Name;

use crate::PlanError;

/// Get the operation definition, and its name, from a document
#[instrument(err(Debug), skip(document), level = "trace")]
pub fn get_operation<'a>(
    document: &'a ExecutableDocument,
    operation_name: Option<&str>,
) -> Result<(Option<&'a Name>, &'a Positioned<OperationDefinition>), PlanError> {
    match (&document.operations, operation_name) {
        (DocumentOperations::Single(operation), None) => Ok((None, operation)),
        (DocumentOperations::Single(_), Some(operation_name)) => {
            Err(PlanError::UnknownOperation(operation_name.to_string()))
        },
        (DocumentOperations::Multiple(operations), Some(operation_name)) => operations
            .get_key_value(operation_name)
            .map(|(name, operation)| (Some(name), operation))
            .ok_or_else(|| PlanError::UnknownOperation(operation_name.to_string())),
        (DocumentOperations::Multiple(operations), None) => {
            let mut iter = operations.iter();
            match (iter.next(), iter.next()) {
                (Some((name, operation)), None) => Ok((Some(name), operation)),
                (None, _) => Err(PlanError::MissingOperation),
                (Some(_), Some(_)) => Err(PlanError::OperationNameRequired),
            }
        },
    }
}
