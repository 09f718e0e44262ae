use serde::{Deserialize, Serialize};
use value::Variables;

/// A GraphQL request, as received by the gateway and as forwarded to an upstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Request {
    pub query: String,

    #[serde(
        rename = "operationName",
        alias = "operation",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub operation_name: Option<String>,

    #[serde(default, skip_serializing_if = "variables_is_empty")]
    pub variables: Variables,
}

fn variables_is_empty(variables: &Variables) -> bool {
    variables.is_empty()
}

impl Request {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            operation_name: None,
            variables: Default::default(),
        }
    }

    #[must_use]
    pub fn operation_name(self, operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: Some(operation_name.into()),
            ..self
        }
    }

    #[must_use]
    pub fn variables(self, variables: Variables) -> Self {
        Self { variables, ..self }
    }
}
