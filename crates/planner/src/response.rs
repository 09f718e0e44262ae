use indexmap::IndexMap;
use parser::Pos;
use serde::{Deserialize, Serialize};
use value::ConstValue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerError {
    pub message: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<ConstValue>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Pos>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extensions: IndexMap<String, ConstValue>,
}

impl ServerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Default::default(),
            locations: Default::default(),
            extensions: Default::default(),
        }
    }

    #[must_use]
    pub fn path(self, path: Vec<ConstValue>) -> Self {
        Self { path, ..self }
    }

    #[must_use]
    pub fn extension(mut self, name: impl Into<String>, value: ConstValue) -> Self {
        self.extensions.insert(name.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default = "null_data")]
    pub data: ConstValue,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ServerError>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extensions: IndexMap<String, ConstValue>,
}

fn null_data() -> ConstValue {
    ConstValue::Null
}

impl Default for Response {
    fn default() -> Self {
        Self {
            data: ConstValue::Null,
            errors: Default::default(),
            extensions: Default::default(),
        }
    }
}

impl Response {
    /// A response without data.
    pub fn from_errors(errors: Vec<ServerError>) -> Self {
        Self {
            errors,
            ..Default::default()
        }
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}
