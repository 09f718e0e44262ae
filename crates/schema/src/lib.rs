#![forbid(unsafe_code)]

mod composed_schema;
mod error;
mod type_ext;
mod value_ext;

pub use composed_schema::{ComposedSchema, MetaField, MetaInputValue, MetaType, TypeKind};
pub use error::CombineError;
pub use type_ext::TypeExt;
pub use value_ext::ValueExt;
