#![forbid(unsafe_code)]

mod builder;
mod error;
mod plan;
mod policy;
mod printer;
mod request;
mod response;

pub use builder::plan_builder::PlanBuilder;
pub use error::PlanError;
pub use plan::{FetchNode, ParallelNode, PlanNode, QueryNode, ResponseField, RootNode, SequenceNode, SubscribeNode};
pub use policy::{ParsePolicyError, PartitionPolicy};
pub use printer::print_document;
pub use request::Request;
pub use response::{Response, ServerError};
