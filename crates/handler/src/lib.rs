#![forbid(unsafe_code)]

pub use executor::Executor;
pub use fetcher::{FetchContext, FetchError, Fetcher};
pub use merge::{merge_responses, MergeError};
pub use pubsub::{TriggerRegistry, TriggerStream};
pub use service_route::{ServiceRoute, ServiceRouteTable};
pub use shared_route_table::SharedRouteTable;

mod executor;
mod fetcher;
mod merge;
mod pubsub;
mod service_route;
mod shared_route_table;
mod websocket;

pub mod handler;
