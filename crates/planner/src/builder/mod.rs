pub mod context;
pub mod partitioner;
pub mod plan_builder;
pub mod synthesizer;
pub mod utils;
