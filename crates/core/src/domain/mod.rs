pub mod cost;
pub mod metric;
pub mod resource;
pub mod snapshot;
