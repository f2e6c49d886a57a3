// Library crate exposing modules for integration tests

pub mod graph;
pub mod index;
pub mod model;
pub mod provider;
pub mod storage;
pub mod visible;
