#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Retrieval orchestration over a search backend: per-strategy query bodies,
//! sequential fallback, and parallel hybrid fusion.

pub mod query;
pub mod retriever;

pub use retriever::Retriever;
