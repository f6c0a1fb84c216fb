#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Concrete adapters behind the core traits: an HTTP search backend and
//! embedding providers (remote API or deterministic hashing fake).

pub mod embed;
pub mod http;

pub use embed::{embedder_from_config, HashEmbedder, RemoteEmbedder};
pub use http::HttpSearchBackend;
