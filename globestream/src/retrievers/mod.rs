//! Concrete [`Retriever`](crate::retrieval::Retriever) implementations.
//!
//! The service itself is protocol-agnostic; these are the two sources every
//! deployment needs. Anything else (WMS, tile packages, test fixtures)
//! implements the trait the same way.

mod http;
mod local;

pub use http::{default_http_client, HttpRetriever};
pub use local::LocalRetriever;
