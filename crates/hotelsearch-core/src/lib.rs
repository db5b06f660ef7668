//! hotelsearch-core
//!
//! Shared pieces of the hotel search workspace: the error type, domain and
//! wire-neutral types, the `SearchService` trait, paged query results,
//! layered configuration and the bundled data loaders.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod dataset;
pub mod error;
pub mod search;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use search::{run_query, SearchResults};
pub use traits::SearchService;
