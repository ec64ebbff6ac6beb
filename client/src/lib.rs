//! ETL Wizard HTTP client
//!
//! Talks to the ingestion backend over HTTP/JSON.

pub mod blob;
pub mod config;
pub mod error;
pub mod http;
pub mod wire;


pub use blob::PathBlob;
pub use config::ClientConfig;
pub use http::HttpBackend;
