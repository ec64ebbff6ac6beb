//! ETL Wizard Core Library
//!
//! Client-side configuration and job-lifecycle state machine for moving data
//! between a columnar database and delimited flat files through a remote
//! ingestion backend.

pub mod backend;
pub mod config_store;
pub mod domain;
pub mod error;
pub mod job;
pub mod join;
pub mod payload;
pub mod schema;
pub mod selection;
pub mod session;
pub mod state;

pub use backend::{Backend, BlobSource, FileUpload, InMemoryBlob};
pub use error::{CoreError, FailureKind, Result};
pub use session::Wizard;
pub use state::{Step, WizardState, WizardStatus};
