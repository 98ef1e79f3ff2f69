//! Operation catalog core: registry, schemas, validation, dispatch.
//!
//! Everything the agent loop and the transport adapters share lives here.
//! Operations are registered once at startup; after that the registry is
//! read-only and can be cloned behind an `Arc` across requests.

use thiserror::Error;

pub mod executor;
pub mod registry;
pub mod router;
pub mod schema;
pub mod validate;

pub use executor::{ExecutionError, Executor, HandlerError, OperationHandler};
pub use registry::{OperationRegistry, OperationSpec};
pub use router::{InvocationRequest, OperationResult, Router};
pub use schema::{FieldKind, FieldSpec, InputSchema};
pub use validate::{validate, ValidatedArguments, ValidationError};

/// Catalog-level errors
#[derive(Error, Debug)]
pub enum OpsError {
    #[error("duplicate operation: {0}")]
    DuplicateOperation(String),

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

pub type Result<T> = std::result::Result<T, OpsError>;
