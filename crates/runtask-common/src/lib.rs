//! Common types for runtask: deferred values, the resource model, IAM
//! statements, errors and telemetry

#![deny(missing_docs)]

pub mod arn;
pub mod deferred;
pub mod error;
pub mod iam;
pub mod network;
pub mod telemetry;

pub use arn::{ArnComponents, Stack};
pub use deferred::{Deferred, ResolutionContext, Resolve, Token};
pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
