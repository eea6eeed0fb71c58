//! Diagnostics and error handling for profile path compilation
//!
//! This crate provides the error taxonomy shared by the chain parser, the
//! element resolver, the path emitter, the mapping generators and the
//! hierarchy builder, together with structured error codes and the element
//! location attached to every resolution failure.

mod error;
mod error_code;
mod location;

pub use error::*;
pub use error_code::*;
pub use location::*;

/// Result type for profile path operations
pub type Result<T> = std::result::Result<T, OntoError>;
