//! FHIR profile path compiler and terminology hierarchy builder
//!
//! This crate bundles the workspace:
//! - Parsing chained element ids ([`parser`])
//! - Resolving them across Extension and Reference boundaries and emitting
//!   CQL, Pathling and FHIR Search paths ([`path`])
//! - Generating mapping tables from querying metadata ([`mapping`])
//! - Building concept hierarchies from closure tables ([`hierarchy`])
//!
//! # Example
//!
//! ```ignore
//! use octofhir_onto::{Project, ProjectConfig};
//!
//! let config = ProjectConfig::load("my-project")?;
//! let (project, stats) = Project::load("my-project", &config)?;
//! println!("{} profiles loaded", stats.loaded);
//! ```

pub use octofhir_onto_diagnostics as diagnostics;
pub use octofhir_onto_hierarchy as hierarchy;
pub use octofhir_onto_mapping as mapping;
pub use octofhir_onto_model as model;
pub use octofhir_onto_parser as parser;
pub use octofhir_onto_path as path;

pub use octofhir_onto_diagnostics::{OntoError, Result};
pub use octofhir_onto_path::{ChainResolver, Dialect, ResolvedChain, emit};

pub mod config;
pub mod project;

pub use config::ProjectConfig;
pub use project::Project;

#[cfg(feature = "cli")]
pub mod cli;
