//! Profile path compiler
//!
//! Turns chained element ids into dialect-specific path expressions:
//!
//! - [`resolver`]: follows a flattened chain across Extension and Reference
//!   boundaries, producing a [`ResolvedChain`]
//! - [`cardinality`]: SINGLE/MANY aggregation along ancestor chains
//! - [`emitter`]: per-element FHIRPath expressions and the CQL, Pathling and
//!   FHIR Search dialects
//! - [`rewrite`]: the string rules the dialects are built from
//! - [`composite`]: the code + value splice for composite attributes
//!
//! # Example
//!
//! ```ignore
//! use octofhir_onto_path::{ChainResolver, Dialect, emit};
//!
//! let resolver = ChainResolver::new(&registry);
//! let chain = resolver.resolve(&start, "Specimen.collection.collected[x]")?;
//! assert_eq!(emit(&chain, Dialect::Cql)?, "collection.collected.as(dateTime)");
//! ```

pub mod cardinality;
pub mod composite;
pub mod emitter;
pub mod resolver;
pub mod rewrite;

pub use cardinality::{CompatibleElement, SimpleCardinality, aggregate, aggregate_chain, aggregate_element, compatible_element};
pub use composite::{composite_code, composite_path, composite_value_type};
pub use emitter::{Dialect, element_expressions, element_type, emit, emit_all, term_code_path};
pub use resolver::{ChainResolver, DEFAULT_MAX_DEPTH, ResolvedChain, ResolvedElement, ResolverOptions};
