//! Mapping generation
//!
//! Applies querying metadata entries to the profiles of a module and emits
//! one mapping per entry in each of three dialects: CQL, FHIR Search and
//! Pathling. The term codes of every entry are collected alongside into a
//! [`MappingTreeLookup`] keyed by `(context, term code)`.
//!
//! ```ignore
//! use octofhir_onto_mapping::{CqlGenerator, GeneratorContext, MappingGenerator, QueryingMetaDataIndex};
//!
//! let (metadata, _) = QueryingMetaDataIndex::from_module_dir("modules/biobank/QueryingMetaData")?;
//! let generator = CqlGenerator::new(GeneratorContext::new(&registry, &terminology));
//! let (module, generated) = generator.generate_module("biobank", &metadata, Default::default());
//! ```

pub mod generator;
pub mod mapping;
pub mod querying_metadata;
pub mod search_parameter;
pub mod term_codes;

pub use generator::{
    CqlGenerator, FhirSearchGenerator, GeneratorContext, GeneratorOptions, MappingGenerator, PathlingGenerator,
    mapping_name,
};
pub use mapping::{
    CqlAttribute, CqlMapping, CqlTypedPath, FhirSearchAttribute, FhirSearchMapping, GenerationReport, MappingTable,
    MappingTreeLookup, ModuleMappings, NamedMapping, PathlingAttribute, PathlingMapping, attribute_key_code,
};
pub use querying_metadata::{AttributeSpec, QueryingMetaDataIndex, ResourceQueryingMetaData};
pub use search_parameter::{SearchParameter, SearchParameterIndex, SearchParameterMatcher};
