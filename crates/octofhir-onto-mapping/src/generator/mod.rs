//! Mapping generators
//!
//! Every dialect generator turns one querying-metadata entry applied to one
//! profile into one mapping. [`MappingGenerator::generate_module`] drives a
//! generator over a module, fills the context + term code lookup and
//! collects per-entry failures instead of aborting.

mod cql;
mod fhir_search;
mod pathling;

pub use cql::CqlGenerator;
pub use fhir_search::FhirSearchGenerator;
pub use pathling::PathlingGenerator;

use crate::mapping::{ModuleMappings, NamedMapping};
use crate::querying_metadata::{QueryingMetaDataIndex, ResourceQueryingMetaData};
use crate::term_codes::metadata_term_codes;
use octofhir_onto_diagnostics::{ErrorBuilder, Result, ONTO0104, ONTO0201};
use octofhir_onto_hierarchy::Terminology;
use octofhir_onto_model::{element_id, ElementType, ProfileProvider, ProfileRegistry, RegisteredProfile};
use octofhir_onto_path::{ChainResolver, ResolvedChain, ResolverOptions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Types a time restriction element may have
pub const TIME_RESTRICTION_TYPES: &[ElementType] = &[ElementType::Date, ElementType::DateTime, ElementType::Period];

/// Types a term code element may have
pub const TERM_CODE_TYPES: &[ElementType] = &[ElementType::Coding, ElementType::CodeableConcept, ElementType::Reference];

/// Types a value element may have
pub const VALUE_TYPES: &[ElementType] = &[
    ElementType::Code,
    ElementType::Date,
    ElementType::Coding,
    ElementType::CodeableConcept,
    ElementType::Quantity,
];

/// Generator configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratorOptions {
    pub resolver: ResolverOptions,
    /// Leave out term code paths that equal the resource type's primary
    /// code path
    pub skip_primary_code_paths: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            resolver: ResolverOptions::default(),
            skip_primary_code_paths: true,
        }
    }
}

/// Collaborators shared by all generators
#[derive(Clone, Copy)]
pub struct GeneratorContext<'a> {
    pub registry: &'a ProfileRegistry,
    pub terminology: &'a dyn Terminology,
    pub options: GeneratorOptions,
}

impl<'a> GeneratorContext<'a> {
    pub fn new(registry: &'a ProfileRegistry, terminology: &'a dyn Terminology) -> Self {
        Self {
            registry,
            terminology,
            options: GeneratorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GeneratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn resolver(&self) -> ChainResolver<'a> {
        ChainResolver::new(self.registry).with_options(self.options.resolver)
    }

    /// Resource type of the first profile matching the reference target of
    /// the chain's first `Reference` element
    pub fn reference_target_type(&self, chain: &ResolvedChain) -> Result<String> {
        let target = chain
            .iter()
            .flat_map(|resolved| resolved.element().types.iter())
            .find(|type_ref| type_ref.code == ElementType::Reference)
            .and_then(|type_ref| type_ref.target_profiles.first());
        let Some(target) = target else {
            let last = chain.last();
            return Err(ErrorBuilder::new(ONTO0104, "Attribute has no reference target")
                .element(last.id())
                .profile(last.snapshot().url())
                .module(last.module())
                .mapping());
        };
        Ok(match self.registry.find_matching_profiles(target).first() {
            Some(profile) => profile.snapshot.resource_type().to_string(),
            None => target.rsplit('/').next().unwrap_or(target).to_string(),
        })
    }
}

/// Keep the types a role accepts, failing when none is left
pub(crate) fn allowed_types(
    chain: &ResolvedChain,
    types: BTreeSet<ElementType>,
    allowed: &[ElementType],
    role: &str,
) -> Result<BTreeSet<ElementType>> {
    let kept: BTreeSet<ElementType> = types.iter().filter(|t| allowed.contains(t)).cloned().collect();
    if kept.is_empty() {
        let last = chain.last();
        let found: Vec<&str> = types.iter().map(ElementType::as_str).collect();
        return Err(ErrorBuilder::new(
            ONTO0201,
            format!("{role} element has types [{}], none of them is supported", found.join(", ")),
        )
        .element(last.id())
        .profile(last.snapshot().url())
        .module(last.module())
        .mapping());
    }
    Ok(kept)
}

/// Attribute key of an element id; the id itself when nothing better is found
pub(crate) fn attribute_key(id: &str) -> String {
    element_id::attribute_key(id).unwrap_or_else(|| id.to_string())
}

/// Name of the mapping generated for `metadata`.
///
/// The entry's own name wins. Unnamed entries take the profile name, with
/// the value type and attribute keys appended when the profile carries
/// several entries.
pub fn mapping_name(profile_name: &str, metadata: &ResourceQueryingMetaData, entries_for_profile: usize) -> String {
    if !metadata.name.is_empty() {
        return metadata.name.clone();
    }
    if entries_for_profile <= 1 {
        return profile_name.to_string();
    }
    let mut parts = vec![profile_name.to_string()];
    parts.extend(metadata.value_type.clone());
    parts.extend(metadata.attribute_defining_id_type_map.keys().map(|id| attribute_key(id)));
    parts.join("_")
}

/// A dialect generator
pub trait MappingGenerator {
    type Mapping: NamedMapping;

    fn context(&self) -> &GeneratorContext<'_>;

    /// Build the mapping of one entry applied to `start`
    fn generate(&self, start: &RegisteredProfile, metadata: &ResourceQueryingMetaData, name: &str) -> Result<Self::Mapping>;

    /// Generate the mappings of every profile of `module` that has querying
    /// metadata.
    ///
    /// Names already in `generated` are not generated again but still enter
    /// the lookup. The returned set holds `generated` plus the new names.
    fn generate_module(
        &self,
        module: &str,
        metadata: &QueryingMetaDataIndex,
        mut generated: BTreeSet<String>,
    ) -> (ModuleMappings<Self::Mapping>, BTreeSet<String>) {
        let ctx = self.context();
        let resolver = ctx.resolver();
        let mut out = ModuleMappings::default();

        for snapshot in ctx.registry.snapshots_in(module) {
            let entries = metadata.for_profile(snapshot.name());
            if entries.is_empty() {
                continue;
            }
            let start = RegisteredProfile {
                snapshot: Arc::clone(snapshot),
                module: module.to_string(),
            };

            for entry in entries {
                let name = mapping_name(snapshot.name(), entry, entries.len());
                match metadata_term_codes(&resolver, ctx.terminology, &start, entry) {
                    Ok(codes) => {
                        for code in codes {
                            out.lookup.insert(entry.context.clone(), code, name.as_str());
                        }
                    }
                    Err(err) => {
                        out.report.skip(name, err);
                        continue;
                    }
                }

                if generated.contains(&name) {
                    log::debug!("Mapping '{name}' already generated");
                    continue;
                }
                match self.generate(&start, entry, &name) {
                    Ok(mapping) => {
                        out.mappings.insert(mapping);
                        out.report.generated += 1;
                        generated.insert(name);
                    }
                    Err(err) => out.report.skip(name, err),
                }
            }
        }
        (out, generated)
    }
}
