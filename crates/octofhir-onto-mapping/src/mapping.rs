//! Generated mapping documents
//!
//! One mapping per querying-metadata entry and dialect. Tables serialize as
//! JSON arrays ordered by mapping name so repeated runs produce identical
//! files.

use octofhir_onto_diagnostics::OntoError;
use octofhir_onto_model::{ElementType, TermCode};
use octofhir_onto_path::SimpleCardinality;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

/// System of attribute keys that are derived from element ids
pub const ATTRIBUTE_KEY_SYSTEM: &str = "http://hl7.org/fhir/StructureDefinition";

/// Attribute key as a term code whose code and display are the key itself
pub fn attribute_key_code(key: &str) -> TermCode {
    TermCode::new(ATTRIBUTE_KEY_SYSTEM, key, key)
}

/// A mapping that can be stored in a [`MappingTable`]
pub trait NamedMapping {
    fn name(&self) -> &str;
}

/// A CQL path together with its target types and cardinality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CqlTypedPath {
    pub path: String,
    pub types: BTreeSet<ElementType>,
    pub cardinality: SimpleCardinality,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CqlAttribute {
    pub key: TermCode,
    pub types: BTreeSet<ElementType>,
    pub path: String,
    pub cardinality: SimpleCardinality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_target_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CqlMapping {
    pub name: String,
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_code: Option<CqlTypedPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<CqlTypedPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_restriction: Option<CqlTypedPath>,
    #[serde(default)]
    pub attributes: Vec<CqlAttribute>,
}

impl CqlMapping {
    pub fn new(name: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_type: resource_type.into(),
            term_code: None,
            value: None,
            time_restriction: None,
            attributes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FhirSearchAttribute {
    pub attribute_key: TermCode,
    pub attribute_type: String,
    pub attribute_search_parameter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite_code: Option<TermCode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FhirSearchMapping {
    pub name: String,
    pub fhir_resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_code_search_parameter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_search_parameter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_restriction_parameter: Option<String>,
    #[serde(default)]
    pub attribute_search_parameters: Vec<FhirSearchAttribute>,
}

impl FhirSearchMapping {
    pub fn new(name: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fhir_resource_type: resource_type.into(),
            term_code_search_parameter: None,
            value_search_parameter: None,
            value_type: None,
            time_restriction_parameter: None,
            attribute_search_parameters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathlingAttribute {
    pub attribute_key: TermCode,
    pub attribute_path: String,
    pub types: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathlingMapping {
    pub name: String,
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_code_fhir_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_fhir_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_restriction_fhir_path: Option<String>,
    #[serde(default)]
    pub attribute_fhir_paths: Vec<PathlingAttribute>,
}

impl PathlingMapping {
    pub fn new(name: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_type: resource_type.into(),
            term_code_fhir_path: None,
            value_fhir_path: None,
            value_type: None,
            time_restriction_fhir_path: None,
            attribute_fhir_paths: Vec::new(),
        }
    }
}

macro_rules! impl_named_mapping {
    ($($ty:ty),*) => {
        $(impl NamedMapping for $ty {
            fn name(&self) -> &str {
                &self.name
            }
        })*
    };
}

impl_named_mapping!(CqlMapping, FhirSearchMapping, PathlingMapping);

/// Mappings by name
#[derive(Debug, Clone, PartialEq)]
pub struct MappingTable<M> {
    entries: BTreeMap<String, M>,
}

impl<M> Default for MappingTable<M> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<M: NamedMapping> MappingTable<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping; an existing mapping of the same name is kept
    pub fn insert(&mut self, mapping: M) -> bool {
        if self.entries.contains_key(mapping.name()) {
            return false;
        }
        self.entries.insert(mapping.name().to_string(), mapping);
        true
    }

    pub fn get(&self, name: &str) -> Option<&M> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mappings ordered by name
    pub fn iter(&self) -> impl Iterator<Item = &M> {
        self.entries.values()
    }

    pub fn extend(&mut self, other: MappingTable<M>) {
        for mapping in other.entries.into_values() {
            self.insert(mapping);
        }
    }
}

impl<M: Serialize> Serialize for MappingTable<M> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
        for mapping in self.entries.values() {
            seq.serialize_element(mapping)?;
        }
        seq.end()
    }
}

impl<'de, M: NamedMapping + Deserialize<'de>> Deserialize<'de> for MappingTable<M> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mappings = Vec::<M>::deserialize(deserializer)?;
        let mut table = Self::new();
        for mapping in mappings {
            table.insert(mapping);
        }
        Ok(table)
    }
}

#[derive(Serialize, Deserialize)]
struct LookupEntry {
    context: TermCode,
    key: TermCode,
    mapping: String,
}

/// (context, term code) → mapping name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingTreeLookup {
    entries: BTreeMap<(TermCode, TermCode), String>,
}

impl MappingTreeLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, context: TermCode, term_code: TermCode, mapping: impl Into<String>) {
        self.entries.insert((context, term_code), mapping.into());
    }

    pub fn get(&self, context: &TermCode, term_code: &TermCode) -> Option<&str> {
        self.entries
            .get(&(context.clone(), term_code.clone()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn extend(&mut self, other: MappingTreeLookup) {
        self.entries.extend(other.entries);
    }
}

impl Serialize for MappingTreeLookup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
        for ((context, key), mapping) in &self.entries {
            seq.serialize_element(&LookupEntry {
                context: context.clone(),
                key: key.clone(),
                mapping: mapping.clone(),
            })?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for MappingTreeLookup {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<LookupEntry>::deserialize(deserializer)?;
        Ok(Self {
            entries: entries
                .into_iter()
                .map(|e| ((e.context, e.key), e.mapping))
                .collect(),
        })
    }
}

/// Entries a generation run could not map
#[derive(Debug, Default)]
pub struct GenerationReport {
    pub generated: usize,
    pub skipped: Vec<(String, OntoError)>,
}

impl GenerationReport {
    pub fn skip(&mut self, name: impl Into<String>, error: OntoError) {
        let name = name.into();
        log::error!("Skipping mapping '{name}': {error}");
        self.skipped.push((name, error));
    }

    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    pub fn merge(&mut self, other: GenerationReport) {
        self.generated += other.generated;
        self.skipped.extend(other.skipped);
    }
}

/// Output of one generator over one module
#[derive(Debug)]
pub struct ModuleMappings<M> {
    pub mappings: MappingTable<M>,
    pub lookup: MappingTreeLookup,
    pub report: GenerationReport,
}

impl<M> Default for ModuleMappings<M> {
    fn default() -> Self {
        Self {
            mappings: MappingTable::default(),
            lookup: MappingTreeLookup::default(),
            report: GenerationReport::default(),
        }
    }
}
