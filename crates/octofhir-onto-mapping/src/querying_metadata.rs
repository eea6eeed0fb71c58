//! Querying metadata
//!
//! A querying-metadata entry tells the generators which elements of a
//! profile carry the term code, the value, the time restriction and the
//! attributes of a criterion.

use indexmap::IndexMap;
use octofhir_onto_diagnostics::{OntoError, Result, ONTO0207, ONTO0401};
use octofhir_onto_model::{LoadError, LoadStats, TermCode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// Value types a querying-metadata entry may declare
pub const ALLOWED_VALUE_TYPES: &[&str] = &["code", "concept", "quantity", "Age", "reference", "integer", "calculated"];

/// Name of the optional per-module binding file
pub const PROFILE_BINDING_FILE: &str = "profile_to_query_meta_data_resolver_mapping.json";

const METADATA_DIR: &str = "QueryingMetaData";
const METADATA_SUFFIX: &str = "QueryingMetaData";

fn default_optional() -> bool {
    true
}

/// How one attribute of a criterion is found and typed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawAttributeSpec")]
pub struct AttributeSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub attribute_type: Option<String>,
    pub optional: bool,
}

impl AttributeSpec {
    pub fn new(attribute_type: impl Into<String>) -> Self {
        Self {
            name: None,
            attribute_type: Some(attribute_type.into()),
            optional: true,
        }
    }

    pub fn type_str(&self) -> &str {
        self.attribute_type.as_deref().unwrap_or_default()
    }
}

// Older metadata files map an id straight to its type string
#[derive(Deserialize)]
#[serde(untagged)]
enum RawAttributeSpec {
    Type(String),
    Full {
        #[serde(default)]
        name: Option<String>,
        #[serde(rename = "type", default)]
        attribute_type: Option<String>,
        #[serde(default = "default_optional")]
        optional: bool,
    },
}

impl From<RawAttributeSpec> for AttributeSpec {
    fn from(raw: RawAttributeSpec) -> Self {
        match raw {
            RawAttributeSpec::Type(attribute_type) => Self::new(attribute_type),
            RawAttributeSpec::Full {
                name,
                attribute_type,
                optional,
            } => Self {
                name,
                attribute_type,
                optional,
            },
        }
    }
}

/// Extraction rules for one criterion of a resource type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceQueryingMetaData {
    #[serde(default)]
    pub name: String,
    pub context: TermCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<TermCode>,
    pub resource_type: String,
    /// Profile the entry applies to, when not implied by its file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_defining_id: Option<String>,
    #[serde(default = "default_optional")]
    pub value_optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_code_defining_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_codes: Option<Vec<TermCode>>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attribute_defining_id_type_map: IndexMap<String, AttributeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_restriction_defining_id: Option<String>,
}

impl ResourceQueryingMetaData {
    pub fn new(name: impl Into<String>, resource_type: impl Into<String>, context: TermCode) -> Self {
        Self {
            name: name.into(),
            context,
            module: None,
            resource_type: resource_type.into(),
            profile: None,
            value_type: None,
            value_defining_id: None,
            value_optional: true,
            term_code_defining_id: None,
            term_codes: None,
            attribute_defining_id_type_map: IndexMap::new(),
            time_restriction_defining_id: None,
        }
    }

    pub fn with_term_code_id(mut self, id: impl Into<String>) -> Self {
        self.term_code_defining_id = Some(id.into());
        self
    }

    pub fn with_term_codes(mut self, codes: Vec<TermCode>) -> Self {
        self.term_codes = Some(codes);
        self
    }

    pub fn with_value(mut self, id: impl Into<String>, value_type: impl Into<String>) -> Self {
        self.value_defining_id = Some(id.into());
        self.value_type = Some(value_type.into());
        self
    }

    pub fn with_time_restriction(mut self, id: impl Into<String>) -> Self {
        self.time_restriction_defining_id = Some(id.into());
        self
    }

    pub fn with_attribute(mut self, id: impl Into<String>, attribute_type: impl Into<String>) -> Self {
        self.attribute_defining_id_type_map
            .insert(id.into(), AttributeSpec::new(attribute_type));
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| OntoError::system(ONTO0401, format!("Invalid querying metadata: {e}")))
    }

    /// Check the cross-field rules of an entry
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| {
            Err(OntoError::mapping(ONTO0207, message).with_context(format!("querying metadata '{}'", self.name)))
        };

        if self.value_defining_id.is_some() && self.value_type.is_none() {
            return invalid("'value_defining_id' is set without a 'value_type'".to_string());
        }
        if let Some(value_type) = &self.value_type {
            if !ALLOWED_VALUE_TYPES.contains(&value_type.as_str()) {
                return invalid(format!(
                    "Value type '{value_type}' is not one of [{}]",
                    ALLOWED_VALUE_TYPES.join(", ")
                ));
            }
        }
        if let Some((id, _)) = self
            .attribute_defining_id_type_map
            .iter()
            .find(|(_, spec)| spec.type_str().is_empty())
        {
            return invalid(format!("Attribute '{id}' has no type"));
        }
        if self.term_code_defining_id.is_none() && self.term_codes.as_ref().is_none_or(Vec::is_empty) {
            return invalid("Either 'term_code_defining_id' or 'term_codes' is required".to_string());
        }
        Ok(())
    }
}

/// Querying metadata of a module, grouped by profile name
#[derive(Debug, Clone, Default)]
pub struct QueryingMetaDataIndex {
    by_profile: IndexMap<String, Vec<ResourceQueryingMetaData>>,
}

impl QueryingMetaDataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, profile_name: impl Into<String>, metadata: ResourceQueryingMetaData) {
        self.by_profile.entry(profile_name.into()).or_default().push(metadata);
    }

    pub fn with_entry(mut self, profile_name: impl Into<String>, metadata: ResourceQueryingMetaData) -> Self {
        self.insert(profile_name, metadata);
        self
    }

    /// Entries bound to a profile, in load order
    pub fn for_profile(&self, profile_name: &str) -> &[ResourceQueryingMetaData] {
        self.by_profile.get(profile_name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn profiles(&self) -> impl Iterator<Item = &str> {
        self.by_profile.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_profile.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load the querying metadata of one module directory.
    ///
    /// With a binding file present, only the bound entries are read.
    /// Otherwise every file below `QueryingMetaData/` is read and bound by
    /// its `profile` field or its file name. Invalid files are logged and
    /// counted.
    pub fn from_module_dir(module_dir: impl AsRef<Path>) -> Result<(Self, LoadStats)> {
        let module_dir = module_dir.as_ref();
        let metadata_dir = module_dir.join(METADATA_DIR);
        let mut index = Self::new();
        let mut stats = LoadStats::default();

        let binding_file = module_dir.join(PROFILE_BINDING_FILE);
        if binding_file.is_file() {
            let content = fs::read_to_string(&binding_file)?;
            let bindings: IndexMap<String, Vec<String>> = serde_json::from_str(&content).map_err(|e| {
                OntoError::system(ONTO0401, format!("Invalid profile binding file: {e}"))
                    .with_context(binding_file.display().to_string())
            })?;
            for (profile, names) in bindings {
                for name in names {
                    let path = metadata_dir.join(format!("{name}{METADATA_SUFFIX}.json"));
                    if let Some(metadata) = load_counted(&path, &mut stats) {
                        index.insert(profile.clone(), metadata);
                    }
                }
            }
            return Ok((index, stats));
        }

        if !metadata_dir.is_dir() {
            log::debug!("No querying metadata in {}", module_dir.display());
            return Ok((index, stats));
        }

        let files = WalkDir::new(&metadata_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(DirEntry::into_path)
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"));

        for path in files {
            let Some(metadata) = load_counted(&path, &mut stats) else { continue };
            let profile = match &metadata.profile {
                Some(profile) => profile.clone(),
                None => profile_name_from_file(&path),
            };
            index.insert(profile, metadata);
        }
        Ok((index, stats))
    }
}

fn load_file(path: &Path) -> Result<ResourceQueryingMetaData> {
    let content = fs::read_to_string(path)?;
    let metadata = ResourceQueryingMetaData::from_json(&content)?;
    metadata.validate()?;
    Ok(metadata)
}

fn load_counted(path: &Path, stats: &mut LoadStats) -> Option<ResourceQueryingMetaData> {
    match load_file(path) {
        Ok(metadata) => {
            stats.loaded += 1;
            Some(metadata)
        }
        Err(err) => {
            log::warn!("Skipping querying metadata {}: {err}", path.display());
            stats.skipped += 1;
            stats.errors.push(LoadError {
                file_path: path.to_path_buf(),
                error_message: err.to_string(),
            });
            None
        }
    }
}

fn profile_name_from_file(path: &Path) -> String {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    stem.strip_suffix(METADATA_SUFFIX).unwrap_or(stem).to_string()
}
