//! ModelInfo type index

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The retrievable types of one data model, keyed by unqualified type name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub version: String,
    pub types: BTreeMap<String, TypeInfo>,
}

impl ModelInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            types: BTreeMap::new(),
        }
    }

    /// Look up a type by name; a `FHIR.` style model qualifier is ignored
    pub fn get_type(&self, name: &str) -> Option<&TypeInfo> {
        let unqualified = name
            .strip_prefix(self.name.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(name);
        self.types.get(unqualified)
    }

    /// Names of the types a query can retrieve directly
    pub fn retrievable_types(&self) -> impl Iterator<Item = &str> {
        self.types.values().filter(|t| t.retrievable).map(|t| t.name.as_str())
    }
}

/// What mapping generation needs to know about one type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub name: String,
    pub retrievable: bool,
    /// Element queries filter on when only a code is given
    pub primary_code_path: Option<String>,
}
