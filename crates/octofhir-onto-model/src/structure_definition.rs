//! Raw StructureDefinition documents as found in snapshot files.
//!
//! Only the fields path compilation reads are declared; pattern and fixed
//! values are captured dynamically because their key carries the type name.

use crate::{ElementDefinition, ElementType, TermCode, TypeRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// StructureDefinition resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureDefinition {
    #[serde(rename = "resourceType", default)]
    pub resource_type: Option<String>,
    pub url: String,
    #[serde(default)]
    pub name: String,
    /// Resource or data type the profile constrains
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(rename = "baseDefinition", skip_serializing_if = "Option::is_none")]
    pub base_definition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<ElementList>,
}

/// `snapshot` or `differential` element list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementList {
    #[serde(default)]
    pub element: Vec<RawElement>,
}

/// Element as written in the document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawElement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub path: String,
    #[serde(rename = "sliceName", skip_serializing_if = "Option::is_none")]
    pub slice_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<RawBase>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_info: Option<Vec<RawType>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding: Option<RawBinding>,
    /// Pattern\[x\] and Fixed\[x\] fields - handled dynamically
    #[serde(flatten)]
    pub other_fields: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBase {
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawType {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Vec<String>>,
    #[serde(rename = "targetProfile", skip_serializing_if = "Option::is_none")]
    pub target_profile: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBinding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<String>,
    #[serde(rename = "valueSet", skip_serializing_if = "Option::is_none")]
    pub value_set: Option<String>,
}

/// Coding datatype as embedded in pattern/fixed values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coding {
    pub system: Option<String>,
    pub code: Option<String>,
    pub display: Option<String>,
    pub version: Option<String>,
}

impl Coding {
    /// A coding becomes a term code only when both system and code are present
    pub fn to_term_code(&self) -> Option<TermCode> {
        let mut term_code = TermCode::new(
            self.system.clone()?,
            self.code.clone()?,
            self.display.clone().unwrap_or_default(),
        );
        term_code.version = self.version.clone();
        Some(term_code)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CodeableConcept {
    #[serde(default)]
    coding: Vec<Coding>,
}

impl RawElement {
    fn pattern_or_fixed<T: serde::de::DeserializeOwned>(&self, type_name: &str) -> Option<T> {
        ["pattern", "fixed"].into_iter().find_map(|prefix| {
            let value = self.other_fields.get(&format!("{prefix}{type_name}"))?;
            match serde_json::from_value(value.clone()) {
                Ok(decoded) => Some(decoded),
                Err(err) => {
                    log::warn!("Ignoring malformed {prefix}{type_name} on {}: {err}", self.path);
                    None
                }
            }
        })
    }

    /// Decode into the typed element model
    pub fn into_element(self) -> ElementDefinition {
        let id = self.id.clone().unwrap_or_else(|| self.path.clone());

        let mut pattern_codings = Vec::new();
        if let Some(coding) = self.pattern_or_fixed::<Coding>("Coding") {
            pattern_codings.extend(coding.to_term_code());
        }
        if let Some(concept) = self.pattern_or_fixed::<CodeableConcept>("CodeableConcept") {
            pattern_codings.extend(concept.coding.iter().filter_map(Coding::to_term_code));
        }

        let types = self
            .type_info
            .iter()
            .flatten()
            .map(|t| TypeRef {
                code: ElementType::from(t.code.as_str()),
                profiles: t.profile.clone().unwrap_or_default(),
                target_profiles: t.target_profile.clone().unwrap_or_default(),
            })
            .collect();

        ElementDefinition {
            pattern_code: self.pattern_or_fixed::<String>("Code"),
            pattern_uri: self.pattern_or_fixed::<String>("Uri"),
            id,
            path: self.path,
            slice_name: self.slice_name,
            types,
            min: self.min.unwrap_or(0),
            max: self.max.unwrap_or_else(|| "1".to_string()),
            base_path: self.base.and_then(|b| b.path),
            value_set: self.binding.and_then(|b| b.value_set),
            pattern_codings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_element_with_pattern() {
        let raw: RawElement = serde_json::from_value(serde_json::json!({
            "id": "Specimen.type.coding:sct",
            "path": "Specimen.type.coding",
            "sliceName": "sct",
            "min": 0,
            "max": "1",
            "base": { "path": "CodeableConcept.coding", "min": 0, "max": "*" },
            "type": [{ "code": "Coding" }],
            "patternCoding": { "system": "http://snomed.info/sct", "code": "123038009" },
            "short": "ignored"
        }))
        .unwrap();

        let element = raw.into_element();
        assert_eq!(element.id, "Specimen.type.coding:sct");
        assert_eq!(element.slice_name.as_deref(), Some("sct"));
        assert_eq!(element.base_path.as_deref(), Some("CodeableConcept.coding"));
        assert_eq!(element.types, vec![TypeRef::new(ElementType::Coding)]);
        assert_eq!(
            element.pattern_codings,
            vec![TermCode::new("http://snomed.info/sct", "123038009", "")]
        );
    }

    #[test]
    fn test_decode_fixed_code_and_uri() {
        let raw: RawElement = serde_json::from_value(serde_json::json!({
            "id": "Observation.code.coding:loinc.code",
            "path": "Observation.code.coding.code",
            "fixedCode": "8480-6",
            "patternUri": "http://loinc.org"
        }))
        .unwrap();

        let element = raw.into_element();
        assert_eq!(element.pattern_code.as_deref(), Some("8480-6"));
        assert_eq!(element.pattern_uri.as_deref(), Some("http://loinc.org"));
        assert_eq!(element.max, "1");
    }
}
