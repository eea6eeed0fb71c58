//! Typed element definitions

use crate::TermCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// FHIR type code of an element
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ElementType {
    Coding,
    CodeableConcept,
    Reference,
    Extension,
    DateTime,
    Date,
    Period,
    Quantity,
    Age,
    Code,
    Boolean,
    Integer,
    Decimal,
    String,
    Uri,
    BackboneElement,
    Other(String),
}

impl ElementType {
    /// The FHIR type code
    pub fn as_str(&self) -> &str {
        match self {
            Self::Coding => "Coding",
            Self::CodeableConcept => "CodeableConcept",
            Self::Reference => "Reference",
            Self::Extension => "Extension",
            Self::DateTime => "dateTime",
            Self::Date => "date",
            Self::Period => "Period",
            Self::Quantity => "Quantity",
            Self::Age => "Age",
            Self::Code => "code",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::String => "string",
            Self::Uri => "uri",
            Self::BackboneElement => "BackboneElement",
            Self::Other(code) => code,
        }
    }

    /// Type code with the first letter upper-cased, as used in combined
    /// polymorphic names (`onset` + `DateTime`).
    pub fn capitalized(&self) -> String {
        let code = self.as_str();
        let mut chars = code.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl From<&str> for ElementType {
    fn from(code: &str) -> Self {
        match code {
            "Coding" => Self::Coding,
            "CodeableConcept" => Self::CodeableConcept,
            "Reference" => Self::Reference,
            "Extension" => Self::Extension,
            "dateTime" => Self::DateTime,
            "date" => Self::Date,
            "Period" => Self::Period,
            "Quantity" => Self::Quantity,
            "Age" => Self::Age,
            "code" => Self::Code,
            "boolean" => Self::Boolean,
            "integer" => Self::Integer,
            "decimal" => Self::Decimal,
            "string" => Self::String,
            "uri" => Self::Uri,
            "BackboneElement" => Self::BackboneElement,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ElementType {
    fn from(code: String) -> Self {
        Self::from(code.as_str())
    }
}

impl From<ElementType> for String {
    fn from(ty: ElementType) -> Self {
        ty.as_str().to_string()
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of an element's declared type list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRef {
    pub code: ElementType,
    /// Profiles the value must conform to (extension definitions for `Extension`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<String>,
    /// Allowed target profiles for `Reference`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_profiles: Vec<String>,
}

impl TypeRef {
    pub fn new(code: ElementType) -> Self {
        Self {
            code,
            profiles: Vec::new(),
            target_profiles: Vec::new(),
        }
    }

    pub fn with_profile(mut self, url: impl Into<String>) -> Self {
        self.profiles.push(url.into());
        self
    }

    pub fn with_target_profile(mut self, url: impl Into<String>) -> Self {
        self.target_profiles.push(url.into());
        self
    }
}

/// Which cardinality bound to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardinalityKind {
    Min,
    Max,
}

/// One row of a profile snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDefinition {
    pub id: String,
    pub path: String,
    pub slice_name: Option<String>,
    pub types: Vec<TypeRef>,
    pub min: u32,
    /// Upper bound as declared: a number or `*`
    pub max: String,
    /// `base.path` of the element, used to find the data type a bare `Coding` lives in
    pub base_path: Option<String>,
    /// `binding.valueSet`
    pub value_set: Option<String>,
    /// Codings from `pattern`/`fixed` `Coding` or `CodeableConcept`
    pub pattern_codings: Vec<TermCode>,
    /// `patternCode`/`fixedCode`
    pub pattern_code: Option<String>,
    /// `patternUri`/`fixedUri`
    pub pattern_uri: Option<String>,
}

impl ElementDefinition {
    /// Create an element from its id. The path is the id with slice names removed.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let path = crate::element_id::strip_slices(&id);
        let slice_name = id
            .rsplit('.')
            .next()
            .and_then(|last| last.split_once(':'))
            .map(|(_, name)| name.to_string());
        Self {
            id,
            path,
            slice_name,
            types: Vec::new(),
            min: 0,
            max: "1".to_string(),
            base_path: None,
            value_set: None,
            pattern_codings: Vec::new(),
            pattern_code: None,
            pattern_uri: None,
        }
    }

    pub fn with_type(mut self, code: ElementType) -> Self {
        self.types.push(TypeRef::new(code));
        self
    }

    pub fn with_type_ref(mut self, type_ref: TypeRef) -> Self {
        self.types.push(type_ref);
        self
    }

    pub fn with_cardinality(mut self, min: u32, max: impl Into<String>) -> Self {
        self.min = min;
        self.max = max.into();
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    pub fn with_value_set(mut self, url: impl Into<String>) -> Self {
        self.value_set = Some(url.into());
        self
    }

    pub fn with_pattern_coding(mut self, coding: TermCode) -> Self {
        self.pattern_codings.push(coding);
        self
    }

    pub fn with_pattern_code(mut self, code: impl Into<String>) -> Self {
        self.pattern_code = Some(code.into());
        self
    }

    pub fn with_pattern_uri(mut self, uri: impl Into<String>) -> Self {
        self.pattern_uri = Some(uri.into());
        self
    }

    /// The declared type codes as a set
    pub fn type_codes(&self) -> BTreeSet<ElementType> {
        self.types.iter().map(|t| t.code.clone()).collect()
    }

    pub fn has_type(&self, code: &ElementType) -> bool {
        self.types.iter().any(|t| &t.code == code)
    }

    /// First declared type entry with the given code
    pub fn type_ref(&self, code: &ElementType) -> Option<&TypeRef> {
        self.types.iter().find(|t| &t.code == code)
    }

    /// Polymorphic (`[x]`) element
    pub fn is_choice(&self) -> bool {
        self.path.contains("[x]")
    }

    /// Raw cardinality bound as written in the profile
    pub fn cardinality(&self, kind: CardinalityKind) -> String {
        match kind {
            CardinalityKind::Min => self.min.to_string(),
            CardinalityKind::Max => self.max.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("dateTime", ElementType::DateTime)]
    #[case("Coding", ElementType::Coding)]
    #[case("Reference", ElementType::Reference)]
    #[case("Ratio", ElementType::Other("Ratio".to_string()))]
    fn test_element_type_from_code(#[case] code: &str, #[case] expected: ElementType) {
        assert_eq!(ElementType::from(code), expected);
        assert_eq!(expected.as_str(), code);
    }

    #[test]
    fn test_capitalized() {
        assert_eq!(ElementType::DateTime.capitalized(), "DateTime");
        assert_eq!(ElementType::CodeableConcept.capitalized(), "CodeableConcept");
        assert_eq!(ElementType::Code.capitalized(), "Code");
    }

    #[test]
    fn test_element_from_sliced_id() {
        let elem = ElementDefinition::new("Specimen.collection.bodySite.coding:icd-o-3");
        assert_eq!(elem.path, "Specimen.collection.bodySite.coding");
        assert_eq!(elem.slice_name.as_deref(), Some("icd-o-3"));

        let nested = ElementDefinition::new("Observation.component:systolic.value[x]");
        assert_eq!(nested.path, "Observation.component.value[x]");
        assert_eq!(nested.slice_name, None);
        assert!(nested.is_choice());
    }

    #[test]
    fn test_type_serde_as_string() {
        let type_ref = TypeRef::new(ElementType::Reference)
            .with_target_profile("http://hl7.org/fhir/StructureDefinition/Condition");
        let json = serde_json::to_value(&type_ref).unwrap();
        assert_eq!(json["code"], "Reference");
        let back: TypeRef = serde_json::from_value(json).unwrap();
        assert_eq!(back, type_ref);
    }
}
