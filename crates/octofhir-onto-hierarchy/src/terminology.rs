//! Terminology integration
//!
//! The hierarchy builder and term-code extraction talk to a terminology
//! server through the [`Terminology`] trait. Transport, retries and
//! certificates belong to the implementor.

use crate::closure::{check_single_version, ClosureResponse};
use octofhir_onto_diagnostics::{OntoError, Result, ONTO0302, ONTO0401};
use octofhir_onto_model::TermCode;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// Terminology operations the generators depend on
pub trait Terminology: Send + Sync {
    /// Display of a code, `None` when the server does not know it
    fn lookup_display(&self, system: &str, code: &str) -> Result<Option<String>>;

    /// Codes of a value set expansion
    fn expand_value_set(&self, url: &str) -> Result<BTreeSet<TermCode>>;

    /// Run the `$closure` operation for `codes` on the named closure table
    fn get_closure(&self, codes: &[TermCode], closure_name: &str) -> Result<ClosureResponse>;
}

/// Closure of `codes`, rejecting inputs that mix code system versions
pub fn get_closure_map(terminology: &dyn Terminology, codes: &[TermCode], closure_name: &str) -> Result<ClosureResponse> {
    check_single_version(codes)?;
    terminology.get_closure(codes, closure_name)
}

/// Title-case a display that is written in capitals only
pub fn normalize_display(display: &str) -> String {
    let has_cased = display.chars().any(char::is_alphabetic);
    if !has_cased || display.chars().any(char::is_lowercase) {
        return display.to_string();
    }

    let mut out = String::with_capacity(display.len());
    let mut word_start = true;
    for c in display.chars() {
        if c.is_alphabetic() {
            if word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            out.push(c);
            word_start = true;
        }
    }
    out
}

/// A FHIR ValueSet carrying an expansion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValueSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expansion: Option<Expansion>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Expansion {
    #[serde(default)]
    pub parameter: Vec<ExpansionParameter>,
    #[serde(default)]
    pub contains: Vec<ExpansionContains>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionParameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_uri: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpansionContains {
    pub system: String,
    pub code: String,
    #[serde(default)]
    pub display: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ValueSet {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| OntoError::system(ONTO0401, format!("Invalid ValueSet: {e}")))
    }

    /// Term codes of the expansion.
    ///
    /// A `version` expansion parameter (`system|version`) applies to every
    /// entry without its own version. Capitalised displays are title-cased.
    pub fn term_codes(&self) -> BTreeSet<TermCode> {
        let Some(expansion) = &self.expansion else {
            log::warn!(
                "Value set '{}' has no expansion",
                self.url.as_deref().unwrap_or("<anonymous>")
            );
            return BTreeSet::new();
        };
        let global_version = expansion
            .parameter
            .iter()
            .filter(|p| p.name == "version")
            .filter_map(|p| p.value_uri.as_deref())
            .filter_map(|uri| uri.rsplit('|').next())
            .last();

        expansion
            .contains
            .iter()
            .map(|entry| {
                let term_code = TermCode::new(entry.system.as_str(), entry.code.as_str(), normalize_display(&entry.display));
                match entry.version.as_deref().or(global_version) {
                    Some(version) => term_code.with_version(version),
                    None => term_code,
                }
            })
            .collect()
    }
}

/// Offline terminology backed by in-memory tables.
///
/// Loaded from `{"displays": {system: {code: display}}, "valueSets": {url:
/// [TermCode]}, "closures": {name: ConceptMap}}` or assembled with the
/// `with_*` builders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InMemoryTerminology {
    #[serde(default)]
    displays: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    value_sets: BTreeMap<String, Vec<TermCode>>,
    #[serde(default)]
    closures: BTreeMap<String, ClosureResponse>,
}

impl InMemoryTerminology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| OntoError::system(ONTO0401, format!("Invalid terminology document: {e}")))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::from_json(&content).map_err(|e| e.with_context(path.display().to_string()))
    }

    pub fn with_display(mut self, system: impl Into<String>, code: impl Into<String>, display: impl Into<String>) -> Self {
        self.displays
            .entry(system.into())
            .or_default()
            .insert(code.into(), display.into());
        self
    }

    pub fn with_value_set(mut self, url: impl Into<String>, codes: impl IntoIterator<Item = TermCode>) -> Self {
        self.value_sets.insert(url.into(), codes.into_iter().collect());
        self
    }

    pub fn with_closure(mut self, name: impl Into<String>, closure: ClosureResponse) -> Self {
        self.closures.insert(name.into(), closure);
        self
    }
}

impl Terminology for InMemoryTerminology {
    fn lookup_display(&self, system: &str, code: &str) -> Result<Option<String>> {
        Ok(self.displays.get(system).and_then(|codes| codes.get(code)).cloned())
    }

    fn expand_value_set(&self, url: &str) -> Result<BTreeSet<TermCode>> {
        let codes = self
            .value_sets
            .get(url)
            .ok_or_else(|| OntoError::hierarchy(ONTO0302, format!("Value set '{url}' is unknown")))?;
        Ok(codes
            .iter()
            .map(|code| TermCode {
                display: normalize_display(&code.display),
                ..code.clone()
            })
            .collect())
    }

    fn get_closure(&self, codes: &[TermCode], closure_name: &str) -> Result<ClosureResponse> {
        let closure = self
            .closures
            .get(closure_name)
            .ok_or_else(|| OntoError::hierarchy(ONTO0302, format!("Closure table '{closure_name}' is unknown")))?;
        let requested: BTreeSet<&str> = codes.iter().map(|c| c.code.as_str()).collect();

        // Only the rows and edges of the requested concepts are returned
        let mut response = closure.clone();
        for group in &mut response.group {
            group.element.retain(|e| requested.contains(e.code.as_str()));
            for element in &mut group.element {
                element.target.retain(|t| requested.contains(t.code.as_str()));
            }
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_onto_diagnostics::ONTO0301;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::io::Write;

    const SCT: &str = "http://snomed.info/sct";

    #[rstest]
    #[case("BLOOD SPECIMEN", "Blood Specimen")]
    #[case("CT-SCAN OF HEAD", "Ct-Scan Of Head")]
    #[case("Blood specimen", "Blood specimen")]
    #[case("C50.1", "C50.1")]
    #[case("", "")]
    fn test_normalize_display(#[case] display: &str, #[case] expected: &str) {
        assert_eq!(normalize_display(display), expected);
    }

    #[test]
    fn test_value_set_global_version() {
        let json = r#"{
            "url": "https://example.org/ValueSet/specimen-types",
            "expansion": {
                "parameter": [{"name": "version", "valueUri": "http://snomed.info/sct|http://snomed.info/sct/900000000000207008/version/20240201"}],
                "contains": [
                    {"system": "http://snomed.info/sct", "code": "119297000", "display": "BLOOD SPECIMEN"},
                    {"system": "http://snomed.info/sct", "code": "122555007", "display": "Venous blood specimen", "version": "2023"}
                ]
            }
        }"#;
        let codes: Vec<_> = ValueSet::from_json(json).unwrap().term_codes().into_iter().collect();
        assert_eq!(codes[0].display, "Blood Specimen");
        assert_eq!(
            codes[0].version.as_deref(),
            Some("http://snomed.info/sct/900000000000207008/version/20240201")
        );
        assert_eq!(codes[1].version.as_deref(), Some("2023"));
    }

    #[test]
    fn test_in_memory_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("terminology.json");
        let mut file = fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{
                "displays": {{"{SCT}": {{"119297000": "Blood specimen"}}}},
                "valueSets": {{"https://example.org/ValueSet/specimen": [
                    {{"system": "{SCT}", "code": "119297000", "display": "BLOOD SPECIMEN"}}
                ]}}
            }}"#
        )
        .unwrap();

        let terminology = InMemoryTerminology::from_file(&path).unwrap();
        assert_eq!(
            terminology.lookup_display(SCT, "119297000").unwrap().as_deref(),
            Some("Blood specimen")
        );
        assert_eq!(terminology.lookup_display(SCT, "0").unwrap(), None);

        let expansion = terminology
            .expand_value_set("https://example.org/ValueSet/specimen")
            .unwrap();
        assert_eq!(expansion.first().map(|c| c.display.as_str()), Some("Blood Specimen"));
        assert_eq!(
            terminology.expand_value_set("https://example.org/missing").unwrap_err().code(),
            ONTO0302
        );
    }

    #[test]
    fn test_closure_map_checks_versions() {
        let terminology = InMemoryTerminology::new().with_closure("dse", ClosureResponse::default());
        let codes = [
            TermCode::new(SCT, "1", "").with_version("a"),
            TermCode::new(SCT, "2", "").with_version("b"),
        ];
        let err = get_closure_map(&terminology, &codes, "dse").unwrap_err();
        assert_eq!(err.code(), ONTO0301);
        assert!(get_closure_map(&terminology, &codes[..1], "dse").is_ok());
    }
}
