//! FHIR SearchParameter matching
//!
//! Per-element FHIRPath expressions are matched against the expressions of
//! the known SearchParameters. A path without an exact match is retried
//! without its trailing cast, then with its last segment removed, until
//! something matches.

use indexmap::IndexMap;
use octofhir_onto_diagnostics::{OntoError, Result, ONTO0205, ONTO0206, ONTO0401};
use octofhir_onto_path::rewrite::strip_wrapping_parentheses;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

static AS_FUNCTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.as\(([^)]*)\)").expect("valid regex"));
static OF_TYPE_FUNCTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.ofType\(([^)]*)\)").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParameterComponent {
    pub definition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

/// The parts of a FHIR SearchParameter resource the matcher reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParameter {
    #[serde(default)]
    pub url: String,
    pub code: String,
    #[serde(default)]
    pub base: Vec<String>,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub component: Vec<SearchParameterComponent>,
}

impl SearchParameter {
    pub fn new(
        url: impl Into<String>,
        code: impl Into<String>,
        param_type: impl Into<String>,
        base: &[&str],
        expression: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            code: code.into(),
            base: base.iter().map(|b| b.to_string()).collect(),
            param_type: param_type.into(),
            expression: Some(expression.into()),
            target: Vec::new(),
            component: Vec::new(),
        }
    }

    pub fn with_target(mut self, target: &[&str]) -> Self {
        self.target = target.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_components(mut self, first: impl Into<String>, second: impl Into<String>) -> Self {
        self.component = [first.into(), second.into()]
            .into_iter()
            .map(|definition| SearchParameterComponent {
                definition,
                expression: None,
            })
            .collect();
        self
    }

    pub fn is_composite(&self) -> bool {
        self.param_type == "composite"
    }

    /// Expressions split on ` | ` with casts written as ` as X`
    pub fn cleaned_expressions(&self) -> Vec<String> {
        let Some(expression) = self.expression.as_deref() else {
            return Vec::new();
        };
        expression
            .split(" | ")
            .map(|part| {
                let part = strip_wrapping_parentheses(part.trim());
                let part = AS_FUNCTION.replace_all(part, " as $1");
                OF_TYPE_FUNCTION.replace_all(&part, " as $1").into_owned()
            })
            .collect()
    }
}

/// Lookup contract the FHIR Search generator needs
pub trait SearchParameterMatcher: Send + Sync {
    /// Search parameter per expression, keyed by the (possibly shortened)
    /// expression that matched
    fn find_search_parameter(&self, paths: &[String]) -> Result<IndexMap<String, SearchParameter>>;

    /// The composite parameter whose two components are the given
    /// parameters, keyed by `"{first}.where({second})"`
    fn find_composite_search_parameter(
        &self,
        components: &IndexMap<String, SearchParameter>,
    ) -> Result<(String, SearchParameter)>;
}

/// Check that every parameter's targets meet the next one's bases
pub fn validate_chainable(params: &[&SearchParameter]) -> Result<()> {
    for pair in params.windows(2) {
        let [current, next] = pair else { continue };
        if !current.target.iter().any(|t| next.base.contains(t)) {
            return Err(OntoError::mapping(
                ONTO0206,
                format!(
                    "Search parameter '{}' targets [{}] but '{}' applies to [{}]",
                    current.code,
                    current.target.join(", "),
                    next.code,
                    next.base.join(", ")
                ),
            ));
        }
    }
    Ok(())
}

/// Dot-joined codes of a chainable parameter sequence
pub fn chain_search_parameters(params: &[&SearchParameter]) -> Result<String> {
    if params.is_empty() {
        return Err(OntoError::mapping(ONTO0205, "No search parameters to chain"));
    }
    validate_chainable(params)?;
    Ok(params.iter().map(|p| p.code.as_str()).collect::<Vec<_>>().join("."))
}

/// In-memory index of SearchParameter resources
#[derive(Debug, Clone, Default)]
pub struct SearchParameterIndex {
    entries: Vec<(SearchParameter, Vec<String>)>,
}

impl SearchParameterIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, parameter: SearchParameter) {
        let expressions = parameter.cleaned_expressions();
        self.entries.push((parameter, expressions));
    }

    pub fn with_parameter(mut self, parameter: SearchParameter) -> Self {
        self.insert(parameter);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn parameters(&self) -> impl Iterator<Item = &SearchParameter> {
        self.entries.iter().map(|(p, _)| p)
    }

    /// Load a Bundle of SearchParameters or a single SearchParameter
    pub fn from_json(json: &str) -> Result<Self> {
        let mut index = Self::new();
        index.add_document(json)?;
        Ok(index)
    }

    /// Load a file, or every `*.json` file of a directory
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let files: Vec<PathBuf> = if path.is_dir() {
            WalkDir::new(path)
                .min_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(DirEntry::into_path)
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect()
        } else {
            vec![path.to_path_buf()]
        };

        let mut index = Self::new();
        for file in files {
            let content = fs::read_to_string(&file)?;
            index
                .add_document(&content)
                .map_err(|e| e.with_context(file.display().to_string()))?;
        }
        log::debug!("Loaded {} search parameters from {}", index.len(), path.display());
        Ok(index)
    }

    fn add_document(&mut self, json: &str) -> Result<()> {
        let invalid = |e: serde_json::Error| OntoError::system(ONTO0401, format!("Invalid SearchParameter document: {e}"));
        let document: Value = serde_json::from_str(json).map_err(invalid)?;
        match document.get("resourceType").and_then(Value::as_str) {
            Some("Bundle") => {
                let resources = document
                    .get("entry")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .filter_map(|entry| entry.get("resource"))
                    .filter(|r| r.get("resourceType").and_then(Value::as_str) == Some("SearchParameter"));
                for resource in resources {
                    self.insert(SearchParameter::deserialize(resource).map_err(invalid)?);
                }
            }
            Some("SearchParameter") => self.insert(SearchParameter::deserialize(&document).map_err(invalid)?),
            other => log::warn!("Ignoring document of type {}", other.unwrap_or("<none>")),
        }
        Ok(())
    }

    /// Best exact match: the parameter with the fewest expressions for the
    /// path's resource type
    fn best_exact(&self, path: &str) -> Option<&SearchParameter> {
        let resource_type = path.split('.').next().unwrap_or(path);
        let mut best: Option<(&SearchParameter, usize)> = None;
        for (parameter, expressions) in &self.entries {
            if !expressions.iter().any(|e| e == path) {
                continue;
            }
            let relevant = expressions.iter().filter(|e| e.starts_with(resource_type)).count();
            if best.is_none_or(|(_, count)| relevant < count) {
                best = Some((parameter, relevant));
            }
        }
        best.map(|(parameter, _)| parameter)
    }

    fn find_one(&self, path: &str) -> Option<(String, &SearchParameter)> {
        let mut current = path.to_string();
        loop {
            current = strip_wrapping_parentheses(&current).to_string();
            if let Some(parameter) = self.best_exact(&current) {
                return Some((current, parameter));
            }
            let shorter = match current.rsplit_once(" as ") {
                Some((head, cast)) if !cast.contains('.') => head,
                _ => current.rsplit_once('.')?.0,
            };
            log::debug!("No search parameter for '{current}', retrying with '{shorter}'");
            current = shorter.to_string();
        }
    }
}

impl SearchParameterMatcher for SearchParameterIndex {
    fn find_search_parameter(&self, paths: &[String]) -> Result<IndexMap<String, SearchParameter>> {
        let mut found = IndexMap::new();
        let mut missing = Vec::new();
        for path in paths.iter().filter(|p| !p.starts_with("Extension")) {
            match self.find_one(strip_wrapping_parentheses(path)) {
                Some((key, parameter)) => {
                    found.insert(key, parameter.clone());
                }
                None => missing.push(path.as_str()),
            }
        }
        if !missing.is_empty() || found.is_empty() {
            return Err(OntoError::mapping(
                ONTO0205,
                format!(
                    "No search parameter for [{}] among [{}]",
                    missing.join(", "),
                    paths.join(", ")
                ),
            ));
        }
        Ok(found)
    }

    fn find_composite_search_parameter(
        &self,
        components: &IndexMap<String, SearchParameter>,
    ) -> Result<(String, SearchParameter)> {
        let (Some((first_path, first)), Some((second_path, second)), 2) =
            (components.get_index(0), components.get_index(1), components.len())
        else {
            return Err(OntoError::mapping(
                ONTO0205,
                format!("Composite search needs two parameters, got {}", components.len()),
            ));
        };

        let composite = self.parameters().filter(|p| p.is_composite()).find(|p| {
            let definitions: Vec<&str> = p.component.iter().map(|c| c.definition.as_str()).collect();
            matches!(definitions.as_slice(), [a, b]
                if (*a == first.url && *b == second.url) || (*a == second.url && *b == first.url))
        });
        match composite {
            Some(parameter) => Ok((format!("{first_path}.where({second_path})"), parameter.clone())),
            None => Err(OntoError::mapping(
                ONTO0205,
                format!("No composite search parameter combines '{}' and '{}'", first.code, second.code),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const SP: &str = "http://hl7.org/fhir/SearchParameter";

    fn index() -> SearchParameterIndex {
        SearchParameterIndex::new()
            .with_parameter(SearchParameter::new(
                format!("{SP}/clinical-code"),
                "code",
                "token",
                &["Condition", "Observation", "Procedure"],
                "Condition.code | Condition.evidence.code | Observation.code | Procedure.code",
            ))
            .with_parameter(SearchParameter::new(
                format!("{SP}/Condition-code"),
                "code",
                "token",
                &["Condition"],
                "Condition.code",
            ))
            .with_parameter(SearchParameter::new(
                format!("{SP}/Observation-value-quantity"),
                "value-quantity",
                "quantity",
                &["Observation"],
                "(Observation.value as Quantity) | (Observation.value as SampledData)",
            ))
            .with_parameter(SearchParameter::new(
                format!("{SP}/Observation-component-code"),
                "component-code",
                "token",
                &["Observation"],
                "Observation.component.code",
            ))
            .with_parameter(SearchParameter::new(
                format!("{SP}/Observation-component-value-quantity"),
                "component-value-quantity",
                "quantity",
                &["Observation"],
                "(Observation.component.value.ofType(Quantity))",
            ))
            .with_parameter(
                SearchParameter::new(
                    format!("{SP}/Observation-component-code-value-quantity"),
                    "component-code-value-quantity",
                    "composite",
                    &["Observation"],
                    "Observation.component",
                )
                .with_components(
                    format!("{SP}/Observation-component-code"),
                    format!("{SP}/Observation-component-value-quantity"),
                ),
            )
            .with_parameter(
                SearchParameter::new(
                    format!("{SP}/Specimen-subject"),
                    "subject",
                    "reference",
                    &["Specimen"],
                    "Specimen.subject",
                )
                .with_target(&["Patient", "Group"]),
            )
    }

    fn paths(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[rstest]
    #[case("Observation.value.as(Quantity)", vec!["Observation.value as Quantity"])]
    #[case("(Observation.value.ofType(Quantity)) | Observation.code", vec!["Observation.value as Quantity", "Observation.code"])]
    #[case("Condition.code", vec!["Condition.code"])]
    fn test_cleaned_expressions(#[case] expression: &str, #[case] expected: Vec<&str>) {
        let parameter = SearchParameter::new("u", "c", "token", &["Observation"], expression);
        assert_eq!(parameter.cleaned_expressions(), expected);
    }

    #[test]
    fn test_prefers_specific_parameter() {
        let found = index().find_search_parameter(&paths(&["Condition.code"])).unwrap();
        assert_eq!(found["Condition.code"].url, format!("{SP}/Condition-code"));
    }

    #[test]
    fn test_shortens_until_match() {
        let found = index()
            .find_search_parameter(&paths(&["(Condition.code.coding)", "Extension.value"]))
            .unwrap();
        assert_eq!(found.keys().collect::<Vec<_>>(), vec!["Condition.code"]);

        let found = index()
            .find_search_parameter(&paths(&["Observation.value as Quantity"]))
            .unwrap();
        assert_eq!(found["Observation.value as Quantity"].code, "value-quantity");
    }

    #[test]
    fn test_no_match() {
        let err = index().find_search_parameter(&paths(&["Specimen.type"])).unwrap_err();
        assert_eq!(err.code(), ONTO0205);
    }

    #[test]
    fn test_composite_in_either_order() {
        let index = index();
        let components = index
            .find_search_parameter(&paths(&["Observation.component.value as Quantity", "Observation.component.code"]))
            .unwrap();
        let (key, composite) = index.find_composite_search_parameter(&components).unwrap();
        assert_eq!(key, "Observation.component.value as Quantity.where(Observation.component.code)");
        assert_eq!(composite.code, "component-code-value-quantity");
    }

    #[test]
    fn test_chaining() {
        let index = index();
        let subject = index.parameters().find(|p| p.code == "subject").unwrap();
        let condition = SearchParameter::new("u", "code", "token", &["Patient"], "Patient.code");
        assert_eq!(chain_search_parameters(&[subject, &condition]).unwrap(), "subject.code");

        let code = index.parameters().find(|p| p.code == "code").unwrap();
        assert_eq!(chain_search_parameters(&[code, subject]).unwrap_err().code(), ONTO0206);
    }

    #[test]
    fn test_load_bundle() {
        let json = r#"{
            "resourceType": "Bundle",
            "entry": [
                {"resource": {"resourceType": "SearchParameter", "url": "u1", "code": "code", "type": "token",
                              "base": ["Condition"], "expression": "Condition.code"}},
                {"resource": {"resourceType": "Patient", "id": "p"}}
            ]
        }"#;
        let index = SearchParameterIndex::from_json(json).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(SearchParameterIndex::from_json("[").unwrap_err().code(), ONTO0401);
    }

    #[test]
    fn test_load_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("specimen-type.json"),
            r#"{"resourceType": "SearchParameter", "url": "u", "code": "type", "type": "token",
                "base": ["Specimen"], "expression": "Specimen.type"}"#,
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        fs::create_dir_all(dir.path().join("core/specimen")).unwrap();
        fs::write(
            dir.path().join("core/specimen/specimen-collected.json"),
            r#"{"resourceType": "SearchParameter", "url": "c", "code": "collected", "type": "date",
                "base": ["Specimen"], "expression": "Specimen.collection.collected"}"#,
        )
        .unwrap();

        let index = SearchParameterIndex::from_path(dir.path()).unwrap();
        assert_eq!(index.len(), 2);
        let found = index.find_search_parameter(&paths(&["Specimen.type"])).unwrap();
        assert_eq!(found["Specimen.type"].code, "type");
        let found = index
            .find_search_parameter(&paths(&["Specimen.collection.collected"]))
            .unwrap();
        assert_eq!(found["Specimen.collection.collected"].code, "collected");
    }
}
