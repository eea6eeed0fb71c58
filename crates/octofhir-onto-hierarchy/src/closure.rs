//! Closure tables
//!
//! A terminology server answers `$closure` with a ConceptMap whose elements
//! list, per code, every code that subsumes it. The table is transitively
//! closed, so direct parents have to be recovered by pruning.

use indexmap::IndexMap;
use octofhir_onto_diagnostics::{OntoError, Result, ONTO0301, ONTO0401};
use octofhir_onto_model::TermCode;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Code → raw ancestor codes, in response order
pub type SubsumptionMap = IndexMap<String, Vec<String>>;

/// `$closure` response, shaped like a FHIR ConceptMap
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosureResponse {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group: Vec<ClosureGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosureGroup {
    /// Code system of the group
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_version: Option<String>,
    #[serde(default)]
    pub element: Vec<ClosureElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureElement {
    pub code: String,
    #[serde(default)]
    pub target: Vec<ClosureTarget>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureTarget {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equivalence: Option<String>,
}

impl ClosureTarget {
    /// Whether the target is an ancestor of the element's code
    pub fn is_ancestor(&self) -> bool {
        matches!(self.equivalence.as_deref(), None | Some("subsumes") | Some("specializes"))
    }
}

impl ClosureResponse {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| OntoError::system(ONTO0401, format!("Invalid closure ConceptMap: {e}")))
    }
}

impl ClosureGroup {
    /// Ancestor lists of every element, self references dropped
    pub fn subsumption_map(&self) -> SubsumptionMap {
        self.element
            .iter()
            .map(|element| {
                let ancestors = element
                    .target
                    .iter()
                    .filter(|t| t.is_ancestor() && t.code != element.code)
                    .map(|t| t.code.clone())
                    .collect();
                (element.code.clone(), ancestors)
            })
            .collect()
    }

    /// Every code mentioned by the group, as term codes of its system
    pub fn term_codes(&self) -> BTreeSet<TermCode> {
        let codes = self
            .element
            .iter()
            .flat_map(|e| std::iter::once(&e.code).chain(e.target.iter().map(|t| &t.code)));
        codes
            .map(|code| {
                let term_code = TermCode::new(self.source.as_str(), code.as_str(), "");
                match &self.source_version {
                    Some(version) => term_code.with_version(version.as_str()),
                    None => term_code,
                }
            })
            .collect()
    }
}

/// Drop every ancestor of `parents` that is itself an ancestor of another
/// listed parent, leaving the direct parents.
///
/// Lists with fewer than two entries are already direct. The removal pass
/// reads a copy of the list taken before it starts.
pub fn remove_non_direct_ancestors(parents: &mut Vec<String>, map: &SubsumptionMap) {
    if parents.len() < 2 {
        return;
    }
    let snapshot = parents.clone();
    for parent in &snapshot {
        if let Some(grand_parents) = map.get(parent) {
            parents.retain(|p| !grand_parents.contains(p));
        }
    }
}

/// Prune a whole subsumption map.
///
/// Pruning reads the raw lists: every list is reduced against the
/// unpruned table.
pub fn prune(map: &SubsumptionMap) -> SubsumptionMap {
    map.iter()
        .map(|(code, parents)| {
            let mut direct = parents.clone();
            remove_non_direct_ancestors(&mut direct, map);
            (code.clone(), direct)
        })
        .collect()
}

/// Fail when the codes mix several versions of one code system
pub fn check_single_version<'a>(codes: impl IntoIterator<Item = &'a TermCode>) -> Result<()> {
    let mut versions: BTreeMap<&str, BTreeSet<Option<&str>>> = BTreeMap::new();
    for code in codes {
        versions
            .entry(code.system.as_str())
            .or_default()
            .insert(code.version.as_deref());
    }
    for (system, versions) in versions {
        if versions.len() > 1 {
            let listed: Vec<_> = versions.iter().map(|v| v.unwrap_or("<none>")).collect();
            return Err(OntoError::hierarchy(
                ONTO0301,
                format!("Concepts from several code system versions [{}]", listed.join(", ")),
            )
            .with_system(system));
        }
    }
    Ok(())
}
