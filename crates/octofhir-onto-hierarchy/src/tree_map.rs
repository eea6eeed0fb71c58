//! Tree maps
//!
//! A tree map holds one node per expanded code. Parent and child edges are
//! added once from a pruned closure table and are not changed afterwards.

use crate::closure::{prune, ClosureResponse};
use crate::terminology::{get_closure_map, Terminology};
use indexmap::IndexMap;
use octofhir_onto_diagnostics::{OntoError, Result, ONTO0300, ONTO0302};
use octofhir_onto_model::TermCode;
use serde::{Deserialize, Serialize};

/// A concept and its direct neighbours
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermEntryNode {
    pub term_code: TermCode,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub children: Vec<String>,
}

impl TermEntryNode {
    pub fn new(term_code: TermCode) -> Self {
        Self {
            term_code,
            parents: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }
}

/// Concept hierarchy of one value set in one context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeMap {
    /// Nodes by code, in expansion order
    pub entries: IndexMap<String, TermEntryNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<TermCode>,
    pub system: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl TreeMap {
    /// Edge-less tree with one node per code. System and version are taken
    /// from the first code.
    pub fn seed(codes: impl IntoIterator<Item = TermCode>) -> Self {
        let mut tree = Self::default();
        for code in codes {
            if tree.entries.is_empty() {
                tree.system = code.system.clone();
                tree.version = code.version.clone();
            }
            tree.entries.insert(code.code.clone(), TermEntryNode::new(code));
        }
        tree
    }

    pub fn with_context(mut self, context: TermCode) -> Self {
        self.context = Some(context);
        self
    }

    pub fn get(&self, code: &str) -> Option<&TermEntryNode> {
        self.entries.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.entries.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries without parents
    pub fn roots(&self) -> impl Iterator<Item = &TermEntryNode> {
        self.entries.values().filter(|e| e.is_root())
    }

    pub fn has_edges(&self) -> bool {
        self.entries.values().any(|e| !e.parents.is_empty() || !e.children.is_empty())
    }

    /// Add the direct edges of a closure response.
    ///
    /// The response must hold at most one group. Edges are computed in full
    /// before any entry changes, so a failing closure leaves the tree as it
    /// was. Codes missing from the tree are skipped.
    pub fn apply_closure(&mut self, closure: &ClosureResponse) -> Result<()> {
        let group = match closure.group.as_slice() {
            [] => return Ok(()),
            [group] => group,
            groups => {
                return Err(OntoError::hierarchy(
                    ONTO0300,
                    format!("Closure response holds {} groups", groups.len()),
                )
                .with_system(self.system.as_str()));
            }
        };

        let direct = prune(&group.subsumption_map());
        let mut edges = Vec::new();
        for (code, parents) in &direct {
            if !self.contains(code) {
                log::warn!("Closure code '{code}' is not part of the expansion of {}", group.source);
                continue;
            }
            for parent in parents {
                if self.contains(parent) {
                    edges.push((code.clone(), parent.clone()));
                } else {
                    log::warn!("Closure parent '{parent}' of '{code}' is not part of the expansion");
                }
            }
        }

        self.system = group.source.clone();
        self.version = group.source_version.clone();
        for (code, parent) in edges {
            if let Some(node) = self.entries.get_mut(&code) {
                node.parents.push(parent.clone());
            }
            if let Some(node) = self.entries.get_mut(&parent) {
                node.children.push(code);
            }
        }
        Ok(())
    }
}

/// Build the hierarchy of a value set.
///
/// Expansion failures are errors. A failing closure is logged and leaves the
/// seeded, edge-less tree as a degraded result.
pub fn build_tree_map(terminology: &dyn Terminology, value_set_url: &str, closure_name: &str) -> Result<TreeMap> {
    log::debug!("Generating tree map for value set '{value_set_url}'");
    let codes = terminology.expand_value_set(value_set_url)?;
    if codes.is_empty() {
        return Err(OntoError::hierarchy(
            ONTO0302,
            format!("Value set '{value_set_url}' has an empty expansion"),
        ));
    }
    let codes: Vec<TermCode> = codes.into_iter().collect();
    let mut tree = TreeMap::seed(codes.iter().cloned());

    let closed = get_closure_map(terminology, &codes, closure_name).and_then(|closure| tree.apply_closure(&closure));
    if let Err(err) = closed {
        log::error!("Failed to build hierarchy of value set '{value_set_url}', returning flat tree: {err}");
    }
    Ok(tree)
}

/// Tree maps of a module, at most one per (context, system)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeMapList {
    pub entries: Vec<TreeMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
}

impl TreeMapList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tree, replacing one with the same context and system
    pub fn insert(&mut self, tree: TreeMap) {
        match self
            .entries
            .iter_mut()
            .find(|t| t.context == tree.context && t.system == tree.system)
        {
            Some(existing) => *existing = tree,
            None => self.entries.push(tree),
        }
    }

    pub fn find(&self, context: Option<&TermCode>, system: &str) -> Option<&TreeMap> {
        self.entries
            .iter()
            .find(|t| t.context.as_ref() == context && t.system == system)
    }

    /// Trees holding a node for `code`
    pub fn containing<'a>(&'a self, code: &'a TermCode) -> impl Iterator<Item = &'a TreeMap> + 'a {
        self.entries
            .iter()
            .filter(move |t| t.system == code.system && t.contains(&code.code))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TreeMap> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::closure::{ClosureElement, ClosureGroup, ClosureTarget};
    use crate::terminology::InMemoryTerminology;
    use pretty_assertions::assert_eq;

    const SCT: &str = "http://snomed.info/sct";
    const VS: &str = "https://example.org/ValueSet/specimen";

    fn codes(codes: &[&str]) -> Vec<TermCode> {
        codes.iter().map(|c| TermCode::new(SCT, *c, format!("Concept {c}"))).collect()
    }

    fn group(edges: &[(&str, &[&str])]) -> ClosureGroup {
        ClosureGroup {
            source: SCT.to_string(),
            source_version: Some("20240201".to_string()),
            element: edges
                .iter()
                .map(|(code, targets)| ClosureElement {
                    code: code.to_string(),
                    target: targets
                        .iter()
                        .map(|t| ClosureTarget {
                            code: t.to_string(),
                            equivalence: Some("subsumes".to_string()),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_apply_closure() {
        let mut tree = TreeMap::seed(codes(&["x", "y", "z"]));
        let closure = ClosureResponse {
            group: vec![group(&[("x", &["y", "z"]), ("y", &["z"])])],
        };
        tree.apply_closure(&closure).unwrap();

        assert_eq!(tree.get("x").unwrap().parents, vec!["y"]);
        assert_eq!(tree.get("y").unwrap().parents, vec!["z"]);
        assert_eq!(tree.get("z").unwrap().children, vec!["y"]);
        assert_eq!(tree.roots().map(|e| e.term_code.code.as_str()).collect::<Vec<_>>(), vec!["z"]);
        assert_eq!(tree.version.as_deref(), Some("20240201"));
    }

    #[test]
    fn test_multi_group_leaves_tree_untouched() {
        let mut tree = TreeMap::seed(codes(&["x", "y"]));
        let before = tree.clone();
        let closure = ClosureResponse {
            group: vec![group(&[("x", &["y"])]), group(&[("y", &["x"])])],
        };
        assert_eq!(tree.apply_closure(&closure).unwrap_err().code(), ONTO0300);
        assert_eq!(tree, before);
    }

    #[test]
    fn test_build_degrades_to_flat_tree() {
        let closure = ClosureResponse {
            group: vec![group(&[("x", &["y"])]), group(&[("y", &["x"])])],
        };
        let terminology = InMemoryTerminology::new()
            .with_value_set(VS, codes(&["x", "y"]))
            .with_closure("dse", closure);

        let tree = build_tree_map(&terminology, VS, "dse").unwrap();
        assert_eq!(tree.len(), 2);
        assert!(!tree.has_edges());
    }

    #[test]
    fn test_build_tree_map() {
        let closure = ClosureResponse {
            group: vec![group(&[("x", &["y", "z"]), ("y", &["z"]), ("w", &["z"])])],
        };
        let terminology = InMemoryTerminology::new()
            .with_value_set(VS, codes(&["x", "y", "z"]))
            .with_closure("dse", closure);

        let tree = build_tree_map(&terminology, VS, "dse").unwrap();
        assert_eq!(tree.get("z").unwrap().children, vec!["y"]);
        assert!(!tree.contains("w"));
        assert_eq!(build_tree_map(&terminology, "https://example.org/none", "dse").unwrap_err().code(), ONTO0302);
    }

    #[test]
    fn test_list_is_keyed_by_context_and_system() {
        let context = TermCode::new("fdpg.mii.cds", "Specimen", "Bioprobe");
        let mut list = TreeMapList::new();
        list.insert(TreeMap::seed(codes(&["x"])).with_context(context.clone()));
        list.insert(TreeMap::seed(codes(&["x", "y"])).with_context(context.clone()));
        list.insert(TreeMap::seed(codes(&["x"])));

        assert_eq!(list.entries.len(), 2);
        assert_eq!(list.find(Some(&context), SCT).unwrap().len(), 2);
        assert_eq!(list.containing(&TermCode::new(SCT, "x", "")).count(), 2);
    }

    #[test]
    fn test_serialized_tree() {
        let mut tree = TreeMap::seed(codes(&["x", "y"]));
        tree.apply_closure(&ClosureResponse {
            group: vec![group(&[("x", &["y"])])],
        })
        .unwrap();
        let json = serde_json::to_string_pretty(&tree).unwrap();
        insta::assert_snapshot!(json, @r#"
        {
          "entries": {
            "x": {
              "termCode": {
                "system": "http://snomed.info/sct",
                "code": "x",
                "display": "Concept x"
              },
              "parents": [
                "y"
              ],
              "children": []
            },
            "y": {
              "termCode": {
                "system": "http://snomed.info/sct",
                "code": "y",
                "display": "Concept y"
              },
              "parents": [],
              "children": [
                "x"
              ]
            }
          },
          "system": "http://snomed.info/sct",
          "version": "20240201"
        }
        "#);
    }
}
