//! Descendant counting
//!
//! A code can appear in several tree maps of the same system. Its
//! descendants are the union of everything reachable through the child
//! lists of all of them, each code counted once.

use crate::tree_map::{TreeMap, TreeMapList};
use octofhir_onto_model::TermCode;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Number of distinct descendants of `term_code` across `trees`
pub fn descendant_count(trees: &TreeMapList, term_code: &TermCode) -> usize {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut stack = vec![term_code.code.clone()];
    while let Some(code) = stack.pop() {
        let probe = TermCode::new(term_code.system.as_str(), code.as_str(), "");
        for tree in trees.containing(&probe) {
            let Some(node) = tree.get(&code) else { continue };
            for child in &node.children {
                if child != &term_code.code && seen.insert(child.clone()) {
                    stack.push(child.clone());
                }
            }
        }
    }
    seen.len()
}

/// Descendant counts keyed by `system#version`, then by code
pub type DescendantCounts = BTreeMap<String, BTreeMap<String, usize>>;

/// Count the descendants of every entry of every tree.
///
/// Recomputes from scratch on every call.
pub fn update_descendant_count(trees: &TreeMapList) -> DescendantCounts {
    let mut counts = DescendantCounts::new();
    for tree in trees.iter() {
        for node in tree.entries.values() {
            let key = node_key(tree, &node.term_code);
            counts
                .entry(key)
                .or_default()
                .insert(node.term_code.code.clone(), descendant_count(trees, &node.term_code));
        }
    }
    counts
}

fn node_key(tree: &TreeMap, term_code: &TermCode) -> String {
    match (&term_code.version, &tree.version) {
        (Some(_), _) | (None, None) => term_code.system_version_key(),
        (None, Some(version)) => term_code.clone().with_version(version.as_str()).system_version_key(),
    }
}

/// A term code in its context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextualizedTermCode {
    pub context: TermCode,
    pub term_code: TermCode,
}

/// Selection metadata of one tree entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextualizedTermCodeInfo {
    pub term_code: TermCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<TermCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<TermCode>,
    pub children_count: usize,
    #[serde(default)]
    pub siblings: Vec<ContextualizedTermCode>,
    #[serde(skip)]
    pub recalculated: bool,
}

impl ContextualizedTermCodeInfo {
    pub fn new(term_code: TermCode) -> Self {
        Self {
            term_code,
            context: None,
            module: None,
            children_count: 0,
            siblings: Vec::new(),
            recalculated: false,
        }
    }

    pub fn recalculate_children_count(&mut self, trees: &TreeMapList) {
        self.children_count = descendant_count(trees, &self.term_code);
        self.recalculated = true;
    }
}

/// One info per entry of `tree`, with the entry's siblings under each of
/// its parents
pub fn contextualized_infos(tree: &TreeMap, module: Option<&TermCode>) -> Vec<ContextualizedTermCodeInfo> {
    tree.entries
        .values()
        .map(|node| {
            let mut sibling_codes = BTreeSet::new();
            for parent in &node.parents {
                if let Some(parent_node) = tree.get(parent) {
                    sibling_codes.extend(parent_node.children.iter().filter(|c| **c != node.term_code.code));
                }
            }
            let siblings = match &tree.context {
                Some(context) => sibling_codes
                    .into_iter()
                    .filter_map(|code| tree.get(code))
                    .map(|sibling| ContextualizedTermCode {
                        context: context.clone(),
                        term_code: sibling.term_code.clone(),
                    })
                    .collect(),
                None => Vec::new(),
            };
            ContextualizedTermCodeInfo {
                context: tree.context.clone(),
                module: module.cloned(),
                siblings,
                ..ContextualizedTermCodeInfo::new(node.term_code.clone())
            }
        })
        .collect()
}

/// Refresh the children counts of a batch of infos
pub fn update_children_count(infos: &mut [ContextualizedTermCodeInfo], trees: &TreeMapList) {
    for info in infos {
        info.recalculate_children_count(trees);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree_map::TermEntryNode;
    use pretty_assertions::assert_eq;

    const SCT: &str = "http://snomed.info/sct";

    fn tree(edges: &[(&str, &[&str])]) -> TreeMap {
        let mut tree = TreeMap::seed(edges.iter().map(|(code, _)| TermCode::new(SCT, *code, "")));
        for (code, children) in edges {
            for child in *children {
                if let Some(node) = tree.entries.get_mut(*code) {
                    node.children.push(child.to_string());
                }
                let node = tree
                    .entries
                    .entry(child.to_string())
                    .or_insert_with(|| TermEntryNode::new(TermCode::new(SCT, *child, "")));
                node.parents.push(code.to_string());
            }
        }
        tree.with_context(TermCode::new("fdpg.mii.cds", "Diagnose", "Diagnose"))
    }

    fn diamond() -> TreeMapList {
        let mut list = TreeMapList::new();
        list.insert(tree(&[("a", &["b", "c"]), ("b", &["d"]), ("c", &["d"])]));
        list
    }

    #[test]
    fn test_diamond_counts_shared_descendant_once() {
        let trees = diamond();
        assert_eq!(descendant_count(&trees, &TermCode::new(SCT, "a", "")), 3);
        assert_eq!(descendant_count(&trees, &TermCode::new(SCT, "b", "")), 1);
        assert_eq!(descendant_count(&trees, &TermCode::new(SCT, "d", "")), 0);
    }

    #[test]
    fn test_union_across_trees() {
        let mut trees = diamond();
        let mut other = tree(&[("a", &["e"])]);
        other.context = None;
        trees.insert(other);
        assert_eq!(descendant_count(&trees, &TermCode::new(SCT, "a", "")), 4);
        assert_eq!(descendant_count(&trees, &TermCode::new("http://loinc.org", "a", "")), 0);
    }

    #[test]
    fn test_update_is_idempotent() {
        let trees = diamond();
        let first = update_descendant_count(&trees);
        let second = update_descendant_count(&trees);
        assert_eq!(first, second);
        assert_eq!(first[&format!("{SCT}#")]["a"], 3);
    }

    #[test]
    fn test_siblings() {
        let tree = tree(&[("a", &["b", "c"]), ("b", &["d"]), ("c", &["d"])]);
        let mut infos = contextualized_infos(&tree, None);
        let b = infos.iter().find(|i| i.term_code.code == "b").unwrap();
        let siblings: Vec<_> = b.siblings.iter().map(|s| s.term_code.code.as_str()).collect();
        assert_eq!(siblings, vec!["c"]);

        let mut list = TreeMapList::new();
        list.insert(tree);
        update_children_count(&mut infos, &list);
        let a = infos.iter().find(|i| i.term_code.code == "a").unwrap();
        assert_eq!(a.children_count, 3);
        assert!(a.recalculated);
    }

    #[test]
    fn test_cycle_terminates() {
        let mut list = TreeMapList::new();
        list.insert(tree(&[("a", &["b"]), ("b", &["a"])]));
        assert_eq!(descendant_count(&list, &TermCode::new(SCT, "a", "")), 1);
    }
}
