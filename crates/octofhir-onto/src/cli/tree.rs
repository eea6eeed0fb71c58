//! Tree command implementation

use super::output::{self, OutputFormat};
use anyhow::{Context, Result};
use octofhir_onto_hierarchy::{
    ClosureResponse, DescendantCounts, InMemoryTerminology, TreeMap, TreeMapList, ValueSet, build_tree_map,
    update_descendant_count,
};
use octofhir_onto_model::TermCode;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

const OFFLINE_VALUE_SET: &str = "urn:onto:offline-expansion";
const OFFLINE_CLOSURE: &str = "offline";

/// Configuration for tree command
pub struct TreeConfig {
    pub closure: PathBuf,
    pub expansion: Option<PathBuf>,
    pub count_descendants: bool,
    pub format: OutputFormat,
    pub output_file: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeOutput {
    pub tree: TreeMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descendant_counts: Option<DescendantCounts>,
}

/// Build a tree from an offline closure table.
///
/// Without an expansion the codes mentioned by the closure are used.
pub fn build(closure: ClosureResponse, expansion: Option<&ValueSet>, count_descendants: bool) -> crate::Result<TreeOutput> {
    let codes: BTreeSet<TermCode> = match expansion {
        Some(value_set) => value_set.term_codes(),
        None => closure.group.iter().flat_map(|group| group.term_codes()).collect(),
    };
    let terminology = InMemoryTerminology::new()
        .with_value_set(OFFLINE_VALUE_SET, codes)
        .with_closure(OFFLINE_CLOSURE, closure);
    let tree = build_tree_map(&terminology, OFFLINE_VALUE_SET, OFFLINE_CLOSURE)?;

    let descendant_counts = count_descendants.then(|| {
        let mut trees = TreeMapList::new();
        trees.insert(tree.clone());
        update_descendant_count(&trees)
    });
    Ok(TreeOutput {
        tree,
        descendant_counts,
    })
}

/// Indented outline of a tree, one code per line
pub fn render(output: &TreeOutput) -> String {
    let mut lines = Vec::new();
    for root in output.tree.roots() {
        render_node(output, &root.term_code.code, 0, &mut Vec::new(), &mut lines);
    }
    lines.join("\n")
}

fn render_node(output: &TreeOutput, code: &str, depth: usize, path: &mut Vec<String>, lines: &mut Vec<String>) {
    let Some(node) = output.tree.get(code) else { return };
    let mut line = format!("{}{} {}", "  ".repeat(depth), node.term_code.code, node.term_code.display);
    let count = output
        .descendant_counts
        .as_ref()
        .and_then(|counts| counts.values().find_map(|by_code| by_code.get(code)));
    if let Some(count) = count {
        line.push_str(&format!(" ({count})"));
    }
    lines.push(line.trim_end().to_string());

    if path.iter().any(|seen| seen == code) {
        return;
    }
    path.push(code.to_string());
    for child in &node.children {
        render_node(output, child, depth + 1, path, lines);
    }
    path.pop();
}

/// Build a tree from offline files and print it
pub fn tree(config: TreeConfig) -> Result<()> {
    let content = fs::read_to_string(&config.closure)
        .with_context(|| format!("Failed to read closure {}", config.closure.display()))?;
    let closure = ClosureResponse::from_json(&content)?;
    let expansion = match &config.expansion {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read expansion {}", path.display()))?;
            Some(ValueSet::from_json(&content)?)
        }
        None => None,
    };

    let built = build(closure, expansion.as_ref(), config.count_descendants)?;
    let content = match config.format {
        OutputFormat::Json => output::format_json(&built)?,
        OutputFormat::Text => render(&built),
    };
    output::write_output(&content, config.output_file.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SCT: &str = "http://snomed.info/sct";

    fn closure() -> ClosureResponse {
        ClosureResponse::from_json(&format!(
            r#"{{"group": [{{"source": "{SCT}", "element": [
                {{"code": "119297000", "target": [{{"code": "123038009", "equivalence": "subsumes"}}]}},
                {{"code": "119364003", "target": [
                    {{"code": "119297000", "equivalence": "subsumes"}},
                    {{"code": "123038009", "equivalence": "subsumes"}}
                ]}}
            ]}}]}}"#
        ))
        .unwrap()
    }

    fn expansion() -> ValueSet {
        ValueSet::from_json(&format!(
            r#"{{"expansion": {{"contains": [
                {{"system": "{SCT}", "code": "123038009", "display": "SPECIMEN"}},
                {{"system": "{SCT}", "code": "119297000", "display": "Blood specimen"}},
                {{"system": "{SCT}", "code": "119364003", "display": "Serum specimen"}}
            ]}}}}"#
        ))
        .unwrap()
    }

    #[test]
    fn test_build_with_expansion() {
        let built = build(closure(), Some(&expansion()), true).unwrap();
        let roots: Vec<&str> = built.tree.roots().map(|n| n.term_code.code.as_str()).collect();
        assert_eq!(roots, vec!["123038009"]);
        assert_eq!(built.tree.get("119364003").unwrap().parents, vec!["119297000".to_string()]);

        insta::assert_snapshot!(render(&built), @r"
        123038009 Specimen (2)
          119297000 Blood specimen (1)
            119364003 Serum specimen (0)
        ");
    }

    #[test]
    fn test_build_from_closure_codes() {
        let built = build(closure(), None, false).unwrap();
        assert_eq!(built.tree.len(), 3);
        assert!(built.descendant_counts.is_none());
        assert_eq!(render(&built).lines().count(), 3);
    }
}
