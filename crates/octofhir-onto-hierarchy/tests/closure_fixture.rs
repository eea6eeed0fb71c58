//! Hierarchy building from an offline terminology document

use octofhir_onto_hierarchy::{
    build_tree_map, contextualized_infos, update_children_count, InMemoryTerminology, TreeMapList,
};
use pretty_assertions::assert_eq;

const DOCUMENT: &str = r#"{
  "displays": {
    "http://fhir.de/CodeSystem/bfarm/icd-10-gm": {"C50": "Bösartige Neubildung der Brustdrüse"}
  },
  "valueSets": {
    "https://example.org/ValueSet/icd10-breast": [
      {"system": "http://fhir.de/CodeSystem/bfarm/icd-10-gm", "code": "C50", "display": "BÖSARTIGE NEUBILDUNG DER BRUSTDRÜSE", "version": "2024"},
      {"system": "http://fhir.de/CodeSystem/bfarm/icd-10-gm", "code": "C50.1", "display": "Zentraler Drüsenkörper der Brustdrüse", "version": "2024"},
      {"system": "http://fhir.de/CodeSystem/bfarm/icd-10-gm", "code": "C50.2", "display": "Oberer innerer Quadrant der Brustdrüse", "version": "2024"},
      {"system": "http://fhir.de/CodeSystem/bfarm/icd-10-gm", "code": "C50.-", "display": "Brustdrüse", "version": "2024"}
    ]
  },
  "closures": {
    "dse-closure": {
      "group": [{
        "source": "http://fhir.de/CodeSystem/bfarm/icd-10-gm",
        "sourceVersion": "2024",
        "element": [
          {"code": "C50.1", "target": [{"code": "C50", "equivalence": "subsumes"}, {"code": "C50.-", "equivalence": "subsumes"}]},
          {"code": "C50.2", "target": [{"code": "C50", "equivalence": "subsumes"}, {"code": "C50.-", "equivalence": "subsumes"}]},
          {"code": "C50", "target": [{"code": "C50.-", "equivalence": "subsumes"}]}
        ]
      }]
    }
  }
}"#;

#[test]
fn test_icd10_hierarchy() {
    let terminology = InMemoryTerminology::from_json(DOCUMENT).unwrap();
    let tree = build_tree_map(&terminology, "https://example.org/ValueSet/icd10-breast", "dse-closure").unwrap();

    assert_eq!(tree.version.as_deref(), Some("2024"));
    assert_eq!(tree.get("C50").unwrap().term_code.display, "Bösartige Neubildung Der Brustdrüse");
    assert_eq!(tree.get("C50.1").unwrap().parents, vec!["C50"]);
    assert_eq!(tree.get("C50").unwrap().children, vec!["C50.1", "C50.2"]);
    let roots: Vec<_> = tree.roots().map(|r| r.term_code.code.as_str()).collect();
    assert_eq!(roots, vec!["C50.-"]);

    let mut infos = contextualized_infos(&tree, None);
    let mut trees = TreeMapList::new();
    trees.insert(tree);
    update_children_count(&mut infos, &trees);
    let counts: Vec<_> = infos
        .iter()
        .map(|i| (i.term_code.code.as_str(), i.children_count))
        .collect();
    assert_eq!(counts, vec![("C50", 2), ("C50.-", 3), ("C50.1", 0), ("C50.2", 0)]);
}
