//! Terminology hierarchies
//!
//! Builds browsable concept trees from a value set expansion and the closure
//! table a terminology server returns for it:
//!
//! ```no_run
//! use octofhir_onto_hierarchy::{InMemoryTerminology, build_tree_map};
//!
//! let terminology = InMemoryTerminology::from_file("terminology.json")?;
//! let tree = build_tree_map(&terminology, "https://example.org/ValueSet/specimen", "dse-closure")?;
//! for root in tree.roots() {
//!     println!("{}", root.term_code);
//! }
//! # Ok::<(), octofhir_onto_diagnostics::OntoError>(())
//! ```

pub mod closure;
pub mod descendants;
pub mod terminology;
pub mod tree_map;

pub use closure::{
    ClosureElement, ClosureGroup, ClosureResponse, ClosureTarget, SubsumptionMap, check_single_version, prune,
    remove_non_direct_ancestors,
};
pub use descendants::{
    ContextualizedTermCode, ContextualizedTermCodeInfo, DescendantCounts, contextualized_infos, descendant_count,
    update_children_count, update_descendant_count,
};
pub use terminology::{InMemoryTerminology, Terminology, ValueSet, get_closure_map, normalize_display};
pub use tree_map::{TermEntryNode, TreeMap, TreeMapList, build_tree_map};
