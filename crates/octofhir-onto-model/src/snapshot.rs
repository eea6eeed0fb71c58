//! Indexed, immutable profile snapshots

use crate::element_id;
use crate::structure_definition::StructureDefinition;
use crate::ElementDefinition;
use octofhir_onto_diagnostics::{OntoError, Result, ONTO0401};
use std::collections::{BTreeSet, HashMap};

/// Snapshot of a profile: every element materialised, indexed by id and path.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSnapshot {
    url: String,
    name: String,
    resource_type: String,
    base_definition: Option<String>,
    elements: Vec<ElementDefinition>,
    by_id: HashMap<String, usize>,
    by_path: HashMap<String, Vec<usize>>,
}

impl ProfileSnapshot {
    /// Create a snapshot from its elements. Later duplicates of an id are ignored.
    pub fn new(
        url: impl Into<String>,
        name: impl Into<String>,
        resource_type: impl Into<String>,
        base_definition: Option<String>,
        elements: Vec<ElementDefinition>,
    ) -> Self {
        let mut by_id = HashMap::with_capacity(elements.len());
        let mut by_path: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, element) in elements.iter().enumerate() {
            by_id.entry(element.id.clone()).or_insert(index);
            by_path.entry(element.path.clone()).or_default().push(index);
        }
        Self {
            url: url.into(),
            name: name.into(),
            resource_type: resource_type.into(),
            base_definition,
            elements,
            by_id,
            by_path,
        }
    }

    /// Start building a snapshot in code
    pub fn builder(url: impl Into<String>, resource_type: impl Into<String>) -> SnapshotBuilder {
        SnapshotBuilder {
            url: url.into(),
            name: None,
            resource_type: resource_type.into(),
            base_definition: None,
            elements: Vec::new(),
        }
    }

    /// Decode a StructureDefinition; it must carry a snapshot
    pub fn from_structure_definition(sd: StructureDefinition) -> Result<Self> {
        let snapshot = sd.snapshot.ok_or_else(|| {
            OntoError::system(ONTO0401, format!("StructureDefinition {} has no snapshot", sd.url))
        })?;
        let elements = snapshot.element.into_iter().map(|e| e.into_element()).collect();
        Ok(Self::new(sd.url, sd.name, sd.type_name, sd.base_definition, elements))
    }

    /// Decode a snapshot JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let sd: StructureDefinition = serde_json::from_str(json)
            .map_err(|e| OntoError::system(ONTO0401, format!("Invalid StructureDefinition: {e}")))?;
        Self::from_structure_definition(sd)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resource type name (`type` of the StructureDefinition)
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn base_definition(&self) -> Option<&str> {
        self.base_definition.as_deref()
    }

    pub fn elements(&self) -> &[ElementDefinition] {
        &self.elements
    }

    /// Look up an element by id
    pub fn element(&self, id: &str) -> Option<&ElementDefinition> {
        self.element_index(id).map(|i| &self.elements[i])
    }

    /// Position of an element in the snapshot
    pub fn element_index(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn element_at(&self, index: usize) -> Option<&ElementDefinition> {
        self.elements.get(index)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// All elements sharing a path (the base element and its slices)
    pub fn elements_by_path<'a>(&'a self, path: &str) -> impl Iterator<Item = &'a ElementDefinition> + 'a {
        self.by_path
            .get(path)
            .into_iter()
            .flatten()
            .map(move |&i| &self.elements[i])
    }

    /// Parent of an element, found by id
    pub fn parent_of(&self, element: &ElementDefinition) -> Option<&ElementDefinition> {
        element_id::parent_id(&element.id).and_then(|id| self.element(&id))
    }

    /// Nearest common ancestor element of two ids
    pub fn common_ancestor(&self, first: &str, second: &str) -> Option<&ElementDefinition> {
        self.element(&element_id::common_ancestor_id(first, second))
    }

    /// The slice enclosing an element id
    pub fn parent_slice(&self, id: &str) -> Option<&ElementDefinition> {
        element_id::parent_slice_id(id).and_then(|slice| self.element(&slice))
    }

    /// Names of the slices defined on an element
    pub fn available_slices(&self, id: &str) -> BTreeSet<String> {
        self.elements
            .iter()
            .filter(|e| e.id.contains(':'))
            .filter(|e| {
                element_id::parent_slice_id(&e.id)
                    .is_some_and(|slice| slice.rsplit_once(':').is_some_and(|(owner, _)| owner == id))
            })
            .filter_map(|e| element_id::slice_name(&e.id))
            .collect()
    }
}

/// Builder for snapshots assembled in code
pub struct SnapshotBuilder {
    url: String,
    name: Option<String>,
    resource_type: String,
    base_definition: Option<String>,
    elements: Vec<ElementDefinition>,
}

impl SnapshotBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn base_definition(mut self, url: impl Into<String>) -> Self {
        self.base_definition = Some(url.into());
        self
    }

    pub fn element(mut self, element: ElementDefinition) -> Self {
        self.elements.push(element);
        self
    }

    pub fn build(self) -> ProfileSnapshot {
        let name = self
            .name
            .unwrap_or_else(|| self.url.rsplit('/').next().unwrap_or_default().to_string());
        ProfileSnapshot::new(self.url, name, self.resource_type, self.base_definition, self.elements)
    }
}
