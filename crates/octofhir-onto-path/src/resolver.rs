//! Element chain resolver
//!
//! A flattened chain is consumed from a work queue. The state is the current
//! (snapshot, module) pair; an `Extension` or `Reference` element switches
//! state and rewrites the next queued id so it addresses the new snapshot.

use octofhir_onto_diagnostics::{
    ElementLocation, ErrorBuilder, OntoError, Result, ONTO0001, ONTO0100, ONTO0101, ONTO0102, ONTO0103, ONTO0104,
    ONTO0105, ONTO0106,
};
use octofhir_onto_model::{ElementDefinition, ElementType, ProfileProvider, ProfileSnapshot, RegisteredProfile};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

/// Default limit on profile hops per chain
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Resolver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverOptions {
    /// Maximum number of Extension/Reference hops in one chain
    pub max_depth: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// One resolved element together with the snapshot and module it was found in
#[derive(Debug, Clone)]
pub struct ResolvedElement {
    snapshot: Arc<ProfileSnapshot>,
    index: usize,
    module: String,
}

impl ResolvedElement {
    /// Resolve an id directly in a snapshot, without following any hops
    pub fn lookup(snapshot: Arc<ProfileSnapshot>, module: impl Into<String>, id: &str) -> Option<Self> {
        let index = snapshot.element_index(id)?;
        Some(Self {
            snapshot,
            index,
            module: module.into(),
        })
    }

    pub fn element(&self) -> &ElementDefinition {
        &self.snapshot.elements()[self.index]
    }

    pub fn snapshot(&self) -> &ProfileSnapshot {
        &self.snapshot
    }

    pub fn snapshot_arc(&self) -> &Arc<ProfileSnapshot> {
        &self.snapshot
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn id(&self) -> &str {
        &self.element().id
    }

    /// Another element of the same snapshot
    pub fn sibling(&self, id: &str) -> Option<Self> {
        Self::lookup(Arc::clone(&self.snapshot), self.module.clone(), id)
    }

    pub fn location(&self) -> ElementLocation {
        ElementLocation::element(self.id())
            .in_profile(self.snapshot.url())
            .in_module(self.module.clone())
    }
}

impl PartialEq for ResolvedElement {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.module == other.module && self.snapshot.url() == other.snapshot.url()
    }
}

/// Non-empty, ordered result of resolving a chain
#[derive(Debug, Clone)]
pub struct ResolvedChain {
    elements: Vec<ResolvedElement>,
    warnings: Vec<OntoError>,
}

impl ResolvedChain {
    /// Wrap resolved elements; `None` when empty
    pub fn new(elements: Vec<ResolvedElement>) -> Option<Self> {
        if elements.is_empty() {
            return None;
        }
        Some(Self {
            elements,
            warnings: Vec::new(),
        })
    }

    pub fn elements(&self) -> &[ResolvedElement] {
        &self.elements
    }

    pub fn first(&self) -> &ResolvedElement {
        &self.elements[0]
    }

    pub fn last(&self) -> &ResolvedElement {
        &self.elements[self.elements.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResolvedElement> {
        self.elements.iter()
    }

    /// Element ids in chain order
    pub fn ids(&self) -> Vec<&str> {
        self.elements.iter().map(ResolvedElement::id).collect()
    }

    /// Recoverable problems met during resolution (ambiguous reference targets)
    pub fn warnings(&self) -> &[OntoError] {
        &self.warnings
    }
}

impl PartialEq for ResolvedChain {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
    }
}

impl<'a> IntoIterator for &'a ResolvedChain {
    type Item = &'a ResolvedElement;
    type IntoIter = std::slice::Iter<'a, ResolvedElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Resolves chained element ids against a profile provider
pub struct ChainResolver<'a> {
    provider: &'a dyn ProfileProvider,
    options: ResolverOptions,
}

struct Hop {
    target: RegisteredProfile,
    next_id: String,
}

impl<'a> ChainResolver<'a> {
    pub fn new(provider: &'a dyn ProfileProvider) -> Self {
        Self {
            provider,
            options: ResolverOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    /// Parse a chain and resolve it starting in `start`
    pub fn resolve(&self, start: &RegisteredProfile, chain: &str) -> Result<ResolvedChain> {
        let ids = octofhir_onto_parser::parse_flat(chain)?;
        self.resolve_ids(start, ids)
    }

    /// Resolve an already flattened chain
    pub fn resolve_ids(&self, start: &RegisteredProfile, ids: Vec<String>) -> Result<ResolvedChain> {
        let mut queue: VecDeque<String> = ids.into();
        let mut current = start.clone();
        let mut hops = 0usize;
        let mut elements = Vec::with_capacity(queue.len());
        let mut warnings = Vec::new();

        while let Some(id) = queue.pop_front() {
            if id.starts_with('.') {
                return Err(ErrorBuilder::new(ONTO0105, format!("Element id '{id}' must start with a type name"))
                    .element(id.as_str())
                    .profile(current.snapshot.url())
                    .module(current.module.as_str())
                    .resolution());
            }

            let Some(resolved) = ResolvedElement::lookup(Arc::clone(&current.snapshot), current.module.clone(), &id)
            else {
                return Err(ErrorBuilder::new(ONTO0100, format!("Element '{id}' not found in snapshot"))
                    .element(id.as_str())
                    .profile(current.snapshot.url())
                    .module(current.module.as_str())
                    .resolution());
            };
            log::debug!("Resolved {} in {} ({})", id, current.snapshot.url(), current.module);

            let hop = match queue.front() {
                Some(next) => self.hop(&resolved, next, &mut warnings)?,
                None => None,
            };
            elements.push(resolved);

            if let Some(Hop { target, next_id }) = hop {
                hops += 1;
                if hops > self.options.max_depth {
                    return Err(ErrorBuilder::new(
                        ONTO0103,
                        format!("Resolution exceeded {} profile hops", self.options.max_depth),
                    )
                    .element(next_id)
                    .profile(target.snapshot.url())
                    .module(target.module.as_str())
                    .resolution());
                }
                if let Some(front) = queue.front_mut() {
                    *front = next_id;
                }
                current = target;
            }
        }

        let mut chain = ResolvedChain::new(elements)
            .ok_or_else(|| OntoError::chain(ONTO0001, "Empty element chain", ""))?;
        chain.warnings = warnings;
        Ok(chain)
    }

    fn hop(&self, resolved: &ResolvedElement, next: &str, warnings: &mut Vec<OntoError>) -> Result<Option<Hop>> {
        for type_ref in &resolved.element().types {
            match type_ref.code {
                ElementType::Extension => {
                    let [url] = type_ref.profiles.as_slice() else {
                        return Err(ErrorBuilder::new(
                            ONTO0106,
                            format!("Extension element lists {} profiles", type_ref.profiles.len()),
                        )
                        .element(resolved.id())
                        .profile(resolved.snapshot().url())
                        .module(resolved.module())
                        .resolution());
                    };
                    let target = self.provider.find_extension(resolved.module(), url).ok_or_else(|| {
                        ErrorBuilder::new(ONTO0102, format!("Extension definition '{url}' not found"))
                            .element(resolved.id())
                            .profile(resolved.snapshot().url())
                            .module(resolved.module())
                            .resolution()
                    })?;
                    log::debug!("Following extension {url} from {}", resolved.id());
                    return Ok(Some(Hop {
                        target,
                        next_id: format!("Extension{next}"),
                    }));
                }
                ElementType::Reference => {
                    let Some(target_url) = type_ref.target_profiles.first() else {
                        return Err(ErrorBuilder::new(ONTO0104, "Reference element has no target profile")
                            .element(resolved.id())
                            .profile(resolved.snapshot().url())
                            .module(resolved.module())
                            .resolution());
                    };
                    if type_ref.target_profiles.len() > 1 {
                        let warning = OntoError::resolution(
                            ONTO0101,
                            format!(
                                "Reference element supports {} target profiles, using '{target_url}'",
                                type_ref.target_profiles.len()
                            ),
                        )
                        .with_location(resolved.location());
                        log::warn!("{warning}");
                        warnings.push(warning);
                    }
                    return self.follow_reference(resolved, target_url, next).map(Some);
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn follow_reference(&self, resolved: &ResolvedElement, target_url: &str, next: &str) -> Result<Hop> {
        let candidates = self.provider.find_matching_profiles(target_url);
        if candidates.is_empty() {
            return Err(ErrorBuilder::new(
                ONTO0104,
                format!("No profile matches reference target '{target_url}'"),
            )
            .element(resolved.id())
            .profile(resolved.snapshot().url())
            .module(resolved.module())
            .resolution());
        }

        for candidate in candidates {
            let next_id = format!("{}{next}", candidate.snapshot.resource_type());
            if candidate.snapshot.contains(&next_id) {
                log::debug!("Following reference {} to {}", resolved.id(), candidate.snapshot.url());
                return Ok(Hop {
                    target: candidate,
                    next_id,
                });
            }
        }

        Err(ErrorBuilder::new(
            ONTO0100,
            format!("No profile matching '{target_url}' contains element '{next}'"),
        )
        .element(resolved.id())
        .profile(resolved.snapshot().url())
        .module(resolved.module())
        .resolution())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_onto_model::{ProfileRegistry, TypeRef};
    use pretty_assertions::assert_eq;

    const LOOP_URL: &str = "https://example.org/StructureDefinition/Loop";

    fn specimen() -> ProfileSnapshot {
        ProfileSnapshot::builder("https://example.org/StructureDefinition/Specimen", "Specimen")
            .element(ElementDefinition::new("Specimen"))
            .element(ElementDefinition::new("Specimen.type").with_type(ElementType::CodeableConcept))
            .element(
                ElementDefinition::new("Specimen.extension:loop")
                    .with_type_ref(TypeRef::new(ElementType::Extension).with_profile(LOOP_URL)),
            )
            .element(
                ElementDefinition::new("Specimen.extension:broken").with_type_ref(
                    TypeRef::new(ElementType::Extension)
                        .with_profile(LOOP_URL)
                        .with_profile("https://example.org/other"),
                ),
            )
            .element(
                ElementDefinition::new("Specimen.parent")
                    .with_type_ref(TypeRef::new(ElementType::Reference).with_target_profile(
                        "http://hl7.org/fhir/StructureDefinition/Patient",
                    )),
            )
            .build()
    }

    fn looping_extension() -> ProfileSnapshot {
        ProfileSnapshot::builder(LOOP_URL, "Extension")
            .element(ElementDefinition::new("Extension"))
            .element(
                ElementDefinition::new("Extension.extension")
                    .with_type_ref(TypeRef::new(ElementType::Extension).with_profile(LOOP_URL)),
            )
            .build()
    }

    fn registry() -> ProfileRegistry {
        ProfileRegistry::new()
            .with_profile("bio", specimen())
            .with_profile("bio", looping_extension())
    }

    fn start(registry: &ProfileRegistry) -> RegisteredProfile {
        registry
            .profile("bio", "https://example.org/StructureDefinition/Specimen")
            .unwrap()
    }

    #[test]
    fn test_plain_id() {
        let registry = registry();
        let chain = ChainResolver::new(&registry)
            .resolve(&start(&registry), "Specimen.type")
            .unwrap();
        assert_eq!(chain.ids(), vec!["Specimen.type"]);
        assert_eq!(chain.first().module(), "bio");
        assert!(chain.warnings().is_empty());
    }

    #[test]
    fn test_trailing_hop_element_ends_chain() {
        let registry = registry();
        let chain = ChainResolver::new(&registry)
            .resolve(&start(&registry), "Specimen.extension:loop")
            .unwrap();
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_unknown_element() {
        let registry = registry();
        let err = ChainResolver::new(&registry)
            .resolve(&start(&registry), "Specimen.nothing")
            .unwrap_err();
        assert_eq!(err.code(), ONTO0100);
        let location = err.location().unwrap();
        assert_eq!(location.element_id.as_deref(), Some("Specimen.nothing"));
        assert_eq!(location.module.as_deref(), Some("bio"));
    }

    #[test]
    fn test_leading_dot_is_invalid() {
        let registry = registry();
        let err = ChainResolver::new(&registry)
            .resolve_ids(&start(&registry), vec![".type".to_string()])
            .unwrap_err();
        assert_eq!(err.code(), ONTO0105);
    }

    #[test]
    fn test_extension_profile_arity() {
        let registry = registry();
        let err = ChainResolver::new(&registry)
            .resolve(&start(&registry), "(Specimen.extension:broken).extension")
            .unwrap_err();
        assert_eq!(err.code(), ONTO0106);
    }

    #[test]
    fn test_missing_extension_definition() {
        let registry = ProfileRegistry::new().with_profile("bio", specimen());
        let err = ChainResolver::new(&registry)
            .resolve(&start(&registry), "(Specimen.extension:loop).extension")
            .unwrap_err();
        assert_eq!(err.code(), ONTO0102);
    }

    #[test]
    fn test_reference_without_candidates() {
        let registry = registry();
        let err = ChainResolver::new(&registry)
            .resolve(&start(&registry), "(Specimen.parent).name")
            .unwrap_err();
        assert_eq!(err.code(), ONTO0104);
    }

    #[test]
    fn test_depth_limit() {
        let registry = registry();
        let resolver = ChainResolver::new(&registry).with_options(ResolverOptions { max_depth: 2 });
        let chain = "((((Specimen.extension:loop).extension).extension).extension).extension";

        let err = resolver.resolve(&start(&registry), chain).unwrap_err();
        assert_eq!(err.code(), ONTO0103);

        let ok = ChainResolver::new(&registry).resolve(&start(&registry), chain).unwrap();
        assert_eq!(
            ok.ids(),
            vec![
                "Specimen.extension:loop",
                "Extension.extension",
                "Extension.extension",
                "Extension.extension",
                "Extension.extension"
            ]
        );
    }
}
