//! Term-code extraction
//!
//! Finds the codes a criterion is selected by: explicit codes from the
//! querying metadata, fixed codings of the defining element, the expansion
//! of its bound value set, or fixed `code`/`system` sub-elements.

use crate::querying_metadata::ResourceQueryingMetaData;
use octofhir_onto_diagnostics::{ErrorBuilder, Result, ONTO0208};
use octofhir_onto_hierarchy::{normalize_display, Terminology};
use octofhir_onto_model::{RegisteredProfile, TermCode};
use octofhir_onto_path::{ChainResolver, ResolvedElement};

/// Fill in a display from the terminology, title-casing capitals.
///
/// The coding's own display is kept when the lookup finds nothing.
pub fn with_display(terminology: &dyn Terminology, term_code: TermCode) -> Result<TermCode> {
    let display = match terminology.lookup_display(&term_code.system, &term_code.code)? {
        Some(display) => display,
        None => {
            if term_code.display.is_empty() {
                log::warn!("No display for {}|{}", term_code.system, term_code.code);
            }
            term_code.display.clone()
        }
    };
    Ok(TermCode {
        display: normalize_display(&display),
        ..term_code
    })
}

/// Term codes defined by a resolved element
pub fn element_term_codes(terminology: &dyn Terminology, resolved: &ResolvedElement) -> Result<Vec<TermCode>> {
    let element = resolved.element();

    if !element.pattern_codings.is_empty() {
        return element
            .pattern_codings
            .iter()
            .map(|coding| with_display(terminology, coding.clone()))
            .collect();
    }

    if let Some(value_set) = &element.value_set {
        log::debug!("Expanding {value_set} for {}", element.id);
        return Ok(terminology.expand_value_set(value_set)?.into_iter().collect());
    }

    let id = resolved.id();
    let code = resolved
        .sibling(&format!("{id}.code"))
        .and_then(|e| e.element().pattern_code.clone());
    let system = resolved
        .sibling(&format!("{id}.system"))
        .and_then(|e| e.element().pattern_uri.clone());
    if let (Some(system), Some(code)) = (system, code) {
        return Ok(vec![with_display(terminology, TermCode::new(system, code, ""))?]);
    }

    Err(ErrorBuilder::new(ONTO0208, "Term code defining element defines no term codes")
        .element(id)
        .profile(resolved.snapshot().url())
        .module(resolved.module())
        .mapping())
}

/// Term codes of a querying-metadata entry applied to `start`
pub fn metadata_term_codes(
    resolver: &ChainResolver<'_>,
    terminology: &dyn Terminology,
    start: &RegisteredProfile,
    metadata: &ResourceQueryingMetaData,
) -> Result<Vec<TermCode>> {
    if let Some(codes) = metadata.term_codes.as_ref().filter(|codes| !codes.is_empty()) {
        return Ok(codes.clone());
    }
    let Some(id) = metadata.term_code_defining_id.as_deref() else {
        return Err(ErrorBuilder::new(ONTO0208, "Neither term codes nor a term code defining id are given")
            .profile(start.snapshot.url())
            .module(start.module.as_str())
            .context(metadata.name.as_str())
            .mapping());
    };
    let chain = resolver.resolve(start, id)?;
    element_term_codes(terminology, chain.last())
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_onto_hierarchy::InMemoryTerminology;
    use octofhir_onto_model::{ElementDefinition, ElementType, ProfileRegistry, ProfileSnapshot};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const SCT: &str = "http://snomed.info/sct";
    const URL: &str = "https://example.org/fhir/StructureDefinition/Specimen";
    const VS: &str = "https://example.org/fhir/ValueSet/specimen-type";

    fn specimen() -> ProfileSnapshot {
        ProfileSnapshot::builder(URL, "Specimen")
            .element(ElementDefinition::new("Specimen"))
            .element(ElementDefinition::new("Specimen.type").with_type(ElementType::CodeableConcept))
            .element(
                ElementDefinition::new("Specimen.type.coding:sct")
                    .with_type(ElementType::Coding)
                    .with_base_path("CodeableConcept.coding")
                    .with_value_set(VS),
            )
            .element(
                ElementDefinition::new("Specimen.container.type.coding:fixed")
                    .with_type(ElementType::Coding)
                    .with_pattern_coding(TermCode::new(SCT, "706047007", "FLUID SPECIMEN CONTAINER")),
            )
            .element(ElementDefinition::new("Specimen.condition.coding").with_type(ElementType::Coding))
            .element(ElementDefinition::new("Specimen.condition.coding.code").with_pattern_code("1003706000"))
            .element(ElementDefinition::new("Specimen.condition.coding.system").with_pattern_uri(SCT))
            .element(ElementDefinition::new("Specimen.note").with_type(ElementType::String))
            .build()
    }

    fn element(id: &str) -> ResolvedElement {
        ResolvedElement::lookup(Arc::new(specimen()), "bioprobe", id).unwrap()
    }

    fn terminology() -> InMemoryTerminology {
        InMemoryTerminology::new()
            .with_value_set(VS, [TermCode::new(SCT, "119297000", "BLOOD SPECIMEN")])
            .with_display(SCT, "1003706000", "Refrigerated")
    }

    #[test]
    fn test_pattern_coding_keeps_own_display() {
        let codes = element_term_codes(&terminology(), &element("Specimen.container.type.coding:fixed")).unwrap();
        assert_eq!(codes[0].display, "Fluid Specimen Container");
    }

    #[test]
    fn test_value_set_binding() {
        let codes = element_term_codes(&terminology(), &element("Specimen.type.coding:sct")).unwrap();
        assert_eq!(codes, vec![TermCode::new(SCT, "119297000", "")]);
        assert_eq!(codes[0].display, "Blood Specimen");
    }

    #[test]
    fn test_sub_elements() {
        let codes = element_term_codes(&terminology(), &element("Specimen.condition.coding")).unwrap();
        assert_eq!(codes[0].code, "1003706000");
        assert_eq!(codes[0].display, "Refrigerated");
    }

    #[test]
    fn test_missing_term_codes() {
        let err = element_term_codes(&terminology(), &element("Specimen.note")).unwrap_err();
        assert_eq!(err.code(), ONTO0208);
    }

    #[test]
    fn test_explicit_codes_win() {
        let registry = ProfileRegistry::new().with_profile("bioprobe", specimen());
        let resolver = ChainResolver::new(&registry);
        let start = RegisteredProfile {
            snapshot: Arc::clone(registry.get(URL).unwrap()),
            module: "bioprobe".to_string(),
        };
        let context = TermCode::new("fdpg.mii.cds", "Specimen", "Bioprobe");
        let explicit = TermCode::new(SCT, "123038009", "Specimen");

        let metadata = ResourceQueryingMetaData::new("Specimen", "Specimen", context.clone())
            .with_term_code_id("Specimen.type.coding:sct")
            .with_term_codes(vec![explicit.clone()]);
        assert_eq!(metadata_term_codes(&resolver, &terminology(), &start, &metadata).unwrap(), vec![explicit]);

        let metadata = ResourceQueryingMetaData::new("Specimen", "Specimen", context)
            .with_term_code_id("Specimen.type.coding:sct");
        let codes = metadata_term_codes(&resolver, &terminology(), &start, &metadata).unwrap();
        assert_eq!(codes[0].code, "119297000");
    }
}
