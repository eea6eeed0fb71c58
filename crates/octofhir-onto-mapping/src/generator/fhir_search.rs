use super::{attribute_key, GeneratorContext, MappingGenerator};
use crate::mapping::{attribute_key_code, FhirSearchAttribute, FhirSearchMapping};
use crate::querying_metadata::ResourceQueryingMetaData;
use crate::search_parameter::{chain_search_parameters, SearchParameter, SearchParameterMatcher};
use indexmap::IndexMap;
use octofhir_onto_diagnostics::{OntoError, Result, ONTO0201, ONTO0205};
use octofhir_onto_model::RegisteredProfile;
use octofhir_onto_path::{composite_code, emit_all, Dialect, ResolvedChain};

/// Generates FHIR Search mappings
pub struct FhirSearchGenerator<'a> {
    ctx: GeneratorContext<'a>,
    matcher: &'a dyn SearchParameterMatcher,
}

impl<'a> FhirSearchGenerator<'a> {
    pub fn new(ctx: GeneratorContext<'a>, matcher: &'a dyn SearchParameterMatcher) -> Self {
        Self { ctx, matcher }
    }

    fn search_parameters(&self, start: &RegisteredProfile, id: &str) -> Result<(ResolvedChain, IndexMap<String, SearchParameter>)> {
        let chain = self.ctx.resolver().resolve(start, id)?;
        let expressions = emit_all(&chain, Dialect::FhirSearch)?;
        let parameters = self
            .matcher
            .find_search_parameter(&expressions)
            .map_err(|e| e.with_context(format!("element '{id}'")))?;
        Ok((chain, parameters))
    }

    /// Search parameter string of a matched parameter sequence
    fn parameter_string(parameter_type: &str, parameters: &IndexMap<String, SearchParameter>) -> Result<String> {
        if parameter_type == "reference" {
            return parameters
                .values()
                .next()
                .map(|p| p.code.clone())
                .ok_or_else(|| OntoError::mapping(ONTO0205, "No search parameter for reference"));
        }
        let chained: Vec<&SearchParameter> = parameters.values().collect();
        chain_search_parameters(&chained)
    }

    fn attribute(&self, start: &RegisteredProfile, id: &str, attribute_type: &str) -> Result<FhirSearchAttribute> {
        let (chain, parameters) = self.search_parameters(start, id)?;
        if attribute_type != "composite" {
            return Ok(FhirSearchAttribute {
                attribute_key: attribute_key_code(&attribute_key(id)),
                attribute_type: attribute_type.to_string(),
                attribute_search_parameter: Self::parameter_string(attribute_type, &parameters)?,
                composite_code: None,
            });
        }

        let composite_type = match parameters.values().next().map(|p| p.param_type.as_str()) {
            Some("quantity") => "quantity",
            Some("token") => "concept",
            other => {
                return Err(OntoError::mapping(
                    ONTO0201,
                    format!("Composite component of type '{}' is not supported", other.unwrap_or("<none>")),
                )
                .with_context(format!("element '{id}'")));
            }
        };
        let (_, composite) = self.matcher.find_composite_search_parameter(&parameters)?;
        let code = composite_code(&chain)?;
        Ok(FhirSearchAttribute {
            attribute_key: code.clone(),
            attribute_type: composite_type.to_string(),
            attribute_search_parameter: composite.code,
            composite_code: Some(code),
        })
    }
}

impl MappingGenerator for FhirSearchGenerator<'_> {
    type Mapping = FhirSearchMapping;

    fn context(&self) -> &GeneratorContext<'_> {
        &self.ctx
    }

    fn generate(
        &self,
        start: &RegisteredProfile,
        metadata: &ResourceQueryingMetaData,
        name: &str,
    ) -> Result<FhirSearchMapping> {
        let mut mapping = FhirSearchMapping::new(name, metadata.resource_type.as_str());

        if let Some(id) = &metadata.term_code_defining_id {
            let (_, parameters) = self.search_parameters(start, id)?;
            mapping.term_code_search_parameter = Some(Self::parameter_string("concept", &parameters)?);
        }

        if let Some(id) = &metadata.value_defining_id {
            let value_type = metadata.value_type.as_deref().unwrap_or_default();
            let (_, parameters) = self.search_parameters(start, id)?;
            mapping.value_search_parameter = Some(Self::parameter_string(value_type, &parameters)?);
            mapping.value_type = metadata.value_type.clone();
        }

        if let Some(id) = &metadata.time_restriction_defining_id {
            let (_, parameters) = self.search_parameters(start, id)?;
            if let Some(last) = parameters.values().last().filter(|p| p.param_type != "date") {
                return Err(OntoError::mapping(
                    ONTO0201,
                    format!("Time restriction parameter '{}' is of type '{}'", last.code, last.param_type),
                )
                .with_context(format!("element '{id}'")));
            }
            mapping.time_restriction_parameter = Some(Self::parameter_string("date", &parameters)?);
        }

        for (id, spec) in &metadata.attribute_defining_id_type_map {
            mapping
                .attribute_search_parameters
                .push(self.attribute(start, id, spec.type_str())?);
        }
        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search_parameter::SearchParameterIndex;
    use octofhir_onto_diagnostics::ONTO0206;
    use octofhir_onto_hierarchy::InMemoryTerminology;
    use octofhir_onto_model::{ElementDefinition, ElementType, ProfileRegistry, ProfileSnapshot, TermCode};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const URL: &str = "https://example.org/fhir/StructureDefinition/BloodPressure";
    const SP: &str = "http://hl7.org/fhir/SearchParameter";
    const LOINC: &str = "http://loinc.org";

    fn registry() -> ProfileRegistry {
        let observation = ProfileSnapshot::builder(URL, "Observation")
            .name("BloodPressure")
            .element(ElementDefinition::new("Observation"))
            .element(ElementDefinition::new("Observation.code").with_type(ElementType::CodeableConcept))
            .element(
                ElementDefinition::new("Observation.code.coding:loinc")
                    .with_type(ElementType::Coding)
                    .with_base_path("CodeableConcept.coding"),
            )
            .element(ElementDefinition::new("Observation.effective[x]").with_type(ElementType::DateTime))
            .element(ElementDefinition::new("Observation.status").with_type(ElementType::Code))
            .element(ElementDefinition::new("Observation.component").with_cardinality(0, "*"))
            .element(
                ElementDefinition::new("Observation.component:systolic").with_type(ElementType::BackboneElement),
            )
            .element(
                ElementDefinition::new("Observation.component:systolic.code").with_type(ElementType::CodeableConcept),
            )
            .element(
                ElementDefinition::new("Observation.component:systolic.code.coding:loinc")
                    .with_type(ElementType::Coding)
                    .with_base_path("CodeableConcept.coding")
                    .with_pattern_coding(TermCode::new(LOINC, "8480-6", "Systolic blood pressure")),
            )
            .element(
                ElementDefinition::new("Observation.component:systolic.value[x]").with_type(ElementType::Quantity),
            )
            .build();
        ProfileRegistry::new().with_profile("vitals", observation)
    }

    fn parameters() -> SearchParameterIndex {
        SearchParameterIndex::new()
            .with_parameter(SearchParameter::new(
                format!("{SP}/clinical-code"),
                "code",
                "token",
                &["Observation"],
                "Observation.code",
            ))
            .with_parameter(SearchParameter::new(
                format!("{SP}/clinical-date"),
                "date",
                "date",
                &["Observation"],
                "Observation.effective",
            ))
            .with_parameter(SearchParameter::new(
                format!("{SP}/Observation-status"),
                "status",
                "token",
                &["Observation"],
                "Observation.status",
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
    }

    fn start(registry: &ProfileRegistry) -> RegisteredProfile {
        RegisteredProfile {
            snapshot: Arc::clone(registry.get(URL).unwrap()),
            module: "vitals".to_string(),
        }
    }

    fn metadata() -> ResourceQueryingMetaData {
        ResourceQueryingMetaData::new("BloodPressure", "Observation", TermCode::new("fdpg.mii.cds", "Vitals", "Vitals"))
            .with_term_code_id("Observation.code.coding:loinc")
            .with_time_restriction("Observation.effective[x]")
            .with_attribute("Observation.status", "code")
            .with_attribute(
                "Observation.component.where(Observation.component:systolic.code.coding:loinc):systolic.value[x]",
                "composite",
            )
    }

    #[test]
    fn test_generate() {
        let registry = registry();
        let terminology = InMemoryTerminology::new();
        let index = parameters();
        let generator = FhirSearchGenerator::new(GeneratorContext::new(&registry, &terminology), &index);

        let mapping = generator.generate(&start(&registry), &metadata(), "BloodPressure").unwrap();
        assert_eq!(mapping.fhir_resource_type, "Observation");
        assert_eq!(mapping.term_code_search_parameter.as_deref(), Some("code"));
        assert_eq!(mapping.time_restriction_parameter.as_deref(), Some("date"));

        let status = &mapping.attribute_search_parameters[0];
        assert_eq!(status.attribute_key, attribute_key_code("status"));
        assert_eq!(status.attribute_search_parameter, "status");

        let systolic = &mapping.attribute_search_parameters[1];
        assert_eq!(systolic.attribute_type, "quantity");
        assert_eq!(systolic.attribute_search_parameter, "component-code-value-quantity");
        assert_eq!(systolic.attribute_key, TermCode::new(LOINC, "8480-6", ""));
        assert_eq!(systolic.composite_code, Some(TermCode::new(LOINC, "8480-6", "")));
    }

    #[test]
    fn test_time_restriction_must_be_date() {
        let registry = registry();
        let terminology = InMemoryTerminology::new();
        let index = parameters();
        let generator = FhirSearchGenerator::new(GeneratorContext::new(&registry, &terminology), &index);

        let metadata = metadata().with_time_restriction("Observation.status");
        let err = generator.generate(&start(&registry), &metadata, "BloodPressure").unwrap_err();
        assert_eq!(err.code(), ONTO0201);
    }

    #[test]
    fn test_unchainable_parameters() {
        let first = SearchParameter::new("a", "subject", "reference", &["Observation"], "Observation.subject")
            .with_target(&["Patient"]);
        let second = SearchParameter::new("b", "code", "token", &["Condition"], "Condition.code");
        let parameters = IndexMap::from([("x".to_string(), first), ("y".to_string(), second)]);

        let err = FhirSearchGenerator::parameter_string("concept", &parameters).unwrap_err();
        assert_eq!(err.code(), ONTO0206);
        assert_eq!(FhirSearchGenerator::parameter_string("reference", &parameters).unwrap(), "subject");
    }
}
