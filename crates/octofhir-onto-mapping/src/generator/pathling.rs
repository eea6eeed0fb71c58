use super::{attribute_key, GeneratorContext, MappingGenerator};
use crate::mapping::{attribute_key_code, PathlingAttribute, PathlingMapping};
use crate::querying_metadata::ResourceQueryingMetaData;
use octofhir_onto_diagnostics::Result;
use octofhir_onto_model::RegisteredProfile;
use octofhir_onto_path::{composite_code, composite_path, emit, term_code_path, Dialect};
use std::collections::BTreeSet;

/// Generates Pathling mappings
pub struct PathlingGenerator<'a> {
    ctx: GeneratorContext<'a>,
}

impl<'a> PathlingGenerator<'a> {
    pub fn new(ctx: GeneratorContext<'a>) -> Self {
        Self { ctx }
    }

    fn attribute(&self, start: &RegisteredProfile, id: &str, attribute_type: &str) -> Result<PathlingAttribute> {
        let chain = self.ctx.resolver().resolve(start, id)?;
        if attribute_type == "composite" {
            let code = composite_code(&chain)?;
            return Ok(PathlingAttribute {
                attribute_path: composite_path(id, &chain, &code)?,
                attribute_key: code,
                types: BTreeSet::from([attribute_type.to_string()]),
            });
        }

        let rendered = match attribute_type {
            "reference" => "Reference",
            other => other,
        };
        Ok(PathlingAttribute {
            attribute_key: attribute_key_code(&attribute_key(id)),
            attribute_path: term_code_path(&chain, Dialect::Pathling)?,
            types: BTreeSet::from([rendered.to_string()]),
        })
    }
}

impl MappingGenerator for PathlingGenerator<'_> {
    type Mapping = PathlingMapping;

    fn context(&self) -> &GeneratorContext<'_> {
        &self.ctx
    }

    fn generate(&self, start: &RegisteredProfile, metadata: &ResourceQueryingMetaData, name: &str) -> Result<PathlingMapping> {
        let resolver = self.ctx.resolver();
        let mut mapping = PathlingMapping::new(name, metadata.resource_type.as_str());

        if let Some(id) = &metadata.term_code_defining_id {
            let chain = resolver.resolve(start, id)?;
            mapping.term_code_fhir_path = Some(term_code_path(&chain, Dialect::Pathling)?);
        }

        if let Some(id) = &metadata.value_defining_id {
            let chain = resolver.resolve(start, id)?;
            mapping.value_fhir_path = Some(emit(&chain, Dialect::Pathling)?);
            mapping.value_type = metadata.value_type.clone();
        }

        if let Some(id) = &metadata.time_restriction_defining_id {
            let chain = resolver.resolve(start, id)?;
            mapping.time_restriction_fhir_path = Some(emit(&chain, Dialect::Pathling)?);
        }

        for (id, spec) in &metadata.attribute_defining_id_type_map {
            mapping.attribute_fhir_paths.push(self.attribute(start, id, spec.type_str())?);
        }
        Ok(mapping)
    }
}
