use super::{
    allowed_types, attribute_key, GeneratorContext, MappingGenerator, TERM_CODE_TYPES, TIME_RESTRICTION_TYPES,
    VALUE_TYPES,
};
use crate::mapping::{attribute_key_code, CqlAttribute, CqlMapping, CqlTypedPath};
use crate::querying_metadata::ResourceQueryingMetaData;
use octofhir_onto_diagnostics::Result;
use octofhir_onto_model::{primary_code_path, CardinalityKind, ElementType, RegisteredProfile};
use octofhir_onto_path::rewrite::{remove_resource_type, strip_wrapping_parentheses, sub_path_equals};
use octofhir_onto_path::{
    aggregate_chain, composite_code, composite_path, composite_value_type, emit, term_code_path, Dialect,
    ResolvedChain,
};
use std::collections::BTreeSet;

/// Generates CQL mappings
pub struct CqlGenerator<'a> {
    ctx: GeneratorContext<'a>,
}

/// Whether `id` addresses the primary code path of `resource_type`
fn is_primary_code_path(resource_type: &str, id: &str) -> bool {
    let path = remove_resource_type(id);
    primary_code_path(resource_type).is_some_and(|primary| sub_path_equals(primary, strip_wrapping_parentheses(&path)))
}

impl<'a> CqlGenerator<'a> {
    pub fn new(ctx: GeneratorContext<'a>) -> Self {
        Self { ctx }
    }

    fn typed_path(
        &self,
        chain: &ResolvedChain,
        allowed: &[ElementType],
        role: &str,
        dialect: Dialect,
        term_code: bool,
    ) -> Result<CqlTypedPath> {
        let (compatible, types) = chain.compatible()?;
        let types = allowed_types(chain, types, allowed, role)?;
        let path = if term_code {
            term_code_path(&compatible, dialect)?
        } else {
            emit(&compatible, dialect)?
        };
        Ok(CqlTypedPath {
            path,
            types,
            cardinality: aggregate_chain(&compatible, CardinalityKind::Max)?,
        })
    }

    fn attribute(&self, start: &RegisteredProfile, id: &str, attribute_type: &str) -> Result<CqlAttribute> {
        let chain = self.ctx.resolver().resolve(start, id)?;
        match attribute_type {
            "composite" => {
                let code = composite_code(&chain)?;
                Ok(CqlAttribute {
                    path: composite_path(id, &chain, &code)?,
                    types: BTreeSet::from([composite_value_type(&chain)?]),
                    cardinality: aggregate_chain(&chain, CardinalityKind::Max)?,
                    key: code,
                    reference_target_type: None,
                })
            }
            "reference" => Ok(CqlAttribute {
                key: attribute_key_code(&attribute_key(id)),
                types: BTreeSet::from([ElementType::Reference]),
                path: term_code_path(&chain, Dialect::Cql)?,
                cardinality: aggregate_chain(&chain, CardinalityKind::Max)?,
                reference_target_type: Some(self.ctx.reference_target_type(&chain)?),
            }),
            _ => {
                let (compatible, types) = chain.compatible()?;
                Ok(CqlAttribute {
                    key: attribute_key_code(&attribute_key(id)),
                    types,
                    path: term_code_path(&compatible, Dialect::Cql)?,
                    cardinality: aggregate_chain(&compatible, CardinalityKind::Max)?,
                    reference_target_type: None,
                })
            }
        }
    }
}

impl MappingGenerator for CqlGenerator<'_> {
    type Mapping = CqlMapping;

    fn context(&self) -> &GeneratorContext<'_> {
        &self.ctx
    }

    fn generate(&self, start: &RegisteredProfile, metadata: &ResourceQueryingMetaData, name: &str) -> Result<CqlMapping> {
        let resolver = self.ctx.resolver();
        let mut mapping = CqlMapping::new(name, metadata.resource_type.as_str());

        if let Some(id) = &metadata.term_code_defining_id {
            if self.ctx.options.skip_primary_code_paths && is_primary_code_path(&metadata.resource_type, id) {
                log::debug!("'{id}' is the primary code path of {}", metadata.resource_type);
            } else {
                let chain = resolver.resolve(start, id)?;
                mapping.term_code = Some(self.typed_path(&chain, TERM_CODE_TYPES, "Term code", Dialect::Cql, true)?);
            }
        }

        if let Some(id) = &metadata.value_defining_id {
            let chain = resolver.resolve(start, id)?;
            mapping.value = Some(self.typed_path(&chain, VALUE_TYPES, "Value", Dialect::Cql, false)?);
        }

        if let Some(id) = &metadata.time_restriction_defining_id {
            let chain = resolver.resolve(start, id)?;
            mapping.time_restriction = Some(self.typed_path(
                &chain,
                TIME_RESTRICTION_TYPES,
                "Time restriction",
                Dialect::CqlTimeRestriction,
                false,
            )?);
        }

        for (id, spec) in &metadata.attribute_defining_id_type_map {
            mapping.attributes.push(self.attribute(start, id, spec.type_str())?);
        }
        Ok(mapping)
    }
}
