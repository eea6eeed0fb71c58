//! Path expression emission
//!
//! A resolved chain is first turned into one FHIRPath-like expression per
//! element, left to right. Extension elements absorb the `value[x]` element
//! that follows them, and polymorphic elements are cast to their concrete
//! type. The dialects then post-process each expression.

use crate::resolver::{ResolvedChain, ResolvedElement};
use crate::rewrite;
use octofhir_onto_diagnostics::{ErrorBuilder, Result, ONTO0100, ONTO0106, ONTO0202};
use octofhir_onto_model::{ElementDefinition, ElementType, ProfileSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt;

const EXTENSION_VALUE_ID: &str = "Extension.value[x]";
const NESTED_EXTENSION_PREFIX: &str = "Extension.extension:";
const NESTED_EXTENSION_SUFFIX: &str = ".value[x]";

/// Target expression dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    /// CQL paths, relative to the resource
    Cql,
    /// CQL paths of time restrictions: casts are stripped again
    CqlTimeRestriction,
    /// Pathling FHIRPath with combined polymorphic names
    Pathling,
    /// The raw per-element expressions a search parameter matcher consumes
    FhirSearch,
}

impl Dialect {
    /// Dialect post-pass for one per-element expression
    pub fn optimize(self, expression: &str) -> String {
        match self {
            Self::Cql => rewrite::cql_optimize(expression),
            Self::CqlTimeRestriction => rewrite::remove_cast(expression),
            Self::Pathling => rewrite::convert_as_to_combined_name(expression),
            Self::FhirSearch => expression.to_string(),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cql => "cql",
            Self::CqlTimeRestriction => "cql-time-restriction",
            Self::Pathling => "pathling",
            Self::FhirSearch => "fhir-search",
        };
        f.write_str(name)
    }
}

/// The single type an element is treated as.
///
/// `{dateTime, Period}` counts as `dateTime` and `{Reference, CodeableConcept}`
/// as `CodeableConcept`; other multi-type elements are unsupported.
pub fn element_type(element: &ElementDefinition) -> Result<ElementType> {
    match element.types.as_slice() {
        [] => Err(ErrorBuilder::new(ONTO0202, "Element declares no type")
            .element(element.id.as_str())
            .mapping()),
        [single] => Ok(single.code.clone()),
        _ => {
            if element.has_type(&ElementType::DateTime) && element.has_type(&ElementType::Period) {
                Ok(ElementType::DateTime)
            } else if element.has_type(&ElementType::Reference) && element.has_type(&ElementType::CodeableConcept) {
                Ok(ElementType::CodeableConcept)
            } else {
                let codes: Vec<_> = element.types.iter().map(|t| t.code.to_string()).collect();
                Err(ErrorBuilder::new(ONTO0202, format!("Unsupported type combination [{}]", codes.join(", ")))
                    .element(element.id.as_str())
                    .mapping())
            }
        }
    }
}

/// Type of the polymorphic element an id lies in or below.
///
/// The id is cut after `[x]`, or after the `[x]:slice` segment when the
/// choice is sliced and that slice exists.
fn choice_element_type(snapshot: &ProfileSnapshot, id: &str) -> Result<ElementType> {
    let Some(marker) = id.find("[x]") else {
        return lookup_type(snapshot, id);
    };
    let after_marker = marker + "[x]".len();
    let unsliced = &id[..after_marker];

    if id[after_marker..].starts_with(':') {
        let sliced = match id[after_marker..].find('.') {
            Some(dot) => &id[..after_marker + dot],
            None => id,
        };
        if let Some(element) = snapshot.element(sliced) {
            return element_type(element);
        }
    }
    lookup_type(snapshot, unsliced)
}

fn lookup_type(snapshot: &ProfileSnapshot, id: &str) -> Result<ElementType> {
    let element = snapshot.element(id).ok_or_else(|| {
        ErrorBuilder::new(ONTO0100, format!("Choice element '{id}' not found"))
            .element(id)
            .profile(snapshot.url())
            .mapping()
    })?;
    element_type(element)
}

fn extension_url<'a>(resolved: &'a ResolvedElement) -> Result<&'a str> {
    let profiles = resolved
        .element()
        .type_ref(&ElementType::Extension)
        .map(|t| t.profiles.as_slice())
        .unwrap_or_default();
    match profiles {
        [url] => Ok(url.as_str()),
        _ => Err(ErrorBuilder::new(
            ONTO0106,
            format!("Extension element lists {} profiles", profiles.len()),
        )
        .element(resolved.id())
        .profile(resolved.snapshot().url())
        .module(resolved.module())
        .mapping()),
    }
}

/// Name of a nested extension addressed as `Extension.extension:<name>.value[x]`
fn nested_extension_name(id: &str) -> Option<&str> {
    id.strip_prefix(NESTED_EXTENSION_PREFIX)?
        .strip_suffix(NESTED_EXTENSION_SUFFIX)
        .filter(|name| !name.is_empty() && !name.contains('.'))
}

/// One FHIRPath-like expression per chain element.
///
/// With `composite` set, a polymorphic first element is emitted as
/// `value.ofType(<type>)`.
pub fn element_expressions(elements: &[ResolvedElement], composite: bool) -> Result<Vec<String>> {
    let mut expressions = Vec::with_capacity(elements.len());
    for (position, resolved) in elements.iter().enumerate() {
        let element = resolved.element();
        let mut path = element.path.clone();

        if element.has_type(&ElementType::Extension) {
            if let Some(next) = elements.get(position + 1) {
                let next_id = next.id();
                if next_id == EXTENSION_VALUE_ID {
                    let value_type = element_type(next.element())?;
                    path = format!("{path}.where(url='{}').value[x]", extension_url(resolved)?);
                    path = rewrite::replace_x_with_cast(&path, value_type.as_str());
                } else if let Some(name) = nested_extension_name(next_id) {
                    let value_type = element_type(next.element())?;
                    path = format!(
                        "{path}.where(url='{}').extension.where(url='{name}').value[x]",
                        extension_url(resolved)?
                    );
                    path = rewrite::replace_x_with_cast(&path, value_type.as_str());
                }
            }
        }

        if path.contains("[x]") && !path.contains("Extension") {
            let concrete = choice_element_type(resolved.snapshot(), &element.id)?;
            path = if composite && position == 0 {
                format!("value.ofType({concrete})")
            } else {
                rewrite::replace_x_with_cast(&path, concrete.as_str())
            };
        }

        expressions.push(path);
    }
    Ok(expressions)
}

/// Per-element expressions after the dialect post-pass
pub fn emit_all(chain: &ResolvedChain, dialect: Dialect) -> Result<Vec<String>> {
    Ok(element_expressions(chain.elements(), false)?
        .iter()
        .map(|expression| dialect.optimize(expression))
        .collect())
}

/// The dot-joined dialect expression of a chain
pub fn emit(chain: &ResolvedChain, dialect: Dialect) -> Result<String> {
    Ok(emit_all(chain, dialect)?.join("."))
}

/// Path of a term code element.
///
/// When any element of the chain targets `Reference`, the path stops at the
/// first element and addresses the reference itself.
pub fn term_code_path(chain: &ResolvedChain, dialect: Dialect) -> Result<String> {
    for resolved in chain {
        let (_, types) = resolved.compatible()?;
        if types.contains(&ElementType::Reference) {
            let expressions = element_expressions(chain.elements(), false)?;
            let first = expressions.first().map(String::as_str).unwrap_or_default();
            return Ok(format!("{}.reference", dialect.optimize(first)));
        }
    }
    emit(chain, dialect)
}
