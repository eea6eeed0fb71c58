//! Cardinality aggregation
//!
//! Cardinalities are collapsed to SINGLE/MANY and multiplied along the
//! ancestor chain of an element, from the element up to the resource root.

use crate::resolver::{ResolvedChain, ResolvedElement};
use octofhir_onto_diagnostics::{ErrorBuilder, Result, ONTO0100, ONTO0200, ONTO0203};
use octofhir_onto_model::{element_id, CardinalityKind, ElementDefinition, ElementType, ProfileSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::Mul;

/// Whether a path can yield more than one value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimpleCardinality {
    #[default]
    Single,
    Many,
}

impl SimpleCardinality {
    /// Map a raw `min`/`max` value: `0` and `1` are SINGLE, anything else MANY
    pub fn from_fhir(raw: &str) -> Self {
        match raw.trim() {
            "0" | "1" => Self::Single,
            _ => Self::Many,
        }
    }

    pub fn is_many(self) -> bool {
        self == Self::Many
    }
}

impl Mul for SimpleCardinality {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        if self.is_many() || rhs.is_many() {
            Self::Many
        } else {
            Self::Single
        }
    }
}

impl fmt::Display for SimpleCardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => f.write_str("single"),
            Self::Many => f.write_str("many"),
        }
    }
}

/// Element chosen in place of another for CQL and Pathling generation
#[derive(Debug, Clone, PartialEq)]
pub struct CompatibleElement<'a> {
    pub element: &'a ElementDefinition,
    /// Types the generated expression targets
    pub types: BTreeSet<ElementType>,
}

/// Substitute an element with the one CQL operations work on.
///
/// A `Coding` slice is replaced by the element it slices. A bare `Coding`
/// whose base path lies in `CodeableConcept` or `Reference` is replaced by
/// its nearest compatible ancestor and targets that data type instead.
pub fn compatible_element<'a>(
    snapshot: &'a ProfileSnapshot,
    element: &'a ElementDefinition,
) -> Result<CompatibleElement<'a>> {
    if element.slice_name.is_some() && element.has_type(&ElementType::Coding) {
        let parent = parent_or_orphan(snapshot, element)?;
        return compatible_element(snapshot, parent);
    }

    let types = element.type_codes();
    if element.types.len() == 1 && element.has_type(&ElementType::Coding) {
        let Some(base_path) = element.base_path.as_deref() else {
            return Err(ErrorBuilder::new(ONTO0203, "Element is missing 'base.path'")
                .element(element.id.as_str())
                .profile(snapshot.url())
                .mapping());
        };
        let root = base_path.split('.').next().unwrap_or(base_path);
        let targeted = ElementType::from(root);
        if matches!(targeted, ElementType::CodeableConcept | ElementType::Reference) {
            if let Some(parent) = snapshot.parent_of(element) {
                let replacement = compatible_element(snapshot, parent)?;
                return Ok(CompatibleElement {
                    element: replacement.element,
                    types: BTreeSet::from([targeted]),
                });
            }
        }
    }

    Ok(CompatibleElement { element, types })
}

fn parent_or_orphan<'a>(snapshot: &'a ProfileSnapshot, element: &ElementDefinition) -> Result<&'a ElementDefinition> {
    snapshot.parent_of(element).ok_or_else(|| {
        ErrorBuilder::new(ONTO0200, format!("No parent for element with non-root path '{}'", element.path))
            .element(element.id.as_str())
            .profile(snapshot.url())
            .mapping()
    })
}

/// Aggregated cardinality of an element as seen from its resource root.
///
/// A root element is always SINGLE and MANY absorbs. When the element's path
/// equals its parent's id the parent is the unsliced base of the same
/// element, so the walk continues at the grandparent.
pub fn aggregate(snapshot: &ProfileSnapshot, element: &ElementDefinition, kind: CardinalityKind) -> Result<SimpleCardinality> {
    let compat = compatible_element(snapshot, element)?.element;
    if element_id::is_root(&compat.path) {
        return Ok(SimpleCardinality::Single);
    }

    let card = SimpleCardinality::from_fhir(&compat.cardinality(kind));
    if card.is_many() {
        return Ok(card);
    }

    let parent = parent_or_orphan(snapshot, compat)?;
    if compat.path == parent.id {
        let compat_parent = compatible_element(snapshot, parent)?.element;
        return match snapshot.parent_of(compat_parent) {
            Some(grandparent) => Ok(aggregate(snapshot, grandparent, kind)? * card),
            None if element_id::is_root(&compat_parent.path) => Ok(card),
            None => Err(ErrorBuilder::new(
                ONTO0200,
                format!("No parent for element with non-root path '{}'", compat_parent.path),
            )
            .element(compat_parent.id.as_str())
            .profile(snapshot.url())
            .mapping()),
        };
    }

    Ok(aggregate(snapshot, parent, kind)? * card)
}

/// Aggregate of a resolved element, after compatibility substitution
pub fn aggregate_element(resolved: &ResolvedElement, kind: CardinalityKind) -> Result<SimpleCardinality> {
    aggregate(resolved.snapshot(), resolved.element(), kind)
}

/// Product of the per-element aggregates along a resolved chain
pub fn aggregate_chain(chain: &ResolvedChain, kind: CardinalityKind) -> Result<SimpleCardinality> {
    let mut acc = SimpleCardinality::Single;
    for resolved in chain {
        if acc.is_many() {
            break;
        }
        acc = acc * aggregate_element(resolved, kind)?;
    }
    Ok(acc)
}

impl ResolvedElement {
    /// The compatibility substitute of this element, in the same snapshot
    pub fn compatible(&self) -> Result<(ResolvedElement, BTreeSet<ElementType>)> {
        let compat = compatible_element(self.snapshot(), self.element())?;
        let resolved = self.sibling(&compat.element.id).ok_or_else(|| {
            ErrorBuilder::new(ONTO0100, "Substituted element is not part of the snapshot")
                .element(compat.element.id.as_str())
                .profile(self.snapshot().url())
                .module(self.module())
                .mapping()
        })?;
        Ok((resolved, compat.types))
    }
}

impl ResolvedChain {
    /// The chain with its last element replaced by its compatibility
    /// substitute, plus the types the substitute targets
    pub fn compatible(&self) -> Result<(ResolvedChain, BTreeSet<ElementType>)> {
        let (last, types) = self.last().compatible()?;
        let mut elements = self.elements().to_vec();
        if let Some(slot) = elements.last_mut() {
            *slot = last;
        }
        let chain = ResolvedChain::new(elements).ok_or_else(|| {
            ErrorBuilder::new(ONTO0100, "Empty element chain")
                .element(self.last().id())
                .mapping()
        })?;
        Ok((chain, types))
    }
}
