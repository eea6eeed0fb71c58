//! Element location tracking for resolution failures

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where in the profile set a failure occurred.
///
/// Resolution failures are almost always caused by profile authoring
/// mistakes, so each error names the element id, the profile that was being
/// searched and the module that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ElementLocation {
    /// Element id that was being looked up
    pub element_id: Option<String>,
    /// Canonical URL of the profile snapshot
    pub profile_url: Option<String>,
    /// Module owning the profile
    pub module: Option<String>,
}

impl ElementLocation {
    /// Create a location for an element id
    pub fn element(element_id: impl Into<String>) -> Self {
        Self {
            element_id: Some(element_id.into()),
            ..Self::default()
        }
    }

    /// Set the profile URL
    pub fn in_profile(mut self, profile_url: impl Into<String>) -> Self {
        self.profile_url = Some(profile_url.into());
        self
    }

    /// Set the module name
    pub fn in_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.element_id.is_none() && self.profile_url.is_none() && self.module.is_none()
    }
}

impl fmt::Display for ElementLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = [
            ("element", &self.element_id),
            ("profile", &self.profile_url),
            ("module", &self.module),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.as_ref().map(|v| format!("{label}={v}")))
        .collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        let loc = ElementLocation::element("Specimen.type.coding:sct")
            .in_profile("https://example.org/StructureDefinition/Specimen")
            .in_module("bbmri");

        assert_eq!(
            loc.to_string(),
            "[element=Specimen.type.coding:sct, profile=https://example.org/StructureDefinition/Specimen, module=bbmri]"
        );
    }

    #[test]
    fn test_partial_location_display() {
        let loc = ElementLocation::default().in_module("lab");
        assert_eq!(loc.to_string(), "[module=lab]");
        assert!(!loc.is_empty());
        assert!(ElementLocation::default().is_empty());
    }
}
