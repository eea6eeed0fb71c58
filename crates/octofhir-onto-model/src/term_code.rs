//! Coded concepts

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A coded concept: (system, code, display, version).
///
/// Identity is (system, code); display and version are descriptive only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermCode {
    pub system: String,
    pub code: String,
    #[serde(default)]
    pub display: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl TermCode {
    pub fn new(system: impl Into<String>, code: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            code: code.into(),
            display: display.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Key used by count maps and closure tables: `system#version`
    pub fn system_version_key(&self) -> String {
        format!("{}#{}", self.system, self.version.as_deref().unwrap_or_default())
    }
}

impl PartialEq for TermCode {
    fn eq(&self, other: &Self) -> bool {
        self.system == other.system && self.code == other.code
    }
}

impl Eq for TermCode {}

impl Hash for TermCode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.system.hash(state);
        self.code.hash(state);
    }
}

impl PartialOrd for TermCode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TermCode {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.system, &self.code).cmp(&(&other.system, &other.code))
    }
}

impl fmt::Display for TermCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.system, self.code)?;
        if !self.display.is_empty() {
            write!(f, " '{}'", self.display)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identity_ignores_display() {
        let a = TermCode::new("http://loinc.org", "8480-6", "Systolic blood pressure");
        let b = TermCode::new("http://loinc.org", "8480-6", "").with_version("2.74");
        assert_eq!(a, b);

        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_serialization_omits_missing_version() {
        let tc = TermCode::new("http://snomed.info/sct", "119297000", "Blood specimen");
        let json = serde_json::to_string(&tc).unwrap();
        assert_eq!(
            json,
            r#"{"system":"http://snomed.info/sct","code":"119297000","display":"Blood specimen"}"#
        );
        assert_eq!(tc.system_version_key(), "http://snomed.info/sct#");
    }
}
