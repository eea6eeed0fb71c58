//! ModelInfo type metadata
//!
//! Only the part of an HL7 ModelInfo document that mapping generation reads
//! is kept: which FHIR types are retrievable and their primary code path.

pub mod parser;
pub mod types;

pub use parser::*;
pub use types::*;

use once_cell::sync::Lazy;

static FHIR_MODEL_INFO: Lazy<ModelInfo> = Lazy::new(|| {
    parse_xml(include_str!("../../resources/fhir-modelinfo-4.0.1.xml")).unwrap_or_else(|e| {
        log::error!("Bundled FHIR ModelInfo could not be parsed: {e}");
        ModelInfo::new("FHIR", "4.0.1")
    })
});

/// The bundled FHIR R4 ModelInfo
pub fn fhir_model_info() -> &'static ModelInfo {
    &FHIR_MODEL_INFO
}

/// Primary code path of a FHIR resource type, e.g. `code` for `Condition`
pub fn primary_code_path(resource_type: &str) -> Option<&'static str> {
    fhir_model_info()
        .get_type(resource_type)
        .and_then(|t| t.primary_code_path.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_primary_code_paths() {
        assert_eq!(primary_code_path("Condition"), Some("code"));
        assert_eq!(primary_code_path("Specimen"), Some("type"));
        assert_eq!(primary_code_path("MedicationStatement"), Some("medication"));
        assert_eq!(primary_code_path("Patient"), None);
        assert!(fhir_model_info().get_type("Patient").is_some_and(|t| t.retrievable));
    }
}
