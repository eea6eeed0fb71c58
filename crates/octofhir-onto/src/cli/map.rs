//! Map command implementation

use super::output::{self, OutputFormat};
use crate::config::ProjectConfig;
use crate::project::Project;
use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::*;
use octofhir_onto_diagnostics::{OntoError, ONTO0402};
use octofhir_onto_mapping::{
    CqlGenerator, CqlMapping, FhirSearchGenerator, FhirSearchMapping, GenerationReport, MappingGenerator,
    MappingTable, MappingTreeLookup, ModuleMappings, PathlingGenerator, PathlingMapping,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tabled::Tabled;

/// Mapping dialects to generate
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MappingDialect {
    Cql,
    FhirSearch,
    Pathling,
    All,
}

impl MappingDialect {
    fn includes(self, other: MappingDialect) -> bool {
        self == MappingDialect::All || self == other
    }
}

/// Configuration for map command
pub struct MapConfig {
    pub project_dir: PathBuf,
    pub module: Option<String>,
    pub dialect: MappingDialect,
    pub format: OutputFormat,
    pub output_file: Option<PathBuf>,
}

/// An entry no mapping could be generated for
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct SkippedEntry {
    #[tabled(rename = "Dialect")]
    pub dialect: String,
    #[tabled(rename = "Mapping")]
    pub name: String,
    #[tabled(rename = "Error")]
    pub error: String,
}

/// Everything one run generates
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cql: Option<MappingTable<CqlMapping>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fhir_search: Option<MappingTable<FhirSearchMapping>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pathling: Option<MappingTable<PathlingMapping>>,
    pub lookup: MappingTreeLookup,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedEntry>,
}

impl MapOutput {
    fn record(&mut self, dialect: &str, lookup: MappingTreeLookup, report: GenerationReport) {
        self.lookup.extend(lookup);
        self.skipped.extend(report.skipped.into_iter().map(|(name, error)| SkippedEntry {
            dialect: dialect.to_string(),
            name,
            error: error.to_string(),
        }));
    }
}

/// Run one generator over `modules`, sharing the set of generated names
fn run<G: MappingGenerator>(
    generator: &G,
    project: &Project,
    modules: &[&str],
) -> (MappingTable<G::Mapping>, MappingTreeLookup, GenerationReport) {
    let mut table = MappingTable::new();
    let mut lookup = MappingTreeLookup::new();
    let mut report = GenerationReport::default();
    let mut generated = BTreeSet::new();
    for module in modules {
        let Some(metadata) = project.metadata.get(*module) else { continue };
        let (out, names): (ModuleMappings<G::Mapping>, _) = generator.generate_module(*module, metadata, generated);
        generated = names;
        table.extend(out.mappings);
        lookup.extend(out.lookup);
        report.merge(out.report);
    }
    (table, lookup, report)
}

/// Generate the mapping tables of a loaded project
pub fn generate(project: &Project, module: Option<&str>, dialect: MappingDialect) -> crate::Result<MapOutput> {
    let modules: Vec<&str> = match module {
        Some(module) => vec![module],
        None => project.modules(),
    };
    let ctx = project.context();
    let mut out = MapOutput::default();

    if dialect.includes(MappingDialect::Cql) {
        let (table, lookup, report) = run(&CqlGenerator::new(ctx), project, &modules);
        log::info!("Generated {} CQL mappings", table.len());
        out.cql = Some(table);
        out.record("cql", lookup, report);
    }

    if dialect.includes(MappingDialect::FhirSearch) {
        match &project.search_parameters {
            Some(index) => {
                let (table, lookup, report) = run(&FhirSearchGenerator::new(ctx, index), project, &modules);
                log::info!("Generated {} FHIR Search mappings", table.len());
                out.fhir_search = Some(table);
                out.record("fhir-search", lookup, report);
            }
            None if dialect == MappingDialect::FhirSearch => {
                return Err(OntoError::system(
                    ONTO0402,
                    "FHIR Search mappings need 'searchParameters' in the project configuration",
                ));
            }
            None => log::warn!("No search parameters configured, skipping FHIR Search mappings"),
        }
    }

    if dialect.includes(MappingDialect::Pathling) {
        let (table, lookup, report) = run(&PathlingGenerator::new(ctx), project, &modules);
        log::info!("Generated {} Pathling mappings", table.len());
        out.pathling = Some(table);
        out.record("pathling", lookup, report);
    }

    Ok(out)
}

/// Generate and write the mapping tables of a project directory
pub fn map(config: MapConfig) -> Result<()> {
    let project_config = ProjectConfig::load(&config.project_dir)?;
    let (project, stats) = Project::load(&config.project_dir, &project_config)
        .with_context(|| format!("Failed to load project {}", config.project_dir.display()))?;
    for error in &stats.errors {
        eprintln!(
            "{}",
            output::format_warning(&format!("{}: {}", error.file_path.display(), error.error_message))
        );
    }
    if let Some(module) = &config.module {
        if !project.metadata.contains_key(module) {
            anyhow::bail!("Module '{module}' is not loaded");
        }
    }

    let out = generate(&project, config.module.as_deref(), config.dialect)?;
    if config.format == OutputFormat::Text && !out.skipped.is_empty() {
        eprintln!("{}", output::format_table(out.skipped.iter().cloned()));
    }
    output::write_output(&output::format_json(&out)?, config.output_file.as_deref())?;

    if out.skipped.is_empty() {
        eprintln!("{}", output::format_success("All mappings generated"));
    } else {
        eprintln!(
            "{} {} entries skipped",
            "Mapping incomplete:".yellow().bold(),
            out.skipped.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    const SNAPSHOT: &str = r#"{
        "resourceType": "StructureDefinition",
        "url": "https://example.org/fhir/StructureDefinition/Bioprobe",
        "name": "Bioprobe",
        "type": "Specimen",
        "snapshot": {"element": [
            {"id": "Specimen", "path": "Specimen", "min": 0, "max": "*"},
            {"id": "Specimen.collection", "path": "Specimen.collection", "min": 0, "max": "1", "type": [{"code": "BackboneElement"}]},
            {"id": "Specimen.collection.collected[x]", "path": "Specimen.collection.collected[x]", "min": 0, "max": "1",
             "type": [{"code": "dateTime"}, {"code": "Period"}]}
        ]}
    }"#;

    const METADATA: &str = r#"{
        "name": "Bioprobe",
        "context": {"system": "fdpg.mii.cds", "code": "Bioprobe", "display": "Bioprobe"},
        "resource_type": "Specimen",
        "term_codes": [{"system": "http://snomed.info/sct", "code": "119364003", "display": "Serum specimen"}],
        "time_restriction_defining_id": "Specimen.collection.collected[x]"
    }"#;

    fn project() -> (TempDir, Project) {
        let dir = TempDir::new().unwrap();
        let module = dir.path().join("modules/bioprobe");
        fs::create_dir_all(module.join("QueryingMetaData")).unwrap();
        fs::write(module.join("Bioprobe-snapshot.json"), SNAPSHOT).unwrap();
        fs::write(module.join("QueryingMetaData/BioprobeQueryingMetaData.json"), METADATA).unwrap();
        let (project, _) = Project::load(dir.path(), &ProjectConfig::default()).unwrap();
        (dir, project)
    }

    #[test]
    fn test_generate_all_without_search_parameters() {
        let (_dir, project) = project();
        let out = generate(&project, None, MappingDialect::All).unwrap();

        let cql = out.cql.unwrap();
        assert_eq!(cql.len(), 1);
        let time = cql.get("Bioprobe").unwrap().time_restriction.clone().unwrap();
        assert_eq!(time.path, "collection.collected");

        let pathling = out.pathling.unwrap();
        assert_eq!(
            pathling.get("Bioprobe").unwrap().time_restriction_fhir_path.as_deref(),
            Some("collection.collectedDateTime")
        );
        assert!(out.fhir_search.is_none());
        assert_eq!(out.lookup.len(), 1);
        assert!(out.skipped.is_empty());
    }

    #[test]
    fn test_fhir_search_requires_parameters() {
        let (_dir, project) = project();
        let err = generate(&project, None, MappingDialect::FhirSearch).unwrap_err();
        assert_eq!(err.code(), ONTO0402);
    }
}
