//! Resolve command implementation

use super::output::{self, OutputFormat};
use crate::config::ProjectConfig;
use crate::project::Project;
use anyhow::{Context, Result};
use octofhir_onto_model::{CardinalityKind, RegisteredProfile};
use octofhir_onto_path::{aggregate_element, emit_all, ChainResolver, Dialect};
use serde::Serialize;
use std::path::PathBuf;
use tabled::Tabled;

/// Configuration for resolve command
pub struct ResolveConfig {
    pub project_dir: PathBuf,
    pub module: String,
    pub profile: String,
    pub chain: String,
    pub format: OutputFormat,
    pub output_file: Option<PathBuf>,
}

/// One element of a resolved chain
#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRow {
    #[tabled(rename = "Element")]
    pub element_id: String,
    #[tabled(rename = "Profile")]
    pub profile_url: String,
    #[tabled(rename = "Module")]
    pub module: String,
    #[tabled(rename = "Cardinality")]
    pub cardinality: String,
    #[tabled(rename = "CQL")]
    pub cql: String,
    #[tabled(rename = "Pathling")]
    pub pathling: String,
    #[tabled(rename = "FHIR Search")]
    pub fhir_search: String,
}

/// A resolved chain with its per-element paths
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolveReport {
    pub chain: String,
    pub elements: Vec<ResolvedRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Resolve `chain` from `start` and compile every element in each dialect
pub fn resolve_report(
    resolver: &ChainResolver<'_>,
    start: &RegisteredProfile,
    chain: &str,
) -> octofhir_onto_diagnostics::Result<ResolveReport> {
    let resolved = resolver.resolve(start, chain)?;
    let cql = emit_all(&resolved, Dialect::Cql)?;
    let pathling = emit_all(&resolved, Dialect::Pathling)?;
    let fhir_search = emit_all(&resolved, Dialect::FhirSearch)?;

    let mut elements = Vec::with_capacity(resolved.len());
    for (position, element) in resolved.iter().enumerate() {
        elements.push(ResolvedRow {
            element_id: element.id().to_string(),
            profile_url: element.snapshot().url().to_string(),
            module: element.module().to_string(),
            cardinality: aggregate_element(element, CardinalityKind::Max)?.to_string(),
            cql: cql[position].clone(),
            pathling: pathling[position].clone(),
            fhir_search: fhir_search[position].clone(),
        });
    }

    Ok(ResolveReport {
        chain: chain.to_string(),
        elements,
        warnings: resolved.warnings().iter().map(ToString::to_string).collect(),
    })
}

/// Resolve one chain of a loaded project
pub fn resolve(config: ResolveConfig) -> Result<()> {
    let project_config = ProjectConfig::load(&config.project_dir)?;
    let (project, _) = Project::load(&config.project_dir, &project_config)
        .with_context(|| format!("Failed to load project {}", config.project_dir.display()))?;

    let start = project.start(&config.module, &config.profile)?;
    let resolver = project.context().resolver();
    let report = resolve_report(&resolver, &start, &config.chain)?;

    for warning in &report.warnings {
        eprintln!("{}", output::format_warning(warning));
    }
    let content = match config.format {
        OutputFormat::Json => output::format_json(&report)?,
        OutputFormat::Text => output::format_table(report.elements.iter().cloned()),
    };
    output::write_output(&content, config.output_file.as_deref())
}
