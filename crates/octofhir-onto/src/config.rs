//! Project configuration (`onto.json`)

use octofhir_onto_diagnostics::{OntoError, Result, ONTO0402};
use octofhir_onto_mapping::GeneratorOptions;
use octofhir_onto_path::{ResolverOptions, DEFAULT_MAX_DEPTH};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the project configuration
pub const CONFIG_FILE: &str = "onto.json";

fn default_modules_dir() -> PathBuf {
    PathBuf::from("modules")
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

/// Settings of one project directory. Relative paths are relative to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    #[serde(default = "default_modules_dir")]
    pub modules_dir: PathBuf,
    /// SearchParameter Bundle, or a directory of them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_parameters: Option<PathBuf>,
    /// Offline terminology document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminology: Option<PathBuf>,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_modules: Vec<String>,
    #[serde(default = "default_skip_primary")]
    pub skip_primary_code_paths: bool,
}

fn default_skip_primary() -> bool {
    GeneratorOptions::default().skip_primary_code_paths
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            modules_dir: default_modules_dir(),
            search_parameters: None,
            terminology: None,
            max_depth: DEFAULT_MAX_DEPTH,
            excluded_modules: Vec::new(),
            skip_primary_code_paths: default_skip_primary(),
        }
    }
}

impl ProjectConfig {
    /// Read `onto.json` from `project_dir`; defaults when there is none
    pub fn load(project_dir: impl AsRef<Path>) -> Result<Self> {
        let path = project_dir.as_ref().join(CONFIG_FILE);
        if !path.is_file() {
            log::debug!("No {CONFIG_FILE} in {}, using defaults", project_dir.as_ref().display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            OntoError::system(ONTO0402, format!("Invalid project configuration: {e}"))
                .with_context(path.display().to_string())
        })?;
        if config.max_depth == 0 {
            return Err(OntoError::system(ONTO0402, "'maxDepth' must be at least 1")
                .with_context(path.display().to_string()));
        }
        Ok(config)
    }

    pub fn generator_options(&self) -> GeneratorOptions {
        GeneratorOptions {
            resolver: ResolverOptions {
                max_depth: self.max_depth,
            },
            skip_primary_code_paths: self.skip_primary_code_paths,
        }
    }
}
