//! A loaded project: profiles, querying metadata, terminology and search
//! parameters of one project directory

use crate::config::ProjectConfig;
use octofhir_onto_diagnostics::{ErrorBuilder, Result, ONTO0104};
use octofhir_onto_hierarchy::InMemoryTerminology;
use octofhir_onto_mapping::{GeneratorContext, QueryingMetaDataIndex, SearchParameterIndex};
use octofhir_onto_model::{LoadStats, ProfileProvider, ProfileRegistry, RegisteredProfile};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub struct Project {
    pub root: PathBuf,
    pub config: ProjectConfig,
    pub registry: ProfileRegistry,
    /// Querying metadata by module
    pub metadata: BTreeMap<String, QueryingMetaDataIndex>,
    pub terminology: InMemoryTerminology,
    pub search_parameters: Option<SearchParameterIndex>,
}

impl Project {
    /// Load everything `config` points at below `root`.
    ///
    /// Unreadable snapshot and metadata files are counted in the returned
    /// stats. A configured terminology or search parameter file that cannot
    /// be read is an error.
    pub fn load(root: impl AsRef<Path>, config: &ProjectConfig) -> Result<(Self, LoadStats)> {
        let root = root.as_ref().to_path_buf();
        let modules_dir = root.join(&config.modules_dir);
        let (registry, mut stats) = ProfileRegistry::from_dir_excluding(&modules_dir, &config.excluded_modules)?;

        let mut metadata = BTreeMap::new();
        for module in registry.modules() {
            let (index, module_stats) = QueryingMetaDataIndex::from_module_dir(modules_dir.join(module))?;
            log::debug!("Module {module}: {} querying metadata entries", index.len());
            stats.loaded += module_stats.loaded;
            stats.skipped += module_stats.skipped;
            stats.errors.extend(module_stats.errors);
            metadata.insert(module.to_string(), index);
        }

        let terminology = match &config.terminology {
            Some(path) => InMemoryTerminology::from_file(root.join(path))?,
            None => InMemoryTerminology::new(),
        };
        let search_parameters = config
            .search_parameters
            .as_ref()
            .map(|path| SearchParameterIndex::from_path(root.join(path)))
            .transpose()?;

        let project = Self {
            root,
            config: config.clone(),
            registry,
            metadata,
            terminology,
            search_parameters,
        };
        Ok((project, stats))
    }

    /// Loaded module names, in load order
    pub fn modules(&self) -> Vec<&str> {
        self.registry.modules().collect()
    }

    pub fn context(&self) -> GeneratorContext<'_> {
        GeneratorContext::new(&self.registry, &self.terminology).with_options(self.config.generator_options())
    }

    /// The profile `url` as registered in `module`
    pub fn start(&self, module: &str, url: &str) -> Result<RegisteredProfile> {
        self.registry.profile(module, url).ok_or_else(|| {
            ErrorBuilder::new(ONTO0104, format!("Profile '{url}' is not loaded"))
                .profile(url)
                .module(module)
                .resolution()
        })
    }
}
