//! Profile registry
//!
//! Holds every profile snapshot of a generation run, keyed by canonical URL
//! and by owning module. The registry is populated once and then only read,
//! so it can be shared across threads without locking.

use crate::ProfileSnapshot;
use indexmap::IndexMap;
use octofhir_onto_diagnostics::{OntoError, Result, ONTO0400};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::{DirEntry, WalkDir};

/// A snapshot together with the module that owns it
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredProfile {
    pub snapshot: Arc<ProfileSnapshot>,
    pub module: String,
}

/// Lookup contract the element resolver needs from a profile source
pub trait ProfileProvider: Send + Sync {
    /// Profile by canonical URL, preferring the given module
    fn profile(&self, module: &str, url: &str) -> Option<RegisteredProfile>;

    /// Extension definition by canonical URL, preferring the given module
    fn find_extension(&self, module: &str, url: &str) -> Option<RegisteredProfile> {
        self.profile(module, url)
    }

    /// Profiles matching a reference target URL, best match first:
    /// `baseDefinition` equal to the target, then `type` equal to the target's
    /// last URL segment, then `url` equal to the target.
    fn find_matching_profiles(&self, target_url: &str) -> Vec<RegisteredProfile>;
}

/// Statistics about a registry load
#[derive(Debug, Clone, Default)]
pub struct LoadStats {
    pub loaded: usize,
    pub skipped: usize,
    pub errors: Vec<LoadError>,
}

/// Details about a file that could not be loaded
#[derive(Debug, Clone)]
pub struct LoadError {
    pub file_path: PathBuf,
    pub error_message: String,
}

/// In-memory profile registry
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    by_url: IndexMap<String, Vec<RegisteredProfile>>,
    modules: IndexMap<String, Vec<Arc<ProfileSnapshot>>>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a snapshot under a module
    pub fn insert(&mut self, module: impl Into<String>, snapshot: ProfileSnapshot) -> Arc<ProfileSnapshot> {
        let module = module.into();
        let snapshot = Arc::new(snapshot);
        self.by_url
            .entry(snapshot.url().to_string())
            .or_default()
            .push(RegisteredProfile {
                snapshot: Arc::clone(&snapshot),
                module: module.clone(),
            });
        self.modules.entry(module).or_default().push(Arc::clone(&snapshot));
        snapshot
    }

    /// Builder-style insert
    pub fn with_profile(mut self, module: impl Into<String>, snapshot: ProfileSnapshot) -> Self {
        self.insert(module, snapshot);
        self
    }

    /// First registered snapshot with this URL, regardless of module
    pub fn get(&self, url: &str) -> Option<&Arc<ProfileSnapshot>> {
        self.by_url.get(url).and_then(|entries| entries.first()).map(|e| &e.snapshot)
    }

    /// Module names in load order
    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Snapshots owned by a module
    pub fn snapshots_in(&self, module: &str) -> &[Arc<ProfileSnapshot>] {
        self.modules.get(module).map(Vec::as_slice).unwrap_or_default()
    }

    /// Snapshot of a module by profile name
    pub fn find_by_name(&self, module: &str, name: &str) -> Option<&Arc<ProfileSnapshot>> {
        self.snapshots_in(module).iter().find(|s| s.name() == name)
    }

    pub fn len(&self) -> usize {
        self.modules.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> impl Iterator<Item = &RegisteredProfile> {
        self.by_url.values().flatten()
    }

    /// Load every module below `modules_dir`.
    ///
    /// Each direct subdirectory is a module; it is searched recursively for
    /// `*snapshot.json` files. Files that cannot be decoded are logged and
    /// counted, not treated as fatal.
    pub fn from_dir(modules_dir: impl AsRef<Path>) -> Result<(Self, LoadStats)> {
        Self::from_dir_excluding(modules_dir, &[])
    }

    /// Like [`ProfileRegistry::from_dir`], skipping the named modules
    pub fn from_dir_excluding(modules_dir: impl AsRef<Path>, excluded: &[String]) -> Result<(Self, LoadStats)> {
        let modules_dir = modules_dir.as_ref();
        if !modules_dir.is_dir() {
            return Err(OntoError::system(
                ONTO0400,
                format!("Modules directory not found: {}", modules_dir.display()),
            ));
        }

        let module_dirs = WalkDir::new(modules_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_dir())
            .map(DirEntry::into_path);

        let mut registry = Self::new();
        let mut stats = LoadStats::default();
        for module_dir in module_dirs {
            let Some(module) = module_dir.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };
            if excluded.contains(&module) {
                log::debug!("Skipping excluded module {module}");
                continue;
            }
            registry.load_directory(&module, &module_dir, &mut stats)?;
        }

        log::info!(
            "Loaded {} profile snapshots from {} modules ({} skipped)",
            stats.loaded,
            registry.modules.len(),
            stats.skipped
        );
        Ok((registry, stats))
    }

    fn load_directory(&mut self, module: &str, dir: &Path, stats: &mut LoadStats) -> Result<()> {
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| OntoError::from(std::io::Error::other(e)))?;
            let path = entry.path();
            let is_snapshot = entry.file_type().is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with("snapshot.json"));
            if !is_snapshot {
                continue;
            }

            match Self::load_file(path) {
                Ok(snapshot) => {
                    log::debug!("Loaded {} into module {module}", snapshot.url());
                    self.insert(module, snapshot);
                    stats.loaded += 1;
                }
                Err(e) => {
                    log::warn!("Failed to load {}: {}", path.display(), e);
                    stats.skipped += 1;
                    stats.errors.push(LoadError {
                        file_path: path.to_path_buf(),
                        error_message: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn load_file(path: &Path) -> Result<ProfileSnapshot> {
        let content = fs::read_to_string(path)?;
        ProfileSnapshot::from_json(&content)
    }
}

impl ProfileProvider for ProfileRegistry {
    fn profile(&self, module: &str, url: &str) -> Option<RegisteredProfile> {
        let entries = self.by_url.get(url)?;
        entries
            .iter()
            .find(|e| e.module == module)
            .or_else(|| entries.first())
            .cloned()
    }

    fn find_matching_profiles(&self, target_url: &str) -> Vec<RegisteredProfile> {
        let target_type = target_url.rsplit('/').next().unwrap_or(target_url);

        let by_base = self.entries().filter(|e| e.snapshot.base_definition() == Some(target_url));
        let by_type = self.entries().filter(|e| e.snapshot.resource_type() == target_type);
        let by_url = self.entries().filter(|e| e.snapshot.url() == target_url);

        let mut matches: Vec<RegisteredProfile> = Vec::new();
        for candidate in by_base.chain(by_type).chain(by_url) {
            if !matches.iter().any(|m| Arc::ptr_eq(&m.snapshot, &candidate.snapshot)) {
                matches.push(candidate.clone());
            }
        }
        matches
    }
}
