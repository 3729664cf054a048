use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use snafu::{OptionExt, Snafu};
use tracing::debug;

use crate::config::PreviewConfig;
use crate::registry::{ImportMap, ResourceHandle, ResourceRef};
use crate::resolver::ExternalPackage;
use crate::store::StorePath;

/// Issues resource handles for transformed modules and assembles import maps.
///
/// Every rebuild is a new generation, built next to the installed one. A
/// generation is either installed, which releases every other generation, or
/// discarded, which releases only itself. At most two generations are live at
/// once, and only while a build is in progress.
#[derive(Debug)]
pub struct ModuleRegistry {
    config: Arc<PreviewConfig>,
    generation: u64,
    installed: Option<u64>,
    next_sequence: u64,
    resources: HashMap<ResourceHandle, Arc<str>>,
    by_path: BTreeMap<StorePath, ResourceHandle>,
}

impl ModuleRegistry {
    pub fn new(config: Arc<PreviewConfig>) -> Self {
        ModuleRegistry {
            config,
            generation: 0,
            installed: None,
            next_sequence: 0,
            resources: HashMap::new(),
            by_path: BTreeMap::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The generation whose handles back the live preview.
    pub fn installed(&self) -> Option<u64> {
        self.installed
    }

    /// Starts a new generation. Handles of the installed generation stay
    /// fetchable until [`install`](Self::install) replaces them.
    pub fn begin_generation(&mut self) -> u64 {
        self.by_path.clear();
        self.generation += 1;
        self.next_sequence = 0;
        debug!("Starting registry generation {}", self.generation);
        self.generation
    }

    /// Makes `generation` the live one and releases every other handle.
    pub fn install(&mut self, generation: u64) -> usize {
        let released = self.release_where(|handle| handle.generation() != generation);
        self.installed = Some(generation);
        debug!(
            "Installed registry generation {} ({} handles released)",
            generation, released
        );
        released
    }

    /// Releases the handles of a generation that will never be installed.
    pub fn discard(&mut self, generation: u64) -> usize {
        if self.installed == Some(generation) {
            return 0;
        }
        let released = self.release_where(|handle| handle.generation() == generation);
        if self.generation == generation {
            self.by_path.clear();
        }
        debug!(
            "Discarded registry generation {} ({} handles released)",
            generation, released
        );
        released
    }

    fn release_where(&mut self, released: impl Fn(&ResourceHandle) -> bool) -> usize {
        let before = self.resources.len();
        self.resources.retain(|handle, _| !released(handle));
        before - self.resources.len()
    }

    /// Registers `code` for `path` in the current generation.
    ///
    /// Registering the same path twice in one generation replaces the code
    /// behind the existing handle.
    pub fn register(&mut self, path: &StorePath, code: Arc<str>) -> ResourceHandle {
        let handle = match self.by_path.get(path) {
            Some(handle) => *handle,
            None => {
                let handle = ResourceHandle::new(self.generation, self.next_sequence);
                self.next_sequence += 1;
                self.by_path.insert(path.clone(), handle);
                handle
            }
        };
        self.resources.insert(handle, code);
        handle
    }

    /// Handle of `path` in the generation being built.
    pub fn handle_for(&self, path: &StorePath) -> Option<ResourceHandle> {
        self.by_path.get(path).copied()
    }

    pub fn fetch(&self, handle: &ResourceHandle) -> Result<Arc<str>, RegistryError> {
        self.resources
            .get(handle)
            .cloned()
            .context(ReleasedHandleSnafu { handle: *handle })
    }

    pub fn live_handles(&self) -> usize {
        self.resources.len()
    }

    /// `<cdn>/<name>[@<version>][/<subpath>]`
    pub fn delivery_url(&self, package: &ExternalPackage) -> String {
        let mut url = format!("{}/{}", self.config.package_cdn, package.name);
        if let Some(version) = self.config.package_versions.get(&package.name) {
            url.push('@');
            url.push_str(version);
        }
        if let Some(subpath) = &package.subpath {
            url.push('/');
            url.push_str(subpath);
        }
        url
    }

    /// Import map over every module registered in the current generation plus
    /// the given packages.
    pub fn import_map<'a>(
        &self,
        entry: ResourceHandle,
        packages: impl IntoIterator<Item = &'a ExternalPackage>,
    ) -> ImportMap {
        let mut imports: BTreeMap<String, ResourceRef> = self
            .by_path
            .iter()
            .map(|(path, handle)| (path.to_string(), ResourceRef::Local(*handle)))
            .collect();
        for package in packages {
            imports.insert(
                package.specifier(),
                ResourceRef::External(self.delivery_url(package)),
            );
        }
        ImportMap { imports, entry }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum RegistryError {
    #[snafu(display("Resource {} has been released", handle))]
    ReleasedHandle { handle: ResourceHandle },
}
