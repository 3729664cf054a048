use snafu::Snafu;
use tracing::trace;

use crate::config::PreviewConfig;
use crate::resolver::ExternalPackage;
use crate::store::{Store, StorePath};

/// What an import specifier refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resolution {
    InStoreFile(StorePath),
    ExternalPackage(ExternalPackage),
}

impl Resolution {
    /// The specifier the sandbox sees once the import has been rewritten.
    pub fn sandbox_specifier(&self) -> String {
        match self {
            Resolution::InStoreFile(path) => path.to_string(),
            Resolution::ExternalPackage(package) => package.specifier(),
        }
    }
}

/// Maps import specifiers to files in the store or to external packages.
///
/// Resolution order: root alias, absolute path, relative path, package name.
/// Candidate files are tried as the exact path, then with each configured
/// extension, then as `<dir>/index<ext>`; the first existing file wins.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    config: &'a PreviewConfig,
}

impl<'a> Resolver<'a> {
    pub fn new(config: &'a PreviewConfig) -> Self {
        Resolver { config }
    }

    pub fn resolve(
        &self,
        store: &Store,
        importer: &StorePath,
        specifier: &str,
    ) -> Result<Resolution, ResolveError> {
        let unresolved = || ResolveError::UnresolvedImport {
            specifier: specifier.to_string(),
            importer: importer.clone(),
        };

        let candidate = if let Some(rest) = specifier.strip_prefix(self.config.root_alias.as_str()) {
            StorePath::root().join(rest).ok()
        } else if specifier.starts_with('/') {
            StorePath::parse(specifier).ok()
        } else if is_relative(specifier) {
            importer.directory().join(specifier).ok()
        } else {
            return ExternalPackage::parse(specifier)
                .map(Resolution::ExternalPackage)
                .ok_or_else(unresolved);
        };

        candidate
            .and_then(|candidate| self.first_existing(store, &candidate))
            .map(Resolution::InStoreFile)
            .ok_or_else(unresolved)
    }

    /// Candidate paths for `base`, in probing order.
    pub fn candidates(&self, base: &StorePath) -> Vec<StorePath> {
        let mut candidates = vec![base.clone()];
        if !base.is_root() {
            candidates.extend(
                self.config
                    .extensions
                    .iter()
                    .filter_map(|ext| StorePath::parse(format!("{base}{ext}")).ok()),
            );
        }
        candidates.extend(
            self.config
                .extensions
                .iter()
                .map(|ext| base.child(&format!("{}{ext}", self.config.index_basename))),
        );
        candidates
    }

    fn first_existing(&self, store: &Store, base: &StorePath) -> Option<StorePath> {
        let found = self
            .candidates(base)
            .into_iter()
            .find(|candidate| store.is_file(candidate));
        trace!("Looked up '{}': {:?}", base, found);
        found
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum ResolveError {
    #[snafu(display("Cannot resolve '{}' imported from '{}'", specifier, importer))]
    UnresolvedImport {
        specifier: String,
        importer: StorePath,
    },
}
