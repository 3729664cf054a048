use std::collections::BTreeSet;
use std::sync::Arc;

use derive_more::IsVariant;
use futures::{FutureExt, StreamExt};
use futures_channel::mpsc::UnboundedReceiver;
use snafu::Snafu;
use tracing::{debug, info, trace, warn};

use crate::config::PreviewConfig;
use crate::preview::{ModuleGraph, Sandbox};
use crate::registry::{ImportMap, ModuleRegistry};
use crate::store::{Store, StoreChange, StorePath};
use crate::transformer::{
    CacheStats, ModuleKind, SyntaxEngine, TransformError, TransformedModule, Transformer,
    stylesheet_module,
};

/// Stylesheet text pulled in by a CSS import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stylesheet {
    pub path: StorePath,
    pub text: Arc<str>,
}

/// Everything the sandbox needs for one reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewDocument {
    pub import_map: ImportMap,
    pub styles: Vec<Stylesheet>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub generation: u64,
    pub entry: StorePath,
    /// Modules reachable from the entry, stylesheets included.
    pub reachable: usize,
    pub registered: usize,
    pub styles: usize,
    pub import_map: ImportMap,
    pub cache: CacheStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum BuildError {
    #[snafu(display("No entry file found, looked for {}", candidates.join(", ")))]
    MissingEntry { candidates: Vec<String> },
    #[snafu(display("{}", source))]
    Module { source: TransformError },
}

#[derive(Debug, Clone, PartialEq, Eq, IsVariant)]
pub enum BuildStatus {
    Idle,
    Building,
    Ready(BuildReport),
    /// `partial` holds the best-effort import map over the modules that did
    /// transform; it is absent when the entry itself failed. Its handles are
    /// released as soon as the build ends, the installed preview stays live.
    Failed {
        errors: Vec<BuildError>,
        partial: Option<BuildReport>,
    },
}

/// Rebuilds the preview whenever the store changes or a refresh is requested.
///
/// Triggers only set a pending flag; the next call to
/// [`rebuild_if_pending`](Self::rebuild_if_pending) runs one build over the
/// store as it is at that moment, however many triggers came before.
pub struct PreviewOrchestrator<S: Sandbox> {
    config: Arc<PreviewConfig>,
    transformer: Transformer,
    registry: ModuleRegistry,
    sandbox: S,
    status: BuildStatus,
    changes: Option<UnboundedReceiver<StoreChange>>,
    pending: bool,
    builds: usize,
    document: Option<PreviewDocument>,
}

impl<S: Sandbox> PreviewOrchestrator<S> {
    pub fn new(config: Arc<PreviewConfig>, engine: Box<dyn SyntaxEngine>, sandbox: S) -> Self {
        PreviewOrchestrator {
            transformer: Transformer::new(config.clone(), engine),
            registry: ModuleRegistry::new(config.clone()),
            config,
            sandbox,
            status: BuildStatus::Idle,
            changes: None,
            pending: false,
            builds: 0,
            document: None,
        }
    }

    /// Subscribes to `store` and schedules an initial build.
    pub fn watch(&mut self, store: &mut Store) {
        self.changes = Some(store.subscribe());
        self.on_trigger();
    }

    pub fn request_refresh(&mut self) {
        debug!("Preview refresh requested");
        self.on_trigger();
    }

    /// Drains the change subscription, returning how many changes arrived.
    pub fn collect_changes(&mut self) -> usize {
        let Some(changes) = self.changes.as_mut() else {
            return 0;
        };
        let mut received = 0;
        while let Some(Some(change)) = changes.next().now_or_never() {
            trace!("Store change: {} {}", change.kind, change.path);
            received += 1;
        }
        if received > 0 {
            self.on_trigger();
        }
        received
    }

    fn on_trigger(&mut self) {
        if self.status.is_failed() {
            self.status = BuildStatus::Idle;
        }
        self.pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Runs one build if any trigger arrived since the last one.
    pub fn rebuild_if_pending(&mut self, store: &Store) -> bool {
        self.collect_changes();
        if !self.pending {
            return false;
        }
        self.build(store);
        true
    }

    pub fn build(&mut self, store: &Store) -> &BuildStatus {
        self.pending = false;
        self.builds += 1;
        self.status = BuildStatus::Building;
        info!("Starting preview build #{}", self.builds);

        let Some(entry) = self
            .config
            .entry_points
            .iter()
            .find(|candidate| store.is_file(candidate))
            .cloned()
        else {
            warn!("No entry file in the store");
            self.status = BuildStatus::Failed {
                errors: vec![BuildError::MissingEntry {
                    candidates: self.config.entry_points.iter().map(ToString::to_string).collect(),
                }],
                partial: None,
            };
            return &self.status;
        };

        self.transformer.begin_build();
        let graph = ModuleGraph::walk(&entry, store, &mut self.transformer);
        self.transformer.end_build();

        let generation = self.registry.begin_generation();
        let lazy_styles: BTreeSet<&StorePath> = graph
            .modules()
            .iter()
            .flat_map(|module| module.lazy_styles.iter())
            .collect();
        let mut errors = Vec::new();
        let mut styles = Vec::new();
        let mut packages = BTreeSet::new();
        let mut registered = 0;
        for module in graph.modules() {
            let lazy = lazy_styles.contains(&module.path);
            match self.register_module(module, lazy, &mut styles) {
                Ok(true) => registered += 1,
                Ok(false) => {}
                Err(error) => errors.push(BuildError::Module { source: error }),
            }
            packages.extend(module.packages.iter());
        }

        let report = self.registry.handle_for(&entry).map(|entry_handle| BuildReport {
            generation,
            entry: entry.clone(),
            reachable: graph.len(),
            registered,
            styles: styles.len(),
            import_map: self.registry.import_map(entry_handle, packages.iter().copied()),
            cache: self.transformer.stats(),
        });

        self.status = match report {
            Some(report) if errors.is_empty() => {
                let document = PreviewDocument {
                    import_map: report.import_map.clone(),
                    styles,
                };
                self.sandbox.reload(&document, &self.registry);
                self.registry.install(generation);
                self.document = Some(document);
                info!(
                    "Preview build #{} ready: {} modules, {} styles",
                    self.builds, report.registered, report.styles
                );
                BuildStatus::Ready(report)
            }
            partial => {
                self.registry.discard(generation);
                warn!(
                    "Preview build #{} failed with {} errors",
                    self.builds,
                    errors.len()
                );
                BuildStatus::Failed { errors, partial }
            }
        };
        &self.status
    }

    /// Returns whether the module got a handle. Stylesheets only get one when
    /// code imports them lazily.
    fn register_module(
        &mut self,
        module: &TransformedModule,
        lazy: bool,
        styles: &mut Vec<Stylesheet>,
    ) -> Result<bool, TransformError> {
        let code = module.output.clone()?;
        if module.kind != ModuleKind::Stylesheet {
            self.registry.register(&module.path, code);
            return Ok(true);
        }
        if lazy {
            self.registry
                .register(&module.path, stylesheet_module(&code));
        }
        styles.push(Stylesheet {
            path: module.path.clone(),
            text: code,
        });
        Ok(lazy)
    }

    pub fn status(&self) -> &BuildStatus {
        &self.status
    }

    pub fn build_count(&self) -> usize {
        self.builds
    }

    /// The document of the last successful build.
    pub fn document(&self) -> Option<&PreviewDocument> {
        self.document.as_ref()
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn sandbox(&self) -> &S {
        &self.sandbox
    }
}
