use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::preview::PreviewDocument;
use crate::registry::{ModuleRegistry, RegistryError, ResourceHandle};

/// An isolated execution context for the preview.
///
/// Every reload replaces the previous context entirely.
pub trait Sandbox {
    fn reload(&mut self, document: &PreviewDocument, registry: &ModuleRegistry);
}

/// What one reload loaded.
#[derive(Debug, Clone, Default)]
pub struct SandboxContext {
    pub entry: Option<ResourceHandle>,
    pub modules: BTreeMap<ResourceHandle, Arc<str>>,
    pub styles: Vec<Arc<str>>,
    pub load_errors: Vec<RegistryError>,
}

/// Sandbox that fetches every local module of the import map into memory.
#[derive(Debug, Default)]
pub struct InMemorySandbox {
    context: Option<SandboxContext>,
    reloads: usize,
}

impl InMemorySandbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(&self) -> Option<&SandboxContext> {
        self.context.as_ref()
    }

    pub fn reloads(&self) -> usize {
        self.reloads
    }
}

impl Sandbox for InMemorySandbox {
    fn reload(&mut self, document: &PreviewDocument, registry: &ModuleRegistry) {
        let mut context = SandboxContext {
            entry: Some(document.import_map.entry),
            styles: document
                .styles
                .iter()
                .map(|style| style.text.clone())
                .collect(),
            ..SandboxContext::default()
        };

        for handle in document.import_map.local_handles() {
            match registry.fetch(handle) {
                Ok(code) => {
                    context.modules.insert(*handle, code);
                }
                Err(error) => {
                    warn!("Sandbox failed to load module: {}", error);
                    context.load_errors.push(error);
                }
            }
        }

        self.reloads += 1;
        debug!(
            "Sandbox reload #{}: {} modules, {} styles",
            self.reloads,
            context.modules.len(),
            context.styles.len()
        );
        self.context = Some(context);
    }
}
