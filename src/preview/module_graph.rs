use std::collections::{HashSet, VecDeque};

use tracing::debug;

use crate::store::{Store, StorePath};
use crate::transformer::{TransformedModule, Transformer};

/// The set of modules reachable from an entry file, in breadth-first order.
#[derive(Debug, Clone)]
pub struct ModuleGraph {
    entry: StorePath,
    modules: Vec<TransformedModule>,
}

impl ModuleGraph {
    /// Transforms the entry and everything it reaches through local imports.
    ///
    /// Each file is transformed once, however many importers it has; import
    /// cycles end at the first revisit.
    pub fn walk(entry: &StorePath, store: &Store, transformer: &mut Transformer) -> Self {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        let mut modules = Vec::new();

        visited.insert(entry.clone());
        queue.push_back(entry.clone());

        while let Some(path) = queue.pop_front() {
            let module = transformer.transform(store, &path);
            for dependency in &module.dependencies {
                if visited.insert(dependency.clone()) {
                    queue.push_back(dependency.clone());
                }
            }
            modules.push(module);
        }

        debug!("Module graph from {}: {} modules", entry, modules.len());
        ModuleGraph {
            entry: entry.clone(),
            modules,
        }
    }

    pub fn entry(&self) -> &StorePath {
        &self.entry
    }

    pub fn modules(&self) -> &[TransformedModule] {
        &self.modules
    }

    pub fn module(&self, path: &StorePath) -> Option<&TransformedModule> {
        self.modules.iter().find(|module| &module.path == path)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::PreviewConfig;
    use crate::transformer::PassthroughEngine;

    fn path(raw: &str) -> StorePath {
        StorePath::parse(raw).unwrap()
    }

    fn walk(store: &Store) -> ModuleGraph {
        let mut transformer =
            Transformer::new(Arc::new(PreviewConfig::default()), Box::new(PassthroughEngine));
        ModuleGraph::walk(&path("/App.jsx"), store, &mut transformer)
    }

    fn paths(graph: &ModuleGraph) -> Vec<&str> {
        graph.modules().iter().map(|module| module.path.as_str()).collect()
    }

    #[test]
    fn test_walks_breadth_first_from_entry() {
        let mut store = Store::new();
        store
            .create_file("/App.jsx", "import A from './A';\nimport B from './B';")
            .unwrap();
        store.create_file("/A.jsx", "import C from './C';").unwrap();
        store.create_file("/B.jsx", "import C from './C';").unwrap();
        store.create_file("/C.jsx", "").unwrap();
        store.create_file("/Unused.jsx", "").unwrap();

        let graph = walk(&store);
        assert_eq!(paths(&graph), vec!["/App.jsx", "/A.jsx", "/B.jsx", "/C.jsx"]);
        assert!(graph.module(&path("/Unused.jsx")).is_none());
    }

    #[test]
    fn test_import_cycles_terminate() {
        let mut store = Store::new();
        store.create_file("/App.jsx", "import A from './A';").unwrap();
        store.create_file("/A.jsx", "import App from './App';").unwrap();

        let graph = walk(&store);
        assert_eq!(paths(&graph), vec!["/App.jsx", "/A.jsx"]);
    }

    #[test]
    fn test_failed_modules_still_lead_to_their_dependencies() {
        let mut store = Store::new();
        store.create_file("/App.jsx", "import A from './A';").unwrap();
        store
            .create_file("/A.jsx", "import B from './B';\nexport default {")
            .unwrap();
        store.create_file("/B.jsx", "").unwrap();

        let graph = walk(&store);
        assert_eq!(graph.len(), 3);
        assert!(!graph.module(&path("/A.jsx")).unwrap().is_ok());
        assert!(graph.module(&path("/B.jsx")).unwrap().is_ok());
    }
}
