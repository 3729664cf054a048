use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use snafu::Snafu;
use tracing::{debug, trace};

use crate::config::PreviewConfig;
use crate::resolver::{ExternalPackage, Resolution, ResolveError, Resolver};
use crate::store::{Store, StorePath};
use crate::transformer::{
    Dialect, Fingerprint, ImportSite, SourceLocation, SourceUnit, SyntaxEngine, apply_edits,
    scan_imports,
};

const STYLESHEET_EXTENSION: &str = ".css";
const JSON_EXTENSION: &str = ".json";

/// How a file takes part in the module graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    Script(Dialect),
    /// Not a module: importing it pulls its text into the page styles.
    Stylesheet,
    /// Exposed as a module with a single default export.
    Json,
    /// Served unchanged.
    Asset,
}

impl ModuleKind {
    pub fn classify(path: &StorePath, config: &PreviewConfig) -> Self {
        match path.extension() {
            Some(ext) if config.is_script_extension(ext) => {
                ModuleKind::Script(Dialect::from_extension(ext))
            }
            Some(STYLESHEET_EXTENSION) => ModuleKind::Stylesheet,
            Some(JSON_EXTENSION) => ModuleKind::Json,
            _ => ModuleKind::Asset,
        }
    }
}

/// Result of transforming one file.
///
/// Dependencies are recorded even when the output is an error so that the
/// rest of the graph can still be walked.
#[derive(Debug, Clone)]
pub struct TransformedModule {
    pub path: StorePath,
    pub kind: ModuleKind,
    /// In-store files this module imports, in source order, without repeats.
    pub dependencies: Vec<StorePath>,
    pub packages: Vec<ExternalPackage>,
    /// Stylesheets loaded with `import()` or re-exported, which need a module
    /// behind their specifier.
    pub lazy_styles: Vec<StorePath>,
    pub output: Result<Arc<str>, TransformError>,
}

impl TransformedModule {
    pub fn is_ok(&self) -> bool {
        self.output.is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct MemoKey {
    kind: ModuleKind,
    content: Fingerprint,
    imports: Fingerprint,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

/// Turns store files into executable modules, memoizing script output by
/// content and resolved imports.
pub struct Transformer {
    config: Arc<PreviewConfig>,
    engine: Box<dyn SyntaxEngine>,
    cache: HashMap<MemoKey, Arc<str>>,
    used: HashSet<MemoKey>,
    hits: usize,
    misses: usize,
}

impl fmt::Debug for Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transformer")
            .field("cached", &self.cache.len())
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish_non_exhaustive()
    }
}

impl Transformer {
    pub fn new(config: Arc<PreviewConfig>, engine: Box<dyn SyntaxEngine>) -> Self {
        Transformer {
            config,
            engine,
            cache: HashMap::new(),
            used: HashSet::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    /// Starts tracking which memo entries the coming build uses.
    pub fn begin_build(&mut self) {
        self.used.clear();
        self.hits = 0;
        self.misses = 0;
    }

    /// Drops every memo entry the last build did not touch.
    pub fn end_build(&mut self) {
        let before = self.cache.len();
        self.cache.retain(|key, _| self.used.contains(key));
        debug!(
            "Transform cache: {} hits, {} misses, {} entries pruned",
            self.hits,
            self.misses,
            before - self.cache.len()
        );
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.cache.len(),
        }
    }

    pub fn transform(&mut self, store: &Store, path: &StorePath) -> TransformedModule {
        let kind = ModuleKind::classify(path, &self.config);
        let mut module = TransformedModule {
            path: path.clone(),
            kind,
            dependencies: Vec::new(),
            packages: Vec::new(),
            lazy_styles: Vec::new(),
            output: Err(TransformError::Missing { path: path.clone() }),
        };
        let Ok(content) = store.read_file(path) else {
            return module;
        };

        let output = match kind {
            ModuleKind::Script(dialect) => {
                self.transform_script(store, &mut module, content, dialect)
            }
            ModuleKind::Stylesheet | ModuleKind::Asset => Ok(Arc::from(content)),
            ModuleKind::Json => wrap_json(path, content),
        };
        module.output = output;
        module
    }

    fn transform_script(
        &mut self,
        store: &Store,
        module: &mut TransformedModule,
        content: &str,
        dialect: Dialect,
    ) -> Result<Arc<str>, TransformError> {
        let resolver = Resolver::new(&self.config);
        let mut resolved = BTreeMap::new();
        let mut edits = Vec::new();
        let mut first_error = None;

        for site in scan_imports(content, dialect) {
            let resolution = match resolver.resolve(store, &module.path, &site.specifier) {
                Ok(resolution) => resolution,
                Err(source) => {
                    first_error.get_or_insert(TransformError::Unresolved {
                        path: module.path.clone(),
                        position: site.location(content),
                        source,
                    });
                    continue;
                }
            };
            let target = resolution.sandbox_specifier();

            match resolution {
                Resolution::InStoreFile(dependency) => {
                    let stylesheet = ModuleKind::classify(&dependency, &self.config)
                        == ModuleKind::Stylesheet;
                    if stylesheet && site.is_removable() {
                        edits.push((site.statement_span.clone(), blank_lines(content, &site)));
                    } else {
                        edits.push((site.specifier_span.clone(), target.clone()));
                        if stylesheet && !module.lazy_styles.contains(&dependency) {
                            module.lazy_styles.push(dependency.clone());
                        }
                    }
                    if !module.dependencies.contains(&dependency) {
                        module.dependencies.push(dependency);
                    }
                }
                Resolution::ExternalPackage(package) => {
                    edits.push((site.specifier_span.clone(), target.clone()));
                    if !module.packages.contains(&package) {
                        module.packages.push(package);
                    }
                }
            }
            resolved.insert(site.specifier, target);
        }

        if let Some(error) = first_error {
            return Err(error);
        }

        let key = MemoKey {
            kind: module.kind,
            content: Fingerprint::of_content(content),
            imports: Fingerprint::of_imports(&resolved),
        };
        self.used.insert(key);
        if let Some(cached) = self.cache.get(&key) {
            trace!("Transform cache hit for {}", module.path);
            self.hits += 1;
            return Ok(cached.clone());
        }
        self.misses += 1;

        let rewritten = apply_edits(content, edits);
        let unit = SourceUnit {
            path: &module.path,
            source: &rewritten,
            dialect,
        };
        let output: Arc<str> = self
            .engine
            .transform(&unit)
            .map_err(|error| TransformError::Syntax {
                path: module.path.clone(),
                message: error.message,
                position: error.position,
            })?
            .into();
        self.cache.insert(key, output.clone());
        Ok(output)
    }
}

// Keeps line numbers stable when a multi-line statement is removed.
fn blank_lines(content: &str, site: &ImportSite) -> String {
    "\n".repeat(content[site.statement_span.clone()].matches('\n').count())
}

/// Module standing in for a stylesheet imported from code. The document
/// already applies the stylesheet, so the module only exposes its text.
pub fn stylesheet_module(text: &str) -> Arc<str> {
    format!(
        "export default {};\n",
        serde_json::Value::String(text.to_string())
    )
    .into()
}

fn wrap_json(path: &StorePath, content: &str) -> Result<Arc<str>, TransformError> {
    if let Err(error) = serde_json::from_str::<serde_json::Value>(content) {
        return Err(TransformError::Syntax {
            path: path.clone(),
            message: format!("Invalid JSON: {error}"),
            position: Some(SourceLocation {
                line: error.line(),
                column: error.column(),
            }),
        });
    }
    Ok(format!("export default {};\n", content.trim()).into())
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum TransformError {
    #[snafu(display("{}: {}", path, message))]
    Syntax {
        path: StorePath,
        message: String,
        position: Option<SourceLocation>,
    },
    #[snafu(display("{}: {}", path, source))]
    Unresolved {
        path: StorePath,
        source: ResolveError,
        position: SourceLocation,
    },
    #[snafu(display("{}: file not found", path))]
    Missing { path: StorePath },
}

impl TransformError {
    pub fn path(&self) -> &StorePath {
        match self {
            TransformError::Syntax { path, .. }
            | TransformError::Unresolved { path, .. }
            | TransformError::Missing { path } => path,
        }
    }

    pub fn report(&self) -> ErrorReport {
        let (message, location) = match self {
            TransformError::Syntax {
                message, position, ..
            } => (message.clone(), *position),
            TransformError::Unresolved {
                source, position, ..
            } => (source.to_string(), Some(*position)),
            TransformError::Missing { .. } => ("file not found".to_string(), None),
        };
        ErrorReport {
            path: self.path().clone(),
            message,
            location,
        }
    }
}

/// Per-file error as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub path: StorePath,
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(location) => write!(f, "{}:{}: {}", self.path, location, self.message),
            None => write!(f, "{}: {}", self.path, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformer::{PassthroughEngine, SyntaxError};
    use rstest::rstest;
    use std::cell::Cell;
    use std::rc::Rc;

    fn path(raw: &str) -> StorePath {
        StorePath::parse(raw).unwrap()
    }

    fn transformer() -> Transformer {
        Transformer::new(Arc::new(PreviewConfig::default()), Box::new(PassthroughEngine))
    }

    /// Counts how often the engine actually runs.
    struct CountingEngine(Rc<Cell<usize>>);

    impl SyntaxEngine for CountingEngine {
        fn transform(&self, unit: &SourceUnit<'_>) -> Result<String, SyntaxError> {
            self.0.set(self.0.get() + 1);
            PassthroughEngine.transform(unit)
        }
    }

    #[rstest]
    #[case("/App.jsx", ModuleKind::Script(Dialect::Jsx))]
    #[case("/lib/util.ts", ModuleKind::Script(Dialect::TypeScript))]
    #[case("/styles.css", ModuleKind::Stylesheet)]
    #[case("/data.json", ModuleKind::Json)]
    #[case("/logo.svg", ModuleKind::Asset)]
    #[case("/README", ModuleKind::Asset)]
    fn test_classifies_by_extension(#[case] raw: &str, #[case] kind: ModuleKind) {
        assert_eq!(ModuleKind::classify(&path(raw), &PreviewConfig::default()), kind);
    }

    #[test]
    fn test_rewrites_local_and_package_specifiers() {
        let mut store = Store::new();
        store
            .create_file(
                "/App.jsx",
                "import React from 'react';\nimport Button from '@/components/Button';\n",
            )
            .unwrap();
        store.create_file("/components/Button.jsx", "export default 1;").unwrap();

        let module = transformer().transform(&store, &path("/App.jsx"));
        assert_eq!(
            module.output.unwrap().as_ref(),
            "import React from 'react';\nimport Button from '/components/Button.jsx';\n"
        );
        assert_eq!(module.dependencies, vec![path("/components/Button.jsx")]);
        assert_eq!(module.packages, vec![ExternalPackage::parse("react").unwrap()]);
    }

    #[test]
    fn test_stylesheet_imports_are_stripped() {
        let mut store = Store::new();
        store
            .create_file("/App.jsx", "import './App.css';\nexport default 1;\n")
            .unwrap();
        store.create_file("/App.css", "body { margin: 0; }").unwrap();

        let mut transformer = transformer();
        let module = transformer.transform(&store, &path("/App.jsx"));
        assert_eq!(module.output.unwrap().as_ref(), "\nexport default 1;\n");
        assert_eq!(module.dependencies, vec![path("/App.css")]);

        let stylesheet = transformer.transform(&store, &path("/App.css"));
        assert_eq!(stylesheet.kind, ModuleKind::Stylesheet);
        assert_eq!(stylesheet.output.unwrap().as_ref(), "body { margin: 0; }");
    }

    #[test]
    fn test_dynamic_stylesheet_imports_are_kept_and_flagged() {
        let mut store = Store::new();
        store
            .create_file(
                "/App.jsx",
                "import './base.css';\nconst theme = () => import('./dark.css');\n",
            )
            .unwrap();
        store.create_file("/base.css", "").unwrap();
        store.create_file("/dark.css", "body { background: #000; }").unwrap();

        let module = transformer().transform(&store, &path("/App.jsx"));
        assert_eq!(
            module.output.unwrap().as_ref(),
            "\nconst theme = () => import('/dark.css');\n"
        );
        assert_eq!(module.dependencies, vec![path("/base.css"), path("/dark.css")]);
        assert_eq!(module.lazy_styles, vec![path("/dark.css")]);
    }

    #[test]
    fn test_stylesheet_module_exports_escaped_text() {
        assert_eq!(
            stylesheet_module("a::before { content: \"\\n\"; }").as_ref(),
            "export default \"a::before { content: \\\"\\\\n\\\"; }\";\n"
        );
    }

    #[test]
    fn test_commented_out_imports_are_ignored() {
        let mut store = Store::new();
        store
            .create_file(
                "/App.jsx",
                "/*\nimport Old from './Old';\n*/\nconst help = `\nimport Demo from './Demo';\n`;\nexport default help;\n",
            )
            .unwrap();

        let module = transformer().transform(&store, &path("/App.jsx"));
        assert!(module.is_ok(), "unexpected error: {:?}", module.output);
        assert!(module.dependencies.is_empty());
    }

    #[test]
    fn test_unresolved_import_fails_the_file_but_keeps_dependencies() {
        let mut store = Store::new();
        store
            .create_file(
                "/App.jsx",
                "import Missing from './Missing';\nimport Button from './Button';\n",
            )
            .unwrap();
        store.create_file("/Button.jsx", "").unwrap();

        let module = transformer().transform(&store, &path("/App.jsx"));
        assert_eq!(module.dependencies, vec![path("/Button.jsx")]);
        let report = module.output.unwrap_err().report();
        assert_eq!(report.path, path("/App.jsx"));
        assert_eq!(report.location, Some(SourceLocation { line: 1, column: 22 }));
        assert!(report.message.contains("'./Missing'"));
    }

    #[test]
    fn test_syntax_error_is_reported_with_location() {
        let mut store = Store::new();
        store
            .create_file("/Broken.jsx", "export default function Broken() {\n  return <div>;\n")
            .unwrap();

        let error = transformer()
            .transform(&store, &path("/Broken.jsx"))
            .output
            .unwrap_err();
        assert_eq!(
            error.report().to_string(),
            "/Broken.jsx:1:34: Unclosed '{'"
        );
    }

    #[test]
    fn test_json_is_wrapped_as_default_export() {
        let mut store = Store::new();
        store.create_file("/data.json", "{ \"items\": [1, 2] }\n").unwrap();
        store.create_file("/bad.json", "{ \"items\": [1, 2 }").unwrap();

        let mut transformer = transformer();
        assert_eq!(
            transformer
                .transform(&store, &path("/data.json"))
                .output
                .unwrap()
                .as_ref(),
            "export default { \"items\": [1, 2] };\n"
        );
        assert!(matches!(
            transformer.transform(&store, &path("/bad.json")).output,
            Err(TransformError::Syntax { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let module = transformer().transform(&Store::new(), &path("/Nope.jsx"));
        assert_eq!(module.output.unwrap_err(), TransformError::Missing { path: path("/Nope.jsx") });
    }

    #[test]
    fn test_unchanged_inputs_hit_the_cache() {
        let runs = Rc::new(Cell::new(0));
        let mut transformer = Transformer::new(
            Arc::new(PreviewConfig::default()),
            Box::new(CountingEngine(runs.clone())),
        );
        let mut store = Store::new();
        store.create_file("/App.jsx", "import B from './B';").unwrap();
        store.create_file("/B.jsx", "export default 1;").unwrap();

        transformer.begin_build();
        let first = transformer.transform(&store, &path("/App.jsx")).output.unwrap();
        transformer.end_build();

        transformer.begin_build();
        let second = transformer.transform(&store, &path("/App.jsx")).output.unwrap();
        transformer.end_build();

        assert_eq!(first, second);
        assert_eq!(runs.get(), 1);
        assert_eq!(transformer.stats(), CacheStats { hits: 1, misses: 0, entries: 1 });
    }

    #[test]
    fn test_changed_resolution_misses_the_cache() {
        let runs = Rc::new(Cell::new(0));
        let mut transformer = Transformer::new(
            Arc::new(PreviewConfig::default()),
            Box::new(CountingEngine(runs.clone())),
        );
        let mut store = Store::new();
        store.create_file("/App.jsx", "import B from './B';").unwrap();
        store.create_file("/B.js", "").unwrap();
        transformer.transform(&store, &path("/App.jsx"));

        store.create_file("/B.jsx", "").unwrap();
        let output = transformer.transform(&store, &path("/App.jsx")).output.unwrap();

        assert_eq!(output.as_ref(), "import B from '/B.jsx';");
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_unused_entries_are_pruned() {
        let mut transformer = transformer();
        let mut store = Store::new();
        store.create_file("/A.jsx", "export const a = 1;").unwrap();
        store.create_file("/B.jsx", "export const b = 2;").unwrap();

        transformer.begin_build();
        transformer.transform(&store, &path("/A.jsx"));
        transformer.transform(&store, &path("/B.jsx"));
        transformer.end_build();
        assert_eq!(transformer.stats().entries, 2);

        transformer.begin_build();
        transformer.transform(&store, &path("/A.jsx"));
        transformer.end_build();
        assert_eq!(transformer.stats().entries, 1);
    }
}
