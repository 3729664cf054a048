mod engine;
mod fingerprint;
mod imports;
mod lexer;
#[allow(clippy::module_inception)]
mod transformer;

pub use engine::{Dialect, PassthroughEngine, SourceLocation, SourceUnit, SyntaxEngine, SyntaxError};
pub use fingerprint::Fingerprint;
pub use imports::{ImportKind, ImportSite, apply_edits, scan_imports};
pub use transformer::{
    CacheStats, ErrorReport, ModuleKind, TransformError, TransformedModule, Transformer,
    stylesheet_module,
};
