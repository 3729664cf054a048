use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::transformer::lexer::lex;
use crate::transformer::{Dialect, SourceLocation};

// `import x from '…'`, `import '…'`, `export … from '…'`, one per line start.
// The clause excludes characters that only appear in code bodies so that a
// stray `from "…"` further down a function cannot be mistaken for an import.
static STATIC_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^[ \t]*(?P<keyword>import|export)(?P<clause>\s+[^'";()=<>]*?\s+from\s*|\s*)['"](?P<specifier>[^'"\r\n]+)['"][ \t]*;?"#,
    )
    .expect("static import pattern is valid")
});

static DYNAMIC_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bimport\s*\(\s*['"](?P<specifier>[^'"\r\n]+)['"]\s*\)"#)
        .expect("dynamic import pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// `import x from '…'`
    Static,
    /// `import '…'`
    SideEffect,
    /// `export … from '…'`
    ReExport,
    /// `import('…')`
    Dynamic,
}

/// One import specifier found in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSite {
    pub specifier: String,
    pub kind: ImportKind,
    /// Byte range of the specifier text, without quotes.
    pub specifier_span: Range<usize>,
    /// Byte range of the whole statement or call expression.
    pub statement_span: Range<usize>,
}

impl ImportSite {
    pub fn location(&self, source: &str) -> SourceLocation {
        SourceLocation::at_offset(source, self.specifier_span.start)
    }

    /// True when the statement can be dropped without leaving dangling bindings.
    pub fn is_removable(&self) -> bool {
        matches!(self.kind, ImportKind::Static | ImportKind::SideEffect)
    }
}

/// Finds every import specifier in `source`, in source order. Matches that
/// start inside a comment, a string or template literal, or markup text are
/// skipped.
pub fn scan_imports(source: &str, dialect: Dialect) -> Vec<ImportSite> {
    let lexed = lex(source, dialect.allows_markup());
    let mut sites: Vec<ImportSite> = STATIC_IMPORT
        .captures_iter(source)
        .filter(|captures| {
            captures
                .name("keyword")
                .is_some_and(|keyword| lexed.is_code(keyword.start()))
        })
        .filter_map(|captures| {
            let statement = captures.get(0)?;
            let specifier = captures.name("specifier")?;
            let has_from = captures
                .name("clause")
                .is_some_and(|clause| !clause.as_str().trim().is_empty());
            let kind = match (&captures["keyword"], has_from) {
                ("import", true) => ImportKind::Static,
                ("import", false) => ImportKind::SideEffect,
                ("export", true) => ImportKind::ReExport,
                _ => return None,
            };
            Some(ImportSite {
                specifier: specifier.as_str().to_string(),
                kind,
                specifier_span: specifier.range(),
                statement_span: statement.range(),
            })
        })
        .collect();

    sites.extend(DYNAMIC_IMPORT.captures_iter(source).filter_map(|captures| {
        let call = captures.get(0).filter(|call| lexed.is_code(call.start()))?;
        let specifier = captures.name("specifier")?;
        Some(ImportSite {
            specifier: specifier.as_str().to_string(),
            kind: ImportKind::Dynamic,
            specifier_span: specifier.range(),
            statement_span: call.range(),
        })
    }));

    sites.sort_by_key(|site| site.specifier_span.start);
    sites
}

/// Applies non-overlapping `(range, replacement)` edits to `source`.
pub fn apply_edits(source: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    edits.sort_by_key(|(range, _)| range.start);

    let mut output = String::with_capacity(source.len());
    let mut cursor = 0;
    for (range, replacement) in edits {
        if range.start < cursor {
            continue;
        }
        output.push_str(&source[cursor..range.start]);
        output.push_str(&replacement);
        cursor = range.end;
    }
    output.push_str(&source[cursor..]);
    output
}
