use std::fmt;

use snafu::Snafu;

use crate::store::StorePath;
use crate::transformer::lexer::lex;

/// 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn at_offset(source: &str, offset: usize) -> Self {
        let before = &source[..offset.min(source.len())];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |index| index + 1);
        SourceLocation {
            line,
            column: before[line_start..].chars().count() + 1,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Jsx,
    Tsx,
    JavaScript,
    TypeScript,
}

impl Dialect {
    pub fn from_extension(extension: &str) -> Self {
        match extension {
            ".jsx" => Dialect::Jsx,
            ".tsx" => Dialect::Tsx,
            ".ts" | ".mts" | ".cts" => Dialect::TypeScript,
            _ => Dialect::JavaScript,
        }
    }

    /// Plain TypeScript reads `<T>value` as a type assertion, never markup.
    pub fn allows_markup(self) -> bool {
        self != Dialect::TypeScript
    }
}

/// A single file handed to a [`SyntaxEngine`].
#[derive(Debug, Clone, Copy)]
pub struct SourceUnit<'a> {
    pub path: &'a StorePath,
    pub source: &'a str,
    pub dialect: Dialect,
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(display("{}", message))]
pub struct SyntaxError {
    pub message: String,
    pub position: Option<SourceLocation>,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, position: Option<SourceLocation>) -> Self {
        SyntaxError {
            message: message.into(),
            position,
        }
    }
}

/// Turns extended-markup source into plain executable code.
///
/// Implementations must be pure: the same unit always yields the same result.
pub trait SyntaxEngine {
    fn transform(&self, unit: &SourceUnit<'_>) -> Result<String, SyntaxError>;
}

/// Returns the source unchanged after checking that `()`, `[]` and `{}` are
/// balanced, skipping comments, string, template and regex literals, and
/// markup text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughEngine;

impl SyntaxEngine for PassthroughEngine {
    fn transform(&self, unit: &SourceUnit<'_>) -> Result<String, SyntaxError> {
        lex(unit.source, unit.dialect.allows_markup()).into_result()?;
        Ok(unit.source.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn run(source: &str) -> Result<String, SyntaxError> {
        let path = StorePath::parse("/App.jsx").unwrap();
        PassthroughEngine.transform(&SourceUnit {
            path: &path,
            source,
            dialect: Dialect::Jsx,
        })
    }

    #[rstest]
    #[case("export default function App() { return <div className=\"x\">Hi</div>; }")]
    #[case("const s = '}'; const t = \"{\";")]
    #[case("const t = `a ${ b ? `c${d}` : '}' } e`;")]
    #[case("// unbalanced ( in a comment\nconst a = 1;")]
    #[case("/* { */ const a = [1, 2];")]
    #[case("const App = () => <p>Don't worry, it's fine</p>;")]
    #[case("const Q = () => <p>He said \"hi {name}\"</p>;")]
    #[case("import x from 'y';\nexport default x;")]
    #[case("const re = /\\(/;")]
    #[case("const brackets = /[)\\]}]+/g.test(input);")]
    #[case("const half = (a + b) / 2; const ratio = a / b / c;")]
    #[case("export default () => <p>Thanks :)</p>;")]
    #[case("const List = () => <ul>{items.map((item) => <li key={item}>{item} (new]</li>)}</ul>;")]
    #[case("const Card = () => <><Icon size={2} /><span>a > b {'{'}</span></>;")]
    #[case("const pick = <T,>(value: T) => value;")]
    fn test_balanced_sources_pass_through(#[case] source: &str) {
        assert_eq!(run(source).unwrap(), source);
    }

    #[test]
    fn test_reports_unclosed_brace_with_location() {
        let error = run("function App() {\n  return (\n    <div />\n  );\n").unwrap_err();
        assert_eq!(error.message, "Unclosed '{'");
        assert_eq!(error.position, Some(SourceLocation { line: 1, column: 16 }));
    }

    #[test]
    fn test_markup_expressions_are_still_checked() {
        let error = run("const A = () => <p>{name</p>;").unwrap_err();
        assert_eq!(error.message, "Unclosed '{'");
        assert_eq!(error.position, Some(SourceLocation { line: 1, column: 20 }));
    }

    #[test]
    fn test_type_assertions_are_not_markup_in_typescript() {
        let path = StorePath::parse("/util.ts").unwrap();
        let source = "const n = <number>value;\nexport const f = (x) => (x);";
        let unit = SourceUnit {
            path: &path,
            source,
            dialect: Dialect::TypeScript,
        };
        assert_eq!(PassthroughEngine.transform(&unit).unwrap(), source);
    }

    #[test]
    fn test_reports_mismatched_closer() {
        let error = run("const a = [1, 2);").unwrap_err();
        assert!(error.message.contains("Expected ']'"));
        assert_eq!(error.position, Some(SourceLocation { line: 1, column: 16 }));
    }

    #[test]
    fn test_reports_stray_closer() {
        let error = run("const a = 1;\n}").unwrap_err();
        assert_eq!(error.message, "Unexpected '}'");
        assert_eq!(error.position, Some(SourceLocation { line: 2, column: 1 }));
    }

    #[test]
    fn test_reports_unterminated_template_and_comment() {
        assert_eq!(
            run("const a = `open").unwrap_err().message,
            "Unterminated template literal"
        );
        assert_eq!(
            run("/* never closed").unwrap_err().message,
            "Unterminated block comment"
        );
    }

    #[rstest]
    #[case("abc", 3, 1, 4)]
    #[case("a\nbc", 3, 2, 2)]
    #[case("a\n", 2, 2, 1)]
    fn test_location_from_offset(
        #[case] source: &str,
        #[case] offset: usize,
        #[case] line: usize,
        #[case] column: usize,
    ) {
        assert_eq!(SourceLocation::at_offset(source, offset), SourceLocation { line, column });
    }

    #[rstest]
    #[case(".jsx", Dialect::Jsx)]
    #[case(".tsx", Dialect::Tsx)]
    #[case(".ts", Dialect::TypeScript)]
    #[case(".js", Dialect::JavaScript)]
    #[case(".mjs", Dialect::JavaScript)]
    fn test_dialect_follows_extension(#[case] extension: &str, #[case] dialect: Dialect) {
        assert_eq!(Dialect::from_extension(extension), dialect);
    }
}
