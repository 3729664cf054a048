use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static PACKAGE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:@[A-Za-z0-9~-][A-Za-z0-9._~-]*/)?[A-Za-z0-9~-][A-Za-z0-9._~-]*$")
        .expect("package name pattern is valid")
});

/// A bare import that names a package rather than a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExternalPackage {
    pub name: String,
    pub subpath: Option<String>,
}

impl ExternalPackage {
    /// Splits `react-dom/client` into name and subpath. Scoped packages keep
    /// their first two segments as the name (`@scope/pkg/sub` → `@scope/pkg` + `sub`).
    ///
    /// Returns `None` for anything that is not a plausible package specifier.
    pub fn parse(specifier: &str) -> Option<Self> {
        let name_segments = if specifier.starts_with('@') { 2 } else { 1 };
        let mut parts = specifier.splitn(name_segments + 1, '/');

        let name = (0..name_segments)
            .map(|_| parts.next())
            .collect::<Option<Vec<_>>>()?
            .join("/");
        if !PACKAGE_NAME.is_match(&name) {
            return None;
        }

        let subpath = match parts.next() {
            None => None,
            Some(rest) if is_valid_subpath(rest) => Some(rest.to_string()),
            Some(_) => return None,
        };

        Some(ExternalPackage { name, subpath })
    }

    /// The specifier as the sandbox sees it after rewriting.
    pub fn specifier(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ExternalPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subpath {
            Some(subpath) => write!(f, "{}/{}", self.name, subpath),
            None => write!(f, "{}", self.name),
        }
    }
}

fn is_valid_subpath(subpath: &str) -> bool {
    !subpath.is_empty()
        && subpath.split('/').all(|segment| !segment.is_empty() && segment != "..")
        && !subpath.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("react", "react", None)]
    #[case("react-dom/client", "react-dom", Some("client"))]
    #[case("lodash/fp/map", "lodash", Some("fp/map"))]
    #[case("@radix-ui/react-dialog", "@radix-ui/react-dialog", None)]
    #[case("@scope/pkg/deep/path", "@scope/pkg", Some("deep/path"))]
    #[case("date-fns", "date-fns", None)]
    fn test_splits_name_and_subpath(
        #[case] specifier: &str,
        #[case] name: &str,
        #[case] subpath: Option<&str>,
    ) {
        let package = ExternalPackage::parse(specifier).unwrap();
        assert_eq!(package.name, name);
        assert_eq!(package.subpath.as_deref(), subpath);
        assert_eq!(package.specifier(), specifier);
    }

    #[rstest]
    #[case("")]
    #[case("@scope")]
    #[case("@scope/")]
    #[case("react/")]
    #[case("react//client")]
    #[case("has space")]
    #[case("https://cdn.example.com/x.js")]
    #[case(".hidden")]
    #[case("_private")]
    #[case("react/../escape")]
    fn test_rejects_non_package_specifiers(#[case] specifier: &str) {
        assert_eq!(ExternalPackage::parse(specifier), None);
    }
}
