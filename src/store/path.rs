use derive_more::Display;
use snafu::Snafu;

const SEPARATOR: char = '/';

/// An absolute, canonical path inside the store.
///
/// Always starts with `/`, never contains `.`/`..` segments, duplicate
/// separators or a trailing separator (except for the root itself).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub struct StorePath(String);

impl StorePath {
    pub fn root() -> Self {
        StorePath(SEPARATOR.to_string())
    }

    /// Normalizes `raw` into a canonical store path.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, PathError> {
        let raw = raw.as_ref();
        if !raw.starts_with(SEPARATOR) {
            return NotAbsoluteSnafu { path: raw }.fail();
        }
        Self::root().join(raw.trim_start_matches(SEPARATOR))
    }

    /// Joins a relative `tail` onto this path, resolving `.` and `..`.
    ///
    /// `..` above the root is an error rather than being clamped.
    pub fn join(&self, tail: &str) -> Result<Self, PathError> {
        let mut segments: Vec<&str> = self.segments().collect();

        for segment in tail.split(SEPARATOR) {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return EscapesRootSnafu {
                            path: format!("{}/{}", self.0.trim_end_matches(SEPARATOR), tail),
                        }
                        .fail();
                    }
                }
                name => segments.push(name),
            }
        }

        Ok(Self::from_segments(segments))
    }

    pub fn child(&self, name: &str) -> Self {
        if self.is_root() {
            StorePath(format!("{SEPARATOR}{name}"))
        } else {
            StorePath(format!("{}{SEPARATOR}{name}", self.0))
        }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let mut segments: Vec<&str> = self.segments().collect();
        segments.pop();
        Some(Self::from_segments(segments))
    }

    /// Last segment, empty for the root.
    pub fn name(&self) -> &str {
        self.segments().last().unwrap_or("")
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR).filter(|segment| !segment.is_empty())
    }

    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// True if `self` equals `ancestor` or lies below it.
    pub fn starts_with(&self, ancestor: &StorePath) -> bool {
        if ancestor.is_root() || self == ancestor {
            return true;
        }
        self.0
            .strip_prefix(ancestor.as_str())
            .is_some_and(|rest| rest.starts_with(SEPARATOR))
    }

    /// Re-roots `self` from `from` onto `to`. Returns `None` when `self` is not under `from`.
    pub fn rebase(&self, from: &StorePath, to: &StorePath) -> Option<Self> {
        if !self.starts_with(from) {
            return None;
        }
        let mut segments: Vec<&str> = to.segments().collect();
        segments.extend(self.segments().skip(from.segments().count()));
        Some(Self::from_segments(segments))
    }

    /// File extension including the leading dot, e.g. `.jsx`.
    pub fn extension(&self) -> Option<&str> {
        let name = self.name();
        name.rfind('.')
            .filter(|index| *index > 0)
            .map(|index| &name[index..])
    }

    /// Directory containing this path; the root for top-level entries.
    pub fn directory(&self) -> Self {
        self.parent().unwrap_or_else(Self::root)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_segments(segments: Vec<&str>) -> Self {
        if segments.is_empty() {
            Self::root()
        } else {
            StorePath(format!("{SEPARATOR}{}", segments.join("/")))
        }
    }
}

impl AsRef<str> for StorePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PathError {
    #[snafu(display("Path '{}' is not absolute", path))]
    NotAbsolute { path: String },
    #[snafu(display("Path '{}' escapes the root directory", path))]
    EscapesRoot { path: String },
    #[snafu(display("The root directory cannot be {}", operation))]
    RootOperation { operation: &'static str },
    #[snafu(display("Cannot move '{}' into its own subtree at '{}'", from, to))]
    IntoOwnSubtree { from: StorePath, to: StorePath },
}
