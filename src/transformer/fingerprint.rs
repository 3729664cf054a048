use std::collections::BTreeMap;
use std::hash::Hasher;

use metrohash::MetroHash64;

/// Content identity used to key memoized transform output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn of_content(content: &str) -> Self {
        let mut hasher = MetroHash64::default();
        hasher.write(content.as_bytes());
        Fingerprint(hasher.finish())
    }

    /// Hash of a resolved import map. Keys are visited in sorted order so the
    /// result does not depend on the order imports appear in.
    pub fn of_imports(imports: &BTreeMap<String, String>) -> Self {
        let mut hasher = MetroHash64::default();
        for (specifier, target) in imports {
            hasher.write(specifier.as_bytes());
            hasher.write_u8(0xff);
            hasher.write(target.as_bytes());
            hasher.write_u8(0xfe);
        }
        Fingerprint(hasher.finish())
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("hello world")]
    #[case("")]
    #[case("special chars: äöü🚀")]
    #[case("multiline\ncontent\nwith\nnewlines")]
    fn test_same_content_same_fingerprint(#[case] content: &str) {
        assert_eq!(Fingerprint::of_content(content), Fingerprint::of_content(content));
    }

    #[test]
    fn test_different_content_different_fingerprint() {
        assert_ne!(
            Fingerprint::of_content("export default 1;"),
            Fingerprint::of_content("export default 2;")
        );
    }

    #[test]
    fn test_import_fingerprint_separates_keys_and_values() {
        let mut joined = BTreeMap::new();
        joined.insert("ab".to_string(), "c".to_string());
        let mut split = BTreeMap::new();
        split.insert("a".to_string(), "bc".to_string());
        assert_ne!(Fingerprint::of_imports(&joined), Fingerprint::of_imports(&split));
    }

    #[test]
    fn test_import_fingerprint_tracks_targets() {
        let mut before = BTreeMap::new();
        before.insert("./Button".to_string(), "/Button.jsx".to_string());
        let mut after = before.clone();
        after.insert("./Button".to_string(), "/Button.tsx".to_string());
        assert_ne!(Fingerprint::of_imports(&before), Fingerprint::of_imports(&after));
        assert_eq!(Fingerprint::of_imports(&before), Fingerprint::of_imports(&before.clone()));
    }
}
