use std::collections::BTreeMap;

use serde::Serialize;

use crate::registry::ResourceHandle;

/// Where the sandbox loads a specifier from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResourceRef {
    Local(ResourceHandle),
    External(String),
}

impl ResourceRef {
    pub fn as_local(&self) -> Option<&ResourceHandle> {
        match self {
            ResourceRef::Local(handle) => Some(handle),
            ResourceRef::External(_) => None,
        }
    }
}

/// Specifier → resource mapping handed to the sandbox, plus the entry module.
///
/// Serializes to the browser import map document: `{"imports": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportMap {
    pub imports: BTreeMap<String, ResourceRef>,
    #[serde(skip)]
    pub entry: ResourceHandle,
}

impl ImportMap {
    pub fn get(&self, specifier: &str) -> Option<&ResourceRef> {
        self.imports.get(specifier)
    }

    pub fn local_handles(&self) -> impl Iterator<Item = &ResourceHandle> {
        self.imports.values().filter_map(ResourceRef::as_local)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_browser_import_map() {
        let entry = ResourceHandle::new(1, 0);
        let map = ImportMap {
            imports: BTreeMap::from([
                ("/App.jsx".to_string(), ResourceRef::Local(entry)),
                (
                    "react".to_string(),
                    ResourceRef::External("https://esm.sh/react".to_string()),
                ),
            ]),
            entry,
        };
        let value: serde_json::Value = serde_json::from_str(&map.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "imports": {
                    "/App.jsx": "blob:preview/1-0",
                    "react": "https://esm.sh/react"
                }
            })
        );
        assert_eq!(map.local_handles().count(), 1);
    }
}
