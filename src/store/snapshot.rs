use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::SystemTime;

use bincode::{Decode, Encode};
use compio::fs;
use snafu::{ResultExt, Snafu};
use tracing::{debug, info};

use crate::store::{Node, NodeKind, Store, StorePath};

const COMPRESSION_LEVEL: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum EntryKind {
    File,
    Directory,
}

/// One node of a serialized tree.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct SnapshotEntry {
    pub kind: EntryKind,
    pub content: Option<String>,
    pub children: Option<Vec<String>>,
}

/// Lossless, timestamp-free image of a store, keyed by absolute path.
///
/// Entries are held in path order, which makes the encoded form canonical:
/// two stores with the same tree always encode to the same bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Encode, Decode)]
pub struct Snapshot {
    entries: BTreeMap<String, SnapshotEntry>,
}

impl Snapshot {
    pub fn entries(&self) -> &BTreeMap<String, SnapshotEntry> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn from_entries(entries: BTreeMap<String, SnapshotEntry>) -> Self {
        Snapshot { entries }
    }

    /// Bincode encoding without compression.
    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        bincode::encode_to_vec(self, bincode::config::standard()).context(EncodeSnafu)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let (snapshot, _) =
            bincode::decode_from_slice(bytes, bincode::config::standard()).context(DecodeSnafu)?;
        Ok(snapshot)
    }

    /// Compressed form handed to the storage collaborator.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        let encoded = self.encode()?;
        zstd::encode_all(encoded.as_slice(), COMPRESSION_LEVEL).context(CompressionSnafu)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let decoded = zstd::decode_all(bytes).context(CompressionSnafu)?;
        Self::decode(&decoded)
    }

    pub async fn read(path: &Path) -> Result<Self, SnapshotError> {
        debug!("Reading snapshot from {}", path.display());
        let bytes = fs::read(path).await.context(IoSnafu {
            file_path: path.display().to_string(),
        })?;
        let snapshot = Self::from_bytes(&bytes)?;
        info!("Loaded snapshot with {} entries", snapshot.len());
        Ok(snapshot)
    }

    pub async fn write(&self, path: &Path) -> Result<(), SnapshotError> {
        let bytes = self.to_bytes()?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.context(IoSnafu {
                file_path: parent.display().to_string(),
            })?;
        }
        debug!("Writing {} snapshot bytes to {}", bytes.len(), path.display());
        fs::write(path, bytes).await.0.context(IoSnafu {
            file_path: path.display().to_string(),
        })?;
        Ok(())
    }
}

impl Store {
    pub fn serialize(&self) -> Snapshot {
        let mut entries = BTreeMap::new();
        self.root().visit(&mut |node| {
            let entry = match node.kind() {
                NodeKind::File { content } => SnapshotEntry {
                    kind: EntryKind::File,
                    content: Some(content.clone()),
                    children: None,
                },
                NodeKind::Directory { children } => SnapshotEntry {
                    kind: EntryKind::Directory,
                    content: None,
                    children: Some(children.keys().cloned().collect()),
                },
            };
            entries.insert(node.path().to_string(), entry);
        });
        Snapshot { entries }
    }

    /// Rebuilds a store from a snapshot, validating its structure.
    ///
    /// Timestamps are not part of the snapshot; every node is stamped with the
    /// time of deserialization.
    pub fn deserialize(snapshot: &Snapshot) -> Result<Store, SnapshotError> {
        let now = SystemTime::now();
        let mut visited = HashSet::new();
        let root = build_node(snapshot, StorePath::root(), now, &mut visited)?;

        if !root.is_directory() {
            return MalformedSnafu {
                path: "/",
                reason: "the root entry is not a directory",
            }
            .fail();
        }
        if let Some(orphan) = snapshot
            .entries
            .keys()
            .find(|path| !visited.contains(path.as_str()))
        {
            return MalformedSnafu {
                path: orphan.clone(),
                reason: "entry is not listed by its parent directory",
            }
            .fail();
        }

        Ok(Store::from_root(root))
    }
}

fn build_node(
    snapshot: &Snapshot,
    path: StorePath,
    at: SystemTime,
    visited: &mut HashSet<String>,
) -> Result<Node, SnapshotError> {
    let Some(entry) = snapshot.entries.get(path.as_str()) else {
        return MalformedSnafu {
            path: path.to_string(),
            reason: "entry is missing",
        }
        .fail();
    };
    visited.insert(path.to_string());

    match (entry.kind, &entry.content, &entry.children) {
        (EntryKind::File, Some(content), None) => Ok(Node::file(path, content.clone(), at)),
        (EntryKind::Directory, None, Some(names)) => {
            let mut node = Node::directory(path.clone(), at);
            for name in names {
                if name.is_empty() || name == "." || name == ".." || name.contains('/') {
                    return MalformedSnafu {
                        path: path.to_string(),
                        reason: format!("invalid child name '{name}'"),
                    }
                    .fail();
                }
                if node
                    .children()
                    .is_some_and(|children| children.contains_key(name))
                {
                    return MalformedSnafu {
                        path: path.to_string(),
                        reason: format!("child '{name}' is listed twice"),
                    }
                    .fail();
                }
                let child = build_node(snapshot, path.child(name), at, visited)?;
                if let Some(children) = node.children_mut() {
                    children.insert(name.clone(), child);
                }
            }
            Ok(node)
        }
        _ => MalformedSnafu {
            path: path.to_string(),
            reason: "kind tag does not match the entry's fields",
        }
        .fail(),
    }
}

#[derive(Debug, Snafu)]
pub enum SnapshotError {
    #[snafu(display("Failed to encode snapshot"))]
    EncodeError { source: bincode::error::EncodeError },
    #[snafu(display("Failed to decode snapshot"))]
    DecodeError { source: bincode::error::DecodeError },
    #[snafu(display("Failed to (de)compress snapshot"))]
    CompressionError { source: std::io::Error },
    #[snafu(display("Failed to access snapshot file: {}", file_path))]
    IoError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("Malformed snapshot entry '{}': {}", path, reason))]
    Malformed { path: String, reason: String },
}
