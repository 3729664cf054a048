//! In-memory project file tree.
//!
//! The store owns a hierarchy of files and directories addressed by absolute,
//! canonical paths. It enforces the tree invariants in one place, announces
//! every mutation to its subscribers and converts losslessly to and from a
//! [`Snapshot`].

mod change;
mod node;
mod path;
mod snapshot;
#[allow(clippy::module_inception)]
mod store;

pub use change::{ChangeKind, StoreChange};
pub use node::{Node, NodeKind};
pub use path::{PathError, StorePath};
pub use snapshot::{EntryKind, Snapshot, SnapshotEntry, SnapshotError};
pub use store::{Store, StoreError};
