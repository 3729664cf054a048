use derive_more::Display;

use crate::store::StorePath;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ChangeKind {
    #[display("file created")]
    FileCreated,
    #[display("file updated")]
    FileUpdated,
    #[display("directory created")]
    DirectoryCreated,
    #[display("file deleted")]
    FileDeleted,
    #[display("directory deleted")]
    DirectoryDeleted,
    #[display("renamed")]
    Renamed,
}

/// Notification emitted once per successful store mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub kind: ChangeKind,
    pub path: StorePath,
    /// Source path of a rename.
    pub previous_path: Option<StorePath>,
}

impl StoreChange {
    pub fn new(kind: ChangeKind, path: StorePath) -> Self {
        StoreChange {
            kind,
            path,
            previous_path: None,
        }
    }

    pub fn renamed(from: StorePath, to: StorePath) -> Self {
        StoreChange {
            kind: ChangeKind::Renamed,
            path: to,
            previous_path: Some(from),
        }
    }
}
