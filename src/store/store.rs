use std::collections::BTreeMap;
use std::time::SystemTime;

use futures_channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use snafu::prelude::*;
use tracing::{debug, trace};

use crate::store::path::{IntoOwnSubtreeSnafu, RootOperationSnafu};
use crate::store::{ChangeKind, Node, PathError, StoreChange, StorePath};

/// The in-memory file tree.
///
/// All mutation goes through the methods below; each one either fully applies
/// or returns an error without touching the tree, and every successful
/// mutation is announced to the subscribers in order.
#[derive(Debug)]
pub struct Store {
    root: Node,
    subscribers: Vec<UnboundedSender<StoreChange>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Store {
            root: Node::directory(StorePath::root(), SystemTime::now()),
            subscribers: Vec::new(),
        }
    }

    pub(crate) fn from_root(root: Node) -> Self {
        Store {
            root,
            subscribers: Vec::new(),
        }
    }

    /// Registers a new listener for change notifications.
    pub fn subscribe(&mut self) -> UnboundedReceiver<StoreChange> {
        let (sender, receiver) = mpsc::unbounded();
        self.subscribers.push(sender);
        receiver
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn create_file(
        &mut self,
        path: impl AsRef<str>,
        content: impl Into<String>,
    ) -> Result<(), StoreError> {
        let path = parse(path)?;
        let now = SystemTime::now();

        match self.lookup(&path).map(Node::is_directory) {
            Some(true) => {
                return KindConflictSnafu {
                    path,
                    expected: "a file",
                }
                .fail();
            }
            Some(false) => {
                if let Some(node) = self.lookup_mut(&path) {
                    node.set_content(content.into(), now);
                }
                self.notify(StoreChange::new(ChangeKind::FileUpdated, path));
                return Ok(());
            }
            None => {}
        }

        self.check_ancestors(&path)?;
        let node = Node::file(path.clone(), content.into(), now);
        self.insert(node, now);
        self.notify(StoreChange::new(ChangeKind::FileCreated, path));
        Ok(())
    }

    pub fn update_file(
        &mut self,
        path: impl AsRef<str>,
        content: impl Into<String>,
    ) -> Result<(), StoreError> {
        let path = parse(path)?;
        let node = self.file_mut(&path)?;
        node.set_content(content.into(), SystemTime::now());
        self.notify(StoreChange::new(ChangeKind::FileUpdated, path));
        Ok(())
    }

    /// Creates a directory and any missing ancestors. Succeeds without a
    /// notification when the directory already exists.
    pub fn create_directory(&mut self, path: impl AsRef<str>) -> Result<(), StoreError> {
        let path = parse(path)?;
        match self.lookup(&path).map(Node::is_directory) {
            Some(true) => return Ok(()),
            Some(false) => {
                return KindConflictSnafu {
                    path,
                    expected: "a directory",
                }
                .fail();
            }
            None => {}
        }

        self.check_ancestors(&path)?;
        let now = SystemTime::now();
        self.insert(Node::directory(path.clone(), now), now);
        self.notify(StoreChange::new(ChangeKind::DirectoryCreated, path));
        Ok(())
    }

    /// Replaces the single occurrence of `old` with `new`.
    pub fn replace_in_file(
        &mut self,
        path: impl AsRef<str>,
        old: &str,
        new: &str,
    ) -> Result<(), StoreError> {
        let path = parse(path)?;
        let content = self.read_file(path.as_str())?;

        ensure!(
            !old.is_empty(),
            EditMismatchSnafu {
                path: path.clone(),
                reason: "the text to replace is empty",
            }
        );
        let occurrences = content.matches(old).count();
        ensure!(
            occurrences == 1,
            EditMismatchSnafu {
                path: path.clone(),
                reason: if occurrences == 0 {
                    "the text to replace was not found".to_string()
                } else {
                    format!("the text to replace occurs {occurrences} times")
                },
            }
        );

        let replaced = content.replacen(old, new, 1);
        self.file_mut(&path)?.set_content(replaced, SystemTime::now());
        self.notify(StoreChange::new(ChangeKind::FileUpdated, path));
        Ok(())
    }

    /// Inserts `text` as a new line after line `line`; `0` inserts at the top.
    pub fn insert_in_file(
        &mut self,
        path: impl AsRef<str>,
        line: usize,
        text: &str,
    ) -> Result<(), StoreError> {
        let path = parse(path)?;
        let content = self.read_file(path.as_str())?;

        let mut lines: Vec<&str> = content.split('\n').collect();
        ensure!(
            line <= lines.len(),
            EditMismatchSnafu {
                path: path.clone(),
                reason: format!("line {line} is past the end of the file ({} lines)", lines.len()),
            }
        );
        lines.insert(line, text);
        let inserted = lines.join("\n");

        self.file_mut(&path)?.set_content(inserted, SystemTime::now());
        self.notify(StoreChange::new(ChangeKind::FileUpdated, path));
        Ok(())
    }

    pub fn delete_file(&mut self, path: impl AsRef<str>) -> Result<(), StoreError> {
        let path = parse(path)?;
        self.file(&path)?;
        self.detach(&path);
        self.notify(StoreChange::new(ChangeKind::FileDeleted, path));
        Ok(())
    }

    /// Deletes a directory and its entire subtree.
    pub fn delete_directory(&mut self, path: impl AsRef<str>) -> Result<(), StoreError> {
        let path = parse(path)?;
        if path.is_root() {
            return Err(RootOperationSnafu {
                operation: "deleted",
            }
            .build())
            .context(InvalidPathSnafu);
        }
        match self.lookup(&path).map(Node::is_file) {
            None => return NotFoundSnafu { path }.fail(),
            Some(true) => {
                return KindConflictSnafu {
                    path,
                    expected: "a directory",
                }
                .fail();
            }
            Some(false) => {}
        }

        self.detach(&path);
        self.notify(StoreChange::new(ChangeKind::DirectoryDeleted, path));
        Ok(())
    }

    /// Moves a file or directory. The target must not exist.
    pub fn rename(
        &mut self,
        old_path: impl AsRef<str>,
        new_path: impl AsRef<str>,
    ) -> Result<(), StoreError> {
        let from = parse(old_path)?;
        let to = parse(new_path)?;

        if from.is_root() || to.is_root() {
            return Err(RootOperationSnafu {
                operation: "renamed",
            }
            .build())
            .context(InvalidPathSnafu);
        }
        ensure!(self.lookup(&from).is_some(), NotFoundSnafu { path: from });
        if from == to {
            return Ok(());
        }
        if to.starts_with(&from) {
            return Err(IntoOwnSubtreeSnafu { from, to }.build()).context(InvalidPathSnafu);
        }
        ensure!(self.lookup(&to).is_none(), PathCollisionSnafu { path: to });
        self.check_ancestors(&to)?;

        let now = SystemTime::now();
        if let Some(mut node) = self.detach(&from) {
            node.relocate(to.clone(), now);
            self.insert(node, now);
        }
        debug!("Renamed '{}' to '{}'", from, to);
        self.notify(StoreChange::renamed(from, to));
        Ok(())
    }

    pub fn read_file(&self, path: impl AsRef<str>) -> Result<&str, StoreError> {
        let path = parse(path)?;
        match self.lookup(&path).and_then(Node::content) {
            Some(content) => Ok(content),
            None => NotFoundSnafu { path }.fail(),
        }
    }

    /// Invalid paths never exist.
    pub fn exists(&self, path: impl AsRef<str>) -> bool {
        StorePath::parse(path)
            .ok()
            .is_some_and(|path| self.lookup(&path).is_some())
    }

    pub fn is_file(&self, path: &StorePath) -> bool {
        self.lookup(path).is_some_and(Node::is_file)
    }

    /// Entries of a directory, ordered by name.
    pub fn list_directory(&self, path: impl AsRef<str>) -> Result<Vec<&Node>, StoreError> {
        let path = parse(path)?;
        match self.lookup(&path) {
            None => NotFoundSnafu { path }.fail(),
            Some(node) => match node.children() {
                Some(children) => Ok(children.values().collect()),
                None => KindConflictSnafu {
                    path,
                    expected: "a directory",
                }
                .fail(),
            },
        }
    }

    pub fn node(&self, path: &StorePath) -> Option<&Node> {
        self.lookup(path)
    }

    /// Every file in tree order (depth first, siblings by name).
    pub fn walk_files(&self) -> Vec<&Node> {
        let mut files = Vec::new();
        self.root.visit(&mut |node| {
            if node.is_file() {
                files.push(node);
            }
        });
        files
    }

    pub fn file_count(&self) -> usize {
        self.walk_files().len()
    }

    /// Structural and content equality with another store.
    pub fn same_tree(&self, other: &Store) -> bool {
        self.root.same_tree(&other.root)
    }

    fn notify(&mut self, change: StoreChange) {
        trace!("Store change: {} at '{}'", change.kind, change.path);
        self.subscribers
            .retain(|subscriber| subscriber.unbounded_send(change.clone()).is_ok());
    }

    fn lookup(&self, path: &StorePath) -> Option<&Node> {
        let mut current = &self.root;
        for segment in path.segments() {
            current = current.children()?.get(segment)?;
        }
        Some(current)
    }

    fn lookup_mut(&mut self, path: &StorePath) -> Option<&mut Node> {
        let mut current = &mut self.root;
        for segment in path.segments() {
            current = current.children_mut()?.get_mut(segment)?;
        }
        Some(current)
    }

    fn file(&self, path: &StorePath) -> Result<&Node, StoreError> {
        match self.lookup(path) {
            None => NotFoundSnafu { path: path.clone() }.fail(),
            Some(node) if node.is_directory() => KindConflictSnafu {
                path: path.clone(),
                expected: "a file",
            }
            .fail(),
            Some(node) => Ok(node),
        }
    }

    fn file_mut(&mut self, path: &StorePath) -> Result<&mut Node, StoreError> {
        self.file(path)?;
        self.lookup_mut(path)
            .context(NotFoundSnafu { path: path.clone() })
    }

    /// Fails if any existing ancestor of `path` is a file.
    fn check_ancestors(&self, path: &StorePath) -> Result<(), StoreError> {
        let mut current = &self.root;
        let mut walked = StorePath::root();
        let segments: Vec<&str> = path.segments().collect();

        for segment in &segments[..segments.len().saturating_sub(1)] {
            walked = walked.child(segment);
            match current.children().and_then(|children| children.get(*segment)) {
                None => return Ok(()),
                Some(node) if node.is_directory() => current = node,
                Some(_) => {
                    return KindConflictSnafu {
                        path: walked,
                        expected: "a directory",
                    }
                    .fail();
                }
            }
        }
        Ok(())
    }

    /// Returns the children of `directory`, creating it and its ancestors as needed.
    ///
    /// Callers must have run [`Self::check_ancestors`] first.
    fn ensure_directory(
        &mut self,
        directory: &StorePath,
        at: SystemTime,
    ) -> Option<&mut BTreeMap<String, Node>> {
        let mut current = &mut self.root;
        let mut walked = StorePath::root();
        for segment in directory.segments() {
            walked = walked.child(segment);
            let path = walked.clone();
            current = current
                .children_mut()?
                .entry(segment.to_string())
                .or_insert_with(|| Node::directory(path, at));
        }
        current.touch(at);
        current.children_mut()
    }

    fn insert(&mut self, node: Node, at: SystemTime) {
        let Some(parent) = node.path().parent() else {
            return;
        };
        let name = node.name().to_string();
        if let Some(children) = self.ensure_directory(&parent, at) {
            children.insert(name, node);
        }
    }

    fn detach(&mut self, path: &StorePath) -> Option<Node> {
        let parent = path.parent()?;
        let now = SystemTime::now();
        let parent_node = self.lookup_mut(&parent)?;
        parent_node.touch(now);
        parent_node.children_mut()?.remove(path.name())
    }
}

fn parse(path: impl AsRef<str>) -> Result<StorePath, StoreError> {
    StorePath::parse(path).context(InvalidPathSnafu)
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("Invalid path"))]
    InvalidPath { source: PathError },
    #[snafu(display("No file or directory at '{}'", path))]
    NotFound { path: StorePath },
    #[snafu(display("'{}' is in the way, expected {}", path, expected))]
    KindConflict {
        path: StorePath,
        expected: &'static str,
    },
    #[snafu(display("'{}' already exists", path))]
    PathCollision { path: StorePath },
    #[snafu(display("Cannot edit '{}': {}", path, reason))]
    EditMismatch { path: StorePath, reason: String },
}
