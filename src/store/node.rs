use std::collections::BTreeMap;
use std::time::SystemTime;

use derive_more::IsVariant;

use crate::store::StorePath;

/// A single entry of the store tree.
///
/// Nodes are only ever built by the [`Store`](crate::store::Store); the
/// constructors are crate-private so that path invariants stay enforced in one
/// place.
#[derive(Debug, Clone)]
pub struct Node {
    path: StorePath,
    created_at: SystemTime,
    updated_at: SystemTime,
    kind: NodeKind,
}

#[derive(Debug, Clone, IsVariant)]
pub enum NodeKind {
    File { content: String },
    Directory { children: BTreeMap<String, Node> },
}

impl Node {
    pub(crate) fn file(path: StorePath, content: String, at: SystemTime) -> Self {
        Node {
            path,
            created_at: at,
            updated_at: at,
            kind: NodeKind::File { content },
        }
    }

    pub(crate) fn directory(path: StorePath, at: SystemTime) -> Self {
        Node {
            path,
            created_at: at,
            updated_at: at,
            kind: NodeKind::Directory {
                children: BTreeMap::new(),
            },
        }
    }

    pub fn path(&self) -> &StorePath {
        &self.path
    }

    pub fn name(&self) -> &str {
        self.path.name()
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn updated_at(&self) -> SystemTime {
        self.updated_at
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }

    pub fn content(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::File { content } => Some(content),
            NodeKind::Directory { .. } => None,
        }
    }

    pub fn children(&self) -> Option<&BTreeMap<String, Node>> {
        match &self.kind {
            NodeKind::Directory { children } => Some(children),
            NodeKind::File { .. } => None,
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut BTreeMap<String, Node>> {
        match &mut self.kind {
            NodeKind::Directory { children } => Some(children),
            NodeKind::File { .. } => None,
        }
    }

    pub(crate) fn set_content(&mut self, new_content: String, at: SystemTime) {
        if let NodeKind::File { content } = &mut self.kind {
            *content = new_content;
            self.updated_at = at;
        }
    }

    pub(crate) fn touch(&mut self, at: SystemTime) {
        self.updated_at = at;
    }

    /// Moves this node and its whole subtree under `new_path`.
    pub(crate) fn relocate(&mut self, new_path: StorePath, at: SystemTime) {
        if let NodeKind::Directory { children } = &mut self.kind {
            for (name, child) in children.iter_mut() {
                child.relocate(new_path.child(name), at);
            }
        }
        self.path = new_path;
        self.updated_at = at;
    }

    /// Depth-first visit of this node and every descendant, children in name order.
    pub fn visit<'a>(&'a self, visitor: &mut impl FnMut(&'a Node)) {
        visitor(self);
        if let NodeKind::Directory { children } = &self.kind {
            for child in children.values() {
                child.visit(visitor);
            }
        }
    }

    /// Structural equality: paths, kinds, contents and children. Timestamps are ignored.
    pub fn same_tree(&self, other: &Node) -> bool {
        if self.path != other.path {
            return false;
        }
        match (&self.kind, &other.kind) {
            (NodeKind::File { content: a }, NodeKind::File { content: b }) => a == b,
            (NodeKind::Directory { children: a }, NodeKind::Directory { children: b }) => {
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|((name_a, node_a), (name_b, node_b))| {
                        name_a == name_b && node_a.same_tree(node_b)
                    })
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> StorePath {
        StorePath::parse(raw).unwrap()
    }

    #[test]
    fn test_relocate_rewrites_descendant_paths() {
        let now = SystemTime::now();
        let mut dir = Node::directory(path("/a"), now);
        let mut nested = Node::directory(path("/a/b"), now);
        nested
            .children_mut()
            .unwrap()
            .insert("c.js".into(), Node::file(path("/a/b/c.js"), "x".into(), now));
        dir.children_mut().unwrap().insert("b".into(), nested);

        dir.relocate(path("/z"), now);

        let mut seen = Vec::new();
        dir.visit(&mut |node| seen.push(node.path().to_string()));
        assert_eq!(seen, vec!["/z", "/z/b", "/z/b/c.js"]);
    }

    #[test]
    fn test_same_tree_ignores_timestamps() {
        let earlier = SystemTime::UNIX_EPOCH;
        let later = SystemTime::now();
        let a = Node::file(path("/f.js"), "1".into(), earlier);
        let b = Node::file(path("/f.js"), "1".into(), later);
        let c = Node::file(path("/f.js"), "2".into(), later);
        assert!(a.same_tree(&b));
        assert!(!a.same_tree(&c));
    }
}
