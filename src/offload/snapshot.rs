//! Owned, point-in-time copies of the tree that can be shipped to a worker thread.
//!
//! Every field is optional so a damaged snapshot can still be represented and
//! reported on by `validate`.

use std::collections::BTreeMap;

use bincode::{Decode, Encode};

use crate::filesystem::{Metadata, NodeKind, VfsNode};

/// Nested copy of a node and its whole subtree
#[derive(Debug, Clone, PartialEq, Eq, Default, Encode, Decode)]
pub struct SnapshotNode {
    pub kind: Option<NodeKind>,
    pub content: Option<String>,
    pub children: Option<BTreeMap<String, SnapshotNode>>,
    pub metadata: Option<Metadata>,
}

/// Shallow copy of a node as stored in a flat snapshot. Folders list child names only.
#[derive(Debug, Clone, PartialEq, Eq, Default, Encode, Decode)]
pub struct SnapshotEntry {
    pub kind: Option<NodeKind>,
    pub content: Option<String>,
    pub children: Option<Vec<String>>,
    pub metadata: Option<Metadata>,
}

/// Canonical path to shallow node copy, the same shape the live index has
pub type FlatSnapshot = BTreeMap<String, SnapshotEntry>;

impl SnapshotNode {
    pub fn file(content: impl Into<String>) -> Self {
        Self {
            kind: Some(NodeKind::File),
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn folder<N: Into<String>>(children: impl IntoIterator<Item = (N, SnapshotNode)>) -> Self {
        Self {
            kind: Some(NodeKind::Folder),
            children: Some(
                children
                    .into_iter()
                    .map(|(name, child)| (name.into(), child))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    pub fn from_node(node: &VfsNode) -> Self {
        match node {
            VfsNode::File { content, metadata } => Self {
                kind: Some(NodeKind::File),
                content: Some(content.clone()),
                children: None,
                metadata: Some(metadata.clone()),
            },
            VfsNode::Folder { children, metadata } => Self {
                kind: Some(NodeKind::Folder),
                content: None,
                children: Some(
                    children
                        .iter()
                        .map(|(name, child)| (name.clone(), Self::from_node(&child.borrow())))
                        .collect(),
                ),
                metadata: Some(metadata.clone()),
            },
        }
    }

    /// Folder-ness as far as path conventions go: an explicit folder kind, or no kind
    /// but a children mapping
    pub fn is_folder_like(&self) -> bool {
        match self.kind {
            Some(kind) => kind == NodeKind::Folder,
            None => self.children.is_some(),
        }
    }

    pub fn to_entry(&self) -> SnapshotEntry {
        SnapshotEntry {
            kind: self.kind,
            content: self.content.clone(),
            children: self
                .children
                .as_ref()
                .map(|children| children.keys().cloned().collect()),
            metadata: self.metadata.clone(),
        }
    }
}

impl SnapshotEntry {
    pub fn from_node(node: &VfsNode) -> Self {
        Self {
            kind: Some(node.kind()),
            content: node.content().map(str::to_string),
            children: node.children().map(|children| {
                let mut names: Vec<String> = children.keys().cloned().collect();
                names.sort();
                names
            }),
            metadata: Some(node.metadata().clone()),
        }
    }
}
