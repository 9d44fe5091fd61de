use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::SystemTime;

use bincode::{Decode, Encode};
use derive_more::Display;
use hashlink::LinkedHashMap;

/// Permission string given to files created without explicit metadata
pub const DEFAULT_FILE_PERMISSIONS: &str = "rw-r--r--";
/// Permission string given to folders created without explicit metadata
pub const DEFAULT_FOLDER_PERMISSIONS: &str = "rwxr-xr-x";

/// Owning handle to a node stored in the tree
pub type NodeRef = Rc<RefCell<VfsNode>>;
/// Non-owning handle held by the flat path index
pub type WeakNodeRef = Weak<RefCell<VfsNode>>;

/// Children of a folder, keyed by name
pub type Children = LinkedHashMap<String, NodeRef>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Encode, Decode)]
pub enum NodeKind {
    #[display("file")]
    File,
    #[display("folder")]
    Folder,
}

/// Metadata carried by every node. Permissions are advisory and never checked.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Metadata {
    pub size: u64,
    pub mtime: SystemTime,
    pub owner: String,
    pub permissions: String,
}

impl Metadata {
    /// Builds metadata for a node that was created without any
    pub fn synthesize(kind: NodeKind, size: u64, owner: impl Into<String>) -> Self {
        let permissions = match kind {
            NodeKind::File => DEFAULT_FILE_PERMISSIONS,
            NodeKind::Folder => DEFAULT_FOLDER_PERMISSIONS,
        };

        Self {
            size,
            mtime: SystemTime::now(),
            owner: owner.into(),
            permissions: permissions.to_string(),
        }
    }
}

/// A single node of the virtual filesystem
#[derive(Debug)]
pub enum VfsNode {
    File {
        content: String,
        metadata: Metadata,
    },
    Folder {
        children: Children,
        metadata: Metadata,
    },
}

impl VfsNode {
    pub fn file(content: impl Into<String>, metadata: Option<Metadata>, owner: &str) -> Self {
        let content = content.into();
        let metadata = metadata
            .unwrap_or_else(|| Metadata::synthesize(NodeKind::File, content.len() as u64, owner));
        VfsNode::File { content, metadata }
    }

    pub fn folder(metadata: Option<Metadata>, owner: &str) -> Self {
        VfsNode::Folder {
            children: LinkedHashMap::new(),
            metadata: metadata.unwrap_or_else(|| Metadata::synthesize(NodeKind::Folder, 0, owner)),
        }
    }

    pub fn into_ref(self) -> NodeRef {
        Rc::new(RefCell::new(self))
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            VfsNode::File { .. } => NodeKind::File,
            VfsNode::Folder { .. } => NodeKind::Folder,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, VfsNode::Folder { .. })
    }

    pub fn metadata(&self) -> &Metadata {
        match self {
            VfsNode::File { metadata, .. } | VfsNode::Folder { metadata, .. } => metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        match self {
            VfsNode::File { metadata, .. } | VfsNode::Folder { metadata, .. } => metadata,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            VfsNode::File { content, .. } => Some(content),
            VfsNode::Folder { .. } => None,
        }
    }

    pub fn children(&self) -> Option<&Children> {
        match self {
            VfsNode::Folder { children, .. } => Some(children),
            VfsNode::File { .. } => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Children> {
        match self {
            VfsNode::Folder { children, .. } => Some(children),
            VfsNode::File { .. } => None,
        }
    }

    /// Replaces file content and keeps `size` in sync. Returns false for folders.
    pub fn set_content(&mut self, new_content: String) -> bool {
        match self {
            VfsNode::File { content, metadata } => {
                metadata.size = new_content.len() as u64;
                *content = new_content;
                true
            }
            VfsNode::Folder { .. } => false,
        }
    }

    pub fn touch_mtime(&mut self) {
        self.metadata_mut().mtime = SystemTime::now();
    }
}

/// Visits `node` and every descendant depth-first, parents before children.
///
/// `path` is the canonical path of `node`; descendant paths are derived from it.
pub fn walk(path: &str, node: &NodeRef, visit: &mut impl FnMut(&str, &NodeRef)) {
    visit(path, node);

    let borrowed = node.borrow();
    if let Some(children) = borrowed.children() {
        for (name, child) in children {
            let child_path = super::path::join(path, name, child.borrow().is_folder());
            walk(&child_path, child, visit);
        }
    }
}
