//! In-memory virtual filesystem.
//!
//! A single root folder owns the whole tree; a flat path index caches every node by
//! canonical path. `Vfs` keeps the two in agreement across all mutations and announces
//! which folder changed through its `ChangeNotifier`.

mod content_sync;
mod error;
mod layout;
mod notifier;
pub mod path;
mod seed;
mod store;
mod tree;

pub use content_sync::ContentSync;
pub use error::VfsError;
pub use layout::{DEFAULT_USER, SYSTEM_SKELETON, VfsLayout};
pub use notifier::{ChangeNotifier, FsChanged, coalesce};
pub use seed::{SeedEntry, SeedTree};
pub use store::Vfs;
pub use tree::{
    Children, DEFAULT_FILE_PERMISSIONS, DEFAULT_FOLDER_PERMISSIONS, Metadata, NodeKind, NodeRef,
    VfsNode, WeakNodeRef, walk,
};
