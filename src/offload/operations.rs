//! Read-only scans over snapshots. Pure functions, safe to run on any thread.

use bincode::{Decode, Encode};

use crate::filesystem::NodeKind;
use crate::filesystem::path;

use super::snapshot::{FlatSnapshot, SnapshotNode};

#[derive(Debug, Clone, PartialEq, Eq, Default, Encode, Decode)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Paths of files whose basename contains `pattern`, ignoring case
pub fn search(snapshot: &FlatSnapshot, pattern: &str) -> Vec<String> {
    let needle = pattern.to_lowercase();

    snapshot
        .iter()
        .filter(|(_, entry)| entry.kind == Some(NodeKind::File))
        .filter(|(entry_path, _)| path::basename(entry_path).to_lowercase().contains(&needle))
        .map(|(entry_path, _)| entry_path.clone())
        .collect()
}

/// Flattens a nested snapshot into the path-keyed shape of the live index.
///
/// `base_path` is the path of `root` itself. Each node is recorded before its children.
pub fn flatten(root: &SnapshotNode, base_path: &str) -> FlatSnapshot {
    let mut flat = FlatSnapshot::new();
    let root_path = if root.is_folder_like() {
        path::as_folder_path(base_path)
    } else {
        base_path.to_string()
    };
    flatten_into(root, &root_path, &mut flat);
    flat
}

fn flatten_into(node: &SnapshotNode, node_path: &str, flat: &mut FlatSnapshot) {
    flat.insert(node_path.to_string(), node.to_entry());

    if let Some(children) = &node.children {
        for (name, child) in children {
            let child_path = path::join(node_path, name, child.is_folder_like());
            flatten_into(child, &child_path, flat);
        }
    }
}

/// Checks every entry for a type, files for content and folders for a children list
pub fn validate(snapshot: &FlatSnapshot) -> ValidationReport {
    let mut errors = Vec::new();

    for (entry_path, entry) in snapshot {
        match entry.kind {
            None => errors.push(format!("{entry_path}: node has no type")),
            Some(NodeKind::File) if entry.content.is_none() => {
                errors.push(format!("{entry_path}: file has no content"))
            }
            Some(NodeKind::Folder) if entry.children.is_none() => {
                errors.push(format!("{entry_path}: folder has no children"))
            }
            Some(_) => {}
        }
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}
