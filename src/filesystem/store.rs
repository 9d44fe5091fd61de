use std::collections::HashMap;
use std::rc::{Rc, Weak};

use futures_channel::mpsc::UnboundedReceiver;
use snafu::{OptionExt, ensure};
use tracing::{debug, info, warn};

use crate::offload::{FlatSnapshot, SnapshotEntry, SnapshotNode};

use super::error::{
    AlreadyExistsSnafu, InvalidNameSnafu, MoveIntoSelfSnafu, NotAFileSnafu, NotAFolderSnafu,
    NotFoundSnafu, RootImmutableSnafu, VfsError,
};
use super::layout::{SYSTEM_SKELETON, VfsLayout};
use super::notifier::{ChangeNotifier, FsChanged};
use super::path::{self, ROOT};
use super::seed::{SeedEntry, SeedTree};
use super::tree::{Children, NodeRef, VfsNode, WeakNodeRef, walk};

/// The in-memory filesystem: one root folder owning the tree, plus a flat index from
/// canonical path to node kept in lockstep with it.
///
/// Every structural mutation goes through `reindex_subtree`, so the index always
/// agrees with the tree. Refused mutations leave both untouched.
#[derive(Debug)]
pub struct Vfs {
    root: NodeRef,
    index: HashMap<String, WeakNodeRef>,
    layout: VfsLayout,
    notifier: ChangeNotifier,
    /// Trashed item name -> folder it was trashed from
    trash_origins: HashMap<String, String>,
}

impl Vfs {
    /// A filesystem holding nothing but the root folder
    pub fn new(layout: VfsLayout) -> Self {
        let root = VfsNode::folder(None, &layout.owner).into_ref();
        let mut vfs = Self {
            root,
            index: HashMap::new(),
            layout,
            notifier: ChangeNotifier::new(),
            trash_origins: HashMap::new(),
        };
        vfs.rebuild_index();
        vfs
    }

    /// Builds the system skeleton, seeds the home directory and indexes everything.
    ///
    /// No change notifications are sent while initializing.
    pub fn init(layout: VfsLayout, home: &SeedTree) -> Self {
        let mut vfs = Self::new(layout);

        for dir in SYSTEM_SKELETON {
            vfs.ensure_folder_in_tree(dir);
        }

        let home_dir = vfs.layout.home.clone();
        match vfs.ensure_folder_in_tree(&home_dir) {
            Some(home_node) => vfs.seed_folder(&home_node, &home_dir, home),
            None => warn!("Home directory {} could not be created", home_dir),
        }

        for dir in [vfs.layout.desktop.clone(), vfs.layout.trash.clone()] {
            vfs.ensure_folder_in_tree(&dir);
        }

        vfs.rebuild_index();
        info!("Initialized filesystem with {} nodes", vfs.index.len());
        vfs
    }

    pub fn layout(&self) -> &VfsLayout {
        &self.layout
    }

    pub fn root(&self) -> NodeRef {
        self.root.clone()
    }

    /// Resolves `input` against `cwd`, expanding `~` to this filesystem's home
    pub fn resolve_path(&self, cwd: &str, input: &str) -> String {
        path::resolve(cwd, input, &self.layout.home)
    }

    pub fn subscribe(&mut self) -> UnboundedReceiver<FsChanged> {
        self.notifier.subscribe()
    }

    // Lookups

    /// Exact index lookup
    pub fn get_node(&self, path: &str) -> Option<NodeRef> {
        self.index.get(path).and_then(Weak::upgrade)
    }

    /// Children of the folder at `path`; `None` when absent or a file
    pub fn get_children(&self, path: &str) -> Option<Children> {
        let node = self.get_node(path)?;
        node.borrow().children().cloned()
    }

    pub fn exists(&self, path: &str) -> bool {
        self.get_node(path).is_some()
    }

    pub fn is_folder(&self, path: &str) -> bool {
        self.get_node(path)
            .is_some_and(|node| node.borrow().is_folder())
    }

    /// Sorted child names of the folder at `path`
    pub fn list(&self, path: &str) -> Option<Vec<String>> {
        let mut names: Vec<String> = self.get_children(path)?.keys().cloned().collect();
        names.sort();
        Some(names)
    }

    pub fn read_file(&self, path: &str) -> Option<String> {
        let node = self.get_node(path)?;
        node.borrow().content().map(str::to_string)
    }

    /// Every indexed path, sorted
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.index.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    // Mutations

    /// Creates an empty file `name` inside the folder `dir`
    pub fn touch(&mut self, dir: &str, name: &str) -> Result<String, VfsError> {
        let node = VfsNode::file("", None, &self.layout.owner);
        self.create(dir, name, node)
            .inspect_err(|e| warn!("touch {}{} refused: {}", dir, name, e))
    }

    /// Creates an empty folder `name` inside the folder `dir`
    pub fn mkdir(&mut self, dir: &str, name: &str) -> Result<String, VfsError> {
        let node = VfsNode::folder(None, &self.layout.owner);
        self.create(dir, name, node)
            .inspect_err(|e| warn!("mkdir {}{} refused: {}", dir, name, e))
    }

    /// Removes `name` from the folder `dir`, along with its whole subtree
    pub fn rm(&mut self, dir: &str, name: &str) -> Result<(), VfsError> {
        self.remove_child(dir, name)
            .inspect_err(|e| warn!("rm {}{} refused: {}", dir, name, e))
    }

    /// Renames `old_name` to `new_name` within the same folder
    pub fn rename(&mut self, dir: &str, old_name: &str, new_name: &str) -> Result<String, VfsError> {
        self.rename_child(dir, old_name, new_name)
            .inspect_err(|e| warn!("rename {}{} -> {} refused: {}", dir, old_name, new_name, e))
    }

    /// Moves the node at `old_path` so that it lives at `new_path`.
    ///
    /// `new_path` names the destination itself, not the folder to move into.
    pub fn move_node(&mut self, old_path: &str, new_path: &str) -> Result<String, VfsError> {
        self.relocate(old_path, new_path)
            .inspect_err(|e| warn!("move {} -> {} refused: {}", old_path, new_path, e))
    }

    /// Replaces the content of an existing file
    pub fn write_file(&mut self, path: &str, content: impl Into<String>) -> Result<(), VfsError> {
        self.write_existing(path, content.into())
            .inspect_err(|e| warn!("write {} refused: {}", path, e))
    }

    /// Moves the node at `path` into the trash, remembering where it came from
    pub fn move_to_trash(&mut self, path: &str) -> Result<String, VfsError> {
        self.trash(path)
            .inspect_err(|e| warn!("trash {} refused: {}", path, e))
    }

    /// Moves `name` out of the trash, back to where it was trashed from when that
    /// folder still exists, otherwise to the layout's restore folder
    pub fn restore_from_trash(&mut self, name: &str) -> Result<String, VfsError> {
        self.restore(name)
            .inspect_err(|e| warn!("restore {} refused: {}", name, e))
    }

    /// Overwrites the content of an existing file without touching `mtime`, the index or
    /// the notifier. Used to fill in large text bodies after init.
    pub fn patch_content(&mut self, path: &str, content: impl Into<String>) -> bool {
        let Some(node) = self.get_node(path) else {
            warn!("Content patch skipped, no such file: {}", path);
            return false;
        };

        let patched = node.borrow_mut().set_content(content.into());
        if patched {
            debug!("Patched content of {}", path);
        } else {
            warn!("Content patch skipped, not a file: {}", path);
        }
        patched
    }

    // Snapshots

    /// Nested copy of the whole tree
    pub fn snapshot(&self) -> SnapshotNode {
        SnapshotNode::from_node(&self.root.borrow())
    }

    /// Copy of the flat index
    pub fn flat_snapshot(&self) -> FlatSnapshot {
        self.index
            .iter()
            .filter_map(|(path, weak)| {
                weak.upgrade()
                    .map(|node| (path.clone(), SnapshotEntry::from_node(&node.borrow())))
            })
            .collect()
    }

    /// Lists every disagreement between the tree and the flat index. Empty when consistent.
    pub fn check_consistency(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for (indexed_path, weak) in &self.index {
            let Some(indexed) = weak.upgrade() else {
                problems.push(format!("{indexed_path}: index entry points at a dropped node"));
                continue;
            };
            match self.lookup_in_tree(indexed_path) {
                Some(found) if Rc::ptr_eq(&found, &indexed) => {}
                Some(_) => problems.push(format!(
                    "{indexed_path}: index and tree hold different nodes"
                )),
                None => problems.push(format!("{indexed_path}: not reachable from the root")),
            }
        }

        walk(ROOT, &self.root, &mut |tree_path, node| {
            let indexed = self.get_node(tree_path);
            if !indexed.is_some_and(|indexed| Rc::ptr_eq(&indexed, node)) {
                problems.push(format!("{tree_path}: reachable node missing from index"));
            }
        });

        problems
    }

    // Internals

    fn create(&mut self, dir: &str, name: &str, node: VfsNode) -> Result<String, VfsError> {
        ensure!(path::is_valid_name(name), InvalidNameSnafu { name });
        let (dir, parent) = self.folder(dir)?;

        let kind = node.kind();
        let child_path = path::join(&dir, name, node.is_folder());
        let child = node.into_ref();
        {
            let mut parent = parent.borrow_mut();
            let children = parent
                .children_mut()
                .context(NotAFolderSnafu { path: &dir })?;
            if let Some(existing) = children.get(name) {
                let existing_path = path::join(&dir, name, existing.borrow().is_folder());
                return AlreadyExistsSnafu {
                    path: existing_path,
                }
                .fail();
            }
            children.insert(name.to_string(), child.clone());
            parent.touch_mtime();
        }

        self.reindex_subtree(None, Some(&child_path), &child);
        debug!("Created {} {}", kind, child_path);
        self.notifier.notify(&dir);
        Ok(child_path)
    }

    fn remove_child(&mut self, dir: &str, name: &str) -> Result<(), VfsError> {
        let (dir, parent) = self.folder(dir)?;

        let removed = {
            let mut parent = parent.borrow_mut();
            let removed = parent.children_mut().and_then(|children| children.remove(name));
            if removed.is_some() {
                parent.touch_mtime();
            }
            removed
        };
        let removed = removed.context(NotFoundSnafu {
            path: path::join(&dir, name, false),
        })?;

        let removed_path = path::join(&dir, name, removed.borrow().is_folder());
        self.reindex_subtree(Some(&removed_path), None, &removed);
        self.forget_trash_origins_under(&removed_path);
        if dir == self.layout.trash {
            self.trash_origins.remove(name);
        }

        debug!("Removed {}", removed_path);
        self.notifier.notify(&dir);
        Ok(())
    }

    fn rename_child(
        &mut self,
        dir: &str,
        old_name: &str,
        new_name: &str,
    ) -> Result<String, VfsError> {
        ensure!(
            path::is_valid_name(new_name),
            InvalidNameSnafu { name: new_name }
        );
        let (dir, parent) = self.folder(dir)?;

        let (node, old_path, new_path) = {
            let mut parent = parent.borrow_mut();
            let children = parent
                .children_mut()
                .context(NotAFolderSnafu { path: &dir })?;
            let node = children.get(old_name).cloned().context(NotFoundSnafu {
                path: path::join(&dir, old_name, false),
            })?;
            let is_folder = node.borrow().is_folder();
            let old_path = path::join(&dir, old_name, is_folder);
            if old_name == new_name {
                return Ok(old_path);
            }
            if let Some(existing) = children.get(new_name) {
                let existing_path = path::join(&dir, new_name, existing.borrow().is_folder());
                return AlreadyExistsSnafu {
                    path: existing_path,
                }
                .fail();
            }

            children.remove(old_name);
            children.insert(new_name.to_string(), node.clone());
            parent.touch_mtime();
            (node, old_path, path::join(&dir, new_name, is_folder))
        };

        self.reindex_subtree(Some(&old_path), Some(&new_path), &node);
        self.forget_trash_origins_under(&old_path);
        if dir == self.layout.trash {
            if let Some(origin) = self.trash_origins.remove(old_name) {
                self.trash_origins.insert(new_name.to_string(), origin);
            }
        }

        debug!("Renamed {} to {}", old_path, new_path);
        self.notifier.notify(&dir);
        Ok(new_path)
    }

    fn relocate(&mut self, old_path: &str, new_path: &str) -> Result<String, VfsError> {
        let (old_key, node) = self
            .locate(old_path)
            .context(NotFoundSnafu { path: old_path })?;
        let (old_dir, old_name) = path::split_parent(&old_key).context(RootImmutableSnafu)?;
        let (new_dir, new_name) =
            path::split_parent(new_path).context(InvalidNameSnafu { name: new_path })?;
        ensure!(
            path::is_valid_name(&new_name),
            InvalidNameSnafu { name: &new_name }
        );

        let (old_dir, old_parent) = self.folder(&old_dir)?;
        let (new_dir, new_parent) = self.folder(&new_dir)?;

        let is_folder = node.borrow().is_folder();
        let new_key = path::join(&new_dir, &new_name, is_folder);
        if new_key == old_key {
            return Ok(new_key);
        }
        ensure!(
            !(is_folder && new_key.starts_with(&old_key)),
            MoveIntoSelfSnafu {
                from: &old_key,
                to: &new_key
            }
        );
        if let Some(existing) = new_parent
            .borrow()
            .children()
            .and_then(|children| children.get(&new_name))
        {
            let existing_path = path::join(&new_dir, &new_name, existing.borrow().is_folder());
            return AlreadyExistsSnafu {
                path: existing_path,
            }
            .fail();
        }

        {
            let mut old_parent = old_parent.borrow_mut();
            if let Some(children) = old_parent.children_mut() {
                children.remove(&old_name);
            }
            old_parent.touch_mtime();
        }
        {
            let mut new_parent = new_parent.borrow_mut();
            if let Some(children) = new_parent.children_mut() {
                children.insert(new_name, node.clone());
            }
            new_parent.touch_mtime();
        }

        self.reindex_subtree(Some(&old_key), Some(&new_key), &node);
        self.forget_trash_origins_under(&old_key);
        if old_dir == self.layout.trash {
            self.trash_origins.remove(&old_name);
        }

        debug!("Moved {} to {}", old_key, new_key);
        self.notifier.notify(&old_dir);
        self.notifier.notify(&new_dir);
        Ok(new_key)
    }

    fn write_existing(&mut self, path: &str, content: String) -> Result<(), VfsError> {
        let (key, node) = self.locate(path).context(NotFoundSnafu { path })?;
        ensure!(!node.borrow().is_folder(), NotAFileSnafu { path: &key });
        let (dir, _) = path::split_parent(&key).context(NotAFileSnafu { path: &key })?;

        {
            let mut node = node.borrow_mut();
            node.set_content(content);
            node.touch_mtime();
        }
        if let Some(parent) = self.get_node(&dir) {
            parent.borrow_mut().touch_mtime();
        }

        debug!("Wrote {}", key);
        self.notifier.notify(&dir);
        Ok(())
    }

    fn trash(&mut self, path: &str) -> Result<String, VfsError> {
        let (key, _) = self.locate(path).context(NotFoundSnafu { path })?;
        let (origin, name) = path::split_parent(&key).context(RootImmutableSnafu)?;
        let trash = self.layout.trash.clone();

        let trashed = self.relocate(&key, &path::join(&trash, &name, false))?;
        if origin != trash {
            self.trash_origins.insert(name, origin);
        }
        Ok(trashed)
    }

    fn restore(&mut self, name: &str) -> Result<String, VfsError> {
        ensure!(path::is_valid_name(name), InvalidNameSnafu { name });
        let trashed = path::join(&self.layout.trash, name, false);
        let (key, _) = self
            .locate(&trashed)
            .context(NotFoundSnafu { path: &trashed })?;

        let destination = self
            .trash_origins
            .get(name)
            .filter(|origin| self.is_folder(origin))
            .cloned()
            .unwrap_or_else(|| self.layout.restore_dir.clone());

        self.relocate(&key, &path::join(&destination, name, false))
    }

    /// Drops every recorded origin once the trash folder itself has been removed or
    /// moved as part of the subtree at `subtree_path`
    fn forget_trash_origins_under(&mut self, subtree_path: &str) {
        if path::is_folder_path(subtree_path)
            && self.layout.trash.starts_with(subtree_path)
            && !self.trash_origins.is_empty()
        {
            debug!(
                "Trash folder left with {}, forgetting {} origins",
                subtree_path,
                self.trash_origins.len()
            );
            self.trash_origins.clear();
        }
    }

    /// The single place index entries are added and removed. Drops every entry of the
    /// subtree at `old_path` and indexes the same subtree at `new_path`.
    fn reindex_subtree(&mut self, old_path: Option<&str>, new_path: Option<&str>, node: &NodeRef) {
        let index = &mut self.index;
        if let Some(old_path) = old_path {
            walk(old_path, node, &mut |path, _| {
                index.remove(path);
            });
        }
        if let Some(new_path) = new_path {
            walk(new_path, node, &mut |path, node| {
                index.insert(path.to_string(), Rc::downgrade(node));
            });
        }
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        let root = self.root.clone();
        self.reindex_subtree(None, Some(ROOT), &root);
    }

    /// Finds a node by exact path, accepting a folder path written without its
    /// trailing separator. Returns the canonical path alongside the node.
    fn locate(&self, path: &str) -> Option<(String, NodeRef)> {
        if let Some(node) = self.get_node(path) {
            return Some((path.to_string(), node));
        }
        if path::is_folder_path(path) {
            return None;
        }
        let folder_path = path::as_folder_path(path);
        self.get_node(&folder_path).map(|node| (folder_path, node))
    }

    /// Looks up an existing folder, returning its canonical path
    fn folder(&self, dir: &str) -> Result<(String, NodeRef), VfsError> {
        let folder_path = path::as_folder_path(dir);
        match self.get_node(&folder_path) {
            Some(node) => Ok((folder_path, node)),
            None => {
                let file_path = folder_path.trim_end_matches(path::SEPARATOR);
                if self.get_node(file_path).is_some() {
                    NotAFolderSnafu { path: file_path }.fail()
                } else {
                    NotFoundSnafu { path: folder_path }.fail()
                }
            }
        }
    }

    /// Walks the tree itself, ignoring the index
    fn lookup_in_tree(&self, path: &str) -> Option<NodeRef> {
        let mut current = self.root.clone();
        for segment in path.split(path::SEPARATOR).filter(|s| !s.is_empty()) {
            let next = current.borrow().children()?.get(segment)?.clone();
            current = next;
        }

        let is_folder = current.borrow().is_folder();
        if is_folder == path::is_folder_path(path) {
            Some(current)
        } else {
            None
        }
    }

    /// Creates any missing folders along `dir` directly in the tree, without indexing
    fn ensure_folder_in_tree(&self, dir: &str) -> Option<NodeRef> {
        let mut current = self.root.clone();
        for segment in dir.split(path::SEPARATOR).filter(|s| !s.is_empty()) {
            let next = {
                let mut node = current.borrow_mut();
                let Some(children) = node.children_mut() else {
                    warn!("Cannot create {}: a file is in the way", dir);
                    return None;
                };
                match children.get(segment) {
                    Some(existing) => existing.clone(),
                    None => {
                        let folder = VfsNode::folder(None, &self.layout.owner).into_ref();
                        children.insert(segment.to_string(), folder.clone());
                        folder
                    }
                }
            };
            current = next;
        }

        if current.borrow().is_folder() {
            Some(current)
        } else {
            warn!("Cannot create {}: a file is in the way", dir);
            None
        }
    }

    fn seed_folder(&self, folder: &NodeRef, folder_path: &str, entries: &SeedTree) {
        for (name, entry) in entries {
            if !path::is_valid_name(name) {
                warn!("Skipping seed entry with invalid name '{}' in {}", name, folder_path);
                continue;
            }

            let existing = folder
                .borrow()
                .children()
                .and_then(|children| children.get(name).cloned());

            match (entry, existing) {
                (SeedEntry::Folder(sub_entries), Some(existing))
                    if existing.borrow().is_folder() =>
                {
                    let sub_path = path::join(folder_path, name, true);
                    self.seed_folder(&existing, &sub_path, sub_entries);
                }
                (entry, existing) => {
                    if existing.is_some() {
                        warn!("Seed entry {}{} replaces an existing node", folder_path, name);
                    }
                    let node = self.seed_node(folder_path, name, entry);
                    if let Some(children) = folder.borrow_mut().children_mut() {
                        children.insert(name.clone(), node);
                    }
                }
            }
        }
    }

    fn seed_node(&self, parent_path: &str, name: &str, entry: &SeedEntry) -> NodeRef {
        match entry {
            SeedEntry::File(content) => {
                VfsNode::file(content.clone(), None, &self.layout.owner).into_ref()
            }
            SeedEntry::Folder(entries) => {
                let folder = VfsNode::folder(None, &self.layout.owner).into_ref();
                self.seed_folder(&folder, &path::join(parent_path, name, true), entries);
                folder
            }
        }
    }
}

impl Default for Vfs {
    fn default() -> Self {
        Self::init(VfsLayout::default(), &SeedTree::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::notifier::coalesce;
    use crate::filesystem::tree::NodeKind;
    use rstest::*;

    #[fixture]
    fn vfs() -> Vfs {
        let home: SeedTree = [
            (
                "Desktop".to_string(),
                SeedEntry::folder([("x.txt", SeedEntry::file("trash me"))]),
            ),
            (
                "Documents".to_string(),
                SeedEntry::folder([
                    ("readme.md", SeedEntry::file("# Hello")),
                    (
                        "drafts",
                        SeedEntry::folder([("draft.txt", SeedEntry::file("wip"))]),
                    ),
                ]),
            ),
        ]
        .into_iter()
        .collect();
        Vfs::init(VfsLayout::default(), &home)
    }

    fn assert_consistent(vfs: &Vfs) {
        let problems = vfs.check_consistency();
        assert!(problems.is_empty(), "inconsistent: {problems:?}");
    }

    #[rstest]
    fn init_builds_skeleton_home_and_trash(vfs: Vfs) {
        for path in ["/", "/bin/", "/etc/", "/usr/share/", "/network/", "/home/user/"] {
            assert!(vfs.is_folder(path), "missing {path}");
        }
        assert!(vfs.is_folder("/home/user/.Trash/"));
        assert_eq!(
            vfs.read_file("/home/user/Documents/drafts/draft.txt").as_deref(),
            Some("wip")
        );
        assert_consistent(&vfs);
    }

    #[rstest]
    fn seeded_metadata_is_synthesized(vfs: Vfs) {
        let node = vfs.get_node("/home/user/Documents/readme.md").unwrap();
        let node = node.borrow();
        assert_eq!(node.metadata().size, 7);
        assert_eq!(node.metadata().owner, "user");
    }

    #[rstest]
    fn mkdir_touch_get_node_round_trip(mut vfs: Vfs) {
        vfs.mkdir("/home/user/", "Projects").unwrap();
        vfs.touch("/home/user/Projects/", "note.txt").unwrap();

        let node = vfs.get_node("/home/user/Projects/note.txt").unwrap();
        assert_eq!(node.borrow().kind(), NodeKind::File);
        assert_eq!(node.borrow().content(), Some(""));
        assert_consistent(&vfs);
    }

    #[rstest]
    fn get_children_of_file_is_none(vfs: Vfs) {
        assert!(vfs.get_children("/home/user/Documents/readme.md").is_none());
        assert!(vfs.get_children("/does/not/exist/").is_none());
        assert_eq!(
            vfs.list("/home/user/Documents/"),
            Some(vec!["drafts".to_string(), "readme.md".to_string()])
        );
    }

    #[rstest]
    fn index_shares_node_instances_with_tree(vfs: Vfs) {
        let from_index = vfs.get_node("/home/user/Documents/").unwrap();
        let from_tree = vfs
            .get_children("/home/user/")
            .and_then(|children| children.get("Documents").cloned())
            .unwrap();
        assert!(Rc::ptr_eq(&from_index, &from_tree));
    }

    #[rstest]
    fn create_refuses_missing_parent_and_duplicates(mut vfs: Vfs) {
        let missing = vfs.touch("/nope/", "a.txt").unwrap_err();
        assert!(missing.is_not_found());

        let duplicate = vfs.mkdir("/home/user/", "Documents").unwrap_err();
        assert_eq!(
            duplicate,
            VfsError::AlreadyExists {
                path: "/home/user/Documents/".into()
            }
        );

        let into_file = vfs.touch("/home/user/Documents/readme.md", "x").unwrap_err();
        assert!(into_file.is_wrong_type());
        assert_consistent(&vfs);
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("a/b")]
    fn create_refuses_invalid_names(mut vfs: Vfs, #[case] name: &str) {
        let before = vfs.len();
        assert!(matches!(
            vfs.touch("/tmp/", name),
            Err(VfsError::InvalidName { .. })
        ));
        assert_eq!(vfs.len(), before);
    }

    #[rstest]
    fn create_updates_parent_mtime(mut vfs: Vfs) {
        let parent = vfs.get_node("/tmp/").unwrap();
        parent.borrow_mut().metadata_mut().mtime = std::time::SystemTime::UNIX_EPOCH;

        vfs.touch("/tmp/", "a").unwrap();

        assert!(parent.borrow().metadata().mtime > std::time::SystemTime::UNIX_EPOCH);
    }

    #[rstest]
    fn rm_folder_drops_descendant_entries(mut vfs: Vfs) {
        vfs.rm("/home/user/", "Documents").unwrap();

        assert!(vfs.get_node("/home/user/Documents/").is_none());
        assert!(vfs.get_node("/home/user/Documents/readme.md").is_none());
        assert!(vfs.get_node("/home/user/Documents/drafts/draft.txt").is_none());
        assert!(!vfs.paths().iter().any(|p| p.starts_with("/home/user/Documents/")));
        assert_consistent(&vfs);
    }

    #[rstest]
    fn rm_missing_child_fails(mut vfs: Vfs) {
        assert!(vfs.rm("/home/user/", "ghost").unwrap_err().is_not_found());
    }

    #[rstest]
    fn rename_file_rewrites_its_key(mut vfs: Vfs) {
        let path = vfs
            .rename("/home/user/Documents/", "readme.md", "README.md")
            .unwrap();

        assert_eq!(path, "/home/user/Documents/README.md");
        assert!(vfs.get_node("/home/user/Documents/readme.md").is_none());
        assert_eq!(vfs.read_file(&path).as_deref(), Some("# Hello"));
        assert_consistent(&vfs);
    }

    #[rstest]
    fn rename_folder_rekeys_descendants(mut vfs: Vfs) {
        vfs.rename("/home/user/", "Documents", "Docs").unwrap();

        assert!(vfs.is_folder("/home/user/Docs/drafts/"));
        assert!(vfs.exists("/home/user/Docs/drafts/draft.txt"));
        assert!(!vfs.exists("/home/user/Documents/drafts/draft.txt"));
        assert_consistent(&vfs);
    }

    #[rstest]
    fn rename_onto_existing_name_fails(mut vfs: Vfs) {
        vfs.touch("/home/user/Documents/", "other.md").unwrap();
        let error = vfs
            .rename("/home/user/Documents/", "readme.md", "other.md")
            .unwrap_err();

        assert!(matches!(error, VfsError::AlreadyExists { .. }));
        assert_eq!(vfs.read_file("/home/user/Documents/readme.md").as_deref(), Some("# Hello"));
    }

    #[rstest]
    fn move_rekeys_descendants(mut vfs: Vfs) {
        vfs.mkdir("/", "src").unwrap();
        vfs.touch("/src/", "a.txt").unwrap();
        vfs.mkdir("/src/", "nested").unwrap();
        vfs.touch("/src/nested/", "b.txt").unwrap();

        let moved = vfs.move_node("/src/", "/dst/").unwrap();

        assert_eq!(moved, "/dst/");
        assert!(vfs.get_node("/dst/a.txt").is_some());
        assert!(vfs.get_node("/dst/nested/b.txt").is_some());
        assert!(vfs.get_node("/src/a.txt").is_none());
        assert!(vfs.get_node("/src/").is_none());
        assert_consistent(&vfs);
    }

    #[rstest]
    fn move_keeps_node_identity(mut vfs: Vfs) {
        let before = vfs.get_node("/home/user/Documents/readme.md").unwrap();
        vfs.move_node("/home/user/Documents/readme.md", "/tmp/readme.md")
            .unwrap();
        let after = vfs.get_node("/tmp/readme.md").unwrap();

        assert!(Rc::ptr_eq(&before, &after));
    }

    #[rstest]
    fn move_into_own_subtree_fails(mut vfs: Vfs) {
        let error = vfs
            .move_node("/home/user/Documents/", "/home/user/Documents/drafts/inner/")
            .unwrap_err();

        assert!(matches!(error, VfsError::MoveIntoSelf { .. }));
        assert_consistent(&vfs);
    }

    #[rstest]
    #[case("/", "/x/")]
    #[case("/nope.txt", "/tmp/nope.txt")]
    #[case("/home/user/Documents/readme.md", "/missing/readme.md")]
    #[case("/home/user/Documents/readme.md", "/home/user/Documents/readme.md/x")]
    fn move_failures_leave_tree_untouched(
        mut vfs: Vfs,
        #[case] from: &str,
        #[case] to: &str,
    ) {
        let before = vfs.paths();
        assert!(vfs.move_node(from, to).is_err());
        assert_eq!(vfs.paths(), before);
        assert_consistent(&vfs);
    }

    #[rstest]
    fn move_notifies_both_parents_in_order(mut vfs: Vfs) {
        let mut receiver = vfs.subscribe();

        vfs.move_node("/home/user/Documents/readme.md", "/tmp/readme.md")
            .unwrap();

        assert_eq!(
            coalesce(&mut receiver),
            vec!["/home/user/Documents/", "/tmp/"]
        );
    }

    #[rstest]
    fn write_file_updates_content_size_and_notifies(mut vfs: Vfs) {
        let mut receiver = vfs.subscribe();

        vfs.write_file("/home/user/Documents/readme.md", "longer body")
            .unwrap();

        let node = vfs.get_node("/home/user/Documents/readme.md").unwrap();
        assert_eq!(node.borrow().content(), Some("longer body"));
        assert_eq!(node.borrow().metadata().size, 11);
        assert_eq!(coalesce(&mut receiver), vec!["/home/user/Documents/"]);
    }

    #[rstest]
    fn write_file_refuses_folders_and_missing_paths(mut vfs: Vfs) {
        assert!(vfs.write_file("/home/user/", "x").unwrap_err().is_wrong_type());
        assert!(vfs.write_file("/home/user/new.txt", "x").unwrap_err().is_not_found());
    }

    #[rstest]
    fn trash_round_trip_restores_content(mut vfs: Vfs) {
        let trashed = vfs.move_to_trash("/home/user/Desktop/x.txt").unwrap();
        assert_eq!(trashed, "/home/user/.Trash/x.txt");
        assert!(!vfs.exists("/home/user/Desktop/x.txt"));

        let restored = vfs.restore_from_trash("x.txt").unwrap();

        assert_eq!(restored, "/home/user/Desktop/x.txt");
        assert_eq!(vfs.read_file(&restored).as_deref(), Some("trash me"));
        assert_consistent(&vfs);
    }

    #[rstest]
    fn restore_returns_to_original_folder(mut vfs: Vfs) {
        vfs.move_to_trash("/home/user/Documents/drafts").unwrap();
        assert!(vfs.exists("/home/user/.Trash/drafts/draft.txt"));

        let restored = vfs.restore_from_trash("drafts").unwrap();

        assert_eq!(restored, "/home/user/Documents/drafts/");
        assert!(vfs.exists("/home/user/Documents/drafts/draft.txt"));
        assert_consistent(&vfs);
    }

    #[rstest]
    fn restore_falls_back_when_origin_is_gone(mut vfs: Vfs) {
        vfs.move_to_trash("/home/user/Documents/readme.md").unwrap();
        vfs.rm("/home/user/", "Documents").unwrap();

        let restored = vfs.restore_from_trash("readme.md").unwrap();

        assert_eq!(restored, "/home/user/Desktop/readme.md");
    }

    #[rstest]
    fn restore_unknown_name_fails(mut vfs: Vfs) {
        assert!(vfs.restore_from_trash("ghost").unwrap_err().is_not_found());
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("drafts/draft.txt")]
    fn restore_refuses_names_that_are_not_trash_children(mut vfs: Vfs, #[case] name: &str) {
        vfs.move_to_trash("/home/user/Documents/drafts").unwrap();
        vfs.rm("/home/user/", "Desktop").unwrap();
        let before = vfs.paths();

        assert!(matches!(
            vfs.restore_from_trash(name),
            Err(VfsError::InvalidName { .. })
        ));
        assert_eq!(vfs.paths(), before);
        assert!(vfs.is_folder("/home/user/.Trash/"));
        assert!(vfs.move_to_trash("/home/user/Documents/readme.md").is_ok());
    }

    #[rstest]
    fn move_onto_existing_destination_fails(mut vfs: Vfs) {
        vfs.touch("/etc/", "a").unwrap();
        vfs.touch("/tmp/", "a").unwrap();

        let error = vfs.move_node("/tmp/a", "/etc/a").unwrap_err();

        assert_eq!(error, VfsError::AlreadyExists { path: "/etc/a".into() });
        assert!(vfs.exists("/tmp/a"));
        assert_consistent(&vfs);
    }

    #[rstest]
    fn trash_refuses_name_clash(mut vfs: Vfs) {
        vfs.touch("/tmp/", "a").unwrap();
        vfs.touch("/etc/", "a").unwrap();
        vfs.move_to_trash("/tmp/a").unwrap();

        let error = vfs.move_to_trash("/etc/a").unwrap_err();

        assert_eq!(
            error,
            VfsError::AlreadyExists {
                path: "/home/user/.Trash/a".into()
            }
        );
        assert!(vfs.exists("/etc/a"));
        assert_eq!(vfs.restore_from_trash("a").unwrap(), "/tmp/a");
    }

    #[rstest]
    fn rename_in_trash_keeps_origin(mut vfs: Vfs) {
        vfs.move_to_trash("/home/user/Documents/readme.md").unwrap();
        vfs.rename("/home/user/.Trash/", "readme.md", "old-readme.md")
            .unwrap();

        let restored = vfs.restore_from_trash("old-readme.md").unwrap();

        assert_eq!(restored, "/home/user/Documents/old-readme.md");
        assert_consistent(&vfs);
    }

    #[rstest]
    #[case::removed("rm")]
    #[case::renamed("rename")]
    #[case::moved("move")]
    fn origins_are_forgotten_when_trash_folder_goes_away(mut vfs: Vfs, #[case] how: &str) {
        vfs.move_to_trash("/home/user/Documents/readme.md").unwrap();
        match how {
            "rm" => vfs.rm("/home/user/", ".Trash").unwrap(),
            "rename" => {
                vfs.rename("/home/user/", ".Trash", "old-trash").unwrap();
            }
            _ => {
                vfs.move_node("/home/user/", "/tmp/user/").unwrap();
                vfs.mkdir("/home/", "user").unwrap();
            }
        }
        vfs.mkdir("/home/user/", ".Trash").unwrap();
        vfs.mkdir("/home/user/", "Desktop").ok();
        vfs.touch("/etc/", "readme.md").unwrap();
        vfs.mkdir("/home/user/", "Documents").ok();

        vfs.move_node("/etc/readme.md", "/home/user/.Trash/readme.md")
            .unwrap();
        let restored = vfs.restore_from_trash("readme.md").unwrap();

        assert_eq!(restored, "/home/user/Desktop/readme.md");
        assert_consistent(&vfs);
    }

    #[rstest]
    fn patch_content_is_silent(mut vfs: Vfs) {
        let mut receiver = vfs.subscribe();
        let node = vfs.get_node("/home/user/Documents/readme.md").unwrap();
        let mtime = node.borrow().metadata().mtime;

        assert!(vfs.patch_content("/home/user/Documents/readme.md", "synced"));
        assert!(!vfs.patch_content("/home/user/Documents/", "nope"));
        assert!(!vfs.patch_content("/missing.txt", "nope"));

        assert_eq!(node.borrow().content(), Some("synced"));
        assert_eq!(node.borrow().metadata().size, 6);
        assert_eq!(node.borrow().metadata().mtime, mtime);
        assert!(coalesce(&mut receiver).is_empty());
    }

    #[rstest]
    fn failed_mutations_send_no_notifications(mut vfs: Vfs) {
        let mut receiver = vfs.subscribe();

        let _ = vfs.touch("/nope/", "a");
        let _ = vfs.rm("/tmp/", "ghost");
        let _ = vfs.move_node("/ghost", "/tmp/ghost");

        assert!(coalesce(&mut receiver).is_empty());
    }

    #[rstest]
    fn resolve_path_uses_layout_home() {
        let vfs = Vfs::init(VfsLayout::for_user("alice"), &SeedTree::new());
        assert_eq!(vfs.resolve_path("/tmp/", "~/Desktop/"), "/home/alice/Desktop/");
    }

    #[rstest]
    fn mixed_mutation_sequence_stays_consistent(mut vfs: Vfs) {
        vfs.mkdir("/home/user/", "a").unwrap();
        vfs.mkdir("/home/user/a/", "b").unwrap();
        vfs.touch("/home/user/a/b/", "c.txt").unwrap();
        vfs.rename("/home/user/", "a", "z").unwrap();
        vfs.move_node("/home/user/z/b/", "/tmp/b/").unwrap();
        vfs.touch("/tmp/b/", "d.txt").unwrap();
        vfs.move_to_trash("/home/user/z").unwrap();
        vfs.rm("/tmp/b/", "c.txt").unwrap();
        vfs.restore_from_trash("z").unwrap();

        assert!(vfs.exists("/tmp/b/d.txt"));
        assert!(vfs.is_folder("/home/user/z/"));
        assert_consistent(&vfs);
    }

    #[rstest]
    fn snapshots_mirror_the_index(vfs: Vfs) {
        let flat = vfs.flat_snapshot();
        assert_eq!(flat.len(), vfs.len());
        assert_eq!(
            flat["/home/user/Documents/readme.md"].content.as_deref(),
            Some("# Hello")
        );

        let tree = vfs.snapshot();
        assert_eq!(tree.kind, Some(NodeKind::Folder));
        assert!(tree.children.as_ref().unwrap().contains_key("home"));
    }
}
