use std::path::PathBuf;

use compio::fs;
use tracing::{debug, info, warn};

use super::store::Vfs;

/// Fills the content of pre-existing files from host assets after init.
///
/// Goes through `Vfs::patch_content`, so no structure changes and no notifications.
#[derive(Debug, Clone, Default)]
pub struct ContentSync {
    assets: Vec<(String, PathBuf)>,
}

impl ContentSync {
    pub fn new(assets: impl IntoIterator<Item = (String, PathBuf)>) -> Self {
        Self {
            assets: assets.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Patches every asset that can be read into its target file.
    /// Returns how many files were patched.
    pub async fn run(&self, vfs: &mut Vfs) -> usize {
        let mut patched = 0;

        for (target, source) in &self.assets {
            let bytes = match fs::read(source).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(
                        "Skipping content for {}: cannot read {}: {}",
                        target,
                        source.display(),
                        e
                    );
                    continue;
                }
            };
            debug!("Read {} bytes for {}", bytes.len(), target);

            let content = String::from_utf8_lossy(&bytes).into_owned();
            if vfs.patch_content(target, content) {
                patched += 1;
            }
        }

        info!("Content sync patched {} of {} files", patched, self.assets.len());
        patched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::{SeedEntry, SeedTree, VfsLayout};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn vfs_with_manual() -> Vfs {
        let home: SeedTree = [(
            "Documents".to_string(),
            SeedEntry::folder([("manual.md", SeedEntry::file(""))]),
        )]
        .into_iter()
        .collect();
        Vfs::init(VfsLayout::default(), &home)
    }

    #[compio::test]
    async fn sync_fills_existing_files() {
        let mut asset = NamedTempFile::new().expect("Failed to create temp file");
        write!(asset, "# Manual\nlong body").expect("Failed to write to temp file");
        let mut vfs = vfs_with_manual();
        let mut receiver = vfs.subscribe();

        let sync = ContentSync::new([(
            "/home/user/Documents/manual.md".to_string(),
            asset.path().to_path_buf(),
        )]);
        let patched = sync.run(&mut vfs).await;

        assert_eq!(patched, 1);
        assert_eq!(
            vfs.read_file("/home/user/Documents/manual.md").as_deref(),
            Some("# Manual\nlong body")
        );
        assert!(crate::filesystem::coalesce(&mut receiver).is_empty());
    }

    #[compio::test]
    async fn sync_skips_missing_assets_and_targets() {
        let asset = NamedTempFile::new().expect("Failed to create temp file");
        let mut vfs = vfs_with_manual();
        let before = vfs.paths();

        let sync = ContentSync::new([
            (
                "/home/user/Documents/manual.md".to_string(),
                PathBuf::from("/this/asset/does/not/exist.md"),
            ),
            (
                "/home/user/Documents/new.md".to_string(),
                asset.path().to_path_buf(),
            ),
            ("/home/user/".to_string(), asset.path().to_path_buf()),
        ]);
        let patched = sync.run(&mut vfs).await;

        assert_eq!(patched, 0);
        assert_eq!(vfs.paths(), before);
    }
}
