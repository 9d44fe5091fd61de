use super::path;

pub const DEFAULT_USER: &str = "user";

/// System directories created on every init, before the home directory is seeded
pub const SYSTEM_SKELETON: &[&str] = &[
    "/bin/",
    "/etc/",
    "/home/",
    "/tmp/",
    "/usr/",
    "/usr/bin/",
    "/usr/share/",
    "/var/",
    "/var/log/",
    "/network/",
];

/// Well-known locations collaborators rely on. All paths are canonical folder paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VfsLayout {
    pub owner: String,
    pub home: String,
    pub desktop: String,
    pub trash: String,
    pub network: String,
    /// Where trashed items go back to when their original folder is unknown or gone
    pub restore_dir: String,
}

impl VfsLayout {
    pub fn for_user(user: impl Into<String>) -> Self {
        let owner = user.into();
        let home = path::join("/home/", &owner, true);
        let desktop = path::join(&home, "Desktop", true);

        Self {
            trash: path::join(&home, ".Trash", true),
            network: "/network/".to_string(),
            restore_dir: desktop.clone(),
            desktop,
            home,
            owner,
        }
    }
}

impl Default for VfsLayout {
    fn default() -> Self {
        Self::for_user(DEFAULT_USER)
    }
}
