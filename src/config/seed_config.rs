use std::borrow::Cow;
use std::path::{Path, PathBuf};

use compio::fs;
use hashlink::LinkedHashMap;
use saphyr::{LoadableYamlNode, Scalar, Yaml};
use snafu::prelude::*;
use tracing::{debug, warn};

use crate::filesystem::{ContentSync, DEFAULT_USER, SeedEntry, SeedTree, Vfs, VfsLayout};

pub const SEED_FILE_NAME: &str = "deskfs.yaml";

fn key(name: &'static str) -> Yaml<'static> {
    Yaml::Value(Scalar::String(Cow::Borrowed(name)))
}

/// Externally supplied description of the user's home directory and its late-loaded assets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedConfig {
    pub user: String,
    pub home: SeedTree,
    /// VFS file path -> host file whose content is patched in after init
    pub assets: Vec<(String, PathBuf)>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            user: DEFAULT_USER.to_string(),
            home: SeedTree::new(),
            assets: Vec::new(),
        }
    }
}

impl SeedConfig {
    /// Reads a seed file. Relative asset paths are taken relative to the seed file.
    pub async fn read(path: &Path) -> Result<Self, SeedError> {
        debug!("Opening seed file: {}", path.display());
        let bytes = fs::read(path).await.context(ReadSnafu {
            file_path: path.display().to_string(),
        })?;
        debug!("Successfully read seed file: {} bytes", bytes.len());

        let contents = String::from_utf8_lossy(&bytes);
        let mut config = Self::try_from(&*contents)?;

        if let Some(base) = path.parent() {
            for (_, source) in config.assets.iter_mut() {
                if source.is_relative() {
                    *source = base.join(&*source);
                }
            }
        }
        Ok(config)
    }

    pub fn layout(&self) -> VfsLayout {
        VfsLayout::for_user(&self.user)
    }

    /// Initializes a filesystem from this seed
    pub fn build(&self) -> Vfs {
        Vfs::init(self.layout(), &self.home)
    }

    pub fn content_sync(&self) -> ContentSync {
        ContentSync::new(self.assets.iter().cloned())
    }

    fn parse_tree(mapping: &LinkedHashMap<Yaml, Yaml>, location: &str) -> SeedTree {
        mapping
            .iter()
            .filter_map(|(key, value)| {
                let Yaml::Value(Scalar::String(name)) = key else {
                    warn!("Skipping seed entry with non-string name in {}: {:?}", location, key);
                    return None;
                };

                let entry = match value {
                    Yaml::Value(Scalar::String(content)) => SeedEntry::file(content.to_string()),
                    Yaml::Value(Scalar::Null) => SeedEntry::file(""),
                    Yaml::Mapping(children) => {
                        let child_location = format!("{location}{name}/");
                        SeedEntry::Folder(Self::parse_tree(children, &child_location))
                    }
                    other => {
                        warn!("Skipping seed entry {}{} with unsupported value: {:?}", location, name, other);
                        return None;
                    }
                };
                Some((name.to_string(), entry))
            })
            .collect()
    }

    fn parse_assets(
        mapping: &LinkedHashMap<Yaml, Yaml>,
    ) -> Vec<(String, PathBuf)> {
        mapping
            .iter()
            .filter_map(|(target, source)| match (target.as_str(), source.as_str()) {
                (Some(target), Some(source)) => Some((target.to_string(), PathBuf::from(source))),
                _ => {
                    warn!("Skipping invalid asset entry: {:?}", target);
                    None
                }
            })
            .collect()
    }
}

impl TryFrom<&str> for SeedConfig {
    type Error = SeedError;

    fn try_from(contents: &str) -> Result<Self, Self::Error> {
        let documents = Yaml::load_from_str(contents).context(ParseSnafu)?;
        let document = documents.first().context(MalformedSeedSnafu)?;
        let top_level = document.as_mapping().context(TopLevelNotMapSnafu)?;

        let user = match top_level.get(&key("user")) {
            None => DEFAULT_USER.to_string(),
            Some(user) => user.as_str().context(UserNotStringSnafu)?.to_string(),
        };

        let home = match top_level.get(&key("home")) {
            None => SeedTree::new(),
            Some(Yaml::Value(Scalar::Null)) => SeedTree::new(),
            Some(home) => {
                let mapping = home.as_mapping().context(HomeNotMapSnafu)?;
                Self::parse_tree(mapping, &VfsLayout::for_user(&user).home)
            }
        };

        let assets = match top_level.get(&key("assets")) {
            None => Vec::new(),
            Some(assets) => Self::parse_assets(assets.as_mapping().context(AssetsNotMapSnafu)?),
        };

        Ok(SeedConfig { user, home, assets })
    }
}

#[derive(Debug, Snafu)]
pub enum SeedError {
    #[snafu(display("Failed to read the seed file: {}", file_path))]
    ReadError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("Failed to parse the seed file"))]
    ParseError { source: saphyr::ScanError },
    #[snafu(display("Improperly formatted seed file"))]
    MalformedSeed,
    #[snafu(display("Top level of the seed file should be a map"))]
    TopLevelNotMap,
    #[snafu(display("The user entry should be a string"))]
    UserNotString,
    #[snafu(display("Home section should be a map"))]
    HomeNotMap,
    #[snafu(display("Assets section should be a map"))]
    AssetsNotMap,
}
