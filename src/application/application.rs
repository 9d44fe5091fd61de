use std::path::{Path, PathBuf};

use compio::fs;
use snafu::prelude::*;
use tracing::{debug, info};

use deskfs::config::{SEED_FILE_NAME, SeedConfig, SeedError};
use deskfs::offload::{OffloadError, OffloadWorker};

use crate::application::{RuntimeConfig, Shell, ShellError};
use crate::cli::Command;

pub struct Application;

impl Application {
    pub async fn run(runtime_config: impl Into<RuntimeConfig>) -> Result<(), ApplicationError> {
        let runtime_config: RuntimeConfig = runtime_config.into();
        let seed = Self::load_seed(runtime_config.seed.as_deref()).await?;
        debug!("Loaded seed for user '{}' with {} assets", seed.user, seed.assets.len());

        let mut vfs = seed.build();
        let content_sync = seed.content_sync();
        if !content_sync.is_empty() {
            let patched = content_sync.run(&mut vfs).await;
            info!("Patched {} files from assets", patched);
        }
        let mut shell = Shell::new(vfs);

        match runtime_config.command {
            Command::Ls { path, long } => {
                print_lines(shell.ls(path.as_deref().unwrap_or("."), long).context(ShellSnafu)?)
            }
            Command::Tree { path } => {
                print_lines(shell.tree(path.as_deref().unwrap_or("/")).context(ShellSnafu)?)
            }
            Command::Cat { path } => print_lines(shell.cat(&path).context(ShellSnafu)?),
            Command::Search { pattern } => {
                let worker = OffloadWorker::new().context(OffloadSnafu)?;
                let found = worker
                    .search(shell.vfs().flat_snapshot(), pattern)
                    .await
                    .context(OffloadSnafu)?;
                print_lines(found);
            }
            Command::Validate => {
                let worker = OffloadWorker::new().context(OffloadSnafu)?;
                let report = worker
                    .validate(shell.vfs().flat_snapshot())
                    .await
                    .context(OffloadSnafu)?;

                let mut errors = report.errors;
                errors.extend(shell.vfs().check_consistency());
                if !errors.is_empty() {
                    print_lines(errors.iter().cloned());
                    return ValidationFailedSnafu { count: errors.len() }.fail();
                }
                println!("{} nodes, no problems found", shell.vfs().len());
            }
            Command::Script { file } => Self::run_script(&mut shell, &file).await?,
        }

        Ok(())
    }

    async fn load_seed(path: Option<&Path>) -> Result<SeedConfig, ApplicationError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(SEED_FILE_NAME);
                if !default.exists() {
                    debug!("No {} found, using an empty home", SEED_FILE_NAME);
                    return Ok(SeedConfig::default());
                }
                default
            }
        };
        SeedConfig::read(&path).await.context(SeedSnafu)
    }

    async fn run_script(shell: &mut Shell, file: &Path) -> Result<(), ApplicationError> {
        let bytes = fs::read(file).await.context(ScriptReadSnafu {
            file_path: file.display().to_string(),
        })?;
        let script = String::from_utf8_lossy(&bytes);

        let mut failures = 0;
        for (number, line) in script.lines().enumerate() {
            match shell.run_line(line) {
                Ok(output) => print_lines(output),
                Err(e) => {
                    failures += 1;
                    eprintln!("{}:{}: {}", file.display(), number + 1, e);
                }
            }
        }
        debug!("Script finished with {} failed lines", failures);
        Ok(())
    }
}

fn print_lines(lines: impl IntoIterator<Item = String>) {
    for line in lines {
        println!("{line}");
    }
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Critical failure encountered while loading the seed"))]
    SeedError { source: SeedError },
    #[snafu(display("Critical failure encountered in the offload worker"))]
    OffloadError { source: OffloadError },
    #[snafu(display("Failed to read the script file: {}", file_path))]
    ScriptReadError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("Command failed"))]
    ShellError { source: ShellError },
    #[snafu(display("Validation found {} problems", count))]
    ValidationFailed { count: usize },
}
