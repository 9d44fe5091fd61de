use colored::Colorize;
use snafu::prelude::*;

use deskfs::filesystem::{NodeRef, Vfs, VfsError, path};

use crate::ext::SystemTimeExt;

/// Line-oriented front end over a `Vfs`, tracking a current directory.
///
/// Every path argument goes through the path resolver first. Failed commands leave the
/// filesystem untouched and report why.
pub struct Shell {
    vfs: Vfs,
    cwd: String,
}

impl Shell {
    pub fn new(vfs: Vfs) -> Self {
        let cwd = vfs.layout().home.clone();
        Self { vfs, cwd }
    }

    pub fn vfs(&self) -> &Vfs {
        &self.vfs
    }

    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    /// Runs one script line and returns the lines it prints
    pub fn run_line(&mut self, line: &str) -> Result<Vec<String>, ShellError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(Vec::new());
        }

        let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let args: Vec<&str> = rest.split_whitespace().collect();

        match (command, args.as_slice()) {
            ("pwd", []) => Ok(vec![self.cwd.clone()]),
            ("cd", [target]) => self.cd(target).map(|_| Vec::new()),
            ("ls", []) => self.ls(".", false),
            ("ls", ["-l"]) => self.ls(".", true),
            ("ls", [target]) => self.ls(target, false),
            ("ls", ["-l", target]) => self.ls(target, true),
            ("tree", []) => self.tree("."),
            ("tree", [target]) => self.tree(target),
            ("cat", [target]) => self.cat(target),
            ("mkdir", [target]) => self.create(target, true),
            ("touch", [target]) => self.create(target, false),
            ("rm", [target]) => self.rm(target),
            ("mv", [from, to]) => self.mv(from, to),
            ("rename", [target, new_name]) => self.rename(target, new_name),
            ("write", [target, ..]) => {
                let content = rest[target.len()..].trim_start().replace("\\n", "\n");
                self.write(target, content)
            }
            ("trash", [target]) => self.trash(target),
            ("restore", [name]) => self.restore(name),
            (
                "pwd" | "cd" | "ls" | "tree" | "cat" | "mkdir" | "touch" | "rm" | "mv" | "rename"
                | "write" | "trash" | "restore",
                _,
            ) => UsageSnafu {
                usage: usage_for(command),
            }
            .fail(),
            _ => UnknownCommandSnafu { command }.fail(),
        }
    }

    pub fn resolve(&self, input: &str) -> String {
        self.vfs.resolve_path(&self.cwd, input)
    }

    pub fn cd(&mut self, target: &str) -> Result<(), ShellError> {
        let dir = path::as_folder_path(&self.resolve(target));
        if !self.vfs.is_folder(&dir) {
            return Err(not_found(dir));
        }
        self.cwd = dir;
        Ok(())
    }

    pub fn ls(&self, target: &str, long: bool) -> Result<Vec<String>, ShellError> {
        let resolved = self.resolve(target);
        let dir = path::as_folder_path(&resolved);

        let Some(children) = self.vfs.get_children(&dir) else {
            // A file lists as itself
            return match self.vfs.get_node(&resolved) {
                Some(node) => Ok(vec![format_entry(path::basename(&resolved), &node, long)]),
                None => Err(not_found(resolved)),
            };
        };

        let mut entries: Vec<(&String, &NodeRef)> = children.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        Ok(entries
            .into_iter()
            .map(|(name, node)| format_entry(name, node, long))
            .collect())
    }

    pub fn tree(&self, target: &str) -> Result<Vec<String>, ShellError> {
        let dir = path::as_folder_path(&self.resolve(target));
        let node = self
            .vfs
            .get_node(&dir)
            .ok_or_else(|| not_found(dir.clone()))?;

        let mut lines = vec![paint_folder(&dir)];
        tree_lines(&node, 1, &mut lines);
        Ok(lines)
    }

    pub fn cat(&self, target: &str) -> Result<Vec<String>, ShellError> {
        let file = self.resolve(target);
        match self.vfs.read_file(&file) {
            Some(content) => Ok(content.lines().map(str::to_string).collect()),
            None if self.vfs.is_folder(&path::as_folder_path(&file)) => {
                Err(ShellError::FilesystemError {
                    source: VfsError::NotAFile { path: file },
                })
            }
            None => Err(not_found(file)),
        }
    }

    fn create(&mut self, target: &str, folder: bool) -> Result<Vec<String>, ShellError> {
        let (dir, name) = self.split(target)?;
        let created = if folder {
            self.vfs.mkdir(&dir, &name)
        } else {
            self.vfs.touch(&dir, &name)
        }
        .context(FilesystemSnafu)?;
        Ok(vec![created])
    }

    fn rm(&mut self, target: &str) -> Result<Vec<String>, ShellError> {
        let (dir, name) = self.split(target)?;
        self.vfs.rm(&dir, &name).context(FilesystemSnafu)?;
        Ok(Vec::new())
    }

    /// Moving onto an existing folder moves into it, like `mv` does
    fn mv(&mut self, from: &str, to: &str) -> Result<Vec<String>, ShellError> {
        let from = self.resolve(from);
        let to = self.resolve(to);
        let destination = if self.vfs.is_folder(&path::as_folder_path(&to)) {
            path::join(&to, path::basename(&from), false)
        } else {
            to
        };

        let moved = self
            .vfs
            .move_node(&from, &destination)
            .context(FilesystemSnafu)?;
        Ok(vec![moved])
    }

    fn rename(&mut self, target: &str, new_name: &str) -> Result<Vec<String>, ShellError> {
        let (dir, name) = self.split(target)?;
        let renamed = self
            .vfs
            .rename(&dir, &name, new_name)
            .context(FilesystemSnafu)?;
        Ok(vec![renamed])
    }

    fn write(&mut self, target: &str, content: String) -> Result<Vec<String>, ShellError> {
        let file = self.resolve(target);
        self.vfs.write_file(&file, content).context(FilesystemSnafu)?;
        Ok(Vec::new())
    }

    fn trash(&mut self, target: &str) -> Result<Vec<String>, ShellError> {
        let target = self.resolve(target);
        let trashed = self
            .vfs
            .move_to_trash(&target)
            .context(FilesystemSnafu)?;
        Ok(vec![trashed])
    }

    fn restore(&mut self, name: &str) -> Result<Vec<String>, ShellError> {
        let restored = self
            .vfs
            .restore_from_trash(name)
            .context(FilesystemSnafu)?;
        Ok(vec![restored])
    }

    fn split(&self, target: &str) -> Result<(String, String), ShellError> {
        let resolved = self.resolve(target);
        path::split_parent(&resolved).ok_or(ShellError::FilesystemError {
            source: VfsError::RootImmutable,
        })
    }
}

fn not_found(path: String) -> ShellError {
    ShellError::FilesystemError {
        source: VfsError::NotFound { path },
    }
}

fn usage_for(command: &str) -> &'static str {
    match command {
        "pwd" => "pwd",
        "cd" => "cd PATH",
        "ls" => "ls [-l] [PATH]",
        "tree" => "tree [PATH]",
        "cat" => "cat PATH",
        "mkdir" => "mkdir PATH",
        "touch" => "touch PATH",
        "rm" => "rm PATH",
        "mv" => "mv FROM TO",
        "rename" => "rename PATH NEW_NAME",
        "write" => "write PATH TEXT",
        "trash" => "trash PATH",
        _ => "restore NAME",
    }
}

fn paint_folder(name: &str) -> String {
    name.blue().bold().to_string()
}

fn format_entry(name: &str, node: &NodeRef, long: bool) -> String {
    let node = node.borrow();
    let display_name = if node.is_folder() {
        paint_folder(&path::as_folder_path(name))
    } else {
        name.to_string()
    };

    if !long {
        return display_name;
    }

    let metadata = node.metadata();
    format!(
        "{}{} {:8} {:>8} {:>10} {}",
        if node.is_folder() { "d" } else { "-" },
        metadata.permissions,
        metadata.owner,
        metadata.size,
        metadata.mtime.to_unix_seconds(),
        display_name
    )
}

fn tree_lines(node: &NodeRef, depth: usize, lines: &mut Vec<String>) {
    let node = node.borrow();
    let Some(children) = node.children() else {
        return;
    };

    let mut entries: Vec<(&String, &NodeRef)> = children.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    for (name, child) in entries {
        let indent = "  ".repeat(depth);
        if child.borrow().is_folder() {
            lines.push(format!("{indent}{}", paint_folder(&path::as_folder_path(name))));
            tree_lines(child, depth + 1, lines);
        } else {
            lines.push(format!("{indent}{name}"));
        }
    }
}

#[derive(Debug, Snafu)]
pub enum ShellError {
    #[snafu(display("{}", source))]
    FilesystemError { source: VfsError },
    #[snafu(display("Unknown command '{}'", command))]
    UnknownCommand { command: String },
    #[snafu(display("Usage: {}", usage))]
    UsageError { usage: &'static str },
}
