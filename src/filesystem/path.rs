//! Canonical path handling.
//!
//! Canonical paths are absolute. Folder paths end with `/`, file paths never do,
//! and the root is `/`.

pub const SEPARATOR: char = '/';
pub const ROOT: &str = "/";

/// Turns `input` into a canonical absolute path, relative to `cwd`.
///
/// A leading `~` is replaced with `home`. `.` segments are dropped and `..` pops the
/// previous segment, never climbing above the root. The result keeps a trailing
/// separator only when the (home-expanded) input had one.
pub fn resolve(cwd: &str, input: &str, home: &str) -> String {
    let expanded = match input.strip_prefix('~') {
        Some(rest) => format!("{home}{rest}"),
        None => input.to_string(),
    };

    let absolute = if expanded.starts_with(SEPARATOR) {
        expanded.clone()
    } else if cwd.ends_with(SEPARATOR) {
        format!("{cwd}{expanded}")
    } else {
        format!("{cwd}{SEPARATOR}{expanded}")
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in absolute.split(SEPARATOR).filter(|s| !s.is_empty()) {
        match segment {
            "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut resolved = format!("{ROOT}{}", segments.join("/"));
    if expanded.ends_with(SEPARATOR) && !segments.is_empty() {
        resolved.push(SEPARATOR);
    }
    resolved
}

/// Joins a canonical folder path and a child name into the child's canonical path.
pub fn join(dir: &str, name: &str, is_folder: bool) -> String {
    let mut path = as_folder_path(dir);
    path.push_str(name);
    if is_folder {
        path.push(SEPARATOR);
    }
    path
}

/// Splits a path into its parent folder path and its final segment.
///
/// Returns `None` for the root, which has no parent.
pub fn split_parent(path: &str) -> Option<(String, String)> {
    let trimmed = path.trim_end_matches(SEPARATOR);
    if trimmed.is_empty() {
        return None;
    }

    match trimmed.rfind(SEPARATOR) {
        Some(index) => Some((
            trimmed[..=index].to_string(),
            trimmed[index + 1..].to_string(),
        )),
        None => Some((ROOT.to_string(), trimmed.to_string())),
    }
}

/// The final segment of a path, without any trailing separator.
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches(SEPARATOR);
    match trimmed.rfind(SEPARATOR) {
        Some(index) => &trimmed[index + 1..],
        None => trimmed,
    }
}

/// Ensures a folder path carries its trailing separator.
pub fn as_folder_path(path: &str) -> String {
    if path.ends_with(SEPARATOR) {
        path.to_string()
    } else {
        format!("{path}{SEPARATOR}")
    }
}

pub fn is_folder_path(path: &str) -> bool {
    path.ends_with(SEPARATOR)
}

/// A usable child name: non-empty, no separator, not a relative marker.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(SEPARATOR) && name != "." && name != ".."
}
