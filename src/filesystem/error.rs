use snafu::Snafu;

/// Why a mutation was refused. The tree is never modified when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum VfsError {
    #[snafu(display("No such file or folder: {}", path))]
    NotFound { path: String },
    #[snafu(display("Not a folder: {}", path))]
    NotAFolder { path: String },
    #[snafu(display("Not a file: {}", path))]
    NotAFile { path: String },
    #[snafu(display("Already exists: {}", path))]
    AlreadyExists { path: String },
    #[snafu(display("Invalid name '{}'", name))]
    InvalidName { name: String },
    #[snafu(display("Cannot move {} into itself ({})", from, to))]
    MoveIntoSelf { from: String, to: String },
    #[snafu(display("The root folder cannot be moved or removed"))]
    RootImmutable,
}

impl VfsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, VfsError::NotFound { .. })
    }

    /// True for the "expected a folder, found a file" family of failures
    pub fn is_wrong_type(&self) -> bool {
        matches!(self, VfsError::NotAFolder { .. } | VfsError::NotAFile { .. })
    }
}
