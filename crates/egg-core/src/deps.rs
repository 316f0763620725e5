//! Resolved runtime dependency kinds.

use std::path::PathBuf;

/// A manifest dependency after resolution.
///
/// The two kinds are distinguished syntactically in the manifest: entries
/// containing `:` are image references, everything else is a local path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeDep {
    /// An existing file confined to the manifest directory, ready to be
    /// packaged under `runtime/<basename>`.
    Local(PathBuf),
    /// A `<repo>:<tag>` image reference left unresolved because no registry
    /// is configured. Unresolved references are not packaged.
    Image {
        repo: String,
        tag: String,
        raw: String,
    },
}

impl RuntimeDep {
    /// Local file path, when this dependency resolved to one.
    pub fn local_path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Local(path) => Some(path),
            Self::Image { .. } => None,
        }
    }
}
