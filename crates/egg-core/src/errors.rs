//! Error taxonomy for the egg pipelines.
//!
//! Every failure a pipeline can surface maps to one variant with a stable
//! machine-readable `E_*` reason code. The code leads the display form, so a
//! failing CLI run prints a single line beginning with the kind and carrying
//! the most specific context available.

use std::path::PathBuf;

/// Errors raised by the packaging, verification and execution pipelines.
#[derive(Debug, thiserror::Error)]
pub enum EggError {
    /// Path normalization or containment failure.
    #[error("E_PATH: {path}: {reason}")]
    Path { path: String, reason: String },

    /// Archive entry name failed the safety scan.
    #[error("E_UNSAFE_PATH: unsafe archive entry: {entry}")]
    UnsafePath { entry: String },

    /// Manifest schema or type violation.
    #[error("E_MANIFEST: {field}: {reason}")]
    Manifest { field: String, reason: String },

    /// A referenced source or dependency file does not exist.
    #[error("E_MISSING_SOURCE: file not found: {path} (referenced from {manifest})")]
    MissingSource { path: PathBuf, manifest: PathBuf },

    /// Two dependencies collide (exact duplicate or same packaged name).
    #[error("E_DUP_DEP: duplicate dependency: {name}")]
    DuplicateDependency { name: String },

    /// An entry listed in the hash index is absent from the archive.
    #[error("E_MISSING_ENTRY: listed entry absent from archive: {entry}")]
    MissingEntry { entry: String },

    /// The archive carries no usable hash index or signature.
    #[error("E_UNSIGNED: {archive}: {reason}")]
    Unsigned { archive: PathBuf, reason: String },

    /// Ed25519 signature rejected, or verify-key material unusable.
    #[error("E_SIGNATURE: {reason}")]
    Signature { reason: String },

    /// The hash index is structurally invalid.
    #[error("E_HASH_INDEX: {reason}")]
    HashIndex { reason: String },

    /// An archive entry's bytes do not match its recorded digest.
    #[error("E_DIGEST: {entry}: expected {expected}, observed {observed}")]
    Digest {
        entry: String,
        expected: String,
        observed: String,
    },

    /// Archive contents and hash index are not the same set.
    #[error(
        "E_CLOSURE: archive diverges from hash index (extra: [{}]; missing: [{}])",
        .extra.join(", "),
        .missing.join(", ")
    )]
    Closure {
        extra: Vec<String>,
        missing: Vec<String>,
    },

    /// No command is registered for a cell's language.
    #[error("E_UNSUPPORTED_LANG: unsupported language: {language}")]
    UnsupportedLanguage { language: String },

    /// The runtime binary for a language is not on `PATH`.
    #[error("E_RUNTIME_MISSING: required runtime '{binary}' for {language} cells not found")]
    RuntimeMissing { binary: String, language: String },

    /// A cell process failed to spawn, exited non-zero or timed out.
    #[error("E_CELL_EXEC: {path}: {reason}")]
    CellExec { path: PathBuf, reason: String },

    /// Sandbox planning is not possible on this platform.
    #[error("E_PLATFORM: unsupported platform: {os}")]
    Platform { os: String },

    /// Output already exists and overwrite was not requested.
    #[error("E_EXISTS: {path} already exists (use --force to overwrite)")]
    Exists { path: PathBuf },

    /// Underlying I/O failure with the path it happened on.
    #[error("E_IO: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EggError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable machine-readable code identifying the error kind.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Path { .. } => "E_PATH",
            Self::UnsafePath { .. } => "E_UNSAFE_PATH",
            Self::Manifest { .. } => "E_MANIFEST",
            Self::MissingSource { .. } => "E_MISSING_SOURCE",
            Self::DuplicateDependency { .. } => "E_DUP_DEP",
            Self::MissingEntry { .. } => "E_MISSING_ENTRY",
            Self::Unsigned { .. } => "E_UNSIGNED",
            Self::Signature { .. } => "E_SIGNATURE",
            Self::HashIndex { .. } => "E_HASH_INDEX",
            Self::Digest { .. } => "E_DIGEST",
            Self::Closure { .. } => "E_CLOSURE",
            Self::UnsupportedLanguage { .. } => "E_UNSUPPORTED_LANG",
            Self::RuntimeMissing { .. } => "E_RUNTIME_MISSING",
            Self::CellExec { .. } => "E_CELL_EXEC",
            Self::Platform { .. } => "E_PLATFORM",
            Self::Exists { .. } => "E_EXISTS",
            Self::Io { .. } => "E_IO",
        }
    }
}

/// Result type for the egg core pipelines.
pub type EggResult<T> = Result<T, EggError>;
