//! Registry and resolution errors.

use egg_core::EggError;

/// Errors raised while resolving or fetching runtime dependencies.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Network or HTTP failure while fetching an image.
    #[error("E_FETCH: {url}: {cause}")]
    Fetch { url: String, cause: String },

    /// Body shorter or longer than the advertised `Content-Length`.
    #[error("E_TRUNCATED: {url}: expected {expected} bytes, got {got}")]
    Truncated { url: String, expected: u64, got: u64 },

    /// Downloaded bytes do not match the expected digest.
    #[error("E_CHECKSUM: {url}: expected {expected}, got {got}")]
    Checksum {
        url: String,
        expected: String,
        got: String,
    },

    /// Unusable registry configuration.
    #[error("E_CONFIG: {message}")]
    Config { message: String },

    /// Path, manifest or packaging failure from the core.
    #[error(transparent)]
    Core(#[from] EggError),
}

impl RegistryError {
    /// Stable machine-readable code identifying the error kind.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "E_FETCH",
            Self::Truncated { .. } => "E_TRUNCATED",
            Self::Checksum { .. } => "E_CHECKSUM",
            Self::Config { .. } => "E_CONFIG",
            Self::Core(inner) => inner.reason_code(),
        }
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
