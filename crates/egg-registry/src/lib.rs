//! Runtime dependency resolution for egg manifests.
//!
//! Resolves a manifest's ordered `dependencies` list into local files and
//! registry image references. Image blobs are fetched over HTTP GET from a
//! configured registry base, streamed to a temp sibling while hashing, and
//! renamed into place only after length and checksum checks pass.
//!
//! # Configuration
//!
//! | Environment variable | Effect |
//! |---------------------|--------|
//! | `EGG_REGISTRY_URL` | Registry base URL |
//! | `EGG_DOWNLOAD_TIMEOUT` | Fetch timeout in seconds (float, default 30) |
//!
//! A base URL may also come from the single-line `~/.egg/registry` file.
//! Without either, image references stay unresolved and are not packaged.

pub mod config;
pub mod error;
pub mod fetch;
pub mod resolver;

pub use config::RegistryConfig;
pub use error::{RegistryError, RegistryResult};
pub use fetch::{download_image, image_url, DownloadReport};
pub use resolver::RuntimeResolver;
