//! Trust and packaging core for egg archives.
//!
//! An *egg* is a signed, content-verified ZIP archive packaging a
//! multi-language notebook: a manifest, the referenced source cells and any
//! packaged runtime dependencies. This crate implements the build and trust
//! pipeline:
//!
//! - path normalization and confinement ([`pathguard`])
//! - streaming SHA-256 digests with constant-time comparison ([`digest`])
//! - Ed25519 key derivation, signing and verification ([`signer`])
//! - closed-schema manifest loading ([`manifest`])
//! - the per-archive digest map ([`hashindex`])
//! - deterministic archive composition ([`composer`])
//! - fail-closed archive verification ([`verifier`])
//! - content-addressed precomputation of cell outputs ([`precompute`])
//! - per-language sandbox image planning ([`sandbox`])
//!
//! Registry-backed dependency resolution lives in the `egg-registry` crate;
//! the CLI pipelines in `egg-cli`.

pub mod chunker;
pub mod composer;
pub mod deps;
pub mod digest;
pub mod errors;
pub mod hashindex;
pub mod lang;
pub mod manifest;
pub mod pathguard;
pub mod precompute;
pub mod sandbox;
pub mod signer;
pub mod verifier;

pub use deps::RuntimeDep;
pub use errors::{EggError, EggResult};
pub use hashindex::HashIndex;
pub use lang::LanguageTable;
pub use manifest::{Cell, Manifest};
