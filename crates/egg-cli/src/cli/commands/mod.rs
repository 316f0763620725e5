mod dispatch;

pub(crate) mod build;
pub(crate) mod clean;
pub(crate) mod hatch;
pub(crate) mod info;
pub(crate) mod languages;
pub(crate) mod verify;

pub use dispatch::dispatch;
