//! Domain logic - pure release rules independent of git and subprocesses

pub mod tag;
pub mod version;

pub use tag::{TagOrder, TagPattern};
pub use version::{BumpLevel, Version};
