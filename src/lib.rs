pub mod boundary;
pub mod cli;
pub mod config;
pub mod docs;
pub mod domain;
pub mod environment;
pub mod error;
pub mod git;
pub mod inputs;
pub mod package;
pub mod resolver;
pub mod runner;
pub mod tagging;
pub mod ui;

pub use error::{ReleaseError, Result};
