//! Assembly-tree collaborator: the label + include index-file DSL

pub mod file;
pub mod token;

pub use file::{AsmFile, IncludeFile, IncludeKind, Width};
