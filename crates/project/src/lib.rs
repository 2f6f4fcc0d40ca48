use std::path::PathBuf;
use thiserror::Error;

use scenes::SceneError;

mod lazy;
pub use lazy::*;
mod tree;
pub use tree::*;
mod commands;
pub use commands::{apply_command, TreeCommand};
pub mod edit_operations;
mod library;
pub use library::*;

pub fn app_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(std::env::temp_dir);
    base.join("structure_editor")
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProjectError {
    #[error("invalid operation: {0}")]
    InvalidOp(String),
    #[error("project node not found: {0}")]
    NodeNotFound(ProjectNodeId),
    #[error("project node already present: {0}")]
    NodeExists(ProjectNodeId),
    #[error("the root group cannot be changed")]
    RootImmutable,
    #[error("node {0} is not a group")]
    NotAGroup(ProjectNodeId),
    #[error("cannot move {node} into its own descendant {target}")]
    IntoDescendant {
        node: ProjectNodeId,
        target: ProjectNodeId,
    },
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("{0} is not editable")]
    NotEditable(String),
    #[error("{0} is still loading and cannot be copied")]
    NotCopyable(String),
    #[error("cannot go from {from} to {to}")]
    InvalidTransition { from: LazyStatus, to: LazyStatus },
    #[error(transparent)]
    Scene(#[from] SceneError),
}
