use thiserror::Error;

mod ids;
pub use ids::*;
mod selection;
pub use selection::*;
mod model;
pub use model::*;
mod commands;
pub use commands::*;
mod history;
pub use history::*;
pub mod edit_operations;
pub use edit_operations::adjusted_insertion_index;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SceneError {
    #[error("invalid operation: {0}")]
    InvalidOp(String),
    #[error("scene not found: {0}")]
    SceneNotFound(SceneId),
    #[error("movie not found: {0}")]
    MovieNotFound(MovieId),
    #[error("frame not found: {0}")]
    FrameNotFound(FrameId),
    #[error("scene already present: {0}")]
    SceneExists(SceneId),
    #[error("movie already present: {0}")]
    MovieExists(MovieId),
    #[error("frame already present: {0}")]
    FrameExists(FrameId),
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("selection invariant violated: {0}")]
    SelectionInvariant(String),
}
