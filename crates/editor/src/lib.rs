use thiserror::Error;

use jobs::{DecodeError, GateError};
use project::ProjectError;
use scenes::SceneError;

mod config;
pub use config::*;
mod log;
pub use log::*;
mod renderer;
pub use renderer::*;
pub mod broadcast;
pub use broadcast::{NotificationGate, PageKind, PageView, SelectionBroadcaster, ViewId};
mod session;
pub use session::*;
mod pasteboard;
pub use pasteboard::*;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("no project is open")]
    NoActiveProject,
    #[error("{0} cannot be dragged")]
    NotDraggable(String),
    #[error("bad pasteboard payload: {0}")]
    Payload(#[from] serde_json::Error),
}
