use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use scenes::edit_operations::SceneHistory;
use scenes::{FormatTag, SceneList};

use crate::ProjectError;

/// Raw bytes of a project that has not been decoded yet
#[derive(Debug, Clone, PartialEq)]
pub struct LazySource {
    pub format: FormatTag,
    pub bytes: Arc<[u8]>,
}

impl LazySource {
    pub fn new(format: FormatTag, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            format,
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A decoded project together with its own undo history
#[derive(Debug, Clone)]
pub struct LoadedProject {
    pub scene_list: SceneList,
    pub history: SceneHistory,
}

impl LoadedProject {
    pub fn new(scene_list: SceneList, undo_limit: Option<usize>) -> Self {
        let mut history = SceneHistory::new();
        history.set_limit(undo_limit);
        Self {
            scene_list,
            history,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LazyStatus {
    Loading,
    Loaded,
    Lazy,
    Error,
}

impl fmt::Display for LazyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LazyStatus::Loading => "loading",
            LazyStatus::Loaded => "loaded",
            LazyStatus::Lazy => "lazy",
            LazyStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Payload of a project node.
///
/// `Lazy -> Loading` on first access, `Loading -> Loaded | Error` when the
/// decode finishes, `Error -> Loading` on retry when the bytes are still
/// known. `Loaded` stays loaded for the rest of the session.
#[derive(Debug, Clone)]
pub enum LazyProject {
    Loading { source: Option<LazySource> },
    Loaded(Box<LoadedProject>),
    Lazy(LazySource),
    Error {
        reason: String,
        source: Option<LazySource>,
    },
}

impl LazyProject {
    /// Placeholder for content that is being produced elsewhere
    pub fn placeholder() -> Self {
        LazyProject::Loading { source: None }
    }

    pub fn loaded(scene_list: SceneList, undo_limit: Option<usize>) -> Self {
        LazyProject::Loaded(Box::new(LoadedProject::new(scene_list, undo_limit)))
    }

    pub fn status(&self) -> LazyStatus {
        match self {
            LazyProject::Loading { .. } => LazyStatus::Loading,
            LazyProject::Loaded(_) => LazyStatus::Loaded,
            LazyProject::Lazy(_) => LazyStatus::Lazy,
            LazyProject::Error { .. } => LazyStatus::Error,
        }
    }

    pub fn scene_list(&self) -> Option<&SceneList> {
        match self {
            LazyProject::Loaded(project) => Some(&project.scene_list),
            _ => None,
        }
    }

    pub fn loaded_mut(&mut self) -> Option<&mut LoadedProject> {
        match self {
            LazyProject::Loaded(project) => Some(project),
            _ => None,
        }
    }

    pub fn error_reason(&self) -> Option<&str> {
        match self {
            LazyProject::Error { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Bytes behind a lazy or failed payload
    pub fn source(&self) -> Option<&LazySource> {
        match self {
            LazyProject::Lazy(source) => Some(source),
            LazyProject::Loading { source } | LazyProject::Error { source, .. } => source.as_ref(),
            LazyProject::Loaded(_) => None,
        }
    }

    /// `Lazy -> Loading` or a retry `Error -> Loading`. Hands out the bytes to
    /// decode.
    pub fn begin_loading(&mut self) -> Result<LazySource, ProjectError> {
        let source = match self {
            LazyProject::Lazy(source) => source.clone(),
            LazyProject::Error {
                source: Some(source),
                ..
            } => source.clone(),
            other => {
                return Err(ProjectError::InvalidTransition {
                    from: other.status(),
                    to: LazyStatus::Loading,
                })
            }
        };
        *self = LazyProject::Loading {
            source: Some(source.clone()),
        };
        Ok(source)
    }

    pub fn complete(
        &mut self,
        scene_list: SceneList,
        undo_limit: Option<usize>,
    ) -> Result<(), ProjectError> {
        if self.status() != LazyStatus::Loading {
            return Err(ProjectError::InvalidTransition {
                from: self.status(),
                to: LazyStatus::Loaded,
            });
        }
        *self = LazyProject::loaded(scene_list, undo_limit);
        Ok(())
    }

    /// `Loading -> Error`, keeping the bytes so the decode can be retried
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), ProjectError> {
        match self {
            LazyProject::Loading { source } => {
                let source = source.take();
                *self = LazyProject::Error {
                    reason: reason.into(),
                    source,
                };
                Ok(())
            }
            other => Err(ProjectError::InvalidTransition {
                from: other.status(),
                to: LazyStatus::Error,
            }),
        }
    }
}

/// Shared flag a background decode checks before and after it runs; the
/// interactive side checks it again before applying a completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl PartialEq for CancellationToken {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
