//! Drag-and-drop and copy/paste at every level of the tree.
//!
//! Internal drops move the dragged items (same-parent moves go through
//! `adjusted_insertion_index`). Everything else inserts copies under fresh
//! identities. Project copies arrive as placeholders and are decoded on the
//! drag-and-drop or copy/paste workers.
use serde::{Deserialize, Serialize};

use jobs::{encode_native, DecodeRequest, Domain, Sequence};
use project::edit_operations as tree_ops;
use project::{
    CancellationToken, DetachedSubtree, LazyProject, LazySource, NodePayload, ProjectNode,
    ProjectNodeId,
};
use scenes::edit_operations::{self as scene_ops, MovieDestination};
use scenes::{FormatTag, Frame, FrameId, Movie, MovieId, Scene, SceneError, SceneId};

use crate::{EditingSession, EditorError, Renderer};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArchivedContent {
    Group { children: Vec<ArchivedNode> },
    /// Decoded as soon as it lands
    Project { format: FormatTag, bytes: Vec<u8> },
    /// Stays undecoded until first opened
    Lazy { format: FormatTag, bytes: Vec<u8> },
}

/// Self-contained copy of a project node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArchivedNode {
    pub name: String,
    pub content: ArchivedContent,
}

impl ArchivedNode {
    pub fn project(name: impl Into<String>, format: FormatTag, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content: ArchivedContent::Project { format, bytes },
        }
    }

    pub fn group(name: impl Into<String>, children: Vec<ArchivedNode>) -> Self {
        Self {
            name: name.into(),
            content: ArchivedContent::Group { children },
        }
    }
}

/// What a drag starts from
#[derive(Debug, Clone, PartialEq)]
pub enum DragItems {
    Nodes(Vec<ProjectNodeId>),
    Scenes(Vec<SceneId>),
    Movies(Vec<MovieId>),
    Frames(Vec<FrameId>),
}

/// Pasteboard content. Carries the dragged ids for internal moves and full
/// copies for everything else.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DragPayload {
    Nodes {
        ids: Vec<ProjectNodeId>,
        archives: Vec<ArchivedNode>,
    },
    Scenes {
        project: Option<ProjectNodeId>,
        ids: Vec<SceneId>,
        scenes: Vec<Scene>,
    },
    Movies {
        project: Option<ProjectNodeId>,
        ids: Vec<MovieId>,
        movies: Vec<Movie>,
    },
    Frames {
        project: Option<ProjectNodeId>,
        ids: Vec<FrameId>,
        frames: Vec<Frame>,
    },
}

impl DragPayload {
    /// Files or archives coming from outside the session
    pub fn external(archives: Vec<ArchivedNode>) -> Self {
        DragPayload::Nodes {
            ids: Vec::new(),
            archives,
        }
    }

    pub fn to_json(&self) -> Result<String, EditorError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, EditorError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Gap a drop lands in
#[derive(Debug, Clone, PartialEq)]
pub enum DropTarget {
    Node { parent: ProjectNodeId, index: usize },
    Scenes { index: usize },
    Movies { scene: SceneId, index: usize },
    /// Movies go into a new scene created at `index`
    NewScene { index: usize },
    Frames { movie: MovieId, index: usize },
}

/// Copies start out with their first item selected at every level
fn fresh_movie(movie: Movie) -> Movie {
    let mut movie = movie.with_fresh_ids();
    if movie.selection.is_empty() {
        movie.select_frame_at(0);
    }
    movie
}

fn fresh_scene(scene: Scene) -> Scene {
    let mut scene = scene.with_fresh_ids();
    for movie in &mut scene.movies {
        if movie.selection.is_empty() {
            movie.select_frame_at(0);
        }
    }
    if scene.selection.is_empty() {
        if let Some(first) = scene.movies.first().map(|m| m.id) {
            scene.selection.select_only(first);
        }
    }
    scene
}

fn build_subtree(archive: ArchivedNode, requests: &mut Vec<DecodeRequest>) -> DetachedSubtree {
    let ArchivedNode { name, content } = archive;
    match content {
        ArchivedContent::Group { children } => {
            let mut node = ProjectNode::group(name);
            node.is_edited = true;
            let children = children
                .into_iter()
                .map(|child| build_subtree(child, requests))
                .collect();
            DetachedSubtree::with_children(node, children)
        }
        ArchivedContent::Lazy { format, bytes } => {
            let mut node = ProjectNode::project(
                name,
                LazyProject::Lazy(LazySource::new(format, bytes)),
            );
            node.is_edited = true;
            DetachedSubtree::single(node)
        }
        ArchivedContent::Project { format, bytes } => {
            let source = LazySource::new(format, bytes);
            let token = CancellationToken::new();
            let mut node = ProjectNode::placeholder(name.clone(), token.clone());
            // keep the bytes so a failed decode can be retried
            node.payload = NodePayload::Project(LazyProject::Loading {
                source: Some(source.clone()),
            });
            node.is_edited = true;
            requests.push(DecodeRequest {
                target: node.id,
                name,
                source,
                token,
            });
            DetachedSubtree::single(node)
        }
    }
}

impl<R: Renderer> EditingSession<R> {
    /// Root, disabled and still-loading nodes cannot be dragged
    pub fn is_draggable(&self, id: ProjectNodeId) -> bool {
        id != self.tree.root()
            && self
                .tree
                .node(id)
                .is_some_and(|n| n.is_enabled && !n.is_loading())
    }

    /// Menu validation for starting a drag from the project browser
    pub fn can_begin_drag(&self, ids: &[ProjectNodeId]) -> bool {
        !ids.is_empty()
            && self.gate().is_idle(Domain::DragAndDrop)
            && ids.iter().all(|id| self.is_draggable(*id))
    }

    /// Menu validation for paste
    pub fn can_paste(&self, target: &DropTarget) -> bool {
        let Some(payload) = &self.clipboard else {
            return false;
        };
        if !self.gate().is_idle(Domain::CopyPaste) {
            return false;
        }
        match (payload, target) {
            (DragPayload::Nodes { .. }, DropTarget::Node { parent, .. }) => {
                tree_ops::check_insertion_target(&self.tree, *parent).is_ok()
            }
            (DragPayload::Scenes { .. }, DropTarget::Scenes { .. })
            | (DragPayload::Movies { .. }, DropTarget::Movies { .. })
            | (DragPayload::Movies { .. }, DropTarget::NewScene { .. })
            | (DragPayload::Frames { .. }, DropTarget::Frames { .. }) => self.scene_list().is_some(),
            _ => false,
        }
    }

    pub fn make_drag_payload(&self, items: &DragItems) -> Result<DragPayload, EditorError> {
        let project = self.active_project();
        match items {
            DragItems::Nodes(ids) => {
                let roots = self.tree.find_local_roots(ids);
                let archives = roots
                    .iter()
                    .map(|id| self.archive_node(*id))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(DragPayload::Nodes {
                    ids: roots,
                    archives,
                })
            }
            DragItems::Scenes(ids) => {
                let list = self.scene_list().ok_or(EditorError::NoActiveProject)?;
                let scenes = ids
                    .iter()
                    .map(|id| list.scene(*id).cloned().ok_or(SceneError::SceneNotFound(*id)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(DragPayload::Scenes {
                    project,
                    ids: ids.clone(),
                    scenes,
                })
            }
            DragItems::Movies(ids) => {
                let list = self.scene_list().ok_or(EditorError::NoActiveProject)?;
                let movies = ids
                    .iter()
                    .map(|id| list.movie(*id).cloned().ok_or(SceneError::MovieNotFound(*id)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(DragPayload::Movies {
                    project,
                    ids: ids.clone(),
                    movies,
                })
            }
            DragItems::Frames(ids) => {
                let list = self.scene_list().ok_or(EditorError::NoActiveProject)?;
                let frames = ids
                    .iter()
                    .map(|id| list.frame(*id).cloned().ok_or(SceneError::FrameNotFound(*id)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(DragPayload::Frames {
                    project,
                    ids: ids.clone(),
                    frames,
                })
            }
        }
    }

    fn archive_node(&self, id: ProjectNodeId) -> Result<ArchivedNode, EditorError> {
        let node = self.tree.require(id)?;
        let refuse = || EditorError::NotDraggable(node.display_name.clone());
        if !self.is_draggable(id) {
            return Err(refuse());
        }
        let content = match &node.payload {
            NodePayload::Group => ArchivedContent::Group {
                children: node
                    .children
                    .iter()
                    .map(|child| self.archive_node(*child))
                    .collect::<Result<Vec<_>, _>>()?,
            },
            NodePayload::Project(LazyProject::Loaded(project)) => ArchivedContent::Project {
                format: FormatTag::Native,
                bytes: encode_native(&project.scene_list)?,
            },
            NodePayload::Project(LazyProject::Lazy(source)) => ArchivedContent::Lazy {
                format: source.format,
                bytes: source.bytes.to_vec(),
            },
            NodePayload::Project(LazyProject::Error {
                source: Some(source),
                ..
            }) => ArchivedContent::Project {
                format: source.format,
                bytes: source.bytes.to_vec(),
            },
            NodePayload::Project(_) => return Err(refuse()),
        };
        Ok(ArchivedNode {
            name: node.display_name.clone(),
            content,
        })
    }

    /// Drop `payload` into `target`. `is_internal` drops move the dragged
    /// items; the rest insert copies. Refused while another drop is still
    /// being realized.
    pub fn accept_drop(&mut self, payload: DragPayload, target: DropTarget, is_internal: bool) -> bool {
        let sequence = match self.gate().try_begin(Domain::DragAndDrop) {
            Ok(sequence) => sequence,
            Err(err) => {
                tracing::debug!(error = %err, "drop refused");
                return false;
            }
        };
        if is_internal {
            self.move_items(payload, target)
        } else {
            self.insert_copies(payload, target, &sequence, "Drop")
        }
    }

    pub fn copy(&mut self, items: &DragItems) -> bool {
        match self.make_drag_payload(items) {
            Ok(payload) => {
                self.clipboard = Some(payload);
                true
            }
            Err(err) => {
                tracing::debug!(error = %err, "copy declined");
                false
            }
        }
    }

    pub fn clipboard(&self) -> Option<&DragPayload> {
        self.clipboard.as_ref()
    }

    /// Insert copies of the clipboard at `target`
    pub fn paste(&mut self, target: DropTarget) -> bool {
        let Some(payload) = self.clipboard.clone() else {
            return false;
        };
        let sequence = match self.gate().try_begin(Domain::CopyPaste) {
            Ok(sequence) => sequence,
            Err(err) => {
                tracing::debug!(error = %err, "paste refused");
                return false;
            }
        };
        self.insert_copies(payload, target, &sequence, "Paste")
    }

    fn is_open(&self, project: Option<ProjectNodeId>) -> bool {
        project.is_some() && project == self.active_project()
    }

    fn move_items(&mut self, payload: DragPayload, target: DropTarget) -> bool {
        match (payload, target) {
            (DragPayload::Nodes { ids, .. }, DropTarget::Node { parent, index }) => {
                if ids.is_empty() || !ids.iter().all(|id| self.is_draggable(*id)) {
                    return false;
                }
                self.move_nodes(&ids, parent, index)
            }
            (DragPayload::Scenes { project, ids, .. }, DropTarget::Scenes { index })
                if self.is_open(project) =>
            {
                self.edit(|h, l| scene_ops::move_scenes(h, l, &ids, index))
                    .is_some()
            }
            (DragPayload::Movies { project, ids, .. }, DropTarget::Movies { scene, index })
                if self.is_open(project) =>
            {
                self.edit(|h, l| {
                    scene_ops::move_movies(h, l, &ids, MovieDestination::Scene(scene), index)
                })
                .is_some()
            }
            (DragPayload::Movies { project, ids, .. }, DropTarget::NewScene { index })
                if self.is_open(project) =>
            {
                let name = self.config.new_scene_name.clone();
                self.edit(|h, l| {
                    scene_ops::move_movies(h, l, &ids, MovieDestination::NewScene { index, name }, 0)
                })
                .is_some()
            }
            (DragPayload::Frames { project, ids, .. }, DropTarget::Frames { movie, index })
                if self.is_open(project) =>
            {
                self.edit(|h, l| scene_ops::move_frames(h, l, &ids, movie, index))
                    .is_some()
            }
            _ => {
                tracing::debug!("internal drop does not fit its target");
                false
            }
        }
    }

    fn insert_copies(
        &mut self,
        payload: DragPayload,
        target: DropTarget,
        sequence: &Sequence,
        label: &str,
    ) -> bool {
        match (payload, target) {
            (DragPayload::Nodes { archives, .. }, DropTarget::Node { parent, index }) => {
                self.insert_archives(archives, parent, index, sequence, label)
            }
            (DragPayload::Scenes { scenes, .. }, DropTarget::Scenes { index }) => {
                let scenes: Vec<Scene> = scenes.into_iter().map(fresh_scene).collect();
                self.edit(|h, l| scene_ops::insert_scenes(h, l, index, scenes))
                    .is_some()
            }
            (DragPayload::Movies { movies, .. }, DropTarget::Movies { scene, index }) => {
                let movies: Vec<Movie> = movies.into_iter().map(fresh_movie).collect();
                self.edit(|h, l| scene_ops::insert_movies(h, l, scene, index, movies))
                    .is_some()
            }
            (DragPayload::Movies { movies, .. }, DropTarget::NewScene { index }) => {
                let movies: Vec<Movie> = movies.into_iter().map(fresh_movie).collect();
                if movies.is_empty() {
                    return false;
                }
                let scene = Scene::with_movies(self.config.new_scene_name.clone(), movies);
                self.edit(|h, l| scene_ops::insert_scenes(h, l, index, vec![scene]))
                    .is_some()
            }
            (DragPayload::Frames { frames, .. }, DropTarget::Frames { movie, index }) => {
                let frames: Vec<Frame> = frames.into_iter().map(Frame::with_fresh_id).collect();
                self.edit(|h, l| scene_ops::insert_frames(h, l, movie, index, frames))
                    .is_some()
            }
            _ => {
                tracing::debug!("payload does not fit the drop target");
                false
            }
        }
    }

    fn insert_archives(
        &mut self,
        archives: Vec<ArchivedNode>,
        parent: ProjectNodeId,
        index: usize,
        sequence: &Sequence,
        label: &str,
    ) -> bool {
        if archives.is_empty() {
            return false;
        }
        let mut requests = Vec::new();
        let subtrees: Vec<DetachedSubtree> = archives
            .into_iter()
            .map(|archive| build_subtree(archive, &mut requests))
            .collect();
        let inserted = self
            .edit_tree(|h, t| tree_ops::insert_subtrees(h, t, parent, index, subtrees, label))
            .is_some();
        if !inserted {
            return false;
        }
        for request in requests {
            self.queue.submit(sequence, request);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_survives_the_pasteboard() {
        let payload = DragPayload::external(vec![ArchivedNode::group(
            "imports",
            vec![ArchivedNode::project("a", FormatTag::Molecular, b"ATOM".to_vec())],
        )]);
        let text = payload.to_json().unwrap();
        assert!(text.contains("\"kind\":\"nodes\""));
        assert_eq!(DragPayload::from_json(&text).unwrap(), payload);
        assert!(DragPayload::from_json("{\"kind\":\"bogus\"}").is_err());
    }

    #[test]
    fn archives_become_placeholders_with_requests() {
        let mut requests = Vec::new();
        let subtree = build_subtree(
            ArchivedNode::group(
                "g",
                vec![
                    ArchivedNode::project("a", FormatTag::Native, b"{}".to_vec()),
                    ArchivedNode {
                        name: "b".into(),
                        content: ArchivedContent::Lazy {
                            format: FormatTag::Native,
                            bytes: b"{}".to_vec(),
                        },
                    },
                ],
            ),
            &mut requests,
        );
        assert_eq!(subtree.nodes().len(), 3);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].target, subtree.nodes()[1].id);
        assert!(subtree.nodes()[1].is_loading());
        assert_eq!(subtree.nodes()[1].token.as_ref(), Some(&requests[0].token));
        assert_eq!(
            subtree.nodes()[2].status(),
            Some(project::LazyStatus::Lazy)
        );
    }
}
