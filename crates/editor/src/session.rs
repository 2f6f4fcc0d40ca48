use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use jobs::{
    run_decode, Completion, DecodeError, DecodeQueue, DecodeRequest, DecoderRegistry, Domain,
    OperationGate,
};
use project::edit_operations::{self as tree_ops, TreeHistory};
use project::{
    CancellationToken, LazyProject, LazyStatus, LoadedProject, ProjectError, ProjectLibrary,
    ProjectNodeId, ProjectTree,
};
use scenes::edit_operations::SceneHistory;
use scenes::{BoundingBox, FrameId, SceneError, SceneList};

use crate::broadcast::{select_page_index, SelectionBroadcaster, ViewId};
use crate::{DragPayload, EditorConfig, EditorError, NullRenderer, Renderer, UserLog};

/// Where a project stands right after it was asked to open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    Ready,
    /// Decoding in the background; the project opens when it lands
    Loading,
    Failed,
}

#[derive(Clone, Copy)]
enum Step {
    Undo,
    Redo,
}

impl Step {
    fn verb(self) -> &'static str {
        match self {
            Step::Undo => "Undo",
            Step::Redo => "Redo",
        }
    }
}

/// Visible selected frames of the open project and the box around them
#[derive(Debug, Default)]
struct FrameSnapshot {
    frames: HashSet<FrameId>,
    bounding_box: Option<BoundingBox>,
}

impl FrameSnapshot {
    fn of(list: Option<&SceneList>) -> Self {
        let Some(list) = list else {
            return Self::default();
        };
        let frames = list
            .movies()
            .flat_map(|m| {
                m.frames
                    .iter()
                    .filter(move |f| f.is_visible && m.selection.contains(&f.id))
                    .map(|f| f.id)
            })
            .collect();
        Self {
            frames,
            bounding_box: list.selected_bounding_box(),
        }
    }
}

/// Owner of everything the interactive thread edits: the project tree and
/// its undo history, the open project, the page views and the renderer.
/// Background decodes come back through [`EditingSession::pump_completions`].
pub struct EditingSession<R: Renderer = NullRenderer> {
    pub(crate) tree: ProjectTree,
    history: TreeHistory,
    pub(crate) queue: DecodeQueue,
    broadcaster: SelectionBroadcaster,
    renderer: R,
    log: UserLog,
    pub(crate) config: EditorConfig,
    active: Option<ProjectNodeId>,
    /// Latest open request still decoding
    open_when_loaded: Option<ProjectNodeId>,
    /// Results for placeholders that are currently undone
    parked: HashMap<ProjectNodeId, Completion>,
    pub(crate) clipboard: Option<DragPayload>,
}

impl<R: Renderer> EditingSession<R> {
    pub fn new(config: EditorConfig, gate: OperationGate, renderer: R) -> Self {
        Self::with_registry(config, gate, DecoderRegistry::with_native(), renderer)
    }

    pub fn with_registry(
        config: EditorConfig,
        gate: OperationGate,
        registry: DecoderRegistry,
        renderer: R,
    ) -> Self {
        let mut history = TreeHistory::new();
        history.set_limit(config.undo_limit);
        let log = UserLog::new(config.user_log_capacity);
        Self {
            tree: ProjectTree::new(),
            history,
            queue: DecodeQueue::new(gate, registry),
            broadcaster: SelectionBroadcaster::new(),
            renderer,
            log,
            config,
            active: None,
            open_when_loaded: None,
            parked: HashMap::new(),
            clipboard: None,
        }
    }

    /// Worker pools sized from the config
    pub fn threaded(config: EditorConfig, renderer: R) -> Result<Self> {
        let gate =
            OperationGate::threaded(config.drag_and_drop_workers, config.copy_paste_workers)?;
        Ok(Self::new(config, gate, renderer))
    }

    pub fn tree(&self) -> &ProjectTree {
        &self.tree
    }

    pub fn tree_history(&self) -> &TreeHistory {
        &self.history
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn log(&self) -> &UserLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut UserLog {
        &mut self.log
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn broadcaster(&self) -> &SelectionBroadcaster {
        &self.broadcaster
    }

    pub fn broadcaster_mut(&mut self) -> &mut SelectionBroadcaster {
        &mut self.broadcaster
    }

    pub fn gate(&self) -> &OperationGate {
        self.queue.gate()
    }

    pub fn active_project(&self) -> Option<ProjectNodeId> {
        self.active
    }

    /// Scene list of the open project
    pub fn scene_list(&self) -> Option<&SceneList> {
        self.tree.scene_list(self.active?)
    }

    pub fn scene_history(&self) -> Option<&SceneHistory> {
        match self.tree.node(self.active?)?.lazy()? {
            LazyProject::Loaded(project) => Some(&project.history),
            _ => None,
        }
    }

    fn frame_snapshot(&self) -> FrameSnapshot {
        FrameSnapshot::of(self.scene_list())
    }

    /// Renderer requests and view updates for whatever changed since `before`
    fn after_change(&mut self, before: FrameSnapshot) {
        let after = self.frame_snapshot();
        let changed: HashSet<FrameId> = before
            .frames
            .symmetric_difference(&after.frames)
            .copied()
            .collect();
        if !changed.is_empty() || before.bounding_box != after.bounding_box {
            if let Some(bounding_box) = after.bounding_box {
                self.renderer.reset_camera_for_bounding_box(bounding_box);
            }
            if !changed.is_empty() {
                self.renderer.invalidate_cached_occlusion(&changed);
            }
            self.renderer.reload_structures();
        }
        self.renderer.redraw();
        let list = self.active.and_then(|id| self.tree.scene_list(id));
        self.broadcaster.broadcast(list);
    }

    fn after_tree_change(&mut self, before: FrameSnapshot) {
        if let Some(id) = self.active {
            if self.tree.scene_list(id).is_none() {
                self.active = None;
            }
        }
        self.settle_cancelled_placeholders();
        self.apply_parked();
        self.after_change(before);
    }

    /// Switch the open project; `false` if `id` is not a loaded project
    pub fn set_active_project(&mut self, id: Option<ProjectNodeId>) -> bool {
        if let Some(id) = id {
            if self.tree.scene_list(id).is_none() {
                return false;
            }
        }
        if self.active == id {
            return true;
        }
        let before = self.frame_snapshot();
        self.active = id;
        let list = self.active.and_then(|id| self.tree.scene_list(id));
        self.broadcaster.arrange(list);
        self.after_change(before);
        true
    }

    /// Run one undoable edit on the open project. Declined edits (stale
    /// ids, bad indices) leave everything untouched and return `None`.
    pub fn edit<T, F>(&mut self, f: F) -> Option<T>
    where
        F: FnOnce(&mut SceneHistory, &mut SceneList) -> Result<T, SceneError>,
    {
        let id = self.active?;
        let before = self.frame_snapshot();
        let LoadedProject {
            scene_list,
            history,
        } = self.tree.loaded_project_mut(id)?;
        match f(history, scene_list) {
            Ok(value) => {
                self.tree.mark_edited(id);
                self.after_change(before);
                Some(value)
            }
            Err(err) => {
                tracing::debug!(error = %err, "scene edit declined");
                None
            }
        }
    }

    /// Run one undoable edit on the project tree
    pub fn edit_tree<T, F>(&mut self, f: F) -> Option<T>
    where
        F: FnOnce(&mut TreeHistory, &mut ProjectTree) -> Result<T, ProjectError>,
    {
        let before = self.frame_snapshot();
        match f(&mut self.history, &mut self.tree) {
            Ok(value) => {
                self.after_tree_change(before);
                Some(value)
            }
            Err(err) => {
                tracing::debug!(error = %err, "tree edit declined");
                None
            }
        }
    }

    pub fn undo(&mut self) -> Option<String> {
        self.step_scene_history(Step::Undo)
    }

    pub fn redo(&mut self) -> Option<String> {
        self.step_scene_history(Step::Redo)
    }

    pub fn can_undo(&self) -> bool {
        self.scene_history().is_some_and(|h| h.can_undo())
    }

    pub fn can_redo(&self) -> bool {
        self.scene_history().is_some_and(|h| h.can_redo())
    }

    fn step_scene_history(&mut self, step: Step) -> Option<String> {
        let id = self.active?;
        let _quiet = self.broadcaster.suppress();
        let before = self.frame_snapshot();
        let LoadedProject {
            scene_list,
            history,
        } = self.tree.loaded_project_mut(id)?;
        let result = match step {
            Step::Undo => history.undo(scene_list),
            Step::Redo => history.redo(scene_list),
        };
        match result {
            Ok(Some(label)) => {
                self.tree.mark_edited(id);
                self.after_change(before);
                Some(label)
            }
            Ok(None) => None,
            Err(err) => {
                let name = self
                    .tree
                    .node(id)
                    .map(|n| n.display_name.clone())
                    .unwrap_or_default();
                self.log
                    .error(format!("{} failed in \"{name}\": {err}", step.verb()));
                None
            }
        }
    }

    pub fn undo_tree(&mut self) -> Option<String> {
        self.step_tree_history(Step::Undo)
    }

    pub fn redo_tree(&mut self) -> Option<String> {
        self.step_tree_history(Step::Redo)
    }

    fn step_tree_history(&mut self, step: Step) -> Option<String> {
        let _quiet = self.broadcaster.suppress();
        let before = self.frame_snapshot();
        let result = match step {
            Step::Undo => self.history.undo(&mut self.tree),
            Step::Redo => self.history.redo(&mut self.tree),
        };
        match result {
            Ok(Some(label)) => {
                self.after_tree_change(before);
                Some(label)
            }
            Ok(None) => None,
            Err(err) => {
                self.log.error(format!("{} failed: {err}", step.verb()));
                None
            }
        }
    }

    /// Remove nodes with everything below them; returns how many subtrees
    /// went (0 when declined). Decodes still running for removed
    /// placeholders are cancelled; undo brings those back as failed nodes.
    pub fn remove_nodes(&mut self, ids: &[ProjectNodeId]) -> usize {
        let tokens: Vec<CancellationToken> = self
            .tree
            .find_local_roots(ids)
            .into_iter()
            .flat_map(|root| std::iter::once(root).chain(self.tree.descendant_nodes(root)))
            .filter_map(|id| self.tree.node(id))
            .filter(|n| n.is_loading())
            .filter_map(|n| n.token.clone())
            .collect();
        let removed = self
            .edit_tree(|h, t| tree_ops::remove_nodes(h, t, ids))
            .unwrap_or(0);
        if removed > 0 {
            for token in &tokens {
                token.cancel();
            }
            self.parked.retain(|_, c| !c.token.is_cancelled());
        }
        removed
    }

    pub fn move_nodes(&mut self, ids: &[ProjectNodeId], parent: ProjectNodeId, index: usize) -> bool {
        self.edit_tree(|h, t| tree_ops::move_nodes(h, t, ids, parent, index))
            .is_some()
    }

    pub fn rename_node(&mut self, id: ProjectNodeId, name: &str) -> bool {
        self.edit_tree(|h, t| tree_ops::rename_node(h, t, id, name))
            .unwrap_or(false)
    }

    pub fn new_group(
        &mut self,
        parent: ProjectNodeId,
        index: usize,
        name: &str,
    ) -> Option<ProjectNodeId> {
        self.edit_tree(|h, t| tree_ops::new_group(h, t, parent, index, name))
    }

    /// Copies of the selected subtrees right after the first of them
    pub fn duplicate_nodes(&mut self, ids: &[ProjectNodeId]) -> Vec<ProjectNodeId> {
        let undo_limit = self.config.undo_limit;
        self.edit_tree(|h, t| {
            let roots = t.find_local_roots(ids);
            let first = *roots
                .first()
                .ok_or_else(|| ProjectError::InvalidOp("nothing to duplicate".into()))?;
            let parent = t.parent(first).ok_or(ProjectError::RootImmutable)?;
            let index = t.index_in_parent(first).map_or(0, |i| i + 1);
            let copies = t.copy_of_subtrees(&roots, undo_limit)?;
            tree_ops::insert_subtrees(h, t, parent, index, copies, "Duplicate")
        })
        .unwrap_or_default()
    }

    /// Mirror a bundled library below the root. Not undoable.
    pub fn load_library(
        &mut self,
        library: &ProjectLibrary,
        group_name: &str,
    ) -> Result<ProjectNodeId> {
        let before = self.frame_snapshot();
        let id = library.load_into(&mut self.tree, group_name)?;
        self.after_change(before);
        Ok(id)
    }

    /// Case-insensitive name filter; an empty query shows everything
    pub fn filter_nodes(&mut self, query: &str) {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            self.tree.clear_filter();
        } else {
            self.tree
                .update_filter(|n| n.display_name.to_lowercase().contains(&query));
        }
    }

    /// A user gesture in the project browser
    pub fn select_nodes(&mut self, ids: &[ProjectNodeId]) -> bool {
        if !self.broadcaster.is_observing() {
            return false;
        }
        if ids.iter().any(|id| !self.tree.contains(*id)) {
            return false;
        }
        self.tree.selection =
            scenes::SelectionSet::from_parts(ids.first().copied(), ids.iter().copied());
        true
    }

    /// Open a project node, decoding it first if it is still lazy. Small
    /// payloads are decoded right here, large ones on the project worker.
    ///
    /// Only the latest request waits to be opened: asking for another node
    /// before the first has loaded means the first just loads in place.
    pub fn open_project(&mut self, id: ProjectNodeId) -> Result<OpenOutcome, EditorError> {
        let node = self.tree.require(id)?;
        let status = node.status().ok_or_else(|| {
            ProjectError::InvalidOp(format!("{} is a group", node.display_name))
        })?;
        match status {
            LazyStatus::Loaded => {
                self.set_active_project(Some(id));
                Ok(OpenOutcome::Ready)
            }
            LazyStatus::Loading => {
                self.open_when_loaded = Some(id);
                Ok(OpenOutcome::Loading)
            }
            LazyStatus::Error => Ok(OpenOutcome::Failed),
            LazyStatus::Lazy => {
                self.open_when_loaded = Some(id);
                self.start_loading(id)
            }
        }
    }

    /// Decode a failed project again from the bytes it kept
    pub fn retry(&mut self, id: ProjectNodeId) -> Result<OpenOutcome, EditorError> {
        self.start_loading(id)
    }

    fn start_loading(&mut self, id: ProjectNodeId) -> Result<OpenOutcome, EditorError> {
        let node = self.tree.node_mut(id).ok_or(ProjectError::NodeNotFound(id))?;
        let name = node.display_name.clone();
        let lazy = node
            .lazy_mut()
            .ok_or_else(|| ProjectError::InvalidOp(format!("{name} is a group")))?;
        let source = lazy.begin_loading()?;
        let token = CancellationToken::new();
        node.token = Some(token.clone());
        let request = DecodeRequest {
            target: id,
            name,
            source,
            token,
        };
        if request.source.len() <= self.config.lazy_sync_threshold_bytes {
            let completion = run_decode(self.queue.registry(), request);
            self.apply_completion(completion);
            let status = self.tree.node(id).and_then(|n| n.status());
            Ok(match status {
                Some(LazyStatus::Loaded) => OpenOutcome::Ready,
                _ => OpenOutcome::Failed,
            })
        } else {
            tracing::debug!(name = %request.name, bytes = request.source.len(), "decoding in background");
            self.queue.submit_in(Domain::Project, request);
            Ok(OpenOutcome::Loading)
        }
    }

    /// Apply every decode that has finished, in the order they finished.
    /// Returns how many landed in the tree.
    pub fn pump_completions(&mut self) -> usize {
        let mut applied = 0;
        for completion in self.queue.drain() {
            if self.apply_completion(completion) {
                applied += 1;
            }
        }
        applied
    }

    /// Block until no placeholder waits for a decode or `timeout` passes
    pub fn wait_for_completions(&mut self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut applied = self.pump_completions();
        while self.pending_decodes() > 0 {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                break;
            };
            match self.queue.recv_timeout(remaining) {
                Some(completion) => {
                    if self.apply_completion(completion) {
                        applied += 1;
                    }
                }
                None => break,
            }
        }
        applied
    }

    /// Nodes in the tree still waiting for their decode
    pub fn pending_decodes(&self) -> usize {
        self.tree
            .flattened_nodes()
            .into_iter()
            .filter_map(|id| self.tree.node(id))
            .filter(|n| n.is_loading() && n.token.as_ref().is_some_and(|t| !t.is_cancelled()))
            .count()
    }

    fn apply_completion(&mut self, completion: Completion) -> bool {
        if completion.token.is_cancelled() {
            tracing::debug!(name = %completion.name, "cancelled decode ignored");
            return false;
        }
        let target = completion.target;
        if !self.tree.contains(target) {
            if tree_ops::detached_in_history(&self.history).contains(&target) {
                self.parked.insert(target, completion);
            } else {
                tracing::debug!(%target, "result for a discarded placeholder dropped");
            }
            return false;
        }
        let Some(node) = self.tree.node_mut(target) else {
            return false;
        };
        if node.token.as_ref() != Some(&completion.token) {
            tracing::debug!(%target, "stale decode ignored");
            return false;
        }
        let name = node.display_name.clone();
        let Some(lazy) = node.lazy_mut() else {
            return false;
        };
        let applied = match completion.result {
            Ok(list) => lazy.complete(list, self.config.undo_limit).map(|_| None),
            Err(DecodeError::Cancelled) => return false,
            Err(err) => lazy.fail(err.to_string()).map(|_| Some(err)),
        };
        node.token = None;
        let opening = self.open_when_loaded == Some(target);
        if opening {
            self.open_when_loaded = None;
        }
        match applied {
            Ok(None) => {
                tracing::info!(%name, "project loaded");
                if opening {
                    self.set_active_project(Some(target));
                }
            }
            Ok(Some(err)) => self.log.error(format!("Could not load \"{name}\": {err}")),
            Err(err) => {
                tracing::warn!(%name, error = %err, "decode result not applied");
                return false;
            }
        }
        true
    }

    fn apply_parked(&mut self) {
        let back: Vec<ProjectNodeId> = self
            .parked
            .keys()
            .copied()
            .filter(|id| self.tree.contains(*id))
            .collect();
        for id in back {
            if let Some(completion) = self.parked.remove(&id) {
                self.apply_completion(completion);
            }
        }
        self.parked.retain(|_, c| !c.token.is_cancelled());
        if !self.parked.is_empty() {
            // Once no undo or redo can bring a placeholder back its result is dead
            let reachable = tree_ops::detached_in_history(&self.history);
            self.parked.retain(|id, _| reachable.contains(id));
        }
    }

    /// Results waiting for an undone placeholder to come back
    pub fn parked_completions(&self) -> usize {
        self.parked.len()
    }

    /// A cancelled placeholder brought back by undo has no decode coming;
    /// it turns into a failed node that can be retried.
    fn settle_cancelled_placeholders(&mut self) {
        let stale: Vec<ProjectNodeId> = self
            .tree
            .flattened_nodes()
            .into_iter()
            .filter(|id| {
                self.tree.node(*id).is_some_and(|n| {
                    n.is_loading() && n.token.as_ref().is_some_and(|t| t.is_cancelled())
                })
            })
            .collect();
        for id in stale {
            if let Some(node) = self.tree.node_mut(id) {
                node.token = None;
                if let Some(lazy) = node.lazy_mut() {
                    if let Err(err) = lazy.fail("import was cancelled") {
                        tracing::debug!(%id, error = %err, "placeholder left as is");
                    }
                }
            }
        }
    }

    /// Remove a placeholder whose decode is still running and tell the
    /// worker to give up. The removal can be undone.
    pub fn cancel_placeholder(&mut self, id: ProjectNodeId) -> bool {
        let Some(token) = self
            .tree
            .node(id)
            .filter(|n| n.is_loading())
            .and_then(|n| n.token.clone())
        else {
            return false;
        };
        let removed = self.remove_nodes(&[id]) > 0;
        if removed {
            tracing::debug!(%id, cancelled = token.is_cancelled(), "placeholder removed");
        }
        removed
    }

    /// Apply a selection change made by the user in some view. Ignored while
    /// the session itself is pushing selection out.
    pub fn change_selection<F>(&mut self, f: F) -> bool
    where
        F: FnOnce(&mut SceneList) -> bool,
    {
        if !self.broadcaster.is_observing() {
            tracing::debug!("selection change during programmatic update ignored");
            return false;
        }
        let Some(id) = self.active else {
            return false;
        };
        let before = self.frame_snapshot();
        let Some(project) = self.tree.loaded_project_mut(id) else {
            return false;
        };
        if !f(&mut project.scene_list) {
            return false;
        }
        project.scene_list.prune_selections();
        self.after_change(before);
        true
    }

    /// The user picked the item at `index` of a page view
    pub fn page_selection_changed(&mut self, view: ViewId, index: usize) -> bool {
        let Some(kind) = self.broadcaster.kind(view) else {
            return false;
        };
        let changed = self.change_selection(|list| select_page_index(kind, list, index));
        if changed {
            self.broadcaster.set_active_view(Some(view));
        }
        changed
    }

    /// Point every movie at the same frame index
    pub fn synchronize_frames(&mut self, index: usize) -> bool {
        self.drive_playback(|list| list.synchronize_all_movie_frames(index))
    }

    pub fn advance_frames(&mut self) -> bool {
        self.drive_playback(SceneList::advance_all_movie_frames)
    }

    pub fn frames_to_beginning(&mut self) -> bool {
        self.drive_playback(SceneList::set_all_movie_frames_to_beginning)
    }

    pub fn frames_to_end(&mut self) -> bool {
        self.drive_playback(SceneList::set_all_movie_frames_to_end)
    }

    fn drive_playback<F>(&mut self, f: F) -> bool
    where
        F: FnOnce(&mut SceneList),
    {
        let Some(id) = self.active else {
            return false;
        };
        let _quiet = self.broadcaster.suppress();
        let before = self.frame_snapshot();
        let Some(project) = self.tree.loaded_project_mut(id) else {
            return false;
        };
        f(&mut project.scene_list);
        self.after_change(before);
        true
    }
}
