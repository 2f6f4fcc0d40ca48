//! Keeps any number of page views in step with the selection held on the
//! scene list.
//!
//! A view gets a full `set_arranged_objects` when the items it can address
//! change and a cheaper `set_selection` when only the selection moved. Only
//! the active view animates; the others jump.
//!
//! Views that originate selection changes check [`NotificationGate`] before
//! forwarding them. The session suppresses notifications while it pushes
//! selection programmatically (undo, redo, playback), so those updates are
//! not mistaken for user gestures. Suppression is counted and scoped.
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use scenes::{FrameId, SceneList};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(usize);

/// Flattened view of the scene list a page shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// The current frame of every movie, in row order
    AllCurrentFrames,
    /// Every frame of the current movie of the current scene
    ActiveMovieFrames,
}

pub trait PageView {
    fn set_arranged_objects(
        &mut self,
        objects: &[FrameId],
        selected: &[FrameId],
        selected_index: Option<usize>,
    );

    fn set_selection(
        &mut self,
        selected: &[FrameId],
        selected_index: Option<usize>,
        is_active_view: bool,
    );
}

/// What one page shows for a given scene list
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageState {
    pub objects: Vec<FrameId>,
    pub selected: Vec<FrameId>,
    pub selected_index: Option<usize>,
    /// Scene-list row behind each object (all-current-frames pages only)
    pub rows: Vec<usize>,
}

impl PageState {
    pub fn compute(kind: PageKind, list: &SceneList) -> Self {
        match kind {
            PageKind::AllCurrentFrames => Self::all_current_frames(list),
            PageKind::ActiveMovieFrames => Self::active_movie_frames(list),
        }
    }

    fn all_current_frames(list: &SceneList) -> Self {
        let mut state = Self::default();
        let current_movie = list
            .selected_scene()
            .and_then(|s| s.selected_movie())
            .map(|m| m.id);
        for (s, scene) in list.scenes.iter().enumerate() {
            let scene_selected = list.selection.contains(&scene.id);
            for (m, movie) in scene.movies.iter().enumerate() {
                let Some(frame) = movie.selection.current() else {
                    continue;
                };
                if Some(movie.id) == current_movie {
                    state.selected_index = Some(state.objects.len());
                }
                if scene_selected && scene.selection.contains(&movie.id) {
                    state.selected.push(frame);
                }
                state.objects.push(frame);
                state.rows.push(list.row_for_section_tuple(s, m));
            }
        }
        state
    }

    fn active_movie_frames(list: &SceneList) -> Self {
        let Some(movie) = list.selected_scene().and_then(|s| s.selected_movie()) else {
            return Self::default();
        };
        Self {
            objects: movie.frame_ids().copied().collect(),
            selected: movie.selected_frames(),
            selected_index: movie.selected_frame_index(),
            rows: Vec::new(),
        }
    }
}

/// Make the item a user picked at `index` of a page current on the scene
/// list. Returns `false` for an index the page does not show.
pub fn select_page_index(kind: PageKind, list: &mut SceneList, index: usize) -> bool {
    match kind {
        PageKind::AllCurrentFrames => {
            let state = PageState::compute(kind, list);
            let Some((s, m)) = state
                .rows
                .get(index)
                .and_then(|row| list.section_tuple_for_row(*row))
            else {
                return false;
            };
            let scene = &mut list.scenes[s];
            let movie_id = scene.movies[m].id;
            scene.selection.select_only(movie_id);
            let scene_id = scene.id;
            list.selection.select_only(scene_id);
            true
        }
        PageKind::ActiveMovieFrames => {
            let Some(movie_id) = list
                .selected_scene()
                .and_then(|s| s.selected_movie())
                .map(|m| m.id)
            else {
                return false;
            };
            list.movie_mut(movie_id)
                .map(|movie| movie.select_frame_at(index))
                .unwrap_or(false)
        }
    }
}

/// Shared "are we listening to views" flag. Cloned into views so they can
/// tell a user gesture from a programmatic update.
#[derive(Debug, Clone, Default)]
pub struct NotificationGate {
    depth: Rc<Cell<usize>>,
}

impl NotificationGate {
    pub fn is_observing(&self) -> bool {
        self.depth.get() == 0
    }

    /// Stop observing until the guard drops. Guards nest.
    pub fn suppress(&self) -> SuppressGuard {
        self.depth.set(self.depth.get() + 1);
        SuppressGuard {
            depth: self.depth.clone(),
        }
    }
}

#[must_use = "notifications resume as soon as the guard is dropped"]
pub struct SuppressGuard {
    depth: Rc<Cell<usize>>,
}

impl Drop for SuppressGuard {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

struct Registered {
    id: ViewId,
    kind: PageKind,
    view: Box<dyn PageView>,
    last: Option<PageState>,
}

#[derive(Default)]
pub struct SelectionBroadcaster {
    views: Vec<Registered>,
    next_id: usize,
    active: Option<ViewId>,
    gate: NotificationGate,
}

impl SelectionBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: PageKind, view: Box<dyn PageView>) -> ViewId {
        let id = ViewId(self.next_id);
        self.next_id += 1;
        self.views.push(Registered {
            id,
            kind,
            view,
            last: None,
        });
        id
    }

    pub fn unregister(&mut self, id: ViewId) -> Option<Box<dyn PageView>> {
        let pos = self.views.iter().position(|v| v.id == id)?;
        if self.active == Some(id) {
            self.active = None;
        }
        Some(self.views.remove(pos).view)
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn kind(&self, id: ViewId) -> Option<PageKind> {
        self.views.iter().find(|v| v.id == id).map(|v| v.kind)
    }

    /// Last state pushed to a view
    pub fn state(&self, id: ViewId) -> Option<&PageState> {
        self.views
            .iter()
            .find(|v| v.id == id)
            .and_then(|v| v.last.as_ref())
    }

    /// The view the user is currently interacting with
    pub fn set_active_view(&mut self, id: Option<ViewId>) {
        self.active = id;
    }

    pub fn active_view(&self) -> Option<ViewId> {
        self.active
    }

    pub fn notifications(&self) -> NotificationGate {
        self.gate.clone()
    }

    pub fn is_observing(&self) -> bool {
        self.gate.is_observing()
    }

    pub fn suppress(&self) -> SuppressGuard {
        self.gate.suppress()
    }

    /// Full resynchronization of every view
    pub fn arrange(&mut self, list: Option<&SceneList>) {
        for entry in &mut self.views {
            let state = list
                .map(|l| PageState::compute(entry.kind, l))
                .unwrap_or_default();
            entry
                .view
                .set_arranged_objects(&state.objects, &state.selected, state.selected_index);
            entry.last = Some(state);
        }
    }

    /// Send each view whatever changed since its last update
    pub fn broadcast(&mut self, list: Option<&SceneList>) {
        let active = self.active;
        for entry in &mut self.views {
            let state = list
                .map(|l| PageState::compute(entry.kind, l))
                .unwrap_or_default();
            match &entry.last {
                Some(last) if last.objects == state.objects => {
                    if last.selected != state.selected || last.selected_index != state.selected_index
                    {
                        entry.view.set_selection(
                            &state.selected,
                            state.selected_index,
                            active == Some(entry.id),
                        );
                    }
                }
                _ => entry.view.set_arranged_objects(
                    &state.objects,
                    &state.selected,
                    state.selected_index,
                ),
            }
            entry.last = Some(state);
        }
    }
}

impl fmt::Debug for SelectionBroadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionBroadcaster")
            .field("views", &self.views.len())
            .field("active", &self.active)
            .field("observing", &self.gate.is_observing())
            .finish()
    }
}
