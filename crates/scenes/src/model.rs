use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::{FrameId, MovieId, SceneError, SceneId, SelectionSet};

/// Declared format of raw bytes handed to a decoder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FormatTag {
    /// Serialized scene list produced by this editor
    Native,
    /// CIF and friends
    Crystallographic,
    /// PDB, XYZ
    Molecular,
    /// XDATCAR-style trajectories
    PointTrajectory,
    /// POSCAR / CONTCAR input decks
    PlaneWaveInput,
}

impl FormatTag {
    /// Guess the format from a file name. Extension-less VASP files are
    /// recognised by their conventional upper-case names.
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?.to_ascii_uppercase();
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => match ext.to_ascii_lowercase().as_str() {
                "json" | "scenes" => Some(Self::Native),
                "cif" | "mmcif" => Some(Self::Crystallographic),
                "pdb" | "xyz" => Some(Self::Molecular),
                "poscar" | "vasp" => Some(Self::PlaneWaveInput),
                _ => None,
            },
            None => match file_name.as_str() {
                "POSCAR" | "CONTCAR" => Some(Self::PlaneWaveInput),
                "XDATCAR" => Some(Self::PointTrajectory),
                _ => None,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FormatTag::Native => "native",
            FormatTag::Crystallographic => "crystallographic",
            FormatTag::Molecular => "molecular",
            FormatTag::PointTrajectory => "point_trajectory",
            FormatTag::PlaneWaveInput => "plane_wave_input",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "native" => Some(Self::Native),
            "crystallographic" | "cif" => Some(Self::Crystallographic),
            "molecular" | "pdb" | "xyz" => Some(Self::Molecular),
            "point_trajectory" | "xdatcar" => Some(Self::PointTrajectory),
            "plane_wave_input" | "poscar" => Some(Self::PlaneWaveInput),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl BoundingBox {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let mut min = self.min;
        let mut max = self.max;
        for axis in 0..3 {
            min[axis] = min[axis].min(other.min[axis]);
            max[axis] = max[axis].max(other.max[axis]);
        }
        BoundingBox { min, max }
    }

    pub fn enclosing<'a>(boxes: impl IntoIterator<Item = &'a BoundingBox>) -> Option<BoundingBox> {
        boxes
            .into_iter()
            .fold(None, |acc: Option<BoundingBox>, b| match acc {
                Some(acc) => Some(acc.union(b)),
                None => Some(*b),
            })
    }

    pub fn center(&self) -> [f64; 3] {
        [
            0.5 * (self.min[0] + self.max[0]),
            0.5 * (self.min[1] + self.max[1]),
            0.5 * (self.min[2] + self.max[2]),
        ]
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min: [0.0; 3],
            max: [0.0; 3],
        }
    }
}

/// What a decoded structure must provide to live in the tree. The core only
/// reads `bounding_box` and `atom_count`; `data` belongs to the decoder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FramePayload {
    pub format: FormatTag,
    #[serde(default)]
    pub atom_count: usize,
    #[serde(default)]
    pub bounding_box: BoundingBox,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl FramePayload {
    pub fn new(format: FormatTag, atom_count: usize, bounding_box: BoundingBox) -> Self {
        Self {
            format,
            atom_count,
            bounding_box,
            data: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Frame {
    pub id: FrameId,
    pub display_name: String,
    pub payload: FramePayload,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
    #[serde(skip)]
    pub is_loading: bool,
}

fn default_visible() -> bool {
    true
}

impl Frame {
    pub fn new(display_name: impl Into<String>, payload: FramePayload) -> Self {
        Self {
            id: FrameId::new(),
            display_name: display_name.into(),
            payload,
            is_visible: true,
            is_loading: false,
        }
    }

    /// Same content under a new identity (copy/paste, external drops)
    pub fn with_fresh_id(mut self) -> Self {
        self.id = FrameId::new();
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    pub id: MovieId,
    pub display_name: String,
    pub frames: Vec<Frame>,
    #[serde(skip)]
    pub selection: SelectionSet<FrameId>,
    #[serde(skip)]
    pub is_loading: bool,
}

impl Movie {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            id: MovieId::new(),
            display_name: display_name.into(),
            frames: Vec::new(),
            selection: SelectionSet::new(),
            is_loading: false,
        }
    }

    /// Movie whose first frame is current
    pub fn with_frames(display_name: impl Into<String>, frames: Vec<Frame>) -> Self {
        let mut movie = Self::new(display_name);
        if let Some(first) = frames.first() {
            movie.selection.select_only(first.id);
        }
        movie.frames = frames;
        movie
    }

    pub fn frame_ids(&self) -> impl Iterator<Item = &FrameId> {
        self.frames.iter().map(|f| &f.id)
    }

    pub fn frame_index(&self, frame_id: FrameId) -> Option<usize> {
        self.frames.iter().position(|f| f.id == frame_id)
    }

    pub fn frame(&self, frame_id: FrameId) -> Option<&Frame> {
        self.frames.iter().find(|f| f.id == frame_id)
    }

    pub fn selected_frame(&self) -> Option<&Frame> {
        self.selection.current().and_then(|id| self.frame(id))
    }

    pub fn selected_frame_index(&self) -> Option<usize> {
        self.selection.current_index(self.frame_ids())
    }

    pub fn selected_frames(&self) -> Vec<FrameId> {
        self.selection.ordered(self.frame_ids())
    }

    /// Make the frame at `index` current and the only selected one
    pub fn select_frame_at(&mut self, index: usize) -> bool {
        match self.frames.get(index) {
            Some(frame) => {
                let id = frame.id;
                self.selection.select_only(id);
                true
            }
            None => false,
        }
    }

    /// Visible when at least half of the frames are visible
    pub fn is_visible(&self) -> bool {
        let visible = self.frames.iter().filter(|f| f.is_visible).count();
        visible >= self.frames.len() - visible
    }

    pub fn frame_visibility(&self) -> Vec<bool> {
        self.frames.iter().map(|f| f.is_visible).collect()
    }

    pub fn total_atom_count(&self) -> usize {
        self.frames.iter().map(|f| f.payload.atom_count).sum()
    }

    pub fn info_string(&self) -> String {
        let min = self.frames.iter().map(|f| f.payload.atom_count).min().unwrap_or(0);
        let max = self.frames.iter().map(|f| f.payload.atom_count).max().unwrap_or(0);
        if min == max {
            format!("{} ({} atoms)", self.display_name, min)
        } else {
            format!("{} (min {} atoms, max {} atoms)", self.display_name, min, max)
        }
    }

    pub fn prune_selection(&mut self) {
        let ids: Vec<FrameId> = self.frames.iter().map(|f| f.id).collect();
        self.selection.retain_within(&ids);
    }

    pub fn with_fresh_ids(mut self) -> Self {
        let mut remap = HashMap::new();
        self.id = MovieId::new();
        for frame in &mut self.frames {
            let fresh = FrameId::new();
            remap.insert(frame.id, fresh);
            frame.id = fresh;
        }
        let current = self.selection.current().and_then(|id| remap.get(&id).copied());
        let additional: Vec<FrameId> = self
            .selection
            .additional()
            .iter()
            .filter_map(|id| remap.get(id).copied())
            .collect();
        self.selection = SelectionSet::from_parts(current, additional);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scene {
    pub id: SceneId,
    pub display_name: String,
    pub movies: Vec<Movie>,
    #[serde(skip)]
    pub selection: SelectionSet<MovieId>,
}

impl Scene {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            id: SceneId::new(),
            display_name: display_name.into(),
            movies: Vec::new(),
            selection: SelectionSet::new(),
        }
    }

    pub fn with_movies(display_name: impl Into<String>, movies: Vec<Movie>) -> Self {
        let mut scene = Self::new(display_name);
        if let Some(first) = movies.first() {
            scene.selection.select_only(first.id);
        }
        scene.movies = movies;
        scene
    }

    pub fn movie_ids(&self) -> impl Iterator<Item = &MovieId> {
        self.movies.iter().map(|m| &m.id)
    }

    pub fn movie_index(&self, movie_id: MovieId) -> Option<usize> {
        self.movies.iter().position(|m| m.id == movie_id)
    }

    pub fn selected_movie(&self) -> Option<&Movie> {
        let id = self.selection.current()?;
        self.movies.iter().find(|m| m.id == id)
    }

    pub fn selected_movies(&self) -> Vec<MovieId> {
        self.selection.ordered(self.movie_ids())
    }

    pub fn prune_selection(&mut self) {
        let ids: Vec<MovieId> = self.movies.iter().map(|m| m.id).collect();
        self.selection.retain_within(&ids);
    }

    pub fn with_fresh_ids(mut self) -> Self {
        let mut remap = HashMap::new();
        self.id = SceneId::new();
        let movies = std::mem::take(&mut self.movies);
        for movie in movies {
            let old = movie.id;
            let movie = movie.with_fresh_ids();
            remap.insert(old, movie.id);
            self.movies.push(movie);
        }
        let current = self.selection.current().and_then(|id| remap.get(&id).copied());
        let additional: Vec<MovieId> = self
            .selection
            .additional()
            .iter()
            .filter_map(|id| remap.get(id).copied())
            .collect();
        self.selection = SelectionSet::from_parts(current, additional);
        self
    }
}

/// Every selection in a scene list plus the current coordinate.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionSnapshot {
    pub scenes: SelectionSet<SceneId>,
    pub movies: HashMap<SceneId, SelectionSet<MovieId>>,
    pub frames: HashMap<MovieId, SelectionSet<FrameId>>,
    pub current_frame_index: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SceneList {
    pub display_name: String,
    pub scenes: Vec<Scene>,
    #[serde(skip)]
    pub selection: SelectionSet<SceneId>,
    /// Frame index every movie is synchronized to during playback
    #[serde(skip)]
    pub current_frame_index: Option<usize>,
}

impl SceneList {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            ..Self::default()
        }
    }

    pub fn with_scenes(display_name: impl Into<String>, scenes: Vec<Scene>) -> Self {
        let mut list = Self::new(display_name);
        if let Some(first) = scenes.first() {
            list.selection.select_only(first.id);
        }
        list.scenes = scenes;
        list
    }

    /// Wrap a single movie the way a freshly decoded structure arrives
    pub fn from_movie(display_name: impl Into<String>, movie: Movie) -> Self {
        let name = display_name.into();
        let scene = Scene::with_movies(name.clone(), vec![movie]);
        Self::with_scenes(name, vec![scene])
    }

    pub fn scene_ids(&self) -> impl Iterator<Item = &SceneId> {
        self.scenes.iter().map(|s| &s.id)
    }

    pub fn scene_index(&self, scene_id: SceneId) -> Option<usize> {
        self.scenes.iter().position(|s| s.id == scene_id)
    }

    pub fn scene(&self, scene_id: SceneId) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id == scene_id)
    }

    pub fn scene_mut(&mut self, scene_id: SceneId) -> Option<&mut Scene> {
        self.scenes.iter_mut().find(|s| s.id == scene_id)
    }

    pub fn selected_scene(&self) -> Option<&Scene> {
        self.selection.current().and_then(|id| self.scene(id))
    }

    /// (scene index, movie index) of a movie
    pub fn movie_index_path(&self, movie_id: MovieId) -> Option<(usize, usize)> {
        self.scenes.iter().enumerate().find_map(|(scene_index, scene)| {
            scene
                .movie_index(movie_id)
                .map(|movie_index| (scene_index, movie_index))
        })
    }

    pub fn movie(&self, movie_id: MovieId) -> Option<&Movie> {
        let (s, m) = self.movie_index_path(movie_id)?;
        self.scenes.get(s)?.movies.get(m)
    }

    pub fn movie_mut(&mut self, movie_id: MovieId) -> Option<&mut Movie> {
        let (s, m) = self.movie_index_path(movie_id)?;
        self.scenes.get_mut(s)?.movies.get_mut(m)
    }

    pub fn movies(&self) -> impl Iterator<Item = &Movie> {
        self.scenes.iter().flat_map(|s| s.movies.iter())
    }

    pub fn movies_mut(&mut self) -> impl Iterator<Item = &mut Movie> {
        self.scenes.iter_mut().flat_map(|s| s.movies.iter_mut())
    }

    pub fn movie_count(&self) -> usize {
        self.scenes.iter().map(|s| s.movies.len()).sum()
    }

    /// (scene index, movie index, frame index) of a frame
    pub fn frame_location(&self, frame_id: FrameId) -> Option<(usize, usize, usize)> {
        for (s, scene) in self.scenes.iter().enumerate() {
            for (m, movie) in scene.movies.iter().enumerate() {
                if let Some(f) = movie.frame_index(frame_id) {
                    return Some((s, m, f));
                }
            }
        }
        None
    }

    pub fn frame(&self, frame_id: FrameId) -> Option<&Frame> {
        let (s, m, f) = self.frame_location(frame_id)?;
        self.scenes.get(s)?.movies.get(m)?.frames.get(f)
    }

    pub fn frame_mut(&mut self, frame_id: FrameId) -> Option<&mut Frame> {
        let (s, m, f) = self.frame_location(frame_id)?;
        self.scenes.get_mut(s)?.movies.get_mut(m)?.frames.get_mut(f)
    }

    /// Linear row of a movie over all movies of all scenes
    pub fn row_for_section_tuple(&self, scene_index: usize, movie_index: usize) -> usize {
        let preceding: usize = self
            .scenes
            .iter()
            .take(scene_index)
            .map(|s| s.movies.len())
            .sum();
        preceding + movie_index
    }

    pub fn section_tuple_for_row(&self, row: usize) -> Option<(usize, usize)> {
        let mut remaining = row;
        for (scene_index, scene) in self.scenes.iter().enumerate() {
            if remaining < scene.movies.len() {
                return Some((scene_index, remaining));
            }
            remaining -= scene.movies.len();
        }
        None
    }

    pub fn row_for_movie(&self, movie_id: MovieId) -> Option<usize> {
        let (s, m) = self.movie_index_path(movie_id)?;
        Some(self.row_for_section_tuple(s, m))
    }

    pub fn maximum_number_of_frames(&self) -> Option<usize> {
        self.movies().map(|m| m.frames.len()).max()
    }

    pub fn set_all_movie_frames_to_beginning(&mut self) {
        for movie in self.movies_mut() {
            movie.select_frame_at(0);
        }
        self.current_frame_index = Some(0);
    }

    pub fn set_all_movie_frames_to_end(&mut self) {
        for movie in self.movies_mut() {
            if let Some(last) = movie.frames.len().checked_sub(1) {
                movie.select_frame_at(last);
            }
        }
        self.current_frame_index = self.maximum_number_of_frames().and_then(|n| n.checked_sub(1));
    }

    /// Step every movie one frame forward; movies at their last frame stay put
    pub fn advance_all_movie_frames(&mut self) {
        for movie in self.movies_mut() {
            if let Some(index) = movie.selected_frame_index() {
                if index + 1 < movie.frames.len() {
                    movie.select_frame_at(index + 1);
                }
            }
        }
        let last = self.maximum_number_of_frames().and_then(|n| n.checked_sub(1));
        self.current_frame_index = match (self.current_frame_index, last) {
            (Some(i), Some(last)) => Some((i + 1).min(last)),
            _ => None,
        };
    }

    /// Point every movie at `frames[min(index, len - 1)]`
    pub fn synchronize_all_movie_frames(&mut self, index: usize) {
        for movie in self.movies_mut() {
            if let Some(last) = movie.frames.len().checked_sub(1) {
                movie.select_frame_at(index.min(last));
            }
        }
        self.current_frame_index = Some(index);
    }

    /// Current frame of every movie, in row order
    pub fn current_frames(&self) -> Vec<FrameId> {
        self.movies().filter_map(|m| m.selection.current()).collect()
    }

    /// Selected frames of every movie, in row then frame order
    pub fn selected_frames(&self) -> Vec<FrameId> {
        self.movies().flat_map(|m| m.selected_frames()).collect()
    }

    pub fn all_frames(&self) -> impl Iterator<Item = &Frame> {
        self.movies().flat_map(|m| m.frames.iter())
    }

    /// Box around the visible, selected frames: what the camera should fit
    pub fn selected_bounding_box(&self) -> Option<BoundingBox> {
        let boxes: Vec<BoundingBox> = self
            .movies()
            .flat_map(|m| {
                m.frames
                    .iter()
                    .filter(|f| f.is_visible && m.selection.contains(&f.id))
                    .map(|f| f.payload.bounding_box)
            })
            .collect();
        BoundingBox::enclosing(&boxes)
    }

    pub fn selection_snapshot(&self) -> SelectionSnapshot {
        SelectionSnapshot {
            scenes: self.selection.clone(),
            movies: self
                .scenes
                .iter()
                .map(|s| (s.id, s.selection.clone()))
                .collect(),
            frames: self
                .movies()
                .map(|m| (m.id, m.selection.clone()))
                .collect(),
            current_frame_index: self.current_frame_index,
        }
    }

    /// Restore every selection from a snapshot. Entities the snapshot does not
    /// know get an empty selection; members that no longer exist are dropped.
    pub fn restore_selection(&mut self, snapshot: &SelectionSnapshot) {
        self.selection = snapshot.scenes.clone();
        for scene in &mut self.scenes {
            scene.selection = snapshot.movies.get(&scene.id).cloned().unwrap_or_default();
            for movie in &mut scene.movies {
                movie.selection = snapshot.frames.get(&movie.id).cloned().unwrap_or_default();
            }
        }
        self.current_frame_index = snapshot.current_frame_index;
        self.prune_selections();
    }

    /// Re-establish `selection ⊆ container` at every level
    pub fn prune_selections(&mut self) {
        let scene_ids: Vec<SceneId> = self.scenes.iter().map(|s| s.id).collect();
        self.selection.retain_within(&scene_ids);
        for scene in &mut self.scenes {
            scene.prune_selection();
            for movie in &mut scene.movies {
                movie.prune_selection();
            }
        }
    }

    pub fn check_invariants(&self) -> Result<(), SceneError> {
        if !self.selection.is_consistent_with(self.scene_ids()) {
            return Err(SceneError::SelectionInvariant(format!(
                "scene selection of {:?}",
                self.display_name
            )));
        }
        for scene in &self.scenes {
            if !scene.selection.is_consistent_with(scene.movie_ids()) {
                return Err(SceneError::SelectionInvariant(format!(
                    "movie selection of scene {}",
                    scene.id
                )));
            }
            for movie in &scene.movies {
                if !movie.selection.is_consistent_with(movie.frame_ids()) {
                    return Err(SceneError::SelectionInvariant(format!(
                        "frame selection of movie {}",
                        movie.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Deep copy under new identities, selections remapped
    pub fn with_fresh_ids(mut self) -> Self {
        let mut remap = HashMap::new();
        let scenes = std::mem::take(&mut self.scenes);
        for scene in scenes {
            let old = scene.id;
            let scene = scene.with_fresh_ids();
            remap.insert(old, scene.id);
            self.scenes.push(scene);
        }
        let current = self.selection.current().and_then(|id| remap.get(&id).copied());
        let additional: Vec<SceneId> = self
            .selection
            .additional()
            .iter()
            .filter_map(|id| remap.get(id).copied())
            .collect();
        self.selection = SelectionSet::from_parts(current, additional);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(name: &str, x: f64) -> Frame {
        Frame::new(
            name,
            FramePayload::new(
                FormatTag::Native,
                3,
                BoundingBox::new([x, 0.0, 0.0], [x + 1.0, 1.0, 1.0]),
            ),
        )
    }

    fn movie(name: &str, n: usize) -> Movie {
        Movie::with_frames(
            name,
            (0..n).map(|i| frame(&format!("{name}-{i}"), i as f64)).collect(),
        )
    }

    fn list() -> SceneList {
        SceneList::with_scenes(
            "list",
            vec![
                Scene::with_movies("a", vec![movie("a0", 3), movie("a1", 1)]),
                Scene::with_movies("b", vec![movie("b0", 5)]),
            ],
        )
    }

    #[test]
    fn rows_span_all_scenes() {
        let list = list();
        assert_eq!(list.row_for_section_tuple(0, 0), 0);
        assert_eq!(list.row_for_section_tuple(0, 1), 1);
        assert_eq!(list.row_for_section_tuple(1, 0), 2);
        assert_eq!(list.section_tuple_for_row(2), Some((1, 0)));
        assert_eq!(list.section_tuple_for_row(3), None);
        let b0 = list.scenes[1].movies[0].id;
        assert_eq!(list.row_for_movie(b0), Some(2));
    }

    #[test]
    fn synchronize_clamps_to_last_frame() {
        let mut list = list();
        list.synchronize_all_movie_frames(2);
        let indices: Vec<Option<usize>> =
            list.movies().map(|m| m.selected_frame_index()).collect();
        assert_eq!(indices, vec![Some(2), Some(0), Some(2)]);
        assert_eq!(list.current_frame_index, Some(2));
        list.check_invariants().unwrap();
    }

    #[test]
    fn advance_stops_at_end() {
        let mut list = list();
        list.set_all_movie_frames_to_beginning();
        list.advance_all_movie_frames();
        list.advance_all_movie_frames();
        list.advance_all_movie_frames();
        let indices: Vec<Option<usize>> =
            list.movies().map(|m| m.selected_frame_index()).collect();
        assert_eq!(indices, vec![Some(2), Some(0), Some(3)]);
        assert_eq!(list.current_frame_index, Some(3));
        for _ in 0..4 {
            list.advance_all_movie_frames();
        }
        let indices: Vec<Option<usize>> =
            list.movies().map(|m| m.selected_frame_index()).collect();
        assert_eq!(indices, vec![Some(2), Some(0), Some(4)]);
        assert_eq!(list.current_frame_index, Some(4));
        list.set_all_movie_frames_to_end();
        assert_eq!(list.current_frame_index, Some(4));
        assert_eq!(list.maximum_number_of_frames(), Some(5));
    }

    #[test]
    fn snapshot_round_trip_restores_every_level() {
        let mut list = list();
        let before = list.selection_snapshot();
        list.synchronize_all_movie_frames(1);
        list.selection.clear();
        list.scenes[0].selection.clear();
        list.restore_selection(&before);
        assert_eq!(list.selection_snapshot(), before);
    }

    #[test]
    fn visibility_is_majority_of_frames() {
        let mut m = movie("m", 4);
        assert!(m.is_visible());
        m.frames[0].is_visible = false;
        m.frames[1].is_visible = false;
        assert!(m.is_visible());
        m.frames[2].is_visible = false;
        assert!(!m.is_visible());
    }

    #[test]
    fn selected_bounding_box_skips_hidden_frames() {
        let mut list = list();
        list.synchronize_all_movie_frames(0);
        let bbox = list.selected_bounding_box().unwrap();
        assert_eq!(bbox.min, [0.0, 0.0, 0.0]);
        assert_eq!(bbox.max, [1.0, 1.0, 1.0]);
        for movie in list.movies_mut() {
            for frame in &mut movie.frames {
                frame.is_visible = false;
            }
        }
        assert!(list.selected_bounding_box().is_none());
    }

    #[test]
    fn fresh_ids_keep_selection_shape() {
        let list = list();
        let copy = list.clone().with_fresh_ids();
        assert_ne!(copy.scenes[0].id, list.scenes[0].id);
        assert_ne!(copy.scenes[0].movies[0].frames[0].id, list.scenes[0].movies[0].frames[0].id);
        assert_eq!(copy.selected_scene().map(|s| s.display_name.as_str()), Some("a"));
        assert_eq!(copy.scenes[0].movies[0].selected_frame_index(), Some(0));
        copy.check_invariants().unwrap();
    }

    #[test]
    fn format_from_path() {
        assert_eq!(FormatTag::from_path(Path::new("x/POSCAR")), Some(FormatTag::PlaneWaveInput));
        assert_eq!(FormatTag::from_path(Path::new("XDATCAR")), Some(FormatTag::PointTrajectory));
        assert_eq!(FormatTag::from_path(Path::new("a.CIF")), Some(FormatTag::Crystallographic));
        assert_eq!(FormatTag::from_path(Path::new("a.pdb")), Some(FormatTag::Molecular));
        assert_eq!(FormatTag::from_path(Path::new("a.txt")), None);
    }
}
