//! Grouped edit operations on a scene list.
//!
//! Every function here runs as one undo step on the given history. The
//! primitive commands it applies are recorded together with the selection
//! before and after, and a failure part-way leaves the list untouched.
use crate::{
    CommandHistory, Frame, FrameId, Movie, MovieId, NodeRef, Scene, SceneCommand, SceneError,
    SceneId, SceneList, SelectionSet, Transaction,
};

pub type SceneHistory = CommandHistory<SceneCommand>;

/// Index to insert at once the item at `source` has been removed, when the
/// caller means "put it in the gap before `target`" of the untouched
/// sequence. Every same-parent move goes through here.
pub fn adjusted_insertion_index(source: usize, target: usize) -> usize {
    if target > source {
        target - 1
    } else {
        target
    }
}

/// Where moved movies should land
#[derive(Debug, Clone, PartialEq)]
pub enum MovieDestination {
    Scene(SceneId),
    /// Create a scene at `index` of the scene list first
    NewScene { index: usize, name: String },
}

pub fn insert_frames(
    history: &mut SceneHistory,
    list: &mut SceneList,
    movie_id: MovieId,
    index: usize,
    frames: Vec<Frame>,
) -> Result<(), SceneError> {
    if frames.is_empty() {
        return Ok(());
    }
    let movie = list.movie(movie_id).ok_or(SceneError::MovieNotFound(movie_id))?;
    if index > movie.frames.len() {
        return Err(SceneError::IndexOutOfRange {
            index,
            len: movie.frames.len(),
        });
    }
    let ids: Vec<FrameId> = frames.iter().map(|f| f.id).collect();
    history.transact(list, "Insert Frames", |tx| {
        for (offset, frame) in frames.into_iter().enumerate() {
            tx.apply(SceneCommand::InsertFrame {
                movie_id,
                index: index + offset,
                frame,
            })?;
        }
        if let Some(movie) = tx.target_mut().movie_mut(movie_id) {
            movie.selection = SelectionSet::from_parts(ids.first().copied(), ids.iter().copied());
        }
        Ok(())
    })
}

pub fn remove_frames(
    history: &mut SceneHistory,
    list: &mut SceneList,
    frame_ids: &[FrameId],
) -> Result<(), SceneError> {
    if frame_ids.is_empty() {
        return Ok(());
    }
    if let Some(missing) = frame_ids.iter().find(|id| list.frame_location(**id).is_none()) {
        return Err(SceneError::FrameNotFound(*missing));
    }
    history.transact(list, "Remove Frames", |tx| {
        for frame_id in frame_ids {
            tx.apply(SceneCommand::RemoveFrame {
                frame_id: *frame_id,
            })?;
        }
        Ok(())
    })
}

/// Move frames, in the given order, into the gap before `target` of
/// `to_movie` (`target == len` appends). Moved frames become the
/// destination's selection.
pub fn move_frames(
    history: &mut SceneHistory,
    list: &mut SceneList,
    frame_ids: &[FrameId],
    to_movie: MovieId,
    target: usize,
) -> Result<(), SceneError> {
    if frame_ids.is_empty() {
        return Ok(());
    }
    let dest = list.movie(to_movie).ok_or(SceneError::MovieNotFound(to_movie))?;
    if target > dest.frames.len() {
        return Err(SceneError::IndexOutOfRange {
            index: target,
            len: dest.frames.len(),
        });
    }
    history.transact(list, "Move Frames", |tx| {
        let mut target = target;
        for frame_id in frame_ids {
            let (s, m, f) = tx
                .target()
                .frame_location(*frame_id)
                .ok_or(SceneError::FrameNotFound(*frame_id))?;
            let same_parent = tx.target().scenes[s].movies[m].id == to_movie;
            let index = if same_parent {
                adjusted_insertion_index(f, target)
            } else {
                target
            };
            tx.apply(SceneCommand::MoveFrame {
                frame_id: *frame_id,
                to_movie,
                index,
            })?;
            target = index + 1;
        }
        if let Some(movie) = tx.target_mut().movie_mut(to_movie) {
            movie.selection =
                SelectionSet::from_parts(frame_ids.first().copied(), frame_ids.iter().copied());
        }
        Ok(())
    })
}

pub fn insert_movies(
    history: &mut SceneHistory,
    list: &mut SceneList,
    scene_id: SceneId,
    index: usize,
    movies: Vec<Movie>,
) -> Result<(), SceneError> {
    if movies.is_empty() {
        return Ok(());
    }
    let scene = list.scene(scene_id).ok_or(SceneError::SceneNotFound(scene_id))?;
    if index > scene.movies.len() {
        return Err(SceneError::IndexOutOfRange {
            index,
            len: scene.movies.len(),
        });
    }
    let ids: Vec<MovieId> = movies.iter().map(|m| m.id).collect();
    history.transact(list, "Insert Movies", |tx| {
        for (offset, movie) in movies.into_iter().enumerate() {
            tx.apply(SceneCommand::InsertMovie {
                scene_id,
                index: index + offset,
                movie,
            })?;
        }
        select_movies(tx, scene_id, &ids);
        Ok(())
    })
}

/// Remove movies; scenes left without movies are pruned in the same step
pub fn remove_movies(
    history: &mut SceneHistory,
    list: &mut SceneList,
    movie_ids: &[MovieId],
) -> Result<(), SceneError> {
    if movie_ids.is_empty() {
        return Ok(());
    }
    if let Some(missing) = movie_ids
        .iter()
        .find(|id| list.movie_index_path(**id).is_none())
    {
        return Err(SceneError::MovieNotFound(*missing));
    }
    history.transact(list, "Remove Movies", |tx| {
        for movie_id in movie_ids {
            tx.apply(SceneCommand::RemoveMovie {
                movie_id: *movie_id,
            })?;
        }
        prune_empty_scenes(tx)
    })
}

/// Move movies into the gap before `target` of the destination scene. A new
/// scene destination is created empty first, so `target` is ignored for it.
pub fn move_movies(
    history: &mut SceneHistory,
    list: &mut SceneList,
    movie_ids: &[MovieId],
    destination: MovieDestination,
    target: usize,
) -> Result<(), SceneError> {
    if movie_ids.is_empty() {
        return Ok(());
    }
    if let Some(missing) = movie_ids
        .iter()
        .find(|id| list.movie_index_path(**id).is_none())
    {
        return Err(SceneError::MovieNotFound(*missing));
    }
    match &destination {
        MovieDestination::Scene(scene_id) => {
            let scene = list.scene(*scene_id).ok_or(SceneError::SceneNotFound(*scene_id))?;
            if target > scene.movies.len() {
                return Err(SceneError::IndexOutOfRange {
                    index: target,
                    len: scene.movies.len(),
                });
            }
        }
        MovieDestination::NewScene { index, .. } => {
            if *index > list.scenes.len() {
                return Err(SceneError::IndexOutOfRange {
                    index: *index,
                    len: list.scenes.len(),
                });
            }
        }
    }
    history.transact(list, "Move Movies", |tx| {
        let (to_scene, mut target) = match destination {
            MovieDestination::Scene(scene_id) => (scene_id, target),
            MovieDestination::NewScene { index, name } => {
                let scene = Scene::new(name);
                let scene_id = scene.id;
                tx.apply(SceneCommand::InsertScene { index, scene })?;
                (scene_id, 0)
            }
        };
        for movie_id in movie_ids {
            let (s, m) = tx
                .target()
                .movie_index_path(*movie_id)
                .ok_or(SceneError::MovieNotFound(*movie_id))?;
            let same_parent = tx.target().scenes[s].id == to_scene;
            let index = if same_parent {
                adjusted_insertion_index(m, target)
            } else {
                target
            };
            tx.apply(SceneCommand::MoveMovie {
                movie_id: *movie_id,
                to_scene,
                index,
            })?;
            target = index + 1;
        }
        prune_empty_scenes(tx)?;
        select_movies(tx, to_scene, movie_ids);
        Ok(())
    })
}

pub fn insert_scenes(
    history: &mut SceneHistory,
    list: &mut SceneList,
    index: usize,
    scenes: Vec<Scene>,
) -> Result<(), SceneError> {
    if scenes.is_empty() {
        return Ok(());
    }
    if index > list.scenes.len() {
        return Err(SceneError::IndexOutOfRange {
            index,
            len: list.scenes.len(),
        });
    }
    let ids: Vec<SceneId> = scenes.iter().map(|s| s.id).collect();
    history.transact(list, "Insert Scenes", |tx| {
        for (offset, scene) in scenes.into_iter().enumerate() {
            tx.apply(SceneCommand::InsertScene {
                index: index + offset,
                scene,
            })?;
        }
        tx.target_mut().selection =
            SelectionSet::from_parts(ids.first().copied(), ids.iter().copied());
        Ok(())
    })
}

pub fn remove_scenes(
    history: &mut SceneHistory,
    list: &mut SceneList,
    scene_ids: &[SceneId],
) -> Result<(), SceneError> {
    if scene_ids.is_empty() {
        return Ok(());
    }
    if let Some(missing) = scene_ids.iter().find(|id| list.scene_index(**id).is_none()) {
        return Err(SceneError::SceneNotFound(*missing));
    }
    history.transact(list, "Remove Scenes", |tx| {
        for scene_id in scene_ids {
            tx.apply(SceneCommand::RemoveScene {
                scene_id: *scene_id,
            })?;
        }
        Ok(())
    })
}

pub fn move_scenes(
    history: &mut SceneHistory,
    list: &mut SceneList,
    scene_ids: &[SceneId],
    target: usize,
) -> Result<(), SceneError> {
    if scene_ids.is_empty() {
        return Ok(());
    }
    if target > list.scenes.len() {
        return Err(SceneError::IndexOutOfRange {
            index: target,
            len: list.scenes.len(),
        });
    }
    history.transact(list, "Move Scenes", |tx| {
        let mut target = target;
        for scene_id in scene_ids {
            let source = tx
                .target()
                .scene_index(*scene_id)
                .ok_or(SceneError::SceneNotFound(*scene_id))?;
            let index = adjusted_insertion_index(source, target);
            tx.apply(SceneCommand::MoveScene {
                scene_id: *scene_id,
                index,
            })?;
            target = index + 1;
        }
        Ok(())
    })
}

/// Rename any node. Returns `false` when the name is unchanged and nothing
/// was recorded.
pub fn rename(
    history: &mut SceneHistory,
    list: &mut SceneList,
    target: NodeRef,
    name: impl Into<String>,
) -> Result<bool, SceneError> {
    let name = name.into();
    let unchanged = match target {
        NodeRef::SceneList => Some(&list.display_name),
        NodeRef::Scene(id) => list.scene(id).map(|s| &s.display_name),
        NodeRef::Movie(id) => list.movie(id).map(|m| &m.display_name),
        NodeRef::Frame(id) => list.frame(id).map(|f| &f.display_name),
    }
    .map(|current| *current == name)
    .ok_or_else(|| SceneError::InvalidOp(format!("no node {target:?} to rename")))?;
    if unchanged {
        return Ok(false);
    }
    history.apply(list, "Rename", SceneCommand::Rename { target, name })?;
    Ok(true)
}

/// Show or hide every frame of a movie. Returns `false` when nothing changes.
pub fn set_movie_visibility(
    history: &mut SceneHistory,
    list: &mut SceneList,
    movie_id: MovieId,
    visible: bool,
) -> Result<bool, SceneError> {
    let movie = list.movie(movie_id).ok_or(SceneError::MovieNotFound(movie_id))?;
    if movie.frames.iter().all(|f| f.is_visible == visible) {
        return Ok(false);
    }
    let frames = vec![visible; movie.frames.len()];
    let label = if visible { "Show Movie" } else { "Hide Movie" };
    history.apply(
        list,
        label,
        SceneCommand::SetMovieVisibility { movie_id, frames },
    )?;
    Ok(true)
}

fn prune_empty_scenes(tx: &mut Transaction<'_, SceneCommand>) -> Result<(), SceneError> {
    let empty: Vec<SceneId> = tx
        .target()
        .scenes
        .iter()
        .rev()
        .filter(|s| s.movies.is_empty())
        .map(|s| s.id)
        .collect();
    for scene_id in empty {
        tx.apply(SceneCommand::RemoveScene { scene_id })?;
    }
    Ok(())
}

fn select_movies(tx: &mut Transaction<'_, SceneCommand>, scene_id: SceneId, ids: &[MovieId]) {
    let list = tx.target_mut();
    if let Some(scene) = list.scene_mut(scene_id) {
        scene.selection = SelectionSet::from_parts(ids.first().copied(), ids.iter().copied());
        list.selection.select_only(scene_id);
    }
}
