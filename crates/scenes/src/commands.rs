use crate::{
    Command, Frame, FrameId, Movie, MovieId, Scene, SceneError, SceneId, SceneList,
    SelectionSnapshot,
};

/// Addressable node of a scene list, used by renames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    SceneList,
    Scene(SceneId),
    Movie(MovieId),
    Frame(FrameId),
}

/// Primitive mutation of a scene list. Applying one returns its inverse.
///
/// Move indices are positions in the destination *after* the moved item has
/// been taken out of its source, so the inverse of a move is always the move
/// back to the recorded source index.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneCommand {
    InsertFrame {
        movie_id: MovieId,
        index: usize,
        frame: Frame,
    },
    RemoveFrame {
        frame_id: FrameId,
    },
    MoveFrame {
        frame_id: FrameId,
        to_movie: MovieId,
        index: usize,
    },
    InsertMovie {
        scene_id: SceneId,
        index: usize,
        movie: Movie,
    },
    RemoveMovie {
        movie_id: MovieId,
    },
    MoveMovie {
        movie_id: MovieId,
        to_scene: SceneId,
        index: usize,
    },
    InsertScene {
        index: usize,
        scene: Scene,
    },
    RemoveScene {
        scene_id: SceneId,
    },
    MoveScene {
        scene_id: SceneId,
        index: usize,
    },
    Rename {
        target: NodeRef,
        name: String,
    },
    SetMovieVisibility {
        movie_id: MovieId,
        frames: Vec<bool>,
    },
    RestoreSelection {
        snapshot: SelectionSnapshot,
    },
}

impl Command for SceneCommand {
    type Target = SceneList;
    type Error = SceneError;

    fn apply(self, target: &mut SceneList) -> Result<Self, SceneError> {
        apply_command(target, self)
    }

    fn capture(target: &SceneList) -> Option<Self> {
        Some(SceneCommand::RestoreSelection {
            snapshot: target.selection_snapshot(),
        })
    }
}

pub fn apply_command(
    list: &mut SceneList,
    command: SceneCommand,
) -> Result<SceneCommand, SceneError> {
    match command {
        SceneCommand::InsertFrame {
            movie_id,
            index,
            frame,
        } => insert_frame(list, movie_id, index, frame),
        SceneCommand::RemoveFrame { frame_id } => remove_frame(list, frame_id),
        SceneCommand::MoveFrame {
            frame_id,
            to_movie,
            index,
        } => move_frame(list, frame_id, to_movie, index),
        SceneCommand::InsertMovie {
            scene_id,
            index,
            movie,
        } => insert_movie(list, scene_id, index, movie),
        SceneCommand::RemoveMovie { movie_id } => remove_movie(list, movie_id),
        SceneCommand::MoveMovie {
            movie_id,
            to_scene,
            index,
        } => move_movie(list, movie_id, to_scene, index),
        SceneCommand::InsertScene { index, scene } => insert_scene(list, index, scene),
        SceneCommand::RemoveScene { scene_id } => remove_scene(list, scene_id),
        SceneCommand::MoveScene { scene_id, index } => move_scene(list, scene_id, index),
        SceneCommand::Rename { target, name } => rename(list, target, name),
        SceneCommand::SetMovieVisibility { movie_id, frames } => {
            set_movie_visibility(list, movie_id, frames)
        }
        SceneCommand::RestoreSelection { snapshot } => {
            let previous = list.selection_snapshot();
            list.restore_selection(&snapshot);
            Ok(SceneCommand::RestoreSelection { snapshot: previous })
        }
    }
}

fn check_index(index: usize, len: usize) -> Result<(), SceneError> {
    if index > len {
        return Err(SceneError::IndexOutOfRange { index, len });
    }
    Ok(())
}

fn insert_frame(
    list: &mut SceneList,
    movie_id: MovieId,
    index: usize,
    frame: Frame,
) -> Result<SceneCommand, SceneError> {
    if list.frame_location(frame.id).is_some() {
        return Err(SceneError::FrameExists(frame.id));
    }
    let movie = list
        .movie_mut(movie_id)
        .ok_or(SceneError::MovieNotFound(movie_id))?;
    check_index(index, movie.frames.len())?;
    let frame_id = frame.id;
    movie.frames.insert(index, frame);
    Ok(SceneCommand::RemoveFrame { frame_id })
}

fn remove_frame(list: &mut SceneList, frame_id: FrameId) -> Result<SceneCommand, SceneError> {
    let (s, m, f) = list
        .frame_location(frame_id)
        .ok_or(SceneError::FrameNotFound(frame_id))?;
    let movie = &mut list.scenes[s].movies[m];
    let frame = movie.frames.remove(f);
    movie.selection.remove(&frame_id);
    Ok(SceneCommand::InsertFrame {
        movie_id: movie.id,
        index: f,
        frame,
    })
}

fn move_frame(
    list: &mut SceneList,
    frame_id: FrameId,
    to_movie: MovieId,
    index: usize,
) -> Result<SceneCommand, SceneError> {
    let (s, m, f) = list
        .frame_location(frame_id)
        .ok_or(SceneError::FrameNotFound(frame_id))?;
    let (ds, dm) = list
        .movie_index_path(to_movie)
        .ok_or(SceneError::MovieNotFound(to_movie))?;
    let source_id = list.scenes[s].movies[m].id;
    let dest_len = list.scenes[ds].movies[dm].frames.len();
    let len_after_removal = if source_id == to_movie {
        dest_len - 1
    } else {
        dest_len
    };
    check_index(index, len_after_removal)?;

    let source = &mut list.scenes[s].movies[m];
    let frame = source.frames.remove(f);
    let was_selected = source.selection.remove(&frame_id);
    let dest = &mut list.scenes[ds].movies[dm];
    dest.frames.insert(index, frame);
    if was_selected {
        dest.selection.insert(frame_id);
    }
    Ok(SceneCommand::MoveFrame {
        frame_id,
        to_movie: source_id,
        index: f,
    })
}

fn insert_movie(
    list: &mut SceneList,
    scene_id: SceneId,
    index: usize,
    movie: Movie,
) -> Result<SceneCommand, SceneError> {
    if list.movie_index_path(movie.id).is_some() {
        return Err(SceneError::MovieExists(movie.id));
    }
    if let Some(frame) = movie
        .frames
        .iter()
        .find(|f| list.frame_location(f.id).is_some())
    {
        return Err(SceneError::FrameExists(frame.id));
    }
    let scene = list
        .scene_mut(scene_id)
        .ok_or(SceneError::SceneNotFound(scene_id))?;
    check_index(index, scene.movies.len())?;
    let movie_id = movie.id;
    scene.movies.insert(index, movie);
    Ok(SceneCommand::RemoveMovie { movie_id })
}

fn remove_movie(list: &mut SceneList, movie_id: MovieId) -> Result<SceneCommand, SceneError> {
    let (s, m) = list
        .movie_index_path(movie_id)
        .ok_or(SceneError::MovieNotFound(movie_id))?;
    let scene = &mut list.scenes[s];
    let movie = scene.movies.remove(m);
    scene.selection.remove(&movie_id);
    Ok(SceneCommand::InsertMovie {
        scene_id: scene.id,
        index: m,
        movie,
    })
}

fn move_movie(
    list: &mut SceneList,
    movie_id: MovieId,
    to_scene: SceneId,
    index: usize,
) -> Result<SceneCommand, SceneError> {
    let (s, m) = list
        .movie_index_path(movie_id)
        .ok_or(SceneError::MovieNotFound(movie_id))?;
    let ds = list
        .scene_index(to_scene)
        .ok_or(SceneError::SceneNotFound(to_scene))?;
    let source_id = list.scenes[s].id;
    let dest_len = list.scenes[ds].movies.len();
    let len_after_removal = if s == ds { dest_len - 1 } else { dest_len };
    check_index(index, len_after_removal)?;

    let source = &mut list.scenes[s];
    let movie = source.movies.remove(m);
    let was_selected = source.selection.remove(&movie_id);
    let dest = &mut list.scenes[ds];
    dest.movies.insert(index, movie);
    if was_selected {
        dest.selection.insert(movie_id);
    }
    Ok(SceneCommand::MoveMovie {
        movie_id,
        to_scene: source_id,
        index: m,
    })
}

fn insert_scene(list: &mut SceneList, index: usize, scene: Scene) -> Result<SceneCommand, SceneError> {
    if list.scene_index(scene.id).is_some() {
        return Err(SceneError::SceneExists(scene.id));
    }
    for movie in &scene.movies {
        if list.movie_index_path(movie.id).is_some() {
            return Err(SceneError::MovieExists(movie.id));
        }
        if let Some(frame) = movie
            .frames
            .iter()
            .find(|f| list.frame_location(f.id).is_some())
        {
            return Err(SceneError::FrameExists(frame.id));
        }
    }
    check_index(index, list.scenes.len())?;
    let scene_id = scene.id;
    list.scenes.insert(index, scene);
    Ok(SceneCommand::RemoveScene { scene_id })
}

fn remove_scene(list: &mut SceneList, scene_id: SceneId) -> Result<SceneCommand, SceneError> {
    let index = list
        .scene_index(scene_id)
        .ok_or(SceneError::SceneNotFound(scene_id))?;
    let scene = list.scenes.remove(index);
    list.selection.remove(&scene_id);
    Ok(SceneCommand::InsertScene { index, scene })
}

fn move_scene(list: &mut SceneList, scene_id: SceneId, index: usize) -> Result<SceneCommand, SceneError> {
    let current = list
        .scene_index(scene_id)
        .ok_or(SceneError::SceneNotFound(scene_id))?;
    check_index(index, list.scenes.len() - 1)?;
    let scene = list.scenes.remove(current);
    list.scenes.insert(index, scene);
    Ok(SceneCommand::MoveScene {
        scene_id,
        index: current,
    })
}

fn rename(list: &mut SceneList, target: NodeRef, name: String) -> Result<SceneCommand, SceneError> {
    let slot = match target {
        NodeRef::SceneList => &mut list.display_name,
        NodeRef::Scene(id) => {
            &mut list
                .scene_mut(id)
                .ok_or(SceneError::SceneNotFound(id))?
                .display_name
        }
        NodeRef::Movie(id) => {
            &mut list
                .movie_mut(id)
                .ok_or(SceneError::MovieNotFound(id))?
                .display_name
        }
        NodeRef::Frame(id) => {
            &mut list
                .frame_mut(id)
                .ok_or(SceneError::FrameNotFound(id))?
                .display_name
        }
    };
    let previous = std::mem::replace(slot, name);
    Ok(SceneCommand::Rename {
        target,
        name: previous,
    })
}

fn set_movie_visibility(
    list: &mut SceneList,
    movie_id: MovieId,
    frames: Vec<bool>,
) -> Result<SceneCommand, SceneError> {
    let movie = list
        .movie_mut(movie_id)
        .ok_or(SceneError::MovieNotFound(movie_id))?;
    if frames.len() != movie.frames.len() {
        return Err(SceneError::InvalidOp(format!(
            "visibility for {} frames given to movie with {}",
            frames.len(),
            movie.frames.len()
        )));
    }
    let previous = movie.frame_visibility();
    for (frame, visible) in movie.frames.iter_mut().zip(frames) {
        frame.is_visible = visible;
    }
    Ok(SceneCommand::SetMovieVisibility {
        movie_id,
        frames: previous,
    })
}
