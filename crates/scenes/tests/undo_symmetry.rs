use scenes::edit_operations::{
    insert_frames, insert_movies, insert_scenes, move_frames, move_movies, remove_frames,
    remove_movies, remove_scenes, rename, MovieDestination, SceneHistory,
};
use scenes::{BoundingBox, FormatTag, Frame, FramePayload, Movie, NodeRef, Scene, SceneList};

fn frame(name: &str) -> Frame {
    Frame::new(
        name,
        FramePayload::new(FormatTag::Molecular, 4, BoundingBox::new([0.0; 3], [1.0; 3])),
    )
}

fn movie(name: &str, frames: &[&str]) -> Movie {
    Movie::with_frames(name, frames.iter().map(|f| frame(f)).collect())
}

fn sample() -> SceneList {
    SceneList::with_scenes(
        "project",
        vec![
            Scene::with_movies(
                "A",
                vec![movie("m0", &["f0", "f1", "f2"]), movie("m1", &["g0"])],
            ),
            Scene::with_movies("B", vec![movie("m2", &["h0", "h1"])]),
        ],
    )
}

/// Apply `edit`, check invariants, undo, compare, redo, compare.
fn assert_undo_symmetry(edit: impl FnOnce(&mut SceneHistory, &mut SceneList)) {
    let mut list = sample();
    let mut history = SceneHistory::new();
    let before = list.clone();
    edit(&mut history, &mut list);
    list.check_invariants().unwrap();
    let after = list.clone();
    assert!(history.can_undo());
    history.undo(&mut list).unwrap();
    assert_eq!(list, before);
    assert_eq!(list.selection_snapshot(), before.selection_snapshot());
    history.redo(&mut list).unwrap();
    assert_eq!(list, after);
}

#[test]
fn frame_edits_undo_exactly() {
    assert_undo_symmetry(|h, l| {
        let movie = l.scenes[0].movies[1].id;
        insert_frames(h, l, movie, 0, vec![frame("new"), frame("new2")]).unwrap();
    });
    assert_undo_symmetry(|h, l| {
        let ids = [l.scenes[0].movies[0].frames[0].id, l.scenes[0].movies[0].frames[2].id];
        remove_frames(h, l, &ids).unwrap();
    });
    assert_undo_symmetry(|h, l| {
        let id = l.scenes[0].movies[0].frames[0].id;
        let dest = l.scenes[1].movies[0].id;
        move_frames(h, l, &[id], dest, 2).unwrap();
    });
}

#[test]
fn movie_edits_undo_exactly() {
    assert_undo_symmetry(|h, l| {
        let scene = l.scenes[1].id;
        insert_movies(h, l, scene, 1, vec![movie("fresh", &["x"])]).unwrap();
    });
    assert_undo_symmetry(|h, l| {
        let id = l.scenes[0].movies[0].id;
        remove_movies(h, l, &[id]).unwrap();
    });
    assert_undo_symmetry(|h, l| {
        let id = l.scenes[0].movies[0].id;
        let scene = l.scenes[0].id;
        move_movies(h, l, &[id], MovieDestination::Scene(scene), 2).unwrap();
    });
}

#[test]
fn scene_edits_and_renames_undo_exactly() {
    assert_undo_symmetry(|h, l| {
        insert_scenes(h, l, 0, vec![Scene::with_movies("C", vec![movie("m3", &["k"])])]).unwrap();
    });
    assert_undo_symmetry(|h, l| {
        let id = l.scenes[1].id;
        remove_scenes(h, l, &[id]).unwrap();
    });
    assert_undo_symmetry(|h, l| {
        let id = l.scenes[0].movies[0].frames[1].id;
        assert!(rename(h, l, NodeRef::Frame(id), "renamed").unwrap());
    });
}

#[test]
fn removing_selected_frame_clears_current_and_undo_brings_it_back() {
    let mut list = sample();
    let mut history = SceneHistory::new();
    let f1 = list.scenes[0].movies[0].frames[1].id;
    list.scenes[0].movies[0].selection.select_only(f1);

    remove_frames(&mut history, &mut list, &[f1]).unwrap();
    let movie = &list.scenes[0].movies[0];
    assert_eq!(movie.selection.current(), None);
    assert!(movie.selection.is_empty());

    history.undo(&mut list).unwrap();
    let movie = &list.scenes[0].movies[0];
    assert_eq!(movie.frames[1].id, f1);
    assert_eq!(movie.selection.current(), Some(f1));
}

#[test]
fn removing_last_movie_prunes_scene_in_one_undo_step() {
    let mut list = sample();
    let mut history = SceneHistory::new();
    let b = list.scenes[1].id;
    let m2 = list.scenes[1].movies[0].id;

    remove_movies(&mut history, &mut list, &[m2]).unwrap();
    assert_eq!(list.scenes.len(), 1);
    assert!(list.scene(b).is_none());
    assert_eq!(history.undo_depth(), 1);

    history.undo(&mut list).unwrap();
    assert_eq!(list.scene_index(b), Some(1));
    assert_eq!(list.movie_index_path(m2), Some((1, 0)));
    assert!(!history.can_undo());
}

#[test]
fn selection_invariants_hold_through_edit_sequences() {
    let mut list = sample();
    let mut history = SceneHistory::new();
    let m0 = list.scenes[0].movies[0].id;
    let ids: Vec<_> = list.scenes[0].movies[0].frames.iter().map(|f| f.id).collect();
    list.scenes[0].movies[0].selection =
        scenes::SelectionSet::from_parts(Some(ids[2]), ids.iter().copied());

    remove_frames(&mut history, &mut list, &ids[1..]).unwrap();
    list.check_invariants().unwrap();
    insert_frames(&mut history, &mut list, m0, 1, vec![frame("z")]).unwrap();
    list.check_invariants().unwrap();
    let m1 = list.scenes[0].movies[1].id;
    remove_movies(&mut history, &mut list, &[m0, m1]).unwrap();
    list.check_invariants().unwrap();
    assert_eq!(list.scenes.len(), 1);

    while history.can_undo() {
        history.undo(&mut list).unwrap();
        list.check_invariants().unwrap();
    }
    assert_eq!(list.scenes[0].movies[0].selection.current(), Some(ids[2]));
}
