use project::edit_operations::{insert_placeholder, TreeHistory};
use project::{CancellationToken, LazyStatus, ProjectTree};
use scenes::{Movie, SceneList};

#[test]
fn placeholder_completes_in_place() {
    let mut tree = ProjectTree::new();
    let mut history = TreeHistory::new();
    let root = tree.root();
    let id = insert_placeholder(&mut history, &mut tree, root, 0, "CONTCAR", CancellationToken::new())
        .unwrap();
    let count = tree.len();

    let decoded = SceneList::from_movie("CONTCAR", Movie::new("CONTCAR"));
    let node = tree.node_mut(id).unwrap();
    node.lazy_mut().unwrap().complete(decoded, Some(10)).unwrap();
    node.token = None;

    assert_eq!(tree.len(), count);
    assert_eq!(tree.node(id).unwrap().status(), Some(LazyStatus::Loaded));
    assert_eq!(tree.scene_list(id).unwrap().scenes.len(), 1);
}

#[test]
fn failed_placeholder_stays_in_tree() {
    let mut tree = ProjectTree::new();
    let mut history = TreeHistory::new();
    let root = tree.root();
    let id = insert_placeholder(&mut history, &mut tree, root, 0, "broken.cif", CancellationToken::new())
        .unwrap();

    tree.node_mut(id)
        .unwrap()
        .lazy_mut()
        .unwrap()
        .fail("unexpected end of file")
        .unwrap();

    let node = tree.node(id).unwrap();
    assert_eq!(node.status(), Some(LazyStatus::Error));
    assert_eq!(node.lazy().unwrap().error_reason(), Some("unexpected end of file"));
    assert!(node.scene_list().is_none());
    assert_eq!(tree.flattened_leaf_nodes(), vec![id]);
}
