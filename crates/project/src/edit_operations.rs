//! Undoable edits of the project tree. Editability and structure are checked
//! before anything is applied.
use std::collections::HashSet;

use scenes::{adjusted_insertion_index, CommandHistory, SelectionSet};

use crate::commands::validate_move;
use crate::{
    CancellationToken, DetachedSubtree, ProjectError, ProjectNode, ProjectNodeId, ProjectTree,
    TreeCommand,
};

pub type TreeHistory = CommandHistory<TreeCommand>;

/// Editable group that accepts new children
pub fn check_insertion_target(
    tree: &ProjectTree,
    parent: ProjectNodeId,
) -> Result<(), ProjectError> {
    let node = tree.require(parent)?;
    if !node.is_group() {
        return Err(ProjectError::NotAGroup(parent));
    }
    if !node.is_editable {
        return Err(ProjectError::NotEditable(node.display_name.clone()));
    }
    Ok(())
}

fn check_detachable(tree: &ProjectTree, id: ProjectNodeId) -> Result<(), ProjectError> {
    if id == tree.root() {
        return Err(ProjectError::RootImmutable);
    }
    let node = tree.require(id)?;
    if !node.is_editable {
        return Err(ProjectError::NotEditable(node.display_name.clone()));
    }
    if let Some(parent) = tree.parent(id).and_then(|p| tree.node(p)) {
        if !parent.is_editable {
            return Err(ProjectError::NotEditable(parent.display_name.clone()));
        }
    }
    Ok(())
}

/// Insert subtrees at `index` of `parent`; they become the selection
pub fn insert_subtrees(
    history: &mut TreeHistory,
    tree: &mut ProjectTree,
    parent: ProjectNodeId,
    index: usize,
    subtrees: Vec<DetachedSubtree>,
    label: &str,
) -> Result<Vec<ProjectNodeId>, ProjectError> {
    check_insertion_target(tree, parent)?;
    let len = tree.children(parent).len();
    if index > len {
        return Err(ProjectError::IndexOutOfRange { index, len });
    }
    let ids: Vec<ProjectNodeId> = subtrees.iter().map(|s| s.root_id()).collect();
    if ids.is_empty() {
        return Ok(ids);
    }
    history.transact(tree, label, |tx| {
        for (offset, subtree) in subtrees.into_iter().enumerate() {
            tx.apply(TreeCommand::Insert {
                parent,
                index: index + offset,
                subtree,
            })?;
        }
        tx.target_mut().selection =
            SelectionSet::from_parts(ids.first().copied(), ids.iter().copied());
        Ok(())
    })?;
    Ok(ids)
}

/// Undoable placeholder for content that is decoded elsewhere
pub fn insert_placeholder(
    history: &mut TreeHistory,
    tree: &mut ProjectTree,
    parent: ProjectNodeId,
    index: usize,
    display_name: &str,
    token: CancellationToken,
) -> Result<ProjectNodeId, ProjectError> {
    let mut node = ProjectNode::placeholder(display_name, token);
    node.is_edited = true;
    let ids = insert_subtrees(
        history,
        tree,
        parent,
        index,
        vec![DetachedSubtree::single(node)],
        "Import",
    )?;
    ids.first()
        .copied()
        .ok_or_else(|| ProjectError::InvalidOp("placeholder was not inserted".into()))
}

pub fn new_group(
    history: &mut TreeHistory,
    tree: &mut ProjectTree,
    parent: ProjectNodeId,
    index: usize,
    display_name: &str,
) -> Result<ProjectNodeId, ProjectError> {
    let node = ProjectNode::group(display_name);
    let id = node.id;
    insert_subtrees(
        history,
        tree,
        parent,
        index,
        vec![DetachedSubtree::single(node)],
        "New Group",
    )?;
    Ok(id)
}

/// Nodes that are out of the tree but would come back through an undo or
/// redo of `history`.
pub fn detached_in_history(history: &TreeHistory) -> HashSet<ProjectNodeId> {
    history
        .commands()
        .filter_map(|c| match c {
            TreeCommand::Insert { subtree, .. } => Some(subtree),
            _ => None,
        })
        .flat_map(|s| s.nodes().iter().map(|n| n.id))
        .collect()
}

/// Remove the local roots of `ids` with everything below them. Returns how
/// many subtrees went.
pub fn remove_nodes(
    history: &mut TreeHistory,
    tree: &mut ProjectTree,
    ids: &[ProjectNodeId],
) -> Result<usize, ProjectError> {
    if ids.contains(&tree.root()) {
        return Err(ProjectError::RootImmutable);
    }
    let roots = tree.find_local_roots(ids);
    for id in &roots {
        check_detachable(tree, *id)?;
    }
    if roots.is_empty() {
        return Ok(0);
    }
    history.transact(tree, "Remove", |tx| {
        for id in &roots {
            tx.apply(TreeCommand::Remove { node_id: *id })?;
        }
        Ok(())
    })?;
    Ok(roots.len())
}

/// Move the local roots of `ids`, in tree order, into the gap before
/// `target` of `to_parent`. Moved nodes become the selection.
pub fn move_nodes(
    history: &mut TreeHistory,
    tree: &mut ProjectTree,
    ids: &[ProjectNodeId],
    to_parent: ProjectNodeId,
    target: usize,
) -> Result<(), ProjectError> {
    check_insertion_target(tree, to_parent)?;
    let len = tree.children(to_parent).len();
    if target > len {
        return Err(ProjectError::IndexOutOfRange { index: target, len });
    }
    if ids.contains(&tree.root()) {
        return Err(ProjectError::RootImmutable);
    }
    let roots = tree.find_local_roots(ids);
    for id in &roots {
        check_detachable(tree, *id)?;
        validate_move(tree, *id, to_parent)?;
    }
    if roots.is_empty() {
        return Ok(());
    }
    history.transact(tree, "Move", |tx| {
        let mut target = target;
        for id in &roots {
            let tree = tx.target();
            let index = match tree.index_in_parent(*id) {
                Some(source) if tree.parent(*id) == Some(to_parent) => {
                    adjusted_insertion_index(source, target)
                }
                _ => target,
            };
            tx.apply(TreeCommand::Move {
                node_id: *id,
                to_parent,
                index,
            })?;
            target = index + 1;
        }
        tx.target_mut().selection =
            SelectionSet::from_parts(roots.first().copied(), roots.iter().copied());
        Ok(())
    })
}

/// Returns `false` when the name is unchanged
pub fn rename_node(
    history: &mut TreeHistory,
    tree: &mut ProjectTree,
    id: ProjectNodeId,
    name: &str,
) -> Result<bool, ProjectError> {
    if id == tree.root() {
        return Err(ProjectError::RootImmutable);
    }
    let node = tree.require(id)?;
    if !node.is_editable {
        return Err(ProjectError::NotEditable(node.display_name.clone()));
    }
    if node.display_name == name {
        return Ok(false);
    }
    history.apply(
        tree,
        "Rename",
        TreeCommand::Rename {
            node_id: id,
            name: name.to_string(),
        },
    )?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LazyProject;
    use scenes::SceneList;

    fn project(name: &str) -> DetachedSubtree {
        DetachedSubtree::single(ProjectNode::project(
            name,
            LazyProject::loaded(SceneList::new(name), None),
        ))
    }

    fn names(tree: &ProjectTree, parent: ProjectNodeId) -> Vec<String> {
        tree.children(parent)
            .iter()
            .filter_map(|c| tree.node(*c))
            .map(|n| n.display_name.clone())
            .collect()
    }

    #[test]
    fn sibling_move_uses_adjusted_index() {
        let mut tree = ProjectTree::new();
        let mut history = TreeHistory::new();
        let root = tree.root();
        let ids = insert_subtrees(
            &mut history,
            &mut tree,
            root,
            0,
            vec![project("a"), project("b"), project("c")],
            "Insert",
        )
        .unwrap();
        move_nodes(&mut history, &mut tree, &[ids[0]], root, 3).unwrap();
        assert_eq!(names(&tree, root), vec!["b", "c", "a"]);
        assert_eq!(tree.selection.current(), Some(ids[0]));
        history.undo(&mut tree).unwrap();
        assert_eq!(names(&tree, root), vec!["a", "b", "c"]);
    }

    #[test]
    fn sibling_selections_land_in_the_gap_they_were_dropped_on() {
        for n in [2usize, 3, 4] {
            for mask in 1u32..(1 << n) {
                let picked: Vec<usize> = (0..n).filter(|i| mask & (1 << i) != 0).collect();
                for target in 0..=n {
                    let mut tree = ProjectTree::new();
                    let mut history = TreeHistory::new();
                    let root = tree.root();
                    let originals: Vec<DetachedSubtree> =
                        (0..n).map(|i| project(&i.to_string())).collect();
                    let ids =
                        insert_subtrees(&mut history, &mut tree, root, 0, originals, "Insert")
                            .unwrap();
                    let original = names(&tree, root);
                    // handed over back to front; the move still goes in tree order
                    let selection: Vec<ProjectNodeId> =
                        picked.iter().rev().map(|i| ids[*i]).collect();
                    move_nodes(&mut history, &mut tree, &selection, root, target).unwrap();

                    let mut expected: Vec<String> = (0..n)
                        .filter(|i| !picked.contains(i))
                        .map(|i| original[i].clone())
                        .collect();
                    let gap = target - picked.iter().filter(|i| **i < target).count();
                    for (offset, i) in picked.iter().enumerate() {
                        expected.insert(gap + offset, original[*i].clone());
                    }
                    assert_eq!(
                        names(&tree, root),
                        expected,
                        "n={n} picked={picked:?} target={target}"
                    );
                    history.undo(&mut tree).unwrap();
                    assert_eq!(names(&tree, root), original);
                }
            }
        }
    }

    #[test]
    fn mixed_parent_selection_counts_only_siblings_before_the_gap() {
        let mut tree = ProjectTree::new();
        let mut history = TreeHistory::new();
        let root = tree.root();
        let ids = insert_subtrees(
            &mut history,
            &mut tree,
            root,
            0,
            vec![project("a"), project("b"), project("c")],
            "Insert",
        )
        .unwrap();
        let group = new_group(&mut history, &mut tree, root, 0, "g").unwrap();
        let x = insert_subtrees(&mut history, &mut tree, group, 0, vec![project("x")], "Insert")
            .unwrap()[0];
        move_nodes(&mut history, &mut tree, &[ids[1], x], root, 1).unwrap();
        assert_eq!(names(&tree, root), vec!["g", "x", "b", "a", "c"]);
        assert!(tree.children(group).is_empty());
    }

    #[test]
    fn non_editable_group_refuses_drops_and_removal() {
        let mut tree = ProjectTree::new();
        let mut history = TreeHistory::new();
        let root = tree.root();
        let library = new_group(&mut history, &mut tree, root, 0, "Library").unwrap();
        tree.node_mut(library).unwrap().is_editable = false;
        let depth = history.undo_depth();
        assert!(matches!(
            insert_subtrees(&mut history, &mut tree, library, 0, vec![project("x")], "Paste"),
            Err(ProjectError::NotEditable(_))
        ));
        assert!(remove_nodes(&mut history, &mut tree, &[library]).is_err());
        assert_eq!(history.undo_depth(), depth);
    }

    #[test]
    fn removing_group_takes_selected_children_along() {
        let mut tree = ProjectTree::new();
        let mut history = TreeHistory::new();
        let root = tree.root();
        let group = new_group(&mut history, &mut tree, root, 0, "g").unwrap();
        let child = insert_subtrees(&mut history, &mut tree, group, 0, vec![project("p")], "Insert")
            .unwrap()[0];
        assert_eq!(remove_nodes(&mut history, &mut tree, &[group, child]).unwrap(), 1);
        assert!(tree.is_empty());
        assert!(tree.selection.is_empty());
        history.undo(&mut tree).unwrap();
        assert_eq!(tree.parent(child), Some(group));
        assert_eq!(tree.selection.current(), Some(child));
    }

    #[test]
    fn placeholder_is_loading_and_undoable() {
        let mut tree = ProjectTree::new();
        let mut history = TreeHistory::new();
        let root = tree.root();
        let token = CancellationToken::new();
        let id = insert_placeholder(&mut history, &mut tree, root, 0, "POSCAR", token.clone())
            .unwrap();
        assert!(tree.node(id).unwrap().is_loading());
        assert_eq!(tree.node_for_token(&token), Some(id));
        history.undo(&mut tree).unwrap();
        assert!(!tree.contains(id));
    }

    #[test]
    fn removed_nodes_stay_reachable_until_the_redo_is_cleared() {
        let mut tree = ProjectTree::new();
        let mut history = TreeHistory::new();
        let root = tree.root();
        let id = insert_subtrees(&mut history, &mut tree, root, 0, vec![project("a")], "Insert")
            .unwrap()[0];
        assert!(detached_in_history(&history).is_empty());
        remove_nodes(&mut history, &mut tree, &[id]).unwrap();
        assert!(detached_in_history(&history).contains(&id));
        history.undo(&mut tree).unwrap();
        history.undo(&mut tree).unwrap();
        assert!(detached_in_history(&history).contains(&id));
        new_group(&mut history, &mut tree, root, 0, "g").unwrap();
        assert!(!detached_in_history(&history).contains(&id));
    }
}
