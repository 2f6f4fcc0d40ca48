use scenes::{Command, SelectionSet};

use crate::{DetachedSubtree, ProjectError, ProjectNodeId, ProjectTree};

/// Primitive mutation of the project tree; applying one returns its inverse.
#[derive(Debug, Clone)]
pub enum TreeCommand {
    Insert {
        parent: ProjectNodeId,
        index: usize,
        subtree: DetachedSubtree,
    },
    Remove {
        node_id: ProjectNodeId,
    },
    /// `index` counts after the node left its old parent
    Move {
        node_id: ProjectNodeId,
        to_parent: ProjectNodeId,
        index: usize,
    },
    Rename {
        node_id: ProjectNodeId,
        name: String,
    },
    RestoreSelection {
        selection: SelectionSet<ProjectNodeId>,
    },
}

impl Command for TreeCommand {
    type Target = ProjectTree;
    type Error = ProjectError;

    fn apply(self, target: &mut ProjectTree) -> Result<Self, ProjectError> {
        apply_command(target, self)
    }

    fn capture(target: &ProjectTree) -> Option<Self> {
        Some(TreeCommand::RestoreSelection {
            selection: target.selection.clone(),
        })
    }
}

pub fn apply_command(
    tree: &mut ProjectTree,
    command: TreeCommand,
) -> Result<TreeCommand, ProjectError> {
    match command {
        TreeCommand::Insert {
            parent,
            index,
            subtree,
        } => {
            let node_id = subtree.root_id();
            tree.insert_subtree(parent, index, subtree)?;
            Ok(TreeCommand::Remove { node_id })
        }
        TreeCommand::Remove { node_id } => {
            let (subtree, parent, index) = tree.detach_subtree(node_id)?;
            Ok(TreeCommand::Insert {
                parent,
                index,
                subtree,
            })
        }
        TreeCommand::Move {
            node_id,
            to_parent,
            index,
        } => move_node(tree, node_id, to_parent, index),
        TreeCommand::Rename { node_id, name } => {
            let node = tree
                .node_mut(node_id)
                .ok_or(ProjectError::NodeNotFound(node_id))?;
            let previous = std::mem::replace(&mut node.display_name, name);
            Ok(TreeCommand::Rename {
                node_id,
                name: previous,
            })
        }
        TreeCommand::RestoreSelection { selection } => {
            let previous = std::mem::replace(&mut tree.selection, selection);
            tree.prune_selection();
            Ok(TreeCommand::RestoreSelection {
                selection: previous,
            })
        }
    }
}

/// Every structural check happens before the tree is touched
pub(crate) fn validate_move(
    tree: &ProjectTree,
    node_id: ProjectNodeId,
    to_parent: ProjectNodeId,
) -> Result<(), ProjectError> {
    if node_id == tree.root() {
        return Err(ProjectError::RootImmutable);
    }
    tree.require(node_id)?;
    let parent = tree.require(to_parent)?;
    if !parent.is_group() {
        return Err(ProjectError::NotAGroup(to_parent));
    }
    if to_parent == node_id || tree.is_descendant_of(to_parent, node_id) {
        return Err(ProjectError::IntoDescendant {
            node: node_id,
            target: to_parent,
        });
    }
    Ok(())
}

fn move_node(
    tree: &mut ProjectTree,
    node_id: ProjectNodeId,
    to_parent: ProjectNodeId,
    index: usize,
) -> Result<TreeCommand, ProjectError> {
    validate_move(tree, node_id, to_parent)?;
    let dest_len = tree.children(to_parent).len();
    let len = if tree.parent(node_id) == Some(to_parent) {
        dest_len - 1
    } else {
        dest_len
    };
    if index > len {
        return Err(ProjectError::IndexOutOfRange { index, len });
    }
    let (from_parent, from_index) = tree.relink(node_id, to_parent, index)?;
    Ok(TreeCommand::Move {
        node_id,
        to_parent: from_parent,
        index: from_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProjectNode;

    fn two_groups() -> (ProjectTree, ProjectNodeId, ProjectNodeId, ProjectNodeId) {
        let mut tree = ProjectTree::new();
        let a = ProjectNode::group("a");
        let b = ProjectNode::group("b");
        let inner = ProjectNode::group("inner");
        let (a_id, b_id, inner_id) = (a.id, b.id, inner.id);
        let root = tree.root();
        tree.insert_subtree(root, 0, DetachedSubtree::single(a)).unwrap();
        tree.insert_subtree(root, 1, DetachedSubtree::single(b)).unwrap();
        tree.insert_subtree(a_id, 0, DetachedSubtree::single(inner)).unwrap();
        (tree, a_id, b_id, inner_id)
    }

    #[test]
    fn move_into_own_descendant_is_rejected_untouched() {
        let (mut tree, a, _, inner) = two_groups();
        let before = tree.flattened_nodes();
        let err = apply_command(
            &mut tree,
            TreeCommand::Move {
                node_id: a,
                to_parent: inner,
                index: 0,
            },
        )
        .unwrap_err();
        assert_eq!(err, ProjectError::IntoDescendant { node: a, target: inner });
        assert_eq!(tree.flattened_nodes(), before);
    }

    #[test]
    fn move_inverse_restores_position() {
        let (mut tree, a, b, inner) = two_groups();
        let before = tree.flattened_nodes();
        let inverse = apply_command(
            &mut tree,
            TreeCommand::Move {
                node_id: inner,
                to_parent: b,
                index: 0,
            },
        )
        .unwrap();
        assert_eq!(tree.parent(inner), Some(b));
        apply_command(&mut tree, inverse).unwrap();
        assert_eq!(tree.parent(inner), Some(a));
        assert_eq!(tree.flattened_nodes(), before);
    }

    #[test]
    fn remove_inverse_reinserts_same_identity() {
        let (mut tree, a, _, inner) = two_groups();
        let inverse = apply_command(&mut tree, TreeCommand::Remove { node_id: a }).unwrap();
        assert!(!tree.contains(inner));
        apply_command(&mut tree, inverse).unwrap();
        assert_eq!(tree.parent(inner), Some(a));
        assert_eq!(tree.index_in_parent(a), Some(0));
    }

    #[test]
    fn root_cannot_be_removed() {
        let (mut tree, ..) = two_groups();
        let root = tree.root();
        assert_eq!(
            apply_command(&mut tree, TreeCommand::Remove { node_id: root }).unwrap_err(),
            ProjectError::RootImmutable
        );
    }
}
