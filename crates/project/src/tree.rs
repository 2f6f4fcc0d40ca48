use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use uuid::Uuid;

use scenes::{SceneList, SelectionSet};

use crate::{CancellationToken, LazyProject, LazyStatus, LoadedProject, ProjectError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ProjectNodeId(pub Uuid);

impl ProjectNodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProjectNodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub enum NodePayload {
    Group,
    Project(LazyProject),
}

#[derive(Debug, Clone)]
pub struct ProjectNode {
    pub id: ProjectNodeId,
    pub display_name: String,
    pub parent: Option<ProjectNodeId>,
    pub children: Vec<ProjectNodeId>,
    pub payload: NodePayload,
    pub is_editable: bool,
    pub is_enabled: bool,
    pub matches_filter: bool,
    /// Needs saving
    pub is_edited: bool,
    /// Set on placeholders whose content is still being decoded
    pub token: Option<CancellationToken>,
}

impl ProjectNode {
    fn with_payload(display_name: impl Into<String>, payload: NodePayload) -> Self {
        Self {
            id: ProjectNodeId::new(),
            display_name: display_name.into(),
            parent: None,
            children: Vec::new(),
            payload,
            is_editable: true,
            is_enabled: true,
            matches_filter: true,
            is_edited: false,
            token: None,
        }
    }

    pub fn group(display_name: impl Into<String>) -> Self {
        Self::with_payload(display_name, NodePayload::Group)
    }

    pub fn project(display_name: impl Into<String>, payload: LazyProject) -> Self {
        Self::with_payload(display_name, NodePayload::Project(payload))
    }

    /// Node shown while its content is decoded in the background
    pub fn placeholder(display_name: impl Into<String>, token: CancellationToken) -> Self {
        let mut node = Self::project(display_name, LazyProject::placeholder());
        node.token = Some(token);
        node
    }

    pub fn is_group(&self) -> bool {
        matches!(self.payload, NodePayload::Group)
    }

    pub fn lazy(&self) -> Option<&LazyProject> {
        match &self.payload {
            NodePayload::Project(lazy) => Some(lazy),
            NodePayload::Group => None,
        }
    }

    pub fn lazy_mut(&mut self) -> Option<&mut LazyProject> {
        match &mut self.payload {
            NodePayload::Project(lazy) => Some(lazy),
            NodePayload::Group => None,
        }
    }

    pub fn status(&self) -> Option<LazyStatus> {
        self.lazy().map(|l| l.status())
    }

    pub fn is_loading(&self) -> bool {
        self.status() == Some(LazyStatus::Loading)
    }

    pub fn scene_list(&self) -> Option<&SceneList> {
        self.lazy().and_then(|l| l.scene_list())
    }
}

/// A node and its descendants taken out of (or ready to enter) a tree.
/// `nodes[0]` is the subtree root.
#[derive(Debug, Clone)]
pub struct DetachedSubtree {
    nodes: Vec<ProjectNode>,
}

impl DetachedSubtree {
    pub fn single(node: ProjectNode) -> Self {
        Self { nodes: vec![node] }
    }

    /// `node` with `children` attached below it in order. Links of the
    /// given nodes are overwritten.
    pub fn with_children(mut node: ProjectNode, children: Vec<DetachedSubtree>) -> Self {
        node.parent = None;
        node.children = children.iter().map(|c| c.root_id()).collect();
        let parent = node.id;
        let mut nodes = vec![node];
        for child in children {
            let mut child_nodes = child.nodes;
            child_nodes[0].parent = Some(parent);
            nodes.extend(child_nodes);
        }
        Self { nodes }
    }

    pub fn root_id(&self) -> ProjectNodeId {
        self.nodes[0].id
    }

    pub fn root(&self) -> &ProjectNode {
        &self.nodes[0]
    }

    pub fn nodes(&self) -> &[ProjectNode] {
        &self.nodes
    }
}

/// Arena of project nodes below a hidden root group
#[derive(Debug, Clone)]
pub struct ProjectTree {
    nodes: HashMap<ProjectNodeId, ProjectNode>,
    root: ProjectNodeId,
    pub selection: SelectionSet<ProjectNodeId>,
}

impl Default for ProjectTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectTree {
    pub fn new() -> Self {
        let root = ProjectNode::group("Projects");
        let root_id = root.id;
        let mut nodes = HashMap::new();
        nodes.insert(root_id, root);
        Self {
            nodes,
            root: root_id,
            selection: SelectionSet::new(),
        }
    }

    pub fn root(&self) -> ProjectNodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: ProjectNodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: ProjectNodeId) -> Option<&ProjectNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: ProjectNodeId) -> Option<&mut ProjectNode> {
        self.nodes.get_mut(&id)
    }

    pub fn require(&self, id: ProjectNodeId) -> Result<&ProjectNode, ProjectError> {
        self.nodes.get(&id).ok_or(ProjectError::NodeNotFound(id))
    }

    pub fn children(&self, id: ProjectNodeId) -> &[ProjectNodeId] {
        self.nodes
            .get(&id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent(&self, id: ProjectNodeId) -> Option<ProjectNodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    pub fn index_in_parent(&self, id: ProjectNodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    pub fn loaded_project_mut(&mut self, id: ProjectNodeId) -> Option<&mut LoadedProject> {
        self.nodes.get_mut(&id)?.lazy_mut()?.loaded_mut()
    }

    pub fn scene_list(&self, id: ProjectNodeId) -> Option<&SceneList> {
        self.nodes.get(&id)?.scene_list()
    }

    /// Child positions from the root down to `id`; the root itself is `[]`
    pub fn index_path(&self, id: ProjectNodeId) -> Option<Vec<usize>> {
        let mut path = Vec::new();
        let mut current = id;
        while current != self.root {
            path.push(self.index_in_parent(current)?);
            current = self.parent(current)?;
        }
        path.reverse();
        Some(path)
    }

    pub fn node_at_index_path(&self, path: &[usize]) -> Option<ProjectNodeId> {
        let mut current = self.root;
        for index in path {
            current = *self.children(current).get(*index)?;
        }
        Some(current)
    }

    /// Parent first, root last
    pub fn ancestors(&self, id: ProjectNodeId) -> Vec<ProjectNodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(parent) = current {
            out.push(parent);
            current = self.parent(parent);
        }
        out
    }

    /// Strict: a node is not its own descendant
    pub fn is_descendant_of(&self, id: ProjectNodeId, ancestor: ProjectNodeId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    /// Pre-order, excluding `id` itself
    pub fn descendant_nodes(&self, id: ProjectNodeId) -> Vec<ProjectNodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<ProjectNodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Every node below the hidden root, pre-order
    pub fn flattened_nodes(&self) -> Vec<ProjectNodeId> {
        self.descendant_nodes(self.root)
    }

    pub fn flattened_leaf_nodes(&self) -> Vec<ProjectNodeId> {
        self.flattened_nodes()
            .into_iter()
            .filter(|id| self.nodes.get(id).is_some_and(|n| !n.is_group()))
            .collect()
    }

    pub fn flattened_group_nodes(&self) -> Vec<ProjectNodeId> {
        self.flattened_nodes()
            .into_iter()
            .filter(|id| self.nodes.get(id).is_some_and(|n| n.is_group()))
            .collect()
    }

    /// Members of `ids` none of whose ancestors are members, in tree order
    pub fn find_local_roots(&self, ids: &[ProjectNodeId]) -> Vec<ProjectNodeId> {
        let set: HashSet<ProjectNodeId> = ids.iter().copied().collect();
        self.flattened_nodes()
            .into_iter()
            .filter(|id| set.contains(id))
            .filter(|id| !self.ancestors(*id).iter().any(|a| set.contains(a)))
            .collect()
    }

    /// A node matches when `predicate` holds for it or any descendant
    pub fn update_filter<F>(&mut self, predicate: F)
    where
        F: Fn(&ProjectNode) -> bool,
    {
        let root = self.root;
        self.mark_filter(root, &predicate);
        if let Some(root) = self.nodes.get_mut(&root) {
            root.matches_filter = true;
        }
    }

    fn mark_filter<F>(&mut self, id: ProjectNodeId, predicate: &F) -> bool
    where
        F: Fn(&ProjectNode) -> bool,
    {
        let children = self.children(id).to_vec();
        let mut any_child = false;
        for child in children {
            any_child |= self.mark_filter(child, predicate);
        }
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.matches_filter = any_child || predicate(node);
                node.matches_filter
            }
            None => false,
        }
    }

    pub fn clear_filter(&mut self) {
        for node in self.nodes.values_mut() {
            node.matches_filter = true;
        }
    }

    pub fn filtered_children(&self, id: ProjectNodeId) -> Vec<ProjectNodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.nodes.get(c).is_some_and(|n| n.matches_filter))
            .collect()
    }

    pub fn mark_edited(&mut self, id: ProjectNodeId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.is_edited = true;
        }
    }

    pub fn selected_nodes(&self) -> Vec<ProjectNodeId> {
        self.selection.ordered(&self.flattened_nodes())
    }

    pub fn prune_selection(&mut self) {
        let present: Vec<ProjectNodeId> = self.flattened_nodes();
        self.selection.retain_within(&present);
    }

    /// Placeholder nodes whose decode was handed out with `token`
    pub fn node_for_token(&self, token: &CancellationToken) -> Option<ProjectNodeId> {
        self.nodes
            .values()
            .find(|n| n.token.as_ref() == Some(token))
            .map(|n| n.id)
    }

    /// Deep copies of the local roots of `ids` under fresh identities.
    /// Loaded payloads get fresh scene/movie/frame ids; nodes still loading
    /// cannot be copied.
    pub fn copy_of_subtrees(
        &self,
        ids: &[ProjectNodeId],
        undo_limit: Option<usize>,
    ) -> Result<Vec<DetachedSubtree>, ProjectError> {
        let roots = self.find_local_roots(ids);
        let mut out = Vec::with_capacity(roots.len());
        for root in roots {
            if root == self.root {
                return Err(ProjectError::RootImmutable);
            }
            let mut nodes = Vec::new();
            self.copy_node(root, None, undo_limit, &mut nodes)?;
            out.push(DetachedSubtree { nodes });
        }
        Ok(out)
    }

    fn copy_node(
        &self,
        id: ProjectNodeId,
        parent: Option<ProjectNodeId>,
        undo_limit: Option<usize>,
        out: &mut Vec<ProjectNode>,
    ) -> Result<ProjectNodeId, ProjectError> {
        let node = self.require(id)?;
        let payload = match &node.payload {
            NodePayload::Group => NodePayload::Group,
            NodePayload::Project(lazy) => NodePayload::Project(match lazy {
                LazyProject::Loading { .. } => {
                    return Err(ProjectError::NotCopyable(node.display_name.clone()))
                }
                LazyProject::Loaded(project) => {
                    LazyProject::loaded(project.scene_list.clone().with_fresh_ids(), undo_limit)
                }
                other => other.clone(),
            }),
        };
        let mut copy = ProjectNode::with_payload(node.display_name.clone(), payload);
        copy.parent = parent;
        copy.is_edited = true;
        let copy_id = copy.id;
        let slot = out.len();
        out.push(copy);
        let mut children = Vec::with_capacity(node.children.len());
        for child in &node.children {
            children.push(self.copy_node(*child, Some(copy_id), undo_limit, out)?);
        }
        out[slot].children = children;
        Ok(copy_id)
    }

    /// Attach a detached subtree below `parent` at `index`
    pub fn insert_subtree(
        &mut self,
        parent: ProjectNodeId,
        index: usize,
        subtree: DetachedSubtree,
    ) -> Result<(), ProjectError> {
        let parent_node = self.require(parent)?;
        if !parent_node.is_group() {
            return Err(ProjectError::NotAGroup(parent));
        }
        if index > parent_node.children.len() {
            return Err(ProjectError::IndexOutOfRange {
                index,
                len: parent_node.children.len(),
            });
        }
        if let Some(clash) = subtree.nodes.iter().find(|n| self.nodes.contains_key(&n.id)) {
            return Err(ProjectError::NodeExists(clash.id));
        }
        let root_id = subtree.root_id();
        for mut node in subtree.nodes {
            if node.id == root_id {
                node.parent = Some(parent);
            }
            self.nodes.insert(node.id, node);
        }
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.insert(index, root_id);
        }
        Ok(())
    }

    /// Take `id` and its descendants out of the tree. Returns the subtree
    /// with the parent and index it was detached from.
    pub fn detach_subtree(
        &mut self,
        id: ProjectNodeId,
    ) -> Result<(DetachedSubtree, ProjectNodeId, usize), ProjectError> {
        if id == self.root {
            return Err(ProjectError::RootImmutable);
        }
        let parent = self.parent(id).ok_or(ProjectError::NodeNotFound(id))?;
        let index = self
            .index_in_parent(id)
            .ok_or(ProjectError::NodeNotFound(id))?;
        let mut ids = vec![id];
        ids.extend(self.descendant_nodes(id));
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.remove(index);
        }
        let mut nodes = Vec::with_capacity(ids.len());
        for node_id in ids {
            if let Some(mut node) = self.nodes.remove(&node_id) {
                if node_id == id {
                    node.parent = None;
                }
                self.selection.remove(&node_id);
                nodes.push(node);
            }
        }
        Ok((DetachedSubtree { nodes }, parent, index))
    }

    /// Re-parent without detaching; `index` counts after removal from the
    /// old parent
    pub(crate) fn relink(
        &mut self,
        id: ProjectNodeId,
        to_parent: ProjectNodeId,
        index: usize,
    ) -> Result<(ProjectNodeId, usize), ProjectError> {
        let from_parent = self.parent(id).ok_or(ProjectError::NodeNotFound(id))?;
        let from_index = self
            .index_in_parent(id)
            .ok_or(ProjectError::NodeNotFound(id))?;
        if let Some(node) = self.nodes.get_mut(&from_parent) {
            node.children.remove(from_index);
        }
        if let Some(node) = self.nodes.get_mut(&to_parent) {
            node.children.insert(index, id);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = Some(to_parent);
        }
        Ok((from_parent, from_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenes::FormatTag;

    use crate::LazySource;

    /// root
    /// ├── g1
    /// │   ├── p1
    /// │   └── g2
    /// │       └── p2
    /// └── p3
    fn sample() -> (ProjectTree, Vec<ProjectNodeId>) {
        let mut tree = ProjectTree::new();
        let g1 = ProjectNode::group("g1");
        let p1 = ProjectNode::project("p1", LazyProject::loaded(SceneList::new("p1"), None));
        let g2 = ProjectNode::group("g2");
        let p2 = ProjectNode::project(
            "p2",
            LazyProject::Lazy(LazySource::new(FormatTag::Native, b"{}".to_vec())),
        );
        let p3 = ProjectNode::project("p3", LazyProject::placeholder());
        let ids = vec![g1.id, p1.id, g2.id, p2.id, p3.id];
        let root = tree.root();
        tree.insert_subtree(root, 0, DetachedSubtree::single(g1)).unwrap();
        tree.insert_subtree(ids[0], 0, DetachedSubtree::single(p1)).unwrap();
        tree.insert_subtree(ids[0], 1, DetachedSubtree::single(g2)).unwrap();
        tree.insert_subtree(ids[2], 0, DetachedSubtree::single(p2)).unwrap();
        tree.insert_subtree(root, 1, DetachedSubtree::single(p3)).unwrap();
        (tree, ids)
    }

    #[test]
    fn flatten_queries_are_pre_order() {
        let (tree, ids) = sample();
        assert_eq!(tree.flattened_nodes(), ids);
        assert_eq!(tree.flattened_leaf_nodes(), vec![ids[1], ids[3], ids[4]]);
        assert_eq!(tree.flattened_group_nodes(), vec![ids[0], ids[2]]);
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn index_paths_round_trip() {
        let (tree, ids) = sample();
        assert_eq!(tree.index_path(ids[3]), Some(vec![0, 1, 0]));
        assert_eq!(tree.node_at_index_path(&[0, 1, 0]), Some(ids[3]));
        assert_eq!(tree.node_at_index_path(&[]), Some(tree.root()));
        assert_eq!(tree.node_at_index_path(&[3]), None);
    }

    #[test]
    fn ancestry() {
        let (tree, ids) = sample();
        assert_eq!(tree.ancestors(ids[3]), vec![ids[2], ids[0], tree.root()]);
        assert!(tree.is_descendant_of(ids[3], ids[0]));
        assert!(!tree.is_descendant_of(ids[0], ids[0]));
        assert_eq!(tree.find_local_roots(&[ids[3], ids[0], ids[4]]), vec![ids[0], ids[4]]);
    }

    #[test]
    fn filter_keeps_ancestors_of_matches() {
        let (mut tree, ids) = sample();
        tree.update_filter(|n| n.display_name == "p2");
        assert_eq!(tree.filtered_children(tree.root()), vec![ids[0]]);
        assert_eq!(tree.filtered_children(ids[0]), vec![ids[2]]);
        tree.clear_filter();
        assert_eq!(tree.filtered_children(tree.root()).len(), 2);
    }

    #[test]
    fn detach_and_reinsert_restores_shape() {
        let (mut tree, ids) = sample();
        tree.selection.select_only(ids[3]);
        let (subtree, parent, index) = tree.detach_subtree(ids[0]).unwrap();
        assert_eq!((parent, index), (tree.root(), 0));
        assert_eq!(subtree.nodes().len(), 4);
        assert_eq!(tree.len(), 1);
        assert!(tree.selection.is_empty());
        tree.insert_subtree(parent, index, subtree).unwrap();
        assert_eq!(tree.flattened_nodes(), ids);
    }

    #[test]
    fn copy_refuses_loading_nodes_and_renews_ids() {
        let (tree, ids) = sample();
        assert_eq!(
            tree.copy_of_subtrees(&[ids[4]], None).unwrap_err(),
            ProjectError::NotCopyable("p3".into())
        );
        let copies = tree.copy_of_subtrees(&[ids[0], ids[1]], None).unwrap();
        assert_eq!(copies.len(), 1);
        let copy = &copies[0];
        assert_eq!(copy.nodes().len(), 4);
        assert!(copy.nodes().iter().all(|n| !ids.contains(&n.id)));
        assert_eq!(copy.root().children.len(), 2);
        assert_eq!(copy.nodes()[1].parent, Some(copy.root_id()));
    }

    #[test]
    fn nested_subtree_links_children() {
        let group = ProjectNode::group("imports");
        let a = ProjectNode::project("a", LazyProject::placeholder());
        let inner = ProjectNode::group("inner");
        let b = ProjectNode::project("b", LazyProject::placeholder());
        let (group_id, a_id, inner_id, b_id) = (group.id, a.id, inner.id, b.id);
        let subtree = DetachedSubtree::with_children(
            group,
            vec![
                DetachedSubtree::single(a),
                DetachedSubtree::with_children(inner, vec![DetachedSubtree::single(b)]),
            ],
        );
        let mut tree = ProjectTree::new();
        let root = tree.root();
        tree.insert_subtree(root, 0, subtree).unwrap();
        assert_eq!(tree.flattened_nodes(), vec![group_id, a_id, inner_id, b_id]);
        assert_eq!(tree.parent(b_id), Some(inner_id));
        assert_eq!(tree.children(group_id), &[a_id, inner_id]);
    }
}
