//! Retained-mode transform hierarchy the session manager drives.
//!
//! Nodes live in a generational [`NodeStore`]; a [`Scene`] adds a root node and
//! parent/child bookkeeping on top, and a [`Camera`] is kept outside the tree.

mod camera;
mod store;

pub use camera::Camera;
pub use store::{NodeId, NodeStore};

use crate::math::Matrix4;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SceneError {
    #[error("node {0:?} is not alive in this scene")]
    NoSuchNode(NodeId),
    #[error("cannot attach node {child:?} under {parent:?}: it would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
    #[error("the scene root cannot be detached or removed")]
    RootLocked,
}

pub type SceneResult<T> = Result<T, SceneError>;

/// Local transform of a node plus its cached world matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeTransform {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
    pub matrix: Matrix4,
    pub matrix_world: Matrix4,
    /// When set, `matrix` is recomposed from position/rotation/scale on every
    /// world update. Clear it to drive `matrix` directly.
    pub matrix_auto_update: bool,
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
            matrix: Matrix4::identity(),
            matrix_world: Matrix4::identity(),
            matrix_auto_update: true,
        }
    }
}

impl NodeTransform {
    pub(crate) fn refresh_local(&mut self) {
        if self.matrix_auto_update {
            self.matrix = Matrix4::compose(self.position, self.rotation, self.scale);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Node {
    pub name: Option<String>,
    pub transform: NodeTransform,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn named(name: Option<String>) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }
}

pub struct Scene {
    nodes: NodeStore<Node>,
    root: NodeId,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        let mut nodes = NodeStore::new();
        let root = nodes.insert(Node::named(Some("scene".to_string())));
        Self { nodes, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Creates a detached group node. Call [`Scene::add`] to make it part of the scene.
    pub fn create_group(&mut self, name: impl Into<String>) -> NodeId {
        self.nodes.insert(Node::named(Some(name.into())))
    }

    /// Attaches `node` directly under the root, detaching it from any previous parent.
    pub fn add(&mut self, node: NodeId) -> SceneResult<()> {
        self.add_child(self.root, node)
    }

    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> SceneResult<()> {
        self.validate(parent)?;
        self.validate(child)?;
        if child == self.root {
            return Err(SceneError::RootLocked);
        }
        if child == parent || self.is_ancestor(child, parent) {
            return Err(SceneError::Cycle { parent, child });
        }

        self.detach(child);
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(child);
        }
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }
        Ok(())
    }

    /// Removes `node` and all of its descendants from the scene.
    pub fn remove(&mut self, node: NodeId) -> SceneResult<()> {
        self.validate(node)?;
        if node == self.root {
            return Err(SceneError::RootLocked);
        }
        self.detach(node);

        let mut pending = vec![node];
        while let Some(current) = pending.pop() {
            if let Some(removed) = self.nodes.remove(current) {
                pending.extend(removed.children);
            }
        }
        Ok(())
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(node)
    }

    /// True when `node` is reachable from the root.
    pub fn is_attached(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == self.root {
                return true;
            }
            current = self.nodes.get(id).and_then(|node| node.parent);
        }
        false
    }

    pub fn node(&self, node: NodeId) -> Option<&Node> {
        self.nodes.get(node)
    }

    pub fn transform(&self, node: NodeId) -> Option<&NodeTransform> {
        self.nodes.get(node).map(|node| &node.transform)
    }

    pub fn transform_mut(&mut self, node: NodeId) -> Option<&mut NodeTransform> {
        self.nodes.get_mut(node).map(|node| &mut node.transform)
    }

    /// Writes the local matrix of `node` and stops it from being recomposed.
    pub fn set_matrix(&mut self, node: NodeId, matrix: Matrix4) -> SceneResult<()> {
        let transform = self
            .transform_mut(node)
            .ok_or(SceneError::NoSuchNode(node))?;
        transform.matrix_auto_update = false;
        transform.matrix = matrix;
        Ok(())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node).and_then(|node| node.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Number of live nodes, including the root and detached nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes reachable from the root in depth-first order, root excluded.
    pub fn attached_nodes(&self) -> Vec<NodeId> {
        let mut ordered = Vec::new();
        let mut pending: Vec<NodeId> = self.children(self.root).iter().rev().copied().collect();
        while let Some(node) = pending.pop() {
            ordered.push(node);
            pending.extend(self.children(node).iter().rev().copied());
        }
        ordered
    }

    /// Recomputes world matrices for `node` and everything below it.
    pub fn update_matrix_world(&mut self, node: NodeId) -> SceneResult<()> {
        self.validate(node)?;
        let parent_world = self
            .parent(node)
            .and_then(|parent| self.transform(parent))
            .map(|transform| transform.matrix_world)
            .unwrap_or_else(Matrix4::identity);

        let mut pending = vec![(node, parent_world)];
        while let Some((current, parent_world)) = pending.pop() {
            let Some(entry) = self.nodes.get_mut(current) else {
                continue;
            };
            entry.transform.refresh_local();
            entry.transform.matrix_world = parent_world * entry.transform.matrix;
            let world = entry.transform.matrix_world;
            pending.extend(entry.children.iter().map(|child| (*child, world)));
        }
        Ok(())
    }

    pub fn update_world(&mut self) {
        // The root is always alive.
        let _ = self.update_matrix_world(self.root);
    }

    fn validate(&self, node: NodeId) -> SceneResult<()> {
        if self.nodes.contains(node) {
            Ok(())
        } else {
            Err(SceneError::NoSuchNode(node))
        }
    }

    fn is_ancestor(&self, candidate: NodeId, node: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.nodes.get_mut(node).and_then(|entry| entry.parent.take()) else {
            return;
        };
        if let Some(entry) = self.nodes.get_mut(parent) {
            entry.children.retain(|child| *child != node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_groups_are_detached_until_added() {
        let mut scene = Scene::new();
        let group = scene.create_group("floor");
        assert!(scene.contains(group));
        assert!(!scene.is_attached(group));

        scene.add(group).expect("group is alive");
        assert!(scene.is_attached(group));
        assert_eq!(scene.children(scene.root()), &[group]);
    }

    #[test]
    fn adding_again_reparents_instead_of_duplicating() {
        let mut scene = Scene::new();
        let a = scene.create_group("a");
        let b = scene.create_group("b");
        scene.add(a).unwrap();
        scene.add(b).unwrap();
        scene.add_child(a, b).unwrap();
        scene.add(b).unwrap();

        assert_eq!(scene.children(scene.root()), &[a, b]);
        assert!(scene.children(a).is_empty());
        assert_eq!(scene.parent(b), Some(scene.root()));
    }

    #[test]
    fn attaching_under_descendant_is_rejected() {
        let mut scene = Scene::new();
        let a = scene.create_group("a");
        let b = scene.create_group("b");
        scene.add(a).unwrap();
        scene.add_child(a, b).unwrap();

        let err = scene.add_child(b, a).unwrap_err();
        assert_eq!(err, SceneError::Cycle { parent: b, child: a });
        assert_eq!(
            scene.add_child(a, a).unwrap_err(),
            SceneError::Cycle { parent: a, child: a }
        );
    }

    #[test]
    fn world_matrices_compose_through_parents() {
        let mut scene = Scene::new();
        let parent = scene.create_group("parent");
        let child = scene.create_group("child");
        scene.add(parent).unwrap();
        scene.add_child(parent, child).unwrap();

        scene.transform_mut(parent).unwrap().position = [0.0, 1.0, 0.0];
        scene
            .set_matrix(child, Matrix4::translation(2.0, 0.0, 0.0))
            .unwrap();
        scene.update_world();

        let world = scene.transform(child).unwrap().matrix_world;
        assert_eq!(world.position(), [2.0, 1.0, 0.0]);
        assert!(!scene.transform(child).unwrap().matrix_auto_update);
    }

    #[test]
    fn explicit_matrix_survives_world_update() {
        let mut scene = Scene::new();
        let node = scene.create_group("anchored");
        scene.add(node).unwrap();
        scene.transform_mut(node).unwrap().position = [9.0, 9.0, 9.0];
        scene
            .set_matrix(node, Matrix4::translation(1.0, 0.0, 0.0))
            .unwrap();
        scene.update_matrix_world(node).unwrap();

        assert_eq!(scene.transform(node).unwrap().matrix_world.position(), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn remove_destroys_descendants() {
        let mut scene = Scene::new();
        let a = scene.create_group("a");
        let b = scene.create_group("b");
        scene.add(a).unwrap();
        scene.add_child(a, b).unwrap();

        scene.remove(a).unwrap();
        assert!(!scene.contains(a));
        assert!(!scene.contains(b));
        assert!(scene.children(scene.root()).is_empty());
        assert_eq!(scene.remove(scene.root()), Err(SceneError::RootLocked));
    }

    #[test]
    fn attached_nodes_are_depth_first() {
        let mut scene = Scene::new();
        let a = scene.create_group("a");
        let a1 = scene.create_group("a1");
        let b = scene.create_group("b");
        let loose = scene.create_group("loose");
        scene.add(a).unwrap();
        scene.add_child(a, a1).unwrap();
        scene.add(b).unwrap();

        assert_eq!(scene.attached_nodes(), vec![a, a1, b]);
        assert!(!scene.attached_nodes().contains(&loose));
        assert_eq!(scene.node_count(), 5);
    }
}
