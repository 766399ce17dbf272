//! Scene graph (component I support): an arena of nodes addressed by typed
//! indices, replacing the bidirectional owning-pointer hierarchy the original
//! engine used (see DESIGN.md, "Scene-graph cycles and cross-ownership").

pub mod visitor;

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// A stable handle to a node in a [`Scene`]. Indices, not pointers: a node
    /// never owns its parent or children, it only names them.
    pub struct NodeId;
}

/// What kind of work a node contributes when visited.
#[derive(Clone, Debug)]
pub enum NodeKind {
    Group,
    Pipeline { pipeline: vulkanalia::vk::Pipeline, layout: vulkanalia::vk::PipelineLayout },
    DescriptorSet { sets: Vec<vulkanalia::vk::DescriptorSet> },
    AssetBuffer { vertex_buffer: vulkanalia::vk::Buffer, index_buffer: Option<vulkanalia::vk::Buffer> },
    Draw { vertex_count: u32, instance_count: u32 },
    DrawIndexed { index_count: u32, instance_count: u32 },
    Dispatch { x: u32, y: u32, z: u32 },
}

impl NodeKind {
    /// Leaf nodes invoke a draw/dispatch call; every other kind only
    /// contributes validation or binds state for its descendants.
    pub fn is_leaf_command(&self) -> bool {
        matches!(self, NodeKind::Draw { .. } | NodeKind::DrawIndexed { .. } | NodeKind::Dispatch { .. })
    }
}

/// A node in the scene graph. Parent/child references are [`NodeId`]s into the
/// owning [`Scene`]'s arena, never owning pointers.
#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub parents: Vec<NodeId>,
    pub children: Vec<NodeId>,
    /// Requests a dedicated secondary command buffer for this subtree (component H,
    /// step 4): only group nodes that represent an independently-recordable chunk of
    /// work set this.
    pub wants_secondary_buffer: bool,
    dirty: [bool; crate::MAX_FRAMES_IN_FLIGHT],
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parents: Vec::new(),
            children: Vec::new(),
            wants_secondary_buffer: false,
            dirty: [true; crate::MAX_FRAMES_IN_FLIGHT],
        }
    }
}

/// An arena of [`Node`]s. Validation and rendering traverse it through
/// [`visitor`] implementations rather than virtual dispatch.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    nodes: SlotMap<NodeId, Node>,
}

impl Scene {
    pub fn new() -> Self {
        Self { nodes: SlotMap::with_key() }
    }

    pub fn insert(&mut self, node: Node) -> NodeId {
        self.nodes.insert(node)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Links `child` under `parent`, recording the edge on both ends.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(child);
        }
        if let Some(node) = self.nodes.get_mut(child) {
            node.parents.push(parent);
        }
    }

    /// Marks `id` and every one of its ancestors dirty for `swapchain_index`,
    /// the arena-indexed replacement for the original "node invalidates its
    /// parents" pointer-chasing protocol.
    pub fn invalidate(&mut self, id: NodeId, swapchain_index: usize) {
        let mut stack = vec![id];
        let mut seen = std::collections::HashSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            let parents = if let Some(node) = self.nodes.get_mut(current) {
                node.dirty[swapchain_index] = true;
                node.parents.clone()
            } else {
                continue;
            };
            stack.extend(parents);
        }
    }

    pub fn is_dirty(&self, id: NodeId, swapchain_index: usize) -> bool {
        self.nodes.get(id).map(|n| n.dirty[swapchain_index]).unwrap_or(false)
    }

    pub fn clear_dirty(&mut self, id: NodeId, swapchain_index: usize) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.dirty[swapchain_index] = false;
        }
    }

    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().filter(|(_, n)| n.parents.is_empty()).map(|(id, _)| id)
    }

    /// Every node under `root` (inclusive) that requested its own secondary
    /// command buffer, used by the per-frame parallel recording fan-out.
    pub fn secondary_buffer_nodes(&self, root: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else { continue };
            if node.wants_secondary_buffer {
                result.push(id);
            }
            stack.extend(node.children.iter().copied());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidate_propagates_to_ancestors() {
        let mut scene = Scene::new();
        let root = scene.insert(Node::new(NodeKind::Group));
        let child = scene.insert(Node::new(NodeKind::Group));
        scene.attach(root, child);
        scene.clear_dirty(root, 0);
        scene.clear_dirty(child, 0);

        scene.invalidate(child, 0);
        assert!(scene.is_dirty(child, 0));
        assert!(scene.is_dirty(root, 0));
    }

    #[test]
    fn secondary_buffer_nodes_collects_subtree() {
        let mut scene = Scene::new();
        let root = scene.insert(Node::new(NodeKind::Group));
        let mut leaf = Node::new(NodeKind::Draw { vertex_count: 3, instance_count: 1 });
        leaf.wants_secondary_buffer = true;
        let leaf_id = scene.insert(leaf);
        scene.attach(root, leaf_id);

        let nodes = scene.secondary_buffer_nodes(root);
        assert_eq!(nodes, vec![leaf_id]);
    }
}
