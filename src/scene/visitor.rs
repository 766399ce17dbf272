//! Command recording visitors (component I).
//!
//! Three passes over the scene graph, each carrying an immutable-per-call
//! [`RenderContext`]: validate GPU objects, validate descriptor sets, and
//! finally emit commands. Dispatch is by [`super::NodeKind`] match arm rather
//! than virtual dispatch, per DESIGN.md's "polymorphic node hierarchy" note.

use anyhow::Result;
use vulkanalia::prelude::v1_0::*;

use super::{Node, NodeId, NodeKind, Scene};

/// Per-call context threaded through every visitor; never mutated in place,
/// only rebuilt by the surface loop between recording steps.
#[derive(Copy, Clone)]
pub struct RenderContext<'a> {
    pub device: &'a Device,
    pub command_buffer: vk::CommandBuffer,
    pub swapchain_index: usize,
    pub current_pipeline_layout: Option<vk::PipelineLayout>,
}

/// Ensures per-node GPU objects (pipelines, buffers, framebuffers) exist and
/// are up to date for the active device and swapchain index. A no-op for any
/// node kind this crate doesn't itself own GPU state for (pipelines and
/// descriptor sets are expected to be created up front by the application and
/// merely referenced here); kept as the extension point the spec names.
pub struct ValidateNodeVisitor;

impl ValidateNodeVisitor {
    pub fn visit_subtree(&mut self, scene: &mut Scene, root: NodeId, swapchain_index: usize) {
        let mut stack = vec![root];
        let mut seen = std::collections::HashSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let children = match scene.get(id) {
                Some(node) => node.children.clone(),
                None => continue,
            };
            if scene.is_dirty(id, swapchain_index) {
                scene.clear_dirty(id, swapchain_index);
            }
            stack.extend(children);
        }
    }
}

/// Ensures descriptor sets are materialized and point at the current
/// buffer/image versions. Descriptor-set nodes carry their live handles
/// directly (see [`super::NodeKind::DescriptorSet`]); this visitor is the
/// traversal skeleton an application hangs descriptor-update logic off.
pub struct ValidateDescriptorVisitor;

impl ValidateDescriptorVisitor {
    pub fn visit_subtree(&mut self, scene: &Scene, root: NodeId) {
        let mut stack = vec![root];
        let mut seen = std::collections::HashSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Some(node) = scene.get(id) else { continue };
            if let NodeKind::DescriptorSet { .. } = &node.kind {
                // Sets are pre-bound by the application; nothing to rebuild here.
            }
            stack.extend(node.children.iter().copied());
        }
    }
}

/// Emits draw/dispatch commands. Works identically whether recording a
/// primary buffer's subtree or an independently-recorded secondary buffer: the
/// caller decides where the traversal starts.
pub struct BuildCommandBufferVisitor<'a> {
    pub ctx: RenderContext<'a>,
}

impl<'a> BuildCommandBufferVisitor<'a> {
    pub unsafe fn visit_subtree(&mut self, scene: &Scene, root: NodeId) -> Result<()> {
        self.visit_node(scene, root)
    }

    unsafe fn visit_node(&mut self, scene: &Scene, id: NodeId) -> Result<()> {
        let Some(node) = scene.get(id) else { return Ok(()) };
        self.record_self(node)?;
        for &child in &node.children {
            self.visit_node(scene, child)?;
        }
        Ok(())
    }

    unsafe fn record_self(&mut self, node: &Node) -> Result<()> {
        match &node.kind {
            NodeKind::Group => {}
            NodeKind::DescriptorSet { sets } => {
                if let (Some(layout), Some(&set)) =
                    (self.ctx.current_pipeline_layout, sets.get(self.ctx.swapchain_index))
                {
                    self.ctx.device.cmd_bind_descriptor_sets(
                        self.ctx.command_buffer,
                        vk::PipelineBindPoint::GRAPHICS,
                        layout,
                        0,
                        &[set],
                        &[],
                    );
                }
            }
            NodeKind::Pipeline { pipeline, layout } => {
                self.ctx
                    .device
                    .cmd_bind_pipeline(self.ctx.command_buffer, vk::PipelineBindPoint::GRAPHICS, *pipeline);
                self.ctx.current_pipeline_layout = Some(*layout);
            }
            NodeKind::AssetBuffer { vertex_buffer, index_buffer } => {
                self.ctx
                    .device
                    .cmd_bind_vertex_buffers(self.ctx.command_buffer, 0, &[*vertex_buffer], &[0]);
                if let Some(index_buffer) = index_buffer {
                    self.ctx.device.cmd_bind_index_buffer(
                        self.ctx.command_buffer,
                        *index_buffer,
                        0,
                        vk::IndexType::UINT32,
                    );
                }
            }
            NodeKind::Draw { vertex_count, instance_count } => {
                self.ctx
                    .device
                    .cmd_draw(self.ctx.command_buffer, *vertex_count, *instance_count, 0, 0);
            }
            NodeKind::DrawIndexed { index_count, instance_count } => {
                self.ctx
                    .device
                    .cmd_draw_indexed(self.ctx.command_buffer, *index_count, *instance_count, 0, 0, 0);
            }
            NodeKind::Dispatch { x, y, z } => {
                self.ctx.device.cmd_dispatch(self.ctx.command_buffer, *x, *y, *z);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_command_classification_matches_draw_kinds() {
        assert!(NodeKind::Draw { vertex_count: 3, instance_count: 1 }.is_leaf_command());
        assert!(!NodeKind::Group.is_leaf_command());
    }
}
