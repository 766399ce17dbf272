//! Orchestrates components C through F into an immutable [`Executable`].

use crate::error::Result;
use crate::graph::alias::{self, AliasInfo};
use crate::graph::barrier::{self, BarrierPlan};
use crate::graph::order;
use crate::graph::passbuilder::{self, ScheduledUnit};
use crate::graph::schedule::{self, Schedule};
use crate::graph::transition::{self, ResourceTransition};
use crate::graph::RenderGraph;

/// The immutable compiled form of a [`RenderGraph`]: a topological order, a
/// per-queue schedule, the alias analysis, the render-pass plan, and the
/// barrier/semaphore plan needed to execute it.
#[derive(Debug)]
pub struct Executable {
    pub order: Vec<String>,
    pub schedule: Schedule,
    pub transitions: Vec<ResourceTransition>,
    pub alias: AliasInfo,
    pub units: Vec<ScheduledUnit>,
    pub barriers: BarrierPlan,
}

impl Executable {
    /// The canonical transition a given (operation, entry) pair ultimately
    /// resolves to after alias analysis.
    pub fn canonical_transition(&self, operation: &str, entry_name: &str) -> Option<u32> {
        self.transitions
            .iter()
            .find(|t| t.operation == operation && t.entry == entry_name)
            .map(|t| self.alias.canonical_of.get(&t.id).copied().unwrap_or(t.id))
    }

    /// Every render pass in schedule order, skipping bare (non-graphics, or
    /// graphics-outside-a-pass -- which cannot happen by construction) units.
    pub fn passes(&self) -> impl Iterator<Item = &passbuilder::PassPlan> {
        self.units.iter().filter_map(|u| match u {
            ScheduledUnit::Pass(p) => Some(p),
            ScheduledUnit::Bare(_) => None,
        })
    }
}

pub fn compile(graph: &mut RenderGraph) -> Result<Executable> {
    let order = order::topological_order(graph)?;
    let schedule = schedule::schedule(graph, &order)?;
    let transitions = transition::build_transitions(graph);
    let alias = alias::analyze(graph, &transitions, &order);
    let units = passbuilder::build(graph, &schedule, &transitions, &alias);
    let barriers = barrier::synthesize(graph, &schedule, &units, &transitions, &alias);

    Ok(Executable { order, schedule, transitions, alias, units, barriers })
}

#[cfg(test)]
mod tests {
    use vulkanalia::vk;

    use super::*;
    use crate::graph::{
        AttachmentRole, BufferSubresourceRange, ImageSubresourceRange, LoadOp, OperationKind,
        QueueAssignmentPolicy, QueueTraits, ResourceDefinition, Size,
    };

    /// S1 from spec.md end to end: compute culls into an indirect buffer a
    /// graphics operation consumes; compiling produces a schedule with both
    /// operations on the single declared queue and no render pass (no
    /// attachments are declared).
    #[test]
    fn s1_compute_then_graphics_compiles() {
        let mut graph = RenderGraph::new();
        graph
            .add_resource_type(
                "indirect_buf",
                ResourceDefinition::buffer(vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::INDIRECT_BUFFER),
            )
            .unwrap();
        graph.add_operation("cull", OperationKind::Compute, None, 0).unwrap();
        graph
            .add_operation("draw", OperationKind::Graphics, Some((800, 600)), 0)
            .unwrap();
        graph
            .add_buffer_output(
                "cull",
                "indirect_buf",
                "indirect",
                vk::PipelineStageFlags::COMPUTE_SHADER,
                vk::AccessFlags::SHADER_WRITE,
                BufferSubresourceRange::default(),
            )
            .unwrap();
        graph
            .add_buffer_input(
                "draw",
                "indirect_buf",
                "indirect",
                vk::PipelineStageFlags::DRAW_INDIRECT,
                vk::AccessFlags::INDIRECT_COMMAND_READ,
                BufferSubresourceRange::default(),
            )
            .unwrap();
        graph.set_queue_traits(vec![QueueTraits {
            name: "universal".to_string(),
            capabilities: vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE,
            queue_family_index: 0,
            policy: QueueAssignmentPolicy::Shared,
        }]);

        let exe = graph.compile().unwrap();
        assert_eq!(exe.order, vec!["cull", "draw"]);
        assert_eq!(exe.schedule.global_order, vec!["cull", "draw"]);
        assert_eq!(exe.passes().count(), 1);
        assert!(!exe.barriers.buffer_barriers.is_empty() || !exe.barriers.subpass_dependencies.is_empty());
        assert!(graph.is_compiled());
    }

    /// S3 from spec.md end to end: three graphics operations of identical
    /// attachment definition alias into a single canonical transition after
    /// compiling.
    #[test]
    fn s3_image_aliasing_compiles() {
        let color_def = ResourceDefinition::image(
            vk::Format::R8G8B8A8_UNORM,
            AttachmentRole::Color,
            Size::Absolute { width: 512, height: 512 },
            vk::ImageUsageFlags::COLOR_ATTACHMENT,
        );
        let mut graph = RenderGraph::new();
        graph.add_resource_type("color", color_def).unwrap();
        for name in ["a", "b", "c"] {
            graph
                .add_operation(name, OperationKind::Graphics, Some((512, 512)), 0)
                .unwrap();
        }
        graph
            .add_attachment_output(
                "a",
                "color",
                "a_out",
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                LoadOp::ClearColor([0.0; 4]),
                ImageSubresourceRange::default(),
            )
            .unwrap();
        graph
            .add_attachment_input(
                "b",
                "color",
                "a_out",
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                ImageSubresourceRange::default(),
            )
            .unwrap();
        graph
            .add_attachment_output(
                "b",
                "color",
                "b_out",
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                LoadOp::ClearColor([0.0; 4]),
                ImageSubresourceRange::default(),
            )
            .unwrap();
        graph
            .add_attachment_input(
                "c",
                "color",
                "b_out",
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                ImageSubresourceRange::default(),
            )
            .unwrap();
        graph
            .add_attachment_output(
                "c",
                "color",
                "c_out",
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                LoadOp::ClearColor([0.0; 4]),
                ImageSubresourceRange::default(),
            )
            .unwrap();
        graph.set_queue_traits(vec![QueueTraits {
            name: "universal".to_string(),
            capabilities: vk::QueueFlags::GRAPHICS,
            queue_family_index: 0,
            policy: QueueAssignmentPolicy::Shared,
        }]);

        let exe = graph.compile().unwrap();
        let canon_a = exe.canonical_transition("a", "a_out").unwrap();
        let canon_b = exe.canonical_transition("b", "b_out").unwrap();
        let canon_c = exe.canonical_transition("c", "c_out").unwrap();
        assert_eq!(canon_a, canon_b);
        assert_eq!(canon_b, canon_c);
    }
}
