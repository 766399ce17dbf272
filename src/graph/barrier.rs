//! Barrier synthesis (component F).
//!
//! For every producer/consumer entry pair, decides whether the dependency is
//! absorbed into a render pass as a subpass dependency or must be emitted as an
//! explicit pipeline barrier, and resolves queue-family indices for any edge
//! that crosses queues, per spec §4.F.

use std::collections::HashMap;

use vulkanalia::vk;

use crate::graph::alias::AliasInfo;
use crate::graph::operation::{Entry, EntryKind};
use crate::graph::passbuilder::ScheduledUnit;
use crate::graph::schedule::Schedule;
use crate::graph::transition::ResourceTransition;
use crate::graph::{QueueTraits, RenderGraph};

fn all_shader_stages() -> vk::PipelineStageFlags {
    vk::PipelineStageFlags::VERTEX_SHADER
        | vk::PipelineStageFlags::TESSELLATION_CONTROL_SHADER
        | vk::PipelineStageFlags::TESSELLATION_EVALUATION_SHADER
        | vk::PipelineStageFlags::GEOMETRY_SHADER
        | vk::PipelineStageFlags::FRAGMENT_SHADER
        | vk::PipelineStageFlags::COMPUTE_SHADER
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Subpass {
    Index(u32),
    External,
}

#[derive(Clone, Debug)]
pub struct SubpassDependencyPlan {
    pub src_subpass: Subpass,
    pub dst_subpass: Subpass,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub by_region: bool,
}

#[derive(Clone, Debug)]
pub struct ImageBarrierPlan {
    pub canonical_transition: u32,
    pub before_operation: String,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_queue_family: u32,
    pub dst_queue_family: u32,
}

#[derive(Clone, Debug)]
pub struct BufferBarrierPlan {
    pub before_operation: String,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_queue_family: u32,
    pub dst_queue_family: u32,
    pub offset: u64,
    pub size: u64,
}

#[derive(Clone, Debug)]
pub struct QueueSemaphoreEdge {
    pub from_operation: String,
    pub to_operation: String,
    pub src_queue: usize,
    pub dst_queue: usize,
}

#[derive(Clone, Debug, Default)]
pub struct BarrierPlan {
    /// Pass index (into the `units` slice passed to `synthesize`) -> dependencies
    /// attached to that pass.
    pub subpass_dependencies: HashMap<usize, Vec<SubpassDependencyPlan>>,
    pub image_barriers: Vec<ImageBarrierPlan>,
    pub buffer_barriers: Vec<BufferBarrierPlan>,
    pub queue_semaphores: Vec<QueueSemaphoreEdge>,
}

fn stage_access_for(entry: &Entry) -> (vk::PipelineStageFlags, vk::AccessFlags) {
    match entry.kind {
        EntryKind::AttachmentOutput | EntryKind::AttachmentResolveOutput => (
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        ),
        EntryKind::AttachmentDepthOutput => (
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        EntryKind::AttachmentInput | EntryKind::AttachmentDepthInput => {
            (all_shader_stages(), vk::AccessFlags::SHADER_READ)
        }
        EntryKind::ImageInput => (all_shader_stages(), vk::AccessFlags::SHADER_READ),
        EntryKind::ImageOutput => (all_shader_stages(), vk::AccessFlags::SHADER_WRITE),
        EntryKind::BufferInput | EntryKind::BufferOutput => (entry.stage_mask, entry.access_mask),
    }
}

fn queue_family_of(queues: &[QueueTraits], schedule: &Schedule, op: &str) -> u32 {
    let idx = schedule.queue_of[op];
    queues[idx].queue_family_index
}

/// Builds a lookup from operation name to (pass index, subpass index) for every
/// operation that belongs to a render pass.
fn op_pass_index(units: &[ScheduledUnit]) -> HashMap<&str, (usize, u32)> {
    let mut map = HashMap::new();
    for (pass_idx, unit) in units.iter().enumerate() {
        if let ScheduledUnit::Pass(plan) = unit {
            for (sp_idx, subpass) in plan.subpasses.iter().enumerate() {
                map.insert(subpass.operation.as_str(), (pass_idx, sp_idx as u32));
            }
        }
    }
    map
}

pub fn synthesize(
    graph: &RenderGraph,
    schedule: &Schedule,
    units: &[ScheduledUnit],
    transitions: &[ResourceTransition],
    alias: &AliasInfo,
) -> BarrierPlan {
    let mut plan = BarrierPlan::default();
    let op_pass = op_pass_index(units);
    let queues = graph.queue_traits();

    let canonical_of_transition = |t: &ResourceTransition| alias.canonical_of.get(&t.id).copied().unwrap_or(t.id);

    for t in transitions {
        let t_entry = &graph.entries()[t.id as usize];
        if !t_entry.kind.is_output() {
            continue;
        }
        let consumers: Vec<&ResourceTransition> = transitions
            .iter()
            .filter(|u| u.entry == t_entry.name && graph.entries()[u.id as usize].kind.is_input())
            .collect();

        for u in &consumers {
            let u_entry = &graph.entries()[u.id as usize];
            let (src_stage, src_access) = stage_access_for(t_entry);
            let (dst_stage, dst_access) = stage_access_for(u_entry);

            let t_pass = op_pass.get(t_entry.operation.as_str()).copied();
            let u_pass = op_pass.get(u_entry.operation.as_str()).copied();

            match (t_pass, u_pass) {
                (Some((tp, t_sp)), Some((up, u_sp))) if tp == up => {
                    let by_region = matches!(
                        u_entry.kind,
                        EntryKind::AttachmentInput | EntryKind::AttachmentDepthInput
                    ) && matches!(
                        t_entry.kind,
                        EntryKind::AttachmentOutput
                            | EntryKind::AttachmentResolveOutput
                            | EntryKind::AttachmentDepthOutput
                    );
                    let deps = plan.subpass_dependencies.entry(tp).or_default();
                    if let Some(existing) = deps.iter_mut().find(|d| {
                        d.src_subpass == Subpass::Index(t_sp) && d.dst_subpass == Subpass::Index(u_sp)
                    }) {
                        existing.src_stage |= src_stage;
                        existing.dst_stage |= dst_stage;
                        existing.src_access |= src_access;
                        existing.dst_access |= dst_access;
                        existing.by_region &= by_region;
                    } else {
                        deps.push(SubpassDependencyPlan {
                            src_subpass: Subpass::Index(t_sp),
                            dst_subpass: Subpass::Index(u_sp),
                            src_stage,
                            dst_stage,
                            src_access,
                            dst_access,
                            by_region,
                        });
                    }
                }
                (Some((tp, t_sp)), _) => {
                    let deps = plan.subpass_dependencies.entry(tp).or_default();
                    deps.push(SubpassDependencyPlan {
                        src_subpass: Subpass::Index(t_sp),
                        dst_subpass: Subpass::External,
                        src_stage,
                        dst_stage,
                        src_access,
                        dst_access,
                        by_region: false,
                    });
                }
                (_, Some((up, u_sp))) => {
                    let deps = plan.subpass_dependencies.entry(up).or_default();
                    deps.push(SubpassDependencyPlan {
                        src_subpass: Subpass::External,
                        dst_subpass: Subpass::Index(u_sp),
                        src_stage,
                        dst_stage,
                        src_access,
                        dst_access,
                        by_region: false,
                    });
                }
                (None, None) => {
                    let src_queue = schedule.queue_of[&t_entry.operation];
                    let dst_queue = schedule.queue_of[&u_entry.operation];
                    let cross_queue = src_queue != dst_queue;
                    let (src_family, dst_family) = if cross_queue {
                        (
                            queue_family_of(queues, schedule, &t_entry.operation),
                            queue_family_of(queues, schedule, &u_entry.operation),
                        )
                    } else {
                        (vk::QUEUE_FAMILY_IGNORED, vk::QUEUE_FAMILY_IGNORED)
                    };
                    if cross_queue {
                        plan.queue_semaphores.push(QueueSemaphoreEdge {
                            from_operation: t_entry.operation.clone(),
                            to_operation: u_entry.operation.clone(),
                            src_queue,
                            dst_queue,
                        });
                    }

                    if t_entry.kind.is_image() || u_entry.kind.is_image() {
                        plan.image_barriers.push(ImageBarrierPlan {
                            canonical_transition: canonical_of_transition(t),
                            before_operation: u_entry.operation.clone(),
                            src_stage,
                            dst_stage,
                            src_access,
                            dst_access,
                            old_layout: t_entry.layout,
                            new_layout: u_entry.layout,
                            src_queue_family: src_family,
                            dst_queue_family: dst_family,
                        });
                    } else {
                        plan.buffer_barriers.push(BufferBarrierPlan {
                            before_operation: u_entry.operation.clone(),
                            src_stage,
                            dst_stage,
                            src_access,
                            dst_access,
                            src_queue_family: src_family,
                            dst_queue_family: dst_family,
                            offset: u_entry.buffer_range.offset,
                            size: u_entry.buffer_range.size,
                        });
                    }
                }
            }
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{
        transition::build_transitions, AttachmentRole, BufferSubresourceRange, ImageSubresourceRange, LoadOp,
        OperationKind, QueueAssignmentPolicy, ResourceDefinition, Size,
    };

    fn color_def() -> ResourceDefinition {
        ResourceDefinition::image(
            vk::Format::R8G8B8A8_UNORM,
            AttachmentRole::Color,
            Size::Absolute { width: 640, height: 480 },
            vk::ImageUsageFlags::COLOR_ATTACHMENT,
        )
    }

    #[test]
    fn same_pass_dependency_is_by_region() {
        let mut graph = RenderGraph::new();
        graph.add_resource_type("color", color_def()).unwrap();
        graph
            .add_operation("gbuffer", OperationKind::Graphics, Some((640, 480)), 0)
            .unwrap();
        graph
            .add_operation("lighting", OperationKind::Graphics, Some((640, 480)), 0)
            .unwrap();
        graph
            .add_attachment_output(
                "gbuffer",
                "color",
                "albedo",
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                LoadOp::ClearColor([0.0; 4]),
                ImageSubresourceRange::default(),
            )
            .unwrap();
        graph
            .add_attachment_input(
                "lighting",
                "color",
                "albedo",
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                ImageSubresourceRange::default(),
            )
            .unwrap();
        graph.set_queue_traits(vec![QueueTraits {
            name: "universal".to_string(),
            capabilities: vk::QueueFlags::GRAPHICS,
            queue_family_index: 0,
            policy: QueueAssignmentPolicy::Shared,
        }]);

        let order = crate::graph::order::topological_order(&graph).unwrap();
        let schedule = crate::graph::schedule::schedule(&graph, &order).unwrap();
        let transitions = build_transitions(&graph);
        let alias = crate::graph::alias::analyze(&graph, &transitions, &order);
        let units = crate::graph::passbuilder::build(&graph, &schedule, &transitions, &alias);
        let barriers = synthesize(&graph, &schedule, &units, &transitions, &alias);

        let deps = barriers.subpass_dependencies.get(&0).expect("pass 0 has a dependency");
        assert_eq!(deps.len(), 1);
        assert!(deps[0].by_region);
        assert_eq!(deps[0].src_subpass, Subpass::Index(0));
        assert_eq!(deps[0].dst_subpass, Subpass::Index(1));
    }

    #[test]
    fn cross_queue_edge_resolves_concrete_families() {
        let mut graph = RenderGraph::new();
        graph.add_resource_type(
            "buf",
            ResourceDefinition::buffer(vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::INDIRECT_BUFFER),
        ).unwrap();
        graph.add_operation("cull", OperationKind::Compute, None, 0).unwrap();
        graph
            .add_operation("draw", OperationKind::Graphics, Some((640, 480)), 0)
            .unwrap();
        graph
            .add_buffer_output(
                "cull",
                "buf",
                "indirect",
                vk::PipelineStageFlags::COMPUTE_SHADER,
                vk::AccessFlags::SHADER_WRITE,
                BufferSubresourceRange::default(),
            )
            .unwrap();
        graph
            .add_buffer_input(
                "draw",
                "buf",
                "indirect",
                vk::PipelineStageFlags::DRAW_INDIRECT,
                vk::AccessFlags::INDIRECT_COMMAND_READ,
                BufferSubresourceRange::default(),
            )
            .unwrap();
        graph.set_queue_traits(vec![
            QueueTraits {
                name: "compute".to_string(),
                capabilities: vk::QueueFlags::COMPUTE,
                queue_family_index: 1,
                policy: QueueAssignmentPolicy::Exclusive,
            },
            QueueTraits {
                name: "graphics".to_string(),
                capabilities: vk::QueueFlags::GRAPHICS,
                queue_family_index: 0,
                policy: QueueAssignmentPolicy::Exclusive,
            },
        ]);

        let order = crate::graph::order::topological_order(&graph).unwrap();
        let schedule = crate::graph::schedule::schedule(&graph, &order).unwrap();
        let transitions = build_transitions(&graph);
        let alias = crate::graph::alias::analyze(&graph, &transitions, &order);
        let units = crate::graph::passbuilder::build(&graph, &schedule, &transitions, &alias);
        let barriers = synthesize(&graph, &schedule, &units, &transitions, &alias);

        assert_eq!(barriers.queue_semaphores.len(), 1);
        assert_eq!(barriers.buffer_barriers.len(), 1);
        let b = &barriers.buffer_barriers[0];
        assert_ne!(b.src_queue_family, vk::QUEUE_FAMILY_IGNORED);
        assert_ne!(b.dst_queue_family, vk::QUEUE_FAMILY_IGNORED);
    }
}
