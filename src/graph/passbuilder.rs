//! Render-pass builder (component E).
//!
//! Walks the scheduled operation sequence, accumulates consecutive graphics
//! operations with matching attachment size into a single render pass, and
//! works out per-attachment layouts and load/store ops per spec §4.E.

use std::collections::HashMap;

use vulkanalia::vk;

use crate::graph::alias::AliasInfo;
use crate::graph::operation::EntryKind;
use crate::graph::schedule::Schedule;
use crate::graph::transition::ResourceTransition;
use crate::graph::RenderGraph;

#[derive(Clone, Debug)]
pub struct AttachmentSlot {
    pub canonical_transition: u32,
    pub resource_type: String,
    pub samples: vk::SampleCountFlags,
    pub initial_layout: vk::ImageLayout,
    pub final_layout: vk::ImageLayout,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
    pub stencil_load_op: vk::AttachmentLoadOp,
    pub stencil_store_op: vk::AttachmentStoreOp,
}

#[derive(Clone, Debug, Default)]
pub struct SubpassPlan {
    pub operation: String,
    pub input_attachments: Vec<(usize, vk::ImageLayout)>,
    pub color_attachments: Vec<(usize, vk::ImageLayout)>,
    pub resolve_attachments: Vec<Option<(usize, vk::ImageLayout)>>,
    pub depth_stencil_attachment: Option<(usize, vk::ImageLayout)>,
    pub preserve_attachments: Vec<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct PassPlan {
    pub subpasses: Vec<SubpassPlan>,
    pub attachments: Vec<AttachmentSlot>,
    pub multi_view_mask: u32,
}

/// Non-graphics and graphics-but-outside-any-pass operations are represented by
/// an index into `global_order` with no associated pass.
#[derive(Clone, Debug)]
pub enum ScheduledUnit {
    Pass(PassPlan),
    Bare(String),
}

fn canonical_of(alias: &AliasInfo, transitions: &[ResourceTransition], op: &str, entry_name: &str) -> Option<u32> {
    transitions
        .iter()
        .find(|t| t.operation == op && t.entry == entry_name)
        .map(|t| alias.canonical_of.get(&t.id).copied().unwrap_or(t.id))
}

/// Whether canonical transition `id` is referenced by any entry belonging to an
/// operation strictly after `after_index` in `global_order`.
fn used_later(
    graph: &RenderGraph,
    alias: &AliasInfo,
    transitions: &[ResourceTransition],
    global_order: &[String],
    after_index: usize,
    canonical_id: u32,
) -> bool {
    global_order[after_index + 1..].iter().any(|op| {
        graph
            .get_operation_io(op, crate::graph::EntryKindMask::ALL)
            .iter()
            .any(|e| canonical_of(alias, transitions, op, &e.name) == Some(canonical_id))
    })
}

/// The first entry, strictly after `after_index` in `global_order`, whose
/// transition resolves (through aliasing) to canonical transition `canonical_id`.
/// Its [`crate::graph::operation::Entry::expected_layout`] is the layout the
/// attachment must be left in once this pass is done with it.
fn next_consumer_entry<'g>(
    graph: &'g RenderGraph,
    alias: &AliasInfo,
    transitions: &[ResourceTransition],
    global_order: &[String],
    after_index: usize,
    canonical_id: u32,
) -> Option<&'g crate::graph::operation::Entry> {
    for op in &global_order[after_index + 1..] {
        let found = graph
            .get_operation_io(op, crate::graph::EntryKindMask::ALL)
            .into_iter()
            .find(|e| canonical_of(alias, transitions, op, &e.name) == Some(canonical_id));
        if found.is_some() {
            return found;
        }
    }
    None
}

/// Builds the render-pass plan for the full schedule.
pub fn build(
    graph: &RenderGraph,
    schedule: &Schedule,
    transitions: &[ResourceTransition],
    alias: &AliasInfo,
) -> Vec<ScheduledUnit> {
    let order = &schedule.global_order;
    let mut units: Vec<ScheduledUnit> = Vec::new();
    let mut current: Option<(PassPlan, (u32, u32), usize)> = None; // (plan, size, first_index)

    for (idx, op_name) in order.iter().enumerate() {
        let op = graph.operation(op_name).expect("operation exists");
        let is_graphics = op.kind == crate::graph::OperationKind::Graphics;
        let size = op.attachment_size;

        let continues = match (&current, size) {
            (Some((_, cur_size, _)), Some((w, h))) => *cur_size == (w, h),
            _ => false,
        };

        if is_graphics && continues {
            let (plan, _, _) = current.as_mut().unwrap();
            push_subpass(graph, transitions, alias, plan, op_name);
            if op.multi_view_mask != 0 {
                plan.multi_view_mask = op.multi_view_mask;
            }
        } else {
            if let Some((plan, _, _)) = current.take() {
                units.push(ScheduledUnit::Pass(plan));
            }
            if is_graphics {
                let (w, h) = size.expect("graphics operation has attachment size");
                let mut plan = PassPlan::default();
                push_subpass(graph, transitions, alias, &mut plan, op_name);
                plan.multi_view_mask = op.multi_view_mask;
                current = Some((plan, (w, h), idx));
            } else {
                units.push(ScheduledUnit::Bare(op_name.clone()));
            }
        }
    }
    if let Some((plan, _, _)) = current.take() {
        units.push(ScheduledUnit::Pass(plan));
    }

    // Second pass: now that pass membership is known, fill in layouts/load-store
    // per attachment using the full schedule for "used later" lookups.
    finalize_attachments(graph, alias, transitions, order, &mut units);
    units
}

fn push_subpass(
    graph: &RenderGraph,
    transitions: &[ResourceTransition],
    alias: &AliasInfo,
    plan: &mut PassPlan,
    op_name: &str,
) {
    let mut subpass = SubpassPlan { operation: op_name.to_string(), ..Default::default() };

    let slot_of = |plan: &mut PassPlan, canonical_id: u32, resource_type: &str| -> usize {
        if let Some(i) = plan.attachments.iter().position(|a| a.canonical_transition == canonical_id) {
            i
        } else {
            let samples = graph
                .resource_definition(resource_type)
                .map(|d| d.samples)
                .unwrap_or(vk::SampleCountFlags::_1);
            plan.attachments.push(AttachmentSlot {
                canonical_transition: canonical_id,
                resource_type: resource_type.to_string(),
                samples,
                initial_layout: vk::ImageLayout::UNDEFINED,
                final_layout: vk::ImageLayout::UNDEFINED,
                load_op: vk::AttachmentLoadOp::DONT_CARE,
                store_op: vk::AttachmentStoreOp::DONT_CARE,
                stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
                stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            });
            plan.attachments.len() - 1
        }
    };

    let entries = graph.get_operation_io(op_name, crate::graph::EntryKindMask::ALL);
    // Color outputs first, so resolve outputs can find their slot index.
    let mut color_slot_by_name: HashMap<&str, usize> = HashMap::new();
    for e in entries.iter().filter(|e| e.kind == EntryKind::AttachmentOutput) {
        let canonical_id = canonical_of(alias, transitions, op_name, &e.name).expect("color output has a transition");
        let slot = slot_of(plan, canonical_id, &e.resource_type);
        color_slot_by_name.insert(e.name.as_str(), slot);
        subpass.color_attachments.push((slot, e.layout));
    }
    for e in entries.iter().filter(|e| e.kind == EntryKind::AttachmentResolveOutput) {
        let source = e.resolve_source.as_deref().unwrap_or("");
        let canonical_id = canonical_of(alias, transitions, op_name, &e.name).expect("resolve output has a transition");
        let slot = slot_of(plan, canonical_id, &e.resource_type);
        if let Some(&color_idx) = color_slot_by_name.get(source) {
            while subpass.resolve_attachments.len() <= color_idx {
                subpass.resolve_attachments.push(None);
            }
            subpass.resolve_attachments[color_idx] = Some((slot, e.layout));
        }
    }
    for e in entries.iter().filter(|e| e.kind == EntryKind::AttachmentInput) {
        let canonical_id = canonical_of(alias, transitions, op_name, &e.name).expect("attachment input has a transition");
        let slot = slot_of(plan, canonical_id, &e.resource_type);
        subpass.input_attachments.push((slot, e.layout));
    }
    for e in entries.iter().filter(|e| e.kind.is_depth()) {
        let canonical_id = canonical_of(alias, transitions, op_name, &e.name).expect("depth entry has a transition");
        let slot = slot_of(plan, canonical_id, &e.resource_type);
        subpass.depth_stencil_attachment = Some((slot, e.layout));
    }
    while subpass.resolve_attachments.len() < subpass.color_attachments.len() {
        subpass.resolve_attachments.push(None);
    }

    plan.subpasses.push(subpass);
}

fn finalize_attachments(
    graph: &RenderGraph,
    alias: &AliasInfo,
    transitions: &[ResourceTransition],
    global_order: &[String],
    units: &mut [ScheduledUnit],
) {
    // Map each pass to the index of its last operation in global_order, so
    // "used after this pass" lookups know where the pass ends.
    let mut pass_last_index: Vec<usize> = Vec::new();
    for unit in units.iter() {
        if let ScheduledUnit::Pass(plan) = unit {
            let last_op = &plan.subpasses.last().expect("pass has a subpass").operation;
            let idx = global_order.iter().position(|o| o == last_op).expect("operation scheduled");
            pass_last_index.push(idx);
        } else {
            pass_last_index.push(0);
        }
    }

    for (unit, &last_index) in units.iter_mut().zip(pass_last_index.iter()) {
        let plan = match unit {
            ScheduledUnit::Pass(p) => p,
            ScheduledUnit::Bare(_) => continue,
        };
        let is_swapchain = |resource_type: &str| {
            graph.resource_definition(resource_type).map(|d| d.is_swapchain()).unwrap_or(false)
        };
        let has_stencil = |resource_type: &str| {
            graph.resource_definition(resource_type).map(|d| d.has_stencil()).unwrap_or(false)
        };

        for slot_idx in 0..plan.attachments.len() {
            let canonical_id = plan.attachments[slot_idx].canonical_transition;
            let resource_type = plan.attachments[slot_idx].resource_type.clone();

            // First and last touching subpass, with their layout and entry kind.
            let mut first: Option<(usize, vk::ImageLayout, bool)> = None; // (subpass_idx, layout, is_output)
            let mut last: Option<(usize, vk::ImageLayout)> = None;
            for (sp_idx, subpass) in plan.subpasses.iter().enumerate() {
                let mut touches = |layout: vk::ImageLayout, is_output: bool| {
                    if first.is_none() {
                        first = Some((sp_idx, layout, is_output));
                    }
                    last = Some((sp_idx, layout));
                };
                for &(s, l) in &subpass.color_attachments {
                    if s == slot_idx {
                        touches(l, true);
                    }
                }
                for slot in subpass.resolve_attachments.iter().flatten() {
                    if slot.0 == slot_idx {
                        touches(slot.1, true);
                    }
                }
                for &(s, l) in &subpass.input_attachments {
                    if s == slot_idx {
                        touches(l, false);
                    }
                }
                if let Some((s, l)) = subpass.depth_stencil_attachment {
                    if s == slot_idx {
                        touches(l, true);
                    }
                }
            }
            let (first_sp, first_layout, first_is_output) = first.expect("attachment touched by some subpass");
            let (_, last_layout) = last.expect("attachment touched by some subpass");

            let later_use = used_later(graph, alias, transitions, global_order, last_index, canonical_id);
            let swapchain = is_swapchain(&resource_type);

            let initial_layout = first_layout;
            let final_layout = if swapchain && !later_use {
                vk::ImageLayout::PRESENT_SRC_KHR
            } else if later_use {
                // The later consumer's expected layout, per §4.E step 2; barrier
                // synthesis (F) only ever emits a dependency/barrier for the access
                // transition, never a layout change of its own, so this attachment
                // description is the sole place that layout transition happens.
                next_consumer_entry(graph, alias, transitions, global_order, last_index, canonical_id)
                    .map(|e| e.expected_layout())
                    .unwrap_or(last_layout)
            } else {
                last_layout
            };

            let load_op = if first_is_output {
                find_load_op(graph, transitions, alias, &plan.subpasses[first_sp].operation, canonical_id)
                    .unwrap_or(vk::AttachmentLoadOp::DONT_CARE)
            } else {
                vk::AttachmentLoadOp::LOAD
            };
            let store_op = if later_use || swapchain {
                vk::AttachmentStoreOp::STORE
            } else {
                vk::AttachmentStoreOp::DONT_CARE
            };
            let (stencil_load_op, stencil_store_op) = if has_stencil(&resource_type) {
                (load_op, store_op)
            } else {
                (vk::AttachmentLoadOp::DONT_CARE, vk::AttachmentStoreOp::DONT_CARE)
            };

            let slot = &mut plan.attachments[slot_idx];
            slot.initial_layout = initial_layout;
            slot.final_layout = final_layout;
            slot.load_op = load_op;
            slot.store_op = store_op;
            slot.stencil_load_op = stencil_load_op;
            slot.stencil_store_op = stencil_store_op;
        }

        compute_preserve_sets(plan);
    }
}

/// Looks up the declared [`crate::graph::LoadOp`] for whichever attachment-output
/// or depth-output entry on `op_name` maps to canonical transition `canonical_id`.
fn find_load_op(
    graph: &RenderGraph,
    transitions: &[ResourceTransition],
    alias: &AliasInfo,
    op_name: &str,
    canonical_id: u32,
) -> Option<vk::AttachmentLoadOp> {
    graph
        .get_operation_io(op_name, crate::graph::EntryKindMask::ALL_OUTPUTS)
        .into_iter()
        .find(|e| canonical_of(alias, transitions, op_name, &e.name) == Some(canonical_id))
        .and_then(|e| e.load_op)
        .map(|lo| lo.to_vk())
}

fn compute_preserve_sets(plan: &mut PassPlan) {
    let n = plan.subpasses.len();
    for sp_idx in 0..n {
        let used_before: std::collections::HashSet<usize> = plan.subpasses[..sp_idx]
            .iter()
            .flat_map(referenced_slots)
            .collect();
        let used_here: std::collections::HashSet<usize> = referenced_slots(&plan.subpasses[sp_idx]).into_iter().collect();
        let used_after: std::collections::HashSet<usize> = plan.subpasses[sp_idx + 1..]
            .iter()
            .flat_map(referenced_slots)
            .collect();
        let preserve: Vec<usize> = used_before
            .into_iter()
            .filter(|s| !used_here.contains(s) && used_after.contains(s))
            .collect();
        plan.subpasses[sp_idx].preserve_attachments = preserve;
    }
}

fn referenced_slots(subpass: &SubpassPlan) -> Vec<usize> {
    let mut slots: Vec<usize> = subpass.color_attachments.iter().map(|&(s, _)| s).collect();
    slots.extend(subpass.resolve_attachments.iter().flatten().map(|&(s, _)| s));
    slots.extend(subpass.input_attachments.iter().map(|&(s, _)| s));
    slots.extend(subpass.depth_stencil_attachment.iter().map(|&(s, _)| s));
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{
        transition::build_transitions, AttachmentRole, ImageSubresourceRange, LoadOp, OperationKind,
        ResourceDefinition, Size,
    };

    fn color_def() -> ResourceDefinition {
        ResourceDefinition::image(
            vk::Format::R8G8B8A8_UNORM,
            AttachmentRole::Color,
            Size::Absolute { width: 640, height: 480 },
            vk::ImageUsageFlags::COLOR_ATTACHMENT,
        )
    }

    /// S2 from spec.md: two graphics operations of the same size merge into one
    /// pass with an input-attachment dependency between their subpasses.
    #[test]
    fn two_subpass_deferred_merges_into_one_pass() {
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
        graph.set_queue_traits(vec![crate::graph::QueueTraits {
            name: "universal".to_string(),
            capabilities: vk::QueueFlags::GRAPHICS,
            queue_family_index: 0,
            policy: crate::graph::QueueAssignmentPolicy::Shared,
        }]);

        let order = crate::graph::order::topological_order(&graph).unwrap();
        let schedule = crate::graph::schedule::schedule(&graph, &order).unwrap();
        let transitions = build_transitions(&graph);
        let alias = crate::graph::alias::analyze(&graph, &transitions, &order);
        let units = build(&graph, &schedule, &transitions, &alias);

        assert_eq!(units.len(), 1);
        match &units[0] {
            ScheduledUnit::Pass(plan) => {
                assert_eq!(plan.subpasses.len(), 2);
                assert_eq!(plan.attachments.len(), 1);
            }
            ScheduledUnit::Bare(_) => panic!("expected a render pass"),
        }
    }

    /// S4-shaped case from spec.md: a color attachment written inside a render
    /// pass is later read by a bare transfer operation. The attachment's
    /// `final_layout` must be the transfer's expected layout
    /// (`TRANSFER_SRC_OPTIMAL`, derived from its `TRANSFER_READ` access mask),
    /// not whatever layout the attachment was left in by the pass itself --
    /// barrier synthesis never emits a layout-changing dependency for an
    /// attachment-to-bare-op edge (see `barrier::synthesize`'s `(Some(_), _)`
    /// arm), so this is the only place that transition happens.
    #[test]
    fn attachment_consumed_by_later_bare_op_gets_its_expected_layout() {
        let mut graph = RenderGraph::new();
        graph.add_resource_type("color", color_def()).unwrap();
        graph
            .add_operation("render", OperationKind::Graphics, Some((640, 480)), 0)
            .unwrap();
        graph.add_operation("blit", OperationKind::Transfer, None, 0).unwrap();
        graph
            .add_attachment_output(
                "render",
                "color",
                "color_out",
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                LoadOp::ClearColor([0.0; 4]),
                ImageSubresourceRange::default(),
            )
            .unwrap();
        graph
            .add_image_input(
                "blit",
                "color",
                "color_out",
                vk::PipelineStageFlags::TRANSFER,
                vk::AccessFlags::TRANSFER_READ,
                ImageSubresourceRange::default(),
            )
            .unwrap();
        graph.set_queue_traits(vec![crate::graph::QueueTraits {
            name: "universal".to_string(),
            capabilities: vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER,
            queue_family_index: 0,
            policy: crate::graph::QueueAssignmentPolicy::Shared,
        }]);

        let order = crate::graph::order::topological_order(&graph).unwrap();
        let schedule = crate::graph::schedule::schedule(&graph, &order).unwrap();
        let transitions = build_transitions(&graph);
        let alias = crate::graph::alias::analyze(&graph, &transitions, &order);
        let units = build(&graph, &schedule, &transitions, &alias);

        let pass = units
            .iter()
            .find_map(|u| match u {
                ScheduledUnit::Pass(p) => Some(p),
                ScheduledUnit::Bare(_) => None,
            })
            .expect("render pass exists");
        assert_eq!(pass.attachments.len(), 1);
        assert_eq!(pass.attachments[0].final_layout, vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
    }
}
