//! Builds real `vk::RenderPass` objects from a compiled [`crate::graph::passbuilder::PassPlan`]
//! plus the subpass dependencies [`crate::graph::barrier::synthesize`] worked out for it.
//! Component E/F meet the Vulkan API here.

use anyhow::Result;
use vulkanalia::prelude::v1_0::*;

use crate::graph::barrier::{Subpass, SubpassDependencyPlan};
use crate::graph::passbuilder::PassPlan;

fn vk_subpass(s: Subpass) -> u32 {
    match s {
        Subpass::Index(i) => i,
        Subpass::External => vk::SUBPASS_EXTERNAL,
    }
}

/// `attachment_formats` must have one entry per `plan.attachments` slot, in order.
pub unsafe fn create_render_pass(
    device: &Device,
    plan: &PassPlan,
    attachment_formats: &[vk::Format],
    dependencies: &[SubpassDependencyPlan],
) -> Result<vk::RenderPass> {
    let attachments: Vec<vk::AttachmentDescription> = plan
        .attachments
        .iter()
        .zip(attachment_formats.iter())
        .map(|(slot, &format)| {
            vk::AttachmentDescription::builder()
                .format(format)
                .samples(slot.samples)
                .load_op(slot.load_op)
                .store_op(slot.store_op)
                .stencil_load_op(slot.stencil_load_op)
                .stencil_store_op(slot.stencil_store_op)
                .initial_layout(slot.initial_layout)
                .final_layout(slot.final_layout)
                .build()
        })
        .collect();

    // Per-subpass attachment reference vectors must outlive the subpass
    // descriptions built from them, hence the two-phase construction.
    struct SubpassRefs {
        color: Vec<vk::AttachmentReference>,
        resolve: Vec<vk::AttachmentReference>,
        input: Vec<vk::AttachmentReference>,
        depth: Option<vk::AttachmentReference>,
        preserve: Vec<u32>,
    }

    let refs: Vec<SubpassRefs> = plan
        .subpasses
        .iter()
        .map(|sp| SubpassRefs {
            color: sp.color_attachments.iter().map(|&(i, l)| vk::AttachmentReference::builder().attachment(i as u32).layout(l).build()).collect(),
            resolve: sp
                .resolve_attachments
                .iter()
                .map(|slot| match slot {
                    Some((i, l)) => vk::AttachmentReference::builder().attachment(*i as u32).layout(*l).build(),
                    None => vk::AttachmentReference::builder().attachment(vk::ATTACHMENT_UNUSED).layout(vk::ImageLayout::UNDEFINED).build(),
                })
                .collect(),
            input: sp.input_attachments.iter().map(|&(i, l)| vk::AttachmentReference::builder().attachment(i as u32).layout(l).build()).collect(),
            depth: sp.depth_stencil_attachment.map(|(i, l)| vk::AttachmentReference::builder().attachment(i as u32).layout(l).build()),
            preserve: sp.preserve_attachments.iter().map(|&i| i as u32).collect(),
        })
        .collect();

    let subpasses: Vec<vk::SubpassDescription> = refs
        .iter()
        .map(|r| {
            let mut builder = vk::SubpassDescription::builder()
                .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
                .color_attachments(&r.color)
                .input_attachments(&r.input)
                .preserve_attachments(&r.preserve);
            if !r.resolve.is_empty() {
                builder = builder.resolve_attachments(&r.resolve);
            }
            if let Some(depth) = &r.depth {
                builder = builder.depth_stencil_attachment(depth);
            }
            builder.build()
        })
        .collect();

    let vk_dependencies: Vec<vk::SubpassDependency> = dependencies
        .iter()
        .map(|d| {
            vk::SubpassDependency::builder()
                .src_subpass(vk_subpass(d.src_subpass))
                .dst_subpass(vk_subpass(d.dst_subpass))
                .src_stage_mask(d.src_stage)
                .dst_stage_mask(d.dst_stage)
                .src_access_mask(d.src_access)
                .dst_access_mask(d.dst_access)
                .dependency_flags(if d.by_region { vk::DependencyFlags::BY_REGION } else { vk::DependencyFlags::empty() })
                .build()
        })
        .collect();

    let mut info = vk::RenderPassCreateInfo::builder()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&vk_dependencies);

    if plan.multi_view_mask != 0 {
        let view_masks = vec![plan.multi_view_mask; subpasses.len()];
        let mut multiview = vk::RenderPassMultiviewCreateInfo::builder().view_masks(&view_masks);
        info = info.push_next(&mut multiview);
        return Ok(device.create_render_pass(&info, None)?);
    }

    Ok(device.create_render_pass(&info, None)?)
}
