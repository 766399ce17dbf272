//! Framebuffer binder (component G).
//!
//! Resolves each render pass's attachment slots to concrete [`vk::ImageView`]s
//! and builds one [`vk::Framebuffer`] per render pass (or one per swapchain
//! image, for passes that touch a swapchain-bound attachment), generalizing the
//! teacher's one-render-pass `create_framebuffers` (`vulkan/framebuffer.rs`) to
//! the graph's arbitrary attachment set.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use vulkanalia::prelude::v1_0::*;

use crate::graph::resource::{Lifetime, MemoryHandle, MemoryObject, SwapchainBehavior};
use crate::graph::Executable;

/// The live image views backing every canonical transition, keyed by id. Views
/// for `ForEachSwapchainImage` objects carry one entry per swapchain image.
pub struct ResourceViews {
    pub per_transition: HashMap<u32, MemoryObject>,
}

impl ResourceViews {
    fn views_for(&self, canonical_id: u32, swapchain_index: usize) -> Result<vk::ImageView> {
        let object = self
            .per_transition
            .get(&canonical_id)
            .ok_or_else(|| anyhow!("no memory object bound for canonical transition {canonical_id}"))?;
        match &object.handle {
            MemoryHandle::Image { views, .. } => match object.swapchain_behavior {
                SwapchainBehavior::Once => views.first().copied().ok_or_else(|| anyhow!("image has no view")),
                SwapchainBehavior::ForEachSwapchainImage => views
                    .get(swapchain_index)
                    .copied()
                    .ok_or_else(|| anyhow!("swapchain index {swapchain_index} out of range")),
            },
            MemoryHandle::Buffer { .. } => Err(anyhow!("canonical transition {canonical_id} is a buffer, not an image")),
        }
    }

    fn is_per_surface_swapchain(&self, canonical_id: u32) -> bool {
        self.per_transition
            .get(&canonical_id)
            .map(|o| o.lifetime == Lifetime::PerSurface && o.swapchain_behavior == SwapchainBehavior::ForEachSwapchainImage)
            .unwrap_or(false)
    }
}

/// One framebuffer per swapchain index for passes touching a swapchain-bound
/// attachment; exactly one shared framebuffer otherwise.
pub struct PassFramebuffers {
    pub framebuffers: Vec<vk::Framebuffer>,
}

/// Builds every render pass's framebuffer(s) against the given render pass
/// handles (already created by the caller from the executable's attachment
/// descriptions) and the currently bound resource views.
pub unsafe fn bind(
    device: &Device,
    executable: &Executable,
    render_passes: &[vk::RenderPass],
    views: &ResourceViews,
    swapchain_extent: vk::Extent2D,
    swapchain_image_count: usize,
) -> Result<Vec<PassFramebuffers>> {
    let passes: Vec<_> = executable.passes().collect();
    if passes.len() != render_passes.len() {
        return Err(anyhow!(
            "render pass handle count {} does not match executable pass count {}",
            render_passes.len(),
            passes.len()
        ));
    }

    let mut result = Vec::with_capacity(passes.len());
    for (pass, &render_pass) in passes.iter().zip(render_passes.iter()) {
        let per_surface = pass
            .attachments
            .iter()
            .any(|a| views.is_per_surface_swapchain(a.canonical_transition));

        let image_count = if per_surface { swapchain_image_count } else { 1 };
        let mut framebuffers = Vec::with_capacity(image_count);
        for swapchain_index in 0..image_count {
            let attachments: Vec<vk::ImageView> = pass
                .attachments
                .iter()
                .map(|a| views.views_for(a.canonical_transition, swapchain_index))
                .collect::<Result<_>>()?;
            let create_info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(swapchain_extent.width)
                .height(swapchain_extent.height)
                .layers(1);
            framebuffers.push(device.create_framebuffer(&create_info, None)?);
        }
        result.push(PassFramebuffers { framebuffers });
    }
    Ok(result)
}

/// Destroys every framebuffer built by [`bind`]; called before swapchain
/// recreation or on teardown.
pub unsafe fn destroy(device: &Device, bound: &[PassFramebuffers]) {
    for pass in bound {
        for &framebuffer in &pass.framebuffers {
            device.destroy_framebuffer(framebuffer, None);
        }
    }
}
