//! Resource & Memory Objects (component A).
//!
//! Static [`ResourceDefinition`]s describe the shape of a resource the graph will
//! transition; concrete [`MemoryObject`]s back them with real Vulkan handles once a
//! device and (for surface-relative resources) a surface are known. The allocator
//! contract is deliberately thin: the compiler and binder only ever `allocate` and
//! `free`, never inspect how an implementation manages fragmentation.

use vulkanalia::vk;

/// What kind of Vulkan object a [`ResourceDefinition`] ultimately produces.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Metatype {
    Image,
    Buffer,
}

/// The role an image attachment plays inside a render pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AttachmentRole {
    Color,
    Depth,
    Stencil,
    DepthStencil,
    Surface,
}

/// How a resource's extent is determined.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Size {
    Absolute { width: u32, height: u32 },
    /// Scaled relative to the owning surface's current swapchain extent.
    SurfaceRelative {
        scale: f32,
        layers: u32,
        mips: u32,
        samples: vk::SampleCountFlags,
    },
}

impl Size {
    /// Resolves this size against a surface's current swapchain extent.
    pub fn resolve(&self, swapchain_extent: vk::Extent2D) -> (u32, u32) {
        match *self {
            Size::Absolute { width, height } => (width, height),
            Size::SurfaceRelative { scale, .. } => (
                ((swapchain_extent.width as f32) * scale).round().max(1.0) as u32,
                ((swapchain_extent.height as f32) * scale).round().max(1.0) as u32,
            ),
        }
    }
}

/// A static description of a resource a graph may transition.
///
/// Two definitions are compatible (and thus may be aliased, see [`crate::graph::alias`])
/// iff every field compares equal.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceDefinition {
    pub metatype: Metatype,
    pub format: vk::Format,
    pub samples: vk::SampleCountFlags,
    pub role: AttachmentRole,
    pub size: Size,
    pub image_usage: vk::ImageUsageFlags,
    pub buffer_usage: vk::BufferUsageFlags,
}

impl ResourceDefinition {
    pub fn image(
        format: vk::Format,
        role: AttachmentRole,
        size: Size,
        usage: vk::ImageUsageFlags,
    ) -> Self {
        let samples = match size {
            Size::SurfaceRelative { samples, .. } => samples,
            Size::Absolute { .. } => vk::SampleCountFlags::_1,
        };
        Self {
            metatype: Metatype::Image,
            format,
            samples,
            role,
            size,
            image_usage: usage,
            buffer_usage: vk::BufferUsageFlags::empty(),
        }
    }

    pub fn buffer(usage: vk::BufferUsageFlags) -> Self {
        Self {
            metatype: Metatype::Buffer,
            format: vk::Format::UNDEFINED,
            samples: vk::SampleCountFlags::_1,
            role: AttachmentRole::Color,
            size: Size::Absolute { width: 0, height: 0 },
            image_usage: vk::ImageUsageFlags::empty(),
            buffer_usage: usage,
        }
    }

    pub fn is_swapchain(&self) -> bool {
        self.metatype == Metatype::Image && self.role == AttachmentRole::Surface
    }

    /// Whether this definition carries a stencil aspect.
    pub fn has_stencil(&self) -> bool {
        matches!(self.role, AttachmentRole::Stencil | AttachmentRole::DepthStencil)
    }

    pub fn has_depth(&self) -> bool {
        matches!(self.role, AttachmentRole::Depth | AttachmentRole::DepthStencil)
    }
}

/// Where a [`MemoryObject`] lives.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Lifetime {
    PerDevice,
    PerSurface,
}

/// How many physical images back a swapchain-bound [`MemoryObject`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SwapchainBehavior {
    Once,
    ForEachSwapchainImage,
}

/// A concrete image or buffer plus its active view/range.
///
/// Invariant: a swapchain-bound image is always `PerSurface` + `ForEachSwapchainImage`.
#[derive(Clone, Debug)]
pub struct MemoryObject {
    pub definition: ResourceDefinition,
    pub lifetime: Lifetime,
    pub swapchain_behavior: SwapchainBehavior,
    pub handle: MemoryHandle,
}

#[derive(Clone, Debug)]
pub enum MemoryHandle {
    Image {
        /// One entry for `Once`, one per swapchain image for `ForEachSwapchainImage`.
        images: Vec<vk::Image>,
        views: Vec<vk::ImageView>,
    },
    Buffer {
        buffers: Vec<vk::Buffer>,
    },
}

impl MemoryObject {
    pub fn swapchain(views: Vec<vk::ImageView>, format: vk::Format, extent: vk::Extent2D) -> Self {
        Self {
            definition: ResourceDefinition::image(
                format,
                AttachmentRole::Surface,
                Size::Absolute {
                    width: extent.width,
                    height: extent.height,
                },
                vk::ImageUsageFlags::COLOR_ATTACHMENT,
            ),
            lifetime: Lifetime::PerSurface,
            swapchain_behavior: SwapchainBehavior::ForEachSwapchainImage,
            handle: MemoryHandle::Image {
                images: Vec::new(),
                views,
            },
        }
    }
}

/// An allocation handed out by an [`Allocator`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub offset: u64,
    pub size: u64,
    pub memory_type_index: u32,
}

/// The allocation contract the compiler and framebuffer binder consume. Fragmentation
/// policy, defragmentation, and sub-allocation strategy are implementation details of
/// whatever sits behind this trait (this crate ships a first-fit default for
/// environments without a dedicated allocator library).
pub trait Allocator: Send + Sync {
    fn allocate(&self, size: u64, alignment: u64, properties: vk::MemoryPropertyFlags) -> crate::error::Result<Region>;
    fn free(&self, region: Region);
}

/// A first-fit allocator over a single pre-sized arena, split by memory-property
/// flags. Good enough for demos and tests; production deployments are expected to
/// plug in a real sub-allocator (e.g. a VMA binding) behind the same [`Allocator`]
/// trait.
pub struct FirstFitAllocator {
    arena_size: u64,
    free_list: parking_lot::Mutex<Vec<(u64, u64)>>,
}

impl FirstFitAllocator {
    pub fn new(arena_size: u64) -> Self {
        Self {
            arena_size,
            free_list: parking_lot::Mutex::new(vec![(0, arena_size)]),
        }
    }
}

impl Allocator for FirstFitAllocator {
    fn allocate(&self, size: u64, alignment: u64, properties: vk::MemoryPropertyFlags) -> crate::error::Result<Region> {
        let _ = properties;
        let mut free_list = self.free_list.lock();
        for i in 0..free_list.len() {
            let (offset, len) = free_list[i];
            let aligned = (offset + alignment - 1) / alignment * alignment;
            let padding = aligned - offset;
            if len >= size + padding {
                free_list[i] = (aligned + size, len - size - padding);
                if free_list[i].1 == 0 {
                    free_list.remove(i);
                }
                return Ok(Region {
                    offset: aligned,
                    size,
                    memory_type_index: 0,
                });
            }
        }
        Err(crate::error::GraphError::ResourceExhausted { requested: size })
    }

    fn free(&self, region: Region) {
        let mut free_list = self.free_list.lock();
        free_list.push((region.offset, region.size));
        free_list.sort_by_key(|&(offset, _)| offset);
        let mut merged: Vec<(u64, u64)> = Vec::with_capacity(free_list.len());
        for &(offset, size) in free_list.iter() {
            if let Some(last) = merged.last_mut() {
                let (last_offset, last_size): &mut (u64, u64) = last;
                if *last_offset + *last_size == offset {
                    *last_size += size;
                    continue;
                }
            }
            merged.push((offset, size));
        }
        *free_list = merged;
    }
}

impl std::fmt::Debug for FirstFitAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirstFitAllocator")
            .field("arena_size", &self.arena_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_fit_allocates_and_frees() {
        let allocator = FirstFitAllocator::new(1024);
        let a = allocator
            .allocate(256, 16, vk::MemoryPropertyFlags::DEVICE_LOCAL)
            .unwrap();
        let b = allocator
            .allocate(256, 16, vk::MemoryPropertyFlags::DEVICE_LOCAL)
            .unwrap();
        assert_eq!(a.offset, 0);
        assert_eq!(b.offset, 256);
        allocator.free(a);
        allocator.free(b);
        // After freeing both, the arena should be fully reclaimed as one block.
        let c = allocator
            .allocate(1024, 16, vk::MemoryPropertyFlags::DEVICE_LOCAL)
            .unwrap();
        assert_eq!(c.offset, 0);
    }

    #[test]
    fn exhausted_allocator_reports_requested_size() {
        let allocator = FirstFitAllocator::new(128);
        let err = allocator
            .allocate(256, 16, vk::MemoryPropertyFlags::DEVICE_LOCAL)
            .unwrap_err();
        match err {
            crate::error::GraphError::ResourceExhausted { requested } => assert_eq!(requested, 256),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn surface_relative_size_resolves_against_extent() {
        let size = Size::SurfaceRelative {
            scale: 0.5,
            layers: 1,
            mips: 1,
            samples: vk::SampleCountFlags::_1,
        };
        let (w, h) = size.resolve(vk::Extent2D { width: 1024, height: 768 });
        assert_eq!((w, h), (512, 384));
    }
}
