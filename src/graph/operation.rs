//! Operations and entries (component B data types).

use vulkanalia::vk;

use crate::scene::NodeId;

/// The kind of GPU work an operation performs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Graphics,
    Compute,
    Transfer,
}

/// A named node in the render graph.
#[derive(Clone, Debug)]
pub struct RenderOperation {
    pub name: String,
    pub kind: OperationKind,
    /// Required for `Graphics`; consecutive graphics operations with matching sizes
    /// are merged into one render pass by the pass builder (component E).
    pub attachment_size: Option<(u32, u32)>,
    /// 0 disables multi-view.
    pub multi_view_mask: u32,
    pub scene_graph_root: Option<NodeId>,
}

impl RenderOperation {
    pub fn new(name: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            name: name.into(),
            kind,
            attachment_size: None,
            multi_view_mask: 0,
            scene_graph_root: None,
        }
    }
}

/// What role an [`Entry`] plays, and therefore how the compiler treats it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EntryKind {
    AttachmentInput,
    AttachmentOutput,
    AttachmentResolveOutput,
    AttachmentDepthInput,
    AttachmentDepthOutput,
    ImageInput,
    ImageOutput,
    BufferInput,
    BufferOutput,
}

impl EntryKind {
    pub fn is_attachment(self) -> bool {
        matches!(
            self,
            EntryKind::AttachmentInput
                | EntryKind::AttachmentOutput
                | EntryKind::AttachmentResolveOutput
                | EntryKind::AttachmentDepthInput
                | EntryKind::AttachmentDepthOutput
        )
    }

    pub fn is_output(self) -> bool {
        matches!(
            self,
            EntryKind::AttachmentOutput
                | EntryKind::AttachmentResolveOutput
                | EntryKind::AttachmentDepthOutput
                | EntryKind::ImageOutput
                | EntryKind::BufferOutput
        )
    }

    pub fn is_input(self) -> bool {
        !self.is_output()
    }

    pub fn is_depth(self) -> bool {
        matches!(self, EntryKind::AttachmentDepthInput | EntryKind::AttachmentDepthOutput)
    }

    pub fn is_image(self) -> bool {
        self.is_attachment() || matches!(self, EntryKind::ImageInput | EntryKind::ImageOutput)
    }
}

bitflags::bitflags! {
    /// Filters the read-only query API (`get_operation_io`, `get_transition_io`, ...)
    /// down to a subset of [`EntryKind`]s.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct EntryKindMask: u32 {
        const ATTACHMENT_INPUT          = 1 << 0;
        const ATTACHMENT_OUTPUT         = 1 << 1;
        const ATTACHMENT_RESOLVE_OUTPUT = 1 << 2;
        const ATTACHMENT_DEPTH_INPUT    = 1 << 3;
        const ATTACHMENT_DEPTH_OUTPUT   = 1 << 4;
        const IMAGE_INPUT               = 1 << 5;
        const IMAGE_OUTPUT              = 1 << 6;
        const BUFFER_INPUT              = 1 << 7;
        const BUFFER_OUTPUT             = 1 << 8;

        const ALL_INPUTS = Self::ATTACHMENT_INPUT.bits()
            | Self::ATTACHMENT_DEPTH_INPUT.bits()
            | Self::IMAGE_INPUT.bits()
            | Self::BUFFER_INPUT.bits();
        const ALL_OUTPUTS = Self::ATTACHMENT_OUTPUT.bits()
            | Self::ATTACHMENT_RESOLVE_OUTPUT.bits()
            | Self::ATTACHMENT_DEPTH_OUTPUT.bits()
            | Self::IMAGE_OUTPUT.bits()
            | Self::BUFFER_OUTPUT.bits();
        const ALL = Self::ALL_INPUTS.bits() | Self::ALL_OUTPUTS.bits();
    }
}

impl From<EntryKind> for EntryKindMask {
    fn from(kind: EntryKind) -> Self {
        match kind {
            EntryKind::AttachmentInput => EntryKindMask::ATTACHMENT_INPUT,
            EntryKind::AttachmentOutput => EntryKindMask::ATTACHMENT_OUTPUT,
            EntryKind::AttachmentResolveOutput => EntryKindMask::ATTACHMENT_RESOLVE_OUTPUT,
            EntryKind::AttachmentDepthInput => EntryKindMask::ATTACHMENT_DEPTH_INPUT,
            EntryKind::AttachmentDepthOutput => EntryKindMask::ATTACHMENT_DEPTH_OUTPUT,
            EntryKind::ImageInput => EntryKindMask::IMAGE_INPUT,
            EntryKind::ImageOutput => EntryKindMask::IMAGE_OUTPUT,
            EntryKind::BufferInput => EntryKindMask::BUFFER_INPUT,
            EntryKind::BufferOutput => EntryKindMask::BUFFER_OUTPUT,
        }
    }
}

/// How an attachment entry's contents are initialized at the start of a render pass.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum LoadOp {
    ClearColor([f32; 4]),
    ClearDepthStencil { depth: f32, stencil: u32 },
    Load,
    DontCare,
}

impl LoadOp {
    pub fn to_vk(self) -> vk::AttachmentLoadOp {
        match self {
            LoadOp::ClearColor(_) | LoadOp::ClearDepthStencil { .. } => vk::AttachmentLoadOp::CLEAR,
            LoadOp::Load => vk::AttachmentLoadOp::LOAD,
            LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
        }
    }
}

/// A subresource range for an image entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ImageSubresourceRange {
    pub aspect_mask: vk::ImageAspectFlags,
    pub base_mip_level: u32,
    pub level_count: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
}

impl Default for ImageSubresourceRange {
    fn default() -> Self {
        Self {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        }
    }
}

impl ImageSubresourceRange {
    pub fn to_vk(self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: self.aspect_mask,
            base_mip_level: self.base_mip_level,
            level_count: self.level_count,
            base_array_layer: self.base_array_layer,
            layer_count: self.layer_count,
        }
    }
}

/// A subresource range for a buffer entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BufferSubresourceRange {
    pub offset: u64,
    pub size: u64,
}

impl Default for BufferSubresourceRange {
    fn default() -> Self {
        Self { offset: 0, size: vk::WHOLE_SIZE }
    }
}

/// A named input or output declared on an operation.
///
/// `name` is the graph-wide resource name this entry connects through: two entries
/// on different operations that share a `name` form a producer/consumer edge (see
/// [`crate::graph::order`]). It is *not* scoped to the declaring operation.
#[derive(Clone, Debug)]
pub struct Entry {
    pub name: String,
    pub operation: String,
    pub resource_type: String,
    pub kind: EntryKind,

    /// Attachments only.
    pub layout: vk::ImageLayout,
    pub load_op: Option<LoadOp>,
    pub image_range: ImageSubresourceRange,

    /// Buffers only.
    pub stage_mask: vk::PipelineStageFlags,
    pub access_mask: vk::AccessFlags,
    pub buffer_range: BufferSubresourceRange,

    /// `AttachmentResolveOutput` only: the color-output entry this resolves from.
    pub resolve_source: Option<String>,
}

impl Entry {
    /// The Vulkan image layout this entry requires its resource to be in.
    /// Attachment entries carry this explicitly; `ImageInput`/`ImageOutput`
    /// entries have no standalone layout in the data model (spec §3's Entry
    /// definition gives images only a stage/access mask), so it is derived
    /// from `access_mask` the way component F's stage/access table already
    /// distinguishes transfer from shader access.
    pub fn expected_layout(&self) -> vk::ImageLayout {
        match self.kind {
            EntryKind::AttachmentInput
            | EntryKind::AttachmentOutput
            | EntryKind::AttachmentResolveOutput
            | EntryKind::AttachmentDepthInput
            | EntryKind::AttachmentDepthOutput => self.layout,
            EntryKind::ImageInput => {
                if self.access_mask.contains(vk::AccessFlags::TRANSFER_READ) {
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL
                } else {
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
                }
            }
            EntryKind::ImageOutput => {
                if self.access_mask.contains(vk::AccessFlags::TRANSFER_WRITE) {
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL
                } else {
                    vk::ImageLayout::GENERAL
                }
            }
            EntryKind::BufferInput | EntryKind::BufferOutput => vk::ImageLayout::UNDEFINED,
        }
    }
}
