//! The render graph declaration (component B) and the compiler pipeline it feeds
//! (components C through G), assembled into an immutable [`executable::Executable`].

pub mod alias;
pub mod barrier;
pub mod executable;
pub mod operation;
pub mod order;
pub mod passbuilder;
pub mod resource;
pub mod schedule;
pub mod transition;

use std::collections::HashMap;

use vulkanalia::vk;

use crate::error::{GraphError, Result};
use crate::scene::NodeId;

pub use executable::Executable;
pub use operation::{
    BufferSubresourceRange, Entry, EntryKind, EntryKindMask, ImageSubresourceRange, LoadOp,
    OperationKind, RenderOperation,
};
pub use resource::{AttachmentRole, MemoryObject, Metatype, ResourceDefinition, Size};
pub use transition::{ResourceIdentity, ResourceTransition};

/// Assignment policy for a queue in the queue-traits list consumed by the scheduler
/// (component C).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum QueueAssignmentPolicy {
    /// Only operations explicitly pinned to this queue may run on it.
    Exclusive,
    /// Any operation whose kind this queue's capability mask satisfies may run on it.
    Shared,
}

/// One entry of the queue-traits list the scheduler assigns operations onto.
#[derive(Clone, Debug)]
pub struct QueueTraits {
    pub name: String,
    pub capabilities: vk::QueueFlags,
    pub queue_family_index: u32,
    pub policy: QueueAssignmentPolicy,
}

impl QueueTraits {
    pub fn supports(&self, kind: OperationKind) -> bool {
        match kind {
            OperationKind::Graphics => self.capabilities.contains(vk::QueueFlags::GRAPHICS),
            OperationKind::Compute => self.capabilities.contains(vk::QueueFlags::COMPUTE),
            OperationKind::Transfer => self.capabilities.intersects(
                vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            ),
        }
    }
}

/// A user-owned external binding of a graph-wide entry name to a concrete
/// [`MemoryObject`], installed with [`RenderGraph::associate_memory_object`].
#[derive(Clone, Debug)]
pub struct ExternalBinding {
    pub memory_object: MemoryObject,
    pub view_type: Option<vk::ImageViewType>,
}

/// A declarative description of rendering work: operations, resource types, and the
/// named entries that connect them.
///
/// All mutators invalidate the `compiled` bit; [`RenderGraph::compile`] is the only
/// way to clear it, producing an immutable [`Executable`].
#[derive(Debug)]
pub struct RenderGraph {
    resource_types: HashMap<String, ResourceDefinition>,
    resource_type_order: Vec<String>,

    operations: HashMap<String, RenderOperation>,
    operation_order: Vec<String>,

    entries: Vec<Entry>,
    external_bindings: HashMap<String, ExternalBinding>,

    queue_traits: Vec<QueueTraits>,

    compiled: bool,
}

impl Default for RenderGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderGraph {
    pub fn new() -> Self {
        Self {
            resource_types: HashMap::new(),
            resource_type_order: Vec::new(),
            operations: HashMap::new(),
            operation_order: Vec::new(),
            entries: Vec::new(),
            external_bindings: HashMap::new(),
            queue_traits: Vec::new(),
            compiled: false,
        }
    }

    pub fn set_queue_traits(&mut self, traits: Vec<QueueTraits>) {
        self.queue_traits = traits;
        self.compiled = false;
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    pub fn add_resource_type(&mut self, name: impl Into<String>, definition: ResourceDefinition) -> Result<()> {
        let name = name.into();
        if self.resource_types.contains_key(&name) {
            return Err(GraphError::DuplicateName(name));
        }
        self.resource_type_order.push(name.clone());
        self.resource_types.insert(name, definition);
        self.compiled = false;
        Ok(())
    }

    pub fn add_operation(
        &mut self,
        name: impl Into<String>,
        kind: OperationKind,
        attachment_size: Option<(u32, u32)>,
        multi_view_mask: u32,
    ) -> Result<()> {
        let name = name.into();
        if self.operations.contains_key(&name) {
            return Err(GraphError::DuplicateName(name));
        }
        if kind == OperationKind::Graphics && attachment_size.is_none() {
            return Err(GraphError::InvalidGraph(format!(
                "graphics operation '{name}' must declare an attachment size"
            )));
        }
        let mut op = RenderOperation::new(&name, kind);
        op.attachment_size = attachment_size;
        op.multi_view_mask = multi_view_mask;
        self.operation_order.push(name.clone());
        self.operations.insert(name, op);
        self.compiled = false;
        Ok(())
    }

    pub fn set_render_operation_node(&mut self, op_name: &str, scene_graph_root: NodeId) -> Result<()> {
        let op = self
            .operations
            .get_mut(op_name)
            .ok_or_else(|| GraphError::MissingResource { kind: "operation", name: op_name.to_string() })?;
        op.scene_graph_root = Some(scene_graph_root);
        self.compiled = false;
        Ok(())
    }

    fn resource_type(&self, name: &str) -> Result<&ResourceDefinition> {
        self.resource_types
            .get(name)
            .ok_or_else(|| GraphError::MissingResource { kind: "resource type", name: name.to_string() })
    }

    fn check_operation_exists(&self, op: &str) -> Result<()> {
        if self.operations.contains_key(op) {
            Ok(())
        } else {
            Err(GraphError::MissingResource { kind: "operation", name: op.to_string() })
        }
    }

    /// Checks the resource-type consistency invariant: every entry sharing a name
    /// must reference a compatible [`ResourceDefinition`].
    fn check_type_consistency(&self, entry_name: &str, resource_type: &str) -> Result<()> {
        let new_def = self.resource_type(resource_type)?;
        if let Some(existing) = self.entries.iter().find(|e| e.name == entry_name) {
            let existing_def = self.resource_type(&existing.resource_type)?;
            if existing_def != new_def {
                return Err(GraphError::TypeMismatch {
                    resource: entry_name.to_string(),
                    expected: existing_def.clone(),
                    found: new_def.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_no_self_conflict(&self, op: &str, entry_name: &str, kind: EntryKind) -> Result<()> {
        let opposite_exists = self
            .entries
            .iter()
            .any(|e| e.operation == op && e.name == entry_name && e.kind.is_input() != kind.is_input());
        if opposite_exists {
            return Err(GraphError::InvalidGraph(format!(
                "operation '{op}' declares '{entry_name}' as both an input and an output"
            )));
        }
        Ok(())
    }

    fn check_single_producer(&self, entry_name: &str, kind: EntryKind) -> Result<()> {
        if kind.is_output() && self.entries.iter().any(|e| e.name == entry_name && e.kind.is_output()) {
            return Err(GraphError::InvalidGraph(format!(
                "resource '{entry_name}' already has a producer"
            )));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn add_entry(
        &mut self,
        op: &str,
        resource_type: &str,
        entry_name: &str,
        kind: EntryKind,
        layout: vk::ImageLayout,
        load_op: Option<LoadOp>,
        image_range: ImageSubresourceRange,
        stage_mask: vk::PipelineStageFlags,
        access_mask: vk::AccessFlags,
        buffer_range: BufferSubresourceRange,
        resolve_source: Option<String>,
    ) -> Result<()> {
        self.check_operation_exists(op)?;
        self.resource_type(resource_type)?;
        self.check_type_consistency(entry_name, resource_type)?;
        self.check_no_self_conflict(op, entry_name, kind)?;
        self.check_single_producer(entry_name, kind)?;

        if kind.is_attachment() {
            let op_size = self.operations[op]
                .attachment_size
                .ok_or_else(|| GraphError::InvalidGraph(format!("operation '{op}' has no attachment size")))?;
            if let Size::Absolute { width, height } = self.resource_type(resource_type)?.size {
                if (width, height) != op_size {
                    return Err(GraphError::InvalidGraph(format!(
                        "attachment '{entry_name}' size {width}x{height} does not match operation '{op}' size {}x{}",
                        op_size.0, op_size.1
                    )));
                }
            }
        }

        self.entries.push(Entry {
            name: entry_name.to_string(),
            operation: op.to_string(),
            resource_type: resource_type.to_string(),
            kind,
            layout,
            load_op,
            image_range,
            stage_mask,
            access_mask,
            buffer_range,
            resolve_source,
        });
        self.compiled = false;
        Ok(())
    }

    pub fn add_attachment_input(
        &mut self,
        op: &str,
        resource_type: &str,
        entry_name: &str,
        layout: vk::ImageLayout,
        range: ImageSubresourceRange,
    ) -> Result<()> {
        self.add_entry(
            op,
            resource_type,
            entry_name,
            EntryKind::AttachmentInput,
            layout,
            None,
            range,
            vk::PipelineStageFlags::empty(),
            vk::AccessFlags::empty(),
            BufferSubresourceRange::default(),
            None,
        )
    }

    pub fn add_attachment_output(
        &mut self,
        op: &str,
        resource_type: &str,
        entry_name: &str,
        layout: vk::ImageLayout,
        load_op: LoadOp,
        range: ImageSubresourceRange,
    ) -> Result<()> {
        self.add_entry(
            op,
            resource_type,
            entry_name,
            EntryKind::AttachmentOutput,
            layout,
            Some(load_op),
            range,
            vk::PipelineStageFlags::empty(),
            vk::AccessFlags::empty(),
            BufferSubresourceRange::default(),
            None,
        )
    }

    pub fn add_attachment_resolve_output(
        &mut self,
        op: &str,
        resource_type: &str,
        entry_name: &str,
        layout: vk::ImageLayout,
        resolve_source: &str,
        range: ImageSubresourceRange,
    ) -> Result<()> {
        self.add_entry(
            op,
            resource_type,
            entry_name,
            EntryKind::AttachmentResolveOutput,
            layout,
            Some(LoadOp::DontCare),
            range,
            vk::PipelineStageFlags::empty(),
            vk::AccessFlags::empty(),
            BufferSubresourceRange::default(),
            Some(resolve_source.to_string()),
        )
    }

    pub fn add_attachment_depth_input(
        &mut self,
        op: &str,
        resource_type: &str,
        entry_name: &str,
        layout: vk::ImageLayout,
        range: ImageSubresourceRange,
    ) -> Result<()> {
        self.add_entry(
            op,
            resource_type,
            entry_name,
            EntryKind::AttachmentDepthInput,
            layout,
            None,
            range,
            vk::PipelineStageFlags::empty(),
            vk::AccessFlags::empty(),
            BufferSubresourceRange::default(),
            None,
        )
    }

    pub fn add_attachment_depth_output(
        &mut self,
        op: &str,
        resource_type: &str,
        entry_name: &str,
        layout: vk::ImageLayout,
        load_op: LoadOp,
        range: ImageSubresourceRange,
    ) -> Result<()> {
        self.add_entry(
            op,
            resource_type,
            entry_name,
            EntryKind::AttachmentDepthOutput,
            layout,
            Some(load_op),
            range,
            vk::PipelineStageFlags::empty(),
            vk::AccessFlags::empty(),
            BufferSubresourceRange::default(),
            None,
        )
    }

    pub fn add_image_input(
        &mut self,
        op: &str,
        resource_type: &str,
        entry_name: &str,
        stage_mask: vk::PipelineStageFlags,
        access_mask: vk::AccessFlags,
        range: ImageSubresourceRange,
    ) -> Result<()> {
        self.add_entry(
            op,
            resource_type,
            entry_name,
            EntryKind::ImageInput,
            vk::ImageLayout::UNDEFINED,
            None,
            range,
            stage_mask,
            access_mask,
            BufferSubresourceRange::default(),
            None,
        )
    }

    pub fn add_image_output(
        &mut self,
        op: &str,
        resource_type: &str,
        entry_name: &str,
        stage_mask: vk::PipelineStageFlags,
        access_mask: vk::AccessFlags,
        range: ImageSubresourceRange,
    ) -> Result<()> {
        self.add_entry(
            op,
            resource_type,
            entry_name,
            EntryKind::ImageOutput,
            vk::ImageLayout::GENERAL,
            None,
            range,
            stage_mask,
            access_mask,
            BufferSubresourceRange::default(),
            None,
        )
    }

    pub fn add_buffer_input(
        &mut self,
        op: &str,
        resource_type: &str,
        entry_name: &str,
        stage_mask: vk::PipelineStageFlags,
        access_mask: vk::AccessFlags,
        range: BufferSubresourceRange,
    ) -> Result<()> {
        self.add_entry(
            op,
            resource_type,
            entry_name,
            EntryKind::BufferInput,
            vk::ImageLayout::UNDEFINED,
            None,
            ImageSubresourceRange::default(),
            stage_mask,
            access_mask,
            range,
            None,
        )
    }

    pub fn add_buffer_output(
        &mut self,
        op: &str,
        resource_type: &str,
        entry_name: &str,
        stage_mask: vk::PipelineStageFlags,
        access_mask: vk::AccessFlags,
        range: BufferSubresourceRange,
    ) -> Result<()> {
        self.add_entry(
            op,
            resource_type,
            entry_name,
            EntryKind::BufferOutput,
            vk::ImageLayout::UNDEFINED,
            None,
            ImageSubresourceRange::default(),
            stage_mask,
            access_mask,
            range,
            None,
        )
    }

    pub fn associate_memory_object(
        &mut self,
        entry_name: &str,
        memory_object: MemoryObject,
        view_type: Option<vk::ImageViewType>,
    ) {
        self.external_bindings.insert(
            entry_name.to_string(),
            ExternalBinding { memory_object, view_type },
        );
        self.compiled = false;
    }

    // -- Read-only queries -------------------------------------------------

    pub fn get_operation_io(&self, op: &str, mask: EntryKindMask) -> Vec<&Entry> {
        self.entries
            .iter()
            .filter(|e| e.operation == op && mask.contains(EntryKindMask::from(e.kind)))
            .collect()
    }

    pub fn get_transition_io(&self, entry_name: &str, mask: EntryKindMask) -> Vec<&Entry> {
        self.entries
            .iter()
            .filter(|e| e.name == entry_name && mask.contains(EntryKindMask::from(e.kind)))
            .collect()
    }

    /// Operations with no input entry that matches another operation's output entry.
    pub fn get_initial_operations(&self) -> Vec<&str> {
        self.operation_order
            .iter()
            .map(String::as_str)
            .filter(|op| {
                self.get_operation_io(op, EntryKindMask::ALL_INPUTS)
                    .iter()
                    .all(|input| !self.entries.iter().any(|e| e.name == input.name && e.kind.is_output()))
            })
            .collect()
    }

    /// Operations with no output entry consumed by another operation.
    pub fn get_final_operations(&self) -> Vec<&str> {
        self.operation_order
            .iter()
            .map(String::as_str)
            .filter(|op| {
                self.get_operation_io(op, EntryKindMask::ALL_OUTPUTS)
                    .iter()
                    .all(|output| !self.entries.iter().any(|e| e.name == output.name && e.kind.is_input()))
            })
            .collect()
    }

    /// The operation that produces the entry named `entry_name`, if any operation
    /// in this graph consumes it as an input.
    pub fn get_previous_operations(&self, op: &str) -> Vec<&str> {
        let mut result: Vec<&str> = self
            .get_operation_io(op, EntryKindMask::ALL_INPUTS)
            .into_iter()
            .filter_map(|input| {
                self.entries
                    .iter()
                    .find(|e| e.name == input.name && e.kind.is_output())
                    .map(|e| e.operation.as_str())
            })
            .collect();
        result.sort_unstable();
        result.dedup();
        result
    }

    pub fn get_next_operations(&self, op: &str) -> Vec<&str> {
        let mut result: Vec<&str> = self
            .get_operation_io(op, EntryKindMask::ALL_OUTPUTS)
            .into_iter()
            .flat_map(|output| {
                self.entries
                    .iter()
                    .filter(move |e| e.name == output.name && e.kind.is_input())
                    .map(|e| e.operation.as_str())
            })
            .collect();
        result.sort_unstable();
        result.dedup();
        result
    }

    pub fn operations(&self) -> impl Iterator<Item = &RenderOperation> {
        self.operation_order.iter().map(move |name| &self.operations[name])
    }

    pub fn operation(&self, name: &str) -> Option<&RenderOperation> {
        self.operations.get(name)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn external_bindings(&self) -> &HashMap<String, ExternalBinding> {
        &self.external_bindings
    }

    pub fn queue_traits(&self) -> &[QueueTraits] {
        &self.queue_traits
    }

    pub fn resource_definition(&self, resource_type: &str) -> Option<&ResourceDefinition> {
        self.resource_types.get(resource_type)
    }

    /// Runs the full compiler pipeline (C -> D -> E -> F) and produces an
    /// immutable [`Executable`]. Marks this graph `compiled`.
    pub fn compile(&mut self) -> Result<Executable> {
        let exe = executable::compile(self)?;
        self.compiled = true;
        Ok(exe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color_def() -> ResourceDefinition {
        ResourceDefinition::image(
            vk::Format::R8G8B8A8_UNORM,
            AttachmentRole::Color,
            Size::Absolute { width: 1024, height: 768 },
            vk::ImageUsageFlags::COLOR_ATTACHMENT,
        )
    }

    #[test]
    fn duplicate_resource_type_is_rejected() {
        let mut graph = RenderGraph::new();
        graph.add_resource_type("color", color_def()).unwrap();
        let err = graph.add_resource_type("color", color_def()).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateName(_)));
    }

    #[test]
    fn graphics_operation_requires_attachment_size() {
        let mut graph = RenderGraph::new();
        let err = graph
            .add_operation("gbuffer", OperationKind::Graphics, None, 0)
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidGraph(_)));
    }

    #[test]
    fn input_and_output_of_same_resource_on_same_op_is_rejected() {
        let mut graph = RenderGraph::new();
        graph.add_resource_type("color", color_def()).unwrap();
        graph
            .add_operation("op", OperationKind::Graphics, Some((1024, 768)), 0)
            .unwrap();
        graph
            .add_attachment_output(
                "op",
                "color",
                "color",
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                LoadOp::DontCare,
                ImageSubresourceRange::default(),
            )
            .unwrap();
        let err = graph
            .add_attachment_input(
                "op",
                "color",
                "color",
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                ImageSubresourceRange::default(),
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidGraph(_)));
    }

    #[test]
    fn second_producer_of_same_resource_is_rejected() {
        let mut graph = RenderGraph::new();
        graph.add_resource_type("color", color_def()).unwrap();
        graph
            .add_operation("a", OperationKind::Graphics, Some((1024, 768)), 0)
            .unwrap();
        graph
            .add_operation("b", OperationKind::Graphics, Some((1024, 768)), 0)
            .unwrap();
        graph
            .add_attachment_output(
                "a",
                "color",
                "color",
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                LoadOp::ClearColor([0.0, 0.0, 0.0, 1.0]),
                ImageSubresourceRange::default(),
            )
            .unwrap();
        let err = graph
            .add_attachment_output(
                "b",
                "color",
                "color",
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                LoadOp::ClearColor([0.0, 0.0, 0.0, 1.0]),
                ImageSubresourceRange::default(),
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidGraph(_)));
    }

    #[test]
    fn initial_and_final_operations_are_detected() {
        let mut graph = RenderGraph::new();
        graph.add_resource_type("color", color_def()).unwrap();
        graph
            .add_operation("cull", OperationKind::Compute, None, 0)
            .unwrap();
        graph
            .add_operation("draw", OperationKind::Graphics, Some((1024, 768)), 0)
            .unwrap();
        graph
            .add_buffer_output(
                "cull",
                "color",
                "indirect",
                vk::PipelineStageFlags::COMPUTE_SHADER,
                vk::AccessFlags::SHADER_WRITE,
                BufferSubresourceRange::default(),
            )
            .unwrap();
        graph
            .add_buffer_input(
                "draw",
                "color",
                "indirect",
                vk::PipelineStageFlags::DRAW_INDIRECT,
                vk::AccessFlags::INDIRECT_COMMAND_READ,
                BufferSubresourceRange::default(),
            )
            .unwrap();

        assert_eq!(graph.get_initial_operations(), vec!["cull"]);
        assert_eq!(graph.get_final_operations(), vec!["draw"]);
        assert_eq!(graph.get_previous_operations("draw"), vec!["cull"]);
        assert_eq!(graph.get_next_operations("cull"), vec!["draw"]);
    }
}
