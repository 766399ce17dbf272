//! Error taxonomy for graph assembly, compilation, and frame execution.

use thiserror::Error;

use crate::graph::resource::ResourceDefinition;

/// Failures that can occur while declaring, compiling, or driving a render graph.
///
/// Construction-time variants (`DuplicateName`, `MissingResource`, `TypeMismatch`,
/// `InvalidGraph`) surface synchronously at the call site that triggered them.
/// Runtime variants (`ResourceExhausted`, `DeviceLost`, `SurfaceLost`, `SwapchainOutdated`)
/// are produced while driving a surface and are handled at the surface boundary.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("'{0}' is already registered")]
    DuplicateName(String),

    #[error("no such {kind} named '{name}'")]
    MissingResource { kind: &'static str, name: String },

    #[error("resource '{resource}' was declared as {expected:?} but this transition uses {found:?}")]
    TypeMismatch {
        resource: String,
        expected: ResourceDefinition,
        found: ResourceDefinition,
    },

    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    #[error("graph contains a cycle reachable from operation '{0}'")]
    CyclicGraph(String),

    #[error("allocator could not satisfy a request for {requested} bytes")]
    ResourceExhausted { requested: u64 },

    #[error("device lost")]
    DeviceLost,

    #[error("surface lost")]
    SurfaceLost,

    #[error("swapchain is out of date and must be recreated")]
    SwapchainOutdated,
}

pub type Result<T> = std::result::Result<T, GraphError>;
