//! Graph edges: [`ResourceTransition`] and the [`ResourceIdentity`] they carry.

/// The stable identity of the memory a transition refers to.
///
/// Per §3: the externally-bound name if present, else the resource type plus
/// transition id. Two transitions with the same identity, where the identity is
/// `External`, refer to the same concrete [`crate::graph::resource::MemoryObject`];
/// `Local` identities are per-transition and only ever unify through alias analysis
/// (component D), never through equality of this key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResourceIdentity {
    External(String),
    Local(String, u32),
}

/// A single (operation, entry) input or output: the edge of the render graph.
#[derive(Clone, Debug)]
pub struct ResourceTransition {
    pub id: u32,
    pub operation: String,
    pub entry: String,
    pub resource_type: String,
    pub external_binding: Option<String>,
}

impl ResourceTransition {
    pub fn identity(&self) -> ResourceIdentity {
        match &self.external_binding {
            Some(name) => ResourceIdentity::External(name.clone()),
            None => ResourceIdentity::Local(self.resource_type.clone(), self.id),
        }
    }
}

/// Builds one [`ResourceTransition`] per declared entry, in the same order as
/// [`crate::graph::RenderGraph::entries`] so a transition's `id` always indexes
/// back into that slice.
pub fn build_transitions(graph: &crate::graph::RenderGraph) -> Vec<ResourceTransition> {
    graph
        .entries()
        .iter()
        .enumerate()
        .map(|(id, entry)| ResourceTransition {
            id: id as u32,
            operation: entry.operation.clone(),
            entry: entry.name.clone(),
            resource_type: entry.resource_type.clone(),
            external_binding: graph.external_bindings().get(&entry.name).map(|_| entry.name.clone()),
        })
        .collect()
}
