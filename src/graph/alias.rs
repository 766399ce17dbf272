//! Image-alias analysis (component D).
//!
//! Finds pairs of image-producing transitions that may share the same physical
//! image because the earlier one's readers all finish before the later one is
//! written, then greedily collapses the longest reuse chains into a single
//! canonical transition per spec §4.D.

use std::collections::HashMap;

use vulkanalia::vk;

use crate::graph::transition::ResourceTransition;
use crate::graph::RenderGraph;

#[derive(Debug, Clone, Default)]
pub struct AliasInfo {
    /// transition id -> canonical transition id. Transitions that were never
    /// merged map to themselves.
    pub canonical_of: HashMap<u32, u32>,
    /// canonical transition id -> union of every aliased user's image usage flags.
    pub accumulated_usage: HashMap<u32, vk::ImageUsageFlags>,
    /// canonical transition id -> the earliest aliased user's initial layout.
    pub initial_layout: HashMap<u32, vk::ImageLayout>,
}

/// Builds the forward-reachability relation over operations (via entry-name
/// producer/consumer edges) so alias candidates can check ancestry.
fn reachable_from(graph: &RenderGraph, start: &str) -> std::collections::HashSet<String> {
    let mut visited = std::collections::HashSet::new();
    let mut stack = vec![start.to_string()];
    while let Some(op) = stack.pop() {
        for next in graph.get_next_operations(&op) {
            if visited.insert(next.to_string()) {
                stack.push(next.to_string());
            }
        }
    }
    visited
}

fn is_eligible(graph: &RenderGraph, graph_transition: &ResourceTransition, entries_by_id: &HashMap<u32, &crate::graph::Entry>) -> bool {
    let entry = entries_by_id[&graph_transition.id];
    if !entry.kind.is_output() || !entry.kind.is_image() {
        return false;
    }
    if graph_transition.external_binding.is_some() {
        return false;
    }
    let def = match graph.resource_definition(&graph_transition.resource_type) {
        Some(def) => def,
        None => return false,
    };
    if def.is_swapchain() {
        return false;
    }
    true
}

/// Runs the alias analysis over every image-output transition in `transitions`,
/// given `order` (a topological order of the owning graph's operations).
pub fn analyze(graph: &RenderGraph, transitions: &[ResourceTransition], order: &[String]) -> AliasInfo {
    let entries_by_id: HashMap<u32, &crate::graph::Entry> = transitions
        .iter()
        .map(|t| (t.id, &graph.entries()[t.id as usize]))
        .collect();

    let op_index: HashMap<&str, usize> = order.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();

    let candidates: Vec<&ResourceTransition> = transitions
        .iter()
        .filter(|t| is_eligible(graph, t, &entries_by_id))
        .collect();

    // Precompute forward reachability per operation once.
    let mut reach_cache: HashMap<&str, std::collections::HashSet<String>> = HashMap::new();
    for t in &candidates {
        reach_cache
            .entry(t.operation.as_str())
            .or_insert_with(|| reachable_from(graph, &t.operation));
    }

    // Candidate edges: earlier -> later ("earlier may be reused as later").
    let mut edges: Vec<(usize, usize)> = Vec::new();
    for (i, earlier) in candidates.iter().enumerate() {
        let earlier_def = graph.resource_definition(&earlier.resource_type).unwrap();
        let earlier_entry = entries_by_id[&earlier.id];
        let consumers: Vec<String> = graph
            .get_transition_io(&earlier_entry.name, crate::graph::EntryKindMask::ALL_INPUTS)
            .into_iter()
            .map(|e| e.operation.clone())
            .collect();

        for (j, later) in candidates.iter().enumerate() {
            if i == j {
                continue;
            }
            if earlier_def != graph.resource_definition(&later.resource_type).unwrap() {
                continue;
            }
            if op_index[earlier.operation.as_str()] >= op_index[later.operation.as_str()] {
                continue;
            }
            let all_ancestors = consumers.iter().all(|c| {
                c == &later.operation || reach_cache[c.as_str()].contains(&later.operation)
            });
            if all_ancestors {
                edges.push((i, j));
            }
        }
    }

    // Greedily extract the longest chain, collapse its tail onto its head, and
    // repeat until no candidate edges remain.
    let n = candidates.len();
    let mut canonical_index: Vec<usize> = (0..n).collect();
    let mut removed = vec![false; n];

    loop {
        let mut remaining_edges: Vec<(usize, usize)> = edges
            .iter()
            .copied()
            .filter(|&(a, b)| !removed[a] && !removed[b])
            .collect();
        if remaining_edges.is_empty() {
            break;
        }
        remaining_edges.sort_by_key(|&(a, _)| op_index[candidates[a].operation.as_str()]);

        let mut dp = vec![1usize; n];
        let mut pred: Vec<Option<usize>> = vec![None; n];
        for &(a, b) in &remaining_edges {
            if dp[a] + 1 > dp[b] {
                dp[b] = dp[a] + 1;
                pred[b] = Some(a);
            }
        }

        let (mut tail, _) = (0..n)
            .filter(|&v| !removed[v])
            .map(|v| (v, dp[v]))
            .max_by_key(|&(_, len)| len)
            .unwrap();
        let mut chain = vec![tail];
        while let Some(p) = pred[tail] {
            chain.push(p);
            tail = p;
        }
        chain.reverse();
        if chain.len() < 2 {
            break;
        }

        let head = chain[0];
        for &member in &chain[1..] {
            canonical_index[member] = head;
            removed[member] = true;
        }
    }

    let mut info = AliasInfo::default();
    for (idx, t) in candidates.iter().enumerate() {
        let canonical_idx = canonical_index[idx];
        let canonical_id = candidates[canonical_idx].id;
        info.canonical_of.insert(t.id, canonical_id);
    }
    // Transitions that weren't candidates at all alias to themselves.
    for t in transitions {
        info.canonical_of.entry(t.id).or_insert(t.id);
    }

    // Accumulate usage and initial layout per canonical class.
    let mut members_of: HashMap<u32, Vec<u32>> = HashMap::new();
    for t in transitions {
        members_of.entry(info.canonical_of[&t.id]).or_default().push(t.id);
    }
    for (&canonical_id, members) in &members_of {
        let mut usage = vk::ImageUsageFlags::empty();
        for &member_id in members {
            if let Some(t) = transitions.iter().find(|t| t.id == member_id) {
                if let Some(def) = graph.resource_definition(&t.resource_type) {
                    usage |= def.image_usage;
                }
            }
        }
        info.accumulated_usage.insert(canonical_id, usage);

        let earliest_member = members
            .iter()
            .copied()
            .min_by_key(|&id| op_index[entries_by_id.get(&id).map(|e| e.operation.as_str()).unwrap_or("")])
            .unwrap_or(canonical_id);
        let layout = entries_by_id.get(&earliest_member).map(|e| e.layout).unwrap_or(vk::ImageLayout::UNDEFINED);
        info.initial_layout.insert(canonical_id, layout);
    }

    info
}

#[cfg(test)]
mod tests {
    use vulkanalia::vk;

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

    /// S3 from spec.md: A -> B -> C, each producing a color attachment of
    /// identical definition, none consumed outside its immediate successor.
    #[test]
    fn s3_three_operations_alias_into_one_image() {
        let mut graph = RenderGraph::new();
        graph.add_resource_type("color", color_def()).unwrap();
        for name in ["a", "b", "c"] {
            graph
                .add_operation(name, OperationKind::Graphics, Some((640, 480)), 0)
                .unwrap();
        }
        graph
            .add_attachment_output(
                "a",
                "color",
                "a_out",
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                LoadOp::ClearColor([0.0; 4]),
                ImageSubresourceRange::default(),
            )
            .unwrap();
        graph
            .add_attachment_input(
                "b",
                "color",
                "a_out",
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                ImageSubresourceRange::default(),
            )
            .unwrap();
        graph
            .add_attachment_output(
                "b",
                "color",
                "b_out",
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                LoadOp::ClearColor([0.0; 4]),
                ImageSubresourceRange::default(),
            )
            .unwrap();
        graph
            .add_attachment_input(
                "c",
                "color",
                "b_out",
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                ImageSubresourceRange::default(),
            )
            .unwrap();
        graph
            .add_attachment_output(
                "c",
                "color",
                "c_out",
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                LoadOp::ClearColor([0.0; 4]),
                ImageSubresourceRange::default(),
            )
            .unwrap();

        let order = crate::graph::order::topological_order(&graph).unwrap();
        let transitions = build_transitions(&graph);
        let info = analyze(&graph, &transitions, &order);

        let a_out = transitions.iter().find(|t| graph.entries()[t.id as usize].name == "a_out").unwrap();
        let b_out = transitions.iter().find(|t| graph.entries()[t.id as usize].name == "b_out").unwrap();
        let c_out = transitions.iter().find(|t| graph.entries()[t.id as usize].name == "c_out").unwrap();

        let canon_a = info.canonical_of[&a_out.id];
        let canon_b = info.canonical_of[&b_out.id];
        let canon_c = info.canonical_of[&c_out.id];
        assert_eq!(canon_a, canon_b);
        assert_eq!(canon_b, canon_c);
        assert_eq!(canon_a, a_out.id, "head of the chain should be the earliest transition");
    }
}
