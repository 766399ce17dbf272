//! Cost-weighted scheduling across device queues (component C, scheduling half).
//!
//! Operations are assigned a critical-path weight (b-level) and dispatched to
//! queues greedily, preferring to keep a dependency chain on the same queue to
//! avoid cross-queue synchronization, per the algorithm in spec §4.C.

use std::collections::HashMap;

use crate::error::{GraphError, Result};
use crate::graph::operation::OperationKind;
use crate::graph::{QueueAssignmentPolicy, RenderGraph};

/// Synchronization-overhead proxy for an edge between two operations.
const TRANSITION_BASE_COST: f64 = 1e-4;
const TRANSITION_MISMATCH_COST: f64 = 0.1;
/// Per-pixel weight used to make graphics operation cost proportional to
/// framebuffer size.
const GRAPHICS_PIXEL_COST: f64 = 1e-7;
const NON_GRAPHICS_OPERATION_COST: f64 = 1e-3;

fn operation_cost(graph: &RenderGraph, op: &str) -> f64 {
    let operation = graph.operation(op).expect("operation exists");
    match operation.kind {
        OperationKind::Graphics => {
            let (w, h) = operation.attachment_size.unwrap_or((1, 1));
            (w as f64) * (h as f64) * GRAPHICS_PIXEL_COST
        }
        OperationKind::Compute | OperationKind::Transfer => NON_GRAPHICS_OPERATION_COST,
    }
}

fn transition_cost(graph: &RenderGraph, from: &str, to: &str) -> f64 {
    let a = graph.operation(from).expect("operation exists");
    let b = graph.operation(to).expect("operation exists");
    let mut cost = TRANSITION_BASE_COST;
    if a.kind != b.kind {
        cost += TRANSITION_MISMATCH_COST;
    }
    if a.attachment_size != b.attachment_size {
        cost += TRANSITION_MISMATCH_COST;
    }
    cost
}

/// b-level of every operation: its own cost plus the maximum over outgoing edges
/// of (edge cost + downstream b-level). Computed over the operations in reverse
/// topological order so every successor's b-level is already known.
fn b_levels(graph: &RenderGraph, order: &[String]) -> HashMap<String, f64> {
    let mut levels: HashMap<String, f64> = HashMap::with_capacity(order.len());
    for op in order.iter().rev() {
        let own_cost = operation_cost(graph, op);
        let best_successor = graph
            .get_next_operations(op)
            .into_iter()
            .map(|next| transition_cost(graph, op, next) + levels[next])
            .fold(0.0_f64, f64::max);
        levels.insert(op.clone(), own_cost + best_successor);
    }
    levels
}

/// The result of scheduling: which queue each operation runs on, and the order in
/// which each queue's command sequence executes.
#[derive(Debug, Clone)]
pub struct Schedule {
    /// Operation name -> index into the graph's queue-traits list.
    pub queue_of: HashMap<String, usize>,
    /// Queue index -> operations in submission order on that queue.
    pub per_queue_sequence: Vec<Vec<String>>,
    /// All operations across all queues, in overall scheduling order.
    pub global_order: Vec<String>,
}

/// Schedules `order` (a topological order of `graph`'s operations) across the
/// graph's queue-traits list.
pub fn schedule(graph: &RenderGraph, order: &[String]) -> Result<Schedule> {
    let queues = graph.queue_traits();
    if queues.is_empty() {
        return Err(GraphError::InvalidGraph(
            "no queues declared; call RenderGraph::set_queue_traits before compiling".to_string(),
        ));
    }

    let levels = b_levels(graph, order);
    let declared_index: HashMap<&str, usize> =
        order.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();

    let mut queue_end_time = vec![0.0_f64; queues.len()];
    let mut op_end_time: HashMap<String, f64> = HashMap::with_capacity(order.len());
    let mut queue_of: HashMap<String, usize> = HashMap::with_capacity(order.len());
    let mut per_queue_sequence: Vec<Vec<String>> = vec![Vec::new(); queues.len()];
    let mut last_scheduled_on: Vec<Option<String>> = vec![None; queues.len()];

    let mut scheduled: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut ready: Vec<String> = graph
        .get_initial_operations()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut global_order: Vec<String> = Vec::with_capacity(order.len());

    while !ready.is_empty() {
        ready.sort_by(|a, b| {
            levels[b]
                .partial_cmp(&levels[a])
                .unwrap()
                .then_with(|| a.cmp(b))
                .then_with(|| declared_index[a.as_str()].cmp(&declared_index[b.as_str()]))
        });
        let op = ready.remove(0);
        if scheduled.contains(&op) {
            continue;
        }

        let operation = graph.operation(&op).expect("operation exists");
        let candidates: Vec<usize> = queues
            .iter()
            .enumerate()
            .filter(|(idx, q)| {
                q.supports(operation.kind)
                    && (q.policy == QueueAssignmentPolicy::Shared || last_scheduled_on[*idx].is_none())
            })
            .map(|(idx, _)| idx)
            .collect();
        let candidates: Vec<usize> = if candidates.iter().any(|&i| queues[i].policy == QueueAssignmentPolicy::Shared) {
            candidates
                .into_iter()
                .filter(|&i| queues[i].policy == QueueAssignmentPolicy::Shared)
                .collect()
        } else {
            candidates
        };
        if candidates.is_empty() {
            return Err(GraphError::InvalidGraph(format!(
                "no queue is capable of running operation '{op}' ({:?})",
                operation.kind
            )));
        }

        let predecessors: Vec<String> = graph
            .get_previous_operations(&op)
            .into_iter()
            .map(str::to_string)
            .collect();

        // Prefer a queue whose last scheduled operation is a direct predecessor of
        // this one; among those, the one whose predecessor finished latest.
        let preferred = candidates
            .iter()
            .copied()
            .filter(|&idx| {
                last_scheduled_on[idx]
                    .as_ref()
                    .map(|last| predecessors.contains(last))
                    .unwrap_or(false)
            })
            .max_by(|&a, &b| queue_end_time[a].partial_cmp(&queue_end_time[b]).unwrap());

        let chosen = preferred.unwrap_or_else(|| {
            candidates
                .iter()
                .copied()
                .find(|&idx| last_scheduled_on[idx].is_none())
                .unwrap_or_else(|| {
                    candidates
                        .iter()
                        .copied()
                        .min_by(|&a, &b| queue_end_time[a].partial_cmp(&queue_end_time[b]).unwrap())
                        .expect("candidates non-empty")
                })
        });

        let predecessor_end = predecessors
            .iter()
            .map(|p| op_end_time[p])
            .fold(0.0_f64, f64::max);
        let start = predecessor_end.max(queue_end_time[chosen]);
        let end = start + operation_cost(graph, &op);

        queue_end_time[chosen] = end;
        op_end_time.insert(op.clone(), end);
        queue_of.insert(op.clone(), chosen);
        per_queue_sequence[chosen].push(op.clone());
        last_scheduled_on[chosen] = Some(op.clone());
        scheduled.insert(op.clone());
        global_order.push(op.clone());

        for next in graph.get_next_operations(&op) {
            if scheduled.contains(next) || ready.contains(&next.to_string()) {
                continue;
            }
            let preds_done = graph
                .get_previous_operations(next)
                .into_iter()
                .all(|p| scheduled.contains(p));
            if preds_done {
                ready.push(next.to_string());
            }
        }
    }

    if global_order.len() != order.len() {
        return Err(GraphError::InvalidGraph(
            "scheduler failed to place every operation; graph may be malformed".to_string(),
        ));
    }

    Ok(Schedule { queue_of, per_queue_sequence, global_order })
}

#[cfg(test)]
mod tests {
    use vulkanalia::vk;

    use super::*;
    use crate::graph::{BufferSubresourceRange, QueueTraits};

    fn buffer_def() -> crate::graph::ResourceDefinition {
        crate::graph::ResourceDefinition::buffer(
            vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::INDIRECT_BUFFER,
        )
    }

    #[test]
    fn s1_schedules_on_single_shared_queue() {
        let mut graph = RenderGraph::new();
        graph.add_resource_type("buf", buffer_def()).unwrap();
        graph.add_operation("cull", OperationKind::Compute, None, 0).unwrap();
        graph
            .add_operation("draw", OperationKind::Graphics, Some((800, 600)), 0)
            .unwrap();
        graph
            .add_buffer_output(
                "cull",
                "buf",
                "indirect",
                vk::PipelineStageFlags::COMPUTE_SHADER,
                vk::AccessFlags::SHADER_WRITE,
                BufferSubresourceRange::default(),
            )
            .unwrap();
        graph
            .add_buffer_input(
                "draw",
                "buf",
                "indirect",
                vk::PipelineStageFlags::DRAW_INDIRECT,
                vk::AccessFlags::INDIRECT_COMMAND_READ,
                BufferSubresourceRange::default(),
            )
            .unwrap();
        graph.set_queue_traits(vec![QueueTraits {
            name: "universal".to_string(),
            capabilities: vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE,
            queue_family_index: 0,
            policy: QueueAssignmentPolicy::Shared,
        }]);

        let order = crate::graph::order::topological_order(&graph).unwrap();
        let result = schedule(&graph, &order).unwrap();
        assert_eq!(result.per_queue_sequence.len(), 1);
        assert_eq!(result.per_queue_sequence[0], vec!["cull", "draw"]);
    }

    #[test]
    fn missing_capable_queue_is_an_error() {
        let mut graph = RenderGraph::new();
        graph
            .add_operation("cull", OperationKind::Compute, None, 0)
            .unwrap();
        graph.set_queue_traits(vec![QueueTraits {
            name: "graphics_only".to_string(),
            capabilities: vk::QueueFlags::GRAPHICS,
            queue_family_index: 0,
            policy: QueueAssignmentPolicy::Shared,
        }]);
        let order = crate::graph::order::topological_order(&graph).unwrap();
        let err = schedule(&graph, &order).unwrap_err();
        assert!(matches!(err, GraphError::InvalidGraph(_)));
    }
}
