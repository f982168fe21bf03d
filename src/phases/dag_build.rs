//! P2: materialize command nodes, subgraphs and explicit-dependency edges.

use crate::cmd::{CommandDecl, FrameInput};
use crate::error::{RgError, RgResult};
use crate::node::{NodeId, NodeKind, SubgraphFlags, SubgraphId, SUBGRAPH_NONE};
use crate::render_graph::RenderGraph;

struct StackEntry {
    subgraph_id: SubgraphId,
    last_sibling: Option<NodeId>,
}

pub fn run(rg: &mut RenderGraph, input: &FrameInput) -> RgResult<()> {
    let mut stack: Vec<StackEntry> = Vec::new();
    let mut barrier_scope: u32 = 0;
    let mut cmd_index: u32 = 0;

    for decl in &input.commands {
        match decl {
            CommandDecl::SubgraphBegin { atomic, sequential } => {
                let parent = stack.last().map(|e| e.subgraph_id).unwrap_or(SUBGRAPH_NONE);
                let mut flags = SubgraphFlags::empty();
                if *atomic {
                    flags |= SubgraphFlags::ATOMIC;
                }
                if *sequential {
                    flags |= SubgraphFlags::SEQUENTIAL;
                }
                let sg_id = rg.graph.add_subgraph(parent, flags);
                let begin_node = rg.graph.add_marker_node(sg_id, barrier_scope);
                rg.graph.subgraph_mut(sg_id).begin_node = begin_node;
                link_sibling(rg, &mut stack, begin_node);
                stack.push(StackEntry {
                    subgraph_id: sg_id,
                    last_sibling: None,
                });
            }
            CommandDecl::SubgraphEnd => {
                let top = stack.pop().ok_or(RgError::UnbalancedSubgraphEnd)?;
                let end_node = rg.graph.add_marker_node(top.subgraph_id, barrier_scope);
                if rg.graph.subgraph(top.subgraph_id).is_sequential() {
                    if let Some(prev) = top.last_sibling {
                        rg.graph.add_edge(prev, end_node);
                    }
                }
                rg.graph.subgraph_mut(top.subgraph_id).end_node = end_node;
                link_sibling(rg, &mut stack, end_node);
            }
            CommandDecl::SchedulerBarrier => {
                barrier_scope += 1;
            }
            CommandDecl::Node {
                node_decl_index,
                valid_queues,
                preferred_queue,
                workload_type,
                prefers_async,
                force_keep,
                ..
            } => {
                let subgraph = stack.last().map(|e| e.subgraph_id).unwrap_or(SUBGRAPH_NONE);
                let node_id = rg
                    .graph
                    .add_node(NodeKind::Command(cmd_index), subgraph, barrier_scope);
                rg.node_for_cmd.push(node_id);
                rg.node_decl_indices.push(*node_decl_index);
                rg.cmd_queue_info.push(crate::cmd::CmdQueueInfo {
                    valid_queues: *valid_queues,
                    preferred_queue: *preferred_queue,
                    workload_type: *workload_type,
                    prefers_async: *prefers_async,
                    force_keep: *force_keep,
                });
                link_sibling(rg, &mut stack, node_id);
                cmd_index += 1;
            }
        }
    }

    for dep in &input.explicit_deps {
        let before = *rg
            .node_for_cmd
            .get(dep.before as usize)
            .ok_or(RgError::IndexOutOfBounds {
                what: "ExplicitDependency::before",
                index: dep.before,
                bound: rg.node_for_cmd.len() as u32,
            })?;
        let after = *rg
            .node_for_cmd
            .get(dep.after as usize)
            .ok_or(RgError::IndexOutOfBounds {
                what: "ExplicitDependency::after",
                index: dep.after,
                bound: rg.node_for_cmd.len() as u32,
            })?;
        rg.graph.add_edge(before, after);
    }

    log::trace!(
        "P2 DAGBuilder: {} nodes, {} subgraphs",
        rg.graph.node_count(),
        rg.graph.subgraph_count()
    );
    Ok(())
}

/// If the current top-of-stack subgraph is sequential, link `node` after its
/// last sibling and record it as the new last sibling.
fn link_sibling(rg: &mut RenderGraph, stack: &mut [StackEntry], node: NodeId) {
    if let Some(top) = stack.last_mut() {
        if rg.graph.subgraph(top.subgraph_id).is_sequential() {
            if let Some(prev) = top.last_sibling {
                rg.graph.add_edge(prev, node);
            }
        }
        top.last_sibling = Some(node);
    }
}
