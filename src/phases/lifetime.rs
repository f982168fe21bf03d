//! P5: per-resource lifetime computed over the scheduled runtime stream.

use fxhash::FxHashMap;

use crate::error::RgResult;
use crate::node::{NodeId, NodeKind};
use crate::render_graph::RenderGraph;
use crate::resource::{ResourceId, LIFETIME_UNDEFINED};

pub fn run(rg: &mut RenderGraph) -> RgResult<()> {
    let mut node_to_cmd: FxHashMap<NodeId, usize> = FxHashMap::default();
    for (cmd_index, &node_id) in rg.node_for_cmd.iter().enumerate() {
        node_to_cmd.insert(node_id, cmd_index);
    }

    // Runtime-command indices are 1-based: index 0 is the PREAMBLE sentinel
    // that precedes every scheduled node in `rg.runtime_cmds`.
    for (idx, &node_id) in rg.scheduled_nodes.iter().enumerate() {
        let runtime_idx = idx as u32 + 1;
        match rg.graph.node(node_id).kind {
            NodeKind::Command(_) => {
                if let Some(&cmd_index) = node_to_cmd.get(&node_id) {
                    let resource_ids: Vec<ResourceId> = rg.cmd_accesses[cmd_index]
                        .iter()
                        .map(|a| a.resource_id)
                        .collect();
                    for resource_id in resource_ids {
                        touch(rg, resource_id, runtime_idx);
                    }
                }
            }
            NodeKind::Transition(t) => {
                let resource_id = rg.transitions[t].resource_id;
                touch(rg, resource_id, runtime_idx);
            }
        }
    }

    log::trace!(
        "P5 LifetimeAnalysis: {} resources scheduled",
        rg.resources.as_slice().iter().filter(|r| r.is_scheduled()).count()
    );
    Ok(())
}

fn touch(rg: &mut RenderGraph, resource_id: ResourceId, runtime_idx: u32) {
    let r = &mut rg.resources[resource_id];
    if r.lifetime_begin == LIFETIME_UNDEFINED || runtime_idx < r.lifetime_begin {
        r.lifetime_begin = runtime_idx;
    }
    if r.lifetime_end == LIFETIME_UNDEFINED || runtime_idx > r.lifetime_end {
        r.lifetime_end = runtime_idx;
    }
}
