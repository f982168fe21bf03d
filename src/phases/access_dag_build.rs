//! P3: per-subresource access tracking, transition insertion, and the
//! dependency edges that make the schedule respect resource hazards.

use crate::access::{AccessAttr, AccessInfo};
use crate::backend::RuntimeBackend;
use crate::error::RgResult;
use crate::format::RgFormat;
use crate::node::{NodeId, NodeKind};
use crate::render_graph::RenderGraph;
use crate::resource::ResourceId;
use crate::subresource::SubresourceRange;
use crate::transition::{AccessState, TransitionDecision, TransitionInfo, INVALID_TRANSITION};

pub fn run(rg: &mut RenderGraph, backend: &dyn RuntimeBackend) -> RgResult<()> {
    let num_resources = rg.resources.len();
    let mut states: Vec<Vec<AccessState>> = Vec::with_capacity(num_resources);
    for resource in rg.resources.as_slice() {
        states.push(vec![AccessState::new(
            resource.full_subresource_range,
            INVALID_TRANSITION,
        )]);
    }

    let num_cmds = rg.node_for_cmd.len();
    for cmd_index in 0..num_cmds {
        let node_id = rg.node_for_cmd[cmd_index];
        let accesses = rg.cmd_accesses[cmd_index].clone();

        // Writes first, reads second: `false < true` on `is_read_only()`
        // sorts writes ahead without disturbing relative order within a
        // sweep (`sort_by_key` is stable).
        let mut order: Vec<usize> = (0..accesses.len()).collect();
        order.sort_by_key(|&i| accesses[i].access.is_read_only());

        for idx in order {
            let acc = accesses[idx];
            let resource_id = acc.resource_id;
            let full_range = rg.resources[resource_id].full_subresource_range;

            if full_range.is_single_subresource() {
                let resource_states = &mut states[resource_id as usize];
                maybe_set_initial_access(rg, resource_id, &resource_states[0], acc.access.access_flags);
                process_single_state(
                    rg,
                    backend,
                    &mut states[resource_id as usize][0],
                    acc.access,
                    node_id,
                    full_range,
                    resource_id,
                    acc.view_format,
                )?;
            } else {
                process_multi_subresource(
                    rg,
                    backend,
                    resource_id,
                    &mut states,
                    acc.access,
                    node_id,
                    acc.range,
                    acc.view_format,
                )?;
            }
        }
    }

    for resource_id in 0..num_resources as ResourceId {
        if rg.resources[resource_id].is_temporal_parent {
            continue;
        }
        if rg.resources[resource_id].all_accesses.is_empty() {
            continue;
        }
        for state in &states[resource_id as usize] {
            rg.resources[resource_id]
                .final_accesses
                .push((state.range, state.last_transition));
        }
    }

    log::trace!("P3 AccessDAGBuilder: {} transitions", rg.transitions.len());
    Ok(())
}

fn maybe_set_initial_access(
    rg: &mut RenderGraph,
    resource_id: ResourceId,
    state: &AccessState,
    access_flags: AccessAttr,
) {
    let resource = &mut rg.resources[resource_id];
    if resource.initial_access == AccessAttr::UNKNOWN && state.accessor_nodes.is_empty() {
        resource.initial_access = access_flags;
    }
}

fn process_multi_subresource(
    rg: &mut RenderGraph,
    backend: &dyn RuntimeBackend,
    resource_id: ResourceId,
    states: &mut [Vec<AccessState>],
    new_access: AccessInfo,
    node: NodeId,
    curr_range: SubresourceRange,
    view_format: RgFormat,
) -> RgResult<()> {
    let prev_states = std::mem::take(&mut states[resource_id as usize]);
    let mut result_states: Vec<AccessState> = Vec::with_capacity(prev_states.len() + 2);

    for mut prev in prev_states {
        let (overlap, remainders) = curr_range.clip(&prev.range);
        let overlap_range = match overlap {
            None => {
                result_states.push(prev);
                continue;
            }
            Some(o) => o,
        };

        for remainder_range in &remainders {
            // A remainder carries forward whatever `prev` last held. If
            // `prev` was still pointing at the shared invalid-transition
            // sentinel (this subrange has never been touched), the
            // remainder must stay pointed at the sentinel too rather than
            // cloning its garbage fields into a real transition entry.
            let cloned_transition_id = if prev.last_transition != INVALID_TRANSITION {
                let cloned_transition = TransitionInfo {
                    range: *remainder_range,
                    ..rg.transitions[prev.last_transition]
                };
                rg.transitions.push(cloned_transition)
            } else {
                INVALID_TRANSITION
            };
            let sibling = AccessState {
                range: *remainder_range,
                accessor_nodes: prev.accessor_nodes.clone(),
                last_transition: cloned_transition_id,
            };
            result_states.push(sibling);
        }

        if prev.last_transition != INVALID_TRANSITION {
            let filtered_before = overlap_range.filter_access_by_range(
                rg.transitions[prev.last_transition].access.access_flags,
            );
            rg.transitions[prev.last_transition].access.access_flags = filtered_before;
        }

        let filtered_new_flags = overlap_range.filter_access_by_range(new_access.access_flags);
        let filtered_new = AccessInfo::new(filtered_new_flags, new_access.access_stages);

        prev.range = overlap_range;
        maybe_set_initial_access(rg, resource_id, &prev, filtered_new.access_flags);
        process_single_state(
            rg,
            backend,
            &mut prev,
            filtered_new,
            node,
            overlap_range,
            resource_id,
            view_format,
        )?;
        result_states.push(prev);
    }

    states[resource_id as usize] = result_states;
    Ok(())
}

/// `ProcessTransition`: decide whether `new_access` needs a fresh
/// transition node against `state`'s last recorded access, and wire up the
/// dependency edges either way.
///
/// Mirrors the original's `(accessState.lastTransition == INVALID_TRANSITION)
/// || NeedTransition(...)` guard: a state still pointing at the shared
/// invalid-transition sentinel has no real prior access to compare against,
/// so it unconditionally takes the new-transition branch instead of calling
/// `need_transition` against the sentinel's (garbage, resource-0) fields and
/// never mutates the sentinel entry every resource shares.
#[allow(clippy::too_many_arguments)]
fn process_single_state(
    rg: &mut RenderGraph,
    backend: &dyn RuntimeBackend,
    state: &mut AccessState,
    new_access: AccessInfo,
    curr_node: NodeId,
    range: SubresourceRange,
    resource_id: ResourceId,
    view_format: RgFormat,
) -> RgResult<()> {
    let same_node = state.accessor_nodes.last().copied() == Some(curr_node);
    let is_initial = state.last_transition == INVALID_TRANSITION;

    let decision = if is_initial {
        TransitionDecision {
            needs_transition: true,
            keep_ordering: true,
            merged_access: new_access.access_flags,
            is_merged: false,
        }
    } else {
        let before = rg.transitions[state.last_transition].access.access_flags;
        need_transition(backend, before, new_access.access_flags, same_node)
    };

    if decision.needs_transition {
        let transition_id = rg.transitions.push(TransitionInfo {
            resource_id,
            range,
            access: new_access,
            view_format,
            node_id: 0,
            prev_transition: state.last_transition,
        });
        let (subgraph, barrier_scope) = {
            let n = rg.graph.node(curr_node);
            (n.subgraph, n.barrier_scope)
        };
        let transition_node = rg
            .graph
            .add_node(NodeKind::Transition(transition_id), subgraph, barrier_scope);
        rg.transitions[transition_id].node_id = transition_node;

        for accessor in state.accessor_nodes.clone() {
            rg.graph.add_edge(accessor, transition_node);
        }
        rg.graph.add_edge(transition_node, curr_node);

        state.accessor_nodes.clear();
        state.last_transition = transition_id;
    } else {
        if decision.is_merged {
            let before_stages = rg.transitions[state.last_transition].access.access_stages;
            rg.transitions[state.last_transition].access =
                AccessInfo::new(decision.merged_access, before_stages | new_access.access_stages);
        }
        if decision.keep_ordering {
            if let Some(&last) = state.accessor_nodes.last() {
                if last != curr_node {
                    rg.graph.add_edge(last, curr_node);
                }
            }
        }
        let transition_node = rg.transitions[state.last_transition].node_id;
        rg.graph.add_edge(transition_node, curr_node);
    }

    state.push_accessor(curr_node);
    Ok(())
}

fn need_transition(
    backend: &dyn RuntimeBackend,
    before: AccessAttr,
    after: AccessAttr,
    same_node: bool,
) -> TransitionDecision {
    if let Some(rule) = backend.calculate_access_transition(before, after) {
        return rule;
    }

    let merged_union = before | after;

    if before.is_read_only() && after.is_read_only() {
        return TransitionDecision {
            needs_transition: false,
            keep_ordering: true,
            merged_access: merged_union,
            is_merged: merged_union != before,
        };
    }

    if same_node && after.difference(before).is_empty() {
        return TransitionDecision {
            needs_transition: false,
            keep_ordering: true,
            merged_access: before,
            is_merged: after != before,
        };
    }

    let relaxed = before.is_relaxed_order() && after.is_relaxed_order();
    TransitionDecision {
        needs_transition: true,
        keep_ordering: !relaxed,
        merged_access: after,
        is_merged: false,
    }
}
