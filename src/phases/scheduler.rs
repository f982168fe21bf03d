//! P4: multi-criterion priority scheduling, queue assignment and batch
//! formation.

use fxhash::FxHashMap;

use crate::cmd::{QueueMask, UpdateFlags, WorkloadTypeMask};
use crate::error::{RgError, RgResult};
use crate::node::{NodeId, SubgraphId, SUBGRAPH_NONE};
use crate::render_graph::RenderGraph;
use crate::runtime::{CommandBatch, RuntimeCmdInfo, CMD_ID_POSTAMBLE, CMD_ID_PREAMBLE};
use crate::schedule_flags::ScheduleFlags;

const QUEUE_GRAPHICS: u32 = 0;
const QUEUE_COMPUTE: u32 = 1;
const QUEUE_COPY: u32 = 2;

fn queue_index_of(mask: QueueMask) -> u32 {
    if mask.contains(QueueMask::GRAPHICS) {
        QUEUE_GRAPHICS
    } else if mask.contains(QueueMask::COMPUTE) {
        QUEUE_COMPUTE
    } else if mask.contains(QueueMask::COPY) {
        QUEUE_COPY
    } else {
        QUEUE_GRAPHICS
    }
}

fn queue_mask_of(queue_index: u32) -> QueueMask {
    match queue_index {
        QUEUE_COMPUTE => QueueMask::COMPUTE,
        QUEUE_COPY => QueueMask::COPY,
        _ => QueueMask::GRAPHICS,
    }
}

fn first_queue_in_mask(mask: QueueMask) -> Option<u32> {
    if mask.contains(QueueMask::GRAPHICS) {
        Some(QUEUE_GRAPHICS)
    } else if mask.contains(QueueMask::COMPUTE) {
        Some(QUEUE_COMPUTE)
    } else if mask.contains(QueueMask::COPY) {
        Some(QUEUE_COPY)
    } else {
        None
    }
}

struct NodeSchedInfo {
    out_edge_count: u32,
    satisfied_out: u32,
    can_be_eliminated: bool,
    preferred_queue: u32,
    /// Queues this node is actually allowed to run on. A node whose
    /// `preferred_queue` falls outside this mask can still be scheduled
    /// there, but committing it to that queue is a hard error
    /// (`RgError::QueueNotSupported`), not a mere scoring penalty.
    valid_queues: QueueMask,
    /// Whether `preferred_queue` should be honored for queue-switch
    /// purposes at all; a node that doesn't prefer async work is treated as
    /// graphics-preferring for switching even if its front end declared a
    /// non-graphics `preferred_queue` for informational/scoring purposes.
    prefers_async: bool,
    workload_type: WorkloadTypeMask,
    /// Program-order tiebreaker: the node id unless `RANDOM_ORDER` is set, in
    /// which case a value drawn once from the caller-supplied RNG up front
    /// (scoring itself only ever reads `infos`, so the `FnMut` is not needed
    /// again once this table is built).
    order_key: u32,
}

pub fn run(rg: &mut RenderGraph, flags: &mut UpdateFlags) -> RgResult<()> {
    let node_count = rg.graph.node_count();
    let mut node_to_cmd_index: FxHashMap<NodeId, usize> = FxHashMap::default();
    for (cmd_index, &node_id) in rg.node_for_cmd.iter().enumerate() {
        node_to_cmd_index.insert(node_id, cmd_index);
    }

    if flags.schedule_flags.contains(ScheduleFlags::KEEP_PROGRAM_ORDER) {
        for window in rg.node_for_cmd.windows(2) {
            rg.graph.add_edge(window[0], window[1]);
        }
    }

    apply_atomic_subgraph_fixups(rg);

    let dce_enabled = !flags
        .schedule_flags
        .contains(ScheduleFlags::DISABLE_DEAD_CODE_ELIMINATION);

    let random_order = flags.schedule_flags.contains(ScheduleFlags::RANDOM_ORDER);

    let mut infos: Vec<NodeSchedInfo> = Vec::with_capacity(node_count);
    for node_id in 0..node_count as NodeId {
        let order_key = if random_order {
            match flags.rng.as_mut() {
                Some(rng) => rng(),
                None => node_id,
            }
        } else {
            node_id
        };
        let out_edge_count = rg.graph.out_edges(node_id).len() as u32;
        let node = rg.graph.node(node_id);
        let is_marker = node.can_be_eliminated;
        let (preferred_queue, valid_queues, prefers_async, workload_type, force_keep) =
            match node_to_cmd_index.get(&node_id) {
                Some(&cmd_index) => {
                    let q = &rg.cmd_queue_info[cmd_index];
                    (
                        queue_index_of(q.preferred_queue),
                        q.valid_queues,
                        q.prefers_async,
                        q.workload_type,
                        q.force_keep,
                    )
                }
                None => (
                    QUEUE_GRAPHICS,
                    QueueMask::GRAPHICS,
                    false,
                    WorkloadTypeMask::empty(),
                    false,
                ),
            };
        let writes_persistent_or_external = node_to_cmd_index
            .get(&node_id)
            .map(|&cmd_index| {
                rg.cmd_accesses[cmd_index].iter().any(|acc| {
                    !acc.access.is_read_only()
                        && (rg.resources[acc.resource_id].is_persistent()
                            || rg.resources[acc.resource_id].is_external)
                })
            })
            .unwrap_or(false);

        let can_be_eliminated = is_marker
            || (dce_enabled
                && out_edge_count == 0
                && !writes_persistent_or_external
                && !force_keep
                && node_to_cmd_index.contains_key(&node_id));

        infos.push(NodeSchedInfo {
            out_edge_count,
            satisfied_out: 0,
            can_be_eliminated,
            preferred_queue,
            valid_queues,
            prefers_async,
            workload_type,
            order_key,
        });
    }

    let mut ready: Vec<NodeId> = (0..node_count as NodeId)
        .filter(|&n| infos[n as usize].out_edge_count == 0)
        .collect();
    // Tail-first scheduling walks edges backward: a ready node's "dep" is the
    // already-scheduled downstream node whose last unsatisfied in-edge it
    // was. Mirrors the original's `ReadyNodeInfo::depNodeId`.
    let mut node_dep: FxHashMap<NodeId, NodeId> = FxHashMap::default();

    let mut scheduled_tail_first: Vec<NodeId> = Vec::with_capacity(node_count);
    let mut eliminated = vec![false; node_count];
    let mut curr_queue: u32 = QUEUE_GRAPHICS;
    let mut last_was_transition = false;
    let mut last_workload = WorkloadTypeMask::empty();
    let mut last_scope: Option<(SubgraphId, u32)> = None;
    let mut last_cmd_node_id: Option<NodeId> = None;
    let mut node_queue: FxHashMap<NodeId, u32> = FxHashMap::default();

    let mut total_processed = 0u32;
    while !ready.is_empty() {
        let curr_queue_mask = queue_mask_of(curr_queue);
        let pick_idx = pick_best(
            rg,
            &infos,
            &ready,
            curr_queue_mask,
            last_was_transition,
            last_workload,
            last_scope,
            &node_dep,
            last_cmd_node_id,
            &*flags,
        );
        let picked = ready.swap_remove(pick_idx);

        let info = &infos[picked as usize];
        if info.can_be_eliminated {
            eliminated[picked as usize] = true;
        } else {
            let node = rg.graph.node(picked);
            last_was_transition = node.kind.is_transition();
            if !last_was_transition {
                last_workload = info.workload_type;
                curr_queue = next_queue(info, curr_queue, curr_queue_mask, node_dep.get(&picked).copied(), last_cmd_node_id, picked)?;
                last_cmd_node_id = Some(picked);
            }
            last_scope = Some((node.subgraph, node.barrier_scope));
            node_queue.insert(picked, curr_queue);
            scheduled_tail_first.push(picked);
        }
        total_processed += 1;

        for &edge_id in rg.graph.in_edges(picked) {
            let src = rg.graph.edge(edge_id).src;
            infos[src as usize].satisfied_out += 1;
            node_dep.insert(src, picked);
            if infos[src as usize].satisfied_out == infos[src as usize].out_edge_count {
                ready.push(src);
            }
        }
    }

    debug_assert_eq!(total_processed as usize, node_count);

    let mut scheduled_forward: Vec<NodeId> = scheduled_tail_first;
    scheduled_forward.reverse();

    rg.schedule_index = vec![None; node_count];
    for (idx, &node_id) in scheduled_forward.iter().enumerate() {
        rg.schedule_index[node_id as usize] = Some(idx as u32);
    }
    // `rg.eliminated` reports elimination of user command nodes only;
    // built-in subgraph markers are always dropped from the schedule and are
    // not a form of dead-code elimination the caller can disable.
    rg.eliminated = rg
        .node_for_cmd
        .iter()
        .map(|&node_id| eliminated[node_id as usize])
        .collect();
    rg.scheduled_nodes = scheduled_forward.clone();

    form_batches(rg, &scheduled_forward, &node_queue);

    log::debug!(
        "P4 DAGScheduler: {} scheduled, {} eliminated",
        rg.scheduled_nodes.len(),
        rg.eliminated.iter().filter(|&&e| e).count()
    );
    Ok(())
}

/// Decide whether the just-picked command node forces, prefers, or forgoes a
/// queue switch, mirroring `bRequireQueueSwitch`/`bPreferQueueSwitch`/
/// `bImmediateDependent`/`bSwitchQueue`: a switch is forced when the current
/// queue isn't even in the node's `valid_queues`, merely preferred when the
/// node's (async-gated) preferred queue doesn't match the current one, and a
/// preferred-only switch is skipped when the node is the immediate
/// downstream dependent of the last scheduled command (avoids thrashing
/// queues between two back-to-back dependent nodes).
fn next_queue(
    info: &NodeSchedInfo,
    curr_queue: u32,
    curr_queue_mask: QueueMask,
    dep_node: Option<NodeId>,
    last_cmd_node_id: Option<NodeId>,
    picked: NodeId,
) -> RgResult<u32> {
    let effective_preferred_mask = if info.prefers_async {
        queue_mask_of(info.preferred_queue)
    } else {
        QueueMask::GRAPHICS
    };

    let require_switch = !info.valid_queues.intersects(curr_queue_mask);
    let prefer_switch = !effective_preferred_mask.intersects(curr_queue_mask);
    let immediate_dependent = dep_node.is_some() && dep_node == last_cmd_node_id;

    if !(require_switch || (prefer_switch && !immediate_dependent)) {
        return Ok(curr_queue);
    }

    let target = first_queue_in_mask(effective_preferred_mask)
        .or_else(|| first_queue_in_mask(info.valid_queues))
        .unwrap_or(info.preferred_queue);

    if !info.valid_queues.contains(queue_mask_of(target)) {
        return Err(RgError::QueueNotSupported { node_id: picked });
    }

    Ok(target)
}

fn apply_atomic_subgraph_fixups(rg: &mut RenderGraph) {
    let subgraph_count = rg.graph.subgraph_count();
    for sg_id in 0..subgraph_count as SubgraphId {
        let sg = *rg.graph.subgraph(sg_id);
        if !sg.is_atomic() {
            continue;
        }
        if sg.parent_subgraph != SUBGRAPH_NONE {
            let parent = *rg.graph.subgraph(sg.parent_subgraph);
            if parent.is_atomic() {
                rg.graph.add_edge(parent.begin_node, sg.begin_node);
                rg.graph.add_edge(sg.begin_node, parent.end_node);
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn pick_best(
    rg: &RenderGraph,
    infos: &[NodeSchedInfo],
    ready: &[NodeId],
    curr_queue_mask: QueueMask,
    last_was_transition: bool,
    last_workload: WorkloadTypeMask,
    last_scope: Option<(SubgraphId, u32)>,
    node_dep: &FxHashMap<NodeId, NodeId>,
    last_cmd_node_id: Option<NodeId>,
    flags: &UpdateFlags,
) -> usize {
    if let Some(idx) = ready.iter().position(|&n| infos[n as usize].can_be_eliminated) {
        return idx;
    }

    let mut best_idx = 0;
    let mut best_score: u64 = 0;
    for (idx, &node_id) in ready.iter().enumerate() {
        let immediate_dependent = node_dep.get(&node_id).copied().is_some() && node_dep.get(&node_id).copied() == last_cmd_node_id;
        let score = score_candidate(
            rg,
            &infos[node_id as usize],
            node_id,
            curr_queue_mask,
            last_was_transition,
            last_workload,
            last_scope,
            immediate_dependent,
            flags,
        );
        if idx == 0 || score > best_score {
            best_score = score;
            best_idx = idx;
        }
    }
    best_idx
}

#[allow(clippy::too_many_arguments)]
fn score_candidate(
    rg: &RenderGraph,
    info: &NodeSchedInfo,
    node_id: NodeId,
    curr_queue_mask: QueueMask,
    last_was_transition: bool,
    last_workload: WorkloadTypeMask,
    last_scope: Option<(SubgraphId, u32)>,
    immediate_dependent: bool,
    flags: &UpdateFlags,
) -> u64 {
    let node = rg.graph.node(node_id);

    let scope_bit = match last_scope {
        Some((scope, barrier)) => (node.subgraph == scope && node.barrier_scope == barrier) as u64,
        None => 1,
    };

    // Three-tier queue score: full when the node's (async-gated) preferred
    // queue matches the current one; halved when it doesn't but the current
    // queue is still in `valid_queues` (a switch is merely preferred); zero
    // when the current queue isn't even valid for this node and it's the
    // immediate dependent of the last scheduled command (raises the penalty
    // so an independent, switch-free candidate is preferred instead).
    let queue_bit: u64 = if node.kind.is_transition() {
        1
    } else {
        let effective_preferred_mask = if info.prefers_async {
            queue_mask_of(info.preferred_queue)
        } else {
            QueueMask::GRAPHICS
        };
        if effective_preferred_mask.intersects(curr_queue_mask) {
            2
        } else if !info.valid_queues.intersects(curr_queue_mask) && immediate_dependent {
            0
        } else {
            1
        }
    };

    let transition_match_bit = (node.kind.is_transition() == last_was_transition) as u64;

    let prefer_memory = flags.schedule_flags.contains(ScheduleFlags::PREFER_MEMORY_SAVING);

    let workload_group_bit = (info.workload_type == last_workload) as u64;

    // Tiebreaker: program order, unless `RANDOM_ORDER` swapped in a drawn
    // key for every node up front (see `run`'s `order_key` computation).
    let program_order = info.order_key as u64;

    let (batching_shift, memory_shift) = if prefer_memory { (16, 29) } else { (29, 16) };

    // The memory-saving term (clamp(maxNodeMemorySize - newAllocBytes) +
    // clamp(freedBytes), both >>16) is deliberately left at 0: P4 runs before
    // P6 has computed any backend memory requirement or placement, so there
    // is no freed/allocated byte count available yet to clamp. PREFER_MEMORY_SAVING
    // still takes effect by moving the batching term to the lower-priority
    // shift below it, which is the scheduler's only real lever until a node's
    // bytes are known.
    (scope_bit << 31)
        | (queue_bit << 29)
        | (transition_match_bit << batching_shift.min(28))
        | (0u64 << memory_shift.min(27))
        | (workload_group_bit << 15)
        | (program_order & 0x7FFF)
}

fn form_batches(rg: &mut RenderGraph, scheduled: &[NodeId], node_queue: &FxHashMap<NodeId, u32>) {
    rg.runtime_cmds.reset_keep_capacity();
    rg.cmd_batches.clear();

    let preamble_queue = scheduled
        .first()
        .and_then(|n| node_queue.get(n).copied())
        .unwrap_or(QUEUE_GRAPHICS);

    let mut batch_start_cmd: u32 = 0;
    let mut batch_queue = preamble_queue;

    rg.runtime_cmds.push(RuntimeCmdInfo {
        cmd_id: CMD_ID_PREAMBLE,
        transition_id: None,
        aliasing_infos: crate::arena::Span::empty(),
    });

    for &node_id in scheduled {
        let queue = node_queue.get(&node_id).copied().unwrap_or(QUEUE_GRAPHICS);
        if queue != batch_queue {
            push_batch(rg, batch_queue, batch_start_cmd);
            batch_start_cmd = rg.runtime_cmds.len() as u32;
            batch_queue = queue;
        }
        let node = rg.graph.node(node_id);
        let info = match node.kind {
            crate::node::NodeKind::Command(cmd_id) => RuntimeCmdInfo {
                cmd_id,
                transition_id: None,
                aliasing_infos: crate::arena::Span::empty(),
            },
            crate::node::NodeKind::Transition(t) => RuntimeCmdInfo {
                cmd_id: 0,
                transition_id: Some(t),
                aliasing_infos: crate::arena::Span::empty(),
            },
        };
        rg.runtime_cmds.push(info);
    }

    rg.runtime_cmds.push(RuntimeCmdInfo {
        cmd_id: CMD_ID_POSTAMBLE,
        transition_id: None,
        aliasing_infos: crate::arena::Span::empty(),
    });

    push_batch(rg, batch_queue, batch_start_cmd);
}

fn push_batch(rg: &mut RenderGraph, queue_index: u32, cmd_begin: u32) {
    let num_cmds = rg.runtime_cmds.len() as u32 - cmd_begin;
    if num_cmds == 0 {
        return;
    }
    rg.cmd_batches.push(CommandBatch {
        queue_index,
        cmd_begin,
        num_cmds,
        signal_fence_index: if rg.cmd_batches.is_empty() { None } else { Some(rg.cmd_batches.len() as u32 - 1) },
        wait_fences_begin: 0,
        num_wait_fences: 0,
    });
}
