//! P7 (backend-facing): fold contiguous transition runs into
//! submission-ready barrier batches.

use crate::access::AccessAttr;
use crate::backend::{BarrierStyle, RuntimeBackend};
use crate::barrier::{
    BarrierBatch, BarrierBatchKind, ConventionalBarrierBatch, DiscardEntry, EnhancedBarrierBatch,
    TextureBarrier,
};
use crate::error::RgResult;
use crate::node::TransitionId;
use crate::render_graph::RenderGraph;
use crate::transition::INVALID_TRANSITION;

pub fn run(rg: &mut RenderGraph, backend: &dyn RuntimeBackend) -> RgResult<()> {
    let runtime_len = rg.runtime_cmds.len() as u32;
    let mut i = 0u32;
    while i < runtime_len {
        if !rg.runtime_cmds[i].is_transition() {
            i += 1;
            continue;
        }
        let run_begin = i;
        let mut transition_ids: Vec<TransitionId> = Vec::new();
        while i < runtime_len {
            let cmd = rg.runtime_cmds[i];
            match cmd.transition_id {
                Some(t) => {
                    transition_ids.push(t);
                    i += 1;
                }
                None => break,
            }
        }
        let run_count = i - run_begin;

        let kind = match backend.barrier_style() {
            BarrierStyle::Conventional => {
                BarrierBatchKind::Conventional(build_conventional(rg, &transition_ids))
            }
            BarrierStyle::Enhanced => BarrierBatchKind::Enhanced(build_enhanced(rg, &transition_ids)),
        };

        rg.barrier_batches.push(BarrierBatch {
            runtime_cmd_begin: run_begin,
            runtime_cmd_count: run_count,
            kind,
        });
    }

    log::trace!("P7 BarrierBuilder: {} batches", rg.barrier_batches.len());
    Ok(())
}

/// Same-state transitions that carry no real synchronization requirement:
/// relaxed-order UAV<->UAV, or same-access RT/DS-write continuations.
fn should_elide(before: AccessAttr, after: AccessAttr) -> bool {
    if before != after {
        return false;
    }
    if before.is_uav() && before.is_relaxed_order() {
        return true;
    }
    if before.contains(AccessAttr::RENDER_TARGET) {
        return true;
    }
    if before.intersects(AccessAttr::DEPTH_WRITE | AccessAttr::STENCIL_WRITE) {
        return true;
    }
    false
}

fn before_access(rg: &RenderGraph, transition_id: TransitionId) -> AccessAttr {
    let prev = rg.transitions[transition_id].prev_transition;
    rg.transitions[prev].access.access_flags
}

fn build_conventional(rg: &RenderGraph, transitions: &[TransitionId]) -> ConventionalBarrierBatch {
    let mut batch = ConventionalBarrierBatch::default();
    for &t in transitions {
        let info = rg.transitions[t];
        let before = before_access(rg, t);
        if should_elide(before, info.access.access_flags) {
            continue;
        }
        let is_first_touch = info.prev_transition == INVALID_TRANSITION;
        if rg.resources[info.resource_id].is_aliased && is_first_touch {
            batch.discards.push(DiscardEntry {
                resource_id: info.resource_id,
                range: info.range,
            });
            batch.late.push(t);
        } else {
            batch.early.push(t);
        }
    }
    batch
}

fn build_enhanced(rg: &RenderGraph, transitions: &[TransitionId]) -> EnhancedBarrierBatch {
    let mut batch = EnhancedBarrierBatch::default();
    for &t in transitions {
        let info = rg.transitions[t];
        let before = before_access(rg, t);
        if should_elide(before, info.access.access_flags) {
            continue;
        }
        let is_first_touch = info.prev_transition == INVALID_TRANSITION;
        let discard = is_first_touch && rg.resources[info.resource_id].is_aliased;
        if rg.resources[info.resource_id].desc.is_image() {
            batch.textures.push(TextureBarrier {
                resource_id: info.resource_id,
                range: info.range,
                sync_before: before,
                sync_after: info.access.access_flags,
                access_before: before,
                access_after: info.access.access_flags,
                discard,
            });
        } else {
            batch.buffers.push(crate::barrier::BufferBarrier {
                resource_id: info.resource_id,
                sync_before: before,
                sync_after: info.access.access_flags,
                access_before: before,
                access_after: info.access.access_flags,
            });
        }
    }
    batch
}
