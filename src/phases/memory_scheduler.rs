//! P6: 2-D (lifetime x offset) bin-packing of transient resources into
//! heaps, plus aliasing analysis.

use fxhash::{FxHashMap, FxHashSet};

use crate::arena::Span;
use crate::backend::RuntimeBackend;
use crate::cmd::UpdateFlags;
use crate::error::RgResult;
use crate::render_graph::RenderGraph;
use crate::resource::{AllocPlacement, ResourceId, INVALID_RESOURCE};
use crate::runtime::{HeapInfo, ResourceAliasingInfo, CMD_ID_POSTAMBLE};
use crate::schedule_flags::ScheduleFlags;

struct Placement {
    resource_id: ResourceId,
    heap_id: u32,
    offset: u64,
    size: u64,
}

pub fn run(rg: &mut RenderGraph, backend: &dyn RuntimeBackend, flags: &UpdateFlags) -> RgResult<()> {
    let scheduled_ids: Vec<ResourceId> = (0..rg.resources.len() as ResourceId)
        .filter(|&id| rg.resources[id].is_scheduled() && !rg.resources[id].is_persistent())
        .collect();

    for &id in &scheduled_ids {
        let req = backend.memory_requirement(&rg.resources[id].desc);
        rg.resources[id].alloc_requirement = req;
    }

    let mut by_type: FxHashMap<u32, Vec<ResourceId>> = FxHashMap::default();
    for &id in &scheduled_ids {
        by_type
            .entry(rg.resources[id].alloc_requirement.memory_type_index)
            .or_default()
            .push(id);
    }

    let mem_types: Vec<_> = backend.memory_types().to_vec();
    let mut heaps_of_type: FxHashMap<u32, Vec<u32>> = FxHashMap::default();
    let mut placements: Vec<Placement> = Vec::new();

    let mut type_indices: Vec<u32> = by_type.keys().copied().collect();
    type_indices.sort_unstable();

    for mem_type_index in type_indices {
        let mut ids = by_type.remove(&mem_type_index).unwrap();
        ids.sort_by(|&a, &b| {
            let ra = &rg.resources[a];
            let rb = &rg.resources[b];
            rb.alloc_requirement
                .size
                .cmp(&ra.alloc_requirement.size)
                .then(ra.lifetime_begin.cmp(&rb.lifetime_begin))
        });

        let mem_type = mem_types
            .get(mem_type_index as usize)
            .copied()
            .unwrap_or(crate::backend::MemoryTypeInfo {
                min_alignment: 1,
                default_heap_size: 16 * 1024 * 1024,
            });

        for id in ids {
            place_resource(rg, &mut heaps_of_type, &mut placements, mem_type_index, mem_type, id);
        }
    }

    for p in &placements {
        rg.resources[p.resource_id].alloc_placement = Some(AllocPlacement {
            heap_id: p.heap_id,
            offset: p.offset,
        });
    }

    if !flags.schedule_flags.contains(ScheduleFlags::ALLOW_SPLIT_BARRIERS) {
        // placements already non-overlapping within overlapping lifetimes;
        // nothing further required for the conventional barrier path.
    }

    compute_aliasing(rg, &placements);

    log::debug!(
        "P6 MemoryScheduler: {} heaps, {} placements, {} aliasing infos",
        rg.heaps.len(),
        placements.len(),
        rg.aliasing_infos.len()
    );
    Ok(())
}

fn place_resource(
    rg: &mut RenderGraph,
    heaps_of_type: &mut FxHashMap<u32, Vec<u32>>,
    placements: &mut Vec<Placement>,
    mem_type_index: u32,
    mem_type: crate::backend::MemoryTypeInfo,
    resource_id: ResourceId,
) {
    let req = rg.resources[resource_id].alloc_requirement;
    let alignment = req.alignment.max(mem_type.min_alignment).max(1);
    let size = req.size.max(1);
    let lifetime = (
        rg.resources[resource_id].lifetime_begin,
        rg.resources[resource_id].lifetime_end,
    );

    let heap_ids = heaps_of_type.entry(mem_type_index).or_default();

    let mut best: Option<(u32, u64, u64)> = None; // (heap_id, offset, leftover)
    for &heap_id in heap_ids.iter() {
        let heap_size = rg.heaps[heap_id].size;
        let occupied: Vec<(u64, u64)> = placements
            .iter()
            .filter(|p| p.heap_id == heap_id)
            .filter(|p| lifetimes_overlap(lifetime, resource_lifetime(rg, p.resource_id)))
            .map(|p| (p.offset, p.size))
            .collect();

        let mut candidates: Vec<u64> = vec![0];
        for &(o, s) in &occupied {
            candidates.push(align_up(o + s, alignment));
        }

        for candidate in candidates {
            let candidate = align_up(candidate, alignment);
            if candidate + size > heap_size {
                continue;
            }
            if occupied
                .iter()
                .any(|&(o, s)| ranges_overlap(candidate, size, o, s))
            {
                continue;
            }
            let leftover = heap_size - (candidate + size);
            if best.map(|(_, _, l)| leftover < l).unwrap_or(true) {
                best = Some((heap_id, candidate, leftover));
            }
        }
    }

    let (heap_id, offset) = match best {
        Some((heap_id, offset, _)) => (heap_id, offset),
        None => {
            let heap_size = size.max(mem_type.default_heap_size);
            let heap_id = rg.heaps.push(HeapInfo::new(mem_type_index, heap_size, alignment));
            heap_ids.push(heap_id);
            (heap_id, 0)
        }
    };

    let heap = &mut rg.heaps[heap_id];
    heap.used_size += size;
    heap.max_used_size = heap.max_used_size.max(heap.used_size);

    placements.push(Placement {
        resource_id,
        heap_id,
        offset,
        size,
    });
}

fn resource_lifetime(rg: &RenderGraph, id: ResourceId) -> (u32, u32) {
    (rg.resources[id].lifetime_begin, rg.resources[id].lifetime_end)
}

fn lifetimes_overlap(a: (u32, u32), b: (u32, u32)) -> bool {
    a.0 <= b.1 && b.0 <= a.1
}

fn ranges_overlap(a_off: u64, a_size: u64, b_off: u64, b_size: u64) -> bool {
    a_off < b_off + b_size && b_off < a_off + a_size
}

fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        return value;
    }
    (value + alignment - 1) / alignment * alignment
}

struct ActiveRange {
    heap_id: u32,
    offset: u64,
    size: u64,
    owner: ResourceId,
}

/// Replays placements in lifetime order, emitting a `ResourceAliasingInfo`
/// whenever a resource's heap range overlaps one already vacated by an
/// earlier resource with a non-overlapping lifetime.
fn compute_aliasing(rg: &mut RenderGraph, placements: &[Placement]) {
    let mut order: Vec<&Placement> = placements.iter().collect();
    order.sort_by_key(|p| rg.resources[p.resource_id].lifetime_begin);

    let mut active: Vec<ActiveRange> = Vec::new();
    let mut already_deactivated: FxHashSet<ResourceId> = FxHashSet::default();

    for p in order {
        let lifetime = resource_lifetime(rg, p.resource_id);
        let mut group: Vec<ResourceAliasingInfo> = Vec::new();

        let mut remaining: Vec<ActiveRange> = Vec::new();
        for entry in active.drain(..) {
            let overlaps = entry.heap_id == p.heap_id
                && ranges_overlap(entry.offset, entry.size, p.offset, p.size);
            if overlaps {
                let src_deactivating = already_deactivated.insert(entry.owner);
                group.push(ResourceAliasingInfo {
                    src_resource: entry.owner,
                    dst_resource: p.resource_id,
                    src_deactivating,
                    dst_activating: false,
                });
                rg.resources[entry.owner].is_aliased = true;
            } else {
                remaining.push(entry);
            }
        }
        active = remaining;

        if let Some(last) = group.last_mut() {
            last.dst_activating = true;
            rg.resources[p.resource_id].is_aliased = true;
        }

        if !group.is_empty() {
            let offset = rg.aliasing_infos.len() as u32;
            for info in &group {
                rg.aliasing_infos.push(*info);
            }
            let span = Span::new(offset, group.len() as u32);
            let runtime_idx = lifetime.0 as usize;
            if let Some(cmd) = rg.runtime_cmds.get_mut(runtime_idx as u32) {
                cmd.aliasing_infos = span;
            }
        }

        active.push(ActiveRange {
            heap_id: p.heap_id,
            offset: p.offset,
            size: p.size,
            owner: p.resource_id,
        });
    }

    // POSTAMBLE: resources that are aliased but have no successor within the
    // frame never got a `src_deactivating` entry above, so they'd never be
    // raised back to a discardable state for the next frame's aliasing to
    // build on. Force one for every such resource, attached to the
    // postamble's runtime command.
    let mut postamble_group: Vec<ResourceAliasingInfo> = Vec::new();
    for entry in &active {
        if rg.resources[entry.owner].is_aliased && !already_deactivated.contains(&entry.owner) {
            postamble_group.push(ResourceAliasingInfo {
                src_resource: entry.owner,
                dst_resource: INVALID_RESOURCE,
                src_deactivating: true,
                dst_activating: false,
            });
        }
    }

    if !postamble_group.is_empty() {
        let offset = rg.aliasing_infos.len() as u32;
        for info in &postamble_group {
            rg.aliasing_infos.push(*info);
        }
        let span = Span::new(offset, postamble_group.len() as u32);
        let postamble_idx = rg.runtime_cmds.len() as u32 - 1;
        if let Some(cmd) = rg.runtime_cmds.get_mut(postamble_idx) {
            debug_assert_eq!(cmd.cmd_id, CMD_ID_POSTAMBLE);
            cmd.aliasing_infos = span;
        }
    }
}
