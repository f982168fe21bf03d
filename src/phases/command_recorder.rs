//! P8: walk the compiled runtime stream and hand it to the backend, folding
//! adjacent render-target-writing commands into render passes and adjacent
//! resolve accesses into coalesced resolve batches.

use crate::access::AccessAttr;
use crate::backend::RuntimeBackend;
use crate::barrier::BarrierBatch;
use crate::error::RgResult;
use crate::render_graph::RenderGraph;
use crate::resource::ResourceId;
use crate::runtime::{CMD_ID_POSTAMBLE, CMD_ID_PREAMBLE};
use crate::subresource::SubresourceRange;
use crate::transition::CmdAccessInfo;

/// A backend never sees more than this many resolves in one call; longer
/// runs are split into consecutive `ResolveBatch` events.
pub const MAX_RESOLVES_PER_BATCH: usize = 128;

#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct Scissor {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderPassAttachment {
    pub resource_id: ResourceId,
    pub range: SubresourceRange,
}

#[derive(Debug, Clone)]
pub struct RenderPassInfo {
    pub color_attachments: Vec<RenderPassAttachment>,
    pub depth_stencil_attachment: Option<RenderPassAttachment>,
    pub viewport: Viewport,
    pub scissor: Scissor,
}

#[derive(Debug, Clone, Copy)]
pub struct ResolveEntry {
    pub src_resource: ResourceId,
    pub dst_resource: ResourceId,
    pub range: SubresourceRange,
}

/// One event of the recorded stream, handed to the caller's callback in
/// order. `Barrier`/`RenderPass*`/`ResolveBatch` are synthesized by this
/// phase; `Command` corresponds one-to-one with a declared user command.
pub enum NodeRecordInfo<'a> {
    Barrier {
        batch: &'a BarrierBatch,
    },
    RenderPassBegin {
        info: RenderPassInfo,
    },
    RenderPassEnd,
    ResolveBatch {
        entries: &'a [ResolveEntry],
    },
    Command {
        runtime_cmd_index: u32,
        cmd_id: u32,
        node_decl_index: u32,
        queue_index: u32,
        accesses: &'a [CmdAccessInfo],
    },
}

pub fn run(
    rg: &mut RenderGraph,
    backend: &mut dyn RuntimeBackend,
    cb: &mut dyn FnMut(&mut dyn RuntimeBackend, NodeRecordInfo),
) -> RgResult<()> {
    let queue_of_runtime_cmd = build_queue_lookup(rg);

    let mut batch_cursor = 0usize;
    let mut current_pass_key: Option<Vec<ResourceId>> = None;
    let runtime_len = rg.runtime_cmds.len();

    for runtime_idx in 0..runtime_len {
        let runtime_idx = runtime_idx as u32;
        let cmd = rg.runtime_cmds[runtime_idx];

        if cmd.is_transition() {
            if current_pass_key.take().is_some() {
                cb(backend, NodeRecordInfo::RenderPassEnd);
            }
            while batch_cursor < rg.barrier_batches.len()
                && rg.barrier_batches[batch_cursor].runtime_cmd_begin + rg.barrier_batches[batch_cursor].runtime_cmd_count
                    <= runtime_idx
            {
                batch_cursor += 1;
            }
            if let Some(batch) = rg.barrier_batches.get(batch_cursor) {
                if batch.runtime_cmd_begin == runtime_idx {
                    cb(backend, NodeRecordInfo::Barrier { batch });
                }
            }
            continue;
        }

        if cmd.cmd_id == CMD_ID_PREAMBLE || cmd.cmd_id == CMD_ID_POSTAMBLE {
            if current_pass_key.take().is_some() {
                cb(backend, NodeRecordInfo::RenderPassEnd);
            }
            continue;
        }

        let cmd_index = cmd.cmd_id;
        let accesses = &rg.cmd_accesses[cmd_index as usize];
        let attachments = render_target_attachments(accesses);
        let pass_key: Option<Vec<ResourceId>> = if attachments.0.is_empty() && attachments.1.is_none() {
            None
        } else {
            let mut ids: Vec<ResourceId> = attachments.0.iter().map(|a| a.resource_id).collect();
            ids.extend(attachments.1.iter().map(|a| a.resource_id));
            ids.sort_unstable();
            Some(ids)
        };

        if pass_key != current_pass_key {
            if current_pass_key.take().is_some() {
                cb(backend, NodeRecordInfo::RenderPassEnd);
            }
            if let Some(key) = &pass_key {
                let info = build_render_pass_info(rg, attachments.0.clone(), attachments.1);
                current_pass_key = Some(key.clone());
                cb(backend, NodeRecordInfo::RenderPassBegin { info });
            }
        }

        let node_decl_index = rg
            .node_decl_indices
            .get(cmd_index as usize)
            .copied()
            .unwrap_or(cmd_index);
        let queue_index = queue_of_runtime_cmd.get(&runtime_idx).copied().unwrap_or(0);

        cb(
            backend,
            NodeRecordInfo::Command {
                runtime_cmd_index: runtime_idx,
                cmd_id: cmd_index,
                node_decl_index,
                queue_index,
                accesses,
            },
        );

        let resolves = collect_resolve_entries(accesses);
        for chunk in resolves.chunks(MAX_RESOLVES_PER_BATCH) {
            cb(backend, NodeRecordInfo::ResolveBatch { entries: chunk });
        }
    }

    if current_pass_key.is_some() {
        cb(backend, NodeRecordInfo::RenderPassEnd);
    }

    log::trace!("P8 CommandRecorder: {} runtime cmds recorded", runtime_len);
    Ok(())
}

fn build_queue_lookup(rg: &RenderGraph) -> fxhash::FxHashMap<u32, u32> {
    let mut map = fxhash::FxHashMap::default();
    for batch in &rg.cmd_batches {
        for i in 0..batch.num_cmds {
            map.insert(batch.cmd_begin + i, batch.queue_index);
        }
    }
    map
}

/// Returns `(color attachments, depth/stencil attachment)` for one command's
/// declared accesses.
fn render_target_attachments(
    accesses: &[CmdAccessInfo],
) -> (Vec<RenderPassAttachment>, Option<RenderPassAttachment>) {
    let mut color = Vec::new();
    let mut depth_stencil = None;
    for acc in accesses {
        if acc.access.access_flags.contains(AccessAttr::RENDER_TARGET) {
            color.push(RenderPassAttachment {
                resource_id: acc.resource_id,
                range: acc.range,
            });
        } else if acc.access.access_flags.intersects(AccessAttr::DEPTH_STENCIL) {
            depth_stencil = Some(RenderPassAttachment {
                resource_id: acc.resource_id,
                range: acc.range,
            });
        }
    }
    (color, depth_stencil)
}

fn build_render_pass_info(
    rg: &RenderGraph,
    color_attachments: Vec<RenderPassAttachment>,
    depth_stencil_attachment: Option<RenderPassAttachment>,
) -> RenderPassInfo {
    let extent_of = |id: ResourceId| {
        let desc = &rg.resources[id].desc;
        (desc.width.max(1), desc.height.max(1))
    };
    let (width, height) = color_attachments
        .first()
        .map(|a| extent_of(a.resource_id))
        .or_else(|| depth_stencil_attachment.as_ref().map(|a| extent_of(a.resource_id)))
        .unwrap_or((1, 1));

    // Viewports are recorded in the conventional top-left-origin convention;
    // a backend whose clip space is bottom-left-origin flips `y`/`height`
    // itself from this same width/height pair.
    RenderPassInfo {
        color_attachments,
        depth_stencil_attachment,
        viewport: Viewport {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        },
        scissor: Scissor {
            x: 0,
            y: 0,
            width,
            height,
        },
    }
}

fn collect_resolve_entries(accesses: &[CmdAccessInfo]) -> Vec<ResolveEntry> {
    let srcs: Vec<&CmdAccessInfo> = accesses
        .iter()
        .filter(|a| a.access.access_flags.contains(AccessAttr::RESOLVE_SRC))
        .collect();
    let dsts: Vec<&CmdAccessInfo> = accesses
        .iter()
        .filter(|a| a.access.access_flags.contains(AccessAttr::RESOLVE_DST))
        .collect();
    if srcs.len() != dsts.len() {
        log::warn!(
            "command declares {} resolve sources and {} resolve destinations; pairing by position up to the shorter list",
            srcs.len(),
            dsts.len()
        );
    }
    srcs.iter()
        .zip(dsts.iter())
        .map(|(s, d)| ResolveEntry {
            src_resource: s.resource_id,
            dst_resource: d.resource_id,
            range: d.range,
        })
        .collect()
}
