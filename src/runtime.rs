//! Types describing the compiled output: the runtime command stream, batch
//! metadata, heaps and aliasing records.

use crate::arena::Span;
use crate::node::TransitionId;
use crate::resource::ResourceId;

pub const INDEX_NONE_U32: u32 = 0xFFFF_FFFF;

/// Reserved cmd ids bracketing every frame's runtime stream, outside the
/// user cmd-id range.
pub const CMD_ID_PREAMBLE: u32 = 0xFFFF_FFFE;
pub const CMD_ID_POSTAMBLE: u32 = 0xFFFF_FFFD;

#[derive(Debug, Clone, Copy)]
pub struct HeapInfo {
    pub mem_type_index: u32,
    pub size: u64,
    pub alignment: u64,
    pub max_used_size: u64,
    pub used_size: u64,
}

impl HeapInfo {
    pub fn new(mem_type_index: u32, size: u64, alignment: u64) -> Self {
        HeapInfo {
            mem_type_index,
            size,
            alignment,
            max_used_size: 0,
            used_size: 0,
        }
    }
}

/// `{src, dst, srcDeactivating, dstActivating}`: one aliasing transfer of a
/// heap range's ownership from `src_resource` to `dst_resource`.
#[derive(Debug, Clone, Copy)]
pub struct ResourceAliasingInfo {
    pub src_resource: ResourceId,
    pub dst_resource: ResourceId,
    pub src_deactivating: bool,
    pub dst_activating: bool,
}

/// One entry of the compiled runtime stream: either a real command or a
/// barrier-batch sentinel, with the aliasing records that become active or
/// inactive at this point.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeCmdInfo {
    pub cmd_id: u32,
    pub transition_id: Option<TransitionId>,
    pub aliasing_infos: Span<ResourceAliasingInfo>,
}

impl RuntimeCmdInfo {
    pub fn is_transition(&self) -> bool {
        self.transition_id.is_some()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CommandBatch {
    pub queue_index: u32,
    pub cmd_begin: u32,
    pub num_cmds: u32,
    pub signal_fence_index: Option<u32>,
    pub wait_fences_begin: u32,
    pub num_wait_fences: u32,
}
