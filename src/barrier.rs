//! Barrier batch shapes produced by P7: one per contiguous transition run in
//! the scheduled runtime-command stream.

use crate::access::AccessAttr;
use crate::node::TransitionId;
use crate::resource::ResourceId;
use crate::subresource::SubresourceRange;

#[derive(Debug, Clone, Copy)]
pub struct DiscardEntry {
    pub resource_id: ResourceId,
    pub range: SubresourceRange,
}

#[derive(Debug, Clone, Default)]
pub struct ConventionalBarrierBatch {
    pub early: Vec<TransitionId>,
    pub discards: Vec<DiscardEntry>,
    pub late: Vec<TransitionId>,
}

#[derive(Debug, Clone, Copy)]
pub struct TextureBarrier {
    pub resource_id: ResourceId,
    pub range: SubresourceRange,
    pub sync_before: AccessAttr,
    pub sync_after: AccessAttr,
    pub access_before: AccessAttr,
    pub access_after: AccessAttr,
    pub discard: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct BufferBarrier {
    pub resource_id: ResourceId,
    pub sync_before: AccessAttr,
    pub sync_after: AccessAttr,
    pub access_before: AccessAttr,
    pub access_after: AccessAttr,
}

#[derive(Debug, Clone, Copy)]
pub struct GlobalBarrier {
    pub sync_before: AccessAttr,
    pub sync_after: AccessAttr,
}

#[derive(Debug, Clone, Default)]
pub struct EnhancedBarrierBatch {
    pub global: Vec<GlobalBarrier>,
    pub textures: Vec<TextureBarrier>,
    pub buffers: Vec<BufferBarrier>,
}

#[derive(Debug, Clone)]
pub enum BarrierBatchKind {
    Conventional(ConventionalBarrierBatch),
    Enhanced(EnhancedBarrierBatch),
}

/// One contiguous transition run's compiled barrier batch, anchored at the
/// run's position in `runtime_cmds`.
#[derive(Debug, Clone)]
pub struct BarrierBatch {
    pub runtime_cmd_begin: u32,
    pub runtime_cmd_count: u32,
    pub kind: BarrierBatchKind,
}
