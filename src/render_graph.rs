//! The top-level `RenderGraph`: owns every phase-shared pool and drives the
//! P1-P8 pipeline.

use crate::arena::IndexArena;
use crate::backend::RuntimeBackend;
use crate::barrier::BarrierBatch;
use crate::cmd::{CmdQueueInfo, FrameInput, UpdateFlags};
use crate::error::RgResult;
use crate::graph::Graph;
use crate::node::NodeId;
use crate::resource::{ResourceDesc, ResourceId, ResourceInstance};
use crate::runtime::{CommandBatch, HeapInfo, ResourceAliasingInfo, RuntimeCmdInfo};
use crate::transition::{CmdAccessInfo, TransitionInfo};

/// Carries the arenas phases read/write plus the scratch state released at
/// the end of `update`. Exists as its own type (rather than folding
/// everything into `RenderGraph`) because the design notes call out the
/// frame-arena/scratch-arena split explicitly.
#[derive(Default)]
pub struct UpdateContext {
    pub queued_frame_count: u32,
}

/// Owns every vector that phases read or produce. Resource declarations
/// persist across `update()` calls (so the transition-count watermark can be
/// tracked frame over frame); everything else, including heaps and resource
/// placements, is rebuilt from scratch each call — P6 has no cross-frame
/// notion of a pre-allocated heap to reuse, so carrying `heaps` forward would
/// only grow it unboundedly without ever being read back.
#[derive(Default)]
pub struct RenderGraph {
    pub graph: Graph,
    pub resources: IndexArena<ResourceInstance>,
    pub transitions: IndexArena<TransitionInfo>,
    /// Per declared command (index == declaration order among `Node`
    /// variants), the view-argument bindings it carries.
    pub cmd_accesses: Vec<Vec<CmdAccessInfo>>,
    /// Maps a command's declaration index to the graph node id P2 created
    /// for it.
    pub node_for_cmd: Vec<NodeId>,
    /// Parallel to `node_for_cmd`: the queue/workload metadata declared for
    /// that command.
    pub cmd_queue_info: Vec<CmdQueueInfo>,
    pub heaps: IndexArena<HeapInfo>,
    pub runtime_cmds: IndexArena<RuntimeCmdInfo>,
    pub aliasing_infos: IndexArena<ResourceAliasingInfo>,
    pub cmd_batches: Vec<CommandBatch>,
    /// Final node schedule, in execution order (command nodes and
    /// transition nodes interleaved), after P4.
    pub scheduled_nodes: Vec<NodeId>,
    /// `scheduleIndex(node)` for every node that made it into the schedule.
    pub schedule_index: Vec<Option<u32>>,
    pub eliminated: Vec<bool>,
    pub barrier_batches: Vec<BarrierBatch>,
    /// Parallel to `node_for_cmd`/`cmd_accesses`: the front end's own
    /// `node_decl_index` for that command, so `command_recorder` can hand it
    /// back to the caller without them re-deriving it from `cmd_id`.
    pub node_decl_indices: Vec<u32>,

    transition_count_watermark: u32,
}

impl RenderGraph {
    pub fn new() -> Self {
        RenderGraph::default()
    }

    pub fn declare_resource(&mut self, desc: ResourceDesc) -> ResourceId {
        self.resources.push(ResourceInstance::new(desc))
    }

    pub fn resource(&self, id: ResourceId) -> &ResourceInstance {
        &self.resources[id]
    }

    pub fn transition_count_watermark(&self) -> u32 {
        self.transition_count_watermark
    }

    /// Runs P1-P6 (everything up to and including memory scheduling), the
    /// backend-independent half of the pipeline. P7/P8 are invoked
    /// separately via [`Self::record`] once the caller has a command buffer
    /// to record into.
    pub fn update(
        &mut self,
        input: &FrameInput,
        flags: &mut UpdateFlags,
        backend: &dyn RuntimeBackend,
    ) -> RgResult<()> {
        log::debug!(
            "RenderGraph::update: {} resources, {} command decls",
            self.resources.len(),
            input.commands.len()
        );
        self.reset_per_frame_state();

        crate::phases::pre_process::run(self, input)?;
        crate::phases::dag_build::run(self, input)?;
        crate::phases::access_dag_build::run(self, backend)?;
        crate::phases::scheduler::run(self, flags)?;
        crate::phases::lifetime::run(self)?;
        crate::phases::memory_scheduler::run(self, backend, &*flags)?;

        let next_watermark = self.transitions.len() as u32;
        self.transition_count_watermark =
            next_watermark + (next_watermark >> 1);

        log::debug!(
            "RenderGraph::update done: {} transitions, {} runtime cmds, {} batches",
            self.transitions.len(),
            self.runtime_cmds.len(),
            self.cmd_batches.len()
        );
        Ok(())
    }

    /// Runs P7 then P8 against an already-`update`-d graph, invoking `cb`
    /// for every non-barrier runtime command.
    pub fn record(
        &mut self,
        backend: &mut dyn RuntimeBackend,
        cb: &mut dyn FnMut(&mut dyn RuntimeBackend, crate::phases::command_recorder::NodeRecordInfo),
    ) -> RgResult<()> {
        self.barrier_batches.clear();
        crate::phases::barrier_builder::run(self, &*backend)?;
        crate::phases::command_recorder::run(self, backend, cb)
    }

    fn reset_per_frame_state(&mut self) {
        self.graph.reset();
        self.transitions = IndexArena::new();
        self.transitions.push(TransitionInfo::invalid_sentinel());
        self.cmd_accesses.clear();
        self.node_for_cmd.clear();
        self.cmd_queue_info.clear();
        self.node_decl_indices.clear();
        self.heaps = IndexArena::new();
        self.runtime_cmds.reset_keep_capacity();
        self.aliasing_infos.reset_keep_capacity();
        self.cmd_batches.clear();
        self.scheduled_nodes.clear();
        self.schedule_index.clear();
        self.eliminated.clear();
        for resource in self.resources.as_mut_slice() {
            resource.all_accesses = crate::access::AccessAttr::empty();
            resource.initial_access = crate::access::AccessAttr::UNKNOWN;
            resource.lifetime_begin = crate::resource::LIFETIME_UNDEFINED;
            resource.lifetime_end = crate::resource::LIFETIME_UNDEFINED;
            resource.final_accesses.clear();
        }
    }
}
