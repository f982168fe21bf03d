//! Front-end-facing input types: the declarative per-frame description that
//! `RenderGraph::update` compiles into a schedule.

use crate::access::AccessInfo;
use crate::format::RgFormat;
use crate::node::NodeId;
use crate::resource::ResourceId;
use crate::schedule_flags::{DiagnosticFlags, ScheduleFlags};
use crate::subresource::SubresourceRange;

bitflags! {
    #[derive(Default)]
    pub struct QueueMask: u8 {
        const GRAPHICS = 1 << 0;
        const COMPUTE  = 1 << 1;
        const COPY     = 1 << 2;
    }
}

bitflags! {
    #[derive(Default)]
    pub struct WorkloadTypeMask: u8 {
        const GRAPHICS = 1 << 0;
        const COMPUTE  = 1 << 1;
        const COPY     = 1 << 2;
    }
}

/// One view-argument binding declared on a command.
#[derive(Debug, Clone, Copy)]
pub struct CmdAccessDecl {
    pub resource_id: ResourceId,
    pub range: SubresourceRange,
    pub view_format: RgFormat,
    pub access: AccessInfo,
}

/// A marker command: subgraph begin/end, scheduler barrier, or an ordinary
/// user command. Kept as one enum so P2 can process the declaration stream
/// in a single pass without the front end needing separate lists.
#[derive(Debug, Clone)]
pub enum CommandDecl {
    SubgraphBegin { atomic: bool, sequential: bool },
    SubgraphEnd,
    SchedulerBarrier,
    Node {
        node_decl_index: u32,
        accesses: Vec<CmdAccessDecl>,
        valid_queues: QueueMask,
        preferred_queue: QueueMask,
        workload_type: WorkloadTypeMask,
        prefers_async: bool,
        force_keep: bool,
    },
}

impl CommandDecl {
    pub fn node(node_decl_index: u32, accesses: Vec<CmdAccessDecl>) -> Self {
        CommandDecl::Node {
            node_decl_index,
            accesses,
            valid_queues: QueueMask::GRAPHICS,
            preferred_queue: QueueMask::GRAPHICS,
            workload_type: WorkloadTypeMask::GRAPHICS,
            prefers_async: false,
            force_keep: false,
        }
    }
}

/// Per-command queue/workload metadata, kept in declaration order alongside
/// [`crate::render_graph::RenderGraph::node_for_cmd`] so the scheduler can
/// look it up without re-walking the original declaration list.
#[derive(Debug, Clone, Copy)]
pub struct CmdQueueInfo {
    pub valid_queues: QueueMask,
    pub preferred_queue: QueueMask,
    pub workload_type: WorkloadTypeMask,
    pub prefers_async: bool,
    pub force_keep: bool,
}

/// An explicit user-declared ordering constraint: `before` must be
/// scheduled ahead of `after`. Translated to a graph edge verbatim by P2.
#[derive(Debug, Clone, Copy)]
pub struct ExplicitDependency {
    pub before: NodeId,
    pub after: NodeId,
}

/// Per-`update` overrides; `rng` feeds `RANDOM_ORDER` scoring without a
/// process-global generator.
pub struct UpdateFlags<'a> {
    pub schedule_flags: ScheduleFlags,
    pub diagnostic_flags: DiagnosticFlags,
    pub queued_frame_count: u32,
    pub rng: Option<&'a mut dyn FnMut() -> u32>,
}

impl<'a> Default for UpdateFlags<'a> {
    fn default() -> Self {
        UpdateFlags {
            schedule_flags: ScheduleFlags::empty(),
            diagnostic_flags: DiagnosticFlags::empty(),
            queued_frame_count: 2,
            rng: None,
        }
    }
}

/// The full front-end-produced input to one `RenderGraph::update` call.
#[derive(Default)]
pub struct FrameInput {
    pub commands: Vec<CommandDecl>,
    pub explicit_deps: Vec<ExplicitDependency>,
}
