//! Transition and access records shared between P3, P6 and P7.

use smallvec::SmallVec;

use crate::access::{AccessAttr, AccessInfo};
use crate::format::RgFormat;
use crate::node::{NodeId, TransitionId};
use crate::resource::ResourceId;
use crate::subresource::SubresourceRange;

/// Sentinel transition id standing in for "no prior access" /
/// `RPS_ACCESS_UNKNOWN`. All real transitions have an id greater than this.
pub const INVALID_TRANSITION: TransitionId = 0;

/// One command argument's binding to a resource view.
#[derive(Debug, Clone, Copy)]
pub struct CmdAccessInfo {
    pub resource_id: ResourceId,
    pub range: SubresourceRange,
    pub view_format: RgFormat,
    pub access: AccessInfo,
    pub view_info_id: Option<u32>,
}

/// `{ access(resourceId, range, access-attr, viewFormat), nodeId, prevTransition }`.
#[derive(Debug, Clone, Copy)]
pub struct TransitionInfo {
    pub resource_id: ResourceId,
    pub range: SubresourceRange,
    pub access: AccessInfo,
    pub view_format: RgFormat,
    pub node_id: NodeId,
    pub prev_transition: TransitionId,
}

impl TransitionInfo {
    /// The permanently-present index-0 sentinel: no resource, no access,
    /// self-referential `prev_transition`.
    pub fn invalid_sentinel() -> Self {
        TransitionInfo {
            resource_id: 0,
            range: SubresourceRange::single_subresource(crate::format::AspectMask::empty()),
            access: AccessInfo::UNKNOWN,
            view_format: RgFormat::Unknown,
            node_id: 0,
            prev_transition: INVALID_TRANSITION,
        }
    }
}

/// Scheduler-private bookkeeping for one tracked (resource, sub-range) slice
/// during P3: which nodes currently hold the live access, and the
/// transition that produced it.
#[derive(Debug, Clone)]
pub struct AccessState {
    pub range: SubresourceRange,
    pub accessor_nodes: SmallVec<[NodeId; 4]>,
    pub last_transition: TransitionId,
}

impl AccessState {
    pub fn new(range: SubresourceRange, last_transition: TransitionId) -> Self {
        AccessState {
            range,
            accessor_nodes: SmallVec::new(),
            last_transition,
        }
    }

    pub fn push_accessor(&mut self, node: NodeId) {
        if self.accessor_nodes.last().copied() != Some(node) {
            self.accessor_nodes.push(node);
        }
    }
}

/// Outcome of `NeedTransition`: whether a transition must be inserted, and
/// if not, whether ordering must still be preserved and what the merged
/// access attr should become.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionDecision {
    pub needs_transition: bool,
    pub keep_ordering: bool,
    pub merged_access: AccessAttr,
    pub is_merged: bool,
}

/// One final-access entry (spec §4.3, "Final-access collection"): per
/// sub-range of a resource, the range and the transition that last wrote it.
#[derive(Debug, Clone, Copy)]
pub struct FinalAccessEntry {
    pub range: SubresourceRange,
    pub prev_transition: TransitionId,
}
