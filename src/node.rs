//! Graph vertices, edges and subgraph grouping.

use crate::arena::Span;

pub type NodeId = u32;
pub type EdgeId = u32;
pub type SubgraphId = u32;
pub type TransitionId = u32;

pub const SUBGRAPH_NONE: SubgraphId = 0xFFFF_FFFF;

/// Either a user command or a transition inserted by P3. Kept as an enum
/// rather than the design note's negative-index encoding: the source
/// material used negative node ids to multiplex a single array because its
/// host language had no sum type cheap enough; Rust does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Command(u32),
    Transition(TransitionId),
}

impl NodeKind {
    pub fn is_transition(self) -> bool {
        matches!(self, NodeKind::Transition(_))
    }

    pub fn cmd_id(self) -> Option<u32> {
        match self {
            NodeKind::Command(id) => Some(id),
            NodeKind::Transition(_) => None,
        }
    }

    pub fn transition_id(self) -> Option<TransitionId> {
        match self {
            NodeKind::Transition(id) => Some(id),
            NodeKind::Command(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Node {
    pub kind: NodeKind,
    pub in_edges: Span<EdgeId>,
    pub out_edges: Span<EdgeId>,
    pub subgraph: SubgraphId,
    pub barrier_scope: u32,
    pub can_be_eliminated: bool,
}

impl Node {
    pub fn new_command(cmd_id: u32, subgraph: SubgraphId, barrier_scope: u32) -> Self {
        Node {
            kind: NodeKind::Command(cmd_id),
            in_edges: Span::empty(),
            out_edges: Span::empty(),
            subgraph,
            barrier_scope,
            can_be_eliminated: false,
        }
    }

    pub fn new_transition(
        transition_id: TransitionId,
        subgraph: SubgraphId,
        barrier_scope: u32,
    ) -> Self {
        Node {
            kind: NodeKind::Transition(transition_id),
            in_edges: Span::empty(),
            out_edges: Span::empty(),
            subgraph,
            barrier_scope,
            can_be_eliminated: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub src: NodeId,
    pub dst: NodeId,
}

bitflags! {
    #[derive(Default)]
    pub struct SubgraphFlags: u8 {
        /// Nested nodes must be scheduled contiguously.
        const ATOMIC     = 1 << 0;
        /// Children are linked in declaration order via synthetic edges.
        const SEQUENTIAL = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Subgraph {
    pub parent_subgraph: SubgraphId,
    pub begin_node: NodeId,
    pub end_node: NodeId,
    pub flags: SubgraphFlags,
}

impl Subgraph {
    pub fn is_atomic(&self) -> bool {
        self.flags.contains(SubgraphFlags::ATOMIC)
    }

    pub fn is_sequential(&self) -> bool {
        self.flags.contains(SubgraphFlags::SEQUENTIAL)
    }
}
