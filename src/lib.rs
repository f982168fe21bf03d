//! Frame render-graph compiler.
//!
//! Turns a per-frame declarative description of GPU work -- nodes, their
//! resource accesses, explicit ordering constraints and subgraph grouping --
//! into a scheduled, queue-aware command stream: a topological order, a
//! minimal set of resource-state transition barriers, an aliased heap
//! layout for transient resources, and the runtime commands a thin backend
//! records into actual GPU command buffers.
//!
//! The eight compiler phases (see [`phases`]) run in a fixed order against a
//! [`render_graph::RenderGraph`] through [`render_graph::UpdateContext`].
//! Everything GPU-API-specific -- native resource/heap creation, barrier
//! submission, render-pass objects -- is reached only through the
//! [`backend::RuntimeBackend`] trait; this crate never touches a real
//! device.

#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate log;

pub mod access;
pub mod arena;
pub mod backend;
pub mod barrier;
pub mod cmd;
pub mod error;
pub mod format;
pub mod graph;
pub mod node;
pub mod phases;
pub mod render_graph;
pub mod resource;
pub mod runtime;
pub mod schedule_flags;
pub mod subresource;
pub mod transition;

#[cfg(any(test, feature = "test-util"))]
pub use backend::NullBackend;
pub use backend::RuntimeBackend;
pub use cmd::{CommandDecl, ExplicitDependency, FrameInput, UpdateFlags};
pub use error::{RgError, RgResult};
pub use render_graph::RenderGraph;
pub use schedule_flags::{DiagnosticFlags, ScheduleFlags};
