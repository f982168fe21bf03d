//! The eight phases of the compiler, run in this order by
//! [`crate::render_graph::RenderGraph::update`] and
//! [`crate::render_graph::RenderGraph::record`].

pub mod access_dag_build;
pub mod barrier_builder;
pub mod command_recorder;
pub mod dag_build;
pub mod lifetime;
pub mod memory_scheduler;
pub mod pre_process;
pub mod scheduler;
