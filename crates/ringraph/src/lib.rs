//! # ringraph
//!
//! A declarative, node based GPU execution graph. Nodes declare typed image
//! and buffer endpoints, edges may carry a *delay* (a read of a previous
//! iteration's value), and a build derives everything else: the topological
//! schedule, one physical backing per output and delay step, the per-slot
//! resource tables, and the minimal barrier batches between nodes. Frames
//! execute under a fixed ring of in-flight slots, each owning its command
//! pool, profiler and semaphores.
//!
//! The graph never talks to a device directly. Everything it needs from the
//! GPU layer (allocation, command recording, timestamps) goes through the
//! [GraphApi] trait; queue submission stays with the caller, which receives
//! each frame's command buffer and semaphore lists through [GraphRun].

pub mod api;
pub mod connector;
mod graph;
pub mod node;
pub mod profiler;
mod resources;
mod ring;
mod run;
pub mod util;

#[cfg(test)]
pub(crate) mod test_api;

pub use api::{BufDesc, BufferBarrier, GraphApi, ImageBarrier, ImgDesc, Lifetime};
pub use connector::{
    BufferIn, BufferOut, ConnectorError, ConnectorKind, ImageIn, ImageOut, InputConnector,
    OutputConnector, ResolvedInput,
};
pub use graph::{ArgumentError, BuildError, Graph, GraphError, NodeKey, RunError};
pub use node::{Node, NodeIo, NodeStatus, RunInfo};
pub use profiler::{Profiler, ProfilerError, ProfilerReport, ReportEntry};
pub use ring::FrameTiming;
pub use run::GraphRun;
