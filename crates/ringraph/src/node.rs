use std::time::Duration;

use crate::{
    api::GraphApi,
    connector::{InputConnector, OutputConnector, ResolvedInput},
    run::GraphRun,
};

///Flags a node can raise during pre-processing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NodeStatus {
    ///Requests a full rebuild of the graph before any node of this frame is
    /// processed.
    pub request_rebuild: bool,
    ///Skips this node's `process` hook for the frame. Its barriers are still
    /// recorded so the resource state keeps cycling.
    pub skip_run: bool,
}

///Frame timing snapshot handed to `pre_process`.
#[derive(Clone, Copy, Debug)]
pub struct RunInfo {
    ///Iterations since the last (re)build.
    pub iteration: u64,
    ///Time since the previous frame.
    pub time_delta: Duration,
    ///Time since graph creation.
    pub elapsed: Duration,
    ///Time since the last (re)build.
    pub elapsed_since_connect: Duration,
}

///The physical backings a node sees in one resource-set slot.
///
/// Handles appear in declaration order of the node's connectors, split by
/// kind: the i-th image input of `describe_inputs` is `input_images[i]`, the
/// i-th buffer input is `input_buffers[i]`, and likewise for outputs.
pub struct NodeIo<A: GraphApi> {
    pub set_index: u32,
    pub input_images: Vec<A::Image>,
    pub input_buffers: Vec<A::Buffer>,
    pub output_images: Vec<A::Image>,
    pub output_buffers: Vec<A::Buffer>,
}

///A processing step of the graph.
///
/// Nodes declare their endpoints, are wired up through
/// [Graph::connect_image](crate::Graph::connect_image) /
/// [Graph::connect_buffer](crate::Graph::connect_buffer), and record their
/// GPU work in `process` each frame. They never own graph resources, all
/// backings are handed in per slot.
pub trait Node<A: GraphApi> {
    ///Input endpoints of this node. Called once when the node is added.
    fn describe_inputs(&self) -> Vec<InputConnector> {
        Vec::new()
    }

    ///Output endpoints, derived from the outputs this node's inputs are
    /// connected to (enables format and extent inference). Delayed inputs
    /// resolve to [ResolvedInput::Feedback]. Called once per build, in
    /// topological order.
    fn describe_outputs(&mut self, inputs: &[ResolvedInput]) -> Vec<OutputConnector>;

    ///Called every frame before any node is processed. May request a rebuild
    /// or skip this node's `process` for the frame.
    fn pre_process(&mut self, info: &RunInfo) -> NodeStatus {
        let _ = info;
        NodeStatus::default()
    }

    ///Called once per build with the complete per-slot resource tables, after
    /// all backings were allocated. This is the point to (re)write descriptor
    /// sets or other derived state, the tables stay valid until the next
    /// build.
    fn build(
        &mut self,
        api: &mut A,
        cmd: &mut A::Cmd,
        io: &[NodeIo<A>],
    ) -> Result<(), anyhow::Error> {
        let _ = (api, cmd, io);
        Ok(())
    }

    ///Records this node's work for the current frame. The matching barrier
    /// batch was already recorded, `io` is the slot table selected for this
    /// iteration.
    fn process(
        &mut self,
        api: &mut A,
        run: &mut GraphRun<'_, A>,
        io: &NodeIo<A>,
    ) -> Result<(), anyhow::Error>;
}
