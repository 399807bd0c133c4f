use ash::vk;
use fxhash::FxHashMap;
use slotmap::SlotMap;
use smallvec::SmallVec;
use std::time::Instant;
use thiserror::Error;

use crate::{
    api::{BufferBarrier, GraphApi, ImageBarrier},
    connector::{ConnectorError, ConnectorKind, InputConnector, OutputConnector},
    node::{Node, NodeIo, RunInfo},
    profiler::Profiler,
    resources::{BufferRes, BufferResKey, ImageRes, ImageResKey},
    ring::{FrameTiming, InFlightData},
    run::GraphRun,
};

pub(crate) mod scheduler;
pub(crate) mod sets;

#[cfg(test)]
mod tests;

slotmap::new_key_type!(
    ///Handle of a node inside a [Graph].
    pub struct NodeKey;
);

///Errors of the node/connect surface. The graph is left unchanged when one
/// of these is returned.
#[derive(Debug, Error)]
pub enum ArgumentError {
    #[error("graph already contains a node named '{0}'")]
    NameTaken(String),

    #[error("node key is not part of this graph")]
    UnknownNode,

    #[error("there is no input {index} on node '{node}'")]
    NoSuchInput { node: String, index: usize },

    #[error("input {index} of node '{node}' is already connected")]
    AlreadyConnected { node: String, index: usize },

    #[error("inputs {first} and {second} of node '{dst}' would read image output {output} of node '{src}' with the same delay {delay}")]
    SameDelayImageRead {
        src: String,
        output: usize,
        dst: String,
        first: usize,
        second: usize,
        delay: u32,
    },
}

///Errors of the build sequence. A failed build leaves the previously built
/// topology (if any) untouched and usable.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("input '{input}' ({index}) of node '{node}' was not connected")]
    UnconnectedInput {
        node: String,
        input: String,
        index: usize,
    },

    #[error("node '{node}' is connected to itself with delay 0, maybe you want a persistent output?")]
    ZeroDelaySelfLoop { node: String },

    #[error("undelayed graph is not acyclic: {src} -> {dst}")]
    UndelayedCycle { src: String, dst: String },

    #[error("could only schedule {scheduled} of {total} nodes, the undelayed graph is cyclic or has unreachable nodes")]
    GraphNotSchedulable { scheduled: usize, total: usize },

    #[error("output index {index} is invalid for node '{node}'")]
    InvalidOutputIndex { node: String, index: usize },

    #[error("persistent output '{output}' of node '{src}' cannot be read with delay > 0 by input {input} of node '{dst}'")]
    PersistentDelayedRead {
        src: String,
        output: String,
        dst: String,
        input: usize,
    },

    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error("resource allocation failed")]
    Allocation(#[source] anyhow::Error),

    #[error("building node '{node}' failed")]
    Node {
        node: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("backend error")]
    Api(#[source] anyhow::Error),
}

///Errors of frame execution. The frame's command buffer must be discarded,
/// nothing of the failed frame may be submitted.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("graph rebuild failed")]
    Build(#[from] BuildError),

    #[error("processing node '{node}' failed")]
    Node {
        node: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("backend error")]
    Api(#[source] anyhow::Error),
}

///Top level error type.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error(transparent)]
    Argument(#[from] ArgumentError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error("backend error")]
    Api(#[from] anyhow::Error),
}

///A buffered edge. `kind` records through which entry point the edge was
/// made, so a mismatched pairing can be reported at build time.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Connection {
    pub src: NodeKey,
    pub src_output: usize,
    pub kind: ConnectorKind,
}

///Physical backings of one output, one entry per copy.
pub(crate) enum Backing {
    Images(Vec<ImageResKey>),
    Buffers(Vec<BufferResKey>),
}

impl Backing {
    pub fn copies(&self) -> usize {
        match self {
            Backing::Images(keys) => keys.len(),
            Backing::Buffers(keys) => keys.len(),
        }
    }
}

///All barriers a node needs before it runs in one slot, merged into a single
/// dependency submission.
pub(crate) struct BarrierBatch<A: GraphApi> {
    pub images: SmallVec<[ImageBarrier<A::Image>; 4]>,
    pub buffers: SmallVec<[BufferBarrier<A::Buffer>; 4]>,
}

impl<A: GraphApi> BarrierBatch<A> {
    fn new() -> Self {
        BarrierBatch {
            images: SmallVec::new(),
            buffers: SmallVec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.buffers.is_empty()
    }
}

pub(crate) struct NodeData<A: GraphApi> {
    pub name: String,
    pub order: usize,
    pub node: Box<dyn Node<A>>,

    ///Input endpoints, fixed at `add_node`.
    pub inputs: Vec<InputConnector>,
    ///One entry per input, `None` until connected.
    pub input_connections: Vec<Option<Connection>>,
    ///Sinks per output index, grown while connecting (output count is only
    /// known at build).
    pub output_connections: Vec<Vec<(NodeKey, usize)>>,

    // per-build results
    pub outputs: Vec<OutputConnector>,
    pub backings: Vec<Backing>,
    pub sets: Vec<NodeIo<A>>,
    pub batches: Vec<BarrierBatch<A>>,
}

///Declarative node execution graph.
///
/// Nodes are added and wired up front; `connect_*` only buffers edges. A
/// build derives the topological schedule, allocates every output backing
/// (`max_delay + 1` copies per output) and precomputes per-slot resource
/// tables and barrier batches. [Graph::run] then records one frame into a
/// command buffer under the in-flight ring discipline and hands it to the
/// caller for submission.
pub struct Graph<A: GraphApi> {
    pub(crate) nodes: SlotMap<NodeKey, NodeData<A>>,
    names: FxHashMap<String, NodeKey>,
    pub(crate) topology: Vec<NodeKey>,

    pub(crate) images: SlotMap<ImageResKey, ImageRes<A>>,
    pub(crate) buffers: SlotMap<BufferResKey, BufferRes<A>>,

    ring: Vec<InFlightData<A>>,
    ///Frames since graph creation, drives the in-flight ring.
    run_count: u64,
    ///Iterations since the last build.
    iteration: u64,
    rebuild_requested: bool,

    created: Instant,
    connected: Instant,
    last_run: Option<Instant>,
}

impl<A: GraphApi> Graph<A> {
    pub fn new(api: &mut A, ring_size: u32) -> Result<Self, GraphError> {
        let ring_size = ring_size.max(1);
        let mut ring = Vec::with_capacity(ring_size as usize);
        for _ in 0..ring_size {
            ring.push(InFlightData::new(api)?);
        }
        let now = Instant::now();
        Ok(Graph {
            nodes: SlotMap::with_key(),
            names: FxHashMap::default(),
            topology: Vec::new(),
            images: SlotMap::with_key(),
            buffers: SlotMap::with_key(),
            ring,
            run_count: 0,
            iteration: 0,
            rebuild_requested: true,
            created: now,
            connected: now,
            last_run: None,
        })
    }

    ///Adds `node` under the unique `name`. Inputs are queried once here,
    /// outputs are derived at build time.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        node: impl Node<A> + 'static,
    ) -> Result<NodeKey, ArgumentError> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(ArgumentError::NameTaken(name));
        }

        let inputs = node.describe_inputs();
        let input_connections = vec![None; inputs.len()];
        let order = self.nodes.len();
        let key = self.nodes.insert(NodeData {
            name: name.clone(),
            order,
            node: Box::new(node),
            inputs,
            input_connections,
            output_connections: Vec::new(),
            outputs: Vec::new(),
            backings: Vec::new(),
            sets: Vec::new(),
            batches: Vec::new(),
        });
        self.names.insert(name, key);
        self.rebuild_requested = true;

        Ok(key)
    }

    pub fn node_key(&self, name: &str) -> Option<NodeKey> {
        self.names.get(name).copied()
    }

    pub fn node_name(&self, key: NodeKey) -> Option<&str> {
        self.nodes.get(key).map(|d| d.name.as_str())
    }

    ///Connects image output `src_output` of `src` to image input `dst_input`
    /// of `dst`. Buffered until the next build.
    pub fn connect_image(
        &mut self,
        src: NodeKey,
        dst: NodeKey,
        src_output: usize,
        dst_input: usize,
    ) -> Result<(), ArgumentError> {
        self.check_sink(src, dst, dst_input)?;

        // Two sinks of the same consumer on one image output must differ in
        // delay, otherwise they would demand two layouts of one backing at
        // the same time.
        let new_delay = self.nodes[dst].inputs[dst_input].delay();
        if let Some(sinks) = self.nodes[src].output_connections.get(src_output) {
            for &(sink_node, sink_input) in sinks {
                if sink_node == dst && self.nodes[dst].inputs[sink_input].delay() == new_delay {
                    return Err(ArgumentError::SameDelayImageRead {
                        src: self.nodes[src].name.clone(),
                        output: src_output,
                        dst: self.nodes[dst].name.clone(),
                        first: sink_input,
                        second: dst_input,
                        delay: new_delay,
                    });
                }
            }
        }

        self.record_connection(src, dst, src_output, dst_input, ConnectorKind::Image);
        Ok(())
    }

    ///Connects buffer output `src_output` of `src` to buffer input
    /// `dst_input` of `dst`. Buffered until the next build.
    pub fn connect_buffer(
        &mut self,
        src: NodeKey,
        dst: NodeKey,
        src_output: usize,
        dst_input: usize,
    ) -> Result<(), ArgumentError> {
        self.check_sink(src, dst, dst_input)?;
        self.record_connection(src, dst, src_output, dst_input, ConnectorKind::Buffer);
        Ok(())
    }

    fn check_sink(&self, src: NodeKey, dst: NodeKey, dst_input: usize) -> Result<(), ArgumentError> {
        if !self.nodes.contains_key(src) || !self.nodes.contains_key(dst) {
            return Err(ArgumentError::UnknownNode);
        }
        let dst_data = &self.nodes[dst];
        if dst_input >= dst_data.inputs.len() {
            return Err(ArgumentError::NoSuchInput {
                node: dst_data.name.clone(),
                index: dst_input,
            });
        }
        if dst_data.input_connections[dst_input].is_some() {
            return Err(ArgumentError::AlreadyConnected {
                node: dst_data.name.clone(),
                index: dst_input,
            });
        }
        Ok(())
    }

    fn record_connection(
        &mut self,
        src: NodeKey,
        dst: NodeKey,
        src_output: usize,
        dst_input: usize,
        kind: ConnectorKind,
    ) {
        self.nodes[dst].input_connections[dst_input] = Some(Connection {
            src,
            src_output,
            kind,
        });
        let outputs = &mut self.nodes[src].output_connections;
        if src_output >= outputs.len() {
            outputs.resize_with(src_output + 1, Vec::new);
        }
        outputs[src_output].push((dst, dst_input));
        self.rebuild_requested = true;
    }

    ///Rebuilds the graph at the beginning of the next frame.
    pub fn request_rebuild(&mut self) {
        self.rebuild_requested = true;
    }

    pub fn ring_size(&self) -> u32 {
        self.ring.len() as u32
    }

    ///Iterations since the last build.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    ///Timeline semaphore of an in-flight slot and the value the slot's most
    /// recent frame signals. Await that value before the slot comes around
    /// again.
    pub fn slot_finished(&self, in_flight_index: u32) -> (&A::Semaphore, u64) {
        let slot = &self.ring[in_flight_index as usize];
        (&slot.finished_semaphore, slot.finished_value)
    }

    ///Binary semaphore owned by an in-flight slot, free for caller use.
    pub fn slot_binary_semaphore(&self, in_flight_index: u32) -> &A::Semaphore {
        &self.ring[in_flight_index as usize].binary_semaphore
    }

    ///Wall-clock stamps of the last frame that ran on a slot.
    pub fn slot_timing(&self, in_flight_index: u32) -> FrameTiming {
        self.ring[in_flight_index as usize].timing
    }

    ///Iteration of the last frame that ran on a slot.
    pub fn slot_iteration(&self, in_flight_index: u32) -> u64 {
        self.ring[in_flight_index as usize].iteration
    }

    ///Profiler of an in-flight slot.
    pub fn profiler(&mut self, in_flight_index: u32) -> &mut Profiler<A> {
        &mut self.ring[in_flight_index as usize].profiler
    }

    ///(Re)builds the graph: waits for quiescence, derives the schedule,
    /// allocates backings, precomputes slot tables and barrier batches, and
    /// records warm-up transitions plus the nodes' build hooks into `cmd`.
    /// The caller submits `cmd` before the first frame runs.
    pub fn build(&mut self, api: &mut A, cmd: &mut A::Cmd) -> Result<(), BuildError> {
        self.build_with(api, cmd)
    }

    fn build_with(&mut self, api: &mut A, cmd: &mut A::Cmd) -> Result<(), BuildError> {
        api.wait_idle().map_err(BuildError::Api)?;

        if self.nodes.is_empty() {
            self.topology.clear();
            self.iteration = 0;
            self.connected = Instant::now();
            self.rebuild_requested = false;
            return Ok(());
        }

        self.validate_inputs()?;
        let topology = self.schedule()?;
        let allocation = self.allocate_outputs(api, &topology)?;

        // Everything fallible up to the node build hooks is done, commit.
        let scheduler::Topology { order, mut outputs } = topology;
        self.topology = order;
        self.images = allocation.images;
        self.buffers = allocation.buffers;
        let mut backings = allocation.backings;
        for (key, data) in self.nodes.iter_mut() {
            data.outputs = outputs.remove(key).unwrap_or_default();
            data.backings = backings.remove(key).unwrap_or_default();
            data.output_connections
                .resize_with(data.outputs.len(), Vec::new);
            data.sets.clear();
            data.batches.clear();
        }

        self.prepare_resource_sets();

        // First pass over the slot cycle: record the warm-up transitions that
        // bring every backing into its periodic state and give the nodes
        // their new resource tables.
        let topo = self.topology.clone();
        for &key in &topo {
            let set_count = self.nodes[key].sets.len();
            for set_index in 0..set_count {
                let batch = sets::barrier_batch_for(
                    &self.nodes,
                    &mut self.images,
                    &mut self.buffers,
                    key,
                    set_index,
                );
                if !batch.is_empty() {
                    api.cmd_barriers(cmd, &batch.images, &batch.buffers);
                }
            }
            let data = self.nodes.get_mut(key).unwrap();
            let NodeData {
                node, sets, name, ..
            } = data;
            node.build(api, cmd, sets).map_err(|e| BuildError::Node {
                node: name.clone(),
                source: e,
            })?;
        }

        // Second pass: the cycle is periodic now, these batches are the ones
        // every frame replays.
        for &key in &topo {
            let set_count = self.nodes[key].sets.len();
            let batches = (0..set_count)
                .map(|set_index| {
                    sets::barrier_batch_for(
                        &self.nodes,
                        &mut self.images,
                        &mut self.buffers,
                        key,
                        set_index,
                    )
                })
                .collect();
            self.nodes.get_mut(key).unwrap().batches = batches;
        }

        self.iteration = 0;
        self.connected = Instant::now();
        self.rebuild_requested = false;

        #[cfg(feature = "logging")]
        self.log_connections();

        Ok(())
    }

    #[cfg(feature = "logging")]
    fn log_connections(&self) {
        for &key in &self.topology {
            let data = &self.nodes[key];
            for (out_idx, sinks) in data.output_connections.iter().enumerate() {
                let out_name = data.outputs.get(out_idx).map(|o| o.name()).unwrap_or("?");
                for &(dst, dst_input) in sinks {
                    let dst_data = &self.nodes[dst];
                    let in_conn = &dst_data.inputs[dst_input];
                    log::debug!(
                        "connection: {}({}) --{}-> {}({})",
                        data.name,
                        out_name,
                        in_conn.delay(),
                        dst_data.name,
                        in_conn.name()
                    );
                }
            }
        }
    }

    ///Records one frame.
    ///
    /// Acquires the next in-flight slot (the caller must have awaited the
    /// slot's previous [Graph::slot_finished] value), pre-processes all
    /// nodes, honours rebuild requests, and records every node's barrier
    /// batch and `process` hook into a fresh command buffer. The returned
    /// [GraphRun] carries that buffer plus the wait/signal semaphores and
    /// submit callbacks for the caller's queue submission.
    pub fn run(&mut self, api: &mut A) -> Result<GraphRun<'_, A>, RunError> {
        let ring_size = self.ring.len() as u32;
        let slot_index = (self.run_count % ring_size as u64) as usize;

        let now = Instant::now();
        let time_delta = self.last_run.map(|t| now - t).unwrap_or_default();
        self.last_run = Some(now);
        let elapsed = now - self.created;

        // Collect the timings of the frame that ran on this slot previously.
        // Failing collection only mutes profiling, never the frame.
        #[allow(unused_variables)]
        if let Err(e) = self.ring[slot_index].profiler.collect(api, false) {
            #[cfg(feature = "logging")]
            log::warn!("profiler collection failed: {}", e);
        }

        api.reset_command_pool(&mut self.ring[slot_index].cmd_pool)
            .map_err(RunError::Api)?;
        let mut cmd = api
            .allocate_command_buffer(&mut self.ring[slot_index].cmd_pool)
            .map_err(RunError::Api)?;
        self.ring[slot_index].profiler.cmd_reset(api, &mut cmd);

        // Pre-process pass: every node may request a rebuild or skip itself.
        let info = RunInfo {
            iteration: self.iteration,
            time_delta,
            elapsed,
            elapsed_since_connect: now - self.connected,
        };
        let topo = self.topology.clone();
        let mut skip = vec![false; topo.len()];
        let mut rebuild = self.rebuild_requested;
        let pre_scope = self.ring[slot_index].profiler.start("pre process");
        for (i, &key) in topo.iter().enumerate() {
            let data = self.nodes.get_mut(key).unwrap();
            let node_scope = self.ring[slot_index].profiler.start(&data.name);
            let status = data.node.pre_process(&info);
            self.ring[slot_index].profiler.end(node_scope);
            rebuild |= status.request_rebuild;
            skip[i] = status.skip_run;
        }
        self.ring[slot_index].profiler.end(pre_scope);

        if rebuild {
            self.build_with(api, &mut cmd)?;
            // stale: the schedule may have changed
            skip.clear();
            skip.resize(self.topology.len(), false);
        }
        let elapsed_since_connect = now.max(self.connected) - self.connected;

        let Graph {
            nodes,
            topology,
            ring,
            run_count,
            iteration,
            rebuild_requested,
            ..
        } = self;
        let InFlightData {
            profiler,
            binary_semaphore: _,
            finished_semaphore,
            finished_value,
            iteration: slot_iteration,
            timing,
            ..
        } = &mut ring[slot_index];

        let mut run = GraphRun::new(
            cmd,
            profiler,
            rebuild_requested,
            *iteration,
            slot_index as u32,
            ring_size,
            time_delta,
            elapsed,
            elapsed_since_connect,
        );

        let frame_scope = run.profiler.cmd_start(
            api,
            &mut run.cmd,
            "graph",
            vk::PipelineStageFlags2::TOP_OF_PIPE,
        );

        for (i, &key) in topology.iter().enumerate() {
            let data = nodes.get_mut(key).unwrap();
            let NodeData {
                node,
                sets,
                batches,
                name,
                ..
            } = data;
            let set_index = (run.iteration % sets.len() as u64) as usize;

            let node_scope = run.profiler.cmd_start(
                api,
                &mut run.cmd,
                name,
                vk::PipelineStageFlags2::TOP_OF_PIPE,
            );

            let batch = &batches[set_index];
            if !batch.is_empty() {
                api.cmd_barriers(&mut run.cmd, &batch.images, &batch.buffers);
            }

            if !skip[i] {
                node.process(api, &mut run, &sets[set_index])
                    .map_err(|e| RunError::Node {
                        node: name.clone(),
                        source: e,
                    })?;
            }

            if let Some(id) = node_scope {
                run.profiler.cmd_end(
                    api,
                    &mut run.cmd,
                    id,
                    vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
                );
            }
        }

        if let Some(id) = frame_scope {
            run.profiler.cmd_end(
                api,
                &mut run.cmd,
                id,
                vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
            );
        }

        *finished_value += 1;
        run.add_signal_timeline_semaphore(finished_semaphore.clone(), *finished_value);
        *slot_iteration = *iteration;
        *timing = FrameTiming {
            time_delta,
            elapsed,
            elapsed_since_connect,
        };

        *iteration += 1;
        *run_count += 1;

        Ok(run)
    }
}
