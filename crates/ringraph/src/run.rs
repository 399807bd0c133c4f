use ash::vk;
use smallvec::SmallVec;
use std::time::Duration;

use crate::{api::GraphApi, profiler::Profiler, util::to_seconds};

type Callback<A> = Box<dyn FnOnce(&mut A)>;

///State of a single frame.
///
/// Returned by [Graph::run](crate::Graph::run) with the frame's recorded
/// command buffer. The caller submits that buffer together with the collected
/// wait/signal semaphores and afterwards fires the queued submit callbacks
/// through [GraphRun::execute_callbacks].
pub struct GraphRun<'graph, A: GraphApi> {
    pub(crate) cmd: A::Cmd,
    pub(crate) profiler: &'graph mut Profiler<A>,
    pub(crate) needs_reconnect: &'graph mut bool,

    pub(crate) iteration: u64,
    pub(crate) in_flight_index: u32,
    pub(crate) ring_size: u32,

    pub(crate) time_delta: Duration,
    pub(crate) elapsed: Duration,
    pub(crate) elapsed_since_connect: Duration,

    pub(crate) wait_semaphores: SmallVec<[A::Semaphore; 2]>,
    pub(crate) wait_values: SmallVec<[u64; 2]>,
    pub(crate) wait_stages: SmallVec<[vk::PipelineStageFlags2; 2]>,
    pub(crate) signal_semaphores: SmallVec<[A::Semaphore; 2]>,
    pub(crate) signal_values: SmallVec<[u64; 2]>,

    pub(crate) submit_callbacks: Vec<Callback<A>>,
}

impl<A: GraphApi> std::fmt::Debug for GraphRun<'_, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphRun")
            .field("iteration", &self.iteration)
            .field("in_flight_index", &self.in_flight_index)
            .field("ring_size", &self.ring_size)
            .field("time_delta", &self.time_delta)
            .finish_non_exhaustive()
    }
}

impl<'graph, A: GraphApi> GraphRun<'graph, A> {
    pub(crate) fn new(
        cmd: A::Cmd,
        profiler: &'graph mut Profiler<A>,
        needs_reconnect: &'graph mut bool,
        iteration: u64,
        in_flight_index: u32,
        ring_size: u32,
        time_delta: Duration,
        elapsed: Duration,
        elapsed_since_connect: Duration,
    ) -> Self {
        GraphRun {
            cmd,
            profiler,
            needs_reconnect,
            iteration,
            in_flight_index,
            ring_size,
            time_delta,
            elapsed,
            elapsed_since_connect,
            wait_semaphores: SmallVec::new(),
            wait_values: SmallVec::new(),
            wait_stages: SmallVec::new(),
            signal_semaphores: SmallVec::new(),
            signal_values: SmallVec::new(),
            submit_callbacks: Vec::new(),
        }
    }

    ///The frame's command buffer, in recording state.
    pub fn cmd(&self) -> &A::Cmd {
        &self.cmd
    }

    pub fn cmd_mut(&mut self) -> &mut A::Cmd {
        &mut self.cmd
    }

    ///Iterations since the last (re)build.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    ///In-flight slot of this frame, cycling `0..ring_size`. It is guaranteed
    /// that the previous frame on this slot has finished.
    pub fn in_flight_index(&self) -> u32 {
        self.in_flight_index
    }

    ///Number of frames that may be in flight at any time.
    pub fn ring_size(&self) -> u32 {
        self.ring_size
    }

    ///Profiler of this frame's in-flight slot.
    pub fn profiler(&mut self) -> &mut Profiler<A> {
        self.profiler
    }

    ///Time since the previous frame.
    pub fn time_delta(&self) -> Duration {
        self.time_delta
    }

    pub fn time_delta_secs(&self) -> f64 {
        to_seconds(self.time_delta)
    }

    ///Time since graph creation.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn elapsed_secs(&self) -> f64 {
        to_seconds(self.elapsed)
    }

    ///Time since the last (re)build.
    pub fn elapsed_since_connect(&self) -> Duration {
        self.elapsed_since_connect
    }

    pub fn elapsed_since_connect_secs(&self) -> f64 {
        to_seconds(self.elapsed_since_connect)
    }

    ///Rebuilds the graph before the next frame executes.
    pub fn request_reconnect(&mut self) {
        *self.needs_reconnect = true;
    }

    ///Makes the submit wait on a binary semaphore at `stage`.
    pub fn add_wait_semaphore(&mut self, semaphore: A::Semaphore, stage: vk::PipelineStageFlags2) {
        self.wait_semaphores.push(semaphore);
        self.wait_values.push(0);
        self.wait_stages.push(stage);
    }

    ///Makes the submit wait on a timeline semaphore reaching `value`.
    pub fn add_wait_timeline_semaphore(
        &mut self,
        semaphore: A::Semaphore,
        stage: vk::PipelineStageFlags2,
        value: u64,
    ) {
        self.wait_semaphores.push(semaphore);
        self.wait_values.push(value);
        self.wait_stages.push(stage);
    }

    ///Signals a binary semaphore when the frame finished.
    pub fn add_signal_semaphore(&mut self, semaphore: A::Semaphore) {
        self.signal_semaphores.push(semaphore);
        self.signal_values.push(0);
    }

    ///Signals a timeline semaphore with `value` when the frame finished.
    pub fn add_signal_timeline_semaphore(&mut self, semaphore: A::Semaphore, value: u64) {
        self.signal_semaphores.push(semaphore);
        self.signal_values.push(value);
    }

    ///Add these to the submit of the frame's command buffer.
    pub fn wait_semaphores(&self) -> &[A::Semaphore] {
        &self.wait_semaphores
    }

    ///Wait values matching [GraphRun::wait_semaphores]; binary entries are 0.
    pub fn wait_values(&self) -> &[u64] {
        &self.wait_values
    }

    pub fn wait_stages(&self) -> &[vk::PipelineStageFlags2] {
        &self.wait_stages
    }

    pub fn signal_semaphores(&self) -> &[A::Semaphore] {
        &self.signal_semaphores
    }

    ///Signal values matching [GraphRun::signal_semaphores]; binary entries are 0.
    pub fn signal_values(&self) -> &[u64] {
        &self.signal_values
    }

    ///Runs work after the caller submitted the frame. Callbacks fire in
    /// registration order.
    pub fn add_submit_callback(&mut self, callback: impl FnOnce(&mut A) + 'static) {
        self.submit_callbacks.push(Box::new(callback));
    }

    ///Fires all queued submit callbacks in FIFO order. Call this directly
    /// after submitting the frame's command buffer; returns that buffer.
    pub fn execute_callbacks(mut self, api: &mut A) -> A::Cmd {
        for callback in self.submit_callbacks.drain(..) {
            callback(api);
        }
        self.cmd
    }
}
