use std::time::Duration;

use crate::{api::GraphApi, profiler::Profiler};

///Wall-clock stamps of the last frame that used a slot.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameTiming {
    pub time_delta: Duration,
    pub elapsed: Duration,
    pub elapsed_since_connect: Duration,
}

///Per-slot state of the in-flight ring.
///
/// A slot is reused every `ring_size` frames. The caller must have awaited
/// the slot's `finished` timeline semaphore reaching `finished_value` before
/// the graph acquires it again; everything below relies on that.
pub(crate) struct InFlightData<A: GraphApi> {
    pub cmd_pool: A::CommandPool,
    pub profiler: Profiler<A>,

    ///Binary semaphore owned by this slot, free for the caller to wire up
    /// (e.g. swapchain present).
    pub binary_semaphore: A::Semaphore,
    ///Timeline semaphore signalled with `finished_value` by every frame that
    /// runs on this slot.
    pub finished_semaphore: A::Semaphore,
    pub finished_value: u64,

    ///Iteration of the last frame on this slot.
    pub iteration: u64,
    pub timing: FrameTiming,
}

impl<A: GraphApi> InFlightData<A> {
    pub fn new(api: &mut A) -> Result<Self, anyhow::Error> {
        Ok(InFlightData {
            cmd_pool: api.create_command_pool()?,
            profiler: Profiler::new(api)?,
            binary_semaphore: api.create_binary_semaphore()?,
            finished_semaphore: api.create_timeline_semaphore(0)?,
            finished_value: 0,
            iteration: 0,
            timing: FrameTiming::default(),
        })
    }
}
