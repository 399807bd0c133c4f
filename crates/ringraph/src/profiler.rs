use ahash::AHashMap;
use ash::vk;
use std::time::Instant;
use thiserror::Error;

use crate::api::GraphApi;

#[derive(Debug, Error)]
pub enum ProfilerError {
    #[error("timestamp query readback failed")]
    Collect(#[source] anyhow::Error),
}

struct Section {
    name: String,
    depth: u32,
    started: Option<Instant>,
    sum_ns: f64,
    sq_sum_ns: f64,
    captures: u64,
}

impl Section {
    fn new(name: &str, depth: u32) -> Self {
        Section {
            name: name.to_owned(),
            depth,
            started: None,
            sum_ns: 0.0,
            sq_sum_ns: 0.0,
            captures: 0,
        }
    }

    fn accumulate(&mut self, duration_ns: f64) {
        self.sum_ns += duration_ns;
        self.sq_sum_ns += duration_ns * duration_ns;
        self.captures += 1;
    }

    fn report_entry(&self) -> ReportEntry {
        let avg = self.sum_ns / self.captures.max(1) as f64;
        let var = (self.sq_sum_ns / self.captures.max(1) as f64 - avg * avg).max(0.0);
        ReportEntry {
            name: self.name.clone(),
            depth: self.depth,
            average_ms: avg / 1e6,
            std_deviation_ms: var.sqrt() / 1e6,
            captures: self.captures,
        }
    }
}

///Aggregated timing of one section.
#[derive(Clone, Debug)]
pub struct ReportEntry {
    pub name: String,
    pub depth: u32,
    pub average_ms: f64,
    pub std_deviation_ms: f64,
    pub captures: u64,
}

///Hierarchical CPU and GPU timing table.
#[derive(Clone, Debug, Default)]
pub struct ProfilerReport {
    pub cpu: Vec<ReportEntry>,
    pub gpu: Vec<ReportEntry>,
}

impl std::fmt::Display for ProfilerReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "CPU:")?;
        for entry in &self.cpu {
            writeln!(
                f,
                "{:indent$}{}: {:.4} (± {:.4}) ms",
                "",
                entry.name,
                entry.average_ms,
                entry.std_deviation_ms,
                indent = (entry.depth as usize) * 2
            )?;
        }
        writeln!(f, "GPU:")?;
        for entry in &self.gpu {
            writeln!(
                f,
                "{:indent$}{}: {:.4} (± {:.4}) ms",
                "",
                entry.name,
                entry.average_ms,
                entry.std_deviation_ms,
                indent = (entry.depth as usize) * 2
            )?;
        }
        Ok(())
    }
}

///Hierarchical frame profiler.
///
/// CPU sections are timed with [Instant], GPU sections with paired timestamp
/// queries recorded through the backend. Sections are keyed by `(depth,
/// name)`, so a section that repeats across frames accumulates into the same
/// entry, which yields mean and standard deviation over time.
///
/// GPU timing is frame-oriented: [Profiler::cmd_reset] arms the query pool
/// for a frame, [Profiler::collect] reads the results back once the frame
/// finished. As long as a previous frame's queries are unresolved the
/// profiler stays disarmed and GPU scopes report nothing.
pub struct Profiler<A: GraphApi> {
    query_pool: A::QueryPool,
    query_count: u32,

    cpu_sections: Vec<Section>,
    cpu_lookup: AHashMap<(u32, String), usize>,
    cpu_depth: u32,

    gpu_sections: Vec<Section>,
    gpu_lookup: AHashMap<(u32, String), usize>,
    gpu_depth: u32,

    ///Maps query index to (section, is_end) for the armed frame.
    pending: Vec<(usize, bool)>,
    armed: bool,
}

impl<A: GraphApi> Profiler<A> {
    ///Upper bound of GPU scopes per frame.
    pub const MAX_GPU_SCOPES: u32 = 64;

    pub fn new(api: &mut A) -> Result<Self, anyhow::Error> {
        let query_count = Self::MAX_GPU_SCOPES * 2;
        let query_pool = api.create_query_pool(query_count)?;
        Ok(Profiler {
            query_pool,
            query_count,
            cpu_sections: Vec::new(),
            cpu_lookup: AHashMap::default(),
            cpu_depth: 0,
            gpu_sections: Vec::new(),
            gpu_lookup: AHashMap::default(),
            gpu_depth: 0,
            pending: Vec::with_capacity(query_count as usize),
            armed: false,
        })
    }

    ///Arms GPU timing for a new frame by resetting the query pool. Returns
    /// `false` (and stays disarmed) while queries of a previous frame are
    /// still unresolved.
    pub fn cmd_reset(&mut self, api: &mut A, cmd: &mut A::Cmd) -> bool {
        if !self.pending.is_empty() {
            return false;
        }
        api.cmd_reset_queries(cmd, &mut self.query_pool, 0, self.query_count);
        self.armed = true;
        true
    }

    ///Starts a CPU section. The returned id must be passed to [Profiler::end].
    pub fn start(&mut self, name: &str) -> u32 {
        let depth = self.cpu_depth;
        let idx = match self.cpu_lookup.get(&(depth, name.to_owned())) {
            Some(idx) => *idx,
            None => {
                let idx = self.cpu_sections.len();
                self.cpu_sections.push(Section::new(name, depth));
                self.cpu_lookup.insert((depth, name.to_owned()), idx);
                idx
            }
        };
        self.cpu_sections[idx].started = Some(Instant::now());
        self.cpu_depth += 1;
        idx as u32
    }

    pub fn end(&mut self, id: u32) {
        let Some(section) = self.cpu_sections.get_mut(id as usize) else {
            #[cfg(feature = "logging")]
            log::error!("ended unknown cpu section {}", id);
            return;
        };
        if let Some(started) = section.started.take() {
            section.accumulate(started.elapsed().as_nanos() as f64);
        }
        self.cpu_depth = self.cpu_depth.saturating_sub(1);
    }

    ///Starts a GPU section by writing a timestamp at `stage`. Returns `None`
    /// if the profiler is disarmed or out of queries for this frame.
    pub fn cmd_start(
        &mut self,
        api: &mut A,
        cmd: &mut A::Cmd,
        name: &str,
        stage: vk::PipelineStageFlags2,
    ) -> Option<u32> {
        if !self.armed {
            return None;
        }
        if self.pending.len() as u32 >= self.query_count - 1 {
            #[cfg(feature = "logging")]
            log::warn!("out of timestamp queries, dropping gpu section '{}'", name);
            return None;
        }

        let depth = self.gpu_depth;
        let idx = match self.gpu_lookup.get(&(depth, name.to_owned())) {
            Some(idx) => *idx,
            None => {
                let idx = self.gpu_sections.len();
                self.gpu_sections.push(Section::new(name, depth));
                self.gpu_lookup.insert((depth, name.to_owned()), idx);
                idx
            }
        };

        let query = self.pending.len() as u32;
        api.cmd_write_timestamp(cmd, &mut self.query_pool, stage, query);
        self.pending.push((idx, false));
        self.gpu_depth += 1;

        Some(idx as u32)
    }

    ///Ends the GPU section `id` by writing the paired timestamp at `stage`.
    pub fn cmd_end(
        &mut self,
        api: &mut A,
        cmd: &mut A::Cmd,
        id: u32,
        stage: vk::PipelineStageFlags2,
    ) {
        if !self.armed || id as usize >= self.gpu_sections.len() {
            return;
        }
        if self.pending.len() as u32 >= self.query_count {
            #[cfg(feature = "logging")]
            log::warn!("out of timestamp queries, gpu section {} stays open", id);
            return;
        }
        let query = self.pending.len() as u32;
        api.cmd_write_timestamp(cmd, &mut self.query_pool, stage, query);
        self.pending.push((id as usize, true));
        self.gpu_depth = self.gpu_depth.saturating_sub(1);
    }

    ///Reads back the armed frame's timestamps and folds them into the
    /// section table. Without `wait` the frame is retained untouched when any
    /// query is still unresolved and picked up by a later collect.
    pub fn collect(&mut self, api: &mut A, wait: bool) -> Result<(), ProfilerError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let timestamps = api
            .get_timestamps(&mut self.query_pool, self.pending.len() as u32, wait)
            .map_err(ProfilerError::Collect)?;
        if timestamps.iter().take(self.pending.len()).any(|t| t.is_none()) {
            // frame not finished yet, try again later
            return Ok(());
        }

        let period = api.timestamp_period() as f64;
        let mut bounds: Vec<(Option<u64>, Option<u64>)> =
            vec![(None, None); self.gpu_sections.len()];
        for (query, (section, is_end)) in self.pending.iter().enumerate() {
            let ts = timestamps[query];
            if *is_end {
                bounds[*section].1 = ts;
            } else {
                bounds[*section].0 = ts;
            }
        }
        for (section, (start, end)) in self.gpu_sections.iter_mut().zip(bounds) {
            if let (Some(start), Some(end)) = (start, end) {
                section.accumulate(end.saturating_sub(start) as f64 * period);
            }
        }

        self.pending.clear();
        self.armed = false;
        Ok(())
    }

    ///Drops all accumulated sections.
    pub fn clear(&mut self) {
        self.cpu_sections.clear();
        self.cpu_lookup.clear();
        self.gpu_sections.clear();
        self.gpu_lookup.clear();
        self.cpu_depth = 0;
        self.gpu_depth = 0;
    }

    ///Mean and standard deviation per section, in creation order.
    pub fn report(&self) -> ProfilerReport {
        ProfilerReport {
            cpu: self
                .cpu_sections
                .iter()
                .filter(|s| s.captures > 0)
                .map(Section::report_entry)
                .collect(),
            gpu: self
                .gpu_sections
                .iter()
                .filter(|s| s.captures > 0)
                .map(Section::report_entry)
                .collect(),
        }
    }
}
