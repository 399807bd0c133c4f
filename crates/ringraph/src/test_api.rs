use ash::vk;

use crate::api::{BufDesc, BufferBarrier, GraphApi, ImageBarrier, ImgDesc, Lifetime};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestImage(pub u64);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestBuffer(pub u64);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestSemaphore(pub u64);

pub struct TestCommandPool {
    pub resets: u32,
}

pub struct TestQueryPool {
    pub query_count: u32,
    pub resets: u32,
}

///One recorded dependency submission.
pub struct RecordedBatch {
    pub images: Vec<ImageBarrier<TestImage>>,
    pub buffers: Vec<BufferBarrier<TestBuffer>>,
}

///Command buffer stand-in that keeps everything recorded into it.
#[derive(Default)]
pub struct TestCmd {
    pub batches: Vec<RecordedBatch>,
    pub timestamps: Vec<(vk::PipelineStageFlags2, u32)>,
}

pub struct AllocationRecord {
    pub name: String,
    pub lifetime: Lifetime,
    pub image_desc: Option<ImgDesc>,
    pub buffer_desc: Option<BufDesc>,
}

///Backend double: hands out numbered handles, counts allocations and lets
/// tests inspect every barrier batch through the recorded command buffers.
#[derive(Default)]
pub struct TestApi {
    next_handle: u64,
    pub allocations: Vec<AllocationRecord>,
    pub wait_idle_calls: u32,
    timestamp_clock: u64,
}

impl TestApi {
    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    pub fn image_allocations(&self) -> usize {
        self.allocations.iter().filter(|a| a.image_desc.is_some()).count()
    }
}

impl GraphApi for TestApi {
    type Image = TestImage;
    type Buffer = TestBuffer;
    type Cmd = TestCmd;
    type CommandPool = TestCommandPool;
    type Semaphore = TestSemaphore;
    type QueryPool = TestQueryPool;

    fn wait_idle(&mut self) -> Result<(), anyhow::Error> {
        self.wait_idle_calls += 1;
        Ok(())
    }

    fn create_image(
        &mut self,
        desc: &ImgDesc,
        lifetime: Lifetime,
        name: &str,
    ) -> Result<Self::Image, anyhow::Error> {
        self.allocations.push(AllocationRecord {
            name: name.to_owned(),
            lifetime,
            image_desc: Some(desc.clone()),
            buffer_desc: None,
        });
        Ok(TestImage(self.handle()))
    }

    fn create_buffer(
        &mut self,
        desc: &BufDesc,
        lifetime: Lifetime,
        name: &str,
    ) -> Result<Self::Buffer, anyhow::Error> {
        self.allocations.push(AllocationRecord {
            name: name.to_owned(),
            lifetime,
            image_desc: None,
            buffer_desc: Some(desc.clone()),
        });
        Ok(TestBuffer(self.handle()))
    }

    fn create_command_pool(&mut self) -> Result<Self::CommandPool, anyhow::Error> {
        Ok(TestCommandPool { resets: 0 })
    }

    fn reset_command_pool(&mut self, pool: &mut Self::CommandPool) -> Result<(), anyhow::Error> {
        pool.resets += 1;
        Ok(())
    }

    fn allocate_command_buffer(
        &mut self,
        _pool: &mut Self::CommandPool,
    ) -> Result<Self::Cmd, anyhow::Error> {
        Ok(TestCmd::default())
    }

    fn create_binary_semaphore(&mut self) -> Result<Self::Semaphore, anyhow::Error> {
        Ok(TestSemaphore(self.handle()))
    }

    fn create_timeline_semaphore(
        &mut self,
        _initial_value: u64,
    ) -> Result<Self::Semaphore, anyhow::Error> {
        Ok(TestSemaphore(self.handle()))
    }

    fn cmd_barriers(
        &mut self,
        cmd: &mut Self::Cmd,
        images: &[ImageBarrier<Self::Image>],
        buffers: &[BufferBarrier<Self::Buffer>],
    ) {
        cmd.batches.push(RecordedBatch {
            images: images.to_vec(),
            buffers: buffers.to_vec(),
        });
    }

    fn create_query_pool(&mut self, query_count: u32) -> Result<Self::QueryPool, anyhow::Error> {
        Ok(TestQueryPool {
            query_count,
            resets: 0,
        })
    }

    fn cmd_reset_queries(
        &mut self,
        _cmd: &mut Self::Cmd,
        pool: &mut Self::QueryPool,
        _first: u32,
        _count: u32,
    ) {
        pool.resets += 1;
    }

    fn cmd_write_timestamp(
        &mut self,
        cmd: &mut Self::Cmd,
        _pool: &mut Self::QueryPool,
        stage: vk::PipelineStageFlags2,
        query: u32,
    ) {
        cmd.timestamps.push((stage, query));
    }

    fn get_timestamps(
        &mut self,
        _pool: &mut Self::QueryPool,
        count: u32,
        _wait: bool,
    ) -> Result<Vec<Option<u64>>, anyhow::Error> {
        // every query resolves immediately, 1000 ticks apart
        let base = self.timestamp_clock;
        self.timestamp_clock += count as u64 * 1000;
        Ok((0..count as u64).map(|i| Some(base + i * 1000)).collect())
    }

    fn timestamp_period(&self) -> f32 {
        1.0
    }
}
