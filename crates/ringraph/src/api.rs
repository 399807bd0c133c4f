use ash::vk;

///Image description. Collects all meta data the graph derives for an image
/// backing before it asks the allocator for one.
///
/// This is basically a [vk::ImageCreateInfo] where creation-time specifics
/// like the `p_next` chain are removed, so descriptions stay plain data that
/// can be compared across builds.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImgDesc {
    pub format: vk::Format,
    pub extent: vk::Extent3D,
    pub mip_levels: u32,
    pub layers: u32,
    pub samples: vk::SampleCountFlags,
    pub tiling: vk::ImageTiling,
    pub usage: vk::ImageUsageFlags,
}

impl Default for ImgDesc {
    ///Conservative 2d 8bit 4-channel description without mipmapping or multisampling.
    fn default() -> Self {
        ImgDesc {
            format: vk::Format::R8G8B8A8_UNORM,
            extent: vk::Extent3D {
                width: 512,
                height: 512,
                depth: 1,
            },
            mip_levels: 1,
            layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: vk::ImageUsageFlags::empty(),
        }
    }
}

impl ImgDesc {
    pub fn texture_2d(format: vk::Format, width: u32, height: u32) -> Self {
        ImgDesc {
            format,
            extent: vk::Extent3D {
                width,
                height,
                depth: 1,
            },
            usage: vk::ImageUsageFlags::SAMPLED,
            ..Default::default()
        }
    }

    pub fn storage_image_2d(format: vk::Format, width: u32, height: u32) -> Self {
        ImgDesc {
            format,
            extent: vk::Extent3D {
                width,
                height,
                depth: 1,
            },
            usage: vk::ImageUsageFlags::STORAGE,
            ..Default::default()
        }
    }
}

///Buffer description handed to the allocator.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BufDesc {
    pub size: vk::DeviceSize,
    pub usage: vk::BufferUsageFlags,
}

impl BufDesc {
    ///Storage buffer that can hold `count` elements of `T`.
    pub fn storage_for<T: 'static>(count: usize) -> Self {
        BufDesc {
            size: (core::mem::size_of::<T>() * count) as vk::DeviceSize,
            usage: vk::BufferUsageFlags::STORAGE_BUFFER,
        }
    }
}

///Allocation hint for a graph resource.
///
/// `Persistent` backings must come from a dedicated allocator and keep their
/// content until they are dropped. `Transient` backings may come from an
/// aliasing allocator that overlaps memory of resources whose lifetimes do
/// not intersect within one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifetime {
    Persistent,
    Transient,
}

///A single image transition within a dependency batch.
#[derive(Clone, Debug)]
pub struct ImageBarrier<I> {
    pub image: I,
    pub src_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub dst_access: vk::AccessFlags2,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
}

///A single buffer memory barrier within a dependency batch.
#[derive(Clone, Debug)]
pub struct BufferBarrier<B> {
    pub buffer: B,
    pub src_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub dst_access: vk::AccessFlags2,
}

///Everything the graph needs from the GPU layer underneath it.
///
/// The graph itself never talks to a device directly. It schedules, allocates
/// through this trait, records barrier batches and timestamps, and leaves
/// queue submission to the caller. Handles (`Image`, `Buffer`, `Semaphore`)
/// are expected to behave like shared references, cloning must be cheap.
///
/// All fallible operations report through [anyhow::Error]; the graph wraps
/// them into its own error types at the module boundaries.
pub trait GraphApi {
    type Image: Clone;
    type Buffer: Clone;
    type Cmd;
    type CommandPool;
    type Semaphore: Clone;
    type QueryPool;

    ///Blocks until all previously submitted work has finished, either on the
    /// graph's queue or the whole device, whichever the implementation
    /// prefers. Called once per (re)build before resources are recycled.
    fn wait_idle(&mut self) -> Result<(), anyhow::Error>;

    fn create_image(
        &mut self,
        desc: &ImgDesc,
        lifetime: Lifetime,
        name: &str,
    ) -> Result<Self::Image, anyhow::Error>;

    fn create_buffer(
        &mut self,
        desc: &BufDesc,
        lifetime: Lifetime,
        name: &str,
    ) -> Result<Self::Buffer, anyhow::Error>;

    fn create_command_pool(&mut self) -> Result<Self::CommandPool, anyhow::Error>;

    ///Recycles all command buffers of `pool`. Only called once the caller
    /// guaranteed that the previous occupant of the in-flight slot finished.
    fn reset_command_pool(&mut self, pool: &mut Self::CommandPool) -> Result<(), anyhow::Error>;

    ///Allocates a primary command buffer from `pool` and begins recording.
    /// The buffer is handed back to the caller through the run state, ending
    /// and submitting it is the caller's business.
    fn allocate_command_buffer(
        &mut self,
        pool: &mut Self::CommandPool,
    ) -> Result<Self::Cmd, anyhow::Error>;

    fn create_binary_semaphore(&mut self) -> Result<Self::Semaphore, anyhow::Error>;

    fn create_timeline_semaphore(&mut self, initial_value: u64)
        -> Result<Self::Semaphore, anyhow::Error>;

    ///Records one dependency batch. Implementations should map this to a
    /// single `vkCmdPipelineBarrier2` call.
    fn cmd_barriers(
        &mut self,
        cmd: &mut Self::Cmd,
        images: &[ImageBarrier<Self::Image>],
        buffers: &[BufferBarrier<Self::Buffer>],
    );

    fn create_query_pool(&mut self, query_count: u32) -> Result<Self::QueryPool, anyhow::Error>;

    fn cmd_reset_queries(
        &mut self,
        cmd: &mut Self::Cmd,
        pool: &mut Self::QueryPool,
        first: u32,
        count: u32,
    );

    fn cmd_write_timestamp(
        &mut self,
        cmd: &mut Self::Cmd,
        pool: &mut Self::QueryPool,
        stage: vk::PipelineStageFlags2,
        query: u32,
    );

    ///Reads back the first `count` timestamps. Entries that are not yet
    /// available are `None`; with `wait` the call blocks until every entry
    /// is resolved.
    fn get_timestamps(
        &mut self,
        pool: &mut Self::QueryPool,
        count: u32,
        wait: bool,
    ) -> Result<Vec<Option<u64>>, anyhow::Error>;

    ///Nanoseconds that pass between two timestamp increments.
    fn timestamp_period(&self) -> f32;
}
