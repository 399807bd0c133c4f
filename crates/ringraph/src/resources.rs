use ash::vk;

use crate::{
    api::{BufDesc, BufferBarrier, GraphApi, ImageBarrier, ImgDesc},
    connector::{BufferOut, ImageOut},
};

slotmap::new_key_type!(
    ///Key of an allocated image backing inside the graph's resource arena.
    pub(crate) struct ImageResKey;
);
slotmap::new_key_type!(
    ///Key of an allocated buffer backing inside the graph's resource arena.
    pub(crate) struct BufferResKey;
);

///Combined state of a single image backing.
///
/// The `current_*` fields track the simulated state while the barrier planner
/// walks the slot cycle; after planning they stay frozen until the next
/// build. `consumer_stages`/`consumer_access` are the unions over every sink
/// that reads this backing.
pub struct ImageRes<A: GraphApi> {
    pub image: A::Image,
    pub desc: ImgDesc,
    pub(crate) persistent: bool,

    pub(crate) current_stages: vk::PipelineStageFlags2,
    pub(crate) current_access: vk::AccessFlags2,
    pub(crate) current_layout: vk::ImageLayout,
    pub(crate) last_used_as_output: bool,

    pub(crate) consumer_stages: vk::PipelineStageFlags2,
    pub(crate) consumer_access: vk::AccessFlags2,
}

impl<A: GraphApi> Clone for ImageRes<A> {
    fn clone(&self) -> Self {
        ImageRes {
            image: self.image.clone(),
            desc: self.desc.clone(),
            persistent: self.persistent,
            current_stages: self.current_stages,
            current_access: self.current_access,
            current_layout: self.current_layout,
            last_used_as_output: self.last_used_as_output,
            consumer_stages: self.consumer_stages,
            consumer_access: self.consumer_access,
        }
    }
}

impl<A: GraphApi> ImageRes<A> {
    pub(crate) fn new(
        image: A::Image,
        desc: ImgDesc,
        persistent: bool,
        consumer_stages: vk::PipelineStageFlags2,
        consumer_access: vk::AccessFlags2,
    ) -> Self {
        ImageRes {
            image,
            desc,
            persistent,
            current_stages: vk::PipelineStageFlags2::TOP_OF_PIPE,
            current_access: vk::AccessFlags2::empty(),
            current_layout: vk::ImageLayout::UNDEFINED,
            last_used_as_output: false,
            consumer_stages,
            consumer_access,
        }
    }

    ///Refreshes the sink unions for a backing that survived a rebuild while
    /// keeping its carried layout/access state.
    pub(crate) fn rebind(
        &mut self,
        consumer_stages: vk::PipelineStageFlags2,
        consumer_access: vk::AccessFlags2,
    ) {
        self.consumer_stages = consumer_stages;
        self.consumer_access = consumer_access;
    }

    ///Barrier needed before a node reads this backing in `required_layout`.
    ///
    /// Coming out of a write the full producer→consumer transition is
    /// emitted; between two reads only a layout change (if any) is needed.
    pub(crate) fn input_barrier(
        &mut self,
        required_layout: vk::ImageLayout,
    ) -> Option<ImageBarrier<A::Image>> {
        if self.last_used_as_output {
            let barrier = ImageBarrier {
                image: self.image.clone(),
                src_stage: self.current_stages,
                src_access: self.current_access,
                dst_stage: self.consumer_stages,
                dst_access: self.consumer_access,
                old_layout: self.current_layout,
                new_layout: required_layout,
            };
            self.current_stages = self.consumer_stages;
            self.current_access = self.consumer_access;
            self.current_layout = required_layout;
            self.last_used_as_output = false;
            Some(barrier)
        } else if required_layout != self.current_layout {
            let barrier = ImageBarrier {
                image: self.image.clone(),
                src_stage: self.current_stages,
                src_access: self.current_access,
                dst_stage: self.current_stages,
                dst_access: self.current_access,
                old_layout: self.current_layout,
                new_layout: required_layout,
            };
            self.current_layout = required_layout;
            Some(barrier)
        } else {
            None
        }
    }

    ///Barrier needed before the owning node writes this backing.
    ///
    /// Transient content is dead at this point, so the transition starts at
    /// `UNDEFINED` which lets the driver skip preserving the old data.
    /// Persistent backings transition from their carried layout instead.
    pub(crate) fn output_barrier(&mut self, out: &ImageOut) -> ImageBarrier<A::Image> {
        let old_layout = if self.persistent {
            self.current_layout
        } else {
            vk::ImageLayout::UNDEFINED
        };
        let barrier = ImageBarrier {
            image: self.image.clone(),
            src_stage: self.current_stages,
            src_access: self.current_access,
            dst_stage: out.stages,
            dst_access: out.access,
            old_layout,
            new_layout: out.layout,
        };
        self.current_stages = out.stages;
        self.current_access = out.access;
        self.current_layout = out.layout;
        self.last_used_as_output = true;
        barrier
    }
}

///Combined state of a single buffer backing.
pub struct BufferRes<A: GraphApi> {
    pub buffer: A::Buffer,
    pub desc: BufDesc,
    pub(crate) persistent: bool,

    pub(crate) current_stages: vk::PipelineStageFlags2,
    pub(crate) current_access: vk::AccessFlags2,
    pub(crate) last_used_as_output: bool,

    pub(crate) consumer_stages: vk::PipelineStageFlags2,
    pub(crate) consumer_access: vk::AccessFlags2,
}

impl<A: GraphApi> Clone for BufferRes<A> {
    fn clone(&self) -> Self {
        BufferRes {
            buffer: self.buffer.clone(),
            desc: self.desc.clone(),
            persistent: self.persistent,
            current_stages: self.current_stages,
            current_access: self.current_access,
            last_used_as_output: self.last_used_as_output,
            consumer_stages: self.consumer_stages,
            consumer_access: self.consumer_access,
        }
    }
}

impl<A: GraphApi> BufferRes<A> {
    pub(crate) fn new(
        buffer: A::Buffer,
        desc: BufDesc,
        persistent: bool,
        consumer_stages: vk::PipelineStageFlags2,
        consumer_access: vk::AccessFlags2,
    ) -> Self {
        BufferRes {
            buffer,
            desc,
            persistent,
            current_stages: vk::PipelineStageFlags2::TOP_OF_PIPE,
            current_access: vk::AccessFlags2::empty(),
            last_used_as_output: false,
            consumer_stages,
            consumer_access,
        }
    }

    pub(crate) fn rebind(
        &mut self,
        consumer_stages: vk::PipelineStageFlags2,
        consumer_access: vk::AccessFlags2,
    ) {
        self.consumer_stages = consumer_stages;
        self.consumer_access = consumer_access;
    }

    ///Barrier needed before a node reads this backing. Reads after reads need
    /// no synchronisation, only the write→read edge does.
    pub(crate) fn input_barrier(&mut self) -> Option<BufferBarrier<A::Buffer>> {
        if self.last_used_as_output {
            let barrier = BufferBarrier {
                buffer: self.buffer.clone(),
                src_stage: self.current_stages,
                src_access: self.current_access,
                dst_stage: self.consumer_stages,
                dst_access: self.consumer_access,
            };
            self.current_stages = self.consumer_stages;
            self.current_access = self.consumer_access;
            self.last_used_as_output = false;
            Some(barrier)
        } else {
            None
        }
    }

    pub(crate) fn output_barrier(&mut self, out: &BufferOut) -> BufferBarrier<A::Buffer> {
        let barrier = BufferBarrier {
            buffer: self.buffer.clone(),
            src_stage: self.current_stages,
            src_access: self.current_access,
            dst_stage: out.stages,
            dst_access: out.access,
        };
        self.current_stages = out.stages;
        self.current_access = out.access;
        self.last_used_as_output = true;
        barrier
    }
}
