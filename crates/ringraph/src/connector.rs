use ash::vk;
use thiserror::Error;

use crate::{
    api::{BufDesc, ImgDesc},
    util::{access_flags_for_image_layout, pipeline_stage_for_image_layout},
};

///The two endpoint families a node can declare. The set is closed, every
/// connector is one of these.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectorKind {
    Image,
    Buffer,
}

impl std::fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectorKind::Image => write!(f, "image"),
            ConnectorKind::Buffer => write!(f, "buffer"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("input '{input}' ({input_index}) of node '{node}' is a {declared} connector but was connected through the {connected} entry point")]
    InputKindMismatch {
        node: String,
        input: String,
        input_index: usize,
        declared: ConnectorKind,
        connected: ConnectorKind,
    },

    #[error("output {output_index} of node '{src}' is a {output} connector and cannot feed the {input} input {input_index} of node '{dst}'")]
    EdgeKindMismatch {
        src: String,
        output_index: usize,
        output: ConnectorKind,
        dst: String,
        input_index: usize,
        input: ConnectorKind,
    },
}

///Image read endpoint of a node.
///
/// Declares how the consumer touches the backing: the layout it requires, the
/// stages and accesses the read happens with, the usage bits the producer's
/// create-info must carry, and the `delay` in iterations relative to the
/// producer (0 reads the value written this iteration, n >= 1 reads the value
/// written n iterations ago).
#[derive(Clone, Debug)]
pub struct ImageIn {
    pub name: String,
    pub required_layout: vk::ImageLayout,
    pub stages: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
    pub usage: vk::ImageUsageFlags,
    pub delay: u32,
}

impl ImageIn {
    ///Endpoint for a layout, with stages and accesses filled in from the
    /// usual pairing of that layout.
    pub fn for_layout(name: impl Into<String>, layout: vk::ImageLayout) -> Self {
        ImageIn {
            name: name.into(),
            required_layout: layout,
            stages: pipeline_stage_for_image_layout(layout),
            access: access_flags_for_image_layout(layout),
            usage: vk::ImageUsageFlags::empty(),
            delay: 0,
        }
    }

    ///Storage image read from a compute shader.
    pub fn compute_read(name: impl Into<String>) -> Self {
        ImageIn {
            name: name.into(),
            required_layout: vk::ImageLayout::GENERAL,
            stages: vk::PipelineStageFlags2::COMPUTE_SHADER,
            access: vk::AccessFlags2::SHADER_STORAGE_READ,
            usage: vk::ImageUsageFlags::STORAGE,
            delay: 0,
        }
    }

    ///Sampled read from a compute shader.
    pub fn sampled(name: impl Into<String>) -> Self {
        ImageIn {
            name: name.into(),
            required_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            stages: vk::PipelineStageFlags2::COMPUTE_SHADER,
            access: vk::AccessFlags2::SHADER_SAMPLED_READ,
            usage: vk::ImageUsageFlags::SAMPLED,
            delay: 0,
        }
    }

    ///Source of a transfer operation.
    pub fn transfer_src(name: impl Into<String>) -> Self {
        ImageIn {
            name: name.into(),
            required_layout: vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            stages: vk::PipelineStageFlags2::TRANSFER,
            access: vk::AccessFlags2::TRANSFER_READ,
            usage: vk::ImageUsageFlags::TRANSFER_SRC,
            delay: 0,
        }
    }

    pub fn with_delay(mut self, delay: u32) -> Self {
        self.delay = delay;
        self
    }
}

///Buffer read endpoint of a node.
#[derive(Clone, Debug)]
pub struct BufferIn {
    pub name: String,
    pub stages: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
    pub usage: vk::BufferUsageFlags,
    pub delay: u32,
}

impl BufferIn {
    pub fn compute_read(name: impl Into<String>) -> Self {
        BufferIn {
            name: name.into(),
            stages: vk::PipelineStageFlags2::COMPUTE_SHADER,
            access: vk::AccessFlags2::SHADER_STORAGE_READ,
            usage: vk::BufferUsageFlags::STORAGE_BUFFER,
            delay: 0,
        }
    }

    pub fn transfer_src(name: impl Into<String>) -> Self {
        BufferIn {
            name: name.into(),
            stages: vk::PipelineStageFlags2::TRANSFER,
            access: vk::AccessFlags2::TRANSFER_READ,
            usage: vk::BufferUsageFlags::TRANSFER_SRC,
            delay: 0,
        }
    }

    pub fn with_delay(mut self, delay: u32) -> Self {
        self.delay = delay;
        self
    }
}

///Image write endpoint of a node.
///
/// Carries the create-info the backing is allocated from (consumer usage bits
/// are unioned in at build time) and the layout/stage/access the producer
/// writes with. `persistent` exempts the backing from aliasing and keeps its
/// content across rebuilds.
#[derive(Clone, Debug)]
pub struct ImageOut {
    pub name: String,
    pub desc: ImgDesc,
    pub layout: vk::ImageLayout,
    pub stages: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
    pub persistent: bool,
}

impl ImageOut {
    ///Storage image written by a compute shader.
    pub fn compute_write(name: impl Into<String>, desc: ImgDesc) -> Self {
        let mut desc = desc;
        desc.usage |= vk::ImageUsageFlags::STORAGE;
        ImageOut {
            name: name.into(),
            desc,
            layout: vk::ImageLayout::GENERAL,
            stages: vk::PipelineStageFlags2::COMPUTE_SHADER,
            access: vk::AccessFlags2::SHADER_STORAGE_WRITE,
            persistent: false,
        }
    }

    ///Target of a transfer operation.
    pub fn transfer_write(name: impl Into<String>, desc: ImgDesc) -> Self {
        let mut desc = desc;
        desc.usage |= vk::ImageUsageFlags::TRANSFER_DST;
        ImageOut {
            name: name.into(),
            desc,
            layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            stages: vk::PipelineStageFlags2::TRANSFER,
            access: vk::AccessFlags2::TRANSFER_WRITE,
            persistent: false,
        }
    }

    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }
}

///Buffer write endpoint of a node.
#[derive(Clone, Debug)]
pub struct BufferOut {
    pub name: String,
    pub desc: BufDesc,
    pub stages: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
    pub persistent: bool,
}

impl BufferOut {
    pub fn compute_write(name: impl Into<String>, desc: BufDesc) -> Self {
        let mut desc = desc;
        desc.usage |= vk::BufferUsageFlags::STORAGE_BUFFER;
        BufferOut {
            name: name.into(),
            desc,
            stages: vk::PipelineStageFlags2::COMPUTE_SHADER,
            access: vk::AccessFlags2::SHADER_STORAGE_WRITE,
            persistent: false,
        }
    }

    pub fn transfer_write(name: impl Into<String>, desc: BufDesc) -> Self {
        let mut desc = desc;
        desc.usage |= vk::BufferUsageFlags::TRANSFER_DST;
        BufferOut {
            name: name.into(),
            desc,
            stages: vk::PipelineStageFlags2::TRANSFER,
            access: vk::AccessFlags2::TRANSFER_WRITE,
            persistent: false,
        }
    }

    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }
}

///Input endpoint declaration of a node.
#[derive(Clone, Debug)]
pub enum InputConnector {
    Image(ImageIn),
    Buffer(BufferIn),
}

impl InputConnector {
    pub fn name(&self) -> &str {
        match self {
            InputConnector::Image(i) => &i.name,
            InputConnector::Buffer(b) => &b.name,
        }
    }

    pub fn kind(&self) -> ConnectorKind {
        match self {
            InputConnector::Image(_) => ConnectorKind::Image,
            InputConnector::Buffer(_) => ConnectorKind::Buffer,
        }
    }

    pub fn delay(&self) -> u32 {
        match self {
            InputConnector::Image(i) => i.delay,
            InputConnector::Buffer(b) => b.delay,
        }
    }
}

impl From<ImageIn> for InputConnector {
    fn from(i: ImageIn) -> Self {
        InputConnector::Image(i)
    }
}

impl From<BufferIn> for InputConnector {
    fn from(b: BufferIn) -> Self {
        InputConnector::Buffer(b)
    }
}

///Output endpoint declaration of a node.
#[derive(Clone, Debug)]
pub enum OutputConnector {
    Image(ImageOut),
    Buffer(BufferOut),
}

impl OutputConnector {
    pub fn name(&self) -> &str {
        match self {
            OutputConnector::Image(i) => &i.name,
            OutputConnector::Buffer(b) => &b.name,
        }
    }

    pub fn kind(&self) -> ConnectorKind {
        match self {
            OutputConnector::Image(_) => ConnectorKind::Image,
            OutputConnector::Buffer(_) => ConnectorKind::Buffer,
        }
    }

    pub fn is_persistent(&self) -> bool {
        match self {
            OutputConnector::Image(i) => i.persistent,
            OutputConnector::Buffer(b) => b.persistent,
        }
    }
}

impl From<ImageOut> for OutputConnector {
    fn from(i: ImageOut) -> Self {
        OutputConnector::Image(i)
    }
}

impl From<BufferOut> for OutputConnector {
    fn from(b: BufferOut) -> Self {
        OutputConnector::Buffer(b)
    }
}

///What a node sees per input when it is asked for its outputs.
///
/// Delayed inputs resolve to [ResolvedInput::Feedback]: their producer output
/// belongs to a previous iteration and must not participate in format or
/// extent inference.
#[derive(Clone, Debug)]
pub enum ResolvedInput {
    Image(ImageOut),
    Buffer(BufferOut),
    Feedback,
}

impl ResolvedInput {
    ///The image output this input is connected to. Delayed and buffer inputs
    /// yield `None`.
    pub fn image(&self) -> Option<&ImageOut> {
        if let ResolvedInput::Image(out) = self {
            Some(out)
        } else {
            None
        }
    }

    pub fn buffer(&self) -> Option<&BufferOut> {
        if let ResolvedInput::Buffer(out) = self {
            Some(out)
        } else {
            None
        }
    }
}
