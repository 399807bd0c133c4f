use ash::vk;
use std::time::Duration;

pub(crate) fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

pub(crate) fn lcm(a: u64, b: u64) -> u64 {
    if a == 0 || b == 0 {
        return 0;
    }
    a / gcd(a, b) * b
}

///Least common multiple over a set of copy counts. The empty set yields 1,
/// which is the period of a node that touches no ring-allocated resource.
pub(crate) fn lcm_all(counts: impl IntoIterator<Item = u64>) -> u64 {
    counts.into_iter().fold(1, lcm)
}

///Every stage that can touch a shader resource.
pub const ALL_SHADERS: vk::PipelineStageFlags2 = vk::PipelineStageFlags2::from_raw(
    vk::PipelineStageFlags2::VERTEX_SHADER.as_raw()
        | vk::PipelineStageFlags2::TESSELLATION_CONTROL_SHADER.as_raw()
        | vk::PipelineStageFlags2::TESSELLATION_EVALUATION_SHADER.as_raw()
        | vk::PipelineStageFlags2::GEOMETRY_SHADER.as_raw()
        | vk::PipelineStageFlags2::FRAGMENT_SHADER.as_raw()
        | vk::PipelineStageFlags2::COMPUTE_SHADER.as_raw()
        | vk::PipelineStageFlags2::RAY_TRACING_SHADER_KHR.as_raw(),
);

///Heuristic that derives the access mask a layout is usually paired with.
pub fn access_flags_for_image_layout(layout: vk::ImageLayout) -> vk::AccessFlags2 {
    match layout {
        vk::ImageLayout::PREINITIALIZED => vk::AccessFlags2::HOST_WRITE,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => vk::AccessFlags2::TRANSFER_WRITE,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL => vk::AccessFlags2::TRANSFER_READ,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => {
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE
        }
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => vk::AccessFlags2::SHADER_READ,
        vk::ImageLayout::GENERAL => {
            vk::AccessFlags2::SHADER_STORAGE_READ | vk::AccessFlags2::SHADER_STORAGE_WRITE
        }
        _ => vk::AccessFlags2::empty(),
    }
}

///Heuristic that derives the pipeline stages a layout is usually touched in.
pub fn pipeline_stage_for_image_layout(layout: vk::ImageLayout) -> vk::PipelineStageFlags2 {
    match layout {
        vk::ImageLayout::TRANSFER_DST_OPTIMAL | vk::ImageLayout::TRANSFER_SRC_OPTIMAL => {
            vk::PipelineStageFlags2::TRANSFER
        }
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => {
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT
        }
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
        | vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        | vk::ImageLayout::GENERAL => ALL_SHADERS,
        vk::ImageLayout::PREINITIALIZED => vk::PipelineStageFlags2::HOST,
        vk::ImageLayout::UNDEFINED => vk::PipelineStageFlags2::TOP_OF_PIPE,
        vk::ImageLayout::PRESENT_SRC_KHR => vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
        _ => vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
    }
}

pub fn to_seconds(duration: Duration) -> f64 {
    duration.as_secs_f64()
}
