use crate::{
    StagerAccessFlags, StagerFilterType, StagerFormat, StagerImageAspect, StagerMemoryUsage,
    StagerPipelineStage, StagerResourceState, StagerResourceType,
};
use ash::vk;
use gpu_allocator::MemoryLocation;

pub(crate) fn format_to_vk(format: StagerFormat) -> vk::Format {
    match format {
        StagerFormat::UNDEFINED => vk::Format::UNDEFINED,
        StagerFormat::R8_UNORM => vk::Format::R8_UNORM,
        StagerFormat::R8G8_UNORM => vk::Format::R8G8_UNORM,
        StagerFormat::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        StagerFormat::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
        StagerFormat::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        StagerFormat::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,
        StagerFormat::R32_SFLOAT => vk::Format::R32_SFLOAT,
        StagerFormat::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
    }
}

pub(crate) fn memory_usage_to_location(memory_usage: StagerMemoryUsage) -> MemoryLocation {
    match memory_usage {
        StagerMemoryUsage::GpuOnly => MemoryLocation::GpuOnly,
        StagerMemoryUsage::CpuToGpu => MemoryLocation::CpuToGpu,
        StagerMemoryUsage::GpuToCpu => MemoryLocation::GpuToCpu,
    }
}

pub(crate) fn filter_to_vk(filter: StagerFilterType) -> vk::Filter {
    match filter {
        StagerFilterType::Nearest => vk::Filter::NEAREST,
        StagerFilterType::Linear => vk::Filter::LINEAR,
    }
}

pub(crate) fn image_aspect_to_vk(aspect: StagerImageAspect) -> vk::ImageAspectFlags {
    match aspect {
        StagerImageAspect::Color => vk::ImageAspectFlags::COLOR,
        StagerImageAspect::Depth => vk::ImageAspectFlags::DEPTH,
        StagerImageAspect::Stencil => vk::ImageAspectFlags::STENCIL,
        StagerImageAspect::DepthStencil => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
    }
}

pub(crate) fn resource_type_buffer_usage_flags(
    resource_type: StagerResourceType,
    memory_usage: StagerMemoryUsage,
) -> vk::BufferUsageFlags {
    // Every buffer can take part in uploads, either as the staging side or the destination
    let mut usage_flags = vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST;
    if memory_usage == StagerMemoryUsage::GpuToCpu {
        usage_flags = vk::BufferUsageFlags::TRANSFER_DST;
    }

    if resource_type.intersects(StagerResourceType::UNIFORM_BUFFER) {
        usage_flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }

    if resource_type
        .intersects(StagerResourceType::BUFFER | StagerResourceType::BUFFER_READ_WRITE)
    {
        usage_flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }

    if resource_type.intersects(StagerResourceType::INDEX_BUFFER) {
        usage_flags |= vk::BufferUsageFlags::INDEX_BUFFER;
    }

    if resource_type.intersects(StagerResourceType::VERTEX_BUFFER) {
        usage_flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }

    if resource_type.intersects(StagerResourceType::INDIRECT_BUFFER) {
        usage_flags |= vk::BufferUsageFlags::INDIRECT_BUFFER;
    }

    usage_flags
}

pub(crate) fn resource_type_image_usage_flags(
    resource_type: StagerResourceType
) -> vk::ImageUsageFlags {
    // Uploads copy into the base level and blit between levels
    let mut usage_flags = vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST;

    if resource_type.intersects(StagerResourceType::TEXTURE) {
        usage_flags |= vk::ImageUsageFlags::SAMPLED;
    }

    if resource_type.intersects(StagerResourceType::TEXTURE_READ_WRITE) {
        usage_flags |= vk::ImageUsageFlags::STORAGE;
    }

    usage_flags
}

pub(crate) fn access_flags_to_vk(access_flags: StagerAccessFlags) -> vk::AccessFlags {
    const MAPPING: [(StagerAccessFlags, vk::AccessFlags); 12] = [
        (
            StagerAccessFlags::INDIRECT_COMMAND_READ,
            vk::AccessFlags::INDIRECT_COMMAND_READ,
        ),
        (StagerAccessFlags::INDEX_READ, vk::AccessFlags::INDEX_READ),
        (
            StagerAccessFlags::VERTEX_ATTRIBUTE_READ,
            vk::AccessFlags::VERTEX_ATTRIBUTE_READ,
        ),
        (StagerAccessFlags::UNIFORM_READ, vk::AccessFlags::UNIFORM_READ),
        (StagerAccessFlags::SHADER_READ, vk::AccessFlags::SHADER_READ),
        (StagerAccessFlags::SHADER_WRITE, vk::AccessFlags::SHADER_WRITE),
        (StagerAccessFlags::TRANSFER_READ, vk::AccessFlags::TRANSFER_READ),
        (StagerAccessFlags::TRANSFER_WRITE, vk::AccessFlags::TRANSFER_WRITE),
        (StagerAccessFlags::HOST_READ, vk::AccessFlags::HOST_READ),
        (StagerAccessFlags::HOST_WRITE, vk::AccessFlags::HOST_WRITE),
        (StagerAccessFlags::MEMORY_READ, vk::AccessFlags::MEMORY_READ),
        (StagerAccessFlags::MEMORY_WRITE, vk::AccessFlags::MEMORY_WRITE),
    ];

    let mut flags = vk::AccessFlags::empty();
    for (stager_flag, vk_flag) in MAPPING.iter() {
        if access_flags.contains(*stager_flag) {
            flags |= *vk_flag;
        }
    }

    flags
}

pub(crate) fn pipeline_stage_to_vk(pipeline_stage: StagerPipelineStage) -> vk::PipelineStageFlags {
    const MAPPING: [(StagerPipelineStage, vk::PipelineStageFlags); 10] = [
        (
            StagerPipelineStage::TOP_OF_PIPE,
            vk::PipelineStageFlags::TOP_OF_PIPE,
        ),
        (
            StagerPipelineStage::DRAW_INDIRECT,
            vk::PipelineStageFlags::DRAW_INDIRECT,
        ),
        (
            StagerPipelineStage::VERTEX_INPUT,
            vk::PipelineStageFlags::VERTEX_INPUT,
        ),
        (
            StagerPipelineStage::VERTEX_SHADER,
            vk::PipelineStageFlags::VERTEX_SHADER,
        ),
        (
            StagerPipelineStage::FRAGMENT_SHADER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
        ),
        (
            StagerPipelineStage::COMPUTE_SHADER,
            vk::PipelineStageFlags::COMPUTE_SHADER,
        ),
        (StagerPipelineStage::TRANSFER, vk::PipelineStageFlags::TRANSFER),
        (
            StagerPipelineStage::BOTTOM_OF_PIPE,
            vk::PipelineStageFlags::BOTTOM_OF_PIPE,
        ),
        (StagerPipelineStage::HOST, vk::PipelineStageFlags::HOST),
        (
            StagerPipelineStage::ALL_COMMANDS,
            vk::PipelineStageFlags::ALL_COMMANDS,
        ),
    ];

    let mut flags = vk::PipelineStageFlags::empty();
    for (stager_flag, vk_flag) in MAPPING.iter() {
        if pipeline_stage.contains(*stager_flag) {
            flags |= *vk_flag;
        }
    }

    if flags.is_empty() {
        flags = vk::PipelineStageFlags::TOP_OF_PIPE;
    }

    flags
}

pub(crate) fn resource_state_to_image_layout(
    state: StagerResourceState
) -> Option<vk::ImageLayout> {
    if state.intersects(StagerResourceState::COPY_SRC) {
        Some(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
    } else if state.intersects(StagerResourceState::COPY_DST) {
        Some(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
    } else if state.intersects(StagerResourceState::UNORDERED_ACCESS) {
        Some(vk::ImageLayout::GENERAL)
    } else if state.intersects(StagerResourceState::SHADER_RESOURCE) {
        Some(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
    } else if state.intersects(StagerResourceState::COMMON) {
        Some(vk::ImageLayout::GENERAL)
    } else if state == StagerResourceState::UNDEFINED {
        Some(vk::ImageLayout::UNDEFINED)
    } else {
        None
    }
}
