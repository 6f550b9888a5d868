/// Copy and mip-chain command recording
///
/// Layout flow of an uploaded image:
///
/// ```text
/// level 0:  Undefined -> TransferDst (copy) -> TransferSrc
/// level i:  Undefined -> TransferDst (blit from i-1) -> TransferSrc
/// all:      TransferSrc -> final layout
/// ```

use glam::UVec2;
use crate::error::Result;
use crate::graphics_device::{
    AccessFlags, Buffer, BufferImageCopy, CommandList, Filter, Image, ImageBarrier,
    ImageBlit, ImageLayout, PipelineStages,
};

/// Number of levels of a full mip chain down to 1x1
pub fn max_mip_levels(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Blits generating levels `1..levels`, each halving the previous one
///
/// A dimension never drops below 1.
pub fn mip_blits(width: u32, height: u32, levels: u32, layers: u32) -> Vec<ImageBlit> {
    let mut blits = Vec::with_capacity(levels.saturating_sub(1) as usize);
    let mut src = UVec2::new(width.max(1), height.max(1));
    for level in 1..levels {
        let dst = UVec2::new((src.x / 2).max(1), (src.y / 2).max(1));
        blits.push(ImageBlit {
            src_mip_level: level - 1,
            src_extent: src,
            dst_mip_level: level,
            dst_extent: dst,
            base_array_layer: 0,
            layer_count: layers,
        });
        src = dst;
    }
    blits
}

fn level_barrier(
    image: &dyn Image,
    level: u32,
    old_layout: ImageLayout,
    new_layout: ImageLayout,
) -> ImageBarrier<'_> {
    let (src_stages, src_access) = match old_layout {
        ImageLayout::TransferDst => (PipelineStages::TRANSFER, AccessFlags::TRANSFER_WRITE),
        _ => (PipelineStages::TOP_OF_PIPE, AccessFlags::empty()),
    };
    let (dst_stages, dst_access) = match new_layout {
        ImageLayout::TransferDst => (PipelineStages::TRANSFER, AccessFlags::TRANSFER_WRITE),
        _ => (PipelineStages::TRANSFER, AccessFlags::TRANSFER_READ),
    };
    ImageBarrier {
        image,
        old_layout,
        new_layout,
        base_mip_level: level,
        level_count: 1,
        base_array_layer: 0,
        layer_count: image.desc().array_layers,
        src_stages,
        dst_stages,
        src_access,
        dst_access,
    }
}

/// Copy every layer of level 0 from `staging` and leave it in `TransferSrc`
///
/// Layers are tightly packed in `staging`, `layer_size` bytes each.
pub fn record_copy(
    cmd: &mut dyn CommandList,
    staging: &dyn Buffer,
    image: &dyn Image,
    layer_size: u64,
) -> Result<()> {
    let desc = image.desc();
    let regions: Vec<BufferImageCopy> = (0..desc.array_layers)
        .map(|layer| BufferImageCopy {
            buffer_offset: layer as u64 * layer_size,
            mip_level: 0,
            array_layer: layer,
            extent: UVec2::new(desc.width, desc.height),
        })
        .collect();

    cmd.pipeline_barrier(&[level_barrier(image, 0, ImageLayout::Undefined, ImageLayout::TransferDst)])?;
    cmd.copy_buffer_to_image(staging, image, &regions)?;
    cmd.pipeline_barrier(&[level_barrier(image, 0, ImageLayout::TransferDst, ImageLayout::TransferSrc)])
}

/// Fill levels `1..mip_levels` by successive linear blits
///
/// Expects level 0 in `TransferSrc`; leaves every level in `TransferSrc`.
pub fn record_mip_chain(cmd: &mut dyn CommandList, image: &dyn Image) -> Result<()> {
    let desc = image.desc();
    for blit in mip_blits(desc.width, desc.height, desc.mip_levels, desc.array_layers) {
        let level = blit.dst_mip_level;
        cmd.pipeline_barrier(&[level_barrier(image, level, ImageLayout::Undefined, ImageLayout::TransferDst)])?;
        cmd.blit_image(
            image,
            ImageLayout::TransferSrc,
            image,
            ImageLayout::TransferDst,
            &[blit],
            Filter::Linear,
        )?;
        cmd.pipeline_barrier(&[level_barrier(image, level, ImageLayout::TransferDst, ImageLayout::TransferSrc)])?;
    }
    Ok(())
}

/// Move every level and layer from `TransferSrc` to `final_layout`
pub fn record_final_transition(
    cmd: &mut dyn CommandList,
    image: &dyn Image,
    final_layout: ImageLayout,
) -> Result<()> {
    let desc = image.desc();
    cmd.pipeline_barrier(&[ImageBarrier {
        image,
        old_layout: ImageLayout::TransferSrc,
        new_layout: final_layout,
        base_mip_level: 0,
        level_count: desc.mip_levels,
        base_array_layer: 0,
        layer_count: desc.array_layers,
        src_stages: PipelineStages::TRANSFER,
        dst_stages: PipelineStages::FRAGMENT_SHADER,
        src_access: AccessFlags::TRANSFER_READ,
        dst_access: AccessFlags::SHADER_READ,
    }])
}

#[cfg(test)]
#[path = "mip_chain_tests.rs"]
mod tests;
