//! Unit tests for stack.rs
//!
//! Layout chains, the pipeline layouts built from them and binding sets
//! against those layouts.

use crate::descriptor::{DescriptorLayout, DescriptorPool, DescriptorStack};
use crate::error::Error;
use crate::graphics_device::mock_graphics_device::{
    MockCommandList, MockDescriptorSet, MockGraphicsDevice, MockPipelineLayout,
};
use crate::graphics_device::{
    CommandList, DescriptorType, GraphicsDevice, LayoutBinding, PipelineLayout, QueueKind,
    RawDescriptorSet, ShaderStages,
};
use crate::log::{Logger, NullLogger};
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

fn binding(binding: u32, ty: DescriptorType) -> LayoutBinding {
    LayoutBinding { binding, ty, count: 1, stages: ShaderStages::ALL_GRAPHICS }
}

fn layout(device: &dyn GraphicsDevice, ty: DescriptorType) -> Arc<DescriptorLayout> {
    Arc::new(DescriptorLayout::new(device, &[binding(0, ty)]).unwrap())
}

/// frame (uniform buffer) <- material (sampler) <- object (storage buffer)
fn three_levels(device: &dyn GraphicsDevice) -> (Arc<DescriptorStack>, Arc<DescriptorStack>, DescriptorStack) {
    let frame = Arc::new(DescriptorStack::new(layout(device, DescriptorType::UniformBuffer)));
    let material = Arc::new(DescriptorStack::with_parent(
        layout(device, DescriptorType::CombinedImageSampler),
        frame.clone(),
    ));
    let object = DescriptorStack::with_parent(layout(device, DescriptorType::StorageBuffer), material.clone());
    (frame, material, object)
}

fn mock_layout(layout: &Arc<dyn PipelineLayout>) -> &MockPipelineLayout {
    unsafe { &*(layout.as_ref() as *const dyn PipelineLayout as *const MockPipelineLayout) }
}

// ============================================================================
// CHAIN
// ============================================================================

#[test]
fn test_layouts_are_ordered_from_root() {
    let device = MockGraphicsDevice::new();
    let (frame, material, object) = three_levels(&device);

    let layouts = object.layouts();

    assert_eq!(layouts.len(), 3);
    assert!(Arc::ptr_eq(&layouts[0], frame.layout()));
    assert!(Arc::ptr_eq(&layouts[1], material.layout()));
    assert!(Arc::ptr_eq(&layouts[2], object.layout()));
}

#[test]
fn test_depth_and_set_index() {
    let device = MockGraphicsDevice::new();
    let (frame, material, object) = three_levels(&device);

    assert_eq!(frame.depth(), 1);
    assert_eq!(frame.set_index(), 0);
    assert!(frame.parent().is_none());
    assert_eq!(material.depth(), 2);
    assert_eq!(object.set_index(), 2);
    assert!(Arc::ptr_eq(object.parent().unwrap(), &material));
}

#[test]
fn test_siblings_share_their_parent_levels() {
    let device = MockGraphicsDevice::new();
    let (frame, _, object) = three_levels(&device);
    let overlay = DescriptorStack::with_parent(layout(&device, DescriptorType::SampledImage), frame.clone());

    assert_eq!(overlay.depth(), 2);
    assert!(Arc::ptr_eq(&overlay.layouts()[0], &object.layouts()[0]));
}

// ============================================================================
// PIPELINE LAYOUT
// ============================================================================

#[test]
fn test_pipeline_layout_follows_chain_order() {
    let device = MockGraphicsDevice::new();
    let (_, _, object) = three_levels(&device);

    let pipeline_layout = object.create_pipeline_layout(&device).unwrap();

    assert_eq!(pipeline_layout.set_count(), 3);
    let types: Vec<DescriptorType> = mock_layout(&pipeline_layout)
        .set_layouts
        .iter()
        .map(|bindings| bindings[0].ty)
        .collect();
    assert_eq!(
        types,
        vec![DescriptorType::UniformBuffer, DescriptorType::CombinedImageSampler, DescriptorType::StorageBuffer]
    );
}

// ============================================================================
// BINDING
// ============================================================================

#[test]
fn test_bind_set_at_its_level() {
    let device: Arc<dyn GraphicsDevice> = Arc::new(MockGraphicsDevice::new());
    let logger: Arc<dyn Logger> = Arc::new(NullLogger);
    let (_, material, object) = three_levels(device.as_ref());
    let pipeline_layout = object.create_pipeline_layout(device.as_ref()).unwrap();
    let pool = DescriptorPool::new(device, material.layout().clone(), 4, logger).unwrap();
    let set = pool.allocate().unwrap();
    let mut cmd = MockCommandList::new(QueueKind::Graphics);

    set.bind(&mut cmd, &pipeline_layout, material.set_index()).unwrap();

    assert_eq!(cmd.commands, vec!["bind_descriptor_sets(first=1, count=1, layout_sets=3)"]);
}

#[test]
fn test_bind_consecutive_sets() {
    let device = MockGraphicsDevice::new();
    let (_, _, object) = three_levels(&device);
    let pipeline_layout = object.create_pipeline_layout(&device).unwrap();
    let a = MockDescriptorSet { write_count: AtomicUsize::new(0) };
    let b = MockDescriptorSet { write_count: AtomicUsize::new(0) };
    let sets: [&dyn RawDescriptorSet; 2] = [&a, &b];
    let mut cmd = MockCommandList::new(QueueKind::Graphics);

    cmd.bind_descriptor_sets(&pipeline_layout, 1, &sets).unwrap();
    let overflow = cmd.bind_descriptor_sets(&pipeline_layout, 2, &sets);

    assert!(matches!(overflow, Err(Error::InvalidResource(_))));
    assert_eq!(cmd.commands, vec!["bind_descriptor_sets(first=1, count=2, layout_sets=3)"]);
}
