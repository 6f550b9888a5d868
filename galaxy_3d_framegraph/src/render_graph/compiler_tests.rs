//! Unit tests for compiler.rs
//!
//! Attachment closure, index order, load/store and layout derivation,
//! dependency inference and clear values.

use crate::error::Error;
use crate::graphics_device::{
    AccessFlags, AttachmentReference, ClearValue, ImageLayout, LoadOp, PipelineStages,
    StoreOp, SubpassDependency, TextureFormat, SUBPASS_EXTERNAL,
};
use crate::log::{Logger, LogSeverity, MemoryLogger};
use crate::render_graph::{
    Attachment, CompiledGraph, DepthStencilAccess, FrameGraphBuilder, RenderPassDescription,
    SubpassDescription,
};
use std::sync::Arc;

fn builder() -> (FrameGraphBuilder, Arc<MemoryLogger>) {
    let memory = Arc::new(MemoryLogger::new());
    let logger: Arc<dyn Logger> = memory.clone();
    (FrameGraphBuilder::new(logger), memory)
}

fn compile_err(builder: FrameGraphBuilder) -> Error {
    match builder.compile() {
        Ok(_) => panic!("expected a compilation error"),
        Err(err) => err,
    }
}

/// "geometry" writes A, final pass "compose" reads A and writes "present"
fn two_pass_graph() -> CompiledGraph {
    let (mut b, _) = builder();
    b.add_attachment(Attachment::new("A", TextureFormat::R16G16B16A16_SFLOAT))
        .add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(RenderPassDescription::new("geometry").subpass(SubpassDescription::new("draw").color("A")))
        .add_pass(
            RenderPassDescription::new("compose")
                .subpass(SubpassDescription::new("resolve").input("A").color("present")),
        )
        .set_final_pass("compose");
    b.compile().unwrap()
}

fn dependency(graph: &CompiledGraph, pass: usize, src: u32, dst: u32) -> SubpassDependency {
    *graph.passes[pass]
        .desc
        .dependencies
        .iter()
        .find(|d| d.src_subpass == src && d.dst_subpass == dst)
        .unwrap_or_else(|| panic!("no dependency {} -> {}", src, dst))
}

// ============================================================================
// CONCRETE SCENARIO
// ============================================================================

#[test]
fn test_two_pass_scenario() {
    let graph = two_pass_graph();

    assert_eq!(graph.passes.len(), 2);
    assert_eq!(graph.present_attachment, "present");

    let written = graph.passes[0].attachment_use("A").unwrap();
    assert_eq!(written.load_op, LoadOp::Clear);
    assert_eq!(written.store_op, StoreOp::Store);
    assert_eq!(written.initial_layout, ImageLayout::Undefined);
    assert_eq!(written.final_layout, ImageLayout::ShaderReadOnly);

    let read = graph.passes[1].attachment_use("A").unwrap();
    assert_eq!(read.load_op, LoadOp::Load);
    assert_eq!(read.initial_layout, ImageLayout::ShaderReadOnly);
    assert_eq!(read.store_op, StoreOp::DontCare);

    let present = graph.passes[1].attachment_use("present").unwrap();
    assert_eq!(present.final_layout, ImageLayout::PresentSrc);
    assert_eq!(present.initial_layout, ImageLayout::Undefined);
    assert_eq!(present.load_op, LoadOp::Clear);
    assert_eq!(present.store_op, StoreOp::Store);
    assert!(present.is_presented);
}

#[test]
fn test_descriptions_mirror_attachment_uses() {
    let graph = two_pass_graph();

    for pass in &graph.passes {
        assert_eq!(pass.desc.attachments.len(), pass.attachments.len());
        for (desc, attachment_use) in pass.desc.attachments.iter().zip(&pass.attachments) {
            assert_eq!(desc.load_op, attachment_use.load_op);
            assert_eq!(desc.store_op, attachment_use.store_op);
            assert_eq!(desc.initial_layout, attachment_use.initial_layout);
            assert_eq!(desc.final_layout, attachment_use.final_layout);
        }
    }
}

#[test]
fn test_subpass_references() {
    let graph = two_pass_graph();
    let compose = &graph.passes[1].desc.subpasses[0];

    assert_eq!(
        compose.input_attachments,
        vec![AttachmentReference { attachment: 0, layout: ImageLayout::ShaderReadOnly }]
    );
    assert_eq!(
        compose.color_attachments,
        vec![AttachmentReference { attachment: 1, layout: ImageLayout::ColorAttachment }]
    );
    assert!(compose.depth_stencil_attachment.is_none());
}

// ============================================================================
// ATTACHMENT CLOSURE
// ============================================================================

#[test]
fn test_unknown_attachment_fails() {
    let (mut b, memory) = builder();
    b.add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(
            RenderPassDescription::new("main")
                .subpass(SubpassDescription::new("draw").input("missing").color("present")),
        )
        .set_final_pass("main");

    let err = compile_err(b);

    assert!(matches!(err, Error::GraphCompilation(ref m) if m.contains("'missing'")));
    assert_eq!(memory.count(LogSeverity::Error), 1);
}

#[test]
fn test_unknown_preserve_attachment_fails() {
    let (mut b, _) = builder();
    b.add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(
            RenderPassDescription::new("main")
                .subpass(SubpassDescription::new("draw").color("present").preserve("ghost")),
        )
        .set_final_pass("main");

    assert!(matches!(compile_err(b), Error::GraphCompilation(_)));
}

// ============================================================================
// FINAL PASS
// ============================================================================

#[test]
fn test_missing_final_pass_fails() {
    let (mut b, _) = builder();
    b.add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(RenderPassDescription::new("main").subpass(SubpassDescription::new("draw").color("present")));

    assert!(matches!(compile_err(b), Error::GraphCompilation(_)));
}

#[test]
fn test_unknown_final_pass_fails() {
    let (mut b, _) = builder();
    b.add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(RenderPassDescription::new("main").subpass(SubpassDescription::new("draw").color("present")))
        .set_final_pass("post");

    assert!(matches!(compile_err(b), Error::GraphCompilation(ref m) if m.contains("'post'")));
}

#[test]
fn test_final_pass_moved_last() {
    let (mut b, _) = builder();
    b.add_attachment(Attachment::new("shadow", TextureFormat::D32_FLOAT).with_size(1024, 1024))
        .add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(
            RenderPassDescription::new("final")
                .subpass(SubpassDescription::new("lit").input("shadow").color("present")),
        )
        .add_pass(
            RenderPassDescription::new("shadows")
                .subpass(SubpassDescription::new("depth").depth_stencil("shadow", DepthStencilAccess::Write)),
        )
        .set_final_pass("final");

    let graph = b.compile().unwrap();

    let names: Vec<&str> = graph.passes.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["shadows", "final"]);
    assert!(graph.passes[1].is_final);
    assert!(!graph.passes[0].is_final);
    assert_eq!(graph.pass_index("final"), Some(1));
}

#[test]
fn test_explicit_final_output() {
    let (mut b, _) = builder();
    b.add_attachment(Attachment::new("debug", TextureFormat::R8G8B8A8_UNORM))
        .add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(
            RenderPassDescription::new("main")
                .subpass(SubpassDescription::new("draw").color("debug").color("present")),
        )
        .set_final_pass("main")
        .set_final_output_attachment("present");

    let graph = b.compile().unwrap();
    let pass = &graph.passes[0];

    assert_eq!(graph.present_attachment, "present");
    assert_eq!(pass.presented_index(), Some(1));
    assert_eq!(pass.attachment_use("debug").unwrap().final_layout, ImageLayout::ShaderReadOnly);
}

#[test]
fn test_final_output_must_be_color_of_final_pass() {
    let (mut b, _) = builder();
    b.add_attachment(Attachment::new("A", TextureFormat::R8G8B8A8_UNORM))
        .add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(
            RenderPassDescription::new("main")
                .subpass(SubpassDescription::new("draw").input("A").color("present")),
        )
        .set_final_pass("main")
        .set_final_output_attachment("A");

    assert!(matches!(compile_err(b), Error::GraphCompilation(_)));
}

#[test]
fn test_final_pass_without_color_fails() {
    let (mut b, _) = builder();
    b.add_attachment(Attachment::new("depth", TextureFormat::D32_FLOAT))
        .add_pass(
            RenderPassDescription::new("main")
                .subpass(SubpassDescription::new("draw").depth_stencil("depth", DepthStencilAccess::Write)),
        )
        .set_final_pass("main");

    assert!(matches!(compile_err(b), Error::GraphCompilation(_)));
}

#[test]
fn test_presented_attachment_in_earlier_pass_fails() {
    let (mut b, _) = builder();
    b.add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(RenderPassDescription::new("early").subpass(SubpassDescription::new("draw").color("present")))
        .add_pass(RenderPassDescription::new("main").subpass(SubpassDescription::new("draw").color("present")))
        .set_final_pass("main");

    assert!(matches!(compile_err(b), Error::GraphCompilation(ref m) if m.contains("'early'")));
}

// ============================================================================
// INDEX ORDER
// ============================================================================

#[test]
fn test_indices_follow_first_seen_order() {
    let (mut b, _) = builder();
    // declaration order differs from reference order
    b.add_attachment(Attachment::new("b", TextureFormat::R8G8B8A8_UNORM))
        .add_attachment(Attachment::new("depth", TextureFormat::D32_FLOAT))
        .add_attachment(Attachment::new("a", TextureFormat::R8G8B8A8_UNORM))
        .add_attachment(Attachment::new("c", TextureFormat::R8G8B8A8_UNORM))
        .add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(
            RenderPassDescription::new("main")
                .subpass(
                    SubpassDescription::new("first")
                        .input("c")
                        .color("a")
                        .depth_stencil("depth", DepthStencilAccess::Write),
                )
                .subpass(SubpassDescription::new("second").input("a").color("b"))
                .subpass(SubpassDescription::new("third").input("b").color("present")),
        )
        .set_final_pass("main");

    let graph = b.compile().unwrap();

    let names: Vec<(&str, u32)> = graph.passes[0]
        .attachments
        .iter()
        .map(|a| (a.name.as_str(), a.index))
        .collect();
    assert_eq!(names, vec![("c", 0), ("a", 1), ("depth", 2), ("b", 3), ("present", 4)]);
}

#[test]
fn test_compilation_is_deterministic() {
    let first = two_pass_graph();
    let second = two_pass_graph();

    for (a, b) in first.passes.iter().zip(&second.passes) {
        assert_eq!(a.desc, b.desc);
        assert_eq!(a.attachments, b.attachments);
    }
}

// ============================================================================
// LOAD / STORE
// ============================================================================

#[test]
fn test_written_then_read_inside_one_pass() {
    let (mut b, _) = builder();
    b.add_attachment(Attachment::new("gbuffer", TextureFormat::R16G16B16A16_SFLOAT))
        .add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(
            RenderPassDescription::new("deferred")
                .subpass(SubpassDescription::new("fill").color("gbuffer"))
                .subpass(SubpassDescription::new("light").input("gbuffer").color("present")),
        )
        .set_final_pass("deferred");

    let graph = b.compile().unwrap();
    let gbuffer = graph.passes[0].attachment_use("gbuffer").unwrap();

    // read as input somewhere in the pass: loaded
    assert_eq!(gbuffer.load_op, LoadOp::Load);
    assert_eq!(gbuffer.store_op, StoreOp::Store);
    assert_eq!(gbuffer.first_subpass, 0);
    assert_eq!(gbuffer.last_subpass, 1);
}

#[test]
fn test_depth_access_modes() {
    use DepthStencilAccess::*;
    let modes: Vec<(bool, bool)> = [Write, ReadOnly, DepthReadOnly, StencilReadOnly]
        .iter()
        .map(|m| (m.reads(), m.writes()))
        .collect();

    assert_eq!(modes, vec![(false, true), (true, false), (true, true), (true, true)]);
}

#[test]
fn test_depth_write_discards_earlier_contents() {
    let (mut b, _) = builder();
    b.add_attachment(Attachment::new("depth", TextureFormat::D24_UNORM_S8_UINT))
        .add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(
            RenderPassDescription::new("prepass")
                .subpass(SubpassDescription::new("z").depth_stencil("depth", DepthStencilAccess::Write)),
        )
        .add_pass(
            RenderPassDescription::new("main").subpass(
                SubpassDescription::new("shade")
                    .color("present")
                    .depth_stencil("depth", DepthStencilAccess::Write),
            ),
        )
        .set_final_pass("main");

    let graph = b.compile().unwrap();

    let rewritten = graph.passes[1].attachment_use("depth").unwrap();
    assert_eq!(rewritten.load_op, LoadOp::Clear);
    assert_eq!(rewritten.stencil_load_op, LoadOp::Clear);
}

#[test]
fn test_depth_write_then_read_only() {
    let (mut b, _) = builder();
    b.add_attachment(Attachment::new("depth", TextureFormat::D32_FLOAT))
        .add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(
            RenderPassDescription::new("prepass")
                .subpass(SubpassDescription::new("z").depth_stencil("depth", DepthStencilAccess::Write)),
        )
        .add_pass(
            RenderPassDescription::new("main").subpass(
                SubpassDescription::new("shade")
                    .color("present")
                    .depth_stencil("depth", DepthStencilAccess::ReadOnly),
            ),
        )
        .set_final_pass("main");

    let graph = b.compile().unwrap();

    let written = graph.passes[0].attachment_use("depth").unwrap();
    assert_eq!(written.load_op, LoadOp::Clear);
    assert_eq!(written.store_op, StoreOp::Store);
    assert_eq!(written.final_layout, ImageLayout::DepthStencilAttachment);
    assert_eq!(written.stencil_load_op, LoadOp::DontCare);

    let read = graph.passes[1].attachment_use("depth").unwrap();
    assert_eq!(read.load_op, LoadOp::Load);
    assert_eq!(read.store_op, StoreOp::DontCare);
    assert_eq!(read.initial_layout, ImageLayout::DepthStencilAttachment);
    assert_eq!(read.final_layout, ImageLayout::ShaderReadOnly);
    assert_eq!(
        graph.passes[1].desc.subpasses[0].depth_stencil_attachment,
        Some(AttachmentReference { attachment: 1, layout: ImageLayout::DepthStencilReadOnly })
    );
}

#[test]
fn test_stencil_ops_follow_depth_access() {
    let (mut b, _) = builder();
    b.add_attachment(Attachment::new("ds", TextureFormat::D24_UNORM_S8_UINT))
        .add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(
            RenderPassDescription::new("main").subpass(
                SubpassDescription::new("draw")
                    .color("present")
                    .depth_stencil("ds", DepthStencilAccess::Write),
            ),
        )
        .set_final_pass("main");

    let graph = b.compile().unwrap();
    let ds = graph.passes[0].attachment_use("ds").unwrap();

    assert_eq!(ds.stencil_load_op, LoadOp::Clear);
    assert_eq!(ds.stencil_store_op, StoreOp::Store);
}

#[test]
fn test_preserve_only_attachment_keeps_contents() {
    let (mut b, _) = builder();
    b.add_attachment(Attachment::new("A", TextureFormat::R8G8B8A8_UNORM))
        .add_attachment(Attachment::new("B", TextureFormat::R8G8B8A8_UNORM))
        .add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(RenderPassDescription::new("one").subpass(SubpassDescription::new("draw").color("A")))
        .add_pass(
            RenderPassDescription::new("two")
                .subpass(SubpassDescription::new("draw").color("B").preserve("A")),
        )
        .add_pass(
            RenderPassDescription::new("three")
                .subpass(SubpassDescription::new("draw").input("A").input("B").color("present")),
        )
        .set_final_pass("three");

    let graph = b.compile().unwrap();
    let preserved = graph.passes[1].attachment_use("A").unwrap();

    assert_eq!(preserved.load_op, LoadOp::Load);
    assert_eq!(preserved.store_op, StoreOp::Store);
    assert_eq!(preserved.initial_layout, ImageLayout::ShaderReadOnly);
    assert_eq!(preserved.final_layout, preserved.initial_layout);
    assert_eq!(graph.passes[1].desc.subpasses[0].preserve_attachments, vec![1]);
}

#[test]
fn test_color_never_read_is_cleared_and_stored() {
    let graph = two_pass_graph();
    let a = graph.passes[0].attachment_use("A").unwrap();

    assert_eq!((a.load_op, a.store_op), (LoadOp::Clear, StoreOp::Store));
}

// ============================================================================
// FORMAT CHECKS
// ============================================================================

#[test]
fn test_depth_format_as_color_fails() {
    let (mut b, _) = builder();
    b.add_attachment(Attachment::new("depth", TextureFormat::D32_FLOAT))
        .add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(
            RenderPassDescription::new("main")
                .subpass(SubpassDescription::new("draw").color("depth").color("present")),
        )
        .set_final_pass("main")
        .set_final_output_attachment("present");

    assert!(matches!(compile_err(b), Error::GraphCompilation(_)));
}

#[test]
fn test_color_format_as_depth_fails() {
    let (mut b, _) = builder();
    b.add_attachment(Attachment::new("A", TextureFormat::R8G8B8A8_UNORM))
        .add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(
            RenderPassDescription::new("main").subpass(
                SubpassDescription::new("draw")
                    .color("present")
                    .depth_stencil("A", DepthStencilAccess::Write),
            ),
        )
        .set_final_pass("main");

    assert!(matches!(compile_err(b), Error::GraphCompilation(_)));
}

#[test]
fn test_resolve_count_mismatch_fails() {
    let (mut b, _) = builder();
    b.add_attachment(Attachment::new("msaa", TextureFormat::R8G8B8A8_UNORM).with_samples(4))
        .add_attachment(Attachment::new("resolved", TextureFormat::R8G8B8A8_UNORM))
        .add_attachment(Attachment::new("extra", TextureFormat::R8G8B8A8_UNORM))
        .add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(
            RenderPassDescription::new("main").subpass(
                SubpassDescription::new("draw")
                    .color("msaa")
                    .resolve("resolved")
                    .resolve("extra"),
            ),
        )
        .add_pass(
            RenderPassDescription::new("post")
                .subpass(SubpassDescription::new("blit").input("resolved").color("present")),
        )
        .set_final_pass("post");

    assert!(matches!(compile_err(b), Error::GraphCompilation(ref m) if m.contains("resolve")));
}

#[test]
fn test_resolve_attachment_is_stored() {
    let (mut b, _) = builder();
    b.add_attachment(Attachment::new("msaa", TextureFormat::R8G8B8A8_UNORM).with_samples(4))
        .add_attachment(Attachment::new("resolved", TextureFormat::R8G8B8A8_UNORM))
        .add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(
            RenderPassDescription::new("main")
                .subpass(SubpassDescription::new("draw").color("msaa").resolve("resolved")),
        )
        .add_pass(
            RenderPassDescription::new("post")
                .subpass(SubpassDescription::new("blit").input("resolved").color("present")),
        )
        .set_final_pass("post");

    let graph = b.compile().unwrap();
    let resolved = graph.passes[0].attachment_use("resolved").unwrap();

    assert_eq!(resolved.store_op, StoreOp::Store);
    assert_eq!(graph.passes[0].attachment_use("msaa").unwrap().samples, 4);
    assert_eq!(graph.passes[0].desc.subpasses[0].resolve_attachments.len(), 1);
}

// ============================================================================
// DEPENDENCIES
// ============================================================================

#[test]
fn test_external_dependencies_of_single_write() {
    let graph = two_pass_graph();

    let incoming = dependency(&graph, 0, SUBPASS_EXTERNAL, 0);
    assert_eq!(incoming.dst_stages, PipelineStages::COLOR_ATTACHMENT_OUTPUT);
    assert_eq!(incoming.src_access, AccessFlags::empty());
    assert_eq!(incoming.dst_access, AccessFlags::COLOR_ATTACHMENT_WRITE);

    let outgoing = dependency(&graph, 0, 0, SUBPASS_EXTERNAL);
    assert_eq!(outgoing.src_access, AccessFlags::COLOR_ATTACHMENT_WRITE);
    assert_eq!(outgoing.dst_stages, PipelineStages::FRAGMENT_SHADER);
    assert_eq!(outgoing.dst_access, AccessFlags::SHADER_READ);
    assert_eq!(graph.passes[0].desc.dependencies.len(), 2);
}

#[test]
fn test_loaded_attachment_waits_for_producer() {
    let graph = two_pass_graph();

    let incoming = dependency(&graph, 1, SUBPASS_EXTERNAL, 0);
    assert!(incoming.src_stages.contains(PipelineStages::COLOR_ATTACHMENT_OUTPUT));
    assert!(incoming.src_access.contains(AccessFlags::COLOR_ATTACHMENT_WRITE));
    assert!(incoming.dst_access.contains(AccessFlags::INPUT_ATTACHMENT_READ));
}

#[test]
fn test_presented_attachment_released_to_presentation() {
    let graph = two_pass_graph();

    let outgoing = dependency(&graph, 1, 0, SUBPASS_EXTERNAL);
    assert_eq!(outgoing.dst_stages, PipelineStages::BOTTOM_OF_PIPE);
    assert_eq!(outgoing.dst_access, AccessFlags::MEMORY_READ);
}

#[test]
fn test_write_then_input_read_creates_by_region_dependency() {
    let (mut b, _) = builder();
    b.add_attachment(Attachment::new("gbuffer", TextureFormat::R16G16B16A16_SFLOAT))
        .add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(
            RenderPassDescription::new("deferred")
                .subpass(SubpassDescription::new("fill").color("gbuffer"))
                .subpass(SubpassDescription::new("light").input("gbuffer").color("present")),
        )
        .set_final_pass("deferred");

    let graph = b.compile().unwrap();
    let hazard = dependency(&graph, 0, 0, 1);

    assert!(hazard.by_region);
    assert_eq!(hazard.src_stages, PipelineStages::COLOR_ATTACHMENT_OUTPUT);
    assert_eq!(hazard.src_access, AccessFlags::COLOR_ATTACHMENT_WRITE);
    assert_eq!(hazard.dst_stages, PipelineStages::FRAGMENT_SHADER);
    assert_eq!(hazard.dst_access, AccessFlags::INPUT_ATTACHMENT_READ);
}

#[test]
fn test_dependencies_are_merged_per_subpass_pair() {
    let graph = two_pass_graph();

    for pass in &graph.passes {
        let deps = &pass.desc.dependencies;
        for (i, a) in deps.iter().enumerate() {
            for b in &deps[i + 1..] {
                assert!((a.src_subpass, a.dst_subpass) != (b.src_subpass, b.dst_subpass));
            }
        }
    }
}

#[test]
fn test_declared_dependency() {
    let (mut b, _) = builder();
    b.add_attachment(Attachment::new("A", TextureFormat::R8G8B8A8_UNORM))
        .add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(
            RenderPassDescription::new("main")
                .subpass(SubpassDescription::new("first").color("A"))
                .subpass(SubpassDescription::new("second").color("present").depends_on("first")),
        )
        .set_final_pass("main")
        .set_final_output_attachment("present");

    let graph = b.compile().unwrap();
    let declared = dependency(&graph, 0, 0, 1);

    assert!(declared.by_region);
    assert!(declared.src_access.contains(AccessFlags::COLOR_ATTACHMENT_WRITE));
}

#[test]
fn test_declared_dependency_on_unknown_subpass_fails() {
    let (mut b, _) = builder();
    b.add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(
            RenderPassDescription::new("main")
                .subpass(SubpassDescription::new("draw").color("present").depends_on("nowhere")),
        )
        .set_final_pass("main");

    assert!(matches!(compile_err(b), Error::GraphCompilation(ref m) if m.contains("'nowhere'")));
}

#[test]
fn test_declared_dependency_on_later_subpass_fails() {
    let (mut b, _) = builder();
    b.add_attachment(Attachment::new("A", TextureFormat::R8G8B8A8_UNORM))
        .add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(
            RenderPassDescription::new("main")
                .subpass(SubpassDescription::new("first").color("A").depends_on("second"))
                .subpass(SubpassDescription::new("second").color("present")),
        )
        .set_final_pass("main")
        .set_final_output_attachment("present");

    assert!(matches!(compile_err(b), Error::GraphCompilation(_)));
}

// ============================================================================
// CLEAR VALUES
// ============================================================================

#[test]
fn test_default_clear_values() {
    let (mut b, _) = builder();
    b.add_attachment(Attachment::new("depth", TextureFormat::D32_FLOAT))
        .add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(
            RenderPassDescription::new("main").subpass(
                SubpassDescription::new("draw")
                    .color("present")
                    .depth_stencil("depth", DepthStencilAccess::Write),
            ),
        )
        .set_final_pass("main");

    let graph = b.compile().unwrap();

    assert_eq!(graph.passes[0].clear_values, vec![ClearValue::BLACK, ClearValue::FAR_DEPTH]);
}

#[test]
fn test_pass_clear_wins_over_subpass_clear() {
    let red = ClearValue::Color([1.0, 0.0, 0.0, 1.0]);
    let blue = ClearValue::Color([0.0, 0.0, 1.0, 1.0]);
    let (mut b, _) = builder();
    b.add_attachment(Attachment::new("A", TextureFormat::R8G8B8A8_UNORM))
        .add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(
            RenderPassDescription::new("main")
                .subpass(SubpassDescription::new("draw").color("A").color("present").clear("A", red).clear("present", red))
                .clear("present", blue),
        )
        .set_final_pass("main")
        .set_final_output_attachment("present");

    let graph = b.compile().unwrap();

    assert_eq!(graph.passes[0].clear_values, vec![red, blue]);
}

#[test]
fn test_clear_for_unused_attachment_is_ignored() {
    let (mut b, memory) = builder();
    b.add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(
            RenderPassDescription::new("main")
                .subpass(SubpassDescription::new("draw").color("present"))
                .clear("elsewhere", ClearValue::BLACK),
        )
        .set_final_pass("main");

    let graph = b.compile().unwrap();

    assert_eq!(graph.passes[0].clear_values.len(), 1);
    assert_eq!(memory.count(LogSeverity::Warn), 1);
    assert!(memory.contains("'elsewhere'"));
}

// ============================================================================
// CALLBACKS
// ============================================================================

#[test]
fn test_callbacks_kept_in_subpass_order() {
    let (mut b, _) = builder();
    b.add_attachment(Attachment::new("A", TextureFormat::R8G8B8A8_UNORM))
        .add_attachment(Attachment::new("present", TextureFormat::B8G8R8A8_SRGB))
        .add_pass(
            RenderPassDescription::new("main")
                .subpass(SubpassDescription::new("first").color("A").draw(|cmd| cmd.draw(3, 0)))
                .subpass(SubpassDescription::new("second").input("A"))
                .subpass(SubpassDescription::new("third").color("present").draw(|cmd| cmd.draw(6, 0))),
        )
        .set_final_pass("main")
        .set_final_output_attachment("present");

    let graph = b.compile().unwrap();
    let pass = &graph.passes[0];

    assert_eq!(pass.subpass_names, vec!["first", "second", "third"]);
    let present: Vec<bool> = pass.callbacks.iter().map(Option::is_some).collect();
    assert_eq!(present, vec![true, false, true]);
}
