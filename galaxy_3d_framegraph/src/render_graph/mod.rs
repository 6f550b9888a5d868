//! Frame graph
//!
//! Describes a frame as named attachments and render passes made of
//! subpasses, compiles the description into native render pass
//! descriptions, then instantiates and records them every frame.
//!
//! ```text
//! FrameGraphBuilder --compile()--> CompiledGraph --FrameGraph::new()--> FrameGraph
//!   (declarative)                   (pure data)     (native passes, framebuffers)
//! ```

mod attachment;
mod builder;
mod compiler;
mod graph_pass;
mod frame_graph;

pub use attachment::*;
pub use builder::FrameGraphBuilder;
pub use compiler::{AttachmentUse, CompiledGraph, CompiledRenderPass, ATTACHMENT_REST_LAYOUT};
pub use graph_pass::GraphPass;
pub use frame_graph::FrameGraph;

/// Log source of the frame graph
pub(crate) const SOURCE: &str = "galaxy3d::framegraph";
