/// Render graph compiler
///
/// Turns a `FrameGraphBuilder` into one ready-to-create `RenderPassDesc` per
/// pass. Everything the native pass needs (load/store operations, layouts,
/// subpass references, dependencies, clear values) is derived from how the
/// subpasses reference attachments; none of it is user-specified.
///
/// Attachment indices follow first-seen order: subpasses in declaration
/// order, and inside a subpass inputs, colors, resolves, preserves then
/// depth-stencil.
///
/// Between passes an attachment rests in the layout the previous pass left
/// it in. Attachments nobody touched yet rest in `ShaderReadOnly`, the
/// layout their backing image is created in.

use std::sync::Arc;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{Error, Result};
use crate::graphics_device::{
    AccessFlags, AttachmentDescription, AttachmentReference, ClearValue, ImageLayout,
    LoadOp, PipelineStages, RenderPassDesc, StoreOp, SubpassDependency, SubpassLayout,
    TextureFormat, SUBPASS_EXTERNAL,
};
use crate::log::Logger;
use crate::render_graph::{
    Attachment, DepthStencilAccess, FrameGraphBuilder, RenderPassDescription,
    SubpassCallback, SubpassDescription, SOURCE,
};
use crate::{engine_debug, engine_error, engine_warn};

/// Layout of an attachment no pass has used yet
pub const ATTACHMENT_REST_LAYOUT: ImageLayout = ImageLayout::ShaderReadOnly;

/// Derived state of one attachment inside one render pass
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentUse {
    pub name: String,
    /// Index in the pass attachment array
    pub index: u32,
    pub format: TextureFormat,
    pub samples: u32,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub initial_layout: ImageLayout,
    pub final_layout: ImageLayout,
    /// First subpass referencing the attachment
    pub first_subpass: u32,
    /// Last subpass referencing the attachment
    pub last_subpass: u32,
    /// Backed by the swapchain image
    pub is_presented: bool,
}

/// One compiled render pass, ready for native creation
pub struct CompiledRenderPass {
    pub name: String,
    pub desc: RenderPassDesc,
    /// Attachment uses, in attachment index order
    pub attachments: Vec<AttachmentUse>,
    /// One clear value per attachment, in attachment index order
    pub clear_values: Vec<ClearValue>,
    pub subpass_names: Vec<String>,
    pub(crate) callbacks: Vec<Option<SubpassCallback>>,
    pub is_final: bool,
}

impl CompiledRenderPass {
    pub fn attachment_use(&self, name: &str) -> Option<&AttachmentUse> {
        self.attachments.iter().find(|a| a.name == name)
    }

    /// Index of the swapchain-backed attachment, if this pass has one
    pub fn presented_index(&self) -> Option<usize> {
        self.attachments.iter().position(|a| a.is_presented)
    }
}

/// Output of the compiler
pub struct CompiledGraph {
    /// Every declared attachment
    pub attachments: Vec<Attachment>,
    /// Passes in execution order; the final pass is last
    pub passes: Vec<CompiledRenderPass>,
    /// Attachment backed by the swapchain image
    pub present_attachment: String,
    pub(crate) logger: Arc<dyn Logger>,
}

impl CompiledGraph {
    pub fn pass(&self, name: &str) -> Option<&CompiledRenderPass> {
        self.passes.iter().find(|p| p.name == name)
    }

    pub fn pass_index(&self, name: &str) -> Option<usize> {
        self.passes.iter().position(|p| p.name == name)
    }
}

// ===== SCAN =====

/// Access of one attachment by one subpass
#[derive(Debug, Clone, Copy)]
struct SubpassUse {
    subpass: u32,
    stages: PipelineStages,
    access: AccessFlags,
    writes: bool,
}

#[derive(Default)]
struct Scan {
    input: bool,
    color: bool,
    resolve: bool,
    preserve: bool,
    depth_read: bool,
    depth_write: bool,
    first: Option<u32>,
    last: u32,
    uses: Vec<SubpassUse>,
}

impl Scan {
    fn touch(&mut self, subpass: u32) {
        self.first = Some(self.first.map_or(subpass, |f| f.min(subpass)));
        self.last = self.last.max(subpass);
    }

    fn record(&mut self, subpass: u32, stages: PipelineStages, access: AccessFlags, writes: bool) {
        self.touch(subpass);
        match self.uses.last_mut() {
            Some(last) if last.subpass == subpass => {
                last.stages |= stages;
                last.access |= access;
                last.writes |= writes;
            }
            _ => self.uses.push(SubpassUse { subpass, stages, access, writes }),
        }
    }

    fn loads(&self) -> bool {
        self.input || self.depth_read || self.is_preserve_only()
    }

    fn writes(&self) -> bool {
        self.color || self.resolve || self.depth_write
    }

    fn is_preserve_only(&self) -> bool {
        self.preserve && self.uses.is_empty()
    }
}

// ===== ENTRY POINT =====

fn graph_error(logger: &Arc<dyn Logger>, message: String) -> Error {
    engine_error!(logger, SOURCE, "{}", message);
    Error::GraphCompilation(message)
}

pub(crate) fn compile(builder: FrameGraphBuilder) -> Result<CompiledGraph> {
    let FrameGraphBuilder {
        attachments,
        mut passes,
        final_pass,
        final_output,
        logger,
        ..
    } = builder;

    let attachment_index: FxHashMap<&str, usize> = attachments
        .iter()
        .enumerate()
        .map(|(i, a)| (a.name.as_str(), i))
        .collect();

    // Final pass last
    let final_name = final_pass
        .ok_or_else(|| graph_error(&logger, "No final render pass set".to_string()))?;
    let final_position = passes
        .iter()
        .position(|p| p.name == final_name)
        .ok_or_else(|| graph_error(&logger, format!("Final render pass '{}' not found", final_name)))?;
    let final_desc = passes.remove(final_position);
    passes.push(final_desc);
    let final_index = passes.len() - 1;

    let present = resolve_present_attachment(&passes[final_index], final_output, &logger)?;
    for pass in &passes[..final_index] {
        let uses_present = pass
            .subpasses
            .iter()
            .any(|s| s.referenced_attachments().any(|name| name == present));
        if uses_present {
            return Err(graph_error(
                &logger,
                format!(
                    "Presentation attachment '{}' is referenced by non-final pass '{}'",
                    present, pass.name
                ),
            ));
        }
    }

    // names referenced by passes after index i
    let mut referenced_later: Vec<FxHashSet<String>> = vec![FxHashSet::default(); passes.len()];
    for i in (0..passes.len().saturating_sub(1)).rev() {
        let mut later = referenced_later[i + 1].clone();
        for subpass in &passes[i + 1].subpasses {
            later.extend(subpass.referenced_attachments().map(str::to_string));
        }
        referenced_later[i] = later;
    }

    let mut rest_layouts: FxHashMap<String, ImageLayout> = FxHashMap::default();
    let mut compiled = Vec::with_capacity(passes.len());
    for (i, pass) in passes.into_iter().enumerate() {
        let context = PassContext {
            attachments: &attachments,
            attachment_index: &attachment_index,
            is_final: i == final_index,
            present: &present,
            referenced_later: &referenced_later[i],
            logger: &logger,
        };
        let compiled_pass = compile_pass(pass, &context, &mut rest_layouts)?;
        compiled.push(compiled_pass);
    }
    drop(attachment_index);

    engine_debug!(
        logger,
        SOURCE,
        "Compiled {} render passes, presenting '{}'",
        compiled.len(),
        present
    );

    Ok(CompiledGraph {
        attachments,
        passes: compiled,
        present_attachment: present,
        logger,
    })
}

fn resolve_present_attachment(
    final_pass: &RenderPassDescription,
    explicit: Option<String>,
    logger: &Arc<dyn Logger>,
) -> Result<String> {
    let mut colors = final_pass
        .subpasses
        .iter()
        .flat_map(|s| s.color_attachments.iter());
    match explicit {
        Some(name) => {
            if colors.any(|c| *c == name) {
                Ok(name)
            } else {
                Err(graph_error(
                    logger,
                    format!(
                        "Final output attachment '{}' is not a color output of final pass '{}'",
                        name, final_pass.name
                    ),
                ))
            }
        }
        None => colors.next().cloned().ok_or_else(|| {
            graph_error(
                logger,
                format!("Final pass '{}' has no color output to present", final_pass.name),
            )
        }),
    }
}

// ===== PER-PASS COMPILATION =====

struct PassContext<'a> {
    attachments: &'a [Attachment],
    attachment_index: &'a FxHashMap<&'a str, usize>,
    is_final: bool,
    present: &'a str,
    referenced_later: &'a FxHashSet<String>,
    logger: &'a Arc<dyn Logger>,
}

fn compile_pass(
    pass: RenderPassDescription,
    ctx: &PassContext<'_>,
    rest_layouts: &mut FxHashMap<String, ImageLayout>,
) -> Result<CompiledRenderPass> {
    let RenderPassDescription { name: pass_name, subpasses, clear_values: pass_clears } = pass;

    // 1-2. union of referenced names in first-seen order, dense indices
    let mut used: Vec<&Attachment> = Vec::new();
    let mut local_index: FxHashMap<String, u32> = FxHashMap::default();
    for subpass in &subpasses {
        for name in subpass.referenced_attachments() {
            let Some(&global) = ctx.attachment_index.get(name) else {
                return Err(graph_error(
                    ctx.logger,
                    format!(
                        "Render pass '{}' subpass '{}' references unknown attachment '{}'",
                        pass_name, subpass.name, name
                    ),
                ));
            };
            if !local_index.contains_key(name) {
                local_index.insert(name.to_string(), used.len() as u32);
                used.push(&ctx.attachments[global]);
            }
        }
    }

    // 3-4. subpass references and usage scan
    let mut scans: Vec<Scan> = (0..used.len()).map(|_| Scan::default()).collect();
    let mut layouts = Vec::with_capacity(subpasses.len());
    let subpass_names: Vec<String> = subpasses.iter().map(|s| s.name.clone()).collect();

    for (s, subpass) in subpasses.iter().enumerate() {
        let s = s as u32;
        let mut layout = SubpassLayout::default();
        let where_ = || format!("render pass '{}' subpass '{}'", pass_name, subpass.name);

        for name in &subpass.input_attachments {
            let index = local_index[name.as_str()];
            scans[index as usize].input = true;
            scans[index as usize].record(
                s,
                PipelineStages::FRAGMENT_SHADER,
                AccessFlags::INPUT_ATTACHMENT_READ,
                false,
            );
            layout.input_attachments.push(AttachmentReference {
                attachment: index,
                layout: ImageLayout::ShaderReadOnly,
            });
        }

        for name in &subpass.color_attachments {
            let index = local_index[name.as_str()];
            if used[index as usize].format.is_depth() {
                return Err(graph_error(
                    ctx.logger,
                    format!("{}: depth attachment '{}' used as color output", where_(), name),
                ));
            }
            scans[index as usize].color = true;
            scans[index as usize].record(
                s,
                PipelineStages::COLOR_ATTACHMENT_OUTPUT,
                AccessFlags::COLOR_ATTACHMENT_WRITE,
                true,
            );
            layout.color_attachments.push(AttachmentReference {
                attachment: index,
                layout: ImageLayout::ColorAttachment,
            });
        }

        if !subpass.resolve_attachments.is_empty()
            && subpass.resolve_attachments.len() != subpass.color_attachments.len()
        {
            return Err(graph_error(
                ctx.logger,
                format!(
                    "{}: {} resolve attachments for {} color attachments",
                    where_(),
                    subpass.resolve_attachments.len(),
                    subpass.color_attachments.len()
                ),
            ));
        }
        for name in &subpass.resolve_attachments {
            let index = local_index[name.as_str()];
            scans[index as usize].resolve = true;
            scans[index as usize].record(
                s,
                PipelineStages::COLOR_ATTACHMENT_OUTPUT,
                AccessFlags::COLOR_ATTACHMENT_WRITE,
                true,
            );
            layout.resolve_attachments.push(AttachmentReference {
                attachment: index,
                layout: ImageLayout::ColorAttachment,
            });
        }

        for name in &subpass.preserve_attachments {
            let index = local_index[name.as_str()];
            scans[index as usize].preserve = true;
            scans[index as usize].touch(s);
            layout.preserve_attachments.push(index);
        }

        if let Some((name, access)) = &subpass.depth_stencil {
            let index = local_index[name.as_str()];
            if !used[index as usize].format.is_depth() {
                return Err(graph_error(
                    ctx.logger,
                    format!("{}: '{}' is not a depth format but used as depth-stencil", where_(), name),
                ));
            }
            let scan = &mut scans[index as usize];
            scan.depth_read |= access.reads();
            scan.depth_write |= access.writes();
            let mut flags = AccessFlags::empty();
            if access.reads() {
                flags |= AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ;
            }
            if access.writes() {
                flags |= AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
            }
            scan.record(
                s,
                PipelineStages::EARLY_FRAGMENT_TESTS | PipelineStages::LATE_FRAGMENT_TESTS,
                flags,
                access.writes(),
            );
            let reference_layout = if *access == DepthStencilAccess::ReadOnly {
                ImageLayout::DepthStencilReadOnly
            } else {
                ImageLayout::DepthStencilAttachment
            };
            layout.depth_stencil_attachment = Some(AttachmentReference {
                attachment: index,
                layout: reference_layout,
            });
        }

        layouts.push(layout);
    }

    // attachment descriptions
    let mut uses = Vec::with_capacity(used.len());
    for (index, attachment) in used.iter().enumerate() {
        let scan = &scans[index];
        let rest = rest_layouts
            .get(&attachment.name)
            .copied()
            .unwrap_or(ATTACHMENT_REST_LAYOUT);
        let is_presented = ctx.is_final && attachment.name == ctx.present;
        let attachment_use = describe_attachment(attachment, index as u32, scan, rest, is_presented, ctx);
        rest_layouts.insert(attachment.name.clone(), attachment_use.final_layout);
        uses.push(attachment_use);
    }

    // 5. dependencies
    let dependencies = infer_dependencies(&pass_name, &subpasses, &scans, &uses, ctx)?;

    let clear_values = gather_clear_values(&pass_name, &subpasses, &pass_clears, &local_index, &uses, ctx);

    let desc = RenderPassDesc {
        attachments: uses
            .iter()
            .map(|u| AttachmentDescription {
                format: u.format,
                samples: u.samples,
                load_op: u.load_op,
                store_op: u.store_op,
                stencil_load_op: u.stencil_load_op,
                stencil_store_op: u.stencil_store_op,
                initial_layout: u.initial_layout,
                final_layout: u.final_layout,
            })
            .collect(),
        subpasses: layouts,
        dependencies,
    };

    // 6. callbacks in subpass order
    let callbacks = subpasses.into_iter().map(|s| s.draw).collect();

    Ok(CompiledRenderPass {
        name: pass_name,
        desc,
        attachments: uses,
        clear_values,
        subpass_names,
        callbacks,
        is_final: ctx.is_final,
    })
}

fn describe_attachment(
    attachment: &Attachment,
    index: u32,
    scan: &Scan,
    rest: ImageLayout,
    is_presented: bool,
    ctx: &PassContext<'_>,
) -> AttachmentUse {
    let is_depth = attachment.format.is_depth();
    let needed_later = ctx.referenced_later.contains(&attachment.name);

    let load_op = if scan.loads() { LoadOp::Load } else { LoadOp::Clear };
    let store_op = if scan.writes() || scan.preserve || (needed_later && scan.loads()) {
        StoreOp::Store
    } else {
        StoreOp::DontCare
    };

    let (stencil_load_op, stencil_store_op) = if attachment.format.has_stencil() {
        (
            if scan.depth_read { LoadOp::Load } else { LoadOp::Clear },
            if scan.depth_write || (needed_later && scan.depth_read) {
                StoreOp::Store
            } else {
                StoreOp::DontCare
            },
        )
    } else {
        (LoadOp::DontCare, StoreOp::DontCare)
    };

    let initial_layout = if scan.loads() { rest } else { ImageLayout::Undefined };

    let final_layout = if is_presented {
        ImageLayout::PresentSrc
    } else if is_depth && scan.depth_write {
        ImageLayout::DepthStencilAttachment
    } else if scan.is_preserve_only() {
        initial_layout
    } else {
        ImageLayout::ShaderReadOnly
    };

    // a presented attachment never carries content in
    let initial_layout = if is_presented { ImageLayout::Undefined } else { initial_layout };
    let load_op = if is_presented && !scan.input { LoadOp::Clear } else { load_op };

    AttachmentUse {
        name: attachment.name.clone(),
        index,
        format: attachment.format,
        samples: attachment.samples,
        load_op,
        store_op: if is_presented { StoreOp::Store } else { store_op },
        stencil_load_op,
        stencil_store_op,
        initial_layout,
        final_layout,
        first_subpass: scan.first.unwrap_or(0),
        last_subpass: scan.last,
        is_presented,
    }
}

fn merge_dependency(dependencies: &mut Vec<SubpassDependency>, dependency: SubpassDependency) {
    match dependencies
        .iter_mut()
        .find(|d| d.src_subpass == dependency.src_subpass && d.dst_subpass == dependency.dst_subpass)
    {
        Some(existing) => {
            existing.src_stages |= dependency.src_stages;
            existing.dst_stages |= dependency.dst_stages;
            existing.src_access |= dependency.src_access;
            existing.dst_access |= dependency.dst_access;
            existing.by_region &= dependency.by_region;
        }
        None => dependencies.push(dependency),
    }
}

/// Writer stage/access of an attachment in the pass that produced it
fn producer_masks(format: TextureFormat) -> (PipelineStages, AccessFlags) {
    if format.is_depth() {
        (PipelineStages::LATE_FRAGMENT_TESTS, AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
    } else {
        (PipelineStages::COLOR_ATTACHMENT_OUTPUT, AccessFlags::COLOR_ATTACHMENT_WRITE)
    }
}

fn infer_dependencies(
    pass_name: &str,
    subpasses: &[SubpassDescription],
    scans: &[Scan],
    uses: &[AttachmentUse],
    ctx: &PassContext<'_>,
) -> Result<Vec<SubpassDependency>> {
    let mut dependencies = Vec::new();

    // external -> first use
    for (scan, attachment_use) in scans.iter().zip(uses) {
        let Some(first) = scan.uses.first() else { continue };
        let (src_stages, src_access) = if attachment_use.load_op == LoadOp::Load {
            producer_masks(attachment_use.format)
        } else {
            (first.stages, AccessFlags::empty())
        };
        merge_dependency(
            &mut dependencies,
            SubpassDependency {
                src_subpass: SUBPASS_EXTERNAL,
                dst_subpass: first.subpass,
                src_stages: src_stages | first.stages,
                dst_stages: first.stages,
                src_access,
                dst_access: first.access,
                by_region: false,
            },
        );
    }

    // hazards between consecutive uses
    for scan in scans {
        for pair in scan.uses.windows(2) {
            let (before, after) = (pair[0], pair[1]);
            if before.writes || after.writes {
                merge_dependency(
                    &mut dependencies,
                    SubpassDependency {
                        src_subpass: before.subpass,
                        dst_subpass: after.subpass,
                        src_stages: before.stages,
                        dst_stages: after.stages,
                        src_access: before.access,
                        dst_access: after.access,
                        by_region: true,
                    },
                );
            }
        }
    }

    // declared dependencies
    for (dst, subpass) in subpasses.iter().enumerate() {
        for dependency in &subpass.dependencies {
            let src = subpasses.iter().position(|s| s.name == *dependency);
            match src {
                Some(src) if src < dst => merge_dependency(
                    &mut dependencies,
                    SubpassDependency {
                        src_subpass: src as u32,
                        dst_subpass: dst as u32,
                        src_stages: PipelineStages::COLOR_ATTACHMENT_OUTPUT
                            | PipelineStages::LATE_FRAGMENT_TESTS,
                        dst_stages: PipelineStages::FRAGMENT_SHADER
                            | PipelineStages::EARLY_FRAGMENT_TESTS
                            | PipelineStages::COLOR_ATTACHMENT_OUTPUT,
                        src_access: AccessFlags::COLOR_ATTACHMENT_WRITE
                            | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                        dst_access: AccessFlags::INPUT_ATTACHMENT_READ
                            | AccessFlags::COLOR_ATTACHMENT_READ
                            | AccessFlags::COLOR_ATTACHMENT_WRITE
                            | AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ,
                        by_region: true,
                    },
                ),
                Some(_) => {
                    return Err(graph_error(
                        ctx.logger,
                        format!(
                            "Render pass '{}' subpass '{}' depends on '{}', which does not precede it",
                            pass_name, subpass.name, dependency
                        ),
                    ))
                }
                None => {
                    return Err(graph_error(
                        ctx.logger,
                        format!(
                            "Render pass '{}' subpass '{}' depends on unknown subpass '{}'",
                            pass_name, subpass.name, dependency
                        ),
                    ))
                }
            }
        }
    }

    // last write -> later readers outside the pass
    for (scan, attachment_use) in scans.iter().zip(uses) {
        let Some(last) = scan.uses.iter().rev().find(|u| u.writes) else { continue };
        let (dst_stages, dst_access) = if attachment_use.is_presented {
            (PipelineStages::BOTTOM_OF_PIPE, AccessFlags::MEMORY_READ)
        } else {
            (PipelineStages::FRAGMENT_SHADER, AccessFlags::SHADER_READ)
        };
        merge_dependency(
            &mut dependencies,
            SubpassDependency {
                src_subpass: last.subpass,
                dst_subpass: SUBPASS_EXTERNAL,
                src_stages: last.stages,
                dst_stages,
                src_access: last.access,
                dst_access,
                by_region: false,
            },
        );
    }

    Ok(dependencies)
}

fn gather_clear_values(
    pass_name: &str,
    subpasses: &[SubpassDescription],
    pass_clears: &[(String, ClearValue)],
    local_index: &FxHashMap<String, u32>,
    uses: &[AttachmentUse],
    ctx: &PassContext<'_>,
) -> Vec<ClearValue> {
    let mut values: Vec<Option<ClearValue>> = vec![None; uses.len()];
    let overrides = subpasses
        .iter()
        .flat_map(|s| s.clear_values.iter())
        .chain(pass_clears.iter());
    for (name, value) in overrides {
        match local_index.get(name) {
            Some(&index) => values[index as usize] = Some(*value),
            None => engine_warn!(
                ctx.logger,
                SOURCE,
                "Render pass '{}': clear value for unused attachment '{}' ignored",
                pass_name,
                name
            ),
        }
    }
    values
        .into_iter()
        .zip(uses)
        .map(|(value, u)| {
            value.unwrap_or(if u.format.is_depth() {
                ClearValue::FAR_DEPTH
            } else {
                ClearValue::BLACK
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "compiler_tests.rs"]
mod tests;
