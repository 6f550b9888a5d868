/// Frame graph builder
///
/// Collects attachments and render passes, then hands them to the compiler.
/// Passes keep their insertion order; the final pass is moved last at
/// compile time.

use std::sync::Arc;
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::log::Logger;
use crate::render_graph::compiler::{self, CompiledGraph};
use crate::render_graph::{Attachment, RenderPassDescription, SOURCE};
use crate::engine_warn;

pub struct FrameGraphBuilder {
    pub(crate) attachments: Vec<Attachment>,
    pub(crate) attachment_index: FxHashMap<String, usize>,
    pub(crate) passes: Vec<RenderPassDescription>,
    pub(crate) final_pass: Option<String>,
    pub(crate) final_output: Option<String>,
    pub(crate) logger: Arc<dyn Logger>,
}

impl FrameGraphBuilder {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            attachments: Vec::new(),
            attachment_index: FxHashMap::default(),
            passes: Vec::new(),
            final_pass: None,
            final_output: None,
            logger,
        }
    }

    /// Declare an attachment. Redeclaring a name replaces the previous one.
    pub fn add_attachment(&mut self, attachment: Attachment) -> &mut Self {
        match self.attachment_index.get(&attachment.name) {
            Some(&index) => {
                engine_warn!(self.logger, SOURCE, "Attachment '{}' redeclared, replacing", attachment.name);
                self.attachments[index] = attachment;
            }
            None => {
                self.attachment_index.insert(attachment.name.clone(), self.attachments.len());
                self.attachments.push(attachment);
            }
        }
        self
    }

    /// Add a render pass. Adding a name twice replaces the earlier pass in place.
    pub fn add_pass(&mut self, pass: RenderPassDescription) -> &mut Self {
        match self.passes.iter().position(|p| p.name == pass.name) {
            Some(index) => {
                engine_warn!(self.logger, SOURCE, "Render pass '{}' added twice, replacing", pass.name);
                self.passes[index] = pass;
            }
            None => self.passes.push(pass),
        }
        self
    }

    /// Name the pass whose color output is presented
    pub fn set_final_pass(&mut self, name: &str) -> &mut Self {
        self.final_pass = Some(name.to_string());
        self
    }

    /// Name the presented attachment explicitly
    ///
    /// Defaults to the first color attachment of the final pass.
    pub fn set_final_output_attachment(&mut self, name: &str) -> &mut Self {
        self.final_output = Some(name.to_string());
        self
    }

    pub fn attachment(&self, name: &str) -> Option<&Attachment> {
        self.attachment_index.get(name).map(|&i| &self.attachments[i])
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Validate the description and derive every attachment use
    ///
    /// No GPU object is created.
    pub fn compile(self) -> Result<CompiledGraph> {
        compiler::compile(self)
    }
}
