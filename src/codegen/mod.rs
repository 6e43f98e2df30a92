//! Emitters: render the linked interface model into target source files.
//!
//! Each target is an [`Emitter`]; all of them read the same [`EmitContext`]
//! and share the union naming in [`crate::unions`], so a union used by two
//! targets gets one canonical name.

mod dap;
mod native;
mod template;
mod ui;

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::collector::Collectors;
use crate::component::Component;
use crate::error::{CodegenError, UnitFailure};
use crate::model::{DeclId, Model, SourceUnit};

pub use dap::{DapEmitter, RecordCodec};
pub use native::NativeEmitter;
pub use template::{tidy, TemplateEngine};
pub use ui::UiEmitter;

/// Output targets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Script-engine bindings (C++)
    Native,
    /// UI component base classes (Dart)
    Ui,
    /// Debug-protocol record codecs (C)
    Dap,
}

impl Target {
    pub const ALL: [Target; 3] = [Target::Native, Target::Ui, Target::Dap];

    pub fn name(self) -> &'static str {
        match self {
            Target::Native => "native",
            Target::Ui => "ui",
            Target::Dap => "dap",
        }
    }

    /// Output subdirectory for this target.
    pub fn dir(self) -> &'static str {
        self.name()
    }

    /// The emitter implementing this target.
    pub fn emitter(self) -> Box<dyn Emitter> {
        match self {
            Target::Native => Box::new(NativeEmitter),
            Target::Ui => Box::new(UiEmitter),
            Target::Dap => Box::new(DapEmitter),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One rendered file, with a path relative to the target's output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub contents: String,
}

impl GeneratedFile {
    pub fn new(path: impl Into<PathBuf>, contents: String) -> Self {
        Self {
            path: path.into(),
            contents,
        }
    }
}

/// Everything an emitter may read. Nothing here is mutated during emission.
pub struct EmitContext<'a> {
    pub model: &'a Model,
    pub collectors: &'a Collectors,
    /// Resolved component families, ordered by stem.
    pub components: &'a [Component],
    /// Declarations that failed to link and must not be emitted.
    pub failed_decls: &'a HashSet<DeclId>,
    /// Indices of global functions that failed to link.
    pub failed_functions: &'a HashSet<usize>,
}

impl EmitContext<'_> {
    /// Linked declarations of the batch, ordered by name.
    pub fn emittable_decls(&self) -> Vec<DeclId> {
        let mut ids: Vec<DeclId> = self
            .model
            .decl_ids()
            .filter(|id| !self.failed_decls.contains(id))
            .collect();
        ids.sort_by(|a, b| self.model.decl(*a).name.cmp(&self.model.decl(*b).name));
        ids
    }
}

/// Output of one emitter run.
#[derive(Debug, Default)]
pub struct Rendered {
    pub files: Vec<GeneratedFile>,
    /// Components or declarations the target could not express. Their files
    /// are missing from `files`; every other unit is still rendered.
    pub failures: Vec<UnitFailure>,
}

/// A code generation backend.
pub trait Emitter {
    /// Render every file of this target. Output is sorted by path and
    /// depends only on the context, never on wall-clock or environment.
    fn render(
        &self,
        ctx: &EmitContext<'_>,
        engine: &TemplateEngine<'_>,
    ) -> Result<Rendered, CodegenError>;
}

/// The first line of every generated file.
pub fn banner(target: Target, comment: &str) -> String {
    format!("{comment} Generated by idl-bindgen ({target} target). Do not edit.")
}

/// Banner plus the declaration files a generated file was produced from.
#[derive(Debug, Clone, Serialize)]
pub struct Header {
    pub banner: String,
    pub sources: Vec<String>,
}

impl Header {
    pub fn new(target: Target, comment: &str, sources: impl IntoIterator<Item = String>) -> Self {
        let mut sources: Vec<String> = sources.into_iter().collect();
        sources.sort();
        sources.dedup();
        Self {
            banner: banner(target, comment),
            sources,
        }
    }
}

/// Split documentation text into trimmed lines.
pub fn doc_lines(doc: Option<&str>) -> Vec<String> {
    doc.map(|d| d.lines().map(|l| l.trim().to_string()).collect())
        .unwrap_or_default()
}

/// A unit's relative path with `/` separators on every platform.
pub fn source_name(unit: &SourceUnit) -> String {
    unit.path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// A C identifier fragment for an arbitrary member name.
pub fn c_ident(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn sort_files(files: &mut [GeneratedFile]) {
    files.sort_by(|a, b| a.path.cmp(&b.path));
}
