//! Multi-target binding generator for ambient IDL declaration files.
//!
//! A batch of `*.d.ts` declarations is analyzed into one interface model,
//! linked in a second pass, grouped into UI component families, and rendered
//! by up to three emitters: native script-engine bindings, UI base classes
//! and debug-protocol record codecs.

#![allow(clippy::collapsible_if, clippy::collapsible_else_if)]

mod analyzer;
mod codegen;
mod collector;
mod component;
mod config;
mod diagnostic;
mod error;
mod lexer;
mod model;
mod naming;
mod orchestrator;
mod parser;
mod resolver;
mod syntax;
mod types;
mod unions;
mod writer;

pub use analyzer::{parse_unit, AnalyzeOptions, Analyzer};
pub use codegen::{
    tidy, DapEmitter, EmitContext, Emitter, GeneratedFile, NativeEmitter, RecordCodec, Rendered,
    Target, TemplateEngine, UiEmitter,
};
pub use collector::{Collectors, DefinedPropertyCollector, UnionTypeCollector};
pub use component::{resolve_components, Component, ComponentFamily, ComponentSet, FamilyRole};
pub use config::{BindgenConfig, CONFIG_FILE, DEFAULT_EXTERN_TYPES};
pub use diagnostic::{report_error, SourceDb};
pub use error::{
    AnalysisError, CodecError, CodegenError, ConfigError, GenerateError, ResolveError, UnitError,
    UnitFailure,
};
pub use model::{
    DeclId, DeclKind, Declaration, Member, MemberKind, MemberModes, Model, PrimitiveKind,
    SourceUnit, TypeRef,
};
pub use orchestrator::{
    discover, Batch, GenerateOptions, GenerationReport, Orchestrator, TargetOutput,
};
pub use parser::{parse, ParseError};
pub use resolver::{link, LinkReport};
pub use writer::{OutputWriter, WriteStatus};
