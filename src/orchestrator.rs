//! Batch driver: analysis of every unit (pass 1), linking and component
//! grouping (pass 2), then the requested emitters.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::analyzer::{parse_unit, AnalyzeOptions, Analyzer};
use crate::codegen::{EmitContext, Emitter, GeneratedFile, Target, TemplateEngine};
use crate::collector::Collectors;
use crate::component::{resolve_components, Component};
use crate::config::BindgenConfig;
use crate::error::{GenerateError, UnitFailure};
use crate::model::{Model, SourceUnit};
use crate::resolver::{link, LinkReport};
use crate::syntax::IdlFile;
use crate::writer::{OutputWriter, WriteStatus};

/// Declaration-only file that is never part of a batch.
const AMBIENT_FILE: &str = "global.d.ts";

/// Settings of one orchestrator.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub targets: Vec<Target>,
    /// Component stems to emit; all components when `None`.
    pub components: Option<Vec<String>>,
    /// Host types accepted as external references.
    pub extern_types: Vec<String>,
    pub analyze: AnalyzeOptions,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self::from_config(&BindgenConfig::default())
    }
}

impl GenerateOptions {
    pub fn from_config(config: &BindgenConfig) -> Self {
        Self {
            targets: config.generate.targets(),
            components: config.generate.components.clone(),
            extern_types: config.types.extern_types(),
            analyze: config.analyze_options(),
        }
    }
}

/// The analyzed and linked state of one batch.
#[derive(Debug, Default)]
pub struct Batch {
    pub model: Model,
    pub collectors: Collectors,
    pub link: LinkReport,
    pub components: Vec<Component>,
    pub failures: Vec<UnitFailure>,
}

/// Files rendered for one target.
#[derive(Debug, Clone)]
pub struct TargetOutput {
    pub target: Target,
    pub files: Vec<GeneratedFile>,
}

/// Outcome of a `generate` or `check` run.
#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    /// Units analyzed.
    pub units: usize,
    /// Declarations in the batch.
    pub declarations: usize,
    /// Stems of the emitted components.
    pub components: Vec<String>,
    pub outputs: Vec<TargetOutput>,
    /// Units that produced no output.
    pub failures: Vec<UnitFailure>,
    pub written: usize,
    pub unchanged: usize,
}

impl GenerationReport {
    pub fn file_count(&self) -> usize {
        self.outputs.iter().map(|o| o.files.len()).sum()
    }

    /// Files of one target, if it ran.
    pub fn files(&self, target: Target) -> &[GeneratedFile] {
        self.outputs
            .iter()
            .find(|o| o.target == target)
            .map(|o| o.files.as_slice())
            .unwrap_or(&[])
    }
}

struct CachedParse {
    text: String,
    file: IdlFile,
}

/// Drives batches through analysis, resolution and emission.
pub struct Orchestrator<'a> {
    options: GenerateOptions,
    engine: TemplateEngine<'a>,
    parse_cache: HashMap<PathBuf, CachedParse>,
    units: Vec<SourceUnit>,
    batch: Option<Batch>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(options: GenerateOptions) -> Result<Self, GenerateError> {
        Ok(Self {
            options,
            engine: TemplateEngine::new()?,
            parse_cache: HashMap::new(),
            units: Vec::new(),
            batch: None,
        })
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    /// Units of the most recent batch, sorted by path. Kept after a failed
    /// run so errors can be rendered against the source.
    pub fn units(&self) -> &[SourceUnit] {
        &self.units
    }

    /// State of the most recent successfully analyzed batch.
    pub fn batch(&self) -> Option<&Batch> {
        self.batch.as_ref()
    }

    /// Forget parsed files and the previous batch's model and collectors.
    pub fn clear_caches(&mut self) {
        debug!(cached = self.parse_cache.len(), "clearing caches");
        self.parse_cache.clear();
        self.units.clear();
        if let Some(batch) = &mut self.batch {
            batch.collectors.clear();
        }
        self.batch = None;
    }

    /// Run pass 1 and pass 2 over `units`.
    pub fn analyze(&mut self, mut units: Vec<SourceUnit>) -> Result<&Batch, GenerateError> {
        units.sort_by(|a, b| a.path.cmp(&b.path));
        self.units = units;
        self.batch = None;

        let mut batch = Batch::default();
        batch.model.units = self.units.clone();

        for idx in 0..batch.model.units.len() {
            let unit = &batch.model.units[idx];
            let reuse = self
                .parse_cache
                .get(&unit.path)
                .map_or(false, |cached| cached.text == unit.text);
            if !reuse {
                let file = parse_unit(unit)?;
                self.parse_cache.insert(
                    unit.path.clone(),
                    CachedParse {
                        text: unit.text.clone(),
                        file,
                    },
                );
            } else {
                debug!(file = %unit.path.display(), "reusing parsed file");
            }
            let Some(cached) = self.parse_cache.get(&batch.model.units[idx].path) else {
                continue;
            };
            Analyzer::new(&mut batch.model, &mut batch.collectors, &self.options.analyze)
                .analyze(idx, &cached.file)?;
        }

        batch.link = link(
            &mut batch.model,
            &mut batch.collectors,
            &self.options.extern_types,
        )?;
        let set = resolve_components(
            &batch.model,
            &batch.link.failed_decls,
            self.options.components.as_deref(),
        );
        batch.components = set.components;
        batch.failures = batch.link.failures.clone();
        batch.failures.extend(set.failures);
        for failure in &batch.failures {
            warn!(unit = %failure.unit, "{}", failure.error);
        }

        Ok(self.batch.insert(batch))
    }

    /// Analyze and link without emitting.
    pub fn check(&mut self, units: Vec<SourceUnit>) -> Result<GenerationReport, GenerateError> {
        let batch = self.analyze(units)?;
        let report = summary(batch);
        info!(
            units = report.units,
            declarations = report.declarations,
            failures = report.failures.len(),
            "checked batch"
        );
        Ok(report)
    }

    /// Analyze `units` and render every configured target in memory.
    pub fn generate(&mut self, units: Vec<SourceUnit>) -> Result<GenerationReport, GenerateError> {
        self.analyze(units)?;
        let Some(batch) = self.batch.as_ref() else {
            return Ok(GenerationReport::default());
        };

        let mut report = summary(batch);
        let ctx = EmitContext {
            model: &batch.model,
            collectors: &batch.collectors,
            components: &batch.components,
            failed_decls: &batch.link.failed_decls,
            failed_functions: &batch.link.failed_functions,
        };
        for target in &self.options.targets {
            let rendered = target.emitter().render(&ctx, &self.engine)?;
            debug!(
                target = %target,
                files = rendered.files.len(),
                failures = rendered.failures.len(),
                "rendered target"
            );
            for failure in rendered.failures {
                warn!(target = %target, %failure, "unit skipped");
                if *target == Target::Ui {
                    report.components.retain(|stem| *stem != failure.unit);
                }
                report.failures.push(failure);
            }
            report.outputs.push(TargetOutput {
                target: *target,
                files: rendered.files,
            });
        }

        info!(
            units = report.units,
            components = report.components.len(),
            files = report.file_count(),
            failures = report.failures.len(),
            "generated batch"
        );
        Ok(report)
    }

    /// Write a report's files below `writer`'s root, one directory per target.
    pub fn write(
        &self,
        report: &mut GenerationReport,
        writer: &OutputWriter,
    ) -> Result<(), GenerateError> {
        for output in &report.outputs {
            for file in &output.files {
                let (path, status) = writer
                    .write(output.target.dir(), file)
                    .map_err(|e| GenerateError::io(writer.root().join(&file.path), e))?;
                match status {
                    WriteStatus::Unchanged => report.unchanged += 1,
                    WriteStatus::Created | WriteStatus::Updated => {
                        debug!(file = %path.display(), "wrote");
                        report.written += 1;
                    }
                }
            }
        }
        info!(written = report.written, unchanged = report.unchanged, "wrote outputs");
        Ok(())
    }
}

fn summary(batch: &Batch) -> GenerationReport {
    GenerationReport {
        units: batch.model.units.len(),
        declarations: batch.model.decls.len(),
        components: batch.components.iter().map(|c| c.stem().to_string()).collect(),
        failures: batch.failures.clone(),
        ..GenerationReport::default()
    }
}

/// Collect every `*.d.ts` file below `root` except `global.d.ts`, with
/// paths relative to `root`, sorted.
pub fn discover(root: &Path) -> Result<Vec<SourceUnit>, GenerateError> {
    let mut paths = Vec::new();
    walk(root, root, &mut paths)?;
    paths.sort();

    paths
        .into_iter()
        .map(|relative| {
            let full = root.join(&relative);
            let text = fs::read_to_string(&full).map_err(|e| GenerateError::io(&full, e))?;
            Ok(SourceUnit::new(relative, text))
        })
        .collect()
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), GenerateError> {
    let entries = fs::read_dir(dir).map_err(|e| GenerateError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| GenerateError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| GenerateError::io(&path, e))?;
        if file_type.is_dir() {
            walk(root, &path, out)?;
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.ends_with(".d.ts") || name == AMBIENT_FILE {
            continue;
        }
        if let Ok(relative) = path.strip_prefix(root) {
            out.push(relative.to_path_buf());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UnitError;
    use tempfile::TempDir;

    fn orchestrator() -> Orchestrator<'static> {
        Orchestrator::new(GenerateOptions::default()).unwrap()
    }

    #[test]
    fn test_discover_skips_ambient_file() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("html")).unwrap();
        fs::write(temp.path().join("global.d.ts"), "type int64 = number;").unwrap();
        fs::write(temp.path().join("node.d.ts"), "interface Node {}").unwrap();
        fs::write(temp.path().join("html/canvas.d.ts"), "interface Canvas {}").unwrap();
        fs::write(temp.path().join("notes.ts"), "").unwrap();

        let units = discover(temp.path()).unwrap();
        let paths: Vec<_> = units.iter().map(|u| u.path.clone()).collect();
        assert_eq!(
            paths,
            vec![PathBuf::from("html/canvas.d.ts"), PathBuf::from("node.d.ts")]
        );
        assert_eq!(units[0].implementation, "html/canvas");
    }

    #[test]
    fn test_forward_reference_across_files() {
        let mut orch = orchestrator();
        let units = vec![
            SourceUnit::new("a.d.ts", "interface Element extends Node { parent: Node; }"),
            SourceUnit::new("b.d.ts", "interface Node { id: string; }"),
        ];
        let report = orch.check(units).unwrap();
        assert_eq!(report.declarations, 2);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_unit_failure_keeps_other_components() {
        let mut orch = orchestrator();
        let units = vec![SourceUnit::new(
            "widgets.d.ts",
            r#"
            interface CardProperties { body: Missing; }
            interface ChipMethods { close(): void; }
            "#,
        )];
        let report = orch.generate(units).unwrap();
        assert_eq!(report.components, vec!["Chip"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.files(Target::Ui).len(), 1);
    }

    #[test]
    fn test_unsupported_component_keeps_other_components() {
        let mut orch = orchestrator();
        let units = vec![SourceUnit::new(
            "widgets.d.ts",
            r#"
            interface TabsEvents { onchange: string; }
            interface FooMethods { bar(): void; }
            "#,
        )];
        let report = orch.generate(units).unwrap();
        assert_eq!(report.components, vec!["Foo"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].unit, "Tabs");
        assert!(matches!(
            report.failures[0].error,
            UnitError::Unsupported { target: "ui", .. }
        ));
        let ui = report.files(Target::Ui);
        assert_eq!(ui.len(), 1);
        assert!(ui[0].contents.contains("abstract class FooBindings"));
        assert!(!report.files(Target::Native).is_empty());
    }

    #[test]
    fn test_batch_fatal_error() {
        let mut orch = orchestrator();
        let units = vec![SourceUnit::new("a.d.ts", "interface A extends Missing {}")];
        assert!(matches!(orch.generate(units), Err(GenerateError::Resolve(_))));
        assert_eq!(orch.units().len(), 1);
        assert!(orch.batch().is_none());
    }

    #[test]
    fn test_parse_cache_reuse_and_clear() {
        let mut orch = orchestrator();
        let unit = SourceUnit::new("a.d.ts", "interface AProperties { x: double; }");
        orch.check(vec![unit.clone()]).unwrap();
        assert_eq!(orch.parse_cache.len(), 1);

        let changed = SourceUnit::new("a.d.ts", "interface AProperties { y: double; }");
        orch.check(vec![changed]).unwrap();
        let batch = orch.batch().unwrap();
        assert_eq!(batch.components[0].properties[0].name, "y");

        orch.clear_caches();
        assert!(orch.parse_cache.is_empty());
        assert!(orch.batch().is_none());
        assert!(orch.units().is_empty());
    }

    #[test]
    fn test_targets_follow_options() {
        let options = GenerateOptions {
            targets: vec![Target::Ui],
            ..GenerateOptions::default()
        };
        let mut orch = Orchestrator::new(options).unwrap();
        let report = orch
            .generate(vec![SourceUnit::new("a.d.ts", "interface FooMethods { bar(): void; }")])
            .unwrap();
        assert_eq!(report.outputs.len(), 1);
        assert_eq!(report.outputs[0].target, Target::Ui);
    }

    #[test]
    fn test_write_counts() {
        let temp = TempDir::new().unwrap();
        let writer = OutputWriter::new(temp.path());
        let mut orch = orchestrator();
        let units = vec![SourceUnit::new("a.d.ts", "interface FooMethods { bar(): void; }")];

        let mut first = orch.generate(units.clone()).unwrap();
        orch.write(&mut first, &writer).unwrap();
        assert_eq!(first.written, first.file_count());
        assert_eq!(first.unchanged, 0);

        let mut second = orch.generate(units).unwrap();
        orch.write(&mut second, &writer).unwrap();
        assert_eq!(second.written, 0);
        assert_eq!(second.unchanged, second.file_count());
        assert!(temp.path().join("ui/foo_bindings_generated.dart").exists());
    }
}
