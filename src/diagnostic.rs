//! Rich error reporting using codespan-reporting.

use std::collections::HashMap;
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};

use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream, WriteColor};

use crate::error::{AnalysisError, GenerateError, ResolveError};
use crate::model::SourceUnit;

/// The source files of a batch, for rendering spans.
pub struct SourceDb {
    files: SimpleFiles<String, String>,
    file_ids: HashMap<PathBuf, (usize, usize)>,
}

impl SourceDb {
    pub fn new(units: &[SourceUnit]) -> Self {
        let mut files = SimpleFiles::new();
        let mut file_ids = HashMap::new();
        for unit in units {
            let id = files.add(unit.path.display().to_string(), unit.text.clone());
            file_ids.insert(unit.path.clone(), (id, unit.text.len()));
        }
        Self { files, file_ids }
    }

    fn label(&self, path: &Path, span: Range<usize>) -> Option<Label<usize>> {
        let (id, len) = *self.file_ids.get(path)?;
        // Syntax errors at end of input point one past the text.
        let start = span.start.min(len);
        let end = span.end.clamp(start, len);
        Some(Label::primary(id, start..end))
    }

    /// A diagnostic for errors that carry a source location.
    pub fn diagnostic(&self, err: &GenerateError) -> Option<Diagnostic<usize>> {
        let (path, span, note) = match err {
            GenerateError::Analysis(e) => (e.path().as_path(), e.span(), analysis_note(e)),
            GenerateError::Resolve(e) => {
                let (path, span) = e.location()?;
                (path.as_path(), span, resolve_note(e))
            }
            GenerateError::Codegen(_) | GenerateError::Io { .. } => return None,
        };
        let label = self.label(path, span)?;
        let mut diagnostic = Diagnostic::error()
            .with_message(err.to_string())
            .with_labels(vec![label]);
        if let Some(note) = note {
            diagnostic = diagnostic.with_notes(vec![note.to_string()]);
        }
        Some(diagnostic)
    }

    /// Render `err` to `writer`, falling back to plain text for span-less errors.
    pub fn emit(&self, err: &GenerateError, writer: &mut dyn WriteColor) -> std::io::Result<()> {
        match self.diagnostic(err) {
            Some(diagnostic) => {
                let config = term::Config::default();
                term::emit(writer, &config, &self.files, &diagnostic)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
            }
            None => writeln!(writer, "error: {err}"),
        }
    }
}

fn analysis_note(err: &AnalysisError) -> Option<&'static str> {
    match err {
        AnalysisError::UnknownDecorator { .. } => Some("only @Dictionary() and @Mixin() are recognized"),
        AnalysisError::MultipleParents { .. } => Some("interfaces support single inheritance only"),
        _ => None,
    }
}

fn resolve_note(err: &ResolveError) -> Option<&'static str> {
    match err {
        ResolveError::UndeclaredParent { .. } => {
            Some("every file of the batch is analyzed before parents are linked")
        }
        _ => None,
    }
}

/// Report a generation error on stderr.
pub fn report_error(err: &GenerateError, units: &[SourceUnit]) {
    let writer = StandardStream::stderr(ColorChoice::Auto);
    let db = SourceDb::new(units);
    if db.emit(err, &mut writer.lock()).is_err() {
        eprintln!("error: {err}");
    }
}
