//! Writes generated files, leaving byte-identical files untouched so
//! downstream incremental builds see no change.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::codegen::GeneratedFile;

/// What happened to one output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Created,
    Updated,
    Unchanged,
}

/// Writer rooted at an output directory.
pub struct OutputWriter {
    root: PathBuf,
}

impl OutputWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `file` below `subdir`, skipping the write when the on-disk
    /// contents already match.
    pub fn write(&self, subdir: &str, file: &GeneratedFile) -> io::Result<(PathBuf, WriteStatus)> {
        let path = self.root.join(subdir).join(&file.path);

        let status = match fs::read(&path) {
            Ok(existing) if existing == file.contents.as_bytes() => {
                return Ok((path, WriteStatus::Unchanged))
            }
            Ok(_) => WriteStatus::Updated,
            Err(e) if e.kind() == io::ErrorKind::NotFound => WriteStatus::Created,
            Err(e) => return Err(e),
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&path, &file.contents)?;
        Ok((path, status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_update_unchanged() {
        let temp = TempDir::new().unwrap();
        let writer = OutputWriter::new(temp.path());
        let file = GeneratedFile::new("qjs_node.h", "// one\n".to_string());

        let (path, status) = writer.write("native", &file).unwrap();
        assert_eq!(status, WriteStatus::Created);
        assert_eq!(path, temp.path().join("native").join("qjs_node.h"));

        let (_, status) = writer.write("native", &file).unwrap();
        assert_eq!(status, WriteStatus::Unchanged);

        let changed = GeneratedFile::new("qjs_node.h", "// two\n".to_string());
        let (_, status) = writer.write("native", &changed).unwrap();
        assert_eq!(status, WriteStatus::Updated);
        assert_eq!(fs::read_to_string(&path).unwrap(), "// two\n");
    }

    #[test]
    fn test_unchanged_file_keeps_mtime() {
        let temp = TempDir::new().unwrap();
        let writer = OutputWriter::new(temp.path());
        let file = GeneratedFile::new("a.dart", "x\n".to_string());
        let (path, _) = writer.write("ui", &file).unwrap();
        let before = fs::metadata(&path).unwrap().modified().unwrap();
        writer.write("ui", &file).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), before);
    }
}
