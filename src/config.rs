//! Project configuration (`idl-bindgen.toml`) parsing and types.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::analyzer::AnalyzeOptions;
use crate::codegen::Target;
use crate::error::ConfigError;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "idl-bindgen.toml";

/// Host types accepted as external references when none are configured.
pub const DEFAULT_EXTERN_TYPES: &[&str] = &["Event", "CustomEvent"];

/// Root configuration structure for `idl-bindgen.toml`.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct BindgenConfig {
    /// Generation settings.
    #[serde(default)]
    pub generate: GenerateConfig,
    /// Members excluded from every target.
    #[serde(default)]
    pub deny: DenyConfig,
    /// Type handling.
    #[serde(default)]
    pub types: TypesConfig,
}

/// `[generate]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct GenerateConfig {
    /// Directory holding the `*.d.ts` inputs.
    pub source: Option<PathBuf>,
    /// Directory receiving one subdirectory per target.
    pub output: Option<PathBuf>,
    /// Targets to run.
    pub targets: Option<Vec<Target>>,
    /// Component stems to emit; all components when absent.
    pub components: Option<Vec<String>>,
}

/// `[deny]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct DenyConfig {
    /// Fully qualified `Interface.member` names.
    #[serde(default)]
    pub members: Vec<String>,
}

/// `[types]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TypesConfig {
    /// Host type names that may be referenced without being declared.
    #[serde(rename = "extern")]
    pub extern_types: Option<Vec<String>>,
}

impl BindgenConfig {
    /// Load configuration from a specific path. A missing file is `Ok(None)`.
    pub fn load_from_path(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Analyzer options derived from the deny-list.
    pub fn analyze_options(&self) -> AnalyzeOptions {
        AnalyzeOptions {
            deny: self.deny.members.iter().cloned().collect::<HashSet<_>>(),
        }
    }
}

impl GenerateConfig {
    /// Get the source directory, defaulting to `.`.
    pub fn source_dir(&self) -> &Path {
        self.source.as_deref().unwrap_or(Path::new("."))
    }

    /// Get the output directory, defaulting to `generated`.
    pub fn output_dir(&self) -> &Path {
        self.output.as_deref().unwrap_or(Path::new("generated"))
    }

    /// Get the targets, defaulting to all of them.
    pub fn targets(&self) -> Vec<Target> {
        match &self.targets {
            Some(targets) if !targets.is_empty() => {
                let mut targets = targets.clone();
                targets.sort();
                targets.dedup();
                targets
            }
            _ => Target::ALL.to_vec(),
        }
    }

    /// Get the requested component stems, if any.
    pub fn components(&self) -> Option<&[String]> {
        self.components.as_deref()
    }
}

impl TypesConfig {
    /// Get the extern host types, defaulting to [`DEFAULT_EXTERN_TYPES`].
    pub fn extern_types(&self) -> Vec<String> {
        match &self.extern_types {
            Some(types) => types.clone(),
            None => DEFAULT_EXTERN_TYPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let config = BindgenConfig::parse(
            r#"
            [generate]
            source = "idl"
            output = "out"
            targets = ["ui", "native", "ui"]
            components = ["Button"]

            [deny]
            members = ["Element.innerHTML"]

            [types]
            extern = ["Event", "CustomEvent", "TouchEvent"]
            "#,
        )
        .unwrap();

        assert_eq!(config.generate.source_dir(), Path::new("idl"));
        assert_eq!(config.generate.output_dir(), Path::new("out"));
        assert_eq!(config.generate.targets(), vec![Target::Native, Target::Ui]);
        assert_eq!(config.generate.components(), Some(&["Button".to_string()][..]));
        assert!(config.analyze_options().is_denied("Element", "innerHTML"));
        assert_eq!(config.types.extern_types().len(), 3);
    }

    #[test]
    fn test_defaults() {
        let config = BindgenConfig::parse("").unwrap();
        assert_eq!(config.generate.source_dir(), Path::new("."));
        assert_eq!(config.generate.output_dir(), Path::new("generated"));
        assert_eq!(config.generate.targets(), Target::ALL.to_vec());
        assert!(config.generate.components().is_none());
        assert_eq!(config.types.extern_types(), vec!["Event", "CustomEvent"]);
        assert!(config.analyze_options().deny.is_empty());
    }

    #[test]
    fn test_unknown_target_is_rejected() {
        assert!(BindgenConfig::parse("[generate]\ntargets = [\"wasm\"]\n").is_err());
        assert!(BindgenConfig::parse("[generate]\nsrc = \"idl\"\n").is_err());
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(BindgenConfig::load_from_path(&dir.path().join(CONFIG_FILE))
            .unwrap()
            .is_none());

        let path = dir.path().join(CONFIG_FILE);
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[deny]\nmembers = [\"Node.remove\"]").unwrap();
        let config = BindgenConfig::load_from_path(&path).unwrap().unwrap();
        assert_eq!(config.deny.members, vec!["Node.remove"]);

        fs::write(&path, "[deny\n").unwrap();
        assert!(matches!(
            BindgenConfig::load_from_path(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
