//! Project configuration schema for reflect.yaml
//!
//! Every section is optional; a missing file section falls back to the
//! defaults below, and CLI flags override whatever the file says.

use crate::codegen::{BackendKind, GenerationOptions};
use crate::error::{ReflectError, Result};
use crate::scanner::Vocabulary;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration from reflect.yaml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ReflectConfig {
    pub project: ProjectMetadata,
    pub input: InputConfig,
    pub output: OutputConfig,
    pub codegen: CodegenConfig,
    pub vocabulary: Vocabulary,
}

/// Project metadata
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProjectMetadata {
    pub name: String,
    pub description: String,
}

/// Where to look for annotated sources
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InputConfig {
    pub root: PathBuf,
    /// File extensions to scan, without the dot
    pub extensions: Vec<String>,
    /// Regexes matched against the `/`-separated path relative to `root`
    pub exclude: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            extensions: vec!["h".to_string(), "hpp".to_string()],
            exclude: Vec::new(),
        }
    }
}

/// Where generated artifacts go
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub root: PathBuf,
    /// Inserted between stem and extension: `Player.h` -> `Player.gen.h`
    pub suffix: String,
    /// Delete generated files whose source no longer yields containers
    pub prune_stale: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("generated"),
            suffix: "gen".to_string(),
            prune_stale: false,
        }
    }
}

/// Code generation options
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CodegenConfig {
    pub backends: Vec<String>,
    pub type_info: bool,
    pub macro_prefix: String,
    pub runtime_include: String,
    pub runtime_namespace: String,
    /// Base types defined outside the scanned tree
    pub external_bases: Vec<String>,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        let options = GenerationOptions::default();
        Self {
            backends: vec![
                BackendKind::Legacy.as_str().to_string(),
                BackendKind::TypeInfo.as_str().to_string(),
            ],
            type_info: options.type_info,
            macro_prefix: options.macro_prefix,
            runtime_include: options.runtime_include,
            runtime_namespace: options.runtime_namespace,
            external_bases: Vec::new(),
        }
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl ReflectConfig {
    /// Load configuration from reflect.yaml.
    ///
    /// Relative input/output roots are taken relative to the directory
    /// containing the file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ReflectError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let mut config: Self = serde_yaml::from_str(&contents)
            .map_err(|e| ReflectError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        if let Some(dir) = path.parent() {
            if config.input.root.is_relative() {
                config.input.root = dir.join(&config.input.root);
            }
            if config.output.root.is_relative() {
                config.output.root = dir.join(&config.output.root);
            }
        }
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents).map_err(|e| ReflectError::Config(format!("Failed to parse reflect.yaml: {}", e)))
    }

    /// Check everything serde cannot: patterns, backend names, marker spellings
    pub fn validate(&self) -> Result<()> {
        if self.input.extensions.is_empty() {
            return Err(ReflectError::Config("input.extensions must not be empty".to_string()));
        }
        if self.output.suffix.is_empty() {
            return Err(ReflectError::Config("output.suffix must not be empty".to_string()));
        }
        self.exclude_patterns()?;
        self.backend_kinds()?;

        if !is_identifier(&self.codegen.macro_prefix) {
            return Err(ReflectError::Config(format!(
                "codegen.macro_prefix '{}' is not a valid identifier",
                self.codegen.macro_prefix
            )));
        }

        let vocabulary = &self.vocabulary;
        if vocabulary.container.is_empty() || vocabulary.property.is_empty() || vocabulary.function.is_empty() {
            return Err(ReflectError::Config(
                "vocabulary needs at least one container, property and function marker".to_string(),
            ));
        }
        if let Some(bad) = vocabulary.all().find(|m| !is_identifier(m)) {
            return Err(ReflectError::Config(format!("vocabulary marker '{}' is not an identifier", bad)));
        }
        Ok(())
    }

    pub fn exclude_patterns(&self) -> Result<Vec<Regex>> {
        self.input
            .exclude
            .iter()
            .map(|p| Regex::new(p).map_err(|e| ReflectError::Config(format!("bad exclude pattern '{}': {}", p, e))))
            .collect()
    }

    pub fn backend_kinds(&self) -> Result<Vec<BackendKind>> {
        if self.codegen.backends.is_empty() {
            return Err(ReflectError::Config("codegen.backends must not be empty".to_string()));
        }
        self.codegen
            .backends
            .iter()
            .map(|b| b.parse::<BackendKind>().map_err(ReflectError::Config))
            .collect()
    }

    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            type_info: self.codegen.type_info,
            macro_prefix: self.codegen.macro_prefix.clone(),
            runtime_include: self.codegen.runtime_include.clone(),
            runtime_namespace: self.codegen.runtime_namespace.clone(),
        }
    }
}
