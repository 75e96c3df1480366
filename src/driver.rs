//! High-level orchestration of a compiler run.
//!
//! A run has four phases:
//! 1. discover input files under the input root,
//! 2. scan and build every file in parallel,
//! 3. resolve inheritance once over the aggregate (a barrier; fatal errors
//!    stop here, before anything is written),
//! 4. generate and commit one artifact per file in parallel (a header part
//!    and an inline part), then optionally prune stale artifacts.

use crate::builder::{build_file_model, FileModel};
use crate::codegen::{ArtifactGenerator, ArtifactPart};
use crate::config::ReflectConfig;
use crate::error::{ReflectError, Result};
use crate::model::ContainerRecord;
use crate::resolver::{resolve, ResolvedContainer};
use crate::writer::{OutputWriter, WriteOutcome};
use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const ARTIFACT_PARTS: [ArtifactPart; 2] = [ArtifactPart::Header, ArtifactPart::Inline];

const GENERATED_BANNER: &str = "// Generated by reflectc";

/// An input file selected for scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// `/`-separated path relative to the input root
    pub file_id: String,
}

/// Outcome of committing one artifact part
#[derive(Debug, Clone)]
pub struct ArtifactReport {
    pub file_id: String,
    pub part: ArtifactPart,
    pub path: PathBuf,
    pub containers: usize,
    pub outcome: WriteOutcome,
}

/// Everything a run produced
#[derive(Debug, Default)]
pub struct RunReport {
    pub files_scanned: usize,
    pub containers: usize,
    pub artifacts: Vec<ArtifactReport>,
    pub pruned: Vec<PathBuf>,
    /// Recoverable errors, in file order
    pub errors: Vec<ReflectError>,
    pub warnings: Vec<String>,
    /// Set when the run stopped before writing
    pub fatal: Option<ReflectError>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.fatal.is_none() && self.errors.is_empty() && !self.artifacts.iter().any(|a| a.outcome.is_failure())
    }

    pub fn count(&self, outcome: &WriteOutcome) -> usize {
        self.artifacts.iter().filter(|a| &a.outcome == outcome).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ArtifactReport> {
        self.artifacts.iter().filter(|a| a.outcome.is_failure())
    }

    pub fn has_outdated(&self) -> bool {
        self.count(&WriteOutcome::Outdated) > 0 || !self.pruned.is_empty()
    }
}

/// Per-file slice of the aggregate container list
#[derive(Debug, Clone)]
pub struct AnalyzedFile {
    pub source: SourceFile,
    pub containers: Range<usize>,
}

/// Scanned and built, but not yet resolved
#[derive(Debug, Default)]
pub struct Analysis {
    pub files: Vec<AnalyzedFile>,
    /// Containers of all files, file order then declaration order
    pub containers: Vec<ContainerRecord>,
    pub report: RunReport,
}

#[derive(Serialize)]
struct DumpContainer<'a> {
    #[serde(flatten)]
    record: &'a ContainerRecord,
    ancestors: Vec<&'a str>,
}

#[derive(Serialize)]
struct DumpFile<'a> {
    file_id: &'a str,
    containers: Vec<DumpContainer<'a>>,
}

impl Analysis {
    /// Render the resolved model as pretty JSON
    pub fn to_json(&self, resolved: &[ResolvedContainer<'_>]) -> Result<String> {
        let files: Vec<DumpFile<'_>> = self
            .files
            .iter()
            .map(|file| DumpFile {
                file_id: &file.source.file_id,
                containers: resolved[file.containers.clone()]
                    .iter()
                    .map(|r| DumpContainer {
                        record: r.record,
                        ancestors: r.ancestors.iter().map(|a| a.name.as_str()).collect(),
                    })
                    .collect(),
            })
            .collect();
        serde_json::to_string_pretty(&files).map_err(|e| ReflectError::Config(format!("failed to serialize model: {}", e)))
    }
}

/// Runs the compiler for one configuration
pub struct Driver {
    config: ReflectConfig,
    dry_run: bool,
    jobs: Option<usize>,
}

impl Driver {
    /// Validates `config` up front; an invalid configuration never starts a run
    pub fn new(config: ReflectConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            dry_run: false,
            jobs: None,
        })
    }

    /// Compare against existing artifacts without writing
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Worker threads; `None` uses rayon's global pool
    pub fn jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    fn in_pool<T: Send>(&self, f: impl FnOnce() -> T + Send) -> Result<T> {
        match self.jobs {
            Some(n) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| ReflectError::Config(format!("failed to build thread pool: {}", e)))?;
                Ok(pool.install(f))
            }
            None => Ok(f()),
        }
    }

    /// Discover, scan and build every input file
    pub fn analyze(&self) -> Result<Analysis> {
        self.in_pool(|| self.analyze_inner())?
    }

    fn analyze_inner(&self) -> Result<Analysis> {
        let mut report = RunReport::default();
        let sources = discover_inputs(&self.config, &mut report.errors)?;
        tracing::info!("discovered {} input files under {}", sources.len(), self.config.input.root.display());

        let vocabulary = &self.config.vocabulary;
        let models: Vec<(SourceFile, FileModel)> = sources
            .into_par_iter()
            .map(|source| {
                let model = match fs::read_to_string(&source.path) {
                    Ok(text) => build_file_model(&text, &source.path, &source.file_id, vocabulary),
                    Err(e) => FileModel {
                        path: source.path.clone(),
                        file_id: source.file_id.clone(),
                        errors: vec![ReflectError::io(&source.path, e)],
                        ..Default::default()
                    },
                };
                (source, model)
            })
            .collect();

        let mut analysis = Analysis::default();
        for (source, model) in models {
            let start = analysis.containers.len();
            analysis.containers.extend(model.containers);
            report.errors.extend(model.errors);
            report.warnings.extend(model.warnings);
            analysis.files.push(AnalyzedFile {
                source,
                containers: start..analysis.containers.len(),
            });
        }
        report.files_scanned = analysis.files.len();
        report.containers = analysis.containers.len();

        for err in &report.errors {
            tracing::warn!("{}", err);
        }
        for warning in &report.warnings {
            tracing::warn!("{}", warning);
        }
        analysis.report = report;
        Ok(analysis)
    }

    /// Scan, build and resolve without generating anything
    pub fn validate(&self) -> Result<RunReport> {
        let analysis = self.analyze()?;
        let mut report = analysis.report;
        if let Err(err) = resolve(&analysis.containers, &self.config.codegen.external_bases) {
            report.fatal = Some(err);
        }
        Ok(report)
    }

    /// Resolved model as JSON; `None` when resolution failed
    pub fn dump(&self) -> Result<(Option<String>, RunReport)> {
        let analysis = self.analyze()?;
        let json = match resolve(&analysis.containers, &self.config.codegen.external_bases) {
            Ok(resolved) => Some(analysis.to_json(&resolved)?),
            Err(err) => {
                let mut report = analysis.report;
                report.fatal = Some(err);
                return Ok((None, report));
            }
        };
        Ok((json, analysis.report))
    }

    /// Full run: analyze, resolve, generate, commit, prune
    pub fn run(&self) -> Result<RunReport> {
        let analysis = self.analyze()?;
        let kinds = self.config.backend_kinds()?;
        let generator = ArtifactGenerator::new(&kinds, self.config.generation_options());
        let writer = OutputWriter::new(self.dry_run);

        let mut report = self.in_pool(|| self.generate(&analysis, &generator, &writer))??;
        report.files_scanned = analysis.report.files_scanned;
        report.containers = analysis.report.containers;
        let mut errors = analysis.report.errors;
        errors.append(&mut report.errors);
        report.errors = errors;
        report.warnings = analysis.report.warnings;
        Ok(report)
    }

    fn generate(&self, analysis: &Analysis, generator: &ArtifactGenerator, writer: &OutputWriter) -> Result<RunReport> {
        let mut report = RunReport::default();
        let resolved = match resolve(&analysis.containers, &self.config.codegen.external_bases) {
            Ok(resolved) => resolved,
            Err(err) => {
                tracing::error!("{}", err);
                report.fatal = Some(err);
                return Ok(report);
            }
        };

        let jobs: Vec<&AnalyzedFile> = analysis.files.iter().filter(|f| !f.containers.is_empty()).collect();
        report.artifacts = jobs
            .par_iter()
            .flat_map_iter(|file| {
                let generated = generator.generate_artifact(&file.source.file_id, &resolved[file.containers.clone()]);
                ARTIFACT_PARTS.into_iter().map(move |part| {
                    let path = artifact_path(&self.config, &file.source.file_id, part);
                    let outcome = match &generated {
                        Ok(artifact) => writer.commit(&path, artifact.part(part)),
                        Err(e) => WriteOutcome::Failed(e.to_string()),
                    };
                    ArtifactReport {
                        file_id: file.source.file_id.clone(),
                        part,
                        path,
                        containers: file.containers.len(),
                        outcome,
                    }
                })
            })
            .collect();

        let write_errors: Vec<ReflectError> = report
            .artifacts
            .iter()
            .filter_map(|a| match &a.outcome {
                WriteOutcome::Failed(reason) => Some(ReflectError::WriteFailed {
                    path: a.path.clone(),
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect();
        report.errors.extend(write_errors);

        if self.config.output.prune_stale {
            let expected: HashSet<&Path> = report.artifacts.iter().map(|a| a.path.as_path()).collect();
            let (pruned, errors) = prune_stale(&self.config, &expected, writer);
            report.pruned = pruned;
            report.errors.extend(errors);
        }

        tracing::info!(
            "{} artifacts: {} written, {} unchanged, {} outdated, {} failed, {} pruned",
            report.artifacts.len(),
            report.count(&WriteOutcome::Written),
            report.count(&WriteOutcome::Unchanged),
            report.count(&WriteOutcome::Outdated),
            report.failures().count(),
            report.pruned.len()
        );
        Ok(report)
    }
}

/// Where one part of the artifact for `file_id` goes: `Game/Player.h` ->
/// `<out>/Game/Player.gen.h` and `<out>/Game/Player.gen.inl`
pub fn artifact_path(config: &ReflectConfig, file_id: &str, part: ArtifactPart) -> PathBuf {
    let relative = Path::new(file_id);
    let stem = relative.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let extension = part
        .extension()
        .map(String::from)
        .or_else(|| relative.extension().map(|e| e.to_string_lossy().into_owned()));
    let name = match extension {
        Some(ext) => format!("{}.{}.{}", stem, config.output.suffix, ext),
        None => format!("{}.{}", stem, config.output.suffix),
    };
    let mut path = config.output.root.clone();
    if let Some(dir) = relative.parent() {
        path.push(dir);
    }
    path.push(name);
    path
}

fn relative_id(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn walk_error(root: &Path, err: walkdir::Error) -> ReflectError {
    let path = err.path().unwrap_or(root).to_path_buf();
    ReflectError::Io {
        path,
        reason: err.to_string(),
    }
}

/// Recursively collect input files, sorted by file id.
///
/// Symlinks are not followed. Unreadable directories are recorded in
/// `errors` and skipped. The output root is never scanned, even when it
/// lives inside the input root.
pub fn discover_inputs(config: &ReflectConfig, errors: &mut Vec<ReflectError>) -> Result<Vec<SourceFile>> {
    let root = &config.input.root;
    if !root.is_dir() {
        return Err(ReflectError::Config(format!("input root {} is not a directory", root.display())));
    }
    let excludes = config.exclude_patterns()?;
    let extensions: Vec<String> = config.input.extensions.iter().map(|e| e.trim_start_matches('.').to_lowercase()).collect();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            if entry.file_type().is_dir() && same_dir(entry.path(), &config.output.root) {
                return false;
            }
            match relative_id(root, entry.path()) {
                Some(file_id) if is_excluded(&excludes, &file_id) => {
                    tracing::debug!("excluded {}", file_id);
                    false
                }
                _ => true,
            }
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                errors.push(walk_error(root, e));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let matches_ext = path
            .extension()
            .map(|e| extensions.contains(&e.to_string_lossy().to_lowercase()))
            .unwrap_or(false);
        if !matches_ext {
            continue;
        }
        if let Some(file_id) = relative_id(root, path) {
            files.push(SourceFile {
                path: path.to_path_buf(),
                file_id,
            });
        }
    }

    files.sort_by(|a, b| a.file_id.cmp(&b.file_id));
    Ok(files)
}

fn is_excluded(patterns: &[Regex], file_id: &str) -> bool {
    patterns.iter().any(|p| p.is_match(file_id))
}

fn is_generated(path: &Path, suffix: &str) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
        return false;
    };
    let marker = format!(".{}", suffix);
    let named_like_artifact = name.ends_with(&marker) || name.contains(&format!("{}.", marker));
    named_like_artifact
        && fs::read_to_string(path)
            .map(|text| text.starts_with(GENERATED_BANNER))
            .unwrap_or(false)
}

/// Remove generated files under the output root that no current source produces
fn prune_stale(config: &ReflectConfig, expected: &HashSet<&Path>, writer: &OutputWriter) -> (Vec<PathBuf>, Vec<ReflectError>) {
    let mut pruned = Vec::new();
    let mut errors = Vec::new();
    if !config.output.root.is_dir() {
        return (pruned, errors);
    }

    let mut candidates = Vec::new();
    for entry in WalkDir::new(&config.output.root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                errors.push(walk_error(&config.output.root, e));
                continue;
            }
        };
        let path = entry.path();
        if entry.file_type().is_file() && !expected.contains(path) && is_generated(path, &config.output.suffix) {
            candidates.push(path.to_path_buf());
        }
    }
    candidates.sort();

    for path in candidates {
        match writer.remove(&path) {
            Ok(true) => pruned.push(path),
            Ok(false) => {}
            Err(e) => errors.push(ReflectError::WriteFailed {
                path,
                reason: e.to_string(),
            }),
        }
    }
    (pruned, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_for(dir: &Path) -> ReflectConfig {
        let mut config = ReflectConfig::default();
        config.input.root = dir.join("src");
        config.output.root = dir.join("out");
        config
    }

    fn write(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    #[test]
    fn test_artifact_path() {
        let mut config = ReflectConfig::default();
        config.output.root = PathBuf::from("out");
        let header = ArtifactPart::Header;
        assert_eq!(artifact_path(&config, "Game/Player.h", header), PathBuf::from("out/Game/Player.gen.h"));
        assert_eq!(artifact_path(&config, "a.hpp", header), PathBuf::from("out/a.gen.hpp"));
        assert_eq!(artifact_path(&config, "Makefile", header), PathBuf::from("out/Makefile.gen"));
        assert_eq!(
            artifact_path(&config, "Game/Player.h", ArtifactPart::Inline),
            PathBuf::from("out/Game/Player.gen.inl")
        );
    }

    #[test]
    fn test_discovery_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        let mut config = config_for(dir.path());
        config.input.exclude = vec!["^ThirdParty/".to_string()];
        config.output.root = dir.path().join("src/Generated");

        write(&dir.path().join("src/b.h"), "");
        write(&dir.path().join("src/a/c.hpp"), "");
        write(&dir.path().join("src/a/readme.txt"), "");
        write(&dir.path().join("src/ThirdParty/lib.h"), "");
        write(&dir.path().join("src/Generated/b.gen.h"), "");

        let mut errors = Vec::new();
        let files = discover_inputs(&config, &mut errors).unwrap();
        let ids: Vec<&str> = files.iter().map(|f| f.file_id.as_str()).collect();
        assert_eq!(ids, vec!["a/c.hpp", "b.h"]);
        assert!(errors.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_discovery_does_not_follow_symlink_loops() {
        let dir = TempDir::new().unwrap();
        let config = config_for(dir.path());
        write(&dir.path().join("src/a/x.h"), "");
        std::os::unix::fs::symlink(dir.path().join("src"), dir.path().join("src/a/loop")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("src/a/x.h"), dir.path().join("src/linked.h")).unwrap();

        let mut errors = Vec::new();
        let files = discover_inputs(&config, &mut errors).unwrap();
        let ids: Vec<&str> = files.iter().map(|f| f.file_id.as_str()).collect();
        assert_eq!(ids, vec!["a/x.h"]);
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[cfg(unix)]
    #[test]
    fn test_prune_does_not_follow_symlinks() {
        let dir = TempDir::new().unwrap();
        let config = config_for(dir.path());
        let outside = dir.path().join("elsewhere/old.gen.h");
        write(&outside, "// Generated by reflectc from old.h. Do not edit.\n");
        fs::create_dir_all(&config.output.root).unwrap();
        std::os::unix::fs::symlink(dir.path().join("elsewhere"), config.output.root.join("linked")).unwrap();

        let (pruned, errors) = prune_stale(&config, &HashSet::new(), &OutputWriter::new(false));
        assert!(pruned.is_empty());
        assert!(errors.is_empty());
        assert!(outside.exists());
    }

    #[test]
    fn test_missing_input_root_is_config_error() {
        let dir = TempDir::new().unwrap();
        let config = config_for(dir.path());
        let result = discover_inputs(&config, &mut Vec::new());
        assert!(matches!(result, Err(ReflectError::Config(_))));
    }

    #[test]
    fn test_prune_only_touches_generated_files() {
        let dir = TempDir::new().unwrap();
        let mut config = config_for(dir.path());
        config.output.prune_stale = true;
        let stale = dir.path().join("out/old.gen.h");
        let stale_inline = dir.path().join("out/sub/old.gen.inl");
        let handwritten = dir.path().join("out/notes.gen.h");
        write(&stale, "// Generated by reflectc from old.h. Do not edit.\n");
        write(&stale_inline, "// Generated by reflectc from sub/old.h. Do not edit.\n");
        write(&handwritten, "// my notes\n");

        let (pruned, errors) = prune_stale(&config, &HashSet::new(), &OutputWriter::new(false));
        assert_eq!(pruned, vec![stale.clone(), stale_inline.clone()]);
        assert!(errors.is_empty());
        assert!(!stale.exists());
        assert!(!stale_inline.exists());
        assert!(handwritten.exists());
    }

    #[test]
    fn test_jobs_pool() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("src/a.h"), "STRUCT()\nstruct A {};\n");
        let driver = Driver::new(config_for(dir.path())).unwrap().jobs(Some(2));
        let report = driver.run().unwrap();
        assert!(report.is_success());
        assert_eq!(report.count(&WriteOutcome::Written), 2);
    }
}
