//! Code generation backends.
//!
//! A backend turns one resolved container into sections of C++ text. All
//! backends are pure: their output depends only on the container and the
//! [`GenerationOptions`] passed in, which keeps regenerated artifacts
//! byte-identical across runs and threads.
//!
//! Every artifact has two parts. The header part is included before the
//! annotated types and only defines macros, so it never names a reflected
//! type. The inline part is included at global scope after the types and
//! holds the tables and definitions, spelled with fully qualified names:
//!
//! ```text
//! #include "Pawn.gen.h"     // generated-body macros
//! namespace game { CLASS() class Pawn { GENERATED_BODY() ... }; }
//! #include "Pawn.gen.inl"   // tables, thunks, IsA
//! ```

pub mod legacy;
pub mod type_info;
pub mod utils;

use crate::resolver::ResolvedContainer;
use rayon::prelude::*;
use std::fmt::{self, Write};
use std::str::FromStr;

pub use legacy::LegacyBackend;
pub use type_info::TypeInfoBackend;

/// Available backends, in the order their sections appear in an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BackendKind {
    Legacy,
    TypeInfo,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Legacy => "legacy",
            BackendKind::TypeInfo => "type_info",
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "legacy" => Ok(BackendKind::Legacy),
            "type_info" | "type-info" | "typeinfo" => Ok(BackendKind::TypeInfo),
            other => Err(format!(
                "Unsupported backend: '{}'. Supported backends: legacy, type_info",
                other
            )),
        }
    }
}

/// Half of an artifact a section belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactPart {
    /// Included before the annotated types
    Header,
    /// Included after the annotated types
    Inline,
}

impl ArtifactPart {
    /// File extension of this part; `None` keeps the input's extension
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            ArtifactPart::Header => None,
            ArtifactPart::Inline => Some("inl"),
        }
    }
}

/// Generated text for one input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub header: String,
    pub inline: String,
}

impl Artifact {
    pub fn part(&self, part: ArtifactPart) -> &str {
        match part {
            ArtifactPart::Header => &self.header,
            ArtifactPart::Inline => &self.inline,
        }
    }
}

/// Options shared by all backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOptions {
    /// Emit type-registration blocks
    pub type_info: bool,
    /// Prefix of generated macros, e.g. `REFLECT` for `REFLECT_TYPE_BEGIN`
    pub macro_prefix: String,
    /// Header providing the descriptor types used by generated code
    pub runtime_include: String,
    /// Namespace of the descriptor types
    pub runtime_namespace: String,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            type_info: false,
            macro_prefix: "REFLECT".to_string(),
            runtime_include: "reflect/Runtime.h".to_string(),
            runtime_namespace: "::reflect".to_string(),
        }
    }
}

/// A code generation strategy
pub trait CodegenBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Write the `part` section for `container` to `out`
    fn generate(
        &self,
        container: &ResolvedContainer<'_>,
        part: ArtifactPart,
        options: &GenerationOptions,
        out: &mut String,
    ) -> fmt::Result;
}

/// Instantiate a backend
pub fn backend_for(kind: BackendKind) -> Box<dyn CodegenBackend> {
    match kind {
        BackendKind::Legacy => Box::new(LegacyBackend),
        BackendKind::TypeInfo => Box::new(TypeInfoBackend),
    }
}

/// Runs a set of backends and assembles per-file artifacts
pub struct ArtifactGenerator {
    backends: Vec<Box<dyn CodegenBackend>>,
    options: GenerationOptions,
}

impl ArtifactGenerator {
    /// Backends always run in [`BackendKind`] order, whatever order they were requested in
    pub fn new(kinds: &[BackendKind], options: GenerationOptions) -> Self {
        let mut kinds = kinds.to_vec();
        kinds.sort();
        kinds.dedup();
        let backends: Vec<Box<dyn CodegenBackend>> = kinds.into_iter().map(backend_for).collect();
        tracing::debug!(
            "backends: {}",
            backends.iter().map(|b| b.kind().as_str()).collect::<Vec<_>>().join(", ")
        );
        Self { backends, options }
    }

    /// All backend sections of one part for one container
    pub fn generate_container(
        &self,
        container: &ResolvedContainer<'_>,
        part: ArtifactPart,
    ) -> Result<String, fmt::Error> {
        let mut out = String::new();
        for backend in &self.backends {
            backend.generate(container, part, &self.options, &mut out)?;
        }
        Ok(out)
    }

    /// Both parts of the artifact for one input file.
    ///
    /// # Arguments
    ///
    /// * `file_id` - relative path of the input file
    /// * `containers` - the file's containers in declaration order
    pub fn generate_artifact(
        &self,
        file_id: &str,
        containers: &[ResolvedContainer<'_>],
    ) -> Result<Artifact, fmt::Error> {
        let sections: Vec<(String, String)> = containers
            .par_iter()
            .map(|c| -> Result<(String, String), fmt::Error> {
                Ok((
                    self.generate_container(c, ArtifactPart::Header)?,
                    self.generate_container(c, ArtifactPart::Inline)?,
                ))
            })
            .collect::<Result<_, _>>()?;

        let prefix = &self.options.macro_prefix;
        let mut header = String::new();
        writeln!(header, "// Generated by reflectc from {}. Do not edit.", file_id)?;
        writeln!(header, "// Include before the annotated types.")?;
        writeln!(header, "#pragma once")?;
        writeln!(header)?;
        writeln!(header, "#include <cstddef>")?;
        writeln!(header, "#include \"{}\"", self.options.runtime_include)?;
        writeln!(header)?;
        writeln!(header, "#undef {}_CURRENT_FILE_ID", prefix)?;
        writeln!(header, "#define {}_CURRENT_FILE_ID {}", prefix, utils::file_symbol(file_id))?;

        let mut inline = String::new();
        writeln!(inline, "// Generated by reflectc from {}. Do not edit.", file_id)?;
        writeln!(inline, "// Include at global scope after the annotated types.")?;
        writeln!(inline, "#pragma once")?;
        writeln!(inline)?;
        writeln!(inline, "#include <cstddef>")?;
        writeln!(inline, "#include <cstring>")?;
        writeln!(inline, "#include \"{}\"", self.options.runtime_include)?;

        for (header_section, inline_section) in sections {
            header.push_str(&header_section);
            inline.push_str(&inline_section);
        }
        Ok(Artifact { header, inline })
    }
}
