//! # reflectc: reflection metadata compiler
//!
//! Scans C++ headers for reflection markers and generates companion headers
//! with property tables, accessor thunks and type-registration blocks.
//!
//! ## Example header
//!
//! ```text
//! #include "Player.gen.h"
//!
//! CLASS(Blueprintable)
//! class Player : public Pawn {
//!     GENERATED_BODY()
//! public:
//!     PROPERTY(EditAnywhere, Meta(Range(0|100)))
//!     float Health = 100.0f;
//!
//!     FUNCTION(Callable)
//!     void Heal(float amount);
//! };
//!
//! #include "Player.gen.inl"
//! ```
//!
//! Running `reflectc generate` over a tree containing this file writes
//! `Player.gen.h` (generated-body macros) and `Player.gen.inl` (tables and
//! thunks) next to the other artifacts in the output root.
//!
//! ## Pipeline
//!
//! - [`scanner`] tokenizes a file and yields marker events
//! - [`builder`] turns events into [`model::ContainerRecord`]s
//! - [`resolver`] links bases across all files
//! - [`codegen`] renders each container with the enabled backends
//! - [`writer`] commits artifacts, touching only files that changed
//! - [`driver`] runs all of the above for a [`config::ReflectConfig`]

pub mod attributes;
pub mod builder;
pub mod codegen;
pub mod config;
pub mod declaration;
pub mod driver;
pub mod error;
pub mod model;
pub mod resolver;
pub mod scanner;
pub mod writer;

// Re-export key types
pub use attributes::{parse_attributes, AttributeMap, AttributeValue};
pub use builder::{build_file_model, FileModel};
pub use codegen::{Artifact, ArtifactGenerator, ArtifactPart, BackendKind, CodegenBackend, GenerationOptions};
pub use config::ReflectConfig;
pub use driver::{Driver, RunReport};
pub use error::{ReflectError, Result, SourceLocation};
pub use model::{ContainerKind, ContainerRecord, FunctionRecord, PropertyRecord, TypeRef, Visibility};
pub use resolver::{resolve, ResolvedContainer};
pub use scanner::Vocabulary;
pub use writer::{OutputWriter, WriteOutcome};
