//! Container model builder.
//!
//! Consumes the scanner's event stream for one file and assembles
//! [`ContainerRecord`]s. Scope tracking follows braces: a container marker
//! opens a record whose body starts at the declaration's `{`, and the record
//! is complete when the matching `}` is seen. Errors inside a container poison
//! that container only; its siblings and nested containers are unaffected.
//!
//! Each record's scope lists the enclosing namespaces and reflected
//! containers, so generated code can name it from global scope.

use crate::attributes::{parse_attributes, AttributeMap};
use crate::declaration::{parse_container_header, parse_enumerators, parse_function, parse_variable};
use crate::error::{ReflectError, SourceLocation};
use crate::model::{ContainerKind, ContainerRecord, FunctionRecord, PropertyRecord, Visibility};
use crate::scanner::lexer::Lexer;
use crate::scanner::{EventKind, MarkerKind, ScanEvent, Scanner, Vocabulary};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Everything extracted from one source file
#[derive(Debug, Clone, Default)]
pub struct FileModel {
    pub path: PathBuf,
    pub file_id: String,
    /// Containers in declaration order
    pub containers: Vec<ContainerRecord>,
    /// Recoverable errors; the containers they affect are absent
    pub errors: Vec<ReflectError>,
    pub warnings: Vec<String>,
}

/// Scan `source` and build its container records.
///
/// # Arguments
///
/// * `source` - file contents
/// * `path` - path used in diagnostics
/// * `file_id` - stable identifier of the file (relative input path)
/// * `vocabulary` - marker spellings
pub fn build_file_model(source: &str, path: &Path, file_id: &str, vocabulary: &Vocabulary) -> FileModel {
    let mut builder = ModelBuilder::new(path, file_id);
    for event in Scanner::new(source, path, vocabulary) {
        match event {
            Ok(event) => builder.process(event),
            Err(err) => builder.fail(err),
        }
    }
    builder.finish()
}

struct Frame {
    slot: usize,
    record: ContainerRecord,
    body_depth: usize,
    visibility: Visibility,
    poison: Option<ReflectError>,
}

impl Frame {
    fn poison(&mut self, err: ReflectError) {
        if self.poison.is_none() {
            self.poison = Some(err);
        }
    }
}

/// An open `namespace` body
struct Namespace {
    depth: usize,
    /// `a::b` opens two names at once; anonymous namespaces open none
    names: Vec<String>,
}

struct ModelBuilder {
    path: PathBuf,
    file_id: String,
    depth: usize,
    namespaces: Vec<Namespace>,
    frames: Vec<Frame>,
    /// One slot per container, in opening order
    slots: Vec<Option<ContainerRecord>>,
    names: HashSet<String>,
    errors: Vec<ReflectError>,
    warnings: Vec<String>,
}

fn is_enum_declaration(declaration: &str) -> bool {
    Lexer::new(declaration)
        .next()
        .map(|t| t.text(declaration) == "enum")
        .unwrap_or(false)
}

impl ModelBuilder {
    fn new(path: &Path, file_id: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            file_id: file_id.to_string(),
            depth: 0,
            namespaces: Vec::new(),
            frames: Vec::new(),
            slots: Vec::new(),
            names: HashSet::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn malformed(&self, location: SourceLocation, reason: impl Into<String>) -> ReflectError {
        ReflectError::MalformedDeclaration {
            file: self.path.clone(),
            location,
            reason: reason.into(),
        }
    }

    /// Route an error to the innermost open container, or to the file
    fn fail(&mut self, err: ReflectError) {
        match self.frames.last_mut() {
            Some(frame) => frame.poison(err),
            None => self.errors.push(err),
        }
    }

    /// Enclosing namespaces, then enclosing reflected containers
    fn scope(&self) -> Vec<String> {
        self.namespaces
            .iter()
            .flat_map(|ns| ns.names.iter().cloned())
            .chain(self.frames.iter().map(|frame| frame.record.name.clone()))
            .collect()
    }

    fn attributes(&self, event: &ScanEvent) -> Result<AttributeMap, ReflectError> {
        parse_attributes(&event.attributes, &self.path, event.attributes_location)
    }

    fn process(&mut self, event: ScanEvent) {
        match event.kind {
            EventKind::Marker(MarkerKind::Container) => self.open_container(event),
            EventKind::Marker(MarkerKind::Property) => self.add_property(event),
            EventKind::Marker(MarkerKind::Function) => self.add_function(event),
            EventKind::Marker(MarkerKind::GeneratedBody) => match self.frames.last_mut() {
                Some(frame) => frame.record.generated_body_line = Some(event.location.line),
                None => self.warnings.push(format!(
                    "{}:{}: generated-body marker outside of a reflected container",
                    self.path.display(),
                    event.location
                )),
            },
            EventKind::Visibility(visibility) => {
                let depth = self.depth;
                if let Some(frame) = self.frames.last_mut() {
                    if frame.body_depth == depth {
                        frame.visibility = visibility;
                    }
                }
            }
            EventKind::Namespace => {
                self.depth += 1;
                let names = event
                    .declaration
                    .split("::")
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(String::from)
                    .collect();
                self.namespaces.push(Namespace {
                    depth: self.depth,
                    names,
                });
            }
            EventKind::OpenBrace => self.depth += 1,
            EventKind::CloseBrace => {
                if matches!(self.frames.last(), Some(frame) if frame.body_depth == self.depth) {
                    if let Some(frame) = self.frames.pop() {
                        self.close(frame);
                    }
                } else if matches!(self.namespaces.last(), Some(ns) if ns.depth == self.depth) {
                    self.namespaces.pop();
                }
                self.depth = self.depth.saturating_sub(1);
            }
        }
    }

    fn open_container(&mut self, event: ScanEvent) {
        let is_enum = is_enum_declaration(&event.declaration);
        let header = parse_container_header(&event.declaration);
        let attributes = self.attributes(&event);

        let (kind, name) = match &header {
            Ok(h) => (h.kind, h.name.clone()),
            Err(_) if is_enum => (ContainerKind::Enum, String::from("<anonymous>")),
            Err(_) => (ContainerKind::Class, String::from("<anonymous>")),
        };
        let mut record = ContainerRecord::new(name.clone(), kind, self.file_id.clone());
        record.location = event.declaration_location;
        record.scope = self.scope();

        let mut poison = None;
        match header {
            Ok(header) => {
                record.bases = header.bases;
                record.underlying = header.underlying;
            }
            Err(reason) => poison = Some(self.malformed(event.declaration_location, reason)),
        }
        match attributes {
            Ok(attributes) => record.attributes = attributes,
            Err(err) => poison = poison.or(Some(err)),
        }
        if poison.is_none() && !self.names.insert(record.cpp_name()) {
            poison = Some(ReflectError::DuplicateContainer {
                file: self.path.clone(),
                location: event.declaration_location,
                container: name.clone(),
            });
        }

        let slot = self.slots.len();
        self.slots.push(None);

        if is_enum {
            match (&event.body, poison) {
                (_, Some(err)) => self.errors.push(err),
                (None, None) => self.errors.push(ReflectError::UnterminatedContainer {
                    file: self.path.clone(),
                    location: event.declaration_location,
                    container: name,
                }),
                (Some(body), None) => {
                    record.enumerators = parse_enumerators(body);
                    tracing::debug!("{}: enum {} ({} enumerators)", self.file_id, record.name, record.enumerators.len());
                    self.slots[slot] = Some(record);
                }
            }
            return;
        }

        self.depth += 1;
        self.frames.push(Frame {
            slot,
            visibility: kind.default_visibility(),
            record,
            body_depth: self.depth,
            poison,
        });
    }

    fn add_property(&mut self, event: ScanEvent) {
        let attributes = self.attributes(&event);
        let parsed = parse_variable(&event.declaration);
        let path = self.path.clone();
        let Some(frame) = self.frames.last_mut() else {
            let err = self.malformed(event.location, "property marker outside of a reflected container");
            self.errors.push(err);
            return;
        };

        let attributes = match attributes {
            Ok(a) => a,
            Err(err) => return frame.poison(err),
        };
        match parsed {
            Ok((_, name)) if name.is_empty() => frame.poison(ReflectError::MalformedDeclaration {
                file: path,
                location: event.declaration_location,
                reason: format!("property declaration '{}' has no name", event.declaration),
            }),
            Ok((ty, name)) => frame.record.properties.push(PropertyRecord {
                name,
                ty,
                visibility: frame.visibility,
                attributes,
                location: event.declaration_location,
            }),
            Err(reason) => frame.poison(ReflectError::MalformedDeclaration {
                file: path,
                location: event.declaration_location,
                reason,
            }),
        }
    }

    fn add_function(&mut self, event: ScanEvent) {
        let attributes = self.attributes(&event);
        let parsed = parse_function(&event.declaration);
        let path = self.path.clone();
        let Some(frame) = self.frames.last_mut() else {
            let err = self.malformed(event.location, "function marker outside of a reflected container");
            self.errors.push(err);
            return;
        };

        let attributes = match attributes {
            Ok(a) => a,
            Err(err) => return frame.poison(err),
        };
        match parsed {
            Ok(sig) => frame.record.functions.push(FunctionRecord {
                name: sig.name,
                return_type: sig.return_type,
                parameters: sig.parameters,
                visibility: frame.visibility,
                is_static: sig.is_static,
                is_const: sig.is_const,
                attributes,
                location: event.declaration_location,
            }),
            Err(reason) => frame.poison(ReflectError::MalformedDeclaration {
                file: path,
                location: event.declaration_location,
                reason,
            }),
        }
    }

    fn close(&mut self, frame: Frame) {
        if let Some(err) = frame.poison {
            tracing::debug!("{}: skipping container {}: {}", self.file_id, frame.record.name, err);
            self.errors.push(err);
            return;
        }
        let record = frame.record;
        if record.generated_body_line.is_none() {
            self.warnings.push(format!(
                "{}:{}: {} '{}' has no generated-body marker",
                self.path.display(),
                record.location,
                record.kind.as_str(),
                record.name
            ));
        }
        tracing::debug!(
            "{}: {} {} ({} properties, {} functions)",
            self.file_id,
            record.kind.as_str(),
            record.name,
            record.properties.len(),
            record.functions.len()
        );
        self.slots[frame.slot] = Some(record);
    }

    fn finish(mut self) -> FileModel {
        let open: Vec<Frame> = self.frames.drain(..).collect();
        for frame in open {
            if let Some(err) = frame.poison {
                self.errors.push(err);
            }
            self.errors.push(ReflectError::UnterminatedContainer {
                file: self.path.clone(),
                location: frame.record.location,
                container: frame.record.name,
            });
        }

        FileModel {
            path: self.path,
            file_id: self.file_id,
            containers: self.slots.into_iter().flatten().collect(),
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}
