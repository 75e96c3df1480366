//! Inheritance resolution across all scanned files.
//!
//! Each container's declared bases are matched by name against the
//! aggregate set, and the full ancestor chain is built depth-first: nearest
//! declared base first, bases visited in declaration order, duplicates kept
//! (a diamond base appears once per path).

use crate::error::{ReflectError, Result};
use crate::model::{ContainerKind, ContainerRecord, TypeRef};
use indexmap::IndexSet;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// A container together with its resolved ancestor chain
#[derive(Debug, Clone)]
pub struct ResolvedContainer<'a> {
    pub record: &'a ContainerRecord,
    /// Transitive bases, nearest first, duplicates allowed
    pub ancestors: Vec<&'a ContainerRecord>,
}

impl<'a> ResolvedContainer<'a> {
    /// Ancestor names with later duplicates removed, preserving chain order
    pub fn unique_ancestor_names(&self) -> Vec<&'a str> {
        let unique: IndexSet<&str> = self.ancestors.iter().map(|a| a.name.as_str()).collect();
        unique.into_iter().collect()
    }

    /// Whether `name` is this container or one of its ancestors
    pub fn is_a(&self, name: &str) -> bool {
        self.record.name == name || self.ancestors.iter().any(|a| a.name == name)
    }
}

/// Resolves base references against the aggregate container set
pub struct InheritanceResolver<'a> {
    containers: &'a [ContainerRecord],
    by_name: HashMap<&'a str, Vec<usize>>,
    external: HashSet<String>,
    memo: HashMap<usize, Vec<usize>>,
}

impl<'a> InheritanceResolver<'a> {
    /// # Arguments
    ///
    /// * `containers` - every container from every file, in a deterministic order
    /// * `external_bases` - base names allowed to stay unresolved
    pub fn new(containers: &'a [ContainerRecord], external_bases: &[String]) -> Self {
        let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
        for (idx, container) in containers.iter().enumerate() {
            if container.kind != ContainerKind::Enum {
                by_name.entry(container.name.as_str()).or_default().push(idx);
            }
        }
        Self {
            containers,
            by_name,
            external: external_bases.iter().cloned().collect(),
            memo: HashMap::new(),
        }
    }

    /// Resolve every container, failing on the first unknown, ambiguous or cyclic base
    pub fn resolve_all(mut self) -> Result<Vec<ResolvedContainer<'a>>> {
        let containers = self.containers;
        let mut resolved = Vec::with_capacity(containers.len());
        for idx in 0..containers.len() {
            let chain = self.chain(idx, &mut Vec::new())?;
            resolved.push(ResolvedContainer {
                record: &containers[idx],
                ancestors: chain.into_iter().map(|i| &containers[i]).collect(),
            });
        }
        tracing::debug!("resolved inheritance for {} containers", resolved.len());
        Ok(resolved)
    }

    fn lookup(&self, owner: &ContainerRecord, base: &TypeRef) -> Result<Option<usize>> {
        let name = base.base_name();
        match self.by_name.get(name).map(Vec::as_slice) {
            Some([idx]) => Ok(Some(*idx)),
            Some(candidates) if candidates.len() > 1 => Err(ReflectError::AmbiguousBaseType {
                file: PathBuf::from(&owner.file_id),
                location: owner.location,
                container: owner.name.clone(),
                base: base.raw_name.clone(),
                candidates: candidates
                    .iter()
                    .map(|&i| self.containers[i].qualified_id())
                    .collect(),
            }),
            _ if self.external.contains(name) || self.external.contains(base.raw_name.as_str()) => Ok(None),
            _ => Err(ReflectError::UnknownBaseType {
                file: PathBuf::from(&owner.file_id),
                location: owner.location,
                container: owner.name.clone(),
                base: base.raw_name.clone(),
            }),
        }
    }

    /// Ancestor chain of `idx`; `visiting` holds the current traversal path
    fn chain(&mut self, idx: usize, visiting: &mut Vec<usize>) -> Result<Vec<usize>> {
        if let Some(chain) = self.memo.get(&idx) {
            return Ok(chain.clone());
        }

        let containers = self.containers;
        let owner = &containers[idx];
        visiting.push(idx);
        let mut chain = Vec::new();
        for base in &owner.bases {
            let Some(base_idx) = self.lookup(owner, base)? else {
                continue;
            };
            if let Some(pos) = visiting.iter().position(|&i| i == base_idx) {
                let start = &containers[visiting[pos]];
                let mut cycle: Vec<String> = visiting[pos..]
                    .iter()
                    .map(|&i| containers[i].name.clone())
                    .collect();
                cycle.push(start.name.clone());
                return Err(ReflectError::CyclicInheritance {
                    file: PathBuf::from(&start.file_id),
                    location: start.location,
                    cycle,
                });
            }
            chain.push(base_idx);
            chain.extend(self.chain(base_idx, visiting)?);
        }
        visiting.pop();

        self.memo.insert(idx, chain.clone());
        Ok(chain)
    }
}

/// Resolve the ancestor chains of `containers`
pub fn resolve<'a>(containers: &'a [ContainerRecord], external_bases: &[String]) -> Result<Vec<ResolvedContainer<'a>>> {
    InheritanceResolver::new(containers, external_bases).resolve_all()
}
