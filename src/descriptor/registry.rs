//! Lookups across a set of compiled files.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use super::{Descriptor, EnumDescriptor, MessageDescriptor, ServiceDescriptor};

/// Prefix asking [`Registry::resolve_message`] to search by base name.
pub const INFERRED_NAME_PREFIX: &str = "..";

/// A failed registry lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// Nothing with that name.
    #[error("no message named \"{0}\" in the loaded files")]
    NotFound(String),
    /// Several messages share the base name; full names sorted.
    #[error("message name \"{name}\" is ambiguous; candidates: {}", candidates.join(", "))]
    Ambiguous {
        /// The searched base name.
        name: String,
        /// Matching full names, sorted.
        candidates: Vec<String>,
    },
}

/// Index of every declaration reachable from a set of descriptors.
///
/// ```text
/// from_descriptors([a.proto])
///   └── a.proto ─► b.proto ─► c.proto     (imports followed, each file once)
///
/// messages: "pkg.Foo" ─► file index
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    files: Vec<Arc<Descriptor>>,
    messages: FxHashMap<String, usize>,
    enums: FxHashMap<String, usize>,
    services: FxHashMap<String, usize>,
}

impl Registry {
    /// Index `roots` and everything they import.
    pub fn from_descriptors<I>(roots: I) -> Self
    where
        I: IntoIterator<Item = Arc<Descriptor>>,
    {
        let mut registry = Self::default();
        let mut seen = FxHashSet::default();
        let mut stack: Vec<_> = roots.into_iter().collect();
        stack.reverse();

        while let Some(desc) = stack.pop() {
            if !seen.insert(desc.path.clone()) {
                continue;
            }
            let deps: Vec<_> = desc.dependencies().cloned().collect();
            stack.extend(deps.into_iter().rev());
            registry.add(desc);
        }
        registry
    }

    fn add(&mut self, desc: Arc<Descriptor>) {
        let index = self.files.len();
        for message in desc.all_messages() {
            self.messages.entry(message.full_name.clone()).or_insert(index);
        }
        for decl in desc.all_enums() {
            self.enums.entry(decl.full_name.clone()).or_insert(index);
        }
        for service in &desc.services {
            self.services.entry(service.full_name.clone()).or_insert(index);
        }
        self.files.push(desc);
    }

    /// Indexed files, roots first, then imports depth-first.
    pub fn files(&self) -> &[Arc<Descriptor>] {
        &self.files
    }

    /// File that declares the message, enum or service `full_name`.
    pub fn file_of(&self, full_name: &str) -> Option<&Arc<Descriptor>> {
        let full_name = full_name.strip_prefix('.').unwrap_or(full_name);
        self.messages
            .get(full_name)
            .or_else(|| self.enums.get(full_name))
            .or_else(|| self.services.get(full_name))
            .map(|&index| &self.files[index])
    }

    /// Message by fully qualified name (a leading `.` is accepted).
    pub fn find_message(&self, full_name: &str) -> Option<&MessageDescriptor> {
        let full_name = full_name.strip_prefix('.').unwrap_or(full_name);
        let file = &self.files[*self.messages.get(full_name)?];
        file.all_messages().into_iter().find(|m| m.full_name == full_name)
    }

    /// Enum by fully qualified name.
    pub fn find_enum(&self, full_name: &str) -> Option<&EnumDescriptor> {
        let full_name = full_name.strip_prefix('.').unwrap_or(full_name);
        let file = &self.files[*self.enums.get(full_name)?];
        file.all_enums().into_iter().find(|e| e.full_name == full_name)
    }

    /// Service by fully qualified name.
    pub fn find_service(&self, full_name: &str) -> Option<&ServiceDescriptor> {
        let full_name = full_name.strip_prefix('.').unwrap_or(full_name);
        let file = &self.files[*self.services.get(full_name)?];
        file.services.iter().find(|s| s.full_name == full_name)
    }

    /// The single message whose simple name is `base_name`.
    pub fn find_unique_message(&self, base_name: &str) -> Result<&MessageDescriptor, LookupError> {
        let mut candidates: Vec<&str> = self
            .messages
            .keys()
            .filter(|full| full.rsplit('.').next() == Some(base_name))
            .map(String::as_str)
            .collect();
        candidates.sort_unstable();
        tracing::debug!(base_name, ?candidates, "resolved base name");

        match candidates.as_slice() {
            [] => Err(LookupError::NotFound(base_name.to_owned())),
            [only] => self
                .find_message(only)
                .ok_or_else(|| LookupError::NotFound(base_name.to_owned())),
            _ => Err(LookupError::Ambiguous {
                name: base_name.to_owned(),
                candidates: candidates.into_iter().map(str::to_owned).collect(),
            }),
        }
    }

    /// Resolve a message name given on a command line.
    ///
    /// `..Name` searches by base name; anything else is a full name.
    pub fn resolve_message(&self, name: &str) -> Result<&MessageDescriptor, LookupError> {
        match name.strip_prefix(INFERRED_NAME_PREFIX) {
            Some(base_name) => self.find_unique_message(base_name),
            None => self
                .find_message(name)
                .ok_or_else(|| LookupError::NotFound(name.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Linker, ProtoLinker, ResolvedImport};
    use crate::file::VirtualPath;
    use crate::syntax::{ImportKind, Parser, Position, ProtoParser};

    fn compile(path: &str, text: &str, imports: Vec<Arc<Descriptor>>) -> Arc<Descriptor> {
        let path = VirtualPath::new(path).unwrap();
        let tree = ProtoParser.parse(&path, text).unwrap();
        let imports = imports
            .into_iter()
            .map(|desc| ResolvedImport {
                path: desc.path.clone(),
                kind: ImportKind::Default,
                pos: Position::new(1, 1),
                descriptor: Some(desc),
            })
            .collect();
        Arc::new(ProtoLinker::new().link(&path, &tree, imports).unwrap().descriptor)
    }

    fn registry() -> Registry {
        let shared = compile(
            "shared.proto",
            "package shared; message Request { message Header {} } enum Level { LOW = 0; }",
            Vec::new(),
        );
        let api = compile(
            "api.proto",
            "package api; import \"shared.proto\"; message Request {} message Reply {} service Api { rpc Call (Request) returns (Reply); }",
            vec![shared],
        );
        Registry::from_descriptors([api])
    }

    #[test]
    fn test_imports_are_indexed() {
        let registry = registry();
        assert_eq!(registry.files().len(), 2);
        assert_eq!(registry.files()[0].path.as_str(), "api.proto");
        assert_eq!(registry.file_of("shared.Level").unwrap().path.as_str(), "shared.proto");
    }

    #[test]
    fn test_find_by_full_name() {
        let registry = registry();
        assert_eq!(registry.find_message("shared.Request.Header").unwrap().name, "Header");
        assert_eq!(registry.find_message(".api.Reply").unwrap().full_name, "api.Reply");
        assert!(registry.find_enum("shared.Level").is_some());
        assert_eq!(registry.find_service("api.Api").unwrap().methods.len(), 1);
        assert!(registry.find_message("api.Missing").is_none());
    }

    #[test]
    fn test_unique_base_name() {
        let registry = registry();
        assert_eq!(registry.find_unique_message("Header").unwrap().full_name, "shared.Request.Header");
        assert_eq!(
            registry.find_unique_message("Request").unwrap_err(),
            LookupError::Ambiguous {
                name: "Request".into(),
                candidates: vec!["api.Request".into(), "shared.Request".into()],
            }
        );
        assert!(matches!(registry.find_unique_message("Nope"), Err(LookupError::NotFound(_))));
    }

    #[test]
    fn test_resolve_message_prefix() {
        let registry = registry();
        assert_eq!(registry.resolve_message("..Reply").unwrap().full_name, "api.Reply");
        assert_eq!(registry.resolve_message("api.Reply").unwrap().full_name, "api.Reply");
        assert!(registry.resolve_message("Reply").is_err());
    }
}
