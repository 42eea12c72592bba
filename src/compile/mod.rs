//! Import resolution and compilation.
//!
//! # Example
//!
//! ```ignore
//! use proto_importer::prelude::*;
//!
//! let tree = SourceTree::new()
//!     .with_mapping("/proto", "/app/test/proto")?
//!     .with_mapping("google/protobuf", "/app/lib/protobuf-3.19.4/src/google/protobuf")?;
//!
//! let importer = Importer::new(tree);
//! match importer.compile(&VirtualPath::new("/proto/happyday.proto")?) {
//!     Ok(desc) => println!("{} messages", desc.counts().messages),
//!     Err(failure) => eprint!("{}", failure.diagnostics),
//! }
//! ```
//!
//! # Pipeline
//!
//! ```text
//! compile(root)
//!   └── resolve(path) ── cache hit ──────────────► Compiled / Failed / Cycle
//!         │ claimed
//!         ├── SourceTree::resolve   ─► PathNotFound
//!         ├── FileLoader::load      ─► PathNotFound / IoFailure
//!         ├── Parser::parse         ─► SyntaxError
//!         ├── resolve(import) ...      (declaration order, recursive)
//!         └── Linker::link          ─► UnresolvedReference / BindFailure
//!               └── publish
//! ```

#[cfg(feature = "batch")]
mod batch;
mod job;

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::{DescriptorCache, WorkerId};
use crate::config::{self, Config};
use crate::descriptor::{Descriptor, Linker, ProtoLinker, Registry};
use crate::diagnostic::{BufferSink, Diagnostic, DiagnosticSink, PartialFailure};
use crate::file::{DiskLoader, FileLoader, LoadError, SourceTree, VirtualPath};
use crate::syntax::{Parser, ProtoParser};

use job::Job;

/// Compiles root files and everything they import, sharing one cache.
///
/// Every collaborator is replaceable through a `with_*` builder method:
///
/// | Collaborator | Default        |
/// |--------------|----------------|
/// | loader       | [`DiskLoader`] |
/// | sink         | [`BufferSink`] |
/// | parser       | [`ProtoParser`]|
/// | linker       | [`ProtoLinker`] configured from [`Config`] |
///
/// An `Importer` is `Send + Sync`; concurrent `compile` calls share the
/// cache and never compile a file twice.
pub struct Importer {
    tree: SourceTree,
    loader: Arc<dyn FileLoader>,
    sink: Arc<dyn DiagnosticSink>,
    parser: Arc<dyn Parser>,
    linker: Option<Arc<dyn Linker>>,
    config: Config,
    cache: DescriptorCache,
    loaded: Mutex<Vec<(VirtualPath, PathBuf)>>,
}

impl Importer {
    /// Create an importer over `tree` using the global [`Config`].
    pub fn new(tree: SourceTree) -> Self {
        Self {
            tree,
            loader: Arc::new(DiskLoader),
            sink: Arc::new(BufferSink::new()),
            parser: Arc::new(ProtoParser),
            linker: None,
            config: config::get().clone(),
            cache: DescriptorCache::new(),
            loaded: Mutex::new(Vec::new()),
        }
    }

    /// Read files through `loader`.
    pub fn with_loader(mut self, loader: impl FileLoader + 'static) -> Self {
        self.loader = Arc::new(loader);
        self
    }

    /// Report diagnostics to `sink`.
    ///
    /// Pass an `Arc` to keep a handle on the sink.
    pub fn with_sink(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Parse with `parser`.
    pub fn with_parser(mut self, parser: impl Parser + 'static) -> Self {
        self.parser = Arc::new(parser);
        self
    }

    /// Link with `linker` instead of the built-in one.
    pub fn with_linker(mut self, linker: impl Linker + 'static) -> Self {
        self.linker = Some(Arc::new(linker));
        self
    }

    /// Use `config` instead of the global configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The virtual path mapper.
    pub fn source_tree(&self) -> &SourceTree {
        &self.tree
    }

    /// The configuration in effect.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The shared descriptor cache.
    pub fn cache(&self) -> &DescriptorCache {
        &self.cache
    }

    /// Take everything the sink buffered (empty for non-buffering sinks).
    pub fn drain_diagnostics(&self) -> Vec<Diagnostic> {
        self.sink.drain()
    }

    /// Every `(virtual, physical)` pair loaded so far, in load order.
    pub fn loaded_files(&self) -> Vec<(VirtualPath, PathBuf)> {
        self.loaded.lock().clone()
    }

    /// Every published descriptor, sorted by path.
    pub fn compiled(&self) -> Vec<Arc<Descriptor>> {
        self.cache.compiled()
    }

    /// A registry over every published descriptor.
    pub fn registry(&self) -> Registry {
        Registry::from_descriptors(self.compiled())
    }

    /// Every schema file reachable through the mappings, sorted.
    pub fn discover(&self) -> Result<Vec<VirtualPath>, LoadError> {
        let extension = format!(".{}", self.config.extension);
        self.tree.list_files(&extension, self.loader.as_ref())
    }

    // =========================================================================
    // Compilation
    // =========================================================================

    /// Compile `root` and, transitively, everything it imports.
    ///
    /// Returns the root descriptor only when the root and all of its imports
    /// compiled and no error was reported during this call. Otherwise the
    /// [`PartialFailure`] holds the partial results and the diagnostics.
    /// Repeated calls are served from the cache.
    pub fn compile(&self, root: &VirtualPath) -> Result<Arc<Descriptor>, PartialFailure> {
        let span = tracing::debug_span!("compile", %root);
        let _enter = span.enter();

        let mut job = Job::new(self, WorkerId::next());
        let outcome = job.resolve(root, None);
        job.finish(root, outcome)
    }

    /// Compile several roots, sharing the cache.
    ///
    /// With the `batch` feature the roots are compiled in parallel; results
    /// keep the order of `roots`.
    pub fn compile_all(&self, roots: &[VirtualPath]) -> Vec<Result<Arc<Descriptor>, PartialFailure>> {
        #[cfg(feature = "batch")]
        {
            batch::compile_parallel(self, roots)
        }
        #[cfg(not(feature = "batch"))]
        {
            roots.iter().map(|root| self.compile(root)).collect()
        }
    }

    fn linker(&self) -> Arc<dyn Linker> {
        match &self.linker {
            Some(linker) => Arc::clone(linker),
            None => Arc::new(ProtoLinker::new().with_unused_import_warnings(self.config.warn_unused_imports)),
        }
    }

    fn record_load(&self, path: &VirtualPath, physical: PathBuf) {
        self.loaded.lock().push((path.clone(), physical));
    }
}

impl std::fmt::Debug for Importer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Importer")
            .field("tree", &self.tree)
            .field("config", &self.config)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use rustc_hash::FxHashMap;

    use super::*;
    use crate::cache::{EntryState, FailureReason};
    use crate::config::ConfigBuilder;
    use crate::diagnostic::{DiagnosticKind, Severity};
    use crate::file::MapLoader;

    /// Serves in-memory files and counts loads per physical path.
    #[derive(Default)]
    struct CountingLoader {
        files: MapLoader,
        loads: Mutex<FxHashMap<PathBuf, usize>>,
    }

    impl CountingLoader {
        fn new(root: &str, files: &[(&str, &str)]) -> Arc<Self> {
            let mut loader = Self::default();
            for (path, text) in files {
                loader.files.insert(Path::new(root).join(path), text);
            }
            Arc::new(loader)
        }

        fn count(&self, physical: &str) -> usize {
            self.loads.lock().get(Path::new(physical)).copied().unwrap_or(0)
        }

        fn total(&self) -> usize {
            self.loads.lock().values().sum()
        }
    }

    impl FileLoader for CountingLoader {
        fn exists(&self, path: &Path) -> bool {
            self.files.exists(path)
        }

        fn load(&self, path: &Path) -> Result<String, LoadError> {
            *self.loads.lock().entry(path.to_path_buf()).or_default() += 1;
            self.files.load(path)
        }

        fn walk(&self, root: &Path) -> Result<Vec<PathBuf>, LoadError> {
            self.files.walk(root)
        }
    }

    fn vp(path: &str) -> VirtualPath {
        VirtualPath::new(path).unwrap()
    }

    fn setup(files: &[(&str, &str)]) -> (Importer, Arc<CountingLoader>, Arc<BufferSink>) {
        let loader = CountingLoader::new("/src", files);
        let sink = Arc::new(BufferSink::new());
        let tree = SourceTree::new().with_mapping("", "/src").unwrap();
        let importer = Importer::new(tree)
            .with_loader(Arc::clone(&loader))
            .with_sink(Arc::clone(&sink))
            .with_config(Config::default());
        (importer, loader, sink)
    }

    fn kinds(failure: &PartialFailure) -> Vec<DiagnosticKind> {
        failure.diagnostics.iter().map(|d| d.kind).collect()
    }

    #[test]
    fn test_compile_twice_returns_cached_descriptor() {
        let (importer, loader, sink) = setup(&[
            ("a.proto", "syntax = \"proto3\";\nimport \"b.proto\";\nmessage A { B b = 1; }"),
            ("b.proto", "syntax = \"proto3\";\nmessage B {}"),
        ]);

        let first = importer.compile(&vp("a.proto")).unwrap();
        let second = importer.compile(&vp("a.proto")).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.total(), 2);
        assert!(first.is_complete());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_diamond_compiles_shared_import_once() {
        let (importer, loader, _) = setup(&[
            ("a.proto", "import \"b.proto\";\nimport \"c.proto\";\nmessage A { optional B b = 1; optional C c = 2; }"),
            ("b.proto", "import \"d.proto\";\nmessage B { optional D d = 1; }"),
            ("c.proto", "import \"d.proto\";\nmessage C { optional D d = 1; }"),
            ("d.proto", "message D {}"),
        ]);

        let a = importer.compile(&vp("a.proto")).unwrap();
        assert_eq!(loader.count("/src/d.proto"), 1);
        assert_eq!(loader.total(), 4);
        assert_eq!(importer.loaded_files().len(), 4);

        let d_via_b = a.imports[0].descriptor.as_ref().unwrap().imports[0].descriptor.clone().unwrap();
        let d_via_c = a.imports[1].descriptor.as_ref().unwrap().imports[0].descriptor.clone().unwrap();
        assert!(Arc::ptr_eq(&d_via_b, &d_via_c));
    }

    #[test]
    fn test_self_import_is_one_cycle() {
        let (importer, _, sink) = setup(&[("a.proto", "import \"a.proto\";\nmessage A {}")]);

        let failure = importer.compile(&vp("a.proto")).unwrap_err();
        assert_eq!(kinds(&failure), vec![DiagnosticKind::ImportCycle]);

        let cycle = &failure.diagnostics.as_slice()[0];
        assert_eq!((cycle.path.as_str(), cycle.line, cycle.column), ("a.proto", 1, 1));
        assert!(cycle.message.contains("a.proto -> a.proto"));

        // The file itself still compiled, without the cyclic edge.
        let partial = failure.descriptor.unwrap();
        assert!(!partial.is_complete());
        assert_eq!(sink.drain(), failure.diagnostics.into_vec());
    }

    #[test]
    fn test_cycle_reported_at_closing_edge() {
        let (importer, _, _) = setup(&[
            ("a.proto", "syntax = \"proto3\";\nimport \"b.proto\";\nmessage A {}"),
            ("b.proto", "syntax = \"proto3\";\nimport \"a.proto\";\nmessage B {}"),
        ]);

        let failure = importer.compile(&vp("a.proto")).unwrap_err();
        assert_eq!(kinds(&failure), vec![DiagnosticKind::ImportCycle]);

        let cycle = &failure.diagnostics.as_slice()[0];
        assert_eq!((cycle.path.as_str(), cycle.line), ("b.proto", 2));
        assert!(cycle.message.contains("a.proto -> b.proto -> a.proto"));
        assert!(matches!(importer.cache().state(&vp("b.proto")), Some(EntryState::Compiled(_))));
    }

    #[test]
    fn test_overlay_mappings() {
        let mut loader = MapLoader::new();
        loader.insert(
            "/app/test/proto/happyday.proto",
            "syntax = \"proto3\";\npackage happyday;\nimport \"google/protobuf/timestamp.proto\";\nmessage HappyDayRequest { google.protobuf.Timestamp date = 1; }",
        );
        loader.insert(
            "/app/lib/protobuf-3.19.4/src/google/protobuf/timestamp.proto",
            "syntax = \"proto3\";\npackage google.protobuf;\nmessage Timestamp { int64 seconds = 1; int32 nanos = 2; }",
        );
        let tree = SourceTree::new()
            .with_mapping("/proto", "/app/test/proto")
            .unwrap()
            .with_mapping("google/protobuf", "/app/lib/protobuf-3.19.4/src/google/protobuf")
            .unwrap();
        let importer = Importer::new(tree).with_loader(loader).with_config(Config::default());

        let desc = importer.compile(&vp("/proto/happyday.proto")).unwrap();
        assert_eq!(desc.package.as_deref(), Some("happyday"));
        assert_eq!(
            importer.loaded_files(),
            vec![
                (vp("/proto/happyday.proto"), PathBuf::from("/app/test/proto/happyday.proto")),
                (
                    vp("google/protobuf/timestamp.proto"),
                    PathBuf::from("/app/lib/protobuf-3.19.4/src/google/protobuf/timestamp.proto")
                ),
            ]
        );
        assert!(importer.registry().find_message("google.protobuf.Timestamp").is_some());
    }

    #[test]
    fn test_syntax_error_does_not_affect_siblings() {
        let (importer, _, _) = setup(&[
            ("bad.proto", "message Bad {\n  int32 x = 1\n}"),
            ("good.proto", "message Good {}"),
            ("root.proto", "import \"good.proto\";\nimport \"bad.proto\";\nmessage Root { optional Good g = 1; }"),
        ]);

        let failure = importer.compile(&vp("bad.proto")).unwrap_err();
        let syntax = &failure.diagnostics.as_slice()[0];
        assert_eq!(syntax.kind, DiagnosticKind::SyntaxError);
        assert_eq!((syntax.path.as_str(), syntax.line, syntax.column), ("bad.proto", 3, 1));
        assert!(failure.descriptor.is_none());

        assert!(importer.compile(&vp("good.proto")).is_ok());

        // The root still compiles, minus the broken import.
        let failure = importer.compile(&vp("root.proto")).unwrap_err();
        assert_eq!(kinds(&failure), vec![DiagnosticKind::BindFailure]);
        assert_eq!(failure.diagnostics.as_slice()[0].line, 2);
        assert!(failure.has_root());
        assert!(failure.find(&vp("good.proto")).is_some());
    }

    #[test]
    fn test_missing_import_attributed_to_importer() {
        let (importer, loader, _) = setup(&[("a.proto", "syntax = \"proto3\";\nimport \"missing.proto\";\nmessage A {}")]);

        let failure = importer.compile(&vp("a.proto")).unwrap_err();
        assert_eq!(kinds(&failure), vec![DiagnosticKind::PathNotFound]);

        let diag = &failure.diagnostics.as_slice()[0];
        assert_eq!((diag.path.as_str(), diag.line, diag.column), ("a.proto", 2, 1));
        assert!(diag.message.starts_with("cannot find import \"missing.proto\""));
        assert_eq!(loader.count("/src/missing.proto"), 0);
        assert!(matches!(
            importer.cache().state(&vp("missing.proto")),
            Some(EntryState::Failed(FailureReason::NotFound))
        ));
    }

    #[test]
    fn test_every_importer_of_a_failed_file_is_told() {
        let (importer, _, _) = setup(&[
            ("root.proto", "import \"x.proto\";\nimport \"y.proto\";\nimport \"z.proto\";"),
            ("x.proto", "import \"missing.proto\";"),
            ("y.proto", "import \"missing.proto\";\nimport \"broken.proto\";"),
            ("z.proto", "import \"broken.proto\";"),
            ("broken.proto", "message {"),
        ]);

        let failure = importer.compile(&vp("root.proto")).unwrap_err();
        let mut found: Vec<_> = failure
            .diagnostics
            .iter()
            .map(|d| (d.path.as_str(), d.kind))
            .collect();
        // The broken file may yield several syntax errors.
        found.dedup();
        assert_eq!(
            found,
            vec![
                ("x.proto", DiagnosticKind::PathNotFound),
                ("y.proto", DiagnosticKind::PathNotFound),
                ("broken.proto", DiagnosticKind::SyntaxError),
                ("z.proto", DiagnosticKind::BindFailure),
            ]
        );
    }

    #[test]
    fn test_missing_root() {
        let (importer, _, _) = setup(&[]);

        let failure = importer.compile(&vp("nope.proto")).unwrap_err();
        assert_eq!(kinds(&failure), vec![DiagnosticKind::PathNotFound]);
        let diag = &failure.diagnostics.as_slice()[0];
        assert_eq!((diag.line, diag.column), (0, 0));

        // Asking again reports again, from the cache.
        let failure = importer.compile(&vp("nope.proto")).unwrap_err();
        assert_eq!(kinds(&failure), vec![DiagnosticKind::PathNotFound]);
    }

    #[test]
    fn test_duplicate_import_warns() {
        let (importer, loader, sink) = setup(&[
            ("a.proto", "import \"b.proto\";\nimport \"b.proto\";\nmessage A { optional B b = 1; }"),
            ("b.proto", "message B {}"),
        ]);

        let a = importer.compile(&vp("a.proto")).unwrap();
        assert_eq!(a.imports.len(), 1);
        assert_eq!(loader.count("/src/b.proto"), 1);

        let warnings = sink.drain();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].severity, Severity::Warning);
        assert_eq!(warnings[0].line, 2);
    }

    #[test]
    fn test_unreadable_import() {
        let mut files = MapLoader::new();
        files.insert("/src/a.proto", "import \"b.proto\";");
        files.insert_bytes("/src/b.proto", vec![0xff, 0xfe, 0x00]);
        let tree = SourceTree::new().with_mapping("", "/src").unwrap();
        let importer = Importer::new(tree).with_loader(files).with_config(Config::default());

        let failure = importer.compile(&vp("a.proto")).unwrap_err();
        assert_eq!(kinds(&failure), vec![DiagnosticKind::IoFailure]);
        assert_eq!(failure.diagnostics.as_slice()[0].path.as_str(), "a.proto");
    }

    #[test]
    fn test_unresolved_reference_fails_file() {
        let (importer, _, _) = setup(&[("a.proto", "message A {\n  optional Nope n = 1;\n}")]);

        let failure = importer.compile(&vp("a.proto")).unwrap_err();
        assert_eq!(kinds(&failure), vec![DiagnosticKind::UnresolvedReference]);
        assert!(matches!(
            importer.cache().state(&vp("a.proto")),
            Some(EntryState::Failed(FailureReason::Bind))
        ));
    }

    #[test]
    fn test_unused_import_warning_from_config() {
        let (importer, _, sink) = setup(&[
            ("a.proto", "import \"b.proto\";\nmessage A {}"),
            ("b.proto", "message B {}"),
        ]);
        let importer = importer.with_config(ConfigBuilder::new().warn_unused_imports(true).build());

        assert!(importer.compile(&vp("a.proto")).is_ok());
        let warnings = sink.drain();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("unused"));
    }

    #[test]
    fn test_compile_all_shares_cache() {
        let mut files = vec![("common.proto".to_owned(), "message Common {}".to_owned())];
        for i in 0..8 {
            files.push((
                format!("root{i}.proto"),
                format!("import \"common.proto\";\nmessage Root{i} {{ optional Common c = 1; }}"),
            ));
        }
        let borrowed: Vec<(&str, &str)> = files.iter().map(|(p, t)| (p.as_str(), t.as_str())).collect();
        let (importer, loader, _) = setup(&borrowed);

        let roots: Vec<_> = (0..8).map(|i| vp(&format!("root{i}.proto"))).collect();
        let results = importer.compile_all(&roots);

        assert_eq!(results.len(), 8);
        assert!(results.iter().all(Result::is_ok));
        assert_eq!(loader.count("/src/common.proto"), 1);
        assert_eq!(importer.compiled().len(), 9);
    }

    #[test]
    fn test_failed_import_keeps_partial_output() {
        let (importer, _, _) = setup(&[
            ("root.proto", "import \"mid.proto\";\nmessage Root { optional Mid m = 1; }"),
            ("mid.proto", "import \"missing.proto\";\nmessage Mid { optional Missing x = 1; optional int32 n = 2; }"),
        ]);

        let failure = importer.compile(&vp("root.proto")).unwrap_err();
        assert_eq!(kinds(&failure), vec![DiagnosticKind::PathNotFound]);
        assert_eq!(failure.diagnostics.as_slice()[0].path.as_str(), "mid.proto");

        let root = failure.descriptor.clone().unwrap();
        assert!(!root.is_complete());
        assert!(root.message("Root").unwrap().field("m").is_some());

        let mid = failure.find(&vp("mid.proto")).unwrap();
        assert!(!mid.is_complete());
        assert_eq!(mid.message("Mid").unwrap().fields.len(), 1);
        assert_eq!(failure.compiled.len(), 2);
        assert!(matches!(importer.cache().state(&vp("root.proto")), Some(EntryState::Compiled(_))));
    }

    #[test]
    fn test_permission_denied_import() {
        struct Denied(MapLoader);

        impl FileLoader for Denied {
            fn exists(&self, path: &Path) -> bool {
                path.ends_with("secret.proto") || self.0.exists(path)
            }

            fn load(&self, path: &Path) -> Result<String, LoadError> {
                if path.ends_with("secret.proto") {
                    return Err(LoadError::PermissionDenied(path.to_path_buf()));
                }
                self.0.load(path)
            }
        }

        let files = MapLoader::new().with_file("/src/a.proto", "syntax = \"proto3\";\nimport \"secret.proto\";");
        let tree = SourceTree::new().with_mapping("", "/src").unwrap();
        let importer = Importer::new(tree).with_loader(Denied(files)).with_config(Config::default());

        let failure = importer.compile(&vp("a.proto")).unwrap_err();
        assert_eq!(kinds(&failure), vec![DiagnosticKind::IoFailure]);
        let diag = &failure.diagnostics.as_slice()[0];
        assert_eq!((diag.path.as_str(), diag.line, diag.column), ("a.proto", 2, 1));
        assert!(diag.message.contains("permission denied"));
        assert!(matches!(
            importer.cache().state(&vp("secret.proto")),
            Some(EntryState::Failed(FailureReason::Unreadable))
        ));
    }

    #[test]
    fn test_silent_parser_rejection_is_still_reported() {
        struct Rejecting;

        impl Parser for Rejecting {
            fn parse(&self, _: &VirtualPath, _: &str) -> Result<crate::syntax::SyntaxTree, Vec<crate::syntax::SyntaxError>> {
                Err(Vec::new())
            }
        }

        let (importer, _, _) = setup(&[("a.proto", "message A {}")]);
        let importer = importer.with_parser(Rejecting);

        let failure = importer.compile(&vp("a.proto")).unwrap_err();
        assert_eq!(kinds(&failure), vec![DiagnosticKind::SyntaxError]);
        assert!(matches!(
            importer.cache().state(&vp("a.proto")),
            Some(EntryState::Failed(FailureReason::Syntax))
        ));
    }

    #[test]
    fn test_discover_lists_schema_files() {
        let (importer, _, _) = setup(&[
            ("a.proto", ""),
            ("nested/b.proto", ""),
            ("README.md", ""),
        ]);
        assert_eq!(importer.discover().unwrap(), vec![vp("a.proto"), vp("nested/b.proto")]);
    }
}
