//! Memoized compile results, keyed by virtual path.
//!
//! # State machine
//!
//! ```text
//!            get_or_begin (first caller)
//!   (absent) ──────────────────────────► Pending(owner)
//!                                          │      │
//!                         handle.publish() │      │ handle.fail() / drop
//!                                          ▼      ▼
//!                                   Compiled    Failed
//! ```
//!
//! Terminal states never change. The claim in [`DescriptorCache::get_or_begin`]
//! is a test-and-set under one lock, so a file is compiled at most once no
//! matter how many workers ask for it.
//!
//! # Cycles
//!
//! A worker asking for a path it already holds Pending has walked an import
//! cycle. A worker asking for a path Pending under *another* worker waits for
//! it, unless that worker is (transitively) waiting for the caller, in which
//! case waiting would deadlock and the request is a cycle too.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;

use crate::descriptor::Descriptor;
use crate::file::VirtualPath;

// =============================================================================
// Types
// =============================================================================

/// Identity of one compile worker (one root compile).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(u64);

impl WorkerId {
    /// Allocate a fresh worker id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Why an entry ended up Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// The virtual path did not resolve to a file.
    NotFound,
    /// The file resolved but could not be read.
    Unreadable,
    /// The parser rejected the file.
    Syntax,
    /// The linker rejected the file.
    Bind,
    /// The compile was abandoned before finishing.
    Abandoned,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotFound => "not found",
            Self::Unreadable => "unreadable",
            Self::Syntax => "syntax errors",
            Self::Bind => "link errors",
            Self::Abandoned => "abandoned",
        })
    }
}

/// Current state of one cache entry.
#[derive(Debug, Clone)]
pub enum EntryState {
    /// Being compiled by `owner`.
    Pending(WorkerId),
    /// Published.
    Compiled(Arc<Descriptor>),
    /// Failed for good.
    Failed(FailureReason),
}

/// Outcome of [`DescriptorCache::get_or_begin`].
#[derive(Debug)]
pub enum Lookup<'c> {
    /// Already published.
    Compiled(Arc<Descriptor>),
    /// Already failed.
    Failed(FailureReason),
    /// The caller now owns the Pending entry and must finish it.
    Begin(CompileHandle<'c>),
    /// The path is Pending along the caller's own import chain.
    CycleDetected,
}

// =============================================================================
// DescriptorCache
// =============================================================================

#[derive(Debug, Default)]
struct State {
    entries: FxHashMap<VirtualPath, EntryState>,
    /// Path each blocked worker is waiting on.
    waiting: FxHashMap<WorkerId, VirtualPath>,
}

impl State {
    /// Whether `owner` is blocked, directly or through other workers, on
    /// something `worker` holds.
    fn waits_on(&self, owner: WorkerId, worker: WorkerId) -> bool {
        let mut current = owner;
        // Each hop moves to a distinct blocked worker.
        for _ in 0..=self.waiting.len() {
            let Some(path) = self.waiting.get(&current) else {
                return false;
            };
            let Some(EntryState::Pending(next)) = self.entries.get(path) else {
                return false;
            };
            if *next == worker {
                return true;
            }
            current = *next;
        }
        false
    }
}

/// Thread-safe Pending/Compiled/Failed table.
#[derive(Debug, Default)]
pub struct DescriptorCache {
    state: Mutex<State>,
    changed: Condvar,
}

impl DescriptorCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `path`, claiming it for `worker` if nobody has yet.
    ///
    /// Blocks while another worker holds the entry Pending, unless waiting
    /// would close a cycle.
    pub fn get_or_begin(&self, path: &VirtualPath, worker: WorkerId) -> Lookup<'_> {
        let mut state = self.state.lock();
        loop {
            match state.entries.get(path) {
                None => {
                    state.entries.insert(path.clone(), EntryState::Pending(worker));
                    tracing::trace!(%path, ?worker, "claimed");
                    return Lookup::Begin(CompileHandle {
                        cache: self,
                        path: path.clone(),
                        finished: false,
                    });
                }
                Some(EntryState::Compiled(desc)) => return Lookup::Compiled(Arc::clone(desc)),
                Some(EntryState::Failed(reason)) => return Lookup::Failed(*reason),
                Some(EntryState::Pending(owner)) => {
                    let owner = *owner;
                    if owner == worker || state.waits_on(owner, worker) {
                        tracing::debug!(%path, ?worker, ?owner, "import cycle");
                        return Lookup::CycleDetected;
                    }
                    state.waiting.insert(worker, path.clone());
                    self.changed.wait(&mut state);
                    state.waiting.remove(&worker);
                }
            }
        }
    }

    /// Current state of `path`, without claiming it.
    pub fn state(&self, path: &VirtualPath) -> Option<EntryState> {
        self.state.lock().entries.get(path).cloned()
    }

    /// Every published descriptor, sorted by path.
    pub fn compiled(&self) -> Vec<Arc<Descriptor>> {
        let state = self.state.lock();
        let mut compiled: Vec<_> = state
            .entries
            .values()
            .filter_map(|entry| match entry {
                EntryState::Compiled(desc) => Some(Arc::clone(desc)),
                _ => None,
            })
            .collect();
        compiled.sort_by(|a, b| a.path.cmp(&b.path));
        compiled
    }

    /// Every failed path with its reason, sorted by path.
    pub fn failed(&self) -> Vec<(VirtualPath, FailureReason)> {
        let state = self.state.lock();
        let mut failed: Vec<_> = state
            .entries
            .iter()
            .filter_map(|(path, entry)| match entry {
                EntryState::Failed(reason) => Some((path.clone(), *reason)),
                _ => None,
            })
            .collect();
        failed.sort_by(|a, b| a.0.cmp(&b.0));
        failed
    }

    /// Number of entries in any state.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether the cache has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn finish(&self, path: &VirtualPath, entry: EntryState) {
        self.state.lock().entries.insert(path.clone(), entry);
        self.changed.notify_all();
    }

    #[cfg(test)]
    fn waiter_count(&self) -> usize {
        self.state.lock().waiting.len()
    }
}

// =============================================================================
// CompileHandle
// =============================================================================

/// Exclusive right to finish one Pending entry.
///
/// [`publish`](Self::publish) and [`fail`](Self::fail) consume the handle,
/// so an entry cannot be finished twice. Dropping an unfinished handle fails
/// the entry with [`FailureReason::Abandoned`] and wakes any waiters.
#[derive(Debug)]
pub struct CompileHandle<'c> {
    cache: &'c DescriptorCache,
    path: VirtualPath,
    finished: bool,
}

impl CompileHandle<'_> {
    /// The claimed path.
    pub fn path(&self) -> &VirtualPath {
        &self.path
    }

    /// Pending → Compiled.
    pub fn publish(mut self, descriptor: Descriptor) -> Arc<Descriptor> {
        let descriptor = Arc::new(descriptor);
        self.finished = true;
        self.cache
            .finish(&self.path, EntryState::Compiled(Arc::clone(&descriptor)));
        tracing::trace!(path = %self.path, "published");
        descriptor
    }

    /// Pending → Failed.
    pub fn fail(mut self, reason: FailureReason) {
        self.finished = true;
        self.cache.finish(&self.path, EntryState::Failed(reason));
        tracing::trace!(path = %self.path, %reason, "failed");
    }
}

impl Drop for CompileHandle<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.cache
                .finish(&self.path, EntryState::Failed(FailureReason::Abandoned));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::descriptor::{Linker, ProtoLinker};
    use crate::syntax::SyntaxTree;

    fn path(p: &str) -> VirtualPath {
        VirtualPath::new(p).unwrap()
    }

    fn descriptor(p: &str) -> Descriptor {
        ProtoLinker::new()
            .link(&path(p), &SyntaxTree::default(), Vec::new())
            .unwrap()
            .descriptor
    }

    fn wait_for_waiters(cache: &DescriptorCache, n: usize) {
        while cache.waiter_count() < n {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_publish_is_memoized() {
        let cache = DescriptorCache::new();
        let worker = WorkerId::next();

        let Lookup::Begin(handle) = cache.get_or_begin(&path("a.proto"), worker) else {
            panic!("expected a fresh claim");
        };
        let published = handle.publish(descriptor("a.proto"));

        match cache.get_or_begin(&path("a.proto"), WorkerId::next()) {
            Lookup::Compiled(desc) => assert!(Arc::ptr_eq(&desc, &published)),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(cache.compiled().len(), 1);
    }

    #[test]
    fn test_pending_under_same_worker_is_a_cycle() {
        let cache = DescriptorCache::new();
        let worker = WorkerId::next();

        let Lookup::Begin(handle) = cache.get_or_begin(&path("a.proto"), worker) else {
            panic!("expected a fresh claim");
        };
        assert!(matches!(cache.get_or_begin(&path("a.proto"), worker), Lookup::CycleDetected));
        handle.fail(FailureReason::Syntax);

        assert!(matches!(
            cache.get_or_begin(&path("a.proto"), worker),
            Lookup::Failed(FailureReason::Syntax)
        ));
        assert_eq!(cache.failed(), vec![(path("a.proto"), FailureReason::Syntax)]);
    }

    #[test]
    fn test_dropped_handle_fails_entry() {
        let cache = DescriptorCache::new();
        drop(cache.get_or_begin(&path("a.proto"), WorkerId::next()));
        assert!(matches!(
            cache.state(&path("a.proto")),
            Some(EntryState::Failed(FailureReason::Abandoned))
        ));
    }

    #[test]
    fn test_other_worker_waits_for_publish() {
        let cache = DescriptorCache::new();
        let owner = WorkerId::next();
        let Lookup::Begin(handle) = cache.get_or_begin(&path("shared.proto"), owner) else {
            panic!("expected a fresh claim");
        };

        thread::scope(|scope| {
            let waiter = scope.spawn(|| match cache.get_or_begin(&path("shared.proto"), WorkerId::next()) {
                Lookup::Compiled(desc) => desc.path.clone(),
                other => panic!("unexpected {other:?}"),
            });

            wait_for_waiters(&cache, 1);
            handle.publish(descriptor("shared.proto"));
            assert_eq!(waiter.join().unwrap(), path("shared.proto"));
        });
    }

    #[test]
    fn test_cross_worker_cycle() {
        let cache = DescriptorCache::new();
        let (first, second) = (WorkerId::next(), WorkerId::next());

        let Lookup::Begin(a) = cache.get_or_begin(&path("a.proto"), first) else {
            panic!("expected a fresh claim");
        };
        let Lookup::Begin(b) = cache.get_or_begin(&path("b.proto"), second) else {
            panic!("expected a fresh claim");
        };

        thread::scope(|scope| {
            // first holds a.proto and waits on b.proto.
            let blocked = scope.spawn(|| matches!(cache.get_or_begin(&path("b.proto"), first), Lookup::Compiled(_)));
            wait_for_waiters(&cache, 1);

            // second holds b.proto; waiting on a.proto would deadlock.
            assert!(matches!(cache.get_or_begin(&path("a.proto"), second), Lookup::CycleDetected));

            b.publish(descriptor("b.proto"));
            assert!(blocked.join().unwrap());
        });
        a.publish(descriptor("a.proto"));
        assert_eq!(cache.compiled().len(), 2);
    }
}
