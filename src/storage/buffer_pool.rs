use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use lru::LruCache;

use super::dbfile::{Permission, TransactionId};
use super::error::{StorageError, StorageResult};
use super::heap_file::HeapFile;
use super::heap_page::HeapPage;
use super::PageId;

/// Default interval a contended caller sleeps before re-attempting a
/// lock acquisition
pub const DEFAULT_BACKOFF: Duration = Duration::from_micros(10);

/// Identifies a page across all open files. Two handles over the same
/// backing path produce equal keys for the same page number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    path: PathBuf,
    page_no: PageId,
}

impl PageKey {
    pub fn new(path: &Path, page_no: PageId) -> Self {
        Self {
            path: path.to_path_buf(),
            page_no,
        }
    }
}

/// A cached page together with the file that owns it, so commit can
/// force the page back through that file
struct PageSlot {
    page: Arc<Mutex<HeapPage>>,
    file: Arc<HeapFile>,
}

/// One edge of the wait-for graph: the holder being waited on, and the
/// page whose lock is contended. The page annotation exists so the edge
/// can be dropped once that particular lock is granted.
#[derive(Debug, Clone, PartialEq, Eq)]
struct WaitEdge {
    on: TransactionId,
    page: PageKey,
}

struct PoolState {
    /// Single structure serving as both the page store and the recency
    /// tracker
    cache: LruCache<PageKey, PageSlot>,
    shared: HashMap<PageKey, Vec<TransactionId>>,
    exclusive: HashMap<PageKey, TransactionId>,
    wait_graph: HashMap<TransactionId, Vec<WaitEdge>>,
}

enum Acquire {
    /// Lock is held; `fresh` is false when the transaction already held
    /// it before this call
    Granted { fresh: bool },
    Blocked,
}

/// Bounded page cache and page-level lock manager.
///
/// Transactions run under NO-STEAL/FORCE: a page dirtied by a
/// transaction stays in the pool until that transaction commits (when it
/// is flushed) or aborts (when it is dropped, never having reached
/// disk). Eviction only ever removes clean pages; when every resident
/// page is dirty, page requests fail with [`StorageError::BufferPoolFull`]
/// until some transaction finishes.
///
/// Conflicting lock requests wait by backing off and retrying. Each
/// blocked request adds edges to a wait-for graph; a request that would
/// close a cycle aborts its own transaction and returns
/// [`StorageError::Deadlock`].
pub struct BufferPool {
    capacity: usize,
    backoff: Duration,
    state: Mutex<PoolState>,
}

impl BufferPool {
    /// Create a pool holding at most `capacity` pages
    pub fn new(capacity: usize) -> Self {
        Self::with_backoff(capacity, DEFAULT_BACKOFF)
    }

    /// Create a pool with a specific lock-wait backoff interval
    pub fn with_backoff(capacity: usize, backoff: Duration) -> Self {
        Self {
            capacity,
            backoff,
            state: Mutex::new(PoolState {
                cache: LruCache::unbounded(),
                shared: HashMap::new(),
                exclusive: HashMap::new(),
                wait_graph: HashMap::new(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of pages currently cached
    pub fn num_cached(&self) -> usize {
        self.state.lock().unwrap().cache.len()
    }

    /// Advisory; the pool tracks a transaction from its first page
    /// request
    pub fn begin_transaction(&self, _tid: TransactionId) -> StorageResult<()> {
        Ok(())
    }

    /// Retrieve a page of `file` on behalf of `tid`, locking it with the
    /// requested permission. Blocks (by backing off) while the lock is
    /// contended. If granting would deadlock, `tid` is aborted and
    /// [`StorageError::Deadlock`] returned.
    pub fn get_page(
        &self,
        file: &Arc<HeapFile>,
        page_no: PageId,
        tid: TransactionId,
        perm: Permission,
    ) -> StorageResult<Arc<Mutex<HeapPage>>> {
        let key = PageKey::new(file.path(), page_no);

        let fresh = loop {
            let mut state = self.state.lock().unwrap();
            match Self::try_acquire(&mut state, &key, tid, perm) {
                Acquire::Granted { fresh } => {
                    Self::clear_wait_edges(&mut state, tid, &key);
                    break fresh;
                }
                Acquire::Blocked => {
                    if Self::has_cycle(&state, tid) {
                        // Abort under the same mutex hold that found the
                        // cycle, so a concurrent waiter cannot observe
                        // the cycle too and pick itself as a second
                        // victim.
                        warn!("{} deadlocked waiting for page {:?}; aborting", tid, key);
                        Self::abort_locked(&mut state, tid);
                        return Err(StorageError::Deadlock(tid.as_u64()));
                    }
                    drop(state);
                    thread::sleep(self.backoff);
                }
            }
        };

        match self.fetch_page(file, page_no, &key) {
            Ok(page) => Ok(page),
            Err(err) => {
                // Only surrender a lock this call itself acquired; one
                // held from earlier in the transaction stays held.
                if fresh {
                    self.release_lock(&key, tid);
                }
                Err(err)
            }
        }
    }

    /// Commit `tid`: force every page it holds exclusively to disk, drop
    /// those pages from the cache, and release all of its locks
    pub fn commit_transaction(&self, tid: TransactionId) -> StorageResult<()> {
        let mut state = self.state.lock().unwrap();
        Self::purge_wait_graph(&mut state, tid);

        let owned: Vec<PageKey> = state
            .exclusive
            .iter()
            .filter(|(_, holder)| **holder == tid)
            .map(|(key, _)| key.clone())
            .collect();
        for key in owned {
            if let Some(slot) = state.cache.pop(&key) {
                let mut page = slot.page.lock().unwrap();
                slot.file.flush_page(&page)?;
                page.set_dirty(false);
            }
            state.exclusive.remove(&key);
        }

        Self::release_shared(&mut state, tid);
        debug!("{} committed", tid);
        Ok(())
    }

    /// Abort `tid`: drop every page it holds exclusively without
    /// flushing (NO-STEAL guarantees disk never saw the dirty data) and
    /// release all of its locks
    pub fn abort_transaction(&self, tid: TransactionId) -> StorageResult<()> {
        let mut state = self.state.lock().unwrap();
        Self::abort_locked(&mut state, tid);
        Ok(())
    }

    fn abort_locked(state: &mut PoolState, tid: TransactionId) {
        Self::purge_wait_graph(state, tid);

        let owned: Vec<PageKey> = state
            .exclusive
            .iter()
            .filter(|(_, holder)| **holder == tid)
            .map(|(key, _)| key.clone())
            .collect();
        for key in owned {
            state.cache.pop(&key);
            state.exclusive.remove(&key);
        }

        Self::release_shared(state, tid);
        debug!("{} aborted", tid);
    }

    /// Test hook: flush every cached page through its owning file and
    /// clear the cache. Not transaction safe.
    pub fn flush_all_pages(&self) -> StorageResult<()> {
        let mut state = self.state.lock().unwrap();
        while let Some((_, slot)) = state.cache.pop_lru() {
            let mut page = slot.page.lock().unwrap();
            slot.file.flush_page(&page)?;
            page.set_dirty(false);
        }
        Ok(())
    }

    /// Single step of the lock state machine, run under the pool mutex.
    /// Blocked outcomes leave wait edges behind for cycle detection.
    fn try_acquire(
        state: &mut PoolState,
        key: &PageKey,
        tid: TransactionId,
        perm: Permission,
    ) -> Acquire {
        if let Some(&holder) = state.exclusive.get(key) {
            if holder == tid {
                return Acquire::Granted { fresh: false };
            }
            Self::add_wait_edge(state, tid, holder, key);
            return Acquire::Blocked;
        }

        match perm {
            Permission::ReadWrite => {
                if let Some(holders) = state.shared.get(key) {
                    if holders.len() == 1 && holders[0] == tid {
                        // Sole reader: upgrade in place
                        state.shared.remove(key);
                        state.exclusive.insert(key.clone(), tid);
                        return Acquire::Granted { fresh: true };
                    }
                    let others: Vec<TransactionId> =
                        holders.iter().copied().filter(|h| *h != tid).collect();
                    for holder in others {
                        Self::add_wait_edge(state, tid, holder, key);
                    }
                    return Acquire::Blocked;
                }
                state.exclusive.insert(key.clone(), tid);
                Acquire::Granted { fresh: true }
            }
            Permission::ReadOnly => {
                let holders = state.shared.entry(key.clone()).or_default();
                if holders.contains(&tid) {
                    Acquire::Granted { fresh: false }
                } else {
                    holders.push(tid);
                    Acquire::Granted { fresh: true }
                }
            }
        }
    }

    fn add_wait_edge(
        state: &mut PoolState,
        waiter: TransactionId,
        holder: TransactionId,
        key: &PageKey,
    ) {
        let edge = WaitEdge {
            on: holder,
            page: key.clone(),
        };
        let edges = state.wait_graph.entry(waiter).or_default();
        if !edges.contains(&edge) {
            edges.push(edge);
        }
    }

    /// Drop the waiter's own edges for a page it just acquired
    fn clear_wait_edges(state: &mut PoolState, tid: TransactionId, key: &PageKey) {
        if let Some(edges) = state.wait_graph.get_mut(&tid) {
            edges.retain(|edge| edge.page != *key);
            if edges.is_empty() {
                state.wait_graph.remove(&tid);
            }
        }
    }

    /// Remove the finished transaction's node and every edge pointing at
    /// it
    fn purge_wait_graph(state: &mut PoolState, tid: TransactionId) {
        state.wait_graph.remove(&tid);
        state.wait_graph.retain(|_, edges| {
            edges.retain(|edge| edge.on != tid);
            !edges.is_empty()
        });
    }

    /// DFS from `start` over the wait-for graph. A node revisited while
    /// still on the current path closes a cycle; nodes finished on an
    /// earlier branch are skipped, not misreported.
    fn has_cycle(state: &PoolState, start: TransactionId) -> bool {
        fn visit(
            graph: &HashMap<TransactionId, Vec<WaitEdge>>,
            node: TransactionId,
            visited: &mut HashSet<TransactionId>,
            path: &mut HashSet<TransactionId>,
        ) -> bool {
            if path.contains(&node) {
                return true;
            }
            if !visited.insert(node) {
                return false;
            }
            path.insert(node);
            if let Some(edges) = graph.get(&node) {
                for edge in edges {
                    if visit(graph, edge.on, visited, path) {
                        return true;
                    }
                }
            }
            path.remove(&node);
            false
        }

        let mut visited = HashSet::new();
        let mut path = HashSet::new();
        visit(&state.wait_graph, start, &mut visited, &mut path)
    }

    fn release_shared(state: &mut PoolState, tid: TransactionId) {
        state.shared.retain(|_, holders| {
            holders.retain(|holder| *holder != tid);
            !holders.is_empty()
        });
    }

    /// Release whatever lock `tid` holds on `key`
    fn release_lock(&self, key: &PageKey, tid: TransactionId) {
        let mut state = self.state.lock().unwrap();
        if state.exclusive.get(key) == Some(&tid) {
            state.exclusive.remove(key);
        }
        if let Some(holders) = state.shared.get_mut(key) {
            holders.retain(|holder| *holder != tid);
            if holders.is_empty() {
                state.shared.remove(key);
            }
        }
    }

    /// Return the cached page for `key`, loading it from disk if absent.
    /// The pool mutex is released across the disk read and the cache
    /// re-checked afterwards; a racing loader's copy wins.
    fn fetch_page(
        &self,
        file: &Arc<HeapFile>,
        page_no: PageId,
        key: &PageKey,
    ) -> StorageResult<Arc<Mutex<HeapPage>>> {
        {
            let mut state = self.state.lock().unwrap();
            if let Some(slot) = state.cache.get(key) {
                return Ok(Arc::clone(&slot.page));
            }
        }

        let page = file.read_page(page_no)?;

        let mut state = self.state.lock().unwrap();
        if let Some(slot) = state.cache.get(key) {
            return Ok(Arc::clone(&slot.page));
        }
        while state.cache.len() >= self.capacity {
            Self::evict_clean_lru(&mut state)?;
        }
        let handle = Arc::new(Mutex::new(page));
        state.cache.put(
            key.clone(),
            PageSlot {
                page: Arc::clone(&handle),
                file: Arc::clone(file),
            },
        );
        Ok(handle)
    }

    /// Evict the least recently used clean page. Dirty pages are pinned
    /// by NO-STEAL, so a cache full of them is a backpressure signal.
    fn evict_clean_lru(state: &mut PoolState) -> StorageResult<()> {
        // cache.iter() walks most-recently-used first, so the last clean
        // entry is the least recently used one
        let victim = state
            .cache
            .iter()
            .filter(|(_, slot)| !slot.page.lock().unwrap().is_dirty())
            .map(|(key, _)| key.clone())
            .last();

        match victim {
            Some(key) => {
                debug!("evicting clean page {:?}", key);
                state.cache.pop(&key);
                Ok(())
            }
            None => Err(StorageError::BufferPoolFull),
        }
    }
}
