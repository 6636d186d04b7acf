//! Page → thread index.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};

use tokio::sync::RwLock;

use crate::{AnnotationThread, TRACING_TARGET_REGISTRY};

/// Registry state: threads grouped by page, plus the page of every thread.
#[derive(Default)]
pub(crate) struct RegistryInner {
    pages: BTreeMap<u32, BTreeMap<String, AnnotationThread>>,
    index: HashMap<String, u32>,
}

impl RegistryInner {
    /// Removes `thread_id` from its page, dropping the page once empty.
    fn detach(&mut self, thread_id: &str) -> Option<AnnotationThread> {
        let page = self.index.remove(thread_id)?;
        let (thread, emptied) = match self.pages.get_mut(&page) {
            Some(threads) => (threads.remove(thread_id), threads.is_empty()),
            None => (None, false),
        };

        if emptied {
            self.pages.remove(&page);
        }

        thread
    }
}

/// Back-reference from a thread to the registry it is registered in.
pub(crate) type RegistryRef = Weak<RwLock<RegistryInner>>;

/// Index of live threads by page and by thread id.
///
/// A thread id appears under at most one page. Registering a thread again,
/// possibly under another page, replaces the previous entry. Clones share
/// the same index; registered threads hold a weak reference back to it so
/// that destroying a thread unregisters it.
#[derive(Clone, Default)]
pub struct ThreadRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl std::fmt::Debug for ThreadRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadRegistry").finish_non_exhaustive()
    }
}

impl ThreadRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_ref(registry: &RegistryRef) -> Option<Self> {
        registry.upgrade().map(|inner| Self { inner })
    }

    pub(crate) fn downgrade(&self) -> RegistryRef {
        Arc::downgrade(&self.inner)
    }

    /// Registers a thread under its current page.
    ///
    /// Returns `false` for destroyed threads, which are never registered.
    pub async fn register(&self, thread: &AnnotationThread) -> bool {
        if thread.is_destroyed().await {
            return false;
        }

        let page = thread.page().await;
        let thread_id = thread.thread_id().to_owned();

        {
            let mut inner = self.inner.write().await;
            inner.detach(&thread_id);
            inner.index.insert(thread_id.clone(), page);
            inner
                .pages
                .entry(page)
                .or_default()
                .insert(thread_id.clone(), thread.clone());
        }

        thread.attach_registry(self.downgrade()).await;

        tracing::debug!(
            target: TRACING_TARGET_REGISTRY,
            thread_id = %thread_id,
            page,
            "Thread registered"
        );

        true
    }

    /// Removes a thread. Unknown ids are ignored.
    pub async fn unregister(&self, thread_id: &str) -> Option<AnnotationThread> {
        let removed = self.inner.write().await.detach(thread_id);

        if let Some(thread) = removed.as_ref() {
            thread.detach_registry(&self.downgrade()).await;

            tracing::debug!(
                target: TRACING_TARGET_REGISTRY,
                thread_id,
                "Thread unregistered"
            );
        }

        removed
    }

    /// Removes `thread` only if it is the one registered under its id.
    pub(crate) async fn remove_thread(&self, thread: &AnnotationThread) -> bool {
        let mut inner = self.inner.write().await;
        let registered = inner
            .index
            .get(thread.thread_id())
            .and_then(|page| inner.pages.get(page))
            .and_then(|threads| threads.get(thread.thread_id()))
            .is_some_and(|current| current.ptr_eq(thread));

        if registered {
            inner.detach(thread.thread_id());
            tracing::debug!(
                target: TRACING_TARGET_REGISTRY,
                thread_id = thread.thread_id(),
                "Destroyed thread removed"
            );
        }

        registered
    }

    /// Returns the thread registered under `thread_id`.
    pub async fn get_by_id(&self, thread_id: &str) -> Option<AnnotationThread> {
        let inner = self.inner.read().await;
        let page = inner.index.get(thread_id)?;
        inner.pages.get(page)?.get(thread_id).cloned()
    }

    /// Returns the threads of a page, ordered by thread id.
    pub async fn get_by_page(&self, page: u32) -> Vec<AnnotationThread> {
        let inner = self.inner.read().await;
        inner
            .pages
            .get(&page)
            .map(|threads| threads.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns whether a thread is registered under `thread_id`.
    pub async fn contains(&self, thread_id: &str) -> bool {
        self.inner.read().await.index.contains_key(thread_id)
    }

    /// Returns the pages holding at least one thread, ascending.
    pub async fn pages(&self) -> Vec<u32> {
        self.inner.read().await.pages.keys().copied().collect()
    }

    /// Returns the number of registered threads.
    pub async fn len(&self) -> usize {
        self.inner.read().await.index.len()
    }

    /// Returns whether no thread is registered.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.index.is_empty()
    }

    /// Returns every registered thread, by page then thread id.
    pub async fn threads(&self) -> Vec<AnnotationThread> {
        let inner = self.inner.read().await;
        inner
            .pages
            .values()
            .flat_map(|threads| threads.values().cloned())
            .collect()
    }

    /// Removes every thread and returns them.
    pub async fn clear(&self) -> Vec<AnnotationThread> {
        let threads: Vec<_> = {
            let mut inner = self.inner.write().await;
            inner.index.clear();
            std::mem::take(&mut inner.pages)
                .into_values()
                .flat_map(BTreeMap::into_values)
                .collect()
        };

        let registry = self.downgrade();
        for thread in &threads {
            thread.detach_registry(&registry).await;
        }

        tracing::debug!(
            target: TRACING_TARGET_REGISTRY,
            count = threads.len(),
            "Registry cleared"
        );

        threads
    }
}
