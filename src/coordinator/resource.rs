// ABOUTME: Exclusively-lockable resources and the fixed ring that wires them together.
// ABOUTME: A resource only blocks; it never fails and carries no owner bookkeeping.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// A unit of exclusive access at a fixed position in the ring.
#[derive(Debug)]
pub struct Resource {
    index: usize,
    lock: Arc<Mutex<()>>,
    held: AtomicBool,
    acquisitions: AtomicU64,
}

impl Resource {
    /// Create a free resource at the given ring position.
    pub fn new(index: usize) -> Self {
        Self {
            index,
            lock: Arc::new(Mutex::new(())),
            held: AtomicBool::new(false),
            acquisitions: AtomicU64::new(0),
        }
    }

    /// Position of this resource in the ring.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Wait until the resource is free, then hold it until the guard is dropped.
    pub async fn acquire(self: &Arc<Self>) -> ResourceGuard {
        let guard = self.lock.clone().lock_owned().await;
        let was_held = self.held.swap(true, Ordering::SeqCst);
        debug_assert!(!was_held, "resource {} held twice", self.index);
        self.acquisitions.fetch_add(1, Ordering::Relaxed);

        ResourceGuard {
            resource: Arc::clone(self),
            _guard: guard,
        }
    }

    /// Whether some agent currently holds this resource.
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    /// Total number of times this resource has been acquired.
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::Relaxed)
    }
}

/// Proof of holding a [`Resource`]. Dropping it frees the resource.
#[derive(Debug)]
pub struct ResourceGuard {
    resource: Arc<Resource>,
    _guard: OwnedMutexGuard<()>,
}

impl ResourceGuard {
    /// Position of the held resource.
    pub fn index(&self) -> usize {
        self.resource.index
    }

    /// Free the resource, waking at most one waiter.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        // Cleared before the mutex guard field drops, so the next acquirer
        // never observes a stale held flag.
        self.resource.held.store(false, Ordering::SeqCst);
    }
}

/// N resources wired into a cycle. Adjacency is fixed for the ring's lifetime.
#[derive(Debug, Clone)]
pub struct Ring {
    resources: Vec<Arc<Resource>>,
}

impl Ring {
    /// Build a ring of `size` free resources, indexed 0..size.
    pub fn new(size: usize) -> Self {
        Self {
            resources: (0..size).map(|i| Arc::new(Resource::new(i))).collect(),
        }
    }

    /// Number of resources in the ring.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the ring has no resources.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Resource at a ring position.
    pub fn get(&self, index: usize) -> Option<&Arc<Resource>> {
        self.resources.get(index)
    }

    /// The (left, right) pair for the agent at `position`:
    /// ring[position] and ring[(position + 1) mod N].
    ///
    /// # Panics
    ///
    /// Panics if `position` is outside the ring.
    pub fn neighbors(&self, position: usize) -> (Arc<Resource>, Arc<Resource>) {
        let n = self.resources.len();
        assert!(position < n, "position {position} outside ring of {n}");
        (
            Arc::clone(&self.resources[position]),
            Arc::clone(&self.resources[(position + 1) % n]),
        )
    }

    /// Iterate over the resources in ring order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Resource>> {
        self.resources.iter()
    }
}
