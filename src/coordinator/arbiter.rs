// ABOUTME: Admission arbiter bounding how many agents may work at once.
// ABOUTME: Backed by a counting gate (semaphore) or a host task fed over a channel.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc, oneshot};
use tracing::{debug, warn};

use crate::agent::AgentId;
use crate::config::ArbiterKind;

/// Observable admission counters.
///
/// `admitted` is raised only after a slot is granted and lowered before the
/// slot is handed back, so `0 <= admitted <= capacity` at every read.
#[derive(Debug, Default)]
pub struct ArbiterStats {
    admitted: AtomicUsize,
    peak: AtomicUsize,
    grants: AtomicU64,
}

impl ArbiterStats {
    /// Agents currently holding an admission slot.
    pub fn admitted(&self) -> usize {
        self.admitted.load(Ordering::SeqCst)
    }

    /// Highest admitted count observed so far.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Total admissions granted.
    pub fn grants(&self) -> u64 {
        self.grants.load(Ordering::SeqCst)
    }

    fn on_grant(&self, capacity: usize) {
        let now = self.admitted.fetch_add(1, Ordering::SeqCst) + 1;
        debug_assert!(now <= capacity, "admitted {now} exceeds capacity {capacity}");
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.grants.fetch_add(1, Ordering::SeqCst);
    }

    fn on_release(&self) {
        let before = self.admitted.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(before > 0, "admission released with none outstanding");
    }
}

/// Messages consumed by the host task.
enum HostMessage {
    Request {
        agent: AgentId,
        reply: oneshot::Sender<()>,
    },
    Release {
        agent: AgentId,
    },
}

enum Backend {
    Gate(Arc<Semaphore>),
    Host(mpsc::UnboundedSender<HostMessage>),
}

struct ArbiterInner {
    capacity: usize,
    stats: Arc<ArbiterStats>,
    backend: Backend,
}

/// Process-local admission gate shared by every agent in a run.
///
/// Cloning is cheap and yields a handle to the same gate.
#[derive(Clone)]
pub struct Arbiter {
    inner: Arc<ArbiterInner>,
}

impl Arbiter {
    /// Create an arbiter of the given kind.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. [`ArbiterKind::Host`] spawns a task and
    /// must be called from within a tokio runtime.
    pub fn new(kind: ArbiterKind, capacity: usize) -> Self {
        match kind {
            ArbiterKind::Gate => Self::gate(capacity),
            ArbiterKind::Host => Self::host(capacity),
        }
    }

    /// Counting gate with `capacity` slots.
    pub fn gate(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be positive");

        Self {
            inner: Arc::new(ArbiterInner {
                capacity,
                stats: Arc::new(ArbiterStats::default()),
                backend: Backend::Gate(Arc::new(Semaphore::new(capacity))),
            }),
        }
    }

    /// Host task with `capacity` slots and a FIFO wait queue.
    pub fn host(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be positive");

        let stats = Arc::new(ArbiterStats::default());
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_host(capacity, Arc::clone(&stats), rx));

        Self {
            inner: Arc::new(ArbiterInner {
                capacity,
                stats,
                backend: Backend::Host(tx),
            }),
        }
    }

    /// Maximum number of agents admitted at once.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Which backend this arbiter uses.
    pub fn kind(&self) -> ArbiterKind {
        match self.inner.backend {
            Backend::Gate(_) => ArbiterKind::Gate,
            Backend::Host(_) => ArbiterKind::Host,
        }
    }

    /// Live admission counters.
    pub fn stats(&self) -> &ArbiterStats {
        &self.inner.stats
    }

    /// Block until fewer than `capacity` agents are admitted, then take a slot.
    ///
    /// The slot is returned when the [`Admission`] is released or dropped.
    pub async fn request_admission(&self, agent: AgentId) -> Admission {
        let slot = match &self.inner.backend {
            Backend::Gate(semaphore) => {
                let permit = Arc::clone(semaphore)
                    .acquire_owned()
                    .await
                    .expect("admission gate is never closed");
                self.inner.stats.on_grant(self.inner.capacity);
                Slot::Gate(permit)
            }
            Backend::Host(tx) => {
                let (reply, granted) = oneshot::channel();
                tx.send(HostMessage::Request { agent, reply })
                    .expect("host task outlives every arbiter handle");
                PendingGrant {
                    agent,
                    inner: &self.inner,
                    granted: Some(granted),
                }
                .wait()
                .await;
                Slot::Host
            }
        };

        debug!(agent = %agent, admitted = self.inner.stats.admitted(), "admission granted");

        Admission {
            agent,
            inner: Arc::clone(&self.inner),
            slot: Some(slot),
        }
    }
}

impl std::fmt::Debug for Arbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arbiter")
            .field("kind", &self.kind())
            .field("capacity", &self.inner.capacity)
            .field("admitted", &self.inner.stats.admitted())
            .finish()
    }
}

/// A host request that has been queued but not yet turned into an [`Admission`].
///
/// If the requesting future is dropped after the host already granted the
/// slot, dropping this hands the slot straight back.
struct PendingGrant<'a> {
    agent: AgentId,
    inner: &'a ArbiterInner,
    granted: Option<oneshot::Receiver<()>>,
}

impl PendingGrant<'_> {
    async fn wait(mut self) {
        if let Some(granted) = self.granted.as_mut() {
            granted
                .await
                .expect("host task answers every queued request");
        }
        // Disarm: the caller builds an Admission right after this returns.
        self.granted = None;
    }
}

impl Drop for PendingGrant<'_> {
    fn drop(&mut self) {
        let Some(mut granted) = self.granted.take() else {
            return;
        };

        // After close() the host either fails to send, and undoes its own
        // count, or has already sent and the grant is readable here.
        granted.close();
        if granted.try_recv().is_ok() {
            self.inner.stats.on_release();
            if let Backend::Host(tx) = &self.inner.backend {
                let _ = tx.send(HostMessage::Release { agent: self.agent });
            }
            debug!(agent = %self.agent, "abandoned admission returned to host");
        }
    }
}

enum Slot {
    Gate(OwnedSemaphorePermit),
    Host,
}

/// An admission slot held by one agent.
pub struct Admission {
    agent: AgentId,
    inner: Arc<ArbiterInner>,
    slot: Option<Slot>,
}

impl Admission {
    /// The agent holding this slot.
    pub fn agent(&self) -> AgentId {
        self.agent
    }

    /// Hand the slot back to the arbiter, possibly unblocking one waiter.
    pub fn release(self) {
        drop(self);
    }
}

impl std::fmt::Debug for Admission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match self.inner.backend {
            Backend::Gate(_) => ArbiterKind::Gate,
            Backend::Host(_) => ArbiterKind::Host,
        };
        f.debug_struct("Admission")
            .field("agent", &self.agent)
            .field("backend", &backend)
            .finish()
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        let Some(slot) = self.slot.take() else {
            return;
        };

        self.inner.stats.on_release();
        match slot {
            Slot::Gate(permit) => drop(permit),
            Slot::Host => {
                if let Backend::Host(tx) = &self.inner.backend {
                    // The host task only stops once every sender is gone, and
                    // this admission still holds one through `inner`.
                    let _ = tx.send(HostMessage::Release { agent: self.agent });
                }
            }
        }
    }
}

/// Host task loop. Owns the authoritative admitted count and wait queue.
async fn run_host(
    capacity: usize,
    stats: Arc<ArbiterStats>,
    mut rx: mpsc::UnboundedReceiver<HostMessage>,
) {
    let mut admitted = 0usize;
    let mut waiting: VecDeque<(AgentId, oneshot::Sender<()>)> = VecDeque::new();

    while let Some(message) = rx.recv().await {
        match message {
            HostMessage::Request { agent, reply } => {
                waiting.push_back((agent, reply));
            }
            HostMessage::Release { agent } => {
                admitted = admitted.saturating_sub(1);
                debug!(agent = %agent, admitted, "host reclaimed slot");
            }
        }

        while admitted < capacity {
            let Some((agent, reply)) = waiting.pop_front() else {
                break;
            };
            if reply.is_closed() {
                debug!(agent = %agent, "dropping abandoned admission request");
                continue;
            }
            // Count before replying so the stats never lag behind a grant.
            stats.on_grant(capacity);
            if reply.send(()).is_err() {
                stats.on_release();
                warn!(agent = %agent, "admission requester went away before grant");
                continue;
            }
            admitted += 1;
        }
    }

    debug!("host arbiter stopped");
}
