//! Owner supervision.
//!
//! The supervisor hosts the owner task and restarts it after a panic. A
//! restart builds a fresh generation (empty table, zeroed counters) and
//! publishes it to the shared slot that every cache handle reads. If the
//! owner panics more than `max_restarts` times within `restart_window`, the
//! slot is left empty and the cache stays unavailable.

use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use babel_core::{AuditSink, WarmupSource};
use tokio::sync::{mpsc, watch};

use crate::owner::CacheOwner;
use crate::signer::Signer;
use crate::store::Store;
use crate::validator::KeyValidator;

/// Slot holding the live generation; `None` while unavailable.
pub(crate) type StoreSlot = Arc<RwLock<Option<Store>>>;

pub(crate) fn read_slot(slot: &StoreSlot) -> Option<Store> {
    // A panic while holding the lock cannot leave an Option half-written.
    slot.read().unwrap_or_else(PoisonError::into_inner).clone()
}

pub(crate) fn write_slot(slot: &StoreSlot, store: Option<Store>) {
    *slot.write().unwrap_or_else(PoisonError::into_inner) = store;
}

/// How many owner panics are tolerated, and over what window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RestartPolicy {
    pub(crate) max_restarts: u32,
    pub(crate) window: Duration,
}

impl RestartPolicy {
    pub(crate) fn new(max_restarts: u32, window: Duration) -> Self {
        Self {
            max_restarts,
            window,
        }
    }
}

/// Tracks restart times inside the policy window.
#[derive(Debug)]
struct RestartBudget {
    policy: RestartPolicy,
    recent: VecDeque<Instant>,
}

impl RestartBudget {
    fn new(policy: RestartPolicy) -> Self {
        Self {
            policy,
            recent: VecDeque::new(),
        }
    }

    /// Record a restart at `now` if the budget allows it.
    fn try_acquire(&mut self, now: Instant) -> bool {
        while let Some(oldest) = self.recent.front() {
            if now.duration_since(*oldest) > self.policy.window {
                self.recent.pop_front();
            } else {
                break;
            }
        }
        if self.recent.len() >= self.policy.max_restarts as usize {
            return false;
        }
        self.recent.push_back(now);
        true
    }
}

/// Everything needed to build a fresh cache generation.
pub(crate) struct CacheFactory {
    pub(crate) validator: KeyValidator,
    pub(crate) signer: Signer,
    pub(crate) audit: Arc<dyn AuditSink>,
    pub(crate) warmup_source: Option<Arc<dyn WarmupSource>>,
    pub(crate) default_ttl: Duration,
    pub(crate) cleanup_interval: Duration,
}

impl CacheFactory {
    /// A new empty table and the owner that serves it.
    pub(crate) fn build(&self) -> (Store, CacheOwner) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let store = Store::new(
            self.validator.clone(),
            self.signer.clone(),
            Arc::clone(&self.audit),
            self.default_ttl,
            commands_tx,
        );
        let owner = CacheOwner::new(
            store.clone(),
            commands_rx,
            self.cleanup_interval,
            self.warmup_source.clone(),
        );
        (store, owner)
    }
}

/// Run `first` and keep an owner alive until shutdown or the restart budget
/// runs out. The slot is emptied before returning.
pub(crate) async fn supervise(
    factory: CacheFactory,
    first: CacheOwner,
    slot: StoreSlot,
    shutdown_rx: watch::Receiver<bool>,
    policy: RestartPolicy,
) {
    let mut budget = RestartBudget::new(policy);
    let mut owner = first;
    let mut generation = 0u64;

    loop {
        let handle = tokio::spawn(owner.run(shutdown_rx.clone()));

        match handle.await {
            Ok(()) => {
                tracing::debug!(generation, "Cache owner exited cleanly");
                break;
            }
            Err(e) if e.is_panic() => {
                // Drop the crashed generation first so callers degrade to
                // misses instead of talking to a table nobody sweeps.
                write_slot(&slot, None);

                if *shutdown_rx.borrow() {
                    tracing::warn!(generation, "Cache owner panicked during shutdown");
                    break;
                }

                if !budget.try_acquire(Instant::now()) {
                    tracing::error!(
                        generation,
                        max_restarts = policy.max_restarts,
                        window_secs = policy.window.as_secs(),
                        "Cache owner restart limit exceeded; cache disabled"
                    );
                    break;
                }

                generation += 1;
                tracing::error!(
                    generation,
                    "Cache owner panicked; restarting with an empty table"
                );

                let (store, next) = factory.build();
                write_slot(&slot, Some(store));
                owner = next;
            }
            Err(e) => {
                tracing::debug!(error = %e, "Cache owner task cancelled");
                break;
            }
        }
    }

    write_slot(&slot, None);
}
