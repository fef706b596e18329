//! Cache owner task.
//!
//! One long-lived task per cache generation. It holds the statistics
//! counters, runs the periodic expiry sweep, and executes the operations
//! that must not interleave with each other: clear, pattern deletion, and
//! warmup dispatch. Reads and writes never wait on it.

use std::sync::Arc;
use std::time::Duration;

use babel_core::{AuditEvent, Locale, WarmupSource, MAX_CLEANUP_INTERVAL_SECS};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::{oneshot, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::pattern::{KeyPattern, PatternMatcher};
use crate::stats::{StatsCollector, StatsEvent};
use crate::store::Store;
use crate::warmup;

// ============================================================================
// COMMANDS
// ============================================================================

/// Messages processed by the owner, strictly in arrival order.
pub(crate) enum Command {
    /// Counter update from a get.
    Record(StatsEvent),
    /// Remove every entry; replies with the number removed.
    Clear { reply: oneshot::Sender<u64> },
    /// Delete every key matching `matcher`; replies with the count.
    DeletePattern {
        pattern: KeyPattern,
        matcher: PatternMatcher,
        reply: oneshot::Sender<u64>,
    },
    /// Run an expiry sweep now instead of waiting for the next tick.
    Sweep { reply: oneshot::Sender<u64> },
    /// Start a background warmup.
    Warmup {
        resources: Vec<String>,
        locales: Vec<Locale>,
    },
    /// Copy of the counters as of this message.
    Snapshot { reply: oneshot::Sender<StatsCollector> },
    #[cfg(test)]
    Crash,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::Record(_) => "Record",
            Command::Clear { .. } => "Clear",
            Command::DeletePattern { .. } => "DeletePattern",
            Command::Sweep { .. } => "Sweep",
            Command::Warmup { .. } => "Warmup",
            Command::Snapshot { .. } => "Snapshot",
            #[cfg(test)]
            Command::Crash => "Crash",
        };
        f.write_str(name)
    }
}

// ============================================================================
// OWNER
// ============================================================================

pub(crate) struct CacheOwner {
    store: Store,
    commands: UnboundedReceiver<Command>,
    stats: StatsCollector,
    cleanup_interval: Duration,
    warmup_source: Option<Arc<dyn WarmupSource>>,
}

impl CacheOwner {
    pub(crate) fn new(
        store: Store,
        commands: UnboundedReceiver<Command>,
        cleanup_interval: Duration,
        warmup_source: Option<Arc<dyn WarmupSource>>,
    ) -> Self {
        Self {
            store,
            commands,
            stats: StatsCollector::new(),
            cleanup_interval,
            warmup_source,
        }
    }

    /// Process commands and sweep ticks until shutdown is signalled or every
    /// sender is gone.
    pub(crate) async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        let period = self
            .cleanup_interval
            .min(Duration::from_secs(MAX_CLEANUP_INTERVAL_SECS));
        // First sweep one full interval after start, not immediately.
        let start = Instant::now()
            .checked_add(period)
            .unwrap_or_else(Instant::now);
        let mut sweep_interval = interval_at(start, period);
        sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            cleanup_interval_secs = period.as_secs(),
            warmup_enabled = self.warmup_source.is_some(),
            "Cache owner started"
        );

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        tracing::info!("Cache owner shutting down");
                        break;
                    }
                }

                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.handle(command),
                        None => {
                            tracing::debug!("Cache command channel closed");
                            break;
                        }
                    }
                }

                _ = sweep_interval.tick() => {
                    self.sweep();
                }
            }
        }

        tracing::info!(
            hits = self.stats.hits(),
            misses = self.stats.misses(),
            evictions = self.stats.evictions(),
            size = self.store.len(),
            "Cache owner stopped"
        );
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Record(event) => self.stats.apply(event),

            Command::Clear { reply } => {
                let removed = self.store.clear_entries();
                self.stats.apply(StatsEvent::Evicted(removed));
                tracing::info!(removed, "Cache cleared");
                let _ = reply.send(removed);
            }

            Command::DeletePattern {
                pattern,
                matcher,
                reply,
            } => {
                let removed = self.store.delete_matching(&matcher);
                tracing::debug!(pattern = %pattern, removed, "Pattern invalidation completed");
                self.store
                    .audit(AuditEvent::pattern_invalidated(pattern.to_string(), removed));
                let _ = reply.send(removed);
            }

            Command::Sweep { reply } => {
                let removed = self.sweep();
                let _ = reply.send(removed);
            }

            Command::Warmup { resources, locales } => self.start_warmup(resources, locales),

            Command::Snapshot { reply } => {
                let _ = reply.send(self.stats);
            }

            #[cfg(test)]
            Command::Crash => panic!("cache owner crash requested"),
        }
    }

    /// Remove expired entries and count them as evictions.
    fn sweep(&mut self) -> u64 {
        let removed = self.store.sweep_expired();
        self.stats.apply(StatsEvent::Evicted(removed));
        if removed > 0 {
            tracing::debug!(removed, remaining = self.store.len(), "Expiry sweep completed");
        } else {
            tracing::trace!("Expiry sweep completed with nothing expired");
        }
        removed
    }

    fn start_warmup(&self, resources: Vec<String>, locales: Vec<Locale>) {
        let Some(source) = self.warmup_source.clone() else {
            tracing::debug!(
                resources = resources.len(),
                "Warmup requested without a warmup source; ignoring"
            );
            return;
        };

        // Detached: a slow source must never hold up the owner.
        tokio::spawn(warmup::run_warmup(
            self.store.clone(),
            source,
            resources,
            locales,
        ));
    }
}
