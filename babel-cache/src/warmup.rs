//! Background cache warmup.

use std::sync::Arc;

use babel_core::{CacheKey, Locale, WarmupSource};

use crate::store::Store;

/// Outcome of one warmup run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct WarmupReport {
    /// Entries written to the cache.
    pub(crate) warmed: u64,
    /// Source loads or writes that failed.
    pub(crate) failed: u64,
}

/// Load every `(resource, locale)` pair from `source` and store the results
/// under canonical translation keys with the default TTL.
///
/// Failures are logged and counted; they never abort the run.
pub(crate) async fn run_warmup(
    store: Store,
    source: Arc<dyn WarmupSource>,
    resources: Vec<String>,
    locales: Vec<Locale>,
) -> WarmupReport {
    let mut report = WarmupReport::default();

    tracing::info!(
        resources = resources.len(),
        locales = locales.len(),
        "Cache warmup started"
    );

    for resource in &resources {
        for locale in &locales {
            let entries = match source.load(resource, locale).await {
                Ok(entries) => entries,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        resource = %resource,
                        locale = %locale,
                        error = %e,
                        "Warmup load failed"
                    );
                    continue;
                }
            };

            for entry in entries {
                let key = CacheKey::translation(
                    resource.as_str(),
                    entry.field,
                    locale.as_str(),
                    entry.record_id,
                );
                match store.put(&key, &entry.value, None) {
                    Ok(()) => report.warmed += 1,
                    Err(e) => {
                        report.failed += 1;
                        tracing::warn!(
                            key = %key.redacted(),
                            error = %e,
                            "Warmup entry rejected"
                        );
                    }
                }
            }
        }
    }

    tracing::info!(
        warmed = report.warmed,
        failed = report.failed,
        "Cache warmup finished"
    );

    report
}
