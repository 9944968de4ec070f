//! Request orchestration.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use doorward_cache::CacheStats;
use doorward_core::error::Result;
use doorward_core::traits::{AuditSink, Clock, Notifier, ScheduleGateway, SystemClock};
use doorward_core::types::{AuditRecord, Credential, Decision};

use crate::audit::AuditDispatcher;
use crate::notify::NoopNotifier;
use crate::resolver::{AccessCache, DecisionSource, Resolver};

/// Which cache entries an invalidation removes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClearScope {
    /// Every bucket
    All,
    /// Only the listed sensors' buckets
    Sensors(Vec<String>),
}

impl ClearScope {
    /// Parses a comma-separated sensor list.
    ///
    /// Only an absent or blank value means `All`. A list with no usable ids
    /// (`","`) is an empty `Sensors` scope and removes nothing.
    pub fn parse(raw: Option<&str>) -> Self {
        let raw = raw.map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return ClearScope::All;
        }

        ClearScope::Sensors(
            raw.split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(String::from)
                .collect(),
        )
    }
}

/// Turns one credential into one decision plus one background audit unit.
///
/// ```text
/// CacheProbe ─ hit ──────────────────────────────▶ granted ─▶ log(granted)
///            └ miss ─▶ store ─ match ─▶ cache put ▶ granted ─▶ log(granted) + notify
///                             └ none ────────────▶ denied  ─▶ lookup ─▶ log(denied)?
/// ```
pub struct AccessService {
    resolver: Resolver,
    audit: AuditDispatcher,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl AccessService {
    /// Creates a service over a shared cache, a gateway and an audit sink.
    pub fn new(
        cache: Arc<AccessCache>,
        gateway: Arc<dyn ScheduleGateway>,
        sink: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            resolver: Resolver::new(cache, gateway),
            audit: AuditDispatcher::new(sink),
            notifier: Arc::new(NoopNotifier),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the post-grant notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replaces the wall clock schedules are evaluated against.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Decides on `credential` and schedules its audit record.
    ///
    /// # Errors
    ///
    /// - `DoorwardError::Validation` for a blank sensor id or key (no store I/O, no audit)
    /// - `DoorwardError::Store` if the primary query fails (no audit)
    pub async fn verify(&self, credential: Credential) -> Result<Decision> {
        credential.validate()?;

        let resolution = self.resolver.resolve(&credential, self.clock.now()).await?;
        let decision = resolution.decision;

        match &decision.subject {
            Some(subject) if decision.granted => {
                let record = AuditRecord::granted(subject, credential.kind);
                match resolution.grant {
                    Some(grant) if grant.room_notification_topic.is_some() => {
                        let notifier = self.notifier.clone();
                        self.audit.submit_then(record, async move {
                            if let Err(e) = notifier.notify(&grant).await {
                                warn!(room_id = %grant.room_id, error = %e, "Notification failed");
                            }
                        });
                    }
                    _ => self.audit.submit(record),
                }
                if resolution.source == DecisionSource::Cache {
                    debug!(sensor_id = %credential.sensor_id, "Granted from cache");
                }
            }
            _ => {
                info!(
                    sensor_id = %credential.sensor_id,
                    kind = %credential.kind,
                    reason = %decision.reason,
                    "Access denied"
                );
                let reason = decision.reason.clone();
                self.audit
                    .submit_denied(self.resolver.gateway().clone(), credential, reason);
            }
        }

        Ok(decision)
    }

    /// Invalidates cache entries. Returns how many buckets were removed.
    pub fn clear_cache(&self, scope: &ClearScope) -> usize {
        let cache = self.resolver.cache();
        let removed = match scope {
            ClearScope::All => {
                let count = cache.len();
                cache.clear();
                count
            }
            ClearScope::Sensors(ids) => cache.remove_many(ids.iter().map(String::as_str)),
        };
        info!(?scope, removed, "Access cache cleared");
        removed
    }

    /// Cache diagnostics.
    pub fn cache_stats(&self) -> CacheStats {
        self.resolver.cache().stats()
    }

    /// Number of background audit units still running.
    pub fn in_flight(&self) -> usize {
        self.audit.in_flight()
    }

    /// Waits up to `grace` for background audit work. Returns true if all finished.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.audit.drain(grace).await
    }
}
