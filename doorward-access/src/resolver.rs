//! Authorization resolver: cache probe, store fallback, bucket update.

use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, info, instrument};

use doorward_cache::TtlCache;
use doorward_core::error::{DoorwardError, Result};
use doorward_core::traits::ScheduleGateway;
use doorward_core::types::{Bucket, Credential, Decision, GrantMatch, GrantQuery};

/// The decision cache: sensor id → bucket of authorized keys.
pub type AccessCache = TtlCache<String, Bucket>;

/// Where a decision came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecisionSource {
    /// Unexpired bucket entry; no store I/O
    Cache,
    /// Primary store query
    Store,
}

/// A decision plus what produced it.
#[derive(Clone, Debug)]
pub struct Resolution {
    /// The decision itself
    pub decision: Decision,
    /// Cache hit or store query
    pub source: DecisionSource,
    /// The matched row, for store-resolved grants
    pub grant: Option<GrantMatch>,
}

/// Resolves credentials against the cache and the schedule store.
pub struct Resolver {
    cache: Arc<AccessCache>,
    gateway: Arc<dyn ScheduleGateway>,
}

impl Resolver {
    /// Creates a resolver sharing `cache` with its owner.
    pub fn new(cache: Arc<AccessCache>, gateway: Arc<dyn ScheduleGateway>) -> Self {
        Self { cache, gateway }
    }

    /// The decision cache.
    pub fn cache(&self) -> &Arc<AccessCache> {
        &self.cache
    }

    /// The schedule gateway.
    pub fn gateway(&self) -> &Arc<dyn ScheduleGateway> {
        &self.gateway
    }

    /// Decides whether `credential` opens its door at local time `at`.
    ///
    /// A cached, unexpired key is granted without touching the store. Any
    /// miss runs the primary query; a match rewrites the sensor's whole
    /// bucket with a TTL of `to - from` of the matched window.
    ///
    /// # Errors
    ///
    /// `DoorwardError::Store` if the primary query fails. No match is a
    /// denied decision, not an error.
    #[instrument(skip(self, credential), fields(sensor_id = %credential.sensor_id, kind = %credential.kind))]
    pub async fn resolve(&self, credential: &Credential, at: NaiveDateTime) -> Result<Resolution> {
        if let Some(subject) = self
            .cache
            .get(credential.sensor_id.as_str())
            .and_then(|mut bucket| bucket.remove(&credential.key))
        {
            debug!(user_id = %subject.user_id, "Cache hit");
            return Ok(Resolution {
                decision: Decision::granted(subject),
                source: DecisionSource::Cache,
                grant: None,
            });
        }

        debug!("Cache miss, querying schedule store");

        let query = GrantQuery::new(&credential.sensor_id, &credential.key, at);
        let grant = self.gateway.find_grant(&query).await.map_err(|e| match e {
            DoorwardError::Store(_) => e,
            other => DoorwardError::Store(other.to_string()),
        })?;

        let Some(grant) = grant else {
            return Ok(Resolution {
                decision: Decision::no_matching_schedule(),
                source: DecisionSource::Store,
                grant: None,
            });
        };

        let subject = grant.subject();
        let ttl = grant.cache_ttl();

        let mut bucket = self
            .cache
            .get(credential.sensor_id.as_str())
            .unwrap_or_default();
        bucket.insert(credential.key.clone(), subject.clone());
        self.cache.put(credential.sensor_id.clone(), bucket, ttl);

        info!(
            schedule = %grant.schedule_name,
            role = %grant.role_name,
            user = %grant.user_name,
            room_id = %grant.room_id,
            ttl_secs = ttl.as_secs(),
            "Access granted by schedule"
        );

        Ok(Resolution {
            decision: Decision::granted(subject),
            source: DecisionSource::Store,
            grant: Some(grant),
        })
    }
}
