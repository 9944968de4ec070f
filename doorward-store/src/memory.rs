//! In-memory schedule store and audit log.
//!
//! Fast, thread-safe storage suitable for development, testing,
//! and single-process deployments seeded from a snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, instrument};

use doorward_core::error::Result;
use doorward_core::traits::{AuditSink, ScheduleGateway};
use doorward_core::types::{
    AuditRecord, GrantMatch, GrantQuery, Identity, Role, Room, Schedule, Sensor, Suspension, User,
};

use crate::snapshot::StoreSnapshot;

/// In-memory schedule store.
///
/// Evaluates the same predicates as the relational query: active schedule,
/// a window for today containing the current minute, a role holding a user
/// whose fingerprint or NFC id equals the key, a covered room owning the
/// sensor, and no blocking suspension.
///
/// # Tie-break
///
/// When several rows qualify, the lowest `(schedule id, window from, role id,
/// user id)` wins, so repeated evaluations pick the same row.
///
/// # Thread Safety
///
/// All operations are thread-safe and can be called concurrently.
#[derive(Debug, Default)]
pub struct MemoryStore {
    schedules: DashMap<String, Schedule>,
    roles: DashMap<String, Role>,
    users: DashMap<String, User>,
    rooms: DashMap<String, Room>,
    sensors: DashMap<String, Sensor>,
    suspensions: DashMap<String, Suspension>,
    /// Append-only audit log
    audit_log: RwLock<Vec<AuditRecord>>,
    grant_queries: AtomicU64,
    identity_queries: AtomicU64,
}

/// Store statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of schedules
    pub schedules: usize,
    /// Number of users
    pub users: usize,
    /// Number of sensors
    pub sensors: usize,
    /// Number of audit records appended
    pub audit_records: usize,
    /// Primary authorization queries served
    pub grant_queries: u64,
    /// Identity lookups served
    pub identity_queries: u64,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store from a validated snapshot.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self> {
        let store = Self::new();
        store.import(snapshot)?;
        Ok(store)
    }

    /// Validates `snapshot` and merges it into the store, replacing records with equal ids.
    pub fn import(&self, snapshot: StoreSnapshot) -> Result<()> {
        snapshot.validate()?;

        for schedule in snapshot.schedules {
            self.insert_schedule(schedule);
        }
        for role in snapshot.roles {
            self.insert_role(role);
        }
        for user in snapshot.users {
            self.insert_user(user);
        }
        for room in snapshot.rooms {
            self.insert_room(room);
        }
        for sensor in snapshot.sensors {
            self.insert_sensor(sensor);
        }
        for suspension in snapshot.suspensions {
            self.insert_suspension(suspension);
        }
        Ok(())
    }

    /// Exports the schedule model, sorted by id.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            schedules: sorted_values(&self.schedules),
            roles: sorted_values(&self.roles),
            users: sorted_values(&self.users),
            rooms: sorted_values(&self.rooms),
            sensors: sorted_values(&self.sensors),
            suspensions: sorted_values(&self.suspensions),
        }
    }

    /// Inserts or replaces a schedule.
    pub fn insert_schedule(&self, schedule: Schedule) {
        self.schedules.insert(schedule.id.clone(), schedule);
    }

    /// Inserts or replaces a role.
    pub fn insert_role(&self, role: Role) {
        self.roles.insert(role.id.clone(), role);
    }

    /// Inserts or replaces a user.
    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    /// Inserts or replaces a room.
    pub fn insert_room(&self, room: Room) {
        self.rooms.insert(room.id.clone(), room);
    }

    /// Inserts or replaces a sensor.
    pub fn insert_sensor(&self, sensor: Sensor) {
        self.sensors.insert(sensor.id.clone(), sensor);
    }

    /// Inserts or replaces a suspension.
    pub fn insert_suspension(&self, suspension: Suspension) {
        self.suspensions.insert(suspension.id.clone(), suspension);
    }

    /// Returns every audit record appended so far, oldest first.
    pub fn audit_records(&self) -> Vec<AuditRecord> {
        self.audit_log.read().clone()
    }

    /// Returns the current statistics.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            schedules: self.schedules.len(),
            users: self.users.len(),
            sensors: self.sensors.len(),
            audit_records: self.audit_log.read().len(),
            grant_queries: self.grant_queries.load(Ordering::SeqCst),
            identity_queries: self.identity_queries.load(Ordering::SeqCst),
        }
    }

    /// Clears the model, the audit log and the counters.
    pub fn clear(&self) {
        self.schedules.clear();
        self.roles.clear();
        self.users.clear();
        self.rooms.clear();
        self.sensors.clear();
        self.suspensions.clear();
        self.audit_log.write().clear();
        self.grant_queries.store(0, Ordering::SeqCst);
        self.identity_queries.store(0, Ordering::SeqCst);
    }

    fn is_suspended(&self, user_id: &str, today: NaiveDate) -> bool {
        self.suspensions
            .iter()
            .any(|s| s.user_id == user_id && s.blocks_on(today))
    }

    /// Users whose fingerprint or NFC id equals `key`, sorted by id.
    fn users_with_key(&self, key: &str) -> Vec<User> {
        let mut users: Vec<User> = self
            .users
            .iter()
            .filter(|u| u.matches_key(key))
            .map(|u| u.value().clone())
            .collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        users
    }
}

fn sorted_values<T: Clone>(map: &DashMap<String, T>) -> Vec<T> {
    let mut entries: Vec<(String, T)> = map
        .iter()
        .map(|e| (e.key().clone(), e.value().clone()))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries.into_iter().map(|(_, v)| v).collect()
}

fn tie_break_key(m: &GrantMatch) -> (&str, NaiveTime, &str, &str) {
    (m.schedule_id.as_str(), m.from, m.role_id.as_str(), m.user_id.as_str())
}

#[async_trait]
impl ScheduleGateway for MemoryStore {
    #[instrument(skip(self, query), fields(sensor_id = %query.sensor_id))]
    async fn find_grant(&self, query: &GrantQuery) -> Result<Option<GrantMatch>> {
        self.grant_queries.fetch_add(1, Ordering::SeqCst);

        let Some(sensor) = self.sensors.get(&query.sensor_id).map(|s| s.value().clone()) else {
            debug!("Unknown sensor");
            return Ok(None);
        };
        let Some(room) = self.rooms.get(&sensor.room_id).map(|r| r.value().clone()) else {
            return Ok(None);
        };

        let today = query.date();
        let weekday = query.weekday();
        let time = query.time_of_day();

        let users: Vec<User> = self
            .users_with_key(&query.key)
            .into_iter()
            .filter(|u| !self.is_suspended(&u.id, today))
            .collect();
        if users.is_empty() {
            return Ok(None);
        }

        let mut candidates = Vec::new();
        for schedule in self.schedules.iter() {
            if !schedule.active || !schedule.room_ids.contains(&room.id) {
                continue;
            }
            let windows = schedule
                .windows
                .iter()
                .filter(|w| w.day == weekday && w.contains(time));
            for window in windows {
                for role_id in &schedule.role_ids {
                    let Some(role) = self.roles.get(role_id) else {
                        continue;
                    };
                    for user in users.iter().filter(|u| role.user_ids.contains(&u.id)) {
                        candidates.push(GrantMatch {
                            schedule_id: schedule.id.clone(),
                            schedule_name: schedule.name.clone(),
                            role_id: role.id.clone(),
                            role_name: role.name.clone(),
                            user_id: user.id.clone(),
                            user_name: user.name.clone(),
                            user_fingerprint_id: user.fingerprint_id.clone(),
                            user_nfc_id: user.nfc_id.clone(),
                            room_id: room.id.clone(),
                            room_notification_topic: room.notification_topic.clone(),
                            sensor_id: sensor.id.clone(),
                            from: window.from,
                            to: window.to,
                        });
                    }
                }
            }
        }

        debug!(candidates = candidates.len(), "Evaluated schedules");
        Ok(candidates
            .into_iter()
            .min_by(|a, b| tie_break_key(a).cmp(&tie_break_key(b))))
    }

    #[instrument(skip(self, key))]
    async fn find_identity(&self, sensor_id: &str, key: &str) -> Result<Option<Identity>> {
        self.identity_queries.fetch_add(1, Ordering::SeqCst);

        let Some(room_id) = self.sensors.get(sensor_id).map(|s| s.room_id.clone()) else {
            return Ok(None);
        };

        Ok(self.users_with_key(key).into_iter().next().map(|user| Identity {
            user_id: user.id,
            room_id,
            display_name: Some(user.name),
        }))
    }
}

#[async_trait]
impl AuditSink for MemoryStore {
    async fn record(&self, record: AuditRecord) -> Result<()> {
        self.audit_log.write().push(record);
        Ok(())
    }
}
