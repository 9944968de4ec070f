//! JSON snapshots of the schedule model.
//!
//! A snapshot seeds the memory store for development deployments and tests.
//! Files are written atomically (temp file, then rename).

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use doorward_core::error::{DoorwardError, Result};
use doorward_core::types::{Role, Room, Schedule, Sensor, Suspension, User};

/// The whole read-only schedule model.
///
/// # File Format
///
/// ```text
/// {
///   "schedules":   [{"id", "name", "active", "windows": [{"day","from","to"}], "roleIds", "roomIds"}],
///   "roles":       [{"id", "name", "userIds"}],
///   "users":       [{"id", "name", "fingerprintId", "nfcId"}],
///   "rooms":       [{"id", "name", "notificationTopic"}],
///   "sensors":     [{"id", "roomId"}],
///   "suspensions": [{"id", "userId", "isPermanent", "startDate", "endDate"}]
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    /// Access schedules
    #[serde(default)]
    pub schedules: Vec<Schedule>,
    /// Roles
    #[serde(default)]
    pub roles: Vec<Role>,
    /// Users
    #[serde(default)]
    pub users: Vec<User>,
    /// Rooms
    #[serde(default)]
    pub rooms: Vec<Room>,
    /// Door sensors
    #[serde(default)]
    pub sensors: Vec<Sensor>,
    /// Suspensions
    #[serde(default)]
    pub suspensions: Vec<Suspension>,
}

impl StoreSnapshot {
    /// Parses and validates a snapshot from JSON bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let snapshot: StoreSnapshot = serde_json::from_slice(bytes)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Loads and validates a snapshot file.
    #[instrument]
    pub async fn load(path: impl AsRef<Path> + std::fmt::Debug) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read(path).await.map_err(|e| {
            DoorwardError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to open snapshot {}: {}", path.display(), e),
            ))
        })?;

        let snapshot = Self::from_json(&contents)?;
        info!(
            schedules = snapshot.schedules.len(),
            users = snapshot.users.len(),
            sensors = snapshot.sensors.len(),
            "Loaded store snapshot"
        );
        Ok(snapshot)
    }

    /// Writes the snapshot atomically.
    #[instrument(skip(self))]
    pub async fn save(&self, path: impl AsRef<Path> + std::fmt::Debug) -> Result<()> {
        let path = path.as_ref();
        let serialized = serde_json::to_vec_pretty(self)?;

        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&serialized).await?;
        file.sync_all().await?;

        fs::rename(&temp_path, path).await?;

        debug!("Snapshot saved successfully");
        Ok(())
    }

    /// Checks identifier uniqueness and referential integrity.
    pub fn validate(&self) -> Result<()> {
        let room_ids = unique_ids("room", self.rooms.iter().map(|r| r.id.as_str()))?;
        let user_ids = unique_ids("user", self.users.iter().map(|u| u.id.as_str()))?;
        let role_ids = unique_ids("role", self.roles.iter().map(|r| r.id.as_str()))?;
        unique_ids("schedule", self.schedules.iter().map(|s| s.id.as_str()))?;
        unique_ids("sensor", self.sensors.iter().map(|s| s.id.as_str()))?;
        unique_ids("suspension", self.suspensions.iter().map(|s| s.id.as_str()))?;

        for sensor in &self.sensors {
            require(&room_ids, &sensor.room_id, "sensor", &sensor.id, "room")?;
        }
        for role in &self.roles {
            for user_id in &role.user_ids {
                require(&user_ids, user_id, "role", &role.id, "user")?;
            }
        }
        for schedule in &self.schedules {
            for role_id in &schedule.role_ids {
                require(&role_ids, role_id, "schedule", &schedule.id, "role")?;
            }
            for room_id in &schedule.room_ids {
                require(&room_ids, room_id, "schedule", &schedule.id, "room")?;
            }
        }
        for suspension in &self.suspensions {
            require(&user_ids, &suspension.user_id, "suspension", &suspension.id, "user")?;
        }
        Ok(())
    }
}

fn unique_ids<'a>(kind: &str, ids: impl Iterator<Item = &'a str>) -> Result<HashSet<&'a str>> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(DoorwardError::InvalidSnapshot(format!(
                "duplicate {} id: {}",
                kind, id
            )));
        }
    }
    Ok(seen)
}

fn require(known: &HashSet<&str>, id: &str, owner: &str, owner_id: &str, kind: &str) -> Result<()> {
    if known.contains(id) {
        Ok(())
    } else {
        Err(DoorwardError::InvalidSnapshot(format!(
            "{} {} references unknown {} {}",
            owner, owner_id, kind, id
        )))
    }
}
