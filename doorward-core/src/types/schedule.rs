//! The read-only access-control model.
//!
//! Doorward never manages these records; stores load them and the gateway
//! evaluates them. Field names follow the relational schema (camelCase).

use std::time::Duration;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::types::Subject;

/// A named, time-windowed, role-and-room-scoped access permission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Inactive schedules never match
    pub active: bool,
    /// Weekly windows
    #[serde(default)]
    pub windows: Vec<TimeWindow>,
    /// Roles granted by this schedule
    #[serde(default)]
    pub role_ids: Vec<String>,
    /// Rooms covered by this schedule
    #[serde(default)]
    pub room_ids: Vec<String>,
}

/// A weekly time window: `day`, inclusive `[from, to]` at minute resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Day of week
    pub day: Weekday,
    /// Window start
    #[serde(with = "hhmm")]
    pub from: NaiveTime,
    /// Window end
    #[serde(with = "hhmm")]
    pub to: NaiveTime,
}

impl TimeWindow {
    /// Creates a window.
    pub fn new(day: Weekday, from: NaiveTime, to: NaiveTime) -> Self {
        Self { day, from, to }
    }

    /// Returns true if `time` lies within `[from, to]`.
    ///
    /// A window whose `to` is before its `from` (crossing midnight) contains nothing.
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.from <= time && time <= self.to
    }

    /// Length of the window as a time-of-day subtraction (`to - from`).
    ///
    /// Windows crossing midnight would be negative; they yield zero.
    pub fn duration(&self) -> Duration {
        (self.to - self.from).to_std().unwrap_or(Duration::ZERO)
    }
}

/// A named grouping of users.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Members
    #[serde(default)]
    pub user_ids: Vec<String>,
}

/// A person who may present credentials.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Enrolled fingerprint identifier
    #[serde(default)]
    pub fingerprint_id: Option<String>,
    /// Enrolled NFC identifier
    #[serde(default)]
    pub nfc_id: Option<String>,
}

impl User {
    /// Returns true if `key` equals the user's fingerprint or NFC identifier.
    pub fn matches_key(&self, key: &str) -> bool {
        self.fingerprint_id.as_deref() == Some(key) || self.nfc_id.as_deref() == Some(key)
    }
}

/// A room guarded by one or more sensors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Push-notification topic, if the room publishes entries
    #[serde(default)]
    pub notification_topic: Option<String>,
}

/// A physical reader, bound to exactly one room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    /// Unique identifier
    pub id: String,
    /// Room the sensor belongs to
    pub room_id: String,
}

/// A record blocking a user's access, permanently or for a date range.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suspension {
    /// Unique identifier
    pub id: String,
    /// Suspended user
    pub user_id: String,
    /// Permanent suspensions always block
    pub is_permanent: bool,
    /// First blocked day (inclusive); open-ended when absent
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Last blocked day (inclusive); open-ended when absent
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl Suspension {
    /// Returns true if this suspension blocks access on `date`.
    pub fn blocks_on(&self, date: NaiveDate) -> bool {
        if self.is_permanent {
            return true;
        }
        let started = self.start_date.map_or(true, |start| start <= date);
        let not_ended = self.end_date.map_or(true, |end| date <= end);
        started && not_ended
    }
}

/// Input of the primary authorization query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrantQuery {
    /// Sensor that read the credential
    pub sensor_id: String,
    /// Fingerprint or NFC identifier
    pub key: String,
    /// Local wall-clock instant of the attempt
    pub at: NaiveDateTime,
}

impl GrantQuery {
    /// Creates a query.
    pub fn new(sensor_id: impl Into<String>, key: impl Into<String>, at: NaiveDateTime) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            key: key.into(),
            at,
        }
    }

    /// Day of week of the attempt.
    pub fn weekday(&self) -> Weekday {
        self.at.weekday()
    }

    /// Time of day truncated to the minute, the resolution windows are stored at.
    pub fn time_of_day(&self) -> NaiveTime {
        let time = self.at.time();
        NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
    }

    /// Calendar date of the attempt.
    pub fn date(&self) -> NaiveDate {
        self.at.date()
    }
}

/// The row selected by the primary authorization query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantMatch {
    /// Matched schedule
    pub schedule_id: String,
    /// Matched schedule name
    pub schedule_name: String,
    /// Role through which the user is granted
    pub role_id: String,
    /// Role name
    pub role_name: String,
    /// Matched user
    pub user_id: String,
    /// User name
    pub user_name: String,
    /// User's fingerprint identifier
    pub user_fingerprint_id: Option<String>,
    /// User's NFC identifier
    pub user_nfc_id: Option<String>,
    /// Room of the sensor
    pub room_id: String,
    /// Room notification topic
    pub room_notification_topic: Option<String>,
    /// Sensor the credential was read at
    pub sensor_id: String,
    /// Start of the matched window
    #[serde(with = "hhmm")]
    pub from: NaiveTime,
    /// End of the matched window
    #[serde(with = "hhmm")]
    pub to: NaiveTime,
}

impl GrantMatch {
    /// Subject authorized by this match.
    pub fn subject(&self) -> Subject {
        Subject::new(&self.user_id, &self.room_id).with_display_name(&self.user_name)
    }

    /// Cache lifetime derived from the matched window (`to - from`).
    pub fn cache_ttl(&self) -> Duration {
        (self.to - self.from).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Full English weekday name, as stored by the schedule tables.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Serde adapter for `HH:MM` times (seconds accepted on input).
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::constants::{TIME_OF_DAY_FORMAT, TIME_OF_DAY_SECONDS_FORMAT};

    /// Serializes as `HH:MM`.
    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(TIME_OF_DAY_FORMAT).to_string())
    }

    /// Deserializes from `HH:MM` or `HH:MM:SS`.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    /// Parses `HH:MM` or `HH:MM:SS`.
    pub fn parse(raw: &str) -> Result<NaiveTime, chrono::ParseError> {
        let raw = raw.trim();
        NaiveTime::parse_from_str(raw, TIME_OF_DAY_FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(raw, TIME_OF_DAY_SECONDS_FORMAT))
    }
}
