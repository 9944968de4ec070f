//! libSQL/Turso schedule gateway and audit sink.
//!
//! Reads the relational schedule schema and appends to `UserRoomAccessLog`.
//! Times of day are stored as `HH:MM` text, dates as `YYYY-MM-DD` text and
//! weekdays as full English names, so all comparisons are textual.

use async_trait::async_trait;
use libsql::{params, Builder, Connection, Database, Row, Value};
use tracing::{debug, info, instrument};

use doorward_core::constants::{DATE_FORMAT, TIME_OF_DAY_FORMAT};
use doorward_core::error::{DoorwardError, Result};
use doorward_core::traits::{AuditSink, ScheduleGateway};
use doorward_core::types::{hhmm, weekday_name, AuditRecord, GrantMatch, GrantQuery, Identity};

/// Primary authorization query. `ORDER BY` makes the `LIMIT 1` pick deterministic.
const GRANT_QUERY: &str = r#"
SELECT
    a.id, a.name,
    ro.id, ro.name,
    us.id, us.name, us."fingerprintId", us."nfcId",
    roo.id, roo."snsTopicArn",
    s.id,
    t."from", t."to"
FROM "AccessSchedule" AS a
INNER JOIN "AccessScheduleTime" AS t ON t."accessScheduleId" = a.id
INNER JOIN "_AccessScheduleToRole" AS r ON r."A" = a.id
INNER JOIN "Role" AS ro ON ro.id = r."B"
INNER JOIN "_RoleToUser" AS u ON u."A" = ro.id
INNER JOIN "User" AS us ON us.id = u."B"
INNER JOIN "_AccessScheduleToRoom" AS rm ON rm."A" = a.id
INNER JOIN "Room" AS roo ON roo.id = rm."B"
INNER JOIN "DoorAccessSensor" AS s ON s."roomId" = roo.id
WHERE a.active = 1
  AND t.day = ?1
  AND t."from" <= ?2
  AND t."to" >= ?2
  AND (us."fingerprintId" = ?3 OR us."nfcId" = ?3)
  AND s.id = ?5
  AND NOT EXISTS (
      SELECT 1 FROM "Suspension" AS susp
      WHERE susp."userId" = us.id
        AND (
            susp."isPermanent" = 1
            OR (
                (susp."startDate" IS NULL OR susp."startDate" <= ?4)
                AND (susp."endDate" IS NULL OR susp."endDate" >= ?4)
            )
        )
  )
ORDER BY a.id, t."from", ro.id, us.id
LIMIT 1
"#;

/// Secondary lookup: who owns the key, which room the sensor guards.
const IDENTITY_QUERY: &str = r#"
SELECT us.id, s."roomId", us.name
FROM "DoorAccessSensor" AS s
INNER JOIN "User" AS us ON (us."fingerprintId" = ?2 OR us."nfcId" = ?2)
WHERE s.id = ?1
ORDER BY us.id
LIMIT 1
"#;

const INSERT_ACCESS_LOG: &str = r#"
INSERT INTO "UserRoomAccessLog" ("userId", "method", "roomId", "isGrantedAccess", "reason", "createdAt")
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
"#;

/// Schedule gateway and audit sink over a libSQL database.
pub struct SqlStore {
    _db: Database,
    conn: Connection,
}

impl SqlStore {
    /// Connects to a remote Turso/libSQL database.
    pub async fn connect_remote(url: &str, auth_token: &str) -> Result<Self> {
        let db = Builder::new_remote(url.to_string(), auth_token.to_string())
            .build()
            .await
            .map_err(store_err)?;
        info!(url, "Connected to libSQL schedule store");
        Self::from_database(db)
    }

    /// Wraps an already-built database.
    pub fn from_database(db: Database) -> Result<Self> {
        let conn = db.connect().map_err(store_err)?;
        Ok(Self { _db: db, conn })
    }

    /// The connection queries run on.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn store_err(err: libsql::Error) -> DoorwardError {
    DoorwardError::Store(err.to_string())
}

fn text(row: &Row, idx: i32) -> Result<String> {
    match row.get_value(idx).map_err(store_err)? {
        Value::Text(s) => Ok(s),
        Value::Integer(i) => Ok(i.to_string()),
        other => Err(DoorwardError::Store(format!(
            "column {}: expected text, got {:?}",
            idx, other
        ))),
    }
}

fn opt_text(row: &Row, idx: i32) -> Result<Option<String>> {
    match row.get_value(idx).map_err(store_err)? {
        Value::Null => Ok(None),
        Value::Text(s) => Ok(Some(s)),
        other => Err(DoorwardError::Store(format!(
            "column {}: expected nullable text, got {:?}",
            idx, other
        ))),
    }
}

fn time(row: &Row, idx: i32) -> Result<chrono::NaiveTime> {
    let raw = text(row, idx)?;
    hhmm::parse(&raw)
        .map_err(|e| DoorwardError::Store(format!("column {}: invalid time '{}': {}", idx, raw, e)))
}

#[async_trait]
impl ScheduleGateway for SqlStore {
    #[instrument(skip(self, query), fields(sensor_id = %query.sensor_id))]
    async fn find_grant(&self, query: &GrantQuery) -> Result<Option<GrantMatch>> {
        let day = weekday_name(query.weekday());
        let time_of_day = query.time_of_day().format(TIME_OF_DAY_FORMAT).to_string();
        let today = query.date().format(DATE_FORMAT).to_string();

        let mut rows = self
            .conn
            .query(
                GRANT_QUERY,
                params![
                    day,
                    time_of_day,
                    query.key.as_str(),
                    today,
                    query.sensor_id.as_str()
                ],
            )
            .await
            .map_err(store_err)?;

        let Some(row) = rows.next().await.map_err(store_err)? else {
            debug!("No matching schedule row");
            return Ok(None);
        };

        Ok(Some(GrantMatch {
            schedule_id: text(&row, 0)?,
            schedule_name: text(&row, 1)?,
            role_id: text(&row, 2)?,
            role_name: text(&row, 3)?,
            user_id: text(&row, 4)?,
            user_name: text(&row, 5)?,
            user_fingerprint_id: opt_text(&row, 6)?,
            user_nfc_id: opt_text(&row, 7)?,
            room_id: text(&row, 8)?,
            room_notification_topic: opt_text(&row, 9)?,
            sensor_id: text(&row, 10)?,
            from: time(&row, 11)?,
            to: time(&row, 12)?,
        }))
    }

    #[instrument(skip(self, key))]
    async fn find_identity(&self, sensor_id: &str, key: &str) -> Result<Option<Identity>> {
        let mut rows = self
            .conn
            .query(IDENTITY_QUERY, params![sensor_id, key])
            .await
            .map_err(store_err)?;

        let Some(row) = rows.next().await.map_err(store_err)? else {
            return Ok(None);
        };

        Ok(Some(Identity {
            user_id: text(&row, 0)?,
            room_id: text(&row, 1)?,
            display_name: opt_text(&row, 2)?,
        }))
    }
}

#[async_trait]
impl AuditSink for SqlStore {
    async fn record(&self, record: AuditRecord) -> Result<()> {
        self.conn
            .execute(
                INSERT_ACCESS_LOG,
                params![
                    record.user_id,
                    record.method.as_str(),
                    record.room_id,
                    record.granted as i64,
                    record.reason,
                    record.timestamp.to_rfc3339()
                ],
            )
            .await
            .map_err(|e| DoorwardError::Persistence(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use doorward_core::types::{CredentialType, Subject};
    use test_case::test_case;

    const SCHEMA: &str = r#"
        CREATE TABLE "AccessSchedule" (id TEXT PRIMARY KEY, name TEXT NOT NULL, active INTEGER NOT NULL);
        CREATE TABLE "AccessScheduleTime" (id TEXT PRIMARY KEY, "accessScheduleId" TEXT NOT NULL, day TEXT NOT NULL, "from" TEXT NOT NULL, "to" TEXT NOT NULL);
        CREATE TABLE "Role" (id TEXT PRIMARY KEY, name TEXT NOT NULL);
        CREATE TABLE "_AccessScheduleToRole" ("A" TEXT NOT NULL, "B" TEXT NOT NULL);
        CREATE TABLE "User" (id TEXT PRIMARY KEY, name TEXT NOT NULL, "fingerprintId" TEXT, "nfcId" TEXT);
        CREATE TABLE "_RoleToUser" ("A" TEXT NOT NULL, "B" TEXT NOT NULL);
        CREATE TABLE "Room" (id TEXT PRIMARY KEY, name TEXT NOT NULL, "snsTopicArn" TEXT);
        CREATE TABLE "_AccessScheduleToRoom" ("A" TEXT NOT NULL, "B" TEXT NOT NULL);
        CREATE TABLE "DoorAccessSensor" (id TEXT PRIMARY KEY, "roomId" TEXT NOT NULL);
        CREATE TABLE "Suspension" (id TEXT PRIMARY KEY, "userId" TEXT NOT NULL, "isPermanent" INTEGER NOT NULL, "startDate" TEXT, "endDate" TEXT);
        CREATE TABLE "UserRoomAccessLog" ("userId" TEXT, "method" TEXT, "roomId" TEXT, "isGrantedAccess" INTEGER, "reason" TEXT, "createdAt" TEXT);

        INSERT INTO "AccessSchedule" VALUES ('sch-1', 'Office hours', 1);
        INSERT INTO "AccessSchedule" VALUES ('sch-2', 'Late shift', 1);
        INSERT INTO "AccessScheduleTime" VALUES ('t-1', 'sch-1', 'Monday', '08:00', '18:00');
        INSERT INTO "AccessScheduleTime" VALUES ('t-2', 'sch-2', 'Monday', '06:00', '23:00');
        INSERT INTO "Role" VALUES ('role-1', 'Staff');
        INSERT INTO "_AccessScheduleToRole" VALUES ('sch-1', 'role-1');
        INSERT INTO "_AccessScheduleToRole" VALUES ('sch-2', 'role-1');
        INSERT INTO "User" VALUES ('u1', 'Ada', 'F1', 'N1');
        INSERT INTO "_RoleToUser" VALUES ('role-1', 'u1');
        INSERT INTO "Room" VALUES ('room-1', 'Lab', NULL);
        INSERT INTO "_AccessScheduleToRoom" VALUES ('sch-1', 'room-1');
        INSERT INTO "_AccessScheduleToRoom" VALUES ('sch-2', 'room-1');
        INSERT INTO "DoorAccessSensor" VALUES ('S1', 'room-1');
    "#;

    async fn seeded() -> SqlStore {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        let store = SqlStore::from_database(db).unwrap();
        store.connection().execute_batch(SCHEMA).await.unwrap();
        store
    }

    fn monday(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_grant_picks_lowest_schedule() {
        let store = seeded().await;
        let grant = store
            .find_grant(&GrantQuery::new("S1", "F1", monday(9, 15)))
            .await
            .unwrap()
            .expect("row matches");
        assert_eq!(grant.schedule_id, "sch-1");
        assert_eq!(grant.user_name, "Ada");
        assert_eq!(grant.cache_ttl(), std::time::Duration::from_secs(10 * 3600));
        assert!(grant.room_notification_topic.is_none());
    }

    #[tokio::test]
    async fn test_suspension_blocks_in_sql() {
        let store = seeded().await;
        store
            .connection()
            .execute(
                r#"INSERT INTO "Suspension" VALUES ('susp-1', 'u1', 0, '2026-10-01', '2026-10-31')"#,
                (),
            )
            .await
            .unwrap();

        let result = store
            .find_grant(&GrantQuery::new("S1", "F1", monday(9, 15)))
            .await
            .unwrap();
        assert!(result.is_none());

        let identity = store.find_identity("S1", "F1").await.unwrap().unwrap();
        assert_eq!(identity.user_id, "u1");
        assert_eq!(identity.room_id, "room-1");
    }

    const PAST: &str = r#"INSERT INTO "Suspension" VALUES ('s-past', 'u1', 0, '2026-01-01', '2026-01-31');"#;
    const CURRENT: &str = r#"INSERT INTO "Suspension" VALUES ('s-now', 'u1', 0, '2026-10-01', '2026-10-31');"#;
    const PERMANENT: &str = r#"INSERT INTO "Suspension" VALUES ('s-perm', 'u1', 1, NULL, NULL);"#;
    const OPEN_ENDED: &str = r#"INSERT INTO "Suspension" VALUES ('s-open', 'u1', 0, '2026-10-19', NULL);"#;
    const FUTURE: &str = r#"INSERT INTO "Suspension" VALUES ('s-next', 'u1', 0, '2026-11-01', '2026-11-30');"#;
    const INACTIVE: &str = r#"UPDATE "AccessSchedule" SET active = 0;"#;

    /// Runs the grant query after applying `fixtures` on top of the base schema.
    fn grants(fixtures: &[&str], at: NaiveDateTime) -> bool {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let store = seeded().await;
            for sql in fixtures {
                store.connection().execute_batch(sql).await.unwrap();
            }
            store
                .find_grant(&GrantQuery::new("S1", "F1", at))
                .await
                .unwrap()
                .is_some()
        })
    }

    #[test_case(&[], monday(9, 15) => true ; "no suspension")]
    #[test_case(&[PAST], monday(9, 15) => true ; "expired suspension")]
    #[test_case(&[FUTURE], monday(9, 15) => true ; "future suspension")]
    #[test_case(&[PAST, CURRENT], monday(9, 15) => false ; "expired plus current")]
    #[test_case(&[PAST, PERMANENT], monday(9, 15) => false ; "expired plus permanent")]
    #[test_case(&[OPEN_ENDED], monday(9, 15) => false ; "open ended from today")]
    #[test_case(&[INACTIVE], monday(9, 15) => false ; "inactive schedules")]
    #[test_case(&[], monday(5, 59) => false ; "before earliest window")]
    #[test_case(&[], monday(6, 0) => true ; "window start inclusive")]
    #[test_case(&[], monday(23, 0) => true ; "window end inclusive")]
    #[test_case(&[], monday(23, 1) => false ; "after latest window")]
    #[test_case(&[], monday(12, 0) + chrono::Duration::days(1) => false ; "other weekday")]
    fn test_grant_predicates(fixtures: &[&str], at: NaiveDateTime) -> bool {
        grants(fixtures, at)
    }

    #[tokio::test]
    async fn test_audit_insert() {
        let store = seeded().await;
        let record = AuditRecord::granted(&Subject::new("u1", "room-1"), CredentialType::Nfc);
        store.record(record).await.unwrap();

        let mut rows = store
            .connection()
            .query(r#"SELECT "method", "isGrantedAccess" FROM "UserRoomAccessLog""#, ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(text(&row, 0).unwrap(), "NFC");
        assert!(matches!(row.get_value(1).unwrap(), Value::Integer(1)));
    }
}
