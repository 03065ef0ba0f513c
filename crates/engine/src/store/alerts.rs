use super::timestamp::{self, format_timestamp};
use super::{expect_changed, Result, Store, StoreError};
use crate::models::{Alert, AlertType, NewAlert};
use chrono::{DateTime, Duration, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

/// Query filter for alert listings; `None` fields match everything
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertFilter {
    pub hostname: Option<String>,
    pub serial: Option<String>,
    pub alert_type: Option<AlertType>,
    pub acknowledged: Option<bool>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Counts over the alert table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSummary {
    pub total: i64,
    pub unacknowledged: i64,
    pub warning: i64,
    pub critical: i64,
    pub spike: i64,
    pub recovery: i64,
    pub last_24h: i64,
}

const ALERT_COLUMNS: &str = "id, hostname, serial, alert_type, temperature, threshold, message,
    acknowledged, acknowledged_by, acknowledged_at, created_at";

fn alert_type_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<AlertType> {
    let raw: String = row.get(idx)?;
    raw.parse::<AlertType>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn alert_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Alert> {
    Ok(Alert {
        id: row.get(0)?,
        hostname: row.get(1)?,
        serial: row.get(2)?,
        alert_type: alert_type_column(row, 3)?,
        temperature: row.get(4)?,
        threshold: row.get(5)?,
        message: row.get(6)?,
        acknowledged: row.get(7)?,
        acknowledged_by: row.get(8)?,
        acknowledged_at: timestamp::optional_column(row, 9)?,
        created_at: timestamp::column(row, 10)?,
    })
}

impl Store {
    pub fn insert_alert(&self, alert: &NewAlert) -> Result<Alert> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO temperature_alerts (
                hostname, serial, alert_type, temperature, threshold, message,
                acknowledged, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
            params![
                alert.hostname,
                alert.serial,
                alert.alert_type.as_str(),
                alert.temperature,
                alert.threshold,
                alert.message,
                format_timestamp(alert.created_at),
            ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(conn.query_row(
            &format!("SELECT {ALERT_COLUMNS} FROM temperature_alerts WHERE id = ?1"),
            params![id],
            alert_from_row,
        )?)
    }

    /// Alerts matching `filter`, newest first
    pub fn get_alerts(&self, filter: &AlertFilter) -> Result<Vec<Alert>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ALERT_COLUMNS} FROM temperature_alerts
             WHERE (?1 IS NULL OR hostname = ?1)
               AND (?2 IS NULL OR serial = ?2)
               AND (?3 IS NULL OR alert_type = ?3)
               AND (?4 IS NULL OR acknowledged = ?4)
               AND (?5 IS NULL OR datetime(created_at) >= datetime(?5))
             ORDER BY datetime(created_at) DESC, id DESC
             LIMIT ?6"
        ))?;
        let rows = stmt.query_map(
            params![
                filter.hostname,
                filter.serial,
                filter.alert_type.map(|t| t.as_str()),
                filter.acknowledged,
                filter.since.map(format_timestamp),
                filter.limit.map(|l| l as i64).unwrap_or(-1),
            ],
            alert_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_alert(&self, id: i64) -> Result<Alert> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {ALERT_COLUMNS} FROM temperature_alerts WHERE id = ?1"),
            params![id],
            alert_from_row,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound { kind: "alert", id },
            other => other.into(),
        })
    }

    /// Mark an alert acknowledged; an already acknowledged alert keeps its
    /// original acknowledger and time
    pub fn acknowledge_alert(&self, id: i64, by: &str, at: DateTime<Utc>) -> Result<Alert> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE temperature_alerts
             SET acknowledged = 1, acknowledged_by = ?2, acknowledged_at = ?3
             WHERE id = ?1 AND acknowledged = 0",
            params![id, by, format_timestamp(at)],
        )?;
        self.get_alert(id)
    }

    pub fn delete_alert(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM temperature_alerts WHERE id = ?1", params![id])?;
        expect_changed(changed, "alert", id)
    }

    /// Newest unacknowledged warning or critical alert raised after the
    /// drive's latest recovery; spike alerts are not state changes
    pub fn active_alert_since_recovery(
        &self,
        hostname: &str,
        serial: &str,
    ) -> Result<Option<Alert>> {
        let conn = self.conn()?;
        let active = conn
            .query_row(
                &format!(
                    "WITH last_recovery AS (
                         SELECT datetime(created_at) AS at, id FROM temperature_alerts
                         WHERE hostname = ?1 AND serial = ?2 AND alert_type = 'recovery'
                         ORDER BY datetime(created_at) DESC, id DESC LIMIT 1
                     )
                     SELECT {ALERT_COLUMNS} FROM temperature_alerts a
                     WHERE a.hostname = ?1 AND a.serial = ?2
                       AND a.alert_type IN ('warning', 'critical')
                       AND a.acknowledged = 0
                       AND NOT EXISTS (
                           SELECT 1 FROM last_recovery r
                           WHERE (r.at, r.id) >= (datetime(a.created_at), a.id)
                       )
                     ORDER BY datetime(a.created_at) DESC, a.id DESC LIMIT 1"
                ),
                params![hostname, serial],
                alert_from_row,
            )
            .optional()?;
        Ok(active)
    }

    pub fn alert_summary(&self, now: DateTime<Utc>) -> Result<AlertSummary> {
        let conn = self.conn()?;
        let day_ago = format_timestamp(now - Duration::hours(24));
        let summary = conn.query_row(
            "SELECT
                COUNT(*),
                COALESCE(SUM(acknowledged = 0), 0),
                COALESCE(SUM(alert_type = 'warning'), 0),
                COALESCE(SUM(alert_type = 'critical'), 0),
                COALESCE(SUM(alert_type = 'spike'), 0),
                COALESCE(SUM(alert_type = 'recovery'), 0),
                COALESCE(SUM(datetime(created_at) >= datetime(?1)), 0)
             FROM temperature_alerts",
            params![day_ago],
            |row| {
                Ok(AlertSummary {
                    total: row.get(0)?,
                    unacknowledged: row.get(1)?,
                    warning: row.get(2)?,
                    critical: row.get(3)?,
                    spike: row.get(4)?,
                    recovery: row.get(5)?,
                    last_24h: row.get(6)?,
                })
            },
        )?;
        Ok(summary)
    }

    /// Delete alerts created strictly before `cutoff`
    pub fn delete_alerts_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM temperature_alerts WHERE datetime(created_at) < datetime(?1)",
            params![format_timestamp(cutoff)],
        )?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_store;
    use chrono::TimeZone;

    fn new_alert(alert_type: AlertType, created_at: DateTime<Utc>) -> NewAlert {
        NewAlert {
            hostname: "nas01".to_string(),
            serial: "SN1".to_string(),
            alert_type,
            temperature: 56,
            threshold: 55,
            message: "hot".to_string(),
            created_at,
        }
    }

    #[test]
    fn test_acknowledge_once() {
        let (_dir, store) = test_store();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let alert = store.insert_alert(&new_alert(AlertType::Critical, at)).unwrap();
        assert!(!alert.acknowledged);

        let acked = store.acknowledge_alert(alert.id, "alice", at).unwrap();
        assert!(acked.acknowledged);
        assert_eq!(acked.acknowledged_by.as_deref(), Some("alice"));
        assert_eq!(acked.acknowledged_at, Some(at));

        let again = store
            .acknowledge_alert(alert.id, "bob", at + Duration::hours(1))
            .unwrap();
        assert_eq!(again.acknowledged_by.as_deref(), Some("alice"));
        assert_eq!(again.acknowledged_at, Some(at));

        assert!(store.acknowledge_alert(9999, "bob", at).unwrap_err().is_not_found());
    }

    #[test]
    fn test_active_alert_since_recovery() {
        let (_dir, store) = test_store();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let active = |store: &Store| store.active_alert_since_recovery("nas01", "SN1").unwrap();
        assert!(active(&store).is_none());

        let warning = store.insert_alert(&new_alert(AlertType::Warning, at)).unwrap();
        store
            .insert_alert(&new_alert(AlertType::Spike, at + Duration::minutes(1)))
            .unwrap();
        let critical = store
            .insert_alert(&new_alert(AlertType::Critical, at + Duration::minutes(2)))
            .unwrap();
        assert_eq!(active(&store).unwrap().id, critical.id);

        // An acknowledged newer alert does not hide the older open one
        store.acknowledge_alert(critical.id, "ops", at).unwrap();
        assert_eq!(active(&store).unwrap().id, warning.id);

        store
            .insert_alert(&new_alert(AlertType::Recovery, at + Duration::minutes(3)))
            .unwrap();
        assert!(active(&store).is_none());

        // Same second as the recovery, inserted later
        let fresh = store
            .insert_alert(&new_alert(AlertType::Warning, at + Duration::minutes(3)))
            .unwrap();
        assert_eq!(active(&store).unwrap().id, fresh.id);
    }

    #[test]
    fn test_summary_and_filter() {
        let (_dir, store) = test_store();
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
        store
            .insert_alert(&new_alert(AlertType::Warning, now - Duration::days(3)))
            .unwrap();
        let critical = store
            .insert_alert(&new_alert(AlertType::Critical, now - Duration::hours(1)))
            .unwrap();
        store.insert_alert(&new_alert(AlertType::Spike, now)).unwrap();
        store.acknowledge_alert(critical.id, "ops", now).unwrap();

        let summary = store.alert_summary(now).unwrap();
        assert_eq!(
            summary,
            AlertSummary {
                total: 3,
                unacknowledged: 2,
                warning: 1,
                critical: 1,
                spike: 1,
                recovery: 0,
                last_24h: 2,
            }
        );

        let filter = AlertFilter {
            alert_type: Some(AlertType::Critical),
            ..Default::default()
        };
        let alerts = store.get_alerts(&filter).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, critical.id);

        let filter = AlertFilter {
            acknowledged: Some(false),
            since: Some(now - Duration::days(1)),
            ..Default::default()
        };
        let alerts = store.get_alerts(&filter).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::Spike);
    }

    #[test]
    fn test_empty_summary() {
        let (_dir, store) = test_store();
        assert_eq!(store.alert_summary(Utc::now()).unwrap(), AlertSummary::default());
    }

    #[test]
    fn test_delete() {
        let (_dir, store) = test_store();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let alert = store.insert_alert(&new_alert(AlertType::Warning, at)).unwrap();
        store.delete_alert(alert.id).unwrap();
        assert!(store.get_alert(alert.id).unwrap_err().is_not_found());
        assert!(store.delete_alert(alert.id).unwrap_err().is_not_found());
    }
}
