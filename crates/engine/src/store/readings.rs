use super::timestamp::{self, format_timestamp};
use super::{Result, Store};
use crate::models::Reading;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

/// COUNT/MIN/MAX/AVG over one drive's window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowAggregate {
    pub count: i64,
    pub min: i64,
    pub max: i64,
    pub mean: f64,
}

const READING_COLUMNS: &str = "id, hostname, serial, temperature, timestamp";

fn reading_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Reading> {
    Ok(Reading {
        id: row.get(0)?,
        hostname: row.get(1)?,
        serial: row.get(2)?,
        temperature: row.get(3)?,
        timestamp: timestamp::column(row, 4)?,
    })
}

fn since_param(since: Option<DateTime<Utc>>) -> Option<String> {
    since.map(format_timestamp)
}

impl Store {
    /// Append a reading; returns false when an identical
    /// (hostname, serial, timestamp) row already exists
    pub fn insert_reading(
        &self,
        hostname: &str,
        serial: &str,
        temperature: i64,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "INSERT OR IGNORE INTO temperature_readings (hostname, serial, temperature, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![hostname, serial, temperature, format_timestamp(at)],
        )?;
        Ok(changed > 0)
    }

    /// Readings for one drive, oldest first, optionally from `since` onward
    pub fn readings_since(
        &self,
        hostname: &str,
        serial: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Reading>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {READING_COLUMNS} FROM temperature_readings
             WHERE hostname = ?1 AND serial = ?2
               AND (?3 IS NULL OR datetime(timestamp) >= datetime(?3))
             ORDER BY datetime(timestamp) ASC, id ASC"
        ))?;
        let rows = stmt.query_map(
            params![hostname, serial, since_param(since)],
            reading_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Most recent reading ever stored for a drive
    pub fn latest_reading(&self, hostname: &str, serial: &str) -> Result<Option<Reading>> {
        let conn = self.conn()?;
        let reading = conn
            .query_row(
                &format!(
                    "SELECT {READING_COLUMNS} FROM temperature_readings
                     WHERE hostname = ?1 AND serial = ?2
                     ORDER BY datetime(timestamp) DESC, id DESC LIMIT 1"
                ),
                params![hostname, serial],
                reading_from_row,
            )
            .optional()?;
        Ok(reading)
    }

    /// Latest reading of every drive, optionally limited to one host
    pub fn latest_readings(&self, hostname: Option<&str>) -> Result<Vec<Reading>> {
        let conn = self.conn()?;
        // Bare columns of an aggregate query come from the row holding the MAX
        let mut stmt = conn.prepare(&format!(
            "SELECT {READING_COLUMNS}, MAX(datetime(timestamp)) FROM temperature_readings
             WHERE (?1 IS NULL OR hostname = ?1)
             GROUP BY hostname, serial
             ORDER BY hostname, serial"
        ))?;
        let rows = stmt.query_map(params![hostname], reading_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Every (hostname, serial) pair that has any stored reading
    pub fn distinct_drives(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT hostname, serial FROM temperature_readings ORDER BY hostname, serial",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// First pass of the statistics: count, extremes and mean
    pub fn window_aggregate(
        &self,
        hostname: &str,
        serial: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Option<WindowAggregate>> {
        let conn = self.conn()?;
        let aggregate = conn.query_row(
            "SELECT COUNT(*), MIN(temperature), MAX(temperature), AVG(temperature)
             FROM temperature_readings
             WHERE hostname = ?1 AND serial = ?2
               AND (?3 IS NULL OR datetime(timestamp) >= datetime(?3))",
            params![hostname, serial, since_param(since)],
            |row| {
                let count: i64 = row.get(0)?;
                if count == 0 {
                    return Ok(None);
                }
                Ok(Some(WindowAggregate {
                    count,
                    min: row.get(1)?,
                    max: row.get(2)?,
                    mean: row.get(3)?,
                }))
            },
        )?;
        Ok(aggregate)
    }

    /// Delete readings strictly older than `cutoff`
    pub fn delete_readings_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM temperature_readings WHERE datetime(timestamp) < datetime(?1)",
            params![format_timestamp(cutoff)],
        )?;
        Ok(deleted)
    }

    pub fn count_readings(&self) -> Result<i64> {
        let conn = self.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM temperature_readings", [], |row| row.get(0))?)
    }
}

#[cfg(test)]
mod tests {
    use crate::store::test_store;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn test_insert_and_window() {
        let (_dir, store) = test_store();
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        for (i, temp) in [38, 40, 42].iter().enumerate() {
            store
                .insert_reading("nas01", "SN1", *temp, base + Duration::minutes(i as i64 * 10))
                .unwrap();
        }

        let all = store.readings_since("nas01", "SN1", None).unwrap();
        assert_eq!(all.iter().map(|r| r.temperature).collect::<Vec<_>>(), vec![38, 40, 42]);

        let recent = store
            .readings_since("nas01", "SN1", Some(base + Duration::minutes(10)))
            .unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].timestamp, base + Duration::minutes(10));
    }

    #[test]
    fn test_duplicate_reading_ignored() {
        let (_dir, store) = test_store();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert!(store.insert_reading("nas01", "SN1", 40, at).unwrap());
        assert!(!store.insert_reading("nas01", "SN1", 41, at).unwrap());
        assert_eq!(store.count_readings().unwrap(), 1);
    }

    #[test]
    fn test_latest_readings_per_drive() {
        let (_dir, store) = test_store();
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        store.insert_reading("nas01", "SN1", 30, base).unwrap();
        store.insert_reading("nas01", "SN1", 33, base + Duration::minutes(5)).unwrap();
        store.insert_reading("nas01", "SN2", 41, base).unwrap();
        store.insert_reading("nas02", "SN3", 50, base).unwrap();

        let latest = store.latest_readings(None).unwrap();
        assert_eq!(latest.len(), 3);
        assert_eq!(latest[0].serial, "SN1");
        assert_eq!(latest[0].temperature, 33);

        let host_only = store.latest_readings(Some("nas02")).unwrap();
        assert_eq!(host_only.len(), 1);
        assert_eq!(host_only[0].temperature, 50);

        assert_eq!(
            store.latest_reading("nas01", "SN1").unwrap().unwrap().temperature,
            33
        );
        assert_eq!(store.distinct_drives().unwrap().len(), 3);
    }

    #[test]
    fn test_aggregate_empty_window() {
        let (_dir, store) = test_store();
        assert!(store.window_aggregate("nas01", "SN1", None).unwrap().is_none());
    }

    #[test]
    fn test_delete_strictly_older() {
        let (_dir, store) = test_store();
        let cutoff = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        store.insert_reading("nas01", "SN1", 40, cutoff - Duration::days(100)).unwrap();
        store.insert_reading("nas01", "SN1", 41, cutoff).unwrap();
        store.insert_reading("nas01", "SN1", 42, cutoff + Duration::hours(1)).unwrap();

        assert_eq!(store.count_readings().unwrap(), 3);
        assert_eq!(store.delete_readings_before(cutoff).unwrap(), 1);
        assert_eq!(store.count_readings().unwrap(), 2);
    }
}
