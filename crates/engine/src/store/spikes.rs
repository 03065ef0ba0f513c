use super::timestamp::{self, format_timestamp};
use super::{expect_changed, Result, Store, StoreError};
use crate::models::{NewSpike, Spike, SpikeDirection};
use chrono::{DateTime, Utc};
use rusqlite::params;
use rusqlite::types::Type;
use serde::{Deserialize, Serialize};

/// Query filter for spike listings; `None` fields match everything
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpikeFilter {
    pub hostname: Option<String>,
    pub serial: Option<String>,
    pub acknowledged: Option<bool>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

const SPIKE_COLUMNS: &str = "id, hostname, serial, start_time, end_time, start_temp, end_temp,
    magnitude, rate_per_minute, direction, acknowledged, created_at";

fn spike_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Spike> {
    let direction: String = row.get(9)?;
    let direction = direction
        .parse::<SpikeDirection>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e)))?;
    Ok(Spike {
        id: row.get(0)?,
        hostname: row.get(1)?,
        serial: row.get(2)?,
        start_time: timestamp::column(row, 3)?,
        end_time: timestamp::column(row, 4)?,
        start_temp: row.get(5)?,
        end_temp: row.get(6)?,
        magnitude: row.get(7)?,
        rate_per_minute: row.get(8)?,
        direction,
        acknowledged: row.get(10)?,
        created_at: timestamp::column(row, 11)?,
    })
}

fn limit_param(limit: Option<usize>) -> i64 {
    // SQLite treats a negative LIMIT as unbounded
    limit.map(|l| l as i64).unwrap_or(-1)
}

impl Store {
    /// True if a spike already covers exactly this drive and time span
    pub fn spike_exists(
        &self,
        hostname: &str,
        serial: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM temperature_spikes
             WHERE hostname = ?1 AND serial = ?2
               AND datetime(start_time) = datetime(?3) AND datetime(end_time) = datetime(?4)",
            params![hostname, serial, format_timestamp(start), format_timestamp(end)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Persist a spike; returns `None` if the span was already recorded
    pub fn insert_spike(&self, spike: &NewSpike, created_at: DateTime<Utc>) -> Result<Option<Spike>> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "INSERT OR IGNORE INTO temperature_spikes (
                hostname, serial, start_time, end_time, start_temp, end_temp,
                magnitude, rate_per_minute, direction, acknowledged, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10)",
            params![
                spike.hostname,
                spike.serial,
                format_timestamp(spike.start_time),
                format_timestamp(spike.end_time),
                spike.start_temp,
                spike.end_temp,
                spike.magnitude,
                spike.rate_per_minute,
                spike.direction.as_str(),
                format_timestamp(created_at),
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        let id = conn.last_insert_rowid();
        let stored = conn.query_row(
            &format!("SELECT {SPIKE_COLUMNS} FROM temperature_spikes WHERE id = ?1"),
            params![id],
            spike_from_row,
        )?;
        Ok(Some(stored))
    }

    /// Spikes matching `filter`, newest first
    pub fn get_spikes(&self, filter: &SpikeFilter) -> Result<Vec<Spike>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SPIKE_COLUMNS} FROM temperature_spikes
             WHERE (?1 IS NULL OR hostname = ?1)
               AND (?2 IS NULL OR serial = ?2)
               AND (?3 IS NULL OR acknowledged = ?3)
               AND (?4 IS NULL OR datetime(start_time) >= datetime(?4))
             ORDER BY datetime(start_time) DESC, id DESC
             LIMIT ?5"
        ))?;
        let rows = stmt.query_map(
            params![
                filter.hostname,
                filter.serial,
                filter.acknowledged,
                filter.since.map(format_timestamp),
                limit_param(filter.limit),
            ],
            spike_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_spike(&self, id: i64) -> Result<Spike> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {SPIKE_COLUMNS} FROM temperature_spikes WHERE id = ?1"),
            params![id],
            spike_from_row,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound { kind: "spike", id },
            other => other.into(),
        })
    }

    pub fn acknowledge_spike(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE temperature_spikes SET acknowledged = 1 WHERE id = ?1",
            params![id],
        )?;
        expect_changed(changed, "spike", id)
    }

    pub fn delete_spike(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM temperature_spikes WHERE id = ?1", params![id])?;
        expect_changed(changed, "spike", id)
    }

    pub fn count_unacknowledged_spikes(&self) -> Result<i64> {
        let conn = self.conn()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM temperature_spikes WHERE acknowledged = 0",
            [],
            |row| row.get(0),
        )?)
    }

    /// Delete spikes recorded strictly before `cutoff`
    pub fn delete_spikes_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM temperature_spikes WHERE datetime(created_at) < datetime(?1)",
            params![format_timestamp(cutoff)],
        )?;
        Ok(deleted)
    }
}
