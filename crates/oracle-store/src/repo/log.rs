use chrono::Utc;
use rusqlite::{Connection, params};

use crate::error::Result;
use crate::model::{LogLevel, ProcessingLogEntry, Stage};

pub struct ProcessingLogRepo<'a> {
    conn: &'a Connection,
}

impl<'a> ProcessingLogRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn append(
        &self,
        geo_id: &str,
        pmid: Option<&str>,
        stage: Stage,
        source: Option<&str>,
        level: LogLevel,
        message: &str,
        attempt: Option<i64>,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO processing_log (geo_id, pmid, stage, source, level, message, attempt, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                geo_id,
                pmid,
                stage.as_str(),
                source,
                level.as_str(),
                message,
                attempt,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn list_for_geo(&self, geo_id: &str) -> Result<Vec<ProcessingLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, geo_id, pmid, stage, source, level, message, attempt, timestamp
             FROM processing_log WHERE geo_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![geo_id], Self::map_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ProcessingLogEntry> {
        let stage_str: String = row.get(3)?;
        let level_str: String = row.get(5)?;
        Ok(ProcessingLogEntry {
            id: row.get(0)?,
            geo_id: row.get(1)?,
            pmid: row.get(2)?,
            stage: match stage_str.as_str() {
                "P1" => Stage::P1,
                "P2" => Stage::P2,
                "P3" => Stage::P3,
                _ => Stage::P4,
            },
            source: row.get(4)?,
            level: match level_str.as_str() {
                "error" => LogLevel::Error,
                "warn" => LogLevel::Warn,
                _ => LogLevel::Info,
            },
            message: row.get(6)?,
            attempt: row.get(7)?,
            timestamp: row.get(8)?,
        })
    }
}
