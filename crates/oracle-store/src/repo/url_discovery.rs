use chrono::Utc;
use rusqlite::{Connection, params};

use crate::error::Result;
use crate::model::{UrlDiscovery, UrlType};

pub struct UrlDiscoveryRepo<'a> {
    conn: &'a Connection,
}

impl<'a> UrlDiscoveryRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Append a candidate. Idempotent on (geo_id, pmid, source, url).
    pub fn add(
        &self,
        geo_id: &str,
        pmid: &str,
        source: &str,
        url: &str,
        url_type: &UrlType,
        priority: i64,
        evidence: Option<&str>,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO url_discovery
                (geo_id, pmid, source, url, url_type, priority, evidence, discovered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                geo_id,
                pmid,
                source,
                url,
                url_type.as_str(),
                priority,
                evidence,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Ordered by `(priority asc, url_type rank)` per §4.4.
    pub fn list_for_paper(&self, geo_id: &str, pmid: &str) -> Result<Vec<UrlDiscovery>> {
        let mut stmt = self.conn.prepare(
            "SELECT geo_id, pmid, source, url, url_type, priority, evidence, discovered_at
             FROM url_discovery WHERE geo_id = ?1 AND pmid = ?2",
        )?;
        let rows = stmt.query_map(params![geo_id, pmid], Self::map_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        out.sort_by_key(|u: &UrlDiscovery| (u.priority, u.url_type.rank()));
        Ok(out)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<UrlDiscovery> {
        let url_type_str: String = row.get(4)?;
        Ok(UrlDiscovery {
            geo_id: row.get(0)?,
            pmid: row.get(1)?,
            source: row.get(2)?,
            url: row.get(3)?,
            url_type: UrlType::parse(&url_type_str).unwrap_or(UrlType::Unknown),
            priority: row.get(5)?,
            evidence: row.get(6)?,
            discovered_at: row.get(7)?,
        })
    }
}
