use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;
use crate::model::{PaperType, UniversalIdentifier};

pub struct UniversalIdentifierRepo<'a> {
    conn: &'a Connection,
}

impl<'a> UniversalIdentifierRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert or update. Sets `first_discovered_at` on insert, always bumps
    /// `last_updated_at`.
    pub fn upsert(
        &self,
        geo_id: &str,
        pmid: &str,
        pmcid: Option<&str>,
        doi: Option<&str>,
        title: &str,
        paper_type: PaperType,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let existing = self.find(geo_id, pmid)?;
        match existing {
            Some(row) => {
                self.conn.execute(
                    "UPDATE universal_identifier
                     SET pmcid = COALESCE(?3, pmcid),
                         doi = COALESCE(?4, doi),
                         title = ?5,
                         last_updated_at = ?6,
                         paper_type = ?7
                     WHERE geo_id = ?1 AND pmid = ?2",
                    params![geo_id, pmid, pmcid, doi, title, now, paper_type.as_str()],
                )?;
                let _ = row;
            }
            None => {
                self.conn.execute(
                    "INSERT INTO universal_identifier
                        (geo_id, pmid, pmcid, doi, title, first_discovered_at, last_updated_at, paper_type)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, ?7)",
                    params![geo_id, pmid, pmcid, doi, title, now, paper_type.as_str()],
                )?;
            }
        }
        Ok(())
    }

    pub fn find(&self, geo_id: &str, pmid: &str) -> Result<Option<UniversalIdentifier>> {
        let row = self
            .conn
            .query_row(
                "SELECT geo_id, pmid, pmcid, doi, title, first_discovered_at, last_updated_at, paper_type
                 FROM universal_identifier WHERE geo_id = ?1 AND pmid = ?2",
                params![geo_id, pmid],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn list_for_geo(&self, geo_id: &str) -> Result<Vec<UniversalIdentifier>> {
        let mut stmt = self.conn.prepare(
            "SELECT geo_id, pmid, pmcid, doi, title, first_discovered_at, last_updated_at, paper_type
             FROM universal_identifier WHERE geo_id = ?1",
        )?;
        let rows = stmt.query_map(params![geo_id], Self::map_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn find_by_pmid(&self, pmid: &str) -> Result<Vec<UniversalIdentifier>> {
        let mut stmt = self.conn.prepare(
            "SELECT geo_id, pmid, pmcid, doi, title, first_discovered_at, last_updated_at, paper_type
             FROM universal_identifier WHERE pmid = ?1",
        )?;
        let rows = stmt.query_map(params![pmid], Self::map_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<UniversalIdentifier> {
        let paper_type_str: String = row.get(7)?;
        Ok(UniversalIdentifier {
            geo_id: row.get(0)?,
            pmid: row.get(1)?,
            pmcid: row.get(2)?,
            doi: row.get(3)?,
            title: row.get(4)?,
            first_discovered_at: row.get(5)?,
            last_updated_at: row.get(6)?,
            paper_type: PaperType::parse(&paper_type_str).unwrap_or(PaperType::Related),
        })
    }
}
