use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;
use crate::model::{ContentType, PdfArtifact};

pub struct PdfArtifactRepo<'a> {
    conn: &'a Connection,
}

impl<'a> PdfArtifactRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn save(
        &self,
        geo_id: &str,
        pmid: &str,
        pdf_path: &str,
        pdf_hash_sha256: &str,
        pdf_size_bytes: i64,
        source_used: &str,
        content_type: ContentType,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO pdf_artifact
                (geo_id, pmid, pdf_path, pdf_hash_sha256, pdf_size_bytes, source_used, downloaded_at, content_type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                geo_id,
                pmid,
                pdf_path,
                pdf_hash_sha256,
                pdf_size_bytes,
                source_used,
                Utc::now().to_rfc3339(),
                content_type.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn find(&self, geo_id: &str, pmid: &str) -> Result<Option<PdfArtifact>> {
        let row = self
            .conn
            .query_row(
                "SELECT geo_id, pmid, pdf_path, pdf_hash_sha256, pdf_size_bytes, source_used, downloaded_at, content_type
                 FROM pdf_artifact WHERE geo_id = ?1 AND pmid = ?2",
                params![geo_id, pmid],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Find any existing artifact (for any paper) with this hash, used to
    /// implement content-addressed dedup in `Store::save_artifact`.
    pub fn find_by_hash(&self, hash: &str) -> Result<Option<PdfArtifact>> {
        let row = self
            .conn
            .query_row(
                "SELECT geo_id, pmid, pdf_path, pdf_hash_sha256, pdf_size_bytes, source_used, downloaded_at, content_type
                 FROM pdf_artifact WHERE pdf_hash_sha256 = ?1 LIMIT 1",
                params![hash],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn list_missing_for_geo(&self, geo_id: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT ui.pmid FROM universal_identifier ui
             LEFT JOIN pdf_artifact pa ON pa.geo_id = ui.geo_id AND pa.pmid = ui.pmid
             WHERE ui.geo_id = ?1 AND pa.pmid IS NULL",
        )?;
        let rows = stmt.query_map(params![geo_id], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<PdfArtifact> {
        let content_type_str: String = row.get(7)?;
        Ok(PdfArtifact {
            geo_id: row.get(0)?,
            pmid: row.get(1)?,
            pdf_path: row.get(2)?,
            pdf_hash_sha256: row.get(3)?,
            pdf_size_bytes: row.get(4)?,
            source_used: row.get(5)?,
            downloaded_at: row.get(6)?,
            content_type: ContentType::parse(&content_type_str).unwrap_or(ContentType::Pdf),
        })
    }
}
