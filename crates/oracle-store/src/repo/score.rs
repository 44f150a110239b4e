use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;
use crate::model::{RelevanceScore, ScoreComponents};

pub struct RelevanceScoreRepo<'a> {
    conn: &'a Connection,
}

impl<'a> RelevanceScoreRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn save(
        &self,
        geo_id: &str,
        pmid: &str,
        components: &ScoreComponents,
        total: f64,
        weights_version: &str,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO relevance_score
                (geo_id, pmid, total, content_sim, keyword_match, recency, citation_component, weights_version, computed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                geo_id,
                pmid,
                total,
                components.content_sim,
                components.keyword_match,
                components.recency,
                components.citation_component,
                weights_version,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn find(&self, geo_id: &str, pmid: &str) -> Result<Option<RelevanceScore>> {
        let row = self
            .conn
            .query_row(
                "SELECT geo_id, pmid, total, content_sim, keyword_match, recency, citation_component, weights_version, computed_at
                 FROM relevance_score WHERE geo_id = ?1 AND pmid = ?2",
                params![geo_id, pmid],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<RelevanceScore> {
        Ok(RelevanceScore {
            geo_id: row.get(0)?,
            pmid: row.get(1)?,
            total: row.get(2)?,
            content_sim: row.get(3)?,
            keyword_match: row.get(4)?,
            recency: row.get(5)?,
            citation_component: row.get(6)?,
            weights_version: row.get(7)?,
            computed_at: row.get(8)?,
        })
    }
}
