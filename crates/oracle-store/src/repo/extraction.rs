use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;
use crate::model::{ContentExtraction, ExtractionData, ExtractionGrade};

pub struct ContentExtractionRepo<'a> {
    conn: &'a Connection,
}

impl<'a> ContentExtractionRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// `word_count` is auto-computed from `full_text` when absent from `data`.
    pub fn save(&self, geo_id: &str, pmid: &str, data: &ExtractionData) -> Result<()> {
        let word_count = data
            .word_count
            .unwrap_or_else(|| data.full_text.split_whitespace().count() as i64);
        let grade = ExtractionGrade::from_quality(data.extraction_quality);
        self.conn.execute(
            "INSERT OR REPLACE INTO content_extraction
                (geo_id, pmid, full_text, abstract_text, methods, results, discussion,
                 sections_json, tables_json, references_json, word_count,
                 extraction_method, extraction_quality, extraction_grade, extracted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                geo_id,
                pmid,
                data.full_text,
                data.abstract_text,
                data.methods,
                data.results,
                data.discussion,
                data.sections_json,
                data.tables_json,
                data.references_json,
                word_count,
                data.extraction_method,
                data.extraction_quality,
                grade.as_str(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn find(&self, geo_id: &str, pmid: &str) -> Result<Option<ContentExtraction>> {
        let row = self
            .conn
            .query_row(
                "SELECT geo_id, pmid, full_text, abstract_text, methods, results, discussion,
                        sections_json, tables_json, references_json, word_count,
                        extraction_method, extraction_quality, extraction_grade, extracted_at
                 FROM content_extraction WHERE geo_id = ?1 AND pmid = ?2",
                params![geo_id, pmid],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ContentExtraction> {
        let grade_str: String = row.get(13)?;
        Ok(ContentExtraction {
            geo_id: row.get(0)?,
            pmid: row.get(1)?,
            full_text: row.get(2)?,
            abstract_text: row.get(3)?,
            methods: row.get(4)?,
            results: row.get(5)?,
            discussion: row.get(6)?,
            sections_json: row.get(7)?,
            tables_json: row.get(8)?,
            references_json: row.get(9)?,
            word_count: row.get(10)?,
            extraction_method: row.get(11)?,
            extraction_quality: row.get(12)?,
            extraction_grade: match grade_str.as_str() {
                "A" => ExtractionGrade::A,
                "B" => ExtractionGrade::B,
                "C" => ExtractionGrade::C,
                "D" => ExtractionGrade::D,
                _ => ExtractionGrade::F,
            },
            extracted_at: row.get(14)?,
        })
    }
}
