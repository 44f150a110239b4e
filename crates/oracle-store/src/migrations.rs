use chrono::Utc;
use rusqlite::Connection;

use crate::error::Result;

pub trait Migration {
    fn version(&self) -> u32;
    fn description(&self) -> &'static str;
    fn up(&self, conn: &Connection) -> Result<()>;
}

struct V1Initial;

impl Migration for V1Initial {
    fn version(&self) -> u32 {
        1
    }

    fn description(&self) -> &'static str {
        "universal_identifier, url_discovery, pdf_artifact, content_extraction, processing_log, relevance_score"
    }

    fn up(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version     INTEGER PRIMARY KEY,
                applied_at  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS universal_identifier (
                geo_id              TEXT NOT NULL,
                pmid                TEXT NOT NULL,
                pmcid               TEXT,
                doi                 TEXT,
                title               TEXT NOT NULL,
                first_discovered_at TEXT NOT NULL,
                last_updated_at     TEXT NOT NULL,
                paper_type          TEXT NOT NULL CHECK (paper_type IN ('seed', 'citing', 'related')),
                PRIMARY KEY (geo_id, pmid)
            );

            -- Full (non-partial) unique index: (geo_id, pmid) joins must resolve
            -- for every row regardless of nullability of other columns.
            CREATE UNIQUE INDEX IF NOT EXISTS idx_universal_identifier_key
                ON universal_identifier (geo_id, pmid);

            CREATE TABLE IF NOT EXISTS url_discovery (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                geo_id          TEXT NOT NULL,
                pmid            TEXT NOT NULL,
                source          TEXT NOT NULL,
                url             TEXT NOT NULL,
                url_type        TEXT NOT NULL CHECK (url_type IN
                    ('pdf_direct', 'landing_page', 'html_fulltext', 'doi_resolver', 'unknown')),
                priority        INTEGER NOT NULL,
                evidence        TEXT,
                discovered_at   TEXT NOT NULL,
                UNIQUE (geo_id, pmid, source, url),
                FOREIGN KEY (geo_id, pmid) REFERENCES universal_identifier (geo_id, pmid)
            );

            CREATE INDEX IF NOT EXISTS idx_url_discovery_paper ON url_discovery (geo_id, pmid);

            CREATE TABLE IF NOT EXISTS pdf_artifact (
                geo_id          TEXT NOT NULL,
                pmid            TEXT NOT NULL,
                pdf_path        TEXT NOT NULL,
                pdf_hash_sha256 TEXT NOT NULL,
                pdf_size_bytes  INTEGER NOT NULL,
                source_used     TEXT NOT NULL,
                downloaded_at   TEXT NOT NULL,
                content_type    TEXT NOT NULL CHECK (content_type IN ('pdf', 'html')),
                PRIMARY KEY (geo_id, pmid),
                FOREIGN KEY (geo_id, pmid) REFERENCES universal_identifier (geo_id, pmid)
            );

            CREATE INDEX IF NOT EXISTS idx_pdf_artifact_hash ON pdf_artifact (pdf_hash_sha256);

            CREATE TABLE IF NOT EXISTS content_extraction (
                geo_id              TEXT NOT NULL,
                pmid                TEXT NOT NULL,
                full_text           TEXT NOT NULL,
                abstract_text       TEXT,
                methods             TEXT,
                results             TEXT,
                discussion          TEXT,
                sections_json       TEXT,
                tables_json         TEXT,
                references_json     TEXT,
                word_count          INTEGER NOT NULL,
                extraction_method   TEXT NOT NULL,
                extraction_quality  REAL NOT NULL,
                extraction_grade    TEXT NOT NULL CHECK (extraction_grade IN ('A', 'B', 'C', 'D', 'F')),
                extracted_at        TEXT NOT NULL,
                PRIMARY KEY (geo_id, pmid),
                FOREIGN KEY (geo_id, pmid) REFERENCES universal_identifier (geo_id, pmid)
            );

            CREATE TABLE IF NOT EXISTS processing_log (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                geo_id      TEXT NOT NULL,
                pmid        TEXT,
                stage       TEXT NOT NULL CHECK (stage IN ('P1', 'P2', 'P3', 'P4')),
                source      TEXT,
                level       TEXT NOT NULL CHECK (level IN ('info', 'warn', 'error')),
                message     TEXT NOT NULL,
                attempt     INTEGER,
                timestamp   TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_processing_log_geo ON processing_log (geo_id);

            CREATE TABLE IF NOT EXISTS relevance_score (
                geo_id              TEXT NOT NULL,
                pmid                TEXT NOT NULL,
                total               REAL NOT NULL,
                content_sim         REAL NOT NULL,
                keyword_match       REAL NOT NULL,
                recency             REAL NOT NULL,
                citation_component  REAL NOT NULL,
                weights_version     TEXT NOT NULL,
                computed_at         TEXT NOT NULL,
                PRIMARY KEY (geo_id, pmid),
                FOREIGN KEY (geo_id, pmid) REFERENCES universal_identifier (geo_id, pmid)
            );
            "#,
        )?;
        Ok(())
    }
}

fn record_migration(conn: &Connection, version: u32) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![version, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

fn is_migration_applied(conn: &Connection, version: u32) -> Result<bool> {
    let has_table: bool = conn
        .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name='schema_migrations'")?
        .exists([])?;
    if !has_table {
        return Ok(false);
    }
    let applied: bool = conn
        .prepare("SELECT 1 FROM schema_migrations WHERE version = ?1")?
        .exists(rusqlite::params![version])?;
    Ok(applied)
}

pub fn run_migrations(conn: &Connection) -> Result<()> {
    let migrations: Vec<Box<dyn Migration>> = vec![Box::new(V1Initial)];

    for migration in migrations {
        if !is_migration_applied(conn, migration.version())? {
            tracing::info!(version = migration.version(), desc = migration.description(), "applying migration");
            migration.up(conn)?;
            record_migration(conn, migration.version())?;
        }
    }
    Ok(())
}
