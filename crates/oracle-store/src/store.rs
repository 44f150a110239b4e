use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::connection::ConnectionPool;
use crate::error::{Result, StoreError};
use crate::migrations::run_migrations;
use crate::model::{
    ContentExtraction, ContentType, ExtractionData, GeoData, LogLevel, PaperRecord,
    PaperType, PdfArtifact, RelevanceScore, ScoreComponents, Stage, UniversalIdentifier,
    UrlDiscovery, UrlType,
};
use crate::repo::{
    ContentExtractionRepo, PdfArtifactRepo, ProcessingLogRepo, RelevanceScoreRepo,
    UniversalIdentifierRepo, UrlDiscoveryRepo,
};

/// The unified GEO-centric store: one SQLite database plus the per-GEO
/// filesystem tree under `store_root/{geo_id}/pdfs/`.
///
/// Every public method here corresponds to one operation named in §4.1 of the
/// spec. Callers (the four pipeline stages and the coordinator) never touch
/// `rusqlite` directly.
pub struct Store {
    pool: ConnectionPool,
    root: PathBuf,
}

impl Store {
    /// Open (creating if absent) the database at `root/db.sqlite` and ensure
    /// the migrations have run.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let pool = ConnectionPool::open(&root.join("db.sqlite"))?;
        pool.with_conn(|conn| run_migrations(conn))?;
        Ok(Self { pool, root })
    }

    /// An in-memory store for tests. `root` still governs where artifact
    /// files are written, since SQLite-in-memory has no filesystem tree of
    /// its own.
    pub fn open_in_memory(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let pool = ConnectionPool::open_in_memory()?;
        pool.with_conn(|conn| run_migrations(conn))?;
        Ok(Self { pool, root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Exposes a read-only handle for analytics (§4.1 `get_connection`).
    pub fn get_connection(&self) -> &ConnectionPool {
        &self.pool
    }

    fn geo_dir(&self, geo_id: &str) -> PathBuf {
        self.root.join(geo_id)
    }

    fn pdfs_dir(&self, geo_id: &str) -> PathBuf {
        self.geo_dir(geo_id).join("pdfs")
    }

    pub fn upsert_identifier(
        &self,
        geo_id: &str,
        pmid: &str,
        pmcid: Option<&str>,
        doi: Option<&str>,
        title: &str,
        paper_type: PaperType,
    ) -> Result<()> {
        self.pool.with_conn(|conn| {
            UniversalIdentifierRepo::new(conn).upsert(geo_id, pmid, pmcid, doi, title, paper_type)
        })?;
        self.write_metadata(geo_id)
    }

    pub fn find_identifier(&self, geo_id: &str, pmid: &str) -> Result<Option<UniversalIdentifier>> {
        self.pool
            .with_conn(|conn| UniversalIdentifierRepo::new(conn).find(geo_id, pmid))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_url(
        &self,
        geo_id: &str,
        pmid: &str,
        source: &str,
        url: &str,
        url_type: UrlType,
        priority: i64,
        evidence: Option<&str>,
    ) -> Result<()> {
        self.pool.with_conn(|conn| {
            UrlDiscoveryRepo::new(conn).add(geo_id, pmid, source, url, &url_type, priority, evidence)
        })
    }

    pub fn list_urls(&self, geo_id: &str, pmid: &str) -> Result<Vec<UrlDiscovery>> {
        self.pool
            .with_conn(|conn| UrlDiscoveryRepo::new(conn).list_for_paper(geo_id, pmid))
    }

    /// Saves an artifact under `store_root/{geo_id}/pdfs/PMID_{pmid}.{ext}`.
    ///
    /// The file is written *before* the DB row per §4.1's crash-safety
    /// guarantee. If a row already exists anywhere with the same SHA-256, the
    /// new row's path is rewritten to point at that existing file and no
    /// second copy is written (`deduped = true`).
    pub fn save_artifact(
        &self,
        geo_id: &str,
        pmid: &str,
        bytes: &[u8],
        content_type: ContentType,
        source_used: &str,
    ) -> Result<(PathBuf, String, bool)> {
        let hash = sha256_hex(bytes);

        let existing = self
            .pool
            .with_conn(|conn| PdfArtifactRepo::new(conn).find_by_hash(&hash))?;

        let (path, deduped) = if let Some(existing) = existing {
            (PathBuf::from(&existing.pdf_path), true)
        } else {
            let dir = self.pdfs_dir(geo_id);
            std::fs::create_dir_all(&dir)?;
            let filename = format!("PMID_{pmid}.{}", content_type.extension());
            let path = dir.join(&filename);
            std::fs::write(&path, bytes)?;
            (path, false)
        };

        self.pool.with_conn(|conn| {
            PdfArtifactRepo::new(conn).save(
                geo_id,
                pmid,
                &path.to_string_lossy(),
                &hash,
                bytes.len() as i64,
                source_used,
                content_type,
            )
        })?;
        self.write_metadata(geo_id)?;
        Ok((path, hash, deduped))
    }

    pub fn find_artifact(&self, geo_id: &str, pmid: &str) -> Result<Option<PdfArtifact>> {
        self.pool
            .with_conn(|conn| PdfArtifactRepo::new(conn).find(geo_id, pmid))
    }

    /// Re-reads the artifact bytes from disk and verifies the stored SHA-256
    /// still matches — used by `validate --geo` and by §8's readback
    /// invariant.
    pub fn verify_artifact(&self, geo_id: &str, pmid: &str) -> Result<()> {
        let Some(artifact) = self.find_artifact(geo_id, pmid)? else {
            return Err(StoreError::NotFound(format!("{geo_id}/{pmid} has no artifact")));
        };
        let bytes = std::fs::read(&artifact.pdf_path)?;
        let actual = sha256_hex(&bytes);
        if actual != artifact.pdf_hash_sha256 {
            return Err(StoreError::ChecksumMismatch {
                geo_id: geo_id.to_string(),
                pmid: pmid.to_string(),
                expected: artifact.pdf_hash_sha256,
                found: actual,
            });
        }
        Ok(())
    }

    pub fn save_extraction(&self, geo_id: &str, pmid: &str, data: &ExtractionData) -> Result<()> {
        self.pool
            .with_conn(|conn| ContentExtractionRepo::new(conn).save(geo_id, pmid, data))
    }

    pub fn find_extraction(&self, geo_id: &str, pmid: &str) -> Result<Option<ContentExtraction>> {
        self.pool
            .with_conn(|conn| ContentExtractionRepo::new(conn).find(geo_id, pmid))
    }

    pub fn save_score(
        &self,
        geo_id: &str,
        pmid: &str,
        components: &ScoreComponents,
        total: f64,
        weights_version: &str,
    ) -> Result<()> {
        self.pool.with_conn(|conn| {
            RelevanceScoreRepo::new(conn).save(geo_id, pmid, components, total, weights_version)
        })
    }

    pub fn find_score(&self, geo_id: &str, pmid: &str) -> Result<Option<RelevanceScore>> {
        self.pool
            .with_conn(|conn| RelevanceScoreRepo::new(conn).find(geo_id, pmid))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn log(
        &self,
        stage: Stage,
        geo_id: &str,
        pmid: Option<&str>,
        level: LogLevel,
        message: &str,
        attempt: Option<i64>,
        source: Option<&str>,
    ) -> Result<()> {
        match level {
            LogLevel::Error => tracing::error!(geo_id, pmid, stage = stage.as_str(), source, message),
            LogLevel::Warn => tracing::warn!(geo_id, pmid, stage = stage.as_str(), source, message),
            LogLevel::Info => tracing::info!(geo_id, pmid, stage = stage.as_str(), source, message),
        }
        self.pool.with_conn(|conn| {
            ProcessingLogRepo::new(conn).append(geo_id, pmid, stage, source, level, message, attempt)
        })
    }

    /// Returns the GEO row with all related papers and their URLs, artifact
    /// paths, extractions, and scores (§4.1 `get_complete_geo_data`).
    pub fn get_complete_geo_data(&self, geo_id: &str) -> Result<GeoData> {
        let identifiers = self
            .pool
            .with_conn(|conn| UniversalIdentifierRepo::new(conn).list_for_geo(geo_id))?;

        let mut papers = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            let pmid = identifier.pmid.clone();
            let urls = self.list_urls(geo_id, &pmid)?;
            let artifact = self.find_artifact(geo_id, &pmid)?;
            let extraction = self.find_extraction(geo_id, &pmid)?;
            let score = self.find_score(geo_id, &pmid)?;
            papers.push(PaperRecord {
                identifier,
                urls,
                artifact,
                extraction,
                score,
            });
        }
        Ok(GeoData {
            geo_id: geo_id.to_string(),
            papers,
        })
    }

    pub fn query_by_pmid(&self, pmid: &str) -> Result<Vec<UniversalIdentifier>> {
        self.pool
            .with_conn(|conn| UniversalIdentifierRepo::new(conn).find_by_pmid(pmid))
    }

    /// `(geo_id, pmid)` pairs that have reached `stage - 1` but not `stage`,
    /// used to implement `--resume` and `reprocess --stage`.
    pub fn query_missing_stage(&self, geo_id: &str, stage: Stage) -> Result<Vec<String>> {
        self.pool.with_conn(|conn| match stage {
            Stage::P1 => Ok(Vec::new()),
            Stage::P2 => {
                let mut stmt = conn.prepare(
                    "SELECT ui.pmid FROM universal_identifier ui
                     LEFT JOIN url_discovery ud ON ud.geo_id = ui.geo_id AND ud.pmid = ui.pmid
                     WHERE ui.geo_id = ?1 AND ud.pmid IS NULL",
                )?;
                let rows = stmt.query_map(rusqlite::params![geo_id], |row| row.get::<_, String>(0))?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            }
            Stage::P3 => PdfArtifactRepo::new(conn).list_missing_for_geo(geo_id),
            Stage::P4 => {
                let mut stmt = conn.prepare(
                    "SELECT pa.pmid FROM pdf_artifact pa
                     LEFT JOIN content_extraction ce ON ce.geo_id = pa.geo_id AND ce.pmid = pa.pmid
                     WHERE pa.geo_id = ?1 AND ce.pmid IS NULL",
                )?;
                let rows = stmt.query_map(rusqlite::params![geo_id], |row| row.get::<_, String>(0))?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            }
        })
    }

    /// Materializes `store_root/{geo_id}/metadata.json` from the current DB
    /// state. Called after every write that touches a GEO's rows.
    fn write_metadata(&self, geo_id: &str) -> Result<()> {
        let data = self.get_complete_geo_data(geo_id)?;
        let dir = self.geo_dir(geo_id);
        std::fs::create_dir_all(&dir)?;
        let json = serde_json::to_vec_pretty(&data)?;
        std::fs::write(dir.join("metadata.json"), json)?;
        Ok(())
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
