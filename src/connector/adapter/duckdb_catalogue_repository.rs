use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, AccessMode, Config, Connection, Row};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::application::CatalogueRepository;
use crate::domain::{ClassifyError, CodeRecord, CodeSummary};

const TABLE: &str = "anzsic_codes";
/// Name DuckDB assigns to the FTS index schema built over [`TABLE`].
const FTS_SCHEMA: &str = "fts_main_anzsic_codes";

/// Catalogue store on a DuckDB file populated offline: one row per code
/// with the taxonomy text columns, a fixed-dimension embedding column
/// under an HNSW index, and an FTS index over the searchable text.
///
/// The connection is single and mutex-guarded; concurrent callers
/// serialize on it. Open read-only for the query path so multiple
/// processes can share the file.
pub struct DuckdbCatalogueRepository {
    conn: Arc<Mutex<Connection>>,
    dimensions: usize,
}

impl DuckdbCatalogueRepository {
    pub fn open(path: &Path, dimensions: usize) -> Result<Self, ClassifyError> {
        let conn = Connection::open(path)
            .map_err(|e| ClassifyError::database(format!("failed to open DuckDB database: {e}")))?;
        Self::load_extensions(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dimensions,
        })
    }

    /// Read-only open skips the exclusive write lock, letting concurrent
    /// classifier processes share one catalogue file.
    pub fn open_read_only(path: &Path, dimensions: usize) -> Result<Self, ClassifyError> {
        let config = Config::default()
            .access_mode(AccessMode::ReadOnly)
            .map_err(|e| ClassifyError::database(format!("failed to build DuckDB config: {e}")))?;
        let conn = Connection::open_with_flags(path, config)
            .map_err(|e| ClassifyError::database(format!("failed to open DuckDB database: {e}")))?;
        Self::load_extensions(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dimensions,
        })
    }

    /// VSS serves the HNSW index scan, FTS the `match_bm25` relevance.
    fn load_extensions(conn: &Connection) -> Result<(), ClassifyError> {
        conn.execute_batch(
            "INSTALL vss; LOAD vss; INSTALL fts; LOAD fts; \
             SET hnsw_enable_experimental_persistence = true;",
        )
        .map_err(|e| ClassifyError::database(format!("failed to load DuckDB extensions: {e}")))?;
        debug!("DuckDB extensions loaded");
        Ok(())
    }

    fn vector_to_array_literal(&self, vector: &[f32]) -> Result<String, ClassifyError> {
        if vector.len() != self.dimensions {
            return Err(ClassifyError::configuration(format!(
                "expected embedding dimension {}, got {}",
                self.dimensions,
                vector.len()
            )));
        }
        let mut literal = String::with_capacity(vector.len() * 8);
        literal.push('[');
        for (i, v) in vector.iter().enumerate() {
            if i > 0 {
                literal.push_str(", ");
            }
            literal.push_str(&format!("{}", v));
        }
        literal.push(']');
        literal.push_str(&format!("::FLOAT[{}]", self.dimensions));
        Ok(literal)
    }

    fn quoted_list(codes: &[String]) -> String {
        codes
            .iter()
            .map(|c| format!("'{}'", c.replace('\'', "''")))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn row_to_record(row: &Row) -> Result<CodeRecord, duckdb::Error> {
        Ok(CodeRecord::new(
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
        )
        .with_hierarchy(
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
        )
        .with_class_exclusions(row.get::<_, String>(6)?)
        .with_enriched_text(row.get::<_, String>(7)?))
    }
}

#[async_trait]
impl CatalogueRepository for DuckdbCatalogueRepository {
    async fn vector_search(
        &self,
        embedding: &[f32],
        n: usize,
    ) -> Result<Vec<(String, usize)>, ClassifyError> {
        let array_lit = self.vector_to_array_literal(embedding)?;
        let sql = format!(
            "SELECT code FROM {TABLE} \
             ORDER BY array_cosine_distance(embedding, {array_lit}) \
             LIMIT ?"
        );

        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| ClassifyError::database(format!("failed to prepare vector search: {e}")))?;
        let mut rows = stmt
            .query(params![n as i64])
            .map_err(|e| ClassifyError::database(format!("failed to run vector search: {e}")))?;

        let mut hits = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| ClassifyError::database(format!("failed to read vector row: {e}")))?
        {
            let code: String = row
                .get(0)
                .map_err(|e| ClassifyError::database(format!("failed to read code: {e}")))?;
            hits.push((code, hits.len() + 1));
        }
        debug!("Vector search returned {} hits", hits.len());
        Ok(hits)
    }

    async fn fts_search(
        &self,
        query_text: &str,
        n: usize,
    ) -> Result<Vec<(String, usize)>, ClassifyError> {
        let sql = format!(
            "SELECT code FROM ( \
                SELECT code, {FTS_SCHEMA}.match_bm25(code, ?) AS score FROM {TABLE} \
             ) ranked \
             WHERE score IS NOT NULL \
             ORDER BY score DESC, code \
             LIMIT ?"
        );

        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| ClassifyError::database(format!("failed to prepare FTS search: {e}")))?;
        let mut rows = stmt
            .query(params![query_text, n as i64])
            .map_err(|e| ClassifyError::database(format!("failed to run FTS search: {e}")))?;

        let mut hits = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| ClassifyError::database(format!("failed to read FTS row: {e}")))?
        {
            let code: String = row
                .get(0)
                .map_err(|e| ClassifyError::database(format!("failed to read code: {e}")))?;
            hits.push((code, hits.len() + 1));
        }
        debug!("FTS search returned {} hits", hits.len());
        Ok(hits)
    }

    async fn fetch_by_codes(
        &self,
        codes: &[String],
    ) -> Result<HashMap<String, CodeRecord>, ClassifyError> {
        if codes.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT code, description, class_desc, group_desc, subdivision_desc, \
                    division_desc, class_exclusions, enriched_text \
             FROM {TABLE} WHERE code IN ({})",
            Self::quoted_list(codes)
        );

        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| ClassifyError::database(format!("failed to prepare hydration: {e}")))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| ClassifyError::database(format!("failed to run hydration: {e}")))?;

        let mut records = HashMap::with_capacity(codes.len());
        while let Some(row) = rows
            .next()
            .map_err(|e| ClassifyError::database(format!("failed to read record row: {e}")))?
        {
            let record = Self::row_to_record(row)
                .map_err(|e| ClassifyError::database(format!("failed to parse record row: {e}")))?;
            records.insert(record.code().to_string(), record);
        }
        if records.len() < codes.len() {
            warn!(
                "Hydration found {} of {} requested codes",
                records.len(),
                codes.len()
            );
        }
        Ok(records)
    }

    async fn all_codes(&self) -> Result<Vec<CodeSummary>, ClassifyError> {
        let sql = format!("SELECT code, description FROM {TABLE} ORDER BY code");

        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| ClassifyError::database(format!("failed to prepare listing: {e}")))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| ClassifyError::database(format!("failed to run listing: {e}")))?;

        let mut summaries = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| ClassifyError::database(format!("failed to read listing row: {e}")))?
        {
            let code: String = row
                .get(0)
                .map_err(|e| ClassifyError::database(format!("failed to read code: {e}")))?;
            let description: String = row
                .get(1)
                .map_err(|e| ClassifyError::database(format!("failed to read description: {e}")))?;
            summaries.push(CodeSummary::new(code, description));
        }
        Ok(summaries)
    }

    async fn healthcheck(&self) -> bool {
        let conn = self.conn.lock().await;
        conn.query_row(&format!("SELECT COUNT(*) FROM {TABLE}"), [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|count| count > 0)
        .unwrap_or(false)
    }
}
