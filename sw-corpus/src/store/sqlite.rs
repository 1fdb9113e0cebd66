//! SQLite-backed vector index using the `sqlite-vec` extension.
//!
//! The index owns a directory (`CHROMA_PERSIST_DIR`-style) containing a
//! single `chunks.db`. Two tables: `chunks` carries the text and metadata,
//! `chunk_vectors` carries the `vec_f32` embedding blobs. Search is a
//! brute-force cosine-distance scan, which is plenty for a single-process
//! textbook corpus; cosine distance is converted to a `[0, 1]`
//! higher-is-better score at this boundary.
//!
//! `tokio-rusqlite` funnels every statement through one connection actor,
//! which serializes `add`/`delete_all` with respect to concurrent
//! `search` calls.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::{Path, PathBuf};
use std::sync::Once;

use async_trait::async_trait;
use tokio_rusqlite::{ffi, Connection};

use super::{ScoredChunk, SearchFilter, VectorIndex};
use crate::chunker::{Chunk, ChunkMetadata};
use crate::types::CorpusError;

const DB_FILE: &str = "chunks.db";

pub struct SqliteVectorIndex {
    conn: Connection,
    persist_dir: PathBuf,
}

impl SqliteVectorIndex {
    /// Open (or create) the index under `persist_dir`.
    pub async fn open(persist_dir: impl AsRef<Path>) -> Result<Self, CorpusError> {
        Self::register_sqlite_vec()?;

        let persist_dir = persist_dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&persist_dir).await?;

        let conn = Connection::open(persist_dir.join(DB_FILE))
            .await
            .map_err(|err| CorpusError::Storage(err.to_string()))?;

        conn.call(|conn| -> tokio_rusqlite::rusqlite::Result<()> {
            conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))?;
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS chunks (
                     id          TEXT PRIMARY KEY,
                     source      TEXT NOT NULL,
                     page        INTEGER NOT NULL,
                     chunk_index INTEGER NOT NULL,
                     content     TEXT NOT NULL,
                     metadata    TEXT NOT NULL
                 );
                 CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source);
                 CREATE TABLE IF NOT EXISTS chunk_vectors (
                     id        TEXT PRIMARY KEY,
                     embedding BLOB NOT NULL
                 );",
            )?;
            Ok(())
        })
        .await
        .map_err(|err| CorpusError::Storage(err.to_string()))?;

        Ok(Self { conn, persist_dir })
    }

    /// Directory the collection persists under.
    pub fn persist_dir(&self) -> &Path {
        &self.persist_dir
    }

    fn register_sqlite_vec() -> Result<(), CorpusError> {
        use std::sync::Mutex;

        static INIT: Once = Once::new();
        static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

        INIT.call_once(|| {
            let result = unsafe {
                type SqliteExtensionInit = unsafe extern "C" fn(
                    *mut ffi::sqlite3,
                    *mut *mut c_char,
                    *const ffi::sqlite3_api_routines,
                ) -> i32;

                let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
                let init_fn: SqliteExtensionInit =
                    transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
                let rc = ffi::sqlite3_auto_extension(Some(init_fn));
                if rc != 0 {
                    Err(format!(
                        "failed to register sqlite-vec extension (code {rc})"
                    ))
                } else {
                    Ok(())
                }
            };
            *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
        });

        INIT_RESULT
            .lock()
            .expect("init result mutex poisoned")
            .clone()
            .expect("init was called but result not set")
            .map_err(CorpusError::Storage)
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn add(&self, chunks: Vec<Chunk>) -> Result<usize, CorpusError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut rows = Vec::with_capacity(chunks.len());
        let mut skipped = 0usize;
        for chunk in chunks {
            let Some(embedding) = chunk.embedding else {
                skipped += 1;
                continue;
            };
            let metadata = serde_json::to_string(&chunk.metadata)?;
            let embedding = serde_json::to_string(&embedding)?;
            rows.push((
                chunk.id,
                chunk.metadata.source.clone(),
                chunk.metadata.page as i64,
                chunk.metadata.chunk_index as i64,
                chunk.text,
                metadata,
                embedding,
            ));
        }
        if skipped > 0 {
            tracing::warn!(skipped, "chunks without embeddings were not stored");
        }

        let written = rows.len();
        self.conn
            .call(move |conn| -> tokio_rusqlite::rusqlite::Result<()> {
                let tx = conn.transaction()?;
                for (id, source, page, chunk_index, content, metadata, embedding) in &rows {
                    tx.execute(
                        "INSERT OR REPLACE INTO chunks
                         (id, source, page, chunk_index, content, metadata)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        (id, source, page, chunk_index, content, metadata),
                    )?;
                    tx.execute(
                        "INSERT OR REPLACE INTO chunk_vectors (id, embedding)
                         VALUES (?1, vec_f32(?2))",
                        (id, embedding),
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(|err| CorpusError::Storage(err.to_string()))?;

        Ok(written)
    }

    async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredChunk>, CorpusError> {
        let query_json = serde_json::to_string(query_vector)?;
        let subject = filter.and_then(|f| f.subject.clone());

        let raw_rows = self
            .conn
            .call(move |conn| {
                let mut sql = String::from(
                    "SELECT c.id, c.content, c.metadata,
                            vec_distance_cosine(v.embedding, vec_f32(?1)) AS distance
                     FROM chunks c
                     JOIN chunk_vectors v ON c.id = v.id",
                );
                if subject.is_some() {
                    sql.push_str(" WHERE json_extract(c.metadata, '$.subject') = ?3");
                }
                sql.push_str(" ORDER BY distance ASC LIMIT ?2");

                let mut stmt = conn.prepare(&sql)?;
                let rows = match &subject {
                    Some(subject) => stmt
                        .query_map((&query_json, k as i64, subject), |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, String>(2)?,
                                row.get::<_, f64>(3)?,
                            ))
                        })?
                        .collect::<Result<Vec<_>, _>>(),
                    None => stmt
                        .query_map((&query_json, k as i64), |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, String>(2)?,
                                row.get::<_, f64>(3)?,
                            ))
                        })?
                        .collect::<Result<Vec<_>, _>>(),
                };
                rows
            })
            .await
            .map_err(|err| CorpusError::Storage(err.to_string()))?;

        let mut results = Vec::with_capacity(raw_rows.len());
        for (id, content, metadata_json, distance) in raw_rows {
            let metadata: ChunkMetadata = match serde_json::from_str(&metadata_json) {
                Ok(metadata) => metadata,
                Err(err) => {
                    tracing::warn!(id = %id, error = %err, "skipping chunk with unreadable metadata");
                    continue;
                }
            };
            let score = (1.0 - distance as f32).clamp(0.0, 1.0);
            results.push(ScoredChunk {
                chunk: Chunk {
                    id,
                    text: content,
                    metadata,
                    embedding: None,
                },
                score,
            });
        }
        Ok(results)
    }

    async fn len(&self) -> Result<usize, CorpusError> {
        self.conn
            .call(|conn| -> tokio_rusqlite::rusqlite::Result<usize> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| CorpusError::Storage(err.to_string()))
    }

    async fn delete_all(&self) -> Result<usize, CorpusError> {
        self.conn
            .call(|conn| -> tokio_rusqlite::rusqlite::Result<usize> {
                let tx = conn.transaction()?;
                let removed = tx.execute("DELETE FROM chunks", [])?;
                tx.execute("DELETE FROM chunk_vectors", [])?;
                tx.commit()?;
                Ok(removed)
            })
            .await
            .map_err(|err| CorpusError::Storage(err.to_string()))
    }
}
