use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::{
    CandidateQuery, ChannelCoverage, LengthStats, StatusReport, StoreError, StoredTranscript, TranscriptStore,
    VideoCandidate, REPORT_CHANNELS, REPORT_MISSING_SAMPLE,
};
use crate::adapters::{QualityTier, TranscriptResult};

const HAS_TEXT: &str = "transcript_text IS NOT NULL AND transcript_text != ''";

/// SQLite-backed catalog. Calls run on the blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs_err::create_dir_all(parent).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }

        let conn = Connection::open(path).map_err(classify)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory().map_err(classify)?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        initialize_schema(&conn).map_err(classify)?;
        migrate(&conn).map_err(classify)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn call<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))?;
            f(&conn).map_err(classify)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {}", e)))?
    }
}

fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS videos (
            video_id TEXT PRIMARY KEY,
            title TEXT NOT NULL DEFAULT '',
            channel_name TEXT NOT NULL DEFAULT '',
            view_count INTEGER NOT NULL DEFAULT 0,
            transcript_text TEXT,
            transcript_tier TEXT,
            transcript_method TEXT,
            updated_at TEXT
        )",
        [],
    )?;
    Ok(())
}

/// Catalogs created before tiers were tracked lack the provenance columns.
fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare("PRAGMA table_info(videos)")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for column in ["transcript_tier", "transcript_method", "updated_at"] {
        if !columns.iter().any(|c| c == column) {
            tracing::info!("Adding column {} to videos", column);
            conn.execute(&format!("ALTER TABLE videos ADD COLUMN {} TEXT", column), [])?;
        }
    }
    Ok(())
}

fn classify(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(
                failure.code,
                ErrorCode::CannotOpen
                    | ErrorCode::NotADatabase
                    | ErrorCode::DatabaseCorrupt
                    | ErrorCode::SystemIoFailure
                    | ErrorCode::PermissionDenied
                    | ErrorCode::ReadOnly
            ) =>
        {
            StoreError::Unavailable(err.to_string())
        }
        _ => StoreError::Query(err.to_string()),
    }
}

fn candidate(row: &rusqlite::Row<'_>) -> rusqlite::Result<VideoCandidate> {
    Ok(VideoCandidate {
        video_id: row.get(0)?,
        title: row.get(1)?,
        channel_name: row.get(2)?,
        view_count: row.get::<_, i64>(3)?.max(0) as u64,
    })
}

#[async_trait]
impl TranscriptStore for SqliteStore {
    async fn list_candidates(&self, query: CandidateQuery) -> Result<Vec<VideoCandidate>, StoreError> {
        let limit = query.limit.map(|l| l as i64).unwrap_or(-1);
        self.call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT video_id, title, channel_name, view_count FROM videos
                 WHERE ?1 OR transcript_text IS NULL OR length(transcript_text) < ?2
                 ORDER BY view_count DESC, video_id
                 LIMIT ?3",
            )?;
            let rows = stmt.query_map(params![query.refresh, query.min_chars as i64, limit], candidate)?;
            rows.collect()
        })
        .await
    }

    async fn stored_transcript(&self, video_id: &str) -> Result<Option<StoredTranscript>, StoreError> {
        let video_id = video_id.to_string();
        self.call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT transcript_text, transcript_tier, transcript_method, updated_at
                     FROM videos WHERE video_id = ?1 AND {}",
                    HAS_TEXT
                ),
                params![video_id],
                |row| {
                    let tier: Option<String> = row.get(1)?;
                    let updated_at: Option<String> = row.get(3)?;
                    Ok(StoredTranscript {
                        text: row.get(0)?,
                        tier: tier.as_deref().and_then(QualityTier::from_name),
                        method: row.get(2)?,
                        updated_at: updated_at
                            .and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
                            .map(|t| t.with_timezone(&Utc)),
                    })
                },
            )
            .optional()
        })
        .await
    }

    async fn upsert_transcript(&self, video_id: &str, result: &TranscriptResult) -> Result<(), StoreError> {
        let video_id = video_id.to_string();
        let text = result.text.clone();
        let tier = result.tier.as_str();
        let method = result.method_tag();
        let now = Utc::now().to_rfc3339();

        let id = video_id.clone();
        let changed = self
            .call(move |conn| {
                conn.execute(
                    "UPDATE videos
                     SET transcript_text = ?2, transcript_tier = ?3, transcript_method = ?4, updated_at = ?5
                     WHERE video_id = ?1",
                    params![id, text, tier, method, now],
                )
            })
            .await?;

        if changed == 0 {
            return Err(StoreError::UnknownVideo(video_id));
        }
        Ok(())
    }

    async fn import_videos(&self, videos: &[VideoCandidate]) -> Result<usize, StoreError> {
        let videos = videos.to_vec();
        self.call(move |conn| {
            let tx = conn.unchecked_transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO videos (video_id, title, channel_name, view_count)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(video_id) DO UPDATE SET
                        title = excluded.title,
                        channel_name = excluded.channel_name,
                        view_count = excluded.view_count",
                )?;
                for video in &videos {
                    stmt.execute(params![
                        video.video_id,
                        video.title,
                        video.channel_name,
                        video.view_count.min(i64::MAX as u64) as i64
                    ])?;
                }
            }
            tx.commit()?;
            Ok(videos.len())
        })
        .await
    }

    async fn status_report(&self) -> Result<StatusReport, StoreError> {
        self.call(|conn| {
            let (total, with): (i64, i64) = conn.query_row(
                &format!("SELECT COUNT(*), COUNT(CASE WHEN {} THEN 1 END) FROM videos", HAS_TEXT),
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )?;

            let lengths = conn.query_row(
                &format!(
                    "SELECT AVG(length(transcript_text)), MIN(length(transcript_text)), MAX(length(transcript_text))
                     FROM videos WHERE {}",
                    HAS_TEXT
                ),
                [],
                |r| {
                    let average: Option<f64> = r.get(0)?;
                    Ok(average.map(|average| LengthStats {
                        average,
                        min: r.get::<_, i64>(1).unwrap_or(0) as usize,
                        max: r.get::<_, i64>(2).unwrap_or(0) as usize,
                    }))
                },
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT channel_name, COUNT(*) AS total, COUNT(CASE WHEN {} THEN 1 END)
                 FROM videos GROUP BY channel_name ORDER BY total DESC, channel_name LIMIT ?1",
                HAS_TEXT
            ))?;
            let by_channel = stmt
                .query_map(params![REPORT_CHANNELS as i64], |r| {
                    Ok(ChannelCoverage {
                        channel_name: r.get(0)?,
                        total: r.get::<_, i64>(1)? as usize,
                        with_transcript: r.get::<_, i64>(2)? as usize,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut stmt = conn.prepare(&format!(
                "SELECT video_id, title, channel_name, view_count FROM videos
                 WHERE NOT ({}) ORDER BY view_count DESC, video_id LIMIT ?1",
                HAS_TEXT
            ))?;
            let missing_sample = stmt
                .query_map(params![REPORT_MISSING_SAMPLE as i64], candidate)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut stmt = conn.prepare(&format!(
                "SELECT COALESCE(transcript_tier, 'unknown') AS tier, COUNT(*) FROM videos
                 WHERE {} GROUP BY tier ORDER BY tier",
                HAS_TEXT
            ))?;
            let by_tier = stmt
                .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)? as usize)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(StatusReport {
                total_videos: total as usize,
                with_transcript: with as usize,
                without_transcript: (total - with) as usize,
                lengths,
                by_channel,
                missing_sample,
                by_tier,
            })
        })
        .await
    }
}
