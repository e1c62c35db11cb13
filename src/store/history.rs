// SQLite download-history persistence. A shell-side collaborator: the engine
// only emits completion events, the shell decides what to record here.
use super::*;

pub(super) const HISTORY_DATABASE_FILE_NAME: &str = "mediagrab-history.sqlite3";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRecord {
    pub url: String,
    pub output_dir: Option<String>,
    pub format: String,
    pub quality: String,
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: i64,
    pub url: String,
    pub output_dir: Option<String>,
    pub format: String,
    pub quality: String,
    pub exit_code: Option<i32>,
    pub finished_at_unix: i64,
}

pub struct HistoryStore {
    connection: Connection,
}

pub(super) fn initialize_database(connection: &Connection) -> Result<(), String> {
    connection
        .execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS downloads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                output_dir TEXT,
                format TEXT NOT NULL,
                quality TEXT NOT NULL,
                exit_code INTEGER,
                finished_at_unix INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_downloads_finished
              ON downloads(finished_at_unix DESC);
            "#,
        )
        .map_err(|error| format!("Failed to apply history schema: {error}"))
}

pub(super) fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        id: row.get("id")?,
        url: row.get("url")?,
        output_dir: row.get("output_dir")?,
        format: row.get("format")?,
        quality: row.get("quality")?,
        exit_code: row.get("exit_code")?,
        finished_at_unix: row.get("finished_at_unix")?,
    })
}

pub(super) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}

impl HistoryStore {
    pub fn open(path: &Path) -> Result<Self, String> {
        let connection = Connection::open(path)
            .map_err(|error| format!("Failed to open history database {path:?}: {error}"))?;

        connection
            .execute_batch(
                r#"
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                "#,
            )
            .map_err(|error| format!("Failed to apply database PRAGMAs: {error}"))?;

        initialize_database(&connection)?;
        Ok(Self { connection })
    }

    pub fn append(&self, record: &DownloadRecord) -> Result<HistoryEntry, String> {
        let finished_at_unix = unix_now();
        self.connection
            .execute(
                r#"
                INSERT INTO downloads (url, output_dir, format, quality, exit_code, finished_at_unix)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    record.url,
                    record.output_dir,
                    record.format,
                    record.quality,
                    record.exit_code,
                    finished_at_unix,
                ],
            )
            .map_err(|error| format!("Failed to append history entry: {error}"))?;

        Ok(HistoryEntry {
            id: self.connection.last_insert_rowid(),
            url: record.url.clone(),
            output_dir: record.output_dir.clone(),
            format: record.format.clone(),
            quality: record.quality.clone(),
            exit_code: record.exit_code,
            finished_at_unix,
        })
    }

    pub fn recent(&self, limit: u32) -> Result<Vec<HistoryEntry>, String> {
        let mut statement = self
            .connection
            .prepare(
                r#"
                SELECT id, url, output_dir, format, quality, exit_code, finished_at_unix
                FROM downloads
                ORDER BY finished_at_unix DESC, id DESC
                LIMIT ?1
                "#,
            )
            .map_err(|error| format!("Failed to prepare history query: {error}"))?;

        let rows = statement
            .query_map([limit], row_to_entry)
            .map_err(|error| format!("Failed to load history: {error}"))?;

        let mut entries: Vec<HistoryEntry> = Vec::new();
        for row in rows {
            entries.push(row.map_err(|error| format!("Failed to read history row: {error}"))?);
        }
        Ok(entries)
    }

    pub fn clear(&self) -> Result<usize, String> {
        self.connection
            .execute("DELETE FROM downloads", [])
            .map_err(|error| format!("Failed to clear history: {error}"))
    }
}
