use crate::store::{Begin, BeginMode, StoreError};
use chrono::{DateTime, Utc};
use common::model::artifact::{ArtifactKind, ArtifactPayload, ArtifactStatus, OverallStatus};
use common::model::document::{ArtifactState, DocumentArtifacts};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS documents (
        id             TEXT PRIMARY KEY,
        name           TEXT NOT NULL,
        overall_status TEXT NOT NULL,
        created_at     TEXT NOT NULL,
        updated_at     TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS artifacts (
        document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
        kind        TEXT NOT NULL,
        status      TEXT NOT NULL,
        payload     TEXT,
        error       TEXT,
        epoch       INTEGER NOT NULL DEFAULT 0,
        updated_at  TEXT NOT NULL,
        PRIMARY KEY (document_id, kind)
    );
";

const BEGIN_GENERATE: &str = "
    UPDATE artifacts
       SET status = 'PROCESSING', payload = NULL, error = NULL, epoch = epoch + 1, updated_at = ?1
     WHERE document_id = ?2 AND kind = ?3 AND status IN ('UPLOADED', 'ERROR')
    RETURNING epoch";

const BEGIN_REGENERATE: &str = "
    UPDATE artifacts
       SET status = 'PROCESSING', payload = NULL, error = NULL, epoch = epoch + 1, updated_at = ?1
     WHERE document_id = ?2 AND kind = ?3
    RETURNING epoch";

const FINISH: &str = "
    UPDATE artifacts
       SET status = ?1, payload = ?2, error = ?3, updated_at = ?4
     WHERE document_id = ?5 AND kind = ?6 AND epoch = ?7 AND status = 'PROCESSING'";

/// SQLite-backed store of document artifact records.
///
/// A single connection sits behind a mutex and every public operation is one
/// short transaction, which makes writes to any `(document_id, kind)` pair
/// linearizable. The store is shared between request handlers and generation
/// tasks through an `Arc`.
pub struct ArtifactStore {
    conn: Mutex<Connection>,
}

/// Artifact row as read from SQLite, before validation.
struct RawArtifact {
    kind: String,
    status: String,
    payload: Option<String>,
    error: Option<String>,
    epoch: u64,
    updated_at: String,
}

impl RawArtifact {
    fn into_state(self) -> Result<(ArtifactKind, ArtifactState), StoreError> {
        let kind: ArtifactKind = self.kind.parse()?;
        let status: ArtifactStatus = self.status.parse()?;
        let payload = match self.payload {
            Some(json) => Some(serde_json::from_str::<ArtifactPayload>(&json)?),
            None => None,
        };
        Ok((
            kind,
            ArtifactState {
                status,
                payload,
                error: self.error,
                epoch: self.epoch,
                updated_at: parse_timestamp(&self.updated_at)?,
            },
        ))
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

impl ArtifactStore {
    /// Opens (or creates) the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    /// Runs `op` on Tokio's blocking pool.
    ///
    /// Every operation locks the connection and talks to SQLite synchronously;
    /// async callers go through here so they never hold up a runtime worker.
    pub async fn call<T, F>(self: &Arc<Self>, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&ArtifactStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(self);
        match tokio::task::spawn_blocking(move || op(&store)).await {
            Ok(result) => result,
            Err(e) => Err(StoreError::Blocking(e.to_string())),
        }
    }

    /// Creates the record of a freshly uploaded document, every artifact `UPLOADED`.
    pub fn create(&self, document_id: &str, name: &str) -> Result<DocumentArtifacts, StoreError> {
        let stamp = Utc::now().to_rfc3339();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO documents (id, name, overall_status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![document_id, name, OverallStatus::Uploaded.as_str(), stamp],
        )?;
        if inserted == 0 {
            return Err(StoreError::AlreadyExists(document_id.to_string()));
        }

        for kind in ArtifactKind::ALL {
            tx.execute(
                "INSERT INTO artifacts (document_id, kind, status, epoch, updated_at)
                 VALUES (?1, ?2, ?3, 0, ?4)",
                params![document_id, kind.as_str(), ArtifactStatus::Uploaded.as_str(), stamp],
            )?;
        }

        let record = load(&tx, document_id)?
            .ok_or_else(|| StoreError::DocumentNotFound(document_id.to_string()))?;
        tx.commit()?;
        Ok(record)
    }

    pub fn exists(&self, document_id: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM documents WHERE id = ?1",
                params![document_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Reads the current record of a document.
    pub fn snapshot(&self, document_id: &str) -> Result<Option<DocumentArtifacts>, StoreError> {
        let conn = self.lock()?;
        load(&conn, document_id)
    }

    /// Moves one artifact to `PROCESSING` if `mode` allows it from its current status.
    ///
    /// The check and the write are a single conditional `UPDATE`, so two callers
    /// racing on the same artifact can never both start it in `Generate` mode.
    /// A successful transition clears payload and error and bumps the epoch.
    pub fn begin(
        &self,
        document_id: &str,
        kind: ArtifactKind,
        mode: BeginMode,
    ) -> Result<Begin, StoreError> {
        let stamp = Utc::now().to_rfc3339();
        let sql = match mode {
            BeginMode::Generate => BEGIN_GENERATE,
            BeginMode::Regenerate => BEGIN_REGENERATE,
        };

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let epoch: Option<u64> = tx
            .query_row(sql, params![stamp, document_id, kind.as_str()], |row| {
                row.get(0)
            })
            .optional()?;

        let outcome = match epoch {
            Some(epoch) => {
                refresh_overall(&tx, document_id, &stamp)?;
                Begin::Started { epoch }
            }
            None => Begin::Skipped(status_of(&tx, document_id, kind)?),
        };
        tx.commit()?;
        Ok(outcome)
    }

    /// Stores the payload of a finished attempt and marks the artifact `READY`.
    ///
    /// Fails with `StaleWrite` unless the artifact is still `PROCESSING` under `epoch`.
    pub fn complete(
        &self,
        document_id: &str,
        kind: ArtifactKind,
        epoch: u64,
        payload: &ArtifactPayload,
    ) -> Result<(), StoreError> {
        if payload.kind() != kind {
            return Err(StoreError::PayloadMismatch {
                expected: kind,
                found: payload.kind(),
            });
        }
        let encoded = serde_json::to_string(payload)?;
        self.finish(document_id, kind, epoch, ArtifactStatus::Ready, Some(encoded), None)
    }

    /// Marks the artifact `ERROR` with a human-readable reason.
    ///
    /// Same epoch guard as `complete`.
    pub fn fail(
        &self,
        document_id: &str,
        kind: ArtifactKind,
        epoch: u64,
        message: &str,
    ) -> Result<(), StoreError> {
        self.finish(document_id, kind, epoch, ArtifactStatus::Error, None, Some(message))
    }

    fn finish(
        &self,
        document_id: &str,
        kind: ArtifactKind,
        epoch: u64,
        status: ArtifactStatus,
        payload: Option<String>,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        let stamp = Utc::now().to_rfc3339();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let changed = tx.execute(
            FINISH,
            params![
                status.as_str(),
                payload,
                error,
                stamp,
                document_id,
                kind.as_str(),
                epoch
            ],
        )?;
        if changed == 0 {
            // unknown documents surface as DocumentNotFound, everything else is stale
            status_of(&tx, document_id, kind)?;
            return Err(StoreError::StaleWrite {
                document_id: document_id.to_string(),
                kind,
                epoch,
            });
        }

        refresh_overall(&tx, document_id, &stamp)?;
        tx.commit()?;
        Ok(())
    }
}

fn status_of(
    conn: &Connection,
    document_id: &str,
    kind: ArtifactKind,
) -> Result<ArtifactStatus, StoreError> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM artifacts WHERE document_id = ?1 AND kind = ?2",
            params![document_id, kind.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    match status {
        Some(status) => Ok(status.parse()?),
        None => Err(StoreError::DocumentNotFound(document_id.to_string())),
    }
}

/// Recomputes the cached overall status from the persisted artifact rows.
fn refresh_overall(
    conn: &Connection,
    document_id: &str,
    stamp: &str,
) -> Result<OverallStatus, StoreError> {
    let mut stmt = conn.prepare("SELECT status FROM artifacts WHERE document_id = ?1")?;
    let raw = stmt
        .query_map(params![document_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    let statuses = raw
        .iter()
        .map(|status| status.parse::<ArtifactStatus>())
        .collect::<Result<Vec<_>, _>>()?;

    let overall = OverallStatus::derive(statuses);
    conn.execute(
        "UPDATE documents SET overall_status = ?1, updated_at = ?2 WHERE id = ?3",
        params![overall.as_str(), stamp, document_id],
    )?;
    Ok(overall)
}

fn load(conn: &Connection, document_id: &str) -> Result<Option<DocumentArtifacts>, StoreError> {
    let document = conn
        .query_row(
            "SELECT name, overall_status, updated_at FROM documents WHERE id = ?1",
            params![document_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;
    let Some((name, overall_status, updated_at)) = document else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT kind, status, payload, error, epoch, updated_at
           FROM artifacts WHERE document_id = ?1",
    )?;
    let rows = stmt
        .query_map(params![document_id], |row| {
            Ok(RawArtifact {
                kind: row.get(0)?,
                status: row.get(1)?,
                payload: row.get(2)?,
                error: row.get(3)?,
                epoch: row.get(4)?,
                updated_at: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let (mut summary, mut quiz, mut flashcards) = (None, None, None);
    for raw in rows {
        let (kind, state) = raw.into_state()?;
        match kind {
            ArtifactKind::Summary => summary = Some(state),
            ArtifactKind::Quiz => quiz = Some(state),
            ArtifactKind::Flashcards => flashcards = Some(state),
        }
    }

    match (summary, quiz, flashcards) {
        (Some(summary), Some(quiz), Some(flashcards)) => Ok(Some(DocumentArtifacts {
            document_id: document_id.to_string(),
            document_name: name,
            overall_status: overall_status.parse()?,
            summary,
            quiz,
            flashcards,
            updated_at: parse_timestamp(&updated_at)?,
        })),
        _ => Err(StoreError::Corrupt(document_id.to_string())),
    }
}
