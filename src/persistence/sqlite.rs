use super::{PersistenceError, PersistenceResult, ScheduleRepository, VersionStore};
use crate::job::JobBundle;
use crate::operation::JobId;
use crate::version::{ScheduleVersion, VersionId};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};

/// Jobs and schedule versions stored as JSON documents in SQLite.
pub struct SqliteScheduleStore {
    connection: Mutex<Connection>,
}

impl SqliteScheduleStore {
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> PersistenceResult<Self> {
        let connection = Connection::open(path)?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        let connection = Connection::open_in_memory()?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            CREATE TABLE IF NOT EXISTS jobs (
                job_id INTEGER PRIMARY KEY,
                bundle_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS schedule_versions (
                id INTEGER PRIMARY KEY,
                job_id INTEGER NOT NULL,
                version_number INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                version_json TEXT NOT NULL,
                UNIQUE (job_id, version_number)
            );
            CREATE INDEX IF NOT EXISTS schedule_versions_job
                ON schedule_versions (job_id, version_number);
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    /// Insert or replace a job bundle.
    pub fn save_job(&self, bundle: &JobBundle) -> PersistenceResult<()> {
        super::validate_bundle(bundle)?;
        let json = serde_json::to_string(bundle)?;
        let conn = self.connection.lock();
        conn.execute(
            "INSERT OR REPLACE INTO jobs (job_id, bundle_json) VALUES (?1, ?2)",
            params![bundle.job.job_id, json],
        )?;
        Ok(())
    }
}

fn to_sql_id(version_id: VersionId) -> PersistenceResult<i64> {
    i64::try_from(version_id).map_err(|_| {
        PersistenceError::InvalidData(format!("version id {version_id} exceeds sqlite range"))
    })
}

impl ScheduleRepository for SqliteScheduleStore {
    fn load_job(&self, job_id: JobId) -> PersistenceResult<JobBundle> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare("SELECT bundle_json FROM jobs WHERE job_id = ?1")?;
        let json: Option<String> = stmt
            .query_row(params![job_id], |row| row.get(0))
            .optional()?;
        let Some(json) = json else {
            return Err(PersistenceError::JobNotFound(job_id));
        };
        let bundle: JobBundle = serde_json::from_str(&json)?;
        super::validate_bundle(&bundle)?;
        Ok(bundle)
    }
}

impl VersionStore for SqliteScheduleStore {
    fn insert_version(&self, version: &ScheduleVersion) -> PersistenceResult<()> {
        let json = serde_json::to_string(version)?;
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        let exists: Option<i64> = tx
            .query_row(
                "SELECT id FROM schedule_versions
                 WHERE id = ?1 OR (job_id = ?2 AND version_number = ?3)",
                params![to_sql_id(version.id)?, version.job_id, version.version_number],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(PersistenceError::VersionConflict {
                version_id: version.id,
                job_id: version.job_id,
                version_number: version.version_number,
            });
        }
        let inserted = tx.execute(
            "INSERT INTO schedule_versions (id, job_id, version_number, created_at, version_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                to_sql_id(version.id)?,
                version.job_id,
                version.version_number,
                version.created_at.to_rfc3339(),
                json
            ],
        );
        match inserted {
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(PersistenceError::VersionConflict {
                    version_id: version.id,
                    job_id: version.job_id,
                    version_number: version.version_number,
                });
            }
            other => {
                other?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_version(&self, version_id: VersionId) -> PersistenceResult<Option<ScheduleVersion>> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare("SELECT version_json FROM schedule_versions WHERE id = ?1")?;
        let json: Option<String> = stmt
            .query_row(params![to_sql_id(version_id)?], |row| row.get(0))
            .optional()?;
        json.map(|json| serde_json::from_str(&json).map_err(PersistenceError::from))
            .transpose()
    }

    fn versions_for_job(&self, job_id: JobId) -> PersistenceResult<Vec<ScheduleVersion>> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare(
            "SELECT version_json FROM schedule_versions WHERE job_id = ?1 ORDER BY version_number ASC",
        )?;
        let rows = stmt.query_map(params![job_id], |row| row.get::<_, String>(0))?;

        let mut versions = Vec::new();
        for json in rows {
            let json = json?;
            versions.push(serde_json::from_str(&json)?);
        }
        Ok(versions)
    }

    fn max_version_id(&self) -> PersistenceResult<Option<VersionId>> {
        let conn = self.connection.lock();
        let max: Option<i64> =
            conn.query_row("SELECT MAX(id) FROM schedule_versions", [], |row| row.get(0))?;
        Ok(max.and_then(|id| VersionId::try_from(id).ok()))
    }
}
