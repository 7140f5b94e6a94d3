use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

use super::{Datastore, StoreError};
use crate::model::{
    Execution, ExecutionId, HistoryItem, NewHistoryItem, ProcessId, ProcessIdentity,
    Revision, RevisionId, Step, StepKind, UserId,
};

/// SQLite-backed datastore
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect, creating the database file if needed, and optionally run the
    /// embedded migrations.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        auto_migrate: bool,
    ) -> Result<Self, StoreError> {
        let in_memory = database_url.contains(":memory:");

        if !in_memory && !sqlx::Sqlite::database_exists(database_url).await? {
            info!("Creating database at {}", database_url);
            sqlx::Sqlite::create_database(database_url).await?;
        }

        let mut options = SqlitePoolOptions::new().max_connections(max_connections.max(1));
        if in_memory {
            // every connection to :memory: is a separate database
            options = options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = options.connect(database_url).await?;

        if auto_migrate {
            info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Database migrations completed");
        }

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn load_steps(&self, revision: &str) -> Result<Vec<Step>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT title, kind, description, start_with_previous
            FROM steps
            WHERE revision = ?1
            ORDER BY position ASC
            "#,
        )
        .bind(revision)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(step_from_row).collect()
    }

    async fn revision_from_row(&self, row: &SqliteRow) -> Result<Revision, StoreError> {
        let revision: String = row.try_get("revision")?;
        let steps = self.load_steps(&revision).await?;

        Ok(Revision {
            revision: parse_id(&revision)?,
            process: parse_id(&row.try_get::<String, _>("process_id")?)?,
            title: row.try_get("title")?,
            created_by: UserId::new(row.try_get::<String, _>("created_by")?),
            created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
            steps,
        })
    }
}

fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{value}': {e}")))
}

fn parse_id<T: FromStr<Err = uuid::Error>>(value: &str) -> Result<T, StoreError> {
    value
        .parse()
        .map_err(|e| StoreError::Corrupt(format!("bad id '{value}': {e}")))
}

fn to_index(value: i64) -> Result<usize, StoreError> {
    usize::try_from(value).map_err(|_| StoreError::Corrupt(format!("bad position {value}")))
}

fn step_from_row(row: &SqliteRow) -> Result<Step, StoreError> {
    let kind: String = row.try_get("kind")?;
    Ok(Step {
        title: row.try_get("title")?,
        kind: StepKind::from_code(&kind)
            .ok_or_else(|| StoreError::Corrupt(format!("bad step kind '{kind}'")))?,
        description: row.try_get("description")?,
        start_with_previous: row.try_get("start_with_previous")?,
    })
}

fn identity_from_row(row: &SqliteRow) -> Result<ProcessIdentity, StoreError> {
    Ok(ProcessIdentity {
        id: parse_id(&row.try_get::<String, _>("id")?)?,
        created_by: UserId::new(row.try_get::<String, _>("created_by")?),
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
    })
}

fn execution_from_row(row: &SqliteRow) -> Result<Execution, StoreError> {
    Ok(Execution {
        id: parse_id(&row.try_get::<String, _>("id")?)?,
        revision: parse_id(&row.try_get::<String, _>("revision")?)?,
        initiated_by: UserId::new(row.try_get::<String, _>("initiated_by")?),
        initiated_at: parse_timestamp(&row.try_get::<String, _>("initiated_at")?)?,
    })
}

fn history_from_row(row: &SqliteRow) -> Result<HistoryItem, StoreError> {
    let kind: String = row.try_get("kind")?;
    Ok(HistoryItem {
        seq: row.try_get("seq")?,
        execution: parse_id(&row.try_get::<String, _>("execution_id")?)?,
        kind: kind
            .parse()
            .map_err(|e: String| StoreError::Corrupt(e))?,
        step_idx: to_index(row.try_get("step_idx")?)?,
        at: parse_timestamp(&row.try_get::<String, _>("recorded_at")?)?,
        by: UserId::new(row.try_get::<String, _>("actor")?),
    })
}

async fn insert_revision_rows(
    conn: &mut SqliteConnection,
    revision: &Revision,
) -> Result<(), StoreError> {
    let revision_id = revision.revision.to_string();

    let inserted = sqlx::query(
        r#"
        INSERT INTO revisions (revision, process_id, title, created_by, created_at)
        SELECT ?1, ?2, ?3, ?4, ?5
        WHERE EXISTS (SELECT 1 FROM processes WHERE id = ?2)
        "#,
    )
    .bind(&revision_id)
    .bind(revision.process.to_string())
    .bind(&revision.title)
    .bind(revision.created_by.as_str())
    .bind(format_timestamp(&revision.created_at))
    .execute(&mut *conn)
    .await?;
    if inserted.rows_affected() == 0 {
        return Err(StoreError::not_found("process", revision.process));
    }

    for (position, step) in revision.steps.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO steps (revision, position, title, kind, description, start_with_previous)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&revision_id)
        .bind(position as i64)
        .bind(&step.title)
        .bind(step.kind.code())
        .bind(&step.description)
        .bind(step.start_with_previous)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

async fn insert_history_rows(
    conn: &mut SqliteConnection,
    execution: ExecutionId,
    items: &[NewHistoryItem],
) -> Result<Vec<HistoryItem>, StoreError> {
    let mut stored = Vec::with_capacity(items.len());

    for item in items {
        let result = sqlx::query(
            r#"
            INSERT INTO history_items (execution_id, kind, step_idx, recorded_at, actor)
            SELECT ?1, ?2, ?3, ?4, ?5
            WHERE EXISTS (SELECT 1 FROM executions WHERE id = ?1)
            "#,
        )
        .bind(execution.to_string())
        .bind(item.kind.as_str())
        .bind(item.step_idx as i64)
        .bind(format_timestamp(&item.at))
        .bind(item.by.as_str())
        .execute(&mut *conn)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("execution", execution));
        }

        stored.push(HistoryItem {
            seq: result.last_insert_rowid(),
            execution,
            kind: item.kind,
            step_idx: item.step_idx,
            at: item.at,
            by: item.by.clone(),
        });
    }

    Ok(stored)
}

#[async_trait]
impl Datastore for SqliteStore {
    async fn close(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
        info!("Database connections closed");
    }

    async fn insert_process(
        &self,
        identity: &ProcessIdentity,
        revision: &Revision,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO processes (id, created_by, created_at)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(identity.id.to_string())
        .bind(identity.created_by.as_str())
        .bind(format_timestamp(&identity.created_at))
        .execute(&mut *tx)
        .await?;

        insert_revision_rows(&mut *tx, revision).await?;
        tx.commit().await?;

        debug!(process = %identity.id, revision = %revision.revision, "Inserted process");
        Ok(())
    }

    async fn insert_revision(&self, revision: &Revision) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        insert_revision_rows(&mut *tx, revision).await?;
        tx.commit().await?;

        debug!(process = %revision.process, revision = %revision.revision, "Inserted revision");
        Ok(())
    }

    async fn get_identity(&self, id: ProcessId) -> Result<Option<ProcessIdentity>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, created_by, created_at
            FROM processes
            WHERE id = ?1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(identity_from_row).transpose()
    }

    async fn latest_revision(&self, id: ProcessId) -> Result<Option<Revision>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT revision, process_id, title, created_by, created_at
            FROM revisions
            WHERE process_id = ?1
            ORDER BY created_at DESC, seq DESC
            LIMIT 1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.revision_from_row(&row).await?)),
            None => Ok(None),
        }
    }

    async fn get_revision(&self, revision: RevisionId) -> Result<Option<Revision>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT revision, process_id, title, created_by, created_at
            FROM revisions
            WHERE revision = ?1
            "#,
        )
        .bind(revision.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.revision_from_row(&row).await?)),
            None => Ok(None),
        }
    }

    async fn list_latest_revisions(
        &self,
    ) -> Result<Vec<(ProcessIdentity, Revision)>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.created_by, p.created_at,
                   r.revision, r.process_id, r.title,
                   r.created_by AS revision_created_by, r.created_at AS revision_created_at
            FROM processes p
            JOIN revisions r ON r.revision = (
                SELECT r2.revision FROM revisions r2
                WHERE r2.process_id = p.id
                ORDER BY r2.created_at DESC, r2.seq DESC
                LIMIT 1
            )
            ORDER BY p.created_at ASC, p.seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut result = Vec::with_capacity(rows.len());
        for row in &rows {
            let identity = identity_from_row(row)?;
            let revision_id: String = row.try_get("revision")?;
            let revision = Revision {
                revision: parse_id(&revision_id)?,
                process: identity.id,
                title: row.try_get("title")?,
                created_by: UserId::new(row.try_get::<String, _>("revision_created_by")?),
                created_at: parse_timestamp(&row.try_get::<String, _>("revision_created_at")?)?,
                steps: self.load_steps(&revision_id).await?,
            };
            result.push((identity, revision));
        }

        Ok(result)
    }

    async fn list_revisions(&self, id: ProcessId) -> Result<Vec<Revision>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT revision, process_id, title, created_by, created_at
            FROM revisions
            WHERE process_id = ?1
            ORDER BY created_at DESC, seq DESC
            "#,
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut revisions = Vec::with_capacity(rows.len());
        for row in &rows {
            revisions.push(self.revision_from_row(row).await?);
        }
        Ok(revisions)
    }

    async fn insert_execution(
        &self,
        execution: &Execution,
        initial_history: &[NewHistoryItem],
    ) -> Result<Vec<HistoryItem>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO executions (id, revision, initiated_by, initiated_at)
            SELECT ?1, ?2, ?3, ?4
            WHERE EXISTS (SELECT 1 FROM revisions WHERE revision = ?2)
            "#,
        )
        .bind(execution.id.to_string())
        .bind(execution.revision.to_string())
        .bind(execution.initiated_by.as_str())
        .bind(format_timestamp(&execution.initiated_at))
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Err(StoreError::not_found("revision", execution.revision));
        }

        let stored = insert_history_rows(&mut *tx, execution.id, initial_history).await?;
        tx.commit().await?;

        debug!(
            execution = %execution.id,
            revision = %execution.revision,
            initial_items = stored.len(),
            "Inserted execution"
        );
        Ok(stored)
    }

    async fn get_execution(&self, id: ExecutionId) -> Result<Option<Execution>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, revision, initiated_by, initiated_at
            FROM executions
            WHERE id = ?1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(execution_from_row).transpose()
    }

    async fn list_executions(&self, process: ProcessId) -> Result<Vec<Execution>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT e.id, e.revision, e.initiated_by, e.initiated_at
            FROM executions e
            JOIN revisions r ON r.revision = e.revision
            WHERE r.process_id = ?1
            ORDER BY e.initiated_at DESC, e.seq DESC
            "#,
        )
        .bind(process.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(execution_from_row).collect()
    }

    async fn append_history(
        &self,
        execution: ExecutionId,
        items: &[NewHistoryItem],
    ) -> Result<Vec<HistoryItem>, StoreError> {
        if items.is_empty() {
            let exists = sqlx::query("SELECT 1 FROM executions WHERE id = ?1")
                .bind(execution.to_string())
                .fetch_optional(&self.pool)
                .await?;
            return match exists {
                Some(_) => Ok(Vec::new()),
                None => Err(StoreError::not_found("execution", execution)),
            };
        }

        // The first statement of the transaction is the insert itself, so the
        // write lock is taken up front and concurrent writers queue on it.
        let mut tx = self.pool.begin().await?;
        let stored = insert_history_rows(&mut *tx, execution, items).await?;
        tx.commit().await?;

        debug!(execution = %execution, appended = stored.len(), "Appended history");
        Ok(stored)
    }

    async fn history(&self, execution: ExecutionId) -> Result<Vec<HistoryItem>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT seq, execution_id, kind, step_idx, recorded_at, actor
            FROM history_items
            WHERE execution_id = ?1
            ORDER BY seq ASC
            "#,
        )
        .bind(execution.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(history_from_row).collect()
    }
}
