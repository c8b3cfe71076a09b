/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! SQLite backlog for local operation.
//!
//! The pool holds a single connection: SQLite serializes writers anyway and
//! one connection avoids `database is locked` errors between runners in the
//! same process.

use super::schema::signing_jobs;
use super::{JobStatus, JobStore, JobStoreError, SigningJob};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use deadpool_diesel::sqlite::{Manager, Pool, Runtime};
use diesel::prelude::*;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = signing_jobs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
struct JobRow {
    id: String,
    input_path: String,
    user_email: String,
    status: String,
    output_path: Option<String>,
    error: Option<String>,
    created_at: NaiveDateTime,
    completed_at: Option<NaiveDateTime>,
}

impl TryFrom<JobRow> for SigningJob {
    type Error = JobStoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(SigningJob {
            id: row.id,
            input_path: row.input_path,
            user_email: row.user_email,
            status: row.status.parse()?,
            output_path: row.output_path,
            error: row.error,
            created_at: Some(row.created_at.and_utc()),
            completed_at: row.completed_at.map(|t| t.and_utc()),
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = signing_jobs)]
struct NewJobRow {
    id: String,
    input_path: String,
    user_email: String,
    status: String,
    created_at: NaiveDateTime,
}

/// Backlog stored in a local SQLite database.
#[derive(Clone)]
pub struct SqliteJobStore {
    pool: Pool,
}

impl std::fmt::Debug for SqliteJobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteJobStore").finish_non_exhaustive()
    }
}

impl SqliteJobStore {
    /// Opens (creating if needed) the database and runs pending migrations.
    ///
    /// Accepts a plain path or a `sqlite://` URL.
    pub async fn connect(url: &str) -> Result<Self, JobStoreError> {
        let path = url.strip_prefix("sqlite://").unwrap_or(url).to_string();
        let manager = Manager::new(path.clone(), Runtime::Tokio1);
        let pool = Pool::builder(manager)
            .max_size(1)
            .build()
            .map_err(|e| JobStoreError::ConnectionPool(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!(database = %path, "SQLite job store ready");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), JobStoreError> {
        self.interact(|conn| {
            diesel::sql_query("PRAGMA busy_timeout=30000;").execute(conn)?;
            conn.run_pending_migrations(MIGRATIONS)
                .map_err(|e| {
                    diesel::result::Error::QueryBuilderError(
                        format!("migration failed: {}", e).into(),
                    )
                })?;
            Ok(())
        })
        .await
    }

    async fn interact<R, F>(&self, f: F) -> Result<R, JobStoreError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<R, diesel::result::Error> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| JobStoreError::ConnectionPool(e.to_string()))?;
        conn.interact(f)
            .await
            .map_err(|e| JobStoreError::ConnectionPool(e.to_string()))?
            .map_err(|e| JobStoreError::Database(e.to_string()))
    }
}

fn ensure_transitioned(updated: usize, id: &str, to: JobStatus) -> Result<(), JobStoreError> {
    if updated == 1 {
        Ok(())
    } else {
        Err(JobStoreError::InvalidTransition {
            id: id.to_string(),
            expected: JobStatus::Processing,
            to,
        })
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<SigningJob>, JobStoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<JobRow> = self
            .interact(move |conn| {
                signing_jobs::table
                    .filter(signing_jobs::status.eq(JobStatus::Pending.as_str()))
                    .order((signing_jobs::created_at.asc(), signing_jobs::id.asc()))
                    .limit(limit)
                    .select(JobRow::as_select())
                    .load(conn)
            })
            .await?;
        rows.into_iter().map(SigningJob::try_from).collect()
    }

    async fn claim(&self, id: &str) -> Result<bool, JobStoreError> {
        let job_id = id.to_string();
        let updated = self
            .interact(move |conn| {
                diesel::update(
                    signing_jobs::table
                        .filter(signing_jobs::id.eq(job_id))
                        .filter(signing_jobs::status.eq(JobStatus::Pending.as_str())),
                )
                .set(signing_jobs::status.eq(JobStatus::Processing.as_str()))
                .execute(conn)
            })
            .await?;
        Ok(updated == 1)
    }

    async fn mark_completed(
        &self,
        id: &str,
        output_path: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<(), JobStoreError> {
        let job_id = id.to_string();
        let output_path = output_path.to_string();
        let updated = self
            .interact(move |conn| {
                diesel::update(
                    signing_jobs::table
                        .filter(signing_jobs::id.eq(job_id))
                        .filter(signing_jobs::status.eq(JobStatus::Processing.as_str())),
                )
                .set((
                    signing_jobs::status.eq(JobStatus::Completed.as_str()),
                    signing_jobs::output_path.eq(Some(output_path)),
                    signing_jobs::completed_at.eq(Some(completed_at.naive_utc())),
                ))
                .execute(conn)
            })
            .await?;
        ensure_transitioned(updated, id, JobStatus::Completed)
    }

    async fn mark_failed(&self, id: &str, error: &str) -> Result<(), JobStoreError> {
        let job_id = id.to_string();
        let error = error.to_string();
        let updated = self
            .interact(move |conn| {
                diesel::update(
                    signing_jobs::table
                        .filter(signing_jobs::id.eq(job_id))
                        .filter(signing_jobs::status.eq(JobStatus::Processing.as_str())),
                )
                .set((
                    signing_jobs::status.eq(JobStatus::Failed.as_str()),
                    signing_jobs::error.eq(Some(error)),
                ))
                .execute(conn)
            })
            .await?;
        ensure_transitioned(updated, id, JobStatus::Failed)
    }

    async fn get(&self, id: &str) -> Result<Option<SigningJob>, JobStoreError> {
        let job_id = id.to_string();
        let row: Option<JobRow> = self
            .interact(move |conn| {
                signing_jobs::table
                    .find(job_id)
                    .select(JobRow::as_select())
                    .first(conn)
                    .optional()
            })
            .await?;
        row.map(SigningJob::try_from).transpose()
    }

    async fn enqueue(
        &self,
        input_path: &str,
        user_email: &str,
    ) -> Result<SigningJob, JobStoreError> {
        let job = SigningJob::pending(input_path, user_email);
        let row = NewJobRow {
            id: job.id.clone(),
            input_path: job.input_path.clone(),
            user_email: job.user_email.clone(),
            status: job.status.as_str().to_string(),
            created_at: job.created_at.unwrap_or_else(Utc::now).naive_utc(),
        };
        self.interact(move |conn| {
            diesel::insert_into(signing_jobs::table)
                .values(&row)
                .execute(conn)
        })
        .await?;
        Ok(job)
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
