// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply job queue operations.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use switchboard_core::{Job, JobCompletion, JobStatus, SwitchboardError};

use super::{json_column, parse_column, parse_optional_column, timestamp};
use crate::database::{Database, map_tr_err};
use crate::models::JobCounts;

const JOB_COLUMNS: &str = "id, conversation_id, message_id, user_message, conversation_context, \
     priority, status, created_at, completed_at, response, confidence, requires_human, \
     processing_time_ms, error";

fn job_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        message_id: row.get(2)?,
        user_message: row.get(3)?,
        conversation_context: json_column(row, 4)?,
        priority: row.get(5)?,
        status: parse_column(row, 6)?,
        created_at: parse_column(row, 7)?,
        completed_at: parse_optional_column(row, 8)?,
        response: row.get(9)?,
        confidence: row.get(10)?,
        requires_human: row.get(11)?,
        processing_time_ms: row
            .get::<_, Option<i64>>(12)?
            .map(|ms| u64::try_from(ms).unwrap_or(0)),
        error: row.get(13)?,
    })
}

/// Insert a new job. Its status is stored as given.
pub async fn insert_job(db: &Database, job: &Job) -> Result<(), SwitchboardError> {
    let context = serde_json::to_string(&job.conversation_context).map_err(|e| {
        SwitchboardError::Storage {
            source: Box::new(e),
        }
    })?;
    let job = job.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO jobs (id, conversation_id, message_id, user_message, \
                 conversation_context, priority, status, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    job.id,
                    job.conversation_id,
                    job.message_id,
                    job.user_message,
                    context,
                    job.priority,
                    job.status.to_string(),
                    timestamp(&job.created_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Atomically claim the best pending job.
///
/// Highest priority first, then oldest. The update is guarded by
/// `status = 'pending'` inside one transaction on the single writer.
pub async fn claim_next_job(
    db: &Database,
    now: DateTime<Utc>,
) -> Result<Option<Job>, SwitchboardError> {
    let started_at = timestamp(&now);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let candidate = tx
                .query_row(
                    &format!(
                        "SELECT {JOB_COLUMNS} FROM jobs WHERE status = 'pending' \
                         ORDER BY priority DESC, created_at ASC, rowid ASC LIMIT 1"
                    ),
                    [],
                    job_from_row,
                )
                .optional()?;

            let Some(mut job) = candidate else {
                tx.commit()?;
                return Ok(None);
            };

            let claimed = tx.execute(
                "UPDATE jobs SET status = 'processing', started_at = ?2 \
                 WHERE id = ?1 AND status = 'pending'",
                params![job.id, started_at],
            )?;
            tx.commit()?;

            if claimed == 0 {
                return Ok(None);
            }
            job.status = JobStatus::Processing;
            Ok(Some(job))
        })
        .await
        .map_err(map_tr_err)
}

/// Move a processing job to `completed` with its outcome.
pub async fn complete_job(
    db: &Database,
    job_id: &str,
    completion: &JobCompletion,
    now: DateTime<Utc>,
) -> Result<(), SwitchboardError> {
    let id = job_id.to_string();
    let completion = completion.clone();
    let completed_at = timestamp(&now);
    let processing_time_ms = i64::try_from(completion.processing_time_ms).unwrap_or(i64::MAX);

    let (changed, current) = db
        .connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE jobs SET status = 'completed', completed_at = ?2, response = ?3, \
                 confidence = ?4, requires_human = ?5, processing_time_ms = ?6, \
                 intent = ?7, sentiment = ?8 \
                 WHERE id = ?1 AND status = 'processing'",
                params![
                    id,
                    completed_at,
                    completion.response,
                    completion.confidence,
                    completion.requires_human,
                    processing_time_ms,
                    completion.intent.map(|i| i.to_string()),
                    completion.sentiment.map(|s| s.to_string()),
                ],
            )?;
            let current = if changed == 0 {
                current_status(conn, &id)?
            } else {
                None
            };
            Ok((changed, current))
        })
        .await
        .map_err(map_tr_err)?;

    check_transition(job_id, JobStatus::Completed, changed, current)
}

/// Move a processing job to `failed` with an error message.
pub async fn fail_job(
    db: &Database,
    job_id: &str,
    error: &str,
    now: DateTime<Utc>,
) -> Result<(), SwitchboardError> {
    let id = job_id.to_string();
    let error = error.to_string();
    let completed_at = timestamp(&now);

    let (changed, current) = db
        .connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE jobs SET status = 'failed', completed_at = ?2, error = ?3 \
                 WHERE id = ?1 AND status = 'processing'",
                params![id, completed_at, error],
            )?;
            let current = if changed == 0 {
                current_status(conn, &id)?
            } else {
                None
            };
            Ok((changed, current))
        })
        .await
        .map_err(map_tr_err)?;

    check_transition(job_id, JobStatus::Failed, changed, current)
}

fn current_status(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row("SELECT status FROM jobs WHERE id = ?1", params![id], |row| {
        row.get(0)
    })
    .optional()
}

fn check_transition(
    job_id: &str,
    to: JobStatus,
    changed: usize,
    current: Option<String>,
) -> Result<(), SwitchboardError> {
    if changed > 0 {
        return Ok(());
    }
    match current {
        None => Err(SwitchboardError::NotFound {
            kind: "job",
            id: job_id.to_string(),
        }),
        Some(raw) => {
            let from: JobStatus = raw
                .parse()
                .map_err(|_| SwitchboardError::storage(format!("job {job_id} has status {raw}")))?;
            Err(SwitchboardError::InvalidTransition {
                job_id: job_id.to_string(),
                from,
                to,
            })
        }
    }
}

/// Look up a job by id.
pub async fn get_job(db: &Database, job_id: &str) -> Result<Option<Job>, SwitchboardError> {
    let id = job_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
                params![id],
                job_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent jobs first, optionally filtered by status.
pub async fn list_jobs(
    db: &Database,
    status: Option<JobStatus>,
    limit: usize,
) -> Result<Vec<Job>, SwitchboardError> {
    let status = status.map(|s| s.to_string());
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM jobs WHERE (?1 IS NULL OR status = ?1) \
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![status, limit], job_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Number of jobs in each status.
pub async fn job_counts(db: &Database) -> Result<JobCounts, SwitchboardError> {
    let rows = db
        .connection()
        .call(|conn| {
            let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status")?;
            let rows = stmt.query_map([], |row| Ok((parse_column(row, 0)?, row.get(1)?)))?;
            rows.collect::<Result<Vec<(JobStatus, i64)>, _>>()
        })
        .await
        .map_err(map_tr_err)?;

    let mut counts = JobCounts::default();
    for (status, count) in rows {
        let count = u64::try_from(count).unwrap_or(0);
        match status {
            JobStatus::Pending => counts.pending = count,
            JobStatus::Processing => counts.processing = count,
            JobStatus::Completed => counts.completed = count,
            JobStatus::Failed => counts.failed = count,
        }
    }
    Ok(counts)
}
