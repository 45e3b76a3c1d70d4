use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::warn;
use uuid::Uuid;

use crate::models::StudentInputRecord;
use crate::source::{self, RawStudentRow};

pub async fn connect(database_url: &str, timeout: Duration) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(timeout)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn upsert_student(pool: &PgPool, record: &StudentInputRecord) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO student_analytics.students
        (id, student_id, full_name, aptitude, coding, soft_skills, project, attendance,
         failed_tests, internship_count, faculty_id, faculty_name, subject, history_scores)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        ON CONFLICT (student_id) DO UPDATE
        SET full_name = EXCLUDED.full_name,
            aptitude = EXCLUDED.aptitude,
            coding = EXCLUDED.coding,
            soft_skills = EXCLUDED.soft_skills,
            project = EXCLUDED.project,
            attendance = EXCLUDED.attendance,
            failed_tests = EXCLUDED.failed_tests,
            internship_count = EXCLUDED.internship_count,
            faculty_id = EXCLUDED.faculty_id,
            faculty_name = EXCLUDED.faculty_name,
            subject = EXCLUDED.subject,
            history_scores = EXCLUDED.history_scores
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&record.student_id)
    .bind(&record.name)
    .bind(record.aptitude)
    .bind(record.coding)
    .bind(record.soft_skills)
    .bind(record.project)
    .bind(record.attendance)
    .bind(i64::from(record.failed_tests))
    .bind(i64::from(record.internship_count))
    .bind(&record.faculty_id)
    .bind(&record.faculty_name)
    .bind(&record.subject)
    .bind(record.history_scores.as_slice())
    .execute(pool)
    .await
    .with_context(|| format!("failed to store student {}", record.student_id))?;

    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool, records: &[StudentInputRecord]) -> anyhow::Result<usize> {
    let mut stored = 0usize;
    for record in records {
        if upsert_student(pool, record).await? {
            stored += 1;
        }
    }
    Ok(stored)
}

pub async fn fetch_students(pool: &PgPool) -> anyhow::Result<Vec<RawStudentRow>> {
    let records = sqlx::query(
        "SELECT student_id, full_name, aptitude, coding, soft_skills, project, attendance, \
         failed_tests, internship_count, faculty_id, faculty_name, subject, history_scores \
         FROM student_analytics.students \
         ORDER BY student_id",
    )
    .fetch_all(pool)
    .await
    .context("failed to fetch students")?;

    let mut students = Vec::with_capacity(records.len());
    for row in records {
        let history: Option<Vec<f64>> = row.try_get("history_scores")?;
        students.push(RawStudentRow {
            student_id: row.try_get("student_id")?,
            name: row.try_get("full_name")?,
            aptitude: row.try_get("aptitude")?,
            coding: row.try_get("coding")?,
            soft_skills: row.try_get("soft_skills")?,
            project: row.try_get("project")?,
            attendance: row.try_get("attendance")?,
            failed_tests: row.try_get("failed_tests")?,
            internship_count: row.try_get("internship_count")?,
            faculty_id: row.try_get("faculty_id")?,
            faculty_name: row.try_get("faculty_name")?,
            subject: row.try_get("subject")?,
            history_scores: history.unwrap_or_default(),
        });
    }

    Ok(students)
}

/// Imports CSV student rows, returning how many were stored. Rows that cannot
/// be read or normalized are logged and skipped.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let (rows, unreadable) = source::read_csv(csv_path)?;
    let (records, rejected) = source::normalize_batch(rows);
    let skipped = unreadable.len() + rejected.len();
    if skipped > 0 {
        warn!(skipped, path = %csv_path.display(), "some CSV rows were not imported");
    }

    seed(pool, &records).await
}
