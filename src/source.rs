use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::db;
use crate::models::{RejectedRecord, StudentInputRecord};
use crate::synthetic;

/// A student row as it arrives from a store or file, before defaults apply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStudentRow {
    pub student_id: Option<String>,
    pub name: Option<String>,
    pub aptitude: Option<f64>,
    pub coding: Option<f64>,
    pub soft_skills: Option<f64>,
    pub project: Option<f64>,
    pub attendance: Option<f64>,
    pub failed_tests: Option<i64>,
    pub internship_count: Option<i64>,
    pub faculty_id: Option<String>,
    pub faculty_name: Option<String>,
    pub subject: Option<String>,
    pub history_scores: Vec<f64>,
}

/// CSV layout; `history_scores` is a `;`-separated list such as `61.5;63;64.2`.
#[derive(Debug, Deserialize)]
pub struct CsvStudentRow {
    pub student_id: Option<String>,
    pub name: Option<String>,
    pub aptitude: Option<f64>,
    pub coding: Option<f64>,
    pub soft_skills: Option<f64>,
    pub project: Option<f64>,
    pub attendance: Option<f64>,
    pub failed_tests: Option<i64>,
    pub internship_count: Option<i64>,
    pub faculty_id: Option<String>,
    pub faculty_name: Option<String>,
    pub subject: Option<String>,
    pub history_scores: Option<String>,
}

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("student_id is missing")]
    MissingId,
    #[error("duplicate student_id in batch")]
    DuplicateId,
    #[error("{0} is not a finite number")]
    NonFinite(&'static str),
    #[error("history value `{0}` is not a number")]
    BadHistory(String),
}

impl TryFrom<CsvStudentRow> for RawStudentRow {
    type Error = NormalizeError;

    fn try_from(row: CsvStudentRow) -> Result<Self, Self::Error> {
        let history_scores = match row.history_scores.as_deref() {
            None => Vec::new(),
            Some(raw) => parse_history(raw)?,
        };

        Ok(RawStudentRow {
            student_id: row.student_id,
            name: row.name,
            aptitude: row.aptitude,
            coding: row.coding,
            soft_skills: row.soft_skills,
            project: row.project,
            attendance: row.attendance,
            failed_tests: row.failed_tests,
            internship_count: row.internship_count,
            faculty_id: row.faculty_id,
            faculty_name: row.faculty_name,
            subject: row.subject,
            history_scores,
        })
    }
}

pub fn parse_history(raw: &str) -> Result<Vec<f64>, NormalizeError> {
    raw.split(';')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            value
                .parse::<f64>()
                .map_err(|_| NormalizeError::BadHistory(value.to_string()))
        })
        .collect()
}

fn metric(value: Option<f64>, field: &'static str) -> Result<f64, NormalizeError> {
    let value = value.unwrap_or(0.0);
    if value.is_finite() {
        Ok(value)
    } else {
        Err(NormalizeError::NonFinite(field))
    }
}

fn non_negative_count(value: Option<i64>) -> u32 {
    value.unwrap_or(0).clamp(0, i64::from(u32::MAX)) as u32
}

/// Fills documented defaults: missing numbers become 0, missing labels become empty.
pub fn normalize(row: RawStudentRow) -> Result<StudentInputRecord, NormalizeError> {
    let student_id = row
        .student_id
        .filter(|id| !id.trim().is_empty())
        .ok_or(NormalizeError::MissingId)?;

    if row.history_scores.iter().any(|value| !value.is_finite()) {
        return Err(NormalizeError::NonFinite("history_scores"));
    }

    Ok(StudentInputRecord {
        name: row.name.unwrap_or_default(),
        aptitude: metric(row.aptitude, "aptitude")?,
        coding: metric(row.coding, "coding")?,
        soft_skills: metric(row.soft_skills, "soft_skills")?,
        project: metric(row.project, "project")?,
        attendance: metric(row.attendance, "attendance")?,
        failed_tests: non_negative_count(row.failed_tests),
        internship_count: non_negative_count(row.internship_count),
        faculty_id: row.faculty_id.unwrap_or_default(),
        faculty_name: row.faculty_name.unwrap_or_default(),
        subject: row.subject.unwrap_or_default(),
        history_scores: row.history_scores,
        student_id,
    })
}

/// Normalizes each row independently; bad rows and repeated ids are reported, not fatal.
pub fn normalize_batch(rows: Vec<RawStudentRow>) -> (Vec<StudentInputRecord>, Vec<RejectedRecord>) {
    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(rows.len());
    let mut rejected = Vec::new();

    for row in rows {
        let label = row.student_id.clone().unwrap_or_else(|| "<missing>".to_string());
        let outcome = normalize(row).and_then(|record| {
            if seen.insert(record.student_id.clone()) {
                Ok(record)
            } else {
                Err(NormalizeError::DuplicateId)
            }
        });

        match outcome {
            Ok(record) => records.push(record),
            Err(err) => {
                warn!(student_id = %label, error = %err, "rejecting student row");
                rejected.push(RejectedRecord {
                    student_id: label,
                    reason: err.to_string(),
                });
            }
        }
    }

    (records, rejected)
}

/// Reads CSV rows; rows that fail to parse are returned as rejections.
pub fn read_csv(path: &Path) -> anyhow::Result<(Vec<RawStudentRow>, Vec<RejectedRecord>)> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut rows = Vec::new();
    let mut rejected = Vec::new();

    for (index, result) in reader.deserialize::<CsvStudentRow>().enumerate() {
        let line = index + 2;
        match result.map_err(|err| err.to_string()).and_then(|row| {
            RawStudentRow::try_from(row).map_err(|err| err.to_string())
        }) {
            Ok(row) => rows.push(row),
            Err(reason) => {
                warn!(line, %reason, "skipping unreadable CSV row");
                rejected.push(RejectedRecord {
                    student_id: format!("<line {line}>"),
                    reason,
                });
            }
        }
    }

    Ok((rows, rejected))
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataOrigin {
    Csv(PathBuf),
    Store,
    Synthetic,
}

impl fmt::Display for DataOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataOrigin::Csv(path) => write!(f, "csv:{}", path.display()),
            DataOrigin::Store => write!(f, "store"),
            DataOrigin::Synthetic => write!(f, "synthetic"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceOptions {
    pub csv: Option<PathBuf>,
    pub database_url: Option<String>,
    pub connect_timeout: Duration,
    pub synthetic_count: usize,
}

#[derive(Debug)]
pub struct Acquired {
    pub records: Vec<StudentInputRecord>,
    pub rejected: Vec<RejectedRecord>,
    pub origin: DataOrigin,
}

impl Acquired {
    pub fn is_mock(&self) -> bool {
        self.origin == DataOrigin::Synthetic
    }
}

async fn fetch_store(url: &str, timeout: Duration) -> anyhow::Result<Vec<RawStudentRow>> {
    tokio::time::timeout(timeout, async {
        let pool = db::connect(url, timeout).await?;
        db::fetch_students(&pool).await
    })
    .await
    .context("timed out reaching the student store")?
}

type Upstream = (Vec<RawStudentRow>, Vec<RejectedRecord>, DataOrigin);

async fn store_upstream(options: &SourceOptions) -> anyhow::Result<Upstream> {
    let url = options
        .database_url
        .as_deref()
        .context("no DATABASE_URL configured")?;
    let rows = fetch_store(url, options.connect_timeout).await?;
    Ok((rows, Vec::new(), DataOrigin::Store))
}

/// Loads student records from CSV or the store, falling back to a synthetic
/// batch when the upstream is unreachable or yields nothing usable. A named
/// CSV file that cannot be opened is an error rather than a fallback.
pub async fn acquire(options: &SourceOptions) -> anyhow::Result<Acquired> {
    let upstream = match &options.csv {
        Some(path) => {
            let (rows, rejected) = read_csv(path)?;
            Ok((rows, rejected, DataOrigin::Csv(path.clone())))
        }
        None => store_upstream(options).await,
    };

    match upstream {
        Ok((rows, mut rejected, origin)) => {
            let (records, normalize_rejects) = normalize_batch(rows);
            rejected.extend(normalize_rejects);
            if !records.is_empty() {
                info!(%origin, students = records.len(), "student records acquired");
                return Ok(Acquired {
                    records,
                    rejected,
                    origin,
                });
            }
            warn!(%origin, "no usable students upstream, falling back to synthetic data");
        }
        Err(err) => {
            warn!(
                error = %format!("{err:#}"),
                "data acquisition failed, falling back to synthetic data"
            );
        }
    }

    let count = options.synthetic_count.max(1);
    let records = synthetic::generate(count, synthetic::DEFAULT_SEED)?;
    info!(students = records.len(), "synthetic batch generated");
    Ok(Acquired {
        records,
        rejected: Vec::new(),
        origin: DataOrigin::Synthetic,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const HEADER: &str = "student_id,name,aptitude,coding,soft_skills,project,attendance,\
                          failed_tests,internship_count,faculty_id,faculty_name,subject,\
                          history_scores";
    const AVERY: &str = "S1,Avery Lee,70,80,65,75,90,0,1,F001,Dr. Sarah Chen,\
                         Advanced Algorithms,60;62;64";

    fn csv_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "{HEADER}").expect("write header");
        for line in lines {
            writeln!(file, "{line}").expect("write row");
        }
        file
    }

    fn options(csv: Option<PathBuf>) -> SourceOptions {
        SourceOptions {
            csv,
            database_url: None,
            connect_timeout: Duration::from_millis(50),
            synthetic_count: 12,
        }
    }

    #[test]
    fn missing_numbers_default_to_zero() {
        let record = normalize(RawStudentRow {
            student_id: Some("S1".to_string()),
            coding: Some(80.0),
            failed_tests: Some(-3),
            ..RawStudentRow::default()
        })
        .expect("valid row");
        assert_eq!(record.aptitude, 0.0);
        assert_eq!(record.coding, 80.0);
        assert_eq!(record.failed_tests, 0);
        assert_eq!(record.faculty_id, "");
    }

    #[test]
    fn rows_without_ids_or_with_repeats_are_rejected() {
        let rows = vec![
            RawStudentRow {
                student_id: Some("S1".to_string()),
                ..RawStudentRow::default()
            },
            RawStudentRow::default(),
            RawStudentRow {
                student_id: Some("S1".to_string()),
                ..RawStudentRow::default()
            },
        ];
        let (records, rejected) = normalize_batch(rows);
        assert_eq!(records.len(), 1);
        assert_eq!(rejected.len(), 2);
        assert_eq!(rejected[0].reason, "student_id is missing");
        assert_eq!(rejected[1].reason, "duplicate student_id in batch");
    }

    #[test]
    fn history_lists_parse_with_separators() {
        assert_eq!(parse_history("60; 61.5;63;"), Ok(vec![60.0, 61.5, 63.0]));
        assert_eq!(
            parse_history("60;abc"),
            Err(NormalizeError::BadHistory("abc".to_string()))
        );
    }

    #[test]
    fn reads_csv_and_skips_bad_rows() {
        let file = csv_file(&[
            AVERY,
            "S2,Jules Moreno,55,,60,70,50,2,0,F002,Prof. Marcus Thorne,System Architecture,50;49;48",
            "S3,Kiara Patel,70,80,65,75,90,0,1,F001,Dr. Sarah Chen,Advanced Algorithms,60;oops",
        ]);
        let (rows, rejected) = read_csv(file.path()).expect("csv readable");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].coding, None);
        assert_eq!(rows[0].history_scores, vec![60.0, 62.0, 64.0]);
        assert_eq!(rejected.len(), 1);
    }

    #[tokio::test]
    async fn acquire_prefers_csv_when_given() {
        let file = csv_file(&[AVERY]);
        let acquired = acquire(&options(Some(file.path().to_path_buf())))
            .await
            .expect("acquired");
        assert!(!acquired.is_mock());
        assert_eq!(acquired.records.len(), 1);
        assert_eq!(acquired.records[0].name, "Avery Lee");
    }

    #[tokio::test]
    async fn acquire_falls_back_without_upstream() {
        let acquired = acquire(&options(None)).await.expect("acquired");
        assert!(acquired.is_mock());
        assert_eq!(acquired.records.len(), 12);
    }

    #[tokio::test]
    async fn acquire_fails_on_missing_csv() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("students.csv");
        let err = acquire(&options(Some(missing))).await.expect_err("missing file");
        assert!(format!("{err:#}").contains("failed to open"));
    }

    #[tokio::test]
    async fn acquire_falls_back_on_empty_csv() {
        let file = csv_file(&[]);
        let acquired = acquire(&options(Some(file.path().to_path_buf())))
            .await
            .expect("acquired");
        assert_eq!(acquired.origin, DataOrigin::Synthetic);
    }
}
