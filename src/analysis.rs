use std::collections::BTreeMap;

use chrono::Utc;
use thiserror::Error;
use tracing::warn;

use crate::models::{
    AnalyticsReport, Correlations, FacultyEffectiveness, Formulas, Outlier, PopulationSummary,
    RejectedRecord, RiskSummary, ScoreDistribution, StudentComputedRecord, StudentInputRecord,
    Trends,
};
use crate::scoring::{self, round2, round4};

pub const ENGINE_NAME: &str = "Rust Institutional Auditor v2.1";
const OUTLIER_Z_THRESHOLD: f64 = 2.0;
const PASS_MARK: f64 = 50.0;

pub const FORMULAS: Formulas = Formulas {
    overall: "0.25A + 0.30C + 0.15S + 0.20P + 0.10T",
    placement: "1 / (1 + e^-z)",
    z_score: "(x - μ) / σ",
    impact_score: "(Subj_Avg - Global_μ) + (Trend_Slope * 10)",
};

#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("{field} is not a finite number")]
    NonFinite { field: &'static str },
}

#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("no valid student records to analyze")]
    EmptyPopulation,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopulationMoments {
    pub mean: f64,
    pub std_dev: f64,
}

/// Applies the scoring formulas to one record. `z_score` is filled in by [`standardize`].
pub fn derive_record(input: &StudentInputRecord) -> Result<StudentComputedRecord, RecordError> {
    let metrics = [
        ("aptitude", input.aptitude),
        ("coding", input.coding),
        ("soft_skills", input.soft_skills),
        ("project", input.project),
        ("attendance", input.attendance),
    ];
    for (field, value) in metrics {
        if !value.is_finite() {
            return Err(RecordError::NonFinite { field });
        }
    }
    if input.history_scores.iter().any(|value| !value.is_finite()) {
        return Err(RecordError::NonFinite {
            field: "history_scores",
        });
    }

    Ok(StudentComputedRecord {
        overall_score: scoring::overall_score(
            input.aptitude,
            input.coding,
            input.soft_skills,
            input.project,
            input.attendance,
        ),
        risk_index: scoring::risk_index(
            input.attendance,
            input.failed_tests,
            input.internship_count,
        ),
        placement_prob: scoring::placement_probability(
            input.aptitude,
            input.coding,
            input.project,
            input.soft_skills,
        ),
        trend_slope: scoring::trend_slope(&input.history_scores),
        z_score: 0.0,
        input: input.clone(),
    })
}

/// Mean and sample standard deviation. A single value, or a population with
/// no spread, yields `std_dev == 0.0`.
pub fn moments(values: &[f64]) -> PopulationMoments {
    if values.is_empty() {
        return PopulationMoments {
            mean: 0.0,
            std_dev: 0.0,
        };
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return PopulationMoments { mean, std_dev: 0.0 };
    }

    let variance = values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / (n - 1.0);
    PopulationMoments {
        mean,
        std_dev: variance.sqrt(),
    }
}

impl PopulationMoments {
    /// False when the spread rounds to zero, i.e. identical scores up to float noise.
    pub fn has_spread(&self) -> bool {
        round2(self.std_dev) > 0.0
    }
}

pub fn standardize(records: &mut [StudentComputedRecord], population: PopulationMoments) {
    for record in records.iter_mut() {
        record.z_score = if population.has_spread() {
            (record.overall_score - population.mean) / population.std_dev
        } else {
            0.0
        };
    }
}

/// Pearson correlation; 0.0 when either series has no variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }

    let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
    let mean_y = ys[..n].iter().sum::<f64>() / n as f64;
    let mut covariance = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs[..n].iter().zip(&ys[..n]) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        covariance += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denominator = (var_x * var_y).sqrt();
    if denominator == 0.0 {
        0.0
    } else {
        covariance / denominator
    }
}

pub fn distribution(records: &[StudentComputedRecord]) -> ScoreDistribution {
    let mut buckets = ScoreDistribution::default();
    for record in records {
        let score = record.overall_score;
        if score <= 40.0 {
            buckets.fail += 1;
        } else if score <= 60.0 {
            buckets.average += 1;
        } else if score <= 75.0 {
            buckets.good += 1;
        } else if score <= 90.0 {
            buckets.very_good += 1;
        } else {
            buckets.excellent += 1;
        }
    }
    buckets
}

pub fn risk_summary(records: &[StudentComputedRecord]) -> RiskSummary {
    let mut summary = RiskSummary::default();
    for record in records {
        match record.risk_index {
            risk if risk <= 0.3 => summary.safe += 1,
            risk if risk <= 0.6 => summary.monitor += 1,
            _ => summary.critical += 1,
        }
    }
    summary
}

pub fn outliers(records: &[StudentComputedRecord]) -> Vec<Outlier> {
    records
        .iter()
        .filter(|record| record.z_score.abs() > OUTLIER_Z_THRESHOLD)
        .map(|record| Outlier {
            student_id: record.input.student_id.clone(),
            name: record.input.name.clone(),
            overall_score: record.overall_score,
            z_score: record.z_score,
        })
        .collect()
}

#[derive(Default)]
struct CohortAccumulator {
    count: usize,
    score_total: f64,
    passed: usize,
    trend_total: f64,
}

pub fn faculty_effectiveness(
    records: &[StudentComputedRecord],
    population_mean: f64,
) -> Vec<FacultyEffectiveness> {
    let mut cohorts: BTreeMap<(String, String, String), CohortAccumulator> = BTreeMap::new();

    for record in records {
        let key = (
            record.input.faculty_id.clone(),
            record.input.faculty_name.clone(),
            record.input.subject.clone(),
        );
        let entry = cohorts.entry(key).or_default();
        entry.count += 1;
        entry.score_total += record.overall_score;
        entry.trend_total += record.trend_slope;
        if record.overall_score > PASS_MARK {
            entry.passed += 1;
        }
    }

    cohorts
        .into_iter()
        .map(|((faculty_id, faculty_name, subject), acc)| {
            let count = acc.count as f64;
            let avg_score = acc.score_total / count;
            let avg_trend = acc.trend_total / count;
            FacultyEffectiveness {
                faculty_id,
                faculty_name,
                subject,
                student_count: acc.count,
                avg_score: round2(avg_score),
                pass_rate: round2(acc.passed as f64 / count * 100.0),
                avg_trend: round2(avg_trend),
                impact_score: round2((avg_score - population_mean) + avg_trend * 10.0),
            }
        })
        .collect()
}

/// Element-wise mean of every history, or an empty curve when lengths differ.
pub fn global_history(records: &[StudentComputedRecord]) -> Vec<f64> {
    let Some(first) = records.first() else {
        return Vec::new();
    };
    let width = first.input.history_scores.len();
    if let Some(mismatch) = records
        .iter()
        .find(|record| record.input.history_scores.len() != width)
    {
        warn!(
            expected = width,
            found = mismatch.input.history_scores.len(),
            student_id = %mismatch.input.student_id,
            "history aggregation skipped: history lengths differ"
        );
        return Vec::new();
    }

    let n = records.len() as f64;
    (0..width)
        .map(|week| {
            let total: f64 = records
                .iter()
                .map(|record| record.input.history_scores[week])
                .sum();
            round2(total / n)
        })
        .collect()
}

pub fn analyze(
    records: &[StudentInputRecord],
    is_mock: bool,
) -> Result<AnalyticsReport, AnalysisError> {
    let mut computed = Vec::with_capacity(records.len());
    let mut rejected = Vec::new();
    for record in records {
        match derive_record(record) {
            Ok(derived) => computed.push(derived),
            Err(err) => {
                warn!(student_id = %record.student_id, error = %err, "skipping student record");
                rejected.push(RejectedRecord {
                    student_id: record.student_id.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    if computed.is_empty() {
        return Err(AnalysisError::EmptyPopulation);
    }

    let scores: Vec<f64> = computed.iter().map(|record| record.overall_score).collect();
    let population = moments(&scores);
    standardize(&mut computed, population);

    let attendance: Vec<f64> = computed.iter().map(|record| record.input.attendance).collect();
    let coding: Vec<f64> = computed.iter().map(|record| record.input.coding).collect();
    let placement: Vec<f64> = computed.iter().map(|record| record.placement_prob).collect();

    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Ok(AnalyticsReport {
        engine: ENGINE_NAME,
        is_mock,
        generated_at: Utc::now(),
        population: PopulationSummary {
            size: computed.len(),
            mean: round2(population.mean),
            std_dev: round2(population.std_dev),
            min: round2(min),
            max: round2(max),
        },
        correlations: Correlations {
            attendance_vs_overall: round4(pearson(&attendance, &scores)),
            coding_vs_placement: round4(pearson(&coding, &placement)),
        },
        distribution: distribution(&computed),
        risk_summary: risk_summary(&computed),
        outliers: outliers(&computed),
        faculty_effectiveness: faculty_effectiveness(&computed, population.mean),
        trends: Trends {
            global_history: global_history(&computed),
        },
        formulas: FORMULAS,
        rejected,
    })
}
