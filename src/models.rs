use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentInputRecord {
    pub student_id: String,
    pub name: String,
    pub aptitude: f64,
    pub coding: f64,
    pub soft_skills: f64,
    pub project: f64,
    pub attendance: f64,
    pub failed_tests: u32,
    pub internship_count: u32,
    pub faculty_id: String,
    pub faculty_name: String,
    pub subject: String,
    pub history_scores: Vec<f64>,
}

/// Input record plus the derived per-student scores of one analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentComputedRecord {
    pub input: StudentInputRecord,
    pub overall_score: f64,
    pub risk_index: f64,
    pub placement_prob: f64,
    pub trend_slope: f64,
    pub z_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulationSummary {
    pub size: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correlations {
    pub attendance_vs_overall: f64,
    pub coding_vs_placement: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScoreDistribution {
    #[serde(rename = "Fail (0-40)")]
    pub fail: usize,
    #[serde(rename = "Average (41-60)")]
    pub average: usize,
    #[serde(rename = "Good (61-75)")]
    pub good: usize,
    #[serde(rename = "Very Good (76-90)")]
    pub very_good: usize,
    #[serde(rename = "Excellent (91-100)")]
    pub excellent: usize,
}

impl ScoreDistribution {
    pub fn total(&self) -> usize {
        self.fail + self.average + self.good + self.very_good + self.excellent
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RiskSummary {
    pub safe: usize,
    pub monitor: usize,
    pub critical: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outlier {
    pub student_id: String,
    pub name: String,
    pub overall_score: f64,
    pub z_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacultyEffectiveness {
    pub faculty_id: String,
    pub faculty_name: String,
    pub subject: String,
    pub student_count: usize,
    pub avg_score: f64,
    pub pass_rate: f64,
    pub avg_trend: f64,
    pub impact_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Trends {
    pub global_history: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Formulas {
    pub overall: &'static str,
    pub placement: &'static str,
    pub z_score: &'static str,
    pub impact_score: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRecord {
    pub student_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub engine: &'static str,
    pub is_mock: bool,
    pub generated_at: DateTime<Utc>,
    pub population: PopulationSummary,
    pub correlations: Correlations,
    pub distribution: ScoreDistribution,
    pub risk_summary: RiskSummary,
    pub outliers: Vec<Outlier>,
    pub faculty_effectiveness: Vec<FacultyEffectiveness>,
    pub trends: Trends,
    pub formulas: Formulas,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedRecord>,
}

/// Metric name to value, e.g. `{"coding": 80.0}`.
pub type MetricSet = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScorePair {
    pub overall_score: f64,
    pub placement_prob: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatedScores {
    pub overall_score: f64,
    pub placement_prob: f64,
    pub deltas: ScorePair,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub original: ScorePair,
    pub simulated: SimulatedScores,
    pub inputs: MetricSet,
}
