use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::models::StudentInputRecord;

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_COUNT: usize = 100;
pub const HISTORY_WEEKS: usize = 5;

const FACULTY: [(&str, &str, &str); 4] = [
    ("F001", "Dr. Sarah Chen", "Advanced Algorithms"),
    ("F002", "Prof. Marcus Thorne", "System Architecture"),
    ("F003", "Dr. Elena Rodriguez", "Data Science"),
    ("F004", "Prof. Alan Turing", "Theoretical CS"),
];

fn clamp_metric(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

fn gaussian(rng: &mut StdRng, mean: f64, std_dev: f64) -> f64 {
    let z: f64 = rng.sample(StandardNormal);
    mean + std_dev * z
}

/// Deterministic stand-in cohort with correlated aptitude and coding metrics.
///
/// Every record carries [`HISTORY_WEEKS`] history points and a unique
/// `S{1000 + i}` id.
pub fn generate(count: usize, seed: u64) -> anyhow::Result<Vec<StudentInputRecord>> {
    let mut rng = StdRng::seed_from_u64(seed);

    let trend_choices = [-1.0, 0.0, 1.0];
    let trend_weights = WeightedIndex::new([0.2, 0.5, 0.3])?;
    let failed_weights = WeightedIndex::new([0.7, 0.2, 0.07, 0.03])?;
    let internship_weights = WeightedIndex::new([0.4, 0.5, 0.1])?;

    let records = (0..count)
        .map(|i| {
            let aptitude = clamp_metric(gaussian(&mut rng, 70.0, 15.0));
            let coding = clamp_metric(aptitude * 0.9 + gaussian(&mut rng, 0.0, 10.0));
            let attendance = clamp_metric(gaussian(&mut rng, 80.0, 10.0));
            let project = clamp_metric(gaussian(&mut rng, 75.0, 12.0));
            let soft_skills = clamp_metric(gaussian(&mut rng, 70.0, 10.0));
            let (faculty_id, faculty_name, subject) = FACULTY[rng.gen_range(0..FACULTY.len())];

            let current = 0.25 * aptitude
                + 0.30 * coding
                + 0.15 * soft_skills
                + 0.20 * project
                + 0.10 * attendance;
            let direction = trend_choices[trend_weights.sample(&mut rng)];
            let history_scores = (0..HISTORY_WEEKS)
                .rev()
                .map(|weeks_back| {
                    let noise = gaussian(&mut rng, 0.0, 3.0);
                    clamp_metric(current - direction * weeks_back as f64 * 2.0 + noise)
                })
                .collect();

            StudentInputRecord {
                student_id: format!("S{}", 1000 + i),
                name: format!("Synthetic Student {i}"),
                aptitude,
                coding,
                soft_skills,
                project,
                attendance,
                failed_tests: failed_weights.sample(&mut rng) as u32,
                internship_count: internship_weights.sample(&mut rng) as u32,
                faculty_id: faculty_id.to_string(),
                faculty_name: faculty_name.to_string(),
                subject: subject.to_string(),
                history_scores,
            }
        })
        .collect();

    Ok(records)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn same_seed_yields_same_batch() {
        let first = generate(20, DEFAULT_SEED).expect("batch");
        let second = generate(20, DEFAULT_SEED).expect("batch");
        assert_eq!(first, second);
    }

    #[test]
    fn batch_honours_record_contract() {
        let batch = generate(DEFAULT_COUNT, DEFAULT_SEED).expect("batch");
        assert_eq!(batch.len(), DEFAULT_COUNT);

        let ids: HashSet<&str> = batch.iter().map(|record| record.student_id.as_str()).collect();
        assert_eq!(ids.len(), batch.len());

        for record in &batch {
            for metric in [
                record.aptitude,
                record.coding,
                record.soft_skills,
                record.project,
                record.attendance,
            ] {
                assert!((0.0..=100.0).contains(&metric));
            }
            assert_eq!(record.history_scores.len(), HISTORY_WEEKS);
            assert!(record.failed_tests <= 3);
            assert!(record.internship_count <= 2);
        }
    }

    #[test]
    fn synthetic_batch_supports_global_history() {
        let batch = generate(50, 7).expect("batch");
        let report = crate::analysis::analyze(&batch, true).expect("analysis succeeds");
        assert_eq!(report.population.size, 50);
        assert_eq!(report.trends.global_history.len(), HISTORY_WEEKS);
        assert_eq!(report.distribution.total(), 50);
    }
}
