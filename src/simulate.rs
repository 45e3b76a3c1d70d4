use std::collections::BTreeMap;

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::models::{MetricSet, ScorePair, SimulatedScores, SimulationResult};
use crate::scoring::{overall_score, placement_probability, round2};

#[derive(Debug, Error, PartialEq)]
pub enum SimulationError {
    #[error("request is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("`{0}` must be an object")]
    NotAnObject(&'static str),
    #[error("`{section}.{key}` must be a number")]
    NotANumber { section: &'static str, key: String },
    #[error("failed to encode simulation result: {0}")]
    Encode(String),
}

fn metric(metrics: &MetricSet, key: &str) -> f64 {
    metrics.get(key).copied().unwrap_or(0.0)
}

fn score(metrics: &MetricSet) -> ScorePair {
    ScorePair {
        overall_score: overall_score(
            metric(metrics, "aptitude"),
            metric(metrics, "coding"),
            metric(metrics, "soft_skills"),
            metric(metrics, "project"),
            metric(metrics, "attendance"),
        ),
        placement_prob: placement_probability(
            metric(metrics, "aptitude"),
            metric(metrics, "coding"),
            metric(metrics, "project"),
            metric(metrics, "soft_skills"),
        ),
    }
}

/// Re-scores `current` after applying `changes`. Changed metrics are clamped
/// to [0, 100]; changes for metrics absent from `current` are ignored.
pub fn simulate(current: &MetricSet, changes: &MetricSet) -> SimulationResult {
    let mut simulated = current.clone();
    for (key, delta) in changes {
        if let Some(value) = simulated.get_mut(key) {
            *value = (*value + delta).clamp(0.0, 100.0);
        }
    }

    let original = score(current);
    let after = score(&simulated);

    SimulationResult {
        original,
        simulated: SimulatedScores {
            overall_score: after.overall_score,
            placement_prob: after.placement_prob,
            deltas: ScorePair {
                overall_score: round2(after.overall_score - original.overall_score),
                placement_prob: round2(after.placement_prob - original.placement_prob),
            },
        },
        inputs: simulated,
    }
}

fn metric_section(
    request: &Map<String, Value>,
    section: &'static str,
) -> Result<MetricSet, SimulationError> {
    let Some(value) = request.get(section) else {
        return Ok(BTreeMap::new());
    };
    let object = value.as_object().ok_or(SimulationError::NotAnObject(section))?;

    object
        .iter()
        .map(|(key, value)| {
            value
                .as_f64()
                .map(|number| (key.clone(), number))
                .ok_or_else(|| SimulationError::NotANumber {
                    section,
                    key: key.clone(),
                })
        })
        .collect()
}

pub fn parse_request(raw: &str) -> Result<(MetricSet, MetricSet), SimulationError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|err| SimulationError::InvalidJson(err.to_string()))?;
    let request = value.as_object().ok_or(SimulationError::NotAnObject("request"))?;
    Ok((metric_section(request, "current")?, metric_section(request, "changes")?))
}

/// JSON boundary: always answers with either a result object or `{"error": ...}`.
pub fn simulate_request(raw: &str) -> Result<Value, Value> {
    let outcome = parse_request(raw).and_then(|(current, changes)| {
        serde_json::to_value(simulate(&current, &changes))
            .map_err(|err| SimulationError::Encode(err.to_string()))
    });
    outcome.map_err(|err| json!({ "error": err.to_string() }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(pairs: &[(&str, f64)]) -> MetricSet {
        pairs.iter().map(|(key, value)| (key.to_string(), *value)).collect()
    }

    fn baseline() -> MetricSet {
        metrics(&[
            ("aptitude", 70.0),
            ("coding", 95.0),
            ("soft_skills", 65.0),
            ("project", 80.0),
            ("attendance", 88.0),
        ])
    }

    #[test]
    fn empty_changes_leave_scores_untouched() {
        let result = simulate(&baseline(), &MetricSet::new());
        assert_eq!(result.simulated.overall_score, result.original.overall_score);
        assert_eq!(result.simulated.placement_prob, result.original.placement_prob);
        assert_eq!(result.simulated.deltas.overall_score, 0.0);
        assert_eq!(result.simulated.deltas.placement_prob, 0.0);
        assert_eq!(result.inputs, baseline());
    }

    #[test]
    fn changes_are_clamped_to_metric_range() {
        let result = simulate(&baseline(), &metrics(&[("coding", 20.0), ("attendance", -120.0)]));
        assert_eq!(result.inputs["coding"], 100.0);
        assert_eq!(result.inputs["attendance"], 0.0);
    }

    #[test]
    fn unknown_change_keys_are_ignored() {
        let result = simulate(&baseline(), &metrics(&[("charisma", 10.0)]));
        assert!(!result.inputs.contains_key("charisma"));
        assert_eq!(result.simulated.deltas.overall_score, 0.0);
    }

    #[test]
    fn coding_gain_moves_both_scores() {
        let current = metrics(&[
            ("aptitude", 60.0),
            ("coding", 50.0),
            ("soft_skills", 60.0),
            ("project", 60.0),
            ("attendance", 60.0),
        ]);
        let result = simulate(&current, &metrics(&[("coding", 10.0)]));
        assert_eq!(result.simulated.deltas.overall_score, 3.0);
        assert!(result.simulated.deltas.placement_prob > 0.0);
    }

    #[test]
    fn missing_metrics_default_to_zero() {
        let result = simulate(&metrics(&[("aptitude", 80.0)]), &MetricSet::new());
        assert_eq!(result.original.overall_score, 20.0);
        assert_eq!(result.original.placement_prob, 50.0);
    }

    #[test]
    fn request_round_trip_produces_response_shape() {
        let request = r#"{"current": {"coding": 95, "aptitude": 70}, "changes": {"coding": 20}}"#;
        let response = simulate_request(request).expect("valid request");
        assert_eq!(response["inputs"]["coding"], 100.0);
        assert!(response["original"]["overall_score"].is_number());
        assert!(response["simulated"]["deltas"]["placement_prob"].is_number());
    }

    #[test]
    fn malformed_requests_become_error_objects() {
        let request = r#"{"current": {"coding": 90}, "changes": {"coding": "a lot"}}"#;
        let non_numeric = simulate_request(request).expect_err("non-numeric delta");
        assert_eq!(non_numeric["error"], "`changes.coding` must be a number");

        let not_mapping = simulate_request(r#"{"current": [1, 2, 3]}"#).expect_err("array current");
        assert_eq!(not_mapping["error"], "`current` must be an object");

        let garbage = simulate_request("not json").expect_err("invalid json");
        let message = garbage["error"].as_str().unwrap_or_default();
        assert!(message.starts_with("request is not valid JSON"));
    }

    #[test]
    fn absent_sections_default_to_empty() {
        let (current, changes) = parse_request("{}").expect("empty request");
        assert!(current.is_empty());
        assert!(changes.is_empty());
    }
}
