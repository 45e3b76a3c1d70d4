const OVERALL_WEIGHTS: [f64; 5] = [0.25, 0.30, 0.15, 0.20, 0.10];
const RISK_CAP: f64 = 1.0;

pub struct RiskInputs {
    pub attendance: f64,
    pub failed_tests: u32,
    pub internship_count: u32,
}

pub struct RiskFactor {
    pub name: &'static str,
    pub weight: f64,
    pub applies: fn(&RiskInputs) -> bool,
}

/// Evaluated independently and summed, then capped at [`RISK_CAP`].
pub const RISK_FACTORS: &[RiskFactor] = &[
    RiskFactor {
        name: "low_attendance",
        weight: 0.4,
        applies: low_attendance,
    },
    RiskFactor {
        name: "repeated_test_failures",
        weight: 0.35,
        applies: repeated_test_failures,
    },
    RiskFactor {
        name: "no_internship",
        weight: 0.25,
        applies: no_internship,
    },
];

fn low_attendance(inputs: &RiskInputs) -> bool {
    inputs.attendance < 60.0
}

fn repeated_test_failures(inputs: &RiskInputs) -> bool {
    inputs.failed_tests >= 2
}

fn no_internship(inputs: &RiskInputs) -> bool {
    inputs.internship_count == 0
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Weighted composite `0.25A + 0.30C + 0.15S + 0.20P + 0.10T`, rounded to 2 decimals.
pub fn overall_score(
    aptitude: f64,
    coding: f64,
    soft_skills: f64,
    project: f64,
    attendance: f64,
) -> f64 {
    let metrics = [aptitude, coding, soft_skills, project, attendance];
    let total: f64 = OVERALL_WEIGHTS
        .iter()
        .zip(metrics.iter())
        .map(|(weight, metric)| weight * metric)
        .sum();
    round2(total)
}

pub fn risk_index(attendance: f64, failed_tests: u32, internship_count: u32) -> f64 {
    let inputs = RiskInputs {
        attendance,
        failed_tests,
        internship_count,
    };
    let total: f64 = RISK_FACTORS
        .iter()
        .filter(|factor| (factor.applies)(&inputs))
        .map(|factor| factor.weight)
        .sum();
    total.min(RISK_CAP)
}

/// Logistic placement estimate on a 0-100 scale, rounded to 2 decimals.
pub fn placement_probability(aptitude: f64, coding: f64, project: f64, soft_skills: f64) -> f64 {
    let z = 0.05 * aptitude + 0.06 * coding + 0.04 * project + 0.03 * soft_skills - 4.0;
    round2(100.0 / (1.0 + (-z).exp()))
}

/// Ordinary least-squares slope of `history[i]` against `i`.
pub fn trend_slope(history: &[f64]) -> f64 {
    if history.len() < 2 {
        return 0.0;
    }

    let n = history.len() as f64;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_xx = 0.0;
    for (i, y) in history.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator == 0.0 {
        return 0.0;
    }
    (n * sum_xy - sum_x * sum_y) / denominator
}
