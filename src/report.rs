use std::fmt::Write;

use crate::models::{AnalyticsReport, FacultyEffectiveness};
use crate::scoring::RISK_FACTORS;

/// Faculty rows ordered from highest to lowest impact.
pub fn rank_faculty(report: &AnalyticsReport) -> Vec<&FacultyEffectiveness> {
    let mut ranked: Vec<&FacultyEffectiveness> = report.faculty_effectiveness.iter().collect();
    ranked.sort_by(|a, b| {
        b.impact_score
            .partial_cmp(&a.impact_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}

pub fn build_report(source_label: &str, report: &AnalyticsReport) -> String {
    let mut output = String::new();
    let population = &report.population;

    let _ = writeln!(output, "# Student Performance Analytics Report");
    let _ = writeln!(
        output,
        "Generated {} from {} ({})",
        report.generated_at.format("%Y-%m-%d %H:%M UTC"),
        source_label,
        report.engine
    );
    if report.is_mock {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "> Synthetic fallback data. No live student source was available."
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Population");
    let _ = writeln!(
        output,
        "- {} students, mean {:.2}, std dev {:.2}, range {:.2} to {:.2}",
        population.size, population.mean, population.std_dev, population.min, population.max
    );
    let _ = writeln!(
        output,
        "- Attendance vs overall r = {:.4}; coding vs placement r = {:.4}",
        report.correlations.attendance_vs_overall, report.correlations.coding_vs_placement
    );

    let _ = writeln!(output);
    let buckets = &report.distribution;
    let _ = writeln!(output, "## Score Distribution ({} students)", buckets.total());
    for (label, count) in [
        ("Fail (0-40)", buckets.fail),
        ("Average (41-60)", buckets.average),
        ("Good (61-75)", buckets.good),
        ("Very Good (76-90)", buckets.very_good),
        ("Excellent (91-100)", buckets.excellent),
    ] {
        let _ = writeln!(output, "- {label}: {count}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Tiers");
    let risk = &report.risk_summary;
    let _ = writeln!(
        output,
        "- safe {}, monitor {}, critical {}",
        risk.safe, risk.monitor, risk.critical
    );
    let factors: Vec<String> = RISK_FACTORS
        .iter()
        .map(|factor| format!("{} (+{:.2})", factor.name, factor.weight))
        .collect();
    let _ = writeln!(output, "- factors: {}", factors.join(", "));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Faculty Effectiveness");
    if report.faculty_effectiveness.is_empty() {
        let _ = writeln!(output, "No faculty cohorts in this run.");
    } else {
        for row in rank_faculty(report) {
            let _ = writeln!(
                output,
                "- {} ({}, {}): impact {:.2}, {} students, avg {:.2}, pass {:.1}%, trend {:+.2}",
                row.faculty_name,
                row.faculty_id,
                row.subject,
                row.impact_score,
                row.student_count,
                row.avg_score,
                row.pass_rate,
                row.avg_trend
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Outliers");
    if report.outliers.is_empty() {
        let _ = writeln!(output, "No students beyond two standard deviations.");
    } else {
        for outlier in report.outliers.iter() {
            let _ = writeln!(
                output,
                "- {} ({}) score {:.2}, z {:+.2}",
                outlier.name, outlier.student_id, outlier.overall_score, outlier.z_score
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Global History");
    if report.trends.global_history.is_empty() {
        let _ = writeln!(output, "History unavailable for this population.");
    } else {
        let weeks: Vec<String> = report
            .trends
            .global_history
            .iter()
            .enumerate()
            .map(|(week, score)| format!("W{}: {:.2}", week + 1, score))
            .collect();
        let _ = writeln!(output, "{}", weeks.join(" | "));
    }

    if !report.rejected.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Rejected Records");
        for rejected in report.rejected.iter() {
            let _ = writeln!(output, "- {}: {}", rejected.student_id, rejected.reason);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze;
    use crate::models::StudentInputRecord;

    fn student(id: &str, level: f64, faculty: &str, history: Vec<f64>) -> StudentInputRecord {
        StudentInputRecord {
            student_id: id.to_string(),
            name: format!("Student {id}"),
            aptitude: level,
            coding: level,
            soft_skills: level,
            project: level,
            attendance: level,
            failed_tests: 0,
            internship_count: 1,
            faculty_id: faculty.to_string(),
            faculty_name: format!("Dr. {faculty}"),
            subject: "Data Science".to_string(),
            history_scores: history,
        }
    }

    #[test]
    fn ranks_faculty_by_impact() {
        let records = vec![
            student("S1", 50.0, "F001", vec![50.0, 50.0]),
            student("S2", 90.0, "F002", vec![80.0, 90.0]),
        ];
        let report = analyze(&records, false).expect("analysis succeeds");
        let ranked = rank_faculty(&report);
        assert_eq!(ranked[0].faculty_id, "F002");
        assert_eq!(ranked[1].faculty_id, "F001");
    }

    #[test]
    fn report_lists_sections() {
        let records = vec![
            student("S1", 50.0, "F001", vec![50.0, 50.0]),
            student("S2", 90.0, "F002", vec![80.0]),
        ];
        let report = analyze(&records, true).expect("analysis succeeds");
        let markdown = build_report("synthetic", &report);

        assert!(markdown.contains("# Student Performance Analytics Report"));
        assert!(markdown.contains("Synthetic fallback data"));
        assert!(markdown.contains("- Average (41-60): 1"));
        assert!(markdown.contains("- Excellent (91-100): 0"));
        assert!(markdown.contains("low_attendance (+0.40)"));
        assert!(markdown.contains("Dr. F002 (F002, Data Science)"));
        assert!(markdown.contains("History unavailable for this population."));
        assert!(!markdown.contains("## Rejected Records"));
    }
}
