use std::fmt::Write;

use crate::metrics::worked_hours;
use crate::models::{MergedDailyLog, Metrics};

pub fn build_report(scope: Option<&str>, merged: &[MergedDailyLog], metrics: &Metrics) -> String {
    let mut output = String::new();
    let scope_label = scope.unwrap_or("all interns");

    let _ = writeln!(output, "# Internship Attendance Report");
    let _ = writeln!(output, "Generated for {scope_label}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Logged days: {}", metrics.total_logs);
    let _ = writeln!(
        output,
        "- Complete days: {} ({:.1}% completion)",
        metrics.complete_logs, metrics.completion_rate
    );
    let _ = writeln!(
        output,
        "- Late check-ins: {} AM, {} PM ({} entries on time)",
        metrics.am_late, metrics.pm_late, metrics.on_time_entries
    );
    let _ = writeln!(
        output,
        "- Average hours worked: {:.2}",
        metrics.avg_hours_worked
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weekly Activity");
    if metrics.weekly_activity.is_empty() {
        let _ = writeln!(output, "No logs recorded for this window.");
    } else {
        for bucket in metrics.weekly_activity.iter() {
            let _ = writeln!(
                output,
                "- {}: {} days logged, {} complete",
                bucket.label, bucket.count, bucket.complete
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Company Breakdown");
    if metrics.company_breakdown.is_empty() {
        let _ = writeln!(output, "No logs recorded for this window.");
    } else {
        for bucket in metrics.company_breakdown.iter() {
            let _ = writeln!(
                output,
                "- {}: {} days logged, {} complete",
                bucket.label, bucket.count, bucket.complete
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Intern Activity");
    if metrics.intern_activity.is_empty() {
        let _ = writeln!(output, "No interns with logs in this window.");
    } else {
        for activity in metrics.intern_activity.iter() {
            let _ = writeln!(
                output,
                "- {} ({}): {}/{} complete, streak {} (best {}), avg {:.2}h",
                activity.intern_name,
                activity.company,
                activity.complete_days,
                activity.total_days,
                activity.current_streak,
                activity.longest_streak,
                activity.avg_hours
            );
        }
    }

    let mut recent: Vec<&MergedDailyLog> = merged.iter().collect();
    recent.sort_by(|a, b| b.log_date.cmp(&a.log_date));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Days");
    if recent.is_empty() {
        let _ = writeln!(output, "No logs recorded for this window.");
    } else {
        for log in recent.iter().take(10) {
            let status = if log.is_complete() {
                match worked_hours(log) {
                    Some(hours) => format!("complete, {hours:.2}h"),
                    None => "complete, duration discarded".to_string(),
                }
            } else if log.am_entry.is_some() {
                "time in only".to_string()
            } else {
                "time out only".to_string()
            };
            let _ = writeln!(
                output,
                "- {} — {} ({}): {status}",
                log.log_date, log.intern_name, log.company
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::compute_metrics;
    use crate::models::{GeoPoint, Period, PeriodEntry};
    use chrono::{NaiveDate, TimeZone, Utc};
    use uuid::Uuid;

    fn entry(period: Period, hour: u32) -> PeriodEntry {
        PeriodEntry {
            image_ref: "photo.jpg".to_string(),
            location: GeoPoint {
                latitude: 14.5995,
                longitude: 120.9842,
                address: None,
                altitude: None,
                accuracy: None,
                heading: None,
                speed: None,
            },
            timestamp: Utc.with_ymd_and_hms(2024, 1, 10, hour, 0, 0).unwrap(),
            period,
            notes: None,
            hours: None,
            activity: None,
            telemetry: None,
            submitted_late: false,
        }
    }

    #[test]
    fn report_covers_summary_and_sections() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let merged = vec![MergedDailyLog {
            primary_id: Uuid::new_v4(),
            intern_id: Uuid::new_v4(),
            intern_name: "Mia Santos".to_string(),
            company: "Acme Corp".to_string(),
            log_date: date,
            am_entry: Some(entry(Period::Am, 8)),
            pm_entry: Some(entry(Period::Pm, 17)),
        }];
        let metrics = compute_metrics(&merged, date);
        let report = build_report(Some("Acme Corp"), &merged, &metrics);

        assert!(report.contains("# Internship Attendance Report"));
        assert!(report.contains("Generated for Acme Corp"));
        assert!(report.contains("100.0% completion"));
        assert!(report.contains("Mia Santos"));
        assert!(report.contains("9.00h"));
    }

    #[test]
    fn empty_window_renders_placeholders() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let metrics = compute_metrics(&[], date);
        let report = build_report(None, &[], &metrics);
        assert!(report.contains("all interns"));
        assert!(report.contains("No logs recorded for this window."));
    }
}
