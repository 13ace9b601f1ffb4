use crate::models::{DailyLog, LogFilter, MergedDailyLog, SortKey, StatusFilter};
use crate::reconcile;

/// Filter raw rows by intern, company, and inclusive UTC date range.
///
/// Status is deliberately not applied here: a single raw row's entry
/// presence is not authoritative when duplicates exist, so completion-status
/// filtering happens after reconciliation (see [`filter_status`]).
pub fn filter_logs(raw: &[DailyLog], filter: &LogFilter) -> Vec<DailyLog> {
    raw.iter()
        .filter(|log| {
            if let Some(intern_id) = filter.intern_id {
                if log.intern_id != intern_id {
                    return false;
                }
            }
            if let Some(company) = &filter.company {
                if !log.company.eq_ignore_ascii_case(company) {
                    return false;
                }
            }
            if let Some(start) = filter.start_date {
                if log.log_date < start {
                    return false;
                }
            }
            if let Some(end) = filter.end_date {
                if log.log_date > end {
                    return false;
                }
            }
            true
        })
        .cloned()
        .collect()
}

/// Stable sort by the requested key. Date sorts break ties on creation
/// order; name sorts are case-insensitive.
pub fn sort_logs(logs: &mut [DailyLog], sort: SortKey) {
    match sort {
        SortKey::DateDesc => {
            logs.sort_by(|a, b| {
                b.log_date
                    .cmp(&a.log_date)
                    .then(b.created_at.cmp(&a.created_at))
            });
        }
        SortKey::DateAsc => {
            logs.sort_by(|a, b| {
                a.log_date
                    .cmp(&b.log_date)
                    .then(a.created_at.cmp(&b.created_at))
            });
        }
        SortKey::NameAsc => {
            logs.sort_by(|a, b| {
                a.intern_name
                    .to_lowercase()
                    .cmp(&b.intern_name.to_lowercase())
            });
        }
        SortKey::NameDesc => {
            logs.sort_by(|a, b| {
                b.intern_name
                    .to_lowercase()
                    .cmp(&a.intern_name.to_lowercase())
            });
        }
    }
}

pub fn filter_status(merged: Vec<MergedDailyLog>, status: StatusFilter) -> Vec<MergedDailyLog> {
    merged
        .into_iter()
        .filter(|log| match status {
            StatusFilter::All => true,
            StatusFilter::Complete => log.is_complete(),
            StatusFilter::Incomplete => !log.is_complete(),
            StatusFilter::AmOnly => log.am_entry.is_some() && log.pm_entry.is_none(),
            StatusFilter::PmOnly => log.pm_entry.is_some() && log.am_entry.is_none(),
        })
        .collect()
}

/// The read pipeline: filter raw rows, sort, reconcile duplicates, then
/// apply the completion-status filter on the reconciled per-day state.
pub fn run(raw: &[DailyLog], filter: &LogFilter, sort: SortKey) -> Vec<MergedDailyLog> {
    let mut filtered = filter_logs(raw, filter);
    sort_logs(&mut filtered, sort);
    let merged = reconcile::reconcile(&filtered);
    filter_status(merged, filter.status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoPoint, Period, PeriodEntry};
    use chrono::{NaiveDate, TimeZone, Utc};
    use uuid::Uuid;

    fn entry(period: Period) -> PeriodEntry {
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
            timestamp: Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap(),
            period,
            notes: None,
            hours: None,
            activity: None,
            telemetry: None,
            submitted_late: false,
        }
    }

    fn raw(
        name: &str,
        company: &str,
        date: NaiveDate,
        am: bool,
        pm: bool,
        created_hour: u32,
    ) -> DailyLog {
        DailyLog {
            id: Uuid::new_v4(),
            intern_id: Uuid::new_v4(),
            intern_name: name.to_string(),
            company: company.to_string(),
            log_date: date,
            am_entry: am.then(|| entry(Period::Am)),
            pm_entry: pm.then(|| entry(Period::Pm)),
            created_at: Utc
                .with_ymd_and_hms(2024, 1, 10, created_hour, 0, 0)
                .unwrap(),
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn date_range_is_inclusive_on_both_ends() {
        let logs = vec![
            raw("Mia", "Acme", d(9), true, false, 8),
            raw("Mia", "Acme", d(10), true, false, 8),
            raw("Mia", "Acme", d(12), true, false, 8),
            raw("Mia", "Acme", d(13), true, false, 8),
        ];
        let filter = LogFilter {
            start_date: Some(d(10)),
            end_date: Some(d(12)),
            ..Default::default()
        };
        let kept = filter_logs(&logs, &filter);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].log_date, d(10));
        assert_eq!(kept[1].log_date, d(12));
    }

    #[test]
    fn company_filter_is_case_insensitive() {
        let logs = vec![
            raw("Mia", "Acme Corp", d(10), true, false, 8),
            raw("Leo", "Beta Labs", d(10), true, false, 8),
        ];
        let filter = LogFilter {
            company: Some("acme corp".to_string()),
            ..Default::default()
        };
        assert_eq!(filter_logs(&logs, &filter).len(), 1);
    }

    #[test]
    fn date_sort_breaks_ties_on_creation_order() {
        let mut logs = vec![
            raw("Mia", "Acme", d(10), true, false, 9),
            raw("Leo", "Acme", d(10), true, false, 8),
            raw("Ana", "Acme", d(11), true, false, 7),
        ];
        sort_logs(&mut logs, SortKey::DateDesc);
        assert_eq!(logs[0].intern_name, "Ana");
        assert_eq!(logs[1].intern_name, "Mia");
        assert_eq!(logs[2].intern_name, "Leo");
    }

    #[test]
    fn name_sort_ignores_case() {
        let mut logs = vec![
            raw("zoe", "Acme", d(10), true, false, 8),
            raw("Ana", "Acme", d(10), true, false, 8),
            raw("mia", "Acme", d(11), true, false, 8),
        ];
        sort_logs(&mut logs, SortKey::NameAsc);
        let names: Vec<&str> = logs.iter().map(|l| l.intern_name.as_str()).collect();
        assert_eq!(names, vec!["Ana", "mia", "zoe"]);
    }

    #[test]
    fn status_filter_reflects_reconciled_state_not_raw_rows() {
        // One day split across two raw rows: each row alone looks
        // incomplete, but the reconciled day is complete.
        let mut am_row = raw("Mia", "Acme", d(10), true, false, 8);
        let pm_row = DailyLog {
            id: Uuid::new_v4(),
            intern_id: am_row.intern_id,
            am_entry: None,
            pm_entry: Some(entry(Period::Pm)),
            ..am_row.clone()
        };
        am_row.pm_entry = None;

        let filter = LogFilter {
            status: StatusFilter::Complete,
            ..Default::default()
        };
        let merged = run(&[am_row, pm_row], &filter, SortKey::DateDesc);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].is_complete());

        let filter = LogFilter {
            status: StatusFilter::Incomplete,
            ..Default::default()
        };
        let incomplete = run(
            &[raw("Mia", "Acme", d(11), true, false, 8)],
            &filter,
            SortKey::DateDesc,
        );
        assert_eq!(incomplete.len(), 1);
    }

    #[test]
    fn am_only_and_pm_only_statuses() {
        let logs = vec![
            raw("Mia", "Acme", d(10), true, false, 8),
            raw("Leo", "Acme", d(10), false, true, 8),
            raw("Ana", "Acme", d(10), true, true, 8),
        ];
        let am_only = run(
            &logs,
            &LogFilter {
                status: StatusFilter::AmOnly,
                ..Default::default()
            },
            SortKey::DateDesc,
        );
        assert_eq!(am_only.len(), 1);
        assert_eq!(am_only[0].intern_name, "Mia");

        let pm_only = run(
            &logs,
            &LogFilter {
                status: StatusFilter::PmOnly,
                ..Default::default()
            },
            SortKey::DateDesc,
        );
        assert_eq!(pm_only.len(), 1);
        assert_eq!(pm_only[0].intern_name, "Leo");
    }
}
