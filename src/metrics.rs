use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use uuid::Uuid;

use crate::models::{InternActivity, MergedDailyLog, Metrics, TrendBucket};

const WEEKDAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Compute the full derived-statistics set over an already-reconciled
/// snapshot. Pure and deterministic: grouping goes through `BTreeMap`s so
/// identical input sets produce identical output regardless of ordering.
pub fn compute_metrics(merged: &[MergedDailyLog], as_of: NaiveDate) -> Metrics {
    let total_logs = merged.len();
    let complete_logs = merged.iter().filter(|m| m.is_complete()).count();
    let completion_rate = if total_logs == 0 {
        0.0
    } else {
        complete_logs as f64 * 100.0 / total_logs as f64
    };

    let mut am_late = 0usize;
    let mut pm_late = 0usize;
    let mut on_time_entries = 0usize;
    for log in merged {
        if let Some(am) = &log.am_entry {
            if am.submitted_late {
                am_late += 1;
            } else {
                on_time_entries += 1;
            }
        }
        if let Some(pm) = &log.pm_entry {
            if pm.submitted_late {
                pm_late += 1;
            } else {
                on_time_entries += 1;
            }
        }
    }

    let durations: Vec<f64> = merged.iter().filter_map(worked_hours).collect();
    let avg_hours_worked = if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<f64>() / durations.len() as f64
    };

    Metrics {
        total_logs,
        complete_logs,
        completion_rate,
        am_late,
        pm_late,
        on_time_entries,
        avg_hours_worked,
        daily_trends: bucketize(merged, |m| m.log_date.to_string()),
        weekly_activity: bucketize(merged, |m| {
            let week = m.log_date.iso_week();
            format!("{}-W{:02}", week.year(), week.week())
        }),
        monthly_activity: bucketize(merged, |m| {
            format!("{:04}-{:02}", m.log_date.year(), m.log_date.month())
        }),
        company_breakdown: bucketize(merged, |m| m.company.clone()),
        intern_activity: intern_activity(merged, as_of),
        heatmap: heatmap(merged),
    }
}

/// Hours between check-in and check-out for a complete day. Non-positive or
/// 24h+ spans are clock/sensor anomalies and are excluded from averages.
pub fn worked_hours(log: &MergedDailyLog) -> Option<f64> {
    let am = log.am_entry.as_ref()?;
    let pm = log.pm_entry.as_ref()?;
    let hours = (pm.timestamp - am.timestamp).num_seconds() as f64 / 3600.0;
    if hours > 0.0 && hours < 24.0 {
        Some(hours)
    } else {
        None
    }
}

/// Consecutive complete days ending at `as_of`, or at the most recent day
/// with any record when `as_of` itself has none. Stops at the first gap or
/// incomplete day.
pub fn current_streak(
    all_days: &BTreeSet<NaiveDate>,
    complete_days: &BTreeSet<NaiveDate>,
    as_of: NaiveDate,
) -> u32 {
    let start = if all_days.contains(&as_of) {
        as_of
    } else {
        match all_days.range(..=as_of).next_back() {
            Some(day) => *day,
            None => return 0,
        }
    };

    let mut streak = 0u32;
    let mut day = start;
    while complete_days.contains(&day) {
        streak += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    streak
}

/// Longest run of consecutive complete days over the observed range. A gap
/// of more than one day resets the run; a run of length 1 is valid.
pub fn longest_streak(complete_days: &BTreeSet<NaiveDate>) -> u32 {
    let mut longest = 0u32;
    let mut run = 0u32;
    let mut prev: Option<NaiveDate> = None;

    for day in complete_days {
        run = match prev {
            Some(p) if (*day - p).num_days() == 1 => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        prev = Some(*day);
    }
    longest
}

fn bucketize<F>(merged: &[MergedDailyLog], key: F) -> Vec<TrendBucket>
where
    F: Fn(&MergedDailyLog) -> String,
{
    let mut buckets: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for log in merged {
        let slot = buckets.entry(key(log)).or_insert((0, 0));
        slot.0 += 1;
        if log.is_complete() {
            slot.1 += 1;
        }
    }
    buckets
        .into_iter()
        .map(|(label, (count, complete))| TrendBucket {
            label,
            count,
            complete,
        })
        .collect()
}

fn heatmap(merged: &[MergedDailyLog]) -> Vec<TrendBucket> {
    let mut counts = [(0usize, 0usize); 7];
    for log in merged {
        let idx = log.log_date.weekday().num_days_from_monday() as usize;
        counts[idx].0 += 1;
        if log.is_complete() {
            counts[idx].1 += 1;
        }
    }
    WEEKDAY_LABELS
        .iter()
        .zip(counts)
        .filter(|(_, (count, _))| *count > 0)
        .map(|(label, (count, complete))| TrendBucket {
            label: label.to_string(),
            count,
            complete,
        })
        .collect()
}

fn intern_activity(merged: &[MergedDailyLog], as_of: NaiveDate) -> Vec<InternActivity> {
    struct Acc {
        name: String,
        company: String,
        all_days: BTreeSet<NaiveDate>,
        complete_days: BTreeSet<NaiveDate>,
        hours: Vec<f64>,
    }

    let mut per_intern: BTreeMap<Uuid, Acc> = BTreeMap::new();
    for log in merged {
        let acc = per_intern.entry(log.intern_id).or_insert_with(|| Acc {
            name: log.intern_name.clone(),
            company: log.company.clone(),
            all_days: BTreeSet::new(),
            complete_days: BTreeSet::new(),
            hours: Vec::new(),
        });
        acc.all_days.insert(log.log_date);
        if log.is_complete() {
            acc.complete_days.insert(log.log_date);
        }
        if let Some(h) = worked_hours(log) {
            acc.hours.push(h);
        }
    }

    let mut activity: Vec<InternActivity> = per_intern
        .into_values()
        .map(|acc| {
            let avg_hours = if acc.hours.is_empty() {
                0.0
            } else {
                acc.hours.iter().sum::<f64>() / acc.hours.len() as f64
            };
            InternActivity {
                current_streak: current_streak(&acc.all_days, &acc.complete_days, as_of),
                longest_streak: longest_streak(&acc.complete_days),
                total_days: acc.all_days.len(),
                complete_days: acc.complete_days.len(),
                avg_hours,
                intern_name: acc.name,
                company: acc.company,
            }
        })
        .collect();

    activity.sort_by(|a, b| a.intern_name.cmp(&b.intern_name));
    activity
}
