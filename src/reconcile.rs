use std::collections::HashMap;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{DailyLog, MergedDailyLog};

/// Merge raw day rows into one logical record per (intern, calendar date).
///
/// The storage layer enforces uniqueness on that pair, but duplicate-write
/// artifacts can still split one day across several rows. Reconciliation is
/// the correctness net: within a group it keeps the last non-null AM entry
/// and the last non-null PM entry seen, so no entry present in any
/// contributing row is ever lost. Dates are keyed on the UTC calendar day;
/// the same convention is used for submission keying and filter boundaries.
///
/// Output preserves the first-appearance order of each group; final ordering
/// is the caller's concern.
pub fn reconcile(raw: &[DailyLog]) -> Vec<MergedDailyLog> {
    let mut index: HashMap<(Uuid, NaiveDate), usize> = HashMap::new();
    let mut merged: Vec<MergedDailyLog> = Vec::new();
    // Tracks how good the current primary_id pick is per group:
    // 2 = row had both entries, 1 = row had a PM entry, 0 = first row.
    let mut primary_rank: Vec<u8> = Vec::new();

    for log in raw {
        let key = (log.intern_id, log.log_date);
        match index.get(&key) {
            None => {
                index.insert(key, merged.len());
                primary_rank.push(rank(log));
                merged.push(MergedDailyLog {
                    primary_id: log.id,
                    intern_id: log.intern_id,
                    intern_name: log.intern_name.clone(),
                    company: log.company.clone(),
                    log_date: log.log_date,
                    am_entry: log.am_entry.clone(),
                    pm_entry: log.pm_entry.clone(),
                });
            }
            Some(&at) => {
                let group = &mut merged[at];
                if log.am_entry.is_some() {
                    group.am_entry = log.am_entry.clone();
                }
                if log.pm_entry.is_some() {
                    group.pm_entry = log.pm_entry.clone();
                }
                let r = rank(log);
                if r > primary_rank[at] {
                    group.primary_id = log.id;
                    primary_rank[at] = r;
                }
            }
        }
    }

    merged
}

fn rank(log: &DailyLog) -> u8 {
    match (&log.am_entry, &log.pm_entry) {
        (Some(_), Some(_)) => 2,
        (_, Some(_)) => 1,
        _ => 0,
    }
}
