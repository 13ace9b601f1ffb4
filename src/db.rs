use anyhow::Context;
use chrono::{NaiveDate, TimeZone, Utc};
use sha2::{Digest, Sha256};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::warn;
use uuid::Uuid;

use crate::error::TrackerError;
use crate::models::{DailyLog, Intern, LogFilter, Period, PeriodEntry};
use crate::submit::{check_slot, normalize_entry, CutoffConfig, SubmissionPayload};

/// Bound on the read-side page so reconciliation and metrics always work
/// over a bounded snapshot.
const FETCH_CAP: i64 = 500;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

pub async fn create_intern(
    pool: &PgPool,
    full_name: &str,
    email: &str,
    company: &str,
    company_address: &str,
    default_password: &str,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO internship_attendance.interns
        (id, full_name, email, company, company_address, password_hash, must_change_password)
        VALUES ($1, $2, $3, $4, $5, $6, TRUE)
        ON CONFLICT (email) DO UPDATE
        SET full_name = EXCLUDED.full_name,
            company = EXCLUDED.company,
            company_address = EXCLUDED.company_address
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(full_name)
    .bind(email)
    .bind(company)
    .bind(company_address)
    .bind(hash_password(default_password))
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(id)
}

pub async fn find_intern(pool: &PgPool, email: &str) -> anyhow::Result<Intern> {
    let row = sqlx::query(
        "SELECT id, full_name, email, company, company_address, photo_ref, must_change_password \
         FROM internship_attendance.interns WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?
    .ok_or(TrackerError::NotFound {
        kind: "intern",
        id: email.to_string(),
    })?;

    Ok(Intern {
        id: row.get("id"),
        full_name: row.get("full_name"),
        email: row.get("email"),
        company: row.get("company"),
        company_address: row.get("company_address"),
        photo_ref: row.get("photo_ref"),
        must_change_password: row.get("must_change_password"),
    })
}

/// Intern-initiated password change; clears the forced-change flag.
pub async fn set_password(pool: &PgPool, email: &str, password: &str) -> anyhow::Result<()> {
    let result = sqlx::query(
        "UPDATE internship_attendance.interns \
         SET password_hash = $1, must_change_password = FALSE WHERE email = $2",
    )
    .bind(hash_password(password))
    .bind(email)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(TrackerError::NotFound {
            kind: "intern",
            id: email.to_string(),
        }
        .into());
    }
    Ok(())
}

pub async fn set_photo(pool: &PgPool, email: &str, photo_ref: &str) -> anyhow::Result<()> {
    let result =
        sqlx::query("UPDATE internship_attendance.interns SET photo_ref = $1 WHERE email = $2")
            .bind(photo_ref)
            .bind(email)
            .execute(pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(TrackerError::NotFound {
            kind: "intern",
            id: email.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Atomic period submission: locate-or-create the day row and fill the
/// target slot in one statement. The `WHERE <slot> IS NULL` guard makes the
/// check-then-write safe against concurrent writers for the same key; no
/// returned row means the slot was already occupied.
pub async fn submit_period(
    pool: &PgPool,
    intern_id: Uuid,
    date: NaiveDate,
    entry: &PeriodEntry,
) -> anyhow::Result<Uuid> {
    // Fast-fail on an occupied slot before writing; the ON CONFLICT guard
    // below remains the race-proof net.
    let existing = sqlx::query(
        "SELECT l.id, l.intern_id, i.full_name, i.company, l.log_date, \
         l.am_entry, l.pm_entry, l.created_at \
         FROM internship_attendance.daily_logs l \
         JOIN internship_attendance.interns i ON i.id = l.intern_id \
         WHERE l.intern_id = $1 AND l.log_date = $2",
    )
    .bind(intern_id)
    .bind(date)
    .fetch_optional(pool)
    .await?;
    if let Some(row) = existing {
        check_slot(&decode_log(&row), entry.period)?;
    }

    let slot = match entry.period {
        Period::Am => "am_entry",
        Period::Pm => "pm_entry",
    };
    let query = format!(
        "INSERT INTO internship_attendance.daily_logs (id, intern_id, log_date, {slot}) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (intern_id, log_date) \
         DO UPDATE SET {slot} = EXCLUDED.{slot} \
         WHERE internship_attendance.daily_logs.{slot} IS NULL \
         RETURNING id"
    );

    let entry_json = serde_json::to_value(entry).context("failed to serialize period entry")?;
    let result = sqlx::query(&query)
        .bind(Uuid::new_v4())
        .bind(intern_id)
        .bind(date)
        .bind(entry_json)
        .fetch_optional(pool)
        .await;

    match result {
        Ok(Some(row)) => Ok(row.get("id")),
        Ok(None) => Err(TrackerError::DuplicateSubmission {
            period: entry.period,
        }
        .into()),
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
            // Unique-key race with another writer; same outcome as a
            // duplicate for the caller.
            Err(TrackerError::Conflict(db_err.message().to_string()).into())
        }
        Err(err) => Err(err).context("failed to write period entry"),
    }
}

/// Fetch raw day rows for the read pipeline, filters applied in SQL where
/// they are cheap (intern, company, date range) and the page capped at 500.
/// Status filtering stays in the query layer, after reconciliation.
pub async fn fetch_logs(pool: &PgPool, filter: &LogFilter) -> anyhow::Result<Vec<DailyLog>> {
    let mut query = String::from(
        "SELECT l.id, l.intern_id, i.full_name, i.company, l.log_date, \
         l.am_entry, l.pm_entry, l.created_at \
         FROM internship_attendance.daily_logs l \
         JOIN internship_attendance.interns i ON i.id = l.intern_id \
         WHERE 1 = 1",
    );

    let mut bind_index = 0;
    let mut next = |clause: &str, query: &mut String| {
        bind_index += 1;
        query.push_str(&clause.replace("$n", &format!("${bind_index}")));
    };

    if filter.intern_id.is_some() {
        next(" AND l.intern_id = $n", &mut query);
    }
    if filter.company.is_some() {
        next(" AND LOWER(i.company) = LOWER($n)", &mut query);
    }
    if filter.start_date.is_some() {
        next(" AND l.log_date >= $n", &mut query);
    }
    if filter.end_date.is_some() {
        next(" AND l.log_date <= $n", &mut query);
    }
    query.push_str(" ORDER BY l.log_date DESC, l.created_at DESC LIMIT ");
    query.push_str(&FETCH_CAP.to_string());

    let mut rows = sqlx::query(&query);
    if let Some(intern_id) = filter.intern_id {
        rows = rows.bind(intern_id);
    }
    if let Some(company) = &filter.company {
        rows = rows.bind(company);
    }
    if let Some(start) = filter.start_date {
        rows = rows.bind(start);
    }
    if let Some(end) = filter.end_date {
        rows = rows.bind(end);
    }

    let records = rows.fetch_all(pool).await?;
    let mut logs = Vec::with_capacity(records.len());
    for row in records {
        logs.push(decode_log(&row));
    }
    Ok(logs)
}

/// Row decoding tolerates malformed entry documents: a slot that fails to
/// deserialize is treated as absent rather than failing the whole read.
fn decode_log(row: &PgRow) -> DailyLog {
    let id: Uuid = row.get("id");
    DailyLog {
        id,
        intern_id: row.get("intern_id"),
        intern_name: row.get("full_name"),
        company: row.get("company"),
        log_date: row.get("log_date"),
        am_entry: decode_entry(row, "am_entry", id),
        pm_entry: decode_entry(row, "pm_entry", id),
        created_at: row.get("created_at"),
    }
}

fn decode_entry(row: &PgRow, column: &str, log_id: Uuid) -> Option<PeriodEntry> {
    let value: Option<serde_json::Value> = row.get(column);
    let value = value?;
    match serde_json::from_value(value) {
        Ok(entry) => Some(entry),
        Err(err) => {
            warn!(%log_id, column, %err, "skipping malformed period entry");
            None
        }
    }
}

pub async fn delete_log(pool: &PgPool, log_id: Uuid) -> anyhow::Result<()> {
    let result = sqlx::query("DELETE FROM internship_attendance.daily_logs WHERE id = $1")
        .bind(log_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(TrackerError::NotFound {
            kind: "daily log",
            id: log_id.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Deleting an intern cascades to its daily logs through the foreign key.
pub async fn delete_intern(pool: &PgPool, email: &str) -> anyhow::Result<()> {
    let result = sqlx::query("DELETE FROM internship_attendance.interns WHERE email = $1")
        .bind(email)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(TrackerError::NotFound {
            kind: "intern",
            id: email.to_string(),
        }
        .into());
    }
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let interns = vec![
        (
            Uuid::parse_str("7c3f1a9e-52d8-4b0f-9f1e-6a2b8c4d0e13")?,
            "Mia Santos",
            "mia.santos@example.edu",
            "Acme Corp",
            "12 Ayala Ave, Makati",
        ),
        (
            Uuid::parse_str("2b9d6e41-8f37-4c52-a0d9-5e1f7b3a8c26")?,
            "Leo Ramirez",
            "leo.ramirez@example.edu",
            "Beta Labs",
            "48 Ortigas Center, Pasig",
        ),
        (
            Uuid::parse_str("e5a8c2f0-1d64-49b3-b7a2-903c6d5e4f18")?,
            "Ana Dela Cruz",
            "ana.delacruz@example.edu",
            "Acme Corp",
            "12 Ayala Ave, Makati",
        ),
    ];

    for (id, name, email, company, address) in interns {
        sqlx::query(
            r#"
            INSERT INTO internship_attendance.interns
            (id, full_name, email, company, company_address, password_hash, must_change_password)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name, company = EXCLUDED.company
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(company)
        .bind(address)
        .bind(hash_password("changeme"))
        .execute(pool)
        .await?;
    }

    let cutoffs = CutoffConfig::default();
    let seed_days = vec![
        ("mia.santos@example.edu", 15, true),
        ("mia.santos@example.edu", 16, true),
        ("mia.santos@example.edu", 17, false),
        ("leo.ramirez@example.edu", 16, true),
        ("ana.delacruz@example.edu", 17, true),
    ];

    for (email, day, complete) in seed_days {
        let intern = find_intern(pool, email).await?;
        let date = NaiveDate::from_ymd_opt(2026, 1, day).context("invalid seed date")?;

        let payload = SubmissionPayload {
            image_ref: format!("seed/{email}-{day}-am.jpg"),
            latitude: 14.5995,
            longitude: 120.9842,
            ..Default::default()
        };
        let am_at = Utc
            .with_ymd_and_hms(2026, 1, day, 8, 30, 0)
            .single()
            .context("invalid seed timestamp")?;
        let am = normalize_entry(&payload, Period::Am, am_at, &cutoffs)?;
        if let Err(err) = submit_period(pool, intern.id, date, &am).await {
            warn!(%email, day, %err, "seed AM submission skipped");
        }

        if complete {
            let payload = SubmissionPayload {
                image_ref: format!("seed/{email}-{day}-pm.jpg"),
                latitude: 14.5995,
                longitude: 120.9842,
                ..Default::default()
            };
            let pm_at = Utc
                .with_ymd_and_hms(2026, 1, day, 17, 30, 0)
                .single()
                .context("invalid seed timestamp")?;
            let pm = normalize_entry(&payload, Period::Pm, pm_at, &cutoffs)?;
            if let Err(err) = submit_period(pool, intern.id, date, &pm).await {
                warn!(%email, day, %err, "seed PM submission skipped");
            }
        }
    }

    Ok(())
}

/// Bulk-load historical submissions. Interns are upserted by email; period
/// rows go through the same guarded write as live submissions, so duplicate
/// rows in the file are skipped rather than imported twice.
pub async fn import_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
    cutoffs: &CutoffConfig,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        full_name: String,
        email: String,
        company: String,
        company_address: String,
        log_date: NaiveDate,
        period: String,
        image_ref: String,
        latitude: f64,
        longitude: f64,
        submitted_at: chrono::DateTime<Utc>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let period: Period = row
            .period
            .parse()
            .map_err(|e: String| TrackerError::validation("period", e))?;

        let intern_id = create_intern(
            pool,
            &row.full_name,
            &row.email,
            &row.company,
            &row.company_address,
            "changeme",
        )
        .await?;

        let payload = SubmissionPayload {
            image_ref: row.image_ref,
            latitude: row.latitude,
            longitude: row.longitude,
            ..Default::default()
        };
        let entry = normalize_entry(&payload, period, row.submitted_at, cutoffs)?;

        match submit_period(pool, intern_id, row.log_date, &entry).await {
            Ok(_) => inserted += 1,
            Err(err) => match err.downcast_ref::<TrackerError>() {
                Some(TrackerError::DuplicateSubmission { .. })
                | Some(TrackerError::Conflict(_)) => {
                    warn!(email = %row.email, date = %row.log_date, "duplicate row in import, skipped");
                }
                _ => return Err(err),
            },
        }
    }

    Ok(inserted)
}
