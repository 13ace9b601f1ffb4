use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod db;
mod error;
mod geocache;
mod metrics;
mod models;
mod query;
mod reconcile;
mod report;
mod submit;

use error::TrackerError;
use models::{LogFilter, SortKey, StatusFilter};

#[derive(Parser)]
#[command(name = "internship-attendance")]
#[command(about = "Geotagged daily-log attendance tracker for interns", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
#[command(group(
    ArgGroup::new("scope")
        .args(["email", "company"])
        .multiple(false)
))]
struct ScopeArgs {
    /// Limit to one intern by email
    #[arg(long)]
    email: Option<String>,
    /// Limit to one company
    #[arg(long)]
    company: Option<String>,
    /// Inclusive start of the date range (UTC calendar day)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Inclusive end of the date range (UTC calendar day)
    #[arg(long)]
    to: Option<NaiveDate>,
    #[arg(long, value_enum, default_value_t = StatusFilter::All)]
    status: StatusFilter,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Register an intern (admin)
    AddIntern {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        company: String,
        #[arg(long, default_value = "")]
        company_address: String,
        #[arg(long, default_value = "changeme")]
        password: String,
    },
    /// Show an intern's profile
    ShowIntern {
        #[arg(long)]
        email: String,
    },
    /// Change an intern's password
    SetPassword {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Update an intern's profile picture reference
    SetPhoto {
        #[arg(long)]
        email: String,
        #[arg(long)]
        photo: String,
    },
    /// Submit a Time In (AM) or Time Out (PM) entry
    Submit {
        #[arg(long)]
        email: String,
        /// Calendar day of the log; defaults to today (UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        period: models::Period,
        #[arg(long)]
        image: String,
        #[arg(long)]
        lat: f64,
        #[arg(long)]
        lon: f64,
        /// Human-readable place label; resolved from coordinates when absent
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        activity: Option<String>,
        #[arg(long)]
        accuracy: Option<f64>,
        #[arg(long)]
        heading: Option<f64>,
        #[arg(long)]
        battery: Option<f64>,
        #[arg(long)]
        device: Option<String>,
    },
    /// List reconciled daily logs
    Logs {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long, value_enum, default_value_t = SortKey::DateDesc)]
        sort: SortKey,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Print derived attendance statistics
    Stats {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Reference day for streaks; defaults to today (UTC)
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long)]
        as_of: Option<NaiveDate>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Import historical submissions from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Delete one daily log (admin)
    DeleteLog {
        #[arg(long)]
        id: Uuid,
    },
    /// Delete an intern and all of their logs (admin)
    DeleteIntern {
        #[arg(long)]
        email: String,
    },
}

async fn build_filter(pool: &sqlx::PgPool, scope: &ScopeArgs) -> anyhow::Result<LogFilter> {
    let intern_id = match &scope.email {
        Some(email) => Some(db::find_intern(pool, email).await?.id),
        None => None,
    };
    Ok(LogFilter {
        intern_id,
        company: scope.company.clone(),
        start_date: scope.from,
        end_date: scope.to,
        status: scope.status,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::AddIntern {
            name,
            email,
            company,
            company_address,
            password,
        } => {
            let id =
                db::create_intern(&pool, &name, &email, &company, &company_address, &password)
                    .await?;
            println!("Intern {email} registered with id {id}.");
        }
        Commands::ShowIntern { email } => {
            let intern = db::find_intern(&pool, &email).await?;
            println!("{} <{}>", intern.full_name, intern.email);
            println!("  id: {}", intern.id);
            println!("  company: {} ({})", intern.company, intern.company_address);
            if let Some(photo) = &intern.photo_ref {
                println!("  photo: {photo}");
            }
            if intern.must_change_password {
                println!("  must change password on next login");
            }
        }
        Commands::SetPassword { email, password } => {
            db::set_password(&pool, &email, &password).await?;
            println!("Password updated for {email}.");
        }
        Commands::SetPhoto { email, photo } => {
            db::set_photo(&pool, &email, &photo).await?;
            println!("Profile picture updated for {email}.");
        }
        Commands::Submit {
            email,
            date,
            period,
            image,
            lat,
            lon,
            address,
            notes,
            activity,
            accuracy,
            heading,
            battery,
            device,
        } => {
            let cutoffs = submit::CutoffConfig::from_env()?;
            let now = Utc::now();
            let date = date.unwrap_or_else(|| now.date_naive());
            let intern = db::find_intern(&pool, &email).await?;

            // No geocoding provider in this binary; fall back to a coarse
            // coordinate label, memoized per location.
            let mut geocoder = geocache::GeoCache::new(256);
            let address = address
                .or_else(|| geocoder.resolve(lat, lon, |lat, lon| Some(format!("{lat:.5}, {lon:.5}"))));

            let payload = submit::SubmissionPayload {
                image_ref: image,
                latitude: lat,
                longitude: lon,
                address,
                notes,
                activity,
                accuracy,
                heading,
                battery,
                device,
                ..Default::default()
            };
            let entry = submit::normalize_entry(&payload, period, now, &cutoffs)?;

            match db::submit_period(&pool, intern.id, date, &entry).await {
                Ok(log_id) => {
                    let late = if entry.submitted_late { " (late)" } else { "" };
                    println!(
                        "{} recorded for {} on {date}{late}; log {log_id}.",
                        period.label(),
                        intern.full_name
                    );
                }
                // A storage-level conflict means another writer won the
                // race for this slot; surface it the same way.
                Err(err) => match err.downcast_ref::<TrackerError>() {
                    Some(TrackerError::DuplicateSubmission { .. })
                    | Some(TrackerError::Conflict(_)) => {
                        println!("Already logged {} for this day.", period.label());
                        std::process::exit(1);
                    }
                    _ => return Err(err),
                },
            }
        }
        Commands::Logs { scope, sort, limit } => {
            let filter = build_filter(&pool, &scope).await?;
            let raw = db::fetch_logs(&pool, &filter).await?;
            let merged = query::run(&raw, &filter, sort);

            if merged.is_empty() {
                println!("No logs found for this window.");
                return Ok(());
            }

            for log in merged.iter().take(limit) {
                let status = if log.is_complete() {
                    "complete"
                } else if log.am_entry.is_some() {
                    "time in only"
                } else {
                    "time out only"
                };
                println!(
                    "- {} {} ({}) [{status}] log {}",
                    log.log_date, log.intern_name, log.company, log.primary_id
                );
            }
        }
        Commands::Stats { scope, as_of } => {
            let filter = build_filter(&pool, &scope).await?;
            let raw = db::fetch_logs(&pool, &filter).await?;
            let merged = query::run(&raw, &filter, SortKey::DateDesc);
            let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
            let stats = metrics::compute_metrics(&merged, as_of);
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Report { scope, as_of, out } => {
            let scope_label = scope.email.clone().or_else(|| scope.company.clone());
            let filter = build_filter(&pool, &scope).await?;
            let raw = db::fetch_logs(&pool, &filter).await?;
            let merged = query::run(&raw, &filter, SortKey::DateDesc);
            let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
            let stats = metrics::compute_metrics(&merged, as_of);
            let report = report::build_report(scope_label.as_deref(), &merged, &stats);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Import { csv } => {
            let cutoffs = submit::CutoffConfig::from_env()?;
            let inserted = db::import_csv(&pool, &csv, &cutoffs).await?;
            println!("Inserted {inserted} entries from {}.", csv.display());
        }
        Commands::DeleteLog { id } => {
            db::delete_log(&pool, id).await?;
            println!("Daily log {id} deleted.");
        }
        Commands::DeleteIntern { email } => {
            db::delete_intern(&pool, &email).await?;
            println!("Intern {email} and all their logs deleted.");
        }
    }

    Ok(())
}
