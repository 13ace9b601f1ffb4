use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Intern {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub company: String,
    pub company_address: String,
    pub photo_ref: Option<String>,
    pub must_change_password: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "AM")]
    Am,
    #[serde(rename = "PM")]
    Pm,
}

impl Period {
    pub fn label(self) -> &'static str {
        match self {
            Period::Am => "Time In",
            Period::Pm => "Time Out",
        }
    }
}

impl std::str::FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AM" => Ok(Period::Am),
            "PM" => Ok(Period::Pm),
            other => Err(format!("unknown period '{other}', expected AM or PM")),
        }
    }
}

/// Captured device location. Latitude and longitude are required and
/// validated at submission time; the rest is best-effort sensor data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

/// Optional device/network/environment context attached to a submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Telemetry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<String>,
}

impl Telemetry {
    pub fn is_empty(&self) -> bool {
        self.device.is_none()
            && self.network.is_none()
            && self.battery.is_none()
            && self.weather.is_none()
    }
}

/// One AM or PM check-in, stored as a JSONB document on the day row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodEntry {
    pub image_ref: String,
    pub location: GeoPoint,
    pub timestamp: DateTime<Utc>,
    pub period: Period,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<Telemetry>,
    #[serde(default)]
    pub submitted_late: bool,
}

/// One raw day row as fetched from storage. The `(intern_id, log_date)` pair
/// is unique at the storage boundary, but the read pipeline must still
/// tolerate multiple rows per pair and reconcile them.
#[derive(Debug, Clone)]
pub struct DailyLog {
    pub id: Uuid,
    pub intern_id: Uuid,
    pub intern_name: String,
    pub company: String,
    pub log_date: NaiveDate,
    pub am_entry: Option<PeriodEntry>,
    pub pm_entry: Option<PeriodEntry>,
    pub created_at: DateTime<Utc>,
}

/// Reconciled view of one (intern, date) pair. Derived, never persisted.
#[derive(Debug, Clone)]
pub struct MergedDailyLog {
    pub primary_id: Uuid,
    pub intern_id: Uuid,
    pub intern_name: String,
    pub company: String,
    pub log_date: NaiveDate,
    pub am_entry: Option<PeriodEntry>,
    pub pm_entry: Option<PeriodEntry>,
}

impl MergedDailyLog {
    pub fn is_complete(&self) -> bool {
        self.am_entry.is_some() && self.pm_entry.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub intern_id: Option<Uuid>,
    pub company: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: StatusFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum StatusFilter {
    #[default]
    All,
    Complete,
    Incomplete,
    AmOnly,
    PmOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SortKey {
    #[default]
    DateDesc,
    DateAsc,
    NameAsc,
    NameDesc,
}

/// One point in a trend series: a date, ISO-week, month, or company bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendBucket {
    pub label: String,
    pub count: usize,
    pub complete: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct InternActivity {
    pub intern_name: String,
    pub company: String,
    pub total_days: usize,
    pub complete_days: usize,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub avg_hours: f64,
}

/// Derived statistics consumed by presentation.
#[derive(Debug, Clone, Serialize)]
pub struct Metrics {
    pub total_logs: usize,
    pub complete_logs: usize,
    pub completion_rate: f64,
    pub am_late: usize,
    pub pm_late: usize,
    pub on_time_entries: usize,
    pub avg_hours_worked: f64,
    pub daily_trends: Vec<TrendBucket>,
    pub weekly_activity: Vec<TrendBucket>,
    pub monthly_activity: Vec<TrendBucket>,
    pub company_breakdown: Vec<TrendBucket>,
    pub intern_activity: Vec<InternActivity>,
    pub heatmap: Vec<TrendBucket>,
}
