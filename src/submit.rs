use chrono::{DateTime, NaiveTime, Utc};

use crate::error::TrackerError;
use crate::models::{DailyLog, GeoPoint, Period, PeriodEntry, Telemetry};

/// Raw submission payload before normalization. Required fields are the
/// captured image and coordinates; everything else is best-effort.
#[derive(Debug, Clone, Default)]
pub struct SubmissionPayload {
    pub image_ref: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub altitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub notes: Option<String>,
    pub hours: Option<f64>,
    pub activity: Option<String>,
    pub device: Option<String>,
    pub network: Option<String>,
    pub battery: Option<f64>,
    pub weather: Option<String>,
}

/// Per-period lateness cutoffs, compared against the submission time of day
/// in UTC. Lateness is stamped here on the write path and carried through
/// unchanged by the read pipeline.
#[derive(Debug, Clone, Copy)]
pub struct CutoffConfig {
    pub am_deadline: NaiveTime,
    pub pm_deadline: NaiveTime,
}

impl Default for CutoffConfig {
    fn default() -> Self {
        Self {
            am_deadline: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            pm_deadline: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        }
    }
}

impl CutoffConfig {
    /// Reads `AM_CUTOFF` / `PM_CUTOFF` (HH:MM, UTC) from the environment,
    /// falling back to the defaults when unset.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();
        if let Ok(value) = std::env::var("AM_CUTOFF") {
            config.am_deadline = NaiveTime::parse_from_str(&value, "%H:%M")
                .map_err(|e| anyhow::anyhow!("invalid AM_CUTOFF '{value}': {e}"))?;
        }
        if let Ok(value) = std::env::var("PM_CUTOFF") {
            config.pm_deadline = NaiveTime::parse_from_str(&value, "%H:%M")
                .map_err(|e| anyhow::anyhow!("invalid PM_CUTOFF '{value}': {e}"))?;
        }
        Ok(config)
    }

    pub fn is_late(&self, period: Period, timestamp: DateTime<Utc>) -> bool {
        let deadline = match period {
            Period::Am => self.am_deadline,
            Period::Pm => self.pm_deadline,
        };
        timestamp.time() > deadline
    }
}

/// Validate and normalize a submission payload into a `PeriodEntry`.
///
/// Missing image or out-of-range coordinates reject the whole submission.
/// Invalid optional numerics (negative accuracy, heading outside [0, 360],
/// battery outside [0, 100]) are dropped silently rather than rejected.
pub fn normalize_entry(
    payload: &SubmissionPayload,
    period: Period,
    timestamp: DateTime<Utc>,
    cutoffs: &CutoffConfig,
) -> Result<PeriodEntry, TrackerError> {
    if payload.image_ref.trim().is_empty() {
        return Err(TrackerError::validation(
            "image",
            "a captured image is required",
        ));
    }
    if !payload.latitude.is_finite() || !(-90.0..=90.0).contains(&payload.latitude) {
        return Err(TrackerError::validation(
            "latitude",
            format!("{} is not a valid latitude", payload.latitude),
        ));
    }
    if !payload.longitude.is_finite() || !(-180.0..=180.0).contains(&payload.longitude) {
        return Err(TrackerError::validation(
            "longitude",
            format!("{} is not a valid longitude", payload.longitude),
        ));
    }

    let location = GeoPoint {
        latitude: payload.latitude,
        longitude: payload.longitude,
        address: payload.address.clone(),
        altitude: payload.altitude.filter(|v| v.is_finite()),
        accuracy: payload.accuracy.filter(|v| v.is_finite() && *v >= 0.0),
        heading: payload
            .heading
            .filter(|v| v.is_finite() && (0.0..=360.0).contains(v)),
        speed: payload.speed.filter(|v| v.is_finite() && *v >= 0.0),
    };

    let telemetry = Telemetry {
        device: payload.device.clone(),
        network: payload.network.clone(),
        battery: payload
            .battery
            .filter(|v| v.is_finite() && (0.0..=100.0).contains(v)),
        weather: payload.weather.clone(),
    };

    Ok(PeriodEntry {
        image_ref: payload.image_ref.clone(),
        location,
        timestamp,
        period,
        notes: payload.notes.clone(),
        hours: payload.hours.filter(|v| v.is_finite() && *v >= 0.0),
        activity: payload.activity.clone(),
        telemetry: (!telemetry.is_empty()).then_some(telemetry),
        submitted_late: cutoffs.is_late(period, timestamp),
    })
}

/// Pure slot check backing the storage-level guard: a period already present
/// on the day row can never be overwritten.
pub fn check_slot(existing: &DailyLog, period: Period) -> Result<(), TrackerError> {
    let occupied = match period {
        Period::Am => existing.am_entry.is_some(),
        Period::Pm => existing.pm_entry.is_some(),
    };
    if occupied {
        Err(TrackerError::DuplicateSubmission { period })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use uuid::Uuid;

    fn payload() -> SubmissionPayload {
        SubmissionPayload {
            image_ref: "selfie.jpg".to_string(),
            latitude: 14.5995,
            longitude: 120.9842,
            ..Default::default()
        }
    }

    fn at(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, hour, min, 0).unwrap()
    }

    #[test]
    fn rejects_missing_image() {
        let mut p = payload();
        p.image_ref = "  ".to_string();
        let err = normalize_entry(&p, Period::Am, at(8, 0), &CutoffConfig::default());
        assert!(matches!(err, Err(TrackerError::Validation { .. })));
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let mut p = payload();
        p.latitude = 91.0;
        assert!(normalize_entry(&p, Period::Am, at(8, 0), &CutoffConfig::default()).is_err());

        let mut p = payload();
        p.longitude = f64::NAN;
        assert!(normalize_entry(&p, Period::Am, at(8, 0), &CutoffConfig::default()).is_err());
    }

    #[test]
    fn drops_invalid_optional_numerics_instead_of_rejecting() {
        let mut p = payload();
        p.accuracy = Some(-5.0);
        p.heading = Some(420.0);
        p.battery = Some(180.0);
        p.speed = Some(1.5);

        let entry = normalize_entry(&p, Period::Am, at(8, 0), &CutoffConfig::default()).unwrap();
        assert!(entry.location.accuracy.is_none());
        assert!(entry.location.heading.is_none());
        assert_eq!(entry.location.speed, Some(1.5));
        assert!(entry.telemetry.is_none());
    }

    #[test]
    fn stamps_lateness_from_the_period_cutoff() {
        let cutoffs = CutoffConfig::default();
        let on_time = normalize_entry(&payload(), Period::Am, at(9, 15), &cutoffs).unwrap();
        assert!(!on_time.submitted_late);

        let late = normalize_entry(&payload(), Period::Am, at(9, 45), &cutoffs).unwrap();
        assert!(late.submitted_late);

        let pm_on_time = normalize_entry(&payload(), Period::Pm, at(17, 30), &cutoffs).unwrap();
        assert!(!pm_on_time.submitted_late);
    }

    #[test]
    fn occupied_slot_is_rejected_and_left_unchanged() {
        let cutoffs = CutoffConfig::default();
        let entry = normalize_entry(&payload(), Period::Am, at(8, 0), &cutoffs).unwrap();
        let existing = DailyLog {
            id: Uuid::new_v4(),
            intern_id: Uuid::new_v4(),
            intern_name: "Mia Santos".to_string(),
            company: "Acme Corp".to_string(),
            log_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            am_entry: Some(entry.clone()),
            pm_entry: None,
            created_at: at(8, 0),
        };

        let second = check_slot(&existing, Period::Am);
        assert!(matches!(
            second,
            Err(TrackerError::DuplicateSubmission { period: Period::Am })
        ));
        // The original entry is untouched.
        assert_eq!(existing.am_entry.as_ref().unwrap().image_ref, "selfie.jpg");

        // The other period of the same day is still open.
        assert!(check_slot(&existing, Period::Pm).is_ok());
    }
}
