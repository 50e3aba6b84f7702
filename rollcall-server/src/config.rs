//! Runtime settings for the attendance service
//!
//! Values live in the `settings` table. Missing keys are written back with
//! their defaults on startup, so the table always shows what is in effect.
//!
//! `face_service_url` is resolved once from Database → ENV → TOML → default
//! and then stored, after which the database copy is authoritative.

use rollcall_common::config::TomlConfig;
use rollcall_common::db::{ensure_setting, get_setting, set_setting};
use rollcall_common::{time, Error, Result};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the face service base URL
pub const FACE_SERVICE_URL_ENV: &str = "ROLLCALL_FACE_SERVICE_URL";

pub const DEFAULT_FACE_SERVICE_URL: &str = "http://localhost:8000";

/// Ten years
pub const MAX_DISPUTE_WINDOW_HOURS: i64 = 10 * 365 * 24;

/// One year
pub const MAX_UPLOAD_WINDOW_MINUTES: i64 = 365 * 24 * 60;

/// Attendance tunables
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceSettings {
    /// Cosine similarity at or above which a student is PRESENT
    pub match_threshold: f64,
    /// Hours after lecture-date midnight during which disputes may be raised
    pub dispute_window_hours: i64,
    pub face_service_url: String,
    pub face_service_timeout_ms: u64,
    /// Minutes after slot end during which photos may be uploaded; `None` = unbounded
    pub upload_window_minutes: Option<i64>,
    /// Campus timezone as a fixed offset from UTC
    pub campus_utc_offset_minutes: i32,
    pub generation_max_attempts: u32,
    /// Initial retry delay, doubled per attempt
    pub generation_backoff_ms: u64,
    pub min_enrollment_images: usize,
}

impl Default for AttendanceSettings {
    fn default() -> Self {
        Self {
            match_threshold: 0.55,
            dispute_window_hours: 72,
            face_service_url: DEFAULT_FACE_SERVICE_URL.to_string(),
            face_service_timeout_ms: 60_000,
            upload_window_minutes: None,
            campus_utc_offset_minutes: 0,
            generation_max_attempts: 5,
            generation_backoff_ms: 500,
            min_enrollment_images: 3,
        }
    }
}

impl AttendanceSettings {
    /// Load every setting, seeding missing keys with defaults
    pub async fn load(db: &SqlitePool, toml_config: &TomlConfig) -> Result<Self> {
        let defaults = Self::default();

        let face_service_url = resolve_face_service_url(db, toml_config).await?;

        let settings = Self {
            match_threshold: load_parsed(db, "match_threshold", defaults.match_threshold).await?,
            dispute_window_hours: load_parsed(
                db,
                "dispute_window_hours",
                defaults.dispute_window_hours,
            )
            .await?,
            face_service_url,
            face_service_timeout_ms: load_parsed(
                db,
                "face_service_timeout_ms",
                defaults.face_service_timeout_ms,
            )
            .await?,
            upload_window_minutes: load_optional(db, "upload_window_minutes").await?,
            campus_utc_offset_minutes: load_parsed(
                db,
                "campus_utc_offset_minutes",
                defaults.campus_utc_offset_minutes,
            )
            .await?,
            generation_max_attempts: load_parsed(
                db,
                "generation_max_attempts",
                defaults.generation_max_attempts,
            )
            .await?,
            generation_backoff_ms: load_parsed(
                db,
                "generation_backoff_ms",
                defaults.generation_backoff_ms,
            )
            .await?,
            min_enrollment_images: load_parsed(
                db,
                "min_enrollment_images",
                defaults.min_enrollment_images,
            )
            .await?,
        };

        settings.validate()?;

        info!(
            match_threshold = settings.match_threshold,
            dispute_window_hours = settings.dispute_window_hours,
            upload_window_minutes = ?settings.upload_window_minutes,
            "Attendance settings loaded"
        );

        Ok(settings)
    }

    /// Reject values outside their meaningful range
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.match_threshold) {
            return Err(Error::Config(format!(
                "match_threshold must be within [0, 1], got {}",
                self.match_threshold
            )));
        }
        if !(1..=MAX_DISPUTE_WINDOW_HOURS).contains(&self.dispute_window_hours) {
            return Err(Error::Config(format!(
                "dispute_window_hours must be within [1, {}], got {}",
                MAX_DISPUTE_WINDOW_HOURS, self.dispute_window_hours
            )));
        }
        if self.face_service_timeout_ms == 0 {
            return Err(Error::Config("face_service_timeout_ms must be positive".into()));
        }
        if matches!(self.upload_window_minutes, Some(m) if !(0..=MAX_UPLOAD_WINDOW_MINUTES).contains(&m)) {
            return Err(Error::Config(format!(
                "upload_window_minutes must be within [0, {}]",
                MAX_UPLOAD_WINDOW_MINUTES
            )));
        }
        if self.campus_utc_offset_minutes.abs() >= 24 * 60 {
            return Err(Error::Config(format!(
                "campus_utc_offset_minutes out of range: {}",
                self.campus_utc_offset_minutes
            )));
        }
        if self.generation_max_attempts == 0 {
            return Err(Error::Config("generation_max_attempts must be at least 1".into()));
        }
        if self.min_enrollment_images == 0 {
            return Err(Error::Config("min_enrollment_images must be at least 1".into()));
        }
        Ok(())
    }

    pub fn face_service_timeout(&self) -> Duration {
        time::millis_to_duration(self.face_service_timeout_ms)
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn generation_backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        time::millis_to_duration(self.generation_backoff_ms.saturating_mul(factor))
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| Error::Config(format!("Setting '{}' has invalid value '{}': {}", key, value, e)))
}

async fn load_parsed<T>(db: &SqlitePool, key: &str, default: T) -> Result<T>
where
    T: FromStr + ToString,
    T::Err: std::fmt::Display,
{
    let raw = ensure_setting(db, key, &default.to_string()).await?;
    parse_value(key, &raw)
}

/// Empty or missing value means "disabled"
async fn load_optional<T>(db: &SqlitePool, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = ensure_setting(db, key, "").await?;
    if raw.trim().is_empty() {
        Ok(None)
    } else {
        parse_value(key, &raw).map(Some)
    }
}

/// Resolve the face service URL
///
/// **Priority:** Database → ENV → TOML → default. The winning value is
/// written back to the database when it did not come from there.
pub async fn resolve_face_service_url(db: &SqlitePool, toml_config: &TomlConfig) -> Result<String> {
    let db_url = get_setting(db, "face_service_url")
        .await?
        .filter(|u| is_valid_url(u));
    let env_url = std::env::var(FACE_SERVICE_URL_ENV)
        .ok()
        .filter(|u| is_valid_url(u));
    let toml_url = toml_config
        .face_service_url
        .clone()
        .filter(|u| is_valid_url(u));

    let sources: Vec<&str> = [
        db_url.as_ref().map(|_| "database"),
        env_url.as_ref().map(|_| "environment"),
        toml_url.as_ref().map(|_| "TOML"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if sources.len() > 1 {
        warn!(
            "Face service URL found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    if let Some(url) = db_url {
        return Ok(url);
    }

    let (url, source) = match (env_url, toml_url) {
        (Some(url), _) => (url, "environment"),
        (None, Some(url)) => (url, "TOML"),
        (None, None) => (DEFAULT_FACE_SERVICE_URL.to_string(), "default"),
    };

    set_setting(db, "face_service_url", &url).await?;
    info!("Face service URL loaded from {}: {}", source, url);
    Ok(url)
}

/// Non-blank http(s) URL
pub fn is_valid_url(url: &str) -> bool {
    let url = url.trim();
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        AttendanceSettings::default().validate().unwrap();
    }

    #[test]
    fn test_backoff_doubles() {
        let settings = AttendanceSettings::default();
        assert_eq!(settings.generation_backoff(1), Duration::from_millis(500));
        assert_eq!(settings.generation_backoff(2), Duration::from_millis(1000));
        assert_eq!(settings.generation_backoff(4), Duration::from_millis(4000));
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let settings = AttendanceSettings {
            match_threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_window_upper_bounds() {
        let settings = AttendanceSettings {
            dispute_window_hours: i64::MAX,
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(Error::Config(_))));

        let settings = AttendanceSettings {
            upload_window_minutes: Some(MAX_UPLOAD_WINDOW_MINUTES + 1),
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(Error::Config(_))));

        let settings = AttendanceSettings {
            dispute_window_hours: MAX_DISPUTE_WINDOW_HOURS,
            upload_window_minutes: Some(MAX_UPLOAD_WINDOW_MINUTES),
            ..Default::default()
        };
        settings.validate().unwrap();
    }

    #[test]
    fn test_url_validation() {
        assert!(is_valid_url("http://faces:8000"));
        assert!(is_valid_url(" https://faces.example "));
        assert!(!is_valid_url(""));
        assert!(!is_valid_url("faces:8000"));
    }
}
