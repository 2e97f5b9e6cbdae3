use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use chrono::{
    DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Timelike,
    Utc,
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

use crate::task::TaskRecord;

const TIMEZONE_ENV_VAR: &str = "TICKLER_TIMEZONE";
const DEFAULT_TIMEZONE: &str = "Asia/Tokyo";

/// Bare wall-clock form written by the legacy app, no offset marker.
const LEGACY_LOCAL_PATTERN: &str = r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}$";
const LEGACY_LOCAL_FORMAT: &str = "%Y-%m-%dT%H:%M";

#[derive(Debug, Deserialize)]
struct TimezoneFileConfig {
    timezone: Option<String>,
}

/// The zone every wall-clock value is interpreted and rendered in.
///
/// Resolved once: `TICKLER_TIMEZONE` env var, then the config file's
/// `timezone` key, then the default. Reminders always render in the
/// current zone; the offset at creation time is not kept.
pub fn local_timezone() -> Tz {
    static LOCAL_TZ: OnceLock<Tz> = OnceLock::new();
    *LOCAL_TZ.get_or_init(resolve_local_timezone)
}

fn resolve_local_timezone() -> Tz {
    if let Ok(raw) = std::env::var(TIMEZONE_ENV_VAR)
        && let Some(tz) = parse_timezone(&raw, TIMEZONE_ENV_VAR)
    {
        return tz;
    }

    if let Some(path) = crate::config::config_file_path()
        && let Some(tz) = load_timezone_from_file(&path)
    {
        return tz;
    }

    parse_timezone(DEFAULT_TIMEZONE, "DEFAULT_TIMEZONE").unwrap_or_else(|| {
        tracing::error!("failed to parse fallback timezone; using UTC");
        chrono_tz::UTC
    })
}

fn load_timezone_from_file(path: &PathBuf) -> Option<Tz> {
    if !path.exists() {
        tracing::debug!(file = %path.display(), "config file not found; no timezone override");
        return None;
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::error!(file = %path.display(), error = %err, "failed reading config file");
            return None;
        }
    };

    let parsed = match toml::from_str::<TimezoneFileConfig>(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::error!(file = %path.display(), error = %err, "failed parsing config file");
            return None;
        }
    };

    let timezone = parsed.timezone?;
    parse_timezone(timezone.as_str(), &format!("file:{}", path.display()))
}

fn parse_timezone(raw: &str, source: &str) -> Option<Tz> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        tracing::warn!(source, "timezone source was empty");
        return None;
    }

    match trimmed.parse::<Tz>() {
        Ok(tz) => {
            tracing::info!(source, timezone = %trimmed, "configured local timezone");
            Some(tz)
        }
        Err(err) => {
            tracing::error!(source, timezone = %trimmed, error = %err, "failed to parse timezone id");
            None
        }
    }
}

/// Resolve a wall-clock value in `tz` to an instant. Ambiguous values
/// (DST fold) take the earliest instant; nonexistent values (DST gap)
/// resolve to `None`.
fn resolve_local(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(first, second) => {
            tracing::warn!(
                naive = %naive,
                first = %first,
                second = %second,
                "ambiguous local datetime; using earliest"
            );
            let chosen = if first <= second { first } else { second };
            Some(chosen.with_timezone(&Utc))
        }
        LocalResult::None => None,
    }
}

/// Compose a local calendar date and optional clock time into the
/// canonical instant. A missing time defaults to start of day; the caller
/// records `remind_has_time = false` in that case.
pub fn local_to_canonical_in(
    tz: Tz,
    date: NaiveDate,
    time: Option<NaiveTime>,
) -> Option<DateTime<Utc>> {
    resolve_local(tz, date.and_time(time.unwrap_or(NaiveTime::MIN)))
}

pub fn local_to_canonical(date: NaiveDate, time: Option<NaiveTime>) -> Option<DateTime<Utc>> {
    local_to_canonical_in(local_timezone(), date, time)
}

/// Inverse of [`local_to_canonical_in`], rendered in the viewer's current
/// zone.
pub fn canonical_to_local_in(tz: Tz, ts: DateTime<Utc>) -> (NaiveDate, NaiveTime) {
    let local = ts.with_timezone(&tz);
    (local.date_naive(), local.time())
}

pub fn canonical_to_local(ts: DateTime<Utc>) -> (NaiveDate, NaiveTime) {
    canonical_to_local_in(local_timezone(), ts)
}

/// Canonical wire form: RFC 3339 with explicit offset.
pub fn parse_canonical(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn format_canonical(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[must_use]
pub fn local_month_key_in(tz: Tz, ts: DateTime<Utc>) -> String {
    ts.with_timezone(&tz).format("%Y-%m").to_string()
}

#[must_use]
pub fn local_date_key_in(tz: Tz, ts: DateTime<Utc>) -> String {
    ts.with_timezone(&tz).format("%Y-%m-%d").to_string()
}

#[must_use]
pub fn local_month_key(ts: DateTime<Utc>) -> String {
    local_month_key_in(local_timezone(), ts)
}

#[must_use]
pub fn local_date_key(ts: DateTime<Utc>) -> String {
    local_date_key_in(local_timezone(), ts)
}

fn legacy_local_re() -> Option<&'static Regex> {
    static LEGACY_RE: OnceLock<Option<Regex>> = OnceLock::new();
    LEGACY_RE
        .get_or_init(|| Regex::new(LEGACY_LOCAL_PATTERN).ok())
        .as_ref()
}

/// Rewrite legacy bare-local `remind_at` values (`YYYY-MM-DDTHH:mm`, no
/// offset) as canonical instants, reinterpreting them as wall-clock values
/// in `tz`. Records already canonical, without a reminder, or unparseable
/// pass through unchanged. Idempotent: canonical output carries an offset
/// and no longer matches the bare pattern.
pub fn migrate_legacy_in(tz: Tz, records: Vec<TaskRecord>) -> Vec<TaskRecord> {
    let Some(re) = legacy_local_re() else {
        return records;
    };

    records
        .into_iter()
        .map(|mut record| {
            let Some(raw) = record.remind_at.as_deref() else {
                return record;
            };
            if !re.is_match(raw) {
                return record;
            }

            match NaiveDateTime::parse_from_str(raw, LEGACY_LOCAL_FORMAT) {
                Ok(naive) => match resolve_local(tz, naive) {
                    Some(ts) => {
                        tracing::info!(id = %record.id, from = raw, "migrated legacy remind date");
                        record.remind_at = Some(format_canonical(ts));
                    }
                    None => {
                        tracing::warn!(
                            id = %record.id,
                            remind_at = raw,
                            "legacy remind date does not exist in local timezone; left as-is"
                        );
                    }
                },
                Err(err) => {
                    tracing::warn!(id = %record.id, remind_at = raw, error = %err, "legacy remind date failed to parse; left as-is");
                }
            }
            record
        })
        .collect()
}

pub fn migrate_legacy(records: Vec<TaskRecord>) -> Vec<TaskRecord> {
    migrate_legacy_in(local_timezone(), records)
}

/// Whether a reminder carries an explicit clock time. The stored flag wins
/// when present; otherwise a local wall-clock time of exactly midnight is
/// taken to mean date-only. A genuine midnight reminder entered without
/// the flag is indistinguishable from a date-only one.
pub fn has_explicit_time_in(tz: Tz, remind_at: DateTime<Utc>, flag: Option<bool>) -> bool {
    match flag {
        Some(explicit) => explicit,
        None => {
            let time = remind_at.with_timezone(&tz).time();
            time.hour() != 0 || time.minute() != 0 || time.second() != 0
        }
    }
}

pub fn has_explicit_time(remind_at: DateTime<Utc>, flag: Option<bool>) -> bool {
    has_explicit_time_in(local_timezone(), remind_at, flag)
}

/// Parse user-entered reminder input: the canonical RFC 3339 form, a
/// local `YYYY-MM-DDTHH:mm` / `YYYY-MM-DD HH:mm` wall-clock form, or a
/// bare `YYYY-MM-DD` date. Returns the instant plus the explicit-time
/// flag to record (`None` means infer from the instant).
pub fn parse_remind_input_in(tz: Tz, raw: &str) -> Option<(DateTime<Utc>, Option<bool>)> {
    let token = raw.trim();
    if token.is_empty() {
        return None;
    }

    if let Some(ts) = parse_canonical(token) {
        return Some((ts, None));
    }

    for fmt in [LEGACY_LOCAL_FORMAT, "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(token, fmt) {
            return resolve_local(tz, naive).map(|ts| (ts, Some(true)));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        return local_to_canonical_in(tz, date, None).map(|ts| (ts, Some(false)));
    }

    None
}

pub fn parse_remind_input(raw: &str) -> Option<(DateTime<Utc>, Option<bool>)> {
    parse_remind_input_in(local_timezone(), raw)
}
