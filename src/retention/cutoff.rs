use crate::error::ConfigError;
use chrono::{DateTime, NaiveDateTime, Offset, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// How far back the retention window reaches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Everything created more than `duration_ms` before now is expired.
    FixedWindow { duration_ms: u64 },
    /// Everything created before `hour`:00 of yesterday (civil day in
    /// `timezone`) is expired.
    AnchoredDay { hour: u32, timezone: Tz },
}

impl RetentionPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            RetentionPolicy::FixedWindow { duration_ms } if *duration_ms == 0 => Err(
                ConfigError::InvalidValue("fixed_window duration_ms must be greater than zero".into()),
            ),
            RetentionPolicy::AnchoredDay { hour, .. } if *hour > 23 => Err(
                ConfigError::InvalidValue(format!("anchored_day hour must be 0-23, got {hour}")),
            ),
            _ => Ok(()),
        }
    }
}

/// Computes the retention cutoff for `policy` as seen at `now`.
///
/// Pure: the same `(policy, now)` always yields the same instant.
pub fn compute_cutoff(policy: &RetentionPolicy, now: DateTime<Utc>) -> Result<DateTime<Utc>, ConfigError> {
    policy.validate()?;

    match policy {
        RetentionPolicy::FixedWindow { duration_ms } => {
            let window = i64::try_from(*duration_ms)
                .ok()
                .and_then(TimeDelta::try_milliseconds)
                .ok_or_else(|| ConfigError::InvalidValue(format!("duration_ms {duration_ms} is out of range")))?;
            now.checked_sub_signed(window)
                .ok_or_else(|| ConfigError::InvalidValue(format!("duration_ms {duration_ms} reaches before the epoch range")))
        }
        RetentionPolicy::AnchoredDay { hour, timezone } => {
            let yesterday = now
                .with_timezone(timezone)
                .date_naive()
                .pred_opt()
                .ok_or_else(|| ConfigError::InvalidValue(format!("no calendar day precedes {now}")))?;
            let anchor = yesterday
                .and_hms_opt(*hour, 0, 0)
                .ok_or_else(|| ConfigError::InvalidValue(format!("invalid anchor hour {hour}")))?;
            resolve_local(timezone, anchor)
        }
    }
}

/// Maps a wall-clock time in `tz` to an instant. Ambiguous times (DST fall
/// back) resolve to the earlier instant; skipped times (DST spring forward)
/// are read with the offset in force before the transition, which lands on
/// the first wall-clock time after the gap.
fn resolve_local(tz: &Tz, local: NaiveDateTime) -> Result<DateTime<Utc>, ConfigError> {
    if let Some(resolved) = tz.from_local_datetime(&local).earliest() {
        return Ok(resolved.with_timezone(&Utc));
    }

    let before_gap = local - TimeDelta::days(1);
    let offset = tz
        .offset_from_local_datetime(&before_gap)
        .earliest()
        .map(|offset| offset.fix().local_minus_utc())
        .ok_or_else(|| ConfigError::InvalidValue(format!("{local} does not exist in {tz}")))?;
    let utc = local - TimeDelta::seconds(i64::from(offset));
    Ok(Utc.from_utc_datetime(&utc))
}
