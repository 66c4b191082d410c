//! Pure timing math for grants, farming cycles and tap counts.
//!
//! Every function takes the server clock explicitly; nothing here reads the
//! local wall clock.

use std::time::Duration;

use chrono::{Local, TimeZone};
use rand::Rng;

use crate::{errors::Error, profile::DailyGrant, Result};

pub const SECONDS_PER_DAY: i64 = 86_400;
pub const FARMING_CYCLE_SECS: i64 = 6 * 3_600;

pub const MIN_TAP_PERCENT: u32 = 100;
pub const MAX_TAP_PERCENT: u32 = 200;

/// Outcome of the daily grant check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrantEligibility {
    Available,
    /// Not claimable yet. `wait_secs` is measured against the server clock.
    Pending { wait_secs: i64, next_at: i64 },
}

impl GrantEligibility {
    pub fn is_available(&self) -> bool {
        matches!(self, GrantEligibility::Available)
    }

    pub fn wait_secs(&self) -> i64 {
        match self {
            GrantEligibility::Available => 0,
            GrantEligibility::Pending { wait_secs, .. } => *wait_secs,
        }
    }
}

/// Grant is claimable once strictly more than `day_index` days have passed
/// since the first claim. A never-claimed grant is claimable immediately.
///
/// Values that overflow `i64` seconds are rejected as an unexpected response.
pub fn check_daily_grant(
    grant: Option<DailyGrant>,
    server_time: i64,
) -> Result<GrantEligibility> {
    let Some(DailyGrant {
        first_claim_at,
        day_index,
    }) = grant
    else {
        return Ok(GrantEligibility::Available);
    };

    // `elapsed / 86400 > day_index` over the reals, kept in integers.
    let elapsed = server_time
        .checked_sub(first_claim_at)
        .ok_or_else(|| out_of_range("daily grant first claim", first_claim_at))?;
    let threshold = day_index
        .checked_mul(SECONDS_PER_DAY)
        .ok_or_else(|| out_of_range("daily grant day index", day_index))?;
    if elapsed > threshold {
        return Ok(GrantEligibility::Available);
    }

    let next_at = first_claim_at
        .checked_add(threshold)
        .ok_or_else(|| out_of_range("daily grant day index", day_index))?;
    let wait_secs = threshold
        .checked_sub(elapsed)
        .ok_or_else(|| out_of_range("daily grant first claim", first_claim_at))?;
    Ok(GrantEligibility::Pending { wait_secs, next_at })
}

/// Seconds left in the current farming cycle. Zero or negative means claimable.
pub fn claim_wait(started_at: i64, server_time: i64) -> Result<i64> {
    server_time
        .checked_sub(started_at)
        .and_then(|elapsed| FARMING_CYCLE_SECS.checked_sub(elapsed))
        .ok_or_else(|| out_of_range("farming start", started_at))
}

fn out_of_range(field: &str, value: i64) -> Error {
    Error::UnexpectedResponse(format!("{field} out of range: {value}"))
}

/// `round(farm * boost * percent / 100)`; boost only applies when positive.
pub fn tap_count(farm_rate: u64, boost: Option<u32>, percent: u32) -> u64 {
    let full = match boost {
        Some(b) if b > 0 => farm_rate.saturating_mul(u64::from(b)),
        _ => farm_rate,
    };
    full.saturating_mul(u64::from(percent)).saturating_add(50) / 100
}

/// Uniform integer percentage in `[100, 200]`.
pub fn random_tap_percent<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    rng.gen_range(MIN_TAP_PERCENT..=MAX_TAP_PERCENT)
}

pub fn secs(n: i64) -> Duration {
    Duration::from_secs(n.max(0) as u64)
}

/// `"5 hours and 12 minutes"` for log lines.
pub fn format_wait(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{} hours and {} minutes", secs / 3_600, (secs % 3_600) / 60)
}

/// Server epoch seconds rendered in the local timezone.
pub fn format_local(epoch_secs: i64) -> String {
    Local
        .timestamp_opt(epoch_secs, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| epoch_secs.to_string())
}
