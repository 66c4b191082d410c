//! Wire types for the MMBump REST API and the validated profile snapshot.
//!
//! The wire structs mirror the JSON the server sends; [`ProfileSnapshot`] is
//! what the farming loop reasons about. Conversion enforces the pairing rules
//! (grant fields together, `start_at` with `inProgress`).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{errors::Error, Result};

pub const STATUS_AWAIT: &str = "await";
pub const STATUS_IN_PROGRESS: &str = "inProgress";

// ============== Requests ==============

#[derive(Clone, Debug, Serialize)]
pub struct LoginRequest<'a> {
    #[serde(rename = "initData")]
    pub init_data: &'a str,
}

#[derive(Clone, Debug, Serialize)]
pub struct StartFarmingRequest {
    pub status: &'static str,
}

impl Default for StartFarmingRequest {
    fn default() -> Self {
        Self {
            status: STATUS_IN_PROGRESS,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct FinishFarmingRequest {
    #[serde(rename = "tapCount")]
    pub tap_count: u64,
}

// ============== Responses ==============

#[derive(Clone, Debug, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
}

impl LoginResponse {
    pub fn into_token(self) -> Result<String> {
        self.token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::UnexpectedResponse("login response has no token".to_string()))
    }
}

/// Shared shape of `/grant-day/claim` and `/farming/finish` responses.
#[derive(Clone, Debug, Deserialize)]
pub struct BalanceResponse {
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub balance: Option<i64>,
}

impl BalanceResponse {
    pub fn into_balance(self, what: &str) -> Result<i64> {
        self.balance
            .ok_or_else(|| Error::UnexpectedResponse(format!("{what} response has no balance")))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub status: Option<Value>,
}

impl StatusResponse {
    pub fn into_status(self) -> Result<String> {
        match self.status {
            Some(Value::String(s)) => Ok(s),
            Some(Value::Null) | None | Some(Value::Bool(false)) => Err(Error::UnexpectedResponse(
                "start farming response has no status".to_string(),
            )),
            Some(other) => Ok(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct FarmingResponse {
    pub info: FarmInfo,
    #[serde(deserialize_with = "lenient_i64")]
    pub system_time: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub balance: i64,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub day_grant_first: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub day_grant_day: Option<i64>,
    pub session: FarmSessionWire,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FarmInfo {
    #[serde(deserialize_with = "lenient_i64")]
    pub farm: i64,
    /// `false`, absent, or a string such as `"x2"`.
    #[serde(default)]
    pub boost: Option<Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FarmSessionWire {
    pub status: String,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub start_at: Option<i64>,
}

// ============== Snapshot ==============

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DailyGrant {
    pub first_claim_at: i64,
    pub day_index: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FarmingStatus {
    Await,
    InProgress { started_at: i64 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileSnapshot {
    pub farm_rate: u64,
    pub boost: Option<u32>,
    /// Server clock (epoch seconds). The only clock used for timing decisions.
    pub server_time: i64,
    pub balance: i64,
    pub daily_grant: Option<DailyGrant>,
    pub farming: FarmingStatus,
}

impl TryFrom<FarmingResponse> for ProfileSnapshot {
    type Error = Error;

    fn try_from(wire: FarmingResponse) -> Result<Self> {
        let farm_rate = u64::try_from(wire.info.farm).map_err(|_| {
            Error::UnexpectedResponse(format!("negative farm rate {}", wire.info.farm))
        })?;

        let daily_grant = match (wire.day_grant_first, wire.day_grant_day) {
            (None, None) => None,
            (Some(first_claim_at), Some(day_index)) => Some(DailyGrant {
                first_claim_at,
                day_index,
            }),
            (first, day) => {
                return Err(Error::UnexpectedResponse(format!(
                    "day_grant_first={first:?} and day_grant_day={day:?} must be set together"
                )))
            }
        };

        let farming = match wire.session.status.as_str() {
            STATUS_AWAIT => FarmingStatus::Await,
            STATUS_IN_PROGRESS => {
                let started_at = wire.session.start_at.ok_or_else(|| {
                    Error::UnexpectedResponse("inProgress session without start_at".to_string())
                })?;
                FarmingStatus::InProgress { started_at }
            }
            other => {
                return Err(Error::UnexpectedResponse(format!(
                    "unknown farming status {other:?}"
                )))
            }
        };

        Ok(Self {
            farm_rate,
            boost: parse_boost(wire.info.boost.as_ref()),
            server_time: wire.system_time,
            balance: wire.balance,
            daily_grant,
            farming,
        })
    }
}

/// `"x3"` -> 3. `false`, null, non-positive or unparsable values mean no boost.
pub fn parse_boost(v: Option<&Value>) -> Option<u32> {
    let n = match v? {
        Value::String(s) => s
            .trim()
            .trim_start_matches(|c: char| !c.is_ascii_digit())
            .parse::<i64>()
            .ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    u32::try_from(n).ok().filter(|n| *n > 0)
}

fn number_from_value(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral_f64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral_f64))
        }
        _ => None,
    }
}

/// `12345.0` is accepted; fractions, NaN and anything outside `i64` are not.
fn integral_f64(f: f64) -> Option<i64> {
    // 2^63 is exactly representable; `i64::MAX as f64` rounds up to it.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    (f.is_finite() && f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f)).then(|| f as i64)
}

fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<i64, D::Error> {
    let v = Value::deserialize(d)?;
    number_from_value(&v)
        .ok_or_else(|| serde::de::Error::custom(format!("expected a number, got {v}")))
}

fn lenient_opt_i64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<i64>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    match v {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(None),
        Some(v) => number_from_value(&v)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("expected a number, got {v}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(v: Value) -> Result<ProfileSnapshot> {
        let wire: FarmingResponse = serde_json::from_value(v)?;
        ProfileSnapshot::try_from(wire)
    }

    #[test]
    fn parses_in_progress_profile_with_boost_and_grant() {
        let p = snapshot(json!({
            "info": { "farm": 300, "boost": "x3" },
            "system_time": 1_700_000_000,
            "balance": 12_345.0,
            "day_grant_first": 1_699_900_000,
            "day_grant_day": 1,
            "session": { "status": "inProgress", "start_at": 1_699_990_000 }
        }))
        .unwrap();

        assert_eq!(p.farm_rate, 300);
        assert_eq!(p.boost, Some(3));
        assert_eq!(p.balance, 12_345);
        assert_eq!(
            p.daily_grant,
            Some(DailyGrant {
                first_claim_at: 1_699_900_000,
                day_index: 1
            })
        );
        assert_eq!(
            p.farming,
            FarmingStatus::InProgress {
                started_at: 1_699_990_000
            }
        );
    }

    #[test]
    fn parses_fresh_account() {
        let p = snapshot(json!({
            "info": { "farm": 100, "boost": false },
            "system_time": 10,
            "balance": 0,
            "session": { "status": "await" }
        }))
        .unwrap();
        assert_eq!(p.boost, None);
        assert_eq!(p.daily_grant, None);
        assert_eq!(p.farming, FarmingStatus::Await);
    }

    #[test]
    fn rejects_half_present_grant_fields() {
        let err = snapshot(json!({
            "info": { "farm": 100 },
            "system_time": 10,
            "balance": 0,
            "day_grant_day": 2,
            "session": { "status": "await" }
        }))
        .unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse(_)));
    }

    #[test]
    fn rejects_in_progress_without_start() {
        let err = snapshot(json!({
            "info": { "farm": 100 },
            "system_time": 10,
            "balance": 0,
            "session": { "status": "inProgress" }
        }))
        .unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse(_)));

        let err = snapshot(json!({
            "info": { "farm": 100 },
            "system_time": 10,
            "balance": 0,
            "session": { "status": "paused" }
        }))
        .unwrap_err();
        assert!(err.to_string().contains("paused"));
    }

    #[test]
    fn fractional_or_out_of_range_numbers_are_rejected() {
        let base = json!({
            "info": { "farm": 100 },
            "system_time": 1_700_000_000,
            "balance": 0,
            "day_grant_first": 1_699_900_000,
            "day_grant_day": 1,
            "session": { "status": "await" }
        });

        for (field, bad) in [
            ("day_grant_day", json!(1e300)),
            ("day_grant_day", json!("1e300")),
            ("system_time", json!(-1e19)),
            ("balance", json!(10.5)),
            ("balance", json!("NaN")),
        ] {
            let mut v = base.clone();
            v[field] = bad.clone();
            assert!(snapshot(v).is_err(), "{field}={bad} was accepted");
        }

        let mut v = base.clone();
        v["info"]["farm"] = json!(1.5);
        assert!(snapshot(v).is_err());

        let mut v = base;
        v["balance"] = json!("250.0");
        assert_eq!(snapshot(v).unwrap().balance, 250);
    }

    #[test]
    fn boost_parsing_variants() {
        assert_eq!(parse_boost(Some(&json!("x2"))), Some(2));
        assert_eq!(parse_boost(Some(&json!(4))), Some(4));
        assert_eq!(parse_boost(Some(&json!("x0"))), None);
        assert_eq!(parse_boost(Some(&json!(false))), None);
        assert_eq!(parse_boost(Some(&json!("turbo"))), None);
        assert_eq!(parse_boost(None), None);
    }

    #[test]
    fn action_responses_require_their_field() {
        let r: BalanceResponse = serde_json::from_value(json!({ "balance": "501" })).unwrap();
        assert_eq!(r.into_balance("claim").unwrap(), 501);

        let r: BalanceResponse = serde_json::from_value(json!({})).unwrap();
        assert!(r.into_balance("claim").is_err());

        let r: StatusResponse = serde_json::from_value(json!({ "status": "inProgress" })).unwrap();
        assert_eq!(r.into_status().unwrap(), "inProgress");

        let r: LoginResponse = serde_json::from_value(json!({ "token": "" })).unwrap();
        assert!(r.into_token().is_err());
    }

    #[test]
    fn request_bodies_use_api_field_names() {
        let body = serde_json::to_value(FinishFarmingRequest { tap_count: 42 }).unwrap();
        assert_eq!(body, json!({ "tapCount": 42 }));
        let body = serde_json::to_value(StartFarmingRequest::default()).unwrap();
        assert_eq!(body, json!({ "status": "inProgress" }));
        let body = serde_json::to_value(LoginRequest { init_data: "q=1" }).unwrap();
        assert_eq!(body, json!({ "initData": "q=1" }));
    }
}
