//! Decoding of MDTM timestamps.
//!
//! Servers report modification times as `yyyyMMddHHmmss` (optionally followed
//! by `.sss`) without a zone. The digits are read as wall-clock time in the
//! configured server zone. When no zone has been configured the client's own
//! local zone is assumed, which is only right when client and server agree.

use crate::error::{ClientError, ClientResult};
use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MDTM_FORMAT: &str = "%Y%m%d%H%M%S";
const MDTM_CODE: &str = "213";

/// Zone the server uses for the timestamps it reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ServerZone {
    /// The zone of the machine running the client.
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl ServerZone {
    pub fn utc() -> Self {
        Self::Fixed(Utc.fix())
    }
}

impl FromStr for ServerZone {
    type Err = ClientError;

    /// Accepts `local`, `UTC`/`GMT`/`Z`, or an offset such as `+02:00`, `-0530`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "local" => return Ok(Self::Local),
            "utc" | "gmt" | "z" => return Ok(Self::utc()),
            _ => {}
        }

        let invalid = || ClientError::validation(format!("unrecognised time zone: {s:?}"));
        let (sign, rest) = match s.as_bytes().first() {
            Some(b'+') => (1, &s[1..]),
            Some(b'-') => (-1, &s[1..]),
            _ => return Err(invalid()),
        };
        let digits: String = rest.chars().filter(|c| *c != ':').collect();
        if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
        let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
        if minutes >= 60 {
            return Err(invalid());
        }
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(Self::Fixed)
            .ok_or_else(invalid)
    }
}

impl TryFrom<String> for ServerZone {
    type Error = ClientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ServerZone> for String {
    fn from(zone: ServerZone) -> Self {
        zone.to_string()
    }
}

impl fmt::Display for ServerZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampResolver {
    zone: ServerZone,
}

impl TimestampResolver {
    pub const fn new(zone: ServerZone) -> Self {
        Self { zone }
    }

    pub const fn zone(&self) -> ServerZone {
        self.zone
    }

    /// Decode a raw MDTM reply (code must be 213) into an instant.
    pub fn resolve_reply(&self, raw: &str) -> ClientResult<DateTime<Utc>> {
        let reply = crate::reply::Reply::validate(raw, MDTM_CODE)?;
        self.resolve(reply.text())
            .map_err(|_| ClientError::protocol(MDTM_CODE, reply.text()))
    }

    /// Decode the timestamp digits into an instant.
    pub fn resolve(&self, stamp: &str) -> ClientResult<DateTime<Utc>> {
        let stamp = stamp.trim();
        let (digits, fraction) = match stamp.split_once('.') {
            Some((digits, fraction)) => (digits, Some(fraction)),
            None => (stamp, None),
        };
        if digits.len() != 14 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ClientError::validation(format!(
                "timestamp {stamp:?} is not yyyyMMddHHmmss"
            )));
        }

        let mut naive = NaiveDateTime::parse_from_str(digits, MDTM_FORMAT)
            .map_err(|e| ClientError::validation(format!("timestamp {stamp:?}: {e}")))?;
        if let Some(fraction) = fraction {
            naive += fraction_millis(fraction)?;
        }

        let instant = match self.zone {
            ServerZone::Local => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            ServerZone::Fixed(offset) => offset
                .from_local_datetime(&naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc)),
        };
        instant.ok_or_else(|| {
            ClientError::validation(format!("timestamp {stamp:?} does not exist in zone {}", self.zone))
        })
    }

    /// Same as [`resolve`](Self::resolve) but as milliseconds since the epoch.
    pub fn resolve_millis(&self, stamp: &str) -> ClientResult<i64> {
        self.resolve(stamp).map(|dt| dt.timestamp_millis())
    }
}

fn fraction_millis(fraction: &str) -> ClientResult<chrono::Duration> {
    if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ClientError::validation(format!(
            "bad fractional seconds {fraction:?}"
        )));
    }
    let padded: String = fraction.chars().chain("000".chars()).take(3).collect();
    let millis: i64 = padded
        .parse()
        .map_err(|_| ClientError::validation(format!("bad fractional seconds {fraction:?}")))?;
    Ok(chrono::Duration::milliseconds(millis))
}
