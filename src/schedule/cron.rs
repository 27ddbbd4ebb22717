//! Five-field cron expressions at minute granularity.
//!
//! Fields are minute, hour, day-of-month, month, day-of-week. Each field
//! accepts `*`, `*/N`, `A-B`, single values, and comma lists thereof.
//! Day-of-week runs 0–7 with both 0 and 7 meaning Sunday. When both
//! day-of-month and day-of-week are restricted, a day matches if *either*
//! does (vixie-cron semantics).

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

use crate::error::{IngestError, Result};

/// A parsed cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    minute: Field,
    hour: Field,
    day_of_month: Field,
    month: Field,
    day_of_week: Field,
}

/// Allowed values of one field, as a bitmask over `lo..=hi`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    lo: u32,
    hi: u32,
    bits: u64,
    /// False only for a bare `*`. A `*/1` counts as restricted even though
    /// every value is set; day matching depends on this distinction.
    restricted: bool,
}

impl Field {
    fn contains(&self, v: u32) -> bool {
        v >= self.lo && v <= self.hi && self.bits & (1 << (v - self.lo)) != 0
    }
}

// Matching a schedule can look arbitrarily far ahead (Feb 29 schedules only
// hit every four years), so the scan is bounded just past one leap cycle.
const MAX_SCAN_DAYS: i64 = 4 * 366 + 1;

impl CronExpr {
    pub fn parse(expr: &str) -> Result<Self> {
        let parts: Vec<&str> = expr.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(IngestError::Cron(format!(
                "expected 5 fields (minute hour dom month dow), got {}",
                parts.len()
            )));
        }

        let mut day_of_week = parse_field(parts[4], 0, 7)?;
        // Fold 7 (Sunday, POSIX-alternate) onto 0.
        if day_of_week.contains(7) {
            day_of_week.bits |= 1;
            day_of_week.bits &= !(1 << 7);
        }
        day_of_week.hi = 6;

        Ok(Self {
            minute: parse_field(parts[0], 0, 59)?,
            hour: parse_field(parts[1], 0, 23)?,
            day_of_month: parse_field(parts[2], 1, 31)?,
            month: parse_field(parts[3], 1, 12)?,
            day_of_week,
        })
    }

    /// Whether `t`'s calendar day satisfies the dom/month/dow fields.
    fn day_matches(&self, t: DateTime<Utc>) -> bool {
        if !self.month.contains(t.month()) {
            return false;
        }
        let dom = self.day_of_month.contains(t.day());
        let dow = self.day_of_week.contains(t.weekday().num_days_from_sunday());
        match (self.day_of_month.restricted, self.day_of_week.restricted) {
            (true, true) => dom || dow,
            (true, false) => dom,
            (false, true) => dow,
            (false, false) => true,
        }
    }

    /// Whether `t` (truncated to the minute) is a scheduled instant.
    pub fn matches(&self, t: DateTime<Utc>) -> bool {
        self.day_matches(t) && self.hour.contains(t.hour()) && self.minute.contains(t.minute())
    }

    /// The first scheduled instant strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let mut t = (after + Duration::minutes(1))
            .with_second(0)
            .and_then(|d| d.with_nanosecond(0))
            .unwrap_or(after);
        let horizon = after + Duration::days(MAX_SCAN_DAYS);

        while t <= horizon {
            if !self.day_matches(t) {
                // Jump straight to the next day's midnight.
                t = (t + Duration::days(1))
                    .with_hour(0)
                    .and_then(|d| d.with_minute(0))
                    .unwrap_or(t);
                continue;
            }
            if !self.hour.contains(t.hour()) {
                t = (t + Duration::hours(1)).with_minute(0).unwrap_or(t);
                continue;
            }
            if !self.minute.contains(t.minute()) {
                t = t + Duration::minutes(1);
                continue;
            }
            return Ok(t);
        }
        Err(IngestError::Cron(format!(
            "no matching instant within {MAX_SCAN_DAYS} days"
        )))
    }
}

fn parse_field(token: &str, lo: u32, hi: u32) -> Result<Field> {
    let mut field = Field {
        lo,
        hi,
        bits: 0,
        restricted: token != "*",
    };

    if token == "*" {
        for v in lo..=hi {
            field.bits |= 1 << (v - lo);
        }
        return Ok(field);
    }

    for part in token.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(IngestError::Cron("empty field token".to_string()));
        }
        if let Some(step) = part.strip_prefix("*/") {
            let n: u32 = step
                .parse()
                .map_err(|_| IngestError::Cron(format!("invalid step: {part}")))?;
            if n == 0 {
                return Err(IngestError::Cron("step must be > 0".to_string()));
            }
            let mut v = lo;
            while v <= hi {
                field.bits |= 1 << (v - lo);
                v += n;
            }
            continue;
        }
        if let Some((a, b)) = part.split_once('-') {
            let start = parse_value(a, lo, hi)?;
            let end = parse_value(b, lo, hi)?;
            if start > end {
                return Err(IngestError::Cron(format!("range start > end: {part}")));
            }
            for v in start..=end {
                field.bits |= 1 << (v - lo);
            }
            continue;
        }
        let v = parse_value(part, lo, hi)?;
        field.bits |= 1 << (v - lo);
    }
    Ok(field)
}

fn parse_value(token: &str, lo: u32, hi: u32) -> Result<u32> {
    let v: u32 = token
        .trim()
        .parse()
        .map_err(|_| IngestError::Cron(format!("invalid value: {token}")))?;
    if v < lo || v > hi {
        return Err(IngestError::Cron(format!(
            "value {v} out of range {lo}..={hi}"
        )));
    }
    Ok(v)
}
