use chrono::{DateTime, Local, NaiveDateTime};

use super::model::{Reading, TrendDirection};

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse a `timestamp,mmol[,trend]` line. Returns `None` for anything malformed.
pub fn parse_reading_line(line: &str) -> Option<Reading> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let parts: Vec<_> = trimmed.split(',').map(str::trim).collect();
    if parts.len() < 2 || parts.len() > 3 {
        return None;
    }

    let taken_at = parse_timestamp(parts[0])?;
    let value_mmol: f64 = parts[1].parse().ok()?;
    if !value_mmol.is_finite() || value_mmol <= 0.0 {
        return None;
    }

    let reading = Reading::new(taken_at, value_mmol);
    Some(match parts.get(2) {
        Some(name) if !name.is_empty() => reading.with_trend(TrendDirection::from_name(name)),
        _ => reading,
    })
}

/// Local wall-clock time. RFC 3339 timestamps are converted to the local zone.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}
