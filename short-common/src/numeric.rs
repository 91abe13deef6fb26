//! Numeric helpers shared by the scoring rules.
//!
//! Market tables quote amounts as plain numbers or as Chinese unit strings
//! (`12.3亿`, `4500万`); everything here maps them onto `f64`.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};

const YI: f64 = 100_000_000.0;
const WAN: f64 = 10_000.0;

/// Clamp `value` into `[lo, hi]`.
pub fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    value.max(lo).min(hi)
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Parse an amount string, honouring `亿`/`万` suffixes and thousands separators.
///
/// Placeholders (`""`, `-`, `--`), unparsable text and non-finite results map to 0.
pub fn normalize_amount(raw: &str) -> f64 {
    let text = raw.trim().replace(',', "");
    if text.is_empty() || text == "-" || text == "--" {
        return 0.0;
    }

    let (digits, unit) = if let Some(stripped) = text.strip_suffix('亿') {
        (stripped, YI)
    } else if let Some(stripped) = text.strip_suffix('万') {
        (stripped, WAN)
    } else {
        (text.as_str(), 1.0)
    };

    match digits.trim().parse::<f64>() {
        Ok(v) if (v * unit).is_finite() => v * unit,
        _ => 0.0,
    }
}

/// Extract the first integer in a board-height label such as `3连板` or `5天4板`.
pub fn parse_board_height(raw: &str) -> u32 {
    let digits: String = raw
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

/// True when the last close is strictly above the close `lookback` bars earlier.
pub fn trend_up(closes: &[f64], lookback: usize) -> bool {
    if lookback == 0 || closes.len() < lookback + 1 {
        return false;
    }
    let last = closes[closes.len() - 1];
    last > closes[closes.len() - 1 - lookback]
}

/// Ratio of current volume to a baseline, 0 when the baseline is not positive.
pub fn volume_ratio(current: f64, baseline: f64) -> f64 {
    if baseline <= 0.0 {
        return 0.0;
    }
    current / baseline
}

/// Number of trailing strictly positive values.
pub fn count_consecutive_inflow(values: &[f64]) -> u32 {
    values.iter().rev().take_while(|v| **v > 0.0).count() as u32
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Number(f64),
    Text(String),
    Other(IgnoredAny),
}

impl RawAmount {
    fn into_f64(self, text: impl Fn(&str) -> f64) -> f64 {
        match self {
            Self::Number(v) if v.is_finite() => v,
            Self::Text(raw) => text(&raw),
            _ => 0.0,
        }
    }
}

/// Serde helper for fields that may hold a number or a unit string.
///
/// Anything else (`null`, booleans, objects) reads as 0.
pub fn de_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawAmount>::deserialize(deserializer)?;
    Ok(raw.map_or(0.0, |r| r.into_f64(normalize_amount)))
}

/// Serde helper for plain numbers that may arrive as strings (`"8.1"`, `"8.1%"`).
///
/// Unparsable values read as 0.
pub fn de_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawAmount>::deserialize(deserializer)?;
    Ok(raw.map_or(0.0, |r| {
        r.into_f64(|text| normalize_amount(text.trim().trim_end_matches('%')))
    }))
}

/// Serde helper for counts written as integers, floats or strings.
///
/// Fractions truncate; negative and unparsable values read as 0.
pub fn de_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = de_number(deserializer)?;
    Ok(value.max(0.0).min(f64::from(u32::MAX)) as u32)
}
