//! Value-level normalization used by schema profiles.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static NON_SLUG_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("slug character class"));
static SLUG_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-\s]+").expect("slug separator class"));

pub const SLUG_MAX_CHARS: usize = 100;

/// "Remote Pharmacist (PRN)!" -> "remote-pharmacist-prn". Edge whitespace
/// and hyphens both collapse to a single edge hyphen.
pub fn slugify(text: &str, max_chars: usize) -> String {
    let lowered = text.to_lowercase();
    let stripped = NON_SLUG_CHARS.replace_all(&lowered, "");
    let hyphenated = SLUG_SEPARATORS.replace_all(&stripped, "-");
    hyphenated.chars().take(max_chars).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SalaryPeriod {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl SalaryPeriod {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "hourly" | "hour" | "per hour" => Some(SalaryPeriod::Hourly),
            "daily" | "day" | "per day" => Some(SalaryPeriod::Daily),
            "weekly" | "week" | "per week" => Some(SalaryPeriod::Weekly),
            "monthly" | "month" | "per month" => Some(SalaryPeriod::Monthly),
            "yearly" | "annual" | "annually" | "year" | "per year" => Some(SalaryPeriod::Yearly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SalaryPeriod::Hourly => "hourly",
            SalaryPeriod::Daily => "daily",
            SalaryPeriod::Weekly => "weekly",
            SalaryPeriod::Monthly => "monthly",
            SalaryPeriod::Yearly => "yearly",
        }
    }
}

pub const JOB_TYPES: [(&str, &[&str]); 6] = [
    ("full-time", &["full-time", "fulltime", "full time", "full_time", "ft"]),
    ("part-time", &["part-time", "parttime", "part time", "part_time", "pt"]),
    ("contract", &["contract", "contractor", "contract-to-hire", "c2h"]),
    ("temporary", &["temporary", "temp", "seasonal"]),
    ("internship", &["internship", "intern"]),
    ("per-diem", &["per-diem", "perdiem", "per diem", "prn"]),
];

/// Maps a job type onto the fixed vocabulary. Lists like "fulltime, parttime"
/// resolve to their first recognized entry.
pub fn normalize_job_type(raw: &str) -> Option<&'static str> {
    raw.split(',').find_map(|part| {
        let part = part.trim().to_lowercase();
        JOB_TYPES
            .iter()
            .find(|(_, synonyms)| synonyms.contains(&part.as_str()))
            .map(|(canonical, _)| *canonical)
    })
}

/// Integer view of a scraped amount: floats truncate, numeric strings parse,
/// everything else is `None`.
pub fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

pub fn int_or_null(value: &Value) -> Value {
    coerce_int(value).map(Value::from).unwrap_or(Value::Null)
}

/// `value * factor` as an integer. Fractional amounts are scaled before truncation.
pub fn scaled_int(value: &Value, factor: i64) -> Option<i64> {
    let as_float = match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return i.checked_mul(factor);
            }
            n.as_f64()
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return i.checked_mul(factor);
            }
            s.parse::<f64>().ok()
        }
        _ => None,
    }?;

    let scaled = as_float * factor as f64;
    (scaled.is_finite() && scaled.abs() < i64::MAX as f64).then(|| scaled.trunc() as i64)
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !matches!(s.trim().to_lowercase().as_str(), "" | "false" | "0" | "no"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Null, empty or whitespace-only strings.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Lowercased, trimmed text of a string value; other JSON types use their JSON text.
pub fn lowered_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_lowercase(),
        other => other.to_string().to_lowercase(),
    }
}
