use crate::domain::model::Record;
use crate::utils::error::Result;
use chrono::{DateTime, NaiveDate};
use serde_json::Value;

pub const DEFAULT_DATE_FIELDS: [&str; 3] = ["date_posted", "posted_at", "scraped_at"];

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Union of all record keys, in first-seen order.
pub fn collect_columns(records: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

/// Delimited output. Quoting follows the JSON type: numbers and booleans are
/// bare, everything else is quoted with backslash escapes.
pub fn to_csv(records: &[Record]) -> Result<Vec<u8>> {
    let columns = collect_columns(records);
    // cells arrive already quoted
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(Vec::new());

    if !columns.is_empty() {
        let header: Vec<String> = columns.iter().map(|column| quoted(column)).collect();
        writer.write_record(&header)?;
    }

    for record in records {
        let row: Vec<String> = columns
            .iter()
            .map(|column| csv_cell(record.get(column)))
            .collect();
        writer.write_record(&row)?;
    }

    writer.flush()?;
    writer.into_inner().map_err(|e| e.into_error().into())
}

fn csv_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => quoted(""),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::String(s)) => quoted(s),
        Some(other) => quoted(&other.to_string()),
    }
}

fn quoted(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Pretty JSON array with date fields rendered as ISO-8601.
pub fn to_json(records: &[Record], date_fields: &[&str]) -> Result<Vec<u8>> {
    let rendered: Vec<Record> = records
        .iter()
        .map(|record| {
            let mut record = record.clone();
            for field in date_fields {
                if let Some(value) = record.data.get_mut(*field) {
                    if let Some(iso) = iso_date(value) {
                        *value = Value::String(iso);
                    }
                }
            }
            record
        })
        .collect();

    Ok(serde_json::to_vec_pretty(&rendered)?)
}

/// Epoch milliseconds and bare `YYYY-MM-DD` dates become `YYYY-MM-DDTHH:MM:SS.mmm`.
pub fn iso_date(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => {
            let millis = n.as_i64()?;
            DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc().format(ISO_FORMAT).to_string())
        }
        Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|dt| dt.format(ISO_FORMAT).to_string()),
        _ => None,
    }
}
