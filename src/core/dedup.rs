use crate::domain::model::Record;
use serde_json::Value;
use std::collections::HashSet;

pub const DEFAULT_IDENTITY_FIELDS: [&str; 2] = ["application_url", "job_url"];

/// Drops records whose identity value was already seen, keeping the first occurrence.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    identity_fields: Vec<String>,
}

impl Deduplicator {
    pub fn new(identity_fields: Vec<String>) -> Self {
        Self { identity_fields }
    }

    pub fn identity_fields(&self) -> &[String] {
        &self.identity_fields
    }

    /// First identity candidate present on the record with a non-null value.
    pub fn identity_of(&self, record: &Record) -> Option<String> {
        self.identity_fields.iter().find_map(|field| match record.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        })
    }

    /// Returns the surviving records and how many were removed.
    pub fn dedupe(&self, records: Vec<Record>) -> (Vec<Record>, usize) {
        let (unique, removed) = self.dedupe_indexed(records);
        (unique.into_iter().map(|(_, record)| record).collect(), removed)
    }

    /// Like `dedupe`, but each survivor keeps its position in the input.
    pub fn dedupe_indexed(&self, records: Vec<Record>) -> (Vec<(usize, Record)>, usize) {
        let original_count = records.len();
        let mut seen = HashSet::new();

        let unique: Vec<(usize, Record)> = records
            .into_iter()
            .enumerate()
            .filter(|(_, record)| match self.identity_of(record) {
                Some(identity) => seen.insert(identity),
                None => true,
            })
            .collect();

        let removed = original_count - unique.len();
        if removed > 0 {
            tracing::info!(
                "🔄 Deduplicated {} -> {} records on {:?}",
                original_count,
                unique.len(),
                self.identity_fields
            );
        }
        (unique, removed)
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_IDENTITY_FIELDS.iter().map(|f| f.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => Record::from(map),
            _ => panic!("test records must be objects"),
        }
    }

    #[test]
    fn test_distinct_urls_are_kept() {
        let records = vec![
            record(json!({"job_url": "https://a.example/1", "title": "A"})),
            record(json!({"job_url": "https://a.example/2", "title": "B"})),
            record(json!({"job_url": "https://a.example/3", "title": "C"})),
        ];

        let (unique, removed) = Deduplicator::default().dedupe(records);

        assert_eq!(unique.len(), 3);
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_keeps_first_occurrence() {
        let records = vec![
            record(json!({"job_url": "https://a.example/1", "title": "first"})),
            record(json!({"job_url": "https://a.example/2", "title": "other"})),
            record(json!({"job_url": "https://a.example/1", "title": "second"})),
        ];

        let (unique, removed) = Deduplicator::default().dedupe(records);

        assert_eq!(removed, 1);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].str_field("title"), Some("first"));
        assert_eq!(unique[1].str_field("title"), Some("other"));
    }

    #[test]
    fn test_indexed_survivors_keep_input_positions() {
        let records = vec![
            record(json!({"job_url": "https://a.example/1"})),
            record(json!({"job_url": "https://a.example/1"})),
            record(json!({"job_url": "https://a.example/2"})),
        ];

        let (unique, removed) = Deduplicator::default().dedupe_indexed(records);

        let positions: Vec<usize> = unique.iter().map(|(index, _)| *index).collect();
        assert_eq!(positions, vec![0, 2]);
        assert_eq!(removed, 1);
    }

    #[test]
    fn test_application_url_is_preferred() {
        let records = vec![
            record(json!({"application_url": "https://apply/1", "job_url": "https://a/1"})),
            record(json!({"application_url": "https://apply/1", "job_url": "https://a/2"})),
            record(json!({"job_url": "https://apply/1"})),
        ];

        let (unique, removed) = Deduplicator::default().dedupe(records);

        // the third record has no application_url, so its job_url is its identity
        assert_eq!(removed, 2);
        assert_eq!(unique.len(), 1);
    }

    #[test]
    fn test_records_without_identity_pass_through() {
        let records = vec![
            record(json!({"title": "A"})),
            record(json!({"title": "A"})),
            record(json!({"job_url": null, "title": "A"})),
        ];

        let (unique, removed) = Deduplicator::default().dedupe(records.clone());

        assert_eq!(removed, 0);
        assert_eq!(unique, records);
    }

    #[test]
    fn test_non_string_identities_compare_by_text() {
        let dedup = Deduplicator::new(vec!["id".to_string()]);
        let records = vec![
            record(json!({"id": 7})),
            record(json!({"id": 7})),
            record(json!({"id": "8"})),
        ];

        let (unique, removed) = dedup.dedupe(records);

        assert_eq!(removed, 1);
        assert_eq!(unique.len(), 2);
    }
}
