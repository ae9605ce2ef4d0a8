use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One scraped job posting. Field order is insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    pub data: Map<String, Value>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.data.contains_key(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.data.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.data.shift_remove(field)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    /// Field value as a string slice, if it is a non-null string.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(data: Map<String, Value>) -> Self {
        Self { data }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformWarning {
    /// Position in the scraped input, before deduplication.
    pub record_index: usize,
    pub field: String,
    pub value: Value,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct TransformResult {
    pub records: Vec<Record>,
    pub duplicates_removed: usize,
    pub warnings: Vec<TransformWarning>,
    /// Column the destination should resolve upsert conflicts on.
    pub conflict_key: Option<String>,
    pub insert_fallback: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Skipped { reason: String },
    Uploaded { table: String, count: usize, inserted_without_conflict_key: bool },
    Failed { error: String },
}

impl UploadOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, UploadOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub scraped: usize,
    pub files_written: Vec<String>,
    pub duplicates_removed: usize,
    pub transformed: usize,
    pub warnings: Vec<TransformWarning>,
    pub upload: UploadOutcome,
    /// (site, count), most frequent first.
    pub jobs_by_site: Vec<(String, usize)>,
}
