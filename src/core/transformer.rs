use crate::core::dedup::Deduplicator;
use crate::core::field_mapper::FieldMapper;
use crate::core::schema::SchemaProfile;
use crate::domain::model::{Record, TransformResult};
use crate::utils::error::Result;
use serde_json::Value;

/// Everything the transformer reads. Built once from configuration.
#[derive(Debug, Clone)]
pub struct TransformOptions {
    pub deduplicator: Deduplicator,
    pub mapper: FieldMapper,
    pub profile: SchemaProfile,
    /// Stamped onto records that do not carry their own `scraped_at`.
    pub scraped_at: Option<String>,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            deduplicator: Deduplicator::default(),
            mapper: FieldMapper::default(),
            profile: SchemaProfile::generic(None),
            scraped_at: None,
        }
    }
}

/// raw records -> dedupe -> field mapping -> schema profile.
///
/// Pure: the same records and options always produce the same output.
#[derive(Debug, Clone)]
pub struct RecordTransformer {
    options: TransformOptions,
}

impl RecordTransformer {
    pub fn new(options: TransformOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    /// Fails only on a field-mapping collision under `CollisionPolicy::Fail`.
    pub fn transform(&self, records: Vec<Record>) -> Result<TransformResult> {
        let (unique, duplicates_removed) = self.options.deduplicator.dedupe_indexed(records);

        let mut warnings = Vec::new();
        let mut output = Vec::with_capacity(unique.len());

        // warnings carry the record's position in the scraped input
        for (index, mut record) in unique {
            if let Some(scraped_at) = &self.options.scraped_at {
                if !record.contains("scraped_at") {
                    record.insert("scraped_at", Value::String(scraped_at.clone()));
                }
            }

            let mapped = self.options.mapper.apply(record)?;
            output.push(self.options.profile.apply(mapped, index, &mut warnings));
        }

        let conflict_key = self.conflict_key(&output);
        tracing::debug!(
            "Profile '{}' produced {} records, conflict key {:?}",
            self.options.profile.name,
            output.len(),
            conflict_key
        );

        Ok(TransformResult {
            records: output,
            duplicates_removed,
            warnings,
            conflict_key,
            insert_fallback: self.options.profile.insert_fallback,
        })
    }

    /// The profile's own key, else the first identity field (under its
    /// mapped name) that appears in the output.
    fn conflict_key(&self, records: &[Record]) -> Option<String> {
        if let Some(key) = &self.options.profile.conflict_key {
            return Some(key.clone());
        }

        self.options
            .deduplicator
            .identity_fields()
            .iter()
            .map(|field| self.options.mapper.destination_of(field))
            .find(|field| records.iter().any(|record| record.contains(field)))
            .map(str::to_string)
    }
}
