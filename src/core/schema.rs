use crate::core::normalize::{
    self, int_or_null, is_blank, is_truthy, lowered_text, normalize_job_type, scaled_int,
    SalaryPeriod,
};
use crate::domain::model::{Record, TransformWarning};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Table name that selects the normalized jobs profile.
pub const JOBS_TABLE: &str = "jobs";

const SALARY_AMOUNT_FIELDS: [&str; 4] = ["salary_min", "salary_max", "min_amount", "max_amount"];

const JOBS_REMOVED_FIELDS: [&str; 27] = [
    "site",
    "job_url_direct",
    "location",
    "salary_source",
    "currency",
    "job_level",
    "job_function",
    "listing_type",
    "emails",
    "company_industry",
    "company_url",
    "company_logo",
    "company_url_direct",
    "company_addresses",
    "company_num_employees",
    "company_revenue",
    "company_description",
    "skills",
    "experience_range",
    "company_rating",
    "company_reviews_count",
    "vacancy_count",
    "work_from_home_type",
    "company",
    "id",
    "interval",
    "scraped_at",
];

const JOBS_ALLOWED_FIELDS: [&str; 24] = [
    "id",
    "title",
    "slug",
    "description",
    "company_id",
    "company_name",
    "requirements",
    "benefits",
    "salary_min",
    "salary_max",
    "salary_type",
    "job_type",
    "experience_level",
    "schedule_flexibility",
    "application_url",
    "application_email",
    "status",
    "is_featured",
    "posted_by",
    "posted_at",
    "approved_at",
    "expires_at",
    "created_at",
    "updated_at",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum ProfileKind {
    Generic,
    Jobs,
}

impl ProfileKind {
    pub fn for_table(table: &str) -> Self {
        if table == JOBS_TABLE {
            ProfileKind::Jobs
        } else {
            ProfileKind::Generic
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    /// Key not present at all.
    Absent,
    /// Absent, null, or an empty string.
    Blank,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequiredField {
    pub field: String,
    pub fallback: Value,
    pub when: Missing,
}

/// One step of a profile. Steps only touch the fields they name.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// Derive `salary_type` from `interval`, converting periodic amounts to yearly.
    IntervalToSalaryType,
    /// Move `from` to `to` unless `to` is already set. `from` is dropped
    /// afterwards when `always_drop` is set, otherwise only when moved.
    Rename {
        from: String,
        to: String,
        always_drop: bool,
    },
    DeriveSlug {
        source: String,
        max_chars: usize,
        fallback: String,
    },
    Require(RequiredField),
    /// Unknown job types are dropped.
    NormalizeJobType,
    /// Unknown salary types default to yearly with a warning.
    NormalizeSalaryType,
    /// Set `target = true` when `source` is truthy; `source` is always removed.
    FlagIfTruthy { source: String, target: String },
    /// `min_amount`/`max_amount` -> integer `salary_min`/`salary_max`.
    SalaryAmounts,
    CopyIfPresent { from: String, to: String },
    RemoveFields(Vec<String>),
    Whitelist,
}

/// Periodic salary -> yearly multipliers.
#[derive(Debug, Clone, PartialEq)]
pub struct SalaryConversion {
    factors: Vec<(SalaryPeriod, i64)>,
}

impl SalaryConversion {
    pub fn factor(&self, period: SalaryPeriod) -> Option<i64> {
        self.factors
            .iter()
            .find(|(p, _)| *p == period)
            .map(|(_, factor)| *factor)
    }
}

impl Default for SalaryConversion {
    fn default() -> Self {
        Self {
            factors: vec![
                (SalaryPeriod::Monthly, 12),
                (SalaryPeriod::Weekly, 52),
                (SalaryPeriod::Daily, 260),
            ],
        }
    }
}

/// Per-record state carried between rules.
struct RuleContext<'a> {
    index: usize,
    converted: bool,
    warnings: &'a mut Vec<TransformWarning>,
}

impl RuleContext<'_> {
    fn warn(&mut self, field: &str, value: Value, message: String) {
        tracing::warn!("⚠️ Record {}: {} ({}={})", self.index, message, field, value);
        self.warnings.push(TransformWarning {
            record_index: self.index,
            field: field.to_string(),
            value,
            message,
        });
    }
}

/// Transformation rules for one destination table.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaProfile {
    pub name: String,
    pub rules: Vec<Rule>,
    pub salary_conversion: SalaryConversion,
    pub allowed_fields: Option<BTreeSet<String>>,
    /// Fixed upsert conflict column, if the table has one.
    pub conflict_key: Option<String>,
    /// Retry as a plain insert when the conflict column has no unique index.
    pub insert_fallback: bool,
}

impl SchemaProfile {
    /// No rules. `allowed_fields`, when given, becomes the whitelist.
    pub fn generic(allowed_fields: Option<Vec<String>>) -> Self {
        let allowed_fields: Option<BTreeSet<String>> =
            allowed_fields.map(|fields| fields.into_iter().collect());
        let rules = if allowed_fields.is_some() {
            vec![Rule::Whitelist]
        } else {
            Vec::new()
        };

        Self {
            name: "generic".to_string(),
            rules,
            salary_conversion: SalaryConversion::default(),
            allowed_fields,
            conflict_key: None,
            insert_fallback: false,
        }
    }

    /// Profile for the normalized `jobs` table.
    pub fn jobs_table() -> Self {
        let rename = |from: &str, to: &str, always_drop: bool| Rule::Rename {
            from: from.to_string(),
            to: to.to_string(),
            always_drop,
        };
        let require = |field: &str, fallback: &str, when: Missing| {
            Rule::Require(RequiredField {
                field: field.to_string(),
                fallback: Value::from(fallback),
                when,
            })
        };

        Self {
            name: JOBS_TABLE.to_string(),
            rules: vec![
                Rule::IntervalToSalaryType,
                rename("job_url", "application_url", true),
                Rule::DeriveSlug {
                    source: "title".to_string(),
                    max_chars: normalize::SLUG_MAX_CHARS,
                    fallback: "untitled-job".to_string(),
                },
                rename("date_posted", "posted_at", false),
                require("status", "approved", Missing::Absent),
                require("description", "No description available.", Missing::Blank),
                require("title", "Untitled Job", Missing::Blank),
                Rule::NormalizeJobType,
                Rule::NormalizeSalaryType,
                Rule::FlagIfTruthy {
                    source: "is_remote".to_string(),
                    target: "is_featured".to_string(),
                },
                Rule::SalaryAmounts,
                Rule::CopyIfPresent {
                    from: "company".to_string(),
                    to: "company_name".to_string(),
                },
                Rule::RemoveFields(JOBS_REMOVED_FIELDS.iter().map(|f| f.to_string()).collect()),
                Rule::Whitelist,
            ],
            salary_conversion: SalaryConversion::default(),
            allowed_fields: Some(JOBS_ALLOWED_FIELDS.iter().map(|f| f.to_string()).collect()),
            conflict_key: Some("application_url".to_string()),
            insert_fallback: true,
        }
    }

    pub fn from_kind(kind: ProfileKind, allowed_fields: Option<Vec<String>>) -> Self {
        match kind {
            ProfileKind::Generic => Self::generic(allowed_fields),
            ProfileKind::Jobs => Self::jobs_table(),
        }
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &RequiredField> {
        self.rules.iter().filter_map(|rule| match rule {
            Rule::Require(required) => Some(required),
            _ => None,
        })
    }

    pub fn allows(&self, field: &str) -> bool {
        self.allowed_fields
            .as_ref()
            .map(|allowed| allowed.contains(field))
            .unwrap_or(true)
    }

    /// Runs every rule on `record`. Never fails: bad values are nulled,
    /// defaulted or dropped, and reported through `warnings`.
    pub fn apply(
        &self,
        mut record: Record,
        index: usize,
        warnings: &mut Vec<TransformWarning>,
    ) -> Record {
        let mut ctx = RuleContext {
            index,
            converted: false,
            warnings,
        };

        for rule in &self.rules {
            self.apply_rule(rule, &mut record, &mut ctx);
        }

        debug_assert!(record.keys().all(|k| self.allows(k)));
        record
    }

    fn apply_rule(&self, rule: &Rule, record: &mut Record, ctx: &mut RuleContext<'_>) {
        match rule {
            Rule::IntervalToSalaryType => self.interval_to_salary_type(record, ctx),
            Rule::Rename {
                from,
                to,
                always_drop,
            } => {
                if record.contains(from) && !record.contains(to) {
                    if let Some(value) = record.remove(from) {
                        record.insert(to.clone(), value);
                    }
                } else if *always_drop {
                    record.remove(from);
                }
            }
            Rule::DeriveSlug {
                source,
                max_chars,
                fallback,
            } => {
                if !record.contains("slug") {
                    let slug = match record.get(source) {
                        Some(Value::String(text)) => normalize::slugify(text, *max_chars),
                        Some(Value::Null) | None => String::new(),
                        Some(other) => normalize::slugify(&other.to_string(), *max_chars),
                    };
                    let slug = if slug.is_empty() {
                        fallback.clone()
                    } else {
                        slug
                    };
                    record.insert("slug", Value::String(slug));
                }
            }
            Rule::Require(required) => {
                let missing = match required.when {
                    Missing::Absent => !record.contains(&required.field),
                    Missing::Blank => is_blank(record.get(&required.field)),
                };
                if missing {
                    record.insert(required.field.clone(), required.fallback.clone());
                }
            }
            Rule::NormalizeJobType => normalize_job_type_field(record, ctx),
            Rule::NormalizeSalaryType => self.normalize_salary_type(record, ctx),
            Rule::FlagIfTruthy { source, target } => {
                if let Some(value) = record.remove(source) {
                    if is_truthy(&value) {
                        record.insert(target.clone(), Value::Bool(true));
                    }
                }
            }
            Rule::SalaryAmounts => {
                for (from, to) in [("min_amount", "salary_min"), ("max_amount", "salary_max")] {
                    if let Some(value) = record.remove(from) {
                        if !record.contains(to) {
                            let coerced = int_or_null(&value);
                            if coerced.is_null() && !value.is_null() {
                                tracing::debug!(
                                    "Record {}: {}={} is not numeric, storing null",
                                    ctx.index,
                                    from,
                                    value
                                );
                            }
                            record.insert(to, coerced);
                        }
                    }
                }
            }
            Rule::CopyIfPresent { from, to } => {
                if !is_blank(record.get(from)) && is_blank(record.get(to)) {
                    if let Some(value) = record.get(from).cloned() {
                        record.insert(to.clone(), value);
                    }
                }
            }
            Rule::RemoveFields(fields) => {
                for field in fields {
                    record.remove(field);
                }
            }
            Rule::Whitelist => {
                if let Some(allowed) = &self.allowed_fields {
                    record.data.retain(|key, _| allowed.contains(key));
                }
            }
        }
    }

    fn interval_to_salary_type(&self, record: &mut Record, ctx: &mut RuleContext<'_>) {
        let Some(interval) = record.remove("interval") else {
            return;
        };
        if record.contains("salary_type") || is_blank(Some(&interval)) {
            return;
        }

        let period = match interval.as_str().and_then(SalaryPeriod::parse) {
            Some(period) => period,
            None => {
                ctx.warn(
                    "interval",
                    interval.clone(),
                    "unrecognized salary interval, assuming yearly".to_string(),
                );
                SalaryPeriod::Yearly
            }
        };

        let salary_type = match self.salary_conversion.factor(period) {
            Some(factor) => {
                self.convert_to_yearly(record, factor, ctx);
                SalaryPeriod::Yearly
            }
            None => period,
        };
        record.insert("salary_type", Value::from(salary_type.as_str()));
    }

    fn normalize_salary_type(&self, record: &mut Record, ctx: &mut RuleContext<'_>) {
        let Some(value) = record.get("salary_type").cloned() else {
            return;
        };

        let text = lowered_text(&value);
        if value.is_null() || matches!(text.as_str(), "" | "none" | "null" | "nan") {
            record.remove("salary_type");
            return;
        }

        let normalized = match SalaryPeriod::parse(&text) {
            Some(SalaryPeriod::Hourly) => SalaryPeriod::Hourly,
            Some(SalaryPeriod::Yearly) => SalaryPeriod::Yearly,
            Some(period) => {
                if let Some(factor) = self.salary_conversion.factor(period) {
                    self.convert_to_yearly(record, factor, ctx);
                }
                SalaryPeriod::Yearly
            }
            None => {
                ctx.warn(
                    "salary_type",
                    value,
                    "unrecognized salary type, defaulting to yearly".to_string(),
                );
                SalaryPeriod::Yearly
            }
        };
        record.insert("salary_type", Value::from(normalized.as_str()));
    }

    /// Scales every present amount field once per record.
    fn convert_to_yearly(&self, record: &mut Record, factor: i64, ctx: &mut RuleContext<'_>) {
        if ctx.converted {
            return;
        }
        for field in SALARY_AMOUNT_FIELDS {
            if let Some(value) = record.get(field) {
                if value.is_null() {
                    continue;
                }
                let scaled = scaled_int(value, factor)
                    .map(Value::from)
                    .unwrap_or(Value::Null);
                record.insert(field, scaled);
            }
        }
        ctx.converted = true;
    }
}

fn normalize_job_type_field(record: &mut Record, ctx: &mut RuleContext<'_>) {
    let Some(value) = record.get("job_type").cloned() else {
        return;
    };
    if is_blank(Some(&value)) {
        record.remove("job_type");
        return;
    }

    match value.as_str().and_then(normalize_job_type) {
        Some(canonical) => {
            record.insert("job_type", Value::from(canonical));
        }
        None => {
            record.remove("job_type");
            ctx.warn(
                "job_type",
                value,
                "unrecognized job type, dropping field".to_string(),
            );
        }
    }
}
