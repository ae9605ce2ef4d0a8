use crate::adapters::writer;
use crate::domain::model::Record;
use crate::domain::ports::Uploader;
use crate::utils::error::{EtlError, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Error body returned by PostgREST.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

/// Client for a PostgREST-compatible table endpoint (`{base}/rest/v1/{table}`).
pub struct RestUploader {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestUploader {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    async fn post(
        &self,
        table: &str,
        records: &[Record],
        on_conflict: Option<&str>,
        prefer: &str,
    ) -> Result<usize> {
        // PostgREST rejects bulk bodies with differing keys unless the columns are named
        let columns = writer::collect_columns(records).join(",");
        let mut request = self
            .client
            .post(self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", prefer)
            .query(&[("columns", columns.as_str())])
            .json(records);

        if let Some(key) = on_conflict {
            request = request.query(&[("on_conflict", key)]);
        }

        tracing::debug!(
            "POST {} ({} records, on_conflict={:?})",
            self.table_url(table),
            records.len(),
            on_conflict
        );
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let parsed: Option<ErrorBody> = serde_json::from_str(&body).ok();
            let (code, message) = match parsed {
                Some(err) => {
                    let mut message = err.message.unwrap_or_else(|| body.clone());
                    for extra in [err.details, err.hint].into_iter().flatten() {
                        message.push_str(" | ");
                        message.push_str(&extra);
                    }
                    (err.code, message)
                }
                None => (None, body),
            };
            return Err(EtlError::UploadError {
                table: table.to_string(),
                status: status.as_u16(),
                code,
                message,
            });
        }

        // return=representation echoes the stored rows; anything else counts as all accepted
        match serde_json::from_str::<Vec<serde_json::Value>>(&body) {
            Ok(rows) => Ok(rows.len()),
            Err(_) => Ok(records.len()),
        }
    }
}

#[async_trait::async_trait]
impl Uploader for RestUploader {
    async fn upsert(
        &self,
        table: &str,
        records: &[Record],
        on_conflict: Option<&str>,
    ) -> Result<usize> {
        self.post(
            table,
            records,
            on_conflict,
            "resolution=merge-duplicates,return=representation",
        )
        .await
    }

    async fn insert(&self, table: &str, records: &[Record]) -> Result<usize> {
        self.post(table, records, None, "return=representation").await
    }
}
