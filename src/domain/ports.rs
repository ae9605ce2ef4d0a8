use crate::domain::model::{Record, TransformResult, UploadOutcome};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Location of `path` as shown to the user.
    fn display_path(&self, path: &str) -> String;
}

/// Destination table client. Returns the number of rows the server acknowledged.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upsert(&self, table: &str, records: &[Record], on_conflict: Option<&str>)
        -> Result<usize>;
    async fn insert(&self, table: &str, records: &[Record]) -> Result<usize>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<Record>>;
    /// Writes the extracted records locally; returns the written locations.
    async fn persist(&self, records: &[Record]) -> Result<Vec<String>>;
    async fn transform(&self, data: Vec<Record>) -> Result<TransformResult>;
    async fn load(&self, result: &TransformResult) -> Result<UploadOutcome>;
}
