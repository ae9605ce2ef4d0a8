pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;

pub use crate::config::{cli::LocalStorage, run::RunConfig};
pub use crate::core::{
    etl::EtlEngine,
    pipeline::JobPipeline,
    schema::SchemaProfile,
    transformer::{RecordTransformer, TransformOptions},
};
pub use crate::domain::model::{Record, RunReport, TransformResult, UploadOutcome};
pub use crate::utils::error::{EtlError, Result};
