pub mod dedup;
pub mod dispatch;
pub mod etl;
pub mod field_mapper;
pub mod normalize;
pub mod pipeline;
pub mod schema;
pub mod transformer;

pub use crate::domain::model::{Record, TransformResult};
pub use crate::domain::ports::{Pipeline, Storage, Uploader};
pub use crate::utils::error::Result;
