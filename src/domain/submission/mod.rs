//! Submission Context - 提交限界上下文
//!
//! 职责:
//! - 输入文件校验（类型白名单、大小上限）
//! - 提交批次聚合
//! - 扁平化打包为受保护数据

mod aggregate;
mod errors;
mod value_objects;

pub use aggregate::{
    ProtectedPayload, SubmissionBatch, DATASET_TYPE, DATASET_VERSION, PROCESSING_TYPE, PURPOSE,
};
pub use errors::ArtifactError;
pub use value_objects::{BatchLimits, InputArtifact, MediaType};
