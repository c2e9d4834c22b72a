//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod data_protector;
mod image_compressor;
mod signer;
mod task_store;

pub use data_protector::{
    DataProtectorPort, GrantRequest, ProcessRequest, ProtectedData, ProtectorError,
};
pub use image_compressor::{CompressError, CompressionBudget, ImageCompressorPort};
pub use signer::{SignerError, SignerPort};
pub use task_store::{StoreError, TaskStorePort};
