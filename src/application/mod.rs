//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（DataProtector、Signer、ImageCompressor、TaskStore）
//! - commands: CQRS 命令及处理器
//! - queries: CQRS 查询及处理器
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod ports;
pub mod queries;

// Re-exports
pub use commands::{
    handlers::{RetryDispatchHandler, SubmitBatchHandler},
    DispatchTarget, RetryDispatchCommand, SubmissionSettings, SubmitBatchCommand,
};

pub use error::ApplicationError;

pub use ports::{
    // Data protector
    DataProtectorPort,
    GrantRequest,
    ProcessRequest,
    ProtectedData,
    ProtectorError,
    // Image compressor
    CompressError,
    CompressionBudget,
    ImageCompressorPort,
    // Signer
    SignerError,
    SignerPort,
    // Task store
    StoreError,
    TaskStorePort,
};

pub use queries::{
    handlers::{
        GetSessionHandler, GetTaskHandler, PollOptions, PollResultHandler, SessionInfo,
        TaskPoller, TaskView,
    },
    GetSessionQuery, GetTaskQuery, PollResultQuery,
};
