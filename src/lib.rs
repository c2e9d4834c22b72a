//! Tee-KYC - 基于可信执行环境的护照 KYC 服务
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Submission Context: 护照图片批量提交与校验
//! - Task Context: 远端处理任务生命周期与结果归一化
//!
//! 应用层 (application/):
//! - Ports: 端口定义（DataProtector, Signer, ImageCompressor, TaskStore）
//! - Commands: CQRS 命令处理器（提交、重新派发）
//! - Queries: CQRS 查询处理器（任务状态、结果轮询、会话）
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: RESTful API
//! - Memory: TaskStore 内存实现
//! - Worker: PollWorker 后台轮询
//! - Adapters: Protector Client, Session Signer, JPEG Compressor

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
