//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::time::Duration;

use crate::application::{CompressionBudget, DispatchTarget, PollOptions, SubmissionSettings};
use crate::domain::submission::{BatchLimits, MediaType};

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 数据保护服务配置
    #[serde(default)]
    pub protector: ProtectorConfig,

    /// 会话配置
    #[serde(default)]
    pub session: SessionConfig,

    /// 上传与压缩配置
    #[serde(default)]
    pub upload: UploadConfig,

    /// 轮询配置
    #[serde(default)]
    pub poll: PollConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

impl AppConfig {
    /// 提交流程参数
    pub fn submission_settings(&self) -> SubmissionSettings {
        SubmissionSettings {
            limits: self.upload.limits(),
            budget: self.upload.budget(),
            target: self.protector.target(),
            required_chain_id: self.session.required_chain_id,
        }
    }
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 数据保护服务实现
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtectorMode {
    /// 通过 HTTP 网关调用
    #[default]
    Http,
    /// 内存模拟，用于本地运行
    Fake,
}

/// 数据保护服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct ProtectorConfig {
    #[serde(default)]
    pub mode: ProtectorMode,

    /// 网关基础 URL
    #[serde(default = "default_protector_url")]
    pub url: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_protector_timeout")]
    pub timeout_secs: u64,

    /// 处理数据的 enclave 应用地址
    #[serde(default = "default_app_address")]
    pub app_address: String,

    /// 额外授权访问的用户（应用钱包），空字符串表示不授权
    #[serde(default = "default_authorized_user")]
    pub authorized_user: String,

    /// 传给应用的参数
    #[serde(default = "default_app_args")]
    pub args: String,

    /// 手动派发使用的命令行工具
    #[serde(default = "default_cli_program")]
    pub cli_program: String,

    /// fake 模式下结果就绪前的 NotReady 次数
    #[serde(default = "default_fake_ready_after_polls")]
    pub fake_ready_after_polls: u32,
}

fn default_protector_url() -> String {
    "http://localhost:8090".to_string()
}

fn default_protector_timeout() -> u64 {
    60
}

fn default_app_address() -> String {
    "0x77E4126768A17585170f0Fe190f052327070babE".to_string()
}

fn default_authorized_user() -> String {
    "0xbb1E86387b628441b40B2cB145AEb60B11173B0B".to_string()
}

fn default_app_args() -> String {
    "process_passport".to_string()
}

fn default_cli_program() -> String {
    "iapp".to_string()
}

fn default_fake_ready_after_polls() -> u32 {
    2
}

impl Default for ProtectorConfig {
    fn default() -> Self {
        Self {
            mode: ProtectorMode::default(),
            url: default_protector_url(),
            timeout_secs: default_protector_timeout(),
            app_address: default_app_address(),
            authorized_user: default_authorized_user(),
            args: default_app_args(),
            cli_program: default_cli_program(),
            fake_ready_after_polls: default_fake_ready_after_polls(),
        }
    }
}

impl ProtectorConfig {
    pub fn target(&self) -> DispatchTarget {
        let user = self.authorized_user.trim();
        DispatchTarget {
            app_address: self.app_address.clone(),
            authorized_user: (!user.is_empty()).then(|| user.to_string()),
            args: self.args.clone(),
            cli_program: self.cli_program.clone(),
        }
    }
}

/// 会话配置
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// 当前账户，未设置表示未连接
    #[serde(default)]
    pub account: Option<String>,

    /// 当前网络 chain id
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// 要求的网络 chain id，未设置则不检查
    #[serde(default = "default_required_chain_id")]
    pub required_chain_id: Option<u64>,

    /// 签名密钥
    #[serde(default)]
    pub secret: String,
}

fn default_chain_id() -> u64 {
    134
}

fn default_required_chain_id() -> Option<u64> {
    Some(134)
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            account: None,
            chain_id: default_chain_id(),
            required_chain_id: default_required_chain_id(),
            secret: String::new(),
        }
    }
}

/// 上传与压缩配置
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// 单次提交最多文件数
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// 单文件上限（字节），默认 10MB
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    /// 允许的类型
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<MediaType>,

    /// 超过此大小的图片需要压缩（字节）
    #[serde(default = "default_compress_ceiling")]
    pub compress_ceiling_bytes: u64,

    /// 压缩目标大小（字节）
    #[serde(default = "default_compress_target")]
    pub compress_target_bytes: u64,

    #[serde(default = "default_start_quality")]
    pub start_quality: u8,

    #[serde(default = "default_floor_quality")]
    pub floor_quality: u8,

    #[serde(default = "default_quality_step")]
    pub quality_step: u8,

    /// 压缩后最长边（像素）
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
}

fn default_max_files() -> usize {
    3
}

fn default_max_file_bytes() -> u64 {
    10 * 1024 * 1024 // 10 MB
}

fn default_allowed_types() -> Vec<MediaType> {
    MediaType::ALL.to_vec()
}

fn default_compress_ceiling() -> u64 {
    500 * 1024
}

fn default_compress_target() -> u64 {
    400 * 1024
}

fn default_start_quality() -> u8 {
    80
}

fn default_floor_quality() -> u8 {
    10
}

fn default_quality_step() -> u8 {
    10
}

fn default_max_dimension() -> u32 {
    1024
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_file_bytes: default_max_file_bytes(),
            allowed_types: default_allowed_types(),
            compress_ceiling_bytes: default_compress_ceiling(),
            compress_target_bytes: default_compress_target(),
            start_quality: default_start_quality(),
            floor_quality: default_floor_quality(),
            quality_step: default_quality_step(),
            max_dimension: default_max_dimension(),
        }
    }
}

impl UploadConfig {
    pub fn limits(&self) -> BatchLimits {
        BatchLimits {
            max_files: self.max_files,
            max_artifact_bytes: self.max_file_bytes,
            allowed_types: self.allowed_types.clone(),
        }
    }

    pub fn budget(&self) -> CompressionBudget {
        CompressionBudget {
            ceiling_bytes: self.compress_ceiling_bytes,
            target_bytes: self.compress_target_bytes,
            start_quality: self.start_quality,
            floor_quality: self.floor_quality,
            quality_step: self.quality_step,
            max_dimension: self.max_dimension,
        }
    }

    /// 请求体上限：一次满额批量上传加 multipart 开销
    pub fn body_limit_bytes(&self) -> usize {
        let files = self.max_files as u64 * self.max_file_bytes;
        (files + 1024 * 1024) as usize
    }
}

/// 轮询配置
#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    /// 两次查询的间隔（毫秒）
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,

    /// 单个任务默认等待上限（秒）
    #[serde(default = "default_poll_timeout")]
    pub timeout_secs: u64,

    /// 客户端可请求的最长等待（秒）
    #[serde(default = "default_poll_max_timeout")]
    pub max_timeout_secs: u64,

    /// 后台最大并发轮询数
    #[serde(default = "default_poll_concurrency")]
    pub max_concurrent: usize,

    /// 轮询队列容量
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// 扫描遗漏任务的间隔（秒）
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    2000
}

fn default_poll_timeout() -> u64 {
    300 // 5 分钟
}

fn default_poll_max_timeout() -> u64 {
    600
}

fn default_poll_concurrency() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    256
}

fn default_sweep_interval() -> u64 {
    30
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval(),
            timeout_secs: default_poll_timeout(),
            max_timeout_secs: default_poll_max_timeout(),
            max_concurrent: default_poll_concurrency(),
            queue_capacity: default_queue_capacity(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl PollConfig {
    pub fn options(&self) -> PollOptions {
        PollOptions {
            timeout: Duration::from_secs(self.timeout_secs),
            interval: Duration::from_millis(self.interval_ms),
        }
    }

    pub fn max_timeout(&self) -> Duration {
        Duration::from_secs(self.max_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
