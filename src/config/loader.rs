//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml / config.local.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, ProtectorMode};

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `TEEKYC_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `TEEKYC_SERVER__PORT=8080`
/// - `TEEKYC_PROTECTOR__URL=http://gateway:8090`
/// - `TEEKYC_PROTECTOR__MODE=fake`
/// - `TEEKYC_SESSION__ACCOUNT=0xabc...`
/// - `TEEKYC_POLL__TIMEOUT_SECS=120`
///
/// # 返回
/// - `Ok(AppConfig)` - 成功加载的配置
/// - `Err(ConfigError)` - 加载失败
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 首先设置默认值（最低优先级）
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("protector.mode", "http")?
        .set_default("protector.url", "http://localhost:8090")?
        .set_default("protector.timeout_secs", 60)?
        .set_default("session.chain_id", 134)?
        .set_default("upload.max_files", 3)?
        .set_default("upload.max_file_bytes", 10 * 1024 * 1024)?
        .set_default("upload.compress_ceiling_bytes", 500 * 1024)?
        .set_default("upload.compress_target_bytes", 400 * 1024)?
        .set_default("poll.interval_ms", 2000)?
        .set_default("poll.timeout_secs", 300)?
        .set_default("poll.max_timeout_secs", 600)?
        .set_default("poll.max_concurrent", 4)?
        .set_default("poll.sweep_interval_secs", 30)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        // 搜索默认配置文件
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 添加环境变量（最高优先级）
    // 前缀: TEEKYC_
    // 层级分隔符: __ (双下划线)
    // 例如: TEEKYC_PROTECTOR__URL=http://gateway:8090
    // 注意: 环境变量名会被转换为小写
    builder = builder.add_source(
        Environment::with_prefix("TEEKYC")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    // 4. 构建配置
    let config = builder.build()?;

    // 5. 反序列化为 AppConfig
    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    // 6. 验证配置
    validate_config(&app_config)?;

    Ok(app_config)
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::ValidationError(msg.to_string())
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    // 验证端口范围
    if config.server.port == 0 {
        return Err(invalid("Server port cannot be 0"));
    }

    // 验证网关 URL
    if config.protector.mode == ProtectorMode::Http && config.protector.url.trim().is_empty() {
        return Err(invalid("Protector URL cannot be empty"));
    }
    if config.protector.app_address.trim().is_empty() {
        return Err(invalid("Protector app address cannot be empty"));
    }

    // 验证上传与压缩参数
    let upload = &config.upload;
    if upload.max_files == 0 {
        return Err(invalid("Upload max_files cannot be 0"));
    }
    if upload.allowed_types.is_empty() {
        return Err(invalid("Upload allowed_types cannot be empty"));
    }
    if upload.compress_ceiling_bytes < upload.compress_target_bytes {
        return Err(invalid("Compression ceiling cannot be below the target"));
    }
    if upload.start_quality == 0 || upload.start_quality > 100 {
        return Err(invalid("Start quality must be within 1..=100"));
    }
    if upload.floor_quality == 0 || upload.floor_quality > upload.start_quality {
        return Err(invalid("Floor quality must be within 1..=start_quality"));
    }
    if upload.quality_step == 0 {
        return Err(invalid("Quality step cannot be 0"));
    }

    // 验证轮询参数
    if config.poll.interval_ms == 0 {
        return Err(invalid("Poll interval cannot be 0"));
    }
    if config.poll.max_concurrent == 0 {
        return Err(invalid("Poll max_concurrent cannot be 0"));
    }
    if config.poll.queue_capacity == 0 {
        return Err(invalid("Poll queue_capacity cannot be 0"));
    }
    if config.poll.timeout_secs > config.poll.max_timeout_secs {
        return Err(invalid("Poll timeout_secs cannot exceed max_timeout_secs"));
    }
    if config.poll.sweep_interval_secs == 0 {
        return Err(invalid("Poll sweep_interval_secs cannot be 0"));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}", config.server.addr());
    tracing::info!("Protector Mode: {:?}", config.protector.mode);
    if config.protector.mode == ProtectorMode::Http {
        tracing::info!("Protector URL: {}", config.protector.url);
        tracing::info!("Protector Timeout: {}s", config.protector.timeout_secs);
    }
    tracing::info!("App Address: {}", config.protector.app_address);
    tracing::info!(
        "Session Account: {}",
        config.session.account.as_deref().unwrap_or("<not connected>")
    );
    tracing::info!(
        "Chain: {} (required: {:?})",
        config.session.chain_id,
        config.session.required_chain_id
    );
    tracing::info!(
        "Upload: max {} files, {} bytes each",
        config.upload.max_files,
        config.upload.max_file_bytes
    );
    tracing::info!(
        "Compression: ceiling {} bytes, target {} bytes",
        config.upload.compress_ceiling_bytes,
        config.upload.compress_target_bytes
    );
    tracing::info!(
        "Poll: every {}ms, timeout {}s, concurrency {}",
        config.poll.interval_ms,
        config.poll.timeout_secs,
        config.poll.max_concurrent
    );
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::submission::MediaType;
    use std::io::Write;

    #[test]
    fn test_validation_passes_for_valid_config() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_zero_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_empty_protector_url() {
        let mut config = AppConfig::default();
        config.protector.url = String::new();
        assert!(validate_config(&config).is_err());

        // fake 模式不需要 URL
        config.protector.mode = ProtectorMode::Fake;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_quality_range() {
        let mut config = AppConfig::default();
        config.upload.floor_quality = 90;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_ceiling_below_target() {
        let mut config = AppConfig::default();
        config.upload.compress_ceiling_bytes = 100;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_zero_interval() {
        let mut config = AppConfig::default();
        config.poll.interval_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_timeout_above_max() {
        let mut config = AppConfig::default();
        config.poll.timeout_secs = u64::MAX;
        assert!(validate_config(&config).is_err());

        config.poll.timeout_secs = config.poll.max_timeout_secs;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_zero_max_files() {
        let mut config = AppConfig::default();
        config.upload.max_files = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9001

[protector]
mode = "fake"
authorized_user = ""

[session]
account = "0xabc"
chain_id = 134

[upload]
max_files = 2
allowed_types = ["image/png", "image/jpeg"]

[poll]
interval_ms = 500
"#
        )
        .unwrap();

        let config = load_config_from_path(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.protector.mode, ProtectorMode::Fake);
        assert!(config.protector.target().authorized_user.is_none());
        assert_eq!(config.session.account.as_deref(), Some("0xabc"));
        assert_eq!(config.upload.max_files, 2);
        assert_eq!(
            config.upload.allowed_types,
            vec![MediaType::Png, MediaType::Jpeg]
        );
        assert_eq!(config.poll.interval_ms, 500);
        assert_eq!(config.poll.timeout_secs, 300);
    }

    #[test]
    fn test_invalid_file_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[poll]\ninterval_ms = 0").unwrap();

        assert!(matches!(
            load_config_from_path(Some(file.path())),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
