//! Result Normalizer - 后端结果归一化
//!
//! 后端在不同版本中返回的结构不同，这里按已知结构逐一适配：
//! - `Normalized`: 已归一化的 ResultRecord 再次序列化（含 `fields` 对象）
//! - `StatusCard`: 带 `verification_timestamp`（RFC 3339 字符串）
//! - `FrontendResult`: 带毫秒级 `timestamp` 或 `taskId`
//! - `OcrOutput`: enclave 应用直接输出（passport_number / country / verified）
//!
//! 缺失字段策略：文本字段为 "Unknown"，verified 为 false，
//! 时间戳为归一化时刻（不是实际处理时刻）。

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use super::ResultRecord;

pub const UNKNOWN: &str = "Unknown";

/// 必有的文本字段
pub const TEXT_FIELDS: [&str; 3] = ["passport_number", "country", "wallet"];

/// 已知的结果结构
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSchema {
    Normalized,
    StatusCard,
    FrontendResult,
    OcrOutput,
}

impl ResultSchema {
    pub fn detect(raw: &Map<String, Value>) -> Self {
        if raw.get("fields").map_or(false, Value::is_object) {
            ResultSchema::Normalized
        } else if raw.contains_key("verification_timestamp") {
            ResultSchema::StatusCard
        } else if raw.contains_key("taskId") || raw.get("timestamp").map_or(false, Value::is_number)
        {
            ResultSchema::FrontendResult
        } else {
            ResultSchema::OcrOutput
        }
    }

    /// 不作为提取字段保留的元数据键（Normalized 的字段来自内层 `fields`）
    fn metadata_keys(&self) -> &'static [&'static str] {
        match self {
            ResultSchema::Normalized => &[],
            ResultSchema::StatusCard => &["verification_timestamp", "verified"],
            ResultSchema::FrontendResult => &["timestamp", "taskId", "verified"],
            ResultSchema::OcrOutput => &["verified"],
        }
    }
}

/// 归一化（时间默认值取当前时刻）
pub fn normalize(task_id: &str, raw: &Value) -> ResultRecord {
    normalize_at(task_id, raw, Utc::now())
}

/// 归一化，`now` 作为缺失时间戳的默认值
pub fn normalize_at(task_id: &str, raw: &Value, now: DateTime<Utc>) -> ResultRecord {
    let empty = Map::new();
    let obj = raw.as_object().unwrap_or(&empty);
    let schema = ResultSchema::detect(obj);

    let (source, completed_at) = match schema {
        ResultSchema::Normalized => (
            obj.get("fields").and_then(Value::as_object).unwrap_or(&empty),
            obj.get("completed_at").and_then(parse_rfc3339),
        ),
        ResultSchema::StatusCard => (obj, obj.get("verification_timestamp").and_then(parse_rfc3339)),
        ResultSchema::FrontendResult => (obj, obj.get("timestamp").and_then(parse_millis)),
        ResultSchema::OcrOutput => (obj, None),
    };

    let skip = schema.metadata_keys();

    let mut fields: BTreeMap<String, String> = source
        .iter()
        .filter(|(key, _)| !skip.contains(&key.as_str()))
        .filter_map(|(key, value)| scalar_to_string(value).map(|v| (key.clone(), v)))
        .collect();

    for key in TEXT_FIELDS {
        fields
            .entry(key.to_string())
            .or_insert_with(|| UNKNOWN.to_string());
    }

    ResultRecord {
        task_id: task_id.to_string(),
        fields,
        verified: obj.get("verified").map_or(false, parse_bool),
        completed_at: completed_at.unwrap_or(now),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn parse_rfc3339(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_millis(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_i64()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}
