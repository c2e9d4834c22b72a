//! Submission Context - Aggregate Root

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};

use super::{ArtifactError, BatchLimits, InputArtifact};

pub const DATASET_TYPE: &str = "passport-images";
pub const DATASET_VERSION: &str = "1.0.0";
pub const PURPOSE: &str = "kyc-verification";
pub const PROCESSING_TYPE: &str = "ocr-passport-extraction";

/// 提交批次
///
/// 不变量:
/// - 至少一个文件，最多 `max_files` 个
/// - 每个文件都通过类型和大小校验
/// - 批次只能被打包一次（`into_payload` 消费 self）
#[derive(Debug, Clone)]
pub struct SubmissionBatch {
    artifacts: Vec<InputArtifact>,
}

impl SubmissionBatch {
    pub fn new(artifacts: Vec<InputArtifact>, limits: &BatchLimits) -> Result<Self, ArtifactError> {
        if artifacts.is_empty() {
            return Err(ArtifactError::EmptyBatch);
        }
        if artifacts.len() > limits.max_files {
            return Err(ArtifactError::TooManyFiles {
                count: artifacts.len(),
                max: limits.max_files,
            });
        }
        for artifact in &artifacts {
            limits.check(artifact)?;
        }
        Ok(Self { artifacts })
    }

    pub fn artifacts(&self) -> &[InputArtifact] {
        &self.artifacts
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// 替换指定位置的文件（压缩后调用）
    pub fn replace(&mut self, index: usize, artifact: InputArtifact) {
        if let Some(slot) = self.artifacts.get_mut(index) {
            *slot = artifact;
        }
    }

    /// 打包为扁平的受保护数据
    ///
    /// 下游存储格式不支持数组或嵌套对象，所有内容都展开成字符串字段
    pub fn into_payload(self, uploaded_at: DateTime<Utc>) -> ProtectedPayload {
        let millis = uploaded_at.timestamp_millis();
        let mut fields = BTreeMap::new();

        for (i, artifact) in self.artifacts.iter().enumerate() {
            let key = format!("passport_image_{}", i + 1);
            fields.insert(format!("{}_name", key), artifact.name().to_string());
            fields.insert(format!("{}_size", key), artifact.size().to_string());
            fields.insert(format!("{}_type", key), artifact.media_type().to_string());
            fields.insert(key, STANDARD.encode(artifact.content()));
        }

        if let Some(primary) = self.artifacts.first() {
            fields.insert("primaryFileName".to_string(), primary.name().to_string());
            fields.insert("primaryFileSize".to_string(), primary.size().to_string());
            fields.insert("primaryFileType".to_string(), primary.media_type().to_string());
        }

        fields.insert("datasetType".to_string(), DATASET_TYPE.to_string());
        fields.insert("version".to_string(), DATASET_VERSION.to_string());
        fields.insert("totalFiles".to_string(), self.artifacts.len().to_string());
        fields.insert("uploadTimestamp".to_string(), millis.to_string());
        fields.insert("purpose".to_string(), PURPOSE.to_string());
        fields.insert("processingType".to_string(), PROCESSING_TYPE.to_string());

        ProtectedPayload {
            name: format!("KYC-Passport-{}", millis),
            fields,
        }
    }
}

/// 待保护的扁平数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedPayload {
    pub name: String,
    pub fields: BTreeMap<String, String>,
}

impl ProtectedPayload {
    /// 序列化后的近似大小，用于日志
    pub fn approx_size(&self) -> usize {
        self.fields.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}
