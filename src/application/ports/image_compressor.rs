//! Image Compressor Port - 图片压缩抽象
//!
//! 过大的图片在打包前重新编码为 JPEG，逐步降低质量直到满足预算

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::submission::InputArtifact;

#[derive(Debug, Error)]
pub enum CompressError {
    #[error("Decoding error: {0}")]
    DecodingError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    /// 最低质量仍超出上限
    #[error("Cannot fit {name} under {ceiling} bytes (smallest: {smallest} bytes)")]
    BudgetUnreachable {
        name: String,
        ceiling: u64,
        smallest: u64,
    },
}

/// 压缩预算
#[derive(Debug, Clone)]
pub struct CompressionBudget {
    /// 必须满足的上限（字节）
    pub ceiling_bytes: u64,
    /// 期望达到的目标（字节）
    pub target_bytes: u64,
    /// 起始 JPEG 质量 (1-100)
    pub start_quality: u8,
    /// 最低 JPEG 质量
    pub floor_quality: u8,
    /// 每次降低的质量
    pub quality_step: u8,
    /// 最长边像素
    pub max_dimension: u32,
}

impl Default for CompressionBudget {
    fn default() -> Self {
        Self {
            ceiling_bytes: 500 * 1024,
            target_bytes: 400 * 1024,
            start_quality: 80,
            floor_quality: 10,
            quality_step: 10,
            max_dimension: 1024,
        }
    }
}

impl CompressionBudget {
    /// 从起始质量到最低质量的尝试序列
    pub fn qualities(&self) -> Vec<u8> {
        let step = self.quality_step.max(1);
        let floor = self.floor_quality.max(1);
        let mut qualities = Vec::new();
        let mut q = self.start_quality.min(100);
        while q > floor {
            qualities.push(q);
            q = q.saturating_sub(step);
        }
        qualities.push(floor);
        qualities
    }
}

/// Image Compressor Port
#[async_trait]
pub trait ImageCompressorPort: Send + Sync {
    /// 压缩图片
    ///
    /// 结果不超过 `ceiling_bytes`，否则返回 `BudgetUnreachable`
    async fn compress(
        &self,
        artifact: &InputArtifact,
        budget: &CompressionBudget,
    ) -> Result<InputArtifact, CompressError>;
}
