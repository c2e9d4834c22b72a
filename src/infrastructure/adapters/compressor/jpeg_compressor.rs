//! JPEG Compressor - 缩放并以递减质量重新编码
//!
//! 解码与编码都是 CPU 密集操作，在 blocking 线程池中执行

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::RgbImage;

use crate::application::ports::{CompressError, CompressionBudget, ImageCompressorPort};
use crate::domain::submission::{InputArtifact, MediaType};

/// JPEG Compressor
#[derive(Debug, Clone, Default)]
pub struct JpegCompressor;

impl JpegCompressor {
    pub fn new() -> Self {
        Self
    }
}

/// 解码并缩放到最长边不超过 max_dimension
fn prepare(content: &[u8], max_dimension: u32) -> Result<RgbImage, CompressError> {
    let img = image::load_from_memory(content)
        .map_err(|e| CompressError::DecodingError(e.to_string()))?;

    let img = if img.width().max(img.height()) > max_dimension {
        img.resize(max_dimension, max_dimension, FilterType::Triangle)
    } else {
        img
    };

    Ok(img.to_rgb8())
}

fn encode(rgb: &RgbImage, quality: u8) -> Result<Vec<u8>, CompressError> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder
        .encode_image(rgb)
        .map_err(|e| CompressError::EncodingError(e.to_string()))?;
    Ok(buf)
}

/// 从起始质量逐步降低，直到小于目标；否则取最低质量的结果
fn compress_blocking(
    name: &str,
    content: &[u8],
    budget: &CompressionBudget,
) -> Result<(Vec<u8>, u8), CompressError> {
    let rgb = prepare(content, budget.max_dimension)?;

    let mut best: Option<(Vec<u8>, u8)> = None;
    for quality in budget.qualities() {
        let encoded = encode(&rgb, quality)?;
        let size = encoded.len() as u64;
        tracing::trace!(name = %name, quality, size, "Encoded candidate");

        let fits_target = size <= budget.target_bytes;
        best = Some((encoded, quality));
        if fits_target {
            break;
        }
    }

    match best {
        Some((encoded, quality)) if encoded.len() as u64 <= budget.ceiling_bytes => {
            Ok((encoded, quality))
        }
        Some((encoded, _)) => Err(CompressError::BudgetUnreachable {
            name: name.to_string(),
            ceiling: budget.ceiling_bytes,
            smallest: encoded.len() as u64,
        }),
        None => Err(CompressError::EncodingError("no quality to try".to_string())),
    }
}

#[async_trait]
impl ImageCompressorPort for JpegCompressor {
    async fn compress(
        &self,
        artifact: &InputArtifact,
        budget: &CompressionBudget,
    ) -> Result<InputArtifact, CompressError> {
        let name = artifact.name().to_string();
        let content = artifact.content().to_vec();
        let budget_owned = budget.clone();

        let (encoded, quality) = tokio::task::spawn_blocking(move || {
            compress_blocking(&name, &content, &budget_owned)
        })
        .await
        .map_err(|e| CompressError::EncodingError(format!("Compression task failed: {}", e)))??;

        tracing::debug!(
            name = %artifact.name(),
            original_size = artifact.size(),
            compressed_size = encoded.len(),
            quality,
            "Image re-encoded"
        );

        artifact
            .reencoded(MediaType::Jpeg, encoded)
            .map_err(|e| CompressError::EncodingError(e.to_string()))
    }
}
