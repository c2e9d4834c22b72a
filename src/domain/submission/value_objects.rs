//! Submission Context - Value Objects

use serde::{Deserialize, Serialize};

use super::ArtifactError;

/// 允许上传的图片类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(rename = "image/jpeg")]
    Jpeg,
    /// 部分浏览器上报的非标准写法
    #[serde(rename = "image/jpg")]
    Jpg,
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/webp")]
    Webp,
}

impl MediaType {
    pub const ALL: [MediaType; 4] = [
        MediaType::Jpeg,
        MediaType::Jpg,
        MediaType::Png,
        MediaType::Webp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Jpg => "image/jpg",
            MediaType::Png => "image/png",
            MediaType::Webp => "image/webp",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ArtifactError> {
        match s.trim().to_lowercase().as_str() {
            "image/jpeg" => Ok(MediaType::Jpeg),
            "image/jpg" => Ok(MediaType::Jpg),
            "image/png" => Ok(MediaType::Png),
            "image/webp" => Ok(MediaType::Webp),
            other => Err(ArtifactError::UnsupportedType(other.to_string())),
        }
    }

    /// 按扩展名推断，用于客户端未声明类型的上传
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = name.rsplit_once('.')?.1.to_lowercase();
        match ext.as_str() {
            "jpeg" => Some(MediaType::Jpeg),
            "jpg" => Some(MediaType::Jpg),
            "png" => Some(MediaType::Png),
            "webp" => Some(MediaType::Webp),
            _ => None,
        }
    }

    pub fn is_jpeg(&self) -> bool {
        matches!(self, MediaType::Jpeg | MediaType::Jpg)
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 单个输入文件
///
/// 不变量:
/// - 内容非空
/// - size 始终等于内容长度
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputArtifact {
    name: String,
    media_type: MediaType,
    content: Vec<u8>,
}

impl InputArtifact {
    pub fn new(
        name: impl Into<String>,
        media_type: MediaType,
        content: Vec<u8>,
    ) -> Result<Self, ArtifactError> {
        let name = name.into();
        if content.is_empty() {
            return Err(ArtifactError::Empty(name));
        }
        Ok(Self {
            name,
            media_type,
            content,
        })
    }

    /// 以新的编码内容替换（压缩后使用），保留文件名
    pub fn reencoded(&self, media_type: MediaType, content: Vec<u8>) -> Result<Self, ArtifactError> {
        Self::new(self.name.clone(), media_type, content)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// 批次校验参数
#[derive(Debug, Clone)]
pub struct BatchLimits {
    /// 单批次最多文件数
    pub max_files: usize,
    /// 单文件硬上限（字节）
    pub max_artifact_bytes: u64,
    /// 允许的类型
    pub allowed_types: Vec<MediaType>,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_files: 3,
            max_artifact_bytes: 10 * 1024 * 1024,
            allowed_types: MediaType::ALL.to_vec(),
        }
    }
}

impl BatchLimits {
    pub fn check(&self, artifact: &InputArtifact) -> Result<(), ArtifactError> {
        if !self.allowed_types.contains(&artifact.media_type()) {
            return Err(ArtifactError::UnsupportedType(
                artifact.media_type().to_string(),
            ));
        }
        if artifact.size() > self.max_artifact_bytes {
            return Err(ArtifactError::TooLarge {
                name: artifact.name().to_string(),
                size: artifact.size(),
                max: self.max_artifact_bytes,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_parse() {
        assert_eq!(MediaType::parse("image/jpeg").unwrap(), MediaType::Jpeg);
        assert_eq!(MediaType::parse(" IMAGE/PNG ").unwrap(), MediaType::Png);
        assert!(MediaType::parse("application/pdf").is_err());
    }

    #[test]
    fn test_media_type_from_file_name() {
        assert_eq!(MediaType::from_file_name("scan.JPG"), Some(MediaType::Jpg));
        assert_eq!(MediaType::from_file_name("a.b.webp"), Some(MediaType::Webp));
        assert_eq!(MediaType::from_file_name("passport"), None);
        assert_eq!(MediaType::from_file_name("doc.pdf"), None);
    }

    #[test]
    fn test_empty_artifact_rejected() {
        let result = InputArtifact::new("a.jpg", MediaType::Jpeg, Vec::new());
        assert!(matches!(result, Err(ArtifactError::Empty(_))));
    }

    #[test]
    fn test_limits_reject_oversized() {
        let limits = BatchLimits {
            max_artifact_bytes: 4,
            ..Default::default()
        };
        let artifact = InputArtifact::new("a.png", MediaType::Png, vec![0; 5]).unwrap();
        assert!(matches!(
            limits.check(&artifact),
            Err(ArtifactError::TooLarge { size: 5, max: 4, .. })
        ));
    }

    #[test]
    fn test_limits_reject_disallowed_type() {
        let limits = BatchLimits {
            allowed_types: vec![MediaType::Jpeg],
            ..Default::default()
        };
        let artifact = InputArtifact::new("a.webp", MediaType::Webp, vec![1]).unwrap();
        assert!(matches!(
            limits.check(&artifact),
            Err(ArtifactError::UnsupportedType(_))
        ));
    }
}
