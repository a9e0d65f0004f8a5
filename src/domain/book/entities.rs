//! Book Context - Entities

use serde::{Deserialize, Serialize};

/// 章节 - 由标题检测产生的连续文本区间
///
/// 创建后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    title: String,
    text: String,
}

impl Chapter {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// 文本分块 - 一次语音合成调用的最小单位
///
/// 不变量:
/// - sequence 在章节内唯一且有序，拼接音频时按 sequence 升序
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub chapter_index: usize,
    pub sequence: usize,
    pub text: String,
}

impl TextChunk {
    pub fn new(chapter_index: usize, sequence: usize, text: impl Into<String>) -> Self {
        Self {
            chapter_index,
            sequence,
            text: text.into(),
        }
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// 时长来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationSource {
    /// 服务端返回
    Reported,
    /// 按固定码率由字节数估算
    Estimated,
}

/// 音频产物（分块级或章节级）
#[derive(Debug, Clone, PartialEq)]
pub struct AudioArtifact {
    pub bytes: Vec<u8>,
    pub duration_seconds: f64,
    pub size_bytes: u64,
    pub duration_source: DurationSource,
}

impl AudioArtifact {
    /// 使用服务端返回的时长创建
    pub fn reported(bytes: Vec<u8>, duration_seconds: f64) -> Self {
        let size_bytes = bytes.len() as u64;
        Self {
            bytes,
            duration_seconds,
            size_bytes,
            duration_source: DurationSource::Reported,
        }
    }

    /// 按每秒字节数估算时长
    pub fn estimated(bytes: Vec<u8>, bytes_per_second: u64) -> Self {
        let size_bytes = bytes.len() as u64;
        Self {
            bytes,
            duration_seconds: estimate_duration_seconds(size_bytes, bytes_per_second),
            size_bytes,
            duration_source: DurationSource::Estimated,
        }
    }

    /// 按顺序拼接多个分块音频
    ///
    /// 只有所有分块的时长都来自服务端时，结果才标记为 Reported
    pub fn concat(parts: Vec<AudioArtifact>) -> Self {
        let total_len = parts.iter().map(|p| p.bytes.len()).sum();
        let mut bytes = Vec::with_capacity(total_len);
        let mut duration_seconds = 0.0;
        let mut duration_source = DurationSource::Reported;

        for part in parts {
            duration_seconds += part.duration_seconds;
            if part.duration_source == DurationSource::Estimated {
                duration_source = DurationSource::Estimated;
            }
            bytes.extend_from_slice(&part.bytes);
        }

        Self {
            size_bytes: bytes.len() as u64,
            bytes,
            duration_seconds,
            duration_source,
        }
    }

    /// 内容哈希（md5 hex），用作产物存储的文件名
    pub fn content_hash(&self) -> String {
        format!("{:x}", md5::compute(&self.bytes))
    }
}

/// 由字节数估算时长（秒）
pub fn estimate_duration_seconds(size_bytes: u64, bytes_per_second: u64) -> f64 {
    if bytes_per_second == 0 {
        return 0.0;
    }
    size_bytes as f64 / bytes_per_second as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimated_duration() {
        // 128kbps MP3 = 16000 bytes/s
        let artifact = AudioArtifact::estimated(vec![0u8; 32000], 16000);
        assert_eq!(artifact.size_bytes, 32000);
        assert!((artifact.duration_seconds - 2.0).abs() < f64::EPSILON);
        assert_eq!(artifact.duration_source, DurationSource::Estimated);
    }

    #[test]
    fn test_concat_keeps_order_and_sums() {
        let parts = vec![
            AudioArtifact::reported(vec![1, 2], 1.5),
            AudioArtifact::reported(vec![3], 0.5),
            AudioArtifact::reported(vec![4, 5, 6], 2.0),
        ];
        let merged = AudioArtifact::concat(parts);

        assert_eq!(merged.bytes, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(merged.size_bytes, 6);
        assert!((merged.duration_seconds - 4.0).abs() < 1e-9);
        assert_eq!(merged.duration_source, DurationSource::Reported);
    }

    #[test]
    fn test_concat_mixed_sources_is_estimated() {
        let parts = vec![
            AudioArtifact::reported(vec![1], 1.0),
            AudioArtifact::estimated(vec![2; 16000], 16000),
        ];
        let merged = AudioArtifact::concat(parts);
        assert_eq!(merged.duration_source, DurationSource::Estimated);
        assert!((merged.duration_seconds - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_content_hash_is_stable() {
        let a = AudioArtifact::reported(b"abc".to_vec(), 1.0);
        let b = AudioArtifact::estimated(b"abc".to_vec(), 16000);
        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash(), "900150983cd24fb0d6963f7d28e17f72");
    }
}
