//! ChapterAssembler - 章节音频组装
//!
//! 分块 -> 逐块合成（可有界并发）-> 按 sequence 顺序拼接

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::synthesis::{SynthesisClient, SynthesisError};
use crate::domain::book::{AudioArtifact, Chapter, TextChunk, VoiceId};
use crate::domain::TextChunker;

/// 章节级错误
#[derive(Debug, Error)]
pub enum ChapterError {
    /// 任一分块失败即整章失败
    #[error("Chapter {} ({title}) failed: {source}", .chapter_index + 1)]
    Synthesis {
        chapter_index: usize,
        title: String,
        #[source]
        source: SynthesisError,
    },

    #[error("Chapter {} ({title}) has no text", .chapter_index + 1)]
    EmptyChapter { chapter_index: usize, title: String },

    #[error("Cancelled")]
    Cancelled,
}

/// 章节组装器
pub struct ChapterAssembler {
    chunker: TextChunker,
    client: Arc<SynthesisClient>,
    /// 单章内同时合成的分块数
    fan_out: usize,
}

impl ChapterAssembler {
    pub fn new(chunker: TextChunker, client: Arc<SynthesisClient>, fan_out: usize) -> Self {
        Self {
            chunker,
            client,
            fan_out: fan_out.max(1),
        }
    }

    /// 合成整章音频
    ///
    /// 结果总是按 sequence 升序拼接，与分块完成顺序无关。
    /// 每个分块开始前检查取消；已发出的请求会跑完。
    pub async fn assemble(
        &self,
        chapter_index: usize,
        chapter: &Chapter,
        voice_id: &VoiceId,
        cancel: &CancellationToken,
    ) -> Result<AudioArtifact, ChapterError> {
        let chunks = self.chunker.split_chapter(chapter_index, chapter);
        if chunks.is_empty() {
            return Err(ChapterError::EmptyChapter {
                chapter_index,
                title: chapter.title().to_string(),
            });
        }

        tracing::info!(
            chapter_index,
            title = %chapter.title(),
            chunks = chunks.len(),
            fan_out = self.fan_out,
            "Assembling chapter"
        );

        let total = chunks.len();

        // 流中持有分块所有权，buffered 保证输出顺序与输入一致
        let mut results = stream::iter(chunks)
            .map(|chunk| async move { self.synthesize_chunk(&chunk, voice_id, cancel).await })
            .buffered(self.fan_out);

        let mut parts = Vec::with_capacity(total);
        while let Some(result) = results.next().await {
            match result {
                Ok(part) => parts.push(part),
                Err(ChunkFailure::Cancelled) => return Err(ChapterError::Cancelled),
                Err(ChunkFailure::Synthesis(source)) => {
                    return Err(ChapterError::Synthesis {
                        chapter_index,
                        title: chapter.title().to_string(),
                        source,
                    });
                }
            }
        }

        let artifact = AudioArtifact::concat(parts);
        tracing::info!(
            chapter_index,
            size_bytes = artifact.size_bytes,
            duration_seconds = artifact.duration_seconds,
            "Chapter assembled"
        );
        Ok(artifact)
    }

    async fn synthesize_chunk(
        &self,
        chunk: &TextChunk,
        voice_id: &VoiceId,
        cancel: &CancellationToken,
    ) -> Result<AudioArtifact, ChunkFailure> {
        if cancel.is_cancelled() {
            return Err(ChunkFailure::Cancelled);
        }
        self.client
            .synthesize(chunk, voice_id)
            .await
            .map_err(ChunkFailure::Synthesis)
    }
}

enum ChunkFailure {
    Cancelled,
    Synthesis(SynthesisError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::application::synthesis::{SynthesisClientConfig, SynthesisErrorKind};
    use crate::infrastructure::adapters::{FakeSpeechClient, FakeSpeechClientConfig, ScriptedFailure};
    use crate::infrastructure::memory::InMemoryAudioCache;

    fn assembler(provider: Arc<FakeSpeechClient>, max_chunk: usize, fan_out: usize) -> ChapterAssembler {
        let client = Arc::new(SynthesisClient::new(
            provider,
            Arc::new(InMemoryAudioCache::new()),
            SynthesisClientConfig::default(),
        ));
        ChapterAssembler::new(TextChunker::new(max_chunk).unwrap(), client, fan_out)
    }

    fn voice() -> VoiceId {
        VoiceId::new("voice-a").unwrap()
    }

    #[tokio::test]
    async fn test_concatenates_in_sequence_order() {
        let provider = Arc::new(FakeSpeechClient::with_defaults());
        let assembler = assembler(provider.clone(), 20, 1);
        let chapter = Chapter::new("Chapter 1", "Hi there. This is long.");

        let artifact = assembler
            .assemble(0, &chapter, &voice(), &CancellationToken::new())
            .await
            .unwrap();

        let mut expected = FakeSpeechClient::audio_for("voice-a", "Hi there.");
        expected.extend(FakeSpeechClient::audio_for("voice-a", "This is long."));
        assert_eq!(artifact.bytes, expected);
        assert_eq!(artifact.size_bytes, expected.len() as u64);
        // 60ms/字符: 9 + 13 字符
        assert!((artifact.duration_seconds - 1.32).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_preserved_under_out_of_order_completion() {
        let provider = Arc::new(FakeSpeechClient::new(FakeSpeechClientConfig {
            latency: Duration::from_millis(10),
            ..FakeSpeechClientConfig::default()
        }));
        // 第一个分块最慢，后面的先完成
        provider.delay_when_contains("Alpha", Duration::from_millis(300));
        provider.delay_when_contains("Bravo", Duration::from_millis(100));
        let assembler = assembler(provider.clone(), 12, 4);
        let chapter = Chapter::new("Chapter 1", "Alpha one. Bravo two. Charlie 3. Delta four.");

        let artifact = assembler
            .assemble(0, &chapter, &voice(), &CancellationToken::new())
            .await
            .unwrap();

        let expected: Vec<u8> = ["Alpha one.", "Bravo two.", "Charlie 3.", "Delta four."]
            .iter()
            .flat_map(|t| FakeSpeechClient::audio_for("voice-a", t))
            .collect();
        assert_eq!(artifact.bytes, expected);
        assert_eq!(provider.call_count(), 4);
    }

    #[tokio::test]
    async fn test_chunk_failure_fails_chapter() {
        let provider = Arc::new(FakeSpeechClient::with_defaults());
        provider.fail_when_contains("broken", ScriptedFailure::Status(401));
        let assembler = assembler(provider, 20, 1);
        let chapter = Chapter::new("The Storm", "Fine start. A broken one. Never reached.");

        let err = assembler
            .assemble(2, &chapter, &voice(), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            ChapterError::Synthesis {
                chapter_index,
                title,
                source,
            } => {
                assert_eq!(chapter_index, 2);
                assert_eq!(title, "The Storm");
                assert_eq!(source.kind, SynthesisErrorKind::InvalidKey);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let provider = Arc::new(FakeSpeechClient::with_defaults());
        let assembler = assembler(provider.clone(), 20, 1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = assembler
            .assemble(0, &Chapter::new("C", "Some text."), &voice(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ChapterError::Cancelled));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_assemble_runs_on_spawned_task() {
        let provider = Arc::new(FakeSpeechClient::with_defaults());
        let assembler = Arc::new(assembler(provider.clone(), 12, 3));
        let chapter = Chapter::new("Chapter 1", "Alpha one. Bravo two. Charlie 3.");

        // 与 worker 相同：整条 future 交给 tokio::spawn
        let handle = tokio::spawn({
            let assembler = assembler.clone();
            async move {
                assembler
                    .assemble(0, &chapter, &voice(), &CancellationToken::new())
                    .await
            }
        });

        let artifact = handle.await.unwrap().unwrap();
        let expected: Vec<u8> = ["Alpha one.", "Bravo two.", "Charlie 3."]
            .iter()
            .flat_map(|t| FakeSpeechClient::audio_for("voice-a", t))
            .collect();
        assert_eq!(artifact.bytes, expected);
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_chapter() {
        let provider = Arc::new(FakeSpeechClient::with_defaults());
        let assembler = assembler(provider, 20, 1);
        let err = assembler
            .assemble(0, &Chapter::new("C", "   "), &voice(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ChapterError::EmptyChapter { .. }));
    }
}
