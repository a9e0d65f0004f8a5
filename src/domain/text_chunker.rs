//! 文本分块器
//!
//! 把章节文本切成不超过服务端字符上限的分块。
//!
//! 切分优先级：句子 -> 段落 -> 单词（优先在上限附近的逗号后断开）。
//! 长度按字符数（而非字节数）计算。

use regex::Regex;

use super::book::{BookError, Chapter, TextChunk};

/// 逗号回看的最大字符数
const COMMA_LOOKBACK_CHARS: usize = 100;

/// 文本分块器
#[derive(Debug, Clone)]
pub struct TextChunker {
    max_chunk_size: usize,
    sentence_boundary: Regex,
    paragraph_break: Regex,
}

impl TextChunker {
    /// 创建分块器，`max_chunk_size` 必须大于 0
    pub fn new(max_chunk_size: usize) -> Result<Self, BookError> {
        if max_chunk_size == 0 {
            return Err(BookError::InvalidChunkSize(max_chunk_size));
        }

        Ok(Self {
            max_chunk_size,
            sentence_boundary: Regex::new(r#"[.!?]+["'\u{201D}\u{2019})\]]*\s+"#)
                .map_err(|_| BookError::InvalidChunkSize(max_chunk_size))?,
            paragraph_break: Regex::new(r"\n[ \t\r]*\n")
                .map_err(|_| BookError::InvalidChunkSize(max_chunk_size))?,
        })
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// 把章节切成带序号的分块
    pub fn split_chapter(&self, chapter_index: usize, chapter: &Chapter) -> Vec<TextChunk> {
        self.chunk(chapter.text())
            .into_iter()
            .enumerate()
            .map(|(sequence, text)| TextChunk::new(chapter_index, sequence, text))
            .collect()
    }

    /// 对文本分块
    ///
    /// 每个分块字符数 <= max_chunk_size；分块按顺序拼接可还原原文的词序列
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let mut units = Vec::new();

        for sentence in self.split_sentences(text) {
            let normalized = normalize_whitespace(sentence);
            if normalized.is_empty() {
                continue;
            }
            if char_len(&normalized) <= self.max_chunk_size {
                units.push(normalized);
            } else {
                units.extend(self.split_oversized(sentence));
            }
        }

        self.pack(units)
    }

    /// 按句末标点 + 空白切句，保留标点
    fn split_sentences<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut sentences = Vec::new();
        let mut last_end = 0;

        for m in self.sentence_boundary.find_iter(text) {
            sentences.push(&text[last_end..m.end()]);
            last_end = m.end();
        }
        if last_end < text.len() {
            sentences.push(&text[last_end..]);
        }

        sentences
    }

    /// 超长句子：先按段落切，仍超长的段落再按单词切
    fn split_oversized(&self, sentence: &str) -> Vec<String> {
        let mut pieces = Vec::new();

        for paragraph in self.paragraph_break.split(sentence) {
            let normalized = normalize_whitespace(paragraph);
            if normalized.is_empty() {
                continue;
            }
            if char_len(&normalized) <= self.max_chunk_size {
                pieces.push(normalized);
            } else {
                pieces.extend(self.split_words(&normalized));
            }
        }

        pieces
    }

    /// 按单词边界切分（输入已规范化为单空格）
    fn split_words(&self, text: &str) -> Vec<String> {
        let mut pieces = Vec::new();
        let mut rest = text;

        while char_len(rest) > self.max_chunk_size {
            let cut = self.find_break(rest);
            let piece = rest[..cut].trim();
            if !piece.is_empty() {
                pieces.push(piece.to_string());
            }
            rest = rest[cut..].trim_start();
        }

        if !rest.is_empty() {
            pieces.push(rest.to_string());
        }

        pieces
    }

    /// 在前 max_chunk_size 个字符内寻找断点，返回字节下标（> 0）
    ///
    /// 优先级：上限附近的逗号后 -> 窗口恰好结束在词尾 -> 最后一个空格 -> 硬切
    fn find_break(&self, rest: &str) -> usize {
        let max = self.max_chunk_size;
        let limit = byte_offset(rest, max);
        let window = &rest[..limit];

        let lookback = COMMA_LOOKBACK_CHARS.min(max / 2);
        let lookback_start = byte_offset(rest, max - lookback);
        for (idx, _) in window[lookback_start..].rmatch_indices(',') {
            let after = lookback_start + idx + 1;
            if rest[after..].starts_with(' ') {
                return after;
            }
        }

        if rest[limit..].starts_with(' ') {
            return limit;
        }

        if let Some(pos) = window.rfind(' ') {
            if pos > 0 {
                return pos;
            }
        }

        tracing::warn!(
            max_chunk_size = max,
            word_preview = %window,
            "Chunk overflow: no word boundary within limit, splitting mid-word"
        );
        limit
    }

    /// 贪心合并：当前分块 + 空格 + 下一单元不超过上限时合并
    fn pack(&self, units: Vec<String>) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        for unit in units {
            let unit_len = char_len(&unit);

            if current.is_empty() {
                current = unit;
                current_len = unit_len;
            } else if current_len + 1 + unit_len <= self.max_chunk_size {
                current.push(' ');
                current.push_str(&unit);
                current_len += 1 + unit_len;
            } else {
                chunks.push(std::mem::take(&mut current));
                current = unit;
                current_len = unit_len;
            }
        }

        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
    }
}

#[inline]
fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// 第 n 个字符的字节下标（n 超出时返回字符串长度）
#[inline]
fn byte_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(max: usize) -> TextChunker {
        TextChunker::new(max).unwrap()
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(
            TextChunker::new(0),
            Err(BookError::InvalidChunkSize(0))
        ));
    }

    #[test]
    fn test_sentence_boundaries_respected() {
        let chunks = chunker(20).chunk("Hi there. This is long.");
        assert_eq!(chunks, vec!["Hi there.", "This is long."]);
    }

    #[test]
    fn test_sentences_packed_greedily() {
        let chunks = chunker(40).chunk("One. Two. Three. Four is here. Five!");
        assert_eq!(chunks, vec!["One. Two. Three. Four is here. Five!"]);

        let chunks = chunker(16).chunk("One. Two. Three. Four is here. Five!");
        assert_eq!(chunks, vec!["One. Two. Three.", "Four is here.", "Five!"]);
    }

    #[test]
    fn test_empty_text() {
        assert!(chunker(10).chunk("").is_empty());
        assert!(chunker(10).chunk("   \n\n  ").is_empty());
    }

    #[test]
    fn test_paragraph_split_for_oversized_sentence() {
        let text = "First paragraph without stop\n\nSecond paragraph also none";
        let chunks = chunker(30).chunk(text);
        assert_eq!(
            chunks,
            vec!["First paragraph without stop", "Second paragraph also none"]
        );
    }

    #[test]
    fn test_word_split_prefers_comma_near_limit() {
        let text = "aaaa bbbb cccc dddd eeee ffff, gggg hhhh iiii jjjj kkkk llll mmmm";
        let chunks = chunker(50).chunk(text);
        assert_eq!(
            chunks,
            vec!["aaaa bbbb cccc dddd eeee ffff,", "gggg hhhh iiii jjjj kkkk llll mmmm"]
        );
    }

    #[test]
    fn test_word_split_on_spaces() {
        let chunks = chunker(10).chunk("hello world again");
        assert_eq!(chunks, vec!["hello", "world", "again"]);
    }

    #[test]
    fn test_single_long_word_is_hard_split() {
        let chunks = chunker(5).chunk("abcdefghij");
        assert_eq!(chunks, vec!["abcde", "fghij"]);
    }

    #[test]
    fn test_multibyte_counted_by_chars() {
        let text = "这是第一句话。 这是第二句话。";
        let chunks = chunker(7).chunk(text);
        assert_eq!(chunks, vec!["这是第一句话。", "这是第二句话。"]);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 7);
        }
    }

    #[test]
    fn test_whitespace_normalized() {
        let chunks = chunker(100).chunk("Line one\ncontinues   here. Next\tsentence.");
        assert_eq!(chunks, vec!["Line one continues here. Next sentence."]);
    }

    #[test]
    fn test_split_chapter_assigns_sequence() {
        let chapter = Chapter::new("Chapter 1", "Hi there. This is long.");
        let chunks = chunker(20).split_chapter(3, &chapter);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chapter_index, 3);
        assert_eq!(chunks[0].sequence, 0);
        assert_eq!(chunks[1].sequence, 1);
        assert_eq!(chunks[1].text, "This is long.");
    }
}
