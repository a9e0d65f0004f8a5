//! TextChunker 属性测试
//!
//! - 上限: 任何分块都不超过 max_chunk_size 个字符
//! - 无损: 分块按顺序拼接后单词序列与输入一致
//! - 非空: 每个分块都有文本

use proptest::prelude::*;
use lector::domain::TextChunker;

// =============================================================================
// 生成器
// =============================================================================

/// 类正文文本：单词可带标点，以空格、双空格、换行或空行分隔
fn prose() -> impl Strategy<Value = String> {
    let word = prop::string::string_regex("[A-Za-z]{1,12}[.,!?]?").unwrap();
    let separator = prop::sample::select(vec![" ", " ", " ", "  ", "\n", "\n\n"]);
    prop::collection::vec((word, separator), 1..120).prop_map(|parts| {
        parts
            .into_iter()
            .map(|(word, sep)| format!("{}{}", word, sep))
            .collect::<String>()
    })
}

fn words(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

fn non_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

// =============================================================================
// 属性
// =============================================================================

proptest! {
    #[test]
    fn chunks_respect_bound(text in prose(), max in 1usize..200) {
        let chunker = TextChunker::new(max).unwrap();
        for chunk in chunker.chunk(&text) {
            prop_assert!(chunk.chars().count() <= max, "{:?} exceeds {}", chunk, max);
            prop_assert!(!chunk.trim().is_empty());
        }
    }

    #[test]
    fn chunks_preserve_characters(text in prose(), max in 1usize..200) {
        let chunker = TextChunker::new(max).unwrap();
        let chunks = chunker.chunk(&text);
        prop_assert_eq!(non_whitespace(&chunks.concat()), non_whitespace(&text));
    }

    #[test]
    fn chunks_preserve_word_sequence(text in prose(), max in 13usize..300) {
        // 所有单词都不超过上限时不会发生硬切
        let chunker = TextChunker::new(max).unwrap();
        let chunks = chunker.chunk(&text);
        let rejoined = chunks.join(" ");
        prop_assert_eq!(words(&rejoined), words(&text));
    }

    #[test]
    fn chunks_have_single_spaces(text in prose(), max in 13usize..300) {
        let chunker = TextChunker::new(max).unwrap();
        for chunk in chunker.chunk(&text) {
            prop_assert!(!chunk.contains("  "));
            prop_assert!(!chunk.contains('\n'));
            prop_assert_eq!(chunk.trim(), chunk.as_str());
        }
    }
}

#[test]
fn zero_max_is_rejected() {
    assert!(TextChunker::new(0).is_err());
}

#[test]
fn short_sentences_pack_together() {
    let chunker = TextChunker::new(20).unwrap();
    assert_eq!(
        chunker.chunk("Hi there. This is long."),
        vec!["Hi there.".to_string(), "This is long.".to_string()]
    );

    let chunker = TextChunker::new(100).unwrap();
    assert_eq!(
        chunker.chunk("Hello world. This is a test."),
        vec!["Hello world. This is a test.".to_string()]
    );
}
