//! 章节检测器
//!
//! 按行扫描原始文本，用有序的标题模式列表把文本切分为带标题的章节。
//! 模式按固定优先级检查，第一个命中的模式胜出。

use regex::Regex;

use super::book::Chapter;

/// 未检测到任何标题时使用的章节标题
pub const FALLBACK_TITLE: &str = "Chapter 1";

/// 第一个标题之前的内容所归属的隐式章节标题
pub const PREAMBLE_TITLE: &str = "Introduction";

/// 标题行的最大字符数，超过则视为正文
const MAX_HEADING_CHARS: usize = 100;

/// 启发式标题的字符数范围（含）
const HEURISTIC_MIN_CHARS: usize = 4;
const HEURISTIC_MAX_CHARS: usize = 59;

const NUMBER_WORDS: &str = "one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|\
thirteen|fourteen|fifteen|sixteen|seventeen|eighteen|nineteen|twenty";

const NAMED_SECTIONS: &str = "prologue|epilogue|introduction|preface|foreword|afterword|\
appendix|interlude|acknowledgements|acknowledgments|conclusion";

/// 标题模式种类（顺序即优先级）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingKind {
    /// `chapter N[: title]`
    Chapter,
    /// `part N[: title]`
    Part,
    /// 仅罗马数字的行
    Roman,
    /// 仅整数的行
    Number,
    /// prologue / epilogue / appendix ...
    NamedSection,
    /// 短的全大写行或冒号结尾的独立行
    Heuristic,
}

struct HeadingPattern {
    kind: HeadingKind,
    regex: Option<Regex>,
}

/// 章节检测器
pub struct ChapterDetector {
    patterns: Vec<HeadingPattern>,
}

impl Default for ChapterDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ChapterDetector {
    pub fn new() -> Self {
        let numbered = |keyword: &str| {
            format!(
                r"(?i)^{}\s+(\d+|[ivxlcdm]+|{})\b(.*)$",
                keyword, NUMBER_WORDS
            )
        };

        let patterns = vec![
            HeadingPattern {
                kind: HeadingKind::Chapter,
                regex: Some(compile(&numbered("chapter"))),
            },
            HeadingPattern {
                kind: HeadingKind::Part,
                regex: Some(compile(&numbered("part"))),
            },
            HeadingPattern {
                kind: HeadingKind::Roman,
                regex: Some(compile(r"^([IVXLCDM]+)\.?$")),
            },
            HeadingPattern {
                kind: HeadingKind::Number,
                regex: Some(compile(r"^(\d{1,4})\.?$")),
            },
            HeadingPattern {
                kind: HeadingKind::NamedSection,
                regex: Some(compile(&format!(r"(?i)^({})\b(.*)$", NAMED_SECTIONS))),
            },
            HeadingPattern {
                kind: HeadingKind::Heuristic,
                regex: None,
            },
        ];

        Self { patterns }
    }

    /// 检测章节
    ///
    /// 永不失败，至少返回一个章节。没有找到任何标题时，整段文本作为 "Chapter 1"。
    pub fn detect(&self, raw_text: &str) -> Vec<Chapter> {
        let lines: Vec<&str> = raw_text.lines().collect();

        let mut chapters = Vec::new();
        let mut current_title: Option<String> = None;
        let mut buffer: Vec<&str> = Vec::new();
        let mut headings_found = 0usize;

        for (i, line) in lines.iter().enumerate() {
            let standalone = i == 0 || lines[i - 1].trim().is_empty();

            match self.match_heading(line.trim(), standalone) {
                Some((_, title)) => {
                    headings_found += 1;
                    close_chapter(&mut chapters, current_title.take(), &mut buffer);
                    current_title = Some(title);
                }
                None => buffer.push(line),
            }
        }
        close_chapter(&mut chapters, current_title.take(), &mut buffer);

        if chapters.is_empty() {
            tracing::info!(
                headings_found = headings_found,
                text_len = raw_text.len(),
                "No chapter content detected, falling back to whole text"
            );
            return vec![Chapter::new(FALLBACK_TITLE, raw_text.trim())];
        }

        if headings_found == 0 {
            // 只有隐式章节：统一使用 fallback 标题
            tracing::info!(
                text_len = raw_text.len(),
                "No chapter headings found, falling back to whole text"
            );
            return vec![Chapter::new(FALLBACK_TITLE, raw_text.trim())];
        }

        tracing::debug!(
            chapters = chapters.len(),
            headings_found = headings_found,
            "Chapters detected"
        );
        chapters
    }

    /// 判断单行是否为标题，返回命中的模式和规范化后的标题
    pub fn match_heading(&self, line: &str, standalone: bool) -> Option<(HeadingKind, String)> {
        if line.is_empty() || line.chars().count() > MAX_HEADING_CHARS {
            return None;
        }

        for pattern in &self.patterns {
            let title = match (&pattern.regex, pattern.kind) {
                (Some(regex), kind) => regex
                    .captures(line)
                    .and_then(|caps| build_title(kind, &caps)),
                (None, HeadingKind::Heuristic) => heuristic_title(line, standalone),
                (None, _) => None,
            };

            if let Some(title) = title {
                return Some((pattern.kind, title));
            }
        }

        None
    }
}

fn compile(pattern: &str) -> Regex {
    // 模式均为编译期常量
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid heading pattern {pattern}: {e}"))
}

/// 结束当前章节，空正文的章节被丢弃
fn close_chapter(chapters: &mut Vec<Chapter>, title: Option<String>, buffer: &mut Vec<&str>) {
    let body = buffer.join("\n");
    buffer.clear();

    let body = body.trim();
    if body.is_empty() {
        if let Some(title) = title {
            tracing::debug!(title = %title, "Dropping chapter with empty body");
        }
        return;
    }

    let title = title.unwrap_or_else(|| PREAMBLE_TITLE.to_string());
    chapters.push(Chapter::new(title, body));
}

/// 关键字之后只允许空、分隔符引出的副标题；否则是以该词开头的正文
fn build_title(kind: HeadingKind, caps: &regex::Captures<'_>) -> Option<String> {
    let first = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let rest = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
    let trimmed = rest.trim();

    let title = match kind {
        HeadingKind::Chapter | HeadingKind::Part => {
            if !trimmed.is_empty() && !starts_with_separator(trimmed) {
                return None;
            }
            let keyword = if kind == HeadingKind::Chapter { "Chapter" } else { "Part" };
            merge_subtitle(format!("{} {}", keyword, normalize_number(first)), rest)
        }
        HeadingKind::Roman => format!("Chapter {}", first),
        HeadingKind::Number => format!("Chapter {}", normalize_number(first)),
        HeadingKind::NamedSection => {
            let head = capitalize(first);
            if trimmed.is_empty() {
                head
            } else if starts_with_separator(trimmed) {
                merge_subtitle(head, rest)
            } else if is_section_label(trimmed) {
                format!("{} {}", head, trimmed)
            } else {
                return None;
            }
        }
        HeadingKind::Heuristic => first.to_string(),
    };

    Some(title)
}

/// `Appendix A` / `Appendix 2` / `Interlude II` 这类短编号
fn is_section_label(s: &str) -> bool {
    s.chars().count() <= 4 && s.chars().all(|c| c.is_ascii_alphanumeric())
}

fn heuristic_title(line: &str, standalone: bool) -> Option<String> {
    if !standalone {
        return None;
    }

    let char_count = line.chars().count();
    if !(HEURISTIC_MIN_CHARS..=HEURISTIC_MAX_CHARS).contains(&char_count) {
        return None;
    }

    if line.ends_with(['.', '!', '?', ',', ';', '"', '\u{201D}', '\'']) {
        return None;
    }

    let has_letters = line.chars().any(|c| c.is_alphabetic());
    let all_upper = has_letters && !line.chars().any(|c| c.is_lowercase());
    let colon_terminated = line.ends_with(':');

    if all_upper || colon_terminated {
        Some(line.trim_end_matches(':').trim().to_string())
    } else {
        None
    }
}

/// `3` / `03` -> `3`，罗马数字转大写，英文数字首字母大写
fn normalize_number(raw: &str) -> String {
    if let Ok(n) = raw.parse::<u32>() {
        return n.to_string();
    }
    if raw.chars().all(|c| "ivxlcdmIVXLCDM".contains(c)) {
        return raw.to_uppercase();
    }
    capitalize(raw)
}

fn capitalize(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn starts_with_separator(s: &str) -> bool {
    s.starts_with([':', '.', '-', '\u{2013}', '\u{2014}'])
}

/// 合并行内副标题：`Chapter 3` + ` - The Storm` -> `Chapter 3: The Storm`
fn merge_subtitle(head: String, rest: &str) -> String {
    let subtitle = rest
        .trim()
        .trim_start_matches([':', '.', '-', '\u{2013}', '\u{2014}'])
        .trim();

    if subtitle.is_empty() {
        head
    } else {
        format!("{}: {}", head, subtitle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles(chapters: &[Chapter]) -> Vec<&str> {
        chapters.iter().map(|c| c.title()).collect()
    }

    #[test]
    fn test_single_chapter_heading() {
        let detector = ChapterDetector::new();
        let chapters = detector.detect("Chapter 1\nHello world. This is a test.");

        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title(), "Chapter 1");
        assert_eq!(chapters[0].text(), "Hello world. This is a test.");
    }

    #[test]
    fn test_fallback_when_no_heading() {
        let detector = ChapterDetector::new();
        let text = "Just some prose without any headings. And another sentence.";
        let chapters = detector.detect(text);

        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title(), FALLBACK_TITLE);
        assert_eq!(chapters[0].text(), text);
    }

    #[test]
    fn test_fallback_for_empty_text() {
        let detector = ChapterDetector::new();
        let chapters = detector.detect("");
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title(), FALLBACK_TITLE);
    }

    #[test]
    fn test_multiple_chapters_with_subtitles() {
        let detector = ChapterDetector::new();
        let text = "chapter 1: The Beginning\nIt was dark.\n\nCHAPTER 2 - The Storm\nRain fell.\n\nChapter Three\nThe end came.";
        let chapters = detector.detect(text);

        assert_eq!(
            titles(&chapters),
            vec!["Chapter 1: The Beginning", "Chapter 2: The Storm", "Chapter Three"]
        );
        assert_eq!(chapters[1].text(), "Rain fell.");
    }

    #[test]
    fn test_leading_content_becomes_introduction() {
        let detector = ChapterDetector::new();
        let text = "A note before the story.\n\nChapter 1\nOnce upon a time.";
        let chapters = detector.detect(text);

        assert_eq!(titles(&chapters), vec![PREAMBLE_TITLE, "Chapter 1"]);
        assert_eq!(chapters[0].text(), "A note before the story.");
    }

    #[test]
    fn test_empty_chapter_body_dropped() {
        let detector = ChapterDetector::new();
        let text = "Chapter 1\n\nChapter 2\nOnly this one has text.";
        let chapters = detector.detect(text);

        assert_eq!(titles(&chapters), vec!["Chapter 2"]);
    }

    #[test]
    fn test_part_roman_number_and_named_sections() {
        let detector = ChapterDetector::new();
        let text = "Prologue\nBefore.\n\nPart II\nSecond part.\n\nIV\nRoman.\n\n12.\nNumbered.\n\nAppendix A\nExtra.";
        let chapters = detector.detect(text);

        assert_eq!(
            titles(&chapters),
            vec!["Prologue", "Part II", "Chapter IV", "Chapter 12", "Appendix A"]
        );
    }

    #[test]
    fn test_first_pattern_wins() {
        let detector = ChapterDetector::new();
        // 全大写同时满足 Part 模式和启发式，Part 优先
        let (kind, title) = detector.match_heading("PART 2", true).unwrap();
        assert_eq!(kind, HeadingKind::Part);
        assert_eq!(title, "Part 2");
    }

    #[test]
    fn test_heuristic_headings() {
        let detector = ChapterDetector::new();

        let (kind, title) = detector.match_heading("THE LONG WINTER", true).unwrap();
        assert_eq!(kind, HeadingKind::Heuristic);
        assert_eq!(title, "THE LONG WINTER");

        let (_, title) = detector.match_heading("Notes on the journey:", true).unwrap();
        assert_eq!(title, "Notes on the journey");

        // 非独立行不算
        assert!(detector.match_heading("THE LONG WINTER", false).is_none());
        // 过短
        assert!(detector.match_heading("OK", true).is_none());
        // 句末标点
        assert!(detector.match_heading("STOP RIGHT THERE!", true).is_none());
        // 普通句子
        assert!(detector.match_heading("She walked home", true).is_none());
    }

    #[test]
    fn test_long_line_is_not_heading() {
        let detector = ChapterDetector::new();
        let line = format!("Chapter 5 {}", "was long ".repeat(20));
        assert!(detector.match_heading(&line, true).is_none());
    }

    #[test]
    fn test_prose_starting_with_keyword_stays_in_body() {
        let detector = ChapterDetector::new();
        let text = "Chapter 1\nThe town was quiet.\nPart did not survive the flood, but most of it did.\nThe end came slowly.";
        let chapters = detector.detect(text);

        assert_eq!(titles(&chapters), vec!["Chapter 1"]);
        assert_eq!(
            chapters[0].text(),
            "The town was quiet.\nPart did not survive the flood, but most of it did.\nThe end came slowly."
        );

        assert!(detector.match_heading("Chapter 1 was the best one", true).is_none());
        assert!(detector.match_heading("Part mild and part wild", true).is_none());
        assert!(detector.match_heading("Introduction of the guests took an hour", true).is_none());
        // 分隔符引出的副标题仍然是标题
        let (_, title) = detector.match_heading("Part I - Arrival", true).unwrap();
        assert_eq!(title, "Part I: Arrival");
    }

    #[test]
    fn test_leading_zero_number_normalized() {
        let detector = ChapterDetector::new();
        let (_, title) = detector.match_heading("Chapter 07", true).unwrap();
        assert_eq!(title, "Chapter 7");
    }
}
