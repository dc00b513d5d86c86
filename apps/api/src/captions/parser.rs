//! Completion parser — turns a free-form model reply into ordered caption records.
//!
//! The model's output format is not guaranteed, so parsing runs an ordered
//! chain of strategies from strict to permissive:
//!
//! 1. `NumberedBlocks`: `1.` / `**Caption 2:**` / `３．` style list markers
//! 2. `HashtagLines`: one caption per line, hashtags trailing or on the next line
//! 3. `PlainLines`: three or more bare lines, first three taken
//! 4. `Passthrough`: the whole trimmed text as a single caption
//!
//! The first strategy to return records wins. `parse_completions` never fails.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::captions::models::CaptionRecord;
use crate::captions::prompts::CAPTION_COUNT;

/// ASCII, full-width, circled and CJK numerals accepted as list markers.
const NUMERAL: &str = r"[1-9１-９①-⑨一二三四五六七八九]";
/// Circled numerals delimit themselves and need no separator.
const CIRCLED: &str = r"[①-⑨]";
/// Characters that may follow a list numeral.
const SEPARATOR: &str = r"[.:)、\-．：）]";

/// List marker at the start of a line, e.g. `1.`, `2)`, `**3.**`, `**Caption 1:**`, `### 2.`, `一、`.
static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?mi)^[ \t]*(?:#{{1,6}}[ \t]+)?(?:[*_]{{1,2}}[ \t]*)?(?:(?:caption|option)[ \t]*)?(?:{NUMERAL}[ \t]*(?:[*_]{{1,2}}[ \t]*)?{SEPARATOR}|{CIRCLED})(?:[ \t]*[*_]{{1,2}})?"
    ))
    .expect("list marker pattern is valid")
});

/// Any single leading marker a caption may still carry once its block is cut out.
static LEADING_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^(?:[-–—•*·>_:)、：）]+|#{{1,6}}\s|(?:caption|option)[ \t]*{NUMERAL}?[ \t]*[*_]{{0,2}}[ \t]*{SEPARATOR}|{NUMERAL}[ \t]*[*_]{{0,2}}[ \t]*{SEPARATOR}|{CIRCLED})"
    ))
    .expect("leading marker pattern is valid")
});

/// `Hashtags:` style label in front of a tag line.
static HASHTAG_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[*_]{0,2}[ \t]*(?:hashtags?|tags)[ \t]*[*_]{0,2}[ \t]*:[ \t]*[*_]{0,2}")
        .expect("hashtag label pattern is valid")
});

/// Markdown heading prefix, e.g. `## `.
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}[ \t]+").expect("heading pattern is valid"));

/// Run of `#tag` tokens ending the line.
static TRAILING_HASHTAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\s*#[^\s#]+)+\s*$").expect("trailing hashtag pattern is valid")
});

static HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#[^\s#]+").expect("hashtag pattern is valid"));

/// One step of the parsing cascade.
///
/// Returns `None` when the text does not have the shape the strategy expects,
/// letting the next strategy try.
pub trait ParseStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn parse(&self, text: &str) -> Option<Vec<CaptionRecord>>;
}

const STRATEGIES: &[&dyn ParseStrategy] =
    &[&NumberedBlocks, &HashtagLines, &PlainLines, &Passthrough];

/// Parses a raw model completion into at most [`CAPTION_COUNT`] records, in
/// the order they appear. Always returns at least one record.
pub fn parse_completions(raw: &str) -> Vec<CaptionRecord> {
    let text = raw.trim();
    if text.is_empty() {
        return vec![CaptionRecord::default()];
    }

    for strategy in STRATEGIES {
        if let Some(records) = strategy.parse(text).filter(|r| !r.is_empty()) {
            debug!(
                strategy = strategy.name(),
                count = records.len(),
                "Parsed model completion"
            );
            return records;
        }
    }

    vec![CaptionRecord::caption_only(text)]
}

// ────────────────────────────────────────────────────────────────────────────
// Strategies
// ────────────────────────────────────────────────────────────────────────────

/// Splits the text at enumerated-list markers; anything before the first
/// marker is preamble and is dropped.
pub struct NumberedBlocks;

impl ParseStrategy for NumberedBlocks {
    fn name(&self) -> &'static str {
        "numbered_blocks"
    }

    fn parse(&self, text: &str) -> Option<Vec<CaptionRecord>> {
        let markers: Vec<(usize, usize)> = LIST_MARKER
            .find_iter(text)
            .filter(|m| is_list_marker(text, m.as_str(), m.end()))
            .map(|m| (m.start(), m.end()))
            .collect();

        if markers.is_empty() {
            return None;
        }

        let records: Vec<CaptionRecord> = markers
            .iter()
            .enumerate()
            .filter_map(|(i, &(_, body_start))| {
                let body_end = markers.get(i + 1).map_or(text.len(), |&(start, _)| start);
                parse_block(&text[body_start..body_end])
            })
            .take(CAPTION_COUNT)
            .collect();

        (!records.is_empty()).then_some(records)
    }
}

/// One caption per line with hashtags split off. Only applies when the text
/// carries at least one `#`.
pub struct HashtagLines;

impl ParseStrategy for HashtagLines {
    fn name(&self) -> &'static str {
        "hashtag_lines"
    }

    fn parse(&self, text: &str) -> Option<Vec<CaptionRecord>> {
        if !text.contains('#') {
            return None;
        }

        let mut records: Vec<CaptionRecord> = Vec::new();
        for line in without_intro(non_empty_lines(text)) {
            let line = strip_line_prefix(line);
            let (prose, hashtags) = split_line_hashtags(line);
            let caption = clean_caption(prose);

            if caption.is_empty() {
                // A tag-only line belongs to the caption right above it.
                if let Some(last) = records.last_mut().filter(|_| !hashtags.is_empty()) {
                    if !last.hashtags.is_empty() {
                        last.hashtags.push(' ');
                    }
                    last.hashtags.push_str(&hashtags);
                }
                continue;
            }

            records.push(CaptionRecord::new(caption, hashtags));
        }

        records.truncate(CAPTION_COUNT);
        (!records.is_empty()).then_some(records)
    }
}

/// Bare newline-separated captions with no `#` anywhere. Needs at least
/// [`CAPTION_COUNT`] lines, otherwise the text is treated as one caption.
pub struct PlainLines;

impl ParseStrategy for PlainLines {
    fn name(&self) -> &'static str {
        "plain_lines"
    }

    fn parse(&self, text: &str) -> Option<Vec<CaptionRecord>> {
        if text.contains('#') {
            return None;
        }

        let captions: Vec<String> = without_intro(non_empty_lines(text))
            .into_iter()
            .map(clean_caption)
            .filter(|c| !c.is_empty())
            .take(CAPTION_COUNT)
            .collect();

        if captions.len() < CAPTION_COUNT {
            return None;
        }

        Some(captions.into_iter().map(CaptionRecord::caption_only).collect())
    }
}

/// Last resort: the whole text, untouched, as a single caption.
pub struct Passthrough;

impl ParseStrategy for Passthrough {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn parse(&self, text: &str) -> Option<Vec<CaptionRecord>> {
        Some(vec![CaptionRecord::caption_only(text.trim())])
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

/// Parses the body of one numbered block. Prose lines join into the caption;
/// hashtag runs, wherever they sit, join into the hashtags.
fn parse_block(block: &str) -> Option<CaptionRecord> {
    let mut prose_parts: Vec<String> = Vec::new();
    let mut tag_parts: Vec<&str> = Vec::new();

    for line in non_empty_lines(block) {
        let line = strip_line_prefix(line);
        let (prose, tags) = split_trailing_hashtags(line);
        let prose = clean_caption(prose);
        if !prose.is_empty() {
            prose_parts.push(prose);
        }
        tag_parts.extend(tags);
    }

    let caption = prose_parts.join(" ");
    if caption.is_empty() {
        return None;
    }

    Some(CaptionRecord::new(caption, tag_parts.join(" ")))
}

/// Splits a trailing run of hashtag tokens off `line`.
fn split_trailing_hashtags(line: &str) -> (&str, Vec<&str>) {
    match TRAILING_HASHTAGS.find(line) {
        Some(m) => (
            &line[..m.start()],
            HASHTAG.find_iter(m.as_str()).map(|t| t.as_str()).collect(),
        ),
        None => (line, Vec::new()),
    }
}

/// Line-mode hashtag split. Prefers a trailing run of tags; a line whose `#`
/// is buried mid-sentence is cut at its last `#` instead.
fn split_line_hashtags(line: &str) -> (&str, String) {
    let (prose, tags) = split_trailing_hashtags(line);
    if !tags.is_empty() {
        return (prose, tags.join(" "));
    }

    match line.rfind('#') {
        Some(idx) => {
            let tail = line[idx + 1..].trim();
            let hashtags = if tail.is_empty() {
                String::new()
            } else {
                format!("#{tail}")
            };
            (&line[..idx], hashtags)
        }
        None => (line, String::new()),
    }
}

/// Strips list markers, bullets, emphasis and enclosing quotes, and collapses
/// whitespace. The result never starts with a list marker.
fn clean_caption(text: &str) -> String {
    let text = text.replace("**", "");
    let mut s = text.trim();

    loop {
        let before = s.len();

        if let Some(m) = LEADING_MARKER.find(s) {
            if m.end() > 0 && is_list_marker(s, m.as_str(), m.end()) {
                s = s[m.end()..].trim_start();
            }
        }
        s = strip_enclosing_quotes(s).trim();
        s = s.trim_end_matches(['*', '_']).trim_end();

        if s.len() == before {
            break;
        }
    }

    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_enclosing_quotes(s: &str) -> &str {
    const PAIRS: &[(char, char)] = &[('"', '"'), ('“', '”'), ('「', '」')];
    for &(open, close) in PAIRS {
        if let Some(inner) = s.strip_prefix(open).and_then(|r| r.strip_suffix(close)) {
            return inner;
        }
    }
    s
}

/// Drops a markdown heading prefix and a `Hashtags:` label, in that order.
fn strip_line_prefix(line: &str) -> &str {
    let line = match HEADING.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    };
    match HASHTAG_LABEL.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

/// Checks what follows a candidate `marker` ending at `end`:
/// `1.5 million`, `3:00` and `2-for-1` are not list markers.
fn is_list_marker(text: &str, marker: &str, end: usize) -> bool {
    match text[end..].chars().next() {
        Some(c) if c.is_ascii_digit() => false,
        Some(c) if c.is_alphabetic() && marker.ends_with('-') => false,
        _ => true,
    }
}

fn non_empty_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty())
}

/// Drops a leading "Here are your captions:" style line, unless it is the
/// only line there is.
fn without_intro<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut lines: Vec<&str> = lines.collect();
    if lines.len() > 1 && is_intro_line(lines[0]) {
        lines.remove(0);
    }
    lines
}

fn is_intro_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("caption") || lower.contains("here are")
}
