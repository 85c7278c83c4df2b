//! PDF extraction
//!
//! Text comes from `pdf-extract`; sections are found by chapter headings at
//! line start. PDF text is hard-wrapped, so a line that merely begins with
//! "Chapter 5" is only a heading when it looks like one: a short title after
//! the number and a number that continues the chapter sequence. Front matter
//! before the first chapter is dropped, as are table-of-contents entries
//! (headings with almost no text under them). A document without usable
//! headings is split into fixed-size word chunks.

use crate::{ConfigError, ExtractionError};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static CHAPTER_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(chapter[ \t]+(\d+|[ivxlc]+|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve))\b[ \t]*([:.\-])?[ \t]*([^\n]*)$",
    )
    .expect("hardcoded chapter heading pattern is valid")
});

/// Words per section when no chapter headings are found
pub const CHUNK_WORDS: usize = 2000;

/// Sections shorter than this are table-of-contents lines
const MIN_SECTION_WORDS: usize = 20;

/// Longest line taken as a chapter subtitle
const MAX_SUBTITLE_CHARS: usize = 80;

const NUMBER_WORDS: &[&str] = &[
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "eleven", "twelve",
];

/// One chapter or chunk of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub body: String,
}

/// Reads the PDF bytes, mapping any failure to a configuration error
pub async fn read_pdf(path: &Path) -> Result<Vec<u8>, ConfigError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| ConfigError::UnreadableFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Extracts plain text off the async runtime
pub async fn extract_text(bytes: Vec<u8>) -> Result<String, ExtractionError> {
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| ExtractionError::Pdf(format!("text extraction aborted: {}", e)))?
        .map_err(|e| ExtractionError::Pdf(e.to_string()))?;

    if text.trim().is_empty() {
        Err(ExtractionError::EmptyContent)
    } else {
        Ok(text)
    }
}

/// Book title from a file name: `my_book.pdf` becomes `My Book`
pub fn book_title_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let title = stem
        .split(['_', '-', ' '])
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ");

    if title.is_empty() {
        "Untitled".to_string()
    } else {
        title
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Splits document text into ordered sections
pub fn split_sections(text: &str, book_title: &str) -> Vec<Section> {
    let chapters = split_chapters(text);
    if chapters.is_empty() {
        chunk_words(text, book_title)
    } else {
        chapters
    }
}

/// A chapter heading line found in the text
#[derive(Clone)]
struct Heading<'t> {
    /// Byte range of the whole heading line
    start: usize,
    end: usize,
    label: String,
    number: Option<u32>,
    subtitle: &'t str,
}

fn split_chapters(text: &str) -> Vec<Section> {
    let headings = chapter_headings(text);
    let mut sections = Vec::new();

    for (i, heading) in headings.iter().enumerate() {
        let end = headings.get(i + 1).map_or(text.len(), |next| next.start);
        let mut body = &text[heading.end..end];

        let mut subtitle = heading.subtitle.to_string();
        if subtitle.is_empty() {
            if let Some((line, rest)) = first_line(body) {
                if line.len() <= MAX_SUBTITLE_CHARS && !line.ends_with('.') {
                    subtitle = line.to_string();
                    body = rest;
                }
            }
        }

        let body = normalize_text(body);
        if body.split_whitespace().count() < MIN_SECTION_WORDS {
            continue;
        }

        let title = if subtitle.is_empty() {
            capitalize(&heading.label)
        } else {
            format!("{}: {}", capitalize(&heading.label), subtitle)
        };
        sections.push(Section { title, body });
    }

    sections
}

/// Heading lines that start real chapters, in document order
///
/// Contents entries are dropped before the numbering check so that a
/// contents page listing chapters 1..N does not hide the chapters
/// themselves.
fn chapter_headings(text: &str) -> Vec<Heading<'_>> {
    let candidates: Vec<Heading<'_>> = CHAPTER_HEADING
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let label = caps.get(1)?.as_str();
            let subtitle = caps.get(4).map_or("", |m| m.as_str()).trim();
            let separated = caps.get(3).is_some();
            looks_like_title(subtitle, separated).then(|| Heading {
                start: whole.start(),
                end: whole.end(),
                label: label.split_whitespace().collect::<Vec<_>>().join(" "),
                number: caps.get(2).and_then(|m| chapter_number(m.as_str())),
                subtitle,
            })
        })
        .collect();

    let substantial: Vec<Heading<'_>> = candidates
        .iter()
        .enumerate()
        .filter(|(i, heading)| {
            let end = candidates.get(i + 1).map_or(text.len(), |next| next.start);
            text[heading.end..end].split_whitespace().count() >= MIN_SECTION_WORDS
        })
        .map(|(_, heading)| heading.clone())
        .collect();

    let mut accepted: Vec<Heading<'_>> = Vec::new();
    for (i, heading) in substantial.iter().enumerate() {
        let previous = accepted.last().and_then(|h| h.number);
        if let (Some(prev), Some(number)) = (previous, heading.number) {
            if number <= prev {
                continue;
            }
            // A skipped number is tolerated unless the expected one still follows
            let expected_later = substantial[i + 1..]
                .iter()
                .any(|later| later.number == Some(prev + 1));
            if number > prev + 1 && expected_later {
                continue;
            }
        }
        accepted.push(heading.clone());
    }

    accepted
}

/// Whether the text after "Chapter N" reads as a title rather than prose
fn looks_like_title(subtitle: &str, separated: bool) -> bool {
    if subtitle.chars().count() > MAX_SUBTITLE_CHARS {
        return false;
    }
    if subtitle.ends_with(['.', ',', ';']) && !subtitle.ends_with("..") {
        return false;
    }
    // "Chapter 5 where the proof ..." is a wrapped sentence
    let continues_sentence = subtitle.chars().next().is_some_and(char::is_lowercase);
    !(continues_sentence && !separated)
}

/// Chapter number from a digit, roman or word numeral
fn chapter_number(numeral: &str) -> Option<u32> {
    let lower = numeral.to_ascii_lowercase();
    if let Ok(n) = lower.parse() {
        return Some(n);
    }
    if let Some(pos) = NUMBER_WORDS.iter().position(|w| *w == lower) {
        return Some(pos as u32 + 1);
    }
    roman_value(&lower)
}

fn roman_value(numeral: &str) -> Option<u32> {
    let values: Vec<u32> = numeral
        .chars()
        .map(|c| match c {
            'i' => Some(1),
            'v' => Some(5),
            'x' => Some(10),
            'l' => Some(50),
            'c' => Some(100),
            _ => None,
        })
        .collect::<Option<_>>()?;

    let mut total = 0;
    for (i, value) in values.iter().enumerate() {
        if values.get(i + 1).is_some_and(|next| next > value) {
            total -= *value as i64;
        } else {
            total += *value as i64;
        }
    }
    u32::try_from(total).ok().filter(|n| *n > 0)
}

/// First non-blank line and the text after it
fn first_line(text: &str) -> Option<(&str, &str)> {
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.find('\n') {
        Some(pos) => Some((trimmed[..pos].trim(), &trimmed[pos + 1..])),
        None => Some((trimmed.trim(), "")),
    }
}

fn chunk_words(text: &str, book_title: &str) -> Vec<Section> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(CHUNK_WORDS)
        .enumerate()
        .map(|(i, chunk)| Section {
            title: format!("{} - Section {}", book_title, i + 1),
            body: chunk.join(" "),
        })
        .collect()
}

/// Trims lines and collapses runs of blank lines
fn normalize_text(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() && out.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        out.push(line);
    }
    out.join("\n").trim().to_string()
}
