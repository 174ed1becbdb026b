//! Plain-text (GIFT) response parser.
//!
//! The model is asked for one question per block, blocks separated by a blank
//! line:
//!
//! ```text
//! ::Q1:: Which planet is known as the red planet? {
//! =Mars
//! ~Venus
//! ~Jupiter#Jupiter is a gas giant
//! }
//!
//! ::Q2:: ...
//! ```
//!
//! The block count must equal the requested count, and every block must read as
//! a well-formed multiple choice question. Anything else rejects the batch.

use crate::parser::{ParseOutcome, QuestionFormat, Rejection, ResponseParser};
use crate::provider::LlmResponse;
use crate::question::{wrap_paragraph, AnswerOption, QuestionDraft, QuestionType, TextFormat};
use tracing::debug;

/// Separator between question blocks.
pub const BLOCK_SEPARATOR: &str = "\n\n";

const MAX_DERIVED_NAME_CHARS: usize = 80;
const TEXT_FORMAT_PREFIXES: [&str; 4] = ["[html]", "[moodle]", "[plain]", "[markdown]"];

/// Response parser for the GIFT plain-text format.
#[derive(Debug, Clone, Default)]
pub struct GiftParser {
    reader: GiftReader,
}

impl GiftParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a response into raw question blocks.
    ///
    /// Only CRLF line endings and whitespace around the whole response are
    /// normalized; a stray extra blank line between questions still yields an
    /// extra (empty) block.
    pub fn split_blocks(text: &str) -> Vec<String> {
        let normalized = text.replace("\r\n", "\n");
        normalized
            .trim()
            .split(BLOCK_SEPARATOR)
            .map(str::to_string)
            .collect()
    }

    /// Text shown to students: the first non-comment line up to any `{`,
    /// minus a leading `label::` prefix.
    pub fn prompt_text(block: &str) -> String {
        let first_line = block
            .lines()
            .find(|line| !line.trim().is_empty() && !line.trim_start().starts_with("//"))
            .unwrap_or("");
        let before_brace = first_line.split('{').next().unwrap_or("");
        let without_label = match before_brace.rfind("::") {
            Some(pos) => &before_brace[pos + 2..],
            None => before_brace,
        };
        without_label.trim().to_string()
    }
}

impl ResponseParser for GiftParser {
    fn format(&self) -> QuestionFormat {
        QuestionFormat::Gift
    }

    fn parse(&self, response: &LlmResponse, expected: usize) -> ParseOutcome {
        let blocks = Self::split_blocks(&response.text);
        if blocks.len() != expected {
            return ParseOutcome::Rejected(Rejection::BlockCountMismatch {
                expected,
                found: blocks.len(),
            });
        }

        let mut drafts = Vec::with_capacity(blocks.len());
        for (index, block) in blocks.iter().enumerate() {
            let lines: Vec<&str> = block.lines().collect();
            let mut draft = match self.reader.read_question(&lines) {
                Ok(draft) => draft,
                Err(reason) => {
                    debug!(index, %reason, "GIFT block rejected");
                    return ParseOutcome::Rejected(Rejection::MalformedQuestion { index, reason });
                }
            };

            draft.display_text = wrap_paragraph(&Self::prompt_text(block));
            draft.text_format = TextFormat::Html;
            if let Err(reason) = draft.validate() {
                return ParseOutcome::Rejected(Rejection::MalformedQuestion { index, reason });
            }
            drafts.push(draft);
        }

        ParseOutcome::Accepted(drafts)
    }
}

/// Reader for a single GIFT multiple choice question.
#[derive(Debug, Clone, Default)]
pub struct GiftReader;

impl GiftReader {
    pub fn new() -> Self {
        Self
    }

    /// Read one question from its lines. Returns the reason when the block is
    /// not a well-formed multiple choice question.
    pub fn read_question(&self, lines: &[&str]) -> Result<QuestionDraft, String> {
        let joined = lines
            .iter()
            .filter(|line| !line.trim_start().starts_with("//"))
            .map(|line| line.trim_end())
            .collect::<Vec<_>>()
            .join("\n");
        let text = joined.trim();
        if text.is_empty() {
            return Err("empty question block".to_string());
        }

        let (name, rest) = match text.strip_prefix("::") {
            Some(after) => {
                let end = find_unescaped(after, "::")
                    .ok_or_else(|| "unterminated question name".to_string())?;
                (Some(unescape(after[..end].trim())), &after[end + 2..])
            }
            None => (None, text),
        };

        let open = find_unescaped(rest, "{").ok_or_else(|| "missing answer block".to_string())?;
        let close =
            rfind_unescaped(rest, "}").ok_or_else(|| "missing closing brace".to_string())?;
        if close < open {
            return Err("closing brace before opening brace".to_string());
        }

        let answer_text = &rest[open + 1..close];
        if find_unescaped(answer_text, "{").is_some() || find_unescaped(answer_text, "}").is_some()
        {
            return Err("nested braces in answer block".to_string());
        }

        let mut question_text = rest[..open].trim().to_string();
        let trailing = rest[close + 1..].trim();
        if !trailing.is_empty() {
            question_text.push(' ');
            question_text.push_str(trailing);
        }
        let question_text = strip_format_prefix(&question_text);
        let question_text = unescape(question_text.trim());
        if question_text.is_empty() {
            return Err("question text is empty".to_string());
        }

        let answers = parse_answers(answer_text)?;

        let name = name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| question_text.chars().take(MAX_DERIVED_NAME_CHARS).collect());

        let draft = QuestionDraft {
            name,
            display_text: question_text,
            text_format: TextFormat::Plain,
            question_type: QuestionType::MultipleChoice,
            answers,
            general_feedback: None,
        };
        draft.validate()?;
        Ok(draft)
    }
}

fn parse_answers(answer_text: &str) -> Result<Vec<AnswerOption>, String> {
    let trimmed = answer_text.trim();
    if trimmed.is_empty() {
        return Err("answer block is empty".to_string());
    }
    if matches!(
        trimmed.to_ascii_uppercase().as_str(),
        "T" | "F" | "TRUE" | "FALSE"
    ) {
        return Err("true/false questions are not supported".to_string());
    }
    if trimmed.starts_with('#') {
        return Err("numerical questions are not supported".to_string());
    }

    let markers = unescaped_positions(trimmed, &['=', '~']);
    match markers.first() {
        None => return Err("no answer markers found".to_string()),
        Some(&(first, _)) if !trimmed[..first].trim().is_empty() => {
            return Err("text before first answer marker".to_string())
        }
        _ => {}
    }
    if !markers.iter().any(|&(_, marker)| marker == '~') {
        return Err("not a multiple choice question (no wrong answers)".to_string());
    }

    let mut answers = Vec::with_capacity(markers.len());
    for (i, &(start, marker)) in markers.iter().enumerate() {
        let end = markers.get(i + 1).map(|&(pos, _)| pos).unwrap_or(trimmed.len());
        let body = &trimmed[start + 1..end];
        answers.push(parse_answer(marker, body)?);
    }
    Ok(answers)
}

fn parse_answer(marker: char, body: &str) -> Result<AnswerOption, String> {
    let mut fraction = if marker == '=' { 100.0 } else { 0.0 };
    let mut body = body.trim();

    if let Some(after) = body.strip_prefix('%') {
        let end = after
            .find('%')
            .ok_or_else(|| "unterminated answer weight".to_string())?;
        fraction = after[..end]
            .trim()
            .parse::<f32>()
            .map_err(|_| format!("invalid answer weight '{}'", &after[..end]))?;
        body = after[end + 1..].trim();
    }

    let (text, feedback) = match find_unescaped(body, "#") {
        Some(pos) => (&body[..pos], Some(unescape(body[pos + 1..].trim()))),
        None => (body, None),
    };
    let text = unescape(text.trim());
    if text.is_empty() {
        return Err("empty answer".to_string());
    }
    Ok(AnswerOption {
        text,
        fraction,
        feedback: feedback.filter(|f| !f.is_empty()),
    })
}

fn strip_format_prefix(text: &str) -> &str {
    TEXT_FORMAT_PREFIXES
        .iter()
        .find_map(|prefix| text.strip_prefix(prefix))
        .unwrap_or(text)
}

fn is_escaped(s: &str, pos: usize) -> bool {
    s[..pos].bytes().rev().take_while(|&b| b == b'\\').count() % 2 == 1
}

fn find_unescaped(s: &str, pat: &str) -> Option<usize> {
    s.match_indices(pat)
        .map(|(pos, _)| pos)
        .find(|&pos| !is_escaped(s, pos))
}

fn rfind_unescaped(s: &str, pat: &str) -> Option<usize> {
    s.rmatch_indices(pat)
        .map(|(pos, _)| pos)
        .find(|&pos| !is_escaped(s, pos))
}

fn unescaped_positions(s: &str, markers: &[char]) -> Vec<(usize, char)> {
    s.char_indices()
        .filter(|(pos, c)| markers.contains(c) && !is_escaped(s, *pos))
        .collect()
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if matches!(next, '=' | '~' | '#' | '{' | '}' | ':' | '\\') {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}
