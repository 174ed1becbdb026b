//! Response parsers
//!
//! Turn one raw LLM response into a complete batch of `QuestionDraft`s or reject
//! the whole batch. Both formats report through the same `ParseOutcome`, so the
//! generation job treats a GIFT count mismatch and a failed XML import stage
//! identically: discard the attempt and retry.

pub mod gift;
pub mod xml;

pub use gift::{GiftParser, GiftReader};
pub use xml::{ImportStage, MarkupImporter, XmlParser, XmlQuestionImporter};

use crate::provider::LlmResponse;
use crate::question::QuestionDraft;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Textual encoding the model is asked to answer in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionFormat {
    /// Delimiter-based plain text (GIFT)
    Gift,
    /// Markup (Moodle-style XML)
    #[serde(alias = "moodlexml")]
    Xml,
}

impl QuestionFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionFormat::Gift => "gift",
            QuestionFormat::Xml => "xml",
        }
    }
}

impl fmt::Display for QuestionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gift" | "plaintext" | "text" => Ok(QuestionFormat::Gift),
            "xml" | "moodlexml" | "markup" => Ok(QuestionFormat::Xml),
            other => Err(format!(
                "unknown question format '{}' (expected 'gift' or 'xml')",
                other
            )),
        }
    }
}

/// Why a batch was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The response did not contain exactly the requested number of questions.
    BlockCountMismatch { expected: usize, found: usize },
    /// One question block could not be read; the whole batch is discarded.
    MalformedQuestion { index: usize, reason: String },
    /// A markup import stage failed.
    ImportFailed { stage: ImportStage, message: String },
    /// The provider call itself failed.
    ProviderFailure(String),
    /// The question store refused the batch.
    PersistenceFailure(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::BlockCountMismatch { expected, found } => write!(
                f,
                "expected {} questions, response contained {}",
                expected, found
            ),
            Rejection::MalformedQuestion { index, reason } => {
                write!(f, "question {} is malformed: {}", index + 1, reason)
            }
            Rejection::ImportFailed { stage, message } => {
                write!(f, "import {} failed: {}", stage, message)
            }
            Rejection::ProviderFailure(msg) => write!(f, "provider call failed: {}", msg),
            Rejection::PersistenceFailure(msg) => write!(f, "persisting batch failed: {}", msg),
        }
    }
}

/// Result of parsing one response: a full batch or nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Accepted(Vec<QuestionDraft>),
    Rejected(Rejection),
}

impl ParseOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ParseOutcome::Accepted(_))
    }

    pub fn drafts(&self) -> Option<&[QuestionDraft]> {
        match self {
            ParseOutcome::Accepted(drafts) => Some(drafts),
            ParseOutcome::Rejected(_) => None,
        }
    }

    /// Enforce the exact batch size on an otherwise accepted outcome.
    pub fn require_count(self, expected: usize) -> Self {
        match self {
            ParseOutcome::Accepted(drafts) if drafts.len() != expected => {
                ParseOutcome::Rejected(Rejection::BlockCountMismatch {
                    expected,
                    found: drafts.len(),
                })
            }
            other => other,
        }
    }
}

/// A format-specific response parser.
pub trait ResponseParser: Send + Sync {
    fn format(&self) -> QuestionFormat;

    fn parse(&self, response: &LlmResponse, expected: usize) -> ParseOutcome;
}

/// Parser lookup by format.
#[derive(Clone)]
pub struct ParserRegistry {
    gift: Arc<dyn ResponseParser>,
    xml: Arc<dyn ResponseParser>,
}

impl ParserRegistry {
    pub fn new(gift: Arc<dyn ResponseParser>, xml: Arc<dyn ResponseParser>) -> Self {
        Self { gift, xml }
    }

    /// Replace the parser used for `parser.format()`.
    pub fn with_parser(mut self, parser: Arc<dyn ResponseParser>) -> Self {
        match parser.format() {
            QuestionFormat::Gift => self.gift = parser,
            QuestionFormat::Xml => self.xml = parser,
        }
        self
    }

    pub fn get(&self, format: QuestionFormat) -> &dyn ResponseParser {
        match format {
            QuestionFormat::Gift => self.gift.as_ref(),
            QuestionFormat::Xml => self.xml.as_ref(),
        }
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new(
            Arc::new(GiftParser::new()),
            Arc::new(XmlParser::new(XmlQuestionImporter::new())),
        )
    }
}
