//! Question model
//!
//! `QuestionDraft` is what a response parser produces: a candidate question that
//! has not been written to the question bank yet. The store turns an accepted
//! batch of drafts into `PersistedQuestion`s (see `store`).

use serde::{Deserialize, Serialize};

/// Name prefix applied when a job asks for AI-created questions to be tagged.
pub const AI_IDENTIFIER_PREFIX: &str = "AI-created: ";

/// Line width used when rendering question HTML to text.
const TEXT_WIDTH: usize = 80;

/// Supported question kinds. Only multiple choice is generated today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
}

impl QuestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multichoice",
        }
    }
}

/// Markup of a question's display text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextFormat {
    Plain,
    Html,
}

/// One candidate answer. `fraction` is the grade percentage (100 = fully correct).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub text: String,
    pub fraction: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl AnswerOption {
    pub fn new(text: impl Into<String>, fraction: f32) -> Self {
        Self {
            text: text.into(),
            fraction,
            feedback: None,
        }
    }

    pub fn is_correct(&self) -> bool {
        self.fraction > 0.0
    }
}

/// A parsed, not-yet-persisted candidate question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub name: String,
    pub display_text: String,
    pub text_format: TextFormat,
    pub question_type: QuestionType,
    pub answers: Vec<AnswerOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general_feedback: Option<String>,
}

impl QuestionDraft {
    /// Structural check shared by both parsers and the question store.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("question name is empty".to_string());
        }
        if html_to_text(&self.display_text).trim().is_empty() {
            return Err("question text is empty".to_string());
        }
        if self.answers.len() < 2 {
            return Err(format!(
                "multiple choice needs at least 2 answers, got {}",
                self.answers.len()
            ));
        }
        if self.answers.iter().any(|a| a.text.trim().is_empty()) {
            return Err("answer text is empty".to_string());
        }
        if !self.answers.iter().any(AnswerOption::is_correct) {
            return Err("no correct answer".to_string());
        }
        Ok(())
    }

    pub fn correct_answers(&self) -> impl Iterator<Item = &AnswerOption> {
        self.answers.iter().filter(|a| a.is_correct())
    }
}

/// Wrap plain prompt text as a single rich-text paragraph.
pub fn wrap_paragraph(text: &str) -> String {
    format!("<p>{}</p>", text.trim())
}

/// Apply the AI identifier prefix to a question name when requested.
pub fn tagged_name(name: &str, add_identifier: bool) -> String {
    if add_identifier {
        format!("{AI_IDENTIFIER_PREFIX}{name}")
    } else {
        name.to_string()
    }
}

/// Plain text of an HTML fragment, as a student would read it.
pub fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), TEXT_WIDTH).unwrap_or_else(|_| html.to_string())
}
