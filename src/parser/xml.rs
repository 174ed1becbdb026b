//! Markup (Moodle-style XML) response parser.
//!
//! The raw response is written to a scoped temporary file and pushed through a
//! three stage importer: pre-process (clean up the file), import (read questions)
//! and post-process (validate). A failure in any stage rejects the attempt.

use crate::parser::{ParseOutcome, QuestionFormat, Rejection, ResponseParser};
use crate::provider::LlmResponse;
use crate::question::{wrap_paragraph, AnswerOption, QuestionDraft, QuestionType, TextFormat};
use std::fmt;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

/// Importer stage, used for rejection reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStage {
    Preprocess,
    Import,
    Postprocess,
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImportStage::Preprocess => "preprocess",
            ImportStage::Import => "import",
            ImportStage::Postprocess => "postprocess",
        })
    }
}

/// A file-based markup question importer.
pub trait MarkupImporter: Send + Sync {
    /// Prepare the file in place before import.
    fn preprocess(&self, path: &Path) -> Result<(), String>;

    /// Read every question in the file.
    fn import(&self, path: &Path) -> Result<Vec<QuestionDraft>, String>;

    /// Check or adjust the imported questions.
    fn postprocess(&self, drafts: Vec<QuestionDraft>) -> Result<Vec<QuestionDraft>, String>;
}

/// Response parser that drives a `MarkupImporter` over a temporary file.
pub struct XmlParser<I> {
    importer: I,
}

impl<I: MarkupImporter> XmlParser<I> {
    pub fn new(importer: I) -> Self {
        Self { importer }
    }

    fn run_stages(&self, text: &str) -> Result<Vec<QuestionDraft>, Rejection> {
        let reject = |stage: ImportStage| {
            move |message: String| Rejection::ImportFailed { stage, message }
        };

        let mut file = tempfile::Builder::new()
            .prefix("quizforge-import-")
            .suffix(".xml")
            .tempfile()
            .map_err(|e| format!("failed to create import file: {}", e))
            .map_err(reject(ImportStage::Preprocess))?;
        file.write_all(text.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| format!("failed to write import file: {}", e))
            .map_err(reject(ImportStage::Preprocess))?;

        let path = file.path();
        self.importer
            .preprocess(path)
            .map_err(reject(ImportStage::Preprocess))?;
        let drafts = self
            .importer
            .import(path)
            .map_err(reject(ImportStage::Import))?;
        self.importer
            .postprocess(drafts)
            .map_err(reject(ImportStage::Postprocess))
    }
}

impl<I: MarkupImporter> ResponseParser for XmlParser<I> {
    fn format(&self) -> QuestionFormat {
        QuestionFormat::Xml
    }

    fn parse(&self, response: &LlmResponse, expected: usize) -> ParseOutcome {
        match self.run_stages(&response.text) {
            Ok(drafts) => ParseOutcome::Accepted(drafts).require_count(expected),
            Err(rejection) => {
                debug!(%rejection, "XML import rejected");
                ParseOutcome::Rejected(rejection)
            }
        }
    }
}

/// Importer for the Moodle XML quiz format, multiple choice only.
#[derive(Debug, Clone, Default)]
pub struct XmlQuestionImporter;

impl XmlQuestionImporter {
    pub fn new() -> Self {
        Self
    }

    /// Cut the `<quiz>` document out of surrounding chatter and code fences.
    pub fn extract_document(raw: &str) -> Option<&str> {
        let start = raw.find("<?xml").or_else(|| raw.find("<quiz"))?;
        let end_tag = "</quiz>";
        let end = raw.rfind(end_tag)? + end_tag.len();
        (end > start).then(|| &raw[start..end])
    }

    fn read_question(node: roxmltree::Node<'_, '_>) -> Result<QuestionDraft, String> {
        let name = child_text(node, "name")
            .map(|n| n.trim().to_string())
            .unwrap_or_default();

        let question_text = node
            .children()
            .find(|n| n.has_tag_name("questiontext"))
            .ok_or_else(|| format!("question '{}' has no questiontext", name))?;
        let format = question_text.attribute("format").unwrap_or("html");
        let raw_text = child_text(node, "questiontext").unwrap_or_default();
        let display_text = if format == "html" {
            raw_text.trim().to_string()
        } else {
            wrap_paragraph(&raw_text)
        };

        let mut answers = Vec::new();
        for answer in node.children().filter(|n| n.has_tag_name("answer")) {
            let fraction = answer
                .attribute("fraction")
                .unwrap_or("0")
                .trim()
                .parse::<f32>()
                .map_err(|_| format!("question '{}' has an invalid answer fraction", name))?;
            answers.push(AnswerOption {
                text: child_element_text(answer).unwrap_or_default(),
                fraction,
                feedback: child_text(answer, "feedback").filter(|f| !f.trim().is_empty()),
            });
        }

        let name = if name.is_empty() {
            raw_text.trim().chars().take(80).collect()
        } else {
            name
        };

        Ok(QuestionDraft {
            name,
            display_text,
            text_format: TextFormat::Html,
            question_type: QuestionType::MultipleChoice,
            answers,
            general_feedback: child_text(node, "generalfeedback").filter(|f| !f.trim().is_empty()),
        })
    }
}

impl MarkupImporter for XmlQuestionImporter {
    fn preprocess(&self, path: &Path) -> Result<(), String> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        let document = Self::extract_document(&raw)
            .ok_or_else(|| "response does not contain a <quiz> document".to_string())?;
        if document.len() != raw.len() {
            std::fs::write(path, document)
                .map_err(|e| format!("failed to rewrite {}: {}", path.display(), e))?;
        }
        Ok(())
    }

    fn import(&self, path: &Path) -> Result<Vec<QuestionDraft>, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        let doc = roxmltree::Document::parse(&content).map_err(|e| e.to_string())?;
        let root = doc.root_element();
        if !root.has_tag_name("quiz") {
            return Err(format!(
                "root element is <{}>, expected <quiz>",
                root.tag_name().name()
            ));
        }

        let mut drafts = Vec::new();
        for question in root.children().filter(|n| n.has_tag_name("question")) {
            match question.attribute("type") {
                Some("category") => continue,
                Some("multichoice") | None => drafts.push(Self::read_question(question)?),
                Some(other) => {
                    warn!(question_type = other, "Unsupported question type in XML import");
                    return Err(format!("unsupported question type '{}'", other));
                }
            }
        }
        Ok(drafts)
    }

    fn postprocess(&self, drafts: Vec<QuestionDraft>) -> Result<Vec<QuestionDraft>, String> {
        for (index, draft) in drafts.iter().enumerate() {
            draft
                .validate()
                .map_err(|reason| format!("question {}: {}", index + 1, reason))?;
        }
        Ok(drafts)
    }
}

/// Text of `<tag><text>...</text></tag>` under `node`.
fn child_text(node: roxmltree::Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|n| n.has_tag_name(tag))
        .and_then(child_element_text)
}

/// Text of the `<text>` child of `node`.
fn child_element_text(node: roxmltree::Node<'_, '_>) -> Option<String> {
    node.children()
        .find(|n| n.has_tag_name("text"))
        .map(|t| t.text().unwrap_or("").trim().to_string())
}
