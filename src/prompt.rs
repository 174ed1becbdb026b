//! Prompt assembly
//!
//! A job carries its own `PromptParameters`; every attempt turns them into the
//! same chat messages. Presets are named bundles of primer, instructions,
//! format and example that a submission can start from.

use crate::parser::QuestionFormat;
use crate::provider::ChatMessage;
use serde::{Deserialize, Serialize};

/// Placeholder replaced by the requested number of questions.
pub const COUNT_PLACEHOLDER: &str = "{{numofquestions}}";
/// Placeholder replaced by the output language.
pub const LANGUAGE_PLACEHOLDER: &str = "{{language}}";

pub const DEFAULT_LANGUAGE: &str = "English";

/// Inputs the model sees on every attempt of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptParameters {
    pub primer: String,
    pub instructions: String,
    #[serde(default)]
    pub example: String,
    /// Source text the questions are generated from.
    pub story: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

impl PromptParameters {
    /// Instructions with placeholders filled in.
    pub fn render_instructions(&self, question_count: u32) -> String {
        self.instructions
            .replace(COUNT_PLACEHOLDER, &question_count.to_string())
            .replace(LANGUAGE_PLACEHOLDER, &self.language)
    }

    /// System message = primer; user message = instructions, example, text.
    pub fn to_messages(&self, question_count: u32) -> Vec<ChatMessage> {
        let mut user = self.render_instructions(question_count);
        if !self.example.trim().is_empty() {
            user.push_str("\n\nExample:\n");
            user.push_str(self.example.trim());
        }
        user.push_str("\n\nText:\n");
        user.push_str(self.story.trim());

        vec![ChatMessage::system(self.primer.trim()), ChatMessage::user(user)]
    }
}

/// A named prompt template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub primer: String,
    pub instructions: String,
    pub format: QuestionFormat,
    #[serde(default)]
    pub example: String,
}

impl Preset {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("preset name cannot be empty".to_string());
        }
        if self.primer.trim().is_empty() {
            return Err(format!("preset '{}' has an empty primer", self.name));
        }
        if self.instructions.trim().is_empty() {
            return Err(format!("preset '{}' has empty instructions", self.name));
        }
        Ok(())
    }
}

/// Find a preset by 1-based index or by case-insensitive name.
pub fn find_preset<'a>(presets: &'a [Preset], selector: &str) -> Option<&'a Preset> {
    let selector = selector.trim();
    if let Ok(index) = selector.parse::<usize>() {
        return index.checked_sub(1).and_then(|i| presets.get(i));
    }
    presets
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(selector))
}

/// Built-in presets used when the configuration defines none.
pub fn default_presets() -> Vec<Preset> {
    vec![
        Preset {
            name: "Multiple choice (GIFT)".to_string(),
            primer: "You are a helpful teacher's assistant that creates multiple choice questions \
                     based on the topics given by the user."
                .to_string(),
            instructions: "Please write {{numofquestions}} multiple choice questions in {{language}} \
                           in GIFT format on the following text. GIFT format uses equal sign for the \
                           right answer and tilde for wrong answers. Separate questions with one empty \
                           line and write nothing but the questions."
                .to_string(),
            format: QuestionFormat::Gift,
            example: "::Capital of France:: What is the capital of France? {\n=Paris\n~London\n~Berlin\n~Madrid\n}"
                .to_string(),
        },
        Preset {
            name: "Multiple choice (XML)".to_string(),
            primer: "You are a helpful teacher's assistant that creates multiple choice questions \
                     based on the topics given by the user."
                .to_string(),
            instructions: "Please write {{numofquestions}} multiple choice questions in {{language}} \
                           in Moodle XML format on the following text. Answer with a single <quiz> \
                           document and nothing else."
                .to_string(),
            format: QuestionFormat::Xml,
            example: "<quiz>\n  <question type=\"multichoice\">\n    <name><text>Capital of France</text></name>\n    \
                      <questiontext format=\"html\"><text><![CDATA[<p>What is the capital of France?</p>]]></text></questiontext>\n    \
                      <answer fraction=\"100\"><text>Paris</text></answer>\n    \
                      <answer fraction=\"0\"><text>London</text></answer>\n  </question>\n</quiz>"
                .to_string(),
        },
    ]
}
