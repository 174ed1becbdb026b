//! CLI presentation: text and json formatters per command.

use crate::error::{ApiError, StorageError};
use crate::prompt::Preset;
use crate::store::{JobRecord, PersistedQuestion};
use chrono::{TimeZone, Utc};
use comfy_table::Table;
use serde::Serialize;

/// Length of the raw response excerpt shown in text status output.
const RESPONSE_EXCERPT_CHARS: usize = 200;

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value).map_err(|e| {
        ApiError::StorageError(StorageError::IoError(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            e.to_string(),
        )))
    })
}

fn format_timestamp(ms: u64) -> String {
    Utc.timestamp_millis_opt(ms as i64)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(header);
    table
}

pub fn format_submitted(record: &JobRecord) -> String {
    format!(
        "Submitted job {} ({} {} questions for category {}). Run `quizforge work` to process it.",
        record.id, record.questions_requested, record.format, record.category_id
    )
}

pub fn format_job(record: &JobRecord, format: &str) -> Result<String, ApiError> {
    if format == "json" {
        return to_json(record);
    }
    let excerpt: String = record
        .last_raw_response
        .chars()
        .take(RESPONSE_EXCERPT_CHARS)
        .collect();
    let mut out = vec![
        format!("Job:        {}", record.id),
        format!("Status:     {}", record.status()),
        format!("Tries:      {}/{}", record.tries_so_far, record.max_tries),
        format!("Category:   {}", record.category_id),
        format!("User:       {}", record.user_id),
        format!("Format:     {}", record.format),
        format!("Questions:  {}", record.questions_requested),
        format!("Language:   {}", record.prompt.language),
        format!("Created:    {}", format_timestamp(record.created_at_ms)),
        format!("Modified:   {}", format_timestamp(record.last_modified_at_ms)),
    ];
    if !excerpt.is_empty() {
        out.push(String::new());
        out.push("Last response:".to_string());
        out.push(excerpt);
    }
    Ok(out.join("\n"))
}

pub fn format_job_list(records: &[JobRecord], format: &str) -> Result<String, ApiError> {
    if format == "json" {
        return to_json(records);
    }
    if records.is_empty() {
        return Ok("No jobs.".to_string());
    }
    let mut table = new_table(vec!["Job", "Status", "Tries", "Category", "Format", "Questions", "Modified"]);
    for r in records {
        table.add_row(vec![
            r.id.to_string(),
            r.status().to_string(),
            format!("{}/{}", r.tries_so_far, r.max_tries),
            r.category_id.to_string(),
            r.format.to_string(),
            r.questions_requested.to_string(),
            format_timestamp(r.last_modified_at_ms),
        ]);
    }
    Ok(table.to_string())
}

pub fn format_question_list(
    questions: &[PersistedQuestion],
    format: &str,
) -> Result<String, ApiError> {
    if format == "json" {
        return to_json(questions);
    }
    if questions.is_empty() {
        return Ok("No questions.".to_string());
    }
    let mut table = new_table(vec!["Id", "Name", "Answers", "Correct", "Job"]);
    for q in questions {
        let correct: Vec<&str> = q
            .answers
            .iter()
            .filter(|a| a.is_correct())
            .map(|a| a.text.as_str())
            .collect();
        table.add_row(vec![
            q.id.to_string(),
            q.name.clone(),
            q.answers.len().to_string(),
            correct.join(", "),
            q.job_id.to_string(),
        ]);
    }
    Ok(table.to_string())
}

pub fn format_presets(presets: &[Preset]) -> String {
    if presets.is_empty() {
        return "No presets configured.".to_string();
    }
    let mut table = new_table(vec!["#", "Name", "Format"]);
    for (i, p) in presets.iter().enumerate() {
        table.add_row(vec![(i + 1).to_string(), p.name.clone(), p.format.to_string()]);
    }
    table.to_string()
}
