//! CLI parse: clap types for quizforge. No behavior; definitions only.

use crate::parser::QuestionFormat;
use crate::types::{CategoryId, JobId, UserId};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// quizforge - generate question-bank quiz questions from text with an LLM
#[derive(Parser)]
#[command(name = "quizforge")]
#[command(about = "Generate multiple choice quiz questions from free text with an LLM")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit a text for question generation
    Submit {
        /// Destination question category
        #[arg(long)]
        category: CategoryId,
        /// Submitting user (owner of the created questions)
        #[arg(long)]
        user: UserId,
        /// File containing the source text
        #[arg(long)]
        story_file: PathBuf,
        /// Preset by 1-based index or name (default: first preset)
        #[arg(long)]
        preset: Option<String>,
        /// Number of questions to generate
        #[arg(long)]
        count: Option<u32>,
        /// Response format (gift or xml); defaults to the preset's format
        #[arg(long)]
        format: Option<QuestionFormat>,
        /// Language the questions are written in
        #[arg(long)]
        language: Option<String>,
        /// Prefix question names with "AI-created: "
        #[arg(long)]
        add_identifier: bool,
        /// Run the job now and wait for it instead of leaving it for `work`
        #[arg(long)]
        wait: bool,
    },
    /// Process every unfinished job, then exit
    Work {
        /// Give up waiting after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Show one job
    Status {
        job_id: JobId,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List all jobs
    Jobs {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List created questions by job or category
    Questions {
        #[arg(long, conflicts_with = "category", required_unless_present = "category")]
        job: Option<JobId>,
        #[arg(long)]
        category: Option<CategoryId>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List configured prompt presets
    Presets,
}
