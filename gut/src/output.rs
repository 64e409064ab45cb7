//! Output formatting for CLI commands.
//!
//! Provides abstraction layer for outputting results in text or JSON format.

use anyhow::Result;
use gut_core::{Hash, ObjectType};
use serde::Serialize;
use std::io::{self, Write};

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Writer for command output with format abstraction.
pub struct OutputWriter {
    format: OutputFormat,
    stdout: io::Stdout,
}

impl OutputWriter {
    /// Create a new OutputWriter.
    pub fn new(json: bool) -> Self {
        Self {
            format: if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
            stdout: io::stdout(),
        }
    }

    /// Write output using the configured format.
    ///
    /// The `data` parameter must be a serializable struct that includes
    /// `success: bool` and `result_code: u8` fields.
    ///
    /// The `text_fn` closure is called only in text mode to generate the
    /// human-readable output.
    pub fn write<T: Serialize>(&self, data: &T, text_fn: impl FnOnce() -> String) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                writeln!(&self.stdout, "{}", json)?;
            }
            OutputFormat::Text => {
                let text = text_fn();
                if !text.is_empty() {
                    write!(&self.stdout, "{}", text)?;
                }
            }
        }
        Ok(())
    }

    /// Like [`write`](Self::write), but text mode emits raw bytes (object payloads).
    pub fn write_bytes<T: Serialize>(&self, data: &T, bytes: &[u8]) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.write(data, String::new),
            OutputFormat::Text => {
                let mut handle = self.stdout.lock();
                handle.write_all(bytes)?;
                handle.flush()?;
                Ok(())
            }
        }
    }

    /// Write an error message to stderr.
    ///
    /// In JSON mode, writes a JSON error object with success=false.
    /// In text mode, writes the error message directly.
    pub fn write_error(&self, error: &anyhow::Error, result_code: u8) {
        match self.format {
            OutputFormat::Json => {
                let error_output = ErrorOutput {
                    success: false,
                    result_code,
                    error: format!("{:#}", error),
                };
                if let Ok(json) = serde_json::to_string_pretty(&error_output) {
                    let _ = writeln!(io::stderr(), "{}", json);
                }
            }
            OutputFormat::Text => {
                let _ = writeln!(io::stderr(), "Error: {:#}", error);
            }
        }
    }
}

// ============================================================================
// Data Transfer Objects (DTOs) for JSON output
// ============================================================================

/// Error output structure.
#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub success: bool,
    pub result_code: u8,
    pub error: String,
}

/// Output for `init` command.
#[derive(Debug, Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub result_code: u8,
    pub root: String,
    pub algorithm: String,
}

/// Output for `hash-object` command.
#[derive(Debug, Serialize)]
pub struct HashObjectOutput {
    pub success: bool,
    pub result_code: u8,
    pub hash: Hash,
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    pub written: bool,
}

/// Output for `cat-file` command.
#[derive(Debug, Serialize)]
pub struct CatFileOutput {
    pub success: bool,
    pub result_code: u8,
    pub hash: Hash,
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    pub size: usize,
    pub content: String,
}

/// Tree entry information for `ls-tree` command.
#[derive(Debug, Clone, Serialize)]
pub struct TreeEntryInfo {
    pub mode: String,
    pub entry_type: String,
    pub hash: Hash,
    pub path: String,
}

/// Output for `ls-tree` command.
#[derive(Debug, Serialize)]
pub struct LsTreeOutput {
    pub success: bool,
    pub result_code: u8,
    pub tree: Hash,
    pub entries: Vec<TreeEntryInfo>,
}

/// Output for `rev-parse` command.
#[derive(Debug, Serialize)]
pub struct RevParseOutput {
    pub success: bool,
    pub result_code: u8,
    pub prefix: String,
    pub hash: Hash,
}

/// Output for `commit-tree` command.
#[derive(Debug, Serialize)]
pub struct CommitTreeOutput {
    pub success: bool,
    pub result_code: u8,
    pub hash: Hash,
    pub tree: Hash,
    pub parents: Vec<Hash>,
}
