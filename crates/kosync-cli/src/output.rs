//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use chrono::{TimeZone, Utc};
use kosync_core::{DocumentId, RemoteProgress, SyncOutcome};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print the remote record for a document (or its absence)
    pub fn print_remote(&self, document: &DocumentId, remote: Option<&RemoteProgress>) {
        match self.format {
            OutputFormat::Human => {
                let Some(remote) = remote else {
                    println!("No remote progress for {}.", document);
                    return;
                };
                println!("Document:   {}", document);
                println!("Progress:   {}", truncate(&remote.progress, 60));
                println!("Percentage: {:.2}%", remote.percentage * 100.0);
                if !remote.device.is_empty() {
                    println!("Device:     {}", remote.device);
                }
                if let Some(updated) = format_timestamp(remote.timestamp) {
                    println!("Updated:    {}", updated);
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "document": document,
                        "remote": remote,
                    })
                );
            }
            OutputFormat::Quiet => {
                if let Some(remote) = remote {
                    println!("{}", remote.progress);
                }
            }
        }
    }

    /// Print the result of a conflict-aware sync
    pub fn print_outcome(&self, document: &DocumentId, outcome: &SyncOutcome) {
        match self.format {
            OutputFormat::Human => {
                println!("Document: {}", document);
                println!("Page:     {}", outcome.resolved_page);
                println!("Decision: {}", outcome.reason.as_str());
                println!("Pushed:   {}", if outcome.pushed { "yes" } else { "no" });
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "document": document,
                        "resolved_page": outcome.resolved_page,
                        "reason": outcome.reason.as_str(),
                        "pushed": outcome.pushed,
                    })
                );
            }
            OutputFormat::Quiet => {
                println!("{}", outcome.resolved_page);
            }
        }
    }

    /// Print a document key
    pub fn print_document_id(&self, file: &str, document: &DocumentId) {
        match self.format {
            OutputFormat::Human => println!("{}  {}", document, file),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"file": file, "document": document})
                );
            }
            OutputFormat::Quiet => println!("{}", document),
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// Render a server timestamp, `None` when unset
fn format_timestamp(timestamp: i64) -> Option<String> {
    if timestamp <= 0 {
        return None;
    }
    Utc.timestamp_opt(timestamp, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), None);
        assert_eq!(
            format_timestamp(1_700_000_000).as_deref(),
            Some("2023-11-14 22:13")
        );
    }
}
