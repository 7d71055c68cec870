//! Summary extraction from worker logs
//!
//! The worker echoes each turn's prompt as a line starting with `> `,
//! possibly behind terminal color codes. The summary is everything from the
//! last such line to the end of the log, with escape sequences removed.

use regex::Regex;
use std::sync::OnceLock;

/// Leading CSI sequences followed by `>` and whitespace
const PROMPT_MARKER_PATTERN: &str = r"^(?:\x1b\[[0-9;?]*[A-Za-z])*>\s";

fn prompt_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(PROMPT_MARKER_PATTERN).expect("prompt marker pattern is valid"))
}

/// Whether a log line is a prompt echo
pub fn is_prompt_marker(line: &str) -> bool {
    prompt_marker().is_match(line)
}

/// Last-response heuristic over the full log content
pub fn extract_summary(log: &str) -> String {
    let lines: Vec<&str> = log.split('\n').collect();

    let tail = match lines.iter().rposition(|line| is_prompt_marker(line)) {
        Some(idx) => lines[idx..].join("\n"),
        None => log.to_string(),
    };

    strip_ansi_escapes::strip_str(&tail).trim().to_string()
}

/// One-line description of a just-started task, e.g. `"analyze code started"`
pub fn started_summary(question: &str, max_chars: usize) -> String {
    if question.chars().count() <= max_chars {
        return format!("{} started", question);
    }
    let preview: String = question.chars().take(max_chars).collect();
    format!("{}... started", preview)
}
