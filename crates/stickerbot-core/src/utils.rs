use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::{errors::Error, Result};

/// RFC3339 timestamp in UTC (for logs/telemetry).
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

/// Cut `s` to `max_chars` characters, marking the cut with `...`.
pub fn truncate_text(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out = s.chars().take(max_chars).collect::<String>();
    out.push_str("...");
    out
}

// ============== Audit Logging ==============

const AUDIT_MAX_TEXT: usize = 500;

#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,
    pub user_id: String,
    pub chat_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<f64>,
}

impl AuditEvent {
    fn base(event: &str, user_id: &str, chat_id: &str) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: event.to_string(),
            user_id: user_id.to_string(),
            chat_id: chat_id.to_string(),
            command: None,
            content: None,
            error: None,
            retry_after: None,
        }
    }

    pub fn command(user_id: &str, chat_id: &str, command: &str, content: &str) -> Self {
        Self {
            command: Some(command.to_string()),
            content: Some(content.to_string()),
            ..Self::base("command", user_id, chat_id)
        }
    }

    pub fn rate_limit(user_id: &str, chat_id: &str, command: &str, retry_after: f64) -> Self {
        Self {
            command: Some(command.to_string()),
            retry_after: Some(retry_after),
            ..Self::base("rate_limit", user_id, chat_id)
        }
    }

    pub fn error(user_id: &str, chat_id: &str, command: &str, error: &str) -> Self {
        Self {
            command: Some(command.to_string()),
            error: Some(error.to_string()),
            ..Self::base("error", user_id, chat_id)
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        if let Some(s) = &event.content {
            event.content = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }
        if let Some(s) = &event.error {
            event.error = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if self.json {
            let line = serde_json::to_string(&event)?;
            writeln!(file, "{line}")?;
            return Ok(());
        }

        // Plain text format for readability.
        let mut out = String::new();
        out.push('\n');
        out.push_str(&"=".repeat(60));

        let value = serde_json::to_value(&event)?;
        let Some(obj) = value.as_object() else {
            return Err(Error::External(
                "audit event is not a JSON object".to_string(),
            ));
        };
        for (k, v) in obj {
            out.push('\n');
            out.push_str(k);
            out.push_str(": ");
            match v {
                serde_json::Value::String(s) => out.push_str(s),
                other => out.push_str(&other.to_string()),
            }
        }
        out.push('\n');

        file.write_all(out.as_bytes())?;
        Ok(())
    }

    /// Audit failures are logged and otherwise ignored.
    pub fn record(&self, event: AuditEvent) {
        if let Err(e) = self.write(event) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to write audit event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_file(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let pid = std::process::id();
        std::env::temp_dir().join(format!("{prefix}-{pid}-{ts}.log"))
    }

    #[test]
    fn truncate_text_adds_ellipsis() {
        let s = "a".repeat(AUDIT_MAX_TEXT + 10);
        let t = truncate_text(&s, AUDIT_MAX_TEXT);
        assert!(t.ends_with("..."));
        assert_eq!(t.chars().count(), AUDIT_MAX_TEXT + 3);
    }

    #[test]
    fn truncate_text_counts_characters_not_bytes() {
        assert_eq!(truncate_text("ééé", 4), "ééé");
        assert_eq!(truncate_text("ééé", 3), "ééé");
        assert_eq!(truncate_text("éééé", 3), "ééé...");
    }

    #[test]
    fn audit_json_lines_are_truncated() {
        let log = AuditLogger::new(tmp_file("stickerbot-audit-json"), true);
        let content = "x".repeat(AUDIT_MAX_TEXT + 1);
        log.write(AuditEvent::command("u1", "c1", "sticker", &content))
            .unwrap();
        log.write(AuditEvent::rate_limit("u1", "c1", "sticker", 12.5))
            .unwrap();

        let written = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "command");
        assert!(first["content"].as_str().unwrap().ends_with("..."));
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["retry_after"], 12.5);
        assert!(second.get("content").is_none());
    }

    #[test]
    fn audit_plain_text_lists_fields() {
        let log = AuditLogger::new(tmp_file("stickerbot-audit-plain"), false);
        log.write(AuditEvent::error("u1", "c1", "ocr", "boom")).unwrap();
        let written = std::fs::read_to_string(log.path()).unwrap();
        assert!(written.contains("event: error"));
        assert!(written.contains("error: boom"));
    }
}
