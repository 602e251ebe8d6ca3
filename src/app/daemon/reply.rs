//! Framing for daemon replies.
//!
//! A raw reply is `noise* frame`. Noise is the `OK AURIYA IPC` greeting and any log text the
//! daemon (or `nc`) prints ahead of the payload. The frame is one of:
//!
//! - `ERR <detail>`: rejection. Any `ERR` marker anywhere in the payload counts.
//! - a JSON array or object, starting at the first `[` or `{` of the payload.
//! - `OK <VERB> [detail]`: acknowledgement.
//! - `KEY=VALUE KEY=VALUE ...`: a record, one or more lines.
//! - anything else is kept as plain text.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;

use crate::app::error::AppError;

pub const GREETING: &str = "OK AURIYA IPC";
pub const ERROR_MARKER: &str = "ERR";

#[derive(Debug, Clone, PartialEq)]
pub enum DaemonReply {
    Empty,
    Rejected(String),
    Ack { verb: String, detail: Option<String> },
    Json(serde_json::Value),
    Record(BTreeMap<String, String>),
    Text(String),
}

pub fn contains_error_marker(payload: &str) -> bool {
    payload.contains(ERROR_MARKER)
}

/// Drops greeting lines and surrounding whitespace.
pub fn strip_noise(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != GREETING)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn parse_reply(raw: &str) -> DaemonReply {
    let payload = strip_noise(raw);
    if payload.is_empty() {
        return DaemonReply::Empty;
    }

    if contains_error_marker(&payload) {
        let line = payload
            .lines()
            .find(|line| line.contains(ERROR_MARKER))
            .unwrap_or(payload.as_str());
        let detail = match line.find(ERROR_MARKER) {
            Some(index) => line[index + ERROR_MARKER.len()..].trim(),
            None => line,
        };
        return DaemonReply::Rejected(detail.to_string());
    }

    if let Some(value) = extract_json(&payload) {
        return DaemonReply::Json(value);
    }

    if payload == "OK" || payload.starts_with("OK ") {
        let mut parts = payload[2..].trim().splitn(2, char::is_whitespace);
        let verb = parts.next().unwrap_or_default().to_string();
        let detail = parts
            .next()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        return DaemonReply::Ack { verb, detail };
    }

    if let Some(record) = parse_record(&payload) {
        return DaemonReply::Record(record);
    }

    DaemonReply::Text(payload)
}

fn extract_json(payload: &str) -> Option<serde_json::Value> {
    let start = payload.find(['[', '{'])?;
    serde_json::from_str(&payload[start..]).ok()
}

fn parse_record(payload: &str) -> Option<BTreeMap<String, String>> {
    let mut record = BTreeMap::new();
    for token in payload.split_whitespace() {
        let (key, value) = token.split_once('=')?;
        if key.is_empty() {
            return None;
        }
        record.insert(key.to_string(), value.to_string());
    }
    if record.is_empty() {
        None
    } else {
        Some(record)
    }
}

impl DaemonReply {
    pub fn record_value(&self, key: &str) -> Option<&str> {
        match self {
            DaemonReply::Record(record) => record.get(key).map(String::as_str),
            _ => None,
        }
    }

    /// Decodes a JSON frame into `T`.
    pub fn decode_json<T: DeserializeOwned>(&self, trace_id: &str) -> Result<T, AppError> {
        match self {
            DaemonReply::Json(value) => serde_json::from_value(value.clone()).map_err(|err| {
                AppError::parse(format!("Unexpected daemon JSON: {err}"), trace_id)
            }),
            DaemonReply::Empty => Err(AppError::empty_result("Daemon sent an empty reply", trace_id)),
            other => Err(AppError::parse(
                format!("Expected a JSON reply, got {other:?}"),
                trace_id,
            )),
        }
    }

    /// The raw text a listing verb produced, for callers that parse line output themselves.
    pub fn text(&self) -> Option<&str> {
        match self {
            DaemonReply::Text(text) => Some(text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_greeting_before_json() {
        let raw = "OK AURIYA IPC\n[{\"package\":\"com.a\",\"cpu_governor\":\"performance\",\"enable_dnd\":true}]\n";
        match parse_reply(raw) {
            DaemonReply::Json(value) => {
                assert_eq!(value[0]["package"], "com.a");
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn locates_json_after_log_noise_on_same_line() {
        let raw = "2024-01-01 INFO rates loaded [60, 90, 120]";
        let rates: Vec<u32> = parse_reply(raw).decode_json("t").expect("rates");
        assert_eq!(rates, vec![60, 90, 120]);
    }

    #[test]
    fn error_marker_anywhere_is_a_rejection() {
        assert_eq!(
            parse_reply("OK AURIYA IPC\nERR LIST_PACKAGES \"pm failed\""),
            DaemonReply::Rejected("LIST_PACKAGES \"pm failed\"".to_string())
        );
        assert_eq!(
            parse_reply("warning: ERR unknown command"),
            DaemonReply::Rejected("unknown command".to_string())
        );
    }

    #[test]
    fn parses_acknowledgements() {
        assert_eq!(
            parse_reply("OK AURIYA IPC\nOK ADD_GAME com.a"),
            DaemonReply::Ack {
                verb: "ADD_GAME".to_string(),
                detail: Some("com.a".to_string())
            }
        );
        assert_eq!(
            parse_reply("OK SET_LOG"),
            DaemonReply::Ack {
                verb: "SET_LOG".to_string(),
                detail: None
            }
        );
    }

    #[test]
    fn parses_status_record() {
        let reply = parse_reply("ENABLED=true PACKAGES=5 OVERRIDE=None LOG_LEVEL=Info");
        assert_eq!(reply.record_value("ENABLED"), Some("true"));
        assert_eq!(reply.record_value("PACKAGES"), Some("5"));
        assert_eq!(reply.record_value("LOG_LEVEL"), Some("Info"));
        assert_eq!(parse_reply("FPS=90").record_value("FPS"), Some("90"));
    }

    #[test]
    fn keeps_package_listing_as_text() {
        let reply = parse_reply("OK AURIYA IPC\npackage:com.a\npackage:com.b\n");
        assert_eq!(reply.text(), Some("package:com.a\npackage:com.b"));
    }

    #[test]
    fn empty_after_noise_is_empty() {
        assert_eq!(parse_reply("OK AURIYA IPC\n\n"), DaemonReply::Empty);
        assert_eq!(parse_reply(""), DaemonReply::Empty);
    }

    #[test]
    fn decode_json_reports_parse_failure() {
        let err = parse_reply("not json")
            .decode_json::<Vec<u32>>("t-parse")
            .expect_err("parse failure");
        assert_eq!(err.code, "ERR_PARSE");
        assert_eq!(err.trace_id, "t-parse");
    }
}
