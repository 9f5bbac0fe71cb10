//! Single-line codec for scraped task titles.
//!
//! A scraped task is written as `[Prefix: ]<title>[ [Due: DD/MM/YYYY]][ [Important]]`.
//! `decode` is the inverse of `encode` for well-formed lines and never fails:
//! annotations it cannot recognise stay in the title text.

use crate::error::{Result, SyncError};
use crate::models::{RawObservedTask, TaskSource};
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

const DUE_FORMAT: &str = "%d/%m/%Y";
const IMPORTANT_TOKEN: &str = "Important";
const MAX_DUE_YEAR: i32 = 9999;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AnnotationKind {
    Due(NaiveDate),
    Important,
}

#[derive(Clone, Debug)]
struct AnnotationMatch {
    kind: AnnotationKind,
    range: Range<usize>,
}

fn due_regex() -> &'static Regex {
    static DUE_REGEX: OnceLock<Regex> = OnceLock::new();
    DUE_REGEX.get_or_init(|| {
        Regex::new(r"^Due: (\d{2}/\d{2}/\d{4})$").expect("valid due annotation pattern")
    })
}

/// Encodes one task as a single line.
///
/// The base title is trimmed first, so `decode(encode(t))` returns the trimmed
/// title. Blank or multi-line titles and due years outside `0..=9999` (which
/// cannot be written as four digits) are rejected.
pub fn encode(task: &RawObservedTask) -> Result<String> {
    let base = task.base_title.trim();
    if base.is_empty() {
        return Err(SyncError::InvalidInput(
            "task title must not be blank".to_string(),
        ));
    }
    if base.contains(['\n', '\r']) {
        return Err(SyncError::InvalidInput(format!(
            "task title must be a single line: {base:?}"
        )));
    }

    if let Some(due) = task.due_date
        && !(0..=MAX_DUE_YEAR).contains(&due.year())
    {
        return Err(SyncError::InvalidInput(format!(
            "due date {due} has a year outside 0..={MAX_DUE_YEAR}"
        )));
    }

    let mut line = String::with_capacity(base.len() + 32);
    if let Some(prefix) = task.source.prefix() {
        line.push_str(prefix);
    }
    line.push_str(base);
    if let Some(due) = task.due_date {
        line.push_str(" [Due: ");
        line.push_str(&due.format(DUE_FORMAT).to_string());
        line.push(']');
    }
    if task.important {
        line.push_str(" [Important]");
    }
    Ok(line)
}

pub fn decode(line: &str) -> RawObservedTask {
    let annotations = scan_annotations(line);

    let mut task = RawObservedTask::default();
    let mut valid = Vec::new();
    for annotation in annotations {
        match annotation.kind {
            AnnotationKind::Due(date) => {
                // Only the first due annotation counts; later ones stay in the title.
                if task.due_date.is_some() {
                    continue;
                }
                task.due_date = Some(date);
            }
            AnnotationKind::Important => task.important = true,
        }
        valid.push(annotation);
    }

    let remainder = strip_annotations(line, &valid);
    let (source, title) = split_source_prefix(&remainder);
    task.source = source;
    task.base_title = title.trim().to_string();
    task
}

/// The title used to match against remote task content.
pub fn cleaned_title(line: &str) -> String {
    decode(line).base_title
}

fn split_source_prefix(text: &str) -> (TaskSource, &str) {
    let trimmed = text.trim_start();
    for source in TaskSource::all() {
        let Some(prefix) = source.prefix() else {
            continue;
        };
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            return (source, rest);
        }
    }
    (TaskSource::None, trimmed)
}

fn scan_annotations(text: &str) -> Vec<AnnotationMatch> {
    let bytes = text.as_bytes();
    let mut matches = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        if bytes[i] != b'[' {
            i += 1;
            continue;
        }

        let start = i;
        let Some(close) = text[start + 1..].find(']') else {
            break;
        };
        let inner_start = start + 1;
        let inner_end = inner_start + close;
        let inner = &text[inner_start..inner_end];

        // A nested '[' restarts the scan at the inner bracket.
        if let Some(nested) = inner.rfind('[') {
            i = inner_start + nested;
            continue;
        }

        let end = inner_end + 1;
        if let Some(kind) = classify(inner) {
            matches.push(AnnotationMatch {
                kind,
                range: start..end,
            });
        }
        i = end;
    }

    matches
}

fn classify(inner: &str) -> Option<AnnotationKind> {
    if inner == IMPORTANT_TOKEN {
        return Some(AnnotationKind::Important);
    }
    let captures = due_regex().captures(inner)?;
    let date = NaiveDate::parse_from_str(&captures[1], DUE_FORMAT).ok()?;
    Some(AnnotationKind::Due(date))
}

fn strip_annotations(text: &str, annotations: &[AnnotationMatch]) -> String {
    if annotations.is_empty() {
        return text.to_string();
    }

    let bytes = text.as_bytes();
    let mut cleaned = String::with_capacity(text.len());
    let mut last = 0usize;
    for annotation in annotations {
        let mut start = annotation.range.start;
        // Swallow the single separator space the encoder writes before an annotation.
        if start > last && bytes[start - 1] == b' ' {
            start -= 1;
        }
        if start > last {
            cleaned.push_str(&text[last..start]);
        }
        last = annotation.range.end;
    }
    if last < text.len() {
        cleaned.push_str(&text[last..]);
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn encodes_due_and_importance_in_fixed_order() {
        let task = RawObservedTask::new("Buy milk")
            .due(date(2024, 3, 5))
            .important();
        assert_eq!(
            encode(&task).unwrap(),
            "Buy milk [Due: 05/03/2024] [Important]"
        );
    }

    #[test]
    fn encodes_source_prefix_first() {
        let task = RawObservedTask::new("Review PR")
            .important()
            .from_source(TaskSource::AssignedToMe);
        assert_eq!(encode(&task).unwrap(), "Assigned: Review PR [Important]");
    }

    #[test]
    fn encode_rejects_blank_title() {
        let err = encode(&RawObservedTask::new("   ")).unwrap_err();
        assert!(matches!(err, SyncError::InvalidInput(_)));
    }

    #[test]
    fn encode_rejects_multiline_title() {
        let err = encode(&RawObservedTask::new("first\nsecond")).unwrap_err();
        assert!(matches!(err, SyncError::InvalidInput(_)));
    }

    #[test]
    fn encode_rejects_due_year_beyond_four_digits() {
        let far = RawObservedTask::new("x").due(date(10000, 1, 1));
        assert!(matches!(encode(&far), Err(SyncError::InvalidInput(_))));

        let last = RawObservedTask::new("x").due(date(9999, 12, 31));
        let line = encode(&last).unwrap();
        assert_eq!(line, "x [Due: 31/12/9999]");
        assert_eq!(decode(&line), last);
    }

    #[test]
    fn encode_trims_base_title() {
        let line = encode(&RawObservedTask::new("  Buy milk \t")).unwrap();
        assert_eq!(line, "Buy milk");
        assert_eq!(decode(&line), RawObservedTask::new("Buy milk"));
    }

    #[test]
    fn decodes_flagged_line_with_due_date() {
        let task = decode("Flagged: Reply to client [Due: 12/01/2025]");
        assert_eq!(task.source, TaskSource::FlaggedEmail);
        assert_eq!(task.due_date, Some(date(2025, 1, 12)));
        assert!(!task.important);
        assert_eq!(task.base_title, "Reply to client");
    }

    #[test]
    fn decode_is_order_independent() {
        let task = decode("[Important] Assigned: Ship it [Due: 01/02/2026]");
        assert_eq!(task.source, TaskSource::AssignedToMe);
        assert!(task.important);
        assert_eq!(task.due_date, Some(date(2026, 2, 1)));
        assert_eq!(task.base_title, "Ship it");

        let task = decode("Plan [Important] offsite [Due: 01/02/2026]");
        assert_eq!(task.base_title, "Plan offsite");
        assert!(task.important);
    }

    #[test]
    fn malformed_due_date_stays_in_title() {
        let task = decode("Weird [Due: 99/99/9999] title");
        assert_eq!(task.due_date, None);
        assert_eq!(task.base_title, "Weird [Due: 99/99/9999] title");
    }

    #[test]
    fn partial_annotations_are_left_alone() {
        let task = decode("Call Bob [Due: 5/3/2024] [important] [Important");
        assert_eq!(task.due_date, None);
        assert!(!task.important);
        assert_eq!(task.base_title, "Call Bob [Due: 5/3/2024] [important] [Important");
    }

    #[test]
    fn iso_date_is_available_for_downstream() {
        let task = decode("Pay rent [Due: 28/02/2025]");
        let iso = task.due_date.map(|d| d.format("%Y-%m-%d").to_string());
        assert_eq!(iso.as_deref(), Some("2025-02-28"));
    }

    #[test]
    fn decode_recovers_encoded_fields() {
        let cases = [
            RawObservedTask::new("Buy milk"),
            RawObservedTask::new("Reply [draft] to client")
                .due(date(2025, 12, 31))
                .from_source(TaskSource::FlaggedEmail),
            RawObservedTask::new("Quarterly report")
                .due(date(2024, 2, 29))
                .important()
                .from_source(TaskSource::AssignedToMe),
        ];
        for task in cases {
            let line = encode(&task).unwrap();
            assert_eq!(decode(&line), task, "line: {line}");
        }
    }

    #[test]
    fn cleaned_title_drops_all_annotations() {
        assert_eq!(
            cleaned_title("Flagged: Reply to client [Due: 12/01/2025] [Important]"),
            "Reply to client"
        );
    }
}
