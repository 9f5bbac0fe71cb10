//! One parametrized scrape step for every logical task list.

use crate::error::{Result, SyncError};
use crate::models::{RawObservedTask, TaskSource};
use crate::title_codec;
use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const DEFAULT_APP_URL: &str = "https://to-do.office.com/tasks/inbox";
const FLAGGED_WAIT_TIMEOUT_MS: u64 = 15_000;
const ROW_WAIT_TIMEOUT_MS: u64 = 10_000;

/// Where a list lives in the web UI and which source tag its tasks get.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListSelector {
    pub name: String,
    /// Navigate here before reading rows.
    pub url: Option<String>,
    /// Or click this element.
    pub click_selector: Option<String>,
    /// Text that must be visible after the click.
    pub wait_for_text: Option<String>,
    pub wait_timeout_ms: u64,
    pub source: TaskSource,
}

pub fn default_selectors(app_url: &str) -> Vec<ListSelector> {
    vec![
        ListSelector {
            name: "Tasks".to_string(),
            url: Some(app_url.to_string()),
            click_selector: None,
            wait_for_text: None,
            wait_timeout_ms: ROW_WAIT_TIMEOUT_MS,
            source: TaskSource::None,
        },
        ListSelector {
            name: "Flagged email".to_string(),
            url: None,
            click_selector: Some("#flagged".to_string()),
            wait_for_text: Some("Flagged email".to_string()),
            wait_timeout_ms: FLAGGED_WAIT_TIMEOUT_MS,
            source: TaskSource::FlaggedEmail,
        },
        ListSelector {
            name: "Assigned to me".to_string(),
            url: None,
            click_selector: Some("#assigned_to_me".to_string()),
            wait_for_text: Some("Assigned to me".to_string()),
            wait_timeout_ms: FLAGGED_WAIT_TIMEOUT_MS,
            source: TaskSource::AssignedToMe,
        },
    ]
}

/// Browser-side collaborator that reads the rows of one list.
pub trait ListScraper {
    fn scrape_list(&mut self, selector: &ListSelector) -> Result<Vec<RawObservedTask>>;
}

#[derive(Deserialize)]
struct CaptureFile {
    lists: HashMap<String, Vec<CapturedRow>>,
}

#[derive(Deserialize)]
struct CapturedRow {
    title: String,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    important: bool,
}

/// Serves rows from a JSON capture of the web UI, keyed by list name.
///
/// A list absent from the capture behaves like a list that timed out.
pub struct CaptureFileScraper {
    lists: HashMap<String, Vec<CapturedRow>>,
}

impl CaptureFileScraper {
    pub fn open(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let capture: CaptureFile = serde_json::from_str(content).map_err(|e| SyncError::Scrape {
            list: "*".to_string(),
            message: format!("invalid capture file: {e}"),
        })?;
        Ok(Self {
            lists: capture.lists,
        })
    }
}

impl ListScraper for CaptureFileScraper {
    fn scrape_list(&mut self, selector: &ListSelector) -> Result<Vec<RawObservedTask>> {
        let rows = self.lists.get(&selector.name).ok_or_else(|| SyncError::Scrape {
            list: selector.name.clone(),
            message: format!("no rows within {}ms", selector.wait_timeout_ms),
        })?;

        Ok(rows
            .iter()
            .map(|row| RawObservedTask {
                base_title: row.title.trim().to_string(),
                // Unparseable due text is dropped rather than failing the row.
                due_date: row
                    .due_date
                    .as_deref()
                    .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok()),
                important: row.important,
                source: selector.source,
            })
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct ScrapeOutcome {
    pub lines: Vec<String>,
    /// Lists that failed or timed out and were skipped.
    pub failed_lists: Vec<String>,
}

/// Scrapes every list in order and encodes the results.
///
/// A failing list is skipped; tasks are tagged with the selector's source.
pub fn scrape_lists<S: ListScraper + ?Sized>(
    scraper: &mut S,
    selectors: &[ListSelector],
) -> ScrapeOutcome {
    let mut outcome = ScrapeOutcome::default();

    for selector in selectors {
        let tasks = match scraper.scrape_list(selector) {
            Ok(tasks) => tasks,
            Err(err) => {
                warn!(
                    "event=scrape_list status=error list={:?} error={}",
                    selector.name, err
                );
                outcome.failed_lists.push(selector.name.clone());
                continue;
            }
        };

        let mut found = 0usize;
        for mut task in tasks {
            if task.base_title.trim().is_empty() {
                debug!("event=scrape_row status=skip list={:?} reason=blank", selector.name);
                continue;
            }
            task.source = selector.source;
            match title_codec::encode(&task) {
                Ok(line) => {
                    outcome.lines.push(line);
                    found += 1;
                }
                Err(err) => warn!(
                    "event=scrape_row status=skip list={:?} error={}",
                    selector.name, err
                ),
            }
        }
        info!("event=scrape_list status=ok list={:?} found={found}", selector.name);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeScraper {
        rows: HashMap<String, Vec<RawObservedTask>>,
        visited: Vec<String>,
    }

    impl ListScraper for FakeScraper {
        fn scrape_list(&mut self, selector: &ListSelector) -> Result<Vec<RawObservedTask>> {
            self.visited.push(selector.name.clone());
            self.rows
                .get(&selector.name)
                .cloned()
                .ok_or_else(|| SyncError::Scrape {
                    list: selector.name.clone(),
                    message: "timed out waiting for rows".to_string(),
                })
        }
    }

    #[test]
    fn default_selectors_cover_three_lists() {
        let selectors = default_selectors(DEFAULT_APP_URL);
        let sources: Vec<TaskSource> = selectors.iter().map(|s| s.source).collect();
        assert_eq!(sources, TaskSource::all());
        assert_eq!(selectors[0].url.as_deref(), Some(DEFAULT_APP_URL));
        assert_eq!(selectors[1].click_selector.as_deref(), Some("#flagged"));
    }

    #[test]
    fn tags_source_by_selector_and_encodes() {
        let mut scraper = FakeScraper::default();
        scraper.rows.insert(
            "Tasks".to_string(),
            vec![RawObservedTask::new("Buy milk")
                .due(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap())
                .important()],
        );
        scraper.rows.insert(
            "Flagged email".to_string(),
            vec![
                RawObservedTask::new("Reply to client"),
                RawObservedTask::new("   "),
            ],
        );
        scraper.rows.insert(
            "Assigned to me".to_string(),
            // Source from the row itself is ignored.
            vec![RawObservedTask::new("Review").from_source(TaskSource::FlaggedEmail)],
        );

        let outcome = scrape_lists(&mut scraper, &default_selectors(DEFAULT_APP_URL));
        assert_eq!(
            outcome.lines,
            vec![
                "Buy milk [Due: 05/03/2024] [Important]".to_string(),
                "Flagged: Reply to client".to_string(),
                "Assigned: Review".to_string(),
            ]
        );
        assert!(outcome.failed_lists.is_empty());
    }

    #[test]
    fn failing_list_is_skipped() {
        let mut scraper = FakeScraper::default();
        scraper
            .rows
            .insert("Tasks".to_string(), vec![RawObservedTask::new("Buy milk")]);
        scraper
            .rows
            .insert("Assigned to me".to_string(), vec![RawObservedTask::new("Review")]);

        let outcome = scrape_lists(&mut scraper, &default_selectors(DEFAULT_APP_URL));
        assert_eq!(outcome.lines.len(), 2);
        assert_eq!(outcome.failed_lists, vec!["Flagged email".to_string()]);
        assert_eq!(scraper.visited.len(), 3);
    }

    #[test]
    fn capture_file_feeds_the_pipeline() {
        let json = r#"{
            "lists": {
                "Tasks": [
                    {"title": " Buy milk ", "due_date": "2024-03-05", "important": true},
                    {"title": "Someday", "due_date": "next week"}
                ],
                "Assigned to me": [{"title": "Review"}]
            }
        }"#;
        let mut scraper = CaptureFileScraper::from_json(json).unwrap();
        let outcome = scrape_lists(&mut scraper, &default_selectors(DEFAULT_APP_URL));
        assert_eq!(
            outcome.lines,
            vec![
                "Buy milk [Due: 05/03/2024] [Important]".to_string(),
                "Someday".to_string(),
                "Assigned: Review".to_string(),
            ]
        );
        assert_eq!(outcome.failed_lists, vec!["Flagged email".to_string()]);
    }

    #[test]
    fn invalid_capture_is_rejected() {
        assert!(matches!(
            CaptureFileScraper::from_json("{not json"),
            Err(SyncError::Scrape { .. })
        ));
    }
}
