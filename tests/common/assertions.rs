//! Custom assertions for batch reports and events

use avsync_batch::{BatchEntry, BatchReport, ErrorKind, Event, Stage};
use tokio::sync::broadcast;

/// Drain every event already sent on `events`
pub fn drain_events(events: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

/// Assert `entry` failed at `stage` with `kind`
pub fn assert_failed(entry: &BatchEntry, stage: Stage, kind: ErrorKind) {
    assert!(!entry.is_success(), "entry {} unexpectedly succeeded", entry.index);
    assert_eq!(entry.failed_stage, Some(stage), "entry {} stage", entry.index);
    assert_eq!(entry.error_kind, Some(kind), "entry {} kind", entry.index);
    assert!(entry.error.is_some(), "entry {} has no error text", entry.index);
}

/// Assert `entry` succeeded and its output exists
pub fn assert_placed(entry: &BatchEntry) {
    assert!(
        entry.is_success(),
        "entry {} failed: {:?}",
        entry.index,
        entry.error
    );
    let record = entry.result.as_ref().expect("successful entry has a placement");
    assert!(
        record.final_path.is_file(),
        "{} was not placed",
        record.final_path.display()
    );
}

/// Assert the run log on disk matches `report`
pub fn assert_run_log_matches(report: &BatchReport) {
    let path = report.run_log_path.as_ref().expect("run log path is set");
    let text = std::fs::read_to_string(path).expect("read run log");
    let persisted: BatchReport = serde_json::from_str(&text).expect("run log parses");
    assert_eq!(persisted.run_id, report.run_id);
    assert_eq!(persisted.total, report.total);
    assert_eq!(persisted.succeeded, report.succeeded);
    assert_eq!(persisted.failed, report.failed);
}
