//! Core types for avsync-batch

use crate::error::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Which side of a pair a file belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Input video
    Video,
    /// Input audio track
    Audio,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Video => f.write_str("video"),
            MediaKind::Audio => f.write_str("audio"),
        }
    }
}

/// One video/audio pair to submit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingRequest {
    /// Input video
    pub video_path: PathBuf,
    /// Input audio track
    pub audio_path: PathBuf,
}

impl ProcessingRequest {
    /// Create a request from two paths
    pub fn new(video_path: impl AsRef<Path>, audio_path: impl AsRef<Path>) -> Self {
        Self {
            video_path: video_path.as_ref().to_path_buf(),
            audio_path: audio_path.as_ref().to_path_buf(),
        }
    }
}

/// Constraints on acceptable input files of one media kind
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilePolicy {
    /// Lowercased extensions without the leading dot
    pub allowed_extensions: BTreeSet<String>,
    /// Size ceiling in bytes (inclusive)
    pub max_size_bytes: u64,
}

impl FilePolicy {
    /// Whether `path` carries one of the allowed extensions (case-insensitive)
    pub fn allows_extension(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.allowed_extensions.contains(&ext))
    }
}

/// Lowercased extension of `path`, if any
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Untyped response of the inference service
///
/// Built from the deserialized JSON at the client boundary, so downstream code
/// matches on an explicit shape instead of probing value types.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "value", rename_all = "snake_case")]
pub enum RawResponse {
    /// Positional, tuple-like response
    Sequence(Vec<Value>),
    /// Keyed response
    Mapping(Map<String, Value>),
    /// Anything else (string, number, bool, null)
    Scalar(Value),
}

impl From<Value> for RawResponse {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => RawResponse::Sequence(items),
            Value::Object(map) => RawResponse::Mapping(map),
            other => RawResponse::Scalar(other),
        }
    }
}

impl RawResponse {
    /// Short name of the shape, for diagnostics
    pub fn shape_name(&self) -> String {
        match self {
            RawResponse::Sequence(items) => format!("sequence of {}", items.len()),
            RawResponse::Mapping(_) => "mapping".to_string(),
            RawResponse::Scalar(Value::String(_)) => "string".to_string(),
            RawResponse::Scalar(Value::Number(_)) => "number".to_string(),
            RawResponse::Scalar(Value::Bool(_)) => "bool".to_string(),
            RawResponse::Scalar(_) => "null".to_string(),
        }
    }

    /// Back to plain JSON
    pub fn to_value(&self) -> Value {
        match self {
            RawResponse::Sequence(items) => Value::Array(items.clone()),
            RawResponse::Mapping(map) => Value::Object(map.clone()),
            RawResponse::Scalar(value) => value.clone(),
        }
    }
}

/// Canonical form of a response
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedResult {
    /// Value expected to contain the output path
    pub artifact_locator: Option<Value>,
    /// Processing time reported by the service
    pub processing_time: Option<String>,
    /// Original response, kept for diagnostics
    pub raw: RawResponse,
}

/// An output file produced by the service, verified to exist
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedArtifact {
    /// Where the service left the file
    pub source_path: PathBuf,
}

/// Where a generated file was placed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRecord {
    /// Final location in the output directory
    pub final_path: PathBuf,
    /// Second-resolution timestamp used in the file name
    pub timestamp: String,
    /// Per-run sequence number used in the file name
    pub sequence: u64,
}

/// Processing stage of a batch item
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Not started
    Pending,
    /// Checking input files against the policy
    Validating,
    /// Waiting on the inference service
    Calling,
    /// Converting the response to canonical form
    Normalizing,
    /// Searching the response for the output path
    Resolving,
    /// Moving the output into place
    Placing,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Pending => "pending",
            Stage::Validating => "validating",
            Stage::Calling => "calling",
            Stage::Normalizing => "normalizing",
            Stage::Resolving => "resolving",
            Stage::Placing => "placing",
        };
        f.write_str(name)
    }
}

/// Final status of a batch item
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Output placed
    Success,
    /// Failed at some stage
    Failure,
}

/// One row of the run log
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchEntry {
    /// Zero-based position in the batch
    pub index: usize,
    /// The pair that was processed
    pub request: ProcessingRequest,
    /// Outcome
    pub status: EntryStatus,
    /// Placement, on success
    pub result: Option<PlacementRecord>,
    /// Verbatim error text, on failure
    pub error: Option<String>,
    /// Error classification, on failure
    pub error_kind: Option<ErrorKind>,
    /// Stage the failure happened in
    pub failed_stage: Option<Stage>,
    /// Processing time reported by the service, if any
    pub processing_time: Option<String>,
    /// When processing of this item started
    pub started_at: DateTime<Utc>,
    /// When processing of this item finished
    pub finished_at: DateTime<Utc>,
}

impl BatchEntry {
    /// Whether the item succeeded
    pub fn is_success(&self) -> bool {
        self.status == EntryStatus::Success
    }
}

/// Persisted record of one batch run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchReport {
    /// Run identifier (start timestamp)
    pub run_id: String,
    /// When the batch started
    pub started_at: DateTime<Utc>,
    /// When the batch finished
    pub finished_at: DateTime<Utc>,
    /// Number of entries
    pub total: usize,
    /// Entries that succeeded
    pub succeeded: usize,
    /// Entries that failed
    pub failed: usize,
    /// Entries in processing order
    pub entries: Vec<BatchEntry>,
    /// Where the report was written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_log_path: Option<PathBuf>,
}

impl BatchReport {
    /// Assemble a report from finished entries
    pub fn new(
        run_id: String,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        entries: Vec<BatchEntry>,
    ) -> Self {
        let succeeded = entries.iter().filter(|e| e.is_success()).count();
        Self {
            run_id,
            started_at,
            finished_at,
            total: entries.len(),
            succeeded,
            failed: entries.len() - succeeded,
            entries,
            run_log_path: None,
        }
    }
}

/// Event emitted during a batch run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Batch started
    BatchStarted {
        /// Run identifier
        run_id: String,
        /// Number of requests
        total: usize,
    },

    /// Item processing started
    ItemStarted {
        /// Item index
        index: usize,
        /// The pair being processed
        request: ProcessingRequest,
    },

    /// Item moved to a new stage
    StageChanged {
        /// Item index
        index: usize,
        /// New stage
        stage: Stage,
    },

    /// Item finished successfully
    ItemSucceeded {
        /// Item index
        index: usize,
        /// Where the output was placed
        final_path: PathBuf,
        /// Processing time reported by the service
        #[serde(skip_serializing_if = "Option::is_none")]
        processing_time: Option<String>,
    },

    /// Item failed
    ItemFailed {
        /// Item index
        index: usize,
        /// Stage the failure happened in
        stage: Stage,
        /// Error classification
        kind: ErrorKind,
        /// Error text
        error: String,
    },

    /// Batch finished and the run log was written
    BatchComplete {
        /// Run identifier
        run_id: String,
        /// Entries that succeeded
        succeeded: usize,
        /// Entries that failed
        failed: usize,
    },
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn raw_response_is_tagged_by_json_shape() {
        assert!(matches!(
            RawResponse::from(json!(["a.mp4", "1s"])),
            RawResponse::Sequence(items) if items.len() == 2
        ));
        assert!(matches!(
            RawResponse::from(json!({"video": "a.mp4"})),
            RawResponse::Mapping(_)
        ));
        assert!(matches!(
            RawResponse::from(json!("a.mp4")),
            RawResponse::Scalar(Value::String(_))
        ));
        assert!(matches!(
            RawResponse::from(Value::Null),
            RawResponse::Scalar(Value::Null)
        ));
    }

    #[test]
    fn raw_response_shape_names() {
        assert_eq!(RawResponse::from(json!([1, 2, 3])).shape_name(), "sequence of 3");
        assert_eq!(RawResponse::from(json!({})).shape_name(), "mapping");
        assert_eq!(RawResponse::from(json!("x")).shape_name(), "string");
        assert_eq!(RawResponse::from(json!(4)).shape_name(), "number");
    }

    #[test]
    fn policy_extension_check_ignores_case() {
        let policy = FilePolicy {
            allowed_extensions: ["mp4".to_string()].into_iter().collect(),
            max_size_bytes: 10,
        };
        assert!(policy.allows_extension(Path::new("/a/b/Clip.MP4")));
        assert!(!policy.allows_extension(Path::new("/a/b/clip.mkv")));
        assert!(!policy.allows_extension(Path::new("/a/b/mp4")));
    }

    #[test]
    fn report_counts_outcomes() {
        let now = Utc::now();
        let entry = |index, status| BatchEntry {
            index,
            request: ProcessingRequest::new("v.mp4", "a.wav"),
            status,
            result: None,
            error: None,
            error_kind: None,
            failed_stage: None,
            processing_time: None,
            started_at: now,
            finished_at: now,
        };
        let report = BatchReport::new(
            "run".into(),
            now,
            now,
            vec![
                entry(0, EntryStatus::Success),
                entry(1, EntryStatus::Failure),
                entry(2, EntryStatus::Success),
            ],
        );
        assert_eq!(report.total, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = Event::StageChanged {
            index: 3,
            stage: Stage::Calling,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "stage_changed");
        assert_eq!(value["stage"], "calling");
    }
}
