//! Configuration types for avsync-batch
//!
//! The configuration is a YAML document with three required sections
//! (`api_config`, `paths`, `file_settings`) and an optional `batch` section:
//!
//! ```yaml
//! api_config:
//!   endpoint: "http://127.0.0.1:7860/"
//!   api_name: "/predict"
//! paths:
//!   input_video_dir: "input/video"
//!   input_audio_dir: "input/audio"
//!   output_dir: "output"
//!   log_dir: "logs"
//! file_settings:
//!   allowed_video_types: [".mp4", ".mov"]
//!   allowed_audio_types: [".wav", ".mp3"]
//!   max_file_size: 500   # MiB
//! ```

use crate::error::{Error, Result};
use crate::types::{FilePolicy, MediaKind, ProcessingRequest};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bytes per MiB, the unit of `file_settings.max_file_size`
const BYTES_PER_MIB: u64 = 1024 * 1024;

/// Remote inference service settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the service (e.g. "http://127.0.0.1:7860/")
    pub endpoint: String,

    /// Name of the endpoint to invoke (e.g. "/predict")
    pub api_name: String,

    /// Path prefix the service mounts its HTTP API under (default: "/gradio_api")
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Overall timeout for one remote call, in seconds (default: 1800)
    #[serde(default = "default_api_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Download files referenced by the response into `paths.temp_dir` (default: true)
    ///
    /// When the service runs on another host the paths it reports are not
    /// reachable locally; downloading them makes the artifact resolvable.
    #[serde(default = "default_true")]
    pub download_outputs: bool,
}

/// Directory layout
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory scanned for input videos
    pub input_video_dir: PathBuf,

    /// Directory scanned for input audio tracks
    pub input_audio_dir: PathBuf,

    /// Directory generated videos are placed into
    pub output_dir: PathBuf,

    /// Directory for the activity log and run reports
    pub log_dir: PathBuf,

    /// Transient workspace for downloaded service outputs (default: "temp")
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
}

/// Input file policy as written in the config file
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileSettings {
    /// Allowed video extensions, with or without the leading dot
    pub allowed_video_types: Vec<String>,

    /// Allowed audio extensions, with or without the leading dot
    pub allowed_audio_types: Vec<String>,

    /// Maximum input file size in MiB
    pub max_file_size: u64,
}

/// One explicitly configured video/audio pair
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairConfig {
    /// Video file path
    pub video: PathBuf,
    /// Audio file path
    pub audio: PathBuf,
}

/// Batch behaviour
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Explicit pairs to process; when empty the cross-product of the input
    /// directories is used
    #[serde(default)]
    pub pairs: Vec<PairConfig>,

    /// Prefix of generated output file names (default: "output")
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,

    /// Mapping keys probed, in priority order, when searching a response for
    /// the output path (default: ["video", "path", "output", "result"])
    #[serde(default = "default_locator_keys")]
    pub locator_keys: Vec<String>,

    /// File name of the activity log inside `paths.log_dir` (default: "processing.log")
    #[serde(default = "default_activity_log_name")]
    pub activity_log_name: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            pairs: Vec::new(),
            output_prefix: default_output_prefix(),
            locator_keys: default_locator_keys(),
            activity_log_name: default_activity_log_name(),
        }
    }
}

/// Main configuration, read once at startup
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Remote service settings
    pub api_config: ApiConfig,

    /// Directory layout
    pub paths: PathsConfig,

    /// Input file policy
    pub file_settings: FileSettings,

    /// Batch behaviour
    #[serde(default)]
    pub batch: BatchConfig,
}

impl Config {
    /// Load and validate a YAML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {}", path.display(), e),
            key: None,
        })?;
        Self::from_yaml(&text)
    }

    /// Parse and validate a YAML configuration document
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api_config.endpoint).map_err(|e| {
            Error::config(
                "api_config.endpoint",
                format!("{:?} is not a valid URL: {}", self.api_config.endpoint, e),
            )
        })?;

        if self.api_config.api_name.trim_matches('/').is_empty() {
            return Err(Error::config("api_config.api_name", "must not be empty"));
        }

        if normalize_extensions(&self.file_settings.allowed_video_types).is_empty() {
            return Err(Error::config(
                "file_settings.allowed_video_types",
                "at least one video extension is required",
            ));
        }

        if normalize_extensions(&self.file_settings.allowed_audio_types).is_empty() {
            return Err(Error::config(
                "file_settings.allowed_audio_types",
                "at least one audio extension is required",
            ));
        }

        if self.file_settings.max_file_size == 0 {
            return Err(Error::config(
                "file_settings.max_file_size",
                "must be greater than zero",
            ));
        }

        if self.batch.locator_keys.is_empty() {
            return Err(Error::config(
                "batch.locator_keys",
                "at least one locator key is required",
            ));
        }

        if self.batch.output_prefix.contains(['/', '\\']) {
            return Err(Error::config(
                "batch.output_prefix",
                "must be a plain file name prefix",
            ));
        }

        Ok(())
    }

    /// Size ceiling in bytes
    pub fn max_size_bytes(&self) -> u64 {
        self.file_settings.max_file_size.saturating_mul(BYTES_PER_MIB)
    }

    /// Input policy for the given media kind
    pub fn policy(&self, kind: MediaKind) -> FilePolicy {
        let extensions = match kind {
            MediaKind::Video => &self.file_settings.allowed_video_types,
            MediaKind::Audio => &self.file_settings.allowed_audio_types,
        };
        FilePolicy {
            allowed_extensions: normalize_extensions(extensions),
            max_size_bytes: self.max_size_bytes(),
        }
    }

    /// Explicitly configured pairs as requests
    pub fn configured_pairs(&self) -> Vec<ProcessingRequest> {
        self.batch
            .pairs
            .iter()
            .map(|p| ProcessingRequest::new(&p.video, &p.audio))
            .collect()
    }

    /// Path of the activity log file
    pub fn activity_log_path(&self) -> PathBuf {
        self.paths.log_dir.join(&self.batch.activity_log_name)
    }

    /// Directories that must exist before a batch runs
    pub fn working_dirs(&self) -> [&Path; 5] {
        [
            &self.paths.input_video_dir,
            &self.paths.input_audio_dir,
            &self.paths.output_dir,
            &self.paths.log_dir,
            &self.paths.temp_dir,
        ]
    }
}

/// Lowercase and strip the leading dot; blank entries are dropped
pub fn normalize_extensions<S: AsRef<str>>(extensions: &[S]) -> std::collections::BTreeSet<String> {
    extensions
        .iter()
        .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

// Default value functions
fn default_api_prefix() -> String {
    "/gradio_api".to_string()
}

fn default_api_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_true() -> bool {
    true
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("temp")
}

fn default_output_prefix() -> String {
    "output".to_string()
}

fn default_locator_keys() -> Vec<String> {
    vec![
        "video".into(),
        "path".into(),
        "output".into(),
        "result".into(),
    ]
}

fn default_activity_log_name() -> String {
    "processing.log".to_string()
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
