//! Test configuration helpers: a throwaway directory tree and a config pointing into it

use avsync_batch::Config;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary working tree with a config rooted in it
///
/// The directory is removed when this value is dropped.
pub struct TestEnv {
    /// Owns the temporary root
    pub root: TempDir,
    /// Config whose paths all live under `root`
    pub config: Config,
}

impl TestEnv {
    /// Environment with default batch settings and a 1 MiB size limit
    pub fn new() -> Self {
        Self::with_batch("")
    }

    /// Environment with extra YAML appended under `batch:`
    pub fn with_batch(batch_yaml: &str) -> Self {
        Self::with_endpoint("http://127.0.0.1:7860/", batch_yaml)
    }

    /// Environment talking to `endpoint`
    pub fn with_endpoint(endpoint: &str, batch_yaml: &str) -> Self {
        let root = TempDir::new().expect("create temp dir");
        let yaml = config_yaml(root.path(), endpoint, batch_yaml);
        let config = Config::from_yaml(&yaml).expect("test config is valid");
        Self { root, config }
    }

    /// Directory the service writes its results into
    pub fn service_dir(&self) -> PathBuf {
        let dir = self.root.path().join("service");
        std::fs::create_dir_all(&dir).expect("create service dir");
        dir
    }

    /// Files currently in the output directory, sorted by name
    pub fn output_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = match std::fs::read_dir(&self.config.paths.output_dir) {
            Ok(entries) => entries.map(|e| e.expect("dir entry").path()).collect(),
            Err(_) => Vec::new(),
        };
        files.sort();
        files
    }
}

/// YAML for a config rooted at `root`
pub fn config_yaml(root: &Path, endpoint: &str, batch_yaml: &str) -> String {
    let mut yaml = format!(
        r#"
api_config:
  endpoint: "{endpoint}"
  api_name: "/predict"
  timeout: 10
paths:
  input_video_dir: "{root}/input/video"
  input_audio_dir: "{root}/input/audio"
  output_dir: "{root}/output"
  log_dir: "{root}/logs"
  temp_dir: "{root}/temp"
file_settings:
  allowed_video_types: [".mp4", ".mov"]
  allowed_audio_types: [".wav", ".mp3"]
  max_file_size: 1
"#,
        root = root.display()
    );
    if !batch_yaml.is_empty() {
        yaml.push_str("batch:\n");
        for line in batch_yaml.lines() {
            yaml.push_str("  ");
            yaml.push_str(line);
            yaml.push('\n');
        }
    }
    yaml
}
