//! Input fixtures and a scripted inference client

use async_trait::async_trait;
use avsync_batch::{InferenceClient, ProcessingRequest, RawResponse};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One byte over the 1 MiB limit used by the test config
pub const OVERSIZED_BYTES: usize = 1024 * 1024 + 1;

/// Write `contents` to `dir/name`, creating `dir` as needed
pub fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    std::fs::create_dir_all(dir).expect("create fixture dir");
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write fixture");
    path
}

/// A small stand-in media file
pub fn media_file(dir: &Path, name: &str) -> PathBuf {
    write_file(dir, name, b"not really media")
}

/// A file just over the size limit
pub fn oversized_file(dir: &Path, name: &str) -> PathBuf {
    write_file(dir, name, &vec![0u8; OVERSIZED_BYTES])
}

type Responder = dyn Fn(&ProcessingRequest) -> avsync_batch::Result<Value> + Send + Sync;

/// Inference client that records calls and answers from a closure
pub struct FakeClient {
    respond: Box<Responder>,
    calls: Mutex<Vec<ProcessingRequest>>,
}

impl FakeClient {
    /// Client answering each call with `respond(request)`
    pub fn new(
        respond: impl Fn(&ProcessingRequest) -> avsync_batch::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Client that writes a result into `service_dir` and answers with `shape(path)`
    ///
    /// The result file is named after the video so every call produces a
    /// distinct file.
    pub fn producing(
        service_dir: PathBuf,
        shape: impl Fn(&str) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self::new(move |request| {
            let stem = request
                .video_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let audio = request
                .audio_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let out = write_file(&service_dir, &format!("{stem}_{audio}.mp4"), b"synced video");
            Ok(shape(&out.to_string_lossy()))
        })
    }

    /// Requests received so far
    pub fn calls(&self) -> Vec<ProcessingRequest> {
        self.calls.lock().expect("calls lock").clone()
    }

    /// Number of requests received so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }
}

#[async_trait]
impl InferenceClient for FakeClient {
    async fn predict(
        &self,
        request: &ProcessingRequest,
        _api_name: &str,
    ) -> avsync_batch::Result<RawResponse> {
        self.calls.lock().expect("calls lock").push(request.clone());
        (self.respond)(request).map(RawResponse::from)
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}
