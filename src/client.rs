//! Remote inference client
//!
//! The batch controller only sees [`InferenceClient`]: hand it a pair, get a
//! [`RawResponse`] back. [`GradioClient`] implements it for services exposing
//! the Gradio HTTP API (upload, call, then read the result from an event stream).

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{ProcessingRequest, RawResponse};
use crate::utils::get_unique_path;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Remote generation service
///
/// Implementations own transport concerns (timeouts, uploads, downloads). A
/// returned error fails the current batch item only.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Submit one video/audio pair to the endpoint named `api_name`
    async fn predict(&self, request: &ProcessingRequest, api_name: &str) -> Result<RawResponse>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

#[derive(Debug, Deserialize)]
struct CallResponse {
    event_id: String,
}

/// [`InferenceClient`] for a Gradio app
#[derive(Debug, Clone)]
pub struct GradioClient {
    http: reqwest::Client,
    /// Endpoint joined with the API prefix, no trailing slash
    api_root: String,
    /// Where referenced output files are downloaded to; `None` keeps server paths
    download_dir: Option<PathBuf>,
}

impl GradioClient {
    /// Create a client for the app at `endpoint`
    pub fn new(
        endpoint: &str,
        api_prefix: &str,
        timeout: Duration,
        download_dir: Option<PathBuf>,
    ) -> Result<Self> {
        url::Url::parse(endpoint).map_err(|e| {
            Error::config("api_config.endpoint", format!("{endpoint:?}: {e}"))
        })?;

        let http = reqwest::Client::builder().timeout(timeout).build()?;

        let prefix = api_prefix.trim_matches('/');
        let base = endpoint.trim_end_matches('/');
        let api_root = if prefix.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{prefix}")
        };

        Ok(Self {
            http,
            api_root,
            download_dir,
        })
    }

    /// Create a client from the loaded configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let download_dir = config
            .api_config
            .download_outputs
            .then(|| config.paths.temp_dir.clone());
        Self::new(
            &config.api_config.endpoint,
            &config.api_config.api_prefix,
            config.api_config.timeout,
            download_dir,
        )
    }

    fn url(&self, tail: &str) -> String {
        format!("{}/{}", self.api_root, tail.trim_start_matches('/'))
    }

    /// Upload a local file, returning the path the server stored it under
    async fn upload(&self, path: &Path) -> Result<String> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let bytes = tokio::fs::read(path).await?;

        debug!(?path, size = bytes.len(), "uploading input file");

        let form = Form::new().part("files", Part::bytes(bytes).file_name(file_name));
        let response = self
            .http
            .post(self.url("upload"))
            .multipart(form)
            .send()
            .await?;
        let response = check_status(response).await?;

        let stored: Vec<String> = response.json().await?;
        stored.into_iter().next().ok_or_else(|| {
            Error::Remote(format!(
                "upload of {} returned no server path",
                path.display()
            ))
        })
    }

    /// Queue a call and return its event id
    async fn submit(&self, api_name: &str, data: Value) -> Result<String> {
        let response = self
            .http
            .post(self.url(&format!("call/{}", api_name.trim_matches('/'))))
            .json(&json!({ "data": data }))
            .send()
            .await?;
        let response = check_status(response).await?;
        let call: CallResponse = response.json().await?;
        Ok(call.event_id)
    }

    /// Wait for the call to finish and return its output list
    async fn await_result(&self, api_name: &str, event_id: &str) -> Result<Value> {
        let response = self
            .http
            .get(self.url(&format!(
                "call/{}/{}",
                api_name.trim_matches('/'),
                event_id
            )))
            .send()
            .await?;
        let response = check_status(response).await?;
        let body = response.text().await?;
        parse_event_stream(&body)
    }

    /// Replace file objects in `value` with local path strings
    ///
    /// With a download directory configured, each file object that carries a
    /// `url` is fetched there first; otherwise the server-side `path` is used.
    fn localize<'a>(
        &'a self,
        value: Value,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Value>> + Send + 'a>> {
        Box::pin(async move {
            match value {
                Value::Object(map) if is_file_object(&map) => {
                    let server_path = map
                        .get("path")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    match (&self.download_dir, map.get("url").and_then(Value::as_str)) {
                        (Some(dir), Some(url)) => {
                            let local = self.download(url, &server_path, dir).await?;
                            Ok(Value::String(local.to_string_lossy().into_owned()))
                        }
                        _ => Ok(Value::String(server_path)),
                    }
                }
                Value::Object(map) => {
                    let mut out = serde_json::Map::with_capacity(map.len());
                    for (key, inner) in map {
                        out.insert(key, self.localize(inner).await?);
                    }
                    Ok(Value::Object(out))
                }
                Value::Array(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for inner in items {
                        out.push(self.localize(inner).await?);
                    }
                    Ok(Value::Array(out))
                }
                other => Ok(other),
            }
        })
    }

    async fn download(&self, url: &str, server_path: &str, dir: &Path) -> Result<PathBuf> {
        let response = self.http.get(url).send().await?;
        let response = check_status(response).await?;
        let bytes = response.bytes().await?;

        let name = Path::new(server_path)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "output".into());
        tokio::fs::create_dir_all(dir).await?;
        let local = get_unique_path(&dir.join(name))?;
        tokio::fs::write(&local, &bytes).await?;

        debug!(%url, ?local, size = bytes.len(), "downloaded service output");
        Ok(local)
    }
}

#[async_trait]
impl InferenceClient for GradioClient {
    async fn predict(&self, request: &ProcessingRequest, api_name: &str) -> Result<RawResponse> {
        let video = self.upload(&request.video_path).await?;
        let audio = self.upload(&request.audio_path).await?;

        let data = json!([
            { "video": file_data(&video, &request.video_path) },
            file_data(&audio, &request.audio_path),
        ]);

        let event_id = self.submit(api_name, data).await?;
        info!(%event_id, api_name, "inference call queued");

        let outputs = self.await_result(api_name, &event_id).await?;
        let outputs = self.localize(outputs).await?;

        // A single output is returned bare, as Gradio clients do
        let value = match outputs {
            Value::Array(mut items) if items.len() == 1 => items.remove(0),
            other => other,
        };
        Ok(RawResponse::from(value))
    }

    fn name(&self) -> &'static str {
        "gradio"
    }
}

/// Gradio's description of an uploaded file
fn file_data(server_path: &str, original: &Path) -> Value {
    json!({
        "path": server_path,
        "orig_name": original.file_name().and_then(|n| n.to_str()),
        "meta": { "_type": "gradio.FileData" },
    })
}

fn is_file_object(map: &serde_json::Map<String, Value>) -> bool {
    let has_path = map.get("path").is_some_and(Value::is_string);
    let tagged = map
        .get("meta")
        .and_then(|m| m.get("_type"))
        .and_then(Value::as_str)
        == Some("gradio.FileData");
    has_path && (tagged || map.contains_key("url"))
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(Error::Remote(format!("{url} returned {status}: {body}")))
}

/// Extract the result from a server-sent event stream
///
/// Returns the `data` of the first `complete` event. An `error` event, or a
/// stream that ends without completing, is an error.
pub fn parse_event_stream(body: &str) -> Result<Value> {
    let normalized = body.replace("\r\n", "\n");

    for block in normalized.split("\n\n") {
        let mut event = None;
        let mut data = Vec::new();
        for line in block.lines() {
            if let Some(rest) = line.strip_prefix("event:") {
                event = Some(rest.trim());
            } else if let Some(rest) = line.strip_prefix("data:") {
                data.push(rest.strip_prefix(' ').unwrap_or(rest));
            }
        }
        let data = data.join("\n");

        match event {
            Some("complete") => return Ok(serde_json::from_str(&data)?),
            Some("error") => {
                return Err(Error::Remote(format!(
                    "service reported an error: {}",
                    if data.is_empty() { "null" } else { &data }
                )));
            }
            _ => {}
        }
    }

    Err(Error::Remote(
        "event stream ended without a result".to_string(),
    ))
}
