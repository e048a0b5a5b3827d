//! Batch orchestration
//!
//! [`BatchController`] drives each video/audio pair through
//! validate → call → normalize → resolve → place, strictly one item at a time.
//! An item failure is recorded in its [`BatchEntry`] and the batch moves on;
//! only directory setup, input listing and run-log persistence can fail a run.

use crate::activity_log::ActivityLog;
use crate::client::InferenceClient;
use crate::config::Config;
use crate::error::{ItemError, Result};
use crate::normalize::{normalize, preview};
use crate::placement::PlacementManager;
use crate::resolve::resolve_artifact;
use crate::run_log;
use crate::types::{
    BatchEntry, BatchReport, EntryStatus, Event, MediaKind, PlacementRecord, ProcessingRequest,
    Stage,
};
use crate::utils::{file_timestamp, list_files};
use crate::validation::InputValidator;
use chrono::{Local, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// Characters of the raw response written to the activity log
const RAW_PREVIEW_CHARS: usize = 500;

/// Where an item is in the pipeline, and what it has learned so far
#[derive(Debug)]
struct ItemProgress {
    stage: Stage,
    processing_time: Option<String>,
}

/// Runs batches of video/audio pairs against an [`InferenceClient`]
pub struct BatchController {
    config: Arc<Config>,
    client: Arc<dyn InferenceClient>,
    validator: InputValidator,
    placement: PlacementManager,
    activity_log: ActivityLog,
    event_tx: broadcast::Sender<Event>,
}

impl BatchController {
    /// Create a controller, making sure every working directory exists
    pub async fn new(config: Config, client: Arc<dyn InferenceClient>) -> Result<Self> {
        for dir in config.working_dirs() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let (event_tx, _rx) = broadcast::channel(1000);

        Ok(Self {
            validator: InputValidator::from_config(&config),
            placement: PlacementManager::from_config(&config),
            activity_log: ActivityLog::from_config(&config),
            config: Arc::new(config),
            client,
            event_tx,
        })
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The configuration this controller was built with
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }

    /// Requests a batch would process
    ///
    /// Uses `batch.pairs` when configured; otherwise every file in the video
    /// input directory is paired with every file in the audio input directory,
    /// videos in the outer loop, both sorted by name.
    pub async fn plan_requests(&self) -> Result<Vec<ProcessingRequest>> {
        let configured = self.config.configured_pairs();
        if !configured.is_empty() {
            return Ok(configured);
        }

        let videos = list_files(&self.config.paths.input_video_dir).await?;
        let audios = list_files(&self.config.paths.input_audio_dir).await?;

        Ok(videos
            .iter()
            .flat_map(|video| {
                audios
                    .iter()
                    .map(move |audio| ProcessingRequest::new(video, audio))
            })
            .collect())
    }

    /// Plan and run a batch
    pub async fn run_planned(&self) -> Result<BatchReport> {
        let requests = self.plan_requests().await?;
        self.run(requests).await
    }

    /// Process `requests` in order and persist the run log
    pub async fn run(&self, requests: Vec<ProcessingRequest>) -> Result<BatchReport> {
        let started_at = Utc::now();
        let run_id = file_timestamp(Local::now());
        let total = requests.len();

        info!(%run_id, total, client = self.client.name(), "batch started");
        self.activity_log
            .info(format!("Batch {run_id} started: {total} pair(s)"))
            .await;
        self.emit(Event::BatchStarted {
            run_id: run_id.clone(),
            total,
        });

        let mut entries = Vec::with_capacity(total);
        for (index, request) in requests.into_iter().enumerate() {
            entries.push(self.run_item(index, request).await);
        }

        let mut report = BatchReport::new(run_id, started_at, Utc::now(), entries);
        let path = run_log::write_report(&self.config.paths.log_dir, &report).await?;
        report.run_log_path = Some(path);

        info!(
            run_id = %report.run_id,
            succeeded = report.succeeded,
            failed = report.failed,
            "batch complete"
        );
        self.activity_log
            .info(format!(
                "Batch {} finished: {} succeeded, {} failed",
                report.run_id, report.succeeded, report.failed
            ))
            .await;
        self.emit(Event::BatchComplete {
            run_id: report.run_id.clone(),
            succeeded: report.succeeded,
            failed: report.failed,
        });

        Ok(report)
    }

    /// Process one request and fold the outcome into an entry
    async fn run_item(&self, index: usize, request: ProcessingRequest) -> BatchEntry {
        let started_at = Utc::now();

        info!(
            index,
            video = ?request.video_path,
            audio = ?request.audio_path,
            "processing pair"
        );
        self.activity_log
            .info(format!(
                "Processing video: {} with audio: {}",
                request.video_path.display(),
                request.audio_path.display()
            ))
            .await;
        self.emit(Event::ItemStarted {
            index,
            request: request.clone(),
        });

        let mut progress = ItemProgress {
            stage: Stage::Pending,
            processing_time: None,
        };
        let outcome = self.process_one(index, &request, &mut progress).await;
        let finished_at = Utc::now();

        match outcome {
            Ok(placement) => {
                info!(index, final_path = ?placement.final_path, "pair processed");
                self.activity_log
                    .info(format!(
                        "Completed: {} (processing time: {})",
                        placement.final_path.display(),
                        progress.processing_time.as_deref().unwrap_or("unknown")
                    ))
                    .await;
                self.emit(Event::ItemSucceeded {
                    index,
                    final_path: placement.final_path.clone(),
                    processing_time: progress.processing_time.clone(),
                });

                BatchEntry {
                    index,
                    request,
                    status: EntryStatus::Success,
                    result: Some(placement),
                    error: None,
                    error_kind: None,
                    failed_stage: None,
                    processing_time: progress.processing_time,
                    started_at,
                    finished_at,
                }
            }
            Err(e) => {
                let message = e.to_string();
                error!(index, stage = %progress.stage, kind = %e.kind(), error = %message, "pair failed");
                self.activity_log
                    .error(format!(
                        "Failed at {}: {} ({} + {})",
                        progress.stage,
                        message,
                        request.video_path.display(),
                        request.audio_path.display()
                    ))
                    .await;
                self.emit(Event::ItemFailed {
                    index,
                    stage: progress.stage,
                    kind: e.kind(),
                    error: message.clone(),
                });

                BatchEntry {
                    index,
                    request,
                    status: EntryStatus::Failure,
                    result: None,
                    error: Some(message),
                    error_kind: Some(e.kind()),
                    failed_stage: Some(progress.stage),
                    processing_time: progress.processing_time,
                    started_at,
                    finished_at,
                }
            }
        }
    }

    fn enter(&self, index: usize, progress: &mut ItemProgress, stage: Stage) {
        progress.stage = stage;
        debug!(index, %stage, "stage changed");
        self.emit(Event::StageChanged { index, stage });
    }

    async fn process_one(
        &self,
        index: usize,
        request: &ProcessingRequest,
        progress: &mut ItemProgress,
    ) -> std::result::Result<PlacementRecord, ItemError> {
        self.enter(index, progress, Stage::Validating);
        self.validator
            .validate(&request.video_path, MediaKind::Video)?;
        self.validator
            .validate(&request.audio_path, MediaKind::Audio)?;

        self.enter(index, progress, Stage::Calling);
        let raw = self
            .client
            .predict(request, &self.config.api_config.api_name)
            .await?;
        self.activity_log
            .info(format!(
                "Raw response: {}",
                preview(&raw, RAW_PREVIEW_CHARS)
            ))
            .await;

        self.enter(index, progress, Stage::Normalizing);
        let normalized = normalize(raw)?;
        progress.processing_time = normalized.processing_time.clone();

        self.enter(index, progress, Stage::Resolving);
        let artifact = resolve_artifact(
            &normalized,
            &self.config.batch.locator_keys,
            &self.validator.policy(MediaKind::Video).allowed_extensions,
        )?;

        self.enter(index, progress, Stage::Placing);
        self.placement.place(&artifact.source_path).await
    }
}
