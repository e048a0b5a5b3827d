//! # avsync-batch
//!
//! Batch driver for a remote lip-sync / dubbing service: pairs local video files
//! with audio tracks, submits each pair to the service, extracts the generated
//! video from whatever the service answers, and files it in an output directory
//! under a unique name.
//!
//! ## Pipeline
//!
//! Each pair moves through validate → call → normalize → resolve → place. A
//! failure at any stage is recorded for that pair and the batch continues; at
//! the end a JSON run log is written next to the activity log.
//!
//! ## Quick Start
//!
//! ```no_run
//! use avsync_batch::{BatchController, Config, GradioClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config.yaml")?;
//!     let client = Arc::new(GradioClient::from_config(&config)?);
//!     let controller = BatchController::new(config, client).await?;
//!
//!     // Subscribe to events
//!     let mut events = controller.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = controller.run_planned().await?;
//!     println!("{} succeeded, {} failed", report.succeeded, report.failed);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Append-only activity log
pub mod activity_log;
/// Batch orchestration
pub mod batch;
/// Remote inference client
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Response normalization
pub mod normalize;
/// Output placement
pub mod placement;
/// Output path resolution
pub mod resolve;
/// Run log persistence
pub mod run_log;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;
/// Input validation
pub mod validation;

// Re-export commonly used types
pub use activity_log::ActivityLog;
pub use batch::BatchController;
pub use client::{GradioClient, InferenceClient};
pub use config::Config;
pub use error::{Error, ErrorKind, ItemError, Result};
pub use placement::PlacementManager;
pub use types::{
    BatchEntry, BatchReport, EntryStatus, Event, MediaKind, NormalizedResult, PlacementRecord,
    ProcessingRequest, RawResponse, Stage,
};
pub use validation::InputValidator;
