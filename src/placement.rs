//! Output placement
//!
//! Moves a file produced by the inference service out of its transient
//! workspace and into the managed output directory under a unique name:
//! `{prefix}_{YYYYmmdd_HHMMSS}_{seq:04}.{ext}`.

use crate::config::Config;
use crate::error::ItemError;
use crate::types::PlacementRecord;
use crate::utils::{file_timestamp, get_unique_path};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Suffix of the temporary file used when a move has to fall back to copying
const PARTIAL_SUFFIX: &str = "partial";

/// Places generated files into the output directory
#[derive(Debug)]
pub struct PlacementManager {
    output_dir: PathBuf,
    prefix: String,
    /// Per-run counter; the last sequence number handed out
    sequence: AtomicU64,
}

impl PlacementManager {
    /// Create a manager writing into `output_dir`
    pub fn new(output_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: prefix.into(),
            sequence: AtomicU64::new(0),
        }
    }

    /// Create a manager from the loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.paths.output_dir, &config.batch.output_prefix)
    }

    /// Output directory files are placed into
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Move `source_path` into the output directory
    pub async fn place(&self, source_path: &Path) -> Result<PlacementRecord, ItemError> {
        self.place_at(source_path, Local::now()).await
    }

    /// Move `source_path` into the output directory, stamping it with `now`
    pub async fn place_at(
        &self,
        source_path: &Path,
        now: DateTime<Local>,
    ) -> Result<PlacementRecord, ItemError> {
        let timestamp = file_timestamp(now);
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let file_name = match source_path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}_{}_{:04}.{}", self.prefix, timestamp, sequence, ext),
            None => format!("{}_{}_{:04}", self.prefix, timestamp, sequence),
        };
        let wanted = self.output_dir.join(file_name);

        let move_failed = |dest: &Path, reason: String| ItemError::MoveFailed {
            source_path: source_path.to_path_buf(),
            dest_path: dest.to_path_buf(),
            reason,
        };

        // Names only repeat across runs, since the counter resets per run
        let final_path =
            get_unique_path(&wanted).map_err(|e| move_failed(&wanted, e.to_string()))?;

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| move_failed(&final_path, e.to_string()))?;

        debug!(?source_path, ?final_path, sequence, "placing artifact");

        move_file(source_path, &final_path)
            .await
            .map_err(|e| move_failed(&final_path, e.to_string()))?;

        info!(?source_path, ?final_path, "successfully placed artifact");

        Ok(PlacementRecord {
            final_path,
            timestamp,
            sequence,
        })
    }
}

/// Move a file, falling back to copy + rename when a plain rename fails
///
/// The fallback copies into a `.partial` sibling of the destination and
/// renames it into place, so the destination never holds a half-written file.
async fn move_file(source: &Path, destination: &Path) -> std::io::Result<()> {
    use tokio::fs;

    let rename_err = match fs::rename(source, destination).await {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };

    // Nothing to fall back to if the source is gone or not a file
    let metadata = fs::metadata(source).await?;
    if !metadata.is_file() {
        return Err(rename_err);
    }

    debug!(
        ?source,
        ?destination,
        error = %rename_err,
        "rename failed, falling back to copy"
    );

    copy_into_place(source, destination).await
}

/// Copy `source` into a `.partial` sibling, rename it to `destination` and
/// remove `source`
///
/// If the source cannot be removed the destination is removed again, so a
/// failure never leaves the artifact in both places.
async fn copy_into_place(source: &Path, destination: &Path) -> std::io::Result<()> {
    use tokio::fs;

    let mut partial = destination.as_os_str().to_owned();
    partial.push(".");
    partial.push(PARTIAL_SUFFIX);
    let partial = PathBuf::from(partial);

    if let Err(e) = fs::copy(source, &partial).await {
        fs::remove_file(&partial).await.ok();
        return Err(e);
    }
    if let Err(e) = fs::rename(&partial, destination).await {
        fs::remove_file(&partial).await.ok();
        return Err(e);
    }

    if let Err(e) = fs::remove_file(source).await {
        warn!(?source, error = %e, "could not remove the original after copying, removing the copy");
        fs::remove_file(destination).await.ok();
        return Err(e);
    }

    Ok(())
}
