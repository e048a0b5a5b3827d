//! Run log persistence
//!
//! Each batch leaves `log_dir/run_{run_id}.json`, a pretty-printed
//! [`BatchReport`]. The file is written to a temporary sibling and renamed so a
//! reader never sees a half-written report.

use crate::error::Result;
use crate::types::BatchReport;
use crate::utils::get_unique_path;
use std::path::{Path, PathBuf};

/// File name of the run log for `run_id`
pub fn run_log_name(run_id: &str) -> String {
    format!("run_{run_id}.json")
}

/// Write `report` into `log_dir`, returning the final path
///
/// An existing log with the same name is never overwritten; the new one gets a
/// ` (n)` suffix instead.
pub async fn write_report(log_dir: &Path, report: &BatchReport) -> Result<PathBuf> {
    tokio::fs::create_dir_all(log_dir).await?;

    let json = serde_json::to_vec_pretty(report)?;
    let destination = get_unique_path(&log_dir.join(run_log_name(&report.run_id)))?;

    let mut temp_name = destination.as_os_str().to_os_string();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    if let Err(e) = tokio::fs::write(&temp_path, &json).await {
        tokio::fs::remove_file(&temp_path).await.ok();
        return Err(e.into());
    }
    tokio::fs::rename(&temp_path, &destination).await?;

    tracing::info!(path = ?destination, entries = report.total, "run log written");
    Ok(destination)
}

/// Read a run log back
pub async fn read_report(path: &Path) -> Result<BatchReport> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}
