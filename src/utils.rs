//! Utility functions for file operations and path manipulation

use chrono::{DateTime, Local};
use std::io;
use std::path::{Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Format used for timestamps embedded in file names
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Get a path that does not exist yet
///
/// Returns `path` unchanged if nothing is there, otherwise appends ` (1)`,
/// ` (2)`, ... to the file stem until a free name is found.
///
/// # Examples
///
/// ```
/// use avsync_batch::utils::get_unique_path;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/does-not-exist-avsync/output_1.mp4");
/// let unique = get_unique_path(path).unwrap();
/// assert_eq!(unique, path);
/// ```
pub fn get_unique_path(path: &Path) -> io::Result<PathBuf> {
    if !path.exists() {
        return Ok(path.to_path_buf());
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("cannot extract file stem from {}", path.display()),
        )
    })?;

    let extension = path.extension().and_then(|e| e.to_str());

    let parent = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("cannot extract parent directory from {}", path.display()),
        )
    })?;

    for i in 1..=MAX_RENAME_ATTEMPTS {
        let new_name = match extension {
            Some(ext) => format!("{} ({}).{}", stem, i, ext),
            None => format!("{} ({})", stem, i),
        };
        let new_path = parent.join(new_name);
        if !new_path.exists() {
            return Ok(new_path);
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!(
            "could not find unique filename for {} after {} attempts",
            path.display(),
            MAX_RENAME_ATTEMPTS
        ),
    ))
}

/// Second-resolution timestamp for file names, in local time
#[must_use]
pub fn file_timestamp(at: DateTime<Local>) -> String {
    at.format(FILE_TIMESTAMP_FORMAT).to_string()
}

/// Check if a file name is hidden (dot-prefixed)
#[must_use]
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

/// List the regular, non-hidden files directly inside `dir`, sorted by name
pub async fn list_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let file_type = match entry.file_type().await {
            Ok(ft) => ft,
            Err(_) => continue,
        };
        if file_type.is_file() && !is_hidden(&path) {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
