//! Input validation against the configured file policy
//!
//! Runs before any network call so an invalid input never costs a round trip.

use crate::config::Config;
use crate::error::ItemError;
use crate::types::{FilePolicy, MediaKind, extension_of};
use std::path::Path;

/// Checks candidate input files against the per-kind policies
#[derive(Clone, Debug)]
pub struct InputValidator {
    video: FilePolicy,
    audio: FilePolicy,
}

impl InputValidator {
    /// Build a validator from explicit policies
    pub fn new(video: FilePolicy, audio: FilePolicy) -> Self {
        Self { video, audio }
    }

    /// Build a validator from the loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.policy(MediaKind::Video), config.policy(MediaKind::Audio))
    }

    /// Policy applied to `kind`
    pub fn policy(&self, kind: MediaKind) -> &FilePolicy {
        match kind {
            MediaKind::Video => &self.video,
            MediaKind::Audio => &self.audio,
        }
    }

    /// Validate one file
    ///
    /// Checks, in order: the path is an existing regular file, its lowercased
    /// extension is allowed for `kind`, and its size does not exceed the limit.
    pub fn validate(&self, path: &Path, kind: MediaKind) -> Result<(), ItemError> {
        let metadata = match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => meta,
            _ => {
                return Err(ItemError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
        };

        let policy = self.policy(kind);
        if !policy.allows_extension(path) {
            return Err(ItemError::UnsupportedType {
                path: path.to_path_buf(),
                extension: extension_of(path).unwrap_or_default(),
                allowed: policy.allowed_extensions.iter().cloned().collect(),
            });
        }

        let size = metadata.len();
        if size > policy.max_size_bytes {
            return Err(ItemError::TooLarge {
                path: path.to_path_buf(),
                size,
                max: policy.max_size_bytes,
            });
        }

        Ok(())
    }
}
