//! Map image lookup
//!
//! Reports carry an image of the current map. Images are stored as
//! `<maps_path>/<map>.png`; `<maps_path>/unknown.png` is the fallback.

use std::path::{Path, PathBuf};

use crate::models::UNKNOWN_ACTIVITY;
use crate::utils::sanitize_filename;

/// Capability that picks the image for an activity label
pub trait AssetResolver: Send + Sync {
    /// Return the image path for `activity`, or the default image path
    fn resolve(&self, activity: &str) -> PathBuf;

    /// Image used when no activity-specific image exists
    fn default_asset(&self) -> PathBuf;
}

/// Resolves map images from a directory on disk
///
/// The existence check runs at call time, so images dropped into the
/// directory are picked up on the next cycle.
#[derive(Debug, Clone)]
pub struct FsAssetResolver {
    maps_path: PathBuf,
}

impl FsAssetResolver {
    pub fn new(maps_path: impl Into<PathBuf>) -> Self {
        Self {
            maps_path: maps_path.into(),
        }
    }

    pub fn maps_path(&self) -> &Path {
        &self.maps_path
    }

    fn candidate(&self, activity: &str) -> PathBuf {
        self.maps_path
            .join(format!("{}.png", sanitize_filename(activity)))
    }
}

impl AssetResolver for FsAssetResolver {
    fn resolve(&self, activity: &str) -> PathBuf {
        if activity.trim().is_empty() || activity == UNKNOWN_ACTIVITY {
            return self.default_asset();
        }

        let candidate = self.candidate(activity);
        if candidate.is_file() {
            candidate
        } else {
            tracing::debug!(
                activity = %activity,
                path = %candidate.display(),
                "No map image, using default"
            );
            self.default_asset()
        }
    }

    fn default_asset(&self) -> PathBuf {
        self.maps_path.join(format!("{UNKNOWN_ACTIVITY}.png"))
    }
}
