use crate::prelude::{RecorderError, RecorderResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root of the media tree shared with the control panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub root: PathBuf,
    pub jpeg_quality: u8,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/var/lib/trailcam/media"),
            jpeg_quality: 85,
        }
    }
}

/// Fixed artifact locations under the media root.
#[derive(Debug, Clone)]
pub struct MediaLayout {
    root: PathBuf,
}

impl MediaLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(config.root.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn photos(&self) -> PathBuf {
        self.root.join("photos")
    }

    pub fn videos(&self) -> PathBuf {
        self.root.join("videos")
    }

    pub fn videos_tracked(&self) -> PathBuf {
        self.root.join("videos_tracked")
    }

    pub fn live_frame(&self) -> PathBuf {
        self.root.join("live.jpg")
    }

    pub fn status(&self) -> PathBuf {
        self.root.join("status.json")
    }

    pub fn ensure_dirs(&self) -> RecorderResult<()> {
        for dir in [self.root.clone(), self.photos(), self.videos(), self.videos_tracked()] {
            fs::create_dir_all(&dir)
                .map_err(|err| RecorderError::storage(format!("creating {}", dir.display()), err))?;
        }
        Ok(())
    }

    /// First free `<stem>.<ext>` in `dir`, appending `_N` on collision.
    ///
    /// An in-progress `<name>.part` counts as taken.
    pub fn unique_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
        let taken = |path: &Path| {
            path.exists() || {
                let mut part = path.as_os_str().to_owned();
                part.push(".part");
                Path::new(&part).exists()
            }
        };

        let first = dir.join(format!("{}.{}", stem, ext));
        if !taken(&first) {
            return first;
        }
        (1u32..)
            .map(|n| dir.join(format!("{}_{}.{}", stem, n, ext)))
            .find(|candidate| !taken(candidate))
            .unwrap_or(first)
    }
}
