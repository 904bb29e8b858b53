//! Lifecycle of everything a run writes besides the final video.

use crate::error::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Intermediate files produced while composing one video
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Artifact {
    Manifest,
    Slideshow,
    LoopedMusic,
    QuietMusic,
    MixedAudio,
    PartialOutput,
}

impl Artifact {
    pub fn file_name(self) -> &'static str {
        match self {
            Artifact::Manifest => "image_list.txt",
            Artifact::Slideshow => "temp_video.mp4",
            Artifact::LoopedMusic => "looped_bg_music.mp3",
            Artifact::QuietMusic => "quiet_bg_music.mp3",
            Artifact::MixedAudio => "mixed_audio.m4a",
            Artifact::PartialOutput => "final_video.part.mp4",
        }
    }
}

/// Scratch directory owning every intermediate of one run.
///
/// Dropping it removes the directory and all it contains, so failed and
/// panicking runs clean up as well as successful ones.
#[derive(Debug)]
pub struct RunWorkspace {
    dir: TempDir,
    tracked: BTreeMap<Artifact, PathBuf>,
}

impl RunWorkspace {
    pub fn create_in(parent: &Path) -> Result<Self> {
        std::fs::create_dir_all(parent)?;
        let dir = tempfile::Builder::new()
            .prefix(".compose-")
            .tempdir_in(parent)?;
        debug!("Created run workspace: {}", dir.path().display());
        Ok(Self {
            dir,
            tracked: BTreeMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path reserved for `artifact`; the file itself is written by the stage.
    pub fn artifact(&mut self, artifact: Artifact) -> PathBuf {
        let path = self.dir.path().join(artifact.file_name());
        self.tracked.insert(artifact, path.clone());
        path
    }

    pub fn tracked(&self) -> impl Iterator<Item = (Artifact, &Path)> {
        self.tracked.iter().map(|(a, p)| (*a, p.as_path()))
    }

    /// Remove the workspace now, surfacing any removal error.
    pub fn close(self) -> Result<()> {
        let count = self.tracked.len();
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        info!("Removed {} intermediate file(s) from {}", count, path.display());
        Ok(())
    }
}

/// Delete every `scene_*.png` in `dir`. Missing or empty directories are fine.
pub fn purge_scene_images(dir: &Path) -> Result<usize> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut removed = 0;
    for entry in entries {
        let path = entry?.path();
        if scene_index(&path).is_none() {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!("Failed to remove {}: {}", path.display(), e);
                return Err(e.into());
            }
        }
    }
    if removed > 0 {
        info!("Cleaned up {} generated image(s) in {}", removed, dir.display());
    }
    Ok(removed)
}

/// Images in `dir` named `scene_<n>.png`, ordered by `n`.
pub fn collect_scene_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut images = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if let Some(index) = scene_index(&path) {
            images.push((index, path));
        }
    }
    images.sort();
    Ok(images.into_iter().map(|(_, p)| p).collect())
}

/// File name of the image generated for 1-based scene `index`.
pub fn scene_image_name(index: usize) -> String {
    format!("scene_{index}.png")
}

fn scene_index(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_str()?;
    name.strip_prefix("scene_")?
        .strip_suffix(".png")?
        .parse()
        .ok()
}
