use super::ffmpeg::{FfmpegJob, MediaTool, Stage};
use super::janitor::{Artifact, RunWorkspace};
use super::timing::format_secs;
use super::AUDIO_CODEC;
use crate::error::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use tracing::info;

/// Codec for the intermediate music layers
const MUSIC_LAYER_CODEC: &str = "libmp3lame";

/// Picks the background track for a run.
pub trait MusicSelector: Send + Sync {
    fn select<'a>(&self, library: &'a [PathBuf]) -> Option<&'a Path>;
}

/// Uniform random choice, fresh on every run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSelector;

impl MusicSelector for RandomSelector {
    fn select<'a>(&self, library: &'a [PathBuf]) -> Option<&'a Path> {
        library
            .choose(&mut rand::thread_rng())
            .map(PathBuf::as_path)
    }
}

/// Uniform choice from a fixed seed; the same seed and library always agree.
#[derive(Debug, Clone, Copy)]
pub struct SeededSelector(pub u64);

impl MusicSelector for SeededSelector {
    fn select<'a>(&self, library: &'a [PathBuf]) -> Option<&'a Path> {
        let mut rng = StdRng::seed_from_u64(self.0);
        library.choose(&mut rng).map(PathBuf::as_path)
    }
}

/// Always the track at this index of the sorted library.
#[derive(Debug, Clone, Copy)]
pub struct FixedSelector(pub usize);

impl MusicSelector for FixedSelector {
    fn select<'a>(&self, library: &'a [PathBuf]) -> Option<&'a Path> {
        library.get(self.0).map(PathBuf::as_path)
    }
}

/// `*.mp3` files directly inside `dir`, sorted by name. A missing directory is an empty library.
pub fn music_library(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut tracks = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_mp3 = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("mp3"));
        if is_mp3 && path.is_file() {
            tracks.push(path);
        }
    }
    tracks.sort();
    Ok(tracks)
}

/// Repeat `music` as often as needed and cut it at exactly `total_secs`.
pub fn loop_music_job(music: &Path, total_secs: f64, output: &Path) -> FfmpegJob {
    FfmpegJob::new(Stage::LoopMusic, output)
        .args(["-stream_loop", "-1"])
        .input(music)
        .arg("-t")
        .arg(format_secs(total_secs))
        .args(["-vn", "-c:a", MUSIC_LAYER_CODEC])
}

pub fn attenuate_job(looped: &Path, gain: f64, output: &Path) -> FfmpegJob {
    FfmpegJob::new(Stage::AttenuateMusic, output)
        .input(looped)
        .arg("-af")
        .arg(format!("volume={gain}"))
        .args(["-vn", "-c:a", MUSIC_LAYER_CODEC])
}

/// Narration first so `duration=first` pins the mix to the narration length.
/// `normalize=0` stops amix from halving the narration.
pub fn mix_job(narration: &Path, quiet_music: &Path, output: &Path) -> FfmpegJob {
    FfmpegJob::new(Stage::MixAudio, output)
        .input(narration)
        .input(quiet_music)
        .args([
            "-filter_complex",
            "[0:a][1:a]amix=inputs=2:duration=first:dropout_transition=0:normalize=0[a]",
            "-map",
            "[a]",
            "-c:a",
            AUDIO_CODEC,
        ])
}

/// Narration over quiet looped music, exactly `total_secs` long.
pub async fn mix_audio(
    tool: &dyn MediaTool,
    narration: &Path,
    music: &Path,
    total_secs: f64,
    gain: f64,
    workspace: &mut RunWorkspace,
) -> Result<PathBuf> {
    info!("Mixing narration with background music: {}", music.display());

    let looped = workspace.artifact(Artifact::LoopedMusic);
    tool.run(&loop_music_job(music, total_secs, &looped)).await?;

    let quiet = workspace.artifact(Artifact::QuietMusic);
    tool.run(&attenuate_job(&looped, gain, &quiet)).await?;

    let mixed = workspace.artifact(Artifact::MixedAudio);
    tool.run(&mix_job(narration, &quiet, &mixed)).await?;

    info!("Mixed audio: {}", mixed.display());
    Ok(mixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn library() -> Vec<PathBuf> {
        ["a.mp3", "b.mp3", "c.mp3", "d.mp3"]
            .iter()
            .map(PathBuf::from)
            .collect()
    }

    #[test]
    fn selectors_on_empty_library_pick_nothing() {
        assert!(RandomSelector.select(&[]).is_none());
        assert!(SeededSelector(7).select(&[]).is_none());
        assert!(FixedSelector(0).select(&[]).is_none());
    }

    #[test]
    fn seeded_selector_is_stable() {
        let lib = library();
        let first = SeededSelector(42).select(&lib).unwrap();
        for _ in 0..10 {
            assert_eq!(SeededSelector(42).select(&lib).unwrap(), first);
        }
    }

    #[test]
    fn random_selector_stays_in_library() {
        let lib = library();
        for _ in 0..20 {
            let pick = RandomSelector.select(&lib).unwrap();
            assert!(lib.iter().any(|p| p == pick));
        }
    }

    #[test]
    fn fixed_selector_picks_by_index() {
        let lib = library();
        assert_eq!(FixedSelector(2).select(&lib), Some(Path::new("c.mp3")));
        assert_eq!(FixedSelector(9).select(&lib), None);
    }

    #[test]
    fn library_lists_only_mp3_files() {
        let dir = TempDir::new().unwrap();
        for name in ["z.mp3", "a.MP3", "notes.txt", "b.wav"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("dir.mp3")).unwrap();

        let names: Vec<_> = music_library(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.MP3", "z.mp3"]);
        assert!(music_library(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn loop_job_truncates_to_narration_length() {
        let job = loop_music_job(Path::new("m.mp3"), 10.0, Path::new("loop.mp3"));
        assert_eq!(job.value_of("-stream_loop").as_deref(), Some("-1"));
        assert_eq!(job.value_of("-t").as_deref(), Some("10.000000"));
    }

    #[test]
    fn attenuation_only_touches_the_music_branch() {
        let attenuate = attenuate_job(Path::new("loop.mp3"), 0.2, Path::new("quiet.mp3"));
        assert_eq!(attenuate.value_of("-i").as_deref(), Some("loop.mp3"));
        assert_eq!(attenuate.value_of("-af").as_deref(), Some("volume=0.2"));

        let mix = mix_job(Path::new("narration.mp3"), Path::new("quiet.mp3"), Path::new("mix.m4a"));
        let graph = mix.value_of("-filter_complex").unwrap();
        assert!(!graph.contains("volume"));
        assert!(graph.contains("duration=first"));
        assert!(graph.contains("normalize=0"));
        assert_eq!(mix.value_of("-i").as_deref(), Some("narration.mp3"));
        assert_eq!(mix.value_of("-c:a").as_deref(), Some("aac"));
    }
}
