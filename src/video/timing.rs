use crate::error::{Result, VideoError};

/// Seconds each image stays on screen when `total_secs` is split evenly.
pub fn duration_per_image(total_secs: f64, image_count: usize) -> Result<f64> {
    if image_count == 0 {
        return Err(VideoError::precondition("no images found to create a video"));
    }
    if !total_secs.is_finite() || total_secs <= 0.0 {
        return Err(VideoError::precondition(format!(
            "narration duration must be positive, got {total_secs}"
        )));
    }
    Ok(total_secs / image_count as f64)
}

/// Per-image frame counts for an even split of the narration.
///
/// Boundaries are rounded on the cumulative timeline rather than per image, so
/// the counts add up to exactly `round(total_secs * frame_rate)` and the last
/// frame lands within half a frame of the narration end. Every image gets at
/// least one frame; a narration too short for that is rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideTiming {
    pub total_secs: f64,
    pub per_image_secs: f64,
    pub frame_rate: u32,
    pub frames: Vec<u64>,
}

impl SlideTiming {
    pub fn plan(total_secs: f64, image_count: usize, frame_rate: u32) -> Result<Self> {
        let per_image_secs = duration_per_image(total_secs, image_count)?;
        if frame_rate == 0 {
            return Err(VideoError::precondition("frame_rate must be non-zero"));
        }

        let total_frames = (total_secs * f64::from(frame_rate)).round() as u64;
        let n = image_count as u64;
        if total_frames < n {
            return Err(VideoError::precondition(format!(
                "narration of {total_secs}s is {total_frames} frames at {frame_rate} fps, \
                 too short to show {image_count} images"
            )));
        }

        // total_frames >= n, so consecutive boundaries are at least one frame apart.
        let mut frames = Vec::with_capacity(image_count);
        let mut prev_boundary = 0u64;
        for i in 1..=n {
            let boundary = (total_frames * i + n / 2) / n;
            frames.push(boundary - prev_boundary);
            prev_boundary = boundary;
        }

        Ok(Self {
            total_secs,
            per_image_secs,
            frame_rate,
            frames,
        })
    }

    pub fn image_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frame_secs(&self) -> f64 {
        1.0 / f64::from(self.frame_rate)
    }

    /// On-screen time of slide `index`, quantized to whole frames.
    pub fn slide_secs(&self, index: usize) -> f64 {
        self.frames[index] as f64 * self.frame_secs()
    }

    pub fn total_frames(&self) -> u64 {
        self.frames.iter().sum()
    }

    pub fn planned_secs(&self) -> f64 {
        self.total_frames() as f64 * self.frame_secs()
    }
}

/// Seconds formatted for FFmpeg option values.
pub fn format_secs(secs: f64) -> String {
    format!("{secs:.6}")
}
