//! The recognized configuration surface, as it arrives from a UI or a JSON
//! job file. Ranges mirror the form controls (percentages, discrete fps
//! catalog); [`JobConfig`] maps them into validated engine parameters.

use crate::{
    core::{Canvas, Fps, SourceImage},
    ease::Ease,
    error::{PicloopError, PicloopResult},
    export::{ExportSettings, LoopCount, OutputFormat, QualityTier},
    motion::{MotionKind, MotionParams},
};

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub kind: MotionKind,
    /// Seconds per full cycle.
    pub speed_secs: f64,
    /// 0-100, mapped to the engine's [0,1].
    pub intensity: u8,
    /// Phase offset in seconds.
    pub delay_secs: f64,
    pub easing: Ease,
    /// Palette cap for indexed output, 1-256.
    pub color_limit: u16,
    /// 1-100, scales the source dimensions to the render target.
    pub size_scale: u8,
    pub fps: u32,
    pub quality: QualityTier,
    pub loop_count: LoopCount,
    pub format: OutputFormat,
    /// Determinism seed for the jitter kind.
    pub seed: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            kind: MotionKind::Float,
            speed_secs: 3.0,
            intensity: 50,
            delay_secs: 0.0,
            easing: Ease::EaseInOut,
            color_limit: 128,
            size_scale: 100,
            fps: 15,
            quality: QualityTier::High,
            loop_count: LoopCount::Infinite,
            format: OutputFormat::Apng,
            seed: 0,
        }
    }
}

impl JobConfig {
    pub fn from_json(json: &str) -> PicloopResult<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| PicloopError::config(format!("invalid job config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> PicloopResult<()> {
        if self.intensity > 100 {
            return Err(PicloopError::config("intensity must be in 0..=100"));
        }
        if !(1..=100).contains(&self.size_scale) {
            return Err(PicloopError::config("size_scale must be in 1..=100"));
        }
        self.fps()?;
        self.motion_params().validate()?;
        self.export_settings().validate()?;
        Ok(())
    }

    pub fn motion_params(&self) -> MotionParams {
        MotionParams {
            kind: self.kind,
            speed_secs: self.speed_secs,
            intensity: f64::from(self.intensity.min(100)) / 100.0,
            delay_secs: self.delay_secs,
            ease: self.easing,
            seed: self.seed,
        }
    }

    pub fn fps(&self) -> PicloopResult<Fps> {
        Fps::new(self.fps)
    }

    pub fn export_settings(&self) -> ExportSettings {
        ExportSettings {
            format: self.format,
            loop_count: self.loop_count,
            color_limit: self.color_limit,
            quality: self.quality,
        }
    }

    /// Render target: source dimensions scaled by `size_scale`, never below
    /// one pixel.
    pub fn target_for(&self, src: &SourceImage) -> PicloopResult<Canvas> {
        let scale = f64::from(self.size_scale.clamp(1, 100)) / 100.0;
        let width = ((f64::from(src.width) * scale).round() as u32).max(1);
        let height = ((f64::from(src.height) * scale).round() as u32).max(1);
        Canvas::new(width, height)
    }

    /// Suggested output filename for the download boundary.
    pub fn suggested_filename(&self) -> &'static str {
        match self.format {
            OutputFormat::Gif => "animation.gif",
            OutputFormat::Apng => "animation.apng",
        }
    }
}
