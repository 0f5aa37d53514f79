//! The transform engine: maps a cycle phase and an immutable parameter
//! snapshot to a 2D transform sample for one of the fixed animation kinds.
//!
//! Phase is the pre-wrap continuous cycle progress; the integer part counts
//! completed cycles. Wrapping (`rem_euclid`, also of the x2 multiple for the
//! faster sub-oscillations) happens here, never in callers.

use std::f64::consts::{PI, TAU};

use kurbo::Affine;

use crate::{
    core::Canvas,
    ease::Ease,
    error::{PicloopError, PicloopResult},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MotionKind {
    Float,
    Breathe,
    ShakeRotate,
    Bounce,
    Pulse,
    RotateRight,
    RotateLeft,
    Wobble,
    Jitter,
    SlideX,
    SlideY,
    FigureEight,
    Heartbeat,
    Elastic,
    Pendulum,
    Spiral,
    Wave,
    Zoom,
    FlipX,
    FlipY,
    TypewriterReveal,
    Fade,
    SlideBounce,
}

impl MotionKind {
    pub const ALL: [MotionKind; 23] = [
        Self::Float,
        Self::Breathe,
        Self::ShakeRotate,
        Self::Bounce,
        Self::Pulse,
        Self::RotateRight,
        Self::RotateLeft,
        Self::Wobble,
        Self::Jitter,
        Self::SlideX,
        Self::SlideY,
        Self::FigureEight,
        Self::Heartbeat,
        Self::Elastic,
        Self::Pendulum,
        Self::Spiral,
        Self::Wave,
        Self::Zoom,
        Self::FlipX,
        Self::FlipY,
        Self::TypewriterReveal,
        Self::Fade,
        Self::SlideBounce,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Breathe => "breathe",
            Self::ShakeRotate => "shake-rotate",
            Self::Bounce => "bounce",
            Self::Pulse => "pulse",
            Self::RotateRight => "rotate-right",
            Self::RotateLeft => "rotate-left",
            Self::Wobble => "wobble",
            Self::Jitter => "jitter",
            Self::SlideX => "slide-x",
            Self::SlideY => "slide-y",
            Self::FigureEight => "figure-eight",
            Self::Heartbeat => "heartbeat",
            Self::Elastic => "elastic",
            Self::Pendulum => "pendulum",
            Self::Spiral => "spiral",
            Self::Wave => "wave",
            Self::Zoom => "zoom",
            Self::FlipX => "flip-x",
            Self::FlipY => "flip-y",
            Self::TypewriterReveal => "typewriter-reveal",
            Self::Fade => "fade",
            Self::SlideBounce => "slide-bounce",
        }
    }

    pub fn parse_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

/// Immutable parameter snapshot, taken once per render or export. Keeping the
/// engine free of shared mutable state is what makes preview and export
/// sampling agree.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct MotionParams {
    pub kind: MotionKind,
    /// Seconds per full cycle, > 0.
    pub speed_secs: f64,
    /// Amplitude scale in [0,1].
    pub intensity: f64,
    /// Phase offset in seconds, >= 0, added before the speed division.
    pub delay_secs: f64,
    pub ease: Ease,
    /// Determinism seed for the `jitter` kind; same seed, same shake.
    pub seed: u64,
}

impl MotionParams {
    pub fn validate(&self) -> PicloopResult<()> {
        if !self.speed_secs.is_finite() || self.speed_secs <= 0.0 {
            return Err(PicloopError::config("speed_secs must be finite and > 0"));
        }
        if !self.intensity.is_finite() || !(0.0..=1.0).contains(&self.intensity) {
            return Err(PicloopError::config("intensity must be in [0,1]"));
        }
        if !self.delay_secs.is_finite() || self.delay_secs < 0.0 {
            return Err(PicloopError::config("delay_secs must be finite and >= 0"));
        }
        Ok(())
    }

    /// Cycle phase for a wall-clock elapsed time in seconds.
    pub fn phase_at(&self, elapsed_secs: f64) -> f64 {
        (elapsed_secs + self.delay_secs) / self.speed_secs
    }
}

/// One sampled transform: translation, per-axis scale, rotation about the
/// canvas center, a global alpha multiplier, and a left-aligned reveal
/// fraction (only `typewriter-reveal` moves it off 1.0 — it changes
/// rasterization, not the affine).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionSample {
    pub dx: f64,
    pub dy: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub rotation_rad: f64,
    pub alpha: f64,
    pub clip_fraction: f64,
}

impl MotionSample {
    pub fn identity() -> Self {
        Self {
            dx: 0.0,
            dy: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation_rad: 0.0,
            alpha: 1.0,
            clip_fraction: 1.0,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Composes the sample into an affine pivoting on the canvas center:
    /// translation, then rotation, then scale, all about (w/2, h/2).
    pub fn to_affine(&self, target: Canvas) -> Affine {
        let cx = f64::from(target.width) / 2.0;
        let cy = f64::from(target.height) / 2.0;
        Affine::translate((cx + self.dx, cy + self.dy))
            * Affine::rotate(self.rotation_rad)
            * Affine::scale_non_uniform(self.scale_x, self.scale_y)
            * Affine::translate((-cx, -cy))
    }
}

/// Samples the transform for an unbounded cycle phase.
pub fn sample(params: &MotionParams, phase: f64) -> PicloopResult<MotionSample> {
    params.validate()?;
    if !phase.is_finite() {
        return Err(PicloopError::config("cycle phase must be finite"));
    }

    let intensity = params.intensity.clamp(0.0, 1.0);

    // Zero intensity degenerates every kind to the identity; fade is the one
    // exception and keeps oscillating over the full [0,1] alpha range.
    if intensity == 0.0 && params.kind != MotionKind::Fade {
        return Ok(MotionSample::identity());
    }

    let wrapped = phase.rem_euclid(1.0);
    let eased = params.ease.apply(wrapped);
    let amp = intensity * 50.0;
    let sin1 = (wrapped * TAU).sin();
    // The x2 sub-oscillation, wrapped before the trig call.
    let sin2 = ((phase * 2.0).rem_euclid(1.0) * TAU).sin();

    let mut s = MotionSample::identity();
    match params.kind {
        MotionKind::Float => s.dy = sin1 * amp,
        MotionKind::Breathe => {
            let scale = 1.0 + sin1 * (intensity * 0.1);
            s.scale_x = scale;
            s.scale_y = scale;
        }
        MotionKind::ShakeRotate => s.rotation_rad = sin1 * deg(5.0) * intensity,
        MotionKind::Bounce => s.dy = -sin2.abs() * amp,
        MotionKind::Pulse => {
            let scale = 1.0 + eased * (intensity * 0.2);
            s.scale_x = scale;
            s.scale_y = scale;
        }
        MotionKind::RotateRight => s.rotation_rad = wrapped * TAU,
        MotionKind::RotateLeft => s.rotation_rad = -wrapped * TAU,
        MotionKind::Wobble => s.rotation_rad = sin2 * deg(10.0) * intensity,
        MotionKind::Jitter => {
            let h = mix64(params.seed ^ phase.to_bits());
            s.dx = unit_signed(h) * amp / 2.0;
            s.dy = unit_signed(mix64(h)) * amp / 2.0;
        }
        MotionKind::SlideX => s.dx = sin1 * amp,
        MotionKind::SlideY => s.dy = sin1 * amp,
        MotionKind::FigureEight => {
            s.dx = sin1 * amp;
            s.dy = sin2 * (amp / 2.0);
        }
        MotionKind::Heartbeat => {
            let beat = (sin2 + 1.0) / 2.0 * (intensity * 0.1);
            s.scale_x = 1.0 + beat;
            s.scale_y = 1.0 + beat;
        }
        MotionKind::Elastic => {
            let scale = 1.0 + Ease::Bounce.apply(eased) * (intensity * 0.2);
            s.scale_x = scale;
            s.scale_y = scale;
        }
        MotionKind::Pendulum => s.rotation_rad = sin1 * deg(45.0) * intensity,
        MotionKind::Spiral => {
            // Two full turns per cycle, combined with an eased shrink.
            s.rotation_rad = (phase * 2.0).rem_euclid(1.0) * TAU;
            let scale = 1.0 - eased * (intensity * 0.5);
            s.scale_x = scale;
            s.scale_y = scale;
        }
        MotionKind::Wave => s.dy = (wrapped * TAU + PI / 2.0).sin() * amp,
        MotionKind::Zoom => {
            let scale = 1.0 + sin1 * (intensity * 0.5);
            s.scale_x = scale;
            s.scale_y = scale;
        }
        MotionKind::FlipX => s.scale_x = -1.0 + 2.0 * eased,
        MotionKind::FlipY => s.scale_y = -1.0 + 2.0 * eased,
        MotionKind::TypewriterReveal => s.clip_fraction = eased,
        MotionKind::Fade => s.alpha = sin1.abs() * (1.0 - intensity) + intensity,
        MotionKind::SlideBounce => s.dx = Ease::Bounce.apply(eased) * amp * 2.0 - amp,
    }

    Ok(s)
}

fn deg(d: f64) -> f64 {
    d * PI / 180.0
}

fn mix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

// Uniform in [-0.5, 0.5) from the top 53 bits.
fn unit_signed(bits: u64) -> f64 {
    (bits >> 11) as f64 / (1u64 << 53) as f64 - 0.5
}
