//! Frame sequencing: a finite, deterministic export plan and an unbounded
//! live-preview clock, both driving the same transform engine.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Instant,
};

use crate::{
    core::{Canvas, Fps, Frame, SourceImage},
    error::{PicloopError, PicloopResult},
    motion::{MotionParams, MotionSample, sample},
    render::render_rgba8,
};

/// Discrete sampling plan for export: exactly `total_frames` frames covering
/// one full cycle, each shown for `frame_delay_ms`.
#[derive(Clone, Copy, Debug)]
pub struct ExportPlan {
    pub total_frames: u32,
    pub frame_delay_ms: f64,
    params: MotionParams,
}

impl ExportPlan {
    pub fn new(params: MotionParams, fps: Fps) -> PicloopResult<Self> {
        params.validate()?;
        // round(fps * speed), guarded against collapsing to zero frames.
        let total = (fps.as_f64() * params.speed_secs).round().max(1.0);
        if total > u32::MAX as f64 {
            return Err(PicloopError::config("export frame count overflow"));
        }
        Ok(Self {
            total_frames: total as u32,
            frame_delay_ms: fps.frame_delay_ms(),
            params,
        })
    }

    pub fn phase(&self, frame_index: u32) -> f64 {
        f64::from(frame_index) / f64::from(self.total_frames)
            + self.params.delay_secs / self.params.speed_secs
    }

    pub fn sample(&self, frame_index: u32) -> PicloopResult<MotionSample> {
        sample(&self.params, self.phase(frame_index))
    }
}

/// Captures the whole export sequence into freshly allocated frame buffers.
/// The returned frames alias nothing; a later render cannot mutate them.
#[tracing::instrument(skip(params, src), fields(kind = params.kind.name()))]
pub fn capture(
    params: &MotionParams,
    fps: Fps,
    src: &SourceImage,
    target: Canvas,
) -> PicloopResult<Vec<Frame>> {
    let plan = ExportPlan::new(*params, fps)?;
    let mut frames = Vec::with_capacity(plan.total_frames as usize);
    for i in 0..plan.total_frames {
        let s = plan.sample(i)?;
        let data = render_rgba8(&s, src, target)?;
        frames.push(Frame {
            width: target.width,
            height: target.height,
            data,
            premultiplied: false,
            delay_ms: plan.frame_delay_ms,
        });
    }
    tracing::debug!(frames = frames.len(), "capture complete");
    Ok(frames)
}

/// Starts and supersedes live previews. Starting a new preview (or calling
/// [`PreviewController::stop`]) bumps a shared generation counter; handles
/// from earlier generations refuse further ticks, so a stale loop can never
/// resurrect after a new image or parameter set is loaded.
#[derive(Clone, Debug, Default)]
pub struct PreviewController {
    generation: Arc<AtomicU64>,
}

impl PreviewController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, params: MotionParams) -> PicloopResult<Preview> {
        params.validate()?;
        let ticket = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        Ok(Preview {
            params,
            started: Instant::now(),
            ticket,
            generation: Arc::clone(&self.generation),
        })
    }

    pub fn stop(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

/// Handle for one running preview loop. Not restartable: a new preview gets a
/// fresh start timestamp from the controller.
#[derive(Clone, Debug)]
pub struct Preview {
    params: MotionParams,
    started: Instant,
    ticket: u64,
    generation: Arc<AtomicU64>,
}

impl Preview {
    pub fn is_live(&self) -> bool {
        self.generation.load(Ordering::Acquire) == self.ticket
    }

    /// Samples the transform for the current wall-clock time. Returns `None`
    /// once this preview has been stopped or superseded.
    pub fn sample_now(&self) -> PicloopResult<Option<MotionSample>> {
        self.sample_at(Instant::now())
    }

    pub fn sample_at(&self, now: Instant) -> PicloopResult<Option<MotionSample>> {
        if !self.is_live() {
            return Ok(None);
        }
        let elapsed = now.saturating_duration_since(self.started).as_secs_f64();
        let s = sample(&self.params, self.params.phase_at(elapsed))?;
        Ok(Some(s))
    }
}

/// Exclusive-access token over the canvas shared by preview and capture.
/// At most one lease exists at a time; an export holds it for its whole
/// duration, which also serializes export invocations.
#[derive(Clone, Debug, Default)]
pub struct CanvasGate {
    busy: Arc<AtomicBool>,
}

impl CanvasGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> PicloopResult<CanvasLease> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PicloopError::encode(
                "an export is already in flight for this canvas",
            ));
        }
        Ok(CanvasLease {
            busy: Arc::clone(&self.busy),
        })
    }

    pub fn is_held(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Released on drop, on completion and failure alike.
#[derive(Debug)]
pub struct CanvasLease {
    busy: Arc<AtomicBool>,
}

impl Drop for CanvasLease {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
