use crate::{
    config::JobConfig,
    core::SourceImage,
    error::PicloopResult,
    export::{ExportOutput, export_frames},
    sequence::{CanvasGate, capture},
};

/// Runs one full export: acquires the canvas (failing if an export is already
/// in flight), captures the frame sequence, and encodes it. The lease is held
/// for the whole duration and released on success and failure alike.
pub fn generate(
    config: &JobConfig,
    src: &SourceImage,
    gate: &CanvasGate,
) -> PicloopResult<ExportOutput> {
    config.validate()?;
    let _lease = gate.try_acquire()?;

    let target = config.target_for(src)?;
    let frames = capture(&config.motion_params(), config.fps()?, src, target)?;
    export_frames(config.export_settings(), frames)
}
