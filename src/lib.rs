#![forbid(unsafe_code)]

pub mod config;
pub mod core;
pub mod ease;
pub mod error;
pub mod export;
pub mod motion;
pub mod pipeline;
pub mod render;
pub mod sequence;

pub use config::JobConfig;
pub use core::{Canvas, FPS_CATALOG, Fps, Frame, SourceImage};
pub use ease::Ease;
pub use error::{PicloopError, PicloopResult};
pub use export::{
    ExportOutput, ExportPipeline, ExportSettings, ExportState, LoopCount, OutputFormat,
    QualityTier, export_frames,
};
pub use motion::{MotionKind, MotionParams, MotionSample, sample};
pub use pipeline::generate;
pub use render::render_rgba8;
pub use sequence::{CanvasGate, CanvasLease, ExportPlan, Preview, PreviewController, capture};
