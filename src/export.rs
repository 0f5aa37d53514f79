//! Export pipeline: collects captured frames, applies format-specific pixel
//! preprocessing, and encodes them as GIF or APNG.
//!
//! The pipeline is a small state machine (Idle -> Collecting -> Encoding ->
//! Done | Failed). It owns its frame buffers exclusively; nothing aliases the
//! live-preview canvas.

use color_quant::NeuQuant;

use crate::{
    core::{Frame, premultiply_rgba8_in_place},
    error::{PicloopError, PicloopResult},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    Gif,
    Apng,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualityTier {
    High,
    Standard,
    Low,
}

impl QualityTier {
    /// Quantizer sampling factor. The scale is inverted: a higher number
    /// samples fewer pixels and yields lower visual quality.
    pub fn quantizer_speed(self) -> i32 {
        match self {
            Self::High => 10,
            Self::Standard => 20,
            Self::Low => 30,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoopCount {
    Infinite,
    Once,
    Count(u16),
}

impl LoopCount {
    /// GIF NETSCAPE repeat parameter. A single play writes a finite repeat of
    /// 0, which is distinct from the infinite marker; the `loop - 1`
    /// off-by-one only applies to finite counts above one.
    pub fn gif_repeat(self) -> gif::Repeat {
        match self {
            Self::Infinite => gif::Repeat::Infinite,
            Self::Once => gif::Repeat::Finite(0),
            Self::Count(n) => gif::Repeat::Finite(n.saturating_sub(1)),
        }
    }

    /// APNG acTL play count, 0 meaning infinite.
    pub fn apng_plays(self) -> u32 {
        match self {
            Self::Infinite => 0,
            Self::Once => 1,
            Self::Count(n) => u32::from(n.max(1)),
        }
    }
}

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct ExportSettings {
    pub format: OutputFormat,
    pub loop_count: LoopCount,
    /// Maximum palette size, 1-256. 256 means "no palette reduction" on the
    /// APNG path (truecolor output).
    pub color_limit: u16,
    pub quality: QualityTier,
}

impl ExportSettings {
    pub fn validate(&self) -> PicloopResult<()> {
        if !(1..=256).contains(&self.color_limit) {
            return Err(PicloopError::config("color_limit must be in 1..=256"));
        }
        if let LoopCount::Count(0) = self.loop_count {
            return Err(PicloopError::config("loop count must be >= 1"));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Collecting,
    Encoding,
    Done,
    Failed,
}

#[derive(Clone, Debug)]
pub struct ExportOutput {
    pub bytes: Vec<u8>,
}

impl ExportOutput {
    /// Human-readable size, handed to the download collaborator alongside the
    /// bytes.
    pub fn size_estimate(&self) -> String {
        format!("{:.2} KB", self.bytes.len() as f64 / 1024.0)
    }
}

pub struct ExportPipeline {
    settings: ExportSettings,
    state: ExportState,
    frames: Vec<Frame>,
}

impl ExportPipeline {
    pub fn new(settings: ExportSettings) -> PicloopResult<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            state: ExportState::Idle,
            frames: Vec::new(),
        })
    }

    pub fn state(&self) -> ExportState {
        self.state
    }

    pub fn begin(&mut self) -> PicloopResult<()> {
        if self.state != ExportState::Idle {
            return Err(PicloopError::encode("export already started"));
        }
        self.state = ExportState::Collecting;
        Ok(())
    }

    pub fn push_frame(&mut self, frame: Frame) -> PicloopResult<()> {
        if self.state != ExportState::Collecting {
            return Err(PicloopError::encode("pipeline is not collecting frames"));
        }
        frame.validate()?;
        if let Some(first) = self.frames.first() {
            if frame.width != first.width || frame.height != first.height {
                self.state = ExportState::Failed;
                return Err(PicloopError::encode(format!(
                    "frame size mismatch: got {}x{}, expected {}x{}",
                    frame.width, frame.height, first.width, first.height
                )));
            }
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Encodes the collected sequence. On failure no partial output exists;
    /// re-export is a fresh pipeline, never an automatic retry.
    #[tracing::instrument(skip(self), fields(format = ?self.settings.format, frames = self.frames.len()))]
    pub fn finish(&mut self) -> PicloopResult<ExportOutput> {
        if self.state != ExportState::Collecting {
            return Err(PicloopError::encode("pipeline is not collecting frames"));
        }
        if self.frames.is_empty() {
            self.state = ExportState::Failed;
            return Err(PicloopError::encode("no frames collected"));
        }
        self.state = ExportState::Encoding;

        let frames = std::mem::take(&mut self.frames);
        let result = match self.settings.format {
            OutputFormat::Gif => encode_gif(&frames, &self.settings),
            OutputFormat::Apng => encode_apng(frames, &self.settings),
        };

        match result {
            Ok(bytes) => {
                self.state = ExportState::Done;
                let out = ExportOutput { bytes };
                tracing::info!(size = %out.size_estimate(), "export encoded");
                Ok(out)
            }
            Err(e) => {
                self.state = ExportState::Failed;
                Err(e)
            }
        }
    }
}

/// One-shot convenience over the full pipeline state machine.
pub fn export_frames(
    settings: ExportSettings,
    frames: Vec<Frame>,
) -> PicloopResult<ExportOutput> {
    let mut pipeline = ExportPipeline::new(settings)?;
    pipeline.begin()?;
    for frame in frames {
        pipeline.push_frame(frame)?;
    }
    pipeline.finish()
}

// Palette index 0 is the reserved transparency key on both indexed paths.
const TRANSPARENT_INDEX: u8 = 0;
// GIF transparency is binary; APNG keeps partial alpha via tRNS.
const OPAQUE_CUTOFF: u8 = 128;

fn frame_dims(frames: &[Frame]) -> PicloopResult<(u32, u32)> {
    let first = frames
        .first()
        .ok_or_else(|| PicloopError::encode("no frames to encode"))?;
    Ok((first.width, first.height))
}

fn encode_gif(frames: &[Frame], settings: &ExportSettings) -> PicloopResult<Vec<u8>> {
    let (width, height) = frame_dims(frames)?;
    if width > u32::from(u16::MAX) || height > u32::from(u16::MAX) {
        return Err(PicloopError::encode("gif dimensions exceed 65535"));
    }

    let dither = settings.color_limit < 256;
    let speed = settings.quality.quantizer_speed();

    let mut out = Vec::new();
    {
        let mut encoder = gif::Encoder::new(&mut out, width as u16, height as u16, &[])
            .map_err(|e| PicloopError::encode(format!("failed to create gif encoder: {e}")))?;
        encoder
            .set_repeat(settings.loop_count.gif_repeat())
            .map_err(|e| PicloopError::encode(format!("failed to set gif repeat: {e}")))?;

        for frame in frames {
            let (palette, indices) =
                quantize_rgba8(&frame.data, width as usize, settings.color_limit, speed, dither);

            let mut gf = gif::Frame::default();
            gf.width = width as u16;
            gf.height = height as u16;
            gf.palette = Some(palette);
            gf.buffer = indices.into();
            gf.transparent = Some(TRANSPARENT_INDEX);
            gf.dispose = gif::DisposalMethod::Background;
            gf.delay = gif_delay_cs(frame.delay_ms);

            encoder
                .write_frame(&gf)
                .map_err(|e| PicloopError::encode(format!("failed to write gif frame: {e}")))?;
        }
    }
    Ok(out)
}

// GIF timing is in whole centiseconds, floored at one tick.
fn gif_delay_cs(delay_ms: f64) -> u16 {
    (delay_ms / 10.0).round().max(1.0) as u16
}

/// Quantizes one straight-alpha RGBA8 buffer to an indexed frame with palette
/// slot 0 reserved as the transparency key, optionally applying
/// Floyd-Steinberg error diffusion.
fn quantize_rgba8(
    data: &[u8],
    width: usize,
    color_limit: u16,
    samplefac: i32,
    dither: bool,
) -> (Vec<u8>, Vec<u8>) {
    let opaque: Vec<u8> = data
        .chunks_exact(4)
        .filter(|px| px[3] >= OPAQUE_CUTOFF)
        .flat_map(|px| [px[0], px[1], px[2], 255])
        .collect();

    if opaque.is_empty() {
        // Fully transparent frame; a single reserved entry suffices.
        return (vec![0, 0, 0], vec![TRANSPARENT_INDEX; data.len() / 4]);
    }

    let colors = usize::from(color_limit.min(255)).max(2);
    let nq = NeuQuant::new(samplefac, colors, &opaque);
    let map = nq.color_map_rgba();

    let mut palette = Vec::with_capacity((map.len() / 4) * 3 + 3);
    palette.extend_from_slice(&[0, 0, 0]);
    for entry in map.chunks_exact(4) {
        palette.extend_from_slice(&entry[..3]);
    }

    let total = data.len() / 4;
    let mut indices = Vec::with_capacity(total);
    let mut err = vec![[0.0f32; 3]; if dither { total } else { 0 }];

    for (i, px) in data.chunks_exact(4).enumerate() {
        if px[3] < OPAQUE_CUTOFF {
            indices.push(TRANSPARENT_INDEX);
            continue;
        }

        let mut rgb = [f32::from(px[0]), f32::from(px[1]), f32::from(px[2])];
        if dither {
            for c in 0..3 {
                rgb[c] = (rgb[c] + err[i][c]).clamp(0.0, 255.0);
            }
        }

        let probe = [rgb[0] as u8, rgb[1] as u8, rgb[2] as u8, 255];
        let idx = nq.index_of(&probe);
        indices.push((idx + 1) as u8);

        if dither {
            let chosen = &map[idx * 4..idx * 4 + 3];
            let x = i % width;
            for c in 0..3 {
                let diff = rgb[c] - f32::from(chosen[c]);
                // Floyd-Steinberg kernel: 7/16 right, 3/16 below-left,
                // 5/16 below, 1/16 below-right.
                if x + 1 < width && i + 1 < total {
                    err[i + 1][c] += diff * 7.0 / 16.0;
                }
                if i + width < total {
                    if x > 0 {
                        err[i + width - 1][c] += diff * 3.0 / 16.0;
                    }
                    err[i + width][c] += diff * 5.0 / 16.0;
                    if x + 1 < width && i + width + 1 < total {
                        err[i + width + 1][c] += diff * 1.0 / 16.0;
                    }
                }
            }
        }
    }

    (palette, indices)
}

fn encode_apng(mut frames: Vec<Frame>, settings: &ExportSettings) -> PicloopResult<Vec<u8>> {
    let (width, height) = frame_dims(&frames)?;

    // Premultiply each buffer exactly once, in place, before quantization.
    // Skipping it causes fringing on semi-transparent edges; doing it twice
    // darkens them, so a pre-tagged buffer is rejected outright.
    for frame in &mut frames {
        if frame.premultiplied {
            return Err(PicloopError::encode(
                "frame buffer is already premultiplied",
            ));
        }
        premultiply_rgba8_in_place(&mut frame.data)?;
        frame.premultiplied = true;
    }

    // All APNG frames share one uniform delay.
    let delay_num = frames[0].delay_ms.round().clamp(1.0, f64::from(u16::MAX)) as u16;

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_depth(png::BitDepth::Eight);

        // color_limit 256 is the "no palette" sentinel: truecolor RGBA.
        let indexed = settings.color_limit < 256;
        let frame_payloads: Vec<Vec<u8>> = if indexed {
            let (palette, trns, indexed_frames) =
                shared_palette(&frames, settings.color_limit, settings.quality);
            encoder.set_color(png::ColorType::Indexed);
            encoder.set_palette(palette);
            encoder.set_trns(trns);
            indexed_frames
        } else {
            encoder.set_color(png::ColorType::Rgba);
            frames.iter().map(|f| f.data.clone()).collect()
        };

        encoder
            .set_animated(frames.len() as u32, settings.loop_count.apng_plays())
            .map_err(|e| PicloopError::encode(format!("failed to set apng control: {e}")))?;
        encoder
            .set_frame_delay(delay_num, 1000)
            .map_err(|e| PicloopError::encode(format!("failed to set apng delay: {e}")))?;

        let mut writer = encoder
            .write_header()
            .map_err(|e| PicloopError::encode(format!("failed to write apng header: {e}")))?;

        for payload in &frame_payloads {
            writer
                .write_image_data(payload)
                .map_err(|e| PicloopError::encode(format!("failed to write apng frame: {e}")))?;
        }

        writer
            .finish()
            .map_err(|e| PicloopError::encode(format!("failed to finish apng: {e}")))?;
    }
    Ok(out)
}

/// Builds one palette over every frame (APNG frames share the PLTE chunk) and
/// maps each premultiplied buffer to palette indices. Quantization runs in
/// RGBA space so partial alpha survives the palette: each entry's quantized
/// alpha lands in tRNS, with slot 0 reserved as fully transparent.
fn shared_palette(
    frames: &[Frame],
    color_limit: u16,
    quality: QualityTier,
) -> (Vec<u8>, Vec<u8>, Vec<Vec<u8>>) {
    let visible: Vec<u8> = frames
        .iter()
        .flat_map(|f| f.data.chunks_exact(4))
        .filter(|px| px[3] > 0)
        .flatten()
        .copied()
        .collect();

    if visible.is_empty() {
        let indexed = frames
            .iter()
            .map(|f| vec![TRANSPARENT_INDEX; f.data.len() / 4])
            .collect();
        return (vec![0, 0, 0], vec![0], indexed);
    }

    let colors = usize::from(color_limit.min(255)).max(2);
    let nq = NeuQuant::new(quality.quantizer_speed(), colors, &visible);
    let map = nq.color_map_rgba();

    let mut palette = Vec::with_capacity((map.len() / 4) * 3 + 3);
    palette.extend_from_slice(&[0, 0, 0]);
    let mut trns = Vec::with_capacity(map.len() / 4 + 1);
    trns.push(0u8);
    for entry in map.chunks_exact(4) {
        palette.extend_from_slice(&entry[..3]);
        trns.push(entry[3]);
    }

    let indexed = frames
        .iter()
        .map(|f| {
            f.data
                .chunks_exact(4)
                .map(|px| {
                    if px[3] == 0 {
                        TRANSPARENT_INDEX
                    } else {
                        (nq.index_of(px) + 1) as u8
                    }
                })
                .collect()
        })
        .collect();

    (palette, trns, indexed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(w: u32, h: u32, rgba: [u8; 4]) -> Frame {
        Frame {
            width: w,
            height: h,
            data: rgba
                .iter()
                .copied()
                .cycle()
                .take((w * h * 4) as usize)
                .collect(),
            premultiplied: false,
            delay_ms: 66.67,
        }
    }

    fn settings(format: OutputFormat) -> ExportSettings {
        ExportSettings {
            format,
            loop_count: LoopCount::Infinite,
            color_limit: 128,
            quality: QualityTier::High,
        }
    }

    #[test]
    fn loop_mapping_distinguishes_infinite_and_once() {
        assert!(matches!(LoopCount::Infinite.gif_repeat(), gif::Repeat::Infinite));
        assert!(matches!(LoopCount::Once.gif_repeat(), gif::Repeat::Finite(0)));
        assert!(matches!(LoopCount::Count(3).gif_repeat(), gif::Repeat::Finite(2)));
        assert_eq!(LoopCount::Infinite.apng_plays(), 0);
        assert_eq!(LoopCount::Once.apng_plays(), 1);
        assert_eq!(LoopCount::Count(5).apng_plays(), 5);
    }

    #[test]
    fn quality_scale_is_inverted() {
        assert_eq!(QualityTier::High.quantizer_speed(), 10);
        assert_eq!(QualityTier::Standard.quantizer_speed(), 20);
        assert_eq!(QualityTier::Low.quantizer_speed(), 30);
    }

    #[test]
    fn pipeline_walks_the_state_machine() {
        let mut p = ExportPipeline::new(settings(OutputFormat::Gif)).unwrap();
        assert_eq!(p.state(), ExportState::Idle);
        assert!(p.push_frame(frame(2, 2, [255, 0, 0, 255])).is_err());

        p.begin().unwrap();
        assert_eq!(p.state(), ExportState::Collecting);
        assert!(p.begin().is_err());

        p.push_frame(frame(2, 2, [255, 0, 0, 255])).unwrap();
        p.push_frame(frame(2, 2, [0, 255, 0, 255])).unwrap();
        let out = p.finish().unwrap();
        assert_eq!(p.state(), ExportState::Done);
        assert!(!out.bytes.is_empty());
    }

    #[test]
    fn pipeline_rejects_mismatched_frames() {
        let mut p = ExportPipeline::new(settings(OutputFormat::Gif)).unwrap();
        p.begin().unwrap();
        p.push_frame(frame(2, 2, [1, 2, 3, 255])).unwrap();
        assert!(p.push_frame(frame(3, 2, [1, 2, 3, 255])).is_err());
        assert_eq!(p.state(), ExportState::Failed);
    }

    #[test]
    fn finish_without_frames_fails() {
        let mut p = ExportPipeline::new(settings(OutputFormat::Apng)).unwrap();
        p.begin().unwrap();
        assert!(p.finish().is_err());
        assert_eq!(p.state(), ExportState::Failed);
    }

    #[test]
    fn gif_output_has_magic_and_trailer() {
        let out = export_frames(
            settings(OutputFormat::Gif),
            vec![frame(4, 4, [255, 0, 0, 255]), frame(4, 4, [0, 0, 255, 255])],
        )
        .unwrap();
        assert_eq!(&out.bytes[..6], b"GIF89a");
        assert_eq!(*out.bytes.last().unwrap(), 0x3B);
    }

    #[test]
    fn apng_truecolor_sentinel_skips_palette() {
        let mut s = settings(OutputFormat::Apng);
        s.color_limit = 256;
        let out = export_frames(s, vec![frame(4, 4, [10, 20, 30, 200]); 2]).unwrap();
        // PNG signature, then IHDR: bit depth at 24, color type at 25.
        assert_eq!(&out.bytes[..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
        assert_eq!(out.bytes[25], 6, "expected truecolor-with-alpha");
    }

    #[test]
    fn apng_palette_path_writes_indexed_color() {
        let out = export_frames(
            settings(OutputFormat::Apng),
            vec![frame(4, 4, [10, 20, 30, 255]); 2],
        )
        .unwrap();
        assert_eq!(out.bytes[25], 3, "expected indexed color");
    }

    #[test]
    fn apng_palette_preserves_partial_alpha() {
        // Semi-transparent pixels must keep their alpha through the indexed
        // path instead of snapping to opaque.
        let out = export_frames(
            settings(OutputFormat::Apng),
            vec![frame(4, 4, [200, 80, 40, 160]); 2],
        )
        .unwrap();

        let decoder = png::Decoder::new(std::io::Cursor::new(&out.bytes));
        let reader = decoder.read_info().unwrap();
        let info = reader.info();
        assert_eq!(info.color_type, png::ColorType::Indexed);
        let trns = info.trns.as_ref().expect("indexed apng carries tRNS");
        assert_eq!(trns[0], 0, "slot 0 stays the fully transparent key");
        assert!(
            trns.iter().any(|&a| a > 0 && a < 255),
            "expected a partial-alpha palette entry, got {trns:?}"
        );
    }

    #[test]
    fn gif_delay_rounds_to_whole_centiseconds() {
        // 15 fps is 66.67 ms per frame; GIF can only express 70 ms.
        assert_eq!(gif_delay_cs(66.67), 7);
        assert_eq!(gif_delay_cs(1000.0 / 60.0), 2);
        assert_eq!(gif_delay_cs(100.0), 10);
        // Sub-centisecond delays floor at the minimum representable tick.
        assert_eq!(gif_delay_cs(3.0), 1);
    }

    #[test]
    fn apng_rejects_pre_premultiplied_frames() {
        let mut f = frame(2, 2, [10, 20, 30, 128]);
        f.premultiplied = true;
        let err = export_frames(settings(OutputFormat::Apng), vec![f]).unwrap_err();
        assert!(err.to_string().contains("premultiplied"));
    }

    #[test]
    fn fully_transparent_frames_still_encode() {
        let out = export_frames(
            settings(OutputFormat::Gif),
            vec![frame(2, 2, [0, 0, 0, 0]); 2],
        )
        .unwrap();
        assert_eq!(&out.bytes[..6], b"GIF89a");
    }

    #[test]
    fn settings_validation() {
        let mut s = settings(OutputFormat::Gif);
        s.color_limit = 0;
        assert!(s.validate().is_err());
        s.color_limit = 257;
        assert!(s.validate().is_err());
        s.color_limit = 1;
        assert!(s.validate().is_ok());
        s.loop_count = LoopCount::Count(0);
        assert!(s.validate().is_err());
    }

    #[test]
    fn size_estimate_is_human_readable() {
        let out = ExportOutput {
            bytes: vec![0u8; 2048],
        };
        assert_eq!(out.size_estimate(), "2.00 KB");
    }
}
