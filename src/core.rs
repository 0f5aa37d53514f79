use crate::error::{PicloopError, PicloopResult};

/// Render target dimensions in device pixels (post size-scale).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> PicloopResult<Self> {
        if width == 0 || height == 0 {
            return Err(PicloopError::config("canvas width/height must be > 0"));
        }
        Ok(Self { width, height })
    }

    pub fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn byte_len_rgba8(self) -> PicloopResult<usize> {
        self.pixel_count()
            .checked_mul(4)
            .ok_or_else(|| PicloopError::config("canvas buffer size overflow"))
    }
}

/// Export frame rates are picked from a fixed catalog, matching the UI choices.
pub const FPS_CATALOG: [u32; 6] = [10, 12, 15, 24, 30, 60];

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps(u32);

impl Fps {
    pub fn new(fps: u32) -> PicloopResult<Self> {
        if !FPS_CATALOG.contains(&fps) {
            return Err(PicloopError::config(format!(
                "fps must be one of {FPS_CATALOG:?}, got {fps}"
            )));
        }
        Ok(Self(fps))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0)
    }

    pub fn frame_delay_ms(self) -> f64 {
        1000.0 / self.as_f64()
    }
}

/// A decoded still image at the input boundary: straight (non-premultiplied)
/// RGBA8, tightly packed rows.
#[derive(Clone, Debug)]
pub struct SourceImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl SourceImage {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> PicloopResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| PicloopError::input("source image size overflow"))?;
        if width == 0 || height == 0 {
            return Err(PicloopError::input("source image must be non-empty"));
        }
        if data.len() != expected {
            return Err(PicloopError::input(format!(
                "source image data length {} does not match {}x{} rgba8",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }
}

/// One rendered animation frame: an RGBA8 pixel buffer plus the display delay
/// it should be shown for. `premultiplied` tags which alpha convention the
/// buffer currently uses; the export pipeline flips it exactly once on the
/// APNG path.
#[derive(Clone, Debug)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
    pub delay_ms: f64,
}

impl Frame {
    pub fn validate(&self) -> PicloopResult<()> {
        let expected = (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| PicloopError::config("frame buffer size overflow"))?;
        if self.data.len() != expected {
            return Err(PicloopError::config(
                "frame data length does not match width*height*4",
            ));
        }
        if !(self.delay_ms > 0.0) {
            return Err(PicloopError::config("frame delay must be > 0 ms"));
        }
        Ok(())
    }
}

pub(crate) fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

/// Premultiply RGB by alpha, in place. `R' = round(R * A / 255)`, alpha
/// unchanged. The buffer must already be straight-alpha; callers track that
/// via `Frame::premultiplied`.
pub fn premultiply_rgba8_in_place(data: &mut [u8]) -> PicloopResult<()> {
    if !data.len().is_multiple_of(4) {
        return Err(PicloopError::config(
            "premultiply expects an rgba8 buffer (len % 4 == 0)",
        ));
    }
    for px in data.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 255 {
            continue;
        }
        px[0] = mul_div255(u16::from(px[0]), a);
        px[1] = mul_div255(u16::from(px[1]), a);
        px[2] = mul_div255(u16::from(px[2]), a);
    }
    Ok(())
}
