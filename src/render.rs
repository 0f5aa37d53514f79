//! CPU frame renderer: applies one motion sample to the source image and
//! produces a straight-alpha RGBA8 buffer for the target canvas.
//!
//! Every call starts from a cleared, freshly allocated buffer, so no transform
//! or alpha state can leak between frames.

use kurbo::Point;

use crate::{
    core::{Canvas, SourceImage},
    error::{PicloopError, PicloopResult},
    motion::MotionSample,
};

/// Renders one frame. The source image is drawn scaled to the full target
/// canvas, through the sample's affine (translate, rotate, scale about the
/// canvas center), then masked by the left-aligned clip rectangle when
/// `clip_fraction < 1`, with the sample's global alpha applied last.
pub fn render_rgba8(
    sample: &MotionSample,
    src: &SourceImage,
    target: Canvas,
) -> PicloopResult<Vec<u8>> {
    let mut out = vec![0u8; target.byte_len_rgba8()?];

    if sample.clip_fraction <= 0.0 || sample.alpha <= 0.0 {
        return Ok(out);
    }

    let affine = sample.to_affine(target);
    if affine.determinant().abs() < 1e-12 {
        // Degenerate scale (e.g. a flip at its midpoint) collapses the image
        // to a zero-area line; the frame is empty.
        return Ok(out);
    }
    let inverse = affine.inverse();

    let tw = f64::from(target.width);
    let th = f64::from(target.height);
    // Source is stretched to the target, so draw space == target space.
    let sx_per_tx = f64::from(src.width) / tw;
    let sy_per_ty = f64::from(src.height) / th;
    let clip_x = tw * sample.clip_fraction.min(1.0);
    let alpha = sample.alpha.clamp(0.0, 1.0);

    for y in 0..target.height {
        let row = (y as usize * target.width as usize) * 4;
        for x in 0..target.width {
            let p = inverse * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
            if p.x < 0.0 || p.x >= tw || p.y < 0.0 || p.y >= th || p.x >= clip_x {
                continue;
            }

            let px = sample_bilinear(src, p.x * sx_per_tx, p.y * sy_per_ty);
            let a = px[3] * alpha;
            if a <= 0.0 {
                continue;
            }

            let o = row + x as usize * 4;
            out[o] = px[0].round().clamp(0.0, 255.0) as u8;
            out[o + 1] = px[1].round().clamp(0.0, 255.0) as u8;
            out[o + 2] = px[2].round().clamp(0.0, 255.0) as u8;
            out[o + 3] = a.round().clamp(0.0, 255.0) as u8;
        }
    }

    Ok(out)
}

/// Convenience check used by callers that hold a decoded image behind an
/// option; exporting with no image loaded is a user-visible input error.
pub fn require_source(src: Option<&SourceImage>) -> PicloopResult<&SourceImage> {
    src.ok_or_else(|| PicloopError::input("no source image loaded"))
}

fn sample_bilinear(src: &SourceImage, x: f64, y: f64) -> [f64; 4] {
    let fx = x - 0.5;
    let fy = y - 0.5;
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = fx - x0;
    let ty = fy - y0;
    let x0 = x0 as i64;
    let y0 = y0 as i64;

    let c00 = texel(src, x0, y0);
    let c10 = texel(src, x0 + 1, y0);
    let c01 = texel(src, x0, y0 + 1);
    let c11 = texel(src, x0 + 1, y0 + 1);

    let mut out = [0.0f64; 4];
    for (i, o) in out.iter_mut().enumerate() {
        let top = c00[i] * (1.0 - tx) + c10[i] * tx;
        let bot = c01[i] * (1.0 - tx) + c11[i] * tx;
        *o = top * (1.0 - ty) + bot * ty;
    }
    out
}

fn texel(src: &SourceImage, x: i64, y: i64) -> [f64; 4] {
    // Clamp to the image edge; fully outside coordinates never reach here
    // because the draw-space bounds check rejects them first.
    let x = x.clamp(0, i64::from(src.width) - 1) as usize;
    let y = y.clamp(0, i64::from(src.height) - 1) as usize;
    let o = (y * src.width as usize + x) * 4;
    [
        f64::from(src.data[o]),
        f64::from(src.data[o + 1]),
        f64::from(src.data[o + 2]),
        f64::from(src.data[o + 3]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ease::Ease, motion::{MotionKind, MotionParams, sample}};

    fn solid_source(w: u32, h: u32, rgba: [u8; 4]) -> SourceImage {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take((w * h * 4) as usize)
            .collect();
        SourceImage::new(w, h, data).unwrap()
    }

    #[test]
    fn identity_sample_fills_target_with_source() {
        let src = solid_source(2, 2, [10, 20, 30, 255]);
        let target = Canvas::new(4, 4).unwrap();
        let out = render_rgba8(&MotionSample::identity(), &src, target).unwrap();
        assert_eq!(out.len(), 64);
        for px in out.chunks_exact(4) {
            assert_eq!(px, [10, 20, 30, 255]);
        }
    }

    #[test]
    fn global_alpha_scales_output_alpha() {
        let src = solid_source(2, 2, [10, 20, 30, 255]);
        let target = Canvas::new(4, 4).unwrap();
        let mut s = MotionSample::identity();
        s.alpha = 0.5;
        let out = render_rgba8(&s, &src, target).unwrap();
        for px in out.chunks_exact(4) {
            assert_eq!(px[3], 128);
            assert_eq!(&px[..3], [10, 20, 30]);
        }
    }

    #[test]
    fn clip_fraction_reveals_left_half() {
        let src = solid_source(2, 2, [200, 0, 0, 255]);
        let target = Canvas::new(8, 4).unwrap();
        let mut s = MotionSample::identity();
        s.clip_fraction = 0.5;
        let out = render_rgba8(&s, &src, target).unwrap();
        for y in 0..4usize {
            for x in 0..8usize {
                let a = out[(y * 8 + x) * 4 + 3];
                if x < 4 {
                    assert_eq!(a, 255, "({x},{y})");
                } else {
                    assert_eq!(a, 0, "({x},{y})");
                }
            }
        }
    }

    #[test]
    fn translation_moves_pixels_out_of_frame() {
        let src = solid_source(2, 2, [0, 255, 0, 255]);
        let target = Canvas::new(4, 4).unwrap();
        let mut s = MotionSample::identity();
        s.dx = 2.0;
        let out = render_rgba8(&s, &src, target).unwrap();
        // Left two columns are vacated, right two still covered.
        for y in 0..4usize {
            assert_eq!(out[(y * 4) * 4 + 3], 0);
            assert_eq!(out[(y * 4 + 3) * 4 + 3], 255);
        }
    }

    #[test]
    fn degenerate_scale_yields_empty_frame() {
        let src = solid_source(2, 2, [1, 2, 3, 255]);
        let target = Canvas::new(4, 4).unwrap();
        let params = MotionParams {
            kind: MotionKind::FlipX,
            speed_secs: 2.0,
            intensity: 1.0,
            delay_secs: 0.0,
            ease: Ease::Linear,
            seed: 0,
        };
        // Linear ease at half phase puts the flip exactly at scale_x == 0.
        let s = sample(&params, 0.5).unwrap();
        assert_eq!(s.scale_x, 0.0);
        let out = render_rgba8(&s, &src, target).unwrap();
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn successive_calls_are_independent() {
        let src = solid_source(2, 2, [9, 9, 9, 255]);
        let target = Canvas::new(4, 4).unwrap();
        let mut s = MotionSample::identity();
        s.rotation_rad = 1.0;
        let _ = render_rgba8(&s, &src, target).unwrap();
        let a = render_rgba8(&MotionSample::identity(), &src, target).unwrap();
        let b = render_rgba8(&MotionSample::identity(), &src, target).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_source_is_an_input_error() {
        let err = require_source(None).unwrap_err();
        assert!(err.to_string().contains("input error"));
    }
}
