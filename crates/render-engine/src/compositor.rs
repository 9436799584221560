//! Frame compositor: lays the shadow over the primary at a given opacity.

use gymkhana_common::error::{GymkhanaError, GymkhanaResult};
use gymkhana_media::frame::Frame;

/// Per-channel linear blend `a * (1 - opacity) + b * opacity`.
///
/// Both frames must have the same size. Opacity is clamped into `[0, 1]`;
/// NaN counts as zero. Opacity 0 returns `a` and opacity 1 returns `b`
/// byte-for-byte.
pub fn blend(a: &Frame, b: &Frame, opacity: f64) -> GymkhanaResult<Frame> {
    if !a.same_size(b) || a.data.len() != b.data.len() {
        return Err(GymkhanaError::invalid_value(format!(
            "cannot blend a {}x{} frame with a {}x{} frame",
            a.width, a.height, b.width, b.height
        )));
    }

    let opacity = normalize_opacity(opacity);
    if opacity == 0.0 {
        return Ok(a.clone());
    }
    if opacity == 1.0 {
        return Ok(b.clone());
    }

    let keep = 1.0 - opacity;
    let data = a
        .data
        .iter()
        .zip(&b.data)
        .map(|(&pa, &pb)| {
            let v = pa as f64 * keep + pb as f64 * opacity;
            v.round().clamp(0.0, 255.0) as u8
        })
        .collect();

    Ok(Frame {
        width: a.width,
        height: a.height,
        data,
    })
}

/// Resize `shadow` to the primary's size when needed, then [`blend`].
pub fn composite(primary: &Frame, shadow: &Frame, opacity: f64) -> GymkhanaResult<Frame> {
    if primary.same_size(shadow) {
        return blend(primary, shadow, opacity);
    }
    let resized = shadow.resized(primary.width, primary.height)?;
    blend(primary, &resized, opacity)
}

fn normalize_opacity(opacity: f64) -> f64 {
    if opacity.is_nan() {
        0.0
    } else {
        opacity.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32, seed: u8) -> Frame {
        let data = (0..(width * height * 3) as usize)
            .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
            .collect();
        Frame::new(width, height, data).unwrap()
    }

    #[test]
    fn test_blend_endpoints_are_exact() {
        let a = gradient(7, 5, 3);
        let b = gradient(7, 5, 200);
        assert_eq!(blend(&a, &b, 0.0).unwrap(), a);
        assert_eq!(blend(&a, &b, 1.0).unwrap(), b);
    }

    #[test]
    fn test_blend_midpoint_rounds() {
        let a = Frame::filled(1, 1, [0, 100, 255]);
        let b = Frame::filled(1, 1, [255, 101, 0]);
        let out = blend(&a, &b, 0.5).unwrap();
        // 127.5 rounds away from zero, 100.5 too.
        assert_eq!(out.pixel(0, 0), Some([128, 101, 128]));
    }

    #[test]
    fn test_blend_clamps_opacity() {
        let a = gradient(2, 2, 0);
        let b = gradient(2, 2, 99);
        assert_eq!(blend(&a, &b, -3.0).unwrap(), a);
        assert_eq!(blend(&a, &b, 7.5).unwrap(), b);
        assert_eq!(blend(&a, &b, f64::NAN).unwrap(), a);
    }

    #[test]
    fn test_blend_rejects_size_mismatch() {
        let a = gradient(2, 2, 0);
        let b = gradient(3, 2, 0);
        assert!(blend(&a, &b, 0.5).is_err());
    }

    #[test]
    fn test_composite_resizes_shadow() {
        let primary = Frame::filled(8, 4, [0, 0, 0]);
        let shadow = Frame::filled(4, 2, [200, 100, 50]);
        let out = composite(&primary, &shadow, 0.5).unwrap();
        assert_eq!(out.dimensions(), (8, 4));
        assert!(out.data.chunks_exact(3).all(|px| px == [100, 50, 25]));
    }
}
