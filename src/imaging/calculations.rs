//! Pure calculation functions for adjustment stages and resize geometry.
//!
//! All functions here are pure and testable without any I/O or images. The
//! pipeline calls them to turn user-facing dials into backend parameters.

use super::params::{Fit, Modulate, ResizeParams, Sharpening};
use crate::adjustments::{GradingWheel, HueBand, SplitToning};

/// Brightness scaling for an exposure value in stops: `2^exposure`.
///
/// # Examples
/// ```
/// # use darkroom::imaging::calculations::exposure_gamma;
/// assert_eq!(exposure_gamma(1.0), 2.0);
/// assert_eq!(exposure_gamma(-2.0), 0.25);
/// ```
pub fn exposure_gamma(exposure: f32) -> f32 {
    exposure.exp2()
}

/// Linear multiplier for contrast: `1 + contrast/100`.
pub fn contrast_multiplier(contrast: f32) -> f32 {
    1.0 + contrast / 100.0
}

/// Combined brightness multiplier for the highlights/shadows pair.
///
/// Raising shadows and lowering highlights both brighten.
pub fn highlights_shadows_brightness(highlights: f32, shadows: f32) -> f32 {
    1.0 + (shadows - highlights) / 200.0
}

/// `(scale, offset)` for the whites/blacks linear transform.
pub fn whites_blacks_linear(whites: f32, blacks: f32) -> (f32, f32) {
    (1.0 + whites / 100.0 * 0.5, blacks / 100.0 * 10.0)
}

/// Combined saturation multiplier; vibrance is not distinguished from saturation.
pub fn saturation_multiplier(saturation: f32, vibrance: f32) -> f32 {
    1.0 + (saturation + vibrance) / 200.0
}

/// Hue rotation in degrees for temperature and tint.
pub fn white_balance_hue(temperature: f32, tint: f32) -> f32 {
    ((temperature / 1000.0) * 0.5 + (tint / 1000.0) * 0.3) * 180.0
}

/// Linear scale for the tone-curve highlights zone.
pub fn tone_curve_highlights_scale(highlights: f32) -> f32 {
    1.0 + highlights / 200.0
}

/// Brightness multiplier for the tone-curve shadows zone.
pub fn tone_curve_shadows_brightness(shadows: f32) -> f32 {
    1.0 + shadows / 200.0
}

/// Modulation for the shadow color-grading wheel.
pub fn shadow_grading(wheel: &GradingWheel) -> Modulate {
    Modulate {
        brightness: 1.0 + wheel.luminance / 100.0,
        saturation: 1.0 + wheel.saturation / 100.0,
        hue: wheel.hue * 0.1,
    }
}

/// Maximum hue rotation in degrees an HSL band can apply at ±100.
pub const HSL_MAX_HUE_SHIFT: f32 = 30.0;

/// Modulation for one HSL band.
pub fn hsl_band(band: &HueBand) -> Modulate {
    Modulate {
        brightness: 1.0 + band.luminance / 100.0,
        saturation: 1.0 + band.saturation / 100.0,
        hue: band.hue / 100.0 * HSL_MAX_HUE_SHIFT,
    }
}

/// Unsharp mask for the sharpening dial (0..=100).
pub fn sharpening(amount: f32) -> Sharpening {
    Sharpening {
        sigma: 1.0,
        amount: amount / 100.0 * 1.5,
        threshold: 0,
    }
}

/// Smallest blur sigma the backend is asked for.
pub const MIN_BLUR_SIGMA: f32 = 0.3;

/// A noise-reduction or softening filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SmoothingFilter {
    Median(u32),
    Blur(f32),
}

/// Filter for the noise-reduction dial (0..=100).
///
/// Above half strength a median filter is used, its radius growing with
/// strength; at or below half a light Gaussian blur.
pub fn noise_reduction(amount: f32) -> SmoothingFilter {
    let strength = amount / 100.0;
    if strength > 0.5 {
        SmoothingFilter::Median((strength * 3.0).ceil() as u32)
    } else {
        SmoothingFilter::Blur((strength * 2.0).max(MIN_BLUR_SIGMA))
    }
}

/// Local-contrast treatment for clarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClarityFilter {
    Sharpen(Sharpening),
    Blur(f32),
}

/// Filter for the clarity dial. `None` at zero.
pub fn clarity(clarity: f32) -> Option<ClarityFilter> {
    if clarity > 0.0 {
        Some(ClarityFilter::Sharpen(Sharpening {
            sigma: 3.0,
            amount: clarity / 100.0,
            threshold: 0,
        }))
    } else if clarity < 0.0 {
        Some(ClarityFilter::Blur(
            (clarity.abs() / 100.0 * 2.0).max(MIN_BLUR_SIGMA),
        ))
    } else {
        None
    }
}

/// Brightness multiplier approximating a vignette.
///
/// Positive values darken the edges (darker overall), negative values
/// lighten them.
pub fn vignette_brightness(vignette: f32) -> f32 {
    let strength = vignette.abs() / 100.0;
    if vignette > 0.0 {
        1.0 - strength * 0.4
    } else {
        1.0 + strength * 0.3
    }
}

/// Modulation and `(scale, offset)` linear transform for dehaze.
///
/// Negative values invert the signs and add a flat offset to simulate haze.
pub fn dehaze(dehaze: f32) -> (Modulate, (f32, f32)) {
    let strength = dehaze.abs() / 100.0;
    if dehaze >= 0.0 {
        (
            Modulate {
                brightness: 1.0 + strength * 0.1,
                saturation: 1.0 + strength * 0.2,
                hue: 0.0,
            },
            (1.0 + strength * 0.3, 0.0),
        )
    } else {
        (
            Modulate {
                brightness: 1.0 - strength * 0.1,
                saturation: 1.0 - strength * 0.2,
                hue: 0.0,
            },
            (1.0 - strength * 0.3, strength * 20.0),
        )
    }
}

/// Hue rotation in degrees from the combined split-toning hues.
pub fn split_toning_hue(split: &SplitToning) -> f32 {
    (split.highlight_hue + split.shadow_hue) * 0.05
}

/// 3x3 RGB hue-rotation matrix (luminance-preserving, Rec. 709 weights).
pub fn hue_rotation_matrix(degrees: f32) -> [[f32; 3]; 3] {
    let (sin, cos) = degrees.to_radians().sin_cos();
    [
        [
            0.213 + cos * 0.787 - sin * 0.213,
            0.715 - cos * 0.715 - sin * 0.715,
            0.072 - cos * 0.072 + sin * 0.928,
        ],
        [
            0.213 - cos * 0.213 + sin * 0.143,
            0.715 + cos * 0.285 + sin * 0.140,
            0.072 - cos * 0.072 - sin * 0.283,
        ],
        [
            0.213 - cos * 0.213 - sin * 0.787,
            0.715 - cos * 0.715 + sin * 0.715,
            0.072 + cos * 0.928 + sin * 0.072,
        ],
    ]
}

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may exceed.
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height will match, width will exceed
        let h = tgt_h;
        let w = (h as f64 * src_aspect).round() as u32;
        (w.max(1), h)
    } else {
        // Source is taller: width will match, height will exceed
        let w = tgt_w;
        let h = (w as f64 / src_aspect).round() as u32;
        (w, h.max(1))
    }
}

/// Calculate the final output dimensions of a resize.
///
/// A missing side is derived from the source aspect ratio, in which case
/// the fit mode is irrelevant. With both sides given:
/// - `Inside`: largest size with the source aspect that fits the box
/// - `Cover` / `Fill`: exactly the box
///
/// Returns `None` when neither side is set.
pub fn calculate_resize_dimensions(
    source: (u32, u32),
    params: &ResizeParams,
) -> Option<(u32, u32)> {
    let (src_w, src_h) = source;
    let aspect = src_w as f64 / src_h as f64;
    match (params.width, params.height) {
        (None, None) => None,
        (Some(w), None) => Some((w, ((w as f64 / aspect).round() as u32).max(1))),
        (None, Some(h)) => Some((((h as f64 * aspect).round() as u32).max(1), h)),
        (Some(w), Some(h)) => match params.fit {
            Fit::Cover | Fit::Fill => Some((w, h)),
            Fit::Inside => {
                let scale = (w as f64 / src_w as f64).min(h as f64 / src_h as f64);
                Some((
                    ((src_w as f64 * scale).round() as u32).max(1),
                    ((src_h as f64 * scale).round() as u32).max(1),
                ))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    // =========================================================================
    // Stage formulas
    // =========================================================================

    #[test]
    fn exposure_one_stop_doubles() {
        assert!(approx(exposure_gamma(1.0), 2.0));
    }

    #[test]
    fn exposure_minus_two_stops_quarters() {
        assert!(approx(exposure_gamma(-2.0), 0.25));
    }

    #[test]
    fn exposure_zero_is_unity() {
        assert_eq!(exposure_gamma(0.0), 1.0);
    }

    #[test]
    fn contrast_fifty_is_one_and_a_half() {
        assert!(approx(contrast_multiplier(50.0), 1.5));
        assert!(approx(contrast_multiplier(-100.0), 0.0));
    }

    #[test]
    fn highlights_shadows_are_coupled() {
        assert!(approx(highlights_shadows_brightness(0.0, 40.0), 1.2));
        assert!(approx(highlights_shadows_brightness(-40.0, 0.0), 1.2));
        assert!(approx(highlights_shadows_brightness(30.0, 30.0), 1.0));
    }

    #[test]
    fn whites_blacks_scale_and_offset() {
        let (scale, offset) = whites_blacks_linear(100.0, -50.0);
        assert!(approx(scale, 1.5));
        assert!(approx(offset, -5.0));
    }

    #[test]
    fn saturation_and_vibrance_combine() {
        assert!(approx(saturation_multiplier(50.0, 50.0), 1.5));
        assert!(approx(saturation_multiplier(-100.0, -100.0), 0.0));
    }

    #[test]
    fn white_balance_hue_degrees() {
        assert!(approx(white_balance_hue(1000.0, 0.0), 90.0));
        assert!(approx(white_balance_hue(0.0, 100.0), 5.4));
        assert!(approx(white_balance_hue(-1000.0, 0.0), -90.0));
    }

    #[test]
    fn tone_curve_zones() {
        assert!(approx(tone_curve_highlights_scale(-40.0), 0.8));
        assert!(approx(tone_curve_shadows_brightness(20.0), 1.1));
    }

    #[test]
    fn shadow_grading_scales_hue_by_tenth() {
        let m = shadow_grading(&GradingWheel {
            hue: 200.0,
            saturation: 50.0,
            luminance: -20.0,
        });
        assert!(approx(m.hue, 20.0));
        assert!(approx(m.saturation, 1.5));
        assert!(approx(m.brightness, 0.8));
    }

    #[test]
    fn hsl_band_maps_to_modulate() {
        let m = hsl_band(&HueBand {
            hue: 100.0,
            saturation: -100.0,
            luminance: 25.0,
        });
        assert!(approx(m.hue, HSL_MAX_HUE_SHIFT));
        assert!(approx(m.saturation, 0.0));
        assert!(approx(m.brightness, 1.25));
    }

    #[test]
    fn sharpening_amount_scales() {
        let s = sharpening(100.0);
        assert_eq!(s.sigma, 1.0);
        assert!(approx(s.amount, 1.5));
    }

    #[test]
    fn noise_reduction_switches_at_half() {
        assert_eq!(noise_reduction(50.0), SmoothingFilter::Blur(1.0));
        assert_eq!(noise_reduction(10.0), SmoothingFilter::Blur(MIN_BLUR_SIGMA));
        assert_eq!(noise_reduction(60.0), SmoothingFilter::Median(2));
        assert_eq!(noise_reduction(100.0), SmoothingFilter::Median(3));
    }

    #[test]
    fn clarity_directions() {
        assert_eq!(clarity(0.0), None);
        match clarity(50.0) {
            Some(ClarityFilter::Sharpen(s)) => {
                assert_eq!(s.sigma, 3.0);
                assert!(approx(s.amount, 0.5));
            }
            other => panic!("expected sharpen, got {other:?}"),
        }
        assert_eq!(clarity(-100.0), Some(ClarityFilter::Blur(2.0)));
    }

    #[test]
    fn vignette_sign_conventions() {
        assert!(approx(vignette_brightness(100.0), 0.6));
        assert!(approx(vignette_brightness(-100.0), 1.3));
        assert!(approx(vignette_brightness(50.0), 0.8));
    }

    #[test]
    fn dehaze_positive_and_negative() {
        let (m, (scale, offset)) = dehaze(100.0);
        assert!(approx(m.brightness, 1.1));
        assert!(approx(m.saturation, 1.2));
        assert!(approx(scale, 1.3));
        assert_eq!(offset, 0.0);

        let (m, (scale, offset)) = dehaze(-50.0);
        assert!(approx(m.brightness, 0.95));
        assert!(approx(m.saturation, 0.9));
        assert!(approx(scale, 0.85));
        assert!(approx(offset, 10.0));
    }

    #[test]
    fn split_toning_combined_hue() {
        let split = SplitToning {
            highlight_hue: 40.0,
            shadow_hue: 200.0,
            ..Default::default()
        };
        assert!(approx(split_toning_hue(&split), 12.0));
    }

    #[test]
    fn hue_rotation_zero_is_identity() {
        let m = hue_rotation_matrix(0.0);
        for (i, row) in m.iter().enumerate() {
            for (j, v) in row.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!(approx(*v, expected), "m[{i}][{j}] = {v}");
            }
        }
    }

    #[test]
    fn hue_rotation_rows_preserve_gray() {
        // Each row sums to 1 for any angle, so neutral pixels stay neutral.
        let m = hue_rotation_matrix(73.0);
        for row in m {
            assert!(approx(row.iter().sum::<f32>(), 1.0));
        }
    }

    // =========================================================================
    // Resize geometry
    // =========================================================================

    #[test]
    fn fill_dimensions_wider_source() {
        assert_eq!(calculate_fill_dimensions((1600, 900), (400, 400)), (711, 400));
    }

    #[test]
    fn fill_dimensions_taller_source() {
        assert_eq!(calculate_fill_dimensions((900, 1600), (400, 400)), (400, 711));
    }

    #[test]
    fn resize_width_only_keeps_aspect() {
        let params = ResizeParams {
            width: Some(800),
            ..Default::default()
        };
        assert_eq!(calculate_resize_dimensions((4000, 3000), &params), Some((800, 600)));
    }

    #[test]
    fn resize_height_only_keeps_aspect() {
        let params = ResizeParams {
            height: Some(300),
            ..Default::default()
        };
        assert_eq!(calculate_resize_dimensions((4000, 3000), &params), Some((400, 300)));
    }

    #[test]
    fn resize_inside_fits_box() {
        let params = ResizeParams {
            width: Some(1000),
            height: Some(1000),
            fit: Fit::Inside,
        };
        assert_eq!(calculate_resize_dimensions((4000, 2000), &params), Some((1000, 500)));
    }

    #[test]
    fn resize_cover_and_fill_use_box() {
        for fit in [Fit::Cover, Fit::Fill] {
            let params = ResizeParams {
                width: Some(300),
                height: Some(200),
                fit,
            };
            assert_eq!(calculate_resize_dimensions((1000, 1000), &params), Some((300, 200)));
        }
    }

    #[test]
    fn resize_without_target_is_none() {
        assert_eq!(calculate_resize_dimensions((10, 10), &ResizeParams::default()), None);
    }
}
