//! The adjustment pipeline: an [`AdjustmentSet`] becomes an ordered list of
//! backend primitives, which are then run against an image.
//!
//! Planning is pure. [`plan`] looks only at the numbers and decides which
//! stages run and with what parameters; [`run_plan`] hands each op to an
//! [`ImageBackend`]. Splitting the two keeps the stage logic testable without
//! touching pixels and lets the CLI print a plan without decoding anything.
//!
//! ## Stage order
//!
//! Stages always run in this order. A stage whose dials are all at zero (or
//! whose sub-record is absent) contributes nothing.
//!
//! | # | Stage | Primitive(s) |
//! |---|---|---|
//! | 1 | exposure | gamma |
//! | 2 | contrast | linear |
//! | 3 | highlights / shadows | modulate (brightness) |
//! | 4 | whites / blacks | linear |
//! | 5 | saturation / vibrance | modulate (saturation) |
//! | 6 | temperature / tint | modulate (hue) |
//! | 7 | tone curve | linear, modulate |
//! | 8 | color grading | modulate |
//! | 9 | HSL | modulate per hue family |
//! | 10 | sharpening | unsharp mask |
//! | 11 | noise reduction | median or blur |
//! | 12 | clarity | unsharp mask or blur |
//! | 13 | vignette | modulate (brightness) |
//! | 14 | dehaze | modulate + linear |
//! | 15 | lens corrections | modulate (vignette compensation) |
//! | 16 | split toning | modulate (hue) |
//!
//! Masked transforms (vignette, HSL bands, grading wheels, split toning) are
//! applied globally. Tone-curve lights/darks, parametric offsets, lens
//! distortion/CA/fringing and local adjustments are carried in the data model
//! but have no pixel effect yet.

use crate::adjustments::{AdjustmentSet, HueFamily, ParametricCurve};
use crate::imaging::calculations::{self, ClarityFilter, SmoothingFilter};
use crate::imaging::{BackendError, ImageBackend, Modulate, Sharpening};
use image::DynamicImage;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("exceeded {budget:?} deadline before {at}")]
    TimedOut { budget: Duration, at: &'static str },
}

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Exposure,
    Contrast,
    HighlightsShadows,
    WhitesBlacks,
    SaturationVibrance,
    TemperatureTint,
    ToneCurve,
    ColorGrading,
    Hsl,
    Sharpening,
    NoiseReduction,
    Clarity,
    Vignette,
    Dehaze,
    LensCorrections,
    SplitToning,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Exposure => "exposure",
            Stage::Contrast => "contrast",
            Stage::HighlightsShadows => "highlights/shadows",
            Stage::WhitesBlacks => "whites/blacks",
            Stage::SaturationVibrance => "saturation/vibrance",
            Stage::TemperatureTint => "temperature/tint",
            Stage::ToneCurve => "tone curve",
            Stage::ColorGrading => "color grading",
            Stage::Hsl => "hsl",
            Stage::Sharpening => "sharpening",
            Stage::NoiseReduction => "noise reduction",
            Stage::Clarity => "clarity",
            Stage::Vignette => "vignette",
            Stage::Dehaze => "dehaze",
            Stage::LensCorrections => "lens corrections",
            Stage::SplitToning => "split toning",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single backend primitive with its parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    Gamma(f32),
    Linear { scale: f32, offset: f32 },
    Modulate(Modulate),
    Sharpen(Sharpening),
    Blur(f32),
    Median(u32),
}

impl Op {
    /// Ops that cannot change a pixel.
    fn is_noop(&self) -> bool {
        match self {
            Op::Gamma(g) => *g == 1.0,
            Op::Linear { scale, offset } => *scale == 1.0 && *offset == 0.0,
            Op::Modulate(m) => m.is_neutral(),
            Op::Sharpen(s) => s.amount == 0.0,
            Op::Blur(_) | Op::Median(_) => false,
        }
    }

    fn run<B: ImageBackend + ?Sized>(
        self,
        backend: &B,
        img: DynamicImage,
    ) -> Result<DynamicImage, BackendError> {
        match self {
            Op::Gamma(g) => backend.gamma(img, g),
            Op::Linear { scale, offset } => backend.linear(img, scale, offset),
            Op::Modulate(m) => backend.modulate(img, m),
            Op::Sharpen(s) => backend.sharpen(img, s),
            Op::Blur(sigma) => backend.blur(img, sigma),
            Op::Median(radius) => backend.median(img, radius),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Gamma(g) => write!(f, "gamma {g:.3}"),
            Op::Linear { scale, offset } => write!(f, "linear scale={scale:.3} offset={offset:.2}"),
            Op::Modulate(m) => write!(
                f,
                "modulate brightness={:.3} saturation={:.3} hue={:.1}°",
                m.brightness, m.saturation, m.hue
            ),
            Op::Sharpen(s) => write!(f, "unsharp sigma={:.1} amount={:.3}", s.sigma, s.amount),
            Op::Blur(sigma) => write!(f, "blur sigma={sigma:.2}"),
            Op::Median(radius) => write!(f, "median radius={radius}"),
        }
    }
}

/// One step of a pipeline plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedOp {
    pub stage: Stage,
    pub op: Op,
    /// Set for HSL steps.
    pub band: Option<HueFamily>,
}

impl fmt::Display for PlannedOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.band {
            Some(band) => write!(f, "{} ({}): {}", self.stage, band.as_str(), self.op),
            None => write!(f, "{}: {}", self.stage, self.op),
        }
    }
}

/// Wall-clock budget for processing one file.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn expired(&self) -> bool {
        self.started.elapsed() >= self.budget
    }

    /// `Err(TimedOut)` once the budget is spent. `at` names the step about to run.
    pub fn check(&self, at: &'static str) -> Result<(), PipelineError> {
        if self.expired() {
            Err(PipelineError::TimedOut {
                budget: self.budget,
                at,
            })
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
struct Planner {
    ops: Vec<PlannedOp>,
}

impl Planner {
    fn push(&mut self, stage: Stage, op: Op) {
        self.push_band(stage, op, None);
    }

    fn push_band(&mut self, stage: Stage, op: Op, band: Option<HueFamily>) {
        if !op.is_noop() {
            self.ops.push(PlannedOp { stage, op, band });
        }
    }

    fn vignette(&mut self, stage: Stage, amount: f32) {
        if amount != 0.0 {
            let brightness = calculations::vignette_brightness(amount);
            self.push(stage, Op::Modulate(Modulate::brightness(brightness)));
        }
    }
}

/// Turn an adjustment set into the ordered list of primitives to run.
///
/// The identity adjustment plans to an empty list.
pub fn plan(adj: &AdjustmentSet) -> Vec<PlannedOp> {
    let mut p = Planner::default();

    // 1-6: global tone and color
    if adj.exposure != 0.0 {
        p.push(
            Stage::Exposure,
            Op::Gamma(calculations::exposure_gamma(adj.exposure)),
        );
    }
    if adj.contrast != 0.0 {
        p.push(
            Stage::Contrast,
            Op::Linear {
                scale: calculations::contrast_multiplier(adj.contrast),
                offset: 0.0,
            },
        );
    }
    if adj.highlights != 0.0 || adj.shadows != 0.0 {
        let b = calculations::highlights_shadows_brightness(adj.highlights, adj.shadows);
        p.push(Stage::HighlightsShadows, Op::Modulate(Modulate::brightness(b)));
    }
    if adj.whites != 0.0 || adj.blacks != 0.0 {
        let (scale, offset) = calculations::whites_blacks_linear(adj.whites, adj.blacks);
        p.push(Stage::WhitesBlacks, Op::Linear { scale, offset });
    }
    if adj.saturation != 0.0 || adj.vibrance != 0.0 {
        let s = calculations::saturation_multiplier(adj.saturation, adj.vibrance);
        p.push(Stage::SaturationVibrance, Op::Modulate(Modulate::saturation(s)));
    }
    if adj.temperature != 0.0 || adj.tint != 0.0 {
        let hue = calculations::white_balance_hue(adj.temperature, adj.tint);
        p.push(Stage::TemperatureTint, Op::Modulate(Modulate::hue(hue)));
    }

    // 7-9: optional color sub-records
    if let Some(curve) = &adj.tone_curve {
        if curve.highlights != 0.0 {
            p.push(
                Stage::ToneCurve,
                Op::Linear {
                    scale: calculations::tone_curve_highlights_scale(curve.highlights),
                    offset: 0.0,
                },
            );
        }
        if curve.shadows != 0.0 {
            let b = calculations::tone_curve_shadows_brightness(curve.shadows);
            p.push(Stage::ToneCurve, Op::Modulate(Modulate::brightness(b)));
        }
        if curve.lights != 0.0
            || curve.darks != 0.0
            || curve.parametric != ParametricCurve::default()
        {
            tracing::debug!("tone curve lights/darks/parametric have no pixel effect");
        }
    }
    if let Some(grading) = &adj.color_grading {
        if !grading.shadows.is_neutral() {
            p.push(
                Stage::ColorGrading,
                Op::Modulate(calculations::shadow_grading(&grading.shadows)),
            );
        }
    }
    if let Some(hsl) = &adj.hsl {
        for family in HueFamily::ALL {
            let band = hsl.band(family);
            if !band.is_neutral() {
                p.push_band(
                    Stage::Hsl,
                    Op::Modulate(calculations::hsl_band(band)),
                    Some(family),
                );
            }
        }
    }

    // 10-12: detail
    if adj.sharpening > 0.0 {
        p.push(
            Stage::Sharpening,
            Op::Sharpen(calculations::sharpening(adj.sharpening)),
        );
    }
    if adj.noise_reduction > 0.0 {
        let op = match calculations::noise_reduction(adj.noise_reduction) {
            SmoothingFilter::Median(radius) => Op::Median(radius),
            SmoothingFilter::Blur(sigma) => Op::Blur(sigma),
        };
        p.push(Stage::NoiseReduction, op);
    }
    match calculations::clarity(adj.clarity) {
        Some(ClarityFilter::Sharpen(s)) => p.push(Stage::Clarity, Op::Sharpen(s)),
        Some(ClarityFilter::Blur(sigma)) => p.push(Stage::Clarity, Op::Blur(sigma)),
        None => {}
    }

    // 13-16: finishing
    p.vignette(Stage::Vignette, adj.vignette);
    if adj.dehaze != 0.0 {
        let (m, (scale, offset)) = calculations::dehaze(adj.dehaze);
        p.push(Stage::Dehaze, Op::Modulate(m));
        p.push(Stage::Dehaze, Op::Linear { scale, offset });
    }
    if let Some(lens) = &adj.lens_corrections {
        // Lens vignetting correction undoes a vignette of the same strength.
        p.vignette(Stage::LensCorrections, -lens.vignetting);
    }
    if let Some(split) = &adj.split_toning {
        if split.highlight_saturation != 0.0 || split.shadow_saturation != 0.0 {
            let hue = calculations::split_toning_hue(split);
            p.push(Stage::SplitToning, Op::Modulate(Modulate::hue(hue)));
        }
    }

    if !adj.local_adjustments.is_empty() {
        tracing::debug!(
            count = adj.local_adjustments.len(),
            "local adjustments are not rendered"
        );
    }

    p.ops
}

/// Run a plan against `img`.
///
/// With a deadline, the budget is checked before every op.
pub fn run_plan<B: ImageBackend + ?Sized>(
    backend: &B,
    img: DynamicImage,
    ops: &[PlannedOp],
    deadline: Option<&Deadline>,
) -> Result<DynamicImage, PipelineError> {
    let mut img = img;
    for planned in ops {
        if let Some(deadline) = deadline {
            deadline.check(planned.stage.name())?;
        }
        img = planned.op.run(backend, img)?;
    }
    Ok(img)
}

/// Apply an adjustment set to a decoded image.
pub fn apply<B: ImageBackend + ?Sized>(
    backend: &B,
    img: DynamicImage,
    adj: &AdjustmentSet,
) -> Result<DynamicImage, PipelineError> {
    let ops = plan(adj);
    tracing::debug!(ops = ops.len(), "applying adjustment plan");
    run_plan(backend, img, &ops, None)
}

/// [`apply`] with a per-call deadline checked between stages.
pub fn apply_with_deadline<B: ImageBackend + ?Sized>(
    backend: &B,
    img: DynamicImage,
    adj: &AdjustmentSet,
    deadline: &Deadline,
) -> Result<DynamicImage, PipelineError> {
    let ops = plan(adj);
    run_plan(backend, img, &ops, Some(deadline))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjustments::{
        ColorGrading, GradingWheel, HslAdjustments, HueBand, LensCorrections, SplitToning,
        ToneCurve,
    };
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use image::RgbImage;

    fn blank() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(4, 4))
    }

    fn stages(ops: &[PlannedOp]) -> Vec<Stage> {
        ops.iter().map(|p| p.stage).collect()
    }

    #[test]
    fn identity_plans_nothing() {
        assert!(plan(&AdjustmentSet::default()).is_empty());
    }

    #[test]
    fn identity_runs_no_primitives() {
        let backend = MockBackend::new();
        apply(&backend, blank(), &AdjustmentSet::default()).unwrap();
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn exposure_one_is_gamma_two() {
        let adj = AdjustmentSet {
            exposure: 1.0,
            ..Default::default()
        };
        let ops = plan(&adj);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].stage, Stage::Exposure);
        assert_eq!(ops[0].op, Op::Gamma(2.0));
    }

    #[test]
    fn contrast_fifty_is_linear_one_and_half() {
        let adj = AdjustmentSet {
            contrast: 50.0,
            ..Default::default()
        };
        assert_eq!(
            plan(&adj)[0].op,
            Op::Linear {
                scale: 1.5,
                offset: 0.0
            }
        );
    }

    #[test]
    fn stages_follow_fixed_order() {
        let adj = AdjustmentSet {
            split_toning: Some(SplitToning {
                highlight_hue: 40.0,
                highlight_saturation: 20.0,
                ..Default::default()
            }),
            dehaze: 30.0,
            vignette: 20.0,
            clarity: -30.0,
            noise_reduction: 80.0,
            sharpening: 40.0,
            hsl: Some(HslAdjustments {
                blue: HueBand {
                    saturation: -50.0,
                    ..Default::default()
                },
                ..Default::default()
            }),
            temperature: 200.0,
            saturation: 10.0,
            whites: 10.0,
            shadows: 20.0,
            contrast: 10.0,
            exposure: 0.5,
            ..Default::default()
        };

        let ops = plan(&adj);
        let order = stages(&ops);
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(order, sorted);
        assert_eq!(
            order,
            vec![
                Stage::Exposure,
                Stage::Contrast,
                Stage::HighlightsShadows,
                Stage::WhitesBlacks,
                Stage::SaturationVibrance,
                Stage::TemperatureTint,
                Stage::Hsl,
                Stage::Sharpening,
                Stage::NoiseReduction,
                Stage::Clarity,
                Stage::Vignette,
                Stage::Dehaze,
                Stage::Dehaze,
                Stage::SplitToning,
            ]
        );
    }

    #[test]
    fn run_plan_calls_backend_in_plan_order() {
        let adj = AdjustmentSet {
            exposure: -2.0,
            sharpening: 100.0,
            noise_reduction: 40.0,
            ..Default::default()
        };
        let backend = MockBackend::new();
        apply(&backend, blank(), &adj).unwrap();
        assert_eq!(
            backend.get_operations(),
            vec![
                RecordedOp::Gamma(0.25),
                RecordedOp::Sharpen(Sharpening {
                    sigma: 1.0,
                    amount: 1.5,
                    threshold: 0
                }),
                RecordedOp::Blur(0.8),
            ]
        );
    }

    #[test]
    fn balanced_highlights_and_shadows_cancel() {
        let adj = AdjustmentSet {
            highlights: 30.0,
            shadows: 30.0,
            ..Default::default()
        };
        assert!(plan(&adj).is_empty());
    }

    #[test]
    fn hsl_bands_run_in_family_order() {
        let hsl = HslAdjustments {
            magenta: HueBand {
                hue: 10.0,
                ..Default::default()
            },
            red: HueBand {
                luminance: 10.0,
                ..Default::default()
            },
            aqua: HueBand {
                saturation: 10.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let adj = AdjustmentSet {
            hsl: Some(hsl),
            ..Default::default()
        };
        let bands: Vec<_> = plan(&adj).iter().map(|p| p.band).collect();
        assert_eq!(
            bands,
            vec![
                Some(HueFamily::Red),
                Some(HueFamily::Aqua),
                Some(HueFamily::Magenta)
            ]
        );
    }

    #[test]
    fn tone_curve_wires_only_highlights_and_shadows() {
        let adj = AdjustmentSet {
            tone_curve: Some(ToneCurve {
                lights: 50.0,
                darks: -50.0,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(plan(&adj).is_empty());

        let adj = AdjustmentSet {
            tone_curve: Some(ToneCurve {
                highlights: -40.0,
                shadows: 20.0,
                ..Default::default()
            }),
            ..Default::default()
        };
        let ops = plan(&adj);
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0].op, Op::Linear { .. }));
        assert!(matches!(ops[1].op, Op::Modulate(_)));
    }

    #[test]
    fn color_grading_uses_shadow_wheel_only() {
        let adj = AdjustmentSet {
            color_grading: Some(ColorGrading {
                highlights: GradingWheel {
                    hue: 40.0,
                    saturation: 30.0,
                    luminance: 0.0,
                },
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(plan(&adj).is_empty());
    }

    #[test]
    fn lens_vignetting_inverts_vignette() {
        let adj = AdjustmentSet {
            lens_corrections: Some(LensCorrections {
                vignetting: -100.0,
                distortion: 50.0,
                ..Default::default()
            }),
            ..Default::default()
        };
        let ops = plan(&adj);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].stage, Stage::LensCorrections);
        match ops[0].op {
            Op::Modulate(m) => assert!((m.brightness - 0.6).abs() < 1e-6),
            other => panic!("expected modulate, got {other:?}"),
        }
    }

    #[test]
    fn split_toning_needs_saturation() {
        let adj = AdjustmentSet {
            split_toning: Some(SplitToning {
                highlight_hue: 60.0,
                shadow_hue: 200.0,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(plan(&adj).is_empty());
    }

    #[test]
    fn dehaze_negative_adds_haze_offset() {
        let adj = AdjustmentSet {
            dehaze: -100.0,
            ..Default::default()
        };
        let ops = plan(&adj);
        assert_eq!(ops.len(), 2);
        match ops[1].op {
            Op::Linear { scale, offset } => {
                assert!((scale - 0.7).abs() < 1e-6);
                assert!((offset - 20.0).abs() < 1e-6);
            }
            other => panic!("expected linear, got {other:?}"),
        }
    }

    #[test]
    fn spent_deadline_stops_before_first_stage() {
        let adj = AdjustmentSet {
            exposure: 1.0,
            ..Default::default()
        };
        let backend = MockBackend::new();
        let deadline = Deadline::after(Duration::ZERO);
        let err = apply_with_deadline(&backend, blank(), &adj, &deadline).unwrap_err();
        assert!(matches!(err, PipelineError::TimedOut { at: "exposure", .. }));
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn generous_deadline_runs_everything() {
        let adj = AdjustmentSet {
            exposure: 1.0,
            contrast: 20.0,
            ..Default::default()
        };
        let backend = MockBackend::new();
        let deadline = Deadline::after(Duration::from_secs(3600));
        apply_with_deadline(&backend, blank(), &adj, &deadline).unwrap();
        assert_eq!(backend.get_primitives().len(), 2);
    }

    #[test]
    fn planned_op_display_names_band() {
        let op = PlannedOp {
            stage: Stage::Hsl,
            op: Op::Median(2),
            band: Some(HueFamily::Blue),
        };
        assert_eq!(op.to_string(), "hsl (blue): median radius=2");
    }
}
