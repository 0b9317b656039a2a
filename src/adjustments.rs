//! The adjustment parameter record.
//!
//! An [`AdjustmentSet`] is a flat record of signed dials plus optional typed
//! sub-records (HSL, tone curve, split toning, color grading, lens
//! corrections, local adjustments). It describes *what* an edit is; the
//! [`pipeline`](crate::pipeline) decides *how* it turns into backend
//! primitives.
//!
//! ## Ranges
//!
//! | Field | Range |
//! |---|---|
//! | `exposure` | -2.0 ..= 2.0 (stops) |
//! | `contrast`, `highlights`, `shadows`, `whites`, `blacks`, `tint`, `vibrance`, `saturation`, `clarity`, `dehaze`, `vignette` | -100 ..= 100 |
//! | `temperature` | -1000 ..= 1000 |
//! | `sharpening`, `noise_reduction` | 0 ..= 100 |
//!
//! Ranges are a convention, not a type-level guarantee: deserialized values
//! pass through untouched until someone calls [`AdjustmentSet::clamped`].
//!
//! ## Identity
//!
//! Every scalar at 0 with no extensions is the identity adjustment. The
//! pipeline plans zero operations for it, so pixels pass through unchanged.

use crate::presets::AdjustmentPatch;
use serde::{Deserialize, Serialize};

pub const EXPOSURE_RANGE: (f32, f32) = (-2.0, 2.0);
pub const SIGNED_RANGE: (f32, f32) = (-100.0, 100.0);
pub const TEMPERATURE_RANGE: (f32, f32) = (-1000.0, 1000.0);
pub const AMOUNT_RANGE: (f32, f32) = (0.0, 100.0);

pub(crate) fn clamp(value: f32, (lo, hi): (f32, f32)) -> f32 {
    value.clamp(lo, hi)
}

/// Complete parameter record for one photo edit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdjustmentSet {
    pub exposure: f32,
    pub contrast: f32,
    pub highlights: f32,
    pub shadows: f32,
    pub whites: f32,
    pub blacks: f32,
    pub temperature: f32,
    pub tint: f32,
    pub vibrance: f32,
    pub saturation: f32,
    pub clarity: f32,
    pub dehaze: f32,
    pub sharpening: f32,
    pub noise_reduction: f32,
    pub vignette: f32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hsl: Option<HslAdjustments>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone_curve: Option<ToneCurve>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_toning: Option<SplitToning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_grading: Option<ColorGrading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lens_corrections: Option<LensCorrections>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub local_adjustments: Vec<LocalAdjustment>,
}

impl AdjustmentSet {
    /// The identity adjustment.
    pub fn identity() -> Self {
        Self::default()
    }

    /// True when every scalar is zero and no extension is present.
    pub fn is_identity(&self) -> bool {
        self.scalars().iter().all(|v| *v == 0.0)
            && self.hsl.is_none()
            && self.tone_curve.is_none()
            && self.split_toning.is_none()
            && self.color_grading.is_none()
            && self.lens_corrections.is_none()
            && self.local_adjustments.is_empty()
    }

    fn scalars(&self) -> [f32; 15] {
        [
            self.exposure,
            self.contrast,
            self.highlights,
            self.shadows,
            self.whites,
            self.blacks,
            self.temperature,
            self.tint,
            self.vibrance,
            self.saturation,
            self.clarity,
            self.dehaze,
            self.sharpening,
            self.noise_reduction,
            self.vignette,
        ]
    }

    /// Return a copy with every dial clamped into its documented range.
    ///
    /// Sub-records are clamped to -100..=100 field by field, and each local
    /// adjustment's patch gets the same ranges as the top-level dials.
    pub fn clamped(&self) -> Self {
        Self {
            exposure: clamp(self.exposure, EXPOSURE_RANGE),
            contrast: clamp(self.contrast, SIGNED_RANGE),
            highlights: clamp(self.highlights, SIGNED_RANGE),
            shadows: clamp(self.shadows, SIGNED_RANGE),
            whites: clamp(self.whites, SIGNED_RANGE),
            blacks: clamp(self.blacks, SIGNED_RANGE),
            temperature: clamp(self.temperature, TEMPERATURE_RANGE),
            tint: clamp(self.tint, SIGNED_RANGE),
            vibrance: clamp(self.vibrance, SIGNED_RANGE),
            saturation: clamp(self.saturation, SIGNED_RANGE),
            clarity: clamp(self.clarity, SIGNED_RANGE),
            dehaze: clamp(self.dehaze, SIGNED_RANGE),
            sharpening: clamp(self.sharpening, AMOUNT_RANGE),
            noise_reduction: clamp(self.noise_reduction, AMOUNT_RANGE),
            vignette: clamp(self.vignette, SIGNED_RANGE),
            hsl: self.hsl.as_ref().map(HslAdjustments::clamped),
            tone_curve: self.tone_curve.as_ref().map(ToneCurve::clamped),
            split_toning: self.split_toning.as_ref().map(SplitToning::clamped),
            color_grading: self.color_grading.as_ref().map(ColorGrading::clamped),
            lens_corrections: self.lens_corrections.as_ref().map(LensCorrections::clamped),
            local_adjustments: self
                .local_adjustments
                .iter()
                .map(LocalAdjustment::clamped)
                .collect(),
        }
    }
}

/// The eight hue families addressed by per-channel HSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HueFamily {
    Red,
    Orange,
    Yellow,
    Green,
    Aqua,
    Blue,
    Purple,
    Magenta,
}

impl HueFamily {
    /// Fixed iteration order used by the pipeline.
    pub const ALL: [HueFamily; 8] = [
        HueFamily::Red,
        HueFamily::Orange,
        HueFamily::Yellow,
        HueFamily::Green,
        HueFamily::Aqua,
        HueFamily::Blue,
        HueFamily::Purple,
        HueFamily::Magenta,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HueFamily::Red => "red",
            HueFamily::Orange => "orange",
            HueFamily::Yellow => "yellow",
            HueFamily::Green => "green",
            HueFamily::Aqua => "aqua",
            HueFamily::Blue => "blue",
            HueFamily::Purple => "purple",
            HueFamily::Magenta => "magenta",
        }
    }
}

/// Hue / saturation / luminance offsets for one hue family, each -100..=100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HueBand {
    pub hue: f32,
    pub saturation: f32,
    pub luminance: f32,
}

impl HueBand {
    pub fn is_neutral(&self) -> bool {
        self.hue == 0.0 && self.saturation == 0.0 && self.luminance == 0.0
    }

    fn clamped(&self) -> Self {
        Self {
            hue: clamp(self.hue, SIGNED_RANGE),
            saturation: clamp(self.saturation, SIGNED_RANGE),
            luminance: clamp(self.luminance, SIGNED_RANGE),
        }
    }
}

/// Per-channel HSL keyed by hue family.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HslAdjustments {
    pub red: HueBand,
    pub orange: HueBand,
    pub yellow: HueBand,
    pub green: HueBand,
    pub aqua: HueBand,
    pub blue: HueBand,
    pub purple: HueBand,
    pub magenta: HueBand,
}

impl HslAdjustments {
    pub fn band(&self, family: HueFamily) -> &HueBand {
        match family {
            HueFamily::Red => &self.red,
            HueFamily::Orange => &self.orange,
            HueFamily::Yellow => &self.yellow,
            HueFamily::Green => &self.green,
            HueFamily::Aqua => &self.aqua,
            HueFamily::Blue => &self.blue,
            HueFamily::Purple => &self.purple,
            HueFamily::Magenta => &self.magenta,
        }
    }

    pub fn band_mut(&mut self, family: HueFamily) -> &mut HueBand {
        match family {
            HueFamily::Red => &mut self.red,
            HueFamily::Orange => &mut self.orange,
            HueFamily::Yellow => &mut self.yellow,
            HueFamily::Green => &mut self.green,
            HueFamily::Aqua => &mut self.aqua,
            HueFamily::Blue => &mut self.blue,
            HueFamily::Purple => &mut self.purple,
            HueFamily::Magenta => &mut self.magenta,
        }
    }

    pub(crate) fn clamped(&self) -> Self {
        let mut out = self.clone();
        for family in HueFamily::ALL {
            *out.band_mut(family) = self.band(family).clamped();
        }
        out
    }
}

/// Offsets for the four parametric curve regions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParametricCurve {
    pub highlights: f32,
    pub lights: f32,
    pub darks: f32,
    pub shadows: f32,
}

/// Tone curve: four zone offsets plus four parametric offsets.
///
/// Only the `highlights` and `shadows` zones drive pixels today; `lights`,
/// `darks` and the parametric block are carried through untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToneCurve {
    pub highlights: f32,
    pub lights: f32,
    pub darks: f32,
    pub shadows: f32,
    pub parametric: ParametricCurve,
}

impl ToneCurve {
    pub(crate) fn clamped(&self) -> Self {
        Self {
            highlights: clamp(self.highlights, SIGNED_RANGE),
            lights: clamp(self.lights, SIGNED_RANGE),
            darks: clamp(self.darks, SIGNED_RANGE),
            shadows: clamp(self.shadows, SIGNED_RANGE),
            parametric: ParametricCurve {
                highlights: clamp(self.parametric.highlights, SIGNED_RANGE),
                lights: clamp(self.parametric.lights, SIGNED_RANGE),
                darks: clamp(self.parametric.darks, SIGNED_RANGE),
                shadows: clamp(self.parametric.shadows, SIGNED_RANGE),
            },
        }
    }
}

/// Split toning: tint highlights and shadows with separate hues.
///
/// Hues are in degrees (0..360), saturations and balance in -100..=100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SplitToning {
    pub highlight_hue: f32,
    pub highlight_saturation: f32,
    pub shadow_hue: f32,
    pub shadow_saturation: f32,
    pub balance: f32,
}

impl SplitToning {
    pub(crate) fn clamped(&self) -> Self {
        Self {
            highlight_hue: self.highlight_hue.clamp(0.0, 360.0),
            highlight_saturation: clamp(self.highlight_saturation, SIGNED_RANGE),
            shadow_hue: self.shadow_hue.clamp(0.0, 360.0),
            shadow_saturation: clamp(self.shadow_saturation, SIGNED_RANGE),
            balance: clamp(self.balance, SIGNED_RANGE),
        }
    }
}

/// One color-grading wheel: hue in degrees, saturation and luminance -100..=100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GradingWheel {
    pub hue: f32,
    pub saturation: f32,
    pub luminance: f32,
}

impl GradingWheel {
    pub fn is_neutral(&self) -> bool {
        self.hue == 0.0 && self.saturation == 0.0 && self.luminance == 0.0
    }

    fn clamped(&self) -> Self {
        Self {
            hue: self.hue.clamp(0.0, 360.0),
            saturation: clamp(self.saturation, SIGNED_RANGE),
            luminance: clamp(self.luminance, SIGNED_RANGE),
        }
    }
}

/// Three-way color grading.
///
/// Only the shadow wheel drives pixels; midtones, highlights and the global
/// controls are carried through untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorGrading {
    pub shadows: GradingWheel,
    pub midtones: GradingWheel,
    pub highlights: GradingWheel,
    pub global_saturation: f32,
    pub global_luminance: f32,
    pub balance: f32,
}

impl ColorGrading {
    pub(crate) fn clamped(&self) -> Self {
        Self {
            shadows: self.shadows.clamped(),
            midtones: self.midtones.clamped(),
            highlights: self.highlights.clamped(),
            global_saturation: clamp(self.global_saturation, SIGNED_RANGE),
            global_luminance: clamp(self.global_luminance, SIGNED_RANGE),
            balance: clamp(self.balance, SIGNED_RANGE),
        }
    }
}

/// Lens corrections. Only `vignetting` has a pixel effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LensCorrections {
    pub chromatic_aberration: f32,
    pub distortion: f32,
    pub vignetting: f32,
    pub fringing: f32,
}

impl LensCorrections {
    pub(crate) fn clamped(&self) -> Self {
        Self {
            chromatic_aberration: clamp(self.chromatic_aberration, SIGNED_RANGE),
            distortion: clamp(self.distortion, SIGNED_RANGE),
            vignetting: clamp(self.vignetting, SIGNED_RANGE),
            fringing: clamp(self.fringing, SIGNED_RANGE),
        }
    }
}

/// Mask geometry for a local adjustment, in normalized image coordinates (0..1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MaskGeometry {
    Radial {
        center_x: f32,
        center_y: f32,
        radius_x: f32,
        radius_y: f32,
        #[serde(default)]
        feather: f32,
    },
    Linear {
        start_x: f32,
        start_y: f32,
        end_x: f32,
        end_y: f32,
    },
}

/// A masked adjustment: geometry plus a partial adjustment payload.
///
/// Stored and round-tripped, but not rendered by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalAdjustment {
    pub geometry: MaskGeometry,
    #[serde(default)]
    pub adjustments: AdjustmentPatch,
    #[serde(default)]
    pub inverted: bool,
}

impl LocalAdjustment {
    pub fn clamped(&self) -> Self {
        Self {
            adjustments: self.adjustments.clamped(),
            ..self.clone()
        }
    }
}
