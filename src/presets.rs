//! Presets: named partial adjustments merged onto a base.
//!
//! A preset stores an [`AdjustmentPatch`]: the same fields as an
//! [`AdjustmentSet`], each optional. Resolving a preset is a plain override
//! merge: every field present in the patch replaces the base value, every
//! absent field keeps it. Structured sub-records (tone curve, HSL, ...) are
//! replaced wholesale, never merged field by field.
//!
//! ## Preset files
//!
//! Presets live in TOML files, one per preset:
//!
//! ```toml
//! name = "golden-hour"
//! description = "Warm, soft evening light"
//!
//! [adjustments]
//! temperature = 300
//! highlights = -20
//!
//! [adjustments.split_toning]
//! highlight_hue = 40
//! highlight_saturation = 25
//! ```
//!
//! [`PresetLibrary::load_dir`] reads every `*.toml` file in a directory on top
//! of the built-in presets. A user preset with the same name as a built-in
//! replaces it.

use crate::adjustments::{
    AMOUNT_RANGE, AdjustmentSet, ColorGrading, EXPOSURE_RANGE, HslAdjustments, LensCorrections,
    LocalAdjustment, SIGNED_RANGE, SplitToning, TEMPERATURE_RANGE, ToneCurve, clamp,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PresetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid preset {path}: {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("unknown preset: {0}")]
    NotFound(String),
}

/// Partial [`AdjustmentSet`]: only the fields that are `Some` override.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdjustmentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contrast: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlights: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadows: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whites: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blacks: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tint: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vibrance: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saturation: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dehaze: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sharpening: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise_reduction: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vignette: Option<f32>,
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_adjustments: Option<Vec<LocalAdjustment>>,
}

fn override_with<T: Clone>(slot: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *slot = v.clone();
    }
}

fn override_optional<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if let Some(v) = value {
        *slot = Some(v.clone());
    }
}

impl AdjustmentPatch {
    /// True when the patch overrides nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge this patch on top of `base`, returning the resolved set.
    pub fn apply_to(&self, base: &AdjustmentSet) -> AdjustmentSet {
        let mut out = base.clone();
        override_with(&mut out.exposure, &self.exposure);
        override_with(&mut out.contrast, &self.contrast);
        override_with(&mut out.highlights, &self.highlights);
        override_with(&mut out.shadows, &self.shadows);
        override_with(&mut out.whites, &self.whites);
        override_with(&mut out.blacks, &self.blacks);
        override_with(&mut out.temperature, &self.temperature);
        override_with(&mut out.tint, &self.tint);
        override_with(&mut out.vibrance, &self.vibrance);
        override_with(&mut out.saturation, &self.saturation);
        override_with(&mut out.clarity, &self.clarity);
        override_with(&mut out.dehaze, &self.dehaze);
        override_with(&mut out.sharpening, &self.sharpening);
        override_with(&mut out.noise_reduction, &self.noise_reduction);
        override_with(&mut out.vignette, &self.vignette);
        override_optional(&mut out.hsl, &self.hsl);
        override_optional(&mut out.tone_curve, &self.tone_curve);
        override_optional(&mut out.split_toning, &self.split_toning);
        override_optional(&mut out.color_grading, &self.color_grading);
        override_optional(&mut out.lens_corrections, &self.lens_corrections);
        override_with(&mut out.local_adjustments, &self.local_adjustments);
        out
    }

    /// Copy with every dial that is set clamped into the same range
    /// [`AdjustmentSet::clamped`] uses. Unset fields stay unset.
    pub fn clamped(&self) -> Self {
        let within = |v: Option<f32>, range: (f32, f32)| v.map(|v| clamp(v, range));
        Self {
            exposure: within(self.exposure, EXPOSURE_RANGE),
            contrast: within(self.contrast, SIGNED_RANGE),
            highlights: within(self.highlights, SIGNED_RANGE),
            shadows: within(self.shadows, SIGNED_RANGE),
            whites: within(self.whites, SIGNED_RANGE),
            blacks: within(self.blacks, SIGNED_RANGE),
            temperature: within(self.temperature, TEMPERATURE_RANGE),
            tint: within(self.tint, SIGNED_RANGE),
            vibrance: within(self.vibrance, SIGNED_RANGE),
            saturation: within(self.saturation, SIGNED_RANGE),
            clarity: within(self.clarity, SIGNED_RANGE),
            dehaze: within(self.dehaze, SIGNED_RANGE),
            sharpening: within(self.sharpening, AMOUNT_RANGE),
            noise_reduction: within(self.noise_reduction, AMOUNT_RANGE),
            vignette: within(self.vignette, SIGNED_RANGE),
            hsl: self.hsl.as_ref().map(HslAdjustments::clamped),
            tone_curve: self.tone_curve.as_ref().map(ToneCurve::clamped),
            split_toning: self.split_toning.as_ref().map(SplitToning::clamped),
            color_grading: self.color_grading.as_ref().map(ColorGrading::clamped),
            lens_corrections: self.lens_corrections.as_ref().map(LensCorrections::clamped),
            local_adjustments: self
                .local_adjustments
                .as_ref()
                .map(|locals| locals.iter().map(LocalAdjustment::clamped).collect()),
        }
    }
}

/// A named, stored adjustment patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Preset {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub adjustments: AdjustmentPatch,
}

impl Preset {
    fn builtin(name: &str, description: &str, adjustments: AdjustmentPatch) -> Self {
        Self {
            name: name.to_string(),
            description: Some(description.to_string()),
            adjustments,
        }
    }
}

/// Merge `preset` onto `base`.
pub fn resolve(base: &AdjustmentSet, preset: &Preset) -> AdjustmentSet {
    preset.adjustments.apply_to(base)
}

/// Presets addressable by name: built-ins plus any loaded from disk.
#[derive(Debug, Clone)]
pub struct PresetLibrary {
    presets: BTreeMap<String, Preset>,
}

impl Default for PresetLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PresetLibrary {
    /// An empty library with no presets.
    pub fn empty() -> Self {
        Self {
            presets: BTreeMap::new(),
        }
    }

    /// The presets that ship with darkroom.
    pub fn builtin() -> Self {
        let mut library = Self::empty();
        for preset in builtin_presets() {
            library.insert(preset);
        }
        library
    }

    /// Add or replace a preset, keyed by its name (case-insensitive).
    pub fn insert(&mut self, preset: Preset) {
        self.presets.insert(preset.name.to_lowercase(), preset);
    }

    pub fn get(&self, name: &str) -> Option<&Preset> {
        self.presets.get(&name.to_lowercase())
    }

    /// Preset names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.presets.values().map(|p| p.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Preset> {
        self.presets.values()
    }

    /// Load every `*.toml` file in `dir` on top of the current presets.
    ///
    /// Returns the number of presets read. A missing directory is not an
    /// error and loads nothing.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, PresetError> {
        if !dir.is_dir() {
            return Ok(0);
        }
        let mut paths: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("toml"))
            })
            .collect();
        paths.sort();

        for path in &paths {
            let preset = load_preset(path)?;
            tracing::debug!(preset = %preset.name, path = %path.display(), "loaded preset");
            self.insert(preset);
        }
        Ok(paths.len())
    }

    /// Resolve a named preset onto `base`.
    pub fn resolve(&self, name: &str, base: &AdjustmentSet) -> Result<AdjustmentSet, PresetError> {
        self.get(name)
            .map(|preset| resolve(base, preset))
            .ok_or_else(|| PresetError::NotFound(name.to_string()))
    }
}

/// Read a single preset file.
pub fn load_preset(path: &Path) -> Result<Preset, PresetError> {
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|source| PresetError::Toml {
        path: path.display().to_string(),
        source,
    })
}

fn builtin_presets() -> Vec<Preset> {
    vec![
        Preset::builtin(
            "vivid",
            "Punchy color and contrast",
            AdjustmentPatch {
                contrast: Some(20.0),
                vibrance: Some(35.0),
                saturation: Some(10.0),
                clarity: Some(15.0),
                ..Default::default()
            },
        ),
        Preset::builtin(
            "black-and-white",
            "Neutral monochrome conversion",
            AdjustmentPatch {
                saturation: Some(-100.0),
                vibrance: Some(-100.0),
                contrast: Some(15.0),
                ..Default::default()
            },
        ),
        Preset::builtin(
            "warm",
            "Shift white balance toward amber",
            AdjustmentPatch {
                temperature: Some(250.0),
                tint: Some(10.0),
                ..Default::default()
            },
        ),
        Preset::builtin(
            "cool",
            "Shift white balance toward blue",
            AdjustmentPatch {
                temperature: Some(-250.0),
                tint: Some(-10.0),
                ..Default::default()
            },
        ),
        Preset::builtin(
            "high-contrast",
            "Deep blacks and bright whites",
            AdjustmentPatch {
                contrast: Some(45.0),
                whites: Some(20.0),
                blacks: Some(-20.0),
                clarity: Some(10.0),
                ..Default::default()
            },
        ),
        Preset::builtin(
            "soft",
            "Low contrast with gentle noise cleanup",
            AdjustmentPatch {
                contrast: Some(-20.0),
                clarity: Some(-25.0),
                highlights: Some(-15.0),
                noise_reduction: Some(30.0),
                ..Default::default()
            },
        ),
        Preset::builtin(
            "film-fade",
            "Lifted blacks with a cool-shadow, warm-highlight split tone",
            AdjustmentPatch {
                blacks: Some(25.0),
                contrast: Some(-10.0),
                saturation: Some(-15.0),
                vignette: Some(20.0),
                split_toning: Some(SplitToning {
                    highlight_hue: 45.0,
                    highlight_saturation: 20.0,
                    shadow_hue: 210.0,
                    shadow_saturation: 15.0,
                    balance: 0.0,
                }),
                ..Default::default()
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_patch_is_noop() {
        let base = AdjustmentSet {
            exposure: 0.3,
            contrast: 12.0,
            ..Default::default()
        };
        let patch = AdjustmentPatch::default();
        assert!(patch.is_empty());
        assert_eq!(patch.apply_to(&base), base);
    }

    #[test]
    fn present_fields_override_absent_fields_keep() {
        let base = AdjustmentSet {
            exposure: 0.3,
            contrast: 12.0,
            shadows: 40.0,
            ..Default::default()
        };
        let patch = AdjustmentPatch {
            contrast: Some(-5.0),
            vignette: Some(30.0),
            ..Default::default()
        };
        let merged = patch.apply_to(&base);
        assert_eq!(merged.exposure, 0.3);
        assert_eq!(merged.contrast, -5.0);
        assert_eq!(merged.shadows, 40.0);
        assert_eq!(merged.vignette, 30.0);
    }

    #[test]
    fn zero_override_is_still_an_override() {
        let base = AdjustmentSet {
            contrast: 50.0,
            ..Default::default()
        };
        let patch = AdjustmentPatch {
            contrast: Some(0.0),
            ..Default::default()
        };
        assert_eq!(patch.apply_to(&base).contrast, 0.0);
    }

    #[test]
    fn sub_records_replace_wholesale() {
        let base = AdjustmentSet {
            tone_curve: Some(ToneCurve {
                highlights: -20.0,
                shadows: 10.0,
                ..Default::default()
            }),
            ..Default::default()
        };
        let patch = AdjustmentPatch {
            tone_curve: Some(ToneCurve {
                lights: 5.0,
                ..Default::default()
            }),
            ..Default::default()
        };
        let curve = patch.apply_to(&base).tone_curve.unwrap();
        assert_eq!(curve.highlights, 0.0);
        assert_eq!(curve.shadows, 0.0);
        assert_eq!(curve.lights, 5.0);
    }

    #[test]
    fn clamped_patch_keeps_unset_fields_unset() {
        let patch = AdjustmentPatch {
            exposure: Some(-7.5),
            vignette: Some(250.0),
            noise_reduction: Some(180.0),
            tone_curve: Some(ToneCurve {
                shadows: 300.0,
                ..Default::default()
            }),
            ..Default::default()
        };
        let clamped = patch.clamped();
        assert_eq!(clamped.exposure, Some(-2.0));
        assert_eq!(clamped.vignette, Some(100.0));
        assert_eq!(clamped.noise_reduction, Some(100.0));
        assert_eq!(clamped.tone_curve.map(|c| c.shadows), Some(100.0));
        assert_eq!(clamped.contrast, None);
        assert_eq!(clamped.local_adjustments, None);
        assert!(AdjustmentPatch::default().clamped().is_empty());
    }

    #[test]
    fn builtin_library_has_expected_presets() {
        let library = PresetLibrary::builtin();
        assert_eq!(
            library.names(),
            vec![
                "black-and-white",
                "cool",
                "film-fade",
                "high-contrast",
                "soft",
                "vivid",
                "warm"
            ]
        );
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let library = PresetLibrary::builtin();
        assert!(library.get("Vivid").is_some());
        assert!(library.get("BLACK-AND-WHITE").is_some());
    }

    #[test]
    fn resolve_unknown_preset_errors() {
        let library = PresetLibrary::builtin();
        let result = library.resolve("nope", &AdjustmentSet::default());
        assert!(matches!(result, Err(PresetError::NotFound(name)) if name == "nope"));
    }

    #[test]
    fn resolve_black_and_white() {
        let library = PresetLibrary::builtin();
        let base = AdjustmentSet {
            exposure: 0.5,
            ..Default::default()
        };
        let adj = library.resolve("black-and-white", &base).unwrap();
        assert_eq!(adj.exposure, 0.5);
        assert_eq!(adj.saturation, -100.0);
        assert_eq!(adj.vibrance, -100.0);
    }

    #[test]
    fn load_dir_adds_and_overrides() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("golden.toml"),
            r#"
name = "golden-hour"
description = "Warm evening light"

[adjustments]
temperature = 300
highlights = -20
"#,
        )
        .unwrap();
        fs::write(
            tmp.path().join("vivid.toml"),
            r#"
name = "vivid"

[adjustments]
saturation = 80
"#,
        )
        .unwrap();
        fs::write(tmp.path().join("notes.txt"), "not a preset").unwrap();

        let mut library = PresetLibrary::builtin();
        let loaded = library.load_dir(tmp.path()).unwrap();
        assert_eq!(loaded, 2);

        let golden = library.get("golden-hour").unwrap();
        assert_eq!(golden.adjustments.temperature, Some(300.0));
        assert_eq!(golden.description.as_deref(), Some("Warm evening light"));

        let vivid = library.get("vivid").unwrap();
        assert_eq!(vivid.adjustments.saturation, Some(80.0));
        assert_eq!(vivid.adjustments.contrast, None);
    }

    #[test]
    fn load_dir_missing_directory_loads_nothing() {
        let mut library = PresetLibrary::empty();
        let loaded = library.load_dir(Path::new("/nonexistent/presets")).unwrap();
        assert_eq!(loaded, 0);
        assert!(library.names().is_empty());
    }

    #[test]
    fn load_preset_reports_path_on_bad_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.toml");
        fs::write(&path, "name = \"x\"\n[adjustments]\nexposur = 1").unwrap();
        let err = load_preset(&path).unwrap_err();
        assert!(matches!(err, PresetError::Toml { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }
}
