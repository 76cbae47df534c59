//! Read-only preset catalog.

use serde::Serialize;

use crate::{Easing, EffectParameterSet, TransitionKind, TransitionSettings};

/// Names of the built-in effect presets, in display order.
pub const EFFECT_PRESET_NAMES: [&str; 12] = [
    "glitch",
    "vintage",
    "neon",
    "minimal",
    "cyberpunk",
    "dreamy",
    "energetic",
    "mystical",
    "retro",
    "futuristic",
    "organic",
    "chaos",
];

/// Full effect snapshot for a preset name. The snapshot starts from the
/// neutral set, so applying it overwrites every field.
pub fn effect_preset(name: &str) -> Option<EffectParameterSet> {
    let base = EffectParameterSet::default();
    let fx = match name.trim().to_ascii_lowercase().as_str() {
        "glitch" => EffectParameterSet {
            blur: 0.1,
            brightness: 1.2,
            contrast: 1.3,
            saturation: 0.8,
            noise: 0.3,
            glitch: 0.5,
            ..base
        },
        "vintage" => EffectParameterSet {
            brightness: 0.9,
            contrast: 1.1,
            saturation: 0.7,
            hue: 30.0,
            sepia: 0.3,
            vignette: 0.4,
            ..base
        },
        "neon" => EffectParameterSet {
            brightness: 1.3,
            contrast: 1.4,
            saturation: 1.5,
            hue: 180.0,
            edge_detection: 0.2,
            ..base
        },
        "minimal" => EffectParameterSet {
            brightness: 1.1,
            contrast: 0.9,
            saturation: 0.5,
            blur: 0.05,
            grayscale: 0.3,
            ..base
        },
        "cyberpunk" => EffectParameterSet {
            brightness: 1.2,
            contrast: 1.4,
            saturation: 1.3,
            hue: 200.0,
            glitch: 0.3,
            scanlines: 0.4,
            crt: 0.2,
            ..base
        },
        "dreamy" => EffectParameterSet {
            blur: 0.2,
            brightness: 1.1,
            saturation: 0.8,
            vignette: 0.3,
            radial_blur: 0.2,
            wave: 0.3,
            ..base
        },
        "energetic" => EffectParameterSet {
            brightness: 1.4,
            contrast: 1.3,
            saturation: 1.2,
            distortion: 0.3,
            ripple: 0.4,
            audio_reactive: true,
            ..base
        },
        "mystical" => EffectParameterSet {
            brightness: 0.8,
            contrast: 1.2,
            saturation: 1.1,
            hue: 280.0,
            kaleidoscope: 0.3,
            twirl: 0.2,
            ..base
        },
        "retro" => EffectParameterSet {
            brightness: 0.9,
            contrast: 1.1,
            saturation: 0.6,
            sepia: 0.4,
            crt: 0.5,
            scanlines: 0.6,
            ..base
        },
        "futuristic" => EffectParameterSet {
            brightness: 1.3,
            contrast: 1.5,
            saturation: 1.4,
            edge_detection: 0.4,
            mirror: true,
            flip_h: true,
            ..base
        },
        "organic" => EffectParameterSet {
            brightness: 1.0,
            contrast: 0.9,
            saturation: 1.1,
            wave: 0.5,
            ripple: 0.3,
            ..base
        },
        "chaos" => EffectParameterSet {
            brightness: 1.2,
            contrast: 1.4,
            saturation: 1.3,
            glitch: 0.8,
            distortion: 0.6,
            noise: 0.5,
            ..base
        },
        _ => return None,
    };
    Some(fx)
}

/// A named transition configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TransitionPreset {
    pub name: &'static str,
    pub kind: TransitionKind,
    pub duration: f32,
    pub easing: Easing,
}

impl TransitionPreset {
    /// Preset values over `current`; direction and trigger are kept.
    pub fn apply_to(&self, current: TransitionSettings) -> TransitionSettings {
        TransitionSettings {
            kind: self.kind,
            duration: self.duration,
            easing: self.easing,
            ..current
        }
    }
}

pub const TRANSITION_PRESETS: [TransitionPreset; 8] = [
    TransitionPreset {
        name: "Smooth Fade",
        kind: TransitionKind::Fade,
        duration: 1.5,
        easing: Easing::EaseInOut,
    },
    TransitionPreset {
        name: "Quick Cut",
        kind: TransitionKind::Fade,
        duration: 0.1,
        easing: Easing::Linear,
    },
    TransitionPreset {
        name: "Slide In",
        kind: TransitionKind::Slide,
        duration: 1.0,
        easing: Easing::EaseOut,
    },
    TransitionPreset {
        name: "Zoom Burst",
        kind: TransitionKind::Zoom,
        duration: 0.8,
        easing: Easing::Bounce,
    },
    TransitionPreset {
        name: "Glitch Switch",
        kind: TransitionKind::Glitch,
        duration: 0.5,
        easing: Easing::Linear,
    },
    TransitionPreset {
        name: "Matrix Rain",
        kind: TransitionKind::Matrix,
        duration: 2.0,
        easing: Easing::EaseIn,
    },
    TransitionPreset {
        name: "Wave Morph",
        kind: TransitionKind::Wave,
        duration: 1.2,
        easing: Easing::EaseInOut,
    },
    TransitionPreset {
        name: "Explosion",
        kind: TransitionKind::Explosion,
        duration: 1.5,
        easing: Easing::Back,
    },
];

/// Looks a transition preset up by display name, case-insensitively.
pub fn transition_preset(name: &str) -> Option<&'static TransitionPreset> {
    let name = name.trim();
    TRANSITION_PRESETS
        .iter()
        .find(|preset| preset.name.eq_ignore_ascii_case(name))
}

/// Serializable listing of the whole catalog.
#[derive(Debug, Clone, Serialize)]
pub struct PresetCatalog {
    pub effects: Vec<(&'static str, EffectParameterSet)>,
    pub transitions: Vec<TransitionPreset>,
}

impl PresetCatalog {
    pub fn builtin() -> Self {
        Self {
            effects: EFFECT_PRESET_NAMES
                .iter()
                .filter_map(|name| effect_preset(name).map(|fx| (*name, fx)))
                .collect(),
            transitions: TRANSITION_PRESETS.to_vec(),
        }
    }
}
