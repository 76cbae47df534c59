//! Per-layer effect parameters.
//!
//! Every numeric field has a declared range and every write goes through
//! [`FieldRange::clamp`], so an [`EffectParameterSet`] is always valid.
//! Out-of-range input is clamped, never rejected.

use serde::{Deserialize, Serialize};

/// Order in which effect groups are applied by the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectGroup {
    Color,
    Distortion,
    Mask,
    Special,
    Transform,
    Reactive,
}

/// Declared domain of an effect field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldRange {
    /// Closed interval.
    Span { min: f32, max: f32 },
    /// Degrees, wrapped into `[0, 360)`.
    Angle,
    /// Closed interval, rounded to whole numbers.
    Integer { min: f32, max: f32 },
    /// Boolean stored as `0.0` / `1.0`.
    Toggle,
}

const UNIT: FieldRange = FieldRange::Span { min: 0.0, max: 1.0 };
const DOUBLE: FieldRange = FieldRange::Span { min: 0.0, max: 2.0 };

impl FieldRange {
    pub fn clamp(self, value: f32) -> f32 {
        match self {
            Self::Span { min, max } => {
                if value.is_finite() {
                    value.clamp(min, max)
                } else {
                    min
                }
            }
            Self::Angle => wrap_degrees(value),
            Self::Integer { min, max } => {
                if value.is_finite() {
                    value.round().clamp(min, max)
                } else {
                    min
                }
            }
            Self::Toggle => {
                if value != 0.0 && !value.is_nan() {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Wraps an angle into `[0, 360)`. Non-finite input maps to `0`.
pub fn wrap_degrees(value: f32) -> f32 {
    if !value.is_finite() {
        return 0.0;
    }
    let wrapped = value.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

macro_rules! effect_fields {
    ($( $variant:ident => $field:ident, $name:literal, $group:ident, $range:expr; )*) => {
        /// Addressable field of an [`EffectParameterSet`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub enum EffectField {
            $( $variant, )*
        }

        impl EffectField {
            pub const ALL: &'static [EffectField] = &[ $( EffectField::$variant, )* ];

            /// Wire name, matching the camelCase keys collaborators send.
            pub fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => $name, )*
                }
            }

            pub fn group(self) -> EffectGroup {
                match self {
                    $( Self::$variant => EffectGroup::$group, )*
                }
            }

            pub fn range(self) -> FieldRange {
                match self {
                    $( Self::$variant => $range, )*
                }
            }
        }

        impl EffectParameterSet {
            /// Reads a field as a number; toggles read as `0.0` / `1.0`.
            pub fn get(&self, field: EffectField) -> f32 {
                match field {
                    $( EffectField::$variant => self.$field.as_param(), )*
                }
            }

            /// Writes exactly one field after clamping it to its range.
            pub fn set(&mut self, field: EffectField, value: f32) {
                let value = field.range().clamp(value);
                match field {
                    $( EffectField::$variant => self.$field = ParamValue::from_param(value), )*
                }
            }
        }
    };
}

trait ParamValue {
    fn as_param(&self) -> f32;
    fn from_param(value: f32) -> Self;
}

impl ParamValue for f32 {
    fn as_param(&self) -> f32 {
        *self
    }

    fn from_param(value: f32) -> Self {
        value
    }
}

impl ParamValue for bool {
    fn as_param(&self) -> f32 {
        if *self {
            1.0
        } else {
            0.0
        }
    }

    fn from_param(value: f32) -> Self {
        value != 0.0
    }
}

effect_fields! {
    Blur => blur, "blur", Color, UNIT;
    Brightness => brightness, "brightness", Color, DOUBLE;
    Contrast => contrast, "contrast", Color, DOUBLE;
    Saturation => saturation, "saturation", Color, DOUBLE;
    Hue => hue, "hue", Color, FieldRange::Angle;
    Gamma => gamma, "gamma", Color, FieldRange::Span { min: 0.1, max: 3.0 };
    Sepia => sepia, "sepia", Color, UNIT;
    Invert => invert, "invert", Color, UNIT;
    Grayscale => grayscale, "grayscale", Color, UNIT;
    Distortion => distortion, "distortion", Distortion, UNIT;
    Wave => wave, "wave", Distortion, UNIT;
    Ripple => ripple, "ripple", Distortion, UNIT;
    Twirl => twirl, "twirl", Distortion, UNIT;
    Vignette => vignette, "vignette", Mask, UNIT;
    RadialBlur => radial_blur, "radialBlur", Mask, UNIT;
    EdgeDetection => edge_detection, "edgeDetection", Mask, UNIT;
    Glitch => glitch, "glitch", Special, UNIT;
    Scanlines => scanlines, "scanlines", Special, UNIT;
    Crt => crt, "crt", Special, UNIT;
    Kaleidoscope => kaleidoscope, "kaleidoscope", Special, UNIT;
    Noise => noise, "noise", Special, UNIT;
    Pixelate => pixelate, "pixelate", Special, FieldRange::Integer { min: 1.0, max: 20.0 };
    Rotate => rotate, "rotate", Transform, FieldRange::Angle;
    ZoomIn => zoom_in, "zoomIn", Transform, DOUBLE;
    FadeIn => fade_in, "fadeIn", Transform, UNIT;
    SlideIn => slide_in, "slideIn", Transform, UNIT;
    Mirror => mirror, "mirror", Transform, FieldRange::Toggle;
    FlipH => flip_h, "flipH", Transform, FieldRange::Toggle;
    FlipV => flip_v, "flipV", Transform, FieldRange::Toggle;
    AudioReactive => audio_reactive, "audioReactive", Reactive, FieldRange::Toggle;
    BassReactive => bass_reactive, "bassReactive", Reactive, FieldRange::Toggle;
    TrebleReactive => treble_reactive, "trebleReactive", Reactive, FieldRange::Toggle;
}

impl EffectField {
    /// Accepts the camelCase wire name or its snake_case spelling.
    pub fn parse(name: &str) -> Option<Self> {
        let wanted: String = name
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        Self::ALL
            .iter()
            .copied()
            .find(|field| field.name().to_ascii_lowercase() == wanted)
    }
}

/// The full effect configuration of one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EffectParameterSet {
    pub blur: f32,
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub hue: f32,
    pub gamma: f32,
    pub sepia: f32,
    pub invert: f32,
    pub grayscale: f32,

    pub distortion: f32,
    pub wave: f32,
    pub ripple: f32,
    pub twirl: f32,

    pub vignette: f32,
    pub radial_blur: f32,
    pub edge_detection: f32,

    pub rotate: f32,
    pub zoom_in: f32,
    pub fade_in: f32,
    pub slide_in: f32,
    pub mirror: bool,
    pub flip_h: bool,
    pub flip_v: bool,

    pub glitch: f32,
    pub scanlines: f32,
    pub crt: f32,
    pub kaleidoscope: f32,
    pub noise: f32,
    pub pixelate: f32,

    pub audio_reactive: bool,
    pub bass_reactive: bool,
    pub treble_reactive: bool,
}

impl Default for EffectParameterSet {
    fn default() -> Self {
        Self {
            blur: 0.0,
            brightness: 1.0,
            contrast: 1.0,
            saturation: 1.0,
            hue: 0.0,
            gamma: 1.0,
            sepia: 0.0,
            invert: 0.0,
            grayscale: 0.0,
            distortion: 0.0,
            wave: 0.0,
            ripple: 0.0,
            twirl: 0.0,
            vignette: 0.0,
            radial_blur: 0.0,
            edge_detection: 0.0,
            rotate: 0.0,
            zoom_in: 0.0,
            fade_in: 0.0,
            slide_in: 0.0,
            mirror: false,
            flip_h: false,
            flip_v: false,
            glitch: 0.0,
            scanlines: 0.0,
            crt: 0.0,
            kaleidoscope: 0.0,
            noise: 0.0,
            pixelate: 1.0,
            audio_reactive: false,
            bass_reactive: false,
            treble_reactive: false,
        }
    }
}

impl EffectParameterSet {
    /// Re-clamps every field. Used on sets that arrive from outside the
    /// crate (deserialized payloads, full-layer appends).
    pub fn clamped(mut self) -> Self {
        for field in EffectField::ALL {
            let value = self.get(*field);
            self.set(*field, value);
        }
        self
    }

    pub fn is_reactive(&self) -> bool {
        self.audio_reactive || self.bass_reactive || self.treble_reactive
    }

    /// True when every color field is at its neutral value.
    pub fn color_is_neutral(&self) -> bool {
        let neutral = Self::default();
        EffectField::ALL
            .iter()
            .filter(|field| field.group() == EffectGroup::Color)
            .all(|field| self.get(*field) == neutral.get(*field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_to_declared_ranges() {
        let mut fx = EffectParameterSet::default();
        fx.set(EffectField::Blur, 4.0);
        fx.set(EffectField::Brightness, -1.0);
        fx.set(EffectField::Gamma, 0.0);
        fx.set(EffectField::Pixelate, 33.7);
        assert_eq!(fx.blur, 1.0);
        assert_eq!(fx.brightness, 0.0);
        assert_eq!(fx.gamma, 0.1);
        assert_eq!(fx.pixelate, 20.0);
    }

    #[test]
    fn angles_wrap_into_half_open_range() {
        let mut fx = EffectParameterSet::default();
        fx.set(EffectField::Hue, 360.0);
        assert_eq!(fx.hue, 0.0);
        fx.set(EffectField::Rotate, -90.0);
        assert_eq!(fx.rotate, 270.0);
        fx.set(EffectField::Rotate, 725.0);
        assert_eq!(fx.rotate, 5.0);
        fx.set(EffectField::Hue, -1e-6);
        assert!(fx.hue < 360.0);
    }

    #[test]
    fn non_finite_input_falls_to_lower_bound() {
        let mut fx = EffectParameterSet::default();
        fx.set(EffectField::Contrast, f32::NAN);
        fx.set(EffectField::Hue, f32::INFINITY);
        assert_eq!(fx.contrast, 0.0);
        assert_eq!(fx.hue, 0.0);
    }

    #[test]
    fn toggles_read_and_write_as_numbers() {
        let mut fx = EffectParameterSet::default();
        fx.set(EffectField::Mirror, 0.3);
        assert!(fx.mirror);
        assert_eq!(fx.get(EffectField::Mirror), 1.0);
        fx.set(EffectField::Mirror, 0.0);
        assert!(!fx.mirror);
    }

    #[test]
    fn set_touches_exactly_one_field() {
        let mut fx = EffectParameterSet::default();
        fx.set(EffectField::Wave, 0.4);
        for field in EffectField::ALL {
            if *field != EffectField::Wave {
                assert_eq!(fx.get(*field), EffectParameterSet::default().get(*field));
            }
        }
    }

    #[test]
    fn parses_wire_and_snake_names() {
        assert_eq!(EffectField::parse("radialBlur"), Some(EffectField::RadialBlur));
        assert_eq!(EffectField::parse("edge_detection"), Some(EffectField::EdgeDetection));
        assert_eq!(EffectField::parse("flipH"), Some(EffectField::FlipH));
        assert_eq!(EffectField::parse("turbulence"), None);
        assert_eq!(EffectField::ALL.len(), 32);
    }

    #[test]
    fn deserialized_sets_can_be_reclamped() {
        let fx: EffectParameterSet =
            serde_json::from_str(r#"{ "saturation": 9.0, "hue": 400, "flipV": true }"#).unwrap();
        let fx = fx.clamped();
        assert_eq!(fx.saturation, 2.0);
        assert_eq!(fx.hue, 40.0);
        assert!(fx.flip_v);
        assert_eq!(fx.brightness, 1.0);
    }
}
