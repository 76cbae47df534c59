use serde::{Deserialize, Serialize};

use crate::{AudioAnalysisFrame, EffectField, EffectParameterSet};

/// Audio feature that drives a reactive mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactiveSource {
    /// Overall input level.
    Level,
    /// Mean magnitude of the low third of the spectrum.
    Bass,
    /// Mean magnitude of the high third of the spectrum.
    Treble,
}

impl ReactiveSource {
    fn read(self, frame: &AudioAnalysisFrame) -> f32 {
        match self {
            Self::Level => frame.input_level,
            Self::Bass => frame.bass_level(),
            Self::Treble => frame.treble_level(),
        }
    }

    /// The layer flag that arms this source.
    fn armed(self, effects: &EffectParameterSet) -> bool {
        match self {
            Self::Level => effects.audio_reactive,
            Self::Bass => effects.bass_reactive,
            Self::Treble => effects.treble_reactive,
        }
    }
}

/// Describes how a feature should be routed to effect fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingDescriptor {
    pub source: ReactiveSource,
    pub targets: Vec<EffectField>,
    pub gain: f32,
}

/// A transient multiplier for one field, produced fresh every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterUpdate {
    pub target: EffectField,
    pub scale: f32,
}

/// Fields whose magnitude is scaled by reactive modulation.
pub const INTENSITY_FIELDS: &[EffectField] = &[
    EffectField::Glitch,
    EffectField::Distortion,
    EffectField::Wave,
    EffectField::Ripple,
    EffectField::Twirl,
    EffectField::Noise,
];

/// Routes audio features onto effect fields.
///
/// The matrix never mutates stored layer state: [`MappingMatrix::modulate`]
/// returns a scaled copy that lives only for the current composite.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingMatrix {
    descriptors: Vec<MappingDescriptor>,
}

impl Default for MappingMatrix {
    fn default() -> Self {
        let route = |source| MappingDescriptor {
            source,
            targets: INTENSITY_FIELDS.to_vec(),
            gain: 1.0,
        };
        Self {
            descriptors: vec![
                route(ReactiveSource::Level),
                route(ReactiveSource::Bass),
                route(ReactiveSource::Treble),
            ],
        }
    }
}

impl MappingMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_descriptors(descriptors: Vec<MappingDescriptor>) -> Self {
        Self { descriptors }
    }

    pub fn descriptors(&self) -> &[MappingDescriptor] {
        &self.descriptors
    }

    /// Computes the multipliers that apply to `effects` for this frame.
    /// Each armed source contributes `1 + gain * feature`; several sources
    /// targeting one field multiply.
    pub fn evaluate(
        &self,
        effects: &EffectParameterSet,
        frame: &AudioAnalysisFrame,
    ) -> Vec<ParameterUpdate> {
        let mut updates: Vec<ParameterUpdate> = Vec::new();
        for descriptor in &self.descriptors {
            if !descriptor.source.armed(effects) {
                continue;
            }
            let scale = 1.0 + descriptor.gain * descriptor.source.read(frame).max(0.0);
            for target in &descriptor.targets {
                match updates.iter_mut().find(|u| u.target == *target) {
                    Some(existing) => existing.scale *= scale,
                    None => updates.push(ParameterUpdate {
                        target: *target,
                        scale,
                    }),
                }
            }
        }
        updates
    }

    /// Returns the effective set for compositing: `base` with reactive
    /// scaling applied and re-clamped.
    pub fn modulate(
        &self,
        base: &EffectParameterSet,
        frame: &AudioAnalysisFrame,
    ) -> EffectParameterSet {
        let mut effective = base.clone();
        if !base.is_reactive() {
            return effective;
        }
        for update in self.evaluate(base, frame) {
            let value = base.get(update.target) * update.scale;
            effective.set(update.target, value);
        }
        effective
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::BIN_COUNT;

    fn frame_with(input_level: f32, low: f32, high: f32) -> AudioAnalysisFrame {
        let mut bins = [0.0; BIN_COUNT];
        for (i, bin) in bins.iter_mut().enumerate() {
            if i < BIN_COUNT / 3 {
                *bin = low;
            } else if i >= BIN_COUNT - BIN_COUNT / 3 {
                *bin = high;
            }
        }
        AudioAnalysisFrame {
            input_level,
            bins,
            ..AudioAnalysisFrame::silent()
        }
    }

    #[test]
    fn audio_reactive_scales_by_one_plus_level() {
        let base = EffectParameterSet {
            glitch: 0.3,
            wave: 0.2,
            blur: 0.5,
            audio_reactive: true,
            ..Default::default()
        };
        let effective = MappingMatrix::new().modulate(&base, &frame_with(0.5, 0.0, 0.0));

        assert!((effective.glitch - 0.45).abs() < 1e-6);
        assert!((effective.wave - 0.3).abs() < 1e-6);
        assert_eq!(effective.blur, 0.5);
        // Stored value untouched.
        assert_eq!(base.glitch, 0.3);
    }

    #[test]
    fn bass_and_treble_read_their_thirds() {
        let frame = frame_with(0.0, 0.5, 0.25);
        let matrix = MappingMatrix::new();

        let bass = EffectParameterSet {
            distortion: 0.4,
            bass_reactive: true,
            ..Default::default()
        };
        assert!((matrix.modulate(&bass, &frame).distortion - 0.6).abs() < 1e-6);

        let treble = EffectParameterSet {
            distortion: 0.4,
            treble_reactive: true,
            ..Default::default()
        };
        assert!((matrix.modulate(&treble, &frame).distortion - 0.5).abs() < 1e-6);
    }

    #[test]
    fn scaled_values_stay_in_range() {
        let base = EffectParameterSet {
            ripple: 0.9,
            audio_reactive: true,
            bass_reactive: true,
            ..Default::default()
        };
        let effective = MappingMatrix::new().modulate(&base, &frame_with(1.0, 1.0, 0.0));
        assert_eq!(effective.ripple, 1.0);
    }

    #[test]
    fn unarmed_layers_are_unchanged() {
        let base = EffectParameterSet {
            glitch: 0.5,
            ..Default::default()
        };
        let effective = MappingMatrix::new().modulate(&base, &frame_with(1.0, 1.0, 1.0));
        assert_eq!(effective, base);
    }
}
