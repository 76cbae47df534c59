//! Timed interpolation between two visual states.

use serde::{Deserialize, Serialize};

use crate::{AudioAnalysisFrame, EffectField, EffectParameterSet, MixerError, ReactiveConfig, Result};

mod ease;

pub use ease::Easing;

pub const MIN_DURATION: f32 = 0.1;
pub const MAX_DURATION: f32 = 5.0;

/// Slack, in seconds, for frame steps that are not exactly representable.
const COMPLETION_SLACK: f64 = 1e-6;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    #[default]
    Fade,
    Slide,
    Zoom,
    Rotate,
    Wipe,
    Dissolve,
    Morph,
    Wave,
    Spiral,
    Explosion,
    Implosion,
    Pixelate,
    Glitch,
    Matrix,
}

impl TransitionKind {
    pub const ALL: [TransitionKind; 14] = [
        Self::Fade,
        Self::Slide,
        Self::Zoom,
        Self::Rotate,
        Self::Wipe,
        Self::Dissolve,
        Self::Morph,
        Self::Wave,
        Self::Spiral,
        Self::Explosion,
        Self::Implosion,
        Self::Pixelate,
        Self::Glitch,
        Self::Matrix,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| format!("{kind:?}").to_ascii_lowercase() == name)
    }

    /// Visual state at blend factor `factor` (0 = outgoing, 1 = settled).
    pub fn blend(self, factor: f32) -> TransitionBlend {
        let f = factor.clamp(0.0, 1.0);
        let ramp = 1.0 - f;
        let base = TransitionBlend::identity();
        match self {
            Self::Fade => TransitionBlend { opacity: f, ..base },
            Self::Slide => TransitionBlend {
                offset_x: -ramp,
                ..base
            },
            Self::Zoom => TransitionBlend { scale: f, ..base },
            Self::Rotate => TransitionBlend {
                rotation: ramp * 360.0,
                ..base
            },
            Self::Wipe => TransitionBlend { reveal: f, ..base },
            Self::Dissolve => TransitionBlend {
                opacity: f,
                ramp: Some((EffectField::Noise, ramp)),
                ..base
            },
            Self::Morph => TransitionBlend {
                opacity: f,
                ramp: Some((EffectField::Distortion, ramp)),
                ..base
            },
            Self::Wave => TransitionBlend {
                ramp: Some((EffectField::Wave, ramp)),
                ..base
            },
            Self::Spiral => TransitionBlend {
                scale: f,
                rotation: ramp * 720.0,
                ramp: Some((EffectField::Twirl, ramp)),
                ..base
            },
            Self::Explosion => TransitionBlend {
                opacity: f,
                scale: 1.0 + ramp * 2.0,
                ..base
            },
            Self::Implosion => TransitionBlend {
                opacity: f,
                scale: f,
                ..base
            },
            Self::Pixelate => TransitionBlend {
                ramp: Some((EffectField::Pixelate, ramp)),
                ..base
            },
            Self::Glitch => TransitionBlend {
                ramp: Some((EffectField::Glitch, ramp)),
                ..base
            },
            Self::Matrix => TransitionBlend {
                opacity: f,
                ramp: Some((EffectField::Scanlines, ramp)),
                ..base
            },
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionDirection {
    #[default]
    In,
    Out,
    InOut,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionTrigger {
    #[default]
    Manual,
    Auto,
    Audio,
    Beat,
}

/// Everything needed to (re)start a transition.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionSettings {
    pub kind: TransitionKind,
    pub duration: f32,
    pub easing: Easing,
    pub direction: TransitionDirection,
    pub trigger: TransitionTrigger,
}

impl Default for TransitionSettings {
    fn default() -> Self {
        Self {
            kind: TransitionKind::Fade,
            duration: 1.0,
            easing: Easing::EaseInOut,
            direction: TransitionDirection::In,
            trigger: TransitionTrigger::Manual,
        }
    }
}

impl TransitionSettings {
    fn sanitized(mut self) -> Self {
        self.duration = if self.duration.is_finite() {
            self.duration.clamp(MIN_DURATION, MAX_DURATION)
        } else {
            1.0
        };
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionPhase {
    #[default]
    Idle,
    Running,
    Complete,
    Cancelled,
}

/// Spatial, opacity and effect adjustments a transition contributes to a
/// layer (or to the whole output) for the current tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransitionBlend {
    pub opacity: f32,
    /// Horizontal offset as a fraction of the frame width.
    pub offset_x: f32,
    pub scale: f32,
    /// Degrees.
    pub rotation: f32,
    /// Fraction of columns, from the left, that stay visible.
    pub reveal: f32,
    /// An effect field pushed toward its maximum by the given amount.
    pub ramp: Option<(EffectField, f32)>,
}

impl TransitionBlend {
    pub fn identity() -> Self {
        Self {
            opacity: 1.0,
            offset_x: 0.0,
            scale: 1.0,
            rotation: 0.0,
            reveal: 1.0,
            ramp: None,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    pub fn is_spatial(&self) -> bool {
        self.offset_x != 0.0 || self.scale != 1.0 || self.rotation != 0.0 || self.reveal < 1.0
    }

    /// Applies the effect ramp on top of `effects`.
    pub fn apply_ramp(&self, effects: &mut EffectParameterSet) {
        let Some((field, amount)) = self.ramp else {
            return;
        };
        let amount = amount.clamp(0.0, 1.0);
        let current = effects.get(field);
        let target = match field.range() {
            crate::FieldRange::Integer { max, .. } | crate::FieldRange::Span { max, .. } => max,
            _ => 1.0,
        };
        effects.set(field, current + (target - current) * amount);
    }
}

/// A transition instance and its lifecycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Transition {
    settings: TransitionSettings,
    /// Seconds spent running since the last start.
    elapsed: f64,
    progress: f32,
    phase: TransitionPhase,
}

impl Transition {
    pub fn new(settings: TransitionSettings) -> Self {
        Self {
            settings: settings.sanitized(),
            elapsed: 0.0,
            progress: 0.0,
            phase: TransitionPhase::Idle,
        }
    }

    pub fn settings(&self) -> &TransitionSettings {
        &self.settings
    }

    /// Replaces the settings used by the next `start`. A running instance
    /// keeps going with its current settings until restarted.
    pub fn configure(&mut self, settings: TransitionSettings) {
        if self.phase != TransitionPhase::Running {
            self.settings = settings.sanitized();
        }
    }

    pub fn phase(&self) -> TransitionPhase {
        self.phase
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn is_running(&self) -> bool {
        self.phase == TransitionPhase::Running
    }

    /// Enters `Running` with progress 0, from any phase.
    pub fn start(&mut self, settings: TransitionSettings) {
        self.settings = settings.sanitized();
        self.elapsed = 0.0;
        self.progress = 0.0;
        self.phase = TransitionPhase::Running;
        tracing::debug!(kind = ?self.settings.kind, duration = self.settings.duration, "transition started");
    }

    pub fn restart(&mut self) {
        self.start(self.settings);
    }

    /// Advances by `dt` seconds. Only a running transition moves.
    pub fn advance(&mut self, dt: f32) {
        if self.phase != TransitionPhase::Running || !dt.is_finite() || dt <= 0.0 {
            return;
        }
        let duration = f64::from(self.settings.duration);
        self.elapsed += f64::from(dt);
        if self.elapsed + COMPLETION_SLACK >= duration {
            self.elapsed = duration;
            self.progress = 1.0;
            self.phase = TransitionPhase::Complete;
            tracing::debug!(kind = ?self.settings.kind, "transition complete");
        } else {
            self.progress = (self.elapsed / duration).clamp(0.0, 1.0) as f32;
        }
    }

    /// Stops a running transition where it is.
    pub fn cancel(&mut self) -> Result<()> {
        if self.phase != TransitionPhase::Running {
            return Err(MixerError::TransitionPhase(self.phase));
        }
        self.phase = TransitionPhase::Cancelled;
        Ok(())
    }

    pub fn eased_progress(&self) -> f32 {
        self.settings.easing.apply(self.progress)
    }

    /// Blend factor after applying the direction.
    pub fn blend_factor(&self) -> f32 {
        let eased = self.eased_progress();
        match self.settings.direction {
            TransitionDirection::In => eased,
            TransitionDirection::Out => 1.0 - eased,
            TransitionDirection::InOut => {
                let p = self.progress;
                let folded = if p <= 0.5 { p * 2.0 } else { (1.0 - p) * 2.0 };
                self.settings.easing.apply(folded)
            }
        }
    }

    /// The adjustment for this tick. An idle transition contributes nothing.
    pub fn blend(&self) -> TransitionBlend {
        match self.phase {
            TransitionPhase::Idle => TransitionBlend::identity(),
            _ => self.settings.kind.blend(self.blend_factor()),
        }
    }

    /// Starts the transition if its trigger condition holds this tick.
    /// Triggers never interrupt a running transition.
    pub fn poll_trigger(&mut self, frame: &AudioAnalysisFrame, config: &ReactiveConfig) -> bool {
        if self.phase == TransitionPhase::Running {
            return false;
        }
        let fire = match self.settings.trigger {
            TransitionTrigger::Manual => false,
            TransitionTrigger::Auto => true,
            TransitionTrigger::Audio => frame.input_level >= config.audio_trigger_level,
            TransitionTrigger::Beat => {
                frame.beat && frame.beat_confidence >= config.beat_trigger_confidence
            }
        };
        if fire {
            self.restart();
        }
        fire
    }
}
