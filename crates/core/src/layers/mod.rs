//! The ordered layer stack and the commands that mutate it.

use serde::{Deserialize, Serialize};

use crate::{
    generative::{GenerativeSettings, Pattern},
    presets,
    video::{MediaPayload, VideoBinding},
    EffectField, EffectParameterSet, Transition, TransitionSettings,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Difference,
}

impl BlendMode {
    pub const ALL: [BlendMode; 5] = [
        Self::Normal,
        Self::Multiply,
        Self::Screen,
        Self::Overlay,
        Self::Difference,
    ];

    /// Blend result for one channel, before opacity mixing.
    pub fn apply(self, dst: f32, src: f32) -> f32 {
        match self {
            Self::Normal => src,
            Self::Multiply => dst * src,
            Self::Screen => 1.0 - (1.0 - dst) * (1.0 - src),
            Self::Overlay => {
                if dst < 0.5 {
                    2.0 * dst * src
                } else {
                    1.0 - 2.0 * (1.0 - dst) * (1.0 - src)
                }
            }
            Self::Difference => (dst - src).abs(),
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|mode| format!("{mode:?}").eq_ignore_ascii_case(name))
    }
}

/// What feeds a layer its frames.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LayerSource {
    #[default]
    None,
    Video(VideoBinding),
    Generative(GenerativeSettings),
}

impl LayerSource {
    /// Clamps generative settings into their ranges; other sources pass
    /// through.
    pub fn sanitized(self) -> Self {
        match self {
            Self::Generative(settings) => Self::Generative(settings.sanitized()),
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub id: u64,
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub blend_mode: BlendMode,
    pub source: LayerSource,
    pub effects: EffectParameterSet,
    pub transition: Option<Transition>,
}

impl Layer {
    /// A visible, opaque, normal-blend layer with neutral effects. The id is
    /// assigned by the stack on append.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            visible: true,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            source: LayerSource::None,
            effects: EffectParameterSet::default(),
            transition: None,
        }
    }

    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = clamp_opacity(opacity);
        self
    }

    pub fn with_source(mut self, source: LayerSource) -> Self {
        self.source = source.sanitized();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn generative(name: impl Into<String>, pattern: Pattern) -> Self {
        Self::new(name).with_source(LayerSource::Generative(GenerativeSettings {
            pattern,
            ..Default::default()
        }))
    }
}

fn clamp_opacity(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Partial update merged into a layer. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerPatch {
    pub name: Option<String>,
    pub visible: Option<bool>,
    pub opacity: Option<f32>,
    pub blend_mode: Option<BlendMode>,
    pub source: Option<LayerSource>,
    pub effects: Option<EffectParameterSet>,
    /// `Some(None)` removes the layer's transition.
    pub transition: Option<Option<TransitionSettings>>,
}

impl LayerPatch {
    fn merge_into(self, layer: &mut Layer) {
        if let Some(name) = self.name {
            layer.name = name;
        }
        if let Some(visible) = self.visible {
            layer.visible = visible;
        }
        if let Some(opacity) = self.opacity {
            layer.opacity = clamp_opacity(opacity);
        }
        if let Some(blend_mode) = self.blend_mode {
            layer.blend_mode = blend_mode;
        }
        if let Some(source) = self.source {
            layer.source = source.sanitized();
        }
        if let Some(effects) = self.effects {
            layer.effects = effects.clamped();
        }
        if let Some(transition) = self.transition {
            layer.transition = transition.map(Transition::new);
        }
    }
}

/// Which transition a start/cancel command addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionTarget {
    Master,
    Layer(u64),
}

/// Commands queued by collaborators and applied between ticks.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerCommand {
    Append(Layer),
    Update { id: u64, patch: LayerPatch },
    Remove { id: u64 },
    Select { id: u64 },
    SetParameter {
        id: u64,
        field: EffectField,
        value: f32,
    },
    ApplyPreset { id: u64, name: String },
    BindVideo { id: u64, payload: MediaPayload },
    StartTransition {
        target: TransitionTarget,
        settings: Option<TransitionSettings>,
    },
    CancelTransition { target: TransitionTarget },
    SetPlaying(bool),
    Seek(f32),
}

/// Layers in composition order; index 0 is the bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerStack {
    layers: Vec<Layer>,
    selected: Option<u64>,
    next_id: u64,
}

impl Default for LayerStack {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerStack {
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            selected: None,
            next_id: 0,
        }
    }

    /// The stack a fresh session opens with.
    pub fn demo() -> Self {
        let mut stack = Self::new();
        stack.append(Layer::generative("Layer A", Pattern::Wave));
        stack.append(
            Layer::generative("Layer B", Pattern::Spiral)
                .with_blend_mode(BlendMode::Multiply)
                .with_opacity(0.8),
        );
        stack.append(
            Layer::generative("Layer C", Pattern::Particles)
                .with_blend_mode(BlendMode::Screen)
                .with_opacity(0.6)
                .hidden(),
        );
        stack.selected = stack.layers.first().map(|l| l.id);
        stack
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    pub fn position(&self, id: u64) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn selected(&self) -> Option<u64> {
        self.selected
    }

    pub fn selected_layer(&self) -> Option<&Layer> {
        self.selected.and_then(|id| self.get(id))
    }

    /// Name the next appended layer gets when it has none.
    pub fn next_layer_name(&self) -> String {
        format!("Layer {}", self.layers.len() + 1)
    }

    /// Pushes a layer on top, assigning it a fresh id. An empty name becomes
    /// `Layer N`. The first layer of an empty stack becomes selected.
    pub fn append(&mut self, mut layer: Layer) -> u64 {
        layer.id = self.next_id;
        self.next_id += 1;
        if layer.name.trim().is_empty() {
            layer.name = self.next_layer_name();
        }
        layer.opacity = clamp_opacity(layer.opacity);
        layer.effects = layer.effects.clamped();
        layer.source = layer.source.sanitized();
        let id = layer.id;
        tracing::debug!(id, name = %layer.name, "layer appended");
        self.layers.push(layer);
        if self.selected.is_none() {
            self.selected = Some(id);
        }
        id
    }

    /// Merges `patch` into the layer. Unknown ids are ignored.
    pub fn update(&mut self, id: u64, patch: LayerPatch) -> bool {
        match self.get_mut(id) {
            Some(layer) => {
                patch.merge_into(layer);
                true
            }
            None => {
                tracing::debug!(id, "update for unknown layer ignored");
                false
            }
        }
    }

    /// Removes a layer; the ones above shift down. A removed selection falls
    /// back to the layer now at the same index, or the new top.
    pub fn remove(&mut self, id: u64) -> Option<Layer> {
        let index = self.position(id)?;
        let removed = self.layers.remove(index);
        if self.selected == Some(id) {
            self.selected = self
                .layers
                .get(index)
                .or_else(|| self.layers.last())
                .map(|l| l.id);
        }
        tracing::debug!(id, "layer removed");
        Some(removed)
    }

    pub fn select(&mut self, id: u64) -> bool {
        if self.get(id).is_some() {
            self.selected = Some(id);
            true
        } else {
            false
        }
    }

    /// Writes one effect field after clamping.
    pub fn set_parameter(&mut self, id: u64, field: EffectField, value: f32) -> bool {
        match self.get_mut(id) {
            Some(layer) => {
                layer.effects.set(field, value);
                true
            }
            None => false,
        }
    }

    /// Replaces the layer's whole effect set with a preset. Unknown preset
    /// names leave the layer untouched.
    pub fn apply_preset(&mut self, id: u64, name: &str) -> bool {
        let Some(effects) = presets::effect_preset(name) else {
            tracing::debug!(preset = name, "unknown effect preset");
            return false;
        };
        match self.get_mut(id) {
            Some(layer) => {
                layer.effects = effects;
                true
            }
            None => false,
        }
    }

    /// Mutable access for per-tick advancement of layer transitions.
    pub(crate) fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_stack_matches_session_defaults() {
        let stack = LayerStack::demo();
        let summary: Vec<_> = stack
            .layers()
            .iter()
            .map(|l| (l.name.as_str(), l.blend_mode, l.opacity, l.visible))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Layer A", BlendMode::Normal, 1.0, true),
                ("Layer B", BlendMode::Multiply, 0.8, true),
                ("Layer C", BlendMode::Screen, 0.6, false),
            ]
        );
        assert_eq!(stack.selected(), Some(0));
    }

    #[test]
    fn appended_layers_get_sequential_names_and_ids() {
        let mut stack = LayerStack::demo();
        let id = stack.append(Layer::new(""));
        assert_eq!(id, 3);
        assert_eq!(stack.get(id).unwrap().name, "Layer 4");
        assert_eq!(stack.get(id).unwrap().effects, EffectParameterSet::default());
    }

    #[test]
    fn update_merges_and_ignores_unknown_ids() {
        let mut stack = LayerStack::demo();
        let before = stack.clone();
        assert!(!stack.update(
            42,
            LayerPatch {
                opacity: Some(0.1),
                ..Default::default()
            }
        ));
        assert_eq!(stack, before);

        assert!(stack.update(
            1,
            LayerPatch {
                opacity: Some(3.0),
                visible: Some(false),
                ..Default::default()
            }
        ));
        let layer = stack.get(1).unwrap();
        assert_eq!(layer.opacity, 1.0);
        assert!(!layer.visible);
        assert_eq!(layer.blend_mode, BlendMode::Multiply);
    }

    #[test]
    fn generative_sources_are_clamped_on_update_and_append() {
        let mut settings = GenerativeSettings::default();
        settings.particle.count = 5000;
        settings.fractal.depth = 12;

        let mut stack = LayerStack::demo();
        stack.update(
            0,
            LayerPatch {
                source: Some(LayerSource::Generative(settings.clone())),
                ..Default::default()
            },
        );
        let mut direct = Layer::new("direct");
        direct.source = LayerSource::Generative(settings);
        let id = stack.append(direct);

        for layer_id in [0, id] {
            let LayerSource::Generative(stored) = &stack.get(layer_id).unwrap().source else {
                panic!("layer {layer_id} lost its generative source");
            };
            assert_eq!(stored.particle.count, 500);
            assert_eq!(stored.fractal.depth, 8);
        }
    }

    #[test]
    fn removal_shifts_and_reselects() {
        let mut stack = LayerStack::demo();
        stack.select(1);
        stack.remove(1).unwrap();
        let ids: Vec<_> = stack.layers().iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![0, 2]);
        assert_eq!(stack.selected(), Some(2));

        stack.remove(2);
        assert_eq!(stack.selected(), Some(0));
        stack.remove(0);
        assert_eq!(stack.selected(), None);
        assert!(stack.remove(0).is_none());
    }

    #[test]
    fn preset_overwrites_every_field() {
        let mut stack = LayerStack::demo();
        stack.set_parameter(0, EffectField::Blur, 0.9);
        stack.set_parameter(0, EffectField::Kaleidoscope, 0.7);
        assert!(stack.apply_preset(0, "neon"));
        assert_eq!(stack.get(0).unwrap().effects, presets::effect_preset("neon").unwrap());

        let before = stack.get(0).unwrap().effects.clone();
        assert!(!stack.apply_preset(0, "not-a-preset"));
        assert_eq!(stack.get(0).unwrap().effects, before);
    }

    #[test]
    fn set_parameter_clamps() {
        let mut stack = LayerStack::demo();
        stack.set_parameter(0, EffectField::Gamma, 10.0);
        stack.set_parameter(0, EffectField::Hue, -30.0);
        stack.set_parameter(0, EffectField::Pixelate, 7.6);
        let fx = &stack.get(0).unwrap().effects;
        assert_eq!(fx.gamma, 3.0);
        assert_eq!(fx.hue, 330.0);
        assert_eq!(fx.pixelate, 8.0);
    }

    #[test]
    fn blend_mode_formulas() {
        assert_eq!(BlendMode::Multiply.apply(0.5, 0.5), 0.25);
        assert_eq!(BlendMode::Screen.apply(0.5, 0.5), 0.75);
        assert_eq!(BlendMode::Overlay.apply(0.25, 0.5), 0.25);
        assert_eq!(BlendMode::Overlay.apply(0.75, 0.5), 0.75);
        assert_eq!(BlendMode::Difference.apply(0.25, 0.75), 0.5);
        assert_eq!(BlendMode::parse("SCREEN"), Some(BlendMode::Screen));
    }
}
