//! Core library for the AV mixer.
//!
//! Each module owns one subsystem: audio capture and spectral analysis,
//! MIDI routing, per-layer effects and their audio-reactive modulation,
//! generative sources, transitions, and the layer compositor. The
//! [`RenderLoop`] ties them together into one frame per tick.

pub mod analysis;
pub mod audio;
pub mod compositor;
pub mod config;
pub mod effects;
pub mod engine;
pub mod error;
pub mod frame;
pub mod generative;
pub mod layers;
pub mod mapping;
pub mod midi;
pub mod presets;
pub mod timeline;
pub mod transition;
pub mod video;

pub use analysis::{AnalysisEngine, AnalysisSummary, AudioAnalysisFrame};
pub use audio::{list_input_devices, AudioCapability, AudioDevice, AudioEngine, AudioMode};
pub use compositor::{Compositor, LayerFrame};
pub use config::{AppConfig, AudioConfig, CanvasSize, ReactiveConfig, RenderConfig, UploadConfig};
pub use effects::{EffectField, EffectGroup, EffectParameterSet, FieldRange};
pub use engine::{CommandSender, RenderLoop, TickOutput};
pub use error::{MixerError, Result};
pub use frame::Frame;
pub use generative::{GenerativeEngine, GenerativeSettings, GeometryType, Pattern};
pub use layers::{BlendMode, Layer, LayerCommand, LayerPatch, LayerSource, LayerStack, TransitionTarget};
pub use mapping::{MappingDescriptor, MappingMatrix, ParameterUpdate, ReactiveSource};
pub use midi::{
    list_midi_devices, MidiCapability, MidiDevice, MidiInbox, MidiMessage, MidiNoteEvent, MidiRouter,
    ToneBank, ToneRequest,
};
pub use presets::{PresetCatalog, TransitionPreset};
pub use timeline::{PlaybackClock, Transport, TransportStatus};
pub use transition::{
    Easing, Transition, TransitionBlend, TransitionDirection, TransitionKind, TransitionPhase,
    TransitionSettings, TransitionTrigger,
};
pub use video::{FrameSource, MediaPayload, UploadRejection, VideoBinding};
