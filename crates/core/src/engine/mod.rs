//! The per-tick orchestrator.
//!
//! Collaborators talk to the loop through queued [`LayerCommand`]s, pushed
//! audio samples and the MIDI inbox; each [`RenderLoop::tick`] drains them
//! and returns one composited frame plus meter data. Nothing in a tick
//! blocks on a device and nothing in it fails.

use std::{
    collections::HashMap,
    sync::mpsc::{self, Receiver, Sender},
};

use crate::{
    audio::{AudioEngine, AudioMode},
    compositor::{Compositor, LayerFrame},
    config::{AppConfig, CanvasSize},
    generative::GenerativeEngine,
    layers::{Layer, LayerCommand, LayerSource, LayerStack, TransitionTarget},
    midi::{MidiCapability, MidiInbox, MidiNoteEvent, MidiRouter, ToneBank},
    timeline::{Transport, TransportStatus},
    video::{open_payload, FrameSource, MediaPayload, UploadRejection, VideoBinding, VideoDeck},
    AudioAnalysisFrame, Frame, MappingMatrix, Transition, TransitionSettings,
};

/// Cloneable handle for queueing commands from other threads.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: Sender<LayerCommand>,
}

impl CommandSender {
    /// Queues a command for the next tick. Returns false once the loop is
    /// gone.
    pub fn send(&self, command: LayerCommand) -> bool {
        self.tx.send(command).is_ok()
    }
}

/// Everything a display collaborator needs after one tick.
#[derive(Debug, Clone)]
pub struct TickOutput {
    pub frame: Frame,
    pub audio: AudioAnalysisFrame,
    /// Smoothed spectrum for level meters.
    pub meters: Vec<f32>,
    pub active_notes: Vec<MidiNoteEvent>,
    pub transport: TransportStatus,
    /// Uploads refused while applying this tick's commands.
    pub rejections: Vec<UploadRejection>,
}

pub struct RenderLoop {
    config: AppConfig,
    stack: LayerStack,
    compositor: Compositor,
    pending_canvas: Option<(u32, u32)>,
    audio: AudioEngine,
    midi: MidiRouter,
    midi_capability: Option<MidiCapability>,
    tones: ToneBank,
    mapping: MappingMatrix,
    master: Transition,
    generators: HashMap<u64, GenerativeEngine>,
    videos: VideoDeck,
    transport: Transport,
    commands_tx: Sender<LayerCommand>,
    commands_rx: Receiver<LayerCommand>,
    ticks: u64,
}

impl std::fmt::Debug for RenderLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderLoop")
            .field("layers", &self.stack.len())
            .field("canvas", &self.compositor.dimensions())
            .field("ticks", &self.ticks)
            .finish()
    }
}

impl RenderLoop {
    /// A loop over the demo stack fed by manually pushed audio.
    pub fn new(config: AppConfig) -> Self {
        Self::with_stack(config, LayerStack::demo(), AudioMode::Manual)
    }

    pub fn with_stack(config: AppConfig, stack: LayerStack, mode: AudioMode) -> Self {
        let (width, height) = config.render.canvas.dimensions();
        let mut audio = AudioEngine::with_config(mode, config.audio.clone());
        if mode == AudioMode::Manual {
            audio.enable();
        }
        let (commands_tx, commands_rx) = mpsc::channel();
        tracing::info!(width, height, layers = stack.len(), ?mode, "render loop ready");
        Self {
            tones: ToneBank::new(config.audio.sample_rate),
            config,
            stack,
            compositor: Compositor::new(width, height),
            pending_canvas: None,
            audio,
            midi: MidiRouter::new(),
            midi_capability: None,
            mapping: MappingMatrix::new(),
            master: Transition::default(),
            generators: HashMap::new(),
            videos: VideoDeck::new(),
            transport: Transport::new(),
            commands_tx,
            commands_rx,
            ticks: 0,
        }
    }

    /// Opens audio capture and connects every MIDI input. Missing devices
    /// degrade to silence and an empty note set.
    pub fn enable_live_input(&mut self) {
        self.audio.enable();
        let capability = MidiCapability::connect_all(&self.midi.inbox());
        if !capability.is_connected() {
            tracing::warn!("no midi inputs connected");
        }
        self.midi_capability = Some(capability);
    }

    /// Releases capture and MIDI connections.
    pub fn disable_live_input(&mut self) {
        self.audio.disable();
        self.midi_capability = None;
    }

    pub fn commands(&self) -> CommandSender {
        CommandSender {
            tx: self.commands_tx.clone(),
        }
    }

    /// Queues a command from the owning thread.
    pub fn submit(&self, command: LayerCommand) {
        // The receiver lives in `self`, so this cannot fail.
        let _ = self.commands_tx.send(command);
    }

    pub fn audio(&self) -> &AudioEngine {
        &self.audio
    }

    pub fn midi_inbox(&self) -> MidiInbox {
        self.midi.inbox()
    }

    pub fn midi_capability(&self) -> Option<&MidiCapability> {
        self.midi_capability.as_ref()
    }

    pub fn stack(&self) -> &LayerStack {
        &self.stack
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn master(&self) -> &Transition {
        &self.master
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn canvas(&self) -> (u32, u32) {
        self.compositor.dimensions()
    }

    pub fn mapping_mut(&mut self) -> &mut MappingMatrix {
        &mut self.mapping
    }

    /// Settings used when a master start command carries none, and by the
    /// master's automatic triggers.
    pub fn configure_master(&mut self, settings: TransitionSettings) {
        self.master.configure(settings);
    }

    /// Switches canvas size. The output buffer is re-allocated on the next
    /// tick.
    pub fn set_canvas(&mut self, canvas: CanvasSize) {
        self.config.render.canvas = canvas;
        self.pending_canvas = Some(canvas.dimensions());
    }

    pub fn set_canvas_dimensions(&mut self, width: u32, height: u32) {
        self.pending_canvas = Some((width, height));
    }

    /// Binds an externally decoded source to a video layer.
    pub fn attach_source(
        &mut self,
        layer_id: u64,
        file_name: &str,
        source: Box<dyn FrameSource>,
    ) -> Option<VideoBinding> {
        self.stack.get(layer_id)?;
        let binding = self.videos.attach(file_name, source);
        self.bind_layer(layer_id, binding.clone());
        Some(binding)
    }

    /// Runs one tick of `dt` seconds.
    pub fn tick(&mut self, dt: f32) -> TickOutput {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.ticks += 1;

        if let Some((width, height)) = self.pending_canvas.take() {
            self.compositor.resize(width, height);
            tracing::info!(width, height, "canvas resized");
        }

        let rejections = self.drain_commands();
        self.transport.advance(dt);

        for tone in self.midi.drain() {
            self.tones.trigger(tone);
        }
        let output_level = self.tones.level_over(dt);
        let audio = self.audio.frame(output_level);

        self.master.poll_trigger(&audio, &self.config.reactive);
        self.master.advance(dt);
        for layer in self.stack.layers_mut() {
            if let Some(transition) = layer.transition.as_mut() {
                transition.poll_trigger(&audio, &self.config.reactive);
                transition.advance(dt);
            }
        }

        let time = self.transport.time();
        let (width, height) = self.compositor.dimensions();
        let mut layer_frames = Vec::with_capacity(self.stack.len());
        for layer in self.stack.layers() {
            if !layer.visible {
                continue;
            }
            let effects = self.mapping.modulate(&layer.effects, &audio);
            let source = match &layer.source {
                LayerSource::None => None,
                LayerSource::Generative(settings) => {
                    let generator = self
                        .generators
                        .entry(layer.id)
                        .or_insert_with(|| GenerativeEngine::new(settings.clone()));
                    if generator.settings() != settings {
                        generator.set_settings(settings.clone());
                    }
                    Some(generator.render(time, &effects, width, height))
                }
                LayerSource::Video(binding) => self.videos.poll(binding.handle, time, width, height),
            };
            let Some(source) = source else {
                continue;
            };
            let blend = layer
                .transition
                .as_ref()
                .map(Transition::blend)
                .unwrap_or_else(crate::TransitionBlend::identity);
            layer_frames.push(LayerFrame {
                frame: self.compositor.render_layer(source, &effects, &blend, time),
                blend_mode: layer.blend_mode,
                opacity: layer.opacity * blend.opacity.clamp(0.0, 1.0),
            });
        }

        let composed = self.compositor.composite(&layer_frames);
        let frame = self.compositor.apply_master(composed, &self.master.blend(), time);

        tracing::debug!(
            tick = self.ticks,
            layers = layer_frames.len(),
            input_level = audio.input_level,
            output_level = audio.output_level,
            notes = self.midi.active_notes().len(),
            "tick"
        );

        TickOutput {
            frame,
            meters: self.audio.display_bins(),
            active_notes: self.midi.active_notes().to_vec(),
            transport: self.transport.status(),
            audio,
            rejections,
        }
    }

    fn drain_commands(&mut self) -> Vec<UploadRejection> {
        let mut rejections = Vec::new();
        while let Ok(command) = self.commands_rx.try_recv() {
            if let Err(rejection) = self.apply(command) {
                tracing::warn!(%rejection, "upload rejected");
                rejections.push(rejection);
            }
        }
        rejections
    }

    fn apply(&mut self, command: LayerCommand) -> Result<(), UploadRejection> {
        match command {
            LayerCommand::Append(layer) => {
                self.stack.append(layer);
            }
            LayerCommand::Update { id, patch } => {
                let before = self.video_handle(id);
                self.stack.update(id, patch);
                if before.is_some() && before != self.video_handle(id) {
                    self.release_video(before);
                }
                self.drop_stale_generator(id);
            }
            LayerCommand::Remove { id } => {
                if let Some(layer) = self.stack.remove(id) {
                    self.forget_layer(&layer);
                }
            }
            LayerCommand::Select { id } => {
                self.stack.select(id);
            }
            LayerCommand::SetParameter { id, field, value } => {
                self.stack.set_parameter(id, field, value);
            }
            LayerCommand::ApplyPreset { id, name } => {
                self.stack.apply_preset(id, &name);
            }
            LayerCommand::BindVideo { id, payload } => self.bind_video(id, &payload)?,
            LayerCommand::StartTransition { target, settings } => self.start_transition(target, settings),
            LayerCommand::CancelTransition { target } => {
                let result = match target {
                    TransitionTarget::Master => self.master.cancel(),
                    TransitionTarget::Layer(id) => match self
                        .stack
                        .get_mut(id)
                        .and_then(|layer| layer.transition.as_mut())
                    {
                        Some(transition) => transition.cancel(),
                        None => Ok(()),
                    },
                };
                if let Err(err) = result {
                    tracing::debug!(%err, ?target, "cancel ignored");
                }
            }
            LayerCommand::SetPlaying(playing) => self.transport.set_playing(playing),
            LayerCommand::Seek(time) => self.transport.seek(time),
        }
        Ok(())
    }

    fn bind_video(&mut self, id: u64, payload: &MediaPayload) -> Result<(), UploadRejection> {
        payload.validate(&self.config.upload)?;
        if self.stack.get(id).is_none() {
            tracing::debug!(id, "video bound to unknown layer ignored");
            return Ok(());
        }
        let (width, height) = self.compositor.dimensions();
        let source = open_payload(payload, width, height);
        let binding = self.videos.attach(&payload.name, source);
        tracing::info!(id, file = payload.name.as_str(), handle = binding.handle, "video bound");
        self.bind_layer(id, binding);
        Ok(())
    }

    fn bind_layer(&mut self, id: u64, binding: VideoBinding) {
        let previous = self.video_handle(id);
        if let Some(layer) = self.stack.get_mut(id) {
            layer.source = LayerSource::Video(binding);
        }
        self.generators.remove(&id);
        self.release_video(previous);
        self.transport.set_duration(self.videos.longest_duration());
    }

    fn start_transition(&mut self, target: TransitionTarget, settings: Option<TransitionSettings>) {
        match target {
            TransitionTarget::Master => {
                let settings = settings.unwrap_or(*self.master.settings());
                self.master.start(settings);
            }
            TransitionTarget::Layer(id) => {
                let Some(layer) = self.stack.get_mut(id) else {
                    return;
                };
                let transition = layer
                    .transition
                    .get_or_insert_with(|| Transition::new(settings.unwrap_or_default()));
                let settings = settings.unwrap_or(*transition.settings());
                transition.start(settings);
            }
        }
    }

    fn video_handle(&self, id: u64) -> Option<u64> {
        match self.stack.get(id).map(|layer| &layer.source) {
            Some(LayerSource::Video(binding)) => Some(binding.handle),
            _ => None,
        }
    }

    fn release_video(&mut self, handle: Option<u64>) {
        if let Some(handle) = handle {
            self.videos.detach(handle);
            self.transport.set_duration(self.videos.longest_duration());
        }
    }

    fn drop_stale_generator(&mut self, id: u64) {
        let generative = matches!(
            self.stack.get(id).map(|layer| &layer.source),
            Some(LayerSource::Generative(_))
        );
        if !generative {
            self.generators.remove(&id);
        }
    }

    fn forget_layer(&mut self, layer: &Layer) {
        self.generators.remove(&layer.id);
        if let LayerSource::Video(binding) = &layer.source {
            self.release_video(Some(binding.handle));
        }
    }
}

impl Default for RenderLoop {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::CanvasSize,
        layers::{BlendMode, LayerPatch},
        EffectField, TransitionKind,
    };

    fn small_loop() -> RenderLoop {
        let mut config = AppConfig::default();
        config.render.canvas = CanvasSize::Small;
        RenderLoop::new(config)
    }

    #[test]
    fn tick_returns_a_canvas_sized_frame() {
        let mut engine = small_loop();
        let out = engine.tick(1.0 / 60.0);
        assert_eq!((out.frame.width(), out.frame.height()), (320, 240));
        assert_eq!(out.meters.len(), crate::analysis::BIN_COUNT);
        assert!(out.rejections.is_empty());
    }

    #[test]
    fn commands_apply_in_arrival_order() {
        let mut engine = small_loop();
        let sender = engine.commands();
        sender.send(LayerCommand::SetParameter {
            id: 0,
            field: EffectField::Blur,
            value: 0.2,
        });
        sender.send(LayerCommand::SetParameter {
            id: 0,
            field: EffectField::Blur,
            value: 0.7,
        });
        engine.tick(0.0);
        assert_eq!(engine.stack().get(0).unwrap().effects.blur, 0.7);
    }

    #[test]
    fn oversized_upload_is_reported_without_mutation() {
        let mut engine = small_loop();
        let before = engine.stack().clone();
        engine.submit(LayerCommand::BindVideo {
            id: 0,
            payload: MediaPayload::new("huge.mp4", "video/mp4", 200 * 1024 * 1024),
        });
        let out = engine.tick(0.0);
        assert_eq!(out.rejections.len(), 1);
        assert_eq!(engine.stack(), &before);
    }

    #[test]
    fn bound_video_drives_transport_duration() {
        let mut engine = small_loop();
        engine.submit(LayerCommand::BindVideo {
            id: 1,
            payload: MediaPayload::new("clip.mp4", "video/mp4", 1024),
        });
        engine.tick(0.0);
        assert!(matches!(
            engine.stack().get(1).unwrap().source,
            LayerSource::Video(_)
        ));
        assert_eq!(engine.transport().duration(), Some(10.0));

        engine.submit(LayerCommand::Remove { id: 1 });
        engine.tick(0.0);
        assert_eq!(engine.transport().duration(), None);
    }

    #[test]
    fn master_transition_runs_to_completion() {
        let mut engine = small_loop();
        engine.submit(LayerCommand::StartTransition {
            target: TransitionTarget::Master,
            settings: Some(TransitionSettings {
                kind: TransitionKind::Fade,
                duration: 0.5,
                ..Default::default()
            }),
        });
        engine.tick(0.0);
        assert!(engine.master().is_running());
        for _ in 0..6 {
            engine.tick(0.1);
        }
        assert_eq!(engine.master().phase(), crate::TransitionPhase::Complete);
    }

    #[test]
    fn one_onset_fires_one_beat_trigger() {
        let mut engine = small_loop();
        engine.configure_master(TransitionSettings {
            duration: 0.5,
            trigger: crate::TransitionTrigger::Beat,
            ..Default::default()
        });
        let window = crate::analysis::WINDOW_SIZE;
        engine.audio().push_samples(&vec![0.0; window]).unwrap();
        assert!(!engine.tick(0.2).audio.beat);

        engine.audio().push_samples(&vec![1.0; window]).unwrap();
        assert!(engine.tick(0.2).audio.beat);
        assert!(engine.master().is_running());

        let mut beats = 0;
        for _ in 0..20 {
            if engine.tick(0.2).audio.beat {
                beats += 1;
            }
        }
        assert_eq!(beats, 0);
        assert_eq!(engine.master().phase(), crate::TransitionPhase::Complete);
    }

    #[test]
    fn generators_follow_layer_sources() {
        let mut engine = small_loop();
        engine.tick(0.0);
        assert!(engine.generators.contains_key(&0));
        assert!(engine.generators.contains_key(&1));

        engine.submit(LayerCommand::Update {
            id: 0,
            patch: LayerPatch {
                source: Some(LayerSource::None),
                ..Default::default()
            },
        });
        engine.submit(LayerCommand::BindVideo {
            id: 1,
            payload: MediaPayload::new("clip.mp4", "video/mp4", 1024),
        });
        engine.tick(0.0);
        assert!(engine.generators.is_empty());
    }

    #[test]
    fn canvas_change_lands_on_next_tick() {
        let mut engine = small_loop();
        engine.set_canvas(CanvasSize::Large);
        assert_eq!(engine.canvas(), (320, 240));
        let out = engine.tick(0.0);
        assert_eq!((out.frame.width(), out.frame.height()), (1280, 720));
    }

    #[test]
    fn midi_notes_reach_the_output() {
        let mut engine = small_loop();
        let inbox = engine.midi_inbox();
        inbox.send([0x90, 60, 100], 0);
        let out = engine.tick(1.0 / 60.0);
        assert_eq!(out.active_notes.len(), 1);
        assert!(out.audio.output_level > 0.0);

        inbox.send([0x80, 60, 0], 20);
        let out = engine.tick(1.0 / 60.0);
        assert!(out.active_notes.is_empty());
    }

    #[test]
    fn hidden_and_removed_layers_do_not_render() {
        let mut engine = small_loop();
        engine.submit(LayerCommand::Update {
            id: 2,
            patch: LayerPatch {
                blend_mode: Some(BlendMode::Difference),
                ..Default::default()
            },
        });
        let hidden = engine.tick(0.0).frame;
        engine.submit(LayerCommand::Remove { id: 2 });
        let removed = engine.tick(0.0).frame;
        assert_eq!(hidden, removed);
    }
}
