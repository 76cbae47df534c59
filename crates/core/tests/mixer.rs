use av_mixer_core::{
    presets, AppConfig, AudioAnalysisFrame, AudioEngine, AudioMode, BlendMode, Easing,
    EffectField, EffectParameterSet, FieldRange, GenerativeEngine, GenerativeSettings, Layer,
    LayerCommand, LayerPatch, LayerSource, LayerStack, MappingMatrix, MediaPayload, MidiRouter,
    Pattern, RenderLoop, Transition, TransitionKind, TransitionPhase, TransitionSettings,
    TransitionTarget,
};

fn tiny_loop(stack: LayerStack) -> RenderLoop {
    let mut engine = RenderLoop::with_stack(AppConfig::default(), stack, AudioMode::Manual);
    engine.set_canvas_dimensions(32, 24);
    engine
}

fn in_range(field: EffectField, value: f32) -> bool {
    match field.range() {
        FieldRange::Span { min, max } | FieldRange::Integer { min, max } => {
            value >= min && value <= max
        }
        FieldRange::Angle => (0.0..360.0).contains(&value),
        FieldRange::Toggle => value == 0.0 || value == 1.0,
    }
}

#[test]
fn every_field_stays_in_range_after_any_write() {
    let inputs = [
        -1e9,
        -361.0,
        -1.0,
        0.0,
        0.5,
        1.5,
        360.0,
        1e9,
        f32::NAN,
        f32::INFINITY,
        f32::NEG_INFINITY,
    ];
    let mut stack = LayerStack::demo();
    for field in EffectField::ALL {
        for value in inputs {
            stack.set_parameter(0, *field, value);
            let stored = stack.get(0).unwrap().effects.get(*field);
            assert!(in_range(*field, stored), "{field:?} <- {value} stored {stored}");
        }
    }
}

#[test]
fn non_finite_input_lands_on_lower_bound() {
    let mut fx = EffectParameterSet::default();
    fx.set(EffectField::Gamma, f32::NAN);
    fx.set(EffectField::Pixelate, f32::INFINITY);
    fx.set(EffectField::Brightness, f32::NEG_INFINITY);
    assert_eq!(fx.gamma, 0.1);
    assert_eq!(fx.pixelate, 1.0);
    assert_eq!(fx.brightness, 0.0);
}

#[test]
fn presets_overwrite_the_whole_set() {
    for name in presets::EFFECT_PRESET_NAMES {
        let mut stack = LayerStack::demo();
        for field in EffectField::ALL {
            stack.set_parameter(0, *field, 0.37);
        }
        assert!(stack.apply_preset(0, name));
        assert_eq!(
            stack.get(0).unwrap().effects,
            presets::effect_preset(name).unwrap(),
            "{name}"
        );
    }
}

#[test]
fn selection_does_not_change_the_output() {
    let mut a = tiny_loop(LayerStack::demo());
    let mut b = tiny_loop(LayerStack::demo());
    b.submit(LayerCommand::Select { id: 1 });
    for _ in 0..3 {
        assert_eq!(a.tick(1.0 / 30.0).frame, b.tick(1.0 / 30.0).frame);
    }
    assert_eq!(b.stack().selected(), Some(1));
}

#[test]
fn hidden_layer_parameters_do_not_change_the_output() {
    let mut a = tiny_loop(LayerStack::demo());
    let mut b = tiny_loop(LayerStack::demo());
    b.submit(LayerCommand::ApplyPreset {
        id: 2,
        name: "chaos".into(),
    });
    b.submit(LayerCommand::Update {
        id: 2,
        patch: LayerPatch {
            blend_mode: Some(BlendMode::Difference),
            opacity: Some(1.0),
            ..Default::default()
        },
    });
    assert_eq!(a.tick(0.1).frame, b.tick(0.1).frame);
}

#[test]
fn invisible_layers_match_an_empty_stack() {
    let mut hidden = LayerStack::new();
    hidden.append(Layer::generative("", Pattern::Fire).hidden());
    let mut a = tiny_loop(hidden);
    let mut b = tiny_loop(LayerStack::new());
    let (fa, fb) = (a.tick(0.2).frame, b.tick(0.2).frame);
    assert_eq!(fa, fb);
    assert!(fa.pixels().iter().all(|px| *px == [0.0, 0.0, 0.0, 1.0]));
}

#[test]
fn midi_note_on_then_off() {
    let mut router = MidiRouter::new();
    let tone = router.handle(&[0x90, 69, 100], 1).unwrap();
    assert!((tone.frequency_hz - 440.0).abs() < 1e-3);
    assert!(router.is_active(69));

    assert!(router.handle(&[0x90, 64, 0], 2).is_none());
    assert!(router.handle(&[0x80, 69, 0], 3).is_none());
    assert!(router.active_notes().is_empty());

    assert!(router.handle(&[0x91, 60, 100], 4).is_none());
    assert!(router.handle(&[0x90, 60], 5).is_none());
    assert!(router.active_notes().is_empty());
}

#[test]
fn missing_capture_device_yields_silent_frames() {
    let mut engine = AudioEngine::new(AudioMode::Live);
    let capability = engine.enable().clone();
    if capability.is_available() {
        // A real device is present; silence cannot be asserted.
        return;
    }
    for _ in 0..5 {
        let frame = engine.frame(0.0);
        assert_eq!(frame.input_level, 0.0);
        assert!(frame.bins.iter().all(|b| *b == 0.0));
    }
    engine.disable();
    engine.disable();
}

#[test]
fn transitions_complete_with_exact_endpoints() {
    for kind in TransitionKind::ALL {
        for easing in Easing::ALL {
            let mut transition = Transition::default();
            transition.start(TransitionSettings {
                kind,
                easing,
                duration: 0.5,
                ..Default::default()
            });
            assert_eq!(transition.eased_progress(), 0.0);
            for _ in 0..10 {
                transition.advance(0.06);
            }
            assert_eq!(transition.phase(), TransitionPhase::Complete, "{kind:?} {easing:?}");
            assert_eq!(transition.progress(), 1.0);
            assert_eq!(transition.eased_progress(), 1.0);
            assert_eq!(transition.blend(), kind.blend(1.0));
        }
    }
}

#[test]
fn transition_duration_is_clamped() {
    let mut transition = Transition::default();
    transition.start(TransitionSettings {
        duration: 60.0,
        ..Default::default()
    });
    assert_eq!(transition.settings().duration, 5.0);
    transition.start(TransitionSettings {
        duration: 0.0,
        ..Default::default()
    });
    assert_eq!(transition.settings().duration, 0.1);
}

#[test]
fn upload_limits_are_enforced_without_mutation() {
    let mut engine = tiny_loop(LayerStack::demo());
    let before = engine.stack().clone();
    engine.submit(LayerCommand::BindVideo {
        id: 0,
        payload: MediaPayload::new("big.mov", "video/quicktime", 100 * 1024 * 1024 + 1),
    });
    engine.submit(LayerCommand::BindVideo {
        id: 0,
        payload: MediaPayload::new("cover.png", "image/png", 10),
    });
    let out = engine.tick(0.0);
    assert_eq!(out.rejections.len(), 2);
    assert_eq!(engine.stack(), &before);

    engine.submit(LayerCommand::BindVideo {
        id: 0,
        payload: MediaPayload::new("ok.mov", "video/quicktime", 100 * 1024 * 1024),
    });
    let out = engine.tick(0.0);
    assert!(out.rejections.is_empty());
    match &engine.stack().get(0).unwrap().source {
        LayerSource::Video(binding) => {
            assert_eq!(binding.file_name, "ok.mov");
            assert!(binding.url.ends_with("/ok.mov"), "{}", binding.url);
        }
        other => panic!("layer 0 holds {other:?}"),
    }
    for id in [1, 2] {
        assert_eq!(engine.stack().get(id), before.get(id));
    }
}

#[test]
fn particle_counts_stay_in_range_for_every_layer() {
    let mut engine = tiny_loop(LayerStack::demo());
    for (id, count) in [(0, 5_000), (1, 0), (2, 250)] {
        let mut settings = GenerativeSettings {
            pattern: Pattern::Particles,
            ..Default::default()
        };
        settings.particle.count = count;
        engine.submit(LayerCommand::Update {
            id,
            patch: LayerPatch {
                source: Some(LayerSource::Generative(settings)),
                ..Default::default()
            },
        });
    }
    let mut appended = Layer::generative("", Pattern::Particles);
    if let LayerSource::Generative(settings) = &mut appended.source {
        settings.particle.count = 9_999;
    }
    engine.submit(LayerCommand::Append(appended));
    engine.tick(0.1);

    let counts: Vec<u32> = engine
        .stack()
        .layers()
        .iter()
        .filter_map(|layer| match &layer.source {
            LayerSource::Generative(settings) => Some(settings.particle.count),
            _ => None,
        })
        .collect();
    assert_eq!(counts, vec![500, 10, 250, 500]);
}

#[test]
fn reactive_scaling_is_transient() {
    let mut frame = AudioAnalysisFrame::silent();
    frame.input_level = 0.5;
    frame.bins = [0.5; 64];
    let base = EffectParameterSet {
        audio_reactive: true,
        bass_reactive: true,
        glitch: 0.4,
        ..Default::default()
    };
    let effective = MappingMatrix::new().modulate(&base, &frame);
    assert!((effective.glitch - 0.9).abs() < 1e-6);
    assert_eq!(base.glitch, 0.4);

    frame.input_level = 5.0;
    let saturated = MappingMatrix::new().modulate(&base, &frame);
    assert_eq!(saturated.glitch, 1.0);
}

#[test]
fn stochastic_patterns_reproduce_per_seed() {
    let settings = GenerativeSettings {
        pattern: Pattern::Nebula,
        seed: 1234,
        ..Default::default()
    };
    let fx = EffectParameterSet::default();
    let a = GenerativeEngine::new(settings.clone()).render(3.0, &fx, 16, 12);
    let b = GenerativeEngine::new(settings).render(3.0, &fx, 16, 12);
    assert_eq!(a, b);
}

#[test]
fn paused_transport_reproduces_the_last_frame() {
    let mut engine = tiny_loop(LayerStack::demo());
    assert!(!engine.transport().is_playing());
    engine.submit(LayerCommand::SetPlaying(true));
    engine.tick(0.25);
    assert_eq!(engine.transport().time(), 0.25);

    engine.submit(LayerCommand::SetPlaying(false));
    let first = engine.tick(0.25).frame;
    let second = engine.tick(0.25).frame;
    assert_eq!(first, second);
    assert_eq!(engine.transport().time(), 0.25);
}

#[test]
fn cancelling_an_idle_master_is_harmless() {
    let mut engine = tiny_loop(LayerStack::demo());
    engine.submit(LayerCommand::CancelTransition {
        target: TransitionTarget::Master,
    });
    engine.tick(0.0);
    assert_eq!(engine.master().phase(), TransitionPhase::Idle);
}
