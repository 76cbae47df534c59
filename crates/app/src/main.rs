use std::{path::PathBuf, time::Duration};

use av_mixer_core::{
    list_input_devices, list_midi_devices, presets, AppConfig, AudioMode, CanvasSize, LayerCommand,
    LayerStack, PresetCatalog, RenderLoop, TransitionTarget,
};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

fn main() -> av_mixer_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices => run_devices(),
        Commands::Presets => run_presets(),
        Commands::Render(args) => run_render(args),
        Commands::Live { config, seconds } => run_live(config, seconds),
    }
}

fn run_devices() -> av_mixer_core::Result<()> {
    let listing = serde_json::json!({
        "audio": list_input_devices(),
        "midi": list_midi_devices(),
    });
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}

fn run_presets() -> av_mixer_core::Result<()> {
    println!("{}", serde_json::to_string_pretty(&PresetCatalog::builtin())?);
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> av_mixer_core::Result<AppConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading config");
            AppConfig::from_json_file(path)
        }
        None => Ok(AppConfig::default()),
    }
}

fn run_render(args: RenderArgs) -> av_mixer_core::Result<()> {
    let mut config = load_config(args.config.as_ref())?;
    if let Some(canvas) = args.canvas {
        config.render.canvas = canvas.into();
    }
    let fps = config.render.fps.max(1);
    let dt = 1.0 / fps as f32;
    tracing::info!(ticks = args.ticks, fps, output = ?args.output, "headless render");

    let mut engine = RenderLoop::new(config);
    engine.submit(LayerCommand::SetPlaying(true));
    if let Some(name) = &args.preset {
        if presets::effect_preset(name).is_none() {
            tracing::warn!(preset = name.as_str(), "unknown effect preset");
        }
        for layer in engine.stack().layers() {
            engine.submit(LayerCommand::ApplyPreset {
                id: layer.id,
                name: name.clone(),
            });
        }
    }
    if let Some(name) = &args.transition {
        match presets::transition_preset(name) {
            Some(preset) => engine.submit(LayerCommand::StartTransition {
                target: TransitionTarget::Master,
                settings: Some(preset.apply_to(*engine.master().settings())),
            }),
            None => tracing::warn!(transition = name.as_str(), "unknown transition preset"),
        }
    }

    let samples_per_tick = (engine.audio().sample_rate() as f32 * dt).round() as usize;
    let mut phase = 0.0f32;
    let mut last = None;
    for tick in 0..args.ticks.max(1) {
        if let Some(hz) = args.tone_hz {
            let step = std::f32::consts::TAU * hz / engine.audio().sample_rate() as f32;
            let block: Vec<f32> = (0..samples_per_tick)
                .map(|_| {
                    phase = (phase + step) % std::f32::consts::TAU;
                    phase.sin() * 0.5
                })
                .collect();
            engine.audio().push_samples(&block)?;
        }
        if let Some(note) = args.note {
            if tick == 0 {
                engine.midi_inbox().send([0x90, note.min(127), 100], 0);
            }
        }
        last = Some(engine.tick(dt));
    }

    if let Some(output) = last {
        output.frame.save_png(&args.output)?;
        tracing::info!(
            path = ?args.output,
            input_level = output.audio.input_level,
            output_level = output.audio.output_level,
            notes = output.active_notes.len(),
            "frame written"
        );
    }
    Ok(())
}

fn run_live(config: Option<PathBuf>, seconds: f32) -> av_mixer_core::Result<()> {
    let config = load_config(config.as_ref())?;
    let fps = config.render.fps.max(1);
    let dt = 1.0 / fps as f32;
    let mut engine = RenderLoop::with_stack(config, LayerStack::demo(), AudioMode::Live);
    engine.enable_live_input();
    engine.submit(LayerCommand::SetPlaying(true));
    tracing::info!(seconds, "starting live mode");

    let ticks = (seconds.max(0.0) * fps as f32).ceil() as u64;
    for tick in 0..ticks {
        let output = engine.tick(dt);
        if tick % u64::from(fps) == 0 {
            tracing::info!(
                time = output.transport.display.as_str(),
                input_level = output.audio.input_level,
                beat = output.audio.beat,
                notes = output.active_notes.len(),
                "live"
            );
        }
        std::thread::sleep(Duration::from_secs_f32(dt));
    }
    engine.disable_live_input();
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Live audio-visual layer mixer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List audio and MIDI input devices as JSON.
    Devices,
    /// Print the built-in effect and transition presets as JSON.
    Presets,
    /// Render the demo stack headlessly and write the last frame as PNG.
    Render(RenderArgs),
    /// Run against live audio and MIDI input, logging levels once a second.
    Live {
        /// Optional JSON config file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// How long to run.
        #[arg(long, default_value_t = 10.0)]
        seconds: f32,
    },
}

#[derive(clap::Args, Debug)]
struct RenderArgs {
    /// Output PNG path.
    #[arg(short, long, default_value = "frame.png")]
    output: PathBuf,
    /// Number of ticks to run before capturing.
    #[arg(short, long, default_value_t = 60)]
    ticks: u32,
    /// Optional JSON config file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Canvas size, overriding the config.
    #[arg(long, value_enum)]
    canvas: Option<CanvasArg>,
    /// Effect preset applied to every layer.
    #[arg(long)]
    preset: Option<String>,
    /// Transition preset started on the whole output.
    #[arg(long)]
    transition: Option<String>,
    /// Feed a sine tone of this frequency as audio input.
    #[arg(long)]
    tone_hz: Option<f32>,
    /// Play this MIDI note on the first tick.
    #[arg(long)]
    note: Option<u8>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CanvasArg {
    Small,
    Medium,
    Large,
    Custom,
}

impl From<CanvasArg> for CanvasSize {
    fn from(value: CanvasArg) -> Self {
        match value {
            CanvasArg::Small => CanvasSize::Small,
            CanvasArg::Medium => CanvasSize::Medium,
            CanvasArg::Large => CanvasSize::Large,
            CanvasArg::Custom => CanvasSize::Custom,
        }
    }
}
