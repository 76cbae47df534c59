use std::f32::consts::TAU;

const TONE_GAIN: f32 = 0.1;
const TONE_SECONDS: f32 = 1.0;
const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Equal-tempered pitch with A4 (note 69) at 440 Hz.
pub fn midi_to_frequency(note: u8) -> f32 {
    440.0 * 2f32.powf((f32::from(note) - 69.0) / 12.0)
}

/// Scientific pitch name, e.g. `60 -> "C4"`.
pub fn note_name(note: u8) -> String {
    let octave = i32::from(note / 12) - 1;
    format!("{}{}", NOTE_NAMES[usize::from(note % 12)], octave)
}

/// A short sine tone to play in response to a Note-On.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneRequest {
    pub frequency_hz: f32,
    pub gain: f32,
    pub duration_seconds: f32,
}

impl ToneRequest {
    pub fn for_note(note: u8) -> Self {
        Self {
            frequency_hz: midi_to_frequency(note),
            gain: TONE_GAIN,
            duration_seconds: TONE_SECONDS,
        }
    }
}

#[derive(Debug, Clone)]
struct Voice {
    request: ToneRequest,
    phase: f32,
    remaining: usize,
}

/// Sums the currently sounding tones into sample blocks. Voices expire by
/// sample count, so tone length does not depend on the tick rate.
#[derive(Debug, Clone)]
pub struct ToneBank {
    sample_rate: u32,
    voices: Vec<Voice>,
}

impl ToneBank {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            voices: Vec::new(),
        }
    }

    pub fn trigger(&mut self, request: ToneRequest) {
        let remaining = (request.duration_seconds.max(0.0) * self.sample_rate as f32) as usize;
        self.voices.push(Voice {
            request,
            phase: 0.0,
            remaining,
        });
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Renders `out.len()` mono samples and retires finished voices.
    pub fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let sample_rate = self.sample_rate as f32;
        for voice in &mut self.voices {
            let step = TAU * voice.request.frequency_hz / sample_rate;
            for sample in out.iter_mut().take(voice.remaining) {
                *sample += voice.phase.sin() * voice.request.gain;
                voice.phase = (voice.phase + step) % TAU;
            }
            voice.remaining = voice.remaining.saturating_sub(out.len());
        }
        self.voices.retain(|voice| voice.remaining > 0);
    }

    /// Renders `seconds` worth of audio and returns its mean absolute level.
    /// Only the span where a voice still sounds is rendered; the rest counts
    /// as silence.
    pub fn level_over(&mut self, seconds: f32) -> f32 {
        let count = (seconds.max(0.0) * self.sample_rate as f32).round() as usize;
        let audible = self
            .voices
            .iter()
            .map(|voice| voice.remaining)
            .max()
            .unwrap_or(0)
            .min(count);
        if audible == 0 {
            return 0.0;
        }
        let mut block = vec![0.0; audible];
        self.render(&mut block);
        block.iter().map(|s| s.abs()).sum::<f32>() / count as f32
    }
}
