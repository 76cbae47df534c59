use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::{MixerError, Result};

/// Number of frequency bins in every [`AudioAnalysisFrame`]. Reactive
/// mappings index into this range, so it never changes at runtime.
pub const BIN_COUNT: usize = 64;
/// Samples per analysis window; a real FFT of this size yields
/// `BIN_COUNT + 1` bins of which the Nyquist bin is dropped.
pub const WINDOW_SIZE: usize = BIN_COUNT * 2;

const BEAT_GAIN: f32 = 12.0;
const BEAT_THRESHOLD: f32 = 0.6;
const MIN_BEAT_INTERVAL: f32 = 0.2;
const MAX_BEAT_HISTORY: usize = 32;

/// Summary of the analysis metadata accumulated so far.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AnalysisSummary {
    pub sample_rate: u32,
    pub tempo_bpm: Option<f32>,
    pub duration_seconds: Option<f32>,
}

/// Level and spectrum measurements for a single tick.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioAnalysisFrame {
    pub time: f32,
    /// Mean absolute magnitude across [`Self::bins`].
    pub input_level: f32,
    /// Level of the tones the mixer itself emitted during the tick.
    pub output_level: f32,
    pub bins: [f32; BIN_COUNT],
    pub beat: bool,
    pub beat_confidence: f32,
}

impl Default for AudioAnalysisFrame {
    fn default() -> Self {
        Self::silent()
    }
}

impl AudioAnalysisFrame {
    /// The frame emitted when no input is available.
    pub fn silent() -> Self {
        Self {
            time: 0.0,
            input_level: 0.0,
            output_level: 0.0,
            bins: [0.0; BIN_COUNT],
            beat: false,
            beat_confidence: 0.0,
        }
    }

    /// Mean magnitude of the lowest third of the spectrum.
    pub fn bass_level(&self) -> f32 {
        mean(&self.bins[..BIN_COUNT / 3])
    }

    /// Mean magnitude of the highest third of the spectrum.
    pub fn treble_level(&self) -> f32 {
        mean(&self.bins[BIN_COUNT - BIN_COUNT / 3..])
    }
}

/// Spectral analysis over a sliding window of the most recent samples.
///
/// The engine is synchronous so that the tick driver and tests can drive it
/// directly; capture threads only ever hand it raw sample blocks.
pub struct AnalysisEngine {
    sample_rate: u32,
    summary: AnalysisSummary,
    window: Vec<f32>,
    latest: AudioAnalysisFrame,
    display_bins: [f32; BIN_COUNT],
    display_smoothing: f32,
    processed_samples: usize,
    last_rms: f32,
    beat_timestamps: Vec<f32>,
    fft_planner: RealFftPlanner<f32>,
    fft: Option<FftResources>,
}

impl AnalysisEngine {
    /// Creates a new engine using the default 48 kHz sample rate.
    pub fn new() -> Self {
        Self::with_sample_rate(48_000)
    }

    /// Creates a new engine that operates at the provided sample rate.
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            summary: AnalysisSummary {
                sample_rate,
                ..Default::default()
            },
            window: Vec::with_capacity(WINDOW_SIZE),
            latest: AudioAnalysisFrame::silent(),
            display_bins: [0.0; BIN_COUNT],
            display_smoothing: 0.8,
            processed_samples: 0,
            last_rms: 0.0,
            beat_timestamps: Vec::new(),
            fft_planner: RealFftPlanner::new(),
            fft: None,
        }
    }

    pub fn set_display_smoothing(&mut self, factor: f32) {
        self.display_smoothing = if factor.is_finite() {
            factor.clamp(0.0, 0.99)
        } else {
            0.0
        };
    }

    /// Returns metadata collected so far about the analysed stream.
    pub fn summary(&self) -> &AnalysisSummary {
        &self.summary
    }

    /// Returns the sample rate associated with the engine.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Clears the accumulated state while preserving configuration.
    pub fn reset(&mut self) {
        self.summary = AnalysisSummary {
            sample_rate: self.sample_rate,
            ..Default::default()
        };
        self.window.clear();
        self.latest = AudioAnalysisFrame::silent();
        self.display_bins = [0.0; BIN_COUNT];
        self.processed_samples = 0;
        self.last_rms = 0.0;
        self.beat_timestamps.clear();
    }

    /// Consumes audio samples and recomputes the spectrum over the most
    /// recent [`WINDOW_SIZE`] samples.
    pub fn process_block(&mut self, samples: &[f32]) -> Result<AudioAnalysisFrame> {
        if samples.is_empty() {
            return Err(MixerError::InvalidInput(
                "analysis requires at least one sample",
            ));
        }

        let block_size = samples.len();
        let sample_rate = self.sample_rate.max(1) as f32;
        let start_time = self.processed_samples as f32 / sample_rate;
        let end_time = (self.processed_samples + block_size) as f32 / sample_rate;
        let timestamp = start_time + (end_time - start_time) * 0.5;

        self.push_window(samples);
        let bins = self.compute_bins()?;
        let input_level = mean(&bins);

        let rms = compute_rms(samples);
        let (beat, beat_confidence) = self.update_beats(timestamp, rms);

        self.processed_samples += block_size;
        self.summary.duration_seconds = Some(
            self.summary
                .duration_seconds
                .map(|d| d.max(end_time))
                .unwrap_or(end_time),
        );

        self.latest = AudioAnalysisFrame {
            time: timestamp,
            input_level,
            output_level: 0.0,
            bins,
            beat,
            beat_confidence,
        };
        Ok(self.latest.clone())
    }

    /// Returns the latest frame emitted by the engine.
    pub fn latest_frame(&self) -> &AudioAnalysisFrame {
        &self.latest
    }

    /// Folds a frame into the smoothed meter spectrum. The smoothed copy is
    /// for display only and never feeds reactive modulation.
    pub fn smooth_display(&mut self, frame: &AudioAnalysisFrame) -> &[f32; BIN_COUNT] {
        let k = self.display_smoothing;
        for (shown, fresh) in self.display_bins.iter_mut().zip(frame.bins.iter()) {
            *shown = *shown * k + *fresh * (1.0 - k);
        }
        &self.display_bins
    }

    pub fn display_bins(&self) -> &[f32; BIN_COUNT] {
        &self.display_bins
    }

    fn push_window(&mut self, samples: &[f32]) {
        if samples.len() >= WINDOW_SIZE {
            self.window.clear();
            self.window
                .extend_from_slice(&samples[samples.len() - WINDOW_SIZE..]);
            return;
        }
        self.window.extend_from_slice(samples);
        if self.window.len() > WINDOW_SIZE {
            let overflow = self.window.len() - WINDOW_SIZE;
            self.window.drain(0..overflow);
        }
    }

    fn update_beats(&mut self, timestamp: f32, rms: f32) -> (bool, f32) {
        let delta = (rms - self.last_rms).max(0.0);
        self.last_rms = rms;
        let confidence = (delta * BEAT_GAIN).clamp(0.0, 1.0);
        let mut beat = false;

        if confidence >= BEAT_THRESHOLD
            && self
                .beat_timestamps
                .last()
                .map(|last| timestamp - last >= MIN_BEAT_INTERVAL)
                .unwrap_or(true)
        {
            beat = true;
            self.beat_timestamps.push(timestamp);
            if self.beat_timestamps.len() > MAX_BEAT_HISTORY {
                let overflow = self.beat_timestamps.len() - MAX_BEAT_HISTORY;
                self.beat_timestamps.drain(0..overflow);
            }
            self.update_tempo_estimate();
        }

        (beat, confidence)
    }

    fn update_tempo_estimate(&mut self) {
        if self.beat_timestamps.len() < 2 {
            return;
        }

        let mut sum = 0.0;
        let mut count = 0;
        for window in self.beat_timestamps.windows(2) {
            let interval = window[1] - window[0];
            if interval > f32::EPSILON {
                sum += interval;
                count += 1;
            }
        }

        if count > 0 {
            let average_interval = sum / count as f32;
            if average_interval > 0.0 {
                self.summary.tempo_bpm = Some(60.0 / average_interval);
            }
        }
    }

    fn compute_bins(&mut self) -> Result<[f32; BIN_COUNT]> {
        // Left-pad short histories with silence so the window is always full.
        let pad = WINDOW_SIZE - self.window.len();
        let window = &self.window;
        let planner = &mut self.fft_planner;
        let fft = self.fft.get_or_insert_with(|| FftResources::new(planner));

        for (index, slot) in fft.input.iter_mut().enumerate() {
            let sample = if index < pad { 0.0 } else { window[index - pad] };
            *slot = sample * hann_value(index, WINDOW_SIZE);
        }

        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        // A full-scale sine under a Hann window peaks at N/4.
        let norm = WINDOW_SIZE as f32 / 4.0;
        let mut bins = [0.0; BIN_COUNT];
        for (bin, value) in bins.iter_mut().zip(fft.spectrum.iter()) {
            *bin = (value.norm() / norm).clamp(0.0, 1.0);
        }
        Ok(bins)
    }
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}

struct FftResources {
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl FftResources {
    fn new(planner: &mut RealFftPlanner<f32>) -> Self {
        let plan = planner.plan_fft_forward(WINDOW_SIZE);
        let scratch = plan.make_scratch_vec();
        let spectrum = plan.make_output_vec();
        let input = plan.make_input_vec();
        Self {
            plan,
            scratch,
            spectrum,
            input,
        }
    }
}

impl fmt::Debug for AnalysisEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisEngine")
            .field("sample_rate", &self.sample_rate)
            .field("summary", &self.summary)
            .field("window", &self.window.len())
            .field("processed_samples", &self.processed_samples)
            .field("last_rms", &self.last_rms)
            .field("beat_timestamps", &self.beat_timestamps.len())
            .finish()
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| v.abs()).sum::<f32>() / values.len() as f32
}

fn compute_rms(samples: &[f32]) -> f32 {
    let sum: f32 = samples.iter().map(|sample| sample * sample).sum();
    (sum / samples.len() as f32).sqrt()
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(bin: usize, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * bin as f32 * i as f32 / WINDOW_SIZE as f32).sin())
            .collect()
    }

    #[test]
    fn silence_yields_zero_level_and_bins() {
        let mut engine = AnalysisEngine::with_sample_rate(48_000);
        let frame = engine.process_block(&vec![0.0; 1024]).unwrap();

        assert_eq!(frame.input_level, 0.0);
        assert_eq!(frame.bins, [0.0; BIN_COUNT]);
        assert!(!frame.beat);
    }

    #[test]
    fn input_level_is_mean_of_bins() {
        let mut engine = AnalysisEngine::new();
        let frame = engine.process_block(&sine(8, WINDOW_SIZE)).unwrap();

        let expected = frame.bins.iter().sum::<f32>() / BIN_COUNT as f32;
        assert!((frame.input_level - expected).abs() < 1e-6);
        assert!(frame.input_level > 0.0);
    }

    #[test]
    fn low_sine_lands_in_bass_third() {
        let mut engine = AnalysisEngine::new();
        let frame = engine.process_block(&sine(4, WINDOW_SIZE)).unwrap();

        assert!(frame.bins[4] > 0.5);
        assert!(frame.bass_level() > frame.treble_level());
    }

    #[test]
    fn only_the_latest_window_is_analysed() {
        let mut engine = AnalysisEngine::new();
        engine.process_block(&sine(4, WINDOW_SIZE)).unwrap();
        let frame = engine.process_block(&vec![0.0; WINDOW_SIZE]).unwrap();
        assert_eq!(frame.input_level, 0.0);
    }

    #[test]
    fn rejects_empty_blocks() {
        let mut engine = AnalysisEngine::new();
        assert!(engine.process_block(&[]).is_err());
    }

    #[test]
    fn updates_duration_and_tempo() {
        let mut engine = AnalysisEngine::with_sample_rate(100);
        let quiet = vec![0.0; 25];
        let loud = vec![1.0; 25];

        for _ in 0..4 {
            engine.process_block(&quiet).unwrap();
            engine.process_block(&loud).unwrap();
        }

        let summary = engine.summary();
        assert!(summary.duration_seconds.unwrap() > 0.0);
        let tempo = summary.tempo_bpm.expect("tempo should be detected");
        assert!((tempo - 120.0).abs() < 10.0);
    }

    #[test]
    fn display_smoothing_lags_behind_input() {
        let mut engine = AnalysisEngine::new();
        let frame = engine.process_block(&sine(4, WINDOW_SIZE)).unwrap();
        let shown = engine.smooth_display(&frame)[4];
        assert!(shown > 0.0 && shown < frame.bins[4]);
    }
}
