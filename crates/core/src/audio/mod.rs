use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::{
    analysis::WINDOW_SIZE, AnalysisEngine, AnalysisSummary, AudioAnalysisFrame, AudioConfig,
    MixerError, Result,
};

#[cfg(feature = "live-input")]
mod capture;

/// Where the engine gets its samples from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMode {
    /// Capture from an input device through the platform audio host.
    Live,
    /// The caller feeds sample blocks through [`AudioEngine::push_samples`].
    Manual,
}

/// An input device as reported by the platform audio host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDevice {
    pub id: String,
    pub label: String,
}

/// Result of the explicit capture initialization step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioCapability {
    Available { device: String },
    Unavailable { reason: String },
}

impl AudioCapability {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }
}

/// Lists capture devices. Returns an empty list rather than an error when
/// the platform cannot enumerate devices.
pub fn list_input_devices() -> Vec<AudioDevice> {
    #[cfg(feature = "live-input")]
    {
        match capture::input_devices() {
            Ok(devices) => devices,
            Err(err) => {
                tracing::warn!(%err, "audio device enumeration unavailable");
                Vec::new()
            }
        }
    }

    #[cfg(not(feature = "live-input"))]
    {
        tracing::debug!("built without live-input; no audio devices");
        Vec::new()
    }
}

/// Samples delivered by the capture thread since the previous tick. Only
/// the most recent analysis window is kept.
#[derive(Debug, Default)]
pub(crate) struct PendingSamples {
    samples: Vec<f32>,
}

impl PendingSamples {
    pub(crate) fn push(&mut self, block: &[f32]) {
        self.samples.extend_from_slice(block);
        if self.samples.len() > WINDOW_SIZE {
            let overflow = self.samples.len() - WINDOW_SIZE;
            self.samples.drain(0..overflow);
        }
    }

    fn take(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.samples)
    }
}

/// High level audio engine façade.
///
/// The engine never fails the render loop: when capture is unavailable or
/// disabled, [`AudioEngine::frame`] yields silent frames.
#[derive(Debug)]
pub struct AudioEngine {
    mode: AudioMode,
    config: AudioConfig,
    analysis: Arc<Mutex<AnalysisEngine>>,
    pending: Arc<Mutex<PendingSamples>>,
    enabled: bool,
    capability: AudioCapability,
    #[cfg(feature = "live-input")]
    stream: Option<capture::CaptureStream>,
}

impl AudioEngine {
    /// Creates a new audio engine instance in the requested mode.
    pub fn new(mode: AudioMode) -> Self {
        Self::with_config(mode, AudioConfig::default())
    }

    pub fn with_config(mode: AudioMode, config: AudioConfig) -> Self {
        let mut analysis = AnalysisEngine::with_sample_rate(config.sample_rate);
        analysis.set_display_smoothing(config.display_smoothing);
        let capability = match mode {
            AudioMode::Manual => AudioCapability::Available {
                device: "manual".to_string(),
            },
            AudioMode::Live => AudioCapability::Unavailable {
                reason: "capture not initialised".to_string(),
            },
        };
        Self {
            mode,
            config,
            analysis: Arc::new(Mutex::new(analysis)),
            pending: Arc::new(Mutex::new(PendingSamples::default())),
            enabled: false,
            capability,
            #[cfg(feature = "live-input")]
            stream: None,
        }
    }

    /// Returns the currently configured audio mode.
    pub fn mode(&self) -> AudioMode {
        self.mode
    }

    /// Returns the sample rate the engine operates at.
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn capability(&self) -> &AudioCapability {
        &self.capability
    }

    /// Opens the input. Enabling twice is a no-op. A missing device or
    /// permission leaves the engine enabled but degraded to silence.
    pub fn enable(&mut self) -> &AudioCapability {
        if self.enabled {
            return &self.capability;
        }
        self.enabled = true;

        if self.mode == AudioMode::Live {
            self.capability = self.open_capture();
            match &self.capability {
                AudioCapability::Available { device } => {
                    tracing::info!(device = device.as_str(), "audio capture enabled")
                }
                AudioCapability::Unavailable { reason } => {
                    tracing::warn!(reason = reason.as_str(), "audio capture degraded to silence")
                }
            }
        }

        if let Ok(mut analysis) = self.analysis.lock() {
            analysis.reset();
        }
        &self.capability
    }

    /// Closes the input and releases the capture stream. Idempotent.
    pub fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        self.enabled = false;

        #[cfg(feature = "live-input")]
        {
            // Dropping the stream stops the device callback.
            self.stream = None;
        }
        if self.mode == AudioMode::Live {
            self.capability = AudioCapability::Unavailable {
                reason: "capture disabled".to_string(),
            };
        }
        if let Ok(mut pending) = self.pending.lock() {
            pending.take();
        }
        tracing::info!("audio input disabled");
    }

    /// Feeds a block of samples into the engine. Capture callbacks and manual
    /// drivers both land here; data becomes visible at the next
    /// [`AudioEngine::frame`] call.
    pub fn push_samples(&self, samples: &[f32]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }
        self.lock_pending()?.push(samples);
        Ok(())
    }

    /// Produces the analysis frame for the current tick.
    ///
    /// If no new samples arrived since the previous tick the last analysis
    /// is repeated. Poisoned state degrades to silence.
    pub fn frame(&self, output_level: f32) -> AudioAnalysisFrame {
        let mut frame = if self.enabled && self.capability.is_available() {
            self.analyse_pending().unwrap_or_else(|err| {
                tracing::warn!(%err, "audio analysis failed; emitting silence");
                AudioAnalysisFrame::silent()
            })
        } else {
            AudioAnalysisFrame::silent()
        };
        frame.output_level = output_level.max(0.0);

        if let Ok(mut analysis) = self.analysis.lock() {
            analysis.smooth_display(&frame);
        }
        frame
    }

    /// Smoothed spectrum for level meters.
    pub fn display_bins(&self) -> Vec<f32> {
        self.analysis
            .lock()
            .map(|analysis| analysis.display_bins().to_vec())
            .unwrap_or_default()
    }

    pub fn summary(&self) -> Result<AnalysisSummary> {
        Ok(self.lock_analysis()?.summary().clone())
    }

    fn analyse_pending(&self) -> Result<AudioAnalysisFrame> {
        let block = self.lock_pending()?.take();
        let mut analysis = self.lock_analysis()?;
        if block.is_empty() {
            // Levels hold between blocks; a beat belongs to one tick only.
            let mut frame = analysis.latest_frame().clone();
            frame.beat = false;
            frame.beat_confidence = 0.0;
            return Ok(frame);
        }
        analysis.process_block(&block)
    }

    #[cfg(feature = "live-input")]
    fn open_capture(&mut self) -> AudioCapability {
        match capture::CaptureStream::open(
            self.config.input_device.as_deref(),
            Arc::clone(&self.pending),
        ) {
            Ok(stream) => {
                let device = stream.device_name().to_string();
                self.stream = Some(stream);
                AudioCapability::Available { device }
            }
            Err(err) => AudioCapability::Unavailable {
                reason: err.to_string(),
            },
        }
    }

    #[cfg(not(feature = "live-input"))]
    fn open_capture(&mut self) -> AudioCapability {
        AudioCapability::Unavailable {
            reason: MixerError::unsupported("audio capture (built without live-input)").to_string(),
        }
    }

    fn lock_analysis(&self) -> Result<MutexGuard<'_, AnalysisEngine>> {
        self.analysis
            .lock()
            .map_err(|_| MixerError::msg("analysis pipeline has been poisoned"))
    }

    fn lock_pending(&self) -> Result<MutexGuard<'_, PendingSamples>> {
        self.pending
            .lock()
            .map_err(|_| MixerError::msg("pending sample buffer has been poisoned"))
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.disable();
    }
}
