//! Frame sources for video layers.
//!
//! Decoding is owned by whoever binds a source: anything that implements
//! [`FrameSource`] can be attached to a layer. The core ships a still-image
//! source and a colour-bar stand-in used when a payload has no decodable
//! file behind it.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{config::UploadConfig, frame::hsv, Frame, MixerError, Result};

/// Metadata of a media upload offered for a video layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPayload {
    pub name: String,
    pub mime: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl MediaPayload {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            size_bytes,
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Accepts `video/*` payloads up to the configured size.
    pub fn validate(&self, limits: &UploadConfig) -> std::result::Result<(), UploadRejection> {
        let mime = self.mime.trim().to_ascii_lowercase();
        if !mime.starts_with("video/") {
            return Err(UploadRejection::NotVideo {
                name: self.name.clone(),
                mime: self.mime.clone(),
            });
        }
        if self.size_bytes > limits.max_video_bytes {
            return Err(UploadRejection::TooLarge {
                name: self.name.clone(),
                size_bytes: self.size_bytes,
                limit_bytes: limits.max_video_bytes,
            });
        }
        Ok(())
    }
}

/// Why an upload was refused. The message is meant for the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadRejection {
    #[error("\"{name}\" is not a video file ({mime})")]
    NotVideo { name: String, mime: String },
    #[error("\"{name}\" is {} MiB; videos are limited to {} MiB", mib(.size_bytes), mib(.limit_bytes))]
    TooLarge {
        name: String,
        size_bytes: u64,
        limit_bytes: u64,
    },
}

fn mib(bytes: &u64) -> String {
    format!("{:.1}", *bytes as f64 / (1024.0 * 1024.0))
}

/// Where a video layer's frames come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoBinding {
    pub handle: u64,
    pub url: String,
    pub file_name: String,
}

/// A pull-based frame producer.
pub trait FrameSource: Send {
    /// Frame at media time `time`. `Ok(None)` means not ready yet.
    fn frame_at(&mut self, time: f32) -> Result<Option<Frame>>;

    /// Re-opens the source after a fault.
    fn reload(&mut self) -> Result<()>;

    /// Media length, if known.
    fn duration(&self) -> Option<f32> {
        None
    }
}

/// Single decoded image shown for any time.
#[derive(Debug, Clone)]
pub struct StillSource {
    path: Option<PathBuf>,
    frame: Frame,
}

impl StillSource {
    pub fn from_frame(frame: Frame) -> Self {
        Self { path: None, frame }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)?.to_rgba8();
        Ok(Self {
            path: Some(path.to_path_buf()),
            frame: Frame::from_rgba_image(&image),
        })
    }
}

impl FrameSource for StillSource {
    fn frame_at(&mut self, _time: f32) -> Result<Option<Frame>> {
        Ok(Some(self.frame.clone()))
    }

    fn reload(&mut self) -> Result<()> {
        if let Some(path) = &self.path {
            *self = Self::open(path.clone())?;
        }
        Ok(())
    }
}

/// Scrolling colour bars, tinted per payload name.
#[derive(Debug, Clone)]
pub struct ColorBarsSource {
    width: u32,
    height: u32,
    hue: f32,
    duration: f32,
}

impl ColorBarsSource {
    pub fn new(name: &str, width: u32, height: u32) -> Self {
        let hue = name.bytes().fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
        Self {
            width: width.max(1),
            height: height.max(1),
            hue: (hue % 360) as f32,
            duration: 10.0,
        }
    }
}

impl FrameSource for ColorBarsSource {
    fn frame_at(&mut self, time: f32) -> Result<Option<Frame>> {
        let mut frame = Frame::new(self.width, self.height);
        let bars = 7.0;
        let shift = time.rem_euclid(self.duration) / self.duration;
        for y in 0..self.height {
            for x in 0..self.width {
                let u = (x as f32 / self.width as f32 + shift).fract();
                let bar = (u * bars).floor();
                let value = 0.55 + 0.45 * (y as f32 / self.height as f32);
                frame.set(x, y, hsv(self.hue + bar * (360.0 / bars), 0.75, value));
            }
        }
        Ok(Some(frame))
    }

    fn reload(&mut self) -> Result<()> {
        Ok(())
    }

    fn duration(&self) -> Option<f32> {
        Some(self.duration)
    }
}

/// Opens the stock source for a payload: its file as a still when it
/// decodes as an image, colour bars otherwise.
pub fn open_payload(payload: &MediaPayload, width: u32, height: u32) -> Box<dyn FrameSource> {
    if let Some(path) = &payload.path {
        match StillSource::open(path) {
            Ok(still) => return Box::new(still),
            Err(err) => {
                tracing::debug!(path = %path.display(), %err, "payload is not a still image, using colour bars")
            }
        }
    }
    Box::new(ColorBarsSource::new(&payload.name, width, height))
}

struct SourceSlot {
    source: Box<dyn FrameSource>,
    faults: u64,
}

/// Bound frame sources keyed by handle.
#[derive(Default)]
pub struct VideoDeck {
    slots: HashMap<u64, SourceSlot>,
    next_handle: u64,
}

impl std::fmt::Debug for VideoDeck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoDeck")
            .field("sources", &self.slots.len())
            .field("next_handle", &self.next_handle)
            .finish()
    }
}

impl VideoDeck {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Registers a source and returns the binding a layer should carry.
    pub fn attach(&mut self, file_name: &str, source: Box<dyn FrameSource>) -> VideoBinding {
        self.next_handle += 1;
        let handle = self.next_handle;
        self.slots.insert(handle, SourceSlot { source, faults: 0 });
        VideoBinding {
            handle,
            url: format!("media://{handle}/{file_name}"),
            file_name: file_name.to_string(),
        }
    }

    pub fn detach(&mut self, handle: u64) -> bool {
        self.slots.remove(&handle).is_some()
    }

    pub fn fault_count(&self, handle: u64) -> u64 {
        self.slots.get(&handle).map(|slot| slot.faults).unwrap_or(0)
    }

    /// Longest known duration among bound sources.
    pub fn longest_duration(&self) -> Option<f32> {
        self.slots
            .values()
            .filter_map(|slot| slot.source.duration())
            .fold(None, |acc: Option<f32>, d| Some(acc.map_or(d, |a| a.max(d))))
    }

    /// Pulls a frame for `handle`, sized to the canvas. A failing source
    /// gets one reload attempt; if that also fails the layer is absent for
    /// this tick.
    pub fn poll(&mut self, handle: u64, time: f32, width: u32, height: u32) -> Option<Frame> {
        let slot = self.slots.get_mut(&handle)?;
        let frame = match slot.source.frame_at(time) {
            Ok(frame) => frame,
            Err(err) => {
                slot.faults += 1;
                tracing::warn!(handle, %err, "playback fault, reloading source");
                match retry(slot.source.as_mut(), time) {
                    Ok(frame) => frame,
                    Err(err) => {
                        tracing::warn!(handle, %err, "reload failed, skipping layer this tick");
                        None
                    }
                }
            }
        }?;
        Some(frame.resized(width, height))
    }
}

fn retry(source: &mut dyn FrameSource, time: f32) -> Result<Option<Frame>> {
    source.reload()?;
    source.frame_at(time)
}

impl From<UploadRejection> for MixerError {
    fn from(value: UploadRejection) -> Self {
        MixerError::InvalidInput(match value {
            UploadRejection::NotVideo { .. } => "upload is not a video",
            UploadRejection::TooLarge { .. } => "upload exceeds the size limit",
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    use super::*;

    const MIB: u64 = 1024 * 1024;

    /// Fails a set number of `frame_at` calls, then recovers.
    struct Flaky {
        failures_left: u32,
        reload_ok: bool,
        reloads: Arc<AtomicU32>,
    }

    impl FrameSource for Flaky {
        fn frame_at(&mut self, _time: f32) -> Result<Option<Frame>> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(MixerError::Playback("decoder stalled".into()));
            }
            Ok(Some(Frame::filled(2, 2, [1.0, 0.0, 0.0, 1.0])))
        }

        fn reload(&mut self) -> Result<()> {
            self.reloads.fetch_add(1, Ordering::SeqCst);
            if self.reload_ok {
                Ok(())
            } else {
                Err(MixerError::Playback("cannot reopen".into()))
            }
        }
    }

    #[test]
    fn size_limit_is_inclusive() {
        let limits = UploadConfig::default();
        assert!(MediaPayload::new("clip.mp4", "video/mp4", 100 * MIB)
            .validate(&limits)
            .is_ok());
        let rejection = MediaPayload::new("clip.mp4", "video/mp4", 100 * MIB + 1)
            .validate(&limits)
            .unwrap_err();
        assert!(matches!(rejection, UploadRejection::TooLarge { .. }));
        assert!(rejection.to_string().contains("100.0 MiB"));
    }

    #[test]
    fn rejects_non_video_mime() {
        let rejection = MediaPayload::new("song.mp3", "audio/mpeg", 10)
            .validate(&UploadConfig::default())
            .unwrap_err();
        assert_eq!(
            rejection,
            UploadRejection::NotVideo {
                name: "song.mp3".into(),
                mime: "audio/mpeg".into()
            }
        );
    }

    #[test]
    fn one_fault_recovers_after_reload() {
        let mut deck = VideoDeck::new();
        let reloads = Arc::new(AtomicU32::new(0));
        let binding = deck.attach(
            "clip.mp4",
            Box::new(Flaky {
                failures_left: 1,
                reload_ok: true,
                reloads: Arc::clone(&reloads),
            }),
        );
        let frame = deck.poll(binding.handle, 0.0, 4, 4).unwrap();
        assert_eq!((frame.width(), frame.height()), (4, 4));
        assert_eq!(deck.fault_count(binding.handle), 1);
        assert_eq!(reloads.load(Ordering::SeqCst), 1);

        deck.poll(binding.handle, 0.1, 4, 4).unwrap();
        assert_eq!(reloads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_reload_makes_layer_absent() {
        let mut deck = VideoDeck::new();
        let reloads = Arc::new(AtomicU32::new(0));
        let binding = deck.attach(
            "clip.mp4",
            Box::new(Flaky {
                failures_left: 5,
                reload_ok: false,
                reloads: Arc::clone(&reloads),
            }),
        );
        assert!(deck.poll(binding.handle, 0.0, 4, 4).is_none());
        assert_eq!(reloads.load(Ordering::SeqCst), 1);
        assert!(deck.poll(99, 0.0, 4, 4).is_none());
    }

    #[test]
    fn colour_bars_move_over_time() {
        let mut bars = ColorBarsSource::new("clip.mp4", 16, 4);
        let a = bars.frame_at(0.0).unwrap().unwrap();
        let b = bars.frame_at(1.0).unwrap().unwrap();
        assert_ne!(a, b);
        assert_eq!(bars.duration(), Some(10.0));
    }

    #[test]
    fn payload_without_file_gets_colour_bars() {
        let payload = MediaPayload::new("clip.mp4", "video/mp4", 1);
        let mut source = open_payload(&payload, 8, 6);
        let frame = source.frame_at(0.0).unwrap().unwrap();
        assert_eq!((frame.width(), frame.height()), (8, 6));
    }
}
