use serde::{Deserialize, Serialize};

/// Seconds of stepping for [`Transport::step_forward`] / [`Transport::step_back`].
pub const STEP_SECONDS: f32 = 1.0;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PlaybackClock {
    pub time_seconds: f32,
}

impl PlaybackClock {
    pub fn reset(&mut self) {
        self.time_seconds = 0.0;
    }

    pub fn advance(&mut self, delta: f32) {
        if delta.is_finite() {
            self.time_seconds = (self.time_seconds + delta).max(0.0);
        }
    }
}

/// Play/pause state and media position shared by every layer source.
///
/// With a known duration the position loops, the way bound videos do;
/// without one the clock runs open-ended.
#[derive(Debug, Clone, PartialEq)]
pub struct Transport {
    clock: PlaybackClock,
    playing: bool,
    duration: Option<f32>,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            clock: PlaybackClock::default(),
            playing: false,
            duration: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportStatus {
    pub playing: bool,
    pub time_seconds: f32,
    pub duration_seconds: Option<f32>,
    pub display: String,
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_playing(&mut self, playing: bool) {
        if self.playing != playing {
            tracing::info!(playing, time = self.clock.time_seconds, "transport");
        }
        self.playing = playing;
    }

    pub fn toggle(&mut self) {
        self.set_playing(!self.playing);
    }

    pub fn time(&self) -> f32 {
        self.clock.time_seconds
    }

    pub fn duration(&self) -> Option<f32> {
        self.duration
    }

    /// Sets the media duration; non-positive or non-finite clears it.
    pub fn set_duration(&mut self, duration: Option<f32>) {
        self.duration = duration.filter(|d| d.is_finite() && *d > 0.0);
        if let Some(d) = self.duration {
            self.clock.time_seconds = self.clock.time_seconds.min(d);
        }
    }

    /// Moves time forward while playing. Paused transports hold still.
    pub fn advance(&mut self, dt: f32) {
        if !self.playing {
            return;
        }
        self.clock.advance(dt);
        if let Some(d) = self.duration {
            if self.clock.time_seconds >= d {
                self.clock.time_seconds = self.clock.time_seconds.rem_euclid(d);
            }
        }
    }

    /// Jumps to `time`, clamped to `[0, duration]`.
    pub fn seek(&mut self, time: f32) {
        let time = if time.is_finite() { time.max(0.0) } else { 0.0 };
        self.clock.time_seconds = match self.duration {
            Some(d) => time.min(d),
            None => time,
        };
    }

    pub fn step_forward(&mut self) {
        self.seek(self.time() + STEP_SECONDS);
    }

    pub fn step_back(&mut self) {
        self.seek(self.time() - STEP_SECONDS);
    }

    pub fn reset(&mut self) {
        self.clock.reset();
    }

    pub fn status(&self) -> TransportStatus {
        TransportStatus {
            playing: self.playing,
            time_seconds: self.time(),
            duration_seconds: self.duration,
            display: format!(
                "{} / {}",
                format_clock(self.time()),
                format_clock(self.duration.unwrap_or(0.0))
            ),
        }
    }
}

/// Formats seconds as `mm:ss`.
pub fn format_clock(seconds: f32) -> String {
    let total = if seconds.is_finite() {
        seconds.max(0.0).floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}
