/// Result alias that carries the custom [`MixerError`] type.
pub type Result<T> = std::result::Result<T, MixerError>;

/// Common error type for the core crate.
///
/// None of these are fatal to the render loop. The tick driver logs and
/// degrades instead of propagating them out of [`crate::RenderLoop::tick`].
#[derive(Debug, thiserror::Error)]
pub enum MixerError {
    /// Free-form message used where no richer variant applies.
    #[error("{0}")]
    Message(String),
    /// A caller handed the core something it cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// The platform lacks a capability (audio capture, MIDI, ...).
    #[error("unsupported capability: {0}")]
    Unsupported(String),
    /// A transition command was issued in a phase that does not accept it.
    #[error("transition is {0:?}, expected Running")]
    TransitionPhase(crate::transition::TransitionPhase),
    /// A video source failed to produce a frame.
    #[error("playback fault: {0}")]
    Playback(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration or catalog (de)serialization failure.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// Frame export failure.
    #[error("{0}")]
    Image(#[from] image::ImageError),
    /// Spectrum analysis failure.
    #[error("fft: {0}")]
    Fft(#[from] realfft::FftError),
}

impl MixerError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn unsupported<T: Into<String>>(what: T) -> Self {
        Self::Unsupported(what.into())
    }
}

impl From<&str> for MixerError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for MixerError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
