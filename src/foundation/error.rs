/// Result alias used across the crate.
pub type ReelResult<T> = Result<T, ReelError>;

/// Every error a render session can produce.
///
/// `AssetLoad` and `AudioSetup` are recoverable: the session absorbs them where they happen and
/// keeps going. `EncoderUnsupported` and `EmptyAssetSet` are fatal and surface at the session
/// boundary. `Cancelled` is the deliberate abort path, not a failure.
#[derive(thiserror::Error, Debug)]
pub enum ReelError {
    /// Invalid configuration or input.
    #[error("validation error: {0}")]
    Validation(String),

    /// One image could not be fetched or decoded.
    #[error("asset load error: {0}")]
    AssetLoad(String),

    /// The audio track could not be fetched, decoded or wired into the graph.
    #[error("audio setup error: {0}")]
    AudioSetup(String),

    /// No usable container/codec exists in the running environment.
    #[error("encoder unsupported: {0}")]
    EncoderUnsupported(String),

    /// Every image in the request failed to load.
    #[error("empty asset set: none of the {requested} requested images could be loaded")]
    EmptyAssetSet {
        /// Number of images the caller asked for.
        requested: usize,
    },

    /// The session was cancelled by its owner.
    #[error("session cancelled")]
    Cancelled,

    /// The recorder or the encoding process failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// A session state change that the state machine does not allow.
    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    /// IO and other contextual failures.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReelError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn asset_load(msg: impl Into<String>) -> Self {
        Self::AssetLoad(msg.into())
    }

    pub fn audio_setup(msg: impl Into<String>) -> Self {
        Self::AudioSetup(msg.into())
    }

    pub fn encoder_unsupported(msg: impl Into<String>) -> Self {
        Self::EncoderUnsupported(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Errors that end a session instead of being absorbed by the component that raised them.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::AssetLoad(_) | Self::AudioSetup(_) | Self::Cancelled
        )
    }

    /// `true` for the deliberate abort path.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
