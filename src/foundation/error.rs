/// Convenience result type used across spriteframe.
pub type SpriteFrameResult<T> = Result<T, SpriteFrameError>;

/// Top-level error taxonomy used by engine APIs.
///
/// Only [`SpriteFrameError::Validation`] and [`SpriteFrameError::Descriptor`] abort a whole
/// export; the other variants are raised per frame and recovered by the export loop.
#[derive(thiserror::Error, Debug)]
pub enum SpriteFrameError {
    /// Structurally unusable input (no main timeline, empty atlas, invalid options).
    #[error("validation error: {0}")]
    Validation(String),

    /// Malformed atlas or animation descriptor.
    #[error("descriptor error: {0}")]
    Descriptor(String),

    /// Rasterization failure for a single frame or command.
    #[error("render error: {0}")]
    Render(String),

    /// Archive sink failure.
    #[error("archive error: {0}")]
    Archive(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SpriteFrameError {
    /// Build a [`SpriteFrameError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`SpriteFrameError::Descriptor`] value.
    pub fn descriptor(msg: impl Into<String>) -> Self {
        Self::Descriptor(msg.into())
    }

    /// Build a [`SpriteFrameError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`SpriteFrameError::Archive`] value.
    pub fn archive(msg: impl Into<String>) -> Self {
        Self::Archive(msg.into())
    }

    /// Build a [`SpriteFrameError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Whether this error must abort the whole export job.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Descriptor(_))
    }
}

impl From<serde_json::Error> for SpriteFrameError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
