//! Facade error type.

use thiserror::Error;
use volray_core::VolumeError;
use volray_render::{RenderError, ScreenshotError};

/// Errors returned by the volray facade.
#[derive(Error, Debug)]
pub enum VolrayError {
    /// Invalid volume data or options.
    #[error(transparent)]
    Volume(#[from] VolumeError),

    /// GPU or primitive failure.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Saving a frame failed.
    #[error("failed to save image: {0}")]
    Screenshot(#[from] ScreenshotError),

    /// The handle was never issued by this scene or its volume was removed.
    #[error("no volume with handle {0}")]
    UnknownVolume(usize),
}

/// A specialized Result type for facade operations.
pub type Result<T> = std::result::Result<T, VolrayError>;
