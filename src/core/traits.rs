//! Traits defining the seams of the recognition pipeline.

use crate::core::errors::CaptchaError;
use crate::core::{Tensor3D, Tensor4D};

/// An opaque trained sequence-recognition model.
///
/// The pipeline does not care how the model is persisted or executed; it only
/// requires a single operation mapping a preprocessed image batch to a
/// per-timestep class-probability tensor. Production code uses
/// [`crate::core::OrtModel`]; tests inject synthetic implementations that
/// return fixed spike matrices.
pub trait RecognitionModel: Send + Sync {
    /// Runs the network on a preprocessed batch.
    ///
    /// Returns a tensor of shape (batch, timesteps, classes) where each row
    /// along the timestep axis is a categorical distribution over the
    /// alphabet plus the trailing blank class.
    fn predict(&self, batch: &Tensor4D) -> Result<Tensor3D, CaptchaError>;
}
