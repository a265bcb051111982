//! The core module of the recognition pipeline.
//!
//! This module contains the fundamental components shared by the rest of the
//! crate:
//! - Constants baked into the trained model (input shape, sequence cap)
//! - Error handling
//! - The [`RecognitionModel`] trait and its ONNX Runtime implementation
//!
//! It also provides re-exports of commonly used types for convenience.

pub mod constants;
pub mod errors;
pub mod inference;
pub mod traits;

pub use constants::*;
pub use errors::{CaptchaError, CaptchaResult, OpaqueError};
pub use inference::OrtModel;
pub use traits::RecognitionModel;

/// A per-timestep class-probability tensor of shape (batch, timesteps, classes).
pub type Tensor3D = ndarray::Array3<f32>;

/// A preprocessed image batch of shape (batch, width, height, channels).
pub type Tensor4D = ndarray::Array4<f32>;
