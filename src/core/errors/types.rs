//! Core error types for the recognition pipeline.
//!
//! This module defines the fundamental error taxonomy used throughout the
//! system. Startup errors (`Dataset`, `ModelLoad`) are fatal; per-request
//! errors (`ImageDecode`, `ShapeMismatch`, `Inference`) fail the call they
//! occurred in and are converted to structured failure results by the
//! serving wrapper, so one bad input never takes down the service.

use std::path::Path;
use thiserror::Error;

/// Errors that can occur in the CAPTCHA recognition pipeline.
#[derive(Error, Debug)]
pub enum CaptchaError {
    /// The labels file is missing, unreadable, or yields no usable records.
    #[error("dataset: {message}")]
    Dataset {
        /// A message describing what went wrong with the dataset.
        message: String,
    },

    /// A label contains a character outside the built alphabet.
    #[error("unknown character '{character}' outside the alphabet")]
    UnknownCharacter {
        /// The offending character.
        character: char,
    },

    /// The image bytes could not be decoded.
    #[error("image decode: {message}")]
    ImageDecode {
        /// A message describing why decoding failed.
        message: String,
    },

    /// A tensor had an unexpected shape, usually an alphabet/model mismatch.
    #[error("shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Where the mismatch was detected.
        context: String,
        /// The expected tensor shape.
        expected: Vec<usize>,
        /// The actual tensor shape.
        actual: Vec<usize>,
    },

    /// The model artifact could not be loaded.
    #[error("model load failed for '{model_path}': {reason}")]
    ModelLoad {
        /// Path to the model that failed to load.
        model_path: String,
        /// Short reason string.
        reason: String,
        /// Underlying source error, when one exists.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Inference failed inside the model backend.
    #[error("inference failed in model '{model_name}': {context}")]
    Inference {
        /// The name of the model where inference failed.
        model_name: String,
        /// Additional context about the inference error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    Config {
        /// A message describing the configuration error.
        message: String,
    },

    /// Error from the ONNX Runtime session.
    #[error(transparent)]
    Session(#[from] ort::Error),

    /// Error from tensor operations.
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for CaptchaError {
    fn from(error: image::ImageError) -> Self {
        Self::ImageDecode {
            message: error.to_string(),
        }
    }
}

impl CaptchaError {
    /// Creates a dataset error with the given message.
    pub fn dataset(message: impl Into<String>) -> Self {
        Self::Dataset {
            message: message.into(),
        }
    }

    /// Creates an image decode error with the given message.
    pub fn image_decode(message: impl Into<String>) -> Self {
        Self::ImageDecode {
            message: message.into(),
        }
    }

    /// Creates a configuration error with the given message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a shape mismatch error for the given context.
    pub fn shape_mismatch(context: impl Into<String>, expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// Creates a model load error for the given path.
    pub fn model_load(
        model_path: &Path,
        reason: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ModelLoad {
            model_path: model_path.display().to_string(),
            reason: reason.into(),
            source,
        }
    }

    /// Wraps an error that occurred while running a model.
    pub fn inference(
        model_name: impl Into<String>,
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Inference {
            model_name: model_name.into(),
            context: context.into(),
            source: Box::new(source),
        }
    }
}

/// A minimal string-backed error for cases with no richer source available.
#[derive(Debug)]
pub struct OpaqueError(String);

impl OpaqueError {
    /// Creates a new opaque error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl std::fmt::Display for OpaqueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for OpaqueError {}
