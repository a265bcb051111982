//! # CAPTCHA OCR
//!
//! A Rust library that reads short alphanumeric/Cyrillic strings from CAPTCHA
//! images using a CTC-trained recognition model exported to ONNX.
//!
//! The crate owns everything around the network itself:
//!
//! - deriving a stable character alphabet from a labeled dataset,
//! - the fixed image-preprocessing transform the model was trained with,
//! - greedy CTC decoding back into text,
//! - a recognition engine that wires these together around an opaque model.
//!
//! ## Modules
//!
//! * [`core`] - Error handling, constants, the model trait, and ONNX inference
//! * [`processors`] - Dataset parsing, alphabet/codec, preprocessing, CTC decoding
//! * [`pipeline`] - The high-level [`pipeline::CaptchaEngine`]
//! * [`utils`] - Logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use captcha_ocr::pipeline::CaptchaEngine;
//!
//! # fn main() -> Result<(), captcha_ocr::core::CaptchaError> {
//! let engine = CaptchaEngine::builder("models/captcha.onnx")
//!     .labels_path("data/labels.csv")
//!     .build()?;
//!
//! let bytes = std::fs::read("captcha.png")?;
//! let prediction = engine.recognize(&bytes)?;
//! println!("{} ({:.1}%)", prediction.text, prediction.confidence * 100.0);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod pipeline;
pub mod processors;
pub mod utils;

/// Commonly used types, re-exported for convenience.
pub mod prelude {
    pub use crate::core::{CaptchaError, CaptchaResult, RecognitionModel, Tensor3D, Tensor4D};
    pub use crate::pipeline::{CaptchaEngine, CaptchaEngineBuilder, Prediction};
    pub use crate::processors::{Alphabet, CaptchaPreprocessor, CtcLabelDecode, LabelCodec};
}
