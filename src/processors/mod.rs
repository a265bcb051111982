//! Processing steps around the recognition model.
//!
//! This module contains the deterministic, stateless mappings the pipeline is
//! built from: dataset parsing, alphabet/codec construction, image
//! preprocessing, and greedy CTC decoding.

pub mod alphabet;
pub mod dataset;
pub mod decode;
pub mod preprocess;

pub use alphabet::{Alphabet, LabelCodec};
pub use dataset::{LabelRecord, LabeledDataset};
pub use decode::CtcLabelDecode;
pub use preprocess::{decode_base64_image, sniff_format, CaptchaPreprocessor};
