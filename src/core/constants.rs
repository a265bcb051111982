//! Constants baked into the trained recognition model.
//!
//! These values mirror the training configuration; changing any of them
//! without retraining silently corrupts predictions.

/// Width of the model input, in pixels.
///
/// The width axis leads the tensor layout because the network treats the
/// horizontal axis as the temporal axis it decodes over.
pub const IMG_WIDTH: u32 = 200;

/// Height of the model input, in pixels.
pub const IMG_HEIGHT: u32 = 60;

/// Number of color channels the model expects.
pub const IMG_CHANNELS: usize = 3;

/// Longest label the model was trained to emit.
///
/// The decoder does not enforce this cap; it is a property of training.
pub const MAX_SEQUENCE_LENGTH: usize = 7;

/// Padding value for training labels shorter than [`MAX_SEQUENCE_LENGTH`].
pub const LABEL_PAD: i64 = -1;

/// Marker returned when an index does not map to an alphabet character.
///
/// Never appears in user-facing decoded text.
pub const UNKNOWN_CHAR: char = '\u{FFFD}';

/// Superset alphabet used when no labels file is available at startup.
///
/// Falling back to this set risks an alphabet/model mismatch and is logged
/// as a warning when it happens.
pub const FALLBACK_ALPHABET: &str = "абвгдежзийклмнопрстуфхцчшщъыьэюя0123456789";
