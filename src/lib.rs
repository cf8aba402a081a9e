//! Conversion core for a browser-based media converter.
//!
//! Everything a UI needs to turn an uploaded file plus a set of
//! [`options::ConversionOptions`] into converted bytes: static format and
//! quality tables, a pure options-to-FFmpeg argument compiler, and a
//! session manager that owns one shared transcoder engine, stages files
//! into its namespace, relays progress and cleans up after itself.

pub mod args;
pub mod constants;
pub mod engine;
pub mod options;
pub mod presets;
pub mod session;

pub use engine::{
    EngineConfig, EngineError, EngineLoader, MediaEngine, ProcessEngine, ProcessEngineLoader,
    ProgressFn,
};
pub use options::{
    AudioCodec, ConversionOptions, CropRect, EncoderPreset, Flip, OptionsError, Quality,
    Resolution, Rotation, SourceFile, TrimRange, VideoCodec, VideoSegment,
};
pub use presets::{FormatPreset, PresetCatalog, PresetCategory};
pub use session::{ConvertedMedia, EngineSession, ProgressCallback, SessionError, SessionState};
