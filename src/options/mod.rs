use serde::{Deserialize, Serialize};
use thiserror::Error;

// Playback-rate bounds accepted from the UI.
pub const MIN_SPEED: f64 = 0.25;
pub const MAX_SPEED: f64 = 4.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptionsError {
    #[error("Output format is required")]
    MissingOutputFormat,
    #[error("Invalid trim range: start ({start}s) must be before end ({end}s)")]
    InvalidTrimRange { start: f64, end: f64 },
    #[error("Trim start cannot be negative")]
    NegativeTrimStart,
    #[error("Trim end ({end}s) exceeds the source duration ({duration}s)")]
    TrimBeyondDuration { end: f64, duration: f64 },
    #[error("Playback speed {speed} is outside the supported range {MIN_SPEED}-{MAX_SPEED}")]
    SpeedOutOfRange { speed: f64 },
    #[error("Video bitrate must be greater than zero")]
    InvalidVideoBitrate,
    #[error("Audio bitrate must be greater than zero")]
    InvalidAudioBitrate,
    #[error("Sample rate must be greater than zero")]
    InvalidSampleRate,
    #[error("Frame rate must be greater than zero")]
    InvalidFrameRate,
    #[error("Audio channels must be 1 (mono) or 2 (stereo), got {channels}")]
    InvalidAudioChannels { channels: u8 },
    #[error("Crop width and height must be greater than zero")]
    InvalidCrop,
    #[error("Invalid options payload: {message}")]
    InvalidPayload { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    High,
    Ultra,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "1440p")]
    P1440,
    #[serde(rename = "4k")]
    Uhd4k,
    #[serde(rename = "original")]
    Original,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    H264,
    H265,
    Vp9,
    Av1,
}

impl VideoCodec {
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "libx264",
            VideoCodec::H265 => "libx265",
            VideoCodec::Vp9 => "libvpx-vp9",
            VideoCodec::Av1 => "libaom-av1",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    Aac,
    Mp3,
    Opus,
    Vorbis,
}

impl AudioCodec {
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            AudioCodec::Aac => "aac",
            AudioCodec::Mp3 => "libmp3lame",
            AudioCodec::Opus => "libopus",
            AudioCodec::Vorbis => "libvorbis",
        }
    }
}

// Clockwise rotation, serialized as plain degrees in the UI payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Rotation {
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl TryFrom<u32> for Rotation {
    type Error = String;

    fn try_from(degrees: u32) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::None),
            90 => Ok(Rotation::Cw90),
            180 => Ok(Rotation::Cw180),
            270 => Ok(Rotation::Cw270),
            other => Err(format!("unsupported rotation: {other} degrees")),
        }
    }
}

impl From<Rotation> for u32 {
    fn from(rotation: Rotation) -> u32 {
        match rotation {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flip {
    Horizontal,
    Vertical,
    Both,
}

// Encoder speed/size trade-off, passed through to the encoder unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderPreset {
    Ultrafast,
    Fast,
    Medium,
    Slow,
    Veryslow,
}

impl EncoderPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncoderPreset::Ultrafast => "ultrafast",
            EncoderPreset::Fast => "fast",
            EncoderPreset::Medium => "medium",
            EncoderPreset::Slow => "slow",
            EncoderPreset::Veryslow => "veryslow",
        }
    }
}

/// Inclusive time window on the source timeline, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimRange {
    pub start: f64,
    pub end: f64,
}

impl TrimRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.start < 0.0 {
            return Err(OptionsError::NegativeTrimStart);
        }
        if self.start >= self.end {
            return Err(OptionsError::InvalidTrimRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }
}

/// Pixel rectangle within the source frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// The full set of user-facing conversion options for one invocation.
///
/// Mirrors the JSON payload the UI hands over; only `output_format` is
/// required. Validation happens once, at the compiler boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionOptions {
    pub output_format: String,

    // Video settings
    #[serde(default)]
    pub quality: Option<Quality>,
    #[serde(default)]
    pub resolution: Option<Resolution>,
    /// kbps; overrides the quality table's bitrate when present.
    #[serde(default)]
    pub video_bitrate: Option<u32>,
    #[serde(default)]
    pub video_codec: Option<VideoCodec>,
    #[serde(default)]
    pub fps: Option<u32>,

    // Audio settings
    /// kbps
    #[serde(default)]
    pub audio_bitrate: Option<u32>,
    #[serde(default)]
    pub audio_codec: Option<AudioCodec>,
    /// Hz
    #[serde(default)]
    pub sample_rate: Option<u32>,
    #[serde(default)]
    pub audio_channels: Option<u8>,

    // Editing
    #[serde(default)]
    pub trim: Option<TrimRange>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub rotate: Option<Rotation>,
    #[serde(default)]
    pub flip: Option<Flip>,
    #[serde(default)]
    pub crop: Option<CropRect>,

    #[serde(default)]
    pub preset: Option<EncoderPreset>,
}

impl ConversionOptions {
    pub fn new(output_format: impl Into<String>) -> Self {
        Self {
            output_format: output_format.into(),
            quality: None,
            resolution: None,
            video_bitrate: None,
            video_codec: None,
            fps: None,
            audio_bitrate: None,
            audio_codec: None,
            sample_rate: None,
            audio_channels: None,
            trim: None,
            speed: None,
            rotate: None,
            flip: None,
            crop: None,
            preset: None,
        }
    }

    /// Parse the options payload the UI collaborator sends over.
    pub fn from_json(payload: &str) -> Result<Self, OptionsError> {
        serde_json::from_str(payload).map_err(|e| OptionsError::InvalidPayload {
            message: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.output_format.trim().is_empty() {
            return Err(OptionsError::MissingOutputFormat);
        }

        if let Some(trim) = &self.trim {
            trim.validate()?;
        }

        if let Some(speed) = self.speed {
            if !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
                return Err(OptionsError::SpeedOutOfRange { speed });
            }
        }

        if self.video_bitrate == Some(0) {
            return Err(OptionsError::InvalidVideoBitrate);
        }
        if self.audio_bitrate == Some(0) {
            return Err(OptionsError::InvalidAudioBitrate);
        }
        if self.sample_rate == Some(0) {
            return Err(OptionsError::InvalidSampleRate);
        }
        if self.fps == Some(0) {
            return Err(OptionsError::InvalidFrameRate);
        }

        if let Some(channels) = self.audio_channels {
            if channels != 1 && channels != 2 {
                return Err(OptionsError::InvalidAudioChannels { channels });
            }
        }

        if let Some(crop) = &self.crop {
            if crop.width == 0 || crop.height == 0 {
                return Err(OptionsError::InvalidCrop);
            }
        }

        Ok(())
    }
}

/// An uploaded media file: the original name plus its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub data: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Extension of the original filename, used to synthesize staged names.
    pub fn extension(&self) -> &str {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
            .unwrap_or("bin")
    }
}

/// One entry of a merge-with-trim operation.
///
/// The trim window defaults to the file's full probed duration and stays
/// clamped to it through every mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSegment {
    pub file: SourceFile,
    pub trim: TrimRange,
    pub duration: f64,
}

impl VideoSegment {
    pub fn new(file: SourceFile, duration: f64) -> Self {
        Self {
            file,
            trim: TrimRange::new(0.0, duration),
            duration,
        }
    }

    /// Replace the trim window, clamped into the segment's duration.
    pub fn set_trim(&mut self, trim: TrimRange) {
        let end = trim.end.clamp(0.0, self.duration);
        let start = trim.start.clamp(0.0, end);
        self.trim = TrimRange::new(start, end);
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        self.trim.validate()?;
        if self.trim.end > self.duration {
            return Err(OptionsError::TrimBeyondDuration {
                end: self.trim.end,
                duration: self.duration,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_camel_case_json() {
        let payload = r#"{
            "outputFormat": "mp4",
            "quality": "high",
            "resolution": "720p",
            "videoBitrate": 3000,
            "videoCodec": "h264",
            "audioCodec": "aac",
            "trim": { "start": 0.0, "end": 30.0 },
            "speed": 2.0,
            "rotate": 90,
            "flip": "horizontal",
            "preset": "fast"
        }"#;

        let options = ConversionOptions::from_json(payload).unwrap();
        assert_eq!(options.output_format, "mp4");
        assert_eq!(options.quality, Some(Quality::High));
        assert_eq!(options.resolution, Some(Resolution::P720));
        assert_eq!(options.video_bitrate, Some(3000));
        assert_eq!(options.rotate, Some(Rotation::Cw90));
        assert_eq!(options.flip, Some(Flip::Horizontal));
        assert_eq!(options.preset, Some(EncoderPreset::Fast));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_rejects_unsupported_rotation() {
        let payload = r#"{ "outputFormat": "mp4", "rotate": 45 }"#;
        assert!(ConversionOptions::from_json(payload).is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_trim() {
        let mut options = ConversionOptions::new("mp4");
        options.trim = Some(TrimRange::new(10.0, 5.0));
        assert_eq!(
            options.validate(),
            Err(OptionsError::InvalidTrimRange {
                start: 10.0,
                end: 5.0
            })
        );
    }

    #[test]
    fn test_validate_rejects_out_of_range_speed() {
        let mut options = ConversionOptions::new("mp4");
        options.speed = Some(8.0);
        assert!(matches!(
            options.validate(),
            Err(OptionsError::SpeedOutOfRange { .. })
        ));

        options.speed = Some(0.1);
        assert!(matches!(
            options.validate(),
            Err(OptionsError::SpeedOutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_numeric_options() {
        let mut options = ConversionOptions::new("mp4");
        options.video_bitrate = Some(0);
        assert_eq!(options.validate(), Err(OptionsError::InvalidVideoBitrate));

        let mut options = ConversionOptions::new("mp4");
        options.sample_rate = Some(0);
        assert_eq!(options.validate(), Err(OptionsError::InvalidSampleRate));

        let mut options = ConversionOptions::new("mp3");
        options.audio_channels = Some(6);
        assert_eq!(
            options.validate(),
            Err(OptionsError::InvalidAudioChannels { channels: 6 })
        );
    }

    #[test]
    fn test_validate_requires_output_format() {
        let options = ConversionOptions::new("  ");
        assert_eq!(options.validate(), Err(OptionsError::MissingOutputFormat));
    }

    #[test]
    fn test_source_file_extension() {
        assert_eq!(SourceFile::new("clip.final.MOV", vec![]).extension(), "MOV");
        assert_eq!(SourceFile::new("noextension", vec![]).extension(), "bin");
        assert_eq!(SourceFile::new("trailingdot.", vec![]).extension(), "bin");
    }

    #[test]
    fn test_segment_trim_is_clamped_to_duration() {
        let mut segment = VideoSegment::new(SourceFile::new("a.mp4", vec![]), 42.0);
        assert_eq!(segment.trim, TrimRange::new(0.0, 42.0));

        segment.set_trim(TrimRange::new(-3.0, 90.0));
        assert_eq!(segment.trim, TrimRange::new(0.0, 42.0));

        segment.set_trim(TrimRange::new(5.0, 10.0));
        assert_eq!(segment.trim, TrimRange::new(5.0, 10.0));
        assert!(segment.validate().is_ok());
    }

    #[test]
    fn test_segment_validate_rejects_trim_past_duration() {
        let mut segment = VideoSegment::new(SourceFile::new("a.mp4", vec![]), 20.0);
        // The field is public, so a caller can skip the clamping setter.
        segment.trim = TrimRange::new(0.0, 30.0);
        assert!(matches!(
            segment.validate(),
            Err(OptionsError::TrimBeyondDuration { .. })
        ));
    }
}
