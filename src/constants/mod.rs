use crate::options::{Quality, Resolution};

// Formats that carry no video stream; converting to one drops video entirely.
pub const AUDIO_ONLY_FORMATS: &[&str] = &["mp3", "wav", "aac", "opus"];

// Fallbacks for formats outside the known tables.
pub const FALLBACK_VIDEO_CODEC: &str = "libx264";
pub const FALLBACK_AUDIO_CODEC: &str = "aac";
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

// Encoding targets selected by a quality level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityTarget {
    pub crf: u32,
    pub bitrate: &'static str,
}

pub fn quality_target(quality: Quality) -> QualityTarget {
    match quality {
        Quality::Low => QualityTarget {
            crf: 28,
            bitrate: "500k",
        },
        Quality::Medium => QualityTarget {
            crf: 23,
            bitrate: "1000k",
        },
        Quality::High => QualityTarget {
            crf: 18,
            bitrate: "2500k",
        },
        Quality::Ultra => QualityTarget {
            crf: 15,
            bitrate: "5000k",
        },
        Quality::Custom => QualityTarget {
            crf: 23,
            bitrate: "2000k",
        },
    }
}

/// Pixel dimensions for a named resolution; `None` means no rescale.
pub fn resolution_dimensions(resolution: Resolution) -> Option<(u32, u32)> {
    match resolution {
        Resolution::P480 => Some((854, 480)),
        Resolution::P720 => Some((1280, 720)),
        Resolution::P1080 => Some((1920, 1080)),
        Resolution::P1440 => Some((2560, 1440)),
        Resolution::Uhd4k => Some((3840, 2160)),
        Resolution::Original => None,
    }
}

pub fn is_audio_only_format(format: &str) -> bool {
    let format = format.to_ascii_lowercase();
    AUDIO_ONLY_FORMATS.contains(&format.as_str())
}

/// Default video encoder for a container format.
pub fn default_video_codec(format: &str) -> &'static str {
    match format.to_ascii_lowercase().as_str() {
        "mp4" | "mov" | "mkv" => "libx264",
        "webm" => "libvpx",
        "avi" => "mpeg4",
        _ => FALLBACK_VIDEO_CODEC,
    }
}

/// Default audio encoder for a container format.
pub fn default_audio_codec(format: &str) -> &'static str {
    match format.to_ascii_lowercase().as_str() {
        "mp4" | "mov" | "mkv" | "aac" => "aac",
        "webm" => "libvorbis",
        "avi" | "mp3" => "libmp3lame",
        "opus" => "libopus",
        _ => FALLBACK_AUDIO_CODEC,
    }
}

/// MIME type for an output format, used to tag the result blob.
pub fn mime_type(format: &str) -> &'static str {
    match format.to_ascii_lowercase().as_str() {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "aac" => "audio/aac",
        "opus" => "audio/opus",
        _ => FALLBACK_MIME_TYPE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_targets_are_total() {
        for quality in [
            Quality::Low,
            Quality::Medium,
            Quality::High,
            Quality::Ultra,
            Quality::Custom,
        ] {
            let target = quality_target(quality);
            assert!(target.crf > 0 && target.crf <= 51);
            assert!(target.bitrate.ends_with('k'));
        }
    }

    #[test]
    fn test_resolution_dimensions() {
        assert_eq!(resolution_dimensions(Resolution::P720), Some((1280, 720)));
        assert_eq!(resolution_dimensions(Resolution::Uhd4k), Some((3840, 2160)));
        assert_eq!(resolution_dimensions(Resolution::Original), None);
    }

    #[test]
    fn test_audio_only_set() {
        assert!(is_audio_only_format("mp3"));
        assert!(is_audio_only_format("WAV"));
        assert!(!is_audio_only_format("mp4"));
        assert!(!is_audio_only_format("webm"));
    }

    #[test]
    fn test_codec_defaults_fall_back() {
        assert_eq!(default_video_codec("mp4"), "libx264");
        assert_eq!(default_video_codec("webm"), "libvpx");
        assert_eq!(default_video_codec("flv"), FALLBACK_VIDEO_CODEC);
        assert_eq!(default_audio_codec("webm"), "libvorbis");
        assert_eq!(default_audio_codec("flv"), FALLBACK_AUDIO_CODEC);
    }

    #[test]
    fn test_mime_type_lookup() {
        assert_eq!(mime_type("mp4"), "video/mp4");
        assert_eq!(mime_type("MOV"), "video/quicktime");
        assert_eq!(mime_type("mp3"), "audio/mpeg");
        assert_eq!(mime_type("xyz"), FALLBACK_MIME_TYPE);
    }
}
