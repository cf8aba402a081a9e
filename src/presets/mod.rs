use crate::options::{AudioCodec, ConversionOptions, Quality, Resolution, VideoCodec};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A ready-made conversion target the UI offers by name.
///
/// The embedded options are complete and valid on their own; the UI
/// starts from them and lets the user tweak individual fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatPreset {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: PresetCategory,
    pub options: ConversionOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetCategory {
    Social,
    Device,
    Web,
}

impl std::fmt::Display for PresetCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Social => write!(f, "Social Media"),
            Self::Device => write!(f, "Devices"),
            Self::Web => write!(f, "Web"),
        }
    }
}

pub struct PresetCatalog {
    presets: HashMap<String, FormatPreset>,
}

impl PresetCatalog {
    pub fn new() -> Self {
        let mut catalog = Self {
            presets: HashMap::new(),
        };
        catalog.load_builtin_presets();
        catalog
    }

    fn load_builtin_presets(&mut self) {
        let builtin_presets = vec![
            FormatPreset {
                id: "instagram-story".to_string(),
                name: "Instagram Story".to_string(),
                description: "9:16 vertical, optimized for stories".to_string(),
                category: PresetCategory::Social,
                options: {
                    let mut options = ConversionOptions::new("mp4");
                    options.resolution = Some(Resolution::P1080);
                    options.quality = Some(Quality::High);
                    options.video_codec = Some(VideoCodec::H264);
                    options.audio_bitrate = Some(128);
                    options
                },
            },
            FormatPreset {
                id: "youtube-hd".to_string(),
                name: "YouTube HD".to_string(),
                description: "1080p, high quality for YouTube".to_string(),
                category: PresetCategory::Social,
                options: {
                    let mut options = ConversionOptions::new("mp4");
                    options.resolution = Some(Resolution::P1080);
                    options.quality = Some(Quality::High);
                    options.video_codec = Some(VideoCodec::H264);
                    options.audio_bitrate = Some(192);
                    options.fps = Some(30);
                    options
                },
            },
            FormatPreset {
                id: "tiktok".to_string(),
                name: "TikTok".to_string(),
                description: "9:16 vertical, optimized for TikTok".to_string(),
                category: PresetCategory::Social,
                options: {
                    let mut options = ConversionOptions::new("mp4");
                    options.resolution = Some(Resolution::P1080);
                    options.quality = Some(Quality::High);
                    options.video_codec = Some(VideoCodec::H264);
                    options.audio_bitrate = Some(128);
                    options
                },
            },
            FormatPreset {
                id: "twitter".to_string(),
                name: "Twitter/X".to_string(),
                description: "Optimized for Twitter video".to_string(),
                category: PresetCategory::Social,
                options: {
                    let mut options = ConversionOptions::new("mp4");
                    options.resolution = Some(Resolution::P720);
                    options.quality = Some(Quality::Medium);
                    options.video_codec = Some(VideoCodec::H264);
                    options.audio_bitrate = Some(128);
                    options
                },
            },
            FormatPreset {
                id: "iphone".to_string(),
                name: "iPhone".to_string(),
                description: "H.264, compatible with all iPhones".to_string(),
                category: PresetCategory::Device,
                options: {
                    let mut options = ConversionOptions::new("mp4");
                    options.video_codec = Some(VideoCodec::H264);
                    options.quality = Some(Quality::High);
                    options.audio_codec = Some(AudioCodec::Aac);
                    options
                },
            },
            FormatPreset {
                id: "android".to_string(),
                name: "Android".to_string(),
                description: "H.264, compatible with Android devices".to_string(),
                category: PresetCategory::Device,
                options: {
                    let mut options = ConversionOptions::new("mp4");
                    options.video_codec = Some(VideoCodec::H264);
                    options.quality = Some(Quality::High);
                    options.audio_codec = Some(AudioCodec::Aac);
                    options
                },
            },
            FormatPreset {
                id: "web-optimized".to_string(),
                name: "Web Optimized".to_string(),
                description: "Small file size, fast loading".to_string(),
                category: PresetCategory::Web,
                options: {
                    let mut options = ConversionOptions::new("mp4");
                    options.resolution = Some(Resolution::P720);
                    options.quality = Some(Quality::Medium);
                    options.video_codec = Some(VideoCodec::H264);
                    options
                },
            },
            FormatPreset {
                id: "webm-vp9".to_string(),
                name: "WebM (VP9)".to_string(),
                description: "Modern web format, great compression".to_string(),
                category: PresetCategory::Web,
                options: {
                    let mut options = ConversionOptions::new("webm");
                    options.video_codec = Some(VideoCodec::Vp9);
                    options.quality = Some(Quality::Medium);
                    options.audio_codec = Some(AudioCodec::Opus);
                    options
                },
            },
        ];

        for preset in builtin_presets {
            self.presets.insert(preset.id.clone(), preset);
        }
    }

    pub fn get(&self, id: &str) -> Option<&FormatPreset> {
        self.presets.get(id)
    }

    pub fn all(&self) -> Vec<&FormatPreset> {
        self.presets.values().collect()
    }

    pub fn by_category(&self, category: PresetCategory) -> Vec<&FormatPreset> {
        self.presets
            .values()
            .filter(|preset| preset.category == category)
            .collect()
    }
}

impl Default for PresetCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_presets_are_present() {
        let catalog = PresetCatalog::new();
        for id in [
            "instagram-story",
            "youtube-hd",
            "tiktok",
            "twitter",
            "iphone",
            "android",
            "web-optimized",
            "webm-vp9",
        ] {
            assert!(catalog.get(id).is_some(), "missing preset: {id}");
        }
        assert!(catalog.get("betamax").is_none());
    }

    #[test]
    fn test_every_preset_compiles_cleanly() {
        let catalog = PresetCatalog::new();
        for preset in catalog.all() {
            assert!(
                preset.options.validate().is_ok(),
                "invalid preset options: {}",
                preset.id
            );
            assert!(crate::args::build_convert_args(
                "in.mov",
                &format!("out.{}", preset.options.output_format),
                &preset.options
            )
            .is_ok());
        }
    }

    #[test]
    fn test_category_filter() {
        let catalog = PresetCatalog::new();
        let web = catalog.by_category(PresetCategory::Web);
        assert_eq!(web.len(), 2);
        assert!(web.iter().all(|preset| preset.category == PresetCategory::Web));
        assert_eq!(PresetCategory::Social.to_string(), "Social Media");
    }
}
