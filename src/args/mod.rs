use crate::constants::{
    default_audio_codec, default_video_codec, is_audio_only_format, quality_target,
    resolution_dimensions,
};
use crate::options::{ConversionOptions, Flip, OptionsError, Quality, Rotation, TrimRange};

// atempo only accepts ratios in this range per filter stage; anything
// outside is decomposed into a chain of boundary stages plus a residual.
pub const ATEMPO_MIN: f64 = 0.5;
pub const ATEMPO_MAX: f64 = 2.0;

/// Compile one conversion invocation into an ordered FFmpeg argument vector.
///
/// Pure and deterministic: the same inputs always produce the same sequence.
/// Options are validated here, before any argument is built.
pub fn build_convert_args(
    input_path: &str,
    output_path: &str,
    options: &ConversionOptions,
) -> Result<Vec<String>, OptionsError> {
    options.validate()?;

    let mut args: Vec<String> = vec!["-i".into(), input_path.into()];

    // Trim on the original timeline, ahead of any filter.
    if let Some(trim) = &options.trim {
        args.push("-ss".into());
        args.push(trim.start.to_string());
        args.push("-to".into());
        args.push(trim.end.to_string());
    }

    let filters = video_filter_chain(options);
    if !filters.is_empty() {
        args.push("-vf".into());
        args.push(filters.join(","));
    }

    let format = options.output_format.to_ascii_lowercase();

    if is_audio_only_format(&format) {
        args.push("-vn".into());
    } else {
        let codec = options
            .video_codec
            .map(|codec| codec.ffmpeg_name())
            .unwrap_or_else(|| default_video_codec(&format));
        args.push("-c:v".into());
        args.push(codec.into());

        match options.quality {
            Some(quality) if quality != Quality::Custom => {
                let target = quality_target(quality);
                args.push("-crf".into());
                args.push(target.crf.to_string());
                // An explicit bitrate wins over the table's.
                args.push("-b:v".into());
                match options.video_bitrate {
                    Some(kbps) => args.push(format!("{kbps}k")),
                    None => args.push(target.bitrate.into()),
                }
            }
            _ => {
                if let Some(kbps) = options.video_bitrate {
                    args.push("-b:v".into());
                    args.push(format!("{kbps}k"));
                }
            }
        }

        if let Some(preset) = options.preset {
            args.push("-preset".into());
            args.push(preset.as_str().into());
        }
    }

    // wav keeps FFmpeg's implicit PCM encoder.
    if format != "wav" {
        let codec = options
            .audio_codec
            .map(|codec| codec.ffmpeg_name())
            .unwrap_or_else(|| default_audio_codec(&format));
        args.push("-c:a".into());
        args.push(codec.into());
    }

    if let Some(kbps) = options.audio_bitrate {
        args.push("-b:a".into());
        args.push(format!("{kbps}k"));
    }
    if let Some(rate) = options.sample_rate {
        args.push("-ar".into());
        args.push(rate.to_string());
    }
    if let Some(channels) = options.audio_channels {
        args.push("-ac".into());
        args.push(channels.to_string());
    }

    if let Some(speed) = options.speed {
        if speed != 1.0 {
            let chain: Vec<String> = atempo_stages(speed)
                .into_iter()
                .map(|ratio| format!("atempo={ratio}"))
                .collect();
            args.push("-af".into());
            args.push(chain.join(","));
        }
    }

    args.push(output_path.into());
    Ok(args)
}

/// Trim-only extraction used by merge-with-trim: seek window, stream copy,
/// no filters.
pub fn build_trim_args(
    input_path: &str,
    output_path: &str,
    trim: &TrimRange,
) -> Result<Vec<String>, OptionsError> {
    trim.validate()?;
    Ok(vec![
        "-i".into(),
        input_path.into(),
        "-ss".into(),
        trim.start.to_string(),
        "-to".into(),
        trim.end.to_string(),
        "-c".into(),
        "copy".into(),
        output_path.into(),
    ])
}

/// Stream-copy concatenation against a concat-demuxer manifest.
pub fn build_concat_args(manifest_path: &str, output_path: &str) -> Vec<String> {
    vec![
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        manifest_path.into(),
        "-c".into(),
        "copy".into(),
        output_path.into(),
    ]
}

/// Concat-demuxer manifest: one `file '<name>'` line per input, in order.
pub fn concat_manifest(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("file '{name}'"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decompose a playback speed into atempo stage ratios.
///
/// Boundary stages are emitted while the remaining factor is out of range,
/// then one residual stage rounded to two decimals; the stage product
/// reproduces the requested speed within rounding.
pub fn atempo_stages(speed: f64) -> Vec<f64> {
    let mut stages = Vec::new();
    let mut remaining = speed;

    while remaining > ATEMPO_MAX {
        stages.push(ATEMPO_MAX);
        remaining /= ATEMPO_MAX;
    }
    while remaining < ATEMPO_MIN {
        stages.push(ATEMPO_MIN);
        remaining /= ATEMPO_MIN;
    }

    stages.push((remaining * 100.0).round() / 100.0);
    stages
}

// Video filters compose left to right; rotation and flip must land before
// geometry changes that depend on the final orientation.
fn video_filter_chain(options: &ConversionOptions) -> Vec<String> {
    let mut filters = Vec::new();

    match options.rotate {
        Some(Rotation::Cw90) => filters.push("transpose=1".to_string()),
        Some(Rotation::Cw180) => filters.push("transpose=1,transpose=1".to_string()),
        Some(Rotation::Cw270) => filters.push("transpose=2".to_string()),
        Some(Rotation::None) | None => {}
    }

    match options.flip {
        Some(Flip::Horizontal) => filters.push("hflip".to_string()),
        Some(Flip::Vertical) => filters.push("vflip".to_string()),
        Some(Flip::Both) => filters.push("hflip,vflip".to_string()),
        None => {}
    }

    if let Some(speed) = options.speed {
        if speed != 1.0 {
            filters.push(format!("setpts={}*PTS", 1.0 / speed));
        }
    }

    if let Some(resolution) = options.resolution {
        if let Some((width, height)) = resolution_dimensions(resolution) {
            filters.push(format!("scale={width}:{height}"));
        }
    }

    if let Some(crop) = &options.crop {
        filters.push(format!(
            "crop={}:{}:{}:{}",
            crop.width, crop.height, crop.x, crop.y
        ));
    }

    if let Some(fps) = options.fps {
        filters.push(format!("fps={fps}"));
    }

    filters
}
