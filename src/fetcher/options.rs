//! Fetcher flags and their command-line serialization

use std::path::PathBuf;

/// One flag passed to the external fetcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOption {
    /// `--quiet`
    Quiet,
    /// `--print-json`: emit the structured result on stdout
    PrintJson,
    /// `--id`: name output files `{id}.{ext}`
    NameById,
    /// `--write-thumbnail`
    WriteThumbnail,
    /// `--extract-audio`
    ExtractAudio,
    /// `--audio-format <format>`
    AudioFormat(String),
    /// `--audio-quality <quality>`, 0 is best
    AudioQuality(u8),
    /// `--prefer-ffmpeg`
    PreferFfmpeg,
    /// `--ffmpeg-location <path>`
    FfmpegLocation(PathBuf),
}

impl FetchOption {
    /// Append this option's arguments
    fn push_args(&self, args: &mut Vec<String>) {
        match self {
            FetchOption::Quiet => args.push("--quiet".into()),
            FetchOption::PrintJson => args.push("--print-json".into()),
            FetchOption::NameById => args.push("--id".into()),
            FetchOption::WriteThumbnail => args.push("--write-thumbnail".into()),
            FetchOption::ExtractAudio => args.push("--extract-audio".into()),
            FetchOption::AudioFormat(format) => {
                args.push("--audio-format".into());
                args.push(format.clone());
            }
            FetchOption::AudioQuality(quality) => {
                args.push("--audio-quality".into());
                args.push(quality.to_string());
            }
            FetchOption::PreferFfmpeg => args.push("--prefer-ffmpeg".into()),
            FetchOption::FfmpegLocation(path) => {
                args.push("--ffmpeg-location".into());
                args.push(path.display().to_string());
            }
        }
    }
}

/// The flag set used for episode ingestion: best-quality mp3 plus thumbnail
pub fn default_options(ffmpeg_location: Option<PathBuf>) -> Vec<FetchOption> {
    let mut options = vec![
        FetchOption::Quiet,
        FetchOption::PrintJson,
        FetchOption::NameById,
        FetchOption::WriteThumbnail,
        FetchOption::ExtractAudio,
        FetchOption::AudioFormat("mp3".into()),
        FetchOption::AudioQuality(0),
        FetchOption::PreferFfmpeg,
    ];
    if let Some(path) = ffmpeg_location {
        options.push(FetchOption::FfmpegLocation(path));
    }
    options
}

/// Serialize options in order, with the source URL last
pub fn build_args(options: &[FetchOption], url: &str) -> Vec<String> {
    let mut args = Vec::with_capacity(options.len() * 2 + 1);
    for option in options {
        option.push_args(&mut args);
    }
    args.push(url.to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_serialize_to_expected_flags() {
        let args = build_args(
            &default_options(Some(PathBuf::from("/opt/ffmpeg/bin"))),
            "https://example/watch?v=abc123",
        );
        assert_eq!(
            args,
            vec![
                "--quiet",
                "--print-json",
                "--id",
                "--write-thumbnail",
                "--extract-audio",
                "--audio-format",
                "mp3",
                "--audio-quality",
                "0",
                "--prefer-ffmpeg",
                "--ffmpeg-location",
                "/opt/ffmpeg/bin",
                "https://example/watch?v=abc123",
            ]
        );
    }

    #[test]
    fn location_flag_is_omitted_without_override() {
        let args = build_args(&default_options(None), "u");
        assert!(!args.iter().any(|a| a == "--ffmpeg-location"));
        assert_eq!(args.last().map(String::as_str), Some("u"));
    }

    #[test]
    fn serialization_is_deterministic() {
        let options = default_options(None);
        assert_eq!(build_args(&options, "u"), build_args(&options, "u"));
    }
}
