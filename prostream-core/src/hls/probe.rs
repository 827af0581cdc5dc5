//! Media source inspection via ffprobe.
//!
//! Enumerates the elementary streams of a remote source without touching
//! disk. The session manager decides what to do with the result; a source
//! without audio is fine here, a source without video is its problem.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{HlsError, HlsResult};

/// Kind of elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

/// One elementary stream as reported by the probe.
///
/// Produced once per session and immutable afterwards.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TrackDescriptor {
    /// Stream index within the source container.
    pub index: u32,
    pub kind: TrackKind,
    /// Codec name as reported by the probe (e.g. "h264", "aac").
    pub codec: String,
    /// Video width in pixels.
    pub width: Option<u32>,
    /// Video height in pixels.
    pub height: Option<u32>,
    /// Stream bitrate in bits per second, when the container reports one.
    pub bit_rate: Option<u64>,
    /// Audio language tag, `"und"` when the container carries none.
    pub language: String,
}

impl TrackDescriptor {
    /// Whether this is the video track.
    pub fn is_video(&self) -> bool {
        self.kind == TrackKind::Video
    }
}

/// Abstraction over media inspection to enable mock probing in tests.
#[async_trait]
pub trait MediaProber: Send + Sync {
    /// Enumerates the elementary streams of `source_url` in reported order.
    ///
    /// # Errors
    /// - `HlsError::ProbeFailed` - The inspection tool failed or produced
    ///   unparseable output
    async fn probe(&self, source_url: &str) -> HlsResult<Vec<TrackDescriptor>>;
}

/// Production prober driving the ffprobe binary.
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    /// Creates a prober using the given ffprobe binary path.
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self { ffprobe_path }
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn probe(&self, source_url: &str) -> HlsResult<Vec<TrackDescriptor>> {
        debug!("Probing source: {}", source_url);

        let output = tokio::process::Command::new(&self.ffprobe_path)
            .arg("-v")
            .arg("error")
            .arg("-print_format")
            .arg("json")
            .arg("-show_streams")
            .arg(source_url)
            .output()
            .await
            .map_err(|e| HlsError::ProbeFailed {
                reason: format!("Failed to execute ffprobe: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HlsError::ProbeFailed {
                reason: format!("ffprobe exited with {}: {}", output.status, stderr.trim()),
            });
        }

        let report: FfprobeReport =
            serde_json::from_slice(&output.stdout).map_err(|e| HlsError::ProbeFailed {
                reason: format!("Unparseable ffprobe output: {e}"),
            })?;

        let tracks: Vec<TrackDescriptor> = report
            .streams
            .into_iter()
            .filter_map(parse_stream)
            .collect();

        debug!("Probe found {} usable tracks", tracks.len());

        Ok(tracks)
    }
}

/// Maps one ffprobe stream entry to a track descriptor.
///
/// Streams that are neither video nor audio (subtitles, attachments, data)
/// are skipped; they are not packaged.
fn parse_stream(stream: FfprobeStream) -> Option<TrackDescriptor> {
    let kind = match stream.codec_type.as_str() {
        "video" => TrackKind::Video,
        "audio" => TrackKind::Audio,
        _ => return None,
    };

    let language = stream
        .tags
        .and_then(|tags| tags.language)
        .unwrap_or_else(|| "und".to_string());

    Some(TrackDescriptor {
        index: stream.index,
        kind,
        codec: stream.codec_name.unwrap_or_else(|| "unknown".to_string()),
        width: stream.width,
        height: stream.height,
        bit_rate: stream.bit_rate.and_then(|rate| rate.parse().ok()),
        language,
    })
}

#[derive(Debug, Deserialize)]
struct FfprobeReport {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: u32,
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    // ffprobe reports bit_rate as a string
    bit_rate: Option<String>,
    tags: Option<FfprobeTags>,
}

#[derive(Debug, Deserialize)]
struct FfprobeTags {
    language: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_report(json: &str) -> Vec<TrackDescriptor> {
        let report: FfprobeReport = serde_json::from_str(json).unwrap();
        report.streams.into_iter().filter_map(parse_stream).collect()
    }

    #[test]
    fn test_parse_video_and_audio_streams() {
        let tracks = parse_report(
            r#"{
                "streams": [
                    {
                        "index": 0,
                        "codec_name": "h264",
                        "codec_type": "video",
                        "width": 1920,
                        "height": 1080,
                        "bit_rate": "4500000"
                    },
                    {
                        "index": 1,
                        "codec_name": "ac3",
                        "codec_type": "audio",
                        "tags": { "language": "eng" }
                    }
                ]
            }"#,
        );

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].kind, TrackKind::Video);
        assert_eq!(tracks[0].codec, "h264");
        assert_eq!(tracks[0].width, Some(1920));
        assert_eq!(tracks[0].bit_rate, Some(4_500_000));
        assert_eq!(tracks[1].kind, TrackKind::Audio);
        assert_eq!(tracks[1].language, "eng");
    }

    #[test]
    fn test_audio_without_language_defaults_to_und() {
        let tracks = parse_report(
            r#"{
                "streams": [
                    { "index": 1, "codec_name": "aac", "codec_type": "audio" }
                ]
            }"#,
        );

        assert_eq!(tracks[0].language, "und");
    }

    #[test]
    fn test_subtitle_streams_are_skipped() {
        let tracks = parse_report(
            r#"{
                "streams": [
                    { "index": 0, "codec_name": "h264", "codec_type": "video" },
                    { "index": 2, "codec_name": "subrip", "codec_type": "subtitle" }
                ]
            }"#,
        );

        assert_eq!(tracks.len(), 1);
        assert!(tracks[0].is_video());
    }

    #[test]
    fn test_zero_streams_is_not_an_error() {
        let tracks = parse_report(r#"{ "streams": [] }"#);
        assert!(tracks.is_empty());
    }

    #[tokio::test]
    async fn test_missing_binary_reports_probe_failure() {
        let prober = FfprobeProber::new(PathBuf::from("/nonexistent/ffprobe"));
        let result = prober.probe("http://example.com/video.mkv").await;

        assert!(matches!(result, Err(HlsError::ProbeFailed { .. })));
    }
}
