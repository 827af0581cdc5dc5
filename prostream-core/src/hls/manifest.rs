//! Master manifest synthesis.
//!
//! The per-track media playlists are written by ffmpeg; the engine only
//! produces the master manifest tying the renditions together. It is written
//! exactly once per session, after every track playlist has been confirmed
//! playable, and never rewritten.

use super::probe::TrackDescriptor;

/// Relative path of the video rendition playlist within a session directory.
pub const VIDEO_PLAYLIST: &str = "video/playlist.m3u8";

/// Relative path of the n-th audio rendition playlist.
pub fn audio_playlist(ordinal: u32) -> String {
    format!("audio_{ordinal}/playlist.m3u8")
}

/// Directory holding the n-th audio rendition.
pub fn audio_dir(ordinal: u32) -> String {
    format!("audio_{ordinal}")
}

/// Builds the master manifest for one video track and its audio renditions.
///
/// Line order is significant: version header, one `EXT-X-MEDIA` per audio
/// track (first one DEFAULT=YES), then the single video stream entry. The
/// `AUDIO` group attribute is present only when the session has audio.
pub fn build_master_manifest(
    video: &TrackDescriptor,
    audio_tracks: &[TrackDescriptor],
    fallback_bandwidth: u64,
) -> String {
    let mut manifest = String::from("#EXTM3U\n#EXT-X-VERSION:6\n");

    for (ordinal, track) in audio_tracks.iter().enumerate() {
        let default = if ordinal == 0 { "YES" } else { "NO" };
        manifest.push_str(&format!(
            "#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"audio\",NAME=\"{lang}\",DEFAULT={default},AUTOSELECT=YES,LANGUAGE=\"{lang}\",URI=\"{uri}\"\n",
            lang = track.language,
            uri = audio_playlist(ordinal as u32),
        ));
    }

    let bandwidth = video.bit_rate.unwrap_or(fallback_bandwidth);
    let resolution = format!(
        "{}x{}",
        video.width.unwrap_or(0),
        video.height.unwrap_or(0)
    );

    let mut codecs = video_codec_tag(&video.codec).to_string();
    if !audio_tracks.is_empty() {
        // Audio renditions are always transcoded to AAC-LC
        codecs.push_str(",mp4a.40.2");
    }

    manifest.push_str(&format!(
        "#EXT-X-STREAM-INF:BANDWIDTH={bandwidth},RESOLUTION={resolution},CODECS=\"{codecs}\""
    ));
    if !audio_tracks.is_empty() {
        manifest.push_str(",AUDIO=\"audio\"");
    }
    manifest.push('\n');
    manifest.push_str(VIDEO_PLAYLIST);
    manifest.push('\n');

    manifest
}

/// RFC 6381 codec tag for the stream-copied video track.
///
/// The exact profile/level of the source is not re-derived; a broadly
/// compatible tag per codec family is sufficient for player selection.
fn video_codec_tag(codec: &str) -> &str {
    match codec {
        "h264" => "avc1.64001f",
        "hevc" | "h265" => "hvc1.1.6.L120.90",
        "vp9" => "vp09.00.41.08",
        "av1" => "av01.0.08M.08",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hls::probe::TrackKind;

    fn video_track() -> TrackDescriptor {
        TrackDescriptor {
            index: 0,
            kind: TrackKind::Video,
            codec: "h264".to_string(),
            width: Some(1920),
            height: Some(1080),
            bit_rate: Some(4_500_000),
            language: "und".to_string(),
        }
    }

    fn audio_track(index: u32, language: &str) -> TrackDescriptor {
        TrackDescriptor {
            index,
            kind: TrackKind::Audio,
            codec: "ac3".to_string(),
            width: None,
            height: None,
            bit_rate: None,
            language: language.to_string(),
        }
    }

    #[test]
    fn test_manifest_with_audio_tracks() {
        let audio = vec![audio_track(1, "eng"), audio_track(2, "fra")];
        let manifest = build_master_manifest(&video_track(), &audio, 2_000_000);
        let lines: Vec<&str> = manifest.lines().collect();

        assert_eq!(lines[0], "#EXTM3U");
        assert_eq!(lines[1], "#EXT-X-VERSION:6");
        assert_eq!(
            lines[2],
            "#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"audio\",NAME=\"eng\",DEFAULT=YES,AUTOSELECT=YES,LANGUAGE=\"eng\",URI=\"audio_0/playlist.m3u8\""
        );
        assert_eq!(
            lines[3],
            "#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"audio\",NAME=\"fra\",DEFAULT=NO,AUTOSELECT=YES,LANGUAGE=\"fra\",URI=\"audio_1/playlist.m3u8\""
        );
        assert_eq!(
            lines[4],
            "#EXT-X-STREAM-INF:BANDWIDTH=4500000,RESOLUTION=1920x1080,CODECS=\"avc1.64001f,mp4a.40.2\",AUDIO=\"audio\""
        );
        assert_eq!(lines[5], "video/playlist.m3u8");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_manifest_without_audio() {
        let manifest = build_master_manifest(&video_track(), &[], 2_000_000);

        assert!(!manifest.contains("#EXT-X-MEDIA"));
        assert!(!manifest.contains("AUDIO="));
        assert!(!manifest.contains("mp4a.40.2"));
        assert!(manifest.contains("CODECS=\"avc1.64001f\""));
        assert!(manifest.ends_with("video/playlist.m3u8\n"));
    }

    #[test]
    fn test_fallback_bandwidth_when_unreported() {
        let mut video = video_track();
        video.bit_rate = None;
        let manifest = build_master_manifest(&video, &[], 2_000_000);

        assert!(manifest.contains("BANDWIDTH=2000000"));
    }

    #[test]
    fn test_unknown_codec_passes_through() {
        let mut video = video_track();
        video.codec = "mpeg2video".to_string();
        let manifest = build_master_manifest(&video, &[], 2_000_000);

        assert!(manifest.contains("CODECS=\"mpeg2video\""));
    }
}
