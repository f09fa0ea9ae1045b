//! FFmpeg argument construction for RTMP relays.

const VIDEO_CODEC: &str = "libx264";
const VIDEO_PRESET: &str = "veryfast";
const VIDEO_MAXRATE: &str = "3000k";
const VIDEO_BUFSIZE: &str = "6000k";
const PIXEL_FORMAT: &str = "yuv420p";
const KEYFRAME_INTERVAL: &str = "50";

const AUDIO_CODEC: &str = "aac";
const AUDIO_BITRATE: &str = "160k";
const AUDIO_CHANNELS: &str = "2";
const AUDIO_SAMPLE_RATE: &str = "44100";

/// Converts Windows style separators so uploaded paths work on any host.
pub fn normalize_input(input_source: &str) -> String {
    input_source.replace('\\', "/")
}

/// Builds the argument list (without the program name) that reads
/// `input_source` at its native rate and pushes it to `destination_url` as FLV.
pub fn build_args(input_source: &str, destination_url: &str, loop_input: bool) -> Vec<String> {
    let mut args = vec!["-re".to_string()];

    if loop_input {
        args.push("-stream_loop".to_string());
        args.push("-1".to_string());
    }

    args.extend([
        "-i".to_string(),
        normalize_input(input_source),
        "-c:v".to_string(),
        VIDEO_CODEC.to_string(),
        "-preset".to_string(),
        VIDEO_PRESET.to_string(),
        "-maxrate".to_string(),
        VIDEO_MAXRATE.to_string(),
        "-bufsize".to_string(),
        VIDEO_BUFSIZE.to_string(),
        "-pix_fmt".to_string(),
        PIXEL_FORMAT.to_string(),
        "-g".to_string(),
        KEYFRAME_INTERVAL.to_string(),
        "-c:a".to_string(),
        AUDIO_CODEC.to_string(),
        "-b:a".to_string(),
        AUDIO_BITRATE.to_string(),
        "-ac".to_string(),
        AUDIO_CHANNELS.to_string(),
        "-ar".to_string(),
        AUDIO_SAMPLE_RATE.to_string(),
        "-f".to_string(),
        "flv".to_string(),
        destination_url.to_string(),
    ]);

    args
}
