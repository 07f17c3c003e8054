//! External transcoding tool wrappers: trimming previews and probing
//! durations via ffmpeg/ffprobe subprocesses.

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

/// Even-dimension scale plus a pixel format every player accepts.
const SCALE_FILTER: &str = "scale=trunc(iw/2)*2:trunc(ih/2)*2,format=yuv420p";

/// Outcome of a trim invocation. Both attempts failing (including a failure
/// to start the tool) is a value, not an error: callers fall back to
/// publishing the untrimmed asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrimOutcome {
    Trimmed,
    Failed { reason: String },
}

/// Cut the first `seconds` seconds of `input` into `output` with a fixed
/// encoding profile. A non-zero exit triggers one more attempt with explicit
/// bt709 color-space flags; some sources carry color metadata ffmpeg
/// refuses to infer.
pub async fn trim_video(
    ffmpeg_path: &str,
    input: &Path,
    output: &Path,
    seconds: i64,
) -> TrimOutcome {
    match run_trim(ffmpeg_path, input, output, seconds, false).await {
        Ok(()) => return TrimOutcome::Trimmed,
        Err(reason) => {
            debug!(input = %input.display(), %reason, "First trim attempt failed, retrying with bt709 flags");
        }
    }

    match run_trim(ffmpeg_path, input, output, seconds, true).await {
        Ok(()) => TrimOutcome::Trimmed,
        Err(reason) => TrimOutcome::Failed { reason },
    }
}

async fn run_trim(
    ffmpeg_path: &str,
    input: &Path,
    output: &Path,
    seconds: i64,
    force_bt709: bool,
) -> Result<(), String> {
    let mut cmd = Command::new(ffmpeg_path);
    cmd.args(["-y", "-hide_banner", "-loglevel", "error", "-ss", "0", "-t"])
        .arg(seconds.to_string())
        .arg("-i")
        .arg(input)
        .args(["-vf", SCALE_FILTER, "-pix_fmt", "yuv420p"]);

    if force_bt709 {
        cmd.args([
            "-colorspace",
            "bt709",
            "-color_primaries",
            "bt709",
            "-color_trc",
            "bt709",
        ]);
    }

    cmd.args([
        "-c:v",
        "libx264",
        "-preset",
        "veryfast",
        "-crf",
        "28",
        "-c:a",
        "aac",
        "-b:a",
        "128k",
        "-movflags",
        "+faststart",
    ])
    .arg(output)
    .stdin(Stdio::null())
    .stdout(Stdio::null())
    .stderr(Stdio::piped());

    let result = cmd
        .output()
        .await
        .map_err(|e| format!("failed to run {ffmpeg_path}: {e}"))?;

    if result.status.success() {
        Ok(())
    } else {
        Err(format!(
            "ffmpeg exited with {}: {}",
            result.status,
            String::from_utf8_lossy(&result.stderr).trim()
        ))
    }
}

/// ffprobe JSON output, reduced to what the pipeline needs.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Probe a downloaded file for its duration in whole seconds.
///
/// # Errors
///
/// Returns an error if ffprobe is missing, fails, or reports no duration.
pub async fn probe_duration(path: &Path) -> Result<i64> {
    which::which("ffprobe").context("ffprobe not found on PATH")?;

    let output = Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .context("Failed to run ffprobe")?;

    if !output.status.success() {
        anyhow::bail!(
            "ffprobe failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let probe: FfprobeOutput =
        serde_json::from_slice(&output.stdout).context("Failed to parse ffprobe JSON")?;

    let duration = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .context("ffprobe reported no duration")?;

    Ok(duration.round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trim_reports_failure_when_tool_is_missing() {
        let outcome = trim_video(
            "/nonexistent/ffmpeg",
            Path::new("/tmp/in.mp4"),
            Path::new("/tmp/out.mp4"),
            10,
        )
        .await;

        match outcome {
            TrimOutcome::Failed { reason } => assert!(reason.contains("failed to run")),
            TrimOutcome::Trimmed => panic!("trim cannot succeed without ffmpeg"),
        }
    }

    #[test]
    fn test_ffprobe_json_parsing() {
        let raw = r#"{"format":{"duration":"59.8","size":"1024"}}"#;
        let probe: FfprobeOutput = serde_json::from_str(raw).unwrap();
        assert_eq!(probe.format.duration.as_deref(), Some("59.8"));
    }
}
