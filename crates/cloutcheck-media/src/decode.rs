use std::future::Future;
use std::path::{Path, PathBuf};

use crate::error::MediaError;

/// Frames sampled from a video plus its extracted audio track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedVideo {
    pub frames: Vec<PathBuf>,
    /// `None` when the video has no audio stream.
    pub audio: Option<PathBuf>,
}

impl DecodedVideo {
    /// Every file the decode wrote.
    #[must_use]
    pub fn files(&self) -> Vec<PathBuf> {
        self.frames.iter().chain(self.audio.iter()).cloned().collect()
    }
}

pub trait VideoDecoder: Send + Sync {
    /// Sample at most `max_frames` frames and extract audio into `out_dir`.
    fn decode(
        &self,
        video: &Path,
        out_dir: &Path,
        max_frames: usize,
    ) -> impl Future<Output = Result<DecodedVideo, MediaError>> + Send;
}

/// [`VideoDecoder`] backed by an `ffmpeg` subprocess.
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    binary: String,
    fps_sample: u32,
}

impl FfmpegDecoder {
    #[must_use]
    pub fn new(binary: impl Into<String>, fps_sample: u32) -> Self {
        Self {
            binary: binary.into(),
            fps_sample: fps_sample.max(1),
        }
    }

    async fn run(&self, video: &Path, args: &[&str]) -> Result<std::process::Output, MediaError> {
        tokio::process::Command::new(&self.binary)
            .args(["-hide_banner", "-loglevel", "error", "-nostdin", "-y", "-i"])
            .arg(video)
            .args(args)
            .output()
            .await
            .map_err(|e| MediaError::Decode {
                path: video.display().to_string(),
                reason: format!("{} subprocess error: {e}", self.binary),
            })
    }

    async fn extract_frames(
        &self,
        video: &Path,
        frames_dir: &Path,
        max_frames: usize,
    ) -> Result<Vec<PathBuf>, MediaError> {
        tokio::fs::create_dir_all(frames_dir)
            .await
            .map_err(|e| MediaError::io(frames_dir, e))?;

        let filter = format!("fps={}", self.fps_sample);
        let limit = max_frames.to_string();
        let pattern = frames_dir.join("frame_%04d.jpg");
        let pattern = pattern.to_string_lossy();
        let output = self
            .run(video, &["-vf", &filter, "-frames:v", &limit, "-q:v", "3", &pattern])
            .await?;

        if !output.status.success() {
            return Err(MediaError::Decode {
                path: video.display().to_string(),
                reason: stderr_tail(&output.stderr),
            });
        }

        let mut entries = tokio::fs::read_dir(frames_dir)
            .await
            .map_err(|e| MediaError::io(frames_dir, e))?;
        let mut frames = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MediaError::io(frames_dir, e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "jpg") {
                frames.push(path);
            }
        }
        frames.sort();
        frames.truncate(max_frames);

        if frames.is_empty() {
            return Err(MediaError::Decode {
                path: video.display().to_string(),
                reason: "no frames extracted".to_string(),
            });
        }
        Ok(frames)
    }

    async fn extract_audio(&self, video: &Path, out: &Path) -> Result<Option<PathBuf>, MediaError> {
        let target = out.to_string_lossy();
        let output = self
            .run(
                video,
                &["-map", "0:a:0", "-vn", "-ac", "1", "-ar", "16000", "-f", "wav", &target],
            )
            .await?;

        if output.status.success() {
            return Ok(Some(out.to_path_buf()));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_missing_audio(&stderr) {
            tracing::debug!(video = %video.display(), "video has no audio stream");
            return Ok(None);
        }
        Err(MediaError::Decode {
            path: video.display().to_string(),
            reason: stderr_tail(&output.stderr),
        })
    }
}

impl VideoDecoder for FfmpegDecoder {
    async fn decode(
        &self,
        video: &Path,
        out_dir: &Path,
        max_frames: usize,
    ) -> Result<DecodedVideo, MediaError> {
        let stem = video
            .file_stem()
            .map_or_else(|| "video".to_string(), |s| s.to_string_lossy().into_owned());
        let frames_dir = out_dir.join(format!("{stem}_frames"));
        let audio_path = out_dir.join(format!("{stem}_audio.wav"));

        let frames = if max_frames == 0 {
            Vec::new()
        } else {
            self.extract_frames(video, &frames_dir, max_frames).await?
        };
        let audio = self.extract_audio(video, &audio_path).await?;

        Ok(DecodedVideo { frames, audio })
    }
}

fn is_missing_audio(stderr: &str) -> bool {
    stderr.contains("matches no streams") || stderr.contains("does not contain any stream")
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let tail: Vec<&str> = text.lines().rev().take(3).collect();
    if tail.is_empty() {
        "ffmpeg exited with an error".to_string()
    } else {
        tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_missing_audio_stream() {
        assert!(is_missing_audio(
            "Stream map '0:a:0' matches no streams.\nTo ignore this, add a trailing '?'"
        ));
        assert!(!is_missing_audio("Invalid data found when processing input"));
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let tail = stderr_tail(b"one\ntwo\nthree\nfour\n");
        assert_eq!(tail, "two | three | four");
        assert_eq!(stderr_tail(b""), "ffmpeg exited with an error");
    }

    #[test]
    fn fps_sample_is_at_least_one() {
        let decoder = FfmpegDecoder::new("ffmpeg", 0);
        assert_eq!(decoder.fps_sample, 1);
    }

    #[tokio::test]
    async fn missing_binary_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let decoder = FfmpegDecoder::new("definitely-not-an-ffmpeg-binary", 1);
        let err = decoder
            .decode(&dir.path().join("v.mp4"), dir.path(), 4)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Decode { .. }));
    }
}
