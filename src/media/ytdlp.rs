use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::executor::Extractor;
use super::profile::ExtractionProfile;
use super::types::{Extraction, MediaMetadata, MediaRequest, OutputKind};

/// Extractor backed by the yt-dlp CLI. Two passes per attempt, both under
/// the profile's timeouts: a metadata probe (`--dump-json`), then the
/// actual download with post-processing.
pub struct YtDlpExtractor {
    scratch: PathBuf,
}

impl YtDlpExtractor {
    pub fn new(scratch: PathBuf) -> Self {
        Self { scratch }
    }

    /// Flags shared by both passes, derived from the profile.
    fn profile_args(profile: &ExtractionProfile) -> Vec<String> {
        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            profile.socket_timeout.as_secs().to_string(),
            "--retries".to_string(),
            profile.retries.to_string(),
        ];
        if profile.geo_bypass {
            args.push("--geo-bypass".to_string());
        }
        if let Some(ua) = profile.identity.user_agent() {
            args.push("--user-agent".to_string());
            args.push(ua.to_string());
        }
        for (name, value) in &profile.headers {
            args.push("--add-headers".to_string());
            args.push(format!("{name}:{value}"));
        }
        if let Some(clients) = profile.identity.player_clients() {
            args.push("--extractor-args".to_string());
            args.push(format!("youtube:player_client={clients}"));
        }
        args
    }

    fn format_args(profile: &ExtractionProfile) -> Vec<String> {
        match profile.kind {
            OutputKind::Audio => vec![
                "--format".to_string(),
                "bestaudio[ext=m4a]/bestaudio/best".to_string(),
                "--extract-audio".to_string(),
                "--audio-format".to_string(),
                "mp3".to_string(),
                "--audio-quality".to_string(),
                format!("{}K", profile.quality),
            ],
            OutputKind::Video => {
                let q = &profile.quality;
                vec![
                    "--format".to_string(),
                    format!(
                        "bestvideo[ext=mp4][height<={q}]+bestaudio[ext=m4a]/best[ext=mp4][height<={q}]/best"
                    ),
                    "--merge-output-format".to_string(),
                    "mp4".to_string(),
                ]
            }
        }
    }

    async fn probe_metadata(
        &self,
        request: &MediaRequest,
        profile: &ExtractionProfile,
    ) -> Result<(String, MediaMetadata)> {
        debug!(
            "probing metadata for {} as {}",
            request.target.as_str(),
            profile.identity.tag()
        );

        let mut cmd = Command::new("yt-dlp");
        cmd.arg("--dump-json").arg("--no-download");
        cmd.args(Self::profile_args(profile));
        cmd.arg(request.target.as_str());

        let probe_timeout = profile.socket_timeout.max(Duration::from_secs(30));
        let output = tokio::time::timeout(probe_timeout, cmd.output())
            .await
            .context("metadata probe timed out")?
            .context("failed to run yt-dlp")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("metadata probe failed: {}", stderr.trim());
        }

        let json: Value = serde_json::from_str(String::from_utf8_lossy(&output.stdout).trim())
            .context("failed to parse yt-dlp metadata")?;

        let id = json["id"].as_str().unwrap_or("media").to_string();
        let metadata = MediaMetadata {
            title: json["title"].as_str().map(|s| s.to_string()),
            uploader: json["uploader"].as_str().map(|s| s.to_string()),
            duration: json["duration"].as_f64().map(|d| d as u64),
            thumbnail_url: json["thumbnail"].as_str().map(|s| s.to_string()),
        };
        Ok((id, metadata))
    }

    async fn download(
        &self,
        request: &MediaRequest,
        profile: &ExtractionProfile,
        template: &str,
    ) -> Result<()> {
        info!(
            "downloading {} as {}",
            request.target.as_str(),
            profile.identity.tag()
        );

        let mut cmd = Command::new("yt-dlp");
        cmd.arg("--output").arg(template);
        cmd.args(Self::format_args(profile));
        cmd.args(Self::profile_args(profile));
        cmd.arg(request.target.as_str());

        let output = tokio::time::timeout(profile.attempt_timeout(), cmd.output())
            .await
            .context("download timed out")?
            .context("failed to run yt-dlp")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("download failed: {}", stderr.trim());
        }
        Ok(())
    }

    /// Where the finished file should land for a given media id. The
    /// request id in the template keeps concurrent downloads apart even
    /// when they fetch the same media.
    fn expected_path(&self, request: &MediaRequest, id: &str) -> PathBuf {
        self.scratch
            .join(format!("{}-{}.{}", request.request_id, id, request.kind.final_ext()))
    }

    fn output_template(&self, request: &MediaRequest) -> String {
        self.scratch
            .join(format!("{}-%(id)s.%(ext)s", request.request_id))
            .to_string_lossy()
            .into_owned()
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn extract(
        &self,
        request: &MediaRequest,
        profile: &ExtractionProfile,
    ) -> Result<Extraction> {
        let (id, metadata) = self.probe_metadata(request, profile).await?;
        let template = self.output_template(request);
        self.download(request, profile, &template).await?;

        Ok(Extraction {
            output_path: self.expected_path(request, &id),
            metadata,
        })
    }
}

/// Fetch a thumbnail next to the artifact. Best-effort; callers treat any
/// failure as "no thumbnail".
pub async fn fetch_thumbnail(
    http: &reqwest::Client,
    url: &str,
    artifact_path: &Path,
) -> Result<PathBuf> {
    let dest = artifact_path.with_extension("jpg");
    let bytes = http
        .get(url)
        .timeout(Duration::from_secs(15))
        .send()
        .await
        .context("thumbnail request failed")?
        .bytes()
        .await
        .context("thumbnail body read failed")?;
    tokio::fs::write(&dest, &bytes)
        .await
        .context("thumbnail write failed")?;
    Ok(dest)
}

/// Log whether the external tools are present. The bot still starts
/// without them; every request would just fail with a clear error.
pub async fn probe_tools() {
    match Command::new("yt-dlp").arg("--version").output().await {
        Ok(out) if out.status.success() => {
            let version = String::from_utf8_lossy(&out.stdout);
            info!("yt-dlp available, version {}", version.trim());
        }
        Ok(_) => warn!("yt-dlp exists but --version failed"),
        Err(e) => warn!("yt-dlp not found: {e}"),
    }
    match Command::new("ffmpeg").arg("-version").output().await {
        Ok(out) if out.status.success() => {
            let line = String::from_utf8_lossy(&out.stdout)
                .lines()
                .next()
                .unwrap_or("unknown")
                .to_string();
            info!("ffmpeg available: {line}");
        }
        Ok(_) => warn!("ffmpeg exists but -version failed"),
        Err(e) => warn!("ffmpeg not found: {e} (audio extraction and merging need it)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::profile::build_profiles;
    use crate::media::types::TargetRef;

    fn request(kind: OutputKind, quality: &str) -> MediaRequest {
        MediaRequest::new(
            "https://youtu.be/abc123",
            TargetRef::Url("https://youtu.be/abc123".into()),
            kind,
            quality,
            9,
        )
    }

    #[test]
    fn test_profile_args_carry_identity() {
        let req = request(OutputKind::Audio, "192");
        let profiles = build_profiles(&req);
        let args = YtDlpExtractor::profile_args(&profiles[0]);
        let joined = args.join(" ");
        assert!(joined.contains("--geo-bypass"));
        assert!(joined.contains("player_client=android_music,android"));
        assert!(joined.contains("--socket-timeout 60"));
    }

    #[test]
    fn test_minimal_profile_args_have_no_fingerprint() {
        let req = request(OutputKind::Audio, "192");
        let profiles = build_profiles(&req);
        let args = YtDlpExtractor::profile_args(profiles.last().unwrap());
        let joined = args.join(" ");
        assert!(!joined.contains("--user-agent"));
        assert!(!joined.contains("--add-headers"));
        assert!(!joined.contains("--geo-bypass"));
        assert!(!joined.contains("--extractor-args"));
    }

    #[test]
    fn test_audio_format_args() {
        let req = request(OutputKind::Audio, "192");
        let profiles = build_profiles(&req);
        let joined = YtDlpExtractor::format_args(&profiles[0]).join(" ");
        assert!(joined.contains("--extract-audio"));
        assert!(joined.contains("--audio-quality 192K"));
    }

    #[test]
    fn test_video_format_args_cap_height() {
        let req = request(OutputKind::Video, "720");
        let profiles = build_profiles(&req);
        let joined = YtDlpExtractor::format_args(&profiles[0]).join(" ");
        assert!(joined.contains("height<=720"));
        assert!(joined.contains("--merge-output-format mp4"));
    }

    #[test]
    fn test_expected_path_embeds_request_id() {
        let extractor = YtDlpExtractor::new(PathBuf::from("/tmp"));
        let req = request(OutputKind::Audio, "192");
        let path = extractor.expected_path(&req, "dQw4w9WgXcQ");
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(&req.request_id));
        assert!(name.ends_with("dQw4w9WgXcQ.mp3"));
        assert_eq!(path.parent().unwrap(), Path::new("/tmp"));
    }

    #[test]
    fn test_output_template_is_per_request() {
        let extractor = YtDlpExtractor::new(PathBuf::from("/tmp"));
        let a = extractor.output_template(&request(OutputKind::Audio, "192"));
        let b = extractor.output_template(&MediaRequest::new(
            "https://youtu.be/other",
            TargetRef::Url("https://youtu.be/other".into()),
            OutputKind::Audio,
            "192",
            9,
        ));
        assert_ne!(a, b);
        assert!(a.contains("%(id)s.%(ext)s"));
    }
}
