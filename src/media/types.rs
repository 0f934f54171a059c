use std::path::PathBuf;
use std::time::Duration;

/// Requested output format for a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Audio,
    Video,
}

impl OutputKind {
    /// Final container extension yt-dlp's post-processing produces.
    pub fn final_ext(self) -> &'static str {
        match self {
            OutputKind::Audio => "mp3",
            OutputKind::Video => "mp4",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mp3" | "audio" => Some(OutputKind::Audio),
            "mp4" | "video" => Some(OutputKind::Video),
            _ => None,
        }
    }
}

/// What the classifier resolved the user's input to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetRef {
    /// A literal media URL on a recognized platform.
    Url(String),
    /// A rewritten search-query string (yt-dlp search pseudo-URL).
    Search(String),
}

impl TargetRef {
    pub fn as_str(&self) -> &str {
        match self {
            TargetRef::Url(s) | TargetRef::Search(s) => s,
        }
    }
}

/// One user-initiated fetch. Built when a message/button is classified as
/// actionable, consumed once by the executor.
#[derive(Debug, Clone)]
pub struct MediaRequest {
    pub raw_input: String,
    pub target: TargetRef,
    pub kind: OutputKind,
    /// Quality tag: audio bitrate in kbps ("192") or video height cap ("720").
    pub quality: String,
    /// Originating channel/session, opaque to the engine.
    pub session: u64,
    /// Short unique tag mixed into the output filename so concurrent
    /// requests never collide in the shared scratch directory.
    pub request_id: String,
}

impl MediaRequest {
    pub fn new(
        raw_input: impl Into<String>,
        target: TargetRef,
        kind: OutputKind,
        quality: impl Into<String>,
        session: u64,
    ) -> Self {
        let raw_input = raw_input.into();
        let request_id = format!("{:x}", md5::compute(format!("{session}:{raw_input}")));
        Self {
            raw_input,
            target,
            kind,
            quality: quality.into(),
            session,
            request_id: request_id[..10].to_string(),
        }
    }
}

/// Best-effort metadata reported by the extraction library. Everything is
/// defaultable; platforms routinely omit fields.
#[derive(Debug, Clone, Default)]
pub struct MediaMetadata {
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub duration: Option<u64>,
    pub thumbnail_url: Option<String>,
}

impl MediaMetadata {
    pub fn title_or_default(&self) -> &str {
        self.title.as_deref().unwrap_or("Media")
    }
}

/// What a successful extraction attempt reports back: where the library
/// says it wrote the file, plus whatever metadata it could scrape.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub output_path: PathBuf,
    pub metadata: MediaMetadata,
}

/// The located, validated output file, ready for delivery.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub size: u64,
    pub metadata: MediaMetadata,
    pub thumbnail: Option<PathBuf>,
}

impl Artifact {
    /// Best-effort removal of the file and its thumbnail side-file after
    /// delivery. Failures are logged and swallowed.
    pub fn cleanup(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::debug!("could not remove artifact {}: {e}", self.path.display());
        }
        if let Some(thumb) = &self.thumbnail {
            if let Err(e) = std::fs::remove_file(thumb) {
                tracing::debug!("could not remove thumbnail {}: {e}", thumb.display());
            }
        }
    }
}

/// Terminal result of the fallback executor.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Some profile completed without raising.
    Success {
        extraction: Extraction,
        elapsed: Duration,
    },
    /// Every profile was exhausted; `detail` is the final profile's error,
    /// verbatim.
    Failure { detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_is_stable_and_short() {
        let a = MediaRequest::new(
            "https://youtu.be/abc",
            TargetRef::Url("https://youtu.be/abc".into()),
            OutputKind::Audio,
            "192",
            7,
        );
        let b = MediaRequest::new(
            "https://youtu.be/abc",
            TargetRef::Url("https://youtu.be/abc".into()),
            OutputKind::Audio,
            "192",
            7,
        );
        assert_eq!(a.request_id, b.request_id);
        assert_eq!(a.request_id.len(), 10);
    }

    #[test]
    fn test_request_id_differs_per_session() {
        let a = MediaRequest::new(
            "x",
            TargetRef::Search("ytsearch1:x".into()),
            OutputKind::Audio,
            "192",
            1,
        );
        let b = MediaRequest::new(
            "x",
            TargetRef::Search("ytsearch1:x".into()),
            OutputKind::Audio,
            "192",
            2,
        );
        assert_ne!(a.request_id, b.request_id);
    }

    #[test]
    fn test_output_kind_parse() {
        assert_eq!(OutputKind::parse("mp3"), Some(OutputKind::Audio));
        assert_eq!(OutputKind::parse("mp4"), Some(OutputKind::Video));
        assert_eq!(OutputKind::parse("flac"), None);
    }

    #[test]
    fn test_final_ext() {
        assert_eq!(OutputKind::Audio.final_ext(), "mp3");
        assert_eq!(OutputKind::Video.final_ext(), "mp4");
    }
}
