mod classify;
mod executor;
mod locate;
mod profile;
mod report;
mod types;
mod ytdlp;

pub use classify::{classify, enabled_platform_names, rewrite_search, Classification, Platform};
pub use executor::Extractor;
pub use locate::SearchRoots;
pub use profile::{build_profiles, ClientIdentity, ExtractionProfile};
pub use report::{failure_reply, ErrorKind, Reply};
pub use types::{
    Artifact, Extraction, FetchOutcome, MediaMetadata, MediaRequest, OutputKind, TargetRef,
};
pub use ytdlp::probe_tools;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::stats::Stats;
use ytdlp::YtDlpExtractor;

/// What the engine hands back for one request: either a located, validated
/// artifact ready for the delivery collaborator, or the single refusal
/// reply to show the user. Exactly one terminal reply ever exists per
/// request; the caller renders it once.
#[derive(Debug)]
pub enum Prepared {
    Ready {
        artifact: Artifact,
        caption: String,
        elapsed: Duration,
    },
    Refused(Reply),
}

/// Orchestrates one fetch: profile build, fallback execution, artifact
/// location, size validation and thumbnail fetch. Transport-agnostic;
/// delivery stays with the caller.
pub struct MediaEngine {
    extractor: Box<dyn Extractor>,
    roots: SearchRoots,
    stats: Arc<Stats>,
    http: reqwest::Client,
    max_file_size: u64,
}

impl MediaEngine {
    pub fn new(
        extractor: Box<dyn Extractor>,
        roots: SearchRoots,
        stats: Arc<Stats>,
        max_file_size: u64,
    ) -> Self {
        Self {
            extractor,
            roots,
            stats,
            http: reqwest::Client::new(),
            max_file_size,
        }
    }

    /// Engine wired to the real yt-dlp CLI.
    pub fn with_ytdlp(
        scratch: PathBuf,
        alt_root: PathBuf,
        stats: Arc<Stats>,
        max_file_size: u64,
    ) -> Self {
        let extractor = Box::new(YtDlpExtractor::new(scratch.clone()));
        let roots = SearchRoots { scratch, alt_root };
        Self::new(extractor, roots, stats, max_file_size)
    }

    /// Run the full pipeline for one request. Every failure path records
    /// an error and yields a `Refused` reply; nothing here is fatal.
    pub async fn fetch<F>(&self, request: &MediaRequest, on_attempt: F) -> Prepared
    where
        F: FnMut(usize, usize) + Send,
    {
        let profiles = profile::build_profiles(request);
        let outcome =
            executor::execute(request, &profiles, self.extractor.as_ref(), on_attempt).await;

        let (extraction, elapsed) = match outcome {
            FetchOutcome::Success {
                extraction,
                elapsed,
            } => (extraction, elapsed),
            FetchOutcome::Failure { detail } => {
                self.stats.record_error();
                return Prepared::Refused(report::failure_reply(&detail));
            }
        };

        let context = format!("req:{}", request.request_id);
        let path = match locate::locate(&extraction.output_path, &self.roots, &context) {
            Ok(path) => path,
            Err(e) => {
                warn!("{context} - extraction succeeded but artifact missing: {e:#}");
                self.stats.record_error();
                return Prepared::Refused(report::not_found_reply(&format!("{e:#}")));
            }
        };

        let size = match std::fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                self.stats.record_error();
                return Prepared::Refused(report::not_found_reply(&format!(
                    "could not stat {}: {e}",
                    path.display()
                )));
            }
        };

        if size > self.max_file_size {
            self.stats.record_error();
            let reply = report::too_large_reply(size, self.max_file_size);
            // Drop the oversize file now; it will never be delivered.
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("{context} - could not remove oversize file: {e}");
            }
            return Prepared::Refused(reply);
        }

        let thumbnail = match &extraction.metadata.thumbnail_url {
            Some(url) => match ytdlp::fetch_thumbnail(&self.http, url, &path).await {
                Ok(dest) => Some(dest),
                Err(e) => {
                    info!("{context} - thumbnail skipped: {e:#}");
                    None
                }
            },
            None => None,
        };

        let artifact = Artifact {
            path,
            size,
            metadata: extraction.metadata,
            thumbnail,
        };
        let caption = report::success_caption(&artifact, elapsed);

        Prepared::Ready {
            artifact,
            caption,
            elapsed,
        }
    }

    /// Bookkeeping after the delivery collaborator accepted the file.
    pub fn delivered(&self, request: &MediaRequest, artifact: &Artifact) -> Reply {
        self.stats.record_download(request.session);
        artifact.cleanup();
        report::success_reply(artifact)
    }

    /// Bookkeeping after the delivery collaborator failed. The artifact
    /// and thumbnail are cleaned up regardless.
    pub fn delivery_failed(&self, artifact: &Artifact, detail: &str) -> Reply {
        self.stats.record_error();
        artifact.cleanup();
        Reply {
            text: format!("❌ Upload failed: {}", detail),
            kind: Some(ErrorKind::Unclassified),
        }
    }
}
