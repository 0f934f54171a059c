use std::time::Duration;

use crate::utils::format_size;

use super::types::Artifact;

/// Coarse classification of a terminal extraction failure, used only to
/// pick user guidance. Matching is substring-based over the lowercased
/// detail string; deliberately crude, but isolated here so the table can
/// be extended without touching control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BotDetected,
    RateLimited,
    NotAvailable,
    FileTooLarge,
    Unclassified,
}

impl ErrorKind {
    pub fn classify(detail: &str) -> Self {
        let lower = detail.to_lowercase();
        if lower.contains("sign in to confirm") || lower.contains("bot") {
            ErrorKind::BotDetected
        } else if lower.contains("429") || lower.contains("too many requests") {
            ErrorKind::RateLimited
        } else if lower.contains("not found") || lower.contains("unavailable") {
            ErrorKind::NotAvailable
        } else {
            ErrorKind::Unclassified
        }
    }
}

/// The single terminal reply shown to the requester. Exactly one of these
/// is produced per request, success or failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub kind: Option<ErrorKind>,
}

impl Reply {
    fn failure(kind: ErrorKind, text: String) -> Self {
        Self {
            text,
            kind: Some(kind),
        }
    }
}

/// Render user guidance for a failed fetch.
pub fn failure_reply(detail: &str) -> Reply {
    let kind = ErrorKind::classify(detail);
    match kind {
        ErrorKind::BotDetected => Reply::failure(
            kind,
            "🤖 The platform flagged this download as automated.\n\
             Please wait 5-10 minutes and try again."
                .to_string(),
        ),
        ErrorKind::RateLimited => Reply::failure(
            kind,
            "🚦 Too many requests right now (rate limited).\n\
             Please wait 10-15 minutes before trying again."
                .to_string(),
        ),
        ErrorKind::NotAvailable => Reply::failure(
            kind,
            "🔍 That media could not be found or is unavailable.\n\
             Check the link, or try a different video."
                .to_string(),
        ),
        ErrorKind::FileTooLarge | ErrorKind::Unclassified => Reply::failure(
            ErrorKind::Unclassified,
            format!(
                "❌ Download failed: {}\nPlease try again in a bit.",
                truncate(detail, 200)
            ),
        ),
    }
}

/// Reply for an artifact that exceeds the delivery size ceiling. The file
/// is rejected before any upload is attempted; no retry guidance applies.
pub fn too_large_reply(size: u64, max: u64) -> Reply {
    Reply::failure(
        ErrorKind::FileTooLarge,
        format!(
            "📦 File too large: {} (limit {}).\nTry a lower quality.",
            format_size(size),
            format_size(max)
        ),
    )
}

/// Reply for an extraction that "succeeded" but whose output file could
/// not be located anywhere.
pub fn not_found_reply(detail: &str) -> Reply {
    Reply::failure(
        ErrorKind::NotAvailable,
        format!(
            "❌ The downloaded file went missing before delivery.\n{}",
            truncate(detail, 200)
        ),
    )
}

/// Caption attached to a delivered artifact.
pub fn success_caption(artifact: &Artifact, elapsed: Duration) -> String {
    format!(
        "🎬 **{}**\n📊 Size: {}\n⏱️ Took: {}s",
        artifact.metadata.title_or_default(),
        format_size(artifact.size),
        elapsed.as_secs()
    )
}

/// Final reply after a successful delivery.
pub fn success_reply(artifact: &Artifact) -> Reply {
    Reply {
        text: format!("✅ Sent **{}**", artifact.metadata.title_or_default()),
        kind: None,
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
