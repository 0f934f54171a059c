use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use super::profile::ExtractionProfile;
use super::types::{Extraction, FetchOutcome, MediaRequest};

/// The external extraction/download library boundary. Opaque, slow, and
/// always fallible; the executor layers its own profile-level retry on top
/// of whatever the library does internally.
#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn extract(
        &self,
        request: &MediaRequest,
        profile: &ExtractionProfile,
    ) -> Result<Extraction>;
}

/// Slack added on top of the summed per-profile ceilings for the overall
/// request deadline.
const DEADLINE_SLACK: Duration = Duration::from_secs(30);

/// Run the profiles in order against the extractor; first success wins.
///
/// Every attempt error is absorbed and the loop advances; only exhaustion
/// of the whole list surfaces as a `Failure`, carrying the final profile's
/// error verbatim. Attempts are strictly sequential: each one burns
/// rate-limited upstream quota, so parallel attempts would hurt, not help.
///
/// `on_attempt` is invoked before each attempt with (index, total) so the
/// caller can surface coarse progress.
pub async fn execute<F>(
    request: &MediaRequest,
    profiles: &[ExtractionProfile],
    extractor: &dyn Extractor,
    mut on_attempt: F,
) -> FetchOutcome
where
    F: FnMut(usize, usize) + Send,
{
    let deadline: Duration = profiles
        .iter()
        .map(|p| p.attempt_timeout())
        .sum::<Duration>()
        + DEADLINE_SLACK;

    let started = Instant::now();
    let run = run_profiles(request, profiles, extractor, &mut on_attempt);

    match tokio::time::timeout(deadline, run).await {
        Ok(outcome) => match outcome {
            Ok(extraction) => FetchOutcome::Success {
                extraction,
                elapsed: started.elapsed(),
            },
            Err(detail) => FetchOutcome::Failure { detail },
        },
        Err(_) => FetchOutcome::Failure {
            detail: format!(
                "request deadline exceeded after {}s",
                deadline.as_secs()
            ),
        },
    }
}

async fn run_profiles<F>(
    request: &MediaRequest,
    profiles: &[ExtractionProfile],
    extractor: &dyn Extractor,
    on_attempt: &mut F,
) -> Result<Extraction, String>
where
    F: FnMut(usize, usize) + Send,
{
    let mut last_error = String::from("no extraction profiles configured");

    for (i, profile) in profiles.iter().enumerate() {
        on_attempt(i, profiles.len());
        info!(
            url = request.target.as_str(),
            extractor = extractor.name(),
            profile = profile.identity.tag(),
            attempt = i + 1,
            total = profiles.len(),
            "starting extraction attempt"
        );

        match extractor.extract(request, profile).await {
            Ok(extraction) => {
                info!(
                    profile = profile.identity.tag(),
                    path = %extraction.output_path.display(),
                    "extraction succeeded"
                );
                return Ok(extraction);
            }
            Err(e) => {
                warn!(
                    profile = profile.identity.tag(),
                    "extraction attempt failed: {e:#}"
                );
                last_error = format!("{e:#}");
            }
        }
    }

    Err(last_error)
}
