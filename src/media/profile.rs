use std::time::Duration;

use super::types::{MediaRequest, OutputKind};

/// Client identity a fallback attempt impersonates. Upstream bot-detection
/// keys on identity + header fingerprint, so each attempt presents a
/// different combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientIdentity {
    AndroidMusic,
    Ios,
    WebGooglebot,
    WebFirefox,
    Minimal,
}

impl ClientIdentity {
    pub fn tag(self) -> &'static str {
        match self {
            ClientIdentity::AndroidMusic => "android_music",
            ClientIdentity::Ios => "ios",
            ClientIdentity::WebGooglebot => "web-googlebot",
            ClientIdentity::WebFirefox => "web-firefox",
            ClientIdentity::Minimal => "minimal",
        }
    }

    /// `--extractor-args youtube:player_client=...` value, if the identity
    /// pins one.
    pub fn player_clients(self) -> Option<&'static str> {
        match self {
            ClientIdentity::AndroidMusic => Some("android_music,android"),
            ClientIdentity::Ios => Some("ios"),
            ClientIdentity::WebGooglebot | ClientIdentity::WebFirefox => Some("web"),
            ClientIdentity::Minimal => None,
        }
    }

    pub fn user_agent(self) -> Option<&'static str> {
        match self {
            ClientIdentity::AndroidMusic => {
                Some("com.google.android.apps.youtube.music/6.42.52 (Linux; U; Android 13)")
            }
            ClientIdentity::Ios => {
                Some("com.google.ios.youtube/19.09.3 (iPhone14,3; U; CPU iOS 15_6 like Mac OS X)")
            }
            ClientIdentity::WebGooglebot => {
                Some("Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)")
            }
            ClientIdentity::WebFirefox => {
                Some("Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:124.0) Gecko/20100101 Firefox/124.0")
            }
            ClientIdentity::Minimal => None,
        }
    }
}

/// One fallback attempt's fixed configuration. Immutable; generated fresh
/// per request.
#[derive(Debug, Clone)]
pub struct ExtractionProfile {
    pub identity: ClientIdentity,
    /// Extra `Header: value` pairs passed to the extractor.
    pub headers: Vec<(&'static str, &'static str)>,
    pub socket_timeout: Duration,
    pub retries: u32,
    pub geo_bypass: bool,
    pub kind: OutputKind,
    pub quality: String,
}

impl ExtractionProfile {
    /// Generous per-attempt ceiling: socket timeout covers single reads,
    /// this bounds the whole subprocess including the transcode.
    pub fn attempt_timeout(&self) -> Duration {
        self.socket_timeout * 6 + Duration::from_secs(120)
    }
}

const ACCEPT_HEADERS: &[(&str, &str)] = &[
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    ),
    ("Accept-Language", "en-US,en;q=0.5"),
];

/// Build the ordered fallback sequence for one request: richest profile
/// first, fully degraded last. Calling twice with the same request yields
/// the same sequence.
pub fn build_profiles(request: &MediaRequest) -> Vec<ExtractionProfile> {
    let base = |identity: ClientIdentity,
                headers: Vec<(&'static str, &'static str)>,
                socket_timeout: u64,
                retries: u32,
                geo_bypass: bool| ExtractionProfile {
        identity,
        headers,
        socket_timeout: Duration::from_secs(socket_timeout),
        retries,
        geo_bypass,
        kind: request.kind,
        quality: request.quality.clone(),
    };

    vec![
        base(ClientIdentity::AndroidMusic, ACCEPT_HEADERS.to_vec(), 60, 3, true),
        base(ClientIdentity::Ios, ACCEPT_HEADERS.to_vec(), 45, 3, true),
        base(ClientIdentity::WebGooglebot, vec![ACCEPT_HEADERS[0]], 30, 2, false),
        base(ClientIdentity::WebFirefox, vec![ACCEPT_HEADERS[0]], 30, 2, false),
        base(ClientIdentity::Minimal, Vec::new(), 20, 1, false),
    ]
}
