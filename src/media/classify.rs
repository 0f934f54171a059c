use url::Url;

/// Platforms the bot knows how to fetch from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Youtube,
    Instagram,
    Tiktok,
    Twitter,
    Facebook,
}

impl Platform {
    pub fn name(self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
            Platform::Twitter => "twitter",
            Platform::Facebook => "facebook",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Platform::Youtube => "📺",
            Platform::Instagram => "📸",
            Platform::Tiktok => "🎵",
            Platform::Twitter => "🐦",
            Platform::Facebook => "👥",
        }
    }
}

struct PlatformEntry {
    platform: Platform,
    domains: &'static [&'static str],
    enabled: bool,
}

/// Platform table. Iteration order IS priority order (not insertion
/// history): keep entries sorted by how likely they are to be the intended
/// target, or classification becomes nondeterministic under table edits.
const PLATFORMS: &[PlatformEntry] = &[
    PlatformEntry {
        platform: Platform::Youtube,
        domains: &["youtube.com", "youtu.be", "m.youtube.com"],
        enabled: true,
    },
    PlatformEntry {
        platform: Platform::Instagram,
        domains: &["instagram.com"],
        // Disabled upstream: Instagram blocks anonymous extraction.
        enabled: false,
    },
    PlatformEntry {
        platform: Platform::Tiktok,
        domains: &["tiktok.com", "vm.tiktok.com", "vt.tiktok.com"],
        enabled: true,
    },
    PlatformEntry {
        platform: Platform::Twitter,
        domains: &["twitter.com", "x.com", "t.co"],
        enabled: true,
    },
    PlatformEntry {
        platform: Platform::Facebook,
        domains: &["facebook.com", "fb.watch", "fb.com"],
        enabled: true,
    },
];

/// What a piece of user input turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A link to an enabled platform, normalized.
    Media { platform: Platform, url: String },
    /// Free text; treat it as a search query.
    Search(String),
    /// URL-shaped, but the host matches no enabled platform.
    Unrecognized,
}

/// Classify raw user input. Pure function over the static table; no I/O.
///
/// Free text that does not look like a URL is deliberately classified as a
/// search query rather than rejected, so "type an artist name" works
/// alongside literal links.
pub fn classify(input: &str) -> Classification {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Classification::Search(String::new());
    }

    let had_scheme = trimmed.starts_with("http://") || trimmed.starts_with("https://");
    let candidate = if had_scheme {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let parsed = match Url::parse(&candidate) {
        Ok(u) => u,
        Err(_) => return Classification::Search(trimmed.to_string()),
    };

    let host = match parsed.host_str() {
        Some(h) => h.to_lowercase(),
        None => return Classification::Search(trimmed.to_string()),
    };
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();

    for entry in PLATFORMS {
        if !entry.enabled {
            continue;
        }
        for domain in entry.domains {
            if host == *domain || host.ends_with(&format!(".{domain}")) || host.contains(domain) {
                return Classification::Media {
                    platform: entry.platform,
                    url: clean_url(&candidate),
                };
            }
        }
    }

    // Host matched nothing. An explicit scheme or a dotted host means the
    // user pasted a real link we don't support; bare words are a search.
    if had_scheme || host.contains('.') {
        Classification::Unrecognized
    } else {
        Classification::Search(trimmed.to_string())
    }
}

/// Rewrite a free-text query into yt-dlp's search pseudo-URL, taking the
/// first result.
pub fn rewrite_search(query: &str) -> String {
    format!("ytsearch1:{}", query.trim())
}

/// Strip tracking parameters, keeping only the ones that select content.
fn clean_url(url: &str) -> String {
    let parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(_) => return url.to_string(),
    };

    const KEEP: &[&str] = &["v", "t", "list", "index"];
    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| KEEP.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut out = parsed.clone();
    out.set_query(None);
    if !kept.is_empty() {
        let q: Vec<String> = kept.iter().map(|(k, v)| format!("{k}={v}")).collect();
        out.set_query(Some(&q.join("&")));
    }
    out.to_string()
}

/// Names of the platforms currently accepting requests, for user messaging.
pub fn enabled_platform_names() -> Vec<&'static str> {
    PLATFORMS
        .iter()
        .filter(|e| e.enabled)
        .map(|e| e.platform.name())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_youtube_short_link() {
        match classify("https://youtu.be/abc123") {
            Classification::Media { platform, url } => {
                assert_eq!(platform, Platform::Youtube);
                assert!(url.starts_with("https://youtu.be/abc123"));
            }
            other => panic!("expected Media, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_prepends_scheme() {
        match classify("youtube.com/watch?v=abc") {
            Classification::Media { platform, url } => {
                assert_eq!(platform, Platform::Youtube);
                assert!(url.contains("v=abc"));
            }
            other => panic!("expected Media, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_strips_www() {
        assert!(matches!(
            classify("https://www.tiktok.com/@user/video/1"),
            Classification::Media {
                platform: Platform::Tiktok,
                ..
            }
        ));
    }

    #[test]
    fn test_classify_free_text_is_search() {
        assert_eq!(
            classify("not a url at all"),
            Classification::Search("not a url at all".to_string())
        );
        assert_eq!(
            classify("daft punk"),
            Classification::Search("daft punk".to_string())
        );
    }

    #[test]
    fn test_classify_unknown_host_is_unrecognized() {
        assert_eq!(
            classify("https://example.com/video.mp4"),
            Classification::Unrecognized
        );
        assert_eq!(classify("vimeo.com/12345"), Classification::Unrecognized);
    }

    #[test]
    fn test_classify_disabled_platform_is_unrecognized() {
        assert_eq!(
            classify("https://instagram.com/p/xyz"),
            Classification::Unrecognized
        );
    }

    #[test]
    fn test_classify_is_deterministic() {
        let inputs = [
            "https://youtu.be/abc123",
            "x.com/user/status/9",
            "some words",
            "https://example.org/a",
        ];
        for input in inputs {
            assert_eq!(classify(input), classify(input));
        }
    }

    #[test]
    fn test_clean_url_keeps_content_params() {
        let cleaned = clean_url("https://youtube.com/watch?v=abc&si=tracker&t=42");
        assert!(cleaned.contains("v=abc"));
        assert!(cleaned.contains("t=42"));
        assert!(!cleaned.contains("si="));
    }

    #[test]
    fn test_rewrite_search() {
        assert_eq!(rewrite_search(" daft punk "), "ytsearch1:daft punk");
    }

    #[test]
    fn test_enabled_platform_names_excludes_disabled() {
        let names = enabled_platform_names();
        assert!(names.contains(&"youtube"));
        assert!(!names.contains(&"instagram"));
    }
}
