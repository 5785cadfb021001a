use std::sync::LazyLock;

use regex::Regex;

/// Body classes the proxy is willing to rewrite. Anything else passes
/// through byte-for-byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Css,
    Script,
    Other,
}

impl ContentKind {
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(content_type) = content_type else {
            return Self::Other;
        };
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "text/html" | "application/xhtml+xml" => Self::Html,
            "text/css" => Self::Css,
            "text/javascript" | "application/javascript" | "application/x-javascript" => {
                Self::Script
            }
            _ => Self::Other,
        }
    }

    pub fn is_rewritable(self) -> bool {
        self != Self::Other
    }
}

/// Origin of a parsed upstream URL, e.g. `https://demo.example.com:8443`.
/// The port is kept only when explicit so string matches line up with what
/// the upstream actually emits in its own markup.
pub fn origin_of(url: &reqwest::Url) -> Option<String> {
    let host = url.host_str()?;
    let mut origin = format!("{}://{}", url.scheme(), host);
    if let Some(port) = url.port() {
        origin.push_str(&format!(":{port}"));
    }
    Some(origin)
}

pub fn host_of(url: &reqwest::Url) -> Option<String> {
    let host = url.host_str()?;
    match url.port() {
        Some(port) => Some(format!("{host}:{port}")),
        None => Some(host.to_string()),
    }
}

// Root-relative src/href/action attributes, matched through the closing
// quote. The `[^/"']` guard excludes protocol-relative `//host` references
// (which get their own pass) even when the path is empty, as in `href="/"`.
static ROOT_RELATIVE_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(src|href|action)\s*=\s*(["'])/([^/"'][^"']*)?(["'])"#)
        .unwrap_or_else(|e| panic!("invalid attribute pattern: {e}"))
});

/// Rewrites upstream references in a response body so every follow-up
/// request lands back on the proxy prefix instead of escaping to the
/// upstream origin.
///
/// Pass order matters. Root-relative attributes are rewritten first while
/// they are still distinguishable; rewriting absolute origins first would
/// mint new root-relative paths and double-prefix them.
pub fn rewrite_body(
    body: &str,
    kind: ContentKind,
    origin: &str,
    host: &str,
    proxy_prefix: &str,
) -> String {
    let mut out = if kind == ContentKind::Html {
        ROOT_RELATIVE_ATTR
            .replace_all(body, |caps: &regex::Captures<'_>| {
                let path = caps.get(3).map_or("", |m| m.as_str());
                format!("{}={}{proxy_prefix}/{path}{}", &caps[1], &caps[2], &caps[4])
            })
            .into_owned()
    } else {
        body.to_string()
    };

    out = out.replace(origin, proxy_prefix);
    out = out.replace(&format!("//{host}"), proxy_prefix);
    out
}

/// Maps an upstream redirect target back under the proxy prefix. Relative,
/// same-origin absolute and protocol-relative same-host targets stay inside
/// the demo; foreign origins are left alone and will simply fail the
/// session check if followed.
pub fn rewrite_location(location: &str, origin: &str, host: &str, proxy_prefix: &str) -> String {
    if let Some(path) = location.strip_prefix(origin) {
        if path.is_empty() || path.starts_with('/') {
            return format!("{proxy_prefix}{path}");
        }
    }
    if let Some(path) = location
        .strip_prefix("//")
        .and_then(|rest| rest.strip_prefix(host))
    {
        if path.is_empty() || path.starts_with('/') {
            return format!("{proxy_prefix}{path}");
        }
    }
    if location.starts_with('/') && !location.starts_with("//") {
        return format!("{proxy_prefix}{location}");
    }
    location.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://demo.example.app";
    const HOST: &str = "demo.example.app";
    const PREFIX: &str = "/api/demo-proxy/abc123";

    #[test]
    fn content_kind_parses_mime_with_parameters() {
        assert_eq!(
            ContentKind::from_content_type(Some("text/html; charset=utf-8")),
            ContentKind::Html
        );
        assert_eq!(
            ContentKind::from_content_type(Some("application/javascript")),
            ContentKind::Script
        );
        assert_eq!(
            ContentKind::from_content_type(Some("image/png")),
            ContentKind::Other
        );
        assert_eq!(ContentKind::from_content_type(None), ContentKind::Other);
    }

    #[test]
    fn html_root_relative_attributes_are_prefixed() {
        let body = r#"<img src="/logo.png"><a href='/pricing'>go</a><form action="/submit">"#;
        let out = rewrite_body(body, ContentKind::Html, ORIGIN, HOST, PREFIX);
        assert_eq!(
            out,
            format!(
                r#"<img src="{PREFIX}/logo.png"><a href='{PREFIX}/pricing'>go</a><form action="{PREFIX}/submit">"#
            )
        );
    }

    #[test]
    fn absolute_upstream_urls_do_not_survive_rewriting() {
        let body = format!(r#"<a href="{ORIGIN}/x">x</a> fetch("{ORIGIN}/api/data")"#);
        let out = rewrite_body(&body, ContentKind::Html, ORIGIN, HOST, PREFIX);
        assert!(!out.contains(HOST));
        assert!(out.contains(&format!(r#"<a href="{PREFIX}/x">"#)));
        assert!(out.contains(&format!(r#"fetch("{PREFIX}/api/data")"#)));
    }

    #[test]
    fn protocol_relative_references_are_prefixed() {
        let body = format!(r#"<script src="//{HOST}/bundle.js"></script>"#);
        let out = rewrite_body(&body, ContentKind::Html, ORIGIN, HOST, PREFIX);
        assert_eq!(out, format!(r#"<script src="{PREFIX}/bundle.js"></script>"#));
    }

    #[test]
    fn bare_root_link_is_prefixed_once() {
        let body = r#"<a href="/">home</a>"#;
        let out = rewrite_body(body, ContentKind::Html, ORIGIN, HOST, PREFIX);
        assert_eq!(out, format!(r#"<a href="{PREFIX}/">home</a>"#));
    }

    #[test]
    fn rewrites_do_not_stack() {
        // A root-relative path must not also be treated as protocol-relative
        // markup after the first pass.
        let body = r#"<a href="/a//b">deep</a>"#;
        let out = rewrite_body(body, ContentKind::Html, ORIGIN, HOST, PREFIX);
        assert_eq!(out, format!(r#"<a href="{PREFIX}/a//b">deep</a>"#));
    }

    #[test]
    fn css_gets_origin_rewrites_but_not_attribute_rewrites() {
        let body = format!(r#"body {{ background: url({ORIGIN}/bg.png); }} .x {{ src="/raw" }}"#);
        let out = rewrite_body(&body, ContentKind::Css, ORIGIN, HOST, PREFIX);
        assert!(out.contains(&format!("url({PREFIX}/bg.png)")));
        assert!(out.contains(r#"src="/raw""#));
    }

    #[test]
    fn foreign_origins_are_untouched() {
        let body = r#"<script src="https://cdn.jsdelivr.net/lib.js"></script>"#;
        let out = rewrite_body(body, ContentKind::Html, ORIGIN, HOST, PREFIX);
        assert_eq!(out, body);
    }

    #[test]
    fn location_header_mapping() {
        assert_eq!(
            rewrite_location(&format!("{ORIGIN}/login"), ORIGIN, HOST, PREFIX),
            format!("{PREFIX}/login")
        );
        assert_eq!(
            rewrite_location("/dashboard", ORIGIN, HOST, PREFIX),
            format!("{PREFIX}/dashboard")
        );
        assert_eq!(
            rewrite_location("https://elsewhere.example.com/", ORIGIN, HOST, PREFIX),
            "https://elsewhere.example.com/"
        );
        assert_eq!(
            rewrite_location(ORIGIN, ORIGIN, HOST, PREFIX),
            PREFIX.to_string()
        );
    }

    #[test]
    fn protocol_relative_redirects_stay_in_the_sandbox() {
        assert_eq!(
            rewrite_location(&format!("//{HOST}/login"), ORIGIN, HOST, PREFIX),
            format!("{PREFIX}/login")
        );
        assert_eq!(
            rewrite_location(&format!("//{HOST}"), ORIGIN, HOST, PREFIX),
            PREFIX.to_string()
        );
        // A foreign host sharing a prefix of ours is not ours.
        assert_eq!(
            rewrite_location("//demo.example.appendix/x", ORIGIN, HOST, PREFIX),
            "//demo.example.appendix/x"
        );
        assert_eq!(
            rewrite_location("//evil.example/x", ORIGIN, HOST, PREFIX),
            "//evil.example/x"
        );
    }

    #[test]
    fn origin_and_host_keep_explicit_ports() {
        let url = reqwest::Url::parse("http://127.0.0.1:4310/app").unwrap();
        assert_eq!(origin_of(&url).as_deref(), Some("http://127.0.0.1:4310"));
        assert_eq!(host_of(&url).as_deref(), Some("127.0.0.1:4310"));

        let url = reqwest::Url::parse("https://demo.example.app/x").unwrap();
        assert_eq!(origin_of(&url).as_deref(), Some("https://demo.example.app"));
    }
}
