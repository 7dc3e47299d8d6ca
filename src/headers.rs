//! Header injection policy for the anonymous print context.
//!
//! The printable page runs in a fresh browser profile with no session of its
//! own, yet its data requests must reach the application's same-origin data
//! proxy with the caller's credential attached. The policy below decides,
//! per outbound request URL, which headers to add. It is deliberately
//! declarative so new proxy prefixes or header shapes are config changes,
//! not interception-code changes.

use url::Url;

use crate::error::{Error, Result};

/// Ordered header name/value pairs injected into matching requests.
pub type HeaderSet = Vec<(String, String)>;

/// One `{path prefix -> header set}` rule.
#[derive(Debug, Clone)]
pub struct InjectionRule {
    /// Prefix matched against the request URL's path
    pub path_prefix: String,
    pub headers: HeaderSet,
}

/// Declarative header injection policy bound to a single origin.
///
/// Only requests to the same scheme, host and port as the printable page are
/// ever rewritten. Everything else continues untouched, so the caller's
/// credential cannot leak to third-party hosts referenced by the page.
#[derive(Debug, Clone)]
pub struct HeaderInjectionPolicy {
    scheme: String,
    host: String,
    port: Option<u16>,
    rules: Vec<InjectionRule>,
}

impl HeaderInjectionPolicy {
    /// A policy over explicit rules, bound to the origin of `site_url`.
    pub fn new(site_url: &str, rules: Vec<InjectionRule>) -> Result<Self> {
        let url = Url::parse(site_url)
            .map_err(|e| Error::Config(format!("invalid site URL {:?}: {}", site_url, e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::Config(format!("site URL {:?} has no host", site_url)))?
            .to_string();
        Ok(Self {
            scheme: url.scheme().to_string(),
            host,
            port: url.port(),
            rules,
        })
    }

    /// The common case: attach the caller's bearer credential, both as an
    /// `Authorization` header and as its API-key twin, to every request
    /// under the given same-origin path prefixes.
    pub fn bearer(site_url: &str, path_prefixes: &[String], token: &str) -> Result<Self> {
        let headers: HeaderSet = vec![
            ("Authorization".to_string(), format!("Bearer {}", token)),
            ("x-api-key".to_string(), token.to_string()),
        ];
        let rules = path_prefixes
            .iter()
            .map(|prefix| InjectionRule {
                path_prefix: prefix.clone(),
                headers: headers.clone(),
            })
            .collect();
        Self::new(site_url, rules)
    }

    /// The headers to attach to `url`, or `None` when the request must pass
    /// through unmodified. Unparseable URLs are passed through.
    pub fn headers_for(&self, url: &str) -> Option<&HeaderSet> {
        let parsed = Url::parse(url).ok()?;
        if parsed.scheme() != self.scheme
            || parsed.host_str() != Some(self.host.as_str())
            || parsed.port() != self.port
        {
            return None;
        }
        let path = parsed.path();
        self.rules
            .iter()
            .find(|rule| path.starts_with(&rule.path_prefix))
            .map(|rule| &rule.headers)
    }
}

/// Merge injected headers over the original request headers. An injected
/// header replaces any original header with the same name, compared
/// case-insensitively; all other original headers survive.
pub fn merge_headers(original: &[(String, String)], injected: &HeaderSet) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = original
        .iter()
        .filter(|(name, _)| !injected.iter().any(|(inj, _)| inj.eq_ignore_ascii_case(name)))
        .cloned()
        .collect();
    merged.extend(injected.iter().cloned());
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> HeaderInjectionPolicy {
        HeaderInjectionPolicy::bearer(
            "https://fleet.example",
            &["/api/".to_string()],
            "tok-123",
        )
        .unwrap()
    }

    #[test]
    fn matches_proxy_prefix_on_same_origin() {
        let p = policy();
        let headers = p
            .headers_for("https://fleet.example/api/checklists/42")
            .expect("should match");
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].0, "Authorization");
        assert_eq!(headers[0].1, "Bearer tok-123");
        assert_eq!(headers[1].0, "x-api-key");
        assert_eq!(headers[1].1, "tok-123");
    }

    #[test]
    fn ignores_other_paths_on_same_origin() {
        let p = policy();
        assert!(p.headers_for("https://fleet.example/assets/logo.svg").is_none());
        assert!(p.headers_for("https://fleet.example/apidocs").is_none());
    }

    #[test]
    fn never_rewrites_cross_origin_requests() {
        let p = policy();
        assert!(p.headers_for("https://cdn.example/api/checklists/42").is_none());
        assert!(p.headers_for("http://fleet.example/api/checklists/42").is_none());
        assert!(p.headers_for("https://fleet.example.evil.test/api/x").is_none());
    }

    #[test]
    fn port_must_match_exactly() {
        let p = HeaderInjectionPolicy::bearer(
            "http://127.0.0.1:18090",
            &["/api/".to_string()],
            "t",
        )
        .unwrap();
        assert!(p.headers_for("http://127.0.0.1:18090/api/x").is_some());
        assert!(p.headers_for("http://127.0.0.1:18091/api/x").is_none());
    }

    #[test]
    fn default_ports_are_normalized() {
        let p = policy();
        // :443 is the https default and parses to the same origin.
        assert!(p.headers_for("https://fleet.example:443/api/x").is_some());
    }

    #[test]
    fn unparseable_urls_pass_through() {
        assert!(policy().headers_for("not a url").is_none());
    }

    #[test]
    fn rejects_site_url_without_host() {
        let err = HeaderInjectionPolicy::bearer("data:text/plain,x", &[], "t").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn merge_replaces_same_name_case_insensitively() {
        let original = vec![
            ("authorization".to_string(), "Bearer stale".to_string()),
            ("Accept".to_string(), "application/json".to_string()),
        ];
        let injected = vec![("Authorization".to_string(), "Bearer fresh".to_string())];
        let merged = merge_headers(&original, &injected);
        assert_eq!(merged.len(), 2);
        assert!(merged
            .iter()
            .any(|(n, v)| n == "Accept" && v == "application/json"));
        assert!(merged
            .iter()
            .any(|(n, v)| n == "Authorization" && v == "Bearer fresh"));
        assert!(!merged.iter().any(|(_, v)| v == "Bearer stale"));
    }

    #[test]
    fn merge_keeps_unrelated_headers() {
        let original = vec![("If-None-Match".to_string(), "\"abc\"".to_string())];
        let injected = vec![("x-api-key".to_string(), "tok".to_string())];
        let merged = merge_headers(&original, &injected);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn first_matching_rule_wins() {
        let p = HeaderInjectionPolicy::new(
            "https://fleet.example",
            vec![
                InjectionRule {
                    path_prefix: "/api/internal/".to_string(),
                    headers: vec![("x-scope".to_string(), "internal".to_string())],
                },
                InjectionRule {
                    path_prefix: "/api/".to_string(),
                    headers: vec![("x-scope".to_string(), "public".to_string())],
                },
            ],
        )
        .unwrap();
        let headers = p
            .headers_for("https://fleet.example/api/internal/jobs")
            .unwrap();
        assert_eq!(headers[0].1, "internal");
    }
}
