//! Protopdf
//!
//! Browser-driven PDF export for vehicle handover protocols. The printable
//! protocol page already exists inside the fleet application; this crate
//! drives a real headless Chrome through it and captures the result as a
//! paginated PDF, because the page's layout, fonts and photo handling are
//! exactly what the browser already implements.
//!
//! The pipeline is built around two fallback axes:
//!
//! - **Quality tiers**: an attempt at the requested tier may fail on
//!   photo-heavy protocols; the coordinator then retries the whole capture
//!   at a cheaper tier (`high` -> `normal` -> `economy`).
//! - **Print parameter sets**: within one attempt, CSS-driven pagination is
//!   tried first, then a fixed A4 sheet with a small inset.
//!
//! # Example
//!
//! ```no_run
//! use protopdf::{PrintTarget, RenderConfig, RenderCoordinator, RenderRequest};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = RenderConfig::new(PrintTarget::new("https://fleet.example"));
//! let coordinator = RenderCoordinator::new(config)?;
//!
//! let pdf = coordinator.render(&RenderRequest {
//!     checklist_id: "chk_01HWY3".to_string(),
//!     quality: Some("high".to_string()),
//!     bearer_token: std::env::var("FLEET_TOKEN")?,
//! })?;
//!
//! std::fs::write("protocol.pdf", &pdf.bytes)?;
//! println!("rendered at {} quality", pdf.quality_used);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

pub mod error;
pub use error::{Error, Result, TierFailure};

pub mod quality;
pub use quality::{fallback_order, Quality, QualityPreset};

// Credential injection for the anonymous print context
pub mod headers;
pub use headers::HeaderInjectionPolicy;

// In-page photo recompression
pub mod optimizer;

// Print parameter sets and the first-success export loop
pub mod exporter;

// One browser process per attempt
pub mod session;
pub use session::RenderSession;

// Tier fallback
pub mod coordinator;
pub use coordinator::{ChromeBackend, RenderBackend, RenderCoordinator};

// Async facade
pub mod service;
pub use service::{attachment_filename, RenderService};

// Structural checks over produced PDFs
pub mod pdf_probe;

/// What the finished printable page looks like.
///
/// The page signals readiness itself; the renderer only observes. The
/// defaults match the fleet application's print route, and a deployment
/// whose page changes ships new selectors here rather than new wait logic.
#[derive(Debug, Clone)]
pub struct ReadinessContract {
    /// Selector of the element the page adds once protocol data is rendered
    pub marker_selector: String,
    /// Substring of the visible page text that means "still loading"
    pub loading_text: String,
    /// Selector matching the protocol photo elements
    pub photo_selector: String,
}

impl Default for ReadinessContract {
    fn default() -> Self {
        Self {
            marker_selector: "[data-protocol-ready]".to_string(),
            loading_text: "Loading protocol".to_string(),
            photo_selector: "img.protocol-photo".to_string(),
        }
    }
}

/// The printable page being captured: where it lives and how it signals
/// readiness.
#[derive(Debug, Clone)]
pub struct PrintTarget {
    /// Base URL of the application serving the printable page
    pub site_url: String,
    /// Absolute path of the print route on that origin
    pub print_path: String,
    pub readiness: ReadinessContract,
}

impl PrintTarget {
    pub fn new(site_url: impl Into<String>) -> Self {
        Self {
            site_url: site_url.into(),
            print_path: "/protocol-pdf".to_string(),
            readiness: ReadinessContract::default(),
        }
    }
}

/// Viewport dimensions in CSS pixels
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        // A4 portrait proportions, wide enough for the two-column header
        Self {
            width: 1080,
            height: 1528,
        }
    }
}

/// Configuration for the render pipeline
///
/// One value of this struct describes one deployment: which application to
/// print from, which request paths carry the caller's credential, and the
/// waiting budgets. Per-request variation (checklist, tier, token) arrives
/// in [`RenderRequest`] instead.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub target: PrintTarget,
    /// Same-origin path prefixes whose requests get the caller's credential
    pub proxy_path_prefixes: Vec<String>,
    pub viewport: Viewport,
    /// Budget for navigation and for individual protocol calls
    pub nav_timeout: Duration,
    /// Budget for the primary readiness gate
    pub content_ready_timeout: Duration,
    /// Budget for the photo gate; expiry degrades the export, never fails it
    pub images_ready_timeout: Duration,
    /// Delay between readiness polls
    pub poll_interval: Duration,
    /// Explicit Chrome/Chromium binary; autodetected when `None`
    pub browser_path: Option<PathBuf>,
    /// Whether the Chrome sandbox stays on; disable only in containers
    /// without user namespaces
    pub sandbox: bool,
}

impl RenderConfig {
    pub fn new(target: PrintTarget) -> Self {
        Self {
            target,
            proxy_path_prefixes: vec!["/api/".to_string()],
            viewport: Viewport::default(),
            nav_timeout: Duration::from_secs(30),
            content_ready_timeout: Duration::from_secs(120),
            images_ready_timeout: Duration::from_secs(180),
            poll_interval: Duration::from_millis(500),
            browser_path: None,
            sandbox: true,
        }
    }

    /// Reject configurations that could only fail later and less clearly.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.target.site_url).map_err(|e| {
            Error::Config(format!("invalid site URL {:?}: {}", self.target.site_url, e))
        })?;
        if url.host_str().is_none() {
            return Err(Error::Config(format!(
                "site URL {:?} has no host",
                self.target.site_url
            )));
        }
        if !self.target.print_path.starts_with('/') {
            return Err(Error::Config(format!(
                "print path {:?} must be absolute",
                self.target.print_path
            )));
        }
        for prefix in &self.proxy_path_prefixes {
            if !prefix.starts_with('/') {
                return Err(Error::Config(format!(
                    "proxy path prefix {:?} must be absolute",
                    prefix
                )));
            }
        }
        if self.poll_interval.is_zero() {
            return Err(Error::Config("poll interval must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// One render request, as it arrives from the caller.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Identifier of the protocol checklist to render
    pub checklist_id: String,
    /// Requested quality tier name; unknown or missing means `normal`
    pub quality: Option<String>,
    /// Caller credential forwarded to the application's data proxy
    pub bearer_token: String,
}

/// A finished export.
#[derive(Debug, Clone)]
pub struct RenderedPdf {
    pub bytes: Vec<u8>,
    /// The tier that actually produced the PDF, after any fallback
    pub quality_used: Quality,
}

/// One-shot convenience: build a coordinator and render a single request.
pub fn render_protocol_pdf(config: RenderConfig, request: &RenderRequest) -> Result<RenderedPdf> {
    RenderCoordinator::new(config)?.render(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RenderConfig::new(PrintTarget::new("https://fleet.example"));
        assert_eq!(config.viewport.width, 1080);
        assert_eq!(config.proxy_path_prefixes, vec!["/api/".to_string()]);
        assert!(config.sandbox);
        assert!(config.content_ready_timeout < config.images_ready_timeout);
        config.validate().unwrap();
    }

    #[test]
    fn test_default_readiness_contract() {
        let contract = ReadinessContract::default();
        assert!(contract.marker_selector.contains("data-protocol-ready"));
        assert!(contract.photo_selector.starts_with("img"));
    }

    #[test]
    fn validate_rejects_bad_site_url() {
        let config = RenderConfig::new(PrintTarget::new("fleet.example"));
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn validate_rejects_relative_paths() {
        let mut config = RenderConfig::new(PrintTarget::new("https://fleet.example"));
        config.target.print_path = "protocol-pdf".to_string();
        assert!(config.validate().is_err());

        let mut config = RenderConfig::new(PrintTarget::new("https://fleet.example"));
        config.proxy_path_prefixes = vec!["api/".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_poll_interval() {
        let mut config = RenderConfig::new(PrintTarget::new("https://fleet.example"));
        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
